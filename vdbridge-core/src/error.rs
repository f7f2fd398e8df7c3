// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bridge error types

use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while servicing a guest call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    // Handle table errors
    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("Handle already released: {0}")]
    DoubleRelease(u32),

    #[error("{0} is full")]
    CapacityExceeded(String),

    // Guest memory errors
    #[error("Out of bounds read at {ptr} (memory size {len})")]
    OutOfBoundsRead { ptr: u32, len: usize },

    #[error("String at {ptr} exceeds {max} bytes without a terminator")]
    StringTooLong { ptr: u32, max: usize },

    #[error("Guest memory has not been captured yet")]
    MemoryNotCaptured,

    // DOM errors
    #[error("Invalid tag name: {0}")]
    InvalidTagName(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Invalid style key: {0}")]
    InvalidStyleKey(String),

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Whether the error stems from a bad handle passed by the guest
    pub fn is_handle_error(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidHandle(_) | BridgeError::DoubleRelease(_)
        )
    }
}
