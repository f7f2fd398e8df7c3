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

//! Runtime error types

use thiserror::Error;
use vdbridge_core::BridgeError;

/// Result type for loading and running guests
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while loading or calling into a guest module
#[derive(Debug, Error)]
pub enum RuntimeError {
    // Load errors
    #[error("Failed to compile guest module: {0}")]
    Compile(String),

    #[error("Failed to instantiate guest module: {0}")]
    Instantiate(String),

    #[error("Guest does not export a memory named `{0}`")]
    MissingMemory(String),

    #[error("Failed to fetch guest module: {0}")]
    Fetch(String),

    #[error("Load cancelled")]
    Cancelled,

    // Call errors
    #[error("Guest export not found: {0}")]
    MissingExport(String),

    #[error("Guest trapped: {0}")]
    Trap(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    // Setup errors
    #[error("Failed to create WASM engine: {0}")]
    Engine(String),

    #[error("Invalid runtime configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Map an error raised by a guest call, recovering bridge errors that
    /// were turned into traps by an import
    pub(crate) fn from_call(err: anyhow::Error) -> Self {
        match err.downcast_ref::<BridgeError>() {
            Some(bridge) => RuntimeError::Bridge(bridge.clone()),
            None => RuntimeError::Trap(format!("{:#}", err)),
        }
    }
}

impl From<toml::de::Error> for RuntimeError {
    fn from(e: toml::de::Error) -> Self {
        RuntimeError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(e: serde_json::Error) -> Self {
        RuntimeError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for RuntimeError {
    fn from(e: reqwest::Error) -> Self {
        RuntimeError::Fetch(e.to_string())
    }
}
