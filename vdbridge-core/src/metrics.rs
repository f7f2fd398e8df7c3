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

//! Counters collected while a bridge services guest calls

use serde::Serialize;

/// Metrics for one bridge instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeMetrics {
    /// Number of bridge operations invoked
    pub host_call_count: u64,

    /// Number of operations that failed
    pub error_count: u64,

    /// Handles minted by growing the table
    pub handles_minted: u64,

    /// Handles reissued from the free list
    pub handles_recycled: u64,

    /// Handles released by the guest
    pub handles_released: u64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_host_call(&mut self) {
        self.host_call_count += 1;
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Handles currently held by the guest, as far as the counters know
    pub fn outstanding_handles(&self) -> u64 {
        (self.handles_minted + self.handles_recycled).saturating_sub(self.handles_released)
    }
}
