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

//! Bridge configuration

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

/// Limits applied to a single bridge instance.
///
/// # Example TOML Configuration
///
/// ```toml
/// max_string_len = 4096
/// initial_capacity = 256
/// max_handles = 100000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Longest string (in bytes, terminator excluded) decoded from guest memory.
    #[serde(default = "default_max_string_len")]
    pub max_string_len: usize,

    /// Handle slots reserved up front.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Upper bound (exclusive) on handle values the bridge hands out.
    #[serde(default = "default_max_handles")]
    pub max_handles: u32,
}

fn default_max_string_len() -> usize {
    64 * 1024
}

fn default_initial_capacity() -> usize {
    64
}

fn default_max_handles() -> u32 {
    u32::MAX
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_string_len: default_max_string_len(),
            initial_capacity: default_initial_capacity(),
            max_handles: default_max_handles(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> BridgeResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.max_string_len == 0 {
            return Err(BridgeError::InvalidConfig(
                "max_string_len must be greater than zero".to_string(),
            ));
        }
        if self.max_handles < 2 {
            return Err(BridgeError::InvalidConfig(
                "max_handles must leave room for at least one handle".to_string(),
            ));
        }
        Ok(())
    }
}
