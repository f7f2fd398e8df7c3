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

//! Runtime configuration

use crate::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vdbridge_core::BridgeConfig;

/// What an import does when a bridge operation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Trap, aborting the guest call that made the import
    #[default]
    Trap,
    /// Log the error, keep it as the last error and return `0` to the guest
    Report,
}

/// Configuration for loading guest modules.
///
/// # Example TOML Configuration
///
/// ```toml
/// import_module = "env"
/// memory_export = "memory"
/// max_fuel = 10000000
/// error_policy = "report"
///
/// [bridge]
/// max_string_len = 4096
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Module name the guest imports the bridge functions from
    #[serde(default = "default_import_module")]
    pub import_module: String,

    /// Name of the guest's exported linear memory
    #[serde(default = "default_memory_export")]
    pub memory_export: String,

    /// Fuel granted to a loaded instance; `None` disables metering
    #[serde(default)]
    pub max_fuel: Option<u64>,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Timeout for fetching a module by URL, in milliseconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_import_module() -> String {
    "env".to_string()
}

fn default_memory_export() -> String {
    "memory".to_string()
}

fn default_fetch_timeout() -> u64 {
    30_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            import_module: default_import_module(),
            memory_export: default_memory_export(),
            max_fuel: None,
            error_policy: ErrorPolicy::default(),
            fetch_timeout_ms: default_fetch_timeout(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> RuntimeResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` or `.toml` file, chosen by extension
    pub fn from_file(path: &Path) -> RuntimeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_toml(&contents),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.import_module.is_empty() {
            return Err(RuntimeError::Config("import_module must not be empty".to_string()));
        }
        if self.memory_export.is_empty() {
            return Err(RuntimeError::Config("memory_export must not be empty".to_string()));
        }
        if self.max_fuel == Some(0) {
            return Err(RuntimeError::Config("max_fuel must be greater than zero".to_string()));
        }
        self.bridge.validate()?;
        Ok(())
    }
}
