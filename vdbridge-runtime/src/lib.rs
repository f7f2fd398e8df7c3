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

//! vdbridge runtime
//!
//! Loads WebAssembly guests and wires the `vdbridge_*` imports to a
//! per-instance [`VdBridge`](vdbridge_core::VdBridge).
//!
//! # Example
//!
//! ```rust,ignore
//! use vdbridge_core::Document;
//! use vdbridge_runtime::{ModuleLoader, RuntimeConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let loader = ModuleLoader::new(RuntimeConfig::default()).unwrap();
//!     let mut module = loader
//!         .load_from_url("https://example.com/app.wasm", Document::new())
//!         .await
//!         .unwrap();
//!
//!     let root = module.call_handle_export("vdcore_hello_world").await.unwrap();
//!     println!("{}", module.render_html(root).unwrap());
//! }
//! ```

pub mod config;
pub mod error;
pub mod wasm;

// Re-exports
pub use config::{ErrorPolicy, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use wasm::{BridgeHostState, LoadedModule, ModuleLoader, IMPORTS};

/// Export called by default when running a guest
pub const DEFAULT_ENTRY: &str = "vdcore_hello_world";
