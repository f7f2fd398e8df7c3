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

//! WASM Guest Runtime
//!
//! Runs guest modules on wasmtime and exposes the bridge to them as plain
//! integer imports.
//!
//! The runtime provides:
//! - Module loading from bytes, files and URLs
//! - Host function bindings for DOM construction
//! - Bounded string decoding from guest memory
//! - Optional fuel limits and load cancellation

pub mod context;
pub mod host_functions;
pub mod loader;
pub mod memory;

pub use context::LoadedModule;
pub use host_functions::{add_to_linker, BridgeHostState, IMPORTS};
pub use loader::ModuleLoader;
pub use memory::read_c_string;
