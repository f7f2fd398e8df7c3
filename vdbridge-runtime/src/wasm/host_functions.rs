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

//! Host Functions for Guest Modules
//!
//! The import surface a guest links against. Every import takes and returns
//! 32-bit integers: handles travel as-is and strings as pointers into the
//! guest's exported memory. Pointer arguments are decoded here before the
//! call is handed to the [`VdBridge`].

use super::memory::read_c_string;
use crate::config::ErrorPolicy;
use crate::error::{RuntimeError, RuntimeResult};
use vdbridge_core::{BridgeError, BridgeResult, DomHost, Handle, VdBridge};
use wasmtime::{Caller, Extern, Linker, Memory};

pub const IMPORT_CREATE_ELEMENT: &str = "vdbridge_create_element";
pub const IMPORT_CREATE_TEXT_NODE: &str = "vdbridge_create_text_node";
pub const IMPORT_APPEND_CHILD: &str = "vdbridge_append_child";
pub const IMPORT_REMOVE_CHILD: &str = "vdbridge_remove_child";
pub const IMPORT_REPLACE_CHILD: &str = "vdbridge_replace_child";
pub const IMPORT_SET_PROPERTY: &str = "vdbridge_set_property";
pub const IMPORT_SET_STYLE: &str = "vdbridge_set_style";
pub const IMPORT_RELEASE_NODE: &str = "vdbridge_release_node";

/// Every import name with its wasm signature, for listings and docs
pub const IMPORTS: [(&str, &str); 8] = [
    (IMPORT_CREATE_ELEMENT, "(tag: i32) -> i32"),
    (IMPORT_CREATE_TEXT_NODE, "(text: i32) -> i32"),
    (IMPORT_APPEND_CHILD, "(parent: i32, child: i32)"),
    (IMPORT_REMOVE_CHILD, "(parent: i32, child: i32)"),
    (IMPORT_REPLACE_CHILD, "(parent: i32, new_child: i32, old_child: i32)"),
    (IMPORT_SET_PROPERTY, "(handle: i32, key: i32, value: i32)"),
    (IMPORT_SET_STYLE, "(handle: i32, key: i32, value: i32)"),
    (IMPORT_RELEASE_NODE, "(handle: i32)"),
];

/// State stored in the wasmtime `Store` of one guest instance
///
/// Owns the bridge outright; nothing is shared between instances.
pub struct BridgeHostState<D: DomHost> {
    /// Handle table and DOM driven by the guest
    pub bridge: VdBridge<D>,

    /// Guest memory, captured once instantiation has finished
    memory: Option<Memory>,

    /// Export name used when memory has not been captured yet
    memory_export: String,

    error_policy: ErrorPolicy,

    /// Most recent error swallowed under [`ErrorPolicy::Report`]
    last_error: Option<BridgeError>,
}

impl<D: DomHost> BridgeHostState<D> {
    pub fn new(bridge: VdBridge<D>, memory_export: &str, error_policy: ErrorPolicy) -> Self {
        Self {
            bridge,
            memory: None,
            memory_export: memory_export.to_string(),
            error_policy,
            last_error: None,
        }
    }

    /// Record the guest's exported memory
    pub fn set_memory(&mut self, memory: Memory) {
        self.memory = Some(memory);
    }

    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<BridgeError> {
        self.last_error.take()
    }
}

/// Locate guest memory: the captured export, or the caller's export while
/// the instance is still being set up.
fn guest_memory<D: DomHost>(caller: &mut Caller<'_, BridgeHostState<D>>) -> BridgeResult<Memory> {
    if let Some(memory) = caller.data().memory {
        return Ok(memory);
    }
    let name = caller.data().memory_export.clone();
    match caller.get_export(&name) {
        Some(Extern::Memory(memory)) => Ok(memory),
        _ => Err(BridgeError::MemoryNotCaptured),
    }
}

fn read_guest_str<D: DomHost>(
    caller: &mut Caller<'_, BridgeHostState<D>>,
    ptr: u32,
) -> BridgeResult<String> {
    let memory = guest_memory(caller)?;
    let max_len = caller.data().bridge.config().max_string_len;
    read_c_string(memory.data(&*caller), ptr, max_len)
}

fn read_guest_pair<D: DomHost>(
    caller: &mut Caller<'_, BridgeHostState<D>>,
    key: u32,
    value: u32,
) -> BridgeResult<(String, String)> {
    let key = read_guest_str(caller, key)?;
    let value = read_guest_str(caller, value)?;
    Ok((key, value))
}

/// Turn a bridge result into what the import returns, following the
/// instance's error policy
fn complete<D: DomHost, T: Default>(
    caller: &mut Caller<'_, BridgeHostState<D>>,
    import: &'static str,
    result: BridgeResult<T>,
) -> wasmtime::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => match caller.data().error_policy {
            ErrorPolicy::Trap => {
                tracing::debug!(import, error = %err, "trapping guest call");
                Err(err.into())
            }
            ErrorPolicy::Report => {
                tracing::warn!(import, error = %err, "guest call failed");
                caller.data_mut().last_error = Some(err);
                Ok(T::default())
            }
        },
    }
}

fn link_error(name: &str, err: anyhow::Error) -> RuntimeError {
    RuntimeError::Instantiate(format!("Failed to define import {}: {}", name, err))
}

/// Define every bridge import under `module` in `linker`
pub fn add_to_linker<D>(
    linker: &mut Linker<BridgeHostState<D>>,
    module: &str,
) -> RuntimeResult<()>
where
    D: DomHost + Send + 'static,
    D::Node: Send,
{
    linker
        .func_wrap(
            module,
            IMPORT_CREATE_ELEMENT,
            |mut caller: Caller<'_, BridgeHostState<D>>, tag: u32| -> wasmtime::Result<u32> {
                let result = match read_guest_str(&mut caller, tag) {
                    Ok(tag) => caller.data_mut().bridge.create_element(&tag),
                    Err(err) => caller.data_mut().bridge.fail("create_element", err),
                }
                .map(Handle::as_raw);
                complete(&mut caller, IMPORT_CREATE_ELEMENT, result)
            },
        )
        .map_err(|e| link_error(IMPORT_CREATE_ELEMENT, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_CREATE_TEXT_NODE,
            |mut caller: Caller<'_, BridgeHostState<D>>, text: u32| -> wasmtime::Result<u32> {
                let result = match read_guest_str(&mut caller, text) {
                    Ok(text) => caller.data_mut().bridge.create_text_node(&text),
                    Err(err) => caller.data_mut().bridge.fail("create_text_node", err),
                }
                .map(Handle::as_raw);
                complete(&mut caller, IMPORT_CREATE_TEXT_NODE, result)
            },
        )
        .map_err(|e| link_error(IMPORT_CREATE_TEXT_NODE, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_APPEND_CHILD,
            |mut caller: Caller<'_, BridgeHostState<D>>, parent: u32, child: u32| -> wasmtime::Result<()> {
                let result = caller
                    .data_mut()
                    .bridge
                    .append_child(Handle::from_raw(parent), Handle::from_raw(child));
                complete(&mut caller, IMPORT_APPEND_CHILD, result)
            },
        )
        .map_err(|e| link_error(IMPORT_APPEND_CHILD, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_REMOVE_CHILD,
            |mut caller: Caller<'_, BridgeHostState<D>>, parent: u32, child: u32| -> wasmtime::Result<()> {
                let result = caller
                    .data_mut()
                    .bridge
                    .remove_child(Handle::from_raw(parent), Handle::from_raw(child));
                complete(&mut caller, IMPORT_REMOVE_CHILD, result)
            },
        )
        .map_err(|e| link_error(IMPORT_REMOVE_CHILD, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_REPLACE_CHILD,
            |mut caller: Caller<'_, BridgeHostState<D>>,
             parent: u32,
             new_child: u32,
             old_child: u32|
             -> wasmtime::Result<()> {
                let result = caller.data_mut().bridge.replace_child(
                    Handle::from_raw(parent),
                    Handle::from_raw(new_child),
                    Handle::from_raw(old_child),
                );
                complete(&mut caller, IMPORT_REPLACE_CHILD, result)
            },
        )
        .map_err(|e| link_error(IMPORT_REPLACE_CHILD, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_SET_PROPERTY,
            |mut caller: Caller<'_, BridgeHostState<D>>, handle: u32, key: u32, value: u32| -> wasmtime::Result<()> {
                let strings = read_guest_pair(&mut caller, key, value);
                let bridge = &mut caller.data_mut().bridge;
                let result = match strings {
                    Ok((key, value)) => bridge.set_property(Handle::from_raw(handle), &key, &value),
                    Err(err) => bridge.fail("set_property", err),
                };
                complete(&mut caller, IMPORT_SET_PROPERTY, result)
            },
        )
        .map_err(|e| link_error(IMPORT_SET_PROPERTY, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_SET_STYLE,
            |mut caller: Caller<'_, BridgeHostState<D>>, handle: u32, key: u32, value: u32| -> wasmtime::Result<()> {
                let strings = read_guest_pair(&mut caller, key, value);
                let bridge = &mut caller.data_mut().bridge;
                let result = match strings {
                    Ok((key, value)) => bridge.set_style(Handle::from_raw(handle), &key, &value),
                    Err(err) => bridge.fail("set_style", err),
                };
                complete(&mut caller, IMPORT_SET_STYLE, result)
            },
        )
        .map_err(|e| link_error(IMPORT_SET_STYLE, e))?;

    linker
        .func_wrap(
            module,
            IMPORT_RELEASE_NODE,
            |mut caller: Caller<'_, BridgeHostState<D>>, handle: u32| -> wasmtime::Result<()> {
                let result = caller
                    .data_mut()
                    .bridge
                    .release_node(Handle::from_raw(handle));
                complete(&mut caller, IMPORT_RELEASE_NODE, result)
            },
        )
        .map_err(|e| link_error(IMPORT_RELEASE_NODE, e))?;

    Ok(())
}
