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

//! Loaded guest context

use super::host_functions::BridgeHostState;
use super::memory::read_c_string;
use crate::error::{RuntimeError, RuntimeResult};
use vdbridge_core::{BridgeError, BridgeMetrics, Document, DomHost, Handle, VdBridge};
use wasmtime::{Instance, Memory, Store};

/// A live guest instance together with its memory and bridge
pub struct LoadedModule<D: DomHost> {
    store: Store<BridgeHostState<D>>,
    instance: Instance,
    memory: Memory,
}

impl<D> LoadedModule<D>
where
    D: DomHost + Send + 'static,
    D::Node: Send,
{
    pub(crate) fn new(store: Store<BridgeHostState<D>>, instance: Instance, memory: Memory) -> Self {
        Self {
            store,
            instance,
            memory,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Current size of guest memory in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    pub fn bridge(&self) -> &VdBridge<D> {
        &self.store.data().bridge
    }

    pub fn bridge_mut(&mut self) -> &mut VdBridge<D> {
        &mut self.store.data_mut().bridge
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        self.bridge().metrics()
    }

    /// Last error swallowed under the `report` error policy
    pub fn last_error(&self) -> Option<&BridgeError> {
        self.store.data().last_error()
    }

    pub fn take_last_error(&mut self) -> Option<BridgeError> {
        self.store.data_mut().take_last_error()
    }

    /// Decode a zero-terminated string from guest memory
    pub fn read_string(&self, ptr: u32) -> RuntimeResult<String> {
        let max_len = self.bridge().config().max_string_len;
        Ok(read_c_string(self.memory.data(&self.store), ptr, max_len)?)
    }

    /// Resolve a handle returned by the guest
    pub fn resolve(&self, handle: Handle) -> RuntimeResult<&D::Node> {
        Ok(self.bridge().get_resource(handle)?)
    }

    /// Call an export of type `() -> i32` whose result is a handle
    pub async fn call_handle_export(&mut self, name: &str) -> RuntimeResult<Handle> {
        let func = self
            .instance
            .get_typed_func::<(), u32>(&mut self.store, name)
            .map_err(|e| RuntimeError::MissingExport(format!("{}: {}", name, e)))?;

        tracing::debug!(export = name, "calling guest export");
        let raw = func
            .call_async(&mut self.store, ())
            .await
            .map_err(RuntimeError::from_call)?;
        Ok(Handle::from_raw(raw))
    }

    /// Call an export of type `() -> ()`
    pub async fn call_void_export(&mut self, name: &str) -> RuntimeResult<()> {
        let func = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, name)
            .map_err(|e| RuntimeError::MissingExport(format!("{}: {}", name, e)))?;

        tracing::debug!(export = name, "calling guest export");
        func.call_async(&mut self.store, ())
            .await
            .map_err(RuntimeError::from_call)
    }

    /// Fuel left in the store, when metering is enabled
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    pub fn store(&self) -> &Store<BridgeHostState<D>> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<BridgeHostState<D>> {
        &mut self.store
    }

    /// Drop the instance and keep the bridge
    pub fn into_bridge(self) -> VdBridge<D> {
        self.store.into_data().bridge
    }
}

impl LoadedModule<Document> {
    /// Serialize the subtree behind `handle` as HTML
    pub fn render_html(&self, handle: Handle) -> RuntimeResult<String> {
        let node = *self.resolve(handle)?;
        Ok(self.bridge().dom().outer_html(node))
    }
}
