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

//! The bridge between guest handles and host DOM nodes
//!
//! [`VdBridge`] owns the handle table and the DOM it drives. Each operation
//! resolves every handle argument before touching the DOM, so a call that
//! names an invalid handle fails without side effects.

use crate::config::BridgeConfig;
use crate::dom::DomHost;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, Issued, ResourceTable};
use crate::metrics::BridgeMetrics;
use crate::property::{Property, StyleKey};

/// Handle table plus the DOM it exposes to one guest instance
pub struct VdBridge<D: DomHost> {
    dom: D,
    table: ResourceTable<D::Node>,
    config: BridgeConfig,
    metrics: BridgeMetrics,
}

impl<D: DomHost> VdBridge<D> {
    /// Create a bridge over `dom` with default limits
    pub fn new(dom: D) -> Self {
        Self::with_config(dom, BridgeConfig::default())
    }

    pub fn with_config(dom: D, config: BridgeConfig) -> Self {
        Self {
            dom,
            table: ResourceTable::with_limit(config.initial_capacity, config.max_handles),
            config,
            metrics: BridgeMetrics::new(),
        }
    }

    /// Register a host node and hand out a handle for it
    pub fn add_resource(&mut self, node: D::Node) -> BridgeResult<Handle> {
        let (handle, issued) = self.table.add_tracked(node)?;
        match issued {
            Issued::Minted => self.metrics.handles_minted += 1,
            Issued::Recycled => self.metrics.handles_recycled += 1,
        }
        Ok(handle)
    }

    /// Resolve a handle to the node registered under it
    pub fn get_resource(&self, handle: Handle) -> BridgeResult<&D::Node> {
        self.table.get(handle)
    }

    /// Forget a handle and queue it for reuse
    pub fn release_resource(&mut self, handle: Handle) -> BridgeResult<D::Node> {
        let node = self.table.release(handle)?;
        self.metrics.handles_released += 1;
        Ok(node)
    }

    pub fn create_element(&mut self, tag: &str) -> BridgeResult<Handle> {
        let result = self
            .dom
            .create_element(tag)
            .and_then(|node| self.register(node));
        self.finish("create_element", result)
    }

    pub fn create_text_node(&mut self, text: &str) -> BridgeResult<Handle> {
        let result = self
            .dom
            .create_text_node(text)
            .and_then(|node| self.register(node));
        self.finish("create_text_node", result)
    }

    pub fn append_child(&mut self, parent: Handle, child: Handle) -> BridgeResult<()> {
        let result = (|| -> BridgeResult<()> {
            let parent = self.table.get(parent)?;
            let child = self.table.get(child)?;
            self.dom.append_child(parent, child)
        })();
        self.finish("append_child", result)
    }

    pub fn remove_child(&mut self, parent: Handle, child: Handle) -> BridgeResult<()> {
        let result = (|| -> BridgeResult<()> {
            let parent = self.table.get(parent)?;
            let child = self.table.get(child)?;
            self.dom.remove_child(parent, child)
        })();
        self.finish("remove_child", result)
    }

    pub fn replace_child(
        &mut self,
        parent: Handle,
        new_child: Handle,
        old_child: Handle,
    ) -> BridgeResult<()> {
        let result = (|| -> BridgeResult<()> {
            let parent = self.table.get(parent)?;
            let new_child = self.table.get(new_child)?;
            let old_child = self.table.get(old_child)?;
            self.dom.replace_child(parent, new_child, old_child)
        })();
        self.finish("replace_child", result)
    }

    /// Set an allow-listed property; unknown names fail before any lookup
    pub fn set_property(&mut self, handle: Handle, key: &str, value: &str) -> BridgeResult<()> {
        let result = (|| -> BridgeResult<()> {
            let property: Property = key.parse()?;
            let node = self.table.get(handle)?;
            self.dom.set_property(node, property, value)
        })();
        self.finish("set_property", result)
    }

    pub fn set_style(&mut self, handle: Handle, key: &str, value: &str) -> BridgeResult<()> {
        let result = (|| -> BridgeResult<()> {
            let key = StyleKey::parse(key)?;
            let node = self.table.get(handle)?;
            self.dom.set_style(node, &key, value)
        })();
        self.finish("set_style", result)
    }

    pub fn release_node(&mut self, handle: Handle) -> BridgeResult<()> {
        let result = self.release_resource(handle).map(|node| {
            self.dom.node_released(&node);
        });
        self.finish("release_node", result)
    }

    /// Hand out a handle for a freshly created node. If the table is full
    /// the node is reported released so the host can drop it.
    fn register(&mut self, node: D::Node) -> BridgeResult<Handle> {
        self.add_resource(node.clone()).map_err(|err| {
            self.dom.node_released(&node);
            err
        })
    }

    /// Count a call that failed before it reached the bridge, such as an
    /// argument that could not be decoded
    pub fn fail<T>(&mut self, op: &'static str, err: BridgeError) -> BridgeResult<T> {
        self.finish(op, Err(err))
    }

    fn finish<T>(&mut self, op: &'static str, result: BridgeResult<T>) -> BridgeResult<T> {
        self.metrics.record_host_call();
        if let Err(e) = &result {
            self.metrics.record_error();
            tracing::debug!(op, error = %e, "bridge call failed");
        }
        result
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn table(&self) -> &ResourceTable<D::Node> {
        &self.table
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    /// Tear down the bridge, returning the DOM it drove
    pub fn into_dom(self) -> D {
        self.dom
    }
}
