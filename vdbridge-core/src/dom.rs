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

//! DOM capability set
//!
//! The bridge never touches a concrete document directly; it drives whatever
//! implements [`DomHost`]. [`crate::document::Document`] is the in-memory
//! implementation used by the runtime and tests.

use crate::error::BridgeResult;
use crate::property::{Property, StyleKey};

/// Host-side DOM primitives the bridge can invoke on behalf of a guest.
pub trait DomHost {
    /// Reference to a node owned by the host.
    type Node: Clone;

    fn create_element(&mut self, tag: &str) -> BridgeResult<Self::Node>;

    fn create_text_node(&mut self, text: &str) -> BridgeResult<Self::Node>;

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> BridgeResult<()>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> BridgeResult<()>;

    /// Put `new_child` where `old_child` currently sits under `parent`.
    fn replace_child(
        &mut self,
        parent: &Self::Node,
        new_child: &Self::Node,
        old_child: &Self::Node,
    ) -> BridgeResult<()>;

    fn set_property(&mut self, node: &Self::Node, property: Property, value: &str) -> BridgeResult<()>;

    /// Set an inline style declaration. An empty `value` removes it.
    fn set_style(&mut self, node: &Self::Node, key: &StyleKey, value: &str) -> BridgeResult<()>;

    /// Called after the guest releases the handle that referred to `node`.
    fn node_released(&mut self, _node: &Self::Node) {}
}
