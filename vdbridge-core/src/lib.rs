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

//! vdbridge core
//!
//! Lets a sandboxed guest that can only pass integers manipulate host DOM
//! nodes. Nodes are registered in a [`ResourceTable`] and the guest refers to
//! them through opaque [`Handle`]s that are validated on every call and
//! recycled after release.
//!
//! # Example
//!
//! ```rust
//! use vdbridge_core::{Document, VdBridge};
//!
//! let mut bridge = VdBridge::new(Document::new());
//! let div = bridge.create_element("div").unwrap();
//! let text = bridge.create_text_node("Hello world").unwrap();
//! bridge.set_property(div, "id", "abc").unwrap();
//! bridge.append_child(div, text).unwrap();
//!
//! let node = *bridge.get_resource(div).unwrap();
//! assert_eq!(bridge.dom().outer_html(node), r#"<div id="abc">Hello world</div>"#);
//! ```

pub mod bridge;
pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod property;

// Re-exports
pub use bridge::VdBridge;
pub use config::BridgeConfig;
pub use document::{Document, DomMutation, NodeData, NodeId, NodeKind};
pub use dom::DomHost;
pub use error::{BridgeError, BridgeResult};
pub use handle::{Handle, Issued, ResourceTable};
pub use metrics::BridgeMetrics;
pub use property::{Property, StyleKey};
