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

//! In-memory document
//!
//! Arena-backed node tree implementing [`DomHost`] with the same structural
//! rules a browser enforces: appending an attached node moves it, removal and
//! replacement require the child to belong to the parent, text nodes have no
//! children and a node can never become its own ancestor.
//!
//! With the journal enabled, every successful mutation is appended to it so
//! callers can assert exactly what a guest did to the tree. Nodes that no
//! handle refers to and that hang off no parent are dropped and their ids
//! reused, so a guest that keeps creating and releasing nodes runs in bounded
//! memory.

use crate::dom::DomHost;
use crate::error::{BridgeError, BridgeResult};
use crate::property::{Property, StyleKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Elements that never have a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Identifier of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        properties: BTreeMap<Property, String>,
        style: BTreeMap<StyleKey, String>,
    },
    Text(String),
}

/// A node and its position in the tree
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Set when no guest handle refers to the node anymore
    pub released: bool,
}

/// A recorded change to the document
///
/// Node ids are reused once a node has been dropped, so an id in an older
/// entry may name a different node than the document holds today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomMutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    AppendChild { parent: NodeId, child: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
    ReplaceChild { parent: NodeId, new_child: NodeId, old_child: NodeId },
    SetProperty { node: NodeId, property: Property, value: String },
    SetStyle { node: NodeId, key: String, value: String },
    Released { node: NodeId },
}

/// Arena-backed DOM tree
///
/// A node is dropped once it is released and has no parent. Its released
/// descendants go with it; descendants still referenced by a handle are
/// detached and kept.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Option<NodeData>>,
    /// Ids of dropped nodes, reused before the arena grows
    free_ids: Vec<NodeId>,
    live: usize,
    record_journal: bool,
    journal: Vec<DomMutation>,
}

impl Document {
    /// Create an empty document that keeps no journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document, recording mutations when `enabled`
    pub fn with_journal(enabled: bool) -> Self {
        Self {
            record_journal: enabled,
            ..Self::default()
        }
    }

    pub fn journal_enabled(&self) -> bool {
        self.record_journal
    }

    /// Number of nodes currently held
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Tag name if `id` is an element
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Character data if `id` is a text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn property(&self, id: NodeId, property: Property) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { properties, .. } => properties.get(&property).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Inline style value; `key` may be camelCase or kebab-case
    pub fn style(&self, id: NodeId, key: &str) -> Option<&str> {
        let key = StyleKey::parse(key).ok()?;
        match &self.node(id)?.kind {
            NodeKind::Element { style, .. } => style.get(&key).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Concatenated text of `id` and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(node) = self.node(id) {
            match &node.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => {
                    for child in &node.children {
                        self.collect_text(*child, out);
                    }
                }
            }
        }
    }

    /// Recorded mutations; empty unless the journal is enabled
    pub fn journal(&self) -> &[DomMutation] {
        &self.journal
    }

    /// Drain the journal, leaving it empty
    pub fn take_journal(&mut self) -> Vec<DomMutation> {
        std::mem::take(&mut self.journal)
    }

    fn record(&mut self, mutation: DomMutation) {
        if self.record_journal {
            self.journal.push(mutation);
        }
    }

    /// Serialize `id` and its subtree as HTML
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };

        match &node.kind {
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Element {
                tag,
                properties,
                style,
            } => {
                out.push('<');
                out.push_str(tag);

                for (property, value) in properties {
                    let Some(attr) = property.attribute_name() else {
                        continue;
                    };
                    if property.is_boolean() {
                        if !value.is_empty() {
                            out.push(' ');
                            out.push_str(attr);
                        }
                        continue;
                    }
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }

                if !style.is_empty() {
                    let decls: Vec<String> =
                        style.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                    out.push_str(" style=\"");
                    escape_into(&decls.join("; "), true, out);
                    out.push('"');
                }

                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn push_node(&mut self, kind: NodeKind, released: bool) -> BridgeResult<NodeId> {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            released,
        };

        let id = match self.free_ids.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(data);
                id
            }
            None => {
                let raw = u32::try_from(self.nodes.len())
                    .map_err(|_| BridgeError::CapacityExceeded("document".to_string()))?;
                self.nodes.push(Some(data));
                NodeId(raw)
            }
        };
        self.live += 1;
        Ok(id)
    }

    /// Drop `id` if it is released and detached, along with its released
    /// descendants
    fn reclaim(&mut self, id: NodeId) {
        match self.node(id) {
            Some(node) if node.released && node.parent.is_none() => {}
            _ => return,
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(data) = self.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            self.live -= 1;
            self.free_ids.push(current);

            for child in data.children {
                if let Some(child_data) = self.node_mut(child) {
                    child_data.parent = None;
                    if child_data.released {
                        pending.push(child);
                    }
                }
            }
        }
    }

    fn checked(&self, id: NodeId) -> BridgeResult<&NodeData> {
        self.node(id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    fn require_element(&self, id: NodeId) -> BridgeResult<()> {
        match self.checked(id)?.kind {
            NodeKind::Element { .. } => Ok(()),
            NodeKind::Text(_) => Err(BridgeError::HierarchyRequest(format!(
                "{} is a text node and cannot have children",
                id
            ))),
        }
    }

    /// Fails if inserting `child` under `parent` would create a cycle
    fn check_insertion(&self, parent: NodeId, child: NodeId) -> BridgeResult<()> {
        self.require_element(parent)?;
        self.checked(child)?;

        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(BridgeError::HierarchyRequest(format!(
                    "{} is an ancestor of {}",
                    child, parent
                )));
            }
            cursor = self.parent(current);
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        let old_parent = self.node_mut(id).and_then(|n| n.parent.take());
        if let Some(parent) = old_parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(data) = self.node_mut(parent) {
            data.children.push(child);
        }
        if let Some(data) = self.node_mut(child) {
            data.parent = Some(parent);
        }
    }

    fn clear_children(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Some(data) => std::mem::take(&mut data.children),
            None => return,
        };
        for child in children {
            if let Some(data) = self.node_mut(child) {
                data.parent = None;
            }
            self.reclaim(child);
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

fn valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl DomHost for Document {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> BridgeResult<NodeId> {
        if !valid_tag_name(tag) {
            return Err(BridgeError::InvalidTagName(tag.to_string()));
        }
        let tag = tag.to_ascii_lowercase();
        let node = self.push_node(
            NodeKind::Element {
                tag: tag.clone(),
                properties: BTreeMap::new(),
                style: BTreeMap::new(),
            },
            false,
        )?;
        self.record(DomMutation::CreateElement { node, tag });
        Ok(node)
    }

    fn create_text_node(&mut self, text: &str) -> BridgeResult<NodeId> {
        let node = self.push_node(NodeKind::Text(text.to_string()), false)?;
        self.record(DomMutation::CreateText {
            node,
            text: text.to_string(),
        });
        Ok(node)
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> BridgeResult<()> {
        let (parent, child) = (*parent, *child);
        self.check_insertion(parent, child)?;

        self.detach(child);
        self.link(parent, child);
        self.record(DomMutation::AppendChild { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> BridgeResult<()> {
        let (parent, child) = (*parent, *child);
        self.checked(parent)?;
        if self.checked(child)?.parent != Some(parent) {
            return Err(BridgeError::NotFound(format!(
                "{} is not a child of {}",
                child, parent
            )));
        }

        self.detach(child);
        self.record(DomMutation::RemoveChild { parent, child });
        self.reclaim(child);
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: &NodeId,
        new_child: &NodeId,
        old_child: &NodeId,
    ) -> BridgeResult<()> {
        let (parent, new_child, old_child) = (*parent, *new_child, *old_child);
        if self.checked(old_child)?.parent != Some(parent) {
            return Err(BridgeError::NotFound(format!(
                "{} is not a child of {}",
                old_child, parent
            )));
        }
        self.check_insertion(parent, new_child)?;

        if new_child != old_child {
            self.detach(new_child);
            if let Some(data) = self.node_mut(parent) {
                if let Some(slot) = data.children.iter_mut().find(|c| **c == old_child) {
                    *slot = new_child;
                }
            }
            if let Some(data) = self.node_mut(old_child) {
                data.parent = None;
            }
            if let Some(data) = self.node_mut(new_child) {
                data.parent = Some(parent);
            }
        }

        self.record(DomMutation::ReplaceChild {
            parent,
            new_child,
            old_child,
        });
        if new_child != old_child {
            self.reclaim(old_child);
        }
        Ok(())
    }

    fn set_property(&mut self, node: &NodeId, property: Property, value: &str) -> BridgeResult<()> {
        let node = *node;
        let is_text = matches!(self.checked(node)?.kind, NodeKind::Text(_));

        match (property, is_text) {
            (Property::TextContent, true) => {
                if let Some(data) = self.node_mut(node) {
                    data.kind = NodeKind::Text(value.to_string());
                }
            }
            (Property::TextContent, false) => {
                self.clear_children(node);
                if !value.is_empty() {
                    // No handle ever refers to this node.
                    let text = self.push_node(NodeKind::Text(value.to_string()), true)?;
                    self.link(node, text);
                }
            }
            (other, true) => {
                return Err(BridgeError::Unsupported(format!(
                    "cannot set {} on text node {}",
                    other, node
                )));
            }
            (other, false) => {
                if let Some(NodeData {
                    kind: NodeKind::Element { properties, .. },
                    ..
                }) = self.node_mut(node)
                {
                    properties.insert(other, value.to_string());
                }
            }
        }

        self.record(DomMutation::SetProperty {
            node,
            property,
            value: value.to_string(),
        });
        Ok(())
    }

    fn set_style(&mut self, node: &NodeId, key: &StyleKey, value: &str) -> BridgeResult<()> {
        let node = *node;
        match &mut self
            .node_mut(node)
            .ok_or_else(|| BridgeError::NotFound(node.to_string()))?
            .kind
        {
            NodeKind::Element { style, .. } => {
                if value.is_empty() {
                    style.remove(key);
                } else {
                    style.insert(key.clone(), value.to_string());
                }
            }
            NodeKind::Text(_) => {
                return Err(BridgeError::Unsupported(format!(
                    "text node {} has no style",
                    node
                )));
            }
        }

        self.record(DomMutation::SetStyle {
            node,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn node_released(&mut self, node: &NodeId) {
        let node = *node;
        if let Some(data) = self.node_mut(node) {
            data.released = true;
            self.record(DomMutation::Released { node });
            self.reclaim(node);
        }
    }
}
