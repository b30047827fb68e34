// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Node id to element map kept coherent with DOM domain events

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::model::HtmlElement;

/// What a DOM event did to the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomChange {
    /// Not a DOM mutation event
    None,
    /// A node (or its subtree) changed
    Node,
    /// The whole document was replaced
    Document,
}

#[derive(Default)]
struct Inner {
    root: Option<i64>,
    elements: HashMap<i64, HtmlElement>,
    parents: HashMap<i64, i64>,
    generation: u64,
}

/// Cached element snapshots by node id
///
/// Mutation handlers take the write lock, so DOM events for one tab are
/// applied one at a time.
#[derive(Default)]
pub struct ElementMap {
    inner: RwLock<Inner>,
}

impl ElementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<i64> {
        self.inner.read().root
    }

    /// Drop everything and start a new document generation
    pub fn reset(&self, root: Option<i64>) {
        let mut inner = self.inner.write();
        inner.elements.clear();
        inner.parents.clear();
        inner.root = root;
        inner.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn get(&self, node_id: i64) -> Option<HtmlElement> {
        self.inner.read().elements.get(&node_id).cloned()
    }

    pub fn insert(&self, element: HtmlElement) {
        self.inner.write().elements.insert(element.node_id, element);
    }

    pub fn set_parent(&self, node_id: i64, parent_id: i64) {
        self.inner.write().parents.insert(node_id, parent_id);
    }

    pub fn len(&self) -> usize {
        self.inner.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a `DOM.*` event
    pub fn apply_event(&self, method: &str, params: &Value) -> DomChange {
        let node = |key: &str| params.get(key).and_then(|v| v.as_i64());
        match method {
            "DOM.documentUpdated" => {
                self.reset(None);
                DomChange::Document
            }
            "DOM.attributeModified" => {
                if let (Some(id), Some(name)) = (node("nodeId"), params.get("name").and_then(|v| v.as_str())) {
                    let value = params
                        .get("value")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    let mut inner = self.inner.write();
                    if let Some(el) = inner.elements.get_mut(&id) {
                        el.attributes.insert(name.to_string(), value);
                        el.hidden = el.compute_hidden();
                    }
                }
                DomChange::Node
            }
            "DOM.attributeRemoved" => {
                if let (Some(id), Some(name)) = (node("nodeId"), params.get("name").and_then(|v| v.as_str())) {
                    let mut inner = self.inner.write();
                    if let Some(el) = inner.elements.get_mut(&id) {
                        el.attributes.remove(name);
                        el.hidden = el.compute_hidden();
                    }
                }
                DomChange::Node
            }
            "DOM.characterDataModified" => {
                // text belongs to the parent element snapshot
                if let Some(id) = node("nodeId") {
                    let mut inner = self.inner.write();
                    if let Some(parent) = inner.parents.get(&id).copied() {
                        inner.elements.remove(&parent);
                    }
                }
                DomChange::Node
            }
            "DOM.childNodeInserted" => {
                if let Some(parent) = node("parentNodeId") {
                    let mut inner = self.inner.write();
                    inner.elements.remove(&parent);
                    if let Some(child) = params.get("node").and_then(|n| n.get("nodeId")).and_then(|v| v.as_i64()) {
                        inner.parents.insert(child, parent);
                    }
                }
                DomChange::Node
            }
            "DOM.childNodeRemoved" => {
                let mut inner = self.inner.write();
                if let Some(id) = node("nodeId") {
                    inner.elements.remove(&id);
                    inner.parents.remove(&id);
                }
                if let Some(parent) = node("parentNodeId") {
                    inner.elements.remove(&parent);
                }
                DomChange::Node
            }
            "DOM.childNodeCountUpdated" => {
                if let Some(id) = node("nodeId") {
                    self.inner.write().elements.remove(&id);
                }
                DomChange::Node
            }
            "DOM.setChildNodes" => {
                if let (Some(parent), Some(nodes)) = (node("parentId"), params.get("nodes").and_then(|v| v.as_array())) {
                    let mut inner = self.inner.write();
                    for n in nodes {
                        if let Some(id) = n.get("nodeId").and_then(|v| v.as_i64()) {
                            inner.parents.insert(id, parent);
                        }
                    }
                }
                DomChange::Node
            }
            "DOM.nodeUpdated" | "DOM.distributedNodesUpdated" | "DOM.pseudoElementAdded"
            | "DOM.pseudoElementRemoved" | "DOM.shadowRootPushed" | "DOM.shadowRootPopped" => {
                if let Some(id) = node("nodeId").or_else(|| node("hostId")).or_else(|| node("parentId")) {
                    self.inner.write().elements.remove(&id);
                }
                DomChange::Node
            }
            "DOM.inlineStyleInvalidated" => {
                if let Some(ids) = params.get("nodeIds").and_then(|v| v.as_array()) {
                    let mut inner = self.inner.write();
                    for id in ids.iter().filter_map(|v| v.as_i64()) {
                        inner.elements.remove(&id);
                    }
                }
                DomChange::Node
            }
            _ => DomChange::None,
        }
    }
}

/// Build an element snapshot from the element-info script result
pub fn element_from_info(node_id: i64, info: &Value) -> Option<HtmlElement> {
    let tag = info.get("tag")?.as_str()?;
    let mut el = HtmlElement::new(tag);
    if let Some(attrs) = info.get("attributes").and_then(|a| a.as_object()) {
        for (name, value) in attrs {
            el.attributes
                .insert(name.clone(), value.as_str().unwrap_or("").to_string());
        }
    }
    el.text = info
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let rendered_hidden = info.get("hidden").and_then(|v| v.as_bool()).unwrap_or(false);
    el.hidden = rendered_hidden || el.compute_hidden();
    el.node_id = node_id;
    Some(el)
}
