//! Content document abstraction
//!
//! The observer only needs a small slice of the DOM: element lookup by
//! subtree, attributes, the live value of form controls and synthetic event
//! dispatch. `MemoryDocument` is a minimal tree implementing it.

use std::collections::BTreeMap;

/// Handle to an element of a content document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// DOM events the observer listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    Focus(NodeId),
    Blur(NodeId),
    Input(NodeId),
    /// A form element was submitted
    Submit(NodeId),
    /// Subtrees rooted at these nodes were inserted
    Mutation { inserted: Vec<NodeId> },
}

/// Events synthesized after a programmatic value write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    Input,
    Change,
    KeyDown,
    KeyUp,
}

pub trait ContentDocument {
    /// Current document URL
    fn url(&self) -> String;

    /// Attached `input` and `textarea` elements in document order, within the
    /// subtree of `root` (inclusive) or the whole document
    fn form_controls(&self, root: Option<NodeId>) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for detached or unknown nodes
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn value(&self, node: NodeId) -> String;

    fn set_value(&mut self, node: NodeId, value: &str);

    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent);

    /// Whether the node is still attached to the document
    fn contains(&self, node: NodeId) -> bool;
}

#[derive(Debug, Clone)]
struct MemoryNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
    dispatched: Vec<SyntheticEvent>,
}

/// In-memory content document
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    url: String,
    nodes: Vec<MemoryNode>,
}

impl MemoryDocument {
    pub fn new(url: impl Into<String>) -> Self {
        let body = MemoryNode {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            value: String::new(),
            parent: None,
            children: Vec::new(),
            attached: true,
            dispatched: Vec::new(),
        };
        Self {
            url: url.into(),
            nodes: vec![body],
        }
    }

    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Append an element under `parent`. Detached parents yield detached children.
    pub fn append(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = NodeId(self.nodes.len());
        let attached = self.nodes.get(parent.0).is_some_and(|p| p.attached);
        self.nodes.push(MemoryNode {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            value: String::new(),
            parent: Some(parent),
            children: Vec::new(),
            attached,
            dispatched: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    /// Append an `<input>` under `parent`
    pub fn append_input(&mut self, parent: NodeId, attributes: &[(&str, &str)]) -> NodeId {
        self.append(parent, "input", attributes)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Detach a node and its subtree
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(parent.0)
        {
            p.children.retain(|c| *c != node);
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(current.0) {
                n.attached = false;
                stack.extend(n.children.iter().copied());
            }
        }
    }

    /// Events synthesized on `node` so far
    pub fn dispatched(&self, node: NodeId) -> &[SyntheticEvent] {
        self.nodes
            .get(node.0)
            .map(|n| n.dispatched.as_slice())
            .unwrap_or(&[])
    }

    fn attached(&self, node: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(node.0).filter(|n| n.attached)
    }
}

impl ContentDocument for MemoryDocument {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn form_controls(&self, root: Option<NodeId>) -> Vec<NodeId> {
        let root = root.unwrap_or(self.body());
        if self.attached(root).is_none() {
            return Vec::new();
        }

        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current.0) else {
                continue;
            };
            if matches!(node.tag.as_str(), "input" | "textarea") {
                found.push(current);
            }
            // Reverse so the leftmost child is visited first
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.attached(node).map(|n| n.tag.as_str())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attached(node)
            .and_then(|n| n.attributes.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    fn value(&self, node: NodeId) -> String {
        self.attached(node)
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(n) = self.nodes.get_mut(node.0).filter(|n| n.attached) {
            n.value = value.to_string();
        }
    }

    fn dispatch(&mut self, node: NodeId, event: SyntheticEvent) {
        if let Some(n) = self.nodes.get_mut(node.0).filter(|n| n.attached) {
            n.dispatched.push(event);
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.attached(node).is_some()
    }
}

#[cfg(test)]
#[path = "dom_tests.rs"]
mod dom_tests;
