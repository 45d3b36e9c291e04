//! The rendering collaborator contract.
//!
//! The core never builds live nodes itself. A `LiveDom` renders the scene
//! graph's current tree, tags every mounted node with its element id
//! (`data-scena-element-id`) and lets the core read and write attributes,
//! text, markup, layout and style on a node by handle.
//!
//! `MemoryDom` is an in-process implementation used by tests and headless
//! tooling.

use crate::frame::{LayoutBox, StyleSnapshot};
use crate::id::{DATA_ID_ATTR, ElementId, Handle};
use crate::registry::SceneGraph;
use std::collections::{BTreeMap, HashMap, HashSet};

pub trait LiveDom {
    /// Mount (or re-mount) the graph's tree in document order.
    fn render_tree(&mut self, graph: &SceneGraph);

    /// Resolve an element id to its mounted node.
    fn query(&self, id: ElementId) -> Option<Handle>;

    /// Read the id attribute back from a node.
    fn id_of(&self, handle: Handle) -> Option<ElementId>;

    fn attributes(&self, handle: Handle) -> Vec<(String, String)>;

    fn set_attribute(&mut self, handle: Handle, name: &str, value: &str);

    fn text(&self, handle: Handle) -> Option<String>;

    fn set_text(&mut self, handle: Handle, text: &str);

    fn markup(&self, handle: Handle) -> Option<String>;

    fn set_markup(&mut self, handle: Handle, html: &str);

    fn layout(&self, handle: Handle) -> Option<LayoutBox>;

    fn apply_style(&mut self, handle: Handle, style: &StyleSnapshot);
}

// ─── In-memory host ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryNode {
    pub id: Option<ElementId>,
    pub tag: String,
    pub scope: Option<ElementId>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub markup: String,
    pub style: Option<StyleSnapshot>,
}

/// Keeps one node per element id. A node whose scope changed between two
/// renders is re-mounted under a fresh handle, like a keyed re-render does.
#[derive(Debug, Default)]
pub struct MemoryDom {
    next_handle: u64,
    handles: HashMap<ElementId, Handle>,
    nodes: HashMap<Handle, MemoryNode>,
    layouts: HashMap<ElementId, LayoutBox>,
    order: Vec<Handle>,
    renders: usize,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout the host will report for `id` once mounted.
    pub fn set_layout(&mut self, id: ElementId, layout: LayoutBox) {
        self.layouts.insert(id, layout);
    }

    pub fn node(&self, handle: Handle) -> Option<&MemoryNode> {
        self.nodes.get(&handle)
    }

    /// Mounted handles in document order, as of the last render.
    pub fn mounted(&self) -> &[Handle] {
        &self.order
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }

    fn mint(&mut self) -> Handle {
        self.next_handle += 1;
        Handle::new(self.next_handle)
    }
}

impl LiveDom for MemoryDom {
    fn render_tree(&mut self, graph: &SceneGraph) {
        self.renders += 1;
        let mut order = Vec::new();
        let mut live = HashMap::new();

        for id in graph.walk() {
            let Ok(record) = graph.get_by_id(id) else {
                continue;
            };
            let existing = self
                .handles
                .get(&id)
                .copied()
                .and_then(|h| self.nodes.remove(&h).map(|node| (h, node)));

            let (handle, mut node) = match existing {
                Some((h, node)) if node.scope == record.scope => (h, node),
                Some((_, node)) => (self.mint(), node),
                None => (self.mint(), MemoryNode::default()),
            };
            node.id = Some(id);
            node.scope = record.scope;
            node.tag = record.content.reference().to_string();
            node.attrs
                .insert(DATA_ID_ATTR.to_string(), id.as_str().to_string());

            live.insert(id, handle);
            self.nodes.insert(handle, node);
            order.push(handle);
        }

        // Unmount whatever the tree no longer holds.
        let mounted: HashSet<Handle> = order.iter().copied().collect();
        self.nodes.retain(|h, _| mounted.contains(h));
        self.handles = live;
        self.order = order;
        log::trace!("memory dom rendered {} nodes", self.order.len());
    }

    fn query(&self, id: ElementId) -> Option<Handle> {
        self.handles.get(&id).copied()
    }

    fn id_of(&self, handle: Handle) -> Option<ElementId> {
        let value = self.nodes.get(&handle)?.attrs.get(DATA_ID_ATTR)?;
        Some(ElementId::intern(value))
    }

    fn attributes(&self, handle: Handle) -> Vec<(String, String)> {
        self.nodes
            .get(&handle)
            .map(|n| {
                n.attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_attribute(&mut self, handle: Handle, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn text(&self, handle: Handle) -> Option<String> {
        self.nodes.get(&handle).map(|n| n.text.clone())
    }

    fn set_text(&mut self, handle: Handle, text: &str) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.text = text.to_string();
        }
    }

    fn markup(&self, handle: Handle) -> Option<String> {
        self.nodes.get(&handle).map(|n| n.markup.clone())
    }

    fn set_markup(&mut self, handle: Handle, html: &str) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.markup = html.to_string();
        }
    }

    fn layout(&self, handle: Handle) -> Option<LayoutBox> {
        let id = self.nodes.get(&handle)?.id?;
        self.layouts.get(&id).copied()
    }

    fn apply_style(&mut self, handle: Handle, style: &StyleSnapshot) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.style = Some(style.clone());
            node.attrs.insert("style".to_string(), style.to_css_text());
        }
    }
}
