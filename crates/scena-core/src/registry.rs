//! The scene graph: every registered element, its scope and its ordered
//! children.
//!
//! Records live in a `StableDiGraph` arena with parent→child edges; the
//! sibling order (paint order within a scope) is kept per parent in
//! `child_order`. All traversals are explicit worklists over the arena, so
//! deep scenes never recurse on the call stack.

use crate::dom::LiveDom;
use crate::error::{Batch, Result, SceneError};
use crate::frame::FrameCapture;
use crate::id::{DATA_ID_ATTR, ElementId, Handle};
use crate::model::{Content, ContentSnapshot, ElementRecord, ElementSpec};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where an element sits: its scope and its index among that scope's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub scope: ElementId,
    pub index: usize,
}

/// Result of `append`: top-level ids in insertion order, plus the frame
/// properties of every registered element (pre-order) for seeding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Appended {
    pub ids: Vec<ElementId>,
    pub frames: Vec<(ElementId, FrameCapture)>,
}

/// A removed subtree and where it used to be.
#[derive(Debug, Clone, PartialEq)]
pub struct Detached {
    pub spec: ElementSpec,
    pub placement: Placement,
}

/// One element of a move batch. `index` is taken after the element has
/// left its old scope; `None` appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSpec {
    pub id: ElementId,
    pub scope: ElementId,
    pub index: Option<usize>,
}

impl MoveSpec {
    pub fn new(id: ElementId, scope: ElementId, index: Option<usize>) -> Self {
        Self { id, scope, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub id: ElementId,
    pub prev: Placement,
    pub next: Placement,
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub graph: StableDiGraph<ElementRecord, ()>,
    pub root: NodeIndex,
    id_index: HashMap<ElementId, NodeIndex>,
    handle_index: HashMap<Handle, ElementId>,
    /// Sibling order per parent. Authoritative over edge iteration order.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl SceneGraph {
    /// Create a graph holding only the root scope (`viewport`).
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root_id = ElementId::root();
        let root = graph.add_node(ElementRecord::new(root_id, Content::default()));

        let mut id_index = HashMap::new();
        id_index.insert(root_id, root);
        let mut child_order = HashMap::new();
        child_order.insert(root, Vec::new());

        Self {
            graph,
            root,
            id_index,
            handle_index: HashMap::new(),
            child_order,
        }
    }

    pub fn root_id(&self) -> ElementId {
        self.graph[self.root].id
    }

    /// Number of registered records, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.child_indices(self.root).is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.id_index.contains_key(&id)
    }

    fn index_of(&self, id: ElementId) -> Result<NodeIndex> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or(SceneError::id(id))
    }

    fn child_indices(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order
            .get(&idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    pub fn get_by_id(&self, id: ElementId) -> Result<&ElementRecord> {
        Ok(&self.graph[self.index_of(id)?])
    }

    pub fn get_by_id_mut(&mut self, id: ElementId) -> Result<&mut ElementRecord> {
        let idx = self.index_of(id)?;
        Ok(&mut self.graph[idx])
    }

    pub fn get_by_handle(&self, handle: Handle) -> Result<&ElementRecord> {
        self.get_by_id(self.id_of_handle(handle)?)
    }

    pub fn id_of_handle(&self, handle: Handle) -> Result<ElementId> {
        self.handle_index
            .get(&handle)
            .copied()
            .ok_or(SceneError::handle(handle))
    }

    /// The live handle of a mounted element.
    pub fn handle_of(&self, id: ElementId) -> Result<Handle> {
        self.get_by_id(id)?.handle.ok_or(SceneError::id(id))
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get_by_id(id).ok()?.scope
    }

    pub fn children(&self, id: ElementId) -> Result<Vec<ElementId>> {
        let idx = self.index_of(id)?;
        Ok(self
            .child_indices(idx)
            .iter()
            .map(|c| self.graph[*c].id)
            .collect())
    }

    pub fn is_leaf(&self, id: ElementId) -> bool {
        self.index_of(id)
            .map(|idx| self.child_indices(idx).is_empty())
            .unwrap_or(false)
    }

    pub fn index_in_scope(&self, id: ElementId) -> Result<usize> {
        let idx = self.index_of(id)?;
        let Some(parent) = self.parent_index(idx) else {
            return Ok(0);
        };
        self.child_indices(parent)
            .iter()
            .position(|c| *c == idx)
            .ok_or(SceneError::id(id))
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Sibling indices from the root down to `id`. The root's path is empty.
    pub fn index_path(&self, id: ElementId) -> Result<Vec<usize>> {
        let mut idx = self.index_of(id)?;
        let mut path = Vec::new();
        while let Some(parent) = self.parent_index(idx) {
            let pos = self
                .child_indices(parent)
                .iter()
                .position(|c| *c == idx)
                .ok_or(SceneError::id(id))?;
            path.push(pos);
            idx = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Sort by document position, dropping ids that are not registered.
    pub fn document_order(&self, ids: &[ElementId]) -> Vec<ElementId> {
        let mut keyed: Vec<(Vec<usize>, ElementId)> = ids
            .iter()
            .filter_map(|id| self.index_path(*id).ok().map(|p| (p, *id)))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.1 == b.1);
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    /// Check if `ancestor` is a parent/grandparent/etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: ElementId, descendant: ElementId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let Ok(mut idx) = self.index_of(descendant) else {
            return false;
        };
        while let Some(parent) = self.parent_index(idx) {
            if self.graph[parent].id == ancestor {
                return true;
            }
            idx = parent;
        }
        false
    }

    /// Ids strictly below `id`, pre-order.
    pub fn descendants(&self, id: ElementId) -> Result<Vec<ElementId>> {
        let idx = self.index_of(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.child_indices(idx).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(self.graph[next].id);
            stack.extend(self.child_indices(next).iter().rev());
        }
        Ok(out)
    }

    /// Every id, root first, in document order.
    pub fn walk(&self) -> Vec<ElementId> {
        let root = self.root_id();
        let mut out = vec![root];
        if let Ok(rest) = self.descendants(root) {
            out.extend(rest);
        }
        out
    }

    // ─── Linking ─────────────────────────────────────────────────────────

    /// Insert `child` under `parent` at `index` (clamped). Returns the index used.
    fn link(&mut self, parent: NodeIndex, child: NodeIndex, index: Option<usize>) -> usize {
        self.graph.add_edge(parent, child, ());
        let order = self.child_order.entry(parent).or_default();
        let at = index.map_or(order.len(), |i| i.min(order.len()));
        order.insert(at, child);
        let parent_id = self.graph[parent].id;
        self.graph[child].scope = Some(parent_id);
        at
    }

    /// Detach `child` from its parent. Returns the parent and old index.
    fn unlink(&mut self, child: NodeIndex) -> Result<(NodeIndex, usize)> {
        let id = self.graph[child].id;
        let parent = self
            .parent_index(child)
            .ok_or(SceneError::RootScope("detached"))?;
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
        let order = self.child_order.entry(parent).or_default();
        let at = order
            .iter()
            .position(|c| *c == child)
            .ok_or(SceneError::id(id))?;
        order.remove(at);
        Ok((parent, at))
    }

    fn fresh_id(&self, wanted: Option<ElementId>) -> ElementId {
        match wanted {
            Some(id) if !self.id_index.contains_key(&id) => id,
            other => {
                if let Some(taken) = other {
                    log::debug!("id {taken} already registered, generating a new one");
                }
                loop {
                    let id = ElementId::generate();
                    if !self.id_index.contains_key(&id) {
                        break id;
                    }
                }
            }
        }
    }

    // ─── Structural operations ───────────────────────────────────────────

    /// Register `specs` (with their subtrees) under `scope` (default root) at
    /// `index` (default end). Parents are linked before their children, all
    /// within this call, so every id exists when it returns. Handles stay
    /// unset until the next mount.
    pub fn append(
        &mut self,
        specs: Vec<ElementSpec>,
        index: Option<usize>,
        scope: Option<ElementId>,
    ) -> Result<Appended> {
        let scope_id = scope.unwrap_or_else(ElementId::root);
        let scope_idx = self.index_of(scope_id)?;
        let mut appended = Appended::default();

        let mut stack: Vec<(NodeIndex, ElementSpec, Option<usize>, bool)> = specs
            .into_iter()
            .enumerate()
            .rev()
            .map(|(i, spec)| (scope_idx, spec, index.map(|at| at + i), true))
            .collect();

        while let Some((parent, mut spec, at, top_level)) = stack.pop() {
            let id = self.fresh_id(spec.id);
            let children = std::mem::take(&mut spec.children);
            let parent_id = self.graph[parent].id;

            let idx = self
                .graph
                .add_node(ElementRecord::from_spec(id, &spec, parent_id));
            self.id_index.insert(id, idx);
            self.child_order.insert(idx, Vec::new());
            self.link(parent, idx, at);

            appended.frames.push((id, spec.frame_capture()));
            if top_level {
                appended.ids.push(id);
            }
            for child in children.into_iter().rev() {
                stack.push((idx, child, None, false));
            }
        }

        log::debug!(
            "appended {} elements ({} top-level) into {scope_id}",
            appended.frames.len(),
            appended.ids.len()
        );
        Ok(appended)
    }

    /// Remove each subtree, capturing a detached copy first. With a live
    /// host, leaf snapshots are re-read from the mounted nodes.
    pub fn remove(&mut self, ids: &[ElementId], dom: Option<&dyn LiveDom>) -> Batch<Detached> {
        let mut batch = Batch::new();
        for &id in ids {
            batch.push(self.remove_one(id, dom));
        }
        batch
    }

    fn remove_one(&mut self, id: ElementId, dom: Option<&dyn LiveDom>) -> Result<Detached> {
        if id.is_root() {
            return Err(SceneError::RootScope("removed"));
        }
        let idx = self.index_of(id)?;
        let spec = self.capture_subtree(id, dom)?;
        let doomed = self.descendants(id)?;
        let (parent, index) = self.unlink(idx)?;

        for gone in doomed.into_iter().chain(std::iter::once(id)) {
            let Some(gone_idx) = self.id_index.remove(&gone) else {
                continue;
            };
            self.child_order.remove(&gone_idx);
            if let Some(record) = self.graph.remove_node(gone_idx)
                && let Some(handle) = record.handle
            {
                self.handle_index.remove(&handle);
            }
        }

        let scope = self.graph[parent].id;
        log::debug!("removed {id} from {scope} at {index}");
        Ok(Detached {
            spec,
            placement: Placement { scope, index },
        })
    }

    /// Re-parent each element. Cycles and the root are rejected per element;
    /// earlier moves in the batch stay committed.
    pub fn move_batch(&mut self, moves: &[MoveSpec]) -> Batch<MoveRecord> {
        let mut batch = Batch::new();
        for mv in moves {
            batch.push(self.move_one(*mv));
        }
        batch
    }

    fn move_one(&mut self, mv: MoveSpec) -> Result<MoveRecord> {
        if mv.id.is_root() {
            return Err(SceneError::RootScope("moved"));
        }
        let idx = self.index_of(mv.id)?;
        let scope_idx = self.index_of(mv.scope)?;
        if mv.scope == mv.id || self.is_ancestor_of(mv.id, mv.scope) {
            return Err(SceneError::CyclicMove {
                id: mv.id,
                scope: mv.scope,
            });
        }

        let (old_parent, old_index) = self.unlink(idx)?;
        let new_index = self.link(scope_idx, idx, mv.index);
        let record = MoveRecord {
            id: mv.id,
            prev: Placement {
                scope: self.graph[old_parent].id,
                index: old_index,
            },
            next: Placement {
                scope: mv.scope,
                index: new_index,
            },
        };
        log::debug!(
            "moved {} from {}[{}] to {}[{}]",
            record.id,
            record.prev.scope,
            record.prev.index,
            record.next.scope,
            record.next.index
        );
        Ok(record)
    }

    /// Detached copy of the subtree rooted at `id`, ids included.
    pub fn capture_subtree(&self, id: ElementId, dom: Option<&dyn LiveDom>) -> Result<ElementSpec> {
        let top = self.index_of(id)?;
        let mut preorder = vec![top];
        let mut stack: Vec<NodeIndex> = self.child_indices(top).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            preorder.push(next);
            stack.extend(self.child_indices(next).iter().rev());
        }

        // Children come after their parent in pre-order, so building in
        // reverse always finds them ready.
        let mut built: HashMap<NodeIndex, ElementSpec> = HashMap::new();
        for idx in preorder.into_iter().rev() {
            let record = &self.graph[idx];
            let children = self
                .child_indices(idx)
                .iter()
                .filter_map(|c| built.remove(c))
                .collect::<Vec<_>>();
            let snapshot = if children.is_empty() {
                live_snapshot(record, dom)
            } else {
                ContentSnapshot::None
            };
            built.insert(
                idx,
                ElementSpec {
                    id: Some(record.id),
                    name: record.name.clone(),
                    content: record.content.clone(),
                    attrs: record.attrs.clone(),
                    snapshot,
                    frame: Vec::new(),
                    z_order: 0,
                    children,
                },
            );
        }
        built.remove(&top).ok_or(SceneError::id(id))
    }

    // ─── Handles ─────────────────────────────────────────────────────────

    pub fn attach_handle(&mut self, id: ElementId, handle: Handle) -> Result<()> {
        let idx = self.index_of(id)?;
        if let Some(old) = self.graph[idx].handle.replace(handle)
            && old != handle
        {
            self.handle_index.remove(&old);
        }
        self.handle_index.insert(handle, id);
        Ok(())
    }

    pub fn detach_handle(&mut self, id: ElementId) -> Result<Option<Handle>> {
        let idx = self.index_of(id)?;
        let old = self.graph[idx].handle.take();
        if let Some(handle) = old {
            self.handle_index.remove(&handle);
        }
        Ok(old)
    }

    /// Ask the host to render the current tree, then resolve every record to
    /// its live node and sync content. Records the host did not mount lose
    /// their handle.
    pub fn remount(&mut self, dom: &mut dyn LiveDom) -> Batch<ElementId> {
        dom.render_tree(self);
        let ids = self.walk();
        for &id in &ids {
            if dom.query(id).is_none() {
                let _ = self.detach_handle(id);
            }
        }
        self.rebuild_content_from_live_handles(&ids, dom)
    }

    /// For mounted elements: attach the live handle, re-apply stored attrs,
    /// re-read the attrs, and push the stored text/markup snapshot to the
    /// node, or seed the snapshot from the node when none is stored yet.
    pub fn rebuild_content_from_live_handles(
        &mut self,
        ids: &[ElementId],
        dom: &mut dyn LiveDom,
    ) -> Batch<ElementId> {
        let mut batch = Batch::new();
        for &id in ids {
            batch.push(self.rebuild_one(id, dom).map(|()| id));
        }
        batch
    }

    fn rebuild_one(&mut self, id: ElementId, dom: &mut dyn LiveDom) -> Result<()> {
        let handle = dom.query(id).ok_or(SceneError::id(id))?;
        if dom.id_of(handle) != Some(id) {
            log::warn!("node {handle} does not carry the id of {id}");
            return Err(SceneError::handle(handle));
        }
        self.attach_handle(id, handle)?;
        let leaf = !id.is_root() && self.is_leaf(id);
        let record = self.get_by_id_mut(id)?;

        for (name, value) in &record.attrs {
            dom.set_attribute(handle, name, value);
        }
        record.attrs = dom
            .attributes(handle)
            .into_iter()
            .filter(|(name, _)| name != DATA_ID_ATTR && name != "style")
            .collect::<BTreeMap<_, _>>();

        if !leaf {
            return Ok(());
        }
        let stored = record.snapshot.clone();
        match (&record.content, stored) {
            (Content::Plain { .. }, ContentSnapshot::Text(text)) => dom.set_text(handle, &text),
            (Content::Plain { .. }, _) => {
                if let Some(text) = dom.text(handle) {
                    record.snapshot = ContentSnapshot::Text(text);
                }
            }
            (Content::Markup { .. }, ContentSnapshot::Html(html)) => dom.set_markup(handle, &html),
            (Content::Markup { .. }, _) => {
                if let Some(html) = dom.markup(handle) {
                    record.snapshot = ContentSnapshot::Html(html);
                }
            }
            (Content::Component { .. }, _) => {}
        }
        Ok(())
    }

    // ─── Integrity ───────────────────────────────────────────────────────

    /// Every structural problem found, empty when the graph is consistent.
    pub fn check_integrity(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id_index.len() != self.graph.node_count() {
            problems.push(format!(
                "id index has {} entries for {} records",
                self.id_index.len(),
                self.graph.node_count()
            ));
        }

        for idx in self.graph.node_indices() {
            let record = &self.graph[idx];
            if self.id_index.get(&record.id) != Some(&idx) {
                problems.push(format!("{} is not indexed", record.id));
            }
            let parents: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .collect();
            if idx == self.root {
                if !parents.is_empty() || record.scope.is_some() {
                    problems.push("root has a parent".to_string());
                }
                continue;
            }
            let [parent] = parents.as_slice() else {
                problems.push(format!("{} has {} parents", record.id, parents.len()));
                continue;
            };
            if record.scope != Some(self.graph[*parent].id) {
                problems.push(format!("{} scope does not match its parent", record.id));
            }
            let listed = self
                .child_indices(*parent)
                .iter()
                .filter(|c| **c == idx)
                .count();
            if listed != 1 {
                problems.push(format!("{} listed {listed} times in its scope", record.id));
            }
        }

        for (parent, order) in &self.child_order {
            let unique: HashSet<&NodeIndex> = order.iter().collect();
            if unique.len() != order.len() {
                problems.push(format!("duplicate children under {}", self.graph[*parent].id));
            }
            let edges = self
                .graph
                .neighbors_directed(*parent, Direction::Outgoing)
                .count();
            if edges != order.len() {
                problems.push(format!(
                    "{} has {edges} edges but {} ordered children",
                    self.graph[*parent].id,
                    order.len()
                ));
            }
        }

        for (handle, id) in &self.handle_index {
            if self.get_by_id(*id).ok().and_then(|r| r.handle) != Some(*handle) {
                problems.push(format!("stale handle {handle} for {id}"));
            }
        }
        problems
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// The snapshot a detached leaf should carry: live content when mounted,
/// otherwise whatever the record already holds.
fn live_snapshot(record: &ElementRecord, dom: Option<&dyn LiveDom>) -> ContentSnapshot {
    let live = dom.zip(record.handle);
    match &record.content {
        Content::Plain { .. } => live
            .and_then(|(dom, h)| dom.text(h))
            .map(ContentSnapshot::Text)
            .unwrap_or_else(|| record.snapshot.clone()),
        Content::Markup { .. } => live
            .and_then(|(dom, h)| dom.markup(h))
            .map(ContentSnapshot::Html)
            .unwrap_or_else(|| record.snapshot.clone()),
        Content::Component { .. } => ContentSnapshot::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use pretty_assertions::assert_eq;

    fn three(graph: &mut SceneGraph) -> Vec<ElementId> {
        graph
            .append(
                vec![
                    ElementSpec::plain("h1").with_text("a"),
                    ElementSpec::plain("p").with_text("b"),
                    ElementSpec::markup("img").with_attr("src", "c.png"),
                ],
                None,
                None,
            )
            .unwrap()
            .ids
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        assert_eq!(graph.children(graph.root_id()).unwrap(), ids);
        assert!(graph.check_integrity().is_empty());
    }

    #[test]
    fn append_at_index_inserts_consecutively() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let new = graph
            .append(
                vec![ElementSpec::markup("hr"), ElementSpec::markup("br")],
                Some(1),
                None,
            )
            .unwrap()
            .ids;
        assert_eq!(
            graph.children(graph.root_id()).unwrap(),
            vec![ids[0], new[0], new[1], ids[1], ids[2]]
        );
    }

    #[test]
    fn append_nested_registers_whole_subtree() {
        let mut graph = SceneGraph::new();
        let appended = graph
            .append(
                vec![ElementSpec::markup("section")
                    .with_frame("width", "200px")
                    .with_child(ElementSpec::plain("h2"))
                    .with_child(ElementSpec::markup("div").with_child(ElementSpec::plain("span")))],
                None,
                None,
            )
            .unwrap();
        assert_eq!(appended.ids.len(), 1);
        assert_eq!(appended.frames.len(), 4);
        let section = appended.ids[0];
        assert_eq!(graph.descendants(section).unwrap().len(), 3);
        assert_eq!(
            appended.frames[0].1.properties,
            vec![("width".to_string(), "200px".to_string())]
        );
        let span = graph.descendants(section).unwrap()[2];
        assert_eq!(graph.index_path(span).unwrap(), vec![0, 1, 0]);
        assert!(graph.check_integrity().is_empty());
    }

    #[test]
    fn taken_ids_are_regenerated() {
        let mut graph = SceneGraph::new();
        let first = graph
            .append(vec![ElementSpec::plain("p").with_id("dup")], None, None)
            .unwrap()
            .ids[0];
        let second = graph
            .append(vec![ElementSpec::plain("p").with_id("dup")], None, None)
            .unwrap()
            .ids[0];
        assert_eq!(first.as_str(), "dup");
        assert_ne!(first, second);
        let root = graph
            .append(vec![ElementSpec::plain("p").with_id("viewport")], None, None)
            .unwrap()
            .ids[0];
        assert!(!root.is_root());
    }

    #[test]
    fn append_into_unknown_scope_fails() {
        let mut graph = SceneGraph::new();
        let err = graph
            .append(
                vec![ElementSpec::plain("p")],
                None,
                Some(ElementId::intern("nowhere")),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn remove_captures_subtree_and_placement() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let group = graph
            .append(
                vec![ElementSpec::markup("div").with_child(ElementSpec::plain("p").with_text("x"))],
                None,
                Some(ids[1]),
            )
            .unwrap()
            .ids[0];

        let batch = graph.remove(&[ids[1]], None);
        assert!(batch.is_clean());
        let detached = &batch.ok[0];
        assert_eq!(
            detached.placement,
            Placement {
                scope: graph.root_id(),
                index: 1
            }
        );
        assert_eq!(detached.spec.children.len(), 1);
        assert_eq!(detached.spec.children[0].id, Some(group));
        assert!(!graph.contains(group));
        assert_eq!(graph.len(), 3);
        assert!(graph.check_integrity().is_empty());
    }

    #[test]
    fn remove_reads_live_content() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let mut dom = MemoryDom::new();
        assert!(graph.remount(&mut dom).is_clean());
        let h = graph.handle_of(ids[0]).unwrap();
        dom.set_text(h, "edited");

        let batch = graph.remove(&[ids[0]], Some(&dom));
        assert_eq!(
            batch.ok[0].spec.snapshot,
            ContentSnapshot::Text("edited".to_string())
        );
        assert!(graph.get_by_handle(h).is_err());
    }

    #[test]
    fn remove_root_and_missing_are_isolated() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let batch = graph.remove(&[graph.root_id(), ElementId::intern("ghost"), ids[2]], None);
        assert_eq!(batch.ok.len(), 1);
        assert_eq!(batch.failed.len(), 2);
        assert_eq!(batch.failed[0], SceneError::RootScope("removed"));
        assert_eq!(graph.children(graph.root_id()).unwrap(), ids[..2].to_vec());
    }

    #[test]
    fn move_reports_both_placements() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let batch = graph.move_batch(&[MoveSpec::new(ids[2], ids[0], None)]);
        assert_eq!(
            batch.ok,
            vec![MoveRecord {
                id: ids[2],
                prev: Placement {
                    scope: graph.root_id(),
                    index: 2
                },
                next: Placement {
                    scope: ids[0],
                    index: 0
                },
            }]
        );
        assert_eq!(graph.parent(ids[2]), Some(ids[0]));
        assert!(graph.check_integrity().is_empty());
    }

    #[test]
    fn move_into_own_subtree_is_rejected() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        graph.move_batch(&[MoveSpec::new(ids[1], ids[0], None)]);
        let batch = graph.move_batch(&[
            MoveSpec::new(ids[0], ids[1], None),
            MoveSpec::new(ids[0], ids[0], None),
            MoveSpec::new(graph.root_id(), ids[2], None),
            MoveSpec::new(ids[2], ids[0], Some(0)),
        ]);
        assert_eq!(batch.failed.len(), 3);
        assert!(matches!(batch.failed[0], SceneError::CyclicMove { .. }));
        assert_eq!(graph.children(ids[0]).unwrap(), vec![ids[2], ids[1]]);
        assert!(graph.check_integrity().is_empty());
    }

    #[test]
    fn document_order_sorts_by_path() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let nested = graph
            .append(vec![ElementSpec::plain("b")], None, Some(ids[0]))
            .unwrap()
            .ids[0];
        let ghost = ElementId::intern("ghost");
        let sorted = graph.document_order(&[ids[2], nested, ids[1], ghost, ids[0]]);
        assert_eq!(sorted, vec![ids[0], nested, ids[1], ids[2]]);
        assert!(graph.is_ancestor_of(ids[0], nested));
        assert!(!graph.is_ancestor_of(nested, ids[0]));
        assert!(graph.is_ancestor_of(graph.root_id(), nested));
    }

    #[test]
    fn rebuild_pushes_or_seeds_content() {
        let mut graph = SceneGraph::new();
        let appended = graph
            .append(
                vec![
                    ElementSpec::plain("p").with_text("stored").with_attr("class", "lead"),
                    ElementSpec::markup("figure"),
                    ElementSpec::component("Chart"),
                ],
                None,
                None,
            )
            .unwrap();
        let [p, figure, chart] = appended.ids[..] else {
            panic!("three ids");
        };
        let mut dom = MemoryDom::new();
        dom.render_tree(&graph);
        let fh = dom.query(figure).unwrap();
        dom.set_markup(fh, "<img src=\"a.png\">");
        dom.set_attribute(fh, "title", "declared");

        let batch = graph.rebuild_content_from_live_handles(&graph.walk(), &mut dom);
        assert!(batch.is_clean());

        let ph = graph.handle_of(p).unwrap();
        assert_eq!(dom.text(ph).as_deref(), Some("stored"));
        assert_eq!(dom.node(ph).unwrap().attrs.get("class").map(String::as_str), Some("lead"));
        let record = graph.get_by_id(figure).unwrap();
        assert_eq!(record.snapshot, ContentSnapshot::Html("<img src=\"a.png\">".to_string()));
        assert_eq!(record.attrs.get("title").map(String::as_str), Some("declared"));
        assert!(!record.attrs.contains_key(DATA_ID_ATTR));
        assert_eq!(graph.get_by_id(chart).unwrap().snapshot, ContentSnapshot::None);
        assert_eq!(graph.get_by_handle(fh).unwrap().id, figure);
    }

    #[test]
    fn node_tagged_with_another_id_is_not_attached() {
        let mut graph = SceneGraph::new();
        let ids = three(&mut graph);
        let mut dom = MemoryDom::new();
        dom.render_tree(&graph);
        let wrong = dom.query(ids[1]).unwrap();
        dom.set_attribute(wrong, DATA_ID_ATTR, ids[0].as_str());

        let batch = graph.rebuild_content_from_live_handles(&graph.walk(), &mut dom);
        assert_eq!(batch.failed, vec![SceneError::handle(wrong)]);
        assert_eq!(graph.get_by_id(ids[1]).unwrap().handle, None);
        assert!(graph.handle_of(ids[0]).is_ok());
    }
}
