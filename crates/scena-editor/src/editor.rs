//! The editor orchestrator.
//!
//! `Editor` owns the scene graph, the frame store and the rendering host for
//! one editing session, and drives the interaction widgets through the
//! contracts in [`crate::host`]. Structural changes follow one sequence:
//!
//! 1. commit the change to the scene graph (source of truth for existence),
//! 2. re-mount through the host and move frames onto the fresh handles,
//! 3. seed, recompute or render frames,
//! 4. settle: wait for embedded media, then commit the new selection.
//!
//! Batches are processed element by element; a failure skips that element
//! and leaves everything committed before it in place.

use crate::config::{AppendSelection, EditorConfig};
use crate::gesture::{self, GestureEvent, GestureSession};
use crate::history::{FrameChange, HistoryEntry, HistoryHook, HistoryRecorder};
use crate::host::{
    DetachedManipulator, ImmediatePicker, Manipulator, ManipulatorConfig, MediaLoader, NoMedia,
    Picker,
};
use crate::selection::SelectionController;
use crate::tools::{self, ClickAction, DragDecision, DragStart, ToolKind};
use futures::future::{BoxFuture, join_all};
use scena_core::persist::{self, SavedScene};
use scena_core::{
    Batch, Camera, CoordinateSpace, Detached, ElementId, ElementSpec, FrameCapture, FrameStore,
    Handle, LiveDom, MoveRecord, MoveSpec, Result, SceneError, SceneGraph, Vec2,
};
use std::collections::HashMap;

/// The interaction widgets an editor talks to.
pub struct Collaborators {
    pub picker: Box<dyn Picker>,
    pub manipulator: Box<dyn Manipulator>,
    pub media: Box<dyn MediaLoader>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            picker: Box::new(ImmediatePicker::default()),
            manipulator: Box::new(DetachedManipulator::default()),
            media: Box::new(NoMedia),
        }
    }
}

/// A committed structural change waiting to settle.
///
/// The media wait does not borrow the editor, so other operations may run
/// while it is pending. Elements removed in the meantime are skipped when
/// the settle completes.
pub struct PendingSettle {
    ids: Vec<ElementId>,
    policy: AppendSelection,
    media: Option<BoxFuture<'static, ()>>,
}

impl PendingSettle {
    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    /// Resolves once every element's media has loaded.
    pub async fn media_ready(&mut self) {
        if let Some(wait) = self.media.take() {
            wait.await;
        }
    }
}

pub struct Editor<D: LiveDom> {
    graph: SceneGraph,
    frames: FrameStore,
    dom: D,
    picker: Box<dyn Picker>,
    manipulator: Box<dyn Manipulator>,
    media: Box<dyn MediaLoader>,
    selection: SelectionController,
    camera: Camera,
    tool: ToolKind,
    config: EditorConfig,
    history: HistoryRecorder,
    hooks: Vec<Box<dyn HistoryHook>>,
    gesture: Option<GestureSession>,
    manipulator_config: ManipulatorConfig,
}

impl<D: LiveDom> Editor<D> {
    /// Start a session: mount the root scope and give it a frame.
    pub fn new(config: EditorConfig, dom: D, collaborators: Collaborators) -> Self {
        let mut editor = Self {
            graph: SceneGraph::new(),
            frames: FrameStore::new(),
            dom,
            picker: collaborators.picker,
            manipulator: collaborators.manipulator,
            media: collaborators.media,
            selection: SelectionController::new(),
            camera: Camera {
                zoom: config.initial_zoom,
                scroll: Vec2::ZERO,
            },
            tool: config.initial_tool,
            history: HistoryRecorder::new(config.history_depth),
            config,
            hooks: Vec::new(),
            gesture: None,
            manipulator_config: ManipulatorConfig::default(),
        };
        editor.mount();
        let root = editor.graph.root_id();
        match editor.graph.handle_of(root) {
            Ok(h) => {
                if let Err(err) = editor.frames.create_frame(h, &[]) {
                    log::warn!("root frame: {err}");
                }
                editor.render_handle(h);
            }
            Err(err) => log::warn!("root scope not mounted: {err}"),
        }
        editor.refresh_manipulator();
        editor
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn selection(&self) -> &[Handle] {
        self.selection.current()
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    /// The configuration last pushed to the manipulation overlay.
    pub fn manipulator_config(&self) -> &ManipulatorConfig {
        &self.manipulator_config
    }

    pub fn add_history_hook(&mut self, hook: Box<dyn HistoryHook>) {
        self.hooks.push(hook);
    }

    /// Live handle of a mounted element.
    pub fn handle_of(&self, id: ElementId) -> Result<Handle> {
        self.graph.handle_of(id)
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Commit a new selection: picker first, then frame targets, then the
    /// manipulation overlay.
    pub async fn select(&mut self, candidates: &[Handle]) -> Vec<Handle> {
        let selected = self
            .selection
            .select(
                &self.graph,
                &mut self.frames,
                self.picker.as_mut(),
                candidates,
            )
            .await;
        self.refresh_manipulator();
        selected
    }

    fn selection_ids(&self) -> Vec<ElementId> {
        self.selection
            .current()
            .iter()
            .filter_map(|h| self.graph.id_of_handle(*h).ok())
            .collect()
    }

    /// Push selection, guidelines, scale and tool flags to the overlay.
    pub fn refresh_manipulator(&mut self) {
        let targets = self.selection.current().to_vec();
        let guidelines = self
            .graph
            .walk()
            .into_iter()
            .filter_map(|id| self.graph.handle_of(id).ok())
            .filter(|h| !targets.contains(h))
            .collect();
        let rotation_target = if targets.is_empty() {
            self.graph.handle_of(self.graph.root_id()).ok()
        } else {
            None
        };
        let deletable = self.config.delete_button && !targets.is_empty();
        let config = ManipulatorConfig {
            keep_ratio: targets.len() > 1,
            targets,
            guidelines,
            scale: if self.camera.zoom > 0.0 {
                1.0 / self.camera.zoom
            } else {
                1.0
            },
            clippable: self.tool.clippable(),
            text_mode: self.tool.text_mode(),
            deletable,
            rotation_target,
        };
        self.manipulator.configure(&config);
        self.manipulator_config = config;
    }

    // ─── Mounting ────────────────────────────────────────────────────────

    /// Re-render through the host, move frames onto re-minted handles,
    /// refresh measured layouts and drop frames of unmounted nodes. Hosts
    /// never hand one element's old handle to another within a render.
    fn mount(&mut self) -> Batch<ElementId> {
        let before: HashMap<ElementId, Handle> = self
            .graph
            .walk()
            .into_iter()
            .filter_map(|id| self.graph.handle_of(id).ok().map(|h| (id, h)))
            .collect();

        let batch = self.graph.remount(&mut self.dom);

        for id in self.graph.walk() {
            let Ok(handle) = self.graph.handle_of(id) else {
                continue;
            };
            if let Some(old) = before.get(&id).copied()
                && old != handle
                && self.frames.has_frame(old)
            {
                if let Err(err) = self.frames.rekey(old, handle) {
                    log::warn!("rekey {id}: {err}");
                }
                self.render_handle(handle);
            }
            if let Some(layout) = self.dom.layout(handle) {
                self.frames.set_layout(handle, layout);
            }
        }

        let stale: Vec<Handle> = self
            .frames
            .handles()
            .filter(|h| self.graph.get_by_handle(*h).is_err())
            .collect();
        for h in stale {
            let _ = self.frames.remove_frame(h);
        }
        self.selection.retain_live(&self.graph);
        batch
    }

    /// Render one frame and apply its snapshot to the live node.
    fn render_handle(&mut self, handle: Handle) {
        match self.frames.render(handle) {
            Ok(style) => self.dom.apply_style(handle, &style),
            Err(err) => log::warn!("render {handle}: {err}"),
        }
    }

    /// Re-render every frame; the applied snapshots are unchanged unless a
    /// frame was mutated.
    pub fn render_all(&mut self) {
        let handles: Vec<Handle> = self.frames.handles().collect();
        for h in handles {
            self.render_handle(h);
        }
    }

    fn record(&mut self, entry: HistoryEntry) {
        for hook in &mut self.hooks {
            hook.record(entry.clone());
        }
        self.history.record(entry);
    }

    // ─── Append ──────────────────────────────────────────────────────────

    /// Where an anchored append lands: right after the last selected
    /// element in document order, inside its scope. Root end otherwise.
    fn insertion_point(&self, use_selection_anchor: bool) -> (Option<ElementId>, Option<usize>) {
        if !use_selection_anchor {
            return (None, None);
        }
        let ordered = self.graph.document_order(&self.selection_ids());
        let Some(last) = ordered.last().copied() else {
            return (None, None);
        };
        match (self.graph.parent(last), self.graph.index_in_scope(last)) {
            (Some(scope), Ok(index)) => (Some(scope), Some(index + 1)),
            _ => (None, None),
        }
    }

    /// Commit an append and seed frames. Selection happens in [`settle`].
    ///
    /// [`settle`]: Editor::settle
    pub fn begin_append(
        &mut self,
        specs: Vec<ElementSpec>,
        use_selection_anchor: bool,
    ) -> Result<PendingSettle> {
        let prev_selection = self.selection_ids();
        let (scope, index) = self.insertion_point(use_selection_anchor);
        let appended = self.graph.append(specs, index, scope)?;
        self.mount();
        self.seed_frames(&appended.frames);

        self.record(HistoryEntry::Append {
            ids: appended.ids.clone(),
            prev_selection,
        });
        Ok(self.pending(appended.ids, self.config.append_selection))
    }

    fn seed_frames(&mut self, captures: &[(ElementId, FrameCapture)]) {
        for (id, capture) in captures {
            let handle = match self.graph.handle_of(*id) {
                Ok(h) => h,
                Err(err) => {
                    log::warn!("no frame for unmounted element: {err}");
                    continue;
                }
            };
            match self.frames.create_frame(handle, &capture.properties) {
                Ok(frame) => frame.set_z_order(capture.z_order),
                Err(err) => {
                    log::warn!("frame for {id}: {err}");
                    continue;
                }
            }
            self.render_handle(handle);
        }
    }

    fn pending(&self, ids: Vec<ElementId>, policy: AppendSelection) -> PendingSettle {
        let media = self.config.wait_for_media.then(|| {
            let waits: Vec<BoxFuture<'static, ()>> = ids
                .iter()
                .filter_map(|id| self.graph.handle_of(*id).ok())
                .map(|h| self.media.wait_loaded(h))
                .collect();
            let all: BoxFuture<'static, ()> = Box::pin(async move {
                join_all(waits).await;
            });
            all
        });
        PendingSettle { ids, policy, media }
    }

    /// Wait for media, then select whatever of the change is still mounted.
    pub async fn settle(&mut self, mut pending: PendingSettle) -> Vec<Handle> {
        pending.media_ready().await;
        let live: Vec<Handle> = pending
            .ids
            .iter()
            .filter_map(|id| self.graph.handle_of(*id).ok())
            .collect();
        if live.len() < pending.ids.len() {
            log::debug!(
                "{} settled elements are gone",
                pending.ids.len() - live.len()
            );
        }
        let candidates = match pending.policy {
            AppendSelection::First => live.into_iter().take(1).collect(),
            AppendSelection::All => live,
        };
        self.select(&candidates).await
    }

    /// Append and settle. Returns the handles of the top-level appended
    /// elements.
    pub async fn append_elements(
        &mut self,
        specs: Vec<ElementSpec>,
        use_selection_anchor: bool,
    ) -> Result<Vec<Handle>> {
        let pending = self.begin_append(specs, use_selection_anchor)?;
        let ids = pending.ids.clone();
        self.settle(pending).await;
        Ok(ids
            .iter()
            .filter_map(|id| self.graph.handle_of(*id).ok())
            .collect())
    }

    // ─── Remove ──────────────────────────────────────────────────────────

    /// Remove the top-most of `handles` with their subtrees. Each detached
    /// spec carries the captured frames of its subtree.
    pub async fn remove_elements(&mut self, handles: &[Handle]) -> Batch<Detached> {
        let prev_selection = self.selection_ids();
        let mut result = Batch::new();
        let mut ids = Vec::new();
        for h in handles {
            match self.graph.id_of_handle(*h) {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(err) => result.push(Err(err)),
            }
        }
        let top: Vec<ElementId> = ids
            .iter()
            .copied()
            .filter(|id| !ids.iter().any(|other| self.graph.is_ancestor_of(*other, *id)))
            .collect();
        let ordered = self.graph.document_order(&top);

        let mut captured: HashMap<ElementId, (Handle, FrameCapture)> = HashMap::new();
        for id in &ordered {
            let descendants = self.graph.descendants(*id).unwrap_or_default();
            let subtree = std::iter::once(*id).chain(descendants);
            for member in subtree {
                if let Ok(h) = self.graph.handle_of(member)
                    && let Ok(frame) = self.frames.get_frame(h)
                {
                    captured.insert(member, (h, frame.capture()));
                }
            }
        }

        let removed = self.graph.remove(&ordered, Some(&self.dom));
        result.failed.extend(removed.failed);
        for mut detached in removed.ok {
            detached.spec.walk_mut(|spec| {
                if let Some((_, capture)) = spec.id.and_then(|id| captured.get(&id)) {
                    spec.frame = capture.properties.clone();
                    spec.z_order = capture.z_order;
                }
            });
            result.ok.push(detached);
        }
        for (id, (h, _)) in &captured {
            if !self.graph.contains(*id) {
                let _ = self.frames.remove_frame(*h);
            }
        }

        // Nothing committed: the scene and the selection stay as they were.
        let Some(last) = result.ok.last() else {
            return result;
        };
        let next = self.next_after_removal(last);
        self.mount();

        self.record(HistoryEntry::Remove {
            removed: result.ok.clone(),
            prev_selection,
        });
        let candidates: Vec<Handle> = next
            .and_then(|id| self.graph.handle_of(id).ok())
            .into_iter()
            .collect();
        self.select(&candidates).await;
        result
    }

    /// Delete-button press on the overlay: remove the current selection.
    pub async fn remove_selected(&mut self) -> Batch<Detached> {
        let targets = self.selection.current().to_vec();
        if targets.is_empty() {
            return Batch::new();
        }
        self.remove_elements(&targets).await
    }

    /// The sibling now at the removed element's index, else the scope's last
    /// child, else the scope itself. An emptied root selects nothing.
    fn next_after_removal(&self, removed: &Detached) -> Option<ElementId> {
        let scope = removed.placement.scope;
        let children = self.graph.children(scope).ok()?;
        if let Some(next) = children.get(removed.placement.index) {
            return Some(*next);
        }
        if let Some(last) = children.last() {
            return Some(*last);
        }
        (!scope.is_root()).then_some(scope)
    }

    // ─── Move ────────────────────────────────────────────────────────────

    /// Re-parent elements without moving them on screen. Each element's
    /// transform is rebased into its new scope before it is committed; a
    /// non-invertible target space drops that element and keeps it where
    /// it was.
    pub async fn move_elements(&mut self, moves: &[MoveSpec]) -> Batch<MoveRecord> {
        let mut result = Batch::new();
        let mut changes = Vec::new();

        for mv in moves {
            let handle = self.graph.handle_of(mv.id).ok();
            let before = handle.and_then(|h| self.frames.get_frame(h).ok().map(|f| f.capture()));
            // Reordering within a scope keeps the coordinate space.
            let matrix = if self.graph.parent(mv.id) == Some(mv.scope) {
                None
            } else {
                let rebased = CoordinateSpace::new(&self.graph, &self.frames, self.camera)
                    .rebase_for_move(mv.id, mv.scope);
                match rebased {
                    Ok(matrix) => Some(matrix),
                    Err(SceneError::Singular) => {
                        result.push(Err(SceneError::Singular));
                        continue;
                    }
                    Err(err) => {
                        log::debug!("moving {} without rebase: {err}", mv.id);
                        None
                    }
                }
            };

            let mut committed = self.graph.move_batch(std::slice::from_ref(mv));
            let Some(record) = committed.ok.pop() else {
                result.failed.extend(committed.failed);
                continue;
            };
            // Frames are still keyed by the pre-mount handle here.
            if let (Some(h), Some(matrix), Some(before)) = (handle, matrix, before)
                && self.frames.set_move_matrix(h, &matrix).is_ok()
                && let Ok(frame) = self.frames.get_frame(h)
            {
                changes.push(FrameChange {
                    id: mv.id,
                    before,
                    after: frame.capture(),
                });
            }
            result.ok.push(record);
        }

        if result.ok.is_empty() {
            return result;
        }
        self.mount();
        for record in &result.ok {
            if let Ok(h) = self.graph.handle_of(record.id) {
                self.render_handle(h);
            }
        }

        self.record(HistoryEntry::Move {
            moves: result.ok.clone(),
            changes,
        });
        let ids = result.ok.iter().map(|r| r.id).collect();
        let pending = self.pending(ids, AppendSelection::All);
        self.settle(pending).await;
        result
    }

    // ─── Picking and tools ───────────────────────────────────────────────

    /// Drag-start from the picking widget. Returns whether the rubber band
    /// may proceed.
    pub async fn on_drag_start(&mut self, start: &DragStart) -> DragDecision {
        let decision = tools::decide_drag_start(self.tool, &self.graph, start);
        if let DragDecision::StopAndSelect(h) = decision {
            if !self.selection.current().contains(&h) {
                self.select(&[h]).await;
            }
            return DragDecision::Stop;
        }
        decision
    }

    /// Selection-end from the picking widget.
    pub async fn on_select_end(&mut self, candidates: &[Handle]) -> Vec<Handle> {
        self.select(candidates).await
    }

    /// Click on the manipulation overlay.
    pub async fn on_click(&mut self, target: Option<Handle>, double: bool) -> ClickAction {
        let action = tools::route_click(&self.graph, target, double);
        if let ClickAction::EditText(h) = action {
            self.tool = ToolKind::Text;
            self.select(&[h]).await;
        }
        action
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.tool != tool {
            log::debug!("tool {:?} -> {tool:?}", self.tool);
            self.tool = tool;
            self.refresh_manipulator();
        }
    }

    /// Camera update from the pan/zoom widget.
    pub fn set_camera(&mut self, zoom: f64, scroll: Vec2) {
        self.camera = Camera { zoom, scroll };
        self.refresh_manipulator();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.set_camera(zoom, self.camera.scroll);
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    /// Targets of a gesture: the selection, or the viewport when nothing is
    /// selected and the gesture is a rotation.
    fn gesture_targets(&self, rotating: bool) -> Vec<Handle> {
        if !self.selection.is_empty() {
            return self.selection.current().to_vec();
        }
        if rotating {
            return self.graph.handle_of(self.graph.root_id()).into_iter().collect();
        }
        Vec::new()
    }

    pub fn gesture_start(&mut self, rotating: bool) {
        let targets = self.gesture_targets(rotating);
        self.gesture = Some(GestureSession::start(&self.frames, &targets));
    }

    /// One update callback. Changed frames are rendered right away.
    pub fn gesture_update(&mut self, event: &GestureEvent) -> Batch<Handle> {
        let targets = match &self.gesture {
            Some(session) => session.targets(),
            None => self.gesture_targets(matches!(event, GestureEvent::Rotate { .. })),
        };
        let batch = gesture::apply(&mut self.frames, &targets, event);
        for h in &batch.ok {
            self.render_handle(*h);
        }
        batch
    }

    /// Close the gesture, recording one history entry if anything changed.
    pub fn gesture_end(&mut self) -> bool {
        let Some(session) = self.gesture.take() else {
            return false;
        };
        match session.finish(&self.graph, &self.frames) {
            Some(entry) => {
                self.record(entry);
                true
            }
            None => false,
        }
    }

    // ─── Session ─────────────────────────────────────────────────────────

    pub fn save(&self) -> Result<SavedScene> {
        persist::save(&self.graph, &self.frames, Some(&self.dom))
    }

    /// Replace the root scope's content with a saved scene. Every element
    /// gets a fresh id.
    pub async fn load(&mut self, scene: SavedScene) -> Result<Vec<Handle>> {
        let existing = self.graph.children(self.graph.root_id())?;
        let cleared = self.graph.remove(&existing, None);
        if !cleared.is_clean() {
            log::warn!("{} elements could not be cleared", cleared.failed.len());
        }
        self.mount();
        self.select(&[]).await;
        self.append_elements(scene.elements, false).await
    }

    /// End the session: forget the selection and every frame.
    pub fn teardown(&mut self) {
        self.gesture = None;
        self.selection.clear();
        self.frames.clear();
        self.refresh_manipulator();
        log::debug!("editor torn down");
    }
}
