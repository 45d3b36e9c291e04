//! Selection controller.
//!
//! `select` is the only way the selection changes. It keeps the set free of
//! nested elements (a selected container supersedes its descendants), waits
//! for the picker to adopt the new set, and only then hands the set to the
//! frame store as the manipulation targets.

use crate::host::Picker;
use scena_core::{ElementId, FrameStore, Handle, Result, SceneError, SceneGraph};
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct SelectionController {
    current: Vec<Handle>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &[Handle] {
        &self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Replace the selection with the top-most of `candidates`.
    ///
    /// An empty result from a non-empty candidate set is reported as
    /// [`SceneError::InvalidSelection`] and degrades to a cleared selection.
    pub async fn select(
        &mut self,
        graph: &SceneGraph,
        frames: &mut FrameStore,
        picker: &mut dyn Picker,
        candidates: &[Handle],
    ) -> Vec<Handle> {
        let next = match filter_top_most(graph, candidates) {
            Ok(next) => next,
            Err(err) => {
                log::debug!("selection cleared: {err}");
                Vec::new()
            }
        };
        picker.set_selected_targets(&next).await;
        frames.set_targets(next.clone());
        log::debug!("selected {next:?}");
        self.current = next.clone();
        next
    }

    /// Drop handles that no longer resolve, without re-syncing widgets.
    pub fn retain_live(&mut self, graph: &SceneGraph) {
        self.current.retain(|h| graph.get_by_handle(*h).is_ok());
    }

    /// Forget the selection (teardown). Widgets are not notified.
    pub fn clear(&mut self) {
        self.current.clear();
    }
}

/// Keep candidates that resolve and have no ancestor among the candidates,
/// in candidate order, without duplicates.
pub fn filter_top_most(graph: &SceneGraph, candidates: &[Handle]) -> Result<Vec<Handle>> {
    let mut seen = HashSet::new();
    let resolved: Vec<(Handle, ElementId)> = candidates
        .iter()
        .filter(|h| seen.insert(**h))
        .filter_map(|h| match graph.id_of_handle(*h) {
            Ok(id) => Some((*h, id)),
            Err(err) => {
                log::warn!("ignoring selection candidate: {err}");
                None
            }
        })
        .collect();

    let ids: HashSet<ElementId> = resolved.iter().map(|(_, id)| *id).collect();
    let top: Vec<Handle> = resolved
        .iter()
        .filter(|(_, id)| {
            !ids
                .iter()
                .any(|other| graph.is_ancestor_of(*other, *id))
        })
        .map(|(h, _)| *h)
        .collect();

    if top.is_empty() && !candidates.is_empty() {
        return Err(SceneError::InvalidSelection);
    }
    Ok(top)
}
