//! Manipulation-widget gestures routed into the frame store.
//!
//! Every update callback of the overlay arrives as a `GestureEvent`. With a
//! single target the per-element frame operation runs; with several targets
//! the group variant runs so relative placement inside the group box holds.
//! Origin, corner radius and clip changes always apply per element.

use crate::history::{FrameChange, HistoryEntry};
use scena_core::{
    Batch, ClipPath, Direction, FrameCapture, FrameStore, Handle, Point, SceneGraph, Vec2,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Drag { delta: Vec2 },
    Resize { delta: Vec2, direction: Direction },
    Scale { sx: f64, sy: f64 },
    Rotate { degrees: f64 },
    Origin { origin: Point },
    Round { radius: String },
    Clip { clip: ClipPath },
}

impl GestureEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GestureEvent::Drag { .. } => "drag",
            GestureEvent::Resize { .. } => "resize",
            GestureEvent::Scale { .. } => "scale",
            GestureEvent::Rotate { .. } => "rotate",
            GestureEvent::Origin { .. } => "origin",
            GestureEvent::Round { .. } => "round",
            GestureEvent::Clip { .. } => "clip",
        }
    }
}

/// Apply one update to `targets`. Missing frames are reported per element.
pub fn apply(frames: &mut FrameStore, targets: &[Handle], event: &GestureEvent) -> Batch<Handle> {
    log::trace!("{} on {} targets", event.name(), targets.len());
    if let [single] = targets {
        let h = *single;
        let result = match event {
            GestureEvent::Drag { delta } => frames.drag(h, *delta),
            GestureEvent::Resize { delta, direction } => frames.resize(h, *delta, *direction),
            GestureEvent::Scale { sx, sy } => frames.scale(h, *sx, *sy),
            GestureEvent::Rotate { degrees } => frames.rotate(h, *degrees),
            GestureEvent::Origin { origin } => frames.drag_origin(h, *origin),
            GestureEvent::Round { radius } => frames.round(h, radius),
            GestureEvent::Clip { clip } => frames.clip(h, clip),
        };
        let mut batch = Batch::new();
        batch.push(result.map(|()| h));
        return batch;
    }

    match event {
        GestureEvent::Drag { delta } => frames.drag_group(targets, *delta),
        GestureEvent::Resize { delta, direction } => {
            frames.resize_group(targets, *delta, *direction)
        }
        GestureEvent::Scale { sx, sy } => frames.scale_group(targets, *sx, *sy),
        GestureEvent::Rotate { degrees } => frames.rotate_group(targets, *degrees),
        GestureEvent::Origin { origin } => {
            per_element(targets, |h| frames.drag_origin(h, *origin))
        }
        GestureEvent::Round { radius } => per_element(targets, |h| frames.round(h, radius)),
        GestureEvent::Clip { clip } => per_element(targets, |h| frames.clip(h, clip)),
    }
}

fn per_element(
    targets: &[Handle],
    mut op: impl FnMut(Handle) -> scena_core::Result<()>,
) -> Batch<Handle> {
    let mut batch = Batch::new();
    for &h in targets {
        batch.push(op(h).map(|()| h));
    }
    batch
}

/// Frames of the targets as they were when the gesture started.
#[derive(Debug, Clone, Default)]
pub struct GestureSession {
    before: Vec<(Handle, FrameCapture)>,
}

impl GestureSession {
    pub fn start(frames: &FrameStore, targets: &[Handle]) -> Self {
        let before = targets
            .iter()
            .filter_map(|h| frames.get_frame(*h).ok().map(|f| (*h, f.capture())))
            .collect();
        Self { before }
    }

    pub fn targets(&self) -> Vec<Handle> {
        self.before.iter().map(|(h, _)| *h).collect()
    }

    /// One render entry covering every target whose frame changed, or
    /// `None` when the gesture left everything as it was.
    pub fn finish(self, graph: &SceneGraph, frames: &FrameStore) -> Option<HistoryEntry> {
        let changes: Vec<FrameChange> = self
            .before
            .into_iter()
            .filter_map(|(h, before)| {
                let after = frames.get_frame(h).ok()?.capture();
                let id = graph.id_of_handle(h).ok()?;
                (after != before).then_some(FrameChange { id, before, after })
            })
            .collect();
        if changes.is_empty() {
            return None;
        }
        Some(HistoryEntry::Render { changes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scena_core::{ElementSpec, MemoryDom};

    fn mounted(n: usize) -> (SceneGraph, FrameStore, Vec<Handle>) {
        let mut graph = SceneGraph::new();
        let specs = (0..n)
            .map(|_| {
                ElementSpec::markup("div")
                    .with_frame("width", "10px")
                    .with_frame("height", "10px")
            })
            .collect();
        let appended = graph.append(specs, None, None).unwrap();
        let mut dom = MemoryDom::new();
        graph.remount(&mut dom);
        let mut frames = FrameStore::new();
        let mut handles = Vec::new();
        for (id, capture) in &appended.frames {
            let h = graph.handle_of(*id).unwrap();
            frames.restore_frame(h, capture).unwrap();
            handles.push(h);
        }
        (graph, frames, handles)
    }

    fn transform(frames: &FrameStore, h: Handle) -> Option<String> {
        frames.get_frame(h).unwrap().get("transform")
    }

    #[test]
    fn single_target_uses_element_operation() {
        let (_, mut frames, h) = mounted(1);
        let batch = apply(&mut frames, &h, &GestureEvent::Rotate { degrees: 30.0 });
        assert_eq!(batch.ok, h);
        assert_eq!(transform(&frames, h[0]).as_deref(), Some("rotate(30deg)"));
    }

    #[test]
    fn several_targets_move_as_a_group() {
        let (_, mut frames, h) = mounted(2);
        let batch = apply(
            &mut frames,
            &h,
            &GestureEvent::Drag {
                delta: Vec2::new(5.0, 0.0),
            },
        );
        assert!(batch.is_clean());
        for handle in &h {
            assert_eq!(transform(&frames, *handle).as_deref(), Some("translate(5px, 0px)"));
        }
    }

    #[test]
    fn round_applies_per_element() {
        let (_, mut frames, h) = mounted(2);
        let mut targets = h.clone();
        targets.push(Handle::new(404));
        let batch = apply(
            &mut frames,
            &targets,
            &GestureEvent::Round {
                radius: "4px".to_string(),
            },
        );
        assert_eq!(batch.ok, h);
        assert_eq!(batch.failed.len(), 1);
    }

    #[test]
    fn session_reports_only_changed_frames() {
        let (graph, mut frames, h) = mounted(2);
        let session = GestureSession::start(&frames, &h);
        frames.drag(h[1], Vec2::new(1.0, 1.0)).unwrap();
        let Some(HistoryEntry::Render { changes }) = session.finish(&graph, &frames) else {
            panic!("expected a render entry");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, graph.id_of_handle(h[1]).unwrap());
        assert_eq!(
            changes[0].after.properties.last(),
            Some(&("transform".to_string(), "translate(1px, 1px)".to_string()))
        );
    }

    #[test]
    fn untouched_session_records_nothing() {
        let (graph, frames, h) = mounted(1);
        let session = GestureSession::start(&frames, &h);
        assert!(session.finish(&graph, &frames).is_none());
    }
}
