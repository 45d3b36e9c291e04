//! World and container-relative matrices over the scene graph.
//!
//! The local matrix of an element maps its own px space into its parent's
//! content space: `T(offset - parentScroll) · T(origin) · M · T(-origin)`.
//! World matrices chain locals from the root, which itself sits under the
//! viewport camera: `T(-scroll) · S(zoom) · L(root)`.

use crate::error::{Result, SceneError};
use crate::frame::{Frame, FrameStore};
use crate::id::ElementId;
use crate::matrix::Matrix4;
use crate::registry::SceneGraph;
use kurbo::Vec2;

/// Viewport camera supplied by the pan/zoom widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub zoom: f64,
    pub scroll: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll: Vec2::ZERO,
        }
    }
}

impl Camera {
    pub fn matrix(&self) -> Matrix4 {
        Matrix4::translate_2d(-self.scroll) * Matrix4::scale(self.zoom, self.zoom, 1.0)
    }
}

/// Read-only view combining structure, frames and camera.
pub struct CoordinateSpace<'a> {
    graph: &'a SceneGraph,
    frames: &'a FrameStore,
    camera: Camera,
}

impl<'a> CoordinateSpace<'a> {
    pub fn new(graph: &'a SceneGraph, frames: &'a FrameStore, camera: Camera) -> Self {
        Self {
            graph,
            frames,
            camera,
        }
    }

    /// Scroll of `id`'s content box; zero when unmounted.
    fn scroll_of(&self, id: ElementId) -> Vec2 {
        self.graph
            .handle_of(id)
            .map(|h| self.frames.layout(h).scroll)
            .unwrap_or(Vec2::ZERO)
    }

    /// Local matrix including the parent's scroll. Unmounted elements and
    /// elements without a frame contribute their layout offset only.
    pub fn local_matrix(&self, id: ElementId) -> Result<Matrix4> {
        let record = self.graph.get_by_id(id)?;
        let parent_scroll = record
            .scope
            .map(|scope| self.scroll_of(scope))
            .unwrap_or(Vec2::ZERO);
        let local = match record.handle {
            Some(h) if self.frames.has_frame(h) => self.frames.local_matrix(h)?,
            Some(h) => Matrix4::translate_2d(self.frames.layout(h).offset),
            None => Matrix4::IDENTITY,
        };
        Ok(Matrix4::translate_2d(-parent_scroll) * local)
    }

    /// Root-to-element chain, root first.
    fn chain(&self, id: ElementId) -> Result<Vec<ElementId>> {
        self.graph.get_by_id(id)?;
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.graph.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Element px space → viewport (screen) space.
    pub fn world_matrix(&self, id: ElementId) -> Result<Matrix4> {
        self.chain(id)?
            .into_iter()
            .try_fold(self.camera.matrix(), |acc, link| {
                Ok(acc * self.local_matrix(link)?)
            })
    }

    /// Maps `id`'s transform origin into `container`'s coordinate space.
    ///
    /// When the container is an ancestor the locals below it are chained
    /// directly; otherwise the container's world matrix is inverted, which
    /// can fail with [`SceneError::Singular`].
    pub fn offset_origin_matrix(&self, id: ElementId, container: ElementId) -> Result<Matrix4> {
        let origin = self.origin_matrix(id)?;
        if id == container {
            return Ok(origin);
        }
        if self.graph.is_ancestor_of(container, id) {
            let chain = self.chain(id)?;
            let below = chain
                .iter()
                .position(|link| *link == container)
                .map_or(0, |at| at + 1);
            let mut m = Matrix4::IDENTITY;
            for link in &chain[below..] {
                m = m * self.local_matrix(*link)?;
            }
            return Ok(m * origin);
        }
        let container_inverse = self.world_matrix(container)?.inverse()?;
        Ok(container_inverse * self.world_matrix(id)? * origin)
    }

    /// `T(origin)` of a mounted element with a frame, identity otherwise.
    fn origin_matrix(&self, id: ElementId) -> Result<Matrix4> {
        let record = self.graph.get_by_id(id)?;
        let Some(h) = record.handle else {
            return Ok(Matrix4::IDENTITY);
        };
        let Ok(frame) = self.frames.get_frame(h) else {
            return Ok(Matrix4::IDENTITY);
        };
        let size = self.frames.layout(h).size;
        Ok(Matrix4::translate_2d(frame.origin(size).to_vec2()))
    }

    /// The transform `id` needs once it lives under `new_scope` so that its
    /// world placement does not change. Computed before the structural
    /// commit; the element's layout offset is assumed to carry over.
    pub fn rebase_for_move(&self, id: ElementId, new_scope: ElementId) -> Result<Matrix4> {
        let handle = self.graph.handle_of(id)?;
        self.frames.get_frame(handle)?;
        let layout = self.frames.layout(handle);
        let origin = self.origin_matrix(id)?;

        let source = self.world_matrix(id)? * origin;
        let target = self.world_matrix(new_scope)?
            * Matrix4::translate_2d(layout.offset - self.scroll_of(new_scope))
            * origin;
        let container_inverse = target.inverse().map_err(|err| {
            log::warn!("cannot rebase {id} into {new_scope}: {err}");
            SceneError::Singular
        })?;
        Ok(compose_move(&container_inverse, &source))
    }
}

/// Re-express a transform from the old coordinate space in the new one:
/// `containerInverse · source`.
pub fn compose_move(container_inverse: &Matrix4, source: &Matrix4) -> Matrix4 {
    *container_inverse * *source
}

/// Overwrite a frame's transform with a precomputed matrix. Restore and
/// re-parent only; live gestures compose instead.
pub fn set_move_matrix(frame: &mut Frame, matrix: &Matrix4) {
    frame.transform_mut().set_matrix(matrix);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use crate::frame::FrameCapture;
    use crate::model::ElementSpec;
    use crate::registry::MoveSpec;
    use kurbo::Point;
    use std::collections::HashMap;

    struct Scene {
        graph: SceneGraph,
        frames: FrameStore,
        dom: MemoryDom,
        first: ElementId,
        second: ElementId,
        child: ElementId,
    }

    fn boxed(left: f64, top: f64, size: f64) -> ElementSpec {
        ElementSpec::markup("div")
            .with_frame("left", &format!("{left}px"))
            .with_frame("top", &format!("{top}px"))
            .with_frame("width", &format!("{size}px"))
            .with_frame("height", &format!("{size}px"))
    }

    /// Two 100px scopes side by side (the second rotated and scaled) and a
    /// rotated 20px child inside the first.
    fn scene() -> Scene {
        let mut graph = SceneGraph::new();
        let top = graph
            .append(
                vec![
                    boxed(100.0, 0.0, 100.0),
                    boxed(300.0, 50.0, 100.0).with_frame("transform", "rotate(30deg) scale(2)"),
                ],
                None,
                None,
            )
            .unwrap();
        let (first, second) = (top.ids[0], top.ids[1]);
        let inner = graph
            .append(
                vec![boxed(10.0, 10.0, 20.0).with_frame("transform", "rotate(15deg)")],
                None,
                Some(first),
            )
            .unwrap();
        let child = inner.ids[0];

        let captures: HashMap<ElementId, FrameCapture> =
            top.frames.into_iter().chain(inner.frames).collect();
        let mut dom = MemoryDom::new();
        assert!(graph.remount(&mut dom).is_clean());
        let mut frames = FrameStore::new();
        for (id, capture) in &captures {
            let h = graph.handle_of(*id).unwrap();
            frames.restore_frame(h, capture).unwrap();
        }
        Scene {
            graph,
            frames,
            dom,
            first,
            second,
            child,
        }
    }

    fn corners(space: &CoordinateSpace<'_>, id: ElementId) -> Vec<Point> {
        let m = space.world_matrix(id).unwrap();
        [(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]
            .iter()
            .map(|(x, y)| m.transform_point(Point::new(*x, *y)))
            .collect()
    }

    fn close(a: &[Point], b: &[Point]) -> bool {
        a.iter()
            .zip(b)
            .all(|(p, q)| (p.x - q.x).abs() < 1e-9 && (p.y - q.y).abs() < 1e-9)
    }

    #[test]
    fn camera_applies_zoom_then_scroll() {
        let camera = Camera {
            zoom: 2.0,
            scroll: Vec2::new(10.0, 0.0),
        };
        let p = camera.matrix().transform_point(Point::new(5.0, 5.0));
        assert_eq!(p, Point::new(0.0, 10.0));
    }

    #[test]
    fn world_matrix_chains_offsets() {
        let s = scene();
        let space = CoordinateSpace::new(&s.graph, &s.frames, Camera::default());
        let origin = space
            .world_matrix(s.first)
            .unwrap()
            .transform_point(Point::ZERO);
        assert_eq!(origin, Point::new(100.0, 0.0));
    }

    #[test]
    fn offset_origin_direct_and_inverse_agree() {
        let s = scene();
        let space = CoordinateSpace::new(
            &s.graph,
            &s.frames,
            Camera {
                zoom: 1.5,
                scroll: Vec2::new(30.0, 12.0),
            },
        );
        let direct = space.offset_origin_matrix(s.child, s.first).unwrap();
        let via_inverse = space.world_matrix(s.first).unwrap().inverse().unwrap()
            * space.world_matrix(s.child).unwrap()
            * Matrix4::translation(10.0, 10.0, 0.0);
        assert!(direct.approx_eq(&via_inverse, 1e-9));
        // The origin of the child sits at its box center in the container.
        let p = direct.transform_point(Point::ZERO);
        assert!((p.x - 20.0).abs() < 1e-9 && (p.y - 20.0).abs() < 1e-9, "{p:?}");
    }

    #[test]
    fn rebase_keeps_world_placement() {
        let mut s = scene();
        let before = {
            let space = CoordinateSpace::new(&s.graph, &s.frames, Camera::default());
            corners(&space, s.child)
        };
        let matrix = CoordinateSpace::new(&s.graph, &s.frames, Camera::default())
            .rebase_for_move(s.child, s.second)
            .unwrap();

        let old = s.graph.handle_of(s.child).unwrap();
        assert!(s
            .graph
            .move_batch(&[MoveSpec::new(s.child, s.second, None)])
            .is_clean());
        assert!(s.graph.remount(&mut s.dom).is_clean());
        let new = s.graph.handle_of(s.child).unwrap();
        assert_ne!(old, new);
        s.frames.rekey(old, new).unwrap();
        s.frames.set_move_matrix(new, &matrix).unwrap();

        let space = CoordinateSpace::new(&s.graph, &s.frames, Camera::default());
        let after = corners(&space, s.child);
        assert!(close(&before, &after), "{before:?} vs {after:?}");
    }

    #[test]
    fn singular_container_fails_rebase() {
        let mut s = scene();
        let h = s.graph.handle_of(s.second).unwrap();
        s.frames
            .get_frame_mut(h)
            .unwrap()
            .set("transform", "scale(0)")
            .unwrap();
        let space = CoordinateSpace::new(&s.graph, &s.frames, Camera::default());
        assert_eq!(
            space.rebase_for_move(s.child, s.second),
            Err(SceneError::Singular)
        );
    }

    #[test]
    fn compose_move_is_plain_product() {
        let inv = Matrix4::translation(-5.0, 0.0, 0.0);
        let src = Matrix4::translation(8.0, 1.0, 0.0);
        assert_eq!(
            compose_move(&inv, &src),
            Matrix4::translation(3.0, 1.0, 0.0)
        );
    }

    #[test]
    fn set_move_matrix_replaces_transform() {
        let mut frame = Frame::new();
        frame.set("transform", "rotate(10deg) scale(3)").unwrap();
        set_move_matrix(&mut frame, &Matrix4::translation(4.0, 2.0, 0.0));
        assert_eq!(
            frame.get("transform").as_deref(),
            Some("matrix(1, 0, 0, 1, 4, 2)")
        );
    }

    #[test]
    fn unmounted_elements_are_identity() {
        let mut graph = SceneGraph::new();
        let id = graph
            .append(vec![ElementSpec::plain("p")], None, None)
            .unwrap()
            .ids[0];
        let frames = FrameStore::new();
        let space = CoordinateSpace::new(&graph, &frames, Camera::default());
        assert_eq!(space.world_matrix(id).unwrap(), Matrix4::IDENTITY);
        assert!(space.rebase_for_move(id, graph.root_id()).is_err());
    }
}
