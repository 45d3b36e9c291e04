//! Frames and the frame store.
//!
//! A `Frame` is the style record of one mounted element: ordered CSS-like
//! properties, a parsed transform list, and a z-order marker. The
//! `FrameStore` owns every frame (keyed by handle) and implements the
//! incremental operations the manipulation widget drives during a gesture.
//!
//! Every gesture operation composes onto the existing transform rather than
//! overwriting it, and is a no-op for an empty delta. Resize and origin
//! changes keep their anchor fixed by prepending a compensating translation
//! computed from the element's local matrix before and after the change.

use crate::error::{Batch, Result, SceneError};
use crate::id::Handle;
use crate::matrix::{Matrix4, format_number};
use crate::transform::Transform;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TRANSFORM: &str = "transform";
const TRANSFORM_ORIGIN: &str = "transform-origin";
const Z_INDEX: &str = "z-index";

// ─── Layout ───────────────────────────────────────────────────────────────

/// Geometry measured by the rendering collaborator for a mounted node.
///
/// `offset` is relative to the parent's content box, before any transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub offset: Vec2,
    pub size: Size,
    pub scroll: Vec2,
}

/// Which handle a resize is pulling. Each axis is -1, 0 or 1; the opposite
/// side stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub x: i8,
    pub y: i8,
}

impl Direction {
    pub const CENTER: Self = Self { x: 0, y: 0 };
    pub const RIGHT: Self = Self { x: 1, y: 0 };
    pub const LEFT: Self = Self { x: -1, y: 0 };
    pub const BOTTOM_RIGHT: Self = Self { x: 1, y: 1 };
    pub const TOP_LEFT: Self = Self { x: -1, y: -1 };

    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    /// Anchor as a fraction of the element box: 0 for the left/top edge,
    /// 1 for right/bottom, 0.5 when the axis is not being pulled.
    pub fn anchor(self) -> Vec2 {
        let frac = |d: i8| (1.0 - f64::from(d.signum())) / 2.0;
        Vec2::new(frac(self.x), frac(self.y))
    }
}

// ─── Clip paths ───────────────────────────────────────────────────────────

/// Clip region produced by the crop gesture, in element-local px.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipPath {
    Inset {
        top: f64,
        right: f64,
        bottom: f64,
        left: f64,
    },
    Circle {
        radius: f64,
        center: Point,
    },
    Ellipse {
        rx: f64,
        ry: f64,
        center: Point,
    },
    Polygon(Vec<Point>),
}

impl ClipPath {
    pub fn to_css(&self) -> String {
        let px = |v: f64| format!("{}px", format_number(v));
        match self {
            ClipPath::Inset {
                top,
                right,
                bottom,
                left,
            } => format!(
                "inset({} {} {} {})",
                px(*top),
                px(*right),
                px(*bottom),
                px(*left)
            ),
            ClipPath::Circle { radius, center } => format!(
                "circle({} at {} {})",
                px(*radius),
                px(center.x),
                px(center.y)
            ),
            ClipPath::Ellipse { rx, ry, center } => format!(
                "ellipse({} {} at {} {})",
                px(*rx),
                px(*ry),
                px(center.x),
                px(center.y)
            ),
            ClipPath::Polygon(points) => {
                let pts: Vec<String> = points
                    .iter()
                    .map(|p| format!("{} {}", px(p.x), px(p.y)))
                    .collect();
                format!("polygon({})", pts.join(", "))
            }
        }
    }
}

// ─── Snapshots ────────────────────────────────────────────────────────────

/// The renderable style of one element, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyleSnapshot {
    pub declarations: Vec<(String, String)>,
}

impl StyleSnapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A detached frame: everything needed to recreate it later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameCapture {
    pub properties: Vec<(String, String)>,
    pub z_order: i32,
}

// ─── Frame ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Everything except `transform` and `z-index`, in insertion order.
    properties: Vec<(String, String)>,
    transform: Transform,
    z_order: i32,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(props: &[(String, String)]) -> Result<Self> {
        let mut frame = Self::new();
        frame.merge(props)?;
        Ok(frame)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match name {
            TRANSFORM => (!self.transform.is_none()).then(|| self.transform.to_css()),
            Z_INDEX => (self.z_order != 0).then(|| self.z_order.to_string()),
            _ => self
                .properties
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
        }
    }

    /// Set one property. `transform` text is parsed; a parse failure leaves
    /// the frame untouched.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            TRANSFORM => self.transform = Transform::parse(value)?,
            Z_INDEX => self.z_order = value.trim().parse().unwrap_or(0),
            _ => match self.properties.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => self.properties.push((name.to_string(), value.to_string())),
            },
        }
        Ok(())
    }

    /// Merge properties without touching the ones not mentioned.
    pub fn merge(&mut self, props: &[(String, String)]) -> Result<()> {
        for (name, value) in props {
            self.set(name, value)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        match name {
            TRANSFORM => {
                let old = self.get(TRANSFORM);
                self.transform = Transform::default();
                old
            }
            Z_INDEX => {
                let old = self.get(Z_INDEX);
                self.z_order = 0;
                old
            }
            _ => {
                let pos = self.properties.iter().position(|(k, _)| k == name)?;
                Some(self.properties.remove(pos).1)
            }
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn set_z_order(&mut self, order: i32) {
        self.z_order = order;
    }

    /// A numeric `px` (or unitless) property. `None` for other units
    /// (`%`, `em`, `auto`), which only a measured layout can resolve.
    pub fn px(&self, name: &str) -> Option<f64> {
        let value = self.properties.iter().find(|(k, _)| k == name)?.1.trim();
        value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
    }

    pub fn set_px(&mut self, name: &str, value: f64) {
        let text = format!("{}px", format_number(value));
        // Never fails for non-transform properties.
        let _ = self.set(name, &text);
    }

    /// All properties with the transform last.
    pub fn properties(&self) -> Vec<(String, String)> {
        let mut out = self.properties.clone();
        if !self.transform.is_none() {
            out.push((TRANSFORM.to_string(), self.transform.to_css()));
        }
        out
    }

    pub fn capture(&self) -> FrameCapture {
        FrameCapture {
            properties: self.properties(),
            z_order: self.z_order,
        }
    }

    pub fn snapshot(&self) -> StyleSnapshot {
        let mut declarations = self.properties();
        if self.z_order != 0 {
            declarations.push((Z_INDEX.to_string(), self.z_order.to_string()));
        }
        StyleSnapshot { declarations }
    }

    /// Transform origin in local px. Defaults to the box center.
    pub fn origin(&self, size: Size) -> Point {
        let Some(text) = self.properties.iter().find(|(k, _)| k == TRANSFORM_ORIGIN) else {
            return Point::new(size.width / 2.0, size.height / 2.0);
        };
        parse_origin(&text.1, size)
    }

    /// `T(offset) · T(origin) · M · T(-origin)`: maps local px into the
    /// parent's (unscrolled) content space.
    pub fn local_matrix(&self, layout: &LayoutBox) -> Matrix4 {
        let origin = self.origin(layout.size).to_vec2();
        Matrix4::translate_2d(layout.offset)
            * Matrix4::translate_2d(origin)
            * self.transform.to_matrix(layout.size)
            * Matrix4::translate_2d(-origin)
    }
}

fn parse_origin(text: &str, size: Size) -> Point {
    let mut x = size.width / 2.0;
    let mut y = size.height / 2.0;
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let resolve = |token: &str, basis: f64| -> Option<f64> {
        match token {
            "left" | "top" => Some(0.0),
            "center" => Some(basis / 2.0),
            "right" | "bottom" => Some(basis),
            _ => {
                if let Some(p) = token.strip_suffix('%') {
                    p.parse::<f64>().ok().map(|p| basis * p / 100.0)
                } else {
                    token.strip_suffix("px").unwrap_or(token).parse().ok()
                }
            }
        }
    };

    match tokens.as_slice() {
        [single] if matches!(*single, "top" | "bottom") => {
            y = resolve(*single, size.height).unwrap_or(y);
        }
        [single] => x = resolve(*single, size.width).unwrap_or(x),
        [first, second, ..] => {
            // Keywords may come in either order (`top left`).
            if matches!(*first, "top" | "bottom") || matches!(*second, "left" | "right") {
                y = resolve(*first, size.height).unwrap_or(y);
                x = resolve(*second, size.width).unwrap_or(x);
            } else {
                x = resolve(*first, size.width).unwrap_or(x);
                y = resolve(*second, size.height).unwrap_or(y);
            }
        }
        [] => {}
    }
    Point::new(x, y)
}

// ─── Frame store ──────────────────────────────────────────────────────────

/// Owns every frame, keyed by the handle of the mounted element.
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: HashMap<Handle, Frame>,
    layouts: HashMap<Handle, LayoutBox>,
    targets: Vec<Handle>,
    applied: HashMap<Handle, StyleSnapshot>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame for `handle`. Re-registering returns the existing
    /// frame unchanged.
    pub fn create_frame(
        &mut self,
        handle: Handle,
        initial: &[(String, String)],
    ) -> Result<&mut Frame> {
        if self.frames.contains_key(&handle) {
            log::debug!("frame for {handle} already registered");
        } else {
            let frame = Frame::from_properties(initial)?;
            self.frames.insert(handle, frame);
        }
        self.get_frame_mut(handle)
    }

    /// Recreate a frame from a capture, replacing any existing one.
    pub fn restore_frame(&mut self, handle: Handle, capture: &FrameCapture) -> Result<()> {
        let mut frame = Frame::from_properties(&capture.properties)?;
        frame.set_z_order(capture.z_order);
        self.frames.insert(handle, frame);
        Ok(())
    }

    pub fn get_frame(&self, handle: Handle) -> Result<&Frame> {
        self.frames.get(&handle).ok_or(SceneError::frame(handle))
    }

    pub fn get_frame_mut(&mut self, handle: Handle) -> Result<&mut Frame> {
        self.frames
            .get_mut(&handle)
            .ok_or(SceneError::frame(handle))
    }

    pub fn has_frame(&self, handle: Handle) -> bool {
        self.frames.contains_key(&handle)
    }

    /// Detach a frame, returning what is needed to restore it.
    pub fn remove_frame(&mut self, handle: Handle) -> Result<FrameCapture> {
        let frame = self
            .frames
            .remove(&handle)
            .ok_or(SceneError::frame(handle))?;
        self.layouts.remove(&handle);
        self.applied.remove(&handle);
        self.targets.retain(|t| *t != handle);
        Ok(frame.capture())
    }

    /// Move a frame (and its layout) to a new handle after a remount.
    pub fn rekey(&mut self, old: Handle, new: Handle) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let frame = self.frames.remove(&old).ok_or(SceneError::frame(old))?;
        self.frames.insert(new, frame);
        if let Some(layout) = self.layouts.remove(&old) {
            self.layouts.insert(new, layout);
        }
        self.applied.remove(&old);
        for target in &mut self.targets {
            if *target == old {
                *target = new;
            }
        }
        Ok(())
    }

    /// Recompute the style snapshot for `handle` and record it as applied.
    pub fn render(&mut self, handle: Handle) -> Result<StyleSnapshot> {
        let snapshot = self.get_frame(handle)?.snapshot();
        log::trace!("render {handle}: {}", snapshot.to_css_text());
        self.applied.insert(handle, snapshot.clone());
        Ok(snapshot)
    }

    /// The last snapshot produced by `render`.
    pub fn applied(&self, handle: Handle) -> Option<&StyleSnapshot> {
        self.applied.get(&handle)
    }

    pub fn set_targets(&mut self, handles: Vec<Handle>) {
        self.targets = handles;
    }

    pub fn targets(&self) -> &[Handle] {
        &self.targets
    }

    /// Every handle with a registered frame, in no particular order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.frames.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.layouts.clear();
        self.targets.clear();
        self.applied.clear();
    }

    pub fn set_layout(&mut self, handle: Handle, layout: LayoutBox) {
        self.layouts.insert(handle, layout);
    }

    /// Measured layout, with explicit `px` frame sizes taking precedence.
    /// Without a measurement the offset falls back to `left`/`top`, and any
    /// of `left`/`top`/`width`/`height` not given in `px` counts as 0.
    pub fn layout(&self, handle: Handle) -> LayoutBox {
        let measured = self.layouts.get(&handle).copied();
        let mut layout = measured.unwrap_or_default();
        let Some(frame) = self.frames.get(&handle) else {
            return layout;
        };
        let px = |name: &str| {
            let value = frame.px(name);
            if value.is_none()
                && measured.is_none()
                && let Some(raw) = frame.get(name)
            {
                log::debug!("{handle}: unmeasured {name}: {raw} resolves to 0");
            }
            value
        };
        if measured.is_none() {
            layout.offset = Vec2::new(px("left").unwrap_or(0.0), px("top").unwrap_or(0.0));
        }
        if let Some(w) = px("width") {
            layout.size.width = w;
        }
        if let Some(h) = px("height") {
            layout.size.height = h;
        }
        layout
    }

    /// Local matrix of the element in its parent's content space.
    pub fn local_matrix(&self, handle: Handle) -> Result<Matrix4> {
        let frame = self.get_frame(handle)?;
        Ok(frame.local_matrix(&self.layout(handle)))
    }

    /// The element box mapped into parent space (axis-aligned bounds).
    pub fn parent_rect(&self, handle: Handle) -> Result<Rect> {
        let matrix = self.local_matrix(handle)?;
        let size = self.layout(handle).size;
        let corners = [
            Point::ZERO,
            Point::new(size.width, 0.0),
            Point::new(size.width, size.height),
            Point::new(0.0, size.height),
        ]
        .map(|p| matrix.transform_point(p));
        let first = Rect::from_points(corners[0], corners[0]);
        Ok(corners[1..]
            .iter()
            .fold(first, |acc, p| acc.union(Rect::from_points(*p, *p))))
    }

    /// Where the transform origin sits in parent space.
    fn pivot(&self, handle: Handle) -> Result<Point> {
        let frame = self.get_frame(handle)?;
        let layout = self.layout(handle);
        Ok(frame
            .local_matrix(&layout)
            .transform_point(frame.origin(layout.size)))
    }

    // ─── Gesture operations ──────────────────────────────────────────────

    /// Move by `delta` in parent space.
    pub fn drag(&mut self, handle: Handle, delta: Vec2) -> Result<()> {
        self.get_frame_mut(handle)?
            .transform_mut()
            .prepend_translate(delta);
        Ok(())
    }

    /// Grow by `delta` (width, height), keeping the side opposite
    /// `direction` fixed in parent space.
    pub fn resize(&mut self, handle: Handle, delta: Vec2, direction: Direction) -> Result<()> {
        let before_layout = self.layout(handle);
        let frame = self.get_frame(handle)?;
        if delta.x == 0.0 && delta.y == 0.0 {
            return Ok(());
        }
        let anchor = direction.anchor();
        let size = before_layout.size;
        let anchor_before = frame.local_matrix(&before_layout).transform_point(Point::new(
            anchor.x * size.width,
            anchor.y * size.height,
        ));

        let next = Size::new(
            (size.width + delta.x).max(0.0),
            (size.height + delta.y).max(0.0),
        );
        let frame = self.get_frame_mut(handle)?;
        if delta.x != 0.0 {
            frame.set_px("width", next.width);
        }
        if delta.y != 0.0 {
            frame.set_px("height", next.height);
        }

        let after_layout = self.layout(handle);
        let frame = self.get_frame_mut(handle)?;
        let anchor_after = frame.local_matrix(&after_layout).transform_point(Point::new(
            anchor.x * after_layout.size.width,
            anchor.y * after_layout.size.height,
        ));
        frame
            .transform_mut()
            .prepend_translate(anchor_before - anchor_after);
        Ok(())
    }

    /// Scale about the transform origin in element-local axes.
    pub fn scale(&mut self, handle: Handle, sx: f64, sy: f64) -> Result<()> {
        self.get_frame_mut(handle)?.transform_mut().scale_by(sx, sy);
        Ok(())
    }

    /// Rotate about the transform origin.
    pub fn rotate(&mut self, handle: Handle, degrees: f64) -> Result<()> {
        self.get_frame_mut(handle)?
            .transform_mut()
            .rotate_by(degrees);
        Ok(())
    }

    /// Move the transform origin (local px) without moving the visual.
    pub fn drag_origin(&mut self, handle: Handle, origin: Point) -> Result<()> {
        let layout = self.layout(handle);
        let frame = self.get_frame(handle)?;
        if frame.origin(layout.size) == origin {
            return Ok(());
        }
        let before = frame.local_matrix(&layout).transform_point(Point::ZERO);

        let frame = self.get_frame_mut(handle)?;
        let text = format!(
            "{}px {}px",
            format_number(origin.x),
            format_number(origin.y)
        );
        frame.set(TRANSFORM_ORIGIN, &text)?;
        let after = frame.local_matrix(&layout).transform_point(Point::ZERO);
        frame.transform_mut().prepend_translate(before - after);
        Ok(())
    }

    /// Set the corner radius (`border-radius` text). Empty clears it.
    pub fn round(&mut self, handle: Handle, radius: &str) -> Result<()> {
        let frame = self.get_frame_mut(handle)?;
        if radius.trim().is_empty() {
            frame.remove("border-radius");
        } else {
            frame.set("border-radius", radius)?;
        }
        Ok(())
    }

    pub fn clip(&mut self, handle: Handle, clip: &ClipPath) -> Result<()> {
        self.get_frame_mut(handle)?
            .set("clip-path", &clip.to_css())
    }

    /// Write a precomputed matrix straight into the transform. Only used for
    /// restore and re-parent, never during a live gesture.
    pub fn set_move_matrix(&mut self, handle: Handle, matrix: &Matrix4) -> Result<()> {
        self.get_frame_mut(handle)?
            .transform_mut()
            .set_matrix(matrix);
        Ok(())
    }

    // ─── Group variants ──────────────────────────────────────────────────

    pub fn drag_group(&mut self, handles: &[Handle], delta: Vec2) -> Batch<Handle> {
        let mut batch = Batch::new();
        for &h in handles {
            batch.push(self.drag(h, delta).map(|()| h));
        }
        batch
    }

    /// Union of the members' parent-space bounds; members that cannot be
    /// measured are reported in `failed`.
    fn group_rect(&self, handles: &[Handle], batch: &mut Batch<Handle>) -> (Vec<Handle>, Rect) {
        let mut members = Vec::new();
        let mut bounds: Option<Rect> = None;
        for &h in handles {
            match self.parent_rect(h) {
                Ok(rect) => {
                    members.push(h);
                    bounds = Some(bounds.map_or(rect, |b| b.union(rect)));
                }
                Err(err) => batch.push(Err(err)),
            }
        }
        (members, bounds.unwrap_or(Rect::ZERO))
    }

    /// Rotate every member about its own origin and swing its origin around
    /// the group center, keeping relative placement.
    pub fn rotate_group(&mut self, handles: &[Handle], degrees: f64) -> Batch<Handle> {
        let mut batch = Batch::new();
        let (members, bounds) = self.group_rect(handles, &mut batch);
        let center = bounds.center();
        let swing = Matrix4::translate_2d(center.to_vec2())
            * Matrix4::rotation_z(degrees)
            * Matrix4::translate_2d(-center.to_vec2());
        for h in members {
            let result = self.pivot(h).and_then(|p| {
                self.rotate(h, degrees)?;
                self.drag(h, swing.transform_point(p) - p)
            });
            batch.push(result.map(|()| h));
        }
        batch
    }

    /// Scale every member and spread origins away from the group center.
    pub fn scale_group(&mut self, handles: &[Handle], sx: f64, sy: f64) -> Batch<Handle> {
        let mut batch = Batch::new();
        let (members, bounds) = self.group_rect(handles, &mut batch);
        let center = bounds.center();
        for h in members {
            let result = self.pivot(h).and_then(|p| {
                self.scale(h, sx, sy)?;
                let d = p - center;
                let target = center + Vec2::new(d.x * sx, d.y * sy);
                self.drag(h, target - p)
            });
            batch.push(result.map(|()| h));
        }
        batch
    }

    /// Resize the group box by `delta`, resizing every member by the same
    /// ratio and keeping its relative offset inside the box.
    pub fn resize_group(
        &mut self,
        handles: &[Handle],
        delta: Vec2,
        direction: Direction,
    ) -> Batch<Handle> {
        let mut batch = Batch::new();
        let (members, bounds) = self.group_rect(handles, &mut batch);
        let ratio = |extent: f64, d: f64| {
            if extent > 0.0 {
                ((extent + d) / extent).max(0.0)
            } else {
                1.0
            }
        };
        let fx = ratio(bounds.width(), delta.x);
        let fy = ratio(bounds.height(), delta.y);
        let anchor = direction.anchor();
        let anchor = Point::new(
            bounds.x0 + anchor.x * bounds.width(),
            bounds.y0 + anchor.y * bounds.height(),
        );

        for h in members {
            let result = self.parent_rect(h).and_then(|rect| {
                let size = self.layout(h).size;
                let grow = Vec2::new(size.width * (fx - 1.0), size.height * (fy - 1.0));
                // Center-anchored, so the member's center stays put.
                self.resize(h, grow, Direction::CENTER)?;
                let c = rect.center();
                let d = c - anchor;
                let target = anchor + Vec2::new(d.x * fx, d.y * fy);
                self.drag(h, target - c)
            });
            batch.push(result.map(|()| h));
        }
        batch
    }
}
