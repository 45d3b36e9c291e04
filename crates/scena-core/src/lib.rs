//! Scene graph, frame store and coordinate math for the scena editor.
//!
//! Nothing here talks to a real DOM: live nodes are reached through the
//! [`dom::LiveDom`] trait and identified by opaque [`Handle`]s.

pub mod coords;
pub mod dom;
pub mod error;
pub mod frame;
pub mod id;
pub mod matrix;
pub mod model;
pub mod persist;
pub mod registry;
pub mod transform;

pub use coords::{Camera, CoordinateSpace, compose_move, set_move_matrix};
pub use dom::{LiveDom, MemoryDom};
pub use error::{Batch, Lookup, Result, SceneError};
pub use frame::{
    ClipPath, Direction, Frame, FrameCapture, FrameStore, LayoutBox, StyleSnapshot,
};
pub use id::{DATA_ID_ATTR, ElementId, Handle, ROOT_ID};
pub use matrix::{Matrix4, invert};
pub use model::{Content, ContentSnapshot, ElementRecord, ElementSpec};
pub use persist::SavedScene;
pub use registry::{Appended, Detached, MoveRecord, MoveSpec, Placement, SceneGraph};
pub use transform::{Transform, TransformFn};

// Re-export kurbo geometry so downstream crates share one version.
pub use kurbo::{Point, Rect, Size, Vec2};
