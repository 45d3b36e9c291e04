//! Selection, gesture routing and the editor orchestrator for scena.
//!
//! Built on `scena-core`; the picking, manipulation and media widgets are
//! reached through the traits in [`host`].

pub mod config;
pub mod editor;
pub mod gesture;
pub mod history;
pub mod host;
pub mod selection;
pub mod tools;

pub use config::{AppendSelection, EditorConfig};
pub use editor::{Collaborators, Editor, PendingSettle};
pub use gesture::{GestureEvent, GestureSession};
pub use history::{FrameChange, HistoryEntry, HistoryHook, HistoryRecorder};
pub use host::{
    DetachedManipulator, ImmediatePicker, Manipulator, ManipulatorConfig, MediaLoader, NoMedia,
    Picker,
};
pub use selection::{SelectionController, filter_top_most};
pub use tools::{ClickAction, DragDecision, DragStart, ToolKind};
