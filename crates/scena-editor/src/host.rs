//! Contracts for the interaction widgets the editor drives.
//!
//! The picking (rubber-band) widget, the manipulation overlay and the media
//! loader live outside this crate. Each is reached through a small trait so
//! a browser binding, a native shell or a test double can stand in.

use futures::future::{self, BoxFuture};
use scena_core::Handle;

/// The picking / rubber-band widget.
pub trait Picker {
    /// Adopt `targets` as the authoritative selection. The returned future
    /// resolves once the widget has committed it.
    fn set_selected_targets(&mut self, targets: &[Handle]) -> BoxFuture<'static, ()>;
}

/// Everything the manipulation overlay is configured with.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulatorConfig {
    pub targets: Vec<Handle>,
    /// Snapping candidates: mounted elements outside the selection.
    pub guidelines: Vec<Handle>,
    /// Inverse of the viewport zoom.
    pub scale: f64,
    pub keep_ratio: bool,
    pub clippable: bool,
    pub text_mode: bool,
    /// Show the delete button; pressing it removes `targets`.
    pub deletable: bool,
    /// Rotation target when nothing is selected (the viewport).
    pub rotation_target: Option<Handle>,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            guidelines: Vec::new(),
            scale: 1.0,
            keep_ratio: false,
            clippable: false,
            text_mode: false,
            deletable: false,
            rotation_target: None,
        }
    }
}

/// The drag / resize / rotate / crop handles overlay.
pub trait Manipulator {
    fn configure(&mut self, config: &ManipulatorConfig);
}

/// Waits for embedded media (images and the like) inside a mounted node.
pub trait MediaLoader {
    fn wait_loaded(&self, handle: Handle) -> BoxFuture<'static, ()>;
}

/// A media loader for hosts without asynchronous media: always ready.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMedia;

impl MediaLoader for NoMedia {
    fn wait_loaded(&self, _handle: Handle) -> BoxFuture<'static, ()> {
        Box::pin(future::ready(()))
    }
}

/// A picker that commits immediately and remembers the last selection.
#[derive(Debug, Default, Clone)]
pub struct ImmediatePicker {
    pub selected: Vec<Handle>,
}

impl Picker for ImmediatePicker {
    fn set_selected_targets(&mut self, targets: &[Handle]) -> BoxFuture<'static, ()> {
        self.selected = targets.to_vec();
        Box::pin(future::ready(()))
    }
}

/// A manipulator that only keeps its latest configuration.
#[derive(Debug, Default, Clone)]
pub struct DetachedManipulator {
    pub config: ManipulatorConfig,
}

impl Manipulator for DetachedManipulator {
    fn configure(&mut self, config: &ManipulatorConfig) {
        self.config = config.clone();
    }
}
