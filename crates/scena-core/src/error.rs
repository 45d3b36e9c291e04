//! Error kinds shared by the registry, frame store, and coordinate math.
//!
//! None of these are fatal: callers isolate them per element and degrade to
//! "no visible change" plus a log line.

use crate::id::{ElementId, Handle};
use std::fmt;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Id(ElementId),
    Handle(Handle),
    Frame(Handle),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "element {id}"),
            Lookup::Handle(h) => write!(f, "handle {h}"),
            Lookup::Frame(h) => write!(f, "frame for {h}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("not found: {0}")]
    NotFound(Lookup),

    #[error("matrix is not invertible")]
    Singular,

    #[error("no eligible element left in selection")]
    InvalidSelection,

    #[error("cannot move {id} into its own subtree ({scope})")]
    CyclicMove { id: ElementId, scope: ElementId },

    #[error("the root scope cannot be {0}")]
    RootScope(&'static str),

    #[error("invalid transform `{input}`: {reason}")]
    Transform { input: String, reason: String },

    #[error("persisted scene: {0}")]
    Persist(String),
}

impl SceneError {
    pub fn id(id: ElementId) -> Self {
        SceneError::NotFound(Lookup::Id(id))
    }

    pub fn handle(handle: Handle) -> Self {
        SceneError::NotFound(Lookup::Handle(handle))
    }

    pub fn frame(handle: Handle) -> Self {
        SceneError::NotFound(Lookup::Frame(handle))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SceneError::NotFound(_))
    }
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;

/// Outcome of a batch operation processed element by element.
///
/// Failures never roll back successes that were already committed.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub ok: Vec<T>,
    pub failed: Vec<SceneError>,
}

impl<T> Batch<T> {
    pub fn new() -> Self {
        Self {
            ok: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Record one element's outcome, logging failures.
    pub fn push(&mut self, result: Result<T>) {
        match result {
            Ok(value) => self.ok.push(value),
            Err(err) => {
                log::warn!("batch element skipped: {err}");
                self.failed.push(err);
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}
