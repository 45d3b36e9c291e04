//! Save/load of the scene tree.
//!
//! The saved shape is an ordered tree of element specs with their frame
//! properties. Ids are not persisted; loading appends the specs and every
//! element gets a fresh id.

use crate::dom::LiveDom;
use crate::error::{Result, SceneError};
use crate::frame::FrameStore;
use crate::model::ElementSpec;
use crate::registry::SceneGraph;
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedScene {
    pub version: u32,
    pub elements: Vec<ElementSpec>,
}

impl SavedScene {
    pub fn new(elements: Vec<ElementSpec>) -> Self {
        Self {
            version: FORMAT_VERSION,
            elements,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::Persist(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let scene: Self =
            serde_json::from_str(text).map_err(|e| SceneError::Persist(e.to_string()))?;
        scene.check_version()
    }

    /// Compact binary encoding (MessagePack, field names kept).
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| SceneError::Persist(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let scene: Self =
            rmp_serde::from_slice(bytes).map_err(|e| SceneError::Persist(e.to_string()))?;
        scene.check_version()
    }

    fn check_version(self) -> Result<Self> {
        if self.version > FORMAT_VERSION {
            return Err(SceneError::Persist(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        Ok(self)
    }
}

/// Capture the root scope's children with their current frames. With a live
/// host, leaf text/markup is read from the mounted nodes.
pub fn save(
    graph: &SceneGraph,
    frames: &FrameStore,
    dom: Option<&dyn LiveDom>,
) -> Result<SavedScene> {
    let mut elements = Vec::new();
    for id in graph.children(graph.root_id())? {
        let mut spec = graph.capture_subtree(id, dom)?;
        spec.walk_mut(|s| {
            let capture = s
                .id
                .and_then(|id| graph.handle_of(id).ok())
                .and_then(|h| frames.get_frame(h).ok())
                .map(|f| f.capture());
            if let Some(capture) = capture {
                s.frame = capture.properties;
                s.z_order = capture.z_order;
            }
            s.id = None;
        });
        elements.push(spec);
    }
    log::debug!("saved {} top-level elements", elements.len());
    Ok(SavedScene::new(elements))
}
