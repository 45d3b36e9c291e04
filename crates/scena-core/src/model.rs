//! Element records and the specs they are built from.
//!
//! An `ElementSpec` is the detached, serializable shape of a subtree: what
//! callers append, what `remove` hands back, and what save/load persists.
//! An `ElementRecord` is the registered node living in the scene graph.

use crate::frame::FrameCapture;
use crate::id::{ElementId, Handle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Content ──────────────────────────────────────────────────────────────

/// What a node renders. Decided when the element is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Editable plain content; its snapshot is live text.
    Plain { tag: String },
    /// Non-editable content; its snapshot is live markup.
    Markup { tag: String },
    /// A registered component reference, rendered by the host. No snapshot.
    Component { component: String },
}

impl Content {
    pub fn plain(tag: impl Into<String>) -> Self {
        Content::Plain { tag: tag.into() }
    }

    pub fn markup(tag: impl Into<String>) -> Self {
        Content::Markup { tag: tag.into() }
    }

    pub fn component(name: impl Into<String>) -> Self {
        Content::Component {
            component: name.into(),
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Content::Component { .. })
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Content::Plain { .. })
    }

    /// Tag or component name.
    pub fn reference(&self) -> &str {
        match self {
            Content::Plain { tag } | Content::Markup { tag } => tag,
            Content::Component { component } => component,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::markup("div")
    }
}

/// Text or markup captured from a live node. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSnapshot {
    #[default]
    None,
    Text(String),
    Html(String),
}

impl ContentSnapshot {
    pub fn is_none(&self) -> bool {
        matches!(self, ContentSnapshot::None)
    }
}

// ─── Specs ────────────────────────────────────────────────────────────────

/// A detached subtree. Ids are never persisted; a fresh one is assigned on
/// append when `id` is empty or already taken.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    #[serde(skip)]
    pub id: Option<ElementId>,
    pub name: String,
    pub content: Content,
    pub attrs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "ContentSnapshot::is_none")]
    pub snapshot: ContentSnapshot,
    pub frame: Vec<(String, String)>,
    #[serde(skip_serializing_if = "is_zero")]
    pub z_order: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

impl ElementSpec {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    pub fn plain(tag: &str) -> Self {
        Self::new(Content::plain(tag))
    }

    pub fn markup(tag: &str) -> Self {
        Self::new(Content::markup(tag))
    }

    pub fn component(name: &str) -> Self {
        Self::new(Content::component(name))
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(ElementId::intern(id));
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.snapshot = ContentSnapshot::Text(text.to_string());
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.snapshot = ContentSnapshot::Html(html.to_string());
        self
    }

    pub fn with_frame(mut self, name: &str, value: &str) -> Self {
        self.frame.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn frame_capture(&self) -> FrameCapture {
        FrameCapture {
            properties: self.frame.clone(),
            z_order: self.z_order,
        }
    }

    /// Visit every spec of the subtree in pre-order.
    pub fn walk_mut(&mut self, mut f: impl FnMut(&mut ElementSpec)) {
        let mut stack: Vec<&mut ElementSpec> = vec![self];
        while let Some(spec) = stack.pop() {
            f(spec);
            stack.extend(spec.children.iter_mut().rev());
        }
    }

    /// Number of specs in the subtree, including this one.
    pub fn count(&self) -> usize {
        let mut n = 0;
        let mut stack = vec![self];
        while let Some(spec) = stack.pop() {
            n += 1;
            stack.extend(spec.children.iter());
        }
        n
    }

    /// Same subtree with every id cleared.
    pub fn without_ids(mut self) -> Self {
        self.walk_mut(|spec| spec.id = None);
        self
    }
}

// ─── Records ──────────────────────────────────────────────────────────────

/// A registered scene node. Children order lives in the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub id: ElementId,
    pub name: String,
    pub content: Content,
    /// Containing scope; `None` only for the root.
    pub scope: Option<ElementId>,
    /// Excludes the id attribute and `style`.
    pub attrs: BTreeMap<String, String>,
    pub snapshot: ContentSnapshot,
    /// Live node once mounted.
    pub handle: Option<Handle>,
}

impl ElementRecord {
    pub fn new(id: ElementId, content: Content) -> Self {
        Self {
            id,
            name: String::new(),
            content,
            scope: None,
            attrs: BTreeMap::new(),
            snapshot: ContentSnapshot::None,
            handle: None,
        }
    }

    pub(crate) fn from_spec(id: ElementId, spec: &ElementSpec, scope: ElementId) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            content: spec.content.clone(),
            scope: Some(scope),
            attrs: spec.attrs.clone(),
            snapshot: spec.snapshot.clone(),
            handle: None,
        }
    }
}
