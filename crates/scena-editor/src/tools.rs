//! Tool modes and pointer routing.
//!
//! The active tool decides how a drag start on the canvas is treated (veto
//! the rubber band, select directly, or let it run) and what a click on the
//! manipulation overlay does.
//!
//! | Tool | Drag start inside editable text | Manipulator flags |
//! |------|---------------------------------|-------------------|
//! | Move | rubber band runs                | none              |
//! | Text | selects the text element, stops | text pass-through |
//! | Crop | rubber band runs                | clippable         |

use scena_core::{Handle, SceneGraph};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Move,
    Text,
    Crop,
}

impl ToolKind {
    pub fn clippable(self) -> bool {
        self == ToolKind::Crop
    }

    pub fn text_mode(self) -> bool {
        self == ToolKind::Text
    }
}

/// A drag-start candidate reported by the picking widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragStart {
    /// Node under the pointer, if it is a mounted element.
    pub target: Option<Handle>,
    /// A trusted touch start (scrolling gesture on touch screens).
    pub trusted_touch: bool,
    /// The pointer is on the manipulation overlay itself.
    pub on_manipulator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragDecision {
    Proceed,
    Stop,
    /// Stop the rubber band and select this element directly.
    StopAndSelect(Handle),
}

/// Decide what a drag start does under `tool`.
pub fn decide_drag_start(tool: ToolKind, graph: &SceneGraph, start: &DragStart) -> DragDecision {
    if start.trusted_touch || start.on_manipulator {
        return DragDecision::Stop;
    }
    if tool.text_mode()
        && let Some(editable) = start.target.and_then(|t| editable_ancestor(graph, t))
    {
        return DragDecision::StopAndSelect(editable);
    }
    DragDecision::Proceed
}

/// The closest mounted editable element at or above `handle`.
pub fn editable_ancestor(graph: &SceneGraph, handle: Handle) -> Option<Handle> {
    let mut id = graph.id_of_handle(handle).ok()?;
    loop {
        let record = graph.get_by_id(id).ok()?;
        if record.content.is_editable() && !id.is_root() {
            return record.handle;
        }
        id = record.scope?;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Switch to the text tool and focus this element.
    EditText(Handle),
    /// Let the picking widget treat it as a click.
    Forward,
}

/// Route a click on the manipulation overlay.
pub fn route_click(graph: &SceneGraph, target: Option<Handle>, double: bool) -> ClickAction {
    if double && let Some(editable) = target.and_then(|t| editable_ancestor(graph, t)) {
        return ClickAction::EditText(editable);
    }
    ClickAction::Forward
}

#[cfg(test)]
mod tests {
    use super::*;
    use scena_core::{ElementSpec, MemoryDom};

    fn scene() -> (SceneGraph, Handle, Handle, Handle) {
        let mut graph = SceneGraph::new();
        let ids = graph
            .append(
                vec![
                    ElementSpec::plain("p").with_child(ElementSpec::markup("b")),
                    ElementSpec::markup("img"),
                ],
                None,
                None,
            )
            .unwrap()
            .ids;
        let mut dom = MemoryDom::new();
        graph.remount(&mut dom);
        let p = graph.handle_of(ids[0]).unwrap();
        let bold = graph.handle_of(graph.children(ids[0]).unwrap()[0]).unwrap();
        let img = graph.handle_of(ids[1]).unwrap();
        (graph, p, bold, img)
    }

    fn start(target: Option<Handle>) -> DragStart {
        DragStart {
            target,
            trusted_touch: false,
            on_manipulator: false,
        }
    }

    #[test]
    fn text_tool_selects_editable_container() {
        let (graph, p, bold, img) = scene();
        assert_eq!(
            decide_drag_start(ToolKind::Text, &graph, &start(Some(bold))),
            DragDecision::StopAndSelect(p)
        );
        assert_eq!(
            decide_drag_start(ToolKind::Text, &graph, &start(Some(img))),
            DragDecision::Proceed
        );
        assert_eq!(
            decide_drag_start(ToolKind::Move, &graph, &start(Some(bold))),
            DragDecision::Proceed
        );
    }

    #[test]
    fn touch_and_overlay_are_vetoed() {
        let (graph, _, _, img) = scene();
        let mut touch = start(Some(img));
        touch.trusted_touch = true;
        assert_eq!(decide_drag_start(ToolKind::Move, &graph, &touch), DragDecision::Stop);
        let mut overlay = start(None);
        overlay.on_manipulator = true;
        assert_eq!(decide_drag_start(ToolKind::Crop, &graph, &overlay), DragDecision::Stop);
    }

    #[test]
    fn double_click_on_text_edits() {
        let (graph, p, _, img) = scene();
        assert_eq!(route_click(&graph, Some(p), true), ClickAction::EditText(p));
        assert_eq!(route_click(&graph, Some(p), false), ClickAction::Forward);
        assert_eq!(route_click(&graph, Some(img), true), ClickAction::Forward);
    }
}
