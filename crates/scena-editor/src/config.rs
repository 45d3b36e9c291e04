//! Editor configuration.

use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};

/// Which appended elements end up selected once an append settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendSelection {
    /// The first top-level appended element.
    #[default]
    First,
    /// Every top-level appended element.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub append_selection: AppendSelection,
    pub initial_zoom: f64,
    pub initial_tool: ToolKind,
    /// Wait for embedded media before selecting appended elements.
    pub wait_for_media: bool,
    pub history_depth: usize,
    /// Offer the overlay's delete button while something is selected.
    pub delete_button: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            append_selection: AppendSelection::First,
            initial_zoom: 1.0,
            initial_tool: ToolKind::Move,
            wait_for_media: true,
            history_depth: 100,
            delete_button: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config =
            EditorConfig::from_json(r#"{"append_selection": "all", "initial_tool": "crop"}"#)
                .unwrap();
        assert_eq!(config.append_selection, AppendSelection::All);
        assert_eq!(config.initial_tool, ToolKind::Crop);
        assert_eq!(config.initial_zoom, 1.0);
        assert_eq!(config.history_depth, 100);
        assert!(config.delete_button);
    }

    #[test]
    fn rejects_unknown_tool() {
        assert!(EditorConfig::from_json(r#"{"initial_tool": "lasso"}"#).is_err());
    }
}
