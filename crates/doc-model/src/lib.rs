use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_EXPORT_FILE_NAME: &str = "edited-document.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Blur,
    Erase,
    Text,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Blur, ToolKind::Erase, ToolKind::Text];

    pub fn label(self) -> &'static str {
        match self {
            ToolKind::Blur => "Blur",
            ToolKind::Erase => "Erase",
            ToolKind::Text => "Text",
        }
    }

    fn key(self) -> &'static str {
        match self {
            ToolKind::Blur => "blur",
            ToolKind::Erase => "erase",
            ToolKind::Text => "text",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool `{0}` (expected blur, erase or text)")]
pub struct ParseToolError(String);

impl FromStr for ToolKind {
    type Err = ParseToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|tool| tool.key().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseToolError(value.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    pub title: String,
    pub path: Option<PathBuf>,
    pub page_count: u32,
}

/// What the editor is looking at: which document, which page (1-based) and
/// which tool is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    pub document: Option<DocumentState>,
    pub current_page: u32,
    pub tool: ToolKind,
}

impl Default for EditorState {
    fn default() -> Self {
        Self { document: None, current_page: 1, tool: ToolKind::default() }
    }
}

impl EditorState {
    pub fn with_tool(tool: ToolKind) -> Self {
        Self { tool, ..Self::default() }
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |document| document.page_count)
    }

    pub fn has_previous_page(&self) -> bool {
        self.document.is_some() && self.current_page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.page_count()
    }

    /// Zero-based index of the current page.
    pub fn page_index(&self) -> u32 {
        self.current_page.saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    OpenDocument { title: String, path: Option<PathBuf>, page_count: u32 },
    CloseDocument,
    SelectTool(ToolKind),
    SetCurrentPage(u32),
    NextPage,
    PreviousPage,
}

/// Which parts of the state an action actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transition {
    pub document_changed: bool,
    pub page_changed: bool,
    pub tool_changed: bool,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        !(self.document_changed || self.page_changed || self.tool_changed)
    }
}

pub fn apply_editor_action(state: &mut EditorState, action: EditorAction) -> Transition {
    let previous_page = state.current_page;
    let mut transition = Transition::default();

    match action {
        EditorAction::OpenDocument { title, path, page_count } => {
            state.document = Some(DocumentState { title, path, page_count: page_count.max(1) });
            state.current_page = 1;
            transition.document_changed = true;
        }
        EditorAction::CloseDocument => {
            transition.document_changed = state.document.take().is_some();
            state.current_page = 1;
        }
        EditorAction::SelectTool(tool) => {
            transition.tool_changed = state.tool != tool;
            state.tool = tool;
        }
        EditorAction::SetCurrentPage(page) => {
            if state.document.is_some() {
                state.current_page = page.clamp(1, state.page_count().max(1));
            }
        }
        EditorAction::NextPage => {
            if state.has_next_page() {
                state.current_page += 1;
            }
        }
        EditorAction::PreviousPage => {
            if state.has_previous_page() {
                state.current_page -= 1;
            }
        }
    }

    transition.page_changed = transition.document_changed || state.current_page != previous_page;
    transition
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_tool: ToolKind,
    pub export_file_name: String,
    /// Overlay raster resolution relative to page points.
    pub export_scale: f32,
    pub log_filter: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_tool: ToolKind::Blur,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_owned(),
            export_scale: 2.0,
            log_filter: "info".to_owned(),
        }
    }
}

impl Preferences {
    pub fn effective_export_scale(&self) -> f32 {
        if self.export_scale.is_finite() {
            self.export_scale.clamp(0.5, 4.0)
        } else {
            1.0
        }
    }

    pub fn effective_export_file_name(&self) -> &str {
        let name = self.export_file_name.trim();
        if name.is_empty() {
            DEFAULT_EXPORT_FILE_NAME
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(state: &mut EditorState, page_count: u32) -> Transition {
        apply_editor_action(
            state,
            EditorAction::OpenDocument {
                path: Some(PathBuf::from("/tmp/test.pdf")),
                title: "test.pdf".to_owned(),
                page_count,
            },
        )
    }

    #[test]
    fn opening_a_document_resets_to_first_page() {
        let mut state = EditorState::default();
        open(&mut state, 4);
        apply_editor_action(&mut state, EditorAction::SetCurrentPage(3));

        let transition = open(&mut state, 2);

        assert!(transition.document_changed);
        assert!(transition.page_changed);
        assert_eq!(state.current_page, 1);
        assert_eq!(state.page_count(), 2);
    }

    #[test]
    fn next_page_is_clamped_to_document_bounds() {
        let mut state = EditorState::default();
        open(&mut state, 2);

        assert!(apply_editor_action(&mut state, EditorAction::NextPage).page_changed);
        assert!(!apply_editor_action(&mut state, EditorAction::NextPage).page_changed);
        assert_eq!(state.current_page, 2);
    }

    #[test]
    fn previous_page_stops_at_first_page() {
        let mut state = EditorState::default();
        open(&mut state, 3);

        let transition = apply_editor_action(&mut state, EditorAction::PreviousPage);
        assert!(transition.is_noop());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn set_current_page_is_clamped_to_document_bounds() {
        let mut state = EditorState::default();
        open(&mut state, 3);

        apply_editor_action(&mut state, EditorAction::SetCurrentPage(100));
        assert_eq!(state.current_page, 3);

        apply_editor_action(&mut state, EditorAction::SetCurrentPage(0));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn navigation_without_document_is_ignored() {
        let mut state = EditorState::default();

        assert!(apply_editor_action(&mut state, EditorAction::NextPage).is_noop());
        assert!(apply_editor_action(&mut state, EditorAction::SetCurrentPage(5)).is_noop());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn selecting_the_same_tool_is_a_noop() {
        let mut state = EditorState::with_tool(ToolKind::Text);

        assert!(apply_editor_action(&mut state, EditorAction::SelectTool(ToolKind::Text)).is_noop());
        assert!(apply_editor_action(&mut state, EditorAction::SelectTool(ToolKind::Erase)).tool_changed);
        assert_eq!(state.tool, ToolKind::Erase);
    }

    #[test]
    fn closing_a_document_reports_change_once() {
        let mut state = EditorState::default();
        open(&mut state, 2);

        assert!(apply_editor_action(&mut state, EditorAction::CloseDocument).document_changed);
        assert!(!apply_editor_action(&mut state, EditorAction::CloseDocument).document_changed);
        assert_eq!(state.page_count(), 0);
    }

    #[test]
    fn tool_kind_parses_case_insensitively() {
        assert_eq!("Blur".parse::<ToolKind>(), Ok(ToolKind::Blur));
        assert_eq!(" text ".parse::<ToolKind>(), Ok(ToolKind::Text));
        assert!("lasso".parse::<ToolKind>().is_err());
        assert_eq!(ToolKind::Erase.to_string(), "erase");
    }

    #[test]
    fn preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{ "default_tool": "text" }"#).expect("partial prefs parse");

        assert_eq!(prefs.default_tool, ToolKind::Text);
        assert_eq!(prefs.export_file_name, DEFAULT_EXPORT_FILE_NAME);
    }

    #[test]
    fn export_settings_are_sanitized() {
        let prefs = Preferences {
            export_scale: 40.0,
            export_file_name: "   ".to_owned(),
            ..Preferences::default()
        };

        assert_eq!(prefs.effective_export_scale(), 4.0);
        assert_eq!(prefs.effective_export_file_name(), DEFAULT_EXPORT_FILE_NAME);
    }
}
