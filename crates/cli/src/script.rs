//! Gesture scripts replayed by `pdf-markup annotate`
//!
//! A script is a JSON document with a `steps` array. Each step is either a
//! bare string (`"next_page"`, `"previous_page"`) or a single-key object:
//!
//! ```json
//! {"steps": [
//!   {"tool": "blur"},
//!   {"drag": {"from": {"x": 40, "y": 40}, "to": {"x": 200, "y": 120}}},
//!   {"tool": "text"},
//!   {"down": {"x": 72, "y": 300}},
//!   {"type": "Approved"},
//!   {"key": "escape"},
//!   "next_page"
//! ]}
//! ```

use anyhow::{Context, Result};
use doc_model::ToolKind;
use editor_core::PageController;
use serde::Deserialize;
use std::path::Path;
use surface::{KeyInput, Point};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Tool(ToolKind),
    Down(Point),
    Move(Point),
    Up(Point),
    Drag { from: Point, to: Point },
    Type(String),
    Key(ScriptKey),
    Page(u32),
    NextPage,
    PreviousPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKey {
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Enter,
    Escape,
    SelectAll,
}

impl From<ScriptKey> for KeyInput {
    fn from(key: ScriptKey) -> Self {
        match key {
            ScriptKey::Backspace => KeyInput::Backspace,
            ScriptKey::Delete => KeyInput::Delete,
            ScriptKey::Left => KeyInput::Left,
            ScriptKey::Right => KeyInput::Right,
            ScriptKey::Home => KeyInput::Home,
            ScriptKey::End => KeyInput::End,
            ScriptKey::Enter => KeyInput::Enter,
            ScriptKey::Escape => KeyInput::Escape,
            ScriptKey::SelectAll => KeyInput::SelectAll,
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse script {}", path.display()))
    }

    pub fn replay(&self, controller: &mut PageController) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            apply(controller, step).with_context(|| format!("script step {} failed", index + 1))?;
        }
        Ok(())
    }
}

fn apply(controller: &mut PageController, step: &Step) -> Result<()> {
    tracing::debug!(?step, "replaying step");

    match step {
        Step::Tool(kind) => controller.select_tool(*kind),
        Step::Down(point) => controller.pointer_down(*point),
        Step::Move(point) => controller.pointer_move(*point),
        Step::Up(point) => controller.pointer_up(*point),
        Step::Drag { from, to } => {
            controller.pointer_down(*from);
            controller.pointer_move(*to);
            controller.pointer_up(*to);
        }
        Step::Type(text) => {
            controller.insert_text(text);
        }
        Step::Key(key) => {
            controller.key_input((*key).into());
        }
        Step::Page(page) => {
            if *page == 0 {
                anyhow::bail!("page numbers are 1-based");
            }
            controller.go_to_page(*page)?;
        }
        Step::NextPage => {
            controller.next_page()?;
        }
        Step::PreviousPage => {
            controller.previous_page()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_step_forms() {
        let script: Script = serde_json::from_str(
            r#"{"steps": [
                {"tool": "text"},
                {"down": {"x": 10, "y": 20.5}},
                {"type": "hi"},
                {"key": "select_all"},
                {"drag": {"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}}},
                {"page": 2},
                "next_page"
            ]}"#,
        )
        .expect("script should parse");

        assert_eq!(
            script.steps,
            vec![
                Step::Tool(ToolKind::Text),
                Step::Down(Point::new(10.0, 20.5)),
                Step::Type("hi".to_owned()),
                Step::Key(ScriptKey::SelectAll),
                Step::Drag { from: Point::new(1.0, 2.0), to: Point::new(3.0, 4.0) },
                Step::Page(2),
                Step::NextPage,
            ]
        );
    }

    #[test]
    fn rejects_unknown_steps() {
        let result = serde_json::from_str::<Script>(r#"{"steps": [{"rotate": 90}]}"#);
        assert!(result.is_err());
    }
}
