use super::Tool;
use doc_model::ToolKind;
use surface::{Color, Point, Shape, Surface, SurfaceEvent, TextShape};

pub const IDLE_BACKGROUND: Color = Color { r: 255, g: 255, b: 255, a: 102 };
pub const EDITING_BACKGROUND: Color = Color { r: 255, g: 255, b: 255, a: 204 };

const FONT_SIZE: f32 = 16.0;
const PADDING: f32 = 8.0;
const MIN_WIDTH: f32 = 150.0;
const LINE_HEIGHT: f32 = 1.16;

/// Empty text box styled the way the text tool inserts it.
pub fn new_text_object(origin: Point) -> Shape {
    let mut text = TextShape::new(origin, "");
    text.font_size = FONT_SIZE;
    text.font_family = "Helvetica".to_owned();
    text.fill = Color::BLACK;
    text.background = Some(IDLE_BACKGROUND);
    text.padding = PADDING;
    text.min_width = MIN_WIDTH;
    text.line_height = LINE_HEIGHT;
    Shape::Text(text)
}

/// Places and edits text boxes. Boxes left empty are discarded.
#[derive(Debug, Default)]
pub struct TextTool;

impl Tool for TextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Text
    }

    fn pointer_down(&mut self, surface: &mut Surface, point: Point) {
        let existing = surface.find_target(point).filter(|id| surface.text(*id).is_some());

        if let Some(id) = existing {
            surface.enter_editing(id);
            surface.set_active(Some(id));
            return;
        }

        let id = surface.add(new_text_object(point));
        surface.set_active(Some(id));
        surface.enter_editing(id);
        surface.select_all();
        tracing::debug!(object = id.raw(), x = point.x, y = point.y, "text box inserted");
    }

    fn pointer_move(&mut self, _surface: &mut Surface, _point: Point) {}

    fn pointer_up(&mut self, _surface: &mut Surface, _point: Point) {}

    fn surface_event(&mut self, surface: &mut Surface, event: SurfaceEvent) {
        match event {
            SurfaceEvent::TextEditingEntered(id) => {
                if let Some(text) = surface.text_mut(id) {
                    text.background = Some(EDITING_BACKGROUND);
                }
            }
            SurfaceEvent::TextEditingExited(id) => {
                let blank = surface.text(id).is_some_and(|text| text.text.trim().is_empty());
                if blank {
                    surface.remove(id);
                    tracing::debug!(object = id.raw(), "discarded empty text box");
                } else if let Some(text) = surface.text_mut(id) {
                    text.background = Some(IDLE_BACKGROUND);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::deliver_events;
    use surface::KeyInput;

    fn type_text(surface: &mut Surface, value: &str) {
        for ch in value.chars() {
            surface.handle_key(KeyInput::Char(ch));
        }
    }

    #[test]
    fn background_alphas_match_the_styling() {
        assert_eq!(IDLE_BACKGROUND, Color::rgba(255, 255, 255, 0.4));
        assert_eq!(EDITING_BACKGROUND, Color::rgba(255, 255, 255, 0.8));
    }

    #[test]
    fn click_on_empty_space_inserts_and_edits_a_box() {
        let mut surface = Surface::new(612.0, 792.0);
        let mut tool = TextTool;

        tool.pointer_down(&mut surface, Point::new(72.0, 100.0));
        deliver_events(&mut surface, &mut tool);

        let id = surface.editing().expect("new box should be in edit mode");
        assert_eq!(surface.active(), Some(id));
        let text = surface.text(id).expect("text object");
        assert_eq!((text.left, text.top), (72.0, 100.0));
        assert_eq!(text.font_size, 16.0);
        assert_eq!(text.min_width, 150.0);
        assert_eq!(text.background, Some(EDITING_BACKGROUND));
    }

    #[test]
    fn leaving_a_blank_box_removes_it() {
        let mut surface = Surface::new(612.0, 792.0);
        let mut tool = TextTool;

        tool.pointer_down(&mut surface, Point::new(10.0, 10.0));
        type_text(&mut surface, "   ");
        surface.exit_editing();
        deliver_events(&mut surface, &mut tool);

        assert!(surface.is_empty());
    }

    #[test]
    fn leaving_a_filled_box_restores_idle_background() {
        let mut surface = Surface::new(612.0, 792.0);
        let mut tool = TextTool;

        tool.pointer_down(&mut surface, Point::new(10.0, 10.0));
        type_text(&mut surface, "Signed");
        let id = surface.exit_editing().expect("was editing");
        deliver_events(&mut surface, &mut tool);

        let text = surface.text(id).expect("box kept");
        assert_eq!(text.text, "Signed");
        assert_eq!(text.background, Some(IDLE_BACKGROUND));
    }

    #[test]
    fn click_on_existing_text_resumes_editing_it() {
        let mut surface = Surface::new(612.0, 792.0);
        let mut tool = TextTool;

        tool.pointer_down(&mut surface, Point::new(10.0, 10.0));
        type_text(&mut surface, "note");
        let id = surface.exit_editing().expect("was editing");
        deliver_events(&mut surface, &mut tool);

        tool.pointer_down(&mut surface, Point::new(20.0, 15.0));
        deliver_events(&mut surface, &mut tool);

        assert_eq!(surface.len(), 1);
        assert_eq!(surface.editing(), Some(id));
        assert_eq!(surface.text(id).and_then(|text| text.background), Some(EDITING_BACKGROUND));
    }
}
