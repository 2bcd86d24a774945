//! Mapping from egui input to editor input

use eframe::egui;
use surface::{KeyInput, Point};

/// Screen position to page units, for a page drawn at `origin` with `zoom` points per unit.
pub fn screen_to_page(pos: egui::Pos2, origin: egui::Pos2, zoom: f32) -> Point {
    let zoom = if zoom > 0.0 { zoom } else { 1.0 };
    Point::new((pos.x - origin.x) / zoom, (pos.y - origin.y) / zoom)
}

pub fn page_to_screen(point: Point, origin: egui::Pos2, zoom: f32) -> egui::Pos2 {
    egui::pos2(origin.x + point.x * zoom, origin.y + point.y * zoom)
}

/// Editing keys. Printable characters arrive separately as text events.
pub fn key_input(key: egui::Key, modifiers: egui::Modifiers) -> Option<KeyInput> {
    let key = match key {
        egui::Key::A if modifiers.command => KeyInput::SelectAll,
        egui::Key::Backspace => KeyInput::Backspace,
        egui::Key::Delete => KeyInput::Delete,
        egui::Key::ArrowLeft => KeyInput::Left,
        egui::Key::ArrowRight => KeyInput::Right,
        egui::Key::Home => KeyInput::Home,
        egui::Key::End => KeyInput::End,
        egui::Key::Enter => KeyInput::Enter,
        egui::Key::Escape => KeyInput::Escape,
        _ => return None,
    };
    Some(key)
}

/// Page zoom that fits `page` inside `available`, leaving `padding` on each side.
pub fn fit_zoom(page: (f32, f32), available: egui::Vec2, padding: f32) -> f32 {
    let width = (available.x - padding * 2.0).max(100.0);
    let height = (available.y - padding * 2.0).max(100.0);
    (width / page.0.max(1.0)).min(height / page.1.max(1.0)).clamp(0.25, 4.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_and_page_coordinates_round_trip() {
        let origin = egui::pos2(100.0, 50.0);
        let point = screen_to_page(egui::pos2(300.0, 250.0), origin, 2.0);

        assert_eq!(point, Point::new(100.0, 100.0));
        assert_eq!(page_to_screen(point, origin, 2.0), egui::pos2(300.0, 250.0));
    }

    #[test]
    fn command_a_selects_all_but_plain_a_is_text() {
        assert_eq!(key_input(egui::Key::A, egui::Modifiers::COMMAND), Some(KeyInput::SelectAll));
        assert_eq!(key_input(egui::Key::A, egui::Modifiers::NONE), None);
        assert_eq!(key_input(egui::Key::Enter, egui::Modifiers::NONE), Some(KeyInput::Enter));
    }

    #[test]
    fn fit_zoom_uses_the_tighter_axis() {
        let zoom = fit_zoom((612.0, 792.0), egui::vec2(1000.0, 832.0), 20.0);
        assert_eq!(zoom, 1.0);
    }
}
