//! Pointer tools
//!
//! Exactly one tool is mounted on the surface at a time. A tool only sees the
//! gestures and surface events routed to it by the controller.

mod blur;
mod erase;
mod text;

pub use blur::{blur_region, BlurTool, MIN_REGION_SIZE};
pub use erase::EraseTool;
pub use text::{new_text_object, TextTool, EDITING_BACKGROUND, IDLE_BACKGROUND};

use doc_model::ToolKind;
use surface::{Point, Surface, SurfaceEvent};

pub trait Tool {
    fn kind(&self) -> ToolKind;

    fn pointer_down(&mut self, surface: &mut Surface, point: Point);

    fn pointer_move(&mut self, surface: &mut Surface, point: Point);

    fn pointer_up(&mut self, surface: &mut Surface, point: Point);

    fn surface_event(&mut self, _surface: &mut Surface, _event: SurfaceEvent) {}

    /// Whether a pointer-down on an existing object should move or resize it
    /// through the surface's selection handles instead of reaching the tool.
    fn allows_transform(&self) -> bool {
        false
    }

    /// Called before the tool is unmounted so it can settle in-flight gestures.
    fn teardown(&mut self, _surface: &mut Surface) {}
}

pub fn tool_for(kind: ToolKind) -> Box<dyn Tool> {
    match kind {
        ToolKind::Blur => Box::new(BlurTool::default()),
        ToolKind::Erase => Box::new(EraseTool::default()),
        ToolKind::Text => Box::new(TextTool),
    }
}

/// Hand queued surface events to `tool` until the queue stays empty.
pub fn deliver_events(surface: &mut Surface, tool: &mut dyn Tool) {
    loop {
        let events = surface.take_events();
        if events.is_empty() {
            break;
        }
        for event in events {
            tool.surface_event(surface, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_for_builds_matching_kind() {
        for kind in ToolKind::ALL {
            assert_eq!(tool_for(kind).kind(), kind);
        }
    }
}
