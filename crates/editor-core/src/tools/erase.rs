use super::Tool;
use doc_model::ToolKind;
use surface::{Point, Surface};

/// Removes whatever the pointer sweeps over while the button is held.
#[derive(Debug, Default)]
pub struct EraseTool {
    erasing: bool,
}

impl EraseTool {
    pub fn is_erasing(&self) -> bool {
        self.erasing
    }
}

impl Tool for EraseTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Erase
    }

    fn pointer_down(&mut self, _surface: &mut Surface, _point: Point) {
        self.erasing = true;
    }

    fn pointer_move(&mut self, surface: &mut Surface, point: Point) {
        if !self.erasing {
            return;
        }

        let hits = surface.objects_at(point);
        for id in hits {
            surface.remove(id);
            tracing::debug!(object = id.raw(), "erased overlay object");
        }
    }

    fn pointer_up(&mut self, _surface: &mut Surface, _point: Point) {
        self.erasing = false;
    }

    fn teardown(&mut self, _surface: &mut Surface) {
        self.erasing = false;
    }
}
