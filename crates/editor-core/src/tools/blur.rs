use super::Tool;
use doc_model::ToolKind;
use surface::{
    Bounds, Color, ColorStop, Fill, ObjectId, Point, RadialGradient, RectShape, Shadow, Shape,
    Stroke, Surface,
};

/// Regions thinner than this on either side are dropped when the drag ends.
pub const MIN_REGION_SIZE: f32 = 1.0;

/// A zero-sized frosted panel anchored at `origin`.
pub fn blur_region(origin: Point) -> Shape {
    let gradient = RadialGradient::new(vec![
        ColorStop::new(0.0, Color::rgba(255, 255, 255, 0.9)),
        ColorStop::new(0.5, Color::rgba(255, 255, 255, 0.7)),
        ColorStop::new(1.0, Color::rgba(255, 255, 255, 0.5)),
    ]);

    Shape::Rect(RectShape {
        left: origin.x,
        top: origin.y,
        width: 0.0,
        height: 0.0,
        rx: 10.0,
        ry: 10.0,
        fill: Fill::Radial(gradient),
        stroke: Some(Stroke { color: Color::rgba(255, 255, 255, 0.5), width: 2.0 }),
        shadow: Some(Shadow {
            color: Color::rgba(255, 255, 255, 0.8),
            blur: 15.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }),
    })
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    id: ObjectId,
    start: Point,
}

/// Drags out frosted panels.
#[derive(Debug, Default)]
pub struct BlurTool {
    drag: Option<Drag>,
}

impl BlurTool {
    pub fn is_drawing(&self) -> bool {
        self.drag.is_some()
    }

    fn finish(&mut self, surface: &mut Surface) {
        let Some(drag) = self.drag.take() else {
            return;
        };

        match surface.bounds_of(drag.id) {
            Some(bounds) if bounds.width < MIN_REGION_SIZE || bounds.height < MIN_REGION_SIZE => {
                surface.remove(drag.id);
                tracing::debug!(object = drag.id.raw(), "dropped degenerate blur region");
            }
            Some(bounds) => {
                tracing::debug!(
                    object = drag.id.raw(),
                    width = bounds.width,
                    height = bounds.height,
                    "blur region placed"
                );
            }
            None => {}
        }
    }
}

impl Tool for BlurTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Blur
    }

    fn pointer_down(&mut self, surface: &mut Surface, point: Point) {
        self.finish(surface);
        let id = surface.add(blur_region(point));
        surface.set_active(Some(id));
        self.drag = Some(Drag { id, start: point });
    }

    fn pointer_move(&mut self, surface: &mut Surface, point: Point) {
        let Some(drag) = self.drag else {
            return;
        };

        match surface.get_mut(drag.id).and_then(|object| object.shape.as_rect_mut()) {
            Some(rect) => rect.set_frame(Bounds::from_corners(drag.start, point)),
            // Erased or cleared underneath us.
            None => self.drag = None,
        }
    }

    fn pointer_up(&mut self, surface: &mut Surface, _point: Point) {
        self.finish(surface);
    }

    fn allows_transform(&self) -> bool {
        true
    }

    fn teardown(&mut self, surface: &mut Surface) {
        self.finish(surface);
    }
}
