//! Software rasterizer used to flatten the overlay for export
//!
//! Rects are drawn with antialiased rounded-rect coverage computed from a
//! signed distance. Glyphs are not rasterized: each text object closes the
//! current image and contributes a [`Layer::Text`] of [`TextLine`]s, so the
//! exporter can write real text while objects keep their stacking order.

use crate::geometry::Point;
use crate::object::{RectShape, Shape, TextShape};
use crate::style::Color;
use crate::Surface;
use image::{ImageBuffer, Rgba};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub baseline: f32,
    pub font_size: f32,
    pub color: Color,
    pub text: String,
}

/// One slice of the overlay, bottom to top.
#[derive(Debug, Clone)]
pub enum Layer {
    /// Full-surface raster of consecutive shapes.
    Image(RgbaImage),
    /// Glyph runs of one text object.
    Text(Vec<TextLine>),
}

#[derive(Debug, Clone)]
pub struct Flattened {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
}

pub fn rasterize(surface: &Surface, scale: f32) -> Flattened {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let width = (surface.width() * scale).ceil().max(1.0) as u32;
    let height = (surface.height() * scale).ceil().max(1.0) as u32;

    let mut layers = Vec::new();
    let mut canvas: Option<Canvas> = None;

    for object in surface.objects() {
        match &object.shape {
            Shape::Rect(rect) => {
                canvas.get_or_insert_with(|| Canvas::new(width, height, scale)).draw_rect(rect)
            }
            Shape::Text(text) => {
                if let Some(background) = text.background {
                    canvas
                        .get_or_insert_with(|| Canvas::new(width, height, scale))
                        .fill_box(text, background);
                }
                let lines: Vec<_> = text_lines_of(text).collect();
                if !lines.is_empty() {
                    if let Some(done) = canvas.take() {
                        done.push_into(&mut layers);
                    }
                    layers.push(Layer::Text(lines));
                }
            }
        }
    }
    if let Some(done) = canvas {
        done.push_into(&mut layers);
    }

    tracing::debug!(
        width,
        height,
        objects = surface.len(),
        layers = layers.len(),
        "rasterized overlay"
    );

    Flattened { width, height, layers }
}

fn text_lines_of(text: &TextShape) -> impl Iterator<Item = TextLine> + '_ {
    text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty()).map(|(index, line)| {
        TextLine {
            x: text.left,
            baseline: text.baseline(index),
            font_size: text.font_size,
            color: text.fill,
            text: line.to_owned(),
        }
    })
}

struct Canvas {
    image: RgbaImage,
    scale: f32,
}

impl Canvas {
    fn new(width: u32, height: u32, scale: f32) -> Self {
        Self { image: RgbaImage::new(width, height), scale }
    }

    /// Fully transparent rasters add nothing to the stack.
    fn push_into(self, layers: &mut Vec<Layer>) {
        if self.image.pixels().any(|pixel| pixel[3] != 0) {
            layers.push(Layer::Image(self.image));
        }
    }

    /// Pixel span covering `[min, max]` in surface units, clamped to the image.
    fn span(&self, min: f32, max: f32, limit: u32) -> std::ops::Range<u32> {
        let start = (min * self.scale).floor().max(0.0) as u32;
        let end = ((max * self.scale).ceil().max(0.0) as u32).min(limit);
        start.min(end)..end
    }

    fn pixel_center(&self, x: u32, y: u32) -> Point {
        Point::new((x as f32 + 0.5) / self.scale, (y as f32 + 0.5) / self.scale)
    }

    fn draw_rect(&mut self, rect: &RectShape) {
        let stroke_half = rect.stroke.map_or(0.0, |stroke| stroke.width / 2.0);
        let glow = rect
            .shadow
            .map_or(0.0, |shadow| shadow.blur + shadow.offset_x.abs().max(shadow.offset_y.abs()));
        let margin = stroke_half.max(glow) + 1.0;

        let (width, height) = self.image.dimensions();
        let xs = self.span(rect.left - margin, rect.left + rect.width + margin, width);
        let ys = self.span(rect.top - margin, rect.top + rect.height + margin, height);

        for y in ys {
            for x in xs.clone() {
                let point = self.pixel_center(x, y);
                let distance = rounded_rect_distance(rect, point);
                let pixel = self.image.get_pixel_mut(x, y);

                if let Some(shadow) = rect.shadow {
                    let shifted = point.offset(-shadow.offset_x, -shadow.offset_y);
                    let shadow_distance = rounded_rect_distance(rect, shifted);
                    let strength = if shadow.blur > 0.0 {
                        (1.0 - shadow_distance / shadow.blur).clamp(0.0, 1.0).powi(2)
                    } else {
                        coverage(shadow_distance, self.scale)
                    };
                    blend(pixel, shadow.color, strength);
                }

                let fill_coverage = coverage(distance, self.scale);
                if fill_coverage > 0.0 {
                    let local = Point::new(point.x - rect.left, point.y - rect.top);
                    blend(pixel, rect.fill.color_at(local), fill_coverage);
                }

                if let Some(stroke) = rect.stroke.filter(|stroke| stroke.width > 0.0) {
                    let band = ((stroke.width / 2.0 - distance.abs()) * self.scale + 0.5)
                        .clamp(0.0, 1.0);
                    blend(pixel, stroke.color, band);
                }
            }
        }
    }

    fn fill_box(&mut self, text: &TextShape, color: Color) {
        let bounds = text.bounds();
        let (width, height) = self.image.dimensions();
        let xs = self.span(bounds.left, bounds.right(), width);
        let ys = self.span(bounds.top, bounds.bottom(), height);

        for y in ys {
            for x in xs.clone() {
                if bounds.contains(self.pixel_center(x, y)) {
                    blend(self.image.get_pixel_mut(x, y), color, 1.0);
                }
            }
        }
    }
}

/// Signed distance from `point` to the rounded rect outline (negative inside).
///
/// Elliptical corners are approximated by a circle of radius `min(rx, ry)`.
fn rounded_rect_distance(rect: &RectShape, point: Point) -> f32 {
    let half_w = rect.width / 2.0;
    let half_h = rect.height / 2.0;
    let radius = rect.rx.min(rect.ry).min(half_w).min(half_h).max(0.0);

    let qx = (point.x - (rect.left + half_w)).abs() - (half_w - radius);
    let qy = (point.y - (rect.top + half_h)).abs() - (half_h - radius);

    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    let inside = qx.max(qy).min(0.0);
    outside + inside - radius
}

/// Antialiased coverage of a pixel whose center lies `distance` units from the edge.
fn coverage(distance: f32, scale: f32) -> f32 {
    (0.5 - distance * scale).clamp(0.0, 1.0)
}

/// Source-over compositing with straight alpha.
fn blend(dst: &mut Rgba<u8>, color: Color, coverage: f32) {
    let src_a = color.alpha() * coverage;
    if src_a <= 0.0 {
        return;
    }

    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }

    let channel = |src: u8, existing: u8| {
        let value = (src as f32 * src_a + existing as f32 * dst_a * (1.0 - src_a)) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };

    *dst = Rgba([
        channel(color.r, dst[0]),
        channel(color.g, dst[1]),
        channel(color.b, dst[2]),
        (out_a * 255.0).round() as u8,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::TextShape;
    use crate::style::{ColorStop, Fill, RadialGradient, Shadow, Stroke};

    fn panel(left: f32, top: f32, width: f32, height: f32) -> RectShape {
        let mut gradient = RadialGradient::new(vec![
            ColorStop::new(0.0, Color::rgba(255, 255, 255, 0.9)),
            ColorStop::new(1.0, Color::rgba(255, 255, 255, 0.5)),
        ]);
        gradient.recenter(width, height);
        RectShape {
            left,
            top,
            width,
            height,
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
        }
    }

    #[test]
    fn image_covers_surface_at_scale() {
        let surface = Surface::new(100.0, 50.0);
        let flattened = surface.rasterize(2.0);

        assert_eq!((flattened.width, flattened.height), (200, 100));
        assert!(flattened.layers.is_empty());
    }

    #[test]
    fn panel_is_opaque_in_the_middle_and_clear_far_away() {
        let mut surface = Surface::new(200.0, 200.0);
        surface.add(Shape::Rect(panel(50.0, 50.0, 100.0, 60.0)));

        let flattened = surface.rasterize(1.0);
        let [Layer::Image(image)] = flattened.layers.as_slice() else {
            panic!("expected a single image layer");
        };

        let center = image.get_pixel(100, 80);
        assert_eq!(&center.0[..3], &[255, 255, 255]);
        assert!(center[3] > 230, "center alpha was {}", center[3]);

        let glow = image.get_pixel(45, 80);
        assert!(glow[3] > 0 && glow[3] < center[3], "glow alpha was {}", glow[3]);

        assert_eq!(image.get_pixel(5, 5)[3], 0);
        assert_eq!(image.get_pixel(199, 199)[3], 0);
    }

    #[test]
    fn rounded_corners_are_cut() {
        let mut rect = panel(0.0, 0.0, 40.0, 40.0);
        rect.shadow = None;
        rect.stroke = None;

        assert!(rounded_rect_distance(&rect, Point::new(20.0, 20.0)) < 0.0);
        assert!(rounded_rect_distance(&rect, Point::new(0.5, 0.5)) > 0.0);
        assert!(rounded_rect_distance(&rect, Point::new(20.0, 0.5)) < 0.0);
    }

    #[test]
    fn text_background_is_rasterized_and_glyphs_are_returned() {
        let mut surface = Surface::new(300.0, 100.0);
        let mut text = TextShape::new(Point::new(20.0, 20.0), "first\n\nthird");
        text.background = Some(Color::rgba(255, 255, 255, 0.4));
        text.padding = 8.0;
        surface.add(Shape::Text(text.clone()));

        let flattened = surface.rasterize(1.0);
        let [Layer::Image(image), Layer::Text(lines)] = flattened.layers.as_slice() else {
            panic!("expected background then glyphs, got {:?}", flattened.layers.len());
        };

        assert_eq!(image.get_pixel(15, 15)[3], 102);
        assert_eq!(image.get_pixel(5, 5)[3], 0);

        let texts: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "third"]);
        assert_eq!(lines[1].baseline, text.baseline(2));
    }

    #[test]
    fn panel_above_text_lands_in_a_later_layer() {
        let mut surface = Surface::new(300.0, 200.0);
        surface.add(Shape::Text(TextShape::new(Point::new(40.0, 40.0), "Secret")));
        surface.add(Shape::Rect(panel(20.0, 20.0, 200.0, 100.0)));

        let flattened = surface.rasterize(1.0);

        assert!(
            matches!(flattened.layers.as_slice(), [Layer::Text(_), Layer::Image(_)]),
            "layers were {:?}",
            flattened.layers
        );
    }

    #[test]
    fn consecutive_rects_share_one_image() {
        let mut surface = Surface::new(300.0, 200.0);
        surface.add(Shape::Rect(panel(10.0, 10.0, 50.0, 50.0)));
        surface.add(Shape::Rect(panel(100.0, 10.0, 50.0, 50.0)));
        surface.add(Shape::Text(TextShape::new(Point::new(10.0, 120.0), "note")));
        surface.add(Shape::Rect(panel(200.0, 100.0, 50.0, 50.0)));

        let flattened = surface.rasterize(1.0);

        assert!(matches!(
            flattened.layers.as_slice(),
            [Layer::Image(_), Layer::Text(_), Layer::Image(_)]
        ));
    }

    #[test]
    fn blend_composites_over_existing_alpha() {
        let mut pixel = Rgba([0, 0, 0, 255]);
        blend(&mut pixel, Color::rgba(255, 255, 255, 0.5), 1.0);

        assert_eq!(pixel[3], 255);
        assert_eq!(pixel[0], 128);
    }
}
