//! Paint styles for overlay objects

use crate::geometry::Point;

/// RGBA color with straight (non-premultiplied) alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    /// CSS-style constructor with a fractional alpha.
    pub fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Self {
        Self { r, g, b, a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8 }
    }

    pub fn alpha(&self) -> f32 {
        self.a as f32 / 255.0
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

impl ColorStop {
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Radial gradient between two concentric circles.
///
/// `center` is relative to the owning object's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub center: Point,
    pub r1: f32,
    pub r2: f32,
    pub stops: Vec<ColorStop>,
}

impl RadialGradient {
    pub fn new(stops: Vec<ColorStop>) -> Self {
        let mut stops = stops;
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self { center: Point::default(), r1: 0.0, r2: 0.0, stops }
    }

    /// Center the gradient in a `width` x `height` box, reaching the longer side.
    pub fn recenter(&mut self, width: f32, height: f32) {
        self.center = Point::new(width / 2.0, height / 2.0);
        self.r2 = width.max(height) / 2.0;
    }

    pub fn color_at(&self, local: Point) -> Color {
        let distance = local.distance_to(self.center);
        let t = if self.r2 > self.r1 {
            ((distance - self.r1) / (self.r2 - self.r1)).clamp(0.0, 1.0)
        } else {
            1.0
        };
        sample_stops(&self.stops, t)
    }
}

fn sample_stops(stops: &[ColorStop], t: f32) -> Color {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Color::TRANSPARENT;
    };

    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }

    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.offset {
            let span = hi.offset - lo.offset;
            let local = if span > 0.0 { (t - lo.offset) / span } else { 1.0 };
            return lo.color.lerp(hi.color, local);
        }
    }

    last.color
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Color),
    Radial(RadialGradient),
}

impl Fill {
    pub fn color_at(&self, local: Point) -> Color {
        match self {
            Fill::Solid(color) => *color,
            Fill::Radial(gradient) => gradient.color_at(local),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

/// Glow drawn behind an object, fading out over `blur` units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(alpha: f32) -> Color {
        Color::rgba(255, 255, 255, alpha)
    }

    #[test]
    fn rgba_rounds_fractional_alpha() {
        assert_eq!(Color::rgba(255, 255, 255, 0.5).a, 128);
        assert_eq!(Color::rgba(0, 0, 0, 2.0).a, 255);
    }

    #[test]
    fn radial_gradient_interpolates_between_stops() {
        let mut gradient = RadialGradient::new(vec![
            ColorStop::new(1.0, white(0.5)),
            ColorStop::new(0.0, white(0.9)),
            ColorStop::new(0.5, white(0.7)),
        ]);
        gradient.recenter(100.0, 40.0);

        assert_eq!(gradient.center, Point::new(50.0, 20.0));
        assert_eq!(gradient.r2, 50.0);
        assert_eq!(gradient.color_at(Point::new(50.0, 20.0)), white(0.9));
        assert_eq!(gradient.color_at(Point::new(75.0, 20.0)), white(0.7));
        assert_eq!(gradient.color_at(Point::new(0.0, 0.0)), white(0.5));
    }

    #[test]
    fn collapsed_gradient_uses_outer_stop() {
        let gradient = RadialGradient::new(vec![
            ColorStop::new(0.0, Color::BLACK),
            ColorStop::new(1.0, Color::WHITE),
        ]);

        assert_eq!(gradient.color_at(Point::default()), Color::WHITE);
    }
}
