//! Overlay objects held by a [`Surface`](crate::Surface)

use crate::geometry::{Bounds, Point};
use crate::style::{Color, Fill, Shadow, Stroke};

/// Average glyph advance as a fraction of the font size, used to estimate
/// text extents without font metrics.
pub const AVERAGE_CHAR_WIDTH: f32 = 0.55;

/// Baseline of the first line below the text origin, as a fraction of the font size.
pub const ASCENT: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) u64);

impl ObjectId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectShape {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub rx: f32,
    pub ry: f32,
    pub fill: Fill,
    pub stroke: Option<Stroke>,
    pub shadow: Option<Shadow>,
}

impl RectShape {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.left, self.top, self.width, self.height)
    }

    /// Move and resize to `bounds`, keeping a radial fill centered.
    pub fn set_frame(&mut self, bounds: Bounds) {
        self.left = bounds.left;
        self.top = bounds.top;
        self.width = bounds.width;
        self.height = bounds.height;

        if let Fill::Radial(gradient) = &mut self.fill {
            gradient.recenter(bounds.width, bounds.height);
        }
    }
}

/// Editable text with a caret and an optional selection, both in char indices.
#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    pub left: f32,
    pub top: f32,
    pub text: String,
    pub font_size: f32,
    pub font_family: String,
    pub fill: Color,
    pub background: Option<Color>,
    pub padding: f32,
    pub min_width: f32,
    pub line_height: f32,
    cursor: usize,
    selection: Option<(usize, usize)>,
}

impl TextShape {
    pub fn new(origin: Point, text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self {
            left: origin.x,
            top: origin.y,
            text,
            font_size: 16.0,
            font_family: "Helvetica".to_owned(),
            fill: Color::BLACK,
            background: None,
            padding: 0.0,
            min_width: 0.0,
            line_height: 1.16,
            cursor,
            selection: None,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Estimated extent of the glyphs, without padding.
    pub fn content_bounds(&self) -> Bounds {
        let longest = self.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let width = (longest as f32 * self.font_size * AVERAGE_CHAR_WIDTH).max(self.min_width);
        let height = self.line_count() as f32 * self.font_size * self.line_height;
        Bounds::new(self.left, self.top, width, height)
    }

    pub fn bounds(&self) -> Bounds {
        self.content_bounds().inflate(self.padding)
    }

    /// Baseline y of line `index` in surface units.
    pub fn baseline(&self, index: usize) -> f32 {
        self.top + self.font_size * (ASCENT + index as f32 * self.line_height)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selection(&self) -> Option<(usize, usize)> {
        self.selection
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn select_all(&mut self) {
        let len = self.char_len();
        self.selection = (len > 0).then_some((0, len));
        self.cursor = len;
    }

    pub fn insert(&mut self, value: &str) {
        self.delete_selection();
        let at = self.byte_index(self.cursor);
        self.text.insert_str(at, value);
        self.cursor += value.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.delete_selection() || self.cursor == 0 {
            return;
        }
        let start = self.byte_index(self.cursor - 1);
        let end = self.byte_index(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
    }

    pub fn delete_forward(&mut self) {
        if self.delete_selection() || self.cursor >= self.char_len() {
            return;
        }
        let start = self.byte_index(self.cursor);
        let end = self.byte_index(self.cursor + 1);
        self.text.replace_range(start..end, "");
    }

    pub fn move_left(&mut self) {
        match self.selection.take() {
            Some((start, _)) => self.cursor = start,
            None => self.cursor = self.cursor.saturating_sub(1),
        }
    }

    pub fn move_right(&mut self) {
        match self.selection.take() {
            Some((_, end)) => self.cursor = end,
            None => self.cursor = (self.cursor + 1).min(self.char_len()),
        }
    }

    pub fn move_home(&mut self) {
        self.selection = None;
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.selection = None;
        self.cursor = self.char_len();
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn delete_selection(&mut self) -> bool {
        let Some((start, end)) = self.selection.take() else {
            return false;
        };
        let (start_byte, end_byte) = (self.byte_index(start), self.byte_index(end));
        self.text.replace_range(start_byte..end_byte, "");
        self.cursor = start;
        true
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text.char_indices().nth(char_index).map_or(self.text.len(), |(byte, _)| byte)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect(RectShape),
    Text(TextShape),
}

impl Shape {
    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Rect(rect) => rect.bounds(),
            Shape::Text(text) => text.bounds(),
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            Shape::Rect(rect) => {
                rect.left += dx;
                rect.top += dy;
            }
            Shape::Text(text) => {
                text.left += dx;
                text.top += dy;
            }
        }
    }

    pub fn as_text(&self) -> Option<&TextShape> {
        match self {
            Shape::Text(text) => Some(text),
            Shape::Rect(_) => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextShape> {
        match self {
            Shape::Text(text) => Some(text),
            Shape::Rect(_) => None,
        }
    }

    pub fn as_rect_mut(&mut self) -> Option<&mut RectShape> {
        match self {
            Shape::Rect(rect) => Some(rect),
            Shape::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Shape::Text(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayObject {
    pub id: ObjectId,
    pub shape: Shape,
    /// Whether selection handles may move or resize the object.
    pub selectable: bool,
}

impl OverlayObject {
    pub fn bounds(&self) -> Bounds {
        self.shape.bounds()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.bounds().contains(point)
    }
}
