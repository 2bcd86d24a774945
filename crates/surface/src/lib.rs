//! Overlay drawing surface
//!
//! A retained-mode vector canvas sized to one PDF page. It owns the overlay
//! objects (rects and editable text), answers hit-tests, provides move/resize
//! handles and a text editing session, and flattens itself to a raster for
//! export.

pub mod geometry;
pub mod object;
pub mod raster;
pub mod style;
mod surface;

pub use geometry::{Bounds, Corner, Point};
pub use object::{ObjectId, OverlayObject, RectShape, Shape, TextShape};
pub use raster::{Flattened, Layer, RgbaImage, TextLine};
pub use style::{Color, ColorStop, Fill, RadialGradient, Shadow, Stroke};
pub use surface::{KeyInput, Surface, SurfaceEvent, HANDLE_SIZE};
