use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod stamp;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use stamp::{stamp_overlay, OverlayStamp, StampLayer, TextRun};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

impl RenderRequest {
    /// Pixel dimensions of the rendered page for the given page size.
    pub fn pixel_size(&self, page: PageSize) -> (u32, u32) {
        let scale = if self.scale <= 0.0 { 1.0 } else { self.scale };
        let width = (page.width_pt * scale).round().max(1.0) as u32;
        let height = (page.height_pt * scale).round().max(1.0) as u32;
        (width, height)
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// The unmodified bytes the document was opened from.
    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let size = media_box(&doc, object_id)
                .map(|[x0, y0, x1, y1]| PageSize {
                    width_pt: (x1 - x0).abs(),
                    height_pt: (y1 - y0).abs(),
                })
                .unwrap_or(DEFAULT_PAGE_SIZE);

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { bytes, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    /// Placeholder raster: a white page with a light border. Real page
    /// content needs the `pdfium` backend.
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let (width, height) = request.pixel_size(page_size);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Resolve a page's MediaBox, following the inheritance chain through `Parent`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Some(rect) = dict.get(b"MediaBox").ok().and_then(|obj| rect_of(doc, obj)) {
            return Some(rect);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

fn rect_of(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    Some([
        array[0].as_float().ok()?,
        array[1].as_float().ok()?,
        array[2].as_float().ok()?,
        array[3].as_float().ok()?,
    ])
}

/// Look up an inheritable page attribute (e.g. `Resources`) on the page or its ancestors.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let dict: &Dictionary = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Rasterizes real page content through PDFium. Document bookkeeping and
    /// stamping stay on lopdf.
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|err| {
                        PdfEngineError::Backend(format!("failed to bind pdfium library: {err}"))
                    })?;

            Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::default() })
        }
    }

    fn backend(err: PdfiumError) -> PdfEngineError {
        PdfEngineError::Backend(err.to_string())
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let page_size = self.inner.page_size(handle, request.page_index)?;
            let (width, height) = request.pixel_size(page_size);
            let bytes = self.inner.document_bytes(handle)?;

            let document = self.pdfium.load_pdf_from_byte_slice(bytes, None).map_err(backend)?;
            let page = document.pages().get(request.page_index as u16).map_err(backend)?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            RgbaImage::from_raw(
                bitmap.width() as u32,
                bitmap.height() as u32,
                bitmap.as_rgba_bytes(),
            )
            .ok_or_else(|| PdfEngineError::Backend("bitmap size mismatch".to_owned()))
        }

        fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
            self.inner.document_bytes(handle)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }
}

/// The engine front ends should use: PDFium when compiled in and loadable,
/// lopdf otherwise.
#[cfg(feature = "pdfium")]
pub fn default_engine() -> Box<dyn PdfEngine> {
    match pdfium_backend::PdfiumEngine::from_system_library() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            tracing::warn!(%err, "falling back to placeholder page rendering");
            Box::new(LopdfEngine::new())
        }
    }
}

#[cfg(not(feature = "pdfium"))]
pub fn default_engine() -> Box<dyn PdfEngine> {
    Box::new(LopdfEngine::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::blank_pdf;

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(blank_pdf(&[(612.0, 792.0)])))
            .expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 1);
    }

    #[test]
    fn reads_per_page_media_boxes() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(blank_pdf(&[(612.0, 792.0), (842.0, 595.0)])))
            .expect("open should succeed");

        let second = engine.page_size(handle, 1).expect("page size should resolve");
        assert_eq!(second, PageSize { width_pt: 842.0, height_pt: 595.0 });

        let err = engine.page_size(handle, 2).expect_err("page 2 is out of range");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 2, page_count: 2 }));
    }

    #[test]
    fn render_page_matches_scaled_page_size() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(blank_pdf(&[(100.0, 50.0)])))
            .expect("open should succeed");

        let image = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 2.0 })
            .expect("page should render");

        assert_eq!(image.dimensions(), (200, 100));
    }

    #[test]
    fn document_bytes_are_the_source_bytes() {
        let bytes = blank_pdf(&[(612.0, 792.0)]);
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes.clone())).expect("open should succeed");

        assert_eq!(engine.document_bytes(handle).expect("bytes should exist"), bytes.as_slice());
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn closed_handle_is_invalid() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(blank_pdf(&[(612.0, 792.0)])))
            .expect("open should succeed");

        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.close(handle), Err(PdfEngineError::InvalidHandle(_))));
    }

    #[test]
    fn rejects_encrypted_marker() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"%PDF-1.4\n1 0 obj << /Encrypt 2 0 R >> endobj".to_vec()))
            .expect_err("encrypted marker should be rejected");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn rejects_garbage() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"not a pdf at all".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }
}
