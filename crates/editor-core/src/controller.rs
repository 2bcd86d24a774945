use crate::tools::{deliver_events, tool_for, Tool};
use crate::EditorError;
use doc_model::{apply_editor_action, EditorAction, EditorState, Preferences, ToolKind};
use pdf_engine::{
    stamp_overlay, DocumentHandle, OpenSource, OverlayStamp, PageSize, PdfEngine, RenderRequest,
    RgbaImage, StampLayer, TextRun,
};
use std::path::{Path, PathBuf};
use surface::{KeyInput, Layer, Point, Surface, TextLine};

/// How far into the file the `%PDF-` header may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|chunk| chunk == b"%PDF-")
}

/// One open document, the overlay for its current page, and the mounted tool.
pub struct PageController {
    engine: Box<dyn PdfEngine>,
    preferences: Preferences,
    state: EditorState,
    handle: Option<DocumentHandle>,
    surface: Option<Surface>,
    tool: Box<dyn Tool>,
}

impl PageController {
    pub fn new(engine: Box<dyn PdfEngine>, preferences: Preferences) -> Self {
        let tool_kind = preferences.default_tool;
        Self {
            engine,
            preferences,
            state: EditorState::with_tool(tool_kind),
            handle: None,
            surface: None,
            tool: tool_for(tool_kind),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn tool_kind(&self) -> ToolKind {
        self.tool.kind()
    }

    pub fn has_document(&self) -> bool {
        self.handle.is_some()
    }

    pub fn current_page(&self) -> u32 {
        self.state.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.state.page_count()
    }

    pub fn default_export_name(&self) -> &str {
        self.preferences.effective_export_file_name()
    }

    pub fn page_size(&self) -> Result<PageSize, EditorError> {
        let handle = self.handle.ok_or(EditorError::NoDocument)?;
        Ok(self.engine.page_size(handle, self.state.page_index())?)
    }

    pub fn open_path(&mut self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|source| EditorError::Io { path: path.to_path_buf(), source })?;
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.open_document(title, Some(path.to_path_buf()), bytes)
    }

    pub fn open_bytes(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<(), EditorError> {
        self.open_document(name.into(), None, bytes)
    }

    fn open_document(
        &mut self,
        title: String,
        path: Option<PathBuf>,
        bytes: Vec<u8>,
    ) -> Result<(), EditorError> {
        if !looks_like_pdf(&bytes) {
            tracing::warn!(%title, "rejected file without a PDF header");
            return Err(EditorError::NotPdf(title));
        }

        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let page_count = match self.engine.page_count(handle) {
            Ok(count) => count,
            Err(err) => {
                let _ = self.engine.close(handle);
                return Err(err.into());
            }
        };

        self.release_document();
        self.handle = Some(handle);
        apply_editor_action(
            &mut self.state,
            EditorAction::OpenDocument { title: title.clone(), path, page_count },
        );
        tracing::info!(%title, page_count, "opened document");

        self.mount_surface()
    }

    pub fn close_document(&mut self) {
        self.release_document();
        apply_editor_action(&mut self.state, EditorAction::CloseDocument);
    }

    /// Settle the tool, drop the surface and close the engine handle.
    fn release_document(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.exit_editing();
            deliver_events(surface, self.tool.as_mut());
            self.tool.teardown(surface);
        }
        self.surface = None;

        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.engine.close(handle) {
                tracing::warn!(handle = handle.raw(), error = %err, "failed to close document");
            }
        }
    }

    /// Create a fresh surface sized to the current page and mount a fresh tool on it.
    fn mount_surface(&mut self) -> Result<(), EditorError> {
        let size = self.page_size()?;
        if let Some(surface) = self.surface.as_mut() {
            surface.exit_editing();
            deliver_events(surface, self.tool.as_mut());
            self.tool.teardown(surface);
        }

        let mut surface = Surface::new(size.width_pt, size.height_pt);
        self.tool = tool_for(self.state.tool);
        deliver_events(&mut surface, self.tool.as_mut());
        self.surface = Some(surface);

        tracing::debug!(
            page = self.state.current_page,
            width = size.width_pt,
            height = size.height_pt,
            tool = %self.state.tool,
            "mounted page surface"
        );
        Ok(())
    }

    pub fn select_tool(&mut self, kind: ToolKind) {
        if self.tool.kind() == kind {
            return;
        }

        if let Some(surface) = self.surface.as_mut() {
            surface.exit_editing();
            deliver_events(surface, self.tool.as_mut());
            self.tool.teardown(surface);
            deliver_events(surface, self.tool.as_mut());
        }

        apply_editor_action(&mut self.state, EditorAction::SelectTool(kind));
        self.tool = tool_for(kind);
        tracing::debug!(tool = %kind, "tool selected");
    }

    pub fn next_page(&mut self) -> Result<bool, EditorError> {
        self.change_page(EditorAction::NextPage)
    }

    pub fn previous_page(&mut self) -> Result<bool, EditorError> {
        self.change_page(EditorAction::PreviousPage)
    }

    /// Jump to 1-based `page`, clamped to the document.
    pub fn go_to_page(&mut self, page: u32) -> Result<bool, EditorError> {
        self.change_page(EditorAction::SetCurrentPage(page))
    }

    fn change_page(&mut self, action: EditorAction) -> Result<bool, EditorError> {
        let handle = self.handle.ok_or(EditorError::NoDocument)?;
        if !apply_editor_action(&mut self.state, action).page_changed {
            return Ok(false);
        }

        let size = self.engine.page_size(handle, self.state.page_index())?;
        let reusable = self.surface.as_ref().is_some_and(|surface| {
            surface.size() == (size.width_pt.max(1.0), size.height_pt.max(1.0))
        });

        if reusable {
            if let Some(surface) = self.surface.as_mut() {
                surface.exit_editing();
                deliver_events(surface, self.tool.as_mut());
                self.tool.teardown(surface);
                surface.clear();
                deliver_events(surface, self.tool.as_mut());
            }
            tracing::debug!(page = self.state.current_page, "cleared overlay for page change");
        } else {
            self.mount_surface()?;
        }

        Ok(true)
    }

    pub fn pointer_down(&mut self, point: Point) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        if let Some(editing) = surface.editing() {
            if !surface.contains_point(editing, point) {
                surface.exit_editing();
                deliver_events(surface, self.tool.as_mut());
            }
        }

        if self.tool.allows_transform() && surface.begin_transform(point) {
            deliver_events(surface, self.tool.as_mut());
            return;
        }

        self.tool.pointer_down(surface, point);
        deliver_events(surface, self.tool.as_mut());
    }

    pub fn pointer_move(&mut self, point: Point) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        if surface.is_transforming() {
            surface.update_transform(point);
        } else {
            self.tool.pointer_move(surface, point);
        }
        deliver_events(surface, self.tool.as_mut());
    }

    pub fn pointer_up(&mut self, point: Point) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        if surface.end_transform().is_none() {
            self.tool.pointer_up(surface, point);
        }
        deliver_events(surface, self.tool.as_mut());
    }

    /// Feed a key to the text editing session. Returns whether it was consumed.
    pub fn key_input(&mut self, key: KeyInput) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };

        let consumed = surface.handle_key(key);
        deliver_events(surface, self.tool.as_mut());
        consumed
    }

    /// Type `text` into the editing session, mapping newlines to Enter.
    pub fn insert_text(&mut self, text: &str) -> bool {
        let mut consumed = false;
        for ch in text.chars() {
            let key = if ch == '\n' { KeyInput::Enter } else { KeyInput::Char(ch) };
            consumed |= self.key_input(key);
        }
        consumed
    }

    pub fn render_page(&self, scale: f32) -> Result<RgbaImage, EditorError> {
        let handle = self.handle.ok_or(EditorError::NoDocument)?;
        let request = RenderRequest { page_index: self.state.page_index(), scale };
        Ok(self.engine.render_page(handle, request)?)
    }

    /// Flatten the overlay and stamp it onto the current page of the source document.
    pub fn export(&mut self) -> Result<Vec<u8>, EditorError> {
        let handle = self.handle.ok_or(EditorError::NoDocument)?;
        let surface = self.surface.as_mut().ok_or(EditorError::NoDocument)?;

        if surface.exit_editing().is_some() {
            deliver_events(surface, self.tool.as_mut());
        }

        let flattened = surface.rasterize(self.preferences.effective_export_scale());
        let layers = flattened
            .layers
            .into_iter()
            .map(|layer| match layer {
                Layer::Image(image) => StampLayer::Image(image),
                Layer::Text(lines) => StampLayer::Text(lines.into_iter().map(text_run).collect()),
            })
            .collect();
        let stamp = OverlayStamp { layers };

        let page_index = self.state.page_index();
        let source = self.engine.document_bytes(handle)?;
        let bytes = stamp_overlay(source, page_index, &stamp)?;

        tracing::info!(
            page = self.state.current_page,
            objects = surface.len(),
            bytes = bytes.len(),
            "exported document"
        );
        Ok(bytes)
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let path = path.as_ref();
        let bytes = self.export()?;
        std::fs::write(path, bytes)
            .map_err(|source| EditorError::Io { path: path.to_path_buf(), source })?;
        tracing::info!(path = %path.display(), "saved document");
        Ok(())
    }
}

fn text_run(line: TextLine) -> TextRun {
    TextRun {
        x: line.x,
        baseline: line.baseline,
        font_size: line.font_size,
        color: [line.color.r, line.color.g, line.color.b],
        text: line.text,
    }
}
