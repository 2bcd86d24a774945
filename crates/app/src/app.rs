use crate::input::{fit_zoom, key_input, page_to_screen, screen_to_page};
use doc_model::{Preferences, ToolKind};
use eframe::egui;
use editor_core::PageController;
use std::path::PathBuf;
use storage::Storage;
use surface::object::{ASCENT, AVERAGE_CHAR_WIDTH};
use surface::{Color, Layer, Surface, TextLine, HANDLE_SIZE};

const PAGE_PADDING: f32 = 20.0;

struct ErrorDialogState {
    severity: ErrorSeverity,
    message: String,
}

#[derive(Clone, Copy, PartialEq)]
enum ErrorSeverity {
    Error,
    Info,
}

impl ErrorSeverity {
    fn title(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "Error",
            ErrorSeverity::Info => "Notice",
        }
    }
}

/// Rendered page texture and the key it was rendered for.
struct PageTexture {
    page: u32,
    zoom_percent: u32,
    handle: egui::TextureHandle,
}

enum OverlayLayer {
    Texture(egui::TextureHandle),
    Text(Vec<TextLine>),
}

/// Overlay layers, bottom to top, and the surface revision they reflect.
struct OverlayCache {
    revision: u64,
    zoom_percent: u32,
    layers: Vec<OverlayLayer>,
}

pub struct MarkupApp {
    controller: PageController,
    storage: Option<Storage>,
    page_texture: Option<PageTexture>,
    overlay: Option<OverlayCache>,
    gesture_active: bool,
    error_dialog: Option<ErrorDialogState>,
}

impl MarkupApp {
    pub fn new(controller: PageController, storage: Option<Storage>) -> Self {
        Self {
            controller,
            storage,
            page_texture: None,
            overlay: None,
            gesture_active: false,
            error_dialog: None,
        }
    }

    fn show_message(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        self.error_dialog = Some(ErrorDialogState { severity, message: message.into() });
    }

    fn invalidate_textures(&mut self) {
        self.page_texture = None;
        self.overlay = None;
        self.gesture_active = false;
    }

    fn open_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new().add_filter("PDF", &["pdf"]).pick_file() {
            self.load_pdf(path);
        }
    }

    pub fn load_pdf(&mut self, path: PathBuf) {
        match self.controller.open_path(&path) {
            Ok(()) => self.invalidate_textures(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to open PDF");
                self.show_message(ErrorSeverity::Error, format!("Failed to open PDF: {err}"));
            }
        }
    }

    fn save_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PDF", &["pdf"])
            .set_file_name(self.controller.default_export_name())
            .save_file()
        else {
            return;
        };

        match self.controller.save(&path) {
            Ok(()) => {
                self.show_message(ErrorSeverity::Info, format!("Saved {}", path.display()));
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to save PDF");
                self.show_message(ErrorSeverity::Error, format!("Failed to save PDF: {err}"));
            }
        }
    }

    fn select_tool(&mut self, kind: ToolKind) {
        if self.controller.tool_kind() == kind {
            return;
        }
        self.controller.select_tool(kind);
        self.remember_tool(kind);
    }

    fn remember_tool(&self, kind: ToolKind) {
        let Some(storage) = &self.storage else {
            return;
        };

        let preferences = Preferences { default_tool: kind, ..self.controller.preferences().clone() };
        if let Err(err) = storage.save_preferences(&preferences) {
            tracing::warn!(error = %err, "failed to persist preferences");
        }
    }

    fn change_page(&mut self, forward: bool) {
        let result =
            if forward { self.controller.next_page() } else { self.controller.previous_page() };
        match result {
            Ok(true) => self.invalidate_textures(),
            Ok(false) => {}
            Err(err) => self.show_message(ErrorSeverity::Error, err.to_string()),
        }
    }
}

impl eframe::App for MarkupApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.handle_keyboard(ctx);
        self.draw_toolbar(ctx);
        self.draw_viewport(ctx);
        self.draw_error_dialog(ctx);
    }
}

impl MarkupApp {
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| {
            i.raw.dropped_files.iter().find_map(|file| file.path.clone())
        });
        if let Some(path) = dropped {
            self.load_pdf(path);
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if self.error_dialog.is_some() {
            if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                self.error_dialog = None;
            }
            return;
        }

        let editing = self.controller.surface().and_then(Surface::editing).is_some();
        if !editing {
            return;
        }

        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::Text(text) | egui::Event::Paste(text) => {
                    self.controller.insert_text(&text);
                }
                egui::Event::Key { key, pressed: true, modifiers, .. } => {
                    if let Some(key) = key_input(key, modifiers) {
                        self.controller.key_input(key);
                    }
                }
                _ => {}
            }
        }
    }

    fn draw_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.add_space(8.0);

                if ui.button("📂 Upload").clicked() {
                    self.open_file();
                }

                ui.separator();

                let has_document = self.controller.has_document();
                ui.add_enabled_ui(has_document, |ui| {
                    for kind in ToolKind::ALL {
                        let selected = self.controller.tool_kind() == kind;
                        if ui.selectable_label(selected, kind.label()).clicked() {
                            self.select_tool(kind);
                        }
                    }

                    ui.separator();

                    let state = self.controller.state();
                    let (has_previous, has_next) = (state.has_previous_page(), state.has_next_page());

                    if ui.add_enabled(has_previous, egui::Button::new("◀")).clicked() {
                        self.change_page(false);
                    }

                    let page_text = if has_document {
                        format!(
                            "Page {} of {}",
                            self.controller.current_page(),
                            self.controller.page_count()
                        )
                    } else {
                        "No document".to_owned()
                    };
                    ui.label(page_text);

                    if ui.add_enabled(has_next, egui::Button::new("▶")).clicked() {
                        self.change_page(true);
                    }

                    ui.separator();

                    if ui.button("💾 Save").clicked() {
                        self.save_file();
                    }
                });
            });
        });
    }

    fn page_texture(&mut self, ctx: &egui::Context, zoom: f32) -> Option<egui::TextureId> {
        let page = self.controller.current_page();
        let zoom_percent = (zoom * 100.0).round() as u32;

        let stale = self
            .page_texture
            .as_ref()
            .map_or(true, |texture| texture.page != page || texture.zoom_percent != zoom_percent);

        if stale {
            let scale = zoom * ctx.pixels_per_point();
            match self.controller.render_page(scale) {
                Ok(image) => {
                    let size = [image.width() as usize, image.height() as usize];
                    let color_image =
                        egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
                    let handle = ctx.load_texture(
                        format!("page_{page}_{zoom_percent}"),
                        color_image,
                        egui::TextureOptions::LINEAR,
                    );
                    self.page_texture = Some(PageTexture { page, zoom_percent, handle });
                }
                Err(err) => {
                    tracing::warn!(page, error = %err, "failed to render page");
                    return None;
                }
            }
        }

        self.page_texture.as_ref().map(|texture| texture.handle.id())
    }

    fn refresh_overlay(&mut self, ctx: &egui::Context, zoom: f32) {
        let Some(surface) = self.controller.surface() else {
            return;
        };
        let revision = surface.revision();
        let zoom_percent = (zoom * 100.0).round() as u32;

        let stale = self.overlay.as_ref().map_or(true, |cache| {
            cache.revision != revision || cache.zoom_percent != zoom_percent
        });

        if stale {
            let flattened = surface.rasterize(zoom * ctx.pixels_per_point());
            let layers = flattened
                .layers
                .into_iter()
                .enumerate()
                .map(|(index, layer)| match layer {
                    Layer::Image(image) => {
                        let size = [image.width() as usize, image.height() as usize];
                        let color_image =
                            egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
                        OverlayLayer::Texture(ctx.load_texture(
                            format!("overlay-{index}"),
                            color_image,
                            egui::TextureOptions::LINEAR,
                        ))
                    }
                    Layer::Text(lines) => OverlayLayer::Text(lines),
                })
                .collect();
            self.overlay = Some(OverlayCache { revision, zoom_percent, layers });
        }
    }

    fn draw_viewport(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Ok(page_size) = self.controller.page_size() else {
                ui.centered_and_justified(|ui| {
                    ui.heading("Upload a PDF to get started");
                });
                return;
            };

            let available = ui.available_size();
            let zoom = fit_zoom((page_size.width_pt, page_size.height_pt), available, PAGE_PADDING);
            let size = egui::vec2(page_size.width_pt * zoom, page_size.height_pt * zoom);

            let page_texture = self.page_texture(ctx, zoom);
            self.refresh_overlay(ctx, zoom);

            let padding_x = ((available.x - size.x) / 2.0).max(0.0);
            let padding_y = ((available.y - size.y) / 2.0).max(0.0);
            ui.add_space(padding_y);
            ui.horizontal(|ui| {
                ui.add_space(padding_x);
                let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                let painter = ui.painter_at(rect);

                if let Some(texture) = page_texture {
                    painter.image(texture, rect, uv, egui::Color32::WHITE);
                }
                if let Some(overlay) = &self.overlay {
                    for layer in &overlay.layers {
                        match layer {
                            OverlayLayer::Texture(texture) => {
                                painter.image(texture.id(), rect, uv, egui::Color32::WHITE);
                            }
                            OverlayLayer::Text(lines) => paint_text(&painter, lines, rect.min, zoom),
                        }
                    }
                }
                if let Some(surface) = self.controller.surface() {
                    paint_caret(&painter, surface, rect.min, zoom);
                    paint_selection(&painter, surface, rect.min, zoom);
                }

                self.forward_pointer(ui, &response, rect, zoom);
            });
        });
    }

    fn forward_pointer(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: egui::Rect,
        zoom: f32,
    ) {
        let (pressed, released, moving, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.is_moving(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else {
            return;
        };
        let point = screen_to_page(pos, rect.min, zoom);

        if pressed && response.hovered() {
            self.gesture_active = true;
            self.controller.pointer_down(point);
        } else if self.gesture_active && released {
            self.gesture_active = false;
            self.controller.pointer_up(point);
        } else if self.gesture_active && moving {
            self.controller.pointer_move(point);
        }
    }

    fn draw_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &self.error_dialog else {
            return;
        };

        let title = dialog.severity.title();
        let message = dialog.message.clone();

        let mut should_close = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            });

        if should_close {
            self.error_dialog = None;
        }
    }
}

fn color32(color: Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Glyph runs of one text layer, drawn between the rasters below and above it.
fn paint_text(painter: &egui::Painter, lines: &[TextLine], origin: egui::Pos2, zoom: f32) {
    for line in lines {
        let font = egui::FontId::proportional(line.font_size * zoom);
        let top = line.baseline - line.font_size * ASCENT;
        let pos = page_to_screen(surface::Point::new(line.x, top), origin, zoom);
        painter.text(pos, egui::Align2::LEFT_TOP, &line.text, font, color32(line.color));
    }
}

fn paint_caret(painter: &egui::Painter, surface: &Surface, origin: egui::Pos2, zoom: f32) {
    let Some(text) = surface.editing().and_then(|id| surface.text(id)) else {
        return;
    };

    let mut remaining = text.cursor();
    let mut line_index = 0;
    let mut column = 0;
    for (index, line) in text.lines().enumerate() {
        let len = line.chars().count();
        line_index = index;
        column = remaining.min(len);
        if remaining <= len {
            break;
        }
        remaining -= len + 1;
    }

    let advance = text.font_size * AVERAGE_CHAR_WIDTH;
    let x = text.left + column as f32 * advance;
    let top = text.baseline(line_index) - text.font_size * ASCENT;
    let bottom = top + text.font_size * text.line_height;

    let stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);
    painter.line_segment(
        [
            page_to_screen(surface::Point::new(x, top), origin, zoom),
            page_to_screen(surface::Point::new(x, bottom), origin, zoom),
        ],
        stroke,
    );

    if text.selection().is_some() {
        let bounds = text.content_bounds();
        let rect = egui::Rect::from_min_max(
            page_to_screen(surface::Point::new(bounds.left, bounds.top), origin, zoom),
            page_to_screen(surface::Point::new(bounds.right(), bounds.bottom()), origin, zoom),
        );
        painter.rect_filled(rect, 0.0, egui::Color32::from_rgba_unmultiplied(0, 120, 215, 60));
    }
}

/// Outline and corner handles of the active object.
fn paint_selection(painter: &egui::Painter, surface: &Surface, origin: egui::Pos2, zoom: f32) {
    let Some(bounds) = surface.active().and_then(|id| surface.bounds_of(id)) else {
        return;
    };

    let accent = egui::Color32::from_rgb(0, 120, 215);
    let rect = egui::Rect::from_min_max(
        page_to_screen(surface::Point::new(bounds.left, bounds.top), origin, zoom),
        page_to_screen(surface::Point::new(bounds.right(), bounds.bottom()), origin, zoom),
    );
    painter.rect_stroke(rect, 0.0, egui::Stroke::new(1.0, accent), egui::StrokeKind::Middle);

    for corner in surface::Corner::ALL {
        let center = page_to_screen(bounds.corner(corner), origin, zoom);
        let handle = egui::Rect::from_center_size(center, egui::Vec2::splat(HANDLE_SIZE * zoom));
        painter.rect_filled(handle, 0.0, egui::Color32::WHITE);
        painter.rect_stroke(handle, 0.0, egui::Stroke::new(1.0, accent), egui::StrokeKind::Middle);
    }
}
