//! PDF Markup - desktop editor
//!
//! eframe shell around the page controller: upload a PDF, blur, erase or
//! annotate the current page, and save the edited copy.

mod app;
mod input;

use anyhow::Context;
use app::MarkupApp;
use clap::Parser;
use doc_model::Preferences;
use eframe::egui;
use editor_core::PageController;
use std::path::PathBuf;
use storage::Storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "pdf-markup-editor")]
struct Args {
    /// PDF to open on startup.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Directory holding preferences.json (defaults to the platform config dir).
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let storage = Storage::resolve(args.config_dir.as_deref()).ok();
    let loaded = storage.as_ref().map(Storage::load_preferences);

    let log_filter = match &loaded {
        Some(Ok(preferences)) => preferences.log_filter.as_str(),
        _ => "info",
    };
    init_logging(log_filter);

    let preferences = match loaded {
        Some(Ok(preferences)) => preferences,
        Some(Err(err)) => {
            tracing::warn!(error = %err, "ignoring unreadable preferences");
            Preferences::default()
        }
        None => {
            tracing::warn!("no configuration directory, preferences will not persist");
            Preferences::default()
        }
    };

    let controller = PageController::new(pdf_engine::default_engine(), preferences);
    let mut app = MarkupApp::new(controller, storage);
    if let Some(file) = args.file {
        app.load_pdf(file);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 900.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("PDF Markup")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    tracing::info!("starting editor");
    eframe::run_native("PDF Markup", options, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("editor window failed")
}

fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
