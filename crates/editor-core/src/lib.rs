//! Page editing session
//!
//! Glues a [`pdf_engine::PdfEngine`] document to a [`surface::Surface`] for the
//! current page and routes pointer and keyboard input to the mounted tool.

pub mod controller;
pub mod tools;

pub use controller::{looks_like_pdf, PageController};
pub use tools::{tool_for, Tool};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no document is open")]
    NoDocument,
    #[error("{0} is not a PDF file")]
    NotPdf(String),
    #[error(transparent)]
    Engine(#[from] pdf_engine::PdfEngineError),
    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
