use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::Preferences;
use editor_core::PageController;
use pdf_engine::{default_engine, OpenSource};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use storage::{Storage, StorageError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod script;

use script::Script;

#[derive(Debug, Parser)]
#[command(name = "pdf-markup")]
#[command(about = "Blur, erase and annotate PDF pages from the command line")]
pub struct Cli {
    /// Directory holding preferences.json (defaults to the platform config dir).
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay a gesture script against a PDF and write the edited copy.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let preferences = load_preferences(cli.config_dir.as_deref());
    let filter = preferences.as_ref().map_or("info", |prefs| prefs.log_filter.as_str());
    init_logging(filter);
    let preferences = preferences?;

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Annotate { file, script, output } => {
            run_annotate(&file, &script, output.as_deref(), preferences)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_preferences(config_dir: Option<&Path>) -> Result<Preferences> {
    let storage = match Storage::resolve(config_dir) {
        Ok(storage) => storage,
        Err(StorageError::NoConfigDirectory) => return Ok(Preferences::default()),
        Err(err) => return Err(err.into()),
    };

    storage.load_preferences().with_context(|| {
        format!("failed to load preferences from {}", storage.preferences_path().display())
    })
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_annotate(
    file: &Path,
    script: &Path,
    output: Option<&Path>,
    preferences: Preferences,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let script = Script::load(script)?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_output(file, preferences.effective_export_file_name()));

    let mut controller = PageController::new(default_engine(), preferences);
    controller.open_path(file).context("failed to open PDF")?;
    script.replay(&mut controller)?;

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    controller
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        steps = script.steps.len(),
        page = controller.current_page(),
        output = %output.display(),
        "annotation complete"
    );
    println!("{}", output.display());

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_output(file: &Path, export_name: &str) -> PathBuf {
    file.parent().map_or_else(|| PathBuf::from(export_name), |dir| dir.join(export_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output(Path::new("/docs/scan.pdf"), "edited-document.pdf"),
            PathBuf::from("/docs/edited-document.pdf")
        );
        assert_eq!(
            default_output(Path::new("scan.pdf"), "out.pdf"),
            PathBuf::from("out.pdf")
        );
    }

    #[test]
    fn config_dir_is_accepted_after_the_subcommand() {
        let cli = Cli::parse_from(["pdf-markup", "info", "a.pdf", "--config-dir", "/tmp/prefs"]);
        assert_eq!(cli.config_dir.as_deref(), Some(Path::new("/tmp/prefs")));
    }
}
