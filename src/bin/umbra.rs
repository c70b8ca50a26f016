//! CLI binary for umbra-pdf.
//!
//! A thin shim over the library crate: maps CLI flags to a `JobConfig`,
//! runs one conversion job against a filesystem-backed store, and prints
//! the resulting URLs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use umbra_pdf::{
    convert, FsStore, JobConfig, Lifecycle, ObjectStore, ResolutionTier, SourceDocument,
};

#[derive(Parser, Debug)]
#[command(
    name = "umbra",
    version,
    about = "Convert PDF documents to dark mode",
    long_about = "Rasterises each page, swaps white backgrounds for dark grey and black \
                  text for white, and repacks the pages into a new PDF. Artifacts are \
                  staged in a store directory; the converted document and a first-page \
                  preview are kept, everything else is cleaned up."
)]
struct Cli {
    /// Input PDF files, processed as one job in the given order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Rasterisation quality: low (300 DPI), medium (600), high (900).
    #[arg(short, long, value_enum, default_value = "low")]
    quality: Quality,

    /// Directory used as the object store.
    #[arg(short, long, default_value = "./umbra-store", env = "UMBRA_STORE_DIR")]
    store_dir: PathBuf,

    /// Worker concurrency limit (default: min(cores, 16)).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keep running after conversion so the preview retention timer and
    /// the periodic store sweep can fire.
    #[arg(long)]
    serve_lifecycle: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Quality {
    Low,
    Medium,
    High,
}

impl From<Quality> for ResolutionTier {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Low => ResolutionTier::Low,
            Quality::Medium => ResolutionTier::Medium,
            Quality::High => ResolutionTier::High,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut builder = JobConfig::builder().resolution(cli.quality.into());
    if let Some(workers) = cli.workers {
        builder = builder.workers(workers);
    }
    let config = builder.build().context("invalid configuration")?;

    let mut sources = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no filename in '{}'", path.display()))?;
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            bail!("'{}' is not a .pdf file", path.display());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        sources.push(SourceDocument::new(filename, bytes));
    }

    let store: Arc<dyn ObjectStore> = Arc::new(
        FsStore::open(&cli.store_dir)
            .await
            .context("failed to open store directory")?,
    );
    let lifecycle = Lifecycle::new(Arc::clone(&store));
    let sweep = cli
        .serve_lifecycle
        .then(|| lifecycle.start_sweep(config.sweep_interval));

    let output = convert(store, &lifecycle, sources, &config).await?;

    println!("document: {}", output.converted_document_url);
    println!("preview:  {}", output.preview_image_url);
    if output.report.is_degraded() {
        eprintln!(
            "warning: degraded result — {}/{} pages converted, {} document(s) skipped",
            output.report.pages_converted,
            output.report.pages_total,
            output.report.documents_skipped.len()
        );
        for doc in &output.report.documents_skipped {
            eprintln!("  skipped {}: {}", doc.key, doc.reason);
        }
        for failure in &output.report.failed {
            eprintln!("  {failure}");
        }
    }

    if let Some(sweep) = sweep {
        eprintln!("lifecycle tasks running; press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
        sweep.stop();
    }

    Ok(())
}
