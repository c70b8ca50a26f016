//! # umbra-pdf
//!
//! Convert PDF documents to dark mode.
//!
//! ## Why this crate?
//!
//! Reading white-background PDFs at night is unpleasant, and viewer-level
//! color filters invert photographs and diagrams along with the text.
//! Instead this crate rasterises each page, swaps exactly two colors —
//! pure white backgrounds become dark grey, pure black text becomes
//! white — and rebuilds an equivalent PDF. Anti-aliased edges and
//! mid-tone content pass through untouched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Stage      upload sources to the object store
//!  ├─ 2. Raster     render pages to PNG via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Transform  swap white ↔ near-black per page (compute-bound batches)
//!  ├─ 4. Assemble   wrap each page into a one-page PDF (I/O-bound batches)
//!  ├─ 5. Repack     merge fragments in page order, purge intermediates
//!  └─ 6. Deliver    presigned URLs + first-page preview with deferred deletion
//! ```
//!
//! Every artifact lives in an [`store::ObjectStore`]; a [`lifecycle::Lifecycle`]
//! reaps the retained preview after a retention window and sweeps the whole
//! store on an interval as a leak backstop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use umbra_pdf::{convert, FsStore, JobConfig, Lifecycle, ObjectStore, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Arc<dyn ObjectStore> = Arc::new(FsStore::open("./store").await?);
//!     let lifecycle = Lifecycle::new(Arc::clone(&store));
//!     let _sweep = lifecycle.start_sweep(std::time::Duration::from_secs(3600));
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let output = convert(
//!         store,
//!         &lifecycle,
//!         vec![SourceDocument::new("report.pdf", bytes)],
//!         &JobConfig::default(),
//!     )
//!     .await?;
//!
//!     println!("document: {}", output.converted_document_url);
//!     println!("preview:  {}", output.preview_image_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `umbra` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! umbra-pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, ResolutionTier};
pub use convert::{convert, JobStage, SourceDocument};
pub use error::{PageError, UmbraError};
pub use keys::PageKey;
pub use lifecycle::{Lifecycle, TaskHandle};
pub use output::{ConversionOutput, JobReport, SkippedDocument, StageTimings};
pub use store::{FsStore, MemoryStore, ObjectStore, StoreError};
