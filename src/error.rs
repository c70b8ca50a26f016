//! Error types for the umbra-pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`UmbraError`] — **Fatal**: the job cannot proceed at all (no source
//!   produced any page, the repacker lost a fragment, the store is gone).
//!   Returned as `Err(UmbraError)` from [`crate::convert::convert`].
//!
//! * [`PageError`] — **Non-fatal**: a single page failed inside a batch
//!   (bad raster, store hiccup) while its siblings are fine. Collected into
//!   [`crate::batch::BatchReport`] and surfaced through
//!   [`crate::output::JobReport`] so callers can see degraded success
//!   instead of losing the whole document to one bad page.
//!
//! Store-level errors ([`crate::store::StoreError`]) live in the store
//! module and convert into `UmbraError` at the orchestration boundary.

use thiserror::Error;

use crate::store::StoreError;

/// All fatal errors returned by the umbra-pdf library.
///
/// Page-level failures use [`PageError`] and are carried in
/// [`crate::output::JobReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum UmbraError {
    /// The source byte stream could not be parsed as a PDF at all.
    #[error("document '{key}' could not be parsed: {detail}")]
    UnsupportedDocument { key: String, detail: String },

    /// pdfium returned an error while rendering a specific page.
    ///
    /// Inside a multi-document job this aborts only the owning document
    /// (the orchestrator catches it and marks the document absent); it is
    /// fatal when returned from the top level.
    #[error("rasterisation failed for page {page} of '{key}': {detail}")]
    RasterizationFailed {
        key: String,
        page: usize,
        detail: String,
    },

    /// A fragment could not be read or parsed at merge time.
    ///
    /// Deletions performed before the failure are not rolled back; the
    /// periodic sweep collects whatever is left behind.
    #[error("repack failed: {detail}")]
    RepackFailed { detail: String },

    /// Every page of every source document failed somewhere in the
    /// pipeline; there is nothing to deliver.
    #[error("all {total} pages failed — nothing to repack.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// A store operation outside the per-page batches failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (panicked worker, poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Produced by the per-page work units, collected by the batch scheduler,
/// and reported in [`crate::output::JobReport::failed`]. The overall job
/// continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page image could not be decoded or re-encoded during the
    /// pixel transform.
    #[error("page '{key}': transform failed: {detail}")]
    TransformFailed { key: String, detail: String },

    /// The transformed raster could not be built into a one-page fragment.
    #[error("page '{key}': fragment encoding failed: {detail}")]
    EncodingFailed { key: String, detail: String },

    /// A store get/put for this page failed.
    #[error("page '{key}': store operation failed: {detail}")]
    StoreFailed { key: String, detail: String },

    /// The worker task processing this page's batch died before finishing.
    #[error("page '{key}': worker terminated: {detail}")]
    WorkerLost { key: String, detail: String },
}

impl PageError {
    /// The store key of the page this error belongs to.
    pub fn key(&self) -> &str {
        match self {
            PageError::TransformFailed { key, .. }
            | PageError::EncodingFailed { key, .. }
            | PageError::StoreFailed { key, .. }
            | PageError::WorkerLost { key, .. } => key,
        }
    }
}
