//! Output types returned by a finished conversion job.
//!
//! A job that reaches `Delivered` hands back two presigned URLs plus a
//! [`JobReport`]. The report exists because per-page failures do not abort
//! the job: a document can be delivered with pages missing, and the caller
//! deserves to know that without grepping logs. Check
//! [`JobReport::is_degraded`] before celebrating.

use serde::Serialize;

use crate::error::PageError;

/// Result of a successful (possibly degraded) conversion job.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Presigned URL of the merged dark-mode document.
    pub converted_document_url: String,
    /// Presigned URL of the retained first-page preview image.
    pub preview_image_url: String,
    /// What actually happened, page by page.
    pub report: JobReport,
}

/// Accounting for one job: what went in, what made it through, what broke.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Source documents submitted.
    pub documents_total: usize,
    /// Source documents that rasterised successfully.
    pub documents_rasterized: usize,
    /// Source documents whose output is absent, with the reason.
    pub documents_skipped: Vec<SkippedDocument>,
    /// Pages staged by the rasteriser across all documents.
    pub pages_total: usize,
    /// Pages present in the delivered document.
    pub pages_converted: usize,
    /// Per-page failures from the transform and reassembly stages.
    pub failed: Vec<PageError>,
    /// Wall-clock per stage.
    pub timings: StageTimings,
}

impl JobReport {
    /// True when the delivered document is missing anything the caller
    /// submitted — skipped documents or failed pages.
    pub fn is_degraded(&self) -> bool {
        !self.documents_skipped.is_empty() || !self.failed.is_empty()
    }
}

/// A source document that produced no output.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    /// Store key the document was staged under.
    pub key: String,
    /// Why rasterisation rejected it.
    pub reason: String,
}

/// Per-stage wall-clock durations in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub raster_ms: u64,
    pub transform_ms: u64,
    pub assemble_ms: u64,
    pub repack_ms: u64,
    pub total_ms: u64,
}
