//! The conversion pipeline orchestrator.
//!
//! One call to [`convert`] drives a job through a linear state machine
//! with no backward transitions:
//!
//! ```text
//! Staged → Rasterized → Transformed → Reassembled → Repacked → Delivered
//! ```
//!
//! Each stage runs to a full barrier before the next begins — the
//! transform fan-out finishes every batch before reassembly starts, and
//! the repacker re-imposes total page order at the end, so the observable
//! output is deterministic regardless of intra-stage scheduling.
//!
//! Failure handling follows two rules:
//!
//! * a *stage-level* failure (nothing rasterised, repack lost a fragment)
//!   is terminal — the error is returned, completed stages are not rolled
//!   back, and the periodic sweep inherits the residue;
//! * a *per-item* failure (one document, one page) is contained — it is
//!   logged, recorded in the [`JobReport`], and its siblings continue.
//!
//! The orchestrator never retries a stage internally.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::batch::{make_batches, ComputeBoundStrategy, IoBoundStrategy, ParallelStrategy};
use crate::config::JobConfig;
use crate::error::UmbraError;
use crate::keys::{document_stem, PageKey};
use crate::lifecycle::Lifecycle;
use crate::output::{ConversionOutput, JobReport, SkippedDocument, StageTimings};
use crate::pipeline::assemble::AssembleUnit;
use crate::pipeline::raster::rasterize_and_stage;
use crate::pipeline::repack::repack_and_cleanup;
use crate::pipeline::transform::TransformUnit;
use crate::store::ObjectStore;

/// One source document submitted to a job.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Filename the document was submitted under; becomes its store key
    /// and the stem of every derived key.
    pub filename: String,
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Where a job currently is in its (strictly forward) life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStage {
    /// Source documents uploaded to the store.
    Staged,
    /// Page images staged for every surviving document.
    Rasterized,
    /// Page images color-swapped in place.
    Transformed,
    /// One-page fragments staged.
    Reassembled,
    /// Merged document staged; intermediates purged.
    Repacked,
    /// URLs issued, preview retention scheduled. Terminal.
    Delivered,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Staged => "staged",
            JobStage::Rasterized => "rasterized",
            JobStage::Transformed => "transformed",
            JobStage::Reassembled => "reassembled",
            JobStage::Repacked => "repacked",
            JobStage::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

/// Convert the given source documents to dark mode.
///
/// This is the primary entry point for the library. On success the job
/// has staged a merged dark-mode document and a first-page preview, both
/// reachable through the returned presigned URLs; everything else the job
/// created has been deleted, and a deferred deletion of the preview has
/// been scheduled on `lifecycle`.
///
/// # Returns
/// `Ok(ConversionOutput)` — possibly degraded; check
/// [`JobReport::is_degraded`].
///
/// # Errors
/// Fatal conditions only: no source rasterised, every page failed, the
/// repacker lost a fragment, or the store refused an orchestration-level
/// operation.
pub async fn convert(
    store: Arc<dyn ObjectStore>,
    lifecycle: &Lifecycle,
    sources: Vec<SourceDocument>,
    config: &JobConfig,
) -> Result<ConversionOutput, UmbraError> {
    if sources.is_empty() {
        return Err(UmbraError::InvalidConfig(
            "job must contain at least one source document".into(),
        ));
    }
    let total_start = Instant::now();
    let documents_total = sources.len();
    let mut timings = StageTimings::default();

    // ── Stage in ─────────────────────────────────────────────────────────
    let mut source_keys = Vec::with_capacity(sources.len());
    for source in sources {
        store.put(&source.filename, source.bytes).await?;
        source_keys.push(source.filename);
    }
    info!("job stage: {} ({} documents)", JobStage::Staged, documents_total);

    // ── Rasterise ────────────────────────────────────────────────────────
    // Per-document containment: a document that fails to parse or render
    // is logged, reported, and absent from the output. The job only dies
    // here if *no* document produces pages.
    let raster_start = Instant::now();
    let mut all_pages: Vec<PageKey> = Vec::new();
    let mut preview: Option<PageKey> = None;
    let mut skipped: Vec<SkippedDocument> = Vec::new();

    for key in &source_keys {
        let bytes = match store.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("source '{}' unreadable: {e}", key);
                skipped.push(SkippedDocument {
                    key: key.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        match rasterize_and_stage(&store, key, bytes, config.dpi()).await {
            Ok(pages) => {
                if preview.is_none() {
                    preview = pages.first().cloned();
                }
                all_pages.extend(pages);
            }
            Err(e) => {
                warn!("document '{}' dropped: {e}", key);
                skipped.push(SkippedDocument {
                    key: key.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    timings.raster_ms = raster_start.elapsed().as_millis() as u64;

    if all_pages.is_empty() {
        return Err(UmbraError::AllPagesFailed {
            total: 0,
            first_error: skipped
                .first()
                .map(|s| s.reason.clone())
                .unwrap_or_else(|| "no pages produced".into()),
        });
    }
    let pages_total = all_pages.len();
    let documents_rasterized = documents_total - skipped.len();
    info!(
        "job stage: {} ({} pages from {} documents)",
        JobStage::Rasterized,
        pages_total,
        documents_rasterized
    );

    // ── Transform (compute-bound fan-out) ────────────────────────────────
    let transform_start = Instant::now();
    let transform_report = ComputeBoundStrategy
        .execute(
            make_batches(all_pages.clone(), config.workers),
            Arc::new(TransformUnit::new(Arc::clone(&store))),
        )
        .await;
    timings.transform_ms = transform_start.elapsed().as_millis() as u64;
    info!(
        "job stage: {} ({}/{} pages)",
        JobStage::Transformed,
        transform_report.succeeded.len(),
        pages_total
    );

    // ── Reassemble (I/O-bound fan-out) ───────────────────────────────────
    // Only pages that actually transformed move on: shipping an
    // un-inverted page in a dark-mode document would be worse than
    // dropping it, and the report says which it was.
    let mut to_assemble = transform_report.succeeded;
    to_assemble.sort();
    let assemble_start = Instant::now();
    let assemble_report = IoBoundStrategy::new(config.workers)
        .execute(
            make_batches(to_assemble, config.workers),
            Arc::new(AssembleUnit::new(Arc::clone(&store))),
        )
        .await;
    timings.assemble_ms = assemble_start.elapsed().as_millis() as u64;

    let mut failed = transform_report.failed;
    failed.extend(assemble_report.failed);
    let assembled = assemble_report.succeeded;
    info!(
        "job stage: {} ({}/{} pages)",
        JobStage::Reassembled,
        assembled.len(),
        pages_total
    );

    if assembled.is_empty() {
        let first_error = failed
            .first()
            .map(|(_, e)| e.to_string())
            .unwrap_or_else(|| "unknown error".into());
        return Err(UmbraError::AllPagesFailed {
            total: pages_total,
            first_error,
        });
    }

    // ── Repack ───────────────────────────────────────────────────────────
    let repack_start = Instant::now();
    let output_stem = document_stem(&source_keys[0]).to_string();
    let converted = repack_and_cleanup(
        &store,
        &output_stem,
        &assembled,
        &all_pages,
        preview.as_ref(),
        &source_keys,
    )
    .await?;
    timings.repack_ms = repack_start.elapsed().as_millis() as u64;
    info!("job stage: {} ('{}')", JobStage::Repacked, converted);

    // ── Deliver ──────────────────────────────────────────────────────────
    let preview = preview.ok_or_else(|| {
        UmbraError::Internal("pages staged but no preview recorded".into())
    })?;
    let converted_document_url = store.presigned_url(&converted, config.presign_ttl).await?;
    let preview_image_url = store
        .presigned_url(&preview.image_key(), config.presign_ttl)
        .await?;

    // The preview outlives the job by one retention window; the task keeps
    // running after its handle is dropped.
    let _ = lifecycle.schedule_deletion(preview.image_key(), config.preview_retention);

    timings.total_ms = total_start.elapsed().as_millis() as u64;
    let report = JobReport {
        documents_total,
        documents_rasterized,
        documents_skipped: skipped,
        pages_total,
        pages_converted: assembled.len(),
        failed: failed.into_iter().map(|(_, e)| e).collect(),
        timings,
    };

    if report.is_degraded() {
        warn!(
            "job stage: {} DEGRADED ({}/{} pages, {} documents skipped)",
            JobStage::Delivered,
            report.pages_converted,
            report.pages_total,
            report.documents_skipped.len()
        );
    } else {
        info!(
            "job stage: {} ({} pages, {}ms)",
            JobStage::Delivered,
            report.pages_converted,
            report.timings.total_ms
        );
    }

    Ok(ConversionOutput {
        converted_document_url,
        preview_image_url,
        report,
    })
}
