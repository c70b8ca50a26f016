//! Rasterisation: render every page of a PDF to PNG via pdfium and stage
//! the results.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the
//! blocking thread pool, preventing the runtime worker threads from
//! stalling during CPU-heavy rendering.
//!
//! A failure anywhere in here makes the *document's* output absent — the
//! orchestrator catches the error, logs it, and carries on with the other
//! source documents.

use std::sync::Arc;

use pdfium_render::prelude::*;
use tracing::{debug, info};

use super::encode_png;
use crate::error::UmbraError;
use crate::keys::{document_stem, PageKey};
use crate::store::ObjectStore;

/// Rasterise `bytes` at `dpi` and stage every page image under its
/// canonical key before returning.
///
/// # Returns
/// The staged pages in document order; index 0 is the first page.
///
/// # Errors
/// [`UmbraError::UnsupportedDocument`] when the byte stream is not a
/// parseable PDF; [`UmbraError::RasterizationFailed`] when any single page
/// fails to render or encode.
pub async fn rasterize_and_stage(
    store: &Arc<dyn ObjectStore>,
    source_key: &str,
    bytes: Vec<u8>,
    dpi: u32,
) -> Result<Vec<PageKey>, UmbraError> {
    let stem = document_stem(source_key).to_string();
    let key = source_key.to_string();

    let rendered = tokio::task::spawn_blocking(move || render_pages_blocking(&key, &bytes, dpi))
        .await
        .map_err(|e| UmbraError::Internal(format!("render task panicked: {e}")))??;

    let mut staged = Vec::with_capacity(rendered.len());
    for (index, png) in rendered {
        let page = PageKey::new(stem.clone(), index);
        store.put(&page.image_key(), png).await?;
        staged.push(page);
    }

    info!(
        "rasterised {} pages of '{}' at {} DPI",
        staged.len(),
        source_key,
        dpi
    );
    Ok(staged)
}

/// Blocking implementation of page rendering and PNG encoding.
fn render_pages_blocking(
    source_key: &str,
    bytes: &[u8],
    dpi: u32,
) -> Result<Vec<(usize, Vec<u8>)>, UmbraError> {
    let pdfium = Pdfium::default();

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        UmbraError::UnsupportedDocument {
            key: source_key.to_string(),
            detail: format!("{e:?}"),
        }
    })?;

    // PDF user space is 72 points per inch; the scale factor maps it onto
    // the requested dot density.
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let total = document.pages().len() as usize;
    let mut rendered = Vec::with_capacity(total);

    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            UmbraError::RasterizationFailed {
                key: source_key.to_string(),
                page: index,
                detail: format!("{e:?}"),
            }
        })?;

        let raster = bitmap.as_image().to_rgb8();
        debug!(
            "rendered page {}/{} of '{}' → {}x{} px",
            index + 1,
            total,
            source_key,
            raster.width(),
            raster.height()
        );

        let png = encode_png(&raster).map_err(|e| UmbraError::RasterizationFailed {
            key: source_key.to_string(),
            page: index,
            detail: format!("PNG encoding failed: {e}"),
        })?;

        rendered.push((index, png));
    }

    Ok(rendered)
}
