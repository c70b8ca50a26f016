//! The dark-mode pixel transform and its per-page work unit.
//!
//! ## Exact match, not luminance
//!
//! Only two values are touched: pure white `(255,255,255)` becomes dark
//! grey `(40,40,40)` and pure black `(0,0,0)` becomes white. Anti-aliased
//! edge greys and mid-tone content (photos, charts) pass through
//! untouched. A luminance-based inversion would invert photographs too and
//! cost a multiply per channel; the exact threshold keeps the loop to a
//! pair of comparisons and leaves anything that isn't page background or
//! body text alone.
//!
//! The function owns no state and touches nothing outside the raster it
//! was handed, so any number of pages can be transformed concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

use super::encode_png;
use crate::batch::WorkUnit;
use crate::error::PageError;
use crate::keys::PageKey;
use crate::store::ObjectStore;

/// What page backgrounds become.
pub const DARK_GREY: [u8; 3] = [40, 40, 40];
/// Pure white, the background match and the text replacement value.
pub const WHITE: [u8; 3] = [255, 255, 255];
/// Pure black, the text match.
pub const BLACK: [u8; 3] = [0, 0, 0];

/// Swap page background and text colors in place.
///
/// Deterministic, O(pixels), tolerant of any dimensions including empty
/// rasters. Rows are processed in parallel via rayon.
///
/// Note the transform is *not* an involution: white → dark grey stays
/// dark grey on a second pass, and black → white becomes dark grey.
pub fn darken(image: &mut RgbImage) {
    let row_len = image.width() as usize * 3;
    if row_len == 0 {
        return;
    }
    let buf: &mut [u8] = &mut *image;
    buf.par_chunks_mut(row_len).for_each(|row| {
        for pixel in row.chunks_exact_mut(3) {
            if *pixel == WHITE {
                pixel.copy_from_slice(&DARK_GREY);
            } else if *pixel == BLACK {
                pixel.copy_from_slice(&WHITE);
            }
        }
    });
}

/// Per-page transform worker: download the staged PNG, swap its colors,
/// upload it back under the same key.
///
/// Decode → transform → encode runs inside `spawn_blocking`; at 300 DPI a
/// page raster is an 8-megapixel buffer and the loop would otherwise stall
/// the runtime worker thread that polled it.
pub struct TransformUnit {
    store: Arc<dyn ObjectStore>,
}

impl TransformUnit {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WorkUnit for TransformUnit {
    async fn run(&self, page: &PageKey) -> Result<(), PageError> {
        let key = page.image_key();

        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| PageError::StoreFailed {
                key: key.clone(),
                detail: e.to_string(),
            })?;

        let converted = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, String> {
            let mut raster =
                image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
                    .map_err(|e| e.to_string())?
                    .to_rgb8();
            darken(&mut raster);
            encode_png(&raster).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| PageError::WorkerLost {
            key: key.clone(),
            detail: e.to_string(),
        })?
        .map_err(|detail| PageError::TransformFailed {
            key: key.clone(),
            detail,
        })?;

        debug!("transformed '{}' ({} bytes)", key, converted.len());

        self.store
            .put(&key, converted)
            .await
            .map_err(|e| PageError::StoreFailed {
                key,
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn white_becomes_dark_grey() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb(WHITE));
        darken(&mut img);
        assert!(img.pixels().all(|p| p.0 == DARK_GREY));
    }

    #[test]
    fn black_becomes_white() {
        let mut img = RgbImage::from_pixel(2, 5, Rgb(BLACK));
        darken(&mut img);
        assert!(img.pixels().all(|p| p.0 == WHITE));
    }

    #[test]
    fn everything_else_passes_through() {
        // Sampled sweep over the channel domain plus near-boundary values.
        // Any pixel with at least one channel off the two exact matches
        // must survive unchanged.
        let mut samples = Vec::new();
        for r in (0u8..=255).step_by(51) {
            for g in (0u8..=255).step_by(51) {
                for b in (0u8..=255).step_by(51) {
                    samples.push([r, g, b]);
                }
            }
        }
        samples.extend([[254, 255, 255], [255, 255, 254], [0, 0, 1], [1, 0, 0]]);

        for sample in samples {
            if sample == WHITE || sample == BLACK {
                continue;
            }
            let mut img = RgbImage::from_pixel(1, 1, Rgb(sample));
            darken(&mut img);
            assert_eq!(img.get_pixel(0, 0).0, sample, "{sample:?} was modified");
        }
    }

    #[test]
    fn double_apply_is_not_identity() {
        // white → grey → grey (grey is never remapped back)
        let mut img = RgbImage::from_pixel(1, 1, Rgb(WHITE));
        darken(&mut img);
        darken(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, DARK_GREY);

        // black → white → grey, two applications end far from the origin
        let mut img = RgbImage::from_pixel(1, 1, Rgb(BLACK));
        darken(&mut img);
        darken(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, DARK_GREY);
    }

    #[test]
    fn tolerates_degenerate_dimensions() {
        let mut empty = RgbImage::new(0, 0);
        darken(&mut empty);
        let mut line = RgbImage::from_pixel(1024, 1, Rgb(WHITE));
        darken(&mut line);
        assert!(line.pixels().all(|p| p.0 == DARK_GREY));
    }

    #[test]
    fn mixed_page_only_touches_matches() {
        let mut img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb(WHITE),
            1 => Rgb(BLACK),
            2 => Rgb([128, 128, 128]),
            _ => Rgb([255, 254, 255]),
        });
        darken(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, DARK_GREY);
        assert_eq!(img.get_pixel(1, 0).0, WHITE);
        assert_eq!(img.get_pixel(2, 0).0, [128, 128, 128]);
        assert_eq!(img.get_pixel(3, 0).0, [255, 254, 255]);
    }
}
