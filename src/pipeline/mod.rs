//! Pipeline stages for dark-mode conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different rasterisation backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ raster ──▶ transform ──▶ assemble ──▶ repack
//! (PDF)     (pdfium)   (pixel swap)  (1-page PDFs) (merged PDF)
//! ```
//!
//! 1. [`raster`]    — rasterise every page to PNG and stage it; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`transform`] — swap pure white ↔ near-black on each staged page
//! 3. [`assemble`]  — wrap each transformed PNG into a one-page fragment
//! 4. [`repack`]    — merge fragments in page order and purge intermediates
//!
//! The raster and repack steps run once per job; transform and assemble
//! fan out through [`crate::batch`].

pub mod assemble;
pub mod raster;
pub mod repack;
pub mod transform;

use std::io::Cursor;

use image::RgbImage;

/// Encode a page raster as lossless PNG.
///
/// PNG rather than JPEG throughout: compression artefacts on rendered text
/// would survive into the final document, and the exact-match pixel
/// transform needs bit-faithful values to recognise pure white and pure
/// black at all.
pub(crate) fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
