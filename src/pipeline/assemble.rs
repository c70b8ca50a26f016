//! Page reassembly: wrap one transformed page raster into a one-page PDF
//! fragment.
//!
//! The fragment page is sized exactly width × height in points — one point
//! per pixel, no scaling — with the image drawn across the whole page.
//! Raw RGB samples go into an image XObject behind `FlateDecode`; PDF has
//! no native PNG payload, so the raster is decoded once here and
//! recompressed losslessly.

use std::io::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;
use tracing::debug;

use crate::batch::WorkUnit;
use crate::error::PageError;
use crate::keys::PageKey;
use crate::store::ObjectStore;

/// Failures while building a fragment from raster bytes.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// The input bytes are not a decodable PNG raster.
    #[error("raster decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// lopdf refused the assembled objects.
    #[error("page build failed: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Compressing the pixel samples failed.
    #[error("sample compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

/// Build a single-page PDF whose page is sized to the raster and fully
/// covered by it.
pub fn fragment_from_png(png: &[u8]) -> Result<Vec<u8>, FragmentError> {
    let raster = image::load_from_memory_with_format(png, image::ImageFormat::Png)?.to_rgb8();
    let (width, height) = raster.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(raster.as_raw())?;
    let samples = encoder.finish()?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        samples,
    ));

    // Scale the unit image square up to the full page, then draw.
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    (width as i64).into(),
                    0.into(),
                    0.into(),
                    (height as i64).into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

/// Per-page reassembly worker: fetch the transformed PNG, build its
/// fragment, stage the fragment.
///
/// No `spawn_blocking` here — the store round-trips dominate and the
/// fragment build is a single compress pass over an already-decoded
/// raster.
pub struct AssembleUnit {
    store: Arc<dyn ObjectStore>,
}

impl AssembleUnit {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WorkUnit for AssembleUnit {
    async fn run(&self, page: &PageKey) -> Result<(), PageError> {
        let image_key = page.image_key();

        let png = self
            .store
            .get(&image_key)
            .await
            .map_err(|e| PageError::StoreFailed {
                key: image_key.clone(),
                detail: e.to_string(),
            })?;

        let fragment = fragment_from_png(&png).map_err(|e| PageError::EncodingFailed {
            key: image_key.clone(),
            detail: e.to_string(),
        })?;

        debug!(
            "assembled fragment '{}' ({} bytes)",
            page.fragment_key(),
            fragment.len()
        );

        self.store
            .put(&page.fragment_key(), fragment)
            .await
            .map_err(|e| PageError::StoreFailed {
                key: image_key,
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode_png;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb(color))).unwrap()
    }

    #[test]
    fn fragment_is_a_single_page_sized_to_the_raster() {
        let bytes = fragment_from_png(&png(120, 80, [40, 40, 40])).unwrap();
        let doc = Document::load_mem(&bytes).expect("fragment should parse");

        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let dims: Vec<i64> = media_box.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(dims, vec![0, 0, 120, 80]);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = fragment_from_png(b"definitely not a png").unwrap_err();
        assert!(matches!(err, FragmentError::Decode(_)));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let mut bytes = png(10, 10, [0, 0, 0]);
        bytes.truncate(bytes.len() / 2);
        let err = fragment_from_png(&bytes).unwrap_err();
        assert!(matches!(err, FragmentError::Decode(_)));
    }
}
