//! Repacking: merge one-page fragments into the final document and purge
//! everything the job no longer needs.
//!
//! Fragments are merged in explicit `(stem, index)` order carried by
//! [`PageKey`] — never by comparing key strings — so the output page order
//! is deterministic regardless of how the earlier stages were scheduled.
//!
//! After the merged document is staged, the repacker deletes every
//! consumed fragment, every page image except the retained preview, and
//! the original source documents. All deletions are best-effort: a failed
//! delete is logged and left for the periodic sweep. Deletions performed
//! before a merge failure are not rolled back.

use std::sync::Arc;

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::{info, warn};

use crate::error::UmbraError;
use crate::keys::{converted_key, PageKey};
use crate::store::ObjectStore;

/// Merge the fragments of `fragment_pages` into `{output_stem}_converted.pdf`,
/// then clean up the job's intermediates.
///
/// * `fragment_pages` — pages that produced a fragment; merged in
///   `(stem, index)` order.
/// * `all_pages` — every page image the job staged (including pages whose
///   transform or reassembly failed); deleted except the preview.
/// * `preview` — the retained page image, spared from cleanup.
/// * `source_keys` — original documents, purged once the output exists.
///
/// # Returns
/// The store key of the merged document.
///
/// # Errors
/// [`UmbraError::RepackFailed`] when any fragment cannot be read or
/// parsed, or when there are no fragments at all.
pub async fn repack_and_cleanup(
    store: &Arc<dyn ObjectStore>,
    output_stem: &str,
    fragment_pages: &[PageKey],
    all_pages: &[PageKey],
    preview: Option<&PageKey>,
    source_keys: &[String],
) -> Result<String, UmbraError> {
    let mut ordered: Vec<PageKey> = fragment_pages.to_vec();
    ordered.sort();

    let mut fragments = Vec::with_capacity(ordered.len());
    for page in &ordered {
        let key = page.fragment_key();
        let bytes = store
            .get(&key)
            .await
            .map_err(|e| UmbraError::RepackFailed {
                detail: format!("fragment '{key}': {e}"),
            })?;
        let doc = Document::load_mem(&bytes).map_err(|e| UmbraError::RepackFailed {
            detail: format!("fragment '{key}': {e}"),
        })?;
        fragments.push(doc);
    }

    let merged = merge_fragments(fragments)?;
    let output_key = converted_key(output_stem);
    store.put(&output_key, merged).await?;
    info!(
        "repacked {} fragments into '{}'",
        ordered.len(),
        output_key
    );

    // Cleanup, in the order things stop being needed: fragments first,
    // then page images (minus the preview), then the originals.
    for page in &ordered {
        best_effort_delete(store.as_ref(), &page.fragment_key()).await;
    }
    for page in all_pages {
        if preview == Some(page) {
            continue;
        }
        best_effort_delete(store.as_ref(), &page.image_key()).await;
    }
    for key in source_keys {
        best_effort_delete(store.as_ref(), key).await;
    }

    Ok(output_key)
}

/// Delete `key`, downgrading failure to a log line.
pub(crate) async fn best_effort_delete(store: &dyn ObjectStore, key: &str) {
    if let Err(e) = store.delete(key).await {
        warn!("cleanup failed for '{}': {e}", key);
    }
}

/// Merge single-page documents into one, preserving order.
///
/// The classic lopdf merge: renumber each incoming document's objects past
/// the current maximum, re-parent its pages onto one shared page tree, and
/// drop the incoming catalogs and page-tree nodes.
fn merge_fragments(fragments: Vec<Document>) -> Result<Vec<u8>, UmbraError> {
    let mut merged = Document::with_version("1.5");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    let mut count: i64 = 0;

    for mut doc in fragments {
        doc.renumber_objects_with(merged.max_id + 1);
        merged.max_id = doc.max_id;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            if let Ok(object) = doc.get_object_mut(page_id) {
                if let Object::Dictionary(dict) = object {
                    dict.set("Parent", pages_id);
                }
            }
            kids.push(page_id.into());
            count += 1;
        }

        for (id, object) in doc.objects {
            if is_page_tree_container(&object) {
                continue;
            }
            merged.objects.insert(id, object);
        }
    }

    if count == 0 {
        return Err(UmbraError::RepackFailed {
            detail: "no fragments to merge".into(),
        });
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    merged.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    merged
        .save_to(&mut buf)
        .map_err(|e| UmbraError::RepackFailed {
            detail: format!("serialising merged document: {e}"),
        })?;
    Ok(buf)
}

/// True for `/Type /Catalog` and `/Type /Pages` dictionaries, which must
/// not be carried over from the fragments.
fn is_page_tree_container(object: &Object) -> bool {
    object
        .as_dict()
        .map(|dict| {
            matches!(
                dict.get(b"Type"),
                Ok(Object::Name(name)) if matches!(name.as_slice(), b"Catalog" | b"Pages")
            )
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::assemble::fragment_from_png;
    use crate::pipeline::encode_png;
    use crate::store::MemoryStore;
    use image::{Rgb, RgbImage};

    fn fragment(width: u32, height: u32) -> Vec<u8> {
        let png = encode_png(&RgbImage::from_pixel(width, height, Rgb([40, 40, 40]))).unwrap();
        fragment_from_png(&png).unwrap()
    }

    /// MediaBox widths of the merged document's pages, in page order.
    fn page_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).expect("merged document should parse");
        let mut widths = Vec::new();
        for (_num, page_id) in doc.get_pages() {
            let dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
            let media_box = dict.get(b"MediaBox").unwrap().as_array().unwrap();
            widths.push(media_box[2].as_i64().unwrap());
        }
        widths
    }

    #[test]
    fn merge_preserves_page_order() {
        let docs = vec![
            Document::load_mem(&fragment(100, 50)).unwrap(),
            Document::load_mem(&fragment(101, 50)).unwrap(),
            Document::load_mem(&fragment(102, 50)).unwrap(),
        ];
        let merged = merge_fragments(docs).unwrap();
        assert_eq!(page_widths(&merged), vec![100, 101, 102]);
    }

    #[test]
    fn merge_of_nothing_fails() {
        assert!(matches!(
            merge_fragments(Vec::new()),
            Err(UmbraError::RepackFailed { .. })
        ));
    }

    #[tokio::test]
    async fn repack_orders_cleans_and_retains_preview() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let pages: Vec<PageKey> = (0..3).map(|i| PageKey::new("doc", i)).collect();

        store.put("doc.pdf", b"original".to_vec()).await.unwrap();
        for (i, page) in pages.iter().enumerate() {
            store
                .put(&page.image_key(), vec![i as u8])
                .await
                .unwrap();
            store
                .put(&page.fragment_key(), fragment(200 + i as u32, 90))
                .await
                .unwrap();
        }

        // Hand the fragments over out of order; the repacker must restore
        // index order.
        let shuffled = vec![pages[2].clone(), pages[0].clone(), pages[1].clone()];
        let output_key = repack_and_cleanup(
            &store,
            "doc",
            &shuffled,
            &pages,
            Some(&pages[0]),
            &["doc.pdf".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(output_key, "doc_converted.pdf");
        let merged = store.get(&output_key).await.unwrap();
        assert_eq!(page_widths(&merged), vec![200, 201, 202]);

        // Exactly the converted document and the preview survive.
        let remaining = store.list_all().await.unwrap();
        assert_eq!(
            remaining,
            vec![
                "doc_converted.pdf".to_string(),
                "doc_page_000_converted.png".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_fragment_is_repack_failed() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let pages = vec![PageKey::new("doc", 0)];
        let err = repack_and_cleanup(&store, "doc", &pages, &pages, None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UmbraError::RepackFailed { .. }));
    }
}
