//! Store-key derivation for every artifact a job produces.
//!
//! All keys derive from the source document's *stem* (filename with the
//! `.pdf` extension stripped):
//!
//! ```text
//! report.pdf                          source document (staged as-is)
//! report_page_007_converted.png       page image, zero-based index 7
//! report_page_007_converted.pdf       one-page fragment for the same page
//! report_converted.pdf                final merged document
//! ```
//!
//! Page order is carried by the explicit [`PageKey::index`] field, and the
//! repacker sorts by `(stem, index)` — never by comparing key strings. The
//! zero-padding in the rendered key is kept for store-listing readability;
//! it happens to agree with index order below 1000 pages, and a test pins
//! that down, but nothing depends on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix of the final merged document key.
const CONVERTED_SUFFIX: &str = "_converted.pdf";

/// Identity of one rasterized page: which document, which position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageKey {
    /// Source document stem, e.g. `report` for `report.pdf`.
    pub stem: String,
    /// Zero-based page index, dense within the document.
    pub index: usize,
}

impl PageKey {
    pub fn new(stem: impl Into<String>, index: usize) -> Self {
        Self {
            stem: stem.into(),
            index,
        }
    }

    /// Store key of the page image (PNG).
    pub fn image_key(&self) -> String {
        format!("{}_page_{:03}_converted.png", self.stem, self.index)
    }

    /// Store key of the one-page fragment built from this page.
    pub fn fragment_key(&self) -> String {
        format!("{}_page_{:03}_converted.pdf", self.stem, self.index)
    }

    /// True for the page retained as the job's preview.
    pub fn is_preview_candidate(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image_key())
    }
}

/// Filename with any `.pdf` extension stripped, for key derivation.
///
/// `report.pdf` → `report`; an extensionless name passes through.
pub fn document_stem(filename: &str) -> &str {
    filename
        .strip_suffix(".pdf")
        .or_else(|| filename.strip_suffix(".PDF"))
        .unwrap_or(filename)
}

/// Store key of the final merged document for `stem`.
pub fn converted_key(stem: &str) -> String {
    format!("{stem}{CONVERTED_SUFFIX}")
}
