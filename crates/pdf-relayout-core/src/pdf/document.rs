use std::path::Path;
use std::sync::Arc;

use mupdf::Document as MuDocument;

use crate::error::{Error, Result};
use crate::layout::PageSize;

/// An opened PDF: raw bytes plus the facts every stage needs.
pub struct PdfDocument {
    /// The raw PDF bytes (kept for re-opening per operation)
    bytes: Arc<Vec<u8>>,
    /// Size of every page in points, in page order
    page_sizes: Vec<PageSize>,
    /// Content digest (MD5 hex), computed once on load
    content_id: String,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        let mut page_sizes = Vec::with_capacity(usize::try_from(page_count).unwrap_or(0));
        for index in 0..page_count {
            let bounds = doc
                .load_page(index)
                .and_then(|page| page.bounds())
                .map_err(|e| Error::PdfOpen(format!("Failed to read page {}: {e}", index + 1)))?;
            page_sizes.push(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0));
        }

        let content_id = format!("{:x}", md5::compute(&bytes));

        Ok(Self {
            bytes: Arc::new(bytes),
            page_sizes,
            content_id,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Get number of pages
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// Page sizes in points, index 0 is page 1
    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MD5 hex digest of the PDF bytes.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl Clone for PdfDocument {
    /// Only the `Arc` around the bytes is cloned.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            page_sizes: self.page_sizes.clone(),
            content_id: self.content_id.clone(),
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count())
            .field("content_id", &self.content_id)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// Validate a 0-based page index and convert it for mupdf.
pub(crate) fn mupdf_page_index(page_index: usize, total: usize) -> Result<i32> {
    if page_index >= total {
        return Err(Error::PdfInvalidPage {
            page: page_index,
            total,
        });
    }
    i32::try_from(page_index).map_err(|_| Error::PdfInvalidPage {
        page: page_index,
        total,
    })
}
