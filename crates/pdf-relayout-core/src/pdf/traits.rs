//! Collaborator seams around the overlay core.
//!
//! The core never parses PDFs, renders rasters or shells out on its own;
//! it goes through these traits so each collaborator can be swapped or
//! faked in tests.

use std::path::Path;

use image::RgbaImage;

use crate::error::Result;
use crate::layout::PageLayout;

/// Produces line items and page sizes for a document.
pub trait LayoutProvider: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<PageLayout>;
}

/// Renders one page of a PDF to an RGBA raster.
pub trait PageRasterizer: Send + Sync {
    /// `page_index` is 0-based.
    fn render_page(&self, pdf: &[u8], page_index: usize, dpi: f32) -> Result<RgbaImage>;
}

/// Stacks an overlay document on top of a base document, page by page.
pub trait DocumentMerger: Send + Sync {
    fn merge(&self, overlay: &[u8], base: &[u8]) -> Result<Vec<u8>>;
}

/// Produces a copy of a PDF with its text removed.
pub trait BackgroundStripper: Send + Sync {
    fn strip(&self, input: &Path, output: &Path) -> Result<()>;
}
