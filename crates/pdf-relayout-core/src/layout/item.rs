//! Geometric line items and page sizes.
//!
//! All coordinates are PDF points with a **bottom-left origin** (y increases
//! upward). Boundary adapters that read top-left geometry (MuPDF, OCR) flip
//! it before constructing items.

use serde::{Deserialize, Serialize};

/// A4 portrait width in points, used when a page size is unusable.
pub const DEFAULT_PAGE_WIDTH: f32 = 595.2756;

/// A4 portrait height in points, used when a page size is unusable.
pub const DEFAULT_PAGE_HEIGHT: f32 = 841.8898;

/// Axis-aligned bounding box in page points (y-up)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Vertical center, the key used for line grouping.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Finite and non-degenerate (`x0 < x1`, `y0 < y1`).
    pub fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x0 < self.x1
            && self.y0 < self.y1
    }

    /// Convert a top-left-origin box into this y-up model.
    pub fn from_top_left(x0: f32, top: f32, x1: f32, bottom: f32, page_height: f32) -> Self {
        Self {
            x0,
            y0: page_height - bottom,
            x1,
            y1: page_height - top,
        }
    }

    /// Convert to array format [x0, y0, x1, y1]
    pub const fn as_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

/// One unit of extracted text: a word, a line fragment or a whole line.
///
/// Items are never mutated; normalization produces new ones. `id` exists for
/// traceability only and is never used for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// 1-based page number
    pub page: u32,
    pub bbox: BoundingBox,
    pub font_size: f32,
    pub text: String,
    pub id: String,
}

impl LineItem {
    pub fn new(
        page: u32,
        bbox: BoundingBox,
        font_size: f32,
        text: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            page,
            bbox,
            font_size,
            text: text.into(),
            id: id.into(),
        }
    }

    /// Whether the item satisfies the data-model invariants.
    ///
    /// Boundary adapters drop items that fail this check.
    pub fn is_well_formed(&self) -> bool {
        self.page >= 1
            && self.bbox.is_valid()
            && self.font_size.is_finite()
            && self.font_size > 0.0
            && !self.text.trim().is_empty()
    }
}

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub const fn a4() -> Self {
        Self::new(DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }

    /// Return a usable size, substituting A4 for degenerate geometry.
    ///
    /// The boolean is `true` when a substitution happened.
    pub fn sanitized(self) -> (Self, bool) {
        if self.is_degenerate() {
            (Self::a4(), true)
        } else {
            (self, false)
        }
    }

    /// Look up the size of a 1-based page, if the list has one.
    pub fn for_page(sizes: &[Self], page: u32) -> Option<Self> {
        let index = usize::try_from(page).ok()?.checked_sub(1)?;
        sizes.get(index).copied()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::a4()
    }
}

/// Items and page sizes produced by a layout provider for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub items: Vec<LineItem>,
    pub page_sizes: Vec<PageSize>,
}

impl PageLayout {
    pub const fn new(items: Vec<LineItem>, page_sizes: Vec<PageSize>) -> Self {
        Self { items, page_sizes }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
