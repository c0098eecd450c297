//! Text geometry: the line item model, normalization and alignment.

mod align;
mod item;
mod normalize;
mod ocr;
mod stext;

pub use align::{TranslatedLine, align, check_alignment};
pub use item::{BoundingBox, DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH, LineItem, PageLayout, PageSize};
pub use normalize::{NormalizeOptions, normalize};
pub use ocr::{OcrAnnotation, OcrGeometry, OcrPage, items_from_ocr};
