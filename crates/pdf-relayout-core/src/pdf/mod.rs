mod document;
mod extract;
mod font;
mod merge;
mod overlay;
mod render;
mod strip;
mod traits;

pub use document::PdfDocument;
pub use extract::MuPdfLayoutProvider;
pub use font::{EmbeddedFont, OVERLAY_FONT_RESOURCE, OverlayFont};
pub use merge::LopdfMerger;
pub use overlay::{OverlayCompositor, OverlayDocument, OverlayOptions, OverlayReport};
pub use render::{MuPdfRasterizer, save_png};
pub use strip::GhostscriptStripper;
pub use traits::{BackgroundStripper, DocumentMerger, LayoutProvider, PageRasterizer};
