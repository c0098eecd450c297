//! Line-level text extraction with MuPDF.

use mupdf::TextPageOptions;
use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::{BoundingBox, LineItem, PageLayout};

use super::document::PdfDocument;
use super::traits::LayoutProvider;

/// Font size bounds for the line-height estimate.
const MIN_FONT_SIZE: f32 = 6.0;
const MAX_FONT_SIZE: f32 = 36.0;

/// Line box height undershoots the visual font size by about this factor.
const LINE_HEIGHT_TO_FONT_SIZE: f32 = 1.18;

/// Extracts embedded text as one item per MuPDF line.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuPdfLayoutProvider;

impl MuPdfLayoutProvider {
    pub const fn new() -> Self {
        Self
    }

    /// Extract the lines of an already opened document.
    pub fn extract_document(&self, doc: &PdfDocument) -> Result<PageLayout> {
        let mu = doc.open_document()?;
        let mut layout = PageLayout::new(Vec::new(), doc.page_sizes().to_vec());

        for (index, size) in doc.page_sizes().iter().enumerate() {
            let page_number = u32::try_from(index + 1).map_err(|_| Error::PdfInvalidPage {
                page: index,
                total: doc.page_count(),
            })?;
            let page_index = super::document::mupdf_page_index(index, doc.page_count())?;

            let page = mu.load_page(page_index).map_err(|e| Error::PdfTextExtraction {
                page: index,
                reason: format!("Failed to load page: {e}"),
            })?;
            let origin = page.bounds().map_err(|e| Error::PdfTextExtraction {
                page: index,
                reason: format!("Failed to get bounds: {e}"),
            })?;
            let text_page = page
                .to_text_page(TextPageOptions::empty())
                .map_err(|e| Error::PdfTextExtraction {
                    page: index,
                    reason: format!("Failed to get text page: {e}"),
                })?;

            let mut line_no = 0usize;
            for block in text_page.blocks() {
                for line in block.lines() {
                    let mut text = String::new();
                    let mut bounds: Option<[f32; 4]> = None;

                    for text_char in line.chars() {
                        if let Some(c) = text_char.char() {
                            text.push(c);
                        }
                        let q = text_char.quad();
                        let char_box = [
                            q.ul.x.min(q.ur.x).min(q.ll.x).min(q.lr.x),
                            q.ul.y.min(q.ur.y).min(q.ll.y).min(q.lr.y),
                            q.ul.x.max(q.ur.x).max(q.ll.x).max(q.lr.x),
                            q.ul.y.max(q.ur.y).max(q.ll.y).max(q.lr.y),
                        ];
                        bounds = Some(bounds.map_or(char_box, |b| {
                            [
                                b[0].min(char_box[0]),
                                b[1].min(char_box[1]),
                                b[2].max(char_box[2]),
                                b[3].max(char_box[3]),
                            ]
                        }));
                    }

                    let text = text.trim();
                    let Some([x0, top, x1, bottom]) = bounds else {
                        continue;
                    };
                    if text.is_empty() {
                        continue;
                    }

                    let font_size = ((bottom - top) * LINE_HEIGHT_TO_FONT_SIZE)
                        .clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
                    let bbox = BoundingBox::from_top_left(
                        x0 - origin.x0,
                        top - origin.y0,
                        x1 - origin.x0,
                        bottom - origin.y0,
                        size.height,
                    );

                    line_no += 1;
                    let item = LineItem::new(
                        page_number,
                        bbox,
                        font_size,
                        text,
                        format!("p{page_number:03}_l{line_no:04}"),
                    );
                    if item.is_well_formed() {
                        layout.items.push(item);
                    }
                }
            }
            debug!("Page {}: extracted {} line(s)", page_number, line_no);
        }

        Ok(layout)
    }
}

impl LayoutProvider for MuPdfLayoutProvider {
    fn extract(&self, pdf: &[u8]) -> Result<PageLayout> {
        let doc = PdfDocument::from_bytes(pdf.to_vec())?;
        self.extract_document(&doc)
    }
}
