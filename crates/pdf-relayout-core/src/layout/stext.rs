//! Reader for MuPDF structured-text JSON (`mutool draw -F stext.json`).
//!
//! MuPDF reports geometry with a top-left origin; items are flipped into the
//! y-up model here, at the boundary. Two line shapes are accepted: older
//! output with per-span text and sizes, and newer output with a line-level
//! `text` and `font.size`.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::item::{BoundingBox, LineItem, PageLayout, PageSize};

/// Font size assumed when the JSON carries none.
const DEFAULT_FONT_SIZE: f32 = 10.0;

#[derive(Debug, Deserialize)]
struct StextDocument {
    pages: Vec<StextPage>,
}

#[derive(Debug, Deserialize)]
struct StextPage {
    number: Option<u32>,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    blocks: Vec<StextBlock>,
}

#[derive(Debug, Deserialize)]
struct StextBlock {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    lines: Vec<StextLine>,
}

#[derive(Debug, Deserialize)]
struct StextLine {
    bbox: Option<StextBox>,
    #[serde(default)]
    spans: Vec<StextSpan>,
    text: Option<String>,
    font: Option<StextFont>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StextBox {
    Corners([f32; 4]),
    Rect { x: f32, y: f32, w: f32, h: f32 },
}

impl StextBox {
    /// `(x0, top, x1, bottom)` in top-left coordinates.
    const fn corners(&self) -> (f32, f32, f32, f32) {
        match *self {
            Self::Corners([x0, y0, x1, y1]) => (x0, y0, x1, y1),
            Self::Rect { x, y, w, h } => (x, y, x + w, y + h),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StextSpan {
    #[serde(default)]
    text: String,
    size: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct StextFont {
    size: Option<f32>,
}

impl StextLine {
    fn text(&self) -> String {
        if self.spans.is_empty() {
            self.text.clone().unwrap_or_default()
        } else {
            self.spans.iter().map(|s| s.text.as_str()).collect()
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn font_size(&self) -> f32 {
        let sizes: Vec<f32> = self.spans.iter().filter_map(|s| s.size).collect();
        if !sizes.is_empty() {
            return sizes.iter().sum::<f32>() / sizes.len() as f32;
        }
        self.font
            .as_ref()
            .and_then(|f| f.size)
            .unwrap_or(DEFAULT_FONT_SIZE)
    }
}

impl PageLayout {
    /// Parse MuPDF `stext.json` output into line items and page sizes.
    ///
    /// Pages without a usable size get A4. Non-text blocks, empty lines and
    /// lines without geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LayoutParse`] when the JSON is malformed or has no
    /// `pages` array.
    pub fn from_stext_json(json: &str) -> Result<Self> {
        let doc: StextDocument =
            serde_json::from_str(json).map_err(|e| Error::LayoutParse(e.to_string()))?;

        let mut layout = Self::default();

        for (index, page) in doc.pages.iter().enumerate() {
            let fallback_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let number = page.number.filter(|&n| n >= 1).unwrap_or(fallback_number);

            let (size, substituted) = PageSize::new(page.width, page.height).sanitized();
            if substituted {
                warn!("Page {} has no usable width/height, defaulting to A4", number);
            }
            layout.page_sizes.push(size);

            let mut line_no = 0usize;
            for block in &page.blocks {
                if block.kind.as_deref().is_some_and(|k| k != "text") {
                    continue;
                }
                for line in &block.lines {
                    let text = line.text();
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let Some(bbox) = &line.bbox else {
                        debug!("Skipping line without bbox on page {}", number);
                        continue;
                    };
                    let (x0, top, x1, bottom) = bbox.corners();

                    line_no += 1;
                    let item = LineItem::new(
                        number,
                        BoundingBox::from_top_left(x0, top, x1, bottom, size.height),
                        line.font_size(),
                        text,
                        format!("p{number:03}_l{line_no:04}"),
                    );
                    if item.is_well_formed() {
                        layout.items.push(item);
                    } else {
                        debug!("Dropping malformed line {} on page {}", item.id, number);
                    }
                }
            }
        }

        debug!(
            "Parsed stext.json: {} page(s), {} line(s)",
            layout.page_sizes.len(),
            layout.items.len()
        );
        Ok(layout)
    }
}
