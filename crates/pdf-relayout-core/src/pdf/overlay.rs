//! Overlay composition: translated text drawn at the original coordinates.
//!
//! The overlay is a standalone PDF with one page per base page, each sized
//! exactly like the base page so coordinates line up when the two are
//! stacked. Each item gets an optional opaque wipe over its box, then its
//! fitted translation.
//!
//! # Coordinate System
//!
//! Line items already use the PDF convention (bottom-left origin, y up), so
//! boxes are written to the content stream as-is.

use std::collections::BTreeMap;
use std::fmt::Write;

use lopdf::{Document, Object, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TextColor;
use crate::error::{Error, Result};
use crate::fit::{FitOptions, fit_text};
use crate::layout::{LineItem, PageSize, TranslatedLine, align};

use super::font::{OVERLAY_FONT_RESOURCE, OverlayFont};

/// Options for overlay composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayOptions {
    /// Paint an opaque rectangle over each item's box before drawing
    #[serde(default)]
    pub paint_background: bool,
    /// Wipe color
    #[serde(default = "TextColor::white")]
    pub background: TextColor,
    /// Translation text color
    #[serde(default = "TextColor::black")]
    pub text_color: TextColor,
    /// Text fitting parameters
    #[serde(skip)]
    pub fit: FitOptions,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            paint_background: false,
            background: TextColor::white(),
            text_color: TextColor::black(),
            fit: FitOptions::default(),
        }
    }
}

/// Degradation counts for one composed overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverlayReport {
    pub pages: usize,
    pub items: usize,
    pub lines_drawn: usize,
    pub shrunk: usize,
    pub truncated: usize,
    pub substituted_pages: usize,
    /// Items on pages past the end of the page-size list
    pub dropped: usize,
}

impl std::fmt::Display for OverlayReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} page(s), {} item(s), {} line(s) drawn, {} shrunk, {} truncated",
            self.pages, self.items, self.lines_drawn, self.shrunk, self.truncated
        )?;
        if self.substituted_pages > 0 {
            write!(f, ", {} page size(s) substituted", self.substituted_pages)?;
        }
        if self.dropped > 0 {
            write!(f, ", {} item(s) beyond the last page dropped", self.dropped)?;
        }
        Ok(())
    }
}

/// A composed overlay PDF.
#[derive(Debug, Clone)]
pub struct OverlayDocument {
    pub bytes: Vec<u8>,
    pub report: OverlayReport,
}

/// Builds overlay PDFs with one font and one set of options.
pub struct OverlayCompositor<'a> {
    font: &'a OverlayFont,
    options: OverlayOptions,
}

impl<'a> OverlayCompositor<'a> {
    pub const fn new(font: &'a OverlayFont, options: OverlayOptions) -> Self {
        Self { font, options }
    }

    pub const fn options(&self) -> &OverlayOptions {
        &self.options
    }

    /// Compose the overlay for `items` and their translations.
    ///
    /// There is one page per entry of `page_sizes`; items on later pages are
    /// dropped with a warning. Without any page sizes the highest item page
    /// sets the count. Degenerate page sizes are replaced with A4.
    ///
    /// # Errors
    ///
    /// - [`Error::AlignmentMismatch`] when the counts differ; nothing is drawn.
    /// - [`Error::EmptyDocument`] when there are no items or no pages.
    pub fn compose<S: AsRef<str>>(
        &self,
        items: &[LineItem],
        translated: &[S],
        page_sizes: &[PageSize],
    ) -> Result<OverlayDocument> {
        let lines = align("overlay", items, translated)?;

        let page_count = if page_sizes.is_empty() {
            let max_item_page = items.iter().map(|i| i.page).max().unwrap_or(0);
            usize::try_from(max_item_page).unwrap_or(0)
        } else {
            page_sizes.len()
        };
        if items.is_empty() || page_count == 0 {
            return Err(Error::EmptyDocument { stage: "overlay" });
        }

        let mut report = OverlayReport {
            items: items.len(),
            ..OverlayReport::default()
        };

        let last_page = u32::try_from(page_count).unwrap_or(u32::MAX);
        let mut by_page: BTreeMap<u32, Vec<TranslatedLine<'_>>> = BTreeMap::new();
        for line in lines {
            if line.item.page == 0 {
                warn!("Skipping item {} without a page number", line.item.id);
                continue;
            }
            if line.item.page > last_page {
                warn!(
                    "Dropping item {} on page {}, document has {} page(s)",
                    line.item.id, line.item.page, page_count
                );
                report.dropped += 1;
                continue;
            }
            by_page.entry(line.item.page).or_default().push(line);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = self.font.add_to_document(&mut doc);
        let resources_id = doc.add_object(lopdf::Dictionary::from_iter([(
            "Font",
            Object::Dictionary(lopdf::Dictionary::from_iter([(
                OVERLAY_FONT_RESOURCE,
                Object::Reference(font_id),
            )])),
        )]));

        let mut kids = Vec::with_capacity(page_count);
        for page_number in 1..=last_page {
            let provided = PageSize::for_page(page_sizes, page_number);
            let (size, substituted) = provided
                .unwrap_or_else(|| PageSize::new(0.0, 0.0))
                .sanitized();
            if substituted {
                warn!(
                    "Page {} has unusable size {:?}, using A4 {}x{}",
                    page_number, provided, size.width, size.height
                );
                report.substituted_pages += 1;
            }

            let page_lines = by_page.get(&page_number).map_or(&[][..], Vec::as_slice);
            let content = self.page_content(page_lines, &mut report);

            let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(lopdf::Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        0.into(),
                        0.into(),
                        Object::Real(size.width),
                        Object::Real(size.height),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Reference(resources_id)),
            ]));
            kids.push(Object::Reference(page_id));
            report.pages += 1;
        }

        #[allow(clippy::cast_possible_wrap)]
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(lopdf::Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );
        let catalog_id = doc.add_object(lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to save overlay: {e}")))?;

        info!("Overlay composed: {}", report);
        Ok(OverlayDocument { bytes, report })
    }

    /// Content stream for one page.
    fn page_content(&self, lines: &[TranslatedLine<'_>], report: &mut OverlayReport) -> String {
        let mut content = String::new();
        content.push_str("q\n");

        let TextColor { r, g, b } = self.options.text_color;
        let TextColor {
            r: br,
            g: bg,
            b: bb,
        } = self.options.background;

        for line in lines {
            let bbox = &line.item.bbox;

            if self.options.paint_background {
                let _ = writeln!(content, "{br} {bg} {bb} rg");
                let _ = writeln!(
                    content,
                    "{:.2} {:.2} {:.2} {:.2} re f",
                    bbox.x0,
                    bbox.y0,
                    bbox.width(),
                    bbox.height()
                );
            }

            let fitted = fit_text(line.text, bbox, line.item.font_size, self.font, &self.options.fit);
            if fitted.shrunk {
                report.shrunk += 1;
            }
            if fitted.truncated {
                debug!("Truncated {}: {:?}", line.item.id, line.text);
                report.truncated += 1;
            }

            let _ = writeln!(content, "{r} {g} {b} rg");
            // OCR layers often leave the invisible render mode (3) set
            content.push_str("0 Tr\n");
            for placed in fitted.placements(bbox) {
                if placed.text.is_empty() {
                    continue;
                }
                content.push_str("BT\n");
                let _ = writeln!(content, "/{OVERLAY_FONT_RESOURCE} {:.2} Tf", fitted.font_size);
                let _ = writeln!(content, "{:.2} {:.2} Td", placed.x, placed.y);
                let _ = writeln!(content, "<{}> Tj", self.font.encode_hex(placed.text));
                content.push_str("ET\n");
                report.lines_drawn += 1;
            }
        }

        content.push_str("Q\n");
        content
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layout::BoundingBox;

    fn item(page: u32, y: f32, text: &str) -> LineItem {
        LineItem::new(
            page,
            BoundingBox::new(50.0, y, 300.0, y + 14.0),
            11.0,
            text,
            format!("p{page}_{text}"),
        )
    }

    fn page_text(bytes: &[u8], page_number: u32) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        let content = doc.get_page_content(pages[&page_number]).unwrap();
        String::from_utf8_lossy(&content).into_owned()
    }

    #[test]
    fn test_pages_match_sizes() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items = vec![item(1, 700.0, "Bonjour"), item(3, 500.0, "Fin")];
        let sizes = vec![
            PageSize::new(612.0, 792.0),
            PageSize::new(300.0, 400.0),
            PageSize::new(612.0, 792.0),
        ];
        let out = compositor.compose(&items, &["Hallo", "Ende"], &sizes).unwrap();

        let doc = Document::load_mem(&out.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(out.report.pages, 3);
        assert_eq!(out.report.lines_drawn, 2);
        assert_eq!(out.report.substituted_pages, 0);

        let page2 = doc.get_pages()[&2];
        let media_box = doc.get_dictionary(page2).unwrap().get(b"MediaBox").unwrap().as_array().unwrap().clone();
        assert_eq!(media_box[2].as_float().unwrap(), 300.0);
        assert_eq!(media_box[3].as_float().unwrap(), 400.0);

        assert!(page_text(&out.bytes, 1).contains("<48616C6C6F> Tj"));
        assert!(!page_text(&out.bytes, 2).contains("Tj"));
    }

    #[test]
    fn test_mismatch_renders_nothing() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items: Vec<LineItem> = (0..4u8)
            .map(|i| item(1, 100.0 + f32::from(i) * 20.0, "x"))
            .collect();
        let err = compositor
            .compose(&items, &["a", "b", "c"], &[PageSize::a4()])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AlignmentMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_items_is_empty_document() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let empty: [&str; 0] = [];
        let err = compositor.compose(&[], &empty, &[]).unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { stage: "overlay" }));
    }

    #[test]
    fn test_degenerate_size_is_substituted() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items = vec![item(2, 600.0, "Texte")];
        let out = compositor
            .compose(
                &items,
                &["Text"],
                &[PageSize::new(0.0, 0.0), PageSize::new(612.0, f32::NAN)],
            )
            .unwrap();
        assert_eq!(out.report.pages, 2);
        assert_eq!(out.report.substituted_pages, 2);
        assert_eq!(out.report.lines_drawn, 1);
    }

    #[test]
    fn test_without_sizes_item_pages_are_a4() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items = vec![item(2, 600.0, "Texte")];
        let out = compositor.compose(&items, &["Text"], &[]).unwrap();
        assert_eq!(out.report.pages, 2);
        assert_eq!(out.report.substituted_pages, 2);
    }

    #[test]
    fn test_stray_page_number_is_dropped() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items = vec![item(1, 700.0, "Bonjour"), item(100_000, 500.0, "Perdu")];
        let out = compositor
            .compose(&items, &["Hallo", "Lost"], &[PageSize::new(612.0, 792.0)])
            .unwrap();

        assert_eq!(Document::load_mem(&out.bytes).unwrap().get_pages().len(), 1);
        assert_eq!(out.report.pages, 1);
        assert_eq!(out.report.lines_drawn, 1);
        assert_eq!(out.report.dropped, 1);
        assert!(out.report.to_string().contains("1 item(s) beyond the last page dropped"));
    }

    #[test]
    fn test_background_wipe_is_optional() {
        let font = OverlayFont::Builtin;
        let items = vec![item(1, 700.0, "Bonjour")];
        let sizes = [PageSize::a4()];

        let plain = OverlayCompositor::new(&font, OverlayOptions::default())
            .compose(&items, &["Hallo"], &sizes)
            .unwrap();
        assert!(!page_text(&plain.bytes, 1).contains("re f"));

        let options = OverlayOptions {
            paint_background: true,
            ..OverlayOptions::default()
        };
        let wiped = OverlayCompositor::new(&font, options)
            .compose(&items, &["Hallo"], &sizes)
            .unwrap();
        let content = page_text(&wiped.bytes, 1);
        assert!(content.contains("1 1 1 rg"));
        assert!(content.contains("50.00 700.00 250.00 14.00 re f"));
        // Wipe comes before the text
        assert!(content.find("re f").unwrap() < content.find("Tj").unwrap());
    }

    #[test]
    fn test_report_counts_truncation() {
        let font = OverlayFont::Builtin;
        let compositor = OverlayCompositor::new(&font, OverlayOptions::default());
        let items = vec![LineItem::new(
            1,
            BoundingBox::new(50.0, 700.0, 90.0, 712.0),
            10.0,
            "Court",
            "short",
        )];
        let out = compositor
            .compose(
                &items,
                &["Eine deutlich laengere Uebersetzung als das Original"],
                &[PageSize::a4()],
            )
            .unwrap();
        assert_eq!(out.report.truncated, 1);
        assert!(out.report.lines_drawn >= 1);
        assert!(out.report.to_string().contains("1 truncated"));
    }
}
