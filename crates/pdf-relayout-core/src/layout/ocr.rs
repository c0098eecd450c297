//! Conversion of OCR annotations on rendered page images into line items.
//!
//! OCR engines report boxes against a raster, top-left origin, either
//! normalized to `0..1` or in pixels. The raster was rendered at a known DPI,
//! which gives the pixel-to-point scale. Some renderers hand back rotated
//! rasters: when the image matches the transposed expected size within 5 %,
//! its axes are swapped before scaling.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::item::{BoundingBox, LineItem, PageSize};

/// Relative tolerance for detecting a rotated page raster.
const ROTATION_TOLERANCE: f32 = 0.05;

/// Smallest font size estimated from an OCR box.
const MIN_OCR_FONT_SIZE: f32 = 8.0;

/// Font size estimate as a fraction of the box height.
const OCR_FONT_HEIGHT_RATIO: f32 = 0.8;

/// Geometry of one OCR hit, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrGeometry {
    /// `[x, y, w, h]` as fractions of the image size
    Normalized([f32; 4]),
    /// `[x0, y0, x1, y1]` in image pixels
    Pixels([f32; 4]),
}

/// One recognized text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrAnnotation {
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
    pub geometry: OcrGeometry,
}

/// OCR output for one rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// 1-based page number
    pub page: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub annotations: Vec<OcrAnnotation>,
}

/// Convert OCR pages rendered at `dpi` into y-up line items.
///
/// Empty texts and boxes that collapse to nothing are skipped. Ids are
/// `p{page}_l{n}`, numbered per page in annotation order.
#[allow(clippy::cast_precision_loss)]
pub fn items_from_ocr(pages: &[OcrPage], page_sizes: &[PageSize], dpi: f32) -> Vec<LineItem> {
    let mut items = Vec::new();

    for page in pages {
        if page.image_width == 0 || page.image_height == 0 {
            debug!("Skipping OCR page {} without image size", page.page);
            continue;
        }
        let size = PageSize::for_page(page_sizes, page.page)
            .unwrap_or_default()
            .sanitized()
            .0;

        let (img_w, img_h) = raster_dimensions(
            page.image_width as f32,
            page.image_height as f32,
            size,
            dpi,
        );
        let scale_x = size.width / img_w;
        let scale_y = size.height / img_h;

        let mut line_no = 0usize;
        for ann in &page.annotations {
            let text = ann.text.trim();
            if text.is_empty() {
                continue;
            }
            let (x0_px, top_px, x1_px, bottom_px) = match ann.geometry {
                OcrGeometry::Normalized([x, y, w, h]) => {
                    (x * img_w, y * img_h, (x + w) * img_w, (y + h) * img_h)
                }
                OcrGeometry::Pixels([x0, y0, x1, y1]) => (x0, y0, x1, y1),
            };

            let bbox = BoundingBox::from_top_left(
                x0_px * scale_x,
                top_px * scale_y,
                x1_px * scale_x,
                bottom_px * scale_y,
                size.height,
            );
            let font_size = (bbox.height() * OCR_FONT_HEIGHT_RATIO).max(MIN_OCR_FONT_SIZE);

            let item = LineItem::new(
                page.page,
                bbox,
                font_size,
                text,
                format!("p{:03}_l{:04}", page.page, line_no + 1),
            );
            if item.is_well_formed() {
                line_no += 1;
                items.push(item);
            }
        }
        debug!("OCR page {}: {} line(s)", page.page, line_no);
    }

    items
}

/// Image dimensions to scale against, swapped when the raster is rotated.
fn raster_dimensions(img_w: f32, img_h: f32, size: PageSize, dpi: f32) -> (f32, f32) {
    let expected_w = size.width * dpi / 72.0;
    let expected_h = size.height * dpi / 72.0;

    let rotated = (img_w - expected_h).abs() < ROTATION_TOLERANCE * expected_h
        && (img_h - expected_w).abs() < ROTATION_TOLERANCE * expected_w;
    if rotated && (img_w - img_h).abs() > f32::EPSILON {
        debug!(
            "Rotated raster detected: {}x{} vs expected {:.0}x{:.0}",
            img_w, img_h, expected_w, expected_h
        );
        (img_h, img_w)
    } else {
        (img_w, img_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(width: u32, height: u32, annotations: Vec<OcrAnnotation>) -> OcrPage {
        OcrPage {
            page: 1,
            image_width: width,
            image_height: height,
            annotations,
        }
    }

    fn ann(text: &str, geometry: OcrGeometry) -> OcrAnnotation {
        OcrAnnotation {
            text: text.to_string(),
            confidence: 0.9,
            geometry,
        }
    }

    #[test]
    fn test_normalized_boxes_map_to_points() {
        // 144x288pt page at 72 DPI renders to a 144x288px image.
        let sizes = [PageSize::new(144.0, 288.0)];
        let pages = [page(
            144,
            288,
            vec![ann("Bonjour", OcrGeometry::Normalized([0.25, 0.5, 0.5, 0.125]))],
        )];
        let items = items_from_ocr(&pages, &sizes, 72.0);
        assert_eq!(items.len(), 1);
        // top = 144, bottom = 180 -> y0 = 108, y1 = 144
        assert_eq!(items[0].bbox.as_array(), [36.0, 108.0, 108.0, 144.0]);
        // height 36 * 0.8
        assert!((items[0].font_size - 28.8).abs() < 1e-4);
        assert_eq!(items[0].id, "p001_l0001");
    }

    #[test]
    fn test_pixel_boxes_scale_by_dpi() {
        let sizes = [PageSize::new(100.0, 200.0)];
        // 144 DPI doubles the raster
        let pages = [page(
            200,
            400,
            vec![ann("x", OcrGeometry::Pixels([20.0, 40.0, 60.0, 50.0]))],
        )];
        let items = items_from_ocr(&pages, &sizes, 144.0);
        assert_eq!(items[0].bbox.as_array(), [10.0, 175.0, 30.0, 180.0]);
        assert!((items[0].font_size - MIN_OCR_FONT_SIZE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rotated_raster_swaps_axes() {
        let sizes = [PageSize::new(100.0, 200.0)];
        // Image came back landscape: 400x200 at 144 DPI
        let pages = [page(
            400,
            200,
            vec![ann("x", OcrGeometry::Pixels([0.0, 0.0, 100.0, 40.0]))],
        )];
        let items = items_from_ocr(&pages, &sizes, 144.0);
        // Scale is 0.5 on both axes after the swap
        assert_eq!(items[0].bbox.as_array(), [0.0, 180.0, 50.0, 200.0]);
    }

    #[test]
    fn test_blank_and_degenerate_annotations_are_skipped() {
        let sizes = [PageSize::new(100.0, 100.0)];
        let pages = [page(
            100,
            100,
            vec![
                ann("   ", OcrGeometry::Normalized([0.1, 0.1, 0.2, 0.2])),
                ann("flat", OcrGeometry::Normalized([0.1, 0.1, 0.0, 0.2])),
                ann("ok", OcrGeometry::Normalized([0.1, 0.1, 0.2, 0.2])),
            ],
        )];
        let items = items_from_ocr(&pages, &sizes, 72.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "ok");
        assert_eq!(items[0].id, "p001_l0001");
    }
}
