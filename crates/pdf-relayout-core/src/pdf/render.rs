use std::path::Path;

use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};

use crate::error::{Error, Result};
use super::document::{PdfDocument, mupdf_page_index};
use super::traits::PageRasterizer;

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Page rasterizer backed by MuPDF
#[derive(Debug, Clone, Copy, Default)]
pub struct MuPdfRasterizer;

impl MuPdfRasterizer {
    pub const fn new() -> Self {
        Self
    }

    /// Render a page of an opened document to an RGBA image buffer
    pub fn render_document_page(
        &self,
        doc: &PdfDocument,
        page_num: usize,
        dpi: f32,
    ) -> Result<RgbaImage> {
        let page_index = mupdf_page_index(page_num, doc.page_count())?;

        let mu = doc.open_document()?;
        let page = mu.load_page(page_index).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;

        let scale = dpi / POINTS_PER_INCH;
        let matrix = Matrix::new_scale(scale, scale);

        // Opaque white background so blank areas compare equal
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 0.0, true)
            .map_err(|e| Error::PdfRender {
                page: page_num,
                reason: format!("Failed to render: {e}"),
            })?;

        let pixels = pixmap.samples();
        let img_width = pixmap.width();
        let img_height = pixmap.height();

        let n = pixmap.n() as usize; // components per pixel
        let mut rgba_pixels = Vec::with_capacity(pixels.len() / n.max(1) * 4);

        for chunk in pixels.chunks(n.max(1)) {
            match n {
                3 => {
                    rgba_pixels.extend_from_slice(chunk);
                    rgba_pixels.push(255);
                }
                4 => rgba_pixels.extend_from_slice(chunk),
                1 => rgba_pixels.extend_from_slice(&[chunk[0], chunk[0], chunk[0], 255]),
                _ => {
                    return Err(Error::PdfRender {
                        page: page_num,
                        reason: format!("Unexpected pixel format with {n} components"),
                    });
                }
            }
        }

        RgbaImage::from_raw(img_width, img_height, rgba_pixels).ok_or_else(|| Error::PdfRender {
            page: page_num,
            reason: "Failed to create image buffer".to_string(),
        })
    }
}

impl PageRasterizer for MuPdfRasterizer {
    fn render_page(&self, pdf: &[u8], page_index: usize, dpi: f32) -> Result<RgbaImage> {
        let doc = PdfDocument::from_bytes(pdf.to_vec())?;
        self.render_document_page(&doc, page_index, dpi)
    }
}

/// Write a raster as PNG, used for debug artifacts.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        &mut png_data,
        image::codecs::png::CompressionType::Fast,
        image::codecs::png::FilterType::Adaptive,
    );

    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| Error::PdfRender {
            page: 0,
            reason: format!("Failed to encode PNG: {e}"),
        })?;

    std::fs::write(path, png_data)?;
    Ok(())
}
