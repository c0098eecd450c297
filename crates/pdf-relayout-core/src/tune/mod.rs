//! Grid search over grouping tolerance and minimum font size.
//!
//! Every cell of the grid is composed, merged onto the base document and
//! rasterized; the first page is compared with the original. The best score
//! wins and ties keep the earlier cell (outer loop `v_tol`, inner loop
//! minimum font size).

mod similarity;

pub use similarity::similarity;

use std::path::PathBuf;

use image::RgbaImage;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::layout::{LineItem, NormalizeOptions, PageSize, normalize};
use crate::pdf::{DocumentMerger, OverlayCompositor, OverlayFont, OverlayOptions, PageRasterizer, save_png};

/// Items normalized with one grouping tolerance, plus their translations.
#[derive(Debug, Clone)]
pub struct TuneCandidate {
    pub v_tol: f32,
    pub items: Vec<LineItem>,
    /// Filled by the caller before searching
    pub translated: Vec<String>,
}

/// Score of one evaluated grid cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneScore {
    pub v_tol: f32,
    pub min_font: f32,
    pub score: f64,
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct TuneOutcome {
    pub v_tol: f32,
    pub min_font: f32,
    pub score: f64,
    /// Index into the candidate slice that won
    pub candidate: usize,
    /// Every evaluated cell in evaluation order
    pub evaluated: Vec<TuneScore>,
}

/// Normalize `items` once per tolerance in `v_tol_grid`.
pub fn prepare_candidates(
    items: &[LineItem],
    page_sizes: &[PageSize],
    layout: &NormalizeOptions,
    v_tol_grid: &[f32],
) -> Vec<TuneCandidate> {
    v_tol_grid
        .iter()
        .map(|&v_tol| {
            let items = normalize(items, page_sizes, &layout.with_v_tol(v_tol));
            debug!("v_tol={} yields {} items", v_tol, items.len());
            TuneCandidate {
                v_tol,
                items,
                translated: Vec::new(),
            }
        })
        .collect()
}

/// Runs the grid search against one reference document.
pub struct AutoTuner<'a> {
    rasterizer: &'a dyn PageRasterizer,
    merger: &'a dyn DocumentMerger,
    font: &'a OverlayFont,
    overlay: OverlayOptions,
    dpi: f32,
    debug_dir: Option<PathBuf>,
}

impl<'a> AutoTuner<'a> {
    pub const fn new(
        rasterizer: &'a dyn PageRasterizer,
        merger: &'a dyn DocumentMerger,
        font: &'a OverlayFont,
        overlay: OverlayOptions,
        dpi: f32,
    ) -> Self {
        Self {
            rasterizer,
            merger,
            font,
            overlay,
            dpi,
            debug_dir: None,
        }
    }

    /// Write every raster as PNG into `dir`
    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Evaluate every `(candidate, min_font)` pair.
    ///
    /// `reference` is the original document, `base` the document the
    /// overlay is merged onto (the original or its stripped copy).
    ///
    /// # Errors
    ///
    /// [`Error::ConfigInvalid`] for an empty grid; otherwise the first
    /// failure of composing, merging or rasterizing a cell.
    pub fn search(
        &self,
        reference: &[u8],
        base: &[u8],
        page_sizes: &[PageSize],
        candidates: &[TuneCandidate],
        min_font_grid: &[f32],
    ) -> Result<TuneOutcome> {
        if candidates.is_empty() || min_font_grid.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "tune".to_string(),
                reason: "search grids must not be empty".to_string(),
            });
        }

        let reference_raster = self.rasterizer.render_page(reference, 0, self.dpi)?;
        self.dump(&reference_raster, "tune_reference.png")?;

        let mut best: Option<(usize, TuneScore)> = None;
        let mut evaluated = Vec::with_capacity(candidates.len() * min_font_grid.len());

        for (index, candidate) in candidates.iter().enumerate() {
            for &min_font in min_font_grid {
                let raster = self.render_cell(base, page_sizes, candidate, min_font)?;
                self.dump(
                    &raster,
                    &format!("tune_v{}_m{}.png", candidate.v_tol, min_font),
                )?;

                let score = TuneScore {
                    v_tol: candidate.v_tol,
                    min_font,
                    score: similarity(&reference_raster, &raster),
                };
                info!(
                    "Tune v_tol={} min_font={} score={:.4}",
                    score.v_tol, score.min_font, score.score
                );
                evaluated.push(score);

                if best.is_none_or(|(_, b)| score.score > b.score) {
                    best = Some((index, score));
                }
            }
        }

        let (candidate, best) = best.ok_or_else(|| Error::ConfigInvalid {
            field: "tune".to_string(),
            reason: "no grid cell evaluated".to_string(),
        })?;
        info!(
            "Tune best: v_tol={} min_font={} score={:.4}",
            best.v_tol, best.min_font, best.score
        );

        Ok(TuneOutcome {
            v_tol: best.v_tol,
            min_font: best.min_font,
            score: best.score,
            candidate,
            evaluated,
        })
    }

    fn render_cell(
        &self,
        base: &[u8],
        page_sizes: &[PageSize],
        candidate: &TuneCandidate,
        min_font: f32,
    ) -> Result<RgbaImage> {
        let mut options = self.overlay.clone();
        options.fit = options.fit.with_min_size(min_font);

        let overlay = OverlayCompositor::new(self.font, options).compose(
            &candidate.items,
            &candidate.translated,
            page_sizes,
        )?;
        let merged = self.merger.merge(&overlay.bytes, base)?;
        self.rasterizer.render_page(&merged, 0, self.dpi)
    }

    fn dump(&self, raster: &RgbaImage, name: &str) -> Result<()> {
        match self.debug_dir {
            Some(ref dir) => save_png(raster, &dir.join(name)),
            None => Ok(()),
        }
    }
}
