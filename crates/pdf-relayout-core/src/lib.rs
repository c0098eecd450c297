//! PDF Relayout Core Library
//!
//! Rebuilds translated text on top of an existing PDF while keeping the
//! original page layout:
//! - Layout normalization of fragmented text geometry into line items
//! - Line-for-line translation (OpenAI-compatible APIs or shell commands)
//! - Text fitting into the original boxes (wrap, shrink, ellipsize)
//! - Overlay composition and merging onto the base document
//! - Optional auto-tuning of thresholds against a raster of the original

pub mod cache;
pub mod config;
pub mod error;
pub mod fit;
pub mod layout;
pub mod pdf;
pub mod translator;
pub mod tune;
pub mod util;

pub use cache::{CacheKey, TranslationCache};
pub use config::{AppConfig, Lang, TextColor, TranslatorConfig};
pub use error::{Error, Result};
pub use fit::{FitOptions, FitResult, FontMetrics, fit_text};
pub use layout::{BoundingBox, LineItem, NormalizeOptions, PageLayout, PageSize, align, normalize};
pub use pdf::{
    DocumentMerger, GhostscriptStripper, LopdfMerger, MuPdfLayoutProvider, MuPdfRasterizer,
    OverlayCompositor, OverlayDocument, OverlayFont, OverlayOptions, OverlayReport, PageRasterizer,
    PdfDocument,
};
pub use translator::{AbbreviationMap, CommandTranslator, OpenAiTranslator, Translator, create_translator};
pub use tune::{AutoTuner, TuneOutcome};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline stage, reported to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalizing,
    Translating { lines: usize },
    Tuning { cells: usize },
    Composing,
    Merging,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normalizing => write!(f, "Normalizing layout"),
            Self::Translating { lines } => write!(f, "Translating {lines} line(s)"),
            Self::Tuning { cells } => write!(f, "Auto-tuning over {cells} configuration(s)"),
            Self::Composing => write!(f, "Composing overlay"),
            Self::Merging => write!(f, "Merging overlay"),
        }
    }
}

/// Documents one run works on
#[derive(Debug, Clone, Copy)]
pub struct RelayoutInput<'a> {
    /// Extracted geometry of the original document
    pub layout: &'a PageLayout,
    /// The original PDF, used as the auto-tune reference
    pub original: &'a [u8],
    /// The PDF the overlay is merged onto (original or text-stripped)
    pub base: &'a [u8],
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct RelayoutOutput {
    /// Final merged PDF
    pub pdf: Vec<u8>,
    /// The standalone overlay and its degradation report
    pub overlay: OverlayDocument,
    /// Normalized items that were drawn
    pub items: Vec<LineItem>,
    /// Translation of each item, same order
    pub translated: Vec<String>,
    /// Present when auto-tuning ran
    pub tune: Option<TuneOutcome>,
}

/// High-level pipeline that combines all components
pub struct RelayoutPipeline {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    abbreviations: AbbreviationMap,
    font: OverlayFont,
    merger: Box<dyn DocumentMerger>,
    rasterizer: Box<dyn PageRasterizer>,
    debug_dir: Option<PathBuf>,
    config: AppConfig,
}

impl RelayoutPipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let translator = create_translator(&config.translator)?;
        Self::with_translator(translator, config)
    }

    /// Create with a custom translator
    pub fn with_translator(translator: Arc<dyn Translator>, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let font = OverlayFont::load(config.overlay.font_path.as_deref())?;
        let abbreviations = AbbreviationMap::parse(
            &config.abbreviations.entries,
            config.abbreviations.prefer_full,
        );
        if !abbreviations.is_empty() {
            debug!("Loaded {} abbreviation(s)", abbreviations.len());
        }

        Ok(Self {
            translator,
            cache: TranslationCache::new(&config.cache),
            abbreviations,
            font,
            merger: Box::new(LopdfMerger::new()),
            rasterizer: Box::new(MuPdfRasterizer::new()),
            debug_dir: None,
            config,
        })
    }

    /// Replace the overlay merger
    #[must_use]
    pub fn with_merger(mut self, merger: Box<dyn DocumentMerger>) -> Self {
        self.merger = merger;
        self
    }

    /// Replace the rasterizer used for auto-tuning
    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: Box<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Keep intermediate artifacts (items, overlay, tune rasters) in `dir`
    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn translator_info(&self) -> translator::TranslatorInfo {
        self.translator.info()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Source lines sent to the translator for `items`
    pub fn prepare_lines(&self, items: &[LineItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| self.abbreviations.apply(&util::single_line(&item.text)))
            .collect()
    }

    /// Translate `items` line for line through the cache
    pub async fn translate_items(&self, items: &[LineItem]) -> Result<Vec<String>> {
        let lines = self.prepare_lines(items);
        let translated = self
            .cache
            .translate_lines(
                self.translator.as_ref(),
                &lines,
                &self.config.source_lang,
                &self.config.target_lang,
            )
            .await?;
        layout::check_alignment("translation", items.len(), translated.len())?;
        Ok(translated.iter().map(|t| util::single_line(t)).collect())
    }

    /// Run the whole pipeline on one document
    pub async fn relayout(
        &self,
        input: RelayoutInput<'_>,
        progress: Option<&(dyn Fn(Stage) + Sync)>,
    ) -> Result<RelayoutOutput> {
        let report = |stage: Stage| {
            debug!("{}", stage);
            if let Some(progress) = progress {
                progress(stage);
            }
        };

        if input.layout.is_empty() {
            return Err(Error::EmptyDocument { stage: "extraction" });
        }
        let page_sizes = &input.layout.page_sizes;

        info!(
            "Relayout of {} raw item(s) over {} page(s) with {}",
            input.layout.items.len(),
            page_sizes.len(),
            self.translator.name()
        );

        let mut fit = self.config.fit.clone();
        let (items, translated, tune) = if self.config.tune.enabled {
            report(Stage::Normalizing);
            let mut candidates = tune::prepare_candidates(
                &input.layout.items,
                page_sizes,
                &self.config.layout,
                &self.config.tune.v_tol_grid,
            );
            for candidate in &mut candidates {
                report(Stage::Translating { lines: candidate.items.len() });
                candidate.translated = self.translate_items(&candidate.items).await?;
            }

            report(Stage::Tuning {
                cells: candidates.len() * self.config.tune.min_font_grid.len(),
            });
            let mut tuner = AutoTuner::new(
                self.rasterizer.as_ref(),
                self.merger.as_ref(),
                &self.font,
                self.config.overlay.overlay_options(&fit),
                self.config.tune.dpi,
            );
            if let Some(ref dir) = self.debug_dir {
                tuner = tuner.with_debug_dir(dir);
            }
            let outcome = tuner.search(
                input.original,
                input.base,
                page_sizes,
                &candidates,
                &self.config.tune.min_font_grid,
            )?;

            fit = fit.with_min_size(outcome.min_font);
            let chosen = candidates.swap_remove(outcome.candidate);
            (chosen.items, chosen.translated, Some(outcome))
        } else {
            report(Stage::Normalizing);
            let items = normalize(&input.layout.items, page_sizes, &self.config.layout);
            report(Stage::Translating { lines: items.len() });
            let translated = self.translate_items(&items).await?;
            (items, translated, None)
        };

        report(Stage::Composing);
        let overlay = OverlayCompositor::new(&self.font, self.config.overlay.overlay_options(&fit))
            .compose(&items, &translated, page_sizes)?;

        report(Stage::Merging);
        let pdf = self.merger.merge(&overlay.bytes, input.base)?;

        if let Some(ref dir) = self.debug_dir {
            write_debug(dir, &items, &translated, &overlay)?;
        }

        info!("Relayout complete: {}", overlay.report);
        Ok(RelayoutOutput {
            pdf,
            overlay,
            items,
            translated,
            tune,
        })
    }
}

/// Dump normalized items with their translations and the bare overlay
fn write_debug(
    dir: &std::path::Path,
    items: &[LineItem],
    translated: &[String],
    overlay: &OverlayDocument,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let lines: Vec<serde_json::Value> = layout::align("debug", items, translated)?
        .into_iter()
        .map(|line| {
            serde_json::json!({
                "id": line.item.id,
                "page": line.item.page,
                "bbox": line.item.bbox.as_array(),
                "font_size": line.item.font_size,
                "source": line.item.text,
                "translated": line.text,
            })
        })
        .collect();
    let json = serde_json::to_string_pretty(&lines)
        .map_err(|e| Error::PdfSave(format!("Failed to serialize items: {e}")))?;

    std::fs::write(dir.join("items.json"), json)?;
    std::fs::write(dir.join("overlay.pdf"), &overlay.bytes)?;
    debug!("Wrote debug artifacts to {}", dir.display());
    Ok(())
}
