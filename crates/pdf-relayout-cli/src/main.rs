//! PDF Relayout CLI - Draw translated text over a PDF, keeping its layout.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_relayout_core::pdf::BackgroundStripper;
use pdf_relayout_core::{
    AppConfig, GhostscriptStripper, Lang, MuPdfLayoutProvider, PageLayout, PdfDocument,
    RelayoutInput, RelayoutPipeline, Stage,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-relayout")]
#[command(author, version, about = "Overlay translated text on a PDF, preserving its layout", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF file (default: input-<target>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shell command translating stdin lines to stdout lines (overrides the API backend)
    #[arg(long, env = "PDF_RELAYOUT_TRANSLATOR_CMD")]
    translator_cmd: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Source language code
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language code
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Remove the original text with Ghostscript before overlaying
    #[arg(long)]
    strip_text: bool,

    /// Paint a white box behind every translated line
    #[arg(long)]
    paint_white: bool,

    /// TrueType font for the overlay (default: built-in Helvetica)
    #[arg(long)]
    font_ttf: Option<PathBuf>,

    /// Abbreviation entry TOKEN=Full|Short (repeatable)
    #[arg(long = "abbr", value_name = "TOKEN=Full|Short")]
    abbreviations: Vec<String>,

    /// Expand abbreviations to their full form
    #[arg(long)]
    prefer_full_terms: bool,

    /// Vertical tolerance in points for merging fragments into lines
    #[arg(long)]
    merge_vtol: Option<f32>,

    /// Minimum font size when shrinking text to fit
    #[arg(long)]
    min_font: Option<f32>,

    /// Search grouping tolerance and minimum font size against a raster of the original
    #[arg(long)]
    auto_tune: bool,

    /// Read text geometry from a MuPDF stext.json instead of extracting it
    #[arg(long)]
    stext_json: Option<PathBuf>,

    /// Keep intermediate files (stripped PDF, items, overlay, rasters) here
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable the line cache
    #[arg(long)]
    no_cache: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Override config values with whatever was given on the command line
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref source) = self.source {
            config.source_lang = Lang::new(source);
        }
        if let Some(ref target) = self.target {
            config.target_lang = Lang::new(target);
        }

        if let Some(ref command) = self.translator_cmd {
            config.translator.command = Some(command.clone());
        }
        if let Some(ref api_base) = self.api_base {
            config.translator.api_base = api_base.clone();
        }
        if let Some(ref api_key) = self.api_key {
            config.translator.api_key = Some(api_key.clone());
        }
        if let Some(ref model) = self.model {
            config.translator.model = model.clone();
        }

        config.overlay.strip_text |= self.strip_text;
        config.overlay.paint_white_bg |= self.paint_white;
        if let Some(ref font) = self.font_ttf {
            config.overlay.font_path = Some(font.clone());
        }

        if !self.abbreviations.is_empty() {
            config.abbreviations.entries.extend(self.abbreviations.iter().cloned());
        }
        config.abbreviations.prefer_full |= self.prefer_full_terms;

        if let Some(v_tol) = self.merge_vtol {
            config.layout.v_tol = v_tol;
        }
        if let Some(min_font) = self.min_font {
            config.fit = config.fit.clone().with_min_size(min_font);
        }
        config.tune.enabled |= self.auto_tune;

        if self.no_cache {
            config.cache.enabled = false;
        }
    }

    fn output_path(&self, target: &Lang) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            self.input.with_file_name(format!("{stem}-{target}.pdf"))
        })
    }
}

/// Text geometry from a precomputed stext.json or from MuPDF directly
fn load_layout(args: &Args, doc: &PdfDocument) -> Result<PageLayout> {
    if let Some(ref path) = args.stext_json {
        info!("Reading layout from {}", path.display());
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut layout = PageLayout::from_stext_json(&json).context("Failed to parse stext.json")?;
        if layout.page_sizes.len() < doc.page_count() {
            warn!(
                "stext.json covers {} of {} pages; using document page sizes",
                layout.page_sizes.len(),
                doc.page_count()
            );
            layout.page_sizes = doc.page_sizes().to_vec();
        }
        return Ok(layout);
    }

    let layout = MuPdfLayoutProvider::new()
        .extract_document(doc)
        .context("Failed to extract text layout")?;

    if let Some(ref dir) = args.debug_dir {
        let json = serde_json::to_string_pretty(&layout).context("Failed to serialize layout")?;
        std::fs::write(dir.join("layout.json"), json).context("Failed to write layout.json")?;
    }
    Ok(layout)
}

/// The document the overlay goes onto: the original, or a text-free copy
fn load_base(input: &Path, doc: &PdfDocument, strip: bool, work_dir: &Path) -> Result<Vec<u8>> {
    if !strip {
        return Ok(doc.bytes().to_vec());
    }

    let stripped = work_dir.join("base_stripped.pdf");
    info!("Stripping original text with Ghostscript");
    GhostscriptStripper::default()
        .strip(input, &stripped)
        .context("Failed to strip original text (is Ghostscript installed?)")?;
    std::fs::read(&stripped).with_context(|| format!("Failed to read {}", stripped.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load config, then let flags override it
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load().context("Failed to load configuration")?
    };
    args.apply(&mut config);

    // Intermediate files live in the debug dir when given, else in a temp dir
    let temp_dir = tempfile::tempdir().context("Failed to create temporary directory")?;
    let work_dir = match args.debug_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create debug dir: {}", dir.display()))?;
            dir.clone()
        }
        None => temp_dir.path().to_path_buf(),
    };

    // Load input PDF
    info!("Loading PDF: {}", args.input.display());
    let doc = PdfDocument::from_file(&args.input)
        .with_context(|| format!("Failed to load PDF: {}", args.input.display()))?;
    info!("Document has {} pages", doc.page_count());

    let layout = load_layout(&args, &doc)?;
    if layout.is_empty() {
        anyhow::bail!(
            "No text found in {} (scanned documents need an OCR'd stext.json)",
            args.input.display()
        );
    }
    info!("Extracted {} text item(s)", layout.items.len());

    let base = load_base(&args.input, &doc, config.overlay.strip_text, &work_dir)?;

    let target = config.target_lang.clone();
    let mut pipeline = RelayoutPipeline::new(config).context("Failed to initialize pipeline")?;
    if args.debug_dir.is_some() {
        pipeline = pipeline.with_debug_dir(&work_dir);
    }

    // Stage spinner
    let pb = ProgressBar::new_spinner();
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    let progress = |stage: Stage| pb.set_message(stage.to_string());

    let output = pipeline
        .relayout(
            RelayoutInput {
                layout: &layout,
                original: doc.bytes(),
                base: &base,
            },
            Some(&progress),
        )
        .await
        .context("Relayout failed")?;

    pb.finish_with_message("Relayout complete");

    if let Some(ref tune) = output.tune {
        info!(
            "Auto-tune chose v_tol={} min_font={} (score {:.4})",
            tune.v_tol, tune.min_font, tune.score
        );
    }

    let output_path = args.output_path(&target);
    std::fs::write(&output_path, &output.pdf)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Translated PDF saved to: {}", output_path.display());
        println!("{}", output.overlay.report);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "pdf-relayout",
            "in.pdf",
            "--translator-cmd",
            "cat",
            "-t",
            "de",
            "--strip-text",
            "--abbr",
            "DV=Devant|Dev.",
            "--prefer-full-terms",
            "--merge-vtol",
            "9",
            "--min-font",
            "8",
            "--auto-tune",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.target_lang.as_str(), "de");
        assert_eq!(config.translator.command.as_deref(), Some("cat"));
        assert!(config.overlay.strip_text);
        assert_eq!(config.abbreviations.entries, vec!["DV=Devant|Dev."]);
        assert!(config.abbreviations.prefer_full);
        assert!((config.layout.v_tol - 9.0).abs() < f32::EPSILON);
        assert_eq!(config.fit.min_size_override, Some(8.0));
        assert!(config.tune.enabled);
    }

    #[test]
    fn test_default_output_path() {
        let args = Args::parse_from(["pdf-relayout", "/tmp/pattern.pdf"]);
        assert_eq!(
            args.output_path(&Lang::new("en")),
            PathBuf::from("/tmp/pattern-en.pdf")
        );
    }
}
