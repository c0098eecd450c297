use thiserror::Error;

/// Unified error type for pdf-relayout-core
///
/// Geometric and fitting degradations never show up here: they are recovered
/// locally and reported through [`crate::pdf::OverlayReport`]. What remains
/// are contract violations between components and failures of the
/// collaborators around the core:
/// - Alignment and empty-document violations
/// - PDF operations (opening, extraction, composing, merging, rendering)
/// - Translation backends (API requests, external commands)
/// - Font loading
/// - Configuration and general I/O
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Contract Errors
    // ==========================================================================
    /// Translated sequence length differs from the item sequence length
    #[error("alignment mismatch during {stage}: expected {expected} translated lines, got {actual}")]
    AlignmentMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Nothing to overlay (zero pages or zero items)
    #[error("empty document during {stage}: nothing to overlay")]
    EmptyDocument { stage: &'static str },

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text geometry from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to parse a precomputed layout (stext.json)
    #[error("failed to parse layout: {0}")]
    LayoutParse(String),

    /// Failed to rasterize a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to merge the overlay onto the base document
    #[error("failed to merge overlay: {0}")]
    PdfMerge(String),

    /// Failed to strip text from the base document
    #[error("failed to strip original text: {0}")]
    PdfStrip(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    /// Maximum retry attempts exceeded for translation
    #[error("translation failed after maximum retries")]
    TranslationMaxRetriesExceeded,

    /// External translator command failed
    #[error("translator command failed ({status}): {stderr}")]
    TranslationCommand { status: String, stderr: String },

    // ==========================================================================
    // Font Errors
    // ==========================================================================
    /// Failed to load or parse a TrueType font
    #[error("failed to load font: {0}")]
    FontLoad(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
