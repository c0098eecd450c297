use async_trait::async_trait;
use crate::config::Lang;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name, also part of the cache key
    pub name: &'static str,
    /// Whether this translator requires an API key
    pub requires_api_key: bool,
    /// Whether this translator supports auto-detection of source language
    pub supports_auto_detect: bool,
}

/// Trait for translation backends
///
/// Backends translate line sequences: one output line per input line, in
/// order. Implementations return whatever the backend produced; callers
/// check the count.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate each line from source language to target language
    async fn translate_lines(
        &self,
        lines: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>>;

    /// Translate a single piece of text
    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        let mut out = self
            .translate_lines(&[text.to_string()], source, target)
            .await?;
        Ok(out.pop().unwrap_or_default())
    }

    /// Check if the translator is available (e.g., API key configured)
    fn is_available(&self) -> bool {
        true
    }
}
