//! Line translation cache.
//!
//! Auto-tuning normalizes the same page several times; most resulting lines
//! are shared between candidates, so each distinct line is sent to the
//! translator once per run.

mod key;
mod memory;

pub use key::CacheKey;
pub use memory::MemoryCache;

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::{CacheConfig, Lang};
use crate::error::Result;
use crate::layout::check_alignment;
use crate::translator::Translator;

/// Translation cache in front of any [`Translator`]
pub struct TranslationCache {
    memory: Option<MemoryCache>,
}

impl TranslationCache {
    /// Create a new translation cache from configuration
    pub fn new(config: &CacheConfig) -> Self {
        let memory = config
            .enabled
            .then(|| MemoryCache::new(config.max_entries, config.ttl_seconds));
        Self { memory }
    }

    /// A cache that never stores anything
    pub const fn disabled() -> Self {
        Self { memory: None }
    }

    /// Get a cached translation
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        match self.memory {
            Some(ref memory) => memory.get(key.as_str()).await,
            None => None,
        }
    }

    /// Store a translation in cache
    pub async fn insert(&self, key: &CacheKey, value: String) {
        if let Some(ref memory) = self.memory {
            memory.insert(key.to_string(), value).await;
        }
    }

    /// Clear all entries
    pub fn clear(&self) {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }
    }

    /// Translate `lines`, answering from the cache where possible.
    ///
    /// Misses are deduplicated and sent in one call, in first-seen order.
    /// The backend must return exactly one line per miss.
    pub async fn translate_lines(
        &self,
        translator: &dyn Translator,
        lines: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>> {
        let name = translator.name();
        let mut resolved: HashMap<&str, String> = HashMap::new();
        let mut misses: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(lines.len());

        for line in lines {
            if !seen.insert(line.as_str()) {
                continue;
            }
            let key = CacheKey::new(line, name, source, target);
            match self.get(&key).await {
                Some(hit) => {
                    resolved.insert(line, hit);
                }
                None => misses.push(line),
            }
        }

        debug!(
            "Line cache: {} distinct, {} hits, {} to translate",
            resolved.len() + misses.len(),
            resolved.len(),
            misses.len()
        );

        if !misses.is_empty() {
            let request: Vec<String> = misses.iter().map(|s| (*s).to_string()).collect();
            let translated = translator.translate_lines(&request, source, target).await?;
            check_alignment("translation", request.len(), translated.len())?;

            for (line, out) in misses.into_iter().zip(translated) {
                self.insert(&CacheKey::new(line, name, source, target), out.clone())
                    .await;
                resolved.insert(line, out);
            }
        }

        Ok(lines
            .iter()
            .map(|line| resolved.get(line.as_str()).cloned().unwrap_or_default())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::translator::TranslatorInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Upper-cases lines and records every request
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
    }

    #[async_trait]
    impl Translator for Recording {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "Recording",
                requires_api_key: false,
                supports_auto_detect: true,
            }
        }

        async fn translate_lines(&self, lines: &[String], _: &Lang, _: &Lang) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(lines.to_vec());
            let mut out: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn langs() -> (Lang, Lang) {
        (Lang::new("fr"), Lang::new("en"))
    }

    #[tokio::test]
    async fn test_duplicates_are_translated_once() {
        let cache = TranslationCache::new(&CacheConfig::default());
        let translator = Recording::default();
        let (src, tgt) = langs();

        let out = cache
            .translate_lines(&translator, &lines(&["a", "b", "a"]), &src, &tgt)
            .await
            .unwrap();
        assert_eq!(out, vec!["A", "B", "A"]);
        assert_eq!(*translator.calls.lock().unwrap(), vec![lines(&["a", "b"])]);
    }

    #[tokio::test]
    async fn test_repeated_lines_keep_first_seen_order() {
        let cache = TranslationCache::new(&CacheConfig::default());
        let translator = Recording::default();
        let (src, tgt) = langs();

        let input: Vec<String> = ["c", "a", "b"].iter().cycle().take(3000).map(|s| (*s).to_string()).collect();
        let out = cache.translate_lines(&translator, &input, &src, &tgt).await.unwrap();

        assert_eq!(out.len(), 3000);
        assert_eq!(out[2999], "B");
        assert_eq!(*translator.calls.lock().unwrap(), vec![lines(&["c", "a", "b"])]);
    }

    #[tokio::test]
    async fn test_second_run_only_sends_new_lines() {
        let cache = TranslationCache::new(&CacheConfig::default());
        let translator = Recording::default();
        let (src, tgt) = langs();

        cache.translate_lines(&translator, &lines(&["a", "b"]), &src, &tgt).await.unwrap();
        let out = cache
            .translate_lines(&translator, &lines(&["b", "c"]), &src, &tgt)
            .await
            .unwrap();
        assert_eq!(out, vec!["B", "C"]);

        let calls = translator.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], lines(&["c"]));
    }

    #[tokio::test]
    async fn test_all_hits_skip_translator() {
        let cache = TranslationCache::new(&CacheConfig::default());
        let translator = Recording::default();
        let (src, tgt) = langs();

        cache.translate_lines(&translator, &lines(&["a"]), &src, &tgt).await.unwrap();
        cache.translate_lines(&translator, &lines(&["a", "a"]), &src, &tgt).await.unwrap();
        assert_eq!(translator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_translates() {
        let cache = TranslationCache::disabled();
        let translator = Recording::default();
        let (src, tgt) = langs();

        cache.translate_lines(&translator, &lines(&["a"]), &src, &tgt).await.unwrap();
        cache.translate_lines(&translator, &lines(&["a"]), &src, &tgt).await.unwrap();
        assert_eq!(translator.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_short_backend_reply_is_an_alignment_error() {
        let cache = TranslationCache::new(&CacheConfig::default());
        let translator = Recording {
            drop_last: true,
            ..Recording::default()
        };
        let (src, tgt) = langs();

        let err = cache
            .translate_lines(&translator, &lines(&["a", "b"]), &src, &tgt)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AlignmentMismatch { stage: "translation", expected: 2, actual: 1 }
        ));
    }
}
