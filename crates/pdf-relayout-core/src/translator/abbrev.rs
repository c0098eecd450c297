//! Glossary expansion applied to source lines before translation.
//!
//! Entries look like `FR=Full|Short`. The whole-word token `FR` is replaced
//! by the full form when full terms are preferred, otherwise by the short
//! form (falling back to the full one when no short form is given).

use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
struct Entry {
    token: String,
    pattern: Regex,
    full: String,
    short: Option<String>,
}

/// Ordered set of abbreviation replacements
#[derive(Debug, Clone, Default)]
pub struct AbbreviationMap {
    entries: Vec<Entry>,
    prefer_full: bool,
}

impl AbbreviationMap {
    /// Parse `FR=Full|Short` entries.
    ///
    /// Entries without `=` or with an empty token are skipped with a warning.
    /// A repeated token replaces the earlier definition in place.
    pub fn parse<S: AsRef<str>>(entries: &[S], prefer_full: bool) -> Self {
        let mut map = Self {
            entries: Vec::new(),
            prefer_full,
        };

        for entry in entries {
            let entry = entry.as_ref();
            let Some((token, value)) = entry.split_once('=') else {
                warn!("Ignoring abbreviation without '=': {}", entry);
                continue;
            };
            let token = token.trim();
            if token.is_empty() {
                warn!("Ignoring abbreviation with empty token: {}", entry);
                continue;
            }

            let (full, short) = match value.split_once('|') {
                Some((full, short)) => (full.trim(), Some(short.trim())),
                None => (value.trim(), None),
            };
            let short = short.filter(|s| !s.is_empty()).map(str::to_string);

            let pattern = match Regex::new(&format!(r"\b{}\b", regex::escape(token))) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("Ignoring abbreviation {}: {}", token, e);
                    continue;
                }
            };

            let entry = Entry {
                token: token.to_string(),
                pattern,
                full: full.to_string(),
                short,
            };
            if let Some(existing) = map.entries.iter_mut().find(|e| e.token == entry.token) {
                *existing = entry;
            } else {
                map.entries.push(entry);
            }
        }

        map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every known token in `text`, entries applied in order.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for entry in &self.entries {
            let replacement = if self.prefer_full {
                entry.full.as_str()
            } else {
                entry.short.as_deref().unwrap_or(&entry.full)
            };
            out = entry
                .pattern
                .replace_all(&out, regex::NoExpand(replacement))
                .into_owned();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefer_full_and_short() {
        let specs = ["DV=Devant|Dev.", "DS=Dos"];
        let full = AbbreviationMap::parse(&specs, true);
        assert_eq!(full.apply("DV et DS"), "Devant et Dos");

        let short = AbbreviationMap::parse(&specs, false);
        assert_eq!(short.apply("DV et DS"), "Dev. et Dos");
    }

    #[test]
    fn test_whole_words_only() {
        let map = AbbreviationMap::parse(&["DV=Devant"], true);
        assert_eq!(map.apply("DVD DV"), "DVD Devant");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let map = AbbreviationMap::parse(&["nonsense", "=x", "OK=Fine"], true);
        assert_eq!(map.len(), 1);
        assert_eq!(map.apply("OK"), "Fine");
    }

    #[test]
    fn test_later_definition_wins() {
        let map = AbbreviationMap::parse(&["A=One", "A=Uno"], true);
        assert_eq!(map.len(), 1);
        assert_eq!(map.apply("A"), "Uno");
    }

    #[test]
    fn test_replacement_is_literal() {
        let map = AbbreviationMap::parse(&["P=$1 price"], true);
        assert_eq!(map.apply("P"), "$1 price");
    }

    #[test]
    fn test_empty_map_is_identity() {
        let map = AbbreviationMap::default();
        assert!(map.is_empty());
        assert_eq!(map.apply("unchanged"), "unchanged");
    }
}
