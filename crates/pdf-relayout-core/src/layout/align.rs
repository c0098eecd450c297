//! Pairing of geometric items with their translations.
//!
//! The aligner only validates: translations are paired with items by
//! position, and a length mismatch means some upstream stage dropped,
//! split or merged lines. Repairing that here would silently place text at
//! the wrong coordinates, so it is always fatal.

use crate::error::{Error, Result};

use super::item::LineItem;

/// One item paired with its translated text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslatedLine<'a> {
    pub item: &'a LineItem,
    pub text: &'a str,
}

/// Check that `translated` has exactly one entry per item.
///
/// `stage` names the pipeline step for the error message.
pub fn check_alignment(stage: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::AlignmentMismatch {
            stage,
            expected,
            actual,
        })
    }
}

/// Pair each item with the translation at the same position.
///
/// No reordering, deduplication or text normalization happens here.
pub fn align<'a, S: AsRef<str>>(
    stage: &'static str,
    items: &'a [LineItem],
    translated: &'a [S],
) -> Result<Vec<TranslatedLine<'a>>> {
    check_alignment(stage, items.len(), translated.len())?;
    Ok(items
        .iter()
        .zip(translated)
        .map(|(item, text)| TranslatedLine {
            item,
            text: text.as_ref(),
        })
        .collect())
}
