//! Fitting translated text into an original bounding box.
//!
//! Translations are often longer than their source. The fitter word-wraps
//! at the item's original size and shrinks the font in small steps until
//! the wrapped block fits vertically. Once the minimum size is reached, the
//! remaining overflow is truncated with an ellipsis. Fitting never fails:
//! the worst outcome is a bare ellipsis.

use serde::{Deserialize, Serialize};

use crate::layout::BoundingBox;

/// Used when configuration supplies a non-positive step.
const DEFAULT_SHRINK_STEP: f32 = 0.5;

/// Width measurement for a font at a given size, in points.
pub trait FontMetrics {
    fn text_width(&self, text: &str, size: f32) -> f32;
}

/// Fitting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Fixed minimum font size; when unset the minimum is derived per item
    #[serde(default)]
    pub min_size_override: Option<f32>,

    /// Absolute lower bound of the derived minimum size
    #[serde(default = "default_min_size_floor")]
    pub min_size_floor: f32,

    /// Derived minimum size as a fraction of the item's font size
    #[serde(default = "default_min_size_ratio")]
    pub min_size_ratio: f32,

    /// Baseline distance as a multiple of the font size
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f32,

    /// Inset applied on every side of the box
    #[serde(default = "default_padding")]
    pub padding: f32,

    /// Font size decrement per shrink iteration
    #[serde(default = "default_shrink_step")]
    pub shrink_step: f32,

    /// Marker appended to truncated text
    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,
}

const fn default_min_size_floor() -> f32 {
    7.5
}

const fn default_min_size_ratio() -> f32 {
    0.75
}

const fn default_line_spacing() -> f32 {
    1.18
}

const fn default_padding() -> f32 {
    2.0
}

const fn default_shrink_step() -> f32 {
    DEFAULT_SHRINK_STEP
}

fn default_ellipsis() -> String {
    "…".to_string()
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_size_override: None,
            min_size_floor: default_min_size_floor(),
            min_size_ratio: default_min_size_ratio(),
            line_spacing: default_line_spacing(),
            padding: default_padding(),
            shrink_step: default_shrink_step(),
            ellipsis: default_ellipsis(),
        }
    }
}

impl FitOptions {
    /// Same options with a fixed minimum font size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: f32) -> Self {
        self.min_size_override = Some(min_size);
        self
    }

    /// Minimum font size for an item whose original size is `target`.
    pub fn min_size_for(&self, target: f32) -> f32 {
        if let Some(size) = self.min_size_override.filter(|s| s.is_finite() && *s > 0.0) {
            return size;
        }
        let derived = self.min_size_floor.max(target * self.min_size_ratio);
        if derived.is_finite() && derived > 0.0 {
            derived
        } else {
            default_min_size_floor()
        }
    }
}

/// Outcome of fitting one text into one box.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Chosen font size
    pub font_size: f32,
    /// Baseline distance at the chosen size
    pub line_height: f32,
    /// Wrapped (and possibly truncated) lines, top to bottom
    pub lines: Vec<String>,
    /// The font size ended below the starting size
    pub shrunk: bool,
    /// Lines were dropped and an ellipsis appended
    pub truncated: bool,
    padding: f32,
}

/// A line positioned at its baseline origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedLine<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
}

impl FitResult {
    /// Baseline positions of the lines inside `bbox`.
    ///
    /// The first baseline sits one line height below the padded top edge.
    /// Placement stops once a baseline would fall more than a line height
    /// below the padded bottom edge.
    pub fn placements(&self, bbox: &BoundingBox) -> Vec<PlacedLine<'_>> {
        let x = bbox.x0 + self.padding;
        let floor = bbox.y0 + self.padding - self.line_height;
        let mut y = bbox.y1 - self.padding;
        let mut placed = Vec::with_capacity(self.lines.len());

        for line in &self.lines {
            y -= self.line_height;
            if y < floor {
                break;
            }
            placed.push(PlacedLine { x, y, text: line });
        }
        placed
    }
}

/// Fit `text` into `bbox`, starting from `target_size`.
///
/// The starting size is `max(min_size, target_size)`, so a larger target
/// never yields a smaller result for the same text, and more text never
/// yields a larger size.
pub fn fit_text(
    text: &str,
    bbox: &BoundingBox,
    target_size: f32,
    metrics: &dyn FontMetrics,
    options: &FitOptions,
) -> FitResult {
    let padding = options.padding.max(0.0);
    let width = (bbox.width() - 2.0 * padding).max(0.0);
    let height = (bbox.height() - 2.0 * padding).max(0.0);
    let step = if options.shrink_step > 0.0 {
        options.shrink_step
    } else {
        DEFAULT_SHRINK_STEP
    };

    let min_size = options.min_size_for(target_size);
    let start = min_size.max(target_size);
    let mut size = start;

    let mut lines = loop {
        let lines = wrap(text, size, width, metrics);
        #[allow(clippy::cast_precision_loss)]
        let needed = lines.len() as f32 * size * options.line_spacing;
        if needed <= height || lines.len() <= 1 || size <= min_size {
            break lines;
        }
        size = (size - step).max(min_size);
    };

    let line_height = size * options.line_spacing;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_lines = ((height / line_height).floor() as usize).max(1);

    let truncated = lines.len() > max_lines;
    if truncated {
        lines.truncate(max_lines);
        let last = lines.pop().unwrap_or_default();
        lines.push(ellipsize(&last, size, width, metrics, &options.ellipsis));
    }

    FitResult {
        font_size: size,
        line_height,
        lines,
        shrunk: size < start,
        truncated,
        padding,
    }
}

/// Greedy word wrap; words wider than the line are broken per character.
fn wrap(text: &str, size: f32, width: f32, metrics: &dyn FontMetrics) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        if metrics.text_width(&candidate, size) <= width {
            line = candidate;
            continue;
        }

        if !line.is_empty() {
            out.push(std::mem::take(&mut line));
        }

        if metrics.text_width(word, size) <= width {
            line = word.to_string();
            continue;
        }

        // Hard break
        let mut segment = String::new();
        for ch in word.chars() {
            segment.push(ch);
            if metrics.text_width(&segment, size) <= width {
                continue;
            }
            segment.pop();
            if segment.is_empty() {
                // A single glyph wider than the box gets a line of its own
                out.push(ch.to_string());
            } else {
                out.push(std::mem::take(&mut segment));
                segment.push(ch);
            }
        }
        line = segment;
    }

    if !line.is_empty() {
        out.push(line);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Shorten `line` until it fits with the ellipsis appended.
fn ellipsize(line: &str, size: f32, width: f32, metrics: &dyn FontMetrics, ellipsis: &str) -> String {
    let mut kept = line.trim_end().to_string();
    while !kept.is_empty() {
        let candidate = format!("{kept}{ellipsis}");
        if metrics.text_width(&candidate, size) <= width {
            return candidate;
        }
        kept.pop();
        kept.truncate(kept.trim_end().len());
    }
    ellipsis.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is half the font size wide.
    struct HalfEm;

    impl FontMetrics for HalfEm {
        #[allow(clippy::cast_precision_loss)]
        fn text_width(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * size * 0.5
        }
    }

    fn bbox(width: f32, height: f32) -> BoundingBox {
        BoundingBox::new(100.0, 500.0, 100.0 + width, 500.0 + height)
    }

    #[test]
    fn test_short_text_keeps_size() {
        let result = fit_text("Hallo", &bbox(200.0, 16.0), 10.0, &HalfEm, &FitOptions::default());
        assert!((result.font_size - 10.0).abs() < f32::EPSILON);
        assert_eq!(result.lines, vec!["Hallo"]);
        assert!(!result.shrunk);
        assert!(!result.truncated);
    }

    #[test]
    fn test_min_size_default_and_override() {
        let options = FitOptions::default();
        assert!((options.min_size_for(8.0) - 7.5).abs() < f32::EPSILON);
        assert!((options.min_size_for(20.0) - 15.0).abs() < f32::EPSILON);
        let options = options.with_min_size(9.0);
        assert!((options.min_size_for(20.0) - 9.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_small_target_starts_at_min_size() {
        let result = fit_text("x", &bbox(100.0, 30.0), 4.0, &HalfEm, &FitOptions::default());
        assert!((result.font_size - 7.5).abs() < f32::EPSILON);
        assert!(!result.shrunk);
    }

    #[test]
    fn test_wraps_then_shrinks() {
        // Inner box 96 x 26. At 10pt: 19 chars per line, 2 lines need 23.6.
        let text = "aaaa bbbb cccc dddd eeee ffff gggg";
        let result = fit_text(text, &bbox(100.0, 30.0), 10.0, &HalfEm, &FitOptions::default());
        assert!(result.lines.len() >= 2);
        #[allow(clippy::cast_precision_loss)]
        let needed = result.lines.len() as f32 * result.line_height;
        assert!(needed <= 26.0 || result.truncated);
        for line in &result.lines {
            assert!(HalfEm.text_width(line, result.font_size) <= 96.0);
        }
    }

    #[test]
    fn test_shrinks_before_truncating() {
        // One line only at 12pt (inner height 14.16 fits one 12pt line)
        let text = "Dies ist eine deutlich laengere Uebersetzung";
        let result = fit_text(text, &bbox(120.0, 18.16), 12.0, &HalfEm, &FitOptions::default());
        assert!(result.shrunk);
        assert!(result.font_size >= 9.0 - f32::EPSILON);
    }

    #[test]
    fn test_unfittable_text_is_truncated_with_ellipsis() {
        // 40 x 10 box: inner 36 x 6, one line at most
        let text = "Ein sehr langer Satz der niemals passt";
        let result = fit_text(text, &bbox(40.0, 10.0), 12.0, &HalfEm, &FitOptions::default());
        assert!(result.truncated);
        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].ends_with('…'));
        assert!(HalfEm.text_width(&result.lines[0], result.font_size) <= 36.0);
        // Never below the minimum size
        assert!(result.font_size >= 9.0 - f32::EPSILON);
    }

    #[test]
    fn test_bare_ellipsis_when_nothing_fits() {
        let result = fit_text("Wort", &bbox(6.0, 6.0), 10.0, &HalfEm, &FitOptions::default());
        assert!(!result.lines.is_empty());
        assert!(result.lines.iter().any(|l| l.ends_with('…')));
    }

    #[test]
    fn test_long_word_hard_break_has_no_duplicates() {
        // Inner width 20 at 10pt: 4 chars per line
        let result = fit_text(
            "abcdefghij",
            &bbox(24.0, 200.0),
            10.0,
            &HalfEm,
            &FitOptions::default(),
        );
        assert_eq!(result.lines, vec!["abcd", "efgh", "ij"]);
        assert!(!result.truncated);
    }

    #[test]
    fn test_empty_text_gives_one_empty_line() {
        let result = fit_text("   ", &bbox(100.0, 20.0), 10.0, &HalfEm, &FitOptions::default());
        assert_eq!(result.lines, vec![String::new()]);
        assert!(!result.truncated);
    }

    #[test]
    fn test_monotonic_shrink_with_more_text() {
        let words = ["Ueberschrift", "mit", "sehr", "vielen", "zusaetzlichen", "Woertern", "am", "Ende"];
        let boxed = bbox(90.0, 40.0);
        let mut previous = f32::INFINITY;
        for n in 1..=words.len() {
            let text = words[..n].join(" ");
            let result = fit_text(&text, &boxed, 14.0, &HalfEm, &FitOptions::default());
            assert!(result.font_size <= previous + f32::EPSILON, "size grew at {n} words");
            previous = result.font_size;
        }
    }

    #[test]
    fn test_degenerate_box_terminates() {
        let flat = BoundingBox::new(10.0, 10.0, 10.0, 10.0);
        let result = fit_text("Text", &flat, 10.0, &HalfEm, &FitOptions::default());
        assert!(!result.lines.is_empty());
        let bad_step = FitOptions {
            shrink_step: 0.0,
            ..FitOptions::default()
        };
        let result = fit_text("a b c d e f g", &bbox(10.0, 10.0), 30.0, &HalfEm, &bad_step);
        assert!(!result.lines.is_empty());
    }

    #[test]
    fn test_placements_step_down_from_top() {
        let result = fit_text(
            "one two three",
            &bbox(40.0, 100.0),
            10.0,
            &HalfEm,
            &FitOptions::default(),
        );
        let boxed = bbox(40.0, 100.0);
        let placed = result.placements(&boxed);
        assert_eq!(placed.len(), result.lines.len());
        assert!((placed[0].x - 102.0).abs() < 1e-4);
        assert!((placed[0].y - (600.0 - 2.0 - result.line_height)).abs() < 1e-4);
        for pair in placed.windows(2) {
            assert!((pair[0].y - pair[1].y - result.line_height).abs() < 1e-4);
        }
    }
}
