//! Layout normalization: merge fragmented word/line items into line units.
//!
//! OCR backends tend to report one box per word while embedded-text
//! extraction already reports whole lines. Normalization groups fragments
//! that share a vertical band into one item per visual line, refusing to
//! bridge the large horizontal gaps that separate columns and table cells.
//! Input that is already line-level passes through unchanged.
//!
//! The pass never fails and is deterministic: identical input and options
//! always give identical output.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::item::{BoundingBox, LineItem, PageSize};

/// Median word width used when a page has no items.
const FALLBACK_MEDIAN_WIDTH: f32 = 50.0;

/// Thresholds for line grouping and over-wide group splitting.
///
/// Every heuristic constant lives here so callers (and the auto-tuner) can
/// probe boundary values directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Vertical tolerance (points) between an item's center and the running
    /// average center of the current line
    #[serde(default = "default_v_tol")]
    pub v_tol: f32,

    /// Same-line gap limit as a multiple of the median word width
    #[serde(default = "default_gap_median_factor")]
    pub gap_median_factor: f32,

    /// Same-line gap limit as a fraction of the page width
    #[serde(default = "default_gap_page_fraction")]
    pub gap_page_fraction: f32,

    /// Groups wider than this fraction of the page are split candidates
    #[serde(default = "default_split_width_fraction")]
    pub split_width_fraction: f32,

    /// Groups need more than this many members to be split
    #[serde(default = "default_split_min_members")]
    pub split_min_members: usize,

    /// Split gap threshold as a multiple of the median word width
    #[serde(default = "default_split_gap_median_factor")]
    pub split_gap_median_factor: f32,

    /// Split gap threshold as a fraction of the page width
    #[serde(default = "default_split_gap_page_fraction")]
    pub split_gap_page_fraction: f32,
}

const fn default_v_tol() -> f32 {
    6.0
}

const fn default_gap_median_factor() -> f32 {
    1.5
}

const fn default_gap_page_fraction() -> f32 {
    0.20
}

const fn default_split_width_fraction() -> f32 {
    0.9
}

const fn default_split_min_members() -> usize {
    2
}

const fn default_split_gap_median_factor() -> f32 {
    2.0
}

const fn default_split_gap_page_fraction() -> f32 {
    0.25
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            v_tol: default_v_tol(),
            gap_median_factor: default_gap_median_factor(),
            gap_page_fraction: default_gap_page_fraction(),
            split_width_fraction: default_split_width_fraction(),
            split_min_members: default_split_min_members(),
            split_gap_median_factor: default_split_gap_median_factor(),
            split_gap_page_fraction: default_split_gap_page_fraction(),
        }
    }
}

impl NormalizeOptions {
    /// Same options with a different vertical tolerance.
    #[must_use]
    pub const fn with_v_tol(mut self, v_tol: f32) -> Self {
        self.v_tol = v_tol;
        self
    }
}

/// Merge fragmented items into coherent per-line items.
///
/// `page_sizes` supplies page widths for the gap thresholds (1-based by page
/// number); a missing or degenerate entry falls back to A4.
///
/// Groups of one are passed through untouched, keeping their id. Groups of
/// two or more become new items with fresh `p{page}_merged_{n}` ids.
pub fn normalize(
    items: &[LineItem],
    page_sizes: &[PageSize],
    options: &NormalizeOptions,
) -> Vec<LineItem> {
    let mut pages: BTreeMap<u32, Vec<&LineItem>> = BTreeMap::new();
    for item in items {
        pages.entry(item.page).or_default().push(item);
    }

    let mut out = Vec::with_capacity(items.len());

    for (page, mut page_items) in pages {
        let page_width = page_width(page_sizes, page);
        page_items.sort_by(|a, b| reading_order(a, b));

        let median = median_word_width(&page_items);
        let groups = group_lines(&page_items, median, page_width, options);
        debug!(
            "Page {}: {} item(s) -> {} line group(s) (median width {:.1}, v_tol {})",
            page,
            page_items.len(),
            groups.len(),
            median,
            options.v_tol
        );

        let mut emitter = GroupEmitter {
            page,
            merged: 0,
            out: &mut out,
        };
        for group in groups {
            let mut members = group.members;
            members.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

            match split_point(&members, median, page_width, options) {
                Some(at) => {
                    let (left, right) = members.split_at(at);
                    emitter.emit(left);
                    emitter.emit(right);
                }
                None => emitter.emit(&members),
            }
        }
    }

    out.sort_by(|a, b| a.page.cmp(&b.page).then_with(|| reading_order(a, b)));
    out
}

/// Top of page first, then left to right.
fn reading_order(a: &LineItem, b: &LineItem) -> Ordering {
    b.bbox
        .center_y()
        .total_cmp(&a.bbox.center_y())
        .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
}

fn page_width(page_sizes: &[PageSize], page: u32) -> f32 {
    PageSize::for_page(page_sizes, page)
        .unwrap_or_default()
        .sanitized()
        .0
        .width
}

/// Upper median of item widths, each clamped to at least one point.
fn median_word_width(items: &[&LineItem]) -> f32 {
    if items.is_empty() {
        return FALLBACK_MEDIAN_WIDTH;
    }
    let mut widths: Vec<f32> = items.iter().map(|i| i.bbox.width().max(1.0)).collect();
    widths.sort_by(f32::total_cmp);
    widths[widths.len() / 2]
}

/// Items accumulated into one visual line.
struct LineGroup<'a> {
    members: Vec<&'a LineItem>,
    center_sum: f32,
    max_x1: f32,
}

impl<'a> LineGroup<'a> {
    fn start(item: &'a LineItem) -> Self {
        Self {
            members: vec![item],
            center_sum: item.bbox.center_y(),
            max_x1: item.bbox.x1,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn center(&self) -> f32 {
        self.center_sum / self.members.len() as f32
    }

    fn push(&mut self, item: &'a LineItem) {
        self.center_sum += item.bbox.center_y();
        self.max_x1 = self.max_x1.max(item.bbox.x1);
        self.members.push(item);
    }
}

/// Greedy grouping over items already in reading order.
fn group_lines<'a>(
    items: &[&'a LineItem],
    median: f32,
    page_width: f32,
    options: &NormalizeOptions,
) -> Vec<LineGroup<'a>> {
    let gap_limit = (median * options.gap_median_factor).max(page_width * options.gap_page_fraction);
    let mut groups: Vec<LineGroup<'a>> = Vec::new();

    for &item in items {
        if let Some(group) = groups.last_mut()
            && (item.bbox.center_y() - group.center()).abs() <= options.v_tol
            && item.bbox.x0 - group.max_x1 <= gap_limit
        {
            group.push(item);
            continue;
        }
        // Different band, or a column/table gap on the same baseline
        groups.push(LineGroup::start(item));
    }

    groups
}

/// Index at which an over-wide group should be split, if any.
///
/// `members` must be sorted left to right. Only the single largest adjacent
/// gap is considered; ties keep the leftmost gap.
fn split_point(
    members: &[&LineItem],
    median: f32,
    page_width: f32,
    options: &NormalizeOptions,
) -> Option<usize> {
    if members.len() <= options.split_min_members {
        return None;
    }

    let bbox = union_of(members)?;
    if bbox.width() <= page_width * options.split_width_fraction {
        return None;
    }

    let mut widest: Option<(usize, f32)> = None;
    for (i, pair) in members.windows(2).enumerate() {
        let gap = pair[1].bbox.x0 - pair[0].bbox.x1;
        if widest.is_none_or(|(_, best)| gap > best) {
            widest = Some((i + 1, gap));
        }
    }

    let threshold =
        (median * options.split_gap_median_factor).max(page_width * options.split_gap_page_fraction);
    widest
        .filter(|&(_, gap)| gap > threshold)
        .map(|(at, _)| at)
}

fn union_of(members: &[&LineItem]) -> Option<BoundingBox> {
    let (first, rest) = members.split_first()?;
    Some(rest.iter().fold(first.bbox, |acc, m| acc.union(&m.bbox)))
}

/// Turns finished groups into output items for one page.
struct GroupEmitter<'o> {
    page: u32,
    merged: usize,
    out: &'o mut Vec<LineItem>,
}

impl GroupEmitter<'_> {
    fn emit(&mut self, members: &[&LineItem]) {
        if let [single] = members {
            self.out.push((*single).clone());
            return;
        }

        let text = members
            .iter()
            .map(|m| m.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let Some(bbox) = union_of(members) else {
            return;
        };
        if text.is_empty() {
            return;
        }

        // Largest constituent size keeps the merged line legible
        let font_size = members
            .iter()
            .map(|m| m.font_size)
            .fold(f32::MIN, f32::max);

        self.merged += 1;
        self.out.push(LineItem {
            page: self.page,
            bbox,
            font_size,
            text,
            id: format!("p{:03}_merged_{:04}", self.page, self.merged),
        });
    }
}
