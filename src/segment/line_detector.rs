//! Horizontal rule detection over an 8-bit luminance buffer.
//!
//! A page is scanned for a single thin dark row in its middle half. Rows are
//! sampled sparsely; candidates must be isolated (little ink ten rows above and
//! below) so that dense text or thick bands are not mistaken for a separator.

use std::ops::Range;

/// Columns sampled per scanned row.
pub const ROW_SAMPLE_STRIDE: usize = 5;
/// A row is a candidate when strictly more than this share of samples is dark.
pub const CANDIDATE_DARK_FRACTION: f64 = 0.45;
/// Distance of the two guard rows from a candidate.
pub const GUARD_OFFSET: u32 = 10;
/// Columns sampled per guard row.
pub const GUARD_SAMPLE_STRIDE: usize = 10;
/// A candidate is rejected when either guard row is darker than this.
pub const GUARD_DARK_LIMIT: f64 = 0.15;
/// Score of a candidate sitting exactly on the page center.
pub const BASE_SCORE: f64 = 10_000.0;

/// Borrowed single-channel image, row-major, one byte per pixel.
#[derive(Debug, Clone, Copy)]
pub struct LumaView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> LumaView<'a> {
    /// Returns `None` when the buffer is shorter than `width * height`.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Option<Self> {
        let width = width as usize;
        let height = height as usize;
        let needed = width.checked_mul(height)?;
        if data.len() < needed {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.width;
        &self.data[start..start + self.width]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCandidate {
    pub y: u32,
    pub score: f64,
}

/// Rows eligible for a split: `y` in `[0.25 * height, 0.75 * height)`.
pub fn search_window(height: u32) -> Range<u32> {
    let height = u64::from(height);
    let start = height.div_ceil(4);
    let end = (3 * height).div_ceil(4);
    (start as u32)..(end as u32)
}

/// Share of sampled pixels (every `stride`-th column from 0) darker than `threshold`.
pub fn dark_fraction(row: &[u8], stride: usize, threshold: u8) -> f64 {
    let mut samples = 0_usize;
    let mut dark = 0_usize;
    for &luma in row.iter().step_by(stride.max(1)) {
        samples += 1;
        if luma < threshold {
            dark += 1;
        }
    }

    if samples == 0 {
        return 0.0;
    }
    dark as f64 / samples as f64
}

/// Distance-from-center score; higher is better.
pub fn score_row(y: u32, height: u32) -> f64 {
    BASE_SCORE - (f64::from(y) - f64::from(height) / 2.0).abs()
}

/// Find the best split row, or `None` when the page has no isolated rule in its middle half.
///
/// Exact score ties keep the upper row.
pub fn detect_split(view: &LumaView<'_>, threshold: u8) -> Option<SplitCandidate> {
    let height = view.height();
    let mut best: Option<SplitCandidate> = None;

    for y in search_window(height) {
        if dark_fraction(view.row(y), ROW_SAMPLE_STRIDE, threshold) <= CANDIDATE_DARK_FRACTION {
            continue;
        }
        if !is_isolated(view, y, threshold) {
            continue;
        }

        let score = score_row(y, height);
        if best.is_none_or(|current| score > current.score) {
            best = Some(SplitCandidate { y, score });
        }
    }

    best
}

/// Guard rows outside the image are skipped rather than counted as failures.
fn is_isolated(view: &LumaView<'_>, y: u32, threshold: u8) -> bool {
    let above = y.checked_sub(GUARD_OFFSET);
    let below = y
        .checked_add(GUARD_OFFSET)
        .filter(|&guard| guard < view.height());

    [above, below].into_iter().flatten().all(|guard| {
        dark_fraction(view.row(guard), GUARD_SAMPLE_STRIDE, threshold) <= GUARD_DARK_LIMIT
    })
}
