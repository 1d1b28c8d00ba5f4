// ==============================================================================
// window.rs - Contig Window Sizing
// ==============================================================================
// Description: Splits a contig into equal windows close to the requested bin size
// Created: 2026-10-15
// Modified: 2026-10-15
// Version: 0.1.0
// ==============================================================================
// Algorithm:
//   Given contig length L and nominal bin size B:
//   - L known:   W = ceil(L / B) windows, span S = floor(L / W)
//                window K covers [S*(K-1)+1, S*K], the last one ends at L
//   - L unknown: S = B, windows never clipped
// ==============================================================================

/// Bin size used when a request does not carry a usable one
pub const DEFAULT_BIN_SIZE: u64 = 500_000;

/// Effective per-window span for a contig
///
/// # Examples
/// ```
/// use genotype_windows::window::window_span;
///
/// assert_eq!(window_span(Some(1000), 400), 333);
/// assert_eq!(window_span(None, 400), 400);
/// ```
pub fn window_span(length: Option<u64>, bin_size: u64) -> u64 {
    let bin_size = bin_size.max(1);
    match length.filter(|&l| l > 0) {
        Some(length) => length / length.div_ceil(bin_size),
        None => bin_size,
    }
}

/// Window geometry of one contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLayout {
    span: u64,
    length: Option<u64>,
    count: Option<u64>,
}

impl WindowLayout {
    pub fn new(length: Option<u64>, bin_size: u64) -> Self {
        let length = length.filter(|&l| l > 0);
        Self {
            span: window_span(length, bin_size),
            length,
            count: length.map(|l| l.div_ceil(bin_size.max(1))),
        }
    }

    pub fn span(&self) -> u64 {
        self.span
    }

    /// Number of windows tiling the contig, when its length is known
    pub fn window_count(&self) -> Option<u64> {
        self.count
    }

    /// 1-based index of the window containing `position`
    ///
    /// Positions inside a known contig never map past the last window, which
    /// absorbs the remainder left by the integer span.
    pub fn index_of(&self, position: u64) -> u64 {
        let index = (position.max(1) - 1) / self.span + 1;
        match (self.length, self.count) {
            (Some(length), Some(count)) if position <= length => index.min(count),
            _ => index,
        }
    }

    /// First position of window `index` (inclusive)
    pub fn start(&self, index: u64) -> u64 {
        let start = self.span.saturating_mul(index.saturating_sub(1)) + 1;
        match (self.length, self.count) {
            // past the declared length; never overlap the clipped last window
            (Some(length), Some(count)) if index > count => start.max(length + 1),
            _ => start,
        }
    }

    /// Last position of window `index` (inclusive)
    pub fn end(&self, index: u64) -> u64 {
        match (self.length, self.count) {
            (Some(length), Some(count)) if index == count => length,
            _ => self.span.saturating_mul(index),
        }
    }
}
