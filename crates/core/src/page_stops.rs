//! Vertical document-space intervals occupied by each page.
//!
//! Pages are stacked top to bottom with a fixed margin above each one. Page
//! `n` owns `[start(n), end(n))`, where the interval includes the margin
//! below the page, so consecutive intervals touch. The table is rebuilt
//! lazily: setting a height only marks it stale.

use crate::model::PageMetrics;

/// Gap between pages, and above the first page.
pub const PAGE_MARGIN: f64 = 30.0;

/// Page number to vertical interval mapping.
#[derive(Debug, Clone, Default)]
pub struct PageStopIndex {
    heights: Vec<Option<f64>>,
    starts: Vec<f64>,
    ends: Vec<f64>,
    stale: bool,
}

impl PageStopIndex {
    /// Create an index for `page_count` pages of unknown height.
    pub fn new(page_count: usize) -> Self {
        Self {
            heights: vec![None; page_count],
            starts: Vec::new(),
            ends: Vec::new(),
            stale: true,
        }
    }

    /// Build an index from page metrics.
    pub fn from_metrics(metrics: &[PageMetrics]) -> Self {
        let mut index = Self::new(metrics.len());
        for (n, m) in metrics.iter().enumerate() {
            if let Some(dims) = m.dims {
                index.heights[n] = Some(dims.height);
            }
        }
        index
    }

    pub fn page_count(&self) -> usize {
        self.heights.len()
    }

    /// Record a page height; the table is rebuilt on next access.
    pub fn set_height(&mut self, n: usize, height: f64) {
        if n >= self.heights.len() {
            self.heights.resize(n + 1, None);
        }
        if self.heights[n] != Some(height) {
            self.heights[n] = Some(height);
            self.stale = true;
        }
    }

    /// Update every height from page metrics.
    pub fn sync(&mut self, metrics: &[PageMetrics]) {
        for (n, m) in metrics.iter().enumerate() {
            if let Some(dims) = m.dims {
                self.set_height(n, dims.height);
            }
        }
    }

    /// `true` once every page height is known.
    pub fn is_complete(&self) -> bool {
        self.heights.iter().all(Option::is_some)
    }

    /// Top of page `n`, or `None` while an earlier page's height is unknown.
    ///
    /// The first page always starts at the margin.
    pub fn start(&mut self, n: usize) -> Option<f64> {
        if n == 0 {
            return Some(PAGE_MARGIN);
        }
        self.refresh();
        self.starts.get(n).copied()
    }

    /// End of page `n`'s interval, or `None` while unknown.
    pub fn end(&mut self, n: usize) -> Option<f64> {
        self.refresh();
        self.ends.get(n).copied()
    }

    /// Page whose interval contains `y`, the first page ending below it.
    ///
    /// Returns `None` when `y` is past every known page.
    pub fn page_at(&mut self, y: f64) -> Option<usize> {
        self.refresh();
        self.ends.iter().position(|&end| end > y)
    }

    fn refresh(&mut self) {
        if !self.stale {
            return;
        }
        self.starts.clear();
        self.ends.clear();
        let mut y = PAGE_MARGIN;
        for height in &self.heights {
            self.starts.push(y);
            let Some(h) = height else {
                break;
            };
            y += h + PAGE_MARGIN;
            self.ends.push(y);
        }
        self.stale = false;
    }
}
