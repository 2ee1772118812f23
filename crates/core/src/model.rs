//! Recognized page data consumed by the canvas engine.
//!
//! The recognition layer owns parsing and export; this module only defines
//! the shapes the engine reads and mutates. Pages own their lines and lines
//! own their words. Upward relations (word to line, line to page) are never
//! stored as pointers: a [`WordLocation`] names the page and indices and the
//! [`Document`] resolves it on demand.

use crate::font::FontStyle;
use crate::geometry::{Bbox, Dims};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a recognized word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordId(pub String);

impl WordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single recognized word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    /// Unique id (unique across the whole document)
    pub id: WordId,

    /// Recognized text, never empty once edited through the canvas
    pub text: String,

    /// Bounding box in page-local, unrotated coordinates
    pub bbox: Bbox,

    /// Recognition confidence (0-100)
    pub conf: f64,

    /// Font style used for metric lookup
    pub style: FontStyle,

    /// Font family; `None` selects the lookup service's default family
    pub font: Option<String>,

    /// Explicit font size in pixels, overriding the line size
    pub size: Option<f64>,

    pub small_caps: bool,

    /// Superscript words anchor to their own bbox bottom
    pub sup: bool,

    /// Drop-caps anchor to their own bbox bottom
    pub dropcap: bool,

    /// `true` when the bbox already excludes glyph side bearings
    pub visual_coords: bool,

    /// Ground-truth comparison result, used by the `eval` display mode
    pub match_truth: bool,
}

impl OcrWord {
    /// Create a word with default styling.
    pub fn new(id: impl Into<String>, text: impl Into<String>, bbox: Bbox) -> Self {
        Self {
            id: WordId::new(id),
            text: text.into(),
            bbox,
            conf: 100.0,
            style: FontStyle::Normal,
            font: None,
            size: None,
            small_caps: false,
            sup: false,
            dropcap: false,
            visual_coords: false,
            match_truth: false,
        }
    }

    /// Superscripts and drop-caps anchor to the bbox instead of the baseline.
    pub fn anchors_to_bbox(&self) -> bool {
        self.sup || self.dropcap
    }
}

/// A recognized text line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub bbox: Bbox,

    /// Baseline as `[slope, offset]`; the offset is relative to `bbox.bottom`
    pub baseline: [f64; 2],

    /// Font size resolved by the recognition layer, if known
    pub font_size: Option<f64>,

    pub words: Vec<OcrWord>,
}

impl OcrLine {
    pub fn new(bbox: Bbox, baseline: [f64; 2], words: Vec<OcrWord>) -> Self {
        Self {
            bbox,
            baseline,
            font_size: None,
            words,
        }
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Document-space y of the line's baseline at its left edge.
    pub fn baseline_y(&self) -> f64 {
        self.bbox.bottom + self.baseline[1]
    }
}

/// Recognition data for one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrPage {
    /// Page index
    pub n: usize,

    /// Lines in reading order
    pub lines: Vec<OcrLine>,
}

impl OcrPage {
    pub fn new(n: usize, lines: Vec<OcrLine>) -> Self {
        Self { n, lines }
    }

    /// Find a word on this page, returning `(line_index, word_index)`.
    pub fn find_word(&self, id: &WordId) -> Option<(usize, usize)> {
        self.lines.iter().enumerate().find_map(|(li, line)| {
            line.words
                .iter()
                .position(|w| &w.id == id)
                .map(|wi| (li, wi))
        })
    }

    /// Iterate over every word on the page in line order.
    pub fn words(&self) -> impl Iterator<Item = &OcrWord> {
        self.lines.iter().flat_map(|line| line.words.iter())
    }

    /// Remove words by id, dropping lines left without words.
    ///
    /// Returns how many words were removed.
    pub fn delete_words(&mut self, ids: &[WordId]) -> usize {
        let mut removed = 0;
        for line in &mut self.lines {
            let before = line.words.len();
            line.words.retain(|w| !ids.contains(&w.id));
            removed += before - line.words.len();
        }
        self.lines.retain(|line| !line.words.is_empty());
        removed
    }
}

/// Geometry known about a page before or independently of recognition.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Pixel dimensions, unknown until the image or recognition file is read
    pub dims: Option<Dims>,

    /// Skew angle in degrees, clockwise-positive
    pub angle: f64,
}

impl PageMetrics {
    pub fn new(dims: Dims, angle: f64) -> Self {
        Self {
            dims: Some(dims),
            angle,
        }
    }

    /// Pages rotated by more than 0.05 degrees get angle corrections.
    pub fn is_rotated(&self) -> bool {
        self.angle.abs() > ROTATION_EPSILON
    }
}

/// Rotation below this many degrees is treated as none.
pub const ROTATION_EPSILON: f64 = 0.05;

/// Resolved position of a word inside the [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordLocation {
    pub page: usize,
    pub line: usize,
    pub word: usize,
}

/// The recognized document: page metrics plus (possibly partial) page data.
///
/// Pages may arrive out of order during import, so each slot is optional.
#[derive(Debug, Clone, Default)]
pub struct Document {
    metrics: Vec<PageMetrics>,
    pages: Vec<Option<OcrPage>>,
}

impl Document {
    /// Create a document with `page_count` empty page slots.
    pub fn new(page_count: usize) -> Self {
        Self {
            metrics: vec![PageMetrics::default(); page_count],
            pages: vec![None; page_count],
        }
    }

    pub fn page_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn metrics(&self, n: usize) -> Option<&PageMetrics> {
        self.metrics.get(n)
    }

    /// All page metrics in page order.
    pub fn all_metrics(&self) -> &[PageMetrics] {
        &self.metrics
    }

    pub fn set_metrics(&mut self, n: usize, metrics: PageMetrics) {
        self.ensure_len(n + 1);
        self.metrics[n] = metrics;
    }

    pub fn set_dims(&mut self, n: usize, dims: Dims) {
        self.ensure_len(n + 1);
        self.metrics[n].dims = Some(dims);
    }

    pub fn set_angle(&mut self, n: usize, angle: f64) {
        self.ensure_len(n + 1);
        self.metrics[n].angle = angle;
    }

    /// Install recognition data for a page (its `n` selects the slot).
    pub fn set_page(&mut self, page: OcrPage) {
        let n = page.n;
        self.ensure_len(n + 1);
        self.pages[n] = Some(page);
    }

    pub fn page(&self, n: usize) -> Option<&OcrPage> {
        self.pages.get(n).and_then(|p| p.as_ref())
    }

    pub fn page_mut(&mut self, n: usize) -> Option<&mut OcrPage> {
        self.pages.get_mut(n).and_then(|p| p.as_mut())
    }

    /// Locate a word by id, searching `hint` first when given.
    pub fn locate_word(&self, id: &WordId, hint: Option<usize>) -> Option<WordLocation> {
        if let Some(n) = hint {
            if let Some((line, word)) = self.page(n).and_then(|p| p.find_word(id)) {
                return Some(WordLocation { page: n, line, word });
            }
        }
        self.pages.iter().enumerate().find_map(|(n, page)| {
            page.as_ref()
                .and_then(|p| p.find_word(id))
                .map(|(line, word)| WordLocation { page: n, line, word })
        })
    }

    pub fn word(&self, loc: WordLocation) -> Option<&OcrWord> {
        self.line(loc)?.words.get(loc.word)
    }

    pub fn word_mut(&mut self, loc: WordLocation) -> Option<&mut OcrWord> {
        self.page_mut(loc.page)?
            .lines
            .get_mut(loc.line)?
            .words
            .get_mut(loc.word)
    }

    /// The line owning the word at `loc`.
    pub fn line(&self, loc: WordLocation) -> Option<&OcrLine> {
        self.page(loc.page)?.lines.get(loc.line)
    }

    /// Next line on the same page in reading order.
    pub fn next_line(&self, page: usize, line: usize) -> Option<usize> {
        let lines = &self.page(page)?.lines;
        (line + 1 < lines.len()).then_some(line + 1)
    }

    /// Previous line on the same page in reading order.
    pub fn prev_line(&self, page: usize, line: usize) -> Option<usize> {
        self.page(page)?;
        line.checked_sub(1)
    }

    fn ensure_len(&mut self, len: usize) {
        if self.metrics.len() < len {
            self.metrics.resize(len, PageMetrics::default());
            self.pages.resize(len, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> OcrPage {
        let line0 = OcrLine::new(
            Bbox::new(10.0, 10.0, 200.0, 30.0),
            [0.0, -2.0],
            vec![
                OcrWord::new("w0", "Hello", Bbox::new(10.0, 10.0, 90.0, 30.0)),
                OcrWord::new("w1", "world", Bbox::new(100.0, 10.0, 200.0, 30.0)),
            ],
        );
        let line1 = OcrLine::new(
            Bbox::new(10.0, 40.0, 150.0, 60.0),
            [0.0, -2.0],
            vec![OcrWord::new("w2", "again", Bbox::new(10.0, 40.0, 150.0, 60.0))],
        );
        OcrPage::new(1, vec![line0, line1])
    }

    #[test]
    fn test_document_locates_words_by_id() {
        let mut doc = Document::new(2);
        doc.set_page(sample_page());

        let loc = doc.locate_word(&WordId::from("w2"), None).unwrap();
        assert_eq!(loc, WordLocation { page: 1, line: 1, word: 0 });
        assert_eq!(doc.word(loc).unwrap().text, "again");
        assert!(doc.locate_word(&WordId::from("missing"), Some(1)).is_none());
    }

    #[test]
    fn test_delete_words_drops_empty_lines() {
        let mut page = sample_page();
        let removed = page.delete_words(&[WordId::from("w2"), WordId::from("w0")]);
        assert_eq!(removed, 2);
        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].words[0].id, WordId::from("w1"));
    }

    #[test]
    fn test_document_line_navigation_stays_on_page() {
        let mut doc = Document::new(2);
        doc.set_page(sample_page());

        assert_eq!(doc.next_line(1, 0), Some(1));
        assert_eq!(doc.next_line(1, 1), None);
        assert_eq!(doc.prev_line(1, 1), Some(0));
        assert_eq!(doc.prev_line(1, 0), None);
        assert_eq!(doc.next_line(0, 0), None);
    }

    #[test]
    fn test_document_grows_for_late_pages() {
        let mut doc = Document::new(1);
        doc.set_dims(3, Dims::new(100.0, 200.0));
        assert_eq!(doc.page_count(), 4);
        assert!(doc.metrics(2).unwrap().dims.is_none());
        assert_eq!(doc.metrics(3).unwrap().dims, Some(Dims::new(100.0, 200.0)));
    }

    #[test]
    fn test_word_mut_edits_in_place() {
        let mut doc = Document::new(2);
        doc.set_page(sample_page());
        let loc = doc.locate_word(&WordId::from("w0"), Some(1)).unwrap();
        doc.word_mut(loc).unwrap().text = "Howdy".to_string();
        assert_eq!(doc.page(1).unwrap().lines[0].words[0].text, "Howdy");
    }

    #[test]
    fn test_page_metrics_rotation_threshold() {
        assert!(!PageMetrics::new(Dims::new(1.0, 1.0), 0.05).is_rotated());
        assert!(PageMetrics::new(Dims::new(1.0, 1.0), -0.06).is_rotated());
    }
}
