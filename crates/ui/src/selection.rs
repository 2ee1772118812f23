//! Selection state and word navigation.
//!
//! Three independent sets are tracked: words, regions and data columns.
//! Region and column selections stay sorted by left edge because merging,
//! splitting and adjacency checks read them in that order.

use crate::scene::Scene;
use ocr_canvas_core::{
    Document, InclusionLevel, InclusionRule, LayoutBoxId, PageLayout, WordId, WordLocation,
};
use std::collections::BTreeSet;

/// Largest centre distance considered when moving up or down a line.
const VERTICAL_NAV_MAX_DIST: f64 = 5000.0;

/// A selected word and the page it sits on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectedWord {
    pub page: usize,
    pub id: WordId,
}

impl SelectedWord {
    pub fn new(page: usize, id: WordId) -> Self {
        Self { page, id }
    }
}

/// A selected region or column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedBox {
    pub id: LayoutBoxId,
    pub page: usize,
    /// Left edge when selected, the sort key
    pub left: f64,
}

/// Distinct fonts and sizes across the selected words.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordProperties {
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
}

/// Distinct inclusion settings across the selected boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutBoxProperties {
    pub inclusion_rules: Vec<InclusionRule>,
    pub inclusion_levels: Vec<InclusionLevel>,
}

/// Words, regions and data columns the user has selected.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    words: Vec<SelectedWord>,
    first_word: Option<SelectedWord>,
    regions: Vec<SelectedBox>,
    columns: Vec<SelectedBox>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add words; already selected ones are skipped.
    ///
    /// The first word added to an empty selection becomes the anchor for
    /// visual navigation. Returns the words that were actually added.
    pub fn add_words<I>(&mut self, words: I) -> Vec<SelectedWord>
    where
        I: IntoIterator<Item = SelectedWord>,
    {
        let mut added = Vec::new();
        for (i, word) in words.into_iter().enumerate() {
            if i == 0 && self.words.is_empty() {
                self.first_word = Some(word.clone());
            }
            if !self.words.contains(&word) {
                self.words.push(word.clone());
                added.push(word);
            }
        }
        added
    }

    pub fn words(&self) -> &[SelectedWord] {
        &self.words
    }

    pub fn word_ids(&self) -> Vec<WordId> {
        self.words.iter().map(|w| w.id.clone()).collect()
    }

    pub fn first_word(&self) -> Option<&SelectedWord> {
        self.first_word.as_ref()
    }

    pub fn is_word_selected(&self, id: &WordId) -> bool {
        self.words.iter().any(|w| &w.id == id)
    }

    /// Deselect the words of page `n`, or every word when `n` is `None`.
    ///
    /// When the anchor word is removed it moves to the first remaining word.
    pub fn deselect_all_words(&mut self, n: Option<usize>) -> Vec<SelectedWord> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .words
            .drain(..)
            .partition(|w| n.map_or(true, |n| w.page == n));
        self.words = kept;

        match n {
            None => self.first_word = None,
            Some(n) => {
                if self.first_word.as_ref().is_some_and(|f| f.page == n) {
                    self.first_word = self.words.first().cloned();
                }
            }
        }
        removed
    }

    /// Add regions and columns, keeping each list unique and sorted by left.
    pub fn add_layout_boxes<I, J>(&mut self, regions: I, columns: J)
    where
        I: IntoIterator<Item = SelectedBox>,
        J: IntoIterator<Item = SelectedBox>,
    {
        merge_boxes(&mut self.regions, regions);
        merge_boxes(&mut self.columns, columns);
    }

    pub fn regions(&self) -> &[SelectedBox] {
        &self.regions
    }

    pub fn region_ids(&self) -> Vec<LayoutBoxId> {
        self.regions.iter().map(|b| b.id).collect()
    }

    pub fn columns(&self) -> &[SelectedBox] {
        &self.columns
    }

    pub fn column_ids(&self) -> Vec<LayoutBoxId> {
        self.columns.iter().map(|b| b.id).collect()
    }

    /// Every selected region and column id.
    pub fn layout_box_ids(&self) -> Vec<LayoutBoxId> {
        self.regions
            .iter()
            .chain(&self.columns)
            .map(|b| b.id)
            .collect()
    }

    pub fn is_box_selected(&self, id: LayoutBoxId) -> bool {
        self.regions.iter().chain(&self.columns).any(|b| b.id == id)
    }

    pub fn deselect_all_regions(&mut self) -> Vec<LayoutBoxId> {
        self.regions.drain(..).map(|b| b.id).collect()
    }

    pub fn deselect_all_data_columns(&mut self) -> Vec<LayoutBoxId> {
        self.columns.drain(..).map(|b| b.id).collect()
    }

    pub fn deselect_data_columns_by_ids(&mut self, ids: &[LayoutBoxId]) {
        self.columns.retain(|b| !ids.contains(&b.id));
    }

    pub fn deselect_regions_by_ids(&mut self, ids: &[LayoutBoxId]) {
        self.regions.retain(|b| !ids.contains(&b.id));
    }

    pub fn deselect_all(&mut self) {
        self.deselect_all_words(None);
        self.regions.clear();
        self.columns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.regions.is_empty() && self.columns.is_empty()
    }

    /// Font families and sizes the selected words are drawn with.
    pub fn word_properties(&self, scene: &Scene) -> WordProperties {
        let mut props = WordProperties::default();
        for selected in &self.words {
            let Some((_, obj)) = scene.find_word(&selected.id) else {
                continue;
            };
            let family = &obj.layout.face.family;
            if !props.font_families.contains(family) {
                props.font_families.push(family.clone());
            }
            let size = obj.layout.font_size;
            if !props.font_sizes.contains(&size) {
                props.font_sizes.push(size);
            }
        }
        props
    }

    /// Inclusion rules and levels of the selected regions and columns.
    pub fn layout_box_properties<'a, F>(&self, layout_of: F) -> LayoutBoxProperties
    where
        F: Fn(usize) -> Option<&'a PageLayout>,
    {
        let mut props = LayoutBoxProperties::default();
        for b in self.regions.iter().chain(&self.columns) {
            let Some(layout) = layout_of(b.page) else {
                continue;
            };
            let settings = layout
                .region(b.id)
                .map(|r| (r.inclusion_rule, r.inclusion_level))
                .or_else(|| layout.column(b.id).map(|c| (c.inclusion_rule, c.inclusion_level)));
            if let Some((rule, level)) = settings {
                if !props.inclusion_rules.contains(&rule) {
                    props.inclusion_rules.push(rule);
                }
                if !props.inclusion_levels.contains(&level) {
                    props.inclusion_levels.push(level);
                }
            }
        }
        props
    }
}

fn merge_boxes<I>(list: &mut Vec<SelectedBox>, new: I)
where
    I: IntoIterator<Item = SelectedBox>,
{
    let mut seen: BTreeSet<LayoutBoxId> = list.iter().map(|b| b.id).collect();
    for b in new {
        if seen.insert(b.id) {
            list.push(b);
        }
    }
    list.sort_by(|a, b| a.left.total_cmp(&b.left));
}

// ---- navigation ----

/// Next word in reading order: the next word of the line, else the first
/// word of the next line on the page.
pub fn next_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    let line = doc.line(loc)?;
    if loc.word + 1 < line.words.len() {
        return Some(WordLocation { word: loc.word + 1, ..loc });
    }
    let next = doc.next_line(loc.page, loc.line)?;
    first_word_of(doc, loc.page, next)
}

/// Previous word in reading order.
pub fn prev_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    if loc.word > 0 {
        return Some(WordLocation { word: loc.word - 1, ..loc });
    }
    let prev = doc.prev_line(loc.page, loc.line)?;
    last_word_of(doc, loc.page, prev)
}

/// Word visually to the right.
///
/// Within a line this is the next word. At the end of a line it is the
/// first word of the nearest line starting right of this one that overlaps
/// the word vertically.
pub fn right_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    let line = doc.line(loc)?;
    if loc.word + 1 < line.words.len() {
        return Some(WordLocation { word: loc.word + 1, ..loc });
    }
    let word = line.words.get(loc.word)?;
    let page = doc.page(loc.page)?;
    let right_line = page
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            l.bbox.left > line.bbox.right
                && l.bbox.top < word.bbox.bottom
                && l.bbox.bottom > word.bbox.top
        })
        .min_by(|(_, a), (_, b)| a.bbox.left.total_cmp(&b.bbox.left))
        .map(|(i, _)| i)?;
    first_word_of(doc, loc.page, right_line)
}

/// Word visually to the left; the mirror of [`right_word`].
pub fn left_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    if loc.word > 0 {
        return Some(WordLocation { word: loc.word - 1, ..loc });
    }
    let line = doc.line(loc)?;
    let word = line.words.get(loc.word)?;
    let page = doc.page(loc.page)?;
    let left_line = page
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            l.bbox.right < line.bbox.left
                && l.bbox.top < word.bbox.bottom
                && l.bbox.bottom > word.bbox.top
        })
        .max_by(|(_, a), (_, b)| a.bbox.right.total_cmp(&b.bbox.right))
        .map(|(i, _)| i)?;
    last_word_of(doc, loc.page, left_line)
}

/// Word on the nearest earlier line that sits above this word and overlaps
/// it horizontally, closest by centre.
pub fn above_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    let word = doc.word(loc)?;
    let mut candidate = doc.prev_line(loc.page, loc.line);
    while let Some(i) = candidate {
        let line = doc.page(loc.page)?.lines.get(i)?;
        if line.bbox.top < word.bbox.top
            && line.bbox.left < word.bbox.right
            && line.bbox.right > word.bbox.left
        {
            return closest_in_line(doc, loc.page, i, word.bbox.center_x());
        }
        candidate = doc.prev_line(loc.page, i);
    }
    None
}

/// Word on the nearest later line below this word; see [`above_word`].
pub fn below_word(doc: &Document, loc: WordLocation) -> Option<WordLocation> {
    let word = doc.word(loc)?;
    let mut candidate = doc.next_line(loc.page, loc.line);
    while let Some(i) = candidate {
        let line = doc.page(loc.page)?.lines.get(i)?;
        if line.bbox.bottom > word.bbox.bottom
            && line.bbox.left < word.bbox.right
            && line.bbox.right > word.bbox.left
        {
            return closest_in_line(doc, loc.page, i, word.bbox.center_x());
        }
        candidate = doc.next_line(loc.page, i);
    }
    None
}

/// Scan a line left to right for the word whose centre is nearest
/// `center_x`, stopping at the first word that is no closer.
fn closest_in_line(doc: &Document, page: usize, line: usize, center_x: f64) -> Option<WordLocation> {
    let words = &doc.page(page)?.lines.get(line)?.words;
    if words.is_empty() {
        return None;
    }
    let mut best = 0;
    let mut best_dist = VERTICAL_NAV_MAX_DIST;
    for (i, w) in words.iter().enumerate() {
        let dist = (center_x - w.bbox.center_x()).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        } else {
            break;
        }
    }
    Some(WordLocation { page, line, word: best })
}

fn first_word_of(doc: &Document, page: usize, line: usize) -> Option<WordLocation> {
    let words = &doc.page(page)?.lines.get(line)?.words;
    (!words.is_empty()).then_some(WordLocation { page, line, word: 0 })
}

fn last_word_of(doc: &Document, page: usize, line: usize) -> Option<WordLocation> {
    let words = &doc.page(page)?.lines.get(line)?.words;
    let last = words.len().checked_sub(1)?;
    Some(WordLocation { page, line, word: last })
}
