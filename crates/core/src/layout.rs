//! Layout annotations: reading-order regions and data tables.
//!
//! A page's layout is a set of user-drawn regions plus a set of data tables,
//! each table being a left-to-right run of columns. Columns refer back to
//! their table by id; the table owns the columns.
//!
//! Every geometric mutation clears the page's `default` flag so that later
//! changes to the document-wide default layout no longer overwrite it.
//! Operations whose preconditions fail (stale selection, non-adjacent
//! columns, too few boxes) leave the layout untouched and report `false`,
//! `None` or an empty result.

use crate::geometry::Bbox;
use crate::model::{OcrPage, WordId};
use serde::{Deserialize, Serialize};

/// Unique identifier for regions, columns and tables
pub type LayoutBoxId = uuid::Uuid;

/// Columns may not be split or dragged closer than this to an edge.
pub const MIN_COLUMN_MARGIN: f64 = 10.0;

/// Overlaps up to this size are resolved by meeting at the midpoint.
pub const CLEAN_OVERLAP_THRESHOLD: f64 = 10.0;

/// Tolerance used when a table resize pushes columns outside the table.
pub const RESIZE_DELETE_TOLERANCE: f64 = 10.0;

/// What a region does to the text beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Text inside is read in the region's priority order
    Order,
    /// Text inside is excluded
    Exclude,
}

/// How text is assigned to a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InclusionRule {
    /// Most of the text's area lies inside
    #[default]
    Majority,
    /// The text's left edge lies inside
    LeftEdge,
}

/// Granularity at which text is assigned to a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InclusionLevel {
    #[default]
    Word,
    Line,
}

/// A user-drawn region box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRegion {
    pub id: LayoutBoxId,
    pub bbox: Bbox,
    pub kind: RegionKind,
    /// Reading-order priority, lowest first
    pub priority: i64,
    pub inclusion_rule: InclusionRule,
    pub inclusion_level: InclusionLevel,
}

/// A column of a data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDataColumn {
    pub id: LayoutBoxId,
    pub bbox: Bbox,
    /// Owning table
    pub table: LayoutBoxId,
    pub inclusion_rule: InclusionRule,
    pub inclusion_level: InclusionLevel,
}

impl LayoutDataColumn {
    fn new(bbox: Bbox, table: LayoutBoxId) -> Self {
        Self {
            id: LayoutBoxId::new_v4(),
            bbox,
            table,
            inclusion_rule: InclusionRule::default(),
            inclusion_level: InclusionLevel::default(),
        }
    }
}

/// A data table: columns ordered left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDataTable {
    pub id: LayoutBoxId,
    pub columns: Vec<LayoutDataColumn>,
}

impl LayoutDataTable {
    fn new() -> Self {
        Self {
            id: LayoutBoxId::new_v4(),
            columns: Vec::new(),
        }
    }

    fn from_columns(columns: Vec<LayoutDataColumn>) -> Self {
        let mut table = Self::new();
        for mut column in columns {
            column.table = table.id;
            table.columns.push(column);
        }
        table.sort_columns();
        table
    }

    /// Union of every column box, `None` for an empty table.
    pub fn bbox(&self) -> Option<Bbox> {
        Bbox::union_all(self.columns.iter().map(|c| &c.bbox))
    }

    pub fn column(&self, id: LayoutBoxId) -> Option<&LayoutDataColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Index of a column in left-to-right order.
    pub fn column_index(&self, id: LayoutBoxId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// The column immediately to the right of `id`.
    pub fn next_column(&self, id: LayoutBoxId) -> Option<&LayoutDataColumn> {
        let left = self.column(id)?.bbox.left;
        self.columns
            .iter()
            .filter(|c| c.bbox.left > left)
            .min_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left))
    }

    /// The column immediately to the left of `id`.
    pub fn prev_column(&self, id: LayoutBoxId) -> Option<&LayoutDataColumn> {
        let left = self.column(id)?.bbox.left;
        self.columns
            .iter()
            .filter(|c| c.bbox.left < left)
            .max_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left))
    }

    fn sort_columns(&mut self) {
        self.columns
            .sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));
    }

    /// Restore the contiguous, equal-height column invariant.
    ///
    /// Columns overlapping by at most the clean threshold meet at the rounded
    /// midpoint; larger overlaps drop the narrower column; gaps close at the
    /// rounded midpoint; all columns then span the union of top and bottom.
    /// Returns the ids of dropped columns.
    pub fn clean(&mut self) -> Vec<LayoutBoxId> {
        self.sort_columns();
        let mut dropped = Vec::new();

        for i in 0..self.columns.len().saturating_sub(1) {
            let gap = self.columns[i + 1].bbox.left - self.columns[i].bbox.right;
            if gap < 0.0 && gap >= -CLEAN_OVERLAP_THRESHOLD {
                self.meet_at_midpoint(i, gap);
            }
        }

        let mut i = 0;
        while i + 1 < self.columns.len() {
            let gap = self.columns[i + 1].bbox.left - self.columns[i].bbox.right;
            if gap < 0.0 && gap >= -CLEAN_OVERLAP_THRESHOLD {
                self.meet_at_midpoint(i, gap);
            } else if gap < 0.0 {
                let narrower = if self.columns[i].bbox.width() < self.columns[i + 1].bbox.width() {
                    i
                } else {
                    i + 1
                };
                dropped.push(self.columns.remove(narrower).id);
                i = i.saturating_sub(1);
                continue;
            }
            i += 1;
        }

        for i in 0..self.columns.len().saturating_sub(1) {
            let gap = self.columns[i + 1].bbox.left - self.columns[i].bbox.right;
            if gap > 0.0 {
                self.meet_at_midpoint(i, gap);
            }
        }

        if let Some(extent) = self.bbox() {
            for column in &mut self.columns {
                column.bbox.top = extent.top;
                column.bbox.bottom = extent.bottom;
            }
        }

        dropped
    }

    fn meet_at_midpoint(&mut self, i: usize, gap: f64) {
        let midpoint = (self.columns[i].bbox.right + gap / 2.0).round();
        self.columns[i].bbox.right = midpoint;
        self.columns[i + 1].bbox.left = midpoint;
    }
}

/// Collaborator that assigns words to table cells.
pub trait TableContentSource {
    /// Words per row, then per column, for one table.
    fn extract_single_table_content(
        &self,
        page: &OcrPage,
        table: &LayoutDataTable,
    ) -> TableContent;
}

/// Output of [`TableContentSource`]: `rows[row][column]` holds word ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableContent {
    pub rows: Vec<Vec<Vec<WordId>>>,
}

impl TableContent {
    /// Word ids grouped by column index.
    pub fn words_by_column(&self) -> Vec<Vec<WordId>> {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut columns = vec![Vec::new(); width];
        for row in &self.rows {
            for (j, cell) in row.iter().enumerate() {
                columns[j].extend(cell.iter().cloned());
            }
        }
        columns
    }
}

/// Regions and tables for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub regions: Vec<LayoutRegion>,
    pub tables: Vec<LayoutDataTable>,
    /// `true` while the page still follows the document default layout
    pub default: bool,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            tables: Vec::new(),
            default: true,
        }
    }
}

impl PageLayout {
    /// Copy of this layout with new ids for every region, table and column,
    /// so boxes copied to another page are never confused with the source.
    pub fn fresh_copy(&self) -> PageLayout {
        let regions = self
            .regions
            .iter()
            .map(|region| LayoutRegion {
                id: LayoutBoxId::new_v4(),
                ..region.clone()
            })
            .collect();
        let tables = self
            .tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|column| LayoutDataColumn {
                        id: LayoutBoxId::new_v4(),
                        ..column.clone()
                    })
                    .collect();
                LayoutDataTable::from_columns(columns)
            })
            .collect();
        PageLayout {
            regions,
            tables,
            default: self.default,
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    // ---- regions ----

    /// Add a region drawn by the user; it is read after every existing one.
    pub fn add_region(&mut self, bbox: Bbox, kind: RegionKind) -> LayoutBoxId {
        let priority = self
            .regions
            .iter()
            .map(|r| r.priority)
            .max()
            .map_or(0, |max| max + 1);
        let region = LayoutRegion {
            id: LayoutBoxId::new_v4(),
            bbox,
            kind,
            priority,
            inclusion_rule: InclusionRule::default(),
            inclusion_level: InclusionLevel::default(),
        };
        let id = region.id;
        self.regions.push(region);
        self.default = false;
        id
    }

    pub fn region(&self, id: LayoutBoxId) -> Option<&LayoutRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn delete_region(&mut self, id: LayoutBoxId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.id != id);
        let removed = self.regions.len() != before;
        if removed {
            self.default = false;
        }
        removed
    }

    /// Move or resize a region after a drag or transform.
    pub fn set_region_bbox(&mut self, id: LayoutBoxId, bbox: Bbox) -> bool {
        match self.regions.iter_mut().find(|r| r.id == id) {
            Some(region) => {
                region.bbox = bbox;
                self.default = false;
                true
            }
            None => false,
        }
    }

    pub fn set_region_priority(&mut self, id: LayoutBoxId, priority: i64) -> bool {
        match self.regions.iter_mut().find(|r| r.id == id) {
            Some(region) => {
                region.priority = priority;
                self.default = false;
                true
            }
            None => false,
        }
    }

    /// Set the inclusion rule on every listed region and column.
    ///
    /// Returns `true` when at least one box changed.
    pub fn set_inclusion_rule(&mut self, ids: &[LayoutBoxId], rule: InclusionRule) -> bool {
        let mut changed = false;
        for region in self.regions.iter_mut().filter(|r| ids.contains(&r.id)) {
            changed |= region.inclusion_rule != rule;
            region.inclusion_rule = rule;
        }
        for column in self.columns_mut().filter(|c| ids.contains(&c.id)) {
            changed |= column.inclusion_rule != rule;
            column.inclusion_rule = rule;
        }
        if changed {
            self.default = false;
        }
        changed
    }

    /// Set the inclusion level on every listed region and column.
    ///
    /// Returns `true` when at least one box changed.
    pub fn set_inclusion_level(&mut self, ids: &[LayoutBoxId], level: InclusionLevel) -> bool {
        let mut changed = false;
        for region in self.regions.iter_mut().filter(|r| ids.contains(&r.id)) {
            changed |= region.inclusion_level != level;
            region.inclusion_level = level;
        }
        for column in self.columns_mut().filter(|c| ids.contains(&c.id)) {
            changed |= column.inclusion_level != level;
            column.inclusion_level = level;
        }
        if changed {
            self.default = false;
        }
        changed
    }

    // ---- tables ----

    /// Add a table over `bbox`.
    ///
    /// `column_bounds` are `(left, right)` text column extents found inside
    /// the box; they are widened to fill the box with no gaps. With no
    /// bounds the table has a single column.
    pub fn add_table(&mut self, bbox: Bbox, column_bounds: &[(f64, f64)]) -> LayoutBoxId {
        let mut table = LayoutDataTable::new();
        let mut boxes: Vec<Bbox> = column_bounds
            .iter()
            .map(|&(left, right)| Bbox::new(left, bbox.top, right, bbox.bottom))
            .collect();
        boxes.sort_by(|a, b| a.left.total_cmp(&b.left));

        if boxes.is_empty() {
            boxes.push(bbox);
        } else {
            let last = boxes.len() - 1;
            boxes[0].left = bbox.left;
            boxes[last].right = bbox.right;
            for i in 0..last {
                let bound = (boxes[i].right + boxes[i + 1].left) / 2.0;
                boxes[i].right = bound;
                boxes[i + 1].left = bound;
            }
        }

        for b in boxes {
            table.columns.push(LayoutDataColumn::new(b, table.id));
        }
        let id = table.id;
        self.tables.push(table);
        self.default = false;
        id
    }

    pub fn table(&self, id: LayoutBoxId) -> Option<&LayoutDataTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    fn table_mut(&mut self, id: LayoutBoxId) -> Option<&mut LayoutDataTable> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    pub fn column(&self, id: LayoutBoxId) -> Option<&LayoutDataColumn> {
        self.tables.iter().find_map(|t| t.column(id))
    }

    /// The table owning a column.
    pub fn table_of_column(&self, id: LayoutBoxId) -> Option<&LayoutDataTable> {
        let column = self.column(id)?;
        self.table(column.table)
    }

    pub fn columns(&self) -> impl Iterator<Item = &LayoutDataColumn> {
        self.tables.iter().flat_map(|t| t.columns.iter())
    }

    fn columns_mut(&mut self) -> impl Iterator<Item = &mut LayoutDataColumn> {
        self.tables.iter_mut().flat_map(|t| t.columns.iter_mut())
    }

    /// Columns by id, sorted left to right. `None` if any id is unknown or
    /// the columns belong to different tables.
    fn same_table_columns(&self, ids: &[LayoutBoxId]) -> Option<(LayoutBoxId, Vec<LayoutDataColumn>)> {
        let mut columns = ids
            .iter()
            .map(|&id| self.column(id).cloned())
            .collect::<Option<Vec<_>>>()?;
        let table = columns.first()?.table;
        if columns.iter().any(|c| c.table != table) {
            return None;
        }
        columns.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));
        columns.dedup_by_key(|c| c.id);
        Some((table, columns))
    }

    /// `true` when the columns form a contiguous run of one table.
    ///
    /// Walking right from the leftmost selected column, each next column of
    /// the table must also be selected.
    pub fn columns_adjacent(&self, ids: &[LayoutBoxId]) -> bool {
        let Some((table_id, columns)) = self.same_table_columns(ids) else {
            return false;
        };
        let Some(table) = self.table(table_id) else {
            return false;
        };
        let mut current = columns[0].id;
        for _ in 1..columns.len() {
            match table.next_column(current) {
                Some(next) if columns.iter().any(|c| c.id == next.id) => current = next.id,
                _ => return false,
            }
        }
        true
    }

    /// Delete a column; an emptied table is removed with it.
    pub fn delete_column(&mut self, id: LayoutBoxId) -> bool {
        let Some(table_id) = self.column(id).map(|c| c.table) else {
            return false;
        };
        self.default = false;
        let Some(table) = self.table_mut(table_id) else {
            return false;
        };
        table.columns.retain(|c| c.id != id);
        if table.columns.is_empty() {
            self.tables.retain(|t| t.id != table_id);
        }
        true
    }

    /// Merge two or more adjacent columns into the leftmost one.
    pub fn merge_columns(&mut self, ids: &[LayoutBoxId]) -> bool {
        if ids.len() < 2 || !self.columns_adjacent(ids) {
            return false;
        }
        let Some((table_id, columns)) = self.same_table_columns(ids) else {
            return false;
        };
        let Some(table) = self.table_mut(table_id) else {
            return false;
        };
        let first = columns[0].id;
        let right = columns[columns.len() - 1].bbox.right;
        table.columns.retain(|c| c.id == first || !columns.iter().any(|s| s.id == c.id));
        if let Some(column) = table.columns.iter_mut().find(|c| c.id == first) {
            column.bbox.right = right;
        }
        table.sort_columns();
        self.default = false;
        true
    }

    /// Split a column at `x`, returning the new right-hand column's id.
    ///
    /// Cuts closer than `min(width / 3, 10)` to either edge fall back to the
    /// column's rounded midpoint. The left half keeps the original id.
    pub fn split_column(&mut self, id: LayoutBoxId, x: f64) -> Option<LayoutBoxId> {
        let table_id = self.column(id)?.table;
        let table = self.table_mut(table_id)?;
        let column = table.columns.iter_mut().find(|c| c.id == id)?;

        let bbox = column.bbox;
        let margin = (bbox.width() / 3.0).min(MIN_COLUMN_MARGIN);
        let x = if x <= bbox.left + margin || x >= bbox.right - margin {
            (bbox.left + bbox.width() / 2.0).round()
        } else {
            x
        };

        column.bbox.right = x;
        let mut right = LayoutDataColumn::new(Bbox::new(x, bbox.top, bbox.right, bbox.bottom), table_id);
        right.inclusion_rule = column.inclusion_rule;
        right.inclusion_level = column.inclusion_level;
        let new_id = right.id;
        table.columns.push(right);
        table.sort_columns();
        self.default = false;
        Some(new_id)
    }

    /// Tables that are horizontal neighbours of `id`.
    ///
    /// Candidates are tables whose vertical span contains the vertical
    /// midpoint of `id`; of those, the nearest one on each side qualifies.
    pub fn adjacent_tables(&self, id: LayoutBoxId) -> Vec<LayoutBoxId> {
        let Some(bbox) = self.table(id).and_then(LayoutDataTable::bbox) else {
            return Vec::new();
        };
        let y_mid = bbox.center_y();
        let mut overlapping: Vec<(LayoutBoxId, Bbox)> = self
            .tables
            .iter()
            .filter_map(|t| t.bbox().map(|b| (t.id, b)))
            .filter(|(_, b)| b.top < y_mid && b.bottom > y_mid)
            .collect();
        overlapping.sort_by(|a, b| a.1.left.total_cmp(&b.1.left));

        let Some(index) = overlapping.iter().position(|(tid, _)| *tid == id) else {
            return Vec::new();
        };
        let mut adjacent = Vec::new();
        if index > 0 {
            adjacent.push(overlapping[index - 1].0);
        }
        if index + 1 < overlapping.len() {
            adjacent.push(overlapping[index + 1].0);
        }
        adjacent
    }

    /// `true` when each consecutive pair of tables are neighbours.
    pub fn tables_adjacent(&self, ids: &[LayoutBoxId]) -> bool {
        ids.windows(2)
            .all(|pair| self.adjacent_tables(pair[0]).contains(&pair[1]))
    }

    fn sorted_table_ids(&self, ids: &[LayoutBoxId]) -> Option<Vec<LayoutBoxId>> {
        let mut tables = ids
            .iter()
            .map(|&id| self.table(id).and_then(|t| t.bbox().map(|b| (id, b))))
            .collect::<Option<Vec<_>>>()?;
        tables.sort_by(|a, b| a.1.left.total_cmp(&b.1.left));
        tables.dedup_by_key(|t| t.0);
        Some(tables.into_iter().map(|t| t.0).collect())
    }

    /// Merge adjacent tables into the leftmost one and clean its columns.
    ///
    /// Returns the ids of columns dropped by the cleaning pass, or `None`
    /// when the tables could not be merged.
    pub fn merge_tables(&mut self, ids: &[LayoutBoxId]) -> Option<Vec<LayoutBoxId>> {
        let ids = self.sorted_table_ids(ids)?;
        if ids.len() < 2 || !self.tables_adjacent(&ids) {
            return None;
        }
        let first = ids[0];
        let mut moved = Vec::new();
        for id in &ids[1..] {
            if let Some(pos) = self.tables.iter().position(|t| t.id == *id) {
                moved.extend(self.tables.remove(pos).columns);
            }
        }
        let table = self.table_mut(first)?;
        for mut column in moved {
            column.table = first;
            table.columns.push(column);
        }
        let dropped = table.clean();
        self.default = false;
        Some(dropped)
    }

    /// Split a contiguous proper subset of one table's columns into its own
    /// table, with the remaining columns on either side forming new tables.
    ///
    /// Returns the ids of the new tables (empty when nothing changed).
    pub fn split_table(&mut self, ids: &[LayoutBoxId]) -> Vec<LayoutBoxId> {
        let Some((table_id, selected)) = self.same_table_columns(ids) else {
            return Vec::new();
        };
        let Some(table) = self.table(table_id) else {
            return Vec::new();
        };
        if selected.len() == table.columns.len() || !self.columns_adjacent(ids) {
            return Vec::new();
        }

        let first_left = selected[0].bbox.left;
        let last_left = selected[selected.len() - 1].bbox.left;
        let left_group: Vec<_> = table
            .columns
            .iter()
            .filter(|c| c.bbox.left < first_left)
            .cloned()
            .collect();
        let right_group: Vec<_> = table
            .columns
            .iter()
            .filter(|c| c.bbox.left > last_left)
            .cloned()
            .collect();

        self.tables.retain(|t| t.id != table_id);
        let mut created = Vec::new();
        for group in [left_group, selected, right_group] {
            if group.is_empty() {
                continue;
            }
            let table = LayoutDataTable::from_columns(group);
            created.push(table.id);
            self.tables.push(table);
        }
        self.default = false;
        created
    }

    /// Apply a resize of the whole table rectangle.
    ///
    /// Vertical changes shift every column's top and bottom. Horizontally,
    /// whichever edge moved more is applied: columns pushed past the new
    /// edge (within 10 px) are deleted and the outermost remaining column
    /// takes the new edge. Returns the ids of deleted columns.
    pub fn resize_table(&mut self, id: LayoutBoxId, new_bbox: Bbox) -> Vec<LayoutBoxId> {
        let Some(old) = self.table(id).and_then(LayoutDataTable::bbox) else {
            return Vec::new();
        };
        let Some(table) = self.table_mut(id) else {
            return Vec::new();
        };

        let top_delta = new_bbox.top - old.top;
        let bottom_delta = new_bbox.bottom - old.bottom;
        for column in &mut table.columns {
            column.bbox.top += top_delta;
            column.bbox.bottom += bottom_delta;
        }

        let left_delta = new_bbox.left - old.left;
        let right_delta = new_bbox.right - old.right;
        let mut deleted = Vec::new();
        if left_delta != 0.0 || right_delta != 0.0 {
            table.sort_columns();
            if left_delta.abs() > right_delta.abs() {
                while let Some(column) = table.columns.first_mut() {
                    if column.bbox.right < new_bbox.left + RESIZE_DELETE_TOLERANCE {
                        deleted.push(table.columns.remove(0).id);
                    } else {
                        column.bbox.left = new_bbox.left;
                        break;
                    }
                }
            } else {
                while let Some(column) = table.columns.last_mut() {
                    if column.bbox.left > new_bbox.right - RESIZE_DELETE_TOLERANCE {
                        if let Some(removed) = table.columns.pop() {
                            deleted.push(removed.id);
                        }
                    } else {
                        column.bbox.right = new_bbox.right;
                        break;
                    }
                }
            }
        }

        if table.columns.is_empty() {
            self.tables.retain(|t| t.id != id);
        }
        self.default = false;
        deleted
    }

    /// Allowed x range for the separator on the left edge of column `index`.
    ///
    /// The separator may move between the neighbouring separators (or table
    /// edges), keeping `min(range / 3, 10)` away from each.
    pub fn separator_bounds(&self, table: LayoutBoxId, index: usize) -> Option<(f64, f64)> {
        let table = self.table(table)?;
        if index == 0 || index >= table.columns.len() {
            return None;
        }
        let left = table.columns[index - 1].bbox.left;
        let right = table.columns[index].bbox.right;
        let margin = ((right - left) / 3.0).min(MIN_COLUMN_MARGIN);
        Some((left + margin, right - margin))
    }

    /// Drag the separator on the left edge of column `index` to `x`.
    ///
    /// `x` is clamped to [`separator_bounds`](Self::separator_bounds).
    /// Returns the applied position.
    pub fn move_separator(&mut self, table: LayoutBoxId, index: usize, x: f64) -> Option<f64> {
        let (lo, hi) = self.separator_bounds(table, index)?;
        let x = x.clamp(lo, hi);
        let table = self.table_mut(table)?;
        table.columns[index - 1].bbox.right = x;
        table.columns[index].bbox.left = x;
        self.default = false;
        Some(x)
    }
}

/// Layout for every page plus the document-wide default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutModel {
    pages: Vec<PageLayout>,
    defaults: PageLayout,
}

impl LayoutModel {
    pub fn new(page_count: usize) -> Self {
        Self {
            pages: vec![PageLayout::default(); page_count],
            defaults: PageLayout::default(),
        }
    }

    pub fn page(&self, n: usize) -> Option<&PageLayout> {
        self.pages.get(n)
    }

    /// Layout for page `n`, created on first use.
    pub fn page_mut(&mut self, n: usize) -> &mut PageLayout {
        while self.pages.len() <= n {
            let page = self.defaults.fresh_copy();
            self.pages.push(page);
        }
        &mut self.pages[n]
    }

    /// Make page `n`'s layout the default and apply it to every page still
    /// following the default.
    pub fn set_default_from(&mut self, n: usize) {
        let Some(source) = self.pages.get(n) else {
            return;
        };
        let mut defaults = source.fresh_copy();
        defaults.default = true;
        for (i, page) in self.pages.iter_mut().enumerate() {
            if page.default && i != n {
                *page = defaults.fresh_copy();
            }
        }
        self.defaults = defaults;
    }

    /// Throw away page `n`'s edits and follow the default again.
    pub fn revert_to_default(&mut self, n: usize) {
        let defaults = self.defaults.fresh_copy();
        *self.page_mut(n) = defaults;
    }
}
