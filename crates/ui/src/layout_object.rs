//! Scene objects for layout regions and data tables.

use crate::scene::{Color, Rect, SceneTarget};
use crate::word_object::WordSceneObject;
use ocr_canvas_core::{Bbox, LayoutBoxId, LayoutDataTable, LayoutRegion, RegionKind, WordId};

/// Base colours of data columns, cycled by column index
pub const COLUMN_COLORS_HEX: [&str; 3] = ["#000000", "#000000", "#000000"];

/// Font size of region priority labels
pub const REGION_LABEL_SIZE: f64 = 50.0;

const SELECTED_FILL_ALPHA: f32 = 0.4;
const DESELECTED_FILL_ALPHA: f32 = 0.25;
const DESELECTED_STROKE_ALPHA: f32 = 0.4;

/// Base colour of the column at `index`.
pub fn column_color(index: usize) -> Color {
    Color::from_hex(COLUMN_COLORS_HEX[index % COLUMN_COLORS_HEX.len()]).unwrap_or(Color::BLACK)
}

/// A region or column box drawn over the page.
#[derive(Debug, Clone)]
pub struct LayoutBoxObject {
    pub target: SceneTarget,
    /// Page-local rectangle
    pub rect: Rect,
    pub fill: Color,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub selected: bool,
    /// Editable priority label of an order region
    pub label: Option<WordSceneObject>,
}

impl LayoutBoxObject {
    pub fn region(region: &LayoutRegion, label: Option<WordSceneObject>) -> Self {
        let (fill, stroke) = match region.kind {
            RegionKind::Order => (
                Color::rgba8(0, 137, 114, DESELECTED_FILL_ALPHA),
                Color::rgba8(0, 137, 114, DESELECTED_STROKE_ALPHA),
            ),
            RegionKind::Exclude => (
                Color::rgba8(193, 84, 57, DESELECTED_FILL_ALPHA),
                Color::rgba8(0, 137, 114, DESELECTED_STROKE_ALPHA),
            ),
        };
        Self {
            target: SceneTarget::Region(region.id),
            rect: Rect::from_bbox(&region.bbox),
            fill,
            stroke: Some(stroke),
            stroke_width: 2.0,
            selected: false,
            label,
        }
    }

    pub fn column(id: LayoutBoxId, bbox: &Bbox, index: usize) -> Self {
        Self {
            target: SceneTarget::Column(id),
            rect: Rect::from_bbox(bbox),
            fill: column_color(index).with_alpha(0.3),
            stroke: None,
            stroke_width: 2.0,
            selected: false,
            label: None,
        }
    }

    pub fn id(&self) -> LayoutBoxId {
        match self.target {
            SceneTarget::Region(id) | SceneTarget::Column(id) => id,
            SceneTarget::Word(_) => LayoutBoxId::nil(),
        }
    }

    pub fn select(&mut self) {
        self.selected = true;
        self.stroke = Some(Color::SELECTION);
        self.fill = self.fill.with_alpha(SELECTED_FILL_ALPHA);
    }

    pub fn deselect(&mut self) {
        self.selected = false;
        self.stroke = Some(Color::SELECTION.with_alpha(DESELECTED_STROKE_ALPHA));
        self.fill = self.fill.with_alpha(DESELECTED_FILL_ALPHA);
    }

    /// Where the label is anchored for the current rectangle.
    pub fn label_anchor(&self) -> (f64, f64) {
        (
            self.rect.x + self.rect.width * 0.5,
            self.rect.y + self.rect.height * 0.5,
        )
    }
}

/// A data table outline with its column separators.
#[derive(Debug, Clone)]
pub struct DataTableObject {
    pub table: LayoutBoxId,
    pub rect: Rect,
    pub stroke: Color,
    pub stroke_width: f64,
    /// x of each separator between consecutive columns
    pub separators: Vec<f64>,
    /// Words coloured by this table, per column
    pub colored_words: Vec<Vec<WordId>>,
}

impl DataTableObject {
    pub fn new(table: &LayoutDataTable) -> Option<Self> {
        let bbox = table.bbox()?;
        let separators = table
            .columns
            .windows(2)
            .map(|pair| pair[1].bbox.left)
            .collect();
        Some(Self {
            table: table.id,
            rect: Rect::from_bbox(&bbox),
            stroke: Color::SELECTION,
            stroke_width: 3.0,
            separators,
            colored_words: Vec::new(),
        })
    }

    pub fn colored_word_ids(&self) -> impl Iterator<Item = &WordId> {
        self.colored_words.iter().flatten()
    }
}
