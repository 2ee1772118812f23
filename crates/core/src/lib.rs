//! OCR Canvas Core Library
//!
//! Document model and pure layout logic for the OCR canvas: page stops,
//! glyph layout, text normalization and the layout-region/table model.

pub mod error;
pub mod font;
pub mod geometry;
pub mod glyph_layout;
pub mod layout;
pub mod model;
pub mod page_stops;
pub mod text;

pub use error::{CanvasError, CanvasResult};
pub use font::{FontFace, FontMetricsProvider, FontStyle, FontTable, GlyphMetrics};
pub use geometry::{Bbox, Dims, Point};
pub use glyph_layout::{
    anchor_word, calc_line_start_angle_adj, calc_word_angle_adj, calc_word_metrics, layout_word,
    resolve_font_size, WordAnchor, WordLayout, WordMetrics, HEIGHT_RATIO, MIN_WORD_WIDTH,
};
pub use layout::{
    InclusionLevel, InclusionRule, LayoutBoxId, LayoutDataColumn, LayoutDataTable, LayoutModel,
    LayoutRegion, PageLayout, RegionKind, TableContent, TableContentSource,
};
pub use model::{
    Document, OcrLine, OcrPage, OcrWord, PageMetrics, WordId, WordLocation, ROTATION_EPSILON,
};
pub use page_stops::{PageStopIndex, PAGE_MARGIN};
pub use text::{normalize_edit, replace_ligatures, replace_smart_quotes};
