//! Retained scene for the page canvas
//!
//! Every page that has been displayed owns a text group (its word objects)
//! and, in layout mode, an overlay group (region and column boxes). Both
//! groups share a transform that rotates page-local coordinates about the
//! page centre and stacks the page at its page stop. Page backgrounds are
//! either a placed bitmap or a placeholder outline.

use crate::layout_object::{DataTableObject, LayoutBoxObject};
use crate::word_object::WordSceneObject;
use ocr_canvas_cache::{CacheEntry, ImagePlacement};
use ocr_canvas_core::{Bbox, Dims, LayoutBoxId, Point, WordId};
use std::collections::BTreeMap;

/// RGBA color value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    /// Stroke used for selected words and boxes
    pub const SELECTION: Color = Color {
        r: 40.0 / 255.0,
        g: 123.0 / 255.0,
        b: 181.0 / 255.0,
        a: 1.0,
    };

    /// Create a new color from RGBA values (0.0 to 1.0)
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a new opaque color from RGB values
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from 8-bit channels and a 0.0 to 1.0 alpha
    pub fn rgba8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a,
        }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        let alpha = if digits.len() == 8 {
            channel(6)? as f32 / 255.0
        } else {
            1.0
        };
        Some(Self::rgba8(channel(0)?, channel(2)?, channel(4)?, alpha))
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// CSS `rgba()` notation, used for overlay elements.
    pub fn to_css(&self) -> String {
        format!(
            "rgba({},{},{},{})",
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
            self.a
        )
    }
}

/// Rectangle primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_bbox(bbox: &Bbox) -> Self {
        Self::new(bbox.left, bbox.top, bbox.width(), bbox.height())
    }

    pub fn to_bbox(&self) -> Bbox {
        Bbox::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// What a scene object stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Word,
    Region,
    Column,
}

/// A hit-testable scene object, tagged with the record it draws.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SceneTarget {
    Word(WordId),
    Region(LayoutBoxId),
    Column(LayoutBoxId),
}

impl SceneTarget {
    pub fn kind(&self) -> SceneKind {
        match self {
            SceneTarget::Word(_) => SceneKind::Word,
            SceneTarget::Region(_) => SceneKind::Region,
            SceneTarget::Column(_) => SceneKind::Column,
        }
    }
}

/// Transform from page-local coordinates into document space.
///
/// Points are rotated (degrees, clockwise) about `offset` and then moved so
/// that `offset` lands on `position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTransform {
    pub rotation: f64,
    pub offset: Point,
    pub position: Point,
}

impl GroupTransform {
    /// Transform for a page of `dims` starting at `page_start`.
    pub fn for_page(dims: Dims, page_start: f64, rotation: f64) -> Self {
        Self {
            rotation,
            offset: Point::new(dims.width * 0.5, dims.height * 0.5),
            position: Point::new(dims.width * 0.5, page_start + dims.height * 0.5),
        }
    }

    /// Page-local point to document space.
    pub fn to_document(&self, p: Point) -> Point {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let dx = p.x - self.offset.x;
        let dy = p.y - self.offset.y;
        Point::new(
            dx * cos - dy * sin + self.position.x,
            dx * sin + dy * cos + self.position.y,
        )
    }

    /// Document-space point to page-local coordinates.
    pub fn to_local(&self, p: Point) -> Point {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let dx = p.x - self.position.x;
        let dy = p.y - self.position.y;
        Point::new(
            dx * cos + dy * sin + self.offset.x,
            -dx * sin + dy * cos + self.offset.y,
        )
    }

    /// Page-local bounds of a document-space box.
    pub fn bbox_to_local(&self, area: &Bbox) -> Bbox {
        let corners = [
            Point::new(area.left, area.top),
            Point::new(area.right, area.top),
            Point::new(area.left, area.bottom),
            Point::new(area.right, area.bottom),
        ]
        .map(|p| self.to_local(p));
        bounds_of(&corners)
    }

    /// Document-space bounds of a page-local box.
    pub fn bbox_to_document(&self, bbox: &Bbox) -> Bbox {
        let corners = [
            Point::new(bbox.left, bbox.top),
            Point::new(bbox.right, bbox.top),
            Point::new(bbox.left, bbox.bottom),
            Point::new(bbox.right, bbox.bottom),
        ]
        .map(|p| self.to_document(p));
        bounds_of(&corners)
    }
}

fn bounds_of(points: &[Point]) -> Bbox {
    let xs = points.iter().map(|p| p.x);
    let ys = points.iter().map(|p| p.y);
    Bbox::new(
        xs.clone().fold(f64::INFINITY, f64::min),
        ys.clone().fold(f64::INFINITY, f64::min),
        xs.fold(f64::NEG_INFINITY, f64::max),
        ys.fold(f64::NEG_INFINITY, f64::max),
    )
}

/// Word objects of one page.
#[derive(Debug, Clone)]
pub struct PageGroup {
    pub page: usize,
    pub transform: GroupTransform,
    pub words: Vec<WordSceneObject>,
}

impl PageGroup {
    pub fn new(page: usize, transform: GroupTransform) -> Self {
        Self {
            page,
            transform,
            words: Vec::new(),
        }
    }

    pub fn word(&self, id: &WordId) -> Option<&WordSceneObject> {
        self.words.iter().find(|w| &w.word_id == id)
    }

    pub fn word_mut(&mut self, id: &WordId) -> Option<&mut WordSceneObject> {
        self.words.iter_mut().find(|w| &w.word_id == id)
    }
}

/// Layout boxes of one page.
#[derive(Debug, Clone)]
pub struct OverlayGroup {
    pub page: usize,
    pub transform: GroupTransform,
    pub boxes: Vec<LayoutBoxObject>,
    pub tables: Vec<DataTableObject>,
}

impl OverlayGroup {
    pub fn new(page: usize, transform: GroupTransform) -> Self {
        Self {
            page,
            transform,
            boxes: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn layout_box(&self, id: LayoutBoxId) -> Option<&LayoutBoxObject> {
        self.boxes.iter().find(|b| b.id() == id)
    }

    pub fn layout_box_mut(&mut self, id: LayoutBoxId) -> Option<&mut LayoutBoxObject> {
        self.boxes.iter_mut().find(|b| b.id() == id)
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
        self.tables.clear();
    }
}

/// Background of one page.
#[derive(Debug, Clone)]
pub enum PageImage {
    /// Decoded bitmap drawn at `placement`
    Bitmap {
        entry: CacheEntry,
        placement: ImagePlacement,
    },
    /// Outline drawn while no bitmap is decoded
    Placeholder { outline: Rect },
}

impl PageImage {
    pub fn placeholder(dims: Dims, page_start: f64) -> Self {
        PageImage::Placeholder {
            outline: Rect::new(0.0, page_start, dims.width, dims.height),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, PageImage::Placeholder { .. })
    }
}

/// All drawable state of the canvas.
#[derive(Debug, Clone)]
pub struct Scene {
    pub text_groups: BTreeMap<usize, PageGroup>,
    pub overlay_groups: BTreeMap<usize, OverlayGroup>,
    pub images: BTreeMap<usize, PageImage>,
    /// Background layer visibility; hidden in the ebook display mode
    pub background_visible: bool,
    /// Text and layout layer visibility; hidden while peeking at the page
    pub text_visible: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            text_groups: BTreeMap::new(),
            overlay_groups: BTreeMap::new(),
            images: BTreeMap::new(),
            background_visible: true,
            text_visible: true,
        }
    }

    /// Pages whose words are currently in the scene.
    pub fn rendered_pages(&self) -> Vec<usize> {
        self.text_groups.keys().copied().collect()
    }

    pub fn words(&self) -> impl Iterator<Item = (usize, &WordSceneObject)> {
        self.text_groups
            .iter()
            .flat_map(|(&n, group)| group.words.iter().map(move |w| (n, w)))
    }

    pub fn find_word(&self, id: &WordId) -> Option<(usize, &WordSceneObject)> {
        self.words().find(|(_, w)| &w.word_id == id)
    }

    pub fn find_word_mut(&mut self, id: &WordId) -> Option<&mut WordSceneObject> {
        self.text_groups
            .values_mut()
            .find_map(|group| group.word_mut(id))
    }

    /// Topmost listening object under a document-space point.
    ///
    /// Layout boxes sit above words. The smallest box containing the point
    /// wins so a column inside a region stays reachable.
    pub fn hit_test(&self, point: Point) -> Option<SceneTarget> {
        let mut best: Option<(f64, SceneTarget)> = None;
        for group in self.overlay_groups.values() {
            let local = group.transform.to_local(point);
            for layout_box in &group.boxes {
                if layout_box.rect.to_bbox().contains(local) {
                    let area = layout_box.rect.width * layout_box.rect.height;
                    if best.as_ref().map_or(true, |(a, _)| area < *a) {
                        best = Some((area, layout_box.target.clone()));
                    }
                }
            }
        }
        if let Some((_, target)) = best {
            return Some(target);
        }

        self.text_groups.values().find_map(|group| {
            let local = group.transform.to_local(point);
            group
                .words
                .iter()
                .rev()
                .find(|w| w.listening && w.visible && w.bounds().contains(local))
                .map(|w| SceneTarget::Word(w.word_id.clone()))
        })
    }

    /// Ids of words on rendered pages whose boxes intersect `area`.
    ///
    /// `area` is in document space; each page tests against its own
    /// page-local projection of it.
    pub fn words_in_area(&self, area: &Bbox) -> Vec<(usize, WordId)> {
        let mut hits = Vec::new();
        for (&n, group) in &self.text_groups {
            let local = group.transform.bbox_to_local(area);
            for word in &group.words {
                if word.visible && word.bounds().intersects(&local) {
                    hits.push((n, word.word_id.clone()));
                }
            }
        }
        hits
    }

    /// Region and column boxes intersecting a document-space `area`, with
    /// their page and page-local left edge.
    pub fn layout_boxes_in_area(&self, area: &Bbox) -> Vec<(usize, SceneTarget, f64)> {
        let mut hits = Vec::new();
        for (&n, group) in &self.overlay_groups {
            let local = group.transform.bbox_to_local(area);
            for layout_box in &group.boxes {
                if layout_box.rect.to_bbox().intersects(&local) {
                    hits.push((n, layout_box.target.clone(), layout_box.rect.x));
                }
            }
        }
        hits
    }
}
