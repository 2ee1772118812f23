//! The canvas context.
//!
//! [`CanvasContext`] owns the recognized document, the layout model, the
//! retained scene and every piece of interaction state. Hosts create one with
//! [`CanvasContext::init`], forward pointer, wheel and key events to it, and
//! call [`CanvasContext::tick`] from their event loop so finished bitmap
//! decodes and the deferred text overlay are picked up.
//!
//! Pages are virtualized: only the current page and its two neighbours have
//! word objects in the scene. Rendering guards on data readiness and returns
//! `false` with a log record while a page's dimensions or recognition data
//! are still missing.

use crate::config::{DisplayMode, ViewerConfig};
use crate::editor::{EditOutcome, EditTarget, InlineEditor};
use crate::error::ViewerResult;
use crate::keys::{key_command, BboxSide, Key, KeyCommand, KeyEvent};
use crate::layout_object::{column_color, DataTableObject, LayoutBoxObject, REGION_LABEL_SIZE};
use crate::overlay::{copy_text, TextOverlayBridge};
use crate::scene::{
    GroupTransform, OverlayGroup, PageGroup, PageImage, Rect, Scene, SceneTarget,
};
use crate::selection::{
    above_word, below_word, left_word, next_word, prev_word, right_word, LayoutBoxProperties,
    SelectedBox, SelectedWord, SelectionManager, WordProperties,
};
use crate::viewport::{wheel_action, PanBounds, ViewportController, WheelAction, WheelInput};
use crate::word_object::{word_fill_opacity, ResizeEdge, WordSceneObject, WordStyle};
use ocr_canvas_cache::{
    image_rotation, CacheConfig, ColorMode, DecodeEvent, ImageBitmapCache, ImagePlacement,
    ImageProvider, ImageVariant,
};
use ocr_canvas_core::{
    Bbox, CanvasError, Document, FontMetricsProvider, FontStyle, InclusionLevel, InclusionRule,
    LayoutBoxId, LayoutDataColumn, LayoutModel, LayoutRegion, OcrLine, OcrPage, OcrWord,
    PageLayout, PageMetrics, PageStopIndex, Point, RegionKind, TableContentSource, WordAnchor,
    WordId, WordLocation,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Selection rectangles smaller than this in both directions are clicks.
const MIN_SELECTION_RECT: f64 = 5.0;

/// Size of the element the host mounts the canvas in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSurface {
    pub width: f64,
    pub height: f64,
    /// Visible height of the host page, used to fit the first page
    pub client_height: f64,
}

impl HostSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            client_height: height,
        }
    }
}

/// Pointer button of a mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

/// Mouse event in stage (screen) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: MouseButton,
    /// Ctrl keeps the existing selection when clicking
    pub ctrl: bool,
}

impl PointerEvent {
    pub fn new(position: Point, button: MouseButton) -> Self {
        Self {
            position,
            button,
            ctrl: false,
        }
    }

    pub fn primary(x: f64, y: f64) -> Self {
        Self::new(Point::new(x, y), MouseButton::Primary)
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

/// What a primary-button drag on empty stage does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Select,
    AddRegion(RegionKind),
    AddDataTable,
}

/// Relative or absolute font size change for the selected words.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontSizeChange {
    Increase,
    Decrease,
    Set(f64),
}

/// The single canvas of a viewer.
pub struct CanvasContext {
    config: ViewerConfig,
    host: HostSurface,
    doc: Document,
    layout: LayoutModel,
    fonts: Arc<dyn FontMetricsProvider>,
    stops: PageStopIndex,
    scene: Scene,
    selection: SelectionManager,
    viewport: ViewportController,
    editor: InlineEditor,
    overlay: TextOverlayBridge,
    cache: ImageBitmapCache,
    images: Option<Box<dyn ImageProvider>>,
    table_source: Option<Box<dyn TableContentSource>>,
    color_mode: ColorMode,
    mode: InteractionMode,
    layout_mode: bool,
    current_page: usize,
    run_set_initial: bool,
    search_matches: HashSet<WordId>,
    selecting_from: Option<Point>,
    selection_rect: Option<Rect>,
    mouse_down_target: Option<SceneTarget>,
}

impl CanvasContext {
    /// Create the canvas inside `host`.
    ///
    /// Fails with [`CanvasError::MissingHostElement`] when there is no host,
    /// and with a cache error when the decode workers cannot be started.
    pub fn init(
        host: Option<HostSurface>,
        document: Document,
        fonts: Arc<dyn FontMetricsProvider>,
        config: ViewerConfig,
        cache_config: CacheConfig,
    ) -> ViewerResult<Self> {
        let host = host.ok_or(CanvasError::MissingHostElement("canvas container"))?;
        let cache = ImageBitmapCache::new(cache_config)?;
        let stops = PageStopIndex::from_metrics(document.all_metrics());
        let layout = LayoutModel::new(document.page_count());
        log::debug!(
            "canvas {}x{} for {} pages",
            host.width,
            host.height,
            document.page_count()
        );

        Ok(Self {
            editor: InlineEditor::new(config.smart_quotes),
            overlay: TextOverlayBridge::new(config.overlay_delay),
            viewport: ViewportController::new(host.width, host.height),
            config,
            host,
            doc: document,
            layout,
            fonts,
            stops,
            scene: Scene::new(),
            selection: SelectionManager::new(),
            cache,
            images: None,
            table_source: None,
            color_mode: ColorMode::default(),
            mode: InteractionMode::default(),
            layout_mode: false,
            current_page: 0,
            run_set_initial: true,
            search_matches: HashSet::new(),
            selecting_from: None,
            selection_rect: None,
            mouse_down_target: None,
        })
    }

    // ---- accessors ----

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn layout(&self) -> &LayoutModel {
        &self.layout
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn editor(&self) -> &InlineEditor {
        &self.editor
    }

    pub fn overlay(&self) -> &TextOverlayBridge {
        &self.overlay
    }

    pub fn cache(&self) -> &ImageBitmapCache {
        &self.cache
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn layout_mode(&self) -> bool {
        self.layout_mode
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    /// Rectangle being dragged out, in stage coordinates.
    pub fn selection_rect(&self) -> Option<Rect> {
        self.selection_rect
    }

    // ---- data arriving from the import layer ----

    /// Record a page's dimensions and angle.
    ///
    /// Pages below it move, so rendered pages from `n` on are rebuilt.
    pub fn set_page_metrics(&mut self, n: usize, metrics: PageMetrics) {
        if let Some(dims) = metrics.dims {
            self.stops.set_height(n, dims.height);
        }
        self.doc.set_metrics(n, metrics);

        let mut stale: BTreeSet<usize> = self
            .scene
            .rendered_pages()
            .into_iter()
            .filter(|&p| p >= n)
            .collect();
        if n.abs_diff(self.current_page) <= 1 {
            stale.insert(n);
        }
        for page in stale {
            self.refresh_page(page);
        }
    }

    /// Install recognition data for a page.
    pub fn set_page(&mut self, page: OcrPage) {
        let n = page.n;
        self.doc.set_page(page);
        if n.abs_diff(self.current_page) <= 1 {
            self.refresh_page(n);
        }
    }

    pub fn set_image_provider(&mut self, provider: Box<dyn ImageProvider>) {
        self.images = Some(provider);
        self.render_images(self.current_page);
    }

    pub fn set_table_content_source(&mut self, source: Box<dyn TableContentSource>) {
        self.table_source = Some(source);
        if self.layout_mode {
            for n in self.neighbourhood(self.current_page) {
                self.render_layout_boxes(n);
            }
        }
    }

    fn refresh_page(&mut self, n: usize) {
        self.render_words(n);
        if self.layout_mode {
            self.render_layout_boxes(n);
        }
    }

    // ---- page display ----

    /// Make page `n` current, rendering it and its neighbours.
    ///
    /// With `scroll` the stage jumps to the top of the page. Without
    /// `refresh`, pages that already have word objects are kept as they are.
    /// Returns whether page `n` has word objects afterwards.
    pub fn display_page(&mut self, n: usize, scroll: bool, refresh: bool) -> bool {
        if n >= self.doc.page_count() {
            log::debug!("page {} out of range", n);
            return false;
        }
        self.overlay.delete();
        self.scene.background_visible = self.config.display_mode != DisplayMode::Ebook;
        self.scene.text_visible = true;

        for page in self.neighbourhood(n) {
            if refresh || !self.scene.text_groups.contains_key(&page) {
                self.render_words(page);
            }
        }

        if scroll {
            if let Some(start) = self.stops.start(n) {
                self.viewport.scroll_to(start);
            }
        }

        self.current_page = n;
        self.destroy_far_pages();

        if self.config.enable_overlay && !self.viewport.is_gesturing() {
            self.overlay.schedule(Instant::now());
        }

        if self.layout_mode {
            for page in self.neighbourhood(n) {
                if refresh || !self.scene.overlay_groups.contains_key(&page) {
                    self.render_layout_boxes(page);
                }
            }
        }

        self.render_images(n);
        self.scene.text_groups.contains_key(&n)
    }

    fn neighbourhood(&self, n: usize) -> Vec<usize> {
        let count = self.doc.page_count();
        [n.checked_sub(1), Some(n), Some(n + 1)]
            .into_iter()
            .flatten()
            .filter(|&p| p < count)
            .collect()
    }

    fn destroy_far_pages(&mut self) {
        let cp = self.current_page;
        let far: Vec<usize> = self
            .scene
            .rendered_pages()
            .into_iter()
            .filter(|p| p.abs_diff(cp) > 1)
            .collect();
        for page in far {
            self.scene.text_groups.remove(&page);
            self.deselect_page_words(page);
        }
        self.scene.overlay_groups.retain(|p, _| p.abs_diff(cp) <= 1);
    }

    /// Transform of page `n`'s groups, once its size and position are known.
    fn page_transform(&mut self, n: usize) -> Option<GroupTransform> {
        let metrics = self.doc.metrics(n)?;
        let dims = metrics.dims?;
        let rotation = if self.config.auto_rotate {
            0.0
        } else {
            metrics.angle
        };
        let start = self.stops.start(n)?;
        Some(GroupTransform::for_page(dims, start, rotation))
    }

    /// Rebuild the word objects of page `n`.
    pub fn render_words(&mut self, n: usize) -> bool {
        self.scene.text_groups.remove(&n);
        if self.editor.target().is_some_and(|t| t.page() == n) {
            self.commit_edit();
        }
        self.deselect_page_words(n);

        let Some(transform) = self.page_transform(n) else {
            log::debug!("page {} dimensions or position not known yet", n);
            return false;
        };
        let Some(metrics) = self.doc.metrics(n).copied() else {
            return false;
        };
        let Some(page) = self.doc.page(n) else {
            log::debug!("page {} has no recognition data yet", n);
            return false;
        };

        if self.run_set_initial {
            if let Some(dims) = metrics.dims {
                self.viewport
                    .fit_page(dims.width, dims.height, self.host.client_height);
            }
            self.run_set_initial = false;
        }

        let mut group = PageGroup::new(n, transform);
        for line in &page.lines {
            for word in &line.words {
                if word.text.is_empty() {
                    continue;
                }
                let mut style = WordStyle::for_word(word, &self.config);
                style.fill_box = self.search_matches.contains(&word.id);
                style.listening = !self.layout_mode;
                match WordSceneObject::new(word, line, &metrics, self.fonts.as_ref(), style) {
                    Ok(obj) => group.words.push(obj),
                    Err(err) => log::warn!("skipping word {} on page {}: {}", word.id, n, err),
                }
            }
        }
        log::debug!("rendered {} words on page {}", group.words.len(), n);
        self.scene.text_groups.insert(n, group);

        if !self.scene.images.contains_key(&n) {
            if let Some(dims) = metrics.dims {
                self.scene
                    .images
                    .insert(n, PageImage::placeholder(dims, transform.position.y - dims.height * 0.5));
            }
        }
        true
    }

    fn update_current_page(&mut self) {
        let y = self.viewport.center_document_y();
        let Some(page) = self.stops.page_at(y) else {
            return;
        };
        if page != self.current_page && page < self.doc.page_count() {
            log::debug!("switching to page {}", page);
            self.display_page(page, false, false);
        }
    }

    // ---- viewport ----

    /// Update the stage size after the host resized.
    pub fn resize(&mut self, host: HostSurface) {
        self.host = host;
        self.viewport.resize(host.width, host.height);
    }

    /// Zoom by `scale_by` about `center`.
    ///
    /// Without a center, the middle of the selected words is used, or the
    /// middle of the stage when nothing is selected.
    pub fn zoom(&mut self, scale_by: f64, center: Option<Point>) {
        self.overlay.delete();
        let center = center
            .or_else(|| self.selected_words_center())
            .unwrap_or_else(|| self.viewport.center());
        self.viewport.zoom_about(scale_by, center);
        self.update_current_page();
        if self.config.enable_overlay {
            self.overlay.schedule(Instant::now());
        }
    }

    fn selected_words_center(&self) -> Option<Point> {
        let rects: Vec<Bbox> = self
            .selection
            .words()
            .iter()
            .filter_map(|w| self.word_screen_rect(&w.id))
            .map(|r| r.to_bbox())
            .collect();
        let union = Bbox::union_all(rects.iter())?;
        Some(Point::new(union.center_x(), union.center_y()))
    }

    /// Pan the stage by a screen-space delta.
    pub fn pan_stage(&mut self, dx: f64, dy: f64) -> (f64, f64) {
        self.overlay.delete();
        let applied = self.pan_clamped(dx, dy);
        if self.config.enable_overlay {
            self.overlay.schedule(Instant::now());
        }
        applied
    }

    fn pan_clamped(&mut self, dx: f64, dy: f64) -> (f64, f64) {
        let bounds = self.pan_bounds();
        let applied = self.viewport.pan(dx, dy, &bounds);
        self.update_current_page();
        applied
    }

    fn pan_bounds(&mut self) -> PanBounds {
        let cp = self.current_page;
        let last = self.doc.page_count().saturating_sub(1);
        PanBounds {
            first_page_top: if cp == 0 { self.stops.start(0) } else { None },
            last_page_end: if cp == last { self.stops.end(cp) } else { None },
            page_width: self
                .doc
                .metrics(cp)
                .and_then(|m| m.dims)
                .map_or(0.0, |d| d.width),
        }
    }

    pub fn handle_wheel(&mut self, input: &WheelInput) {
        self.overlay.delete();
        match wheel_action(input) {
            WheelAction::Zoom { factor, center } => {
                self.viewport.zoom_about(factor, center);
                self.update_current_page();
                self.destroy_controls(true);
            }
            WheelAction::Pan { dx, dy } => {
                self.destroy_controls(true);
                self.pan_clamped(dx, dy);
            }
        }
        if self.config.enable_overlay {
            self.overlay.schedule(Instant::now());
        }
    }

    /// One frame of touch input: one finger drags, two fingers pinch.
    pub fn touch_move(&mut self, touches: &[Point]) {
        match touches {
            [p1, p2] => {
                self.overlay.delete();
                if let Some((factor, center)) = self.viewport.pinch(*p1, *p2) {
                    self.viewport.zoom_about(factor, center);
                    self.update_current_page();
                    if self.config.enable_overlay {
                        self.overlay.schedule(Instant::now());
                    }
                }
            }
            [p] => {
                if !self.viewport.drag().is_dragging {
                    self.overlay.delete();
                    self.viewport.start_drag(*p);
                } else if let Some((dx, dy)) = self.viewport.drag_to(*p) {
                    self.pan_clamped(dx, dy);
                }
            }
            _ => {}
        }
    }

    pub fn touch_end(&mut self) {
        self.stop_drag_pinch();
    }

    /// End any drag or pinch; the overlay is rebuilt at once.
    pub fn stop_drag_pinch(&mut self) {
        if self.viewport.stop_drag_pinch() && self.config.enable_overlay && self.overlay.is_empty()
        {
            self.render_overlay();
        }
    }

    /// Screen rectangle enclosing a rendered word.
    pub fn word_screen_rect(&self, id: &WordId) -> Option<Rect> {
        let (group, obj) = self
            .scene
            .text_groups
            .values()
            .find_map(|g| g.word(id).map(|w| (g, w)))?;
        let doc_box = group.transform.bbox_to_document(&obj.bounds());
        let stage = self.viewport.stage();
        let top_left = stage.to_screen(Point::new(doc_box.left, doc_box.top));
        let bottom_right = stage.to_screen(Point::new(doc_box.right, doc_box.bottom));
        Some(Rect::new(
            top_left.x,
            top_left.y,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        ))
    }

    fn scroll_into_view(&mut self, id: &WordId) {
        let Some(rect) = self.word_screen_rect(id) else {
            return;
        };
        if let Some((dx, dy)) = self.viewport.scroll_into_view_delta(rect) {
            self.pan_clamped(dx, dy);
        }
    }

    fn hit_test(&self, position: Point) -> Option<SceneTarget> {
        self.scene.hit_test(self.viewport.stage().to_document(position))
    }

    fn screen_rect_to_document(&self, rect: Rect) -> Bbox {
        let stage = self.viewport.stage();
        let a = stage.to_document(Point::new(rect.x, rect.y));
        let b = stage.to_document(Point::new(rect.x + rect.width, rect.y + rect.height));
        Bbox::from_corners(a, b)
    }

    // ---- pointer input ----

    pub fn mouse_down(&mut self, event: PointerEvent) {
        let target = self.hit_test(event.position);
        self.mouse_down_target = target.clone();

        match event.button {
            MouseButton::Middle => {
                self.overlay.delete();
                self.viewport.start_drag(event.position);
            }
            MouseButton::Primary if target.is_none() || self.mode != InteractionMode::Select => {
                self.selecting_from = Some(event.position);
                self.selection_rect = Some(Rect::new(event.position.x, event.position.y, 0.0, 0.0));
            }
            _ => {}
        }
    }

    pub fn mouse_move(&mut self, position: Point) {
        if self.viewport.drag().is_dragging {
            if let Some((dx, dy)) = self.viewport.drag_to(position) {
                self.pan_clamped(dx, dy);
            }
            return;
        }
        if let Some(from) = self.selecting_from {
            self.selection_rect = Some(Rect::from_bbox(&Bbox::from_corners(from, position)));
        }
    }

    pub fn mouse_up(&mut self, event: PointerEvent) {
        let target = self.hit_test(event.position);
        let down_target = self.mouse_down_target.take();
        self.selecting_from = None;
        let rect = self.selection_rect.take();

        // Clicks inside the open editor belong to the editor.
        let edited = match self.editor.target() {
            Some(EditTarget::Word { id, .. }) => Some(SceneTarget::Word(id.clone())),
            _ => None,
        };
        if edited.is_some() && (down_target == edited || target == edited) {
            return;
        }

        if event.button == MouseButton::Middle
            || self
                .viewport
                .dragged_past(self.config.drag_click_threshold)
            || self.viewport.drag().is_pinching
        {
            self.stop_drag_pinch();
            return;
        }
        self.stop_drag_pinch();

        // Right clicks on a selected object keep the selection for a context menu.
        if event.button == MouseButton::Secondary {
            match &target {
                Some(SceneTarget::Word(id)) if self.selection.is_word_selected(id) => return,
                Some(SceneTarget::Column(id)) if self.selection.is_box_selected(*id) => return,
                _ => {}
            }
        }

        let rect = rect.filter(|r| r.width >= MIN_SELECTION_RECT || r.height >= MIN_SELECTION_RECT);
        match (self.mode, rect) {
            (InteractionMode::Select, rect) => {
                let area = match rect {
                    Some(r) => self.screen_rect_to_document(r),
                    None => self.screen_rect_to_document(Rect::new(
                        event.position.x,
                        event.position.y,
                        1.0,
                        1.0,
                    )),
                };
                self.destroy_controls(!event.ctrl);
                if self.layout_mode {
                    self.select_layout_boxes_in(&area);
                } else {
                    self.select_words_in(&area);
                }
            }
            (InteractionMode::AddRegion(kind), Some(r)) => {
                let area = self.screen_rect_to_document(r);
                self.add_region_at(&area, kind);
            }
            (InteractionMode::AddDataTable, Some(r)) => {
                let area = self.screen_rect_to_document(r);
                self.add_data_table_at(&area);
            }
            _ => {}
        }
    }

    /// Open the editor on whatever was double clicked.
    pub fn double_click(&mut self, position: Point) -> bool {
        let doc_point = self.viewport.stage().to_document(position);
        match self.scene.hit_test(doc_point) {
            Some(SceneTarget::Word(id)) => {
                let cursor = self.scene.text_groups.values().find_map(|g| {
                    g.word(&id)
                        .map(|w| w.cursor_index(g.transform.to_local(doc_point).x))
                });
                self.edit_word(&id, cursor)
            }
            Some(SceneTarget::Region(id)) => {
                let page = self
                    .scene
                    .overlay_groups
                    .iter()
                    .find(|(_, g)| g.layout_box(id).is_some_and(|b| b.label.is_some()))
                    .map(|(&n, _)| n);
                page.is_some_and(|n| self.edit_region_label(n, id))
            }
            _ => false,
        }
    }

    fn select_words_in(&mut self, area: &Bbox) {
        let hits = self.scene.words_in_area(area);
        self.add_words(hits.into_iter().map(|(n, id)| SelectedWord::new(n, id)));
    }

    fn select_layout_boxes_in(&mut self, area: &Bbox) {
        let boxes: Vec<(usize, LayoutBoxId)> = self
            .scene
            .layout_boxes_in_area(area)
            .into_iter()
            .filter_map(|(n, target, _)| match target {
                SceneTarget::Region(id) | SceneTarget::Column(id) => Some((n, id)),
                SceneTarget::Word(_) => None,
            })
            .collect();
        self.select_layout_boxes(&boxes);
    }

    // ---- selection ----

    /// Selected word objects with their pages.
    pub fn selected_words(&self) -> Vec<(usize, &WordSceneObject)> {
        self.selection
            .words()
            .iter()
            .filter_map(|w| self.scene.find_word(&w.id))
            .collect()
    }

    pub fn selected_regions(&self) -> Vec<&LayoutRegion> {
        self.selection
            .regions()
            .iter()
            .filter_map(|b| self.layout.page(b.page)?.region(b.id))
            .collect()
    }

    pub fn selected_data_columns(&self) -> Vec<&LayoutDataColumn> {
        self.selection
            .columns()
            .iter()
            .filter_map(|b| self.layout.page(b.page)?.column(b.id))
            .collect()
    }

    /// Add words to the selection and highlight them.
    pub fn add_words<I>(&mut self, words: I) -> usize
    where
        I: IntoIterator<Item = SelectedWord>,
    {
        let added = self.selection.add_words(words);
        for word in &added {
            if let Some(obj) = self.scene.find_word_mut(&word.id) {
                obj.select();
            }
        }
        added.len()
    }

    /// Add regions and columns, given by page and id, to the selection.
    pub fn select_layout_boxes(&mut self, boxes: &[(usize, LayoutBoxId)]) {
        let mut regions = Vec::new();
        let mut columns = Vec::new();
        for &(page, id) in boxes {
            let Some(layout) = self.layout.page(page) else {
                continue;
            };
            if let Some(region) = layout.region(id) {
                regions.push(SelectedBox {
                    id,
                    page,
                    left: region.bbox.left,
                });
            } else if let Some(column) = layout.column(id) {
                columns.push(SelectedBox {
                    id,
                    page,
                    left: column.bbox.left,
                });
            }
        }
        self.selection.add_layout_boxes(regions, columns);

        for group in self.scene.overlay_groups.values_mut() {
            for layout_box in &mut group.boxes {
                if self.selection.is_box_selected(layout_box.id()) && !layout_box.selected {
                    layout_box.select();
                }
            }
        }
    }

    pub fn word_properties(&self) -> WordProperties {
        self.selection.word_properties(&self.scene)
    }

    pub fn layout_box_properties(&self) -> LayoutBoxProperties {
        self.selection.layout_box_properties(|n| self.layout.page(n))
    }

    fn deselect_page_words(&mut self, n: usize) {
        self.selection.deselect_all_words(Some(n));
        if let Some(group) = self.scene.text_groups.get_mut(&n) {
            group.words.iter_mut().for_each(WordSceneObject::deselect);
        }
    }

    fn deselect_everything(&mut self) {
        for word in self.selection.deselect_all_words(None) {
            if let Some(obj) = self.scene.find_word_mut(&word.id) {
                obj.deselect();
            }
        }
        self.selection.deselect_all_regions();
        self.selection.deselect_all_data_columns();
        for group in self.scene.overlay_groups.values_mut() {
            for layout_box in group.boxes.iter_mut().filter(|b| b.selected) {
                layout_box.deselect();
            }
        }
    }

    /// Optionally clear the selection, and close any open edit.
    pub fn destroy_controls(&mut self, deselect: bool) {
        if deselect {
            self.deselect_everything();
        }
        self.commit_edit();
    }

    /// Highlight search matches on rendered and future pages.
    pub fn set_search_matches(&mut self, ids: HashSet<WordId>) {
        for group in self.scene.text_groups.values_mut() {
            for obj in &mut group.words {
                obj.fill_box = ids.contains(&obj.word_id);
            }
        }
        self.search_matches = ids;
    }

    // ---- navigation ----

    fn single_selected_location(&self) -> Option<WordLocation> {
        let [selected] = self.selection.words() else {
            return None;
        };
        self.doc.locate_word(&selected.id, Some(selected.page))
    }

    fn move_selection_to(&mut self, dest: WordLocation) {
        let Some(id) = self.doc.word(dest).map(|w| w.id.clone()) else {
            return;
        };
        self.scroll_into_view(&id);
        self.add_words([SelectedWord::new(dest.page, id)]);
    }

    fn navigate_logical(&mut self, step: fn(&Document, WordLocation) -> Option<WordLocation>) {
        let Some(loc) = self.single_selected_location() else {
            return;
        };
        let Some(dest) = step(&self.doc, loc) else {
            return;
        };
        self.destroy_controls(true);
        self.move_selection_to(dest);
    }

    /// Select the next word in reading order.
    pub fn select_next_word(&mut self) {
        self.navigate_logical(next_word);
    }

    pub fn select_prev_word(&mut self) {
        self.navigate_logical(prev_word);
    }

    fn navigate_horizontal(
        &mut self,
        step: fn(&Document, WordLocation) -> Option<WordLocation>,
        multi: bool,
        rightward: bool,
    ) {
        let anchor = if multi {
            let edges = self
                .selection
                .words()
                .iter()
                .filter_map(|w| self.scene.find_word(&w.id).map(|(_, obj)| (w, obj.x)));
            let edge = if rightward {
                edges.max_by(|a, b| a.1.total_cmp(&b.1))
            } else {
                edges.min_by(|a, b| a.1.total_cmp(&b.1))
            };
            edge.map(|(w, _)| w.clone())
        } else {
            self.selection.first_word().cloned()
        };
        let Some(anchor) = anchor else {
            return;
        };
        let Some(loc) = self.doc.locate_word(&anchor.id, Some(anchor.page)) else {
            return;
        };
        let Some(dest) = step(&self.doc, loc) else {
            return;
        };
        self.destroy_controls(!multi);
        self.move_selection_to(dest);
    }

    /// Select the word visually to the right; `multi` extends the selection.
    pub fn select_right_word(&mut self, multi: bool) {
        self.navigate_horizontal(right_word, multi, true);
    }

    pub fn select_left_word(&mut self, multi: bool) {
        self.navigate_horizontal(left_word, multi, false);
    }

    fn navigate_vertical(&mut self, step: fn(&Document, WordLocation) -> Option<WordLocation>) {
        let Some(first) = self.selection.words().first() else {
            return;
        };
        let Some(loc) = self.doc.locate_word(&first.id, Some(first.page)) else {
            return;
        };
        let Some(dest) = step(&self.doc, loc) else {
            return;
        };
        self.destroy_controls(true);
        self.move_selection_to(dest);
    }

    pub fn select_above_word(&mut self) {
        self.navigate_vertical(above_word);
    }

    pub fn select_below_word(&mut self) {
        self.navigate_vertical(below_word);
    }

    // ---- keyboard ----

    /// Run the shortcut bound to `event`. Returns whether one was bound.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        let Some(command) = key_command(event, self.editor.is_active()) else {
            return false;
        };
        log::trace!("key command {:?}", command);
        match command {
            KeyCommand::Zoom(factor) => self.zoom(factor, None),
            KeyCommand::ChangePage(delta) => {
                if let Some(page) = self.current_page.checked_add_signed(delta) {
                    self.display_page(page, true, false);
                }
            }
            KeyCommand::NextWord => self.select_next_word(),
            KeyCommand::PrevWord => self.select_prev_word(),
            KeyCommand::RightWord { multi } => self.select_right_word(multi),
            KeyCommand::LeftWord { multi } => self.select_left_word(multi),
            KeyCommand::AboveWord => self.select_above_word(),
            KeyCommand::BelowWord => self.select_below_word(),
            KeyCommand::NudgeBbox { side, amount } => {
                self.modify_selected_bbox(side, amount);
            }
            KeyCommand::Edit { at_end } => {
                if let [selected] = self.selection.words() {
                    let id = selected.id.clone();
                    self.edit_word(&id, if at_end { None } else { Some(0) });
                }
            }
            KeyCommand::ToggleItalic => self.toggle_style(FontStyle::Italic),
            KeyCommand::ToggleBold => self.toggle_style(FontStyle::Bold),
            KeyCommand::DeleteWords => {
                self.delete_selected_words();
            }
            KeyCommand::FontSizeUp => self.set_font_size(FontSizeChange::Increase),
            KeyCommand::FontSizeDown => self.set_font_size(FontSizeChange::Decrease),
            KeyCommand::PeekBackground => {
                self.scene.text_visible = false;
                self.overlay.delete();
            }
        }
        true
    }

    /// Key release; ends a background peek.
    pub fn handle_key_up(&mut self, event: &KeyEvent) {
        if event.key == Key::Char(' ') && !self.scene.text_visible {
            self.scene.text_visible = true;
            if self.config.enable_overlay {
                self.overlay.schedule(Instant::now());
            }
        }
    }

    // ---- inline editing ----

    /// Open the editor on a rendered word. `cursor` of `None` puts the
    /// cursor at the end.
    pub fn edit_word(&mut self, id: &WordId, cursor: Option<usize>) -> bool {
        if !self.config.enable_editing {
            return false;
        }
        let stage = self.viewport.stage();
        let Some((page, element, mult)) = self.scene.text_groups.iter().find_map(|(&n, g)| {
            g.word(id).map(|w| {
                let origin = stage.to_screen(g.transform.to_document(Point::new(w.x, w.layout.y)));
                (
                    n,
                    w.to_element(origin, stage.scale, g.transform.rotation),
                    w.layout.face.small_caps_mult,
                )
            })
        }) else {
            log::debug!("word {} is not rendered", id);
            return false;
        };

        let target = EditTarget::Word {
            page,
            id: id.clone(),
        };
        if let Some(previous) = self.editor.open(target, element, cursor, mult) {
            self.apply_edit(previous);
        }
        if let Some(obj) = self.scene.find_word_mut(id) {
            obj.hide();
        }
        true
    }

    /// Open the editor on the priority label of an order region.
    pub fn edit_region_label(&mut self, page: usize, region: LayoutBoxId) -> bool {
        let stage = self.viewport.stage();
        let Some(group) = self.scene.overlay_groups.get(&page) else {
            return false;
        };
        let Some(label) = group.layout_box(region).and_then(|b| b.label.as_ref()) else {
            return false;
        };
        let origin = stage.to_screen(
            group
                .transform
                .to_document(Point::new(label.x, label.layout.y)),
        );
        let element = label.to_element(origin, stage.scale, group.transform.rotation);
        let mult = label.layout.face.small_caps_mult;

        if let Some(previous) = self
            .editor
            .open(EditTarget::RegionLabel { page, region }, element, None, mult)
        {
            self.apply_edit(previous);
        }
        if let Some(label) = self
            .scene
            .overlay_groups
            .get_mut(&page)
            .and_then(|g| g.layout_box_mut(region))
            .and_then(|b| b.label.as_mut())
        {
            label.hide();
        }
        true
    }

    /// Replace the text of the open edit.
    pub fn set_edit_text(&mut self, text: &str, cursor: usize) {
        self.editor.set_text(text, cursor);
    }

    /// Close the open edit and write it back.
    pub fn commit_edit(&mut self) {
        if let Some(outcome) = self.editor.commit() {
            self.apply_edit(outcome);
        }
    }

    /// Close the open edit without writing anything back.
    pub fn cancel_edit(&mut self) {
        match self.editor.cancel() {
            Some(EditTarget::Word { id, .. }) => {
                if let Some(obj) = self.scene.find_word_mut(&id) {
                    obj.show();
                }
            }
            Some(EditTarget::RegionLabel { page, .. }) => {
                self.render_layout_boxes(page);
            }
            None => {}
        }
    }

    fn apply_edit(&mut self, outcome: EditOutcome) {
        match outcome {
            EditOutcome::Word { page, id, text } => {
                if let Some(text) = text {
                    if let Some(word) = self.word_mut(page, &id) {
                        word.text = text;
                    }
                }
                self.update_word(page, &id);
            }
            EditOutcome::RegionPriority {
                page,
                region,
                priority,
            } => {
                if let Some(priority) = priority {
                    self.layout.page_mut(page).set_region_priority(region, priority);
                }
                self.render_layout_boxes(page);
            }
        }
    }

    // ---- word modification ----

    fn word_mut(&mut self, page: usize, id: &WordId) -> Option<&mut OcrWord> {
        let loc = self.doc.locate_word(id, Some(page))?;
        self.doc.word_mut(loc)
    }

    /// Bring a word's scene object up to date with the document.
    fn update_word(&mut self, page: usize, id: &WordId) -> bool {
        let Some(loc) = self.doc.locate_word(id, Some(page)) else {
            return false;
        };
        let (Some(word), Some(line), Some(metrics)) = (
            self.doc.word(loc),
            self.doc.line(loc),
            self.doc.metrics(loc.page),
        ) else {
            return false;
        };
        let Some(obj) = self
            .scene
            .text_groups
            .get_mut(&loc.page)
            .and_then(|g| g.word_mut(id))
        else {
            return false;
        };
        match obj.update_word_canvas(word, line, metrics, self.fonts.as_ref()) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("could not update word {}: {}", id, err);
                false
            }
        }
    }

    fn modify_selected<F>(&mut self, mut modify: F)
    where
        F: FnMut(&mut OcrWord),
    {
        let selected = self.selection.words().to_vec();
        for w in selected {
            if let Some(word) = self.word_mut(w.page, &w.id) {
                modify(word);
                self.update_word(w.page, &w.id);
            }
        }
    }

    /// Move one edge of the single selected word's box.
    pub fn modify_selected_bbox(&mut self, side: BboxSide, amount: f64) -> bool {
        let [selected] = self.selection.words() else {
            return false;
        };
        let selected = selected.clone();
        let Some(word) = self.word_mut(selected.page, &selected.id) else {
            return false;
        };
        match side {
            BboxSide::Left => word.bbox.left += amount,
            BboxSide::Right => word.bbox.right += amount,
        }
        self.update_word(selected.page, &selected.id)
    }

    /// Start an interactive resize of a word.
    pub fn begin_word_resize(&mut self, id: &WordId) {
        if let Some(obj) = self.scene.find_word_mut(id) {
            obj.begin_transform();
        }
    }

    /// Finish an interactive resize to a page-local box of `new_x`,
    /// `new_width`.
    pub fn end_word_resize(&mut self, id: &WordId, new_x: f64, new_width: f64) -> bool {
        let Some((page, edge)) = self
            .scene
            .find_word(id)
            .map(|(n, obj)| (n, obj.end_transform(new_x, new_width)))
        else {
            return false;
        };
        let Some(word) = self.word_mut(page, id) else {
            return false;
        };
        match edge {
            ResizeEdge::Left(delta) => word.bbox.left += delta,
            ResizeEdge::Right(delta) => word.bbox.right += delta,
        }
        self.update_word(page, id)
    }

    /// Toggle `style` on the selected words.
    ///
    /// The first word decides: if it lacks the style every word gets it,
    /// otherwise every word goes back to normal.
    pub fn toggle_style(&mut self, style: FontStyle) {
        self.commit_edit();
        let Some(first) = self.selection.words().first().cloned() else {
            return;
        };
        let Some(current) = self
            .doc
            .locate_word(&first.id, Some(first.page))
            .and_then(|loc| self.doc.word(loc))
            .map(|w| w.style)
        else {
            return;
        };
        let new_style = if current != style {
            style
        } else {
            FontStyle::Normal
        };
        self.modify_selected(|word| word.style = new_style);
    }

    /// Change the font size of the selected words.
    ///
    /// Relative changes start from the first selected word's drawn size.
    /// When several words are selected superscripts keep their size.
    pub fn set_font_size(&mut self, change: FontSizeChange) {
        let Some(base) = self
            .selection
            .words()
            .first()
            .and_then(|w| self.scene.find_word(&w.id))
            .map(|(_, obj)| obj.layout.font_size)
        else {
            return;
        };
        let size = match change {
            FontSizeChange::Increase => base + 1.0,
            FontSizeChange::Decrease => (base - 1.0).max(1.0),
            FontSizeChange::Set(size) => size,
        };
        let multiple = self.selection.words().len() > 1;
        self.modify_selected(|word| {
            if !(multiple && word.sup) {
                word.size = Some(size);
            }
        });
    }

    /// Set the font family of the selected words; `"Default"` clears it.
    pub fn set_font_family(&mut self, family: &str) {
        let font = (family != "Default").then(|| family.to_string());
        self.modify_selected(|word| word.font = font.clone());
    }

    pub fn set_small_caps(&mut self, enabled: bool) {
        self.modify_selected(|word| word.small_caps = enabled);
    }

    /// Mark the selected words as superscript; the page is re-rendered as
    /// the line layout changes.
    pub fn set_superscript(&mut self, enabled: bool) {
        let selected = self.selection.words().to_vec();
        for w in &selected {
            if let Some(word) = self.word_mut(w.page, &w.id) {
                word.sup = enabled;
            }
        }
        self.display_page(self.current_page, false, true);
    }

    /// Delete the selected words from the document and the scene.
    pub fn delete_selected_words(&mut self) -> usize {
        let mut by_page: BTreeMap<usize, Vec<WordId>> = BTreeMap::new();
        for w in self.selection.words() {
            by_page.entry(w.page).or_default().push(w.id.clone());
        }
        let edited_deleted = match self.editor.target() {
            Some(EditTarget::Word { id, .. }) => by_page.values().flatten().any(|d| d == id),
            _ => false,
        };
        if edited_deleted {
            self.editor.cancel();
        }
        self.destroy_controls(true);

        let mut removed = 0;
        for (page, ids) in by_page {
            removed += self.doc.page_mut(page).map_or(0, |p| p.delete_words(&ids));
            if let Some(group) = self.scene.text_groups.get_mut(&page) {
                group.words.retain(|w| !ids.contains(&w.word_id));
            }
        }
        if removed > 0 {
            self.overlay.delete();
            if self.config.enable_overlay {
                self.overlay.schedule(Instant::now());
            }
        }
        removed
    }

    // ---- layout mode ----

    /// Switch between editing words and editing layout boxes.
    pub fn set_layout_mode(&mut self, enabled: bool) {
        if self.layout_mode == enabled {
            return;
        }
        self.destroy_controls(true);
        self.layout_mode = enabled;
        if !enabled {
            self.scene.overlay_groups.clear();
        }
        self.display_page(self.current_page, false, true);
    }

    /// Rebuild the region and table boxes of page `n`.
    pub fn render_layout_boxes(&mut self, n: usize) -> bool {
        if let Some(old) = self.scene.overlay_groups.remove(&n) {
            self.restore_table_word_colors(n, &old);
        }
        let Some(transform) = self.page_transform(n) else {
            log::debug!("page {} dimensions or position not known yet", n);
            return false;
        };

        let mut group = OverlayGroup::new(n, transform);
        if let Some(layout) = self.layout.page(n) {
            for region in &layout.regions {
                let label = match region.kind {
                    RegionKind::Order => self.region_label(region),
                    RegionKind::Exclude => None,
                };
                let mut obj = LayoutBoxObject::region(region, label);
                if self.selection.is_box_selected(region.id) {
                    obj.select();
                }
                group.boxes.push(obj);
            }
            for table in &layout.tables {
                let Some(mut table_obj) = DataTableObject::new(table) else {
                    continue;
                };
                for (i, column) in table.columns.iter().enumerate() {
                    let mut obj = LayoutBoxObject::column(column.id, &column.bbox, i);
                    if self.selection.is_box_selected(column.id) {
                        obj.select();
                    }
                    group.boxes.push(obj);
                }
                if let (Some(source), Some(page)) = (self.table_source.as_deref(), self.doc.page(n)) {
                    table_obj.colored_words = source
                        .extract_single_table_content(page, table)
                        .words_by_column();
                }
                group.tables.push(table_obj);
            }
        }

        if let Some(words) = self.scene.text_groups.get_mut(&n) {
            for table in &group.tables {
                for (i, ids) in table.colored_words.iter().enumerate() {
                    let color = column_color(i);
                    for id in ids {
                        if let Some(obj) = words.word_mut(id) {
                            obj.fill = color;
                            obj.opacity = 1.0;
                        }
                    }
                }
            }
        }
        self.scene.overlay_groups.insert(n, group);
        true
    }

    fn restore_table_word_colors(&mut self, n: usize, old: &OverlayGroup) {
        let Some(group) = self.scene.text_groups.get_mut(&n) else {
            return;
        };
        for id in old.tables.iter().flat_map(DataTableObject::colored_word_ids) {
            let Some(word) = self
                .doc
                .locate_word(id, Some(n))
                .and_then(|loc| self.doc.word(loc))
            else {
                continue;
            };
            if let Some(obj) = group.word_mut(id) {
                let (fill, opacity) = word_fill_opacity(word, &self.config);
                obj.fill = fill;
                obj.opacity = opacity;
            }
        }
    }

    /// Editable priority label drawn at the centre of an order region.
    fn region_label(&self, region: &LayoutRegion) -> Option<WordSceneObject> {
        let (word, line) = label_word(format!("label-{}", region.id), region.priority.to_string());
        let rect = Rect::from_bbox(&region.bbox);
        let center_x = rect.x + rect.width * 0.5;
        let center_y = rect.y + rect.height * 0.5;
        let anchor = WordAnchor {
            visual_left: center_x,
            y_actual: center_y,
            top_baseline: center_y,
        };
        let style = WordStyle {
            dynamic_width: true,
            ..WordStyle::default()
        };
        match WordSceneObject::with_anchor(&word, &line, anchor, self.fonts.as_ref(), style) {
            Ok(label) => Some(label),
            Err(err) => {
                log::warn!("no label for region {}: {}", region.id, err);
                None
            }
        }
    }

    fn rerender_layout_pages(&mut self, pages: impl IntoIterator<Item = usize>) {
        for n in pages.into_iter().collect::<BTreeSet<_>>() {
            self.render_layout_boxes(n);
        }
    }

    /// Page under the centre of a document-space box, and the box in that
    /// page's local coordinates.
    fn page_local_area(&mut self, area: &Bbox) -> Option<(usize, Bbox)> {
        let page = self.stops.page_at(area.center_y())?;
        let transform = self.page_transform(page)?;
        Some((page, transform.bbox_to_local(area)))
    }

    fn add_region_at(&mut self, area: &Bbox, kind: RegionKind) -> Option<LayoutBoxId> {
        let (page, local) = self.page_local_area(area)?;
        Some(self.add_region(page, local, kind))
    }

    fn add_data_table_at(&mut self, area: &Bbox) -> Option<LayoutBoxId> {
        let (page, local) = self.page_local_area(area)?;
        Some(self.add_data_table(page, local))
    }

    /// Add a region from a page-local rectangle.
    pub fn add_region(&mut self, page: usize, bbox: Bbox, kind: RegionKind) -> LayoutBoxId {
        let id = self.layout.page_mut(page).add_region(bbox, kind);
        self.render_layout_boxes(page);
        id
    }

    /// Add a single-column data table from a page-local rectangle.
    pub fn add_data_table(&mut self, page: usize, bbox: Bbox) -> LayoutBoxId {
        let id = self.layout.page_mut(page).add_table(bbox, &[]);
        self.render_layout_boxes(page);
        id
    }

    /// Apply a drag or resize of a region.
    pub fn set_region_bbox(&mut self, page: usize, id: LayoutBoxId, bbox: Bbox) -> bool {
        let changed = self.layout.page_mut(page).set_region_bbox(id, bbox);
        if changed {
            self.render_layout_boxes(page);
        }
        changed
    }

    /// Keep a region's label centred while its box is being dragged.
    pub fn drag_region(&mut self, page: usize, id: LayoutBoxId, rect: Rect) {
        let Some(layout_box) = self
            .scene
            .overlay_groups
            .get_mut(&page)
            .and_then(|g| g.layout_box_mut(id))
        else {
            return;
        };
        layout_box.rect = rect;
        let (x, y) = layout_box.label_anchor();
        if let Some(label) = layout_box.label.as_mut() {
            let (word, line) = label_word(label.word_id.as_str(), label.text());
            label.anchor = WordAnchor {
                visual_left: x,
                y_actual: y,
                top_baseline: y,
            };
            label.x = x;
            if let Err(err) = label.relayout(&word, &line, self.fonts.as_ref()) {
                log::warn!("could not move label of region {}: {}", id, err);
            }
        }
    }

    fn selected_boxes_by_page(&self) -> BTreeMap<usize, Vec<LayoutBoxId>> {
        let mut by_page: BTreeMap<usize, Vec<LayoutBoxId>> = BTreeMap::new();
        for b in self.selection.regions().iter().chain(self.selection.columns()) {
            by_page.entry(b.page).or_default().push(b.id);
        }
        by_page
    }

    fn retype_selected<F>(&mut self, mut apply: F) -> bool
    where
        F: FnMut(&mut PageLayout, &[LayoutBoxId]) -> bool,
    {
        let mut changed = Vec::new();
        for (page, ids) in self.selected_boxes_by_page() {
            if apply(self.layout.page_mut(page), &ids) {
                changed.push(page);
            }
        }
        let any = !changed.is_empty();
        self.rerender_layout_pages(changed);
        any
    }

    /// Set the inclusion rule of every selected region and column.
    pub fn set_inclusion_rule(&mut self, rule: InclusionRule) -> bool {
        self.retype_selected(|layout, ids| layout.set_inclusion_rule(ids, rule))
    }

    pub fn set_inclusion_level(&mut self, level: InclusionLevel) -> bool {
        self.retype_selected(|layout, ids| layout.set_inclusion_level(ids, level))
    }

    /// Delete the selected regions and columns.
    pub fn delete_selected_layout_boxes(&mut self) -> bool {
        let regions = self.selection.regions().to_vec();
        let columns = self.selection.columns().to_vec();
        let mut pages = Vec::new();
        for b in &regions {
            if self.layout.page_mut(b.page).delete_region(b.id) {
                pages.push(b.page);
            }
        }
        for b in &columns {
            if self.layout.page_mut(b.page).delete_column(b.id) {
                pages.push(b.page);
            }
        }
        self.destroy_controls(true);
        let any = !pages.is_empty();
        self.rerender_layout_pages(pages);
        any
    }

    /// Page of the selected columns when they all sit on one page.
    fn selected_columns_page(&self) -> Option<usize> {
        let first = self.selection.columns().first()?.page;
        self.selection
            .columns()
            .iter()
            .all(|b| b.page == first)
            .then_some(first)
    }

    /// Merge the selected columns into the leftmost one.
    pub fn merge_data_columns(&mut self) -> bool {
        let Some(page) = self.selected_columns_page() else {
            return false;
        };
        let ids = self.selection.column_ids();
        if !self.layout.page_mut(page).merge_columns(&ids) {
            log::debug!("selected columns are not adjacent");
            return false;
        }
        self.selection.deselect_data_columns_by_ids(&ids[1..]);
        self.render_layout_boxes(page);
        true
    }

    /// Merge the tables owning the selected columns.
    pub fn merge_data_tables(&mut self) -> bool {
        let Some(page) = self.selected_columns_page() else {
            return false;
        };
        let layout = self.layout.page_mut(page);
        let mut tables = Vec::new();
        for b in self.selection.columns() {
            if let Some(table) = layout.table_of_column(b.id) {
                if !tables.contains(&table.id) {
                    tables.push(table.id);
                }
            }
        }
        let Some(dropped) = layout.merge_tables(&tables) else {
            log::debug!("selected tables are not adjacent");
            return false;
        };
        self.selection.deselect_data_columns_by_ids(&dropped);
        self.render_layout_boxes(page);
        true
    }

    /// Split the single selected column at page-local `x`.
    pub fn split_data_column(&mut self, x: f64) -> Option<LayoutBoxId> {
        let [selected] = self.selection.columns() else {
            return None;
        };
        let (page, id) = (selected.page, selected.id);
        let new_id = self.layout.page_mut(page).split_column(id, x)?;
        self.render_layout_boxes(page);
        Some(new_id)
    }

    /// Move the selected columns into a table of their own.
    pub fn split_data_table(&mut self) -> Vec<LayoutBoxId> {
        let Some(page) = self.selected_columns_page() else {
            return Vec::new();
        };
        let ids = self.selection.column_ids();
        let created = self.layout.page_mut(page).split_table(&ids);
        if !created.is_empty() {
            self.render_layout_boxes(page);
        }
        created
    }

    /// Apply a resize of a whole table rectangle.
    pub fn resize_data_table(&mut self, page: usize, table: LayoutBoxId, bbox: Bbox) {
        let deleted = self.layout.page_mut(page).resize_table(table, bbox);
        self.selection.deselect_data_columns_by_ids(&deleted);
        self.render_layout_boxes(page);
    }

    /// Drag the separator on the left edge of column `index`.
    pub fn move_column_separator(
        &mut self,
        page: usize,
        table: LayoutBoxId,
        index: usize,
        x: f64,
    ) -> Option<f64> {
        let applied = self.layout.page_mut(page).move_separator(table, index, x)?;
        self.render_layout_boxes(page);
        Some(applied)
    }

    /// Make page `n`'s layout the document default.
    pub fn set_default_layout(&mut self, n: usize) {
        self.layout.set_default_from(n);
        let pages = self.scene.overlay_groups.keys().copied().collect::<Vec<_>>();
        self.rerender_layout_pages(pages);
    }

    /// Drop page `n`'s layout edits.
    pub fn revert_layout(&mut self, n: usize) {
        self.destroy_controls(true);
        self.layout.revert_to_default(n);
        self.render_layout_boxes(n);
    }

    // ---- page images ----

    /// Switch between the native and the binarized background.
    pub fn set_color_mode(&mut self, mode: ColorMode) {
        if self.color_mode == mode {
            return;
        }
        self.color_mode = mode;
        self.render_images(self.current_page);
    }

    /// Toggle auto-rotation; placed bitmaps are rotated in place and the
    /// text is re-rendered.
    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.config.auto_rotate = enabled;
        for (&n, image) in self.scene.images.iter_mut() {
            let PageImage::Bitmap { entry, placement } = image else {
                continue;
            };
            let angle = self.doc.metrics(n).map_or(0.0, |m| m.angle);
            let rotation = image_rotation(entry.rotated, angle, enabled);
            if placement.needs_rotation_update(rotation) {
                placement.rotation = rotation;
            }
        }
        self.display_page(self.current_page, false, true);
    }

    fn variant(&self) -> ImageVariant {
        ImageVariant::for_color_mode(self.color_mode)
    }

    fn render_images(&mut self, n: usize) {
        let variant = self.variant();
        let Some(provider) = self.images.as_deref() else {
            return;
        };
        let plan = self.cache.render_ahead_behind(n, variant, provider);
        for page in plan.ready {
            self.place_image(page, variant);
        }
        for page in plan.evicted {
            self.set_placeholder(page);
        }
    }

    fn place_image(&mut self, page: usize, variant: ImageVariant) {
        let Some(entry) = self.cache.entry(page, variant).cloned() else {
            return;
        };
        let Some(metrics) = self.doc.metrics(page).copied() else {
            return;
        };
        let (Some(dims), Some(start)) = (metrics.dims, self.stops.start(page)) else {
            return;
        };
        let placement =
            ImagePlacement::compute(&entry, dims, start, metrics.angle, self.config.auto_rotate);
        self.scene
            .images
            .insert(page, PageImage::Bitmap { entry, placement });
    }

    fn set_placeholder(&mut self, page: usize) {
        let dims = self.doc.metrics(page).and_then(|m| m.dims);
        match (dims, self.stops.start(page)) {
            (Some(dims), Some(start)) => {
                self.scene
                    .images
                    .insert(page, PageImage::placeholder(dims, start));
            }
            _ => {
                self.scene.images.remove(&page);
            }
        }
    }

    fn poll_images(&mut self) {
        let variant = self.variant();
        for event in self.cache.poll_completed() {
            match event {
                DecodeEvent::Decoded { page, variant: v } if v == variant => {
                    self.place_image(page, v);
                }
                DecodeEvent::Decoded { .. } => {}
                DecodeEvent::Failed { page, error, .. } => {
                    log::warn!("page {} background failed to decode: {}", page, error);
                }
            }
        }
    }

    // ---- text overlay ----

    /// Drive deferred work: place decoded bitmaps and rebuild the overlay
    /// once its quiet period has passed.
    pub fn tick(&mut self, now: Instant) {
        self.poll_images();
        if self.overlay.take_due(now).is_some() {
            self.render_overlay();
        }
    }

    /// Build overlay elements for every visible word on rendered pages.
    pub fn render_overlay(&mut self) {
        if !self.scene.text_visible {
            return;
        }
        let stage = self.viewport.stage();
        let mut elements = Vec::new();
        for group in self.scene.text_groups.values() {
            for obj in group.words.iter().filter(|w| w.visible) {
                let origin = stage.to_screen(
                    group
                        .transform
                        .to_document(Point::new(obj.x, obj.layout.y)),
                );
                elements.push(obj.to_element(origin, stage.scale, group.transform.rotation));
            }
        }
        log::debug!("overlay rebuilt with {} elements", elements.len());
        self.overlay.install(elements);
    }

    /// Plain text of the overlay elements in `ids`.
    pub fn copy_text(&self, ids: &HashSet<WordId>) -> String {
        copy_text(&self.doc, &self.scene.rendered_pages(), ids)
    }
}

/// Stand-in word for a region's priority label, on an empty line.
fn label_word(id: impl Into<String>, text: String) -> (OcrWord, OcrLine) {
    let mut word = OcrWord::new(id, text, Bbox::default());
    word.size = Some(REGION_LABEL_SIZE);
    word.visual_coords = false;
    (word, OcrLine::new(Bbox::default(), [0.0, 0.0], Vec::new()))
}
