//! Stage transform and pan/zoom input handling
//!
//! The whole page scene sits under one stage transform:
//! `screen = document * scale + (x, y)`. Zooming, panning, dragging,
//! pinching and wheel input all end up in [`ViewportController::zoom_about`]
//! or [`ViewportController::pan`]. Page-dependent clamping is supplied by the
//! caller through [`PanBounds`] so this module knows nothing about pages.

use crate::scene::Rect;
use ocr_canvas_core::Point;

/// Margin kept between a word scrolled into view and the stage edges.
pub const SCROLL_MARGIN: f64 = 30.0;

/// Words above this screen y are scrolled down to [`SCROLL_TOP_TARGET`].
const SCROLL_TOP_THRESHOLD: f64 = 150.0;
const SCROLL_TOP_TARGET: f64 = 200.0;

/// Space above the first page left for the host's interface.
pub const TOP_PADDING: f64 = 100.0;
/// Space below a page fitted into the stage.
const BOTTOM_PADDING: f64 = 50.0;

/// Bounds of one ctrl+wheel zoom step.
const WHEEL_ZOOM_MIN: f64 = 0.9;
const WHEEL_ZOOM_MAX: f64 = 1.1;

/// Scale and translation applied to the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTransform {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for StageTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl StageTransform {
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.x, p.y * self.scale + self.y)
    }

    pub fn to_document(&self, p: Point) -> Point {
        Point::new((p.x - self.x) / self.scale, (p.y - self.y) / self.scale)
    }
}

/// Limits on panning derived from the current page.
///
/// `first_page_top` is set only while the first page is current and
/// `last_page_end` only while the last page is current.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanBounds {
    pub first_page_top: Option<f64>,
    pub last_page_end: Option<f64>,
    pub page_width: f64,
}

/// State of a middle-button/touch drag or a two-finger pinch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragState {
    pub is_dragging: bool,
    pub is_pinching: bool,
    pub last: Option<Point>,
    /// Manhattan distance travelled; separates drags from clicks
    pub total: f64,
    pub last_center: Option<Point>,
    pub last_dist: Option<f64>,
}

/// Wheel input as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Deltas are in lines rather than pixels
    pub line_mode: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub device_pixel_ratio: f64,
    /// Pointer position on the stage
    pub pointer: Point,
}

impl WheelInput {
    /// Plain vertical scroll of `delta_y` pixels at `pointer`.
    pub fn scroll(delta_y: f64, pointer: Point) -> Self {
        Self {
            delta_x: 0.0,
            delta_y,
            line_mode: false,
            ctrl: false,
            shift: false,
            device_pixel_ratio: 1.0,
            pointer,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// What a wheel event asks the viewport to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelAction {
    Zoom { factor: f64, center: Point },
    Pan { dx: f64, dy: f64 },
}

/// Guess whether a wheel event came from a track pad.
///
/// Mice report 100 or 120 per notch, possibly multiplied by the browser
/// zoom, and always whole numbers.
pub fn is_track_pad(input: &WheelInput) -> bool {
    let dy = input.delta_y;
    if dy == 100.0 || dy == 120.0 {
        return false;
    }
    let scaled = ((dy * input.device_pixel_ratio * 1e5).round() / 1e5).abs();
    if scaled == 100.0 || scaled == 120.0 {
        return false;
    }
    dy.round() != dy
}

/// Translate a wheel event into a zoom or a pan.
pub fn wheel_action(input: &WheelInput) -> WheelAction {
    if input.ctrl {
        let mut delta = input.delta_y;
        if input.line_mode {
            delta *= 10.0;
        }
        if is_track_pad(input) {
            delta = (delta * 7.0).clamp(-720.0, 600.0);
        }
        let factor = 0.999_f64.powf(delta).clamp(WHEEL_ZOOM_MIN, WHEEL_ZOOM_MAX);
        WheelAction::Zoom {
            factor,
            center: input.pointer,
        }
    } else if input.shift {
        WheelAction::Pan {
            dx: input.delta_y,
            dy: 0.0,
        }
    } else {
        WheelAction::Pan {
            dx: 0.0,
            dy: -input.delta_y,
        }
    }
}

/// Owns the stage transform and gesture state.
#[derive(Debug, Clone)]
pub struct ViewportController {
    stage: StageTransform,
    width: f64,
    height: f64,
    drag: DragState,
}

impl ViewportController {
    /// Create a controller for a stage of `width` x `height` screen px.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            stage: StageTransform::default(),
            width,
            height,
            drag: DragState::default(),
        }
    }

    pub fn stage(&self) -> StageTransform {
        self.stage
    }

    pub fn set_stage(&mut self, stage: StageTransform) {
        self.stage = stage;
    }

    pub fn scale(&self) -> f64 {
        self.stage.scale
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Update the stage dimensions (call on resize)
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    /// `true` while a drag or pinch is in progress.
    pub fn is_gesturing(&self) -> bool {
        self.drag.is_dragging || self.drag.is_pinching
    }

    /// Centre of the stage in screen coordinates.
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Document y under the vertical middle of the stage.
    pub fn center_document_y(&self) -> f64 {
        -(self.stage.y - self.height / 2.0) / self.stage.scale
    }

    /// Multiply the scale by `factor`, keeping the document point under
    /// `center` fixed on screen.
    pub fn zoom_about(&mut self, factor: f64, center: Point) {
        let old = self.stage.scale;
        let pointed = Point::new(
            (center.x - self.stage.x) / old,
            (center.y - self.stage.y) / old,
        );
        let new = old * factor;
        self.stage.scale = new;
        self.stage.x = center.x - pointed.x * new;
        self.stage.y = center.y - pointed.y * new;
        log::trace!("zoom x{} about ({}, {}) -> scale {}", factor, center.x, center.y, new);
    }

    /// Move the stage, clipped so the document cannot leave the viewport.
    ///
    /// Returns the delta actually applied.
    pub fn pan(&mut self, dx: f64, dy: f64, bounds: &PanBounds) -> (f64, f64) {
        let StageTransform { scale, x, y } = self.stage;
        let mut dx = dx;
        let mut dy = dy;

        if let Some(top) = bounds.first_page_top {
            let max_y = -(top - TOP_PADDING) * scale + self.height / 2.0;
            dy = dy.min((max_y - y).max(0.0));
        }
        if let Some(end) = bounds.last_page_end {
            let min_y = -end * scale + self.height / 2.0;
            dy = dy.max(-(y - min_y).max(0.0));
        }

        let min_x = -(bounds.page_width / 2.0) * scale;
        dx = dx.max(-(x - min_x).max(0.0));
        let max_x = min_x + self.width;
        dx = dx.min((max_x - x).max(0.0));

        self.stage.x = x + dx;
        self.stage.y = y + dy;
        log::trace!("pan ({}, {}) -> stage ({}, {})", dx, dy, self.stage.x, self.stage.y);
        (dx, dy)
    }

    /// Put the top of a page at `page_top` just under the top padding.
    pub fn scroll_to(&mut self, page_top: f64) {
        self.stage.y = -(page_top - TOP_PADDING) * self.stage.scale;
    }

    /// Fit a page of `page_width` x `page_height` into a host of
    /// `client_height`, centred horizontally.
    pub fn fit_page(&mut self, page_width: f64, page_height: f64, client_height: f64) {
        let scale = (client_height - TOP_PADDING - BOTTOM_PADDING) / page_height;
        self.stage = StageTransform {
            scale,
            x: (self.width - page_width * scale) / 2.0,
            y: TOP_PADDING,
        };
    }

    /// Pan needed to bring a screen rectangle inside the stage, if any.
    pub fn scroll_into_view_delta(&self, rect: Rect) -> Option<(f64, f64)> {
        let bottom = rect.y + rect.height;
        let right = rect.x + rect.width;

        let dy = if bottom > self.height - SCROLL_MARGIN {
            -(bottom - self.height + SCROLL_MARGIN)
        } else if rect.y < SCROLL_TOP_THRESHOLD {
            -(rect.y - SCROLL_TOP_TARGET)
        } else {
            0.0
        };

        let dx = if right > self.width - SCROLL_MARGIN {
            -(right - self.width + SCROLL_MARGIN)
        } else if rect.x < SCROLL_MARGIN {
            -(rect.x - SCROLL_MARGIN)
        } else {
            0.0
        };

        (dx != 0.0 || dy != 0.0).then_some((dx, dy))
    }

    pub fn start_drag(&mut self, at: Point) {
        self.drag.is_dragging = true;
        self.drag.last = Some(at);
    }

    /// Movement since the last drag event, or `None` when not dragging or
    /// the pointer moved less than half a pixel.
    pub fn drag_to(&mut self, at: Point) -> Option<(f64, f64)> {
        if !self.drag.is_dragging {
            return None;
        }
        let last = self.drag.last.unwrap_or(at);
        let dx = at.x - last.x;
        let dy = at.y - last.y;
        if dx.round() == 0.0 && dy.round() == 0.0 {
            return None;
        }
        self.drag.total += dx.abs() + dy.abs();
        self.drag.last = Some(at);
        Some((dx, dy))
    }

    /// One frame of a two-finger gesture.
    ///
    /// The first frame only records the fingers. Later frames return the
    /// zoom factor relative to the previous frame and the pinch centre.
    pub fn pinch(&mut self, p1: Point, p2: Point) -> Option<(f64, Point)> {
        self.drag.is_pinching = true;
        let center = Point::midpoint(p1, p2);
        let dist = Point::distance(p1, p2);

        let (Some(last_dist), Some(_)) = (self.drag.last_dist, self.drag.last_center) else {
            self.drag.last_center = Some(center);
            self.drag.last_dist = Some(dist);
            return None;
        };
        self.drag.last_dist = Some(dist);
        if last_dist <= 0.0 {
            return None;
        }
        Some((dist / last_dist, center))
    }

    /// `true` when the current drag moved far enough not to be a click.
    pub fn dragged_past(&self, threshold: f64) -> bool {
        self.drag.is_dragging && self.drag.total > threshold
    }

    /// End any drag or pinch. Returns whether one was active.
    pub fn stop_drag_pinch(&mut self) -> bool {
        let was_active = self.is_gesturing();
        self.drag = DragState::default();
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_transform_round_trip() {
        let stage = StageTransform {
            scale: 1.5,
            x: 20.0,
            y: -300.0,
        };
        let p = Point::new(12.0, 34.0);
        let back = stage.to_document(stage.to_screen(p));
        assert!(close(back.x, p.x) && close(back.y, p.y));
    }

    #[test]
    fn test_zoom_keeps_pivot_fixed() {
        let mut vp = ViewportController::new(800.0, 600.0);
        let center = Point::new(300.0, 200.0);
        let before = vp.stage().to_document(center);
        vp.zoom_about(2.0, center);
        let after = vp.stage().to_document(center);
        assert!(close(before.x, after.x) && close(before.y, after.y));
        assert_eq!(vp.scale(), 2.0);
    }

    #[test]
    fn test_zoom_round_trip_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let mut vp = ViewportController::new(1000.0, 800.0);
            vp.set_stage(StageTransform {
                scale: rng.gen_range(0.1..4.0),
                x: rng.gen_range(-2000.0..2000.0),
                y: rng.gen_range(-20000.0..200.0),
            });
            let start = vp.stage();
            let k = rng.gen_range(0.25..4.0);
            let pivot = Point::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..800.0));

            vp.zoom_about(k, pivot);
            vp.zoom_about(1.0 / k, pivot);

            let end = vp.stage();
            assert!(close(start.scale, end.scale));
            assert!(close(start.x, end.x));
            assert!(close(start.y, end.y));
        }
    }

    #[test]
    fn test_pan_clamps_first_page_top() {
        let mut vp = ViewportController::new(800.0, 600.0);
        vp.scroll_to(30.0);
        let bounds = PanBounds {
            first_page_top: Some(30.0),
            last_page_end: None,
            page_width: 600.0,
        };
        // max_y = 70 + 300 = 370, stage.y = 70
        let (_, dy) = vp.pan(0.0, 1000.0, &bounds);
        assert!(close(dy, 300.0));
        let (_, dy) = vp.pan(0.0, 50.0, &bounds);
        assert_eq!(dy, 0.0);
        let (_, dy) = vp.pan(0.0, -50.0, &bounds);
        assert_eq!(dy, -50.0);
    }

    #[test]
    fn test_pan_clamps_last_page_end() {
        let mut vp = ViewportController::new(800.0, 600.0);
        vp.set_stage(StageTransform {
            scale: 1.0,
            x: 0.0,
            y: -1000.0,
        });
        let bounds = PanBounds {
            first_page_top: None,
            last_page_end: Some(1500.0),
            page_width: 600.0,
        };
        // min_y = -1500 + 300 = -1200
        let (_, dy) = vp.pan(0.0, -500.0, &bounds);
        assert!(close(dy, -200.0));
        assert!(close(vp.stage().y, -1200.0));
    }

    #[test]
    fn test_pan_clamps_horizontal() {
        let mut vp = ViewportController::new(800.0, 600.0);
        let bounds = PanBounds {
            page_width: 600.0,
            ..PanBounds::default()
        };
        // min_x = -300, max_x = 500
        let (dx, _) = vp.pan(-1000.0, 0.0, &bounds);
        assert_eq!(dx, -300.0);
        let (dx, _) = vp.pan(2000.0, 0.0, &bounds);
        assert_eq!(dx, 800.0);
        assert_eq!(vp.stage().x, 500.0);
    }

    #[test]
    fn test_center_document_y() {
        let mut vp = ViewportController::new(800.0, 600.0);
        vp.set_stage(StageTransform {
            scale: 2.0,
            x: 0.0,
            y: -1000.0,
        });
        assert!(close(vp.center_document_y(), 650.0));
    }

    #[test]
    fn test_fit_page() {
        let mut vp = ViewportController::new(1000.0, 900.0);
        vp.fit_page(500.0, 750.0, 900.0);
        let stage = vp.stage();
        assert!(close(stage.scale, 1.0));
        assert!(close(stage.x, 250.0));
        assert_eq!(stage.y, TOP_PADDING);
    }

    #[test]
    fn test_track_pad_detection() {
        let p = Point::default();
        assert!(!is_track_pad(&WheelInput::scroll(100.0, p)));
        assert!(!is_track_pad(&WheelInput::scroll(-120.0, p)));
        assert!(!is_track_pad(&WheelInput::scroll(4.0, p)));
        assert!(is_track_pad(&WheelInput::scroll(3.25, p)));

        let mut zoomed = WheelInput::scroll(100.0 / 1.25, p);
        zoomed.device_pixel_ratio = 1.25;
        assert!(!is_track_pad(&zoomed));
    }

    #[test]
    fn test_wheel_actions() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(
            wheel_action(&WheelInput::scroll(100.0, p)),
            WheelAction::Pan { dx: 0.0, dy: -100.0 }
        );
        assert_eq!(
            wheel_action(&WheelInput::scroll(100.0, p).with_shift()),
            WheelAction::Pan { dx: 100.0, dy: 0.0 }
        );

        // 0.999^100 is just above the lower clamp
        let WheelAction::Zoom { factor, center } = wheel_action(&WheelInput::scroll(100.0, p).with_ctrl())
        else {
            panic!("expected zoom");
        };
        assert!(close(factor, 0.999_f64.powf(100.0)));
        assert_eq!(center, p);

        let WheelAction::Zoom { factor, .. } = wheel_action(&WheelInput::scroll(-1000.0, p).with_ctrl())
        else {
            panic!("expected zoom");
        };
        assert_eq!(factor, WHEEL_ZOOM_MAX);

        let mut lines = WheelInput::scroll(3.0, p).with_ctrl();
        lines.line_mode = true;
        let WheelAction::Zoom { factor, .. } = wheel_action(&lines) else {
            panic!("expected zoom");
        };
        assert!(close(factor, 0.999_f64.powf(30.0)));
    }

    #[test]
    fn test_scroll_into_view() {
        let vp = ViewportController::new(800.0, 600.0);
        assert_eq!(
            vp.scroll_into_view_delta(Rect::new(100.0, 300.0, 50.0, 20.0)),
            None
        );
        assert_eq!(
            vp.scroll_into_view_delta(Rect::new(100.0, 580.0, 50.0, 20.0)),
            Some((0.0, -30.0))
        );
        assert_eq!(
            vp.scroll_into_view_delta(Rect::new(10.0, 100.0, 50.0, 20.0)),
            Some((20.0, 100.0))
        );
        assert_eq!(
            vp.scroll_into_view_delta(Rect::new(760.0, 300.0, 50.0, 20.0)),
            Some((-40.0, 0.0))
        );
    }

    #[test]
    fn test_drag_ignores_subpixel_moves() {
        let mut vp = ViewportController::new(800.0, 600.0);
        assert_eq!(vp.drag_to(Point::new(5.0, 5.0)), None);

        vp.start_drag(Point::new(0.0, 0.0));
        assert_eq!(vp.drag_to(Point::new(0.3, 0.2)), None);
        assert_eq!(vp.drag_to(Point::new(4.0, -3.0)), Some((4.0, -3.0)));
        assert_eq!(vp.drag().total, 7.0);
        assert!(vp.dragged_past(5.0));
        assert!(!vp.dragged_past(10.0));

        assert!(vp.stop_drag_pinch());
        assert!(!vp.stop_drag_pinch());
        assert_eq!(vp.drag(), &DragState::default());
    }

    #[test]
    fn test_pinch_relative_factor() {
        let mut vp = ViewportController::new(800.0, 600.0);
        assert_eq!(vp.pinch(Point::new(0.0, 0.0), Point::new(100.0, 0.0)), None);
        assert!(vp.is_gesturing());

        let (factor, center) = vp
            .pinch(Point::new(0.0, 0.0), Point::new(150.0, 0.0))
            .unwrap();
        assert!(close(factor, 1.5));
        assert_eq!(center, Point::new(75.0, 0.0));

        let (factor, _) = vp
            .pinch(Point::new(0.0, 0.0), Point::new(75.0, 0.0))
            .unwrap();
        assert!(close(factor, 0.5));
    }
}
