//! Scene objects for recognized words.
//!
//! A [`WordSceneObject`] caches the glyph layout of one word and the state it
//! is drawn with. It never owns the word: edits go to the [`Document`] and
//! the object is brought up to date with
//! [`update_word_canvas`](WordSceneObject::update_word_canvas), which runs
//! exactly the steps a freshly built object would.
//!
//! [`Document`]: ocr_canvas_core::Document

use crate::config::{DisplayMode, ViewerConfig};
use crate::scene::{Color, Rect};
use ocr_canvas_core::{
    anchor_word, layout_word, Bbox, CanvasResult, FontMetricsProvider, OcrLine, OcrWord,
    PageMetrics, Point, WordAnchor, WordId, WordLayout, HEIGHT_RATIO, ROTATION_EPSILON,
};

/// Horizontal padding around overlay and editor elements, in screen px.
pub const ELEMENT_PADDING: f64 = 5.0;

/// Fill drawn over words matching the current search
const FILL_BOX_HEX: &str = "#4278f550";

/// Fill colour and opacity of a word for the configured display mode.
pub fn word_fill_opacity(word: &OcrWord, config: &ViewerConfig) -> (Color, f64) {
    let hex = match config.display_mode {
        DisplayMode::Invis => return (Color::BLACK, 0.0),
        DisplayMode::Ebook => return (Color::BLACK, 1.0),
        DisplayMode::Eval if word.match_truth => "#00ff7b",
        DisplayMode::Eval => "#ff0000",
        DisplayMode::Proof if word.conf > config.conf_thresh_high => "#00ff7b",
        DisplayMode::Proof if word.conf > config.conf_thresh_med => "#ffc800",
        DisplayMode::Proof => "#ff0000",
    };
    let fill = Color::from_hex(hex).unwrap_or(Color::BLACK);
    (fill, config.overlay_opacity / 100.0)
}

/// Drawing options chosen when a word object is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordStyle {
    pub fill: Color,
    pub opacity: f64,
    /// Black outline, used for confident words that miss the ground truth
    pub outline: bool,
    /// Search highlight
    pub fill_box: bool,
    /// Receives pointer events; off while editing layout
    pub listening: bool,
    /// Size the box to the text instead of the recognized bbox
    pub dynamic_width: bool,
}

impl WordStyle {
    /// Style of a recognized word under `config`.
    pub fn for_word(word: &OcrWord, config: &ViewerConfig) -> Self {
        let (fill, opacity) = word_fill_opacity(word, config);
        Self {
            fill,
            opacity,
            outline: config.display_mode == DisplayMode::Eval
                && word.conf > config.conf_thresh_high
                && !word.match_truth,
            fill_box: false,
            listening: true,
            dynamic_width: false,
        }
    }
}

impl Default for WordStyle {
    fn default() -> Self {
        Self {
            fill: Color::BLACK,
            opacity: 1.0,
            outline: false,
            fill_box: false,
            listening: true,
            dynamic_width: false,
        }
    }
}

/// Which edge a resize moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeEdge {
    Left(f64),
    Right(f64),
}

/// One glyph in word-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnGlyph {
    pub ch: char,
    pub x: f64,
    pub y: f64,
    pub font: String,
}

/// Everything needed to paint a word.
#[derive(Debug, Clone, PartialEq)]
pub struct WordDrawing {
    pub glyphs: Vec<DrawnGlyph>,
    pub fill: Color,
    pub opacity: f64,
    /// Box stroke and its width in page units
    pub stroke: Option<(Color, f64)>,
    pub fill_box: Option<(Rect, Color)>,
}

/// A run of text drawn at one size in an HTML-like element.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_size: f64,
}

/// Absolutely positioned text element matching a drawn word on screen.
///
/// Used both for the selectable overlay and for the inline editor.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub id: WordId,
    pub spans: Vec<TextSpan>,
    /// Render every character uppercase; set for small caps
    pub uppercase: bool,
    pub left: f64,
    pub top: f64,
    pub padding: f64,
    pub font_size: f64,
    pub font_family: String,
    pub font_style: String,
    pub font_weight: u16,
    pub letter_spacing: f64,
    pub line_height: f64,
    /// Rotation in degrees and the transform origin's y offset
    pub rotation: Option<(f64, f64)>,
    pub color: Color,
    pub opacity: f64,
}

impl TextElement {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Split `text` into lowercase and other runs, shrinking the lowercase ones.
pub fn small_caps_spans(text: &str, font_size: f64, small_caps_size: f64) -> Vec<TextSpan> {
    let mut spans: Vec<TextSpan> = Vec::new();
    let mut lower_run = None;
    for c in text.chars() {
        let lower = c.is_lowercase();
        if lower_run != Some(lower) {
            spans.push(TextSpan {
                text: String::new(),
                font_size: if lower { small_caps_size } else { font_size },
            });
            lower_run = Some(lower);
        }
        if let Some(span) = spans.last_mut() {
            span.text.push(c);
        }
    }
    spans
}

/// Scene object drawing one recognized word.
#[derive(Debug, Clone)]
pub struct WordSceneObject {
    pub word_id: WordId,
    /// Left edge of the box, page-local
    pub x: f64,
    pub anchor: WordAnchor,
    pub layout: WordLayout,
    pub visual_coords: bool,
    pub small_caps: bool,
    pub dynamic_width: bool,
    pub fill: Color,
    pub opacity: f64,
    pub outline: bool,
    pub fill_box: bool,
    pub selected: bool,
    pub visible: bool,
    pub listening: bool,
    last_x: f64,
    last_width: f64,
}

impl WordSceneObject {
    /// Build the object for `word`, anchored on its page.
    pub fn new(
        word: &OcrWord,
        line: &OcrLine,
        metrics: &PageMetrics,
        fonts: &dyn FontMetricsProvider,
        style: WordStyle,
    ) -> CanvasResult<Self> {
        let anchor = anchor_word(word, line, metrics);
        Self::with_anchor(word, line, anchor, fonts, style)
    }

    /// Build an object at an explicit anchor, e.g. a label that is not part
    /// of the recognized text.
    pub fn with_anchor(
        word: &OcrWord,
        line: &OcrLine,
        anchor: WordAnchor,
        fonts: &dyn FontMetricsProvider,
        style: WordStyle,
    ) -> CanvasResult<Self> {
        let layout = layout_word(word, line, fonts, anchor.y_actual, style.dynamic_width)?;
        let x = anchor.visual_left;
        Ok(Self {
            word_id: word.id.clone(),
            x,
            anchor,
            last_width: layout.width,
            layout,
            visual_coords: word.visual_coords,
            small_caps: word.small_caps,
            dynamic_width: style.dynamic_width,
            fill: style.fill,
            opacity: style.opacity,
            outline: style.outline,
            fill_box: style.fill_box,
            selected: false,
            visible: true,
            listening: style.listening,
            last_x: x,
        })
    }

    /// Re-anchor and re-measure after the word changed, then show it.
    ///
    /// The result matches what [`new`](Self::new) builds for the same word,
    /// so an edited word needs no page re-render.
    pub fn update_word_canvas(
        &mut self,
        word: &OcrWord,
        line: &OcrLine,
        metrics: &PageMetrics,
        fonts: &dyn FontMetricsProvider,
    ) -> CanvasResult<()> {
        self.anchor = anchor_word(word, line, metrics);
        self.x = self.anchor.visual_left;
        self.relayout(word, line, fonts)
    }

    /// Re-measure keeping the current anchor.
    pub fn relayout(
        &mut self,
        word: &OcrWord,
        line: &OcrLine,
        fonts: &dyn FontMetricsProvider,
    ) -> CanvasResult<()> {
        self.layout = layout_word(word, line, fonts, self.anchor.y_actual, self.dynamic_width)?;
        self.visual_coords = word.visual_coords;
        self.small_caps = word.small_caps;
        self.visible = true;
        Ok(())
    }

    pub fn text(&self) -> String {
        self.layout.chars.iter().collect()
    }

    pub fn width(&self) -> f64 {
        self.layout.width
    }

    /// Interactive box, page-local.
    pub fn bounds(&self) -> Bbox {
        Bbox::new(
            self.x,
            self.layout.y,
            self.x + self.layout.width,
            self.layout.y + self.layout.font_size * HEIGHT_RATIO,
        )
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Character index for a click at page-local `x`.
    pub fn cursor_index(&self, x: f64) -> usize {
        self.layout.cursor_index(x - self.x)
    }

    /// Canvas font string for drawing at `font_size`.
    pub fn font_string(&self, font_size: f64) -> String {
        let face = &self.layout.face;
        format!(
            "{} {} {}px {}",
            face.face_style, face.face_weight, font_size, face.face_name
        )
    }

    /// Glyph positions and decorations in word-local coordinates.
    ///
    /// `scale` is the stage scale, so strokes stay 2 screen px wide.
    pub fn draw(&self, scale: f64) -> WordDrawing {
        let size = self.layout.font_size;
        let small_size = size * self.layout.face.small_caps_mult;
        let baseline = size * HEIGHT_RATIO;

        let mut left = self.layout.draw_origin(self.visual_coords);
        let mut glyphs = Vec::with_capacity(self.layout.chars.len());
        for (i, &c) in self.layout.chars.iter().enumerate() {
            let (ch, font) = if self.small_caps && c.is_lowercase() {
                let upper = c.to_uppercase().next().unwrap_or(c);
                (upper, self.font_string(small_size))
            } else {
                (c, self.font_string(size))
            };
            glyphs.push(DrawnGlyph {
                ch,
                x: left,
                y: baseline,
                font,
            });
            left += self.layout.advance_total.get(i).copied().unwrap_or(0.0);
        }

        let stroke_width = 2.0 / scale;
        let stroke = if self.selected {
            Some((Color::SELECTION, stroke_width))
        } else if self.outline {
            Some((Color::BLACK, stroke_width))
        } else {
            None
        };
        let fill_box = self.fill_box.then(|| {
            (
                Rect::new(0.0, 0.0, self.layout.width, baseline),
                Color::from_hex(FILL_BOX_HEX).unwrap_or(Color::SELECTION),
            )
        });

        WordDrawing {
            glyphs,
            fill: self.fill,
            opacity: self.opacity,
            stroke,
            fill_box,
        }
    }

    /// Record the box before an interactive resize.
    pub fn begin_transform(&mut self) {
        self.last_x = self.x;
        self.last_width = self.layout.width;
    }

    /// Decide which edge a resize to (`new_x`, `new_width`) moved.
    ///
    /// The left edge counts as moved when it travelled further than half of
    /// the width change.
    pub fn end_transform(&self, new_x: f64, new_width: f64) -> ResizeEdge {
        let left_delta = new_x - self.last_x;
        let width_delta = new_width - self.last_width;
        if left_delta.abs() > (width_delta / 2.0).abs() {
            ResizeEdge::Left(left_delta)
        } else {
            ResizeEdge::Right(width_delta)
        }
    }

    /// Element that reproduces this word on screen.
    ///
    /// `origin` is the screen position of the box's top-left corner,
    /// `scale` the stage scale and `rotation` the absolute rotation.
    pub fn to_element(&self, origin: Point, scale: f64, rotation: f64) -> TextElement {
        let face = &self.layout.face;
        let font_size = self.layout.font_size * scale;
        let mut left = origin.x;
        if self.visual_coords {
            left -= self.layout.left_side_bearing * scale;
        }

        let ascent = face.ascender_px(font_size);
        let descent = -face.descender_px(font_size);
        let top = origin.y - ascent + font_size * HEIGHT_RATIO;

        let text = self.text();
        let spans = if self.small_caps {
            small_caps_spans(&text, font_size, font_size * face.small_caps_mult)
        } else {
            vec![TextSpan { text, font_size }]
        };

        TextElement {
            id: self.word_id.clone(),
            spans,
            uppercase: self.small_caps,
            left: left - ELEMENT_PADDING,
            top,
            padding: ELEMENT_PADDING,
            font_size,
            font_family: face.face_name.clone(),
            font_style: face.face_style.clone(),
            font_weight: face.face_weight,
            letter_spacing: self.layout.char_spacing * scale,
            line_height: ascent + descent,
            rotation: (rotation.abs() > ROTATION_EPSILON).then(|| (rotation, origin.y - top)),
            color: self.fill,
            opacity: self.opacity,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ocr_canvas_core::{Dims, FontFace, FontStyle, FontTable, GlyphMetrics};

    pub(crate) fn fonts() -> FontTable {
        let glyph = GlyphMetrics::new(500.0, 50.0, 50.0, 0.0, 700.0);
        FontTable::new("Serif")
            .with_face(FontFace::uniform("Serif", FontStyle::Normal, 1000.0, glyph))
            .with_face(FontFace::uniform(
                "Serif",
                FontStyle::Bold,
                1000.0,
                GlyphMetrics::new(550.0, 40.0, 40.0, 0.0, 700.0),
            ))
            .with_face(FontFace::uniform("Serif", FontStyle::Italic, 1000.0, glyph))
    }

    pub(crate) fn line_with(words: Vec<OcrWord>) -> OcrLine {
        let bbox = Bbox::union_all(words.iter().map(|w| &w.bbox)).unwrap_or_default();
        OcrLine::new(bbox, [0.0, 0.0], words).with_font_size(20.0)
    }

    fn metrics() -> PageMetrics {
        PageMetrics::new(Dims::new(1000.0, 1400.0), 0.0)
    }

    #[test]
    fn test_fill_opacity_by_display_mode() {
        let mut word = OcrWord::new("w", "text", Bbox::new(0.0, 0.0, 10.0, 10.0));
        word.conf = 90.0;
        let config = ViewerConfig::default();
        let (fill, opacity) = word_fill_opacity(&word, &config);
        assert_eq!(fill, Color::from_hex("#00ff7b").unwrap());
        assert!((opacity - 0.8).abs() < 1e-9);

        word.conf = 80.0;
        assert_eq!(word_fill_opacity(&word, &config).0, Color::from_hex("#ffc800").unwrap());
        word.conf = 10.0;
        assert_eq!(word_fill_opacity(&word, &config).0, Color::from_hex("#ff0000").unwrap());

        let invis = config.clone().with_display_mode(DisplayMode::Invis);
        assert_eq!(word_fill_opacity(&word, &invis), (Color::BLACK, 0.0));
        let ebook = config.clone().with_display_mode(DisplayMode::Ebook);
        assert_eq!(word_fill_opacity(&word, &ebook), (Color::BLACK, 1.0));

        let eval = config.with_display_mode(DisplayMode::Eval);
        word.match_truth = true;
        assert_eq!(word_fill_opacity(&word, &eval).0, Color::from_hex("#00ff7b").unwrap());
    }

    #[test]
    fn test_eval_outline_for_confident_mismatch() {
        let mut word = OcrWord::new("w", "text", Bbox::new(0.0, 0.0, 10.0, 10.0));
        word.conf = 95.0;
        let eval = ViewerConfig::default().with_display_mode(DisplayMode::Eval);
        assert!(WordStyle::for_word(&word, &eval).outline);
        word.match_truth = true;
        assert!(!WordStyle::for_word(&word, &eval).outline);
        assert!(!WordStyle::for_word(&word, &ViewerConfig::default()).outline);
    }

    #[test]
    fn test_draw_advances_glyphs() {
        let word = OcrWord::new("w", "abc", Bbox::new(100.0, 80.0, 130.0, 100.0));
        let line = line_with(vec![word.clone()]);
        let obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();

        let drawing = obj.draw(1.0);
        assert_eq!(drawing.glyphs.len(), 3);
        assert_eq!(drawing.glyphs[0].x, 0.0);
        let expected = obj.layout.advance_total[0];
        assert!((drawing.glyphs[1].x - expected).abs() < 1e-9);
        assert_eq!(drawing.glyphs[0].y, 20.0 * HEIGHT_RATIO);
        assert_eq!(drawing.glyphs[0].font, "normal 400 20px Serif normal");
        assert!(drawing.stroke.is_none());
    }

    #[test]
    fn test_small_caps_draws_shrunk_uppercase() {
        let mut word = OcrWord::new("w", "Ab", Bbox::new(0.0, 0.0, 30.0, 20.0));
        word.small_caps = true;
        let line = line_with(vec![word.clone()]);
        let obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();
        let drawing = obj.draw(1.0);
        assert_eq!(drawing.glyphs[1].ch, 'B');
        assert_eq!(drawing.glyphs[1].font, "normal 400 15px Serif normal");
    }

    #[test]
    fn test_small_caps_element_matches_drawing_for_accents() {
        let mut word = OcrWord::new("w", "Aé", Bbox::new(0.0, 0.0, 30.0, 20.0));
        word.small_caps = true;
        let line = line_with(vec![word.clone()]);
        let obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();

        let drawing = obj.draw(1.0);
        assert_eq!(drawing.glyphs[1].ch, 'É');
        assert_eq!(drawing.glyphs[1].font, "normal 400 15px Serif normal");

        let el = obj.to_element(Point::new(0.0, 0.0), 1.0, 0.0);
        let sizes: Vec<_> = el.spans.iter().map(|s| (s.text.as_str(), s.font_size)).collect();
        assert_eq!(sizes, vec![("A", 20.0), ("é", 15.0)]);
    }

    #[test]
    fn test_selected_stroke_scales_with_stage() {
        let word = OcrWord::new("w", "abc", Bbox::new(0.0, 0.0, 30.0, 20.0));
        let line = line_with(vec![word.clone()]);
        let mut obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();
        obj.select();
        let drawing = obj.draw(2.0);
        assert_eq!(drawing.stroke, Some((Color::SELECTION, 1.0)));
        obj.deselect();
        assert!(obj.draw(2.0).stroke.is_none());
    }

    #[test]
    fn test_resize_edge_detection() {
        let word = OcrWord::new("w", "abc", Bbox::new(100.0, 0.0, 160.0, 20.0));
        let line = line_with(vec![word.clone()]);
        let mut obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();
        obj.begin_transform();
        let x = obj.x;
        let w = obj.width();

        assert_eq!(obj.end_transform(x - 6.0, w + 6.0), ResizeEdge::Left(-6.0));
        assert_eq!(obj.end_transform(x, w + 6.0), ResizeEdge::Right(6.0));
    }

    #[test]
    fn test_update_matches_fresh_build() {
        let mut word = OcrWord::new("w", "abc", Bbox::new(100.0, 80.0, 160.0, 100.0));
        let line = line_with(vec![word.clone()]);
        let mut obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();

        word.text = "abcd".to_string();
        word.bbox.left = 90.0;
        obj.hide();
        obj.update_word_canvas(&word, &line, &metrics(), &fonts()).unwrap();
        let fresh =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();

        assert!(obj.visible);
        assert_eq!(obj.x, fresh.x);
        assert_eq!(obj.layout.width, fresh.layout.width);
        assert_eq!(obj.layout.advance_total, fresh.layout.advance_total);
        assert_eq!(obj.layout.y, fresh.layout.y);
    }

    #[test]
    fn test_small_caps_spans() {
        let spans = small_caps_spans("ABcd-e", 20.0, 15.0);
        let texts: Vec<_> = spans.iter().map(|s| (s.text.as_str(), s.font_size)).collect();
        assert_eq!(
            texts,
            vec![("AB", 20.0), ("cd", 15.0), ("-", 20.0), ("e", 15.0)]
        );

        let spans = small_caps_spans("Aéß", 20.0, 15.0);
        let texts: Vec<_> = spans.iter().map(|s| (s.text.as_str(), s.font_size)).collect();
        assert_eq!(texts, vec![("A", 20.0), ("éß", 15.0)]);
    }

    #[test]
    fn test_element_matches_screen_geometry() {
        let mut word = OcrWord::new("w", "abc", Bbox::new(100.0, 80.0, 160.0, 100.0));
        word.visual_coords = true;
        let line = line_with(vec![word.clone()]);
        let obj =
            WordSceneObject::new(&word, &line, &metrics(), &fonts(), WordStyle::default()).unwrap();

        let el = obj.to_element(Point::new(200.0, 150.0), 2.0, 0.0);
        assert_eq!(el.text(), "abc");
        assert_eq!(el.font_size, 40.0);
        // lsb 50/1000 * 20px * scale 2
        assert!((el.left - (200.0 - 2.0 - ELEMENT_PADDING)).abs() < 1e-9);
        // ascender 0.8em
        assert!((el.top - (150.0 - 32.0 + 24.0)).abs() < 1e-9);
        assert!((el.line_height - 40.0).abs() < 1e-9);
        assert!(el.rotation.is_none());

        let rotated = obj.to_element(Point::new(200.0, 150.0), 2.0, 1.0);
        assert!(rotated.rotation.is_some());
    }
}
