//! Glyph layout: recognized word plus font metrics to drawn geometry.
//!
//! Everything here is a pure function of its inputs. Word objects call
//! [`layout_word`] both when they are created and when an edit forces
//! re-measurement, so an edited word is laid out exactly like a freshly
//! rendered one.
//!
//! Units: font metrics are stored in font units and converted with
//! `font_size / units_per_em`. All outputs are page pixels.

use crate::error::CanvasResult;
use crate::font::{FontFace, FontMetricsProvider};
use crate::geometry::Point;
use crate::model::{OcrLine, OcrWord, PageMetrics};
use std::sync::Arc;

/// Narrowest width a non-visual word box is allowed to shrink to.
pub const MIN_WORD_WIDTH: f64 = 7.0;

/// Word box height as a fraction of the font size.
pub const HEIGHT_RATIO: f64 = 0.6;

/// Raw per-character measurements for a word.
#[derive(Debug, Clone, PartialEq)]
pub struct WordMetrics {
    /// Characters as typed (small caps are not uppercased here)
    pub chars: Vec<char>,
    /// Glyph advance per character
    pub advances: Vec<f64>,
    /// Kerning to the next character (0 for the last)
    pub kerning: Vec<f64>,
    pub left_side_bearing: f64,
    pub right_side_bearing: f64,
    /// Ink width: advances plus kerning, minus both outer bearings
    pub visual_width: f64,
    pub font_size: f64,
}

impl WordMetrics {
    /// Sum of advances and kerning.
    pub fn advance_width(&self) -> f64 {
        self.advances.iter().sum::<f64>() + self.kerning.iter().sum::<f64>()
    }
}

/// Everything a word object needs to draw itself.
#[derive(Debug, Clone, PartialEq)]
pub struct WordLayout {
    pub chars: Vec<char>,

    /// Advance plus kerning plus letter spacing, per character
    pub advance_total: Vec<f64>,

    /// Extra spacing added after every character
    pub char_spacing: f64,

    pub left_side_bearing: f64,
    pub right_side_bearing: f64,
    pub font_size: f64,

    /// Box width in page pixels
    pub width: f64,

    /// Box height in page pixels
    pub height: f64,

    /// Top of the box, derived from the anchor `y_actual`
    pub y: f64,

    pub face: Arc<FontFace>,
}

impl WordLayout {
    /// x offset (relative to the box) at which the first glyph is drawn.
    ///
    /// Visual-coordinate boxes start at the ink, so drawing starts one
    /// bearing to the left.
    pub fn draw_origin(&self, visual_coords: bool) -> f64 {
        if visual_coords {
            -self.left_side_bearing
        } else {
            0.0
        }
    }

    /// Character index the cursor lands on for a click at box-relative `x`.
    ///
    /// A character is chosen while the pointer is in the left 75% of its
    /// advance; the last character uses 50% so the end of the word stays
    /// reachable.
    pub fn cursor_index(&self, x: f64) -> usize {
        let mut left = -self.left_side_bearing;
        let n = self.advance_total.len();
        for (i, advance) in self.advance_total.iter().enumerate() {
            let cutoff_ratio = if i + 1 == n { 0.5 } else { 0.75 };
            if left + advance * cutoff_ratio > x {
                return i;
            }
            left += advance;
        }
        n
    }
}

/// Where a word is anchored on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordAnchor {
    /// Left edge of the word box
    pub visual_left: f64,
    /// y the glyphs are drawn at (baseline, or bbox bottom for sup/drop-cap)
    pub y_actual: f64,
    /// Line baseline at this word, used to align the editor
    pub top_baseline: f64,
}

fn sin_cos(angle_deg: f64) -> (f64, f64) {
    angle_deg.to_radians().sin_cos()
}

/// Offset of a line's start caused by rotating the page around its center.
///
/// Returns zero for unrotated pages or pages with unknown dimensions.
pub fn calc_line_start_angle_adj(line: &OcrLine, metrics: &PageMetrics) -> Point {
    let Some(dims) = metrics.dims else {
        return Point::default();
    };
    if !metrics.is_rotated() {
        return Point::default();
    }
    let (sin, cos) = sin_cos(metrics.angle);

    let shift_x = -sin * (dims.height * 0.5);
    let shift_y = sin * ((dims.width - shift_x) * 0.5);

    let x = line.bbox.left;
    let y = line.baseline_y();
    let x_rot = x * cos - sin * y;
    let adj_x = x - x_rot;
    let adj_y = -sin * (line.bbox.left + adj_x / 2.0);

    Point::new(adj_x + shift_x, adj_y + shift_y)
}

/// Offset of a word relative to its line start on a rotated page.
pub fn calc_word_angle_adj(word: &OcrWord, line: &OcrLine, metrics: &PageMetrics) -> Point {
    if !metrics.is_rotated() {
        return Point::default();
    }
    let (sin, cos) = sin_cos(metrics.angle);
    let x = word.bbox.left - line.bbox.left;

    if word.anchors_to_bbox() {
        let tan = sin / cos;
        let adj_y = (0.0 - x * tan) * cos;
        let adj_x = if metrics.angle > 0.0 { 0.0 } else { adj_y * tan };
        Point::new(-adj_x, adj_y)
    } else {
        Point::new(x / cos - x, 0.0)
    }
}

/// Anchor point for a word: its left edge, draw y, and line baseline.
///
/// Rotation corrections apply only to rotated pages whose word boxes are
/// raw recognizer boxes; visual-coordinate boxes are already aligned.
pub fn anchor_word(word: &OcrWord, line: &OcrLine, metrics: &PageMetrics) -> WordAnchor {
    let (adj_line, adj_word) = if metrics.is_rotated() && !word.visual_coords {
        (
            calc_line_start_angle_adj(line, metrics),
            calc_word_angle_adj(word, line, metrics),
        )
    } else {
        (Point::default(), Point::default())
    };

    let top_baseline = line.baseline_y() + adj_line.y + adj_word.y;
    let y_actual = if word.anchors_to_bbox() {
        word.bbox.bottom + adj_line.y + adj_word.y
    } else {
        top_baseline
    };

    WordAnchor {
        visual_left: word.bbox.left + adj_line.x + adj_word.x,
        y_actual,
        top_baseline,
    }
}

/// Pixel font size for a word.
///
/// An explicit word size wins. Superscripts are sized so the glyph `1` fills
/// the box height and drop-caps so their first glyph does. Everything else
/// uses the line's size, or the line height when the line has none.
pub fn resolve_font_size(word: &OcrWord, line: &OcrLine, face: &FontFace) -> f64 {
    if let Some(size) = word.size {
        return size;
    }

    let sized_glyph = if word.sup {
        Some('1')
    } else if word.dropcap {
        word.text.chars().next()
    } else {
        None
    };
    if let Some(c) = sized_glyph {
        let ink = face.glyph(c).ink_height();
        if ink > 0.0 {
            return word.bbox.height() * face.units_per_em / ink;
        }
    }

    match line.font_size {
        Some(size) => size,
        None => {
            log::debug!(
                "line has no font size, using line height for word {}",
                word.id
            );
            line.bbox.height()
        }
    }
}

/// Measure a word's characters with `face` at `font_size`.
///
/// Small caps draw lowercase letters as uppercase glyphs scaled by the
/// face's small-caps multiplier, and are measured that way.
pub fn calc_word_metrics(word: &OcrWord, face: &FontFace, font_size: f64) -> WordMetrics {
    let chars: Vec<char> = word.text.chars().collect();
    let base_scale = font_size / face.units_per_em;

    let glyph_for = |c: char| -> (char, f64) {
        if word.small_caps && c.is_lowercase() {
            let upper = c.to_uppercase().next().unwrap_or(c);
            (upper, base_scale * face.small_caps_mult)
        } else {
            (c, base_scale)
        }
    };

    let mut advances = Vec::with_capacity(chars.len());
    let mut kerning = Vec::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        let (glyph_char, scale) = glyph_for(c);
        advances.push(face.glyph(glyph_char).advance * scale);
        let kern = match chars.get(i + 1) {
            Some(&next) => face.kerning(glyph_char, glyph_for(next).0) * scale,
            None => 0.0,
        };
        kerning.push(kern);
    }

    let left_side_bearing = chars
        .first()
        .map(|&c| {
            let (g, scale) = glyph_for(c);
            face.glyph(g).lsb * scale
        })
        .unwrap_or(0.0);
    let right_side_bearing = chars
        .last()
        .map(|&c| {
            let (g, scale) = glyph_for(c);
            face.glyph(g).rsb * scale
        })
        .unwrap_or(0.0);

    let mut metrics = WordMetrics {
        chars,
        advances,
        kerning,
        left_side_bearing,
        right_side_bearing,
        visual_width: 0.0,
        font_size,
    };
    metrics.visual_width = metrics.advance_width() - left_side_bearing - right_side_bearing;
    metrics
}

/// Lay out a word for drawing.
///
/// `y_actual` is the anchor from [`anchor_word`]. With `dynamic_width` the
/// box is sized to the text instead of the recognized bbox and no letter
/// spacing is added.
pub fn layout_word(
    word: &OcrWord,
    line: &OcrLine,
    fonts: &dyn FontMetricsProvider,
    y_actual: f64,
    dynamic_width: bool,
) -> CanvasResult<WordLayout> {
    let face = fonts.get_word_font(word)?;
    let font_size = resolve_font_size(word, line, &face);
    let metrics = calc_word_metrics(word, &face, font_size);

    let n = metrics.chars.len();
    let width = if dynamic_width {
        metrics.advance_width()
    } else if word.visual_coords {
        word.bbox.width()
    } else {
        let inner = word.bbox.width() - metrics.left_side_bearing - metrics.right_side_bearing;
        inner.max(MIN_WORD_WIDTH)
    };

    let char_spacing = if dynamic_width || n < 2 {
        0.0
    } else {
        (width - metrics.visual_width) / (n - 1) as f64
    };

    let advance_total = metrics
        .advances
        .iter()
        .zip(&metrics.kerning)
        .map(|(adv, kern)| adv + kern + char_spacing)
        .collect();

    let mut y = y_actual - font_size * HEIGHT_RATIO;
    if !word.visual_coords && word.anchors_to_bbox() {
        y += face.descender_px(font_size);
    }

    Ok(WordLayout {
        chars: metrics.chars,
        advance_total,
        char_spacing,
        left_side_bearing: metrics.left_side_bearing,
        right_side_bearing: metrics.right_side_bearing,
        font_size,
        width,
        height: font_size * HEIGHT_RATIO,
        y,
        face,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontStyle, FontTable, GlyphMetrics};
    use crate::geometry::{Bbox, Dims};
    use rand::Rng;

    fn fonts() -> FontTable {
        let regular = FontFace::uniform(
            "Serif",
            FontStyle::Normal,
            1000.0,
            GlyphMetrics::new(500.0, 50.0, 30.0, 0.0, 700.0),
        )
        .with_glyph('W', GlyphMetrics::new(900.0, 20.0, 20.0, 0.0, 700.0))
        .with_kerning('A', 'V', -80.0);
        let bold = FontFace::uniform(
            "Serif",
            FontStyle::Bold,
            1000.0,
            GlyphMetrics::new(560.0, 40.0, 40.0, 0.0, 700.0),
        );
        FontTable::new("Serif").with_face(regular).with_face(bold)
    }

    fn line_with(word: OcrWord) -> OcrLine {
        OcrLine::new(Bbox::new(0.0, 80.0, 600.0, 110.0), [0.0, -5.0], vec![word])
            .with_font_size(20.0)
    }

    #[test]
    fn test_metrics_apply_kerning() {
        let table = fonts();
        let face = table.get_font("Serif", FontStyle::Normal).unwrap();
        let word = OcrWord::new("w", "AV", Bbox::new(0.0, 0.0, 30.0, 20.0));
        let m = calc_word_metrics(&word, &face, 20.0);

        assert_eq!(m.advances, vec![10.0, 10.0]);
        assert!((m.kerning[0] + 1.6).abs() < 1e-9);
        assert_eq!(m.kerning[1], 0.0);
        assert!((m.left_side_bearing - 1.0).abs() < 1e-9);
        assert!((m.right_side_bearing - 0.6).abs() < 1e-9);
        assert!((m.visual_width - (20.0 - 1.6 - 1.6)).abs() < 1e-9);
    }

    #[test]
    fn test_small_caps_use_scaled_uppercase() {
        let table = fonts();
        let face = table.get_font("Serif", FontStyle::Normal).unwrap();
        let mut word = OcrWord::new("w", "Wa", Bbox::new(0.0, 0.0, 30.0, 20.0));
        word.small_caps = true;
        let m = calc_word_metrics(&word, &face, 20.0);

        assert!((m.advances[0] - 18.0).abs() < 1e-9);
        assert!((m.advances[1] - 10.0 * face.small_caps_mult).abs() < 1e-9);
    }

    #[test]
    fn test_layout_width_subtracts_bearings() {
        let word = OcrWord::new("w", "abc", Bbox::new(100.0, 80.0, 160.0, 105.0));
        let line = line_with(word.clone());
        let layout = layout_word(&word, &line, &fonts(), 105.0, false).unwrap();

        // lsb 1.0 and rsb 0.6 at 20px
        assert!((layout.width - 58.4).abs() < 1e-9);
        assert!((layout.height - 12.0).abs() < 1e-9);
        assert!((layout.y - 93.0).abs() < 1e-9);
    }

    #[test]
    fn test_layout_width_floor() {
        let word = OcrWord::new("w", "i", Bbox::new(0.0, 0.0, 2.0, 20.0));
        let line = line_with(word.clone());
        let layout = layout_word(&word, &line, &fonts(), 20.0, false).unwrap();
        assert_eq!(layout.width, MIN_WORD_WIDTH);
    }

    #[test]
    fn test_visual_coords_width_is_bbox() {
        let mut word = OcrWord::new("w", "abc", Bbox::new(10.0, 0.0, 70.0, 20.0));
        word.visual_coords = true;
        let line = line_with(word.clone());
        let layout = layout_word(&word, &line, &fonts(), 20.0, false).unwrap();
        assert_eq!(layout.width, 60.0);
        assert!((layout.draw_origin(true) + 1.0).abs() < 1e-9);
        assert_eq!(layout.draw_origin(false), 0.0);
    }

    #[test]
    fn test_dynamic_width_has_no_spacing() {
        let word = OcrWord::new("w", "12", Bbox::new(0.0, 0.0, 400.0, 20.0));
        let line = line_with(word.clone());
        let layout = layout_word(&word, &line, &fonts(), 20.0, true).unwrap();
        assert_eq!(layout.char_spacing, 0.0);
        assert_eq!(layout.width, layout.advance_total.iter().sum::<f64>());
    }

    #[test]
    fn test_advances_reconstruct_width() {
        let mut rng = rand::thread_rng();
        let table = fonts();
        for _ in 0..200 {
            let len = rng.gen_range(2..12);
            let text: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'A'..=b'z')))
                .filter(|c| c.is_ascii_alphabetic())
                .collect();
            if text.chars().count() < 2 {
                continue;
            }
            let left = rng.gen_range(0.0..500.0);
            let width = rng.gen_range(40.0..400.0);
            let word = OcrWord::new("w", text, Bbox::new(left, 0.0, left + width, 20.0));
            let line = line_with(word.clone());
            let layout = layout_word(&word, &line, &table, 20.0, false).unwrap();

            let n = layout.advance_total.len();
            let last_glyph_advance = layout.advance_total[n - 1] - layout.char_spacing;
            let drawn: f64 = layout.advance_total[..n - 1].iter().sum::<f64>()
                + last_glyph_advance
                - layout.right_side_bearing
                - layout.left_side_bearing;
            assert!((drawn - layout.width).abs() < 1e-6);
        }
    }

    #[test]
    fn test_font_size_resolution() {
        let table = fonts();
        let face = table.get_font("Serif", FontStyle::Normal).unwrap();
        let mut word = OcrWord::new("w", "2", Bbox::new(0.0, 0.0, 10.0, 14.0));
        let line = line_with(word.clone());

        assert_eq!(resolve_font_size(&word, &line, &face), 20.0);

        word.sup = true;
        assert!((resolve_font_size(&word, &line, &face) - 20.0).abs() < 1e-9);

        word.size = Some(11.0);
        assert_eq!(resolve_font_size(&word, &line, &face), 11.0);

        let mut bare = line.clone();
        bare.font_size = None;
        let plain = OcrWord::new("p", "x", Bbox::new(0.0, 0.0, 10.0, 14.0));
        assert_eq!(resolve_font_size(&plain, &bare, &face), 30.0);
    }

    #[test]
    fn test_superscript_anchor_uses_bbox_and_descender() {
        let mut word = OcrWord::new("w", "1", Bbox::new(100.0, 70.0, 106.0, 84.0));
        word.sup = true;
        let line = line_with(word.clone());
        let metrics = PageMetrics::new(Dims::new(1000.0, 1000.0), 0.0);

        let anchor = anchor_word(&word, &line, &metrics);
        assert_eq!(anchor.y_actual, 84.0);
        assert_eq!(anchor.top_baseline, 105.0);

        let layout = layout_word(&word, &line, &fonts(), anchor.y_actual, false).unwrap();
        let fs = layout.font_size;
        assert!((layout.y - (84.0 - fs * 0.6 - 0.2 * fs)).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_adjusts_raw_boxes_only() {
        let word = OcrWord::new("w", "abc", Bbox::new(300.0, 80.0, 360.0, 105.0));
        let line = line_with(word.clone());
        let rotated = PageMetrics::new(Dims::new(1000.0, 1400.0), 1.5);

        let raw = anchor_word(&word, &line, &rotated);
        assert!(raw.visual_left != 300.0);

        let mut visual = word.clone();
        visual.visual_coords = true;
        let aligned = anchor_word(&visual, &line, &rotated);
        assert_eq!(aligned.visual_left, 300.0);
        assert_eq!(aligned.top_baseline, 105.0);

        let flat = PageMetrics::new(Dims::new(1000.0, 1400.0), 0.04);
        assert_eq!(anchor_word(&word, &line, &flat).visual_left, 300.0);
    }

    #[test]
    fn test_word_angle_adj_grows_with_offset() {
        let word = OcrWord::new("w", "abc", Bbox::new(200.0, 80.0, 260.0, 105.0));
        let line = line_with(word.clone());
        let metrics = PageMetrics::new(Dims::new(1000.0, 1400.0), 2.0);
        let adj = calc_word_angle_adj(&word, &line, &metrics);
        let cos = 2.0_f64.to_radians().cos();
        assert!((adj.x - (200.0 / cos - 200.0)).abs() < 1e-9);
        assert_eq!(adj.y, 0.0);
    }

    #[test]
    fn test_cursor_index_cutoffs() {
        let word = OcrWord::new("w", "abc", Bbox::new(0.0, 0.0, 30.0, 20.0));
        let line = line_with(word.clone());
        let layout = layout_word(&word, &line, &fonts(), 20.0, false).unwrap();
        // lsb 1.0 and no letter spacing: advances of 10 starting at -1
        assert!(layout.char_spacing.abs() < 1e-9);
        assert_eq!(layout.cursor_index(-5.0), 0);
        assert_eq!(layout.cursor_index(7.0), 1);
        assert_eq!(layout.cursor_index(17.0), 2);
        assert_eq!(layout.cursor_index(24.5), 3);
    }
}
