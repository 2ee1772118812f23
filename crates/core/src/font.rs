//! Font-metrics lookup service.
//!
//! The engine never parses font files. It consumes per-glyph advances,
//! bearings and kerning through [`FontMetricsProvider`]; [`FontTable`] is the
//! in-memory implementation, loadable from JSON produced by the font
//! optimization step.

use crate::error::{CanvasError, CanvasResult};
use crate::model::OcrWord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Style variant a word requests from the lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Bold,
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontStyle::Normal => write!(f, "normal"),
            FontStyle::Italic => write!(f, "italic"),
            FontStyle::Bold => write!(f, "bold"),
        }
    }
}

/// Metrics for a single glyph, in font units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlyphMetrics {
    /// Horizontal advance
    pub advance: f64,
    /// Left side bearing
    pub lsb: f64,
    /// Right side bearing
    pub rsb: f64,
    /// Top of the glyph's ink
    pub y_max: f64,
    /// Bottom of the glyph's ink
    pub y_min: f64,
}

impl GlyphMetrics {
    pub fn new(advance: f64, lsb: f64, rsb: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            advance,
            lsb,
            rsb,
            y_max,
            y_min,
        }
    }

    /// Ink height in font units.
    pub fn ink_height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// A resolved font face with everything layout needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFace {
    /// Family name used for lookup
    pub family: String,

    /// Style variant this face serves
    pub style: FontStyle,

    /// Face name passed to the drawing backend
    pub face_name: String,

    /// CSS-like face style (`normal` or `italic`)
    pub face_style: String,

    /// Numeric weight (400 regular, 700 bold)
    pub face_weight: u16,

    /// Size multiplier for synthesized small caps
    pub small_caps_mult: f64,

    pub units_per_em: f64,
    pub ascender: f64,

    /// Descender in font units (negative below the baseline)
    pub descender: f64,

    #[serde(default)]
    pub glyphs: HashMap<char, GlyphMetrics>,

    /// Kerning keyed by the two-character pair string
    #[serde(default)]
    pub kerning: HashMap<String, f64>,

    /// Metrics used for characters the face has no glyph for
    #[serde(default)]
    pub notdef: GlyphMetrics,
}

impl FontFace {
    /// Create an empty face for `family`/`style`.
    ///
    /// The face name, CSS style and weight are derived from the style.
    pub fn new(family: impl Into<String>, style: FontStyle, units_per_em: f64) -> Self {
        let family = family.into();
        let (face_style, face_weight) = match style {
            FontStyle::Normal => ("normal", 400),
            FontStyle::Italic => ("italic", 400),
            FontStyle::Bold => ("normal", 700),
        };
        Self {
            face_name: format!("{} {}", family, style),
            family,
            style,
            face_style: face_style.to_string(),
            face_weight,
            small_caps_mult: 0.75,
            units_per_em,
            ascender: units_per_em * 0.8,
            descender: -units_per_em * 0.2,
            glyphs: HashMap::new(),
            kerning: HashMap::new(),
            notdef: GlyphMetrics::new(units_per_em / 2.0, 0.0, 0.0, 0.0, units_per_em * 0.7),
        }
    }

    /// Face where every printable ASCII glyph shares the same metrics.
    ///
    /// Digits get the full cap height so superscript sizing is well defined.
    pub fn uniform(
        family: impl Into<String>,
        style: FontStyle,
        units_per_em: f64,
        glyph: GlyphMetrics,
    ) -> Self {
        let mut face = Self::new(family, style, units_per_em);
        for c in (b'!'..=b'~').map(char::from) {
            face.glyphs.insert(c, glyph);
        }
        face.glyphs.insert(
            ' ',
            GlyphMetrics::new(glyph.advance, glyph.advance, 0.0, 0.0, 0.0),
        );
        face.notdef = glyph;
        face
    }

    pub fn with_small_caps_mult(mut self, mult: f64) -> Self {
        self.small_caps_mult = mult;
        self
    }

    pub fn with_glyph(mut self, c: char, metrics: GlyphMetrics) -> Self {
        self.glyphs.insert(c, metrics);
        self
    }

    pub fn with_kerning(mut self, left: char, right: char, value: f64) -> Self {
        self.kerning.insert(kerning_key(left, right), value);
        self
    }

    /// Glyph metrics for `c`, falling back to `.notdef`.
    pub fn glyph(&self, c: char) -> &GlyphMetrics {
        self.glyphs.get(&c).unwrap_or(&self.notdef)
    }

    /// Kerning between two characters in font units (0 when absent).
    pub fn kerning(&self, left: char, right: char) -> f64 {
        self.kerning
            .get(&kerning_key(left, right))
            .copied()
            .unwrap_or(0.0)
    }

    /// Descender converted to pixels at `font_size`.
    pub fn descender_px(&self, font_size: f64) -> f64 {
        self.descender / self.units_per_em * font_size
    }

    /// Ascender converted to pixels at `font_size`.
    pub fn ascender_px(&self, font_size: f64) -> f64 {
        self.ascender / self.units_per_em * font_size
    }
}

fn kerning_key(left: char, right: char) -> String {
    let mut key = String::with_capacity(8);
    key.push(left);
    key.push(right);
    key
}

/// Lookup service for font metrics.
pub trait FontMetricsProvider: Send + Sync {
    /// Resolve a face by family and style.
    fn get_font(&self, family: &str, style: FontStyle) -> CanvasResult<Arc<FontFace>>;

    /// Family used for words without an explicit font.
    fn default_family(&self) -> &str;

    /// Resolve the face a word is drawn with.
    fn get_word_font(&self, word: &OcrWord) -> CanvasResult<Arc<FontFace>> {
        let family = word.font.as_deref().unwrap_or_else(|| self.default_family());
        self.get_font(family, word.style)
    }
}

/// In-memory font table keyed by (family, style).
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    faces: HashMap<(String, FontStyle), Arc<FontFace>>,
    default_family: String,
}

impl FontTable {
    pub fn new(default_family: impl Into<String>) -> Self {
        Self {
            faces: HashMap::new(),
            default_family: default_family.into(),
        }
    }

    /// Load a table from a JSON array of faces.
    ///
    /// The first face's family becomes the default family.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let faces: Vec<FontFace> = serde_json::from_str(json)?;
        let default_family = faces.first().map(|f| f.family.clone()).unwrap_or_default();
        let mut table = Self::new(default_family);
        for face in faces {
            table.insert(face);
        }
        Ok(table)
    }

    /// Add or replace a face.
    pub fn insert(&mut self, face: FontFace) {
        self.faces
            .insert((face.family.clone(), face.style), Arc::new(face));
    }

    pub fn with_face(mut self, face: FontFace) -> Self {
        self.insert(face);
        self
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl FontMetricsProvider for FontTable {
    fn get_font(&self, family: &str, style: FontStyle) -> CanvasResult<Arc<FontFace>> {
        self.faces
            .get(&(family.to_string(), style))
            .cloned()
            .ok_or_else(|| CanvasError::FontNotFound {
                family: family.to_string(),
                style,
            })
    }

    fn default_family(&self) -> &str {
        &self.default_family
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bbox;

    fn glyph() -> GlyphMetrics {
        GlyphMetrics::new(500.0, 50.0, 40.0, 0.0, 700.0)
    }

    #[test]
    fn test_style_drives_face_weight() {
        let bold = FontFace::new("Serif", FontStyle::Bold, 1000.0);
        assert_eq!(bold.face_weight, 700);
        assert_eq!(bold.face_style, "normal");
        assert_eq!(bold.face_name, "Serif bold");

        let italic = FontFace::new("Serif", FontStyle::Italic, 1000.0);
        assert_eq!(italic.face_weight, 400);
        assert_eq!(italic.face_style, "italic");
    }

    #[test]
    fn test_glyph_falls_back_to_notdef() {
        let face = FontFace::uniform("Serif", FontStyle::Normal, 1000.0, glyph())
            .with_glyph('W', GlyphMetrics::new(900.0, 10.0, 10.0, 0.0, 700.0));
        assert_eq!(face.glyph('W').advance, 900.0);
        assert_eq!(face.glyph('a').advance, 500.0);
        assert_eq!(face.glyph('\u{4e2d}'), &face.notdef);
    }

    #[test]
    fn test_kerning_lookup() {
        let face = FontFace::uniform("Serif", FontStyle::Normal, 1000.0, glyph())
            .with_kerning('A', 'V', -80.0);
        assert_eq!(face.kerning('A', 'V'), -80.0);
        assert_eq!(face.kerning('V', 'A'), 0.0);
    }

    #[test]
    fn test_table_resolves_word_font() {
        let table = FontTable::new("Serif")
            .with_face(FontFace::uniform("Serif", FontStyle::Normal, 1000.0, glyph()))
            .with_face(FontFace::uniform("Serif", FontStyle::Bold, 1000.0, glyph()));

        let mut word = OcrWord::new("w", "text", Bbox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(table.get_word_font(&word).unwrap().style, FontStyle::Normal);

        word.style = FontStyle::Bold;
        assert_eq!(table.get_word_font(&word).unwrap().face_weight, 700);

        word.style = FontStyle::Italic;
        assert!(matches!(
            table.get_word_font(&word),
            Err(CanvasError::FontNotFound { .. })
        ));
    }

    #[test]
    fn test_table_from_json() {
        let faces = vec![
            FontFace::uniform("Sans", FontStyle::Normal, 2048.0, glyph()),
            FontFace::uniform("Sans", FontStyle::Italic, 2048.0, glyph()),
        ];
        let json = serde_json::to_string(&faces).unwrap();

        let table = FontTable::from_json(&json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.default_family(), "Sans");
        assert_eq!(table.get_font("Sans", FontStyle::Italic).unwrap().units_per_em, 2048.0);
        assert!(FontTable::from_json("not json").is_err());
    }
}
