//! Viewer configuration.
//!
//! Controls how words are styled and which interactions are enabled. Can be
//! created programmatically or read from environment variables.

use ocr_canvas_cache::ConfigError;
use std::time::Duration;

/// How recognized words are drawn over the page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Coloured by confidence, semi-transparent
    #[default]
    Proof,
    /// Fully transparent; only the overlay text is selectable
    Invis,
    /// Opaque black text, background image hidden
    Ebook,
    /// Coloured by ground-truth match
    Eval,
}

impl DisplayMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proof" => Some(Self::Proof),
            "invis" => Some(Self::Invis),
            "ebook" => Some(Self::Ebook),
            "eval" => Some(Self::Eval),
            _ => None,
        }
    }
}

/// Configuration for [`CanvasContext`](crate::CanvasContext).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Quiet period before the text overlay is rebuilt
    pub overlay_delay: Duration,
    /// Build the selectable text overlay at all
    pub enable_overlay: bool,
    /// Allow inline editing of words
    pub enable_editing: bool,
    /// Replace straight quotes with typographic ones on edit commit
    pub smart_quotes: bool,
    /// Draw text unrotated and rotate the image instead
    pub auto_rotate: bool,
    pub display_mode: DisplayMode,
    /// Confidence above which a word is considered reliable
    pub conf_thresh_high: f64,
    /// Confidence above which a word is considered plausible
    pub conf_thresh_med: f64,
    /// Word opacity in percent for the proof display mode
    pub overlay_opacity: f64,
    /// Drag distance (screen px) below which a drag counts as a click
    pub drag_click_threshold: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            overlay_delay: Duration::from_millis(200),
            enable_overlay: true,
            enable_editing: true,
            smart_quotes: true,
            auto_rotate: false,
            display_mode: DisplayMode::Proof,
            conf_thresh_high: 85.0,
            conf_thresh_med: 75.0,
            overlay_opacity: 80.0,
            drag_click_threshold: 10.0,
        }
    }
}

impl ViewerConfig {
    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn with_overlay(mut self, enabled: bool) -> Self {
        self.enable_overlay = enabled;
        self
    }

    pub fn with_overlay_delay(mut self, delay: Duration) -> Self {
        self.overlay_delay = delay;
        self
    }

    pub fn with_editing(mut self, enabled: bool) -> Self {
        self.enable_editing = enabled;
        self
    }

    pub fn with_smart_quotes(mut self, enabled: bool) -> Self {
        self.smart_quotes = enabled;
        self
    }

    pub fn with_auto_rotate(mut self, enabled: bool) -> Self {
        self.auto_rotate = enabled;
        self
    }

    /// Sets both confidence thresholds.
    pub fn with_conf_thresholds(mut self, high: f64, med: f64) -> Self {
        self.conf_thresh_high = high;
        self.conf_thresh_med = med;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OCR_CANVAS_DISPLAY_MODE`: `proof`, `invis`, `ebook` or `eval`
    /// - `OCR_CANVAS_OVERLAY`: `true`/`false`
    /// - `OCR_CANVAS_OVERLAY_DELAY_MS`: overlay debounce (default: 200)
    /// - `OCR_CANVAS_AUTO_ROTATE`: `true`/`false`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OCR_CANVAS_DISPLAY_MODE") {
            config.display_mode = DisplayMode::parse(&val)
                .ok_or_else(|| ConfigError::InvalidValue("OCR_CANVAS_DISPLAY_MODE".to_string()))?;
        }

        if let Ok(val) = std::env::var("OCR_CANVAS_OVERLAY") {
            config.enable_overlay = parse_bool("OCR_CANVAS_OVERLAY", &val)?;
        }

        if let Ok(val) = std::env::var("OCR_CANVAS_OVERLAY_DELAY_MS") {
            let ms = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue("OCR_CANVAS_OVERLAY_DELAY_MS".to_string()))?;
            config.overlay_delay = Duration::from_millis(ms);
        }

        if let Ok(val) = std::env::var("OCR_CANVAS_AUTO_ROTATE") {
            config.auto_rotate = parse_bool("OCR_CANVAS_AUTO_ROTATE", &val)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}
