//! Cache configuration for the page bitmap cache.
//!
//! Configuration can be loaded from a file, environment variables, or created
//! programmatically.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Configuration for [`ImageBitmapCache`](crate::ImageBitmapCache).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Pages decoded ahead of and behind the current page
    pub render_ahead_pages: usize,
    /// Pages whose decoded bitmaps survive eviction around the current page
    pub keep_pages: usize,
    /// Decode worker threads
    pub num_workers: usize,
    /// Idle worker poll interval
    pub poll_interval: Duration,
    /// Upper bound for a blocking wait on one decode
    pub wait_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            render_ahead_pages: 3,
            keep_pages: 5,
            num_workers: 3,
            poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    pub fn new(render_ahead_pages: usize, keep_pages: usize, num_workers: usize) -> Self {
        Self {
            render_ahead_pages,
            keep_pages,
            num_workers,
            ..Self::default()
        }
        .clamped()
    }

    /// Sets the look-ahead window, growing the keep window to match.
    pub fn with_render_ahead(mut self, pages: usize) -> Self {
        self.render_ahead_pages = pages;
        self.clamped()
    }

    /// Sets the keep window; never smaller than the look-ahead window.
    pub fn with_keep_pages(mut self, pages: usize) -> Self {
        self.keep_pages = pages;
        self.clamped()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    fn clamped(mut self) -> Self {
        if self.keep_pages < self.render_ahead_pages {
            self.keep_pages = self.render_ahead_pages;
        }
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OCR_CANVAS_RENDER_AHEAD`: look-ahead pages (default: 3)
    /// - `OCR_CANVAS_KEEP_PAGES`: keep window (default: 5)
    /// - `OCR_CANVAS_DECODE_WORKERS`: decode threads (default: 3)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OCR_CANVAS_RENDER_AHEAD") {
            config.render_ahead_pages = parse_count("OCR_CANVAS_RENDER_AHEAD", &val)?;
        }

        if let Ok(val) = std::env::var("OCR_CANVAS_KEEP_PAGES") {
            config.keep_pages = parse_count("OCR_CANVAS_KEEP_PAGES", &val)?;
        }

        if let Ok(val) = std::env::var("OCR_CANVAS_DECODE_WORKERS") {
            config.num_workers = parse_count("OCR_CANVAS_DECODE_WORKERS", &val)?;
        }

        Ok(config.clamped())
    }

    /// Loads configuration from a flat `key = value` file.
    ///
    /// Expected file format:
    /// ```text
    /// render_ahead_pages = 3
    /// keep_pages = 5
    /// num_workers = 3
    /// poll_interval_ms = 10
    /// wait_timeout_ms = 30000
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "render_ahead_pages" => config.render_ahead_pages = parse_count(key, value)?,
                    "keep_pages" => config.keep_pages = parse_count(key, value)?,
                    "num_workers" => config.num_workers = parse_count(key, value)?,
                    "poll_interval_ms" => {
                        config.poll_interval = Duration::from_millis(parse_count(key, value)? as u64)
                    }
                    "wait_timeout_ms" => {
                        config.wait_timeout = Duration::from_millis(parse_count(key, value)? as u64)
                    }
                    _ => log::debug!("ignoring unknown cache config key {}", key),
                }
            }
        }

        Ok(config.clamped())
    }

    /// Saves configuration in the format read by [`from_file`](Self::from_file).
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_file_format()).map_err(ConfigError::IoError)
    }

    fn to_file_format(&self) -> String {
        format!(
            "# OCR canvas bitmap cache\n\
             render_ahead_pages = {}\n\
             keep_pages = {}\n\
             num_workers = {}\n\
             poll_interval_ms = {}\n\
             wait_timeout_ms = {}\n",
            self.render_ahead_pages,
            self.keep_pages,
            self.num_workers,
            self.poll_interval.as_millis(),
            self.wait_timeout.as_millis(),
        )
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    IoError(io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(key) => {
                write!(f, "Invalid value for configuration key: {}", key)
            }
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 3] = [
        "OCR_CANVAS_RENDER_AHEAD",
        "OCR_CANVAS_KEEP_PAGES",
        "OCR_CANVAS_DECODE_WORKERS",
    ];

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.render_ahead_pages, 3);
        assert_eq!(config.keep_pages, 5);
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.wait_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_keep_never_below_ahead() {
        let config = CacheConfig::new(6, 2, 1);
        assert_eq!(config.keep_pages, 6);

        let config = CacheConfig::default().with_render_ahead(8);
        assert_eq!(config.keep_pages, 8);

        let config = CacheConfig::default().with_keep_pages(1);
        assert_eq!(config.keep_pages, 3);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&VARS);

        env::set_var("OCR_CANVAS_RENDER_AHEAD", "2");
        env::set_var("OCR_CANVAS_KEEP_PAGES", "4");
        env::set_var("OCR_CANVAS_DECODE_WORKERS", "1");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.render_ahead_pages, 2);
        assert_eq!(config.keep_pages, 4);
        assert_eq!(config.num_workers, 1);
    }

    #[test]
    #[serial]
    fn test_from_env_partial_clamps() {
        let _guard = EnvGuard::new(&VARS);

        env::remove_var("OCR_CANVAS_KEEP_PAGES");
        env::remove_var("OCR_CANVAS_DECODE_WORKERS");
        env::set_var("OCR_CANVAS_RENDER_AHEAD", "7");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.render_ahead_pages, 7);
        assert_eq!(config.keep_pages, 7);
        assert_eq!(config.num_workers, 3);
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&VARS);

        env::set_var("OCR_CANVAS_KEEP_PAGES", "lots");
        let result = CacheConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "OCR_CANVAS_KEEP_PAGES"));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_parse_file_format() {
        let config = CacheConfig::parse(
            "# comment\n\
             render_ahead_pages = 1\n\
             keep_pages = \"2\"\n\
             wait_timeout_ms = 500\n\
             unknown = 9\n",
        )
        .unwrap();
        assert_eq!(config.render_ahead_pages, 1);
        assert_eq!(config.keep_pages, 2);
        assert_eq!(config.wait_timeout, Duration::from_millis(500));
        assert_eq!(config.num_workers, 3);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = env::temp_dir().join(format!("ocr-canvas-cache-{}.conf", std::process::id()));
        let config = CacheConfig::new(2, 9, 4).with_poll_interval(Duration::from_millis(25));

        config.save_to_file(&path).unwrap();
        let loaded = CacheConfig::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_from_file_missing() {
        let result = CacheConfig::from_file("/nonexistent/ocr-canvas/cache.conf");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
