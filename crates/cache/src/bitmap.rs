//! Page background bitmap cache.
//!
//! Decodes run on a [`WorkerPool`]; results come back over a channel and are
//! applied by whichever thread owns the cache. Only that thread touches the
//! cache maps. There is at most one decode in flight per (page, variant): a
//! second request for the same key joins the pending one, raising its
//! priority if it asks for more.
//!
//! A source that failed to decode is not tried again until the page is
//! evicted or the provider hands out a different source for it.

use crate::config::CacheConfig;
use crate::decode::{decode_data_url, DecodedBitmap};
use crate::error::{CacheError, CacheResult};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use ocr_canvas_core::Dims;
use ocr_canvas_scheduler::{
    Job, JobExecutor, JobId, JobPriority, JobScheduler, JobType, WorkerPool, WorkerPoolConfig,
};
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Minimum rotation change (degrees) that moves an already placed image.
pub const ROTATION_UPDATE_EPSILON: f64 = 0.01;

/// Colour mode a source image was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Color,
    Gray,
    Binary,
}

/// Which of the two bitmaps of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageVariant {
    Native,
    Binary,
}

impl ImageVariant {
    /// Variant displayed for a colour mode setting.
    pub fn for_color_mode(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Binary => ImageVariant::Binary,
            ColorMode::Color | ColorMode::Gray => ImageVariant::Native,
        }
    }

    fn is_binary(self) -> bool {
        self == ImageVariant::Binary
    }

    fn from_binary(binary: bool) -> Self {
        if binary {
            ImageVariant::Binary
        } else {
            ImageVariant::Native
        }
    }
}

/// An undecoded page image and how it was produced.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Usually a base64 `data:` URL
    pub src: Arc<str>,
    /// Already rotated to undo the page angle
    pub rotated: bool,
    /// Rendered at twice the page resolution
    pub upscaled: bool,
    pub color_mode: ColorMode,
}

impl SourceImage {
    pub fn new(src: impl Into<Arc<str>>, color_mode: ColorMode) -> Self {
        Self {
            src: src.into(),
            rotated: false,
            upscaled: false,
            color_mode,
        }
    }

    pub fn with_rotated(mut self, rotated: bool) -> Self {
        self.rotated = rotated;
        self
    }

    pub fn with_upscaled(mut self, upscaled: bool) -> Self {
        self.upscaled = upscaled;
        self
    }
}

/// Supplies source images for pages; owned by the import layer.
pub trait ImageProvider {
    fn page_count(&self) -> usize;

    fn get_native(&self, n: usize) -> Option<SourceImage>;

    fn get_binary(&self, n: usize) -> Option<SourceImage>;

    fn get(&self, n: usize, variant: ImageVariant) -> Option<SourceImage> {
        match variant {
            ImageVariant::Native => self.get_native(n),
            ImageVariant::Binary => self.get_binary(n),
        }
    }
}

/// A decoded bitmap with the provenance of its source.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bitmap: Arc<DecodedBitmap>,
    pub rotated: bool,
    pub upscaled: bool,
    pub color_mode: ColorMode,
}

/// Where and how a page bitmap is drawn in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    /// Page centre
    pub x: f64,
    pub y: f64,
    /// Bitmap centre, in bitmap pixels
    pub offset_x: f64,
    pub offset_y: f64,
    /// Degrees
    pub rotation: f64,
    pub scale: f64,
}

impl ImagePlacement {
    pub fn compute(
        entry: &CacheEntry,
        dims: Dims,
        page_start: f64,
        angle: f64,
        auto_rotate: bool,
    ) -> Self {
        Self {
            x: dims.width / 2.0,
            y: page_start + dims.height / 2.0,
            offset_x: entry.bitmap.width as f64 / 2.0,
            offset_y: entry.bitmap.height as f64 / 2.0,
            rotation: image_rotation(entry.rotated, angle, auto_rotate),
            scale: if entry.upscaled { 0.5 } else { 1.0 },
        }
    }

    /// Whether an already drawn image needs its rotation changed.
    pub fn needs_rotation_update(&self, rotation: f64) -> bool {
        (self.rotation - rotation).abs() > ROTATION_UPDATE_EPSILON
    }
}

/// Rotation that makes a bitmap match the displayed text layer.
pub fn image_rotation(source_rotated: bool, angle: f64, auto_rotate: bool) -> f64 {
    match (auto_rotate, source_rotated) {
        (true, false) => -angle,
        (false, true) => angle,
        _ => 0.0,
    }
}

/// Outcome of [`ImageBitmapCache::request`].
#[derive(Debug, Clone)]
pub enum RequestState {
    Ready(CacheEntry),
    Pending(JobId),
}

/// A decode that finished since the last poll.
#[derive(Debug)]
pub enum DecodeEvent {
    Decoded {
        page: usize,
        variant: ImageVariant,
    },
    Failed {
        page: usize,
        variant: ImageVariant,
        error: CacheError,
    },
}

/// Pages touched by one [`render_ahead_behind`](ImageBitmapCache::render_ahead_behind) pass,
/// in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPlan {
    pub ready: Vec<usize>,
    pub pending: Vec<usize>,
    /// Pages left on their placeholder after a failed decode
    pub failed: Vec<usize>,
    pub evicted: Vec<usize>,
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub decodes_started: u64,
    pub decode_failures: u64,
    /// Pages whose bitmaps were dropped for distance
    pub evictions: u64,
    pub cached_bitmaps: usize,
    pub pending_decodes: usize,
    pub failed_sources: usize,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type CacheKey = (usize, ImageVariant);

struct PendingDecode {
    job_id: JobId,
    priority: JobPriority,
    source: SourceImage,
}

struct Completion {
    job_id: JobId,
    page: usize,
    variant: ImageVariant,
    result: CacheResult<DecodedBitmap>,
}

/// Worker-backed cache of decoded page bitmaps.
pub struct ImageBitmapCache {
    config: CacheConfig,
    entries: HashMap<CacheKey, CacheEntry>,
    pending: HashMap<CacheKey, PendingDecode>,
    /// Sources whose decode failed, by key
    failed: HashMap<CacheKey, Arc<str>>,
    scheduler: Arc<JobScheduler>,
    pool: WorkerPool,
    completions: Receiver<Completion>,
    events: Vec<DecodeEvent>,
    stats: CacheStats,
}

impl ImageBitmapCache {
    /// Start the decode workers.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let (sender, completions) = unbounded();
        let scheduler = Arc::new(JobScheduler::new());

        let executor: JobExecutor = Arc::new(move |job: &Job| match &job.job_type {
            JobType::DecodeBitmap {
                page_index,
                binary,
                src,
            } => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| decode_data_url(src)))
                    .unwrap_or_else(|_| Err(CacheError::DecodePanicked(*page_index)));
                let completion = Completion {
                    job_id: job.id,
                    page: *page_index,
                    variant: ImageVariant::from_binary(*binary),
                    result,
                };
                if sender.send(completion).is_err() {
                    log::debug!("cache dropped before page {} finished decoding", page_index);
                }
            }
        });

        let pool_config = WorkerPoolConfig::new(config.num_workers)
            .with_poll_interval(config.poll_interval);
        let pool = WorkerPool::new(scheduler.clone(), executor, pool_config)?;

        Ok(Self {
            config,
            entries: HashMap::new(),
            pending: HashMap::new(),
            failed: HashMap::new(),
            scheduler,
            pool,
            completions,
            events: Vec::new(),
            stats: CacheStats::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Make sure a bitmap for `page` is decoded or decoding.
    ///
    /// A cached bitmap whose colour mode no longer matches the source is
    /// decoded again. A source that already failed to decode is refused with
    /// [`CacheError::DecodeFailed`] and no job is submitted.
    pub fn request(
        &mut self,
        page: usize,
        variant: ImageVariant,
        priority: JobPriority,
        provider: &dyn ImageProvider,
    ) -> CacheResult<RequestState> {
        let key = (page, variant);
        let source = provider
            .get(page, variant)
            .ok_or(CacheError::MissingSource(page))?;

        if let Some(entry) = self.entries.get(&key) {
            if entry.color_mode == source.color_mode {
                self.stats.hits += 1;
                return Ok(RequestState::Ready(entry.clone()));
            }
            log::debug!("colour mode of page {} changed, decoding again", page);
            self.entries.remove(&key);
        }

        if let Some(src) = self.failed.get(&key) {
            if *src == source.src {
                return Err(CacheError::DecodeFailed(page));
            }
            log::debug!("source of page {} changed since its decode failed", page);
            self.failed.remove(&key);
        }

        if let Some(pending) = self.pending.get_mut(&key) {
            if pending.source.color_mode == source.color_mode {
                if priority > pending.priority
                    && self.scheduler.raise_priority(pending.job_id, priority)
                {
                    pending.priority = priority;
                }
                return Ok(RequestState::Pending(pending.job_id));
            }
        }

        self.stats.misses += 1;
        self.stats.decodes_started += 1;
        let job_id = self.scheduler.submit(
            priority,
            JobType::DecodeBitmap {
                page_index: page,
                binary: variant.is_binary(),
                src: source.src.clone(),
            },
        );
        self.pending.insert(
            key,
            PendingDecode {
                job_id,
                priority,
                source,
            },
        );
        Ok(RequestState::Pending(job_id))
    }

    /// Apply finished decodes without blocking.
    pub fn poll_completed(&mut self) -> Vec<DecodeEvent> {
        while let Ok(completion) = self.completions.try_recv() {
            if let Some(event) = self.apply(completion) {
                self.events.push(event);
            }
        }
        std::mem::take(&mut self.events)
    }

    /// Block until the pending decode of `page` finishes.
    ///
    /// Other decodes finishing meanwhile are applied and reported by the
    /// next [`poll_completed`](Self::poll_completed).
    pub fn wait(&mut self, page: usize, variant: ImageVariant) -> CacheResult<CacheEntry> {
        let key = (page, variant);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.clone());
        }
        if self.failed.contains_key(&key) {
            return Err(CacheError::DecodeFailed(page));
        }

        let job_id = self
            .pending
            .get(&key)
            .map(|p| p.job_id)
            .ok_or(CacheError::NotRequested(page))?;
        let deadline = Instant::now() + self.config.wait_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let completion = match self.completions.recv_timeout(remaining) {
                Ok(completion) => completion,
                Err(RecvTimeoutError::Timeout) => return Err(CacheError::WaitTimeout(page)),
                Err(RecvTimeoutError::Disconnected) => return Err(CacheError::Disconnected),
            };

            if completion.job_id != job_id {
                if let Some(event) = self.apply(completion) {
                    self.events.push(event);
                }
                continue;
            }

            return match self.apply(completion) {
                Some(DecodeEvent::Failed { error, .. }) => Err(error),
                _ => self
                    .entries
                    .get(&key)
                    .cloned()
                    .ok_or(CacheError::NotRequested(page)),
            };
        }
    }

    fn apply(&mut self, completion: Completion) -> Option<DecodeEvent> {
        let key = (completion.page, completion.variant);
        let current = self
            .pending
            .get(&key)
            .is_some_and(|p| p.job_id == completion.job_id);
        if !current {
            log::debug!("discarding stale decode of page {}", completion.page);
            return None;
        }
        let pending = self.pending.remove(&key)?;

        match completion.result {
            Ok(bitmap) => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        bitmap: Arc::new(bitmap),
                        rotated: pending.source.rotated,
                        upscaled: pending.source.upscaled,
                        color_mode: pending.source.color_mode,
                    },
                );
                Some(DecodeEvent::Decoded {
                    page: completion.page,
                    variant: completion.variant,
                })
            }
            Err(error) => {
                self.stats.decode_failures += 1;
                log::warn!("failed to decode page {}: {}", completion.page, error);
                self.failed.insert(key, pending.source.src);
                Some(DecodeEvent::Failed {
                    page: completion.page,
                    variant: completion.variant,
                    error,
                })
            }
        }
    }

    /// Request the current page, evict far pages, then request neighbours
    /// nearest first.
    pub fn render_ahead_behind(
        &mut self,
        curr: usize,
        variant: ImageVariant,
        provider: &dyn ImageProvider,
    ) -> RenderPlan {
        let mut plan = RenderPlan::default();
        let page_count = provider.page_count();
        if curr >= page_count {
            log::debug!("page {} out of range for bitmap render", curr);
            return plan;
        }

        self.request_into(curr, variant, JobPriority::Visible, provider, &mut plan);

        let keep = self.config.keep_pages;
        let far: Vec<usize> = self
            .cached_pages()
            .into_iter()
            .filter(|&i| i.abs_diff(curr) > keep)
            .collect();
        for page in far {
            if self.evict(page) {
                plan.evicted.push(page);
            }
        }
        self.failed.retain(|&(page, _), _| page.abs_diff(curr) <= keep);

        for dist in 1..=self.config.render_ahead_pages {
            let after = curr + dist;
            if after < page_count {
                self.request_into(after, variant, JobPriority::Prefetch, provider, &mut plan);
            }
            if let Some(before) = curr.checked_sub(dist) {
                self.request_into(before, variant, JobPriority::Prefetch, provider, &mut plan);
            }
        }

        plan
    }

    fn request_into(
        &mut self,
        page: usize,
        variant: ImageVariant,
        priority: JobPriority,
        provider: &dyn ImageProvider,
        plan: &mut RenderPlan,
    ) {
        match self.request(page, variant, priority, provider) {
            Ok(RequestState::Ready(_)) => plan.ready.push(page),
            Ok(RequestState::Pending(_)) => plan.pending.push(page),
            Err(CacheError::DecodeFailed(_)) => plan.failed.push(page),
            Err(err) => log::debug!("skipping bitmap for page {}: {}", page, err),
        }
    }

    /// Drop both bitmaps of a page and forget any decode in flight or
    /// failed decode.
    ///
    /// The source image stays with the provider. Returns whether a bitmap
    /// or pending decode was dropped.
    pub fn evict(&mut self, page: usize) -> bool {
        let mut removed = false;
        for variant in [ImageVariant::Native, ImageVariant::Binary] {
            removed |= self.entries.remove(&(page, variant)).is_some();
            removed |= self.pending.remove(&(page, variant)).is_some();
            self.failed.remove(&(page, variant));
        }
        if removed {
            self.stats.evictions += 1;
        }
        removed
    }

    pub fn entry(&self, page: usize, variant: ImageVariant) -> Option<&CacheEntry> {
        self.entries.get(&(page, variant))
    }

    pub fn is_pending(&self, page: usize, variant: ImageVariant) -> bool {
        self.pending.contains_key(&(page, variant))
    }

    pub fn has_failed(&self, page: usize, variant: ImageVariant) -> bool {
        self.failed.contains_key(&(page, variant))
    }

    /// Pages with a bitmap cached or decoding, ascending.
    pub fn cached_pages(&self) -> Vec<usize> {
        let pages: BTreeSet<usize> = self
            .entries
            .keys()
            .chain(self.pending.keys())
            .map(|&(page, _)| page)
            .collect();
        pages.into_iter().collect()
    }

    /// Forget every bitmap and queued decode, e.g. when a new document loads.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.failed.clear();
        self.events.clear();
        self.scheduler.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_bitmaps: self.entries.len(),
            pending_decodes: self.pending.len(),
            failed_sources: self.failed.len(),
            ..self.stats
        }
    }

    /// Stop the decode workers and wait for them.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::png_data_url;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::Cell;
    use std::time::Duration;

    struct TestProvider {
        pages: Vec<Option<String>>,
        mode: Cell<ColorMode>,
    }

    impl TestProvider {
        fn new(count: usize) -> Self {
            Self {
                pages: (0..count).map(|i| Some(png_data_url(4 + i as u32, 2))).collect(),
                mode: Cell::new(ColorMode::Color),
            }
        }
    }

    impl ImageProvider for TestProvider {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn get_native(&self, n: usize) -> Option<SourceImage> {
            let src = self.pages.get(n)?.as_deref()?;
            Some(SourceImage::new(src, self.mode.get()).with_upscaled(n % 2 == 1))
        }

        fn get_binary(&self, n: usize) -> Option<SourceImage> {
            self.get_native(n)
        }
    }

    fn test_config() -> CacheConfig {
        CacheConfig::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_wait_timeout(Duration::from_secs(10))
    }

    fn wait_all(cache: &mut ImageBitmapCache, pages: &[usize]) {
        for &page in pages {
            cache.wait(page, ImageVariant::Native).unwrap();
        }
    }

    #[test]
    fn test_request_then_wait() {
        let provider = TestProvider::new(3);
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        let state = cache
            .request(2, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(state, RequestState::Pending(_)));
        assert!(cache.is_pending(2, ImageVariant::Native));

        let entry = cache.wait(2, ImageVariant::Native).unwrap();
        assert_eq!(entry.bitmap.width, 6);
        assert_eq!(entry.bitmap.height, 2);
        assert!(!entry.upscaled);
        assert!(!cache.is_pending(2, ImageVariant::Native));

        let state = cache
            .request(2, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(state, RequestState::Ready(_)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
        cache.shutdown();
    }

    #[test]
    fn test_duplicate_request_joins_pending() {
        let provider = TestProvider::new(1);
        let mut cache = ImageBitmapCache::new(test_config().with_workers(1)).unwrap();

        let first = cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        let second = cache
            .request(0, ImageVariant::Native, JobPriority::Prefetch, &provider)
            .unwrap();
        match (first, second) {
            (RequestState::Pending(a), RequestState::Pending(b)) => assert_eq!(a, b),
            (RequestState::Pending(_), RequestState::Ready(_)) => {
                panic!("second request cannot see a result that was never applied")
            }
            other => panic!("unexpected states {:?}", other),
        }
        assert_eq!(cache.stats().decodes_started, 1);
        cache.shutdown();
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let mut provider = TestProvider::new(2);
        provider.pages[1] = None;
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        let result = cache.request(1, ImageVariant::Native, JobPriority::Visible, &provider);
        assert!(matches!(result, Err(CacheError::MissingSource(1))));
        assert!(matches!(
            cache.wait(1, ImageVariant::Native),
            Err(CacheError::NotRequested(1))
        ));
        cache.shutdown();
    }

    #[test]
    fn test_failed_decode_is_not_cached() {
        let mut provider = TestProvider::new(1);
        provider.pages[0] = Some("data:image/png;base64,aGVsbG8=".to_string());
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(
            cache.wait(0, ImageVariant::Native),
            Err(CacheError::Image(_))
        ));
        assert!(cache.entry(0, ImageVariant::Native).is_none());
        assert_eq!(cache.stats().decode_failures, 1);
        cache.shutdown();
    }

    #[test]
    fn test_failed_page_keeps_placeholder_until_evicted() {
        let mut provider = TestProvider::new(12);
        provider.pages[0] = Some("data:image/png;base64,aGVsbG8=".to_string());
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(cache.wait(0, ImageVariant::Native).is_err());
        assert!(cache.has_failed(0, ImageVariant::Native));

        let plan = cache.render_ahead_behind(0, ImageVariant::Native, &provider);
        assert_eq!(plan.failed, vec![0]);
        assert_eq!(plan.pending, vec![1, 2, 3]);
        assert!(!cache.is_pending(0, ImageVariant::Native));
        assert!(matches!(
            cache.wait(0, ImageVariant::Native),
            Err(CacheError::DecodeFailed(0))
        ));
        assert_eq!(cache.stats().decodes_started, 4);
        assert_eq!(cache.stats().failed_sources, 1);

        // far enough away to forget the failure
        cache.render_ahead_behind(9, ImageVariant::Native, &provider);
        assert!(!cache.has_failed(0, ImageVariant::Native));
        cache.shutdown();
    }

    #[test]
    fn test_new_source_clears_failure() {
        let mut provider = TestProvider::new(1);
        provider.pages[0] = Some("data:image/png;base64,aGVsbG8=".to_string());
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(cache.wait(0, ImageVariant::Native).is_err());
        assert!(matches!(
            cache.request(0, ImageVariant::Native, JobPriority::Visible, &provider),
            Err(CacheError::DecodeFailed(0))
        ));

        provider.pages[0] = Some(png_data_url(5, 5));
        let state = cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(state, RequestState::Pending(_)));
        assert_eq!(cache.wait(0, ImageVariant::Native).unwrap().bitmap.width, 5);
        assert!(!cache.has_failed(0, ImageVariant::Native));
        cache.shutdown();
    }

    #[test]
    fn test_visible_request_raises_queued_prefetch() {
        let provider = TestProvider::new(4);
        // no workers, so every job stays queued
        let mut cache = ImageBitmapCache::new(test_config().with_workers(0)).unwrap();

        cache.render_ahead_behind(1, ImageVariant::Native, &provider);
        let state = cache
            .request(3, ImageVariant::Native, JobPriority::Prefetch, &provider)
            .unwrap();
        let RequestState::Pending(far) = state else {
            panic!("page 3 should be queued");
        };

        let visible = cache.scheduler.next_job().unwrap();
        assert_eq!(visible.job_type.page_index(), 1);
        assert_ne!(cache.scheduler.peek_next_id(), Some(far));

        let state = cache
            .request(3, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(state, RequestState::Pending(id) if id == far));
        assert_eq!(cache.scheduler.peek_next_id(), Some(far));
        assert_eq!(cache.stats().decodes_started, 4);
        cache.shutdown();
    }

    #[test]
    fn test_random_walk_stays_in_window() {
        let provider = TestProvider::new(15);
        let config = test_config();
        let (ahead, keep) = (config.render_ahead_pages, config.keep_pages);
        let mut cache = ImageBitmapCache::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..40 {
            let curr = rng.gen_range(0..15);
            let plan = cache.render_ahead_behind(curr, ImageVariant::Native, &provider);

            let cached = cache.cached_pages();
            assert!(cached.iter().all(|p| p.abs_diff(curr) <= keep));
            for page in (0..15).filter(|p: &usize| p.abs_diff(curr) <= ahead) {
                assert!(cached.contains(&page), "page {} missing near {}", page, curr);
                assert!(plan.ready.contains(&page) || plan.pending.contains(&page));
            }

            if rng.gen_bool(0.3) {
                cache.evict(rng.gen_range(0..15));
            }
            if rng.gen_bool(0.5) {
                cache.poll_completed();
            }
        }
        assert_eq!(cache.stats().decode_failures, 0);
        cache.shutdown();
    }

    #[test]
    fn test_render_ahead_behind_window() {
        let provider = TestProvider::new(12);
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        let plan = cache.render_ahead_behind(0, ImageVariant::Native, &provider);
        assert_eq!(plan.pending, vec![0, 1, 2, 3]);
        assert!(plan.evicted.is_empty());
        wait_all(&mut cache, &plan.pending);

        let plan = cache.render_ahead_behind(9, ImageVariant::Native, &provider);
        assert_eq!(plan.evicted, vec![0, 1, 2, 3]);
        assert_eq!(plan.pending, vec![9, 10, 8, 11, 7, 6]);
        assert!(plan.ready.is_empty());
        wait_all(&mut cache, &plan.pending);

        let plan = cache.render_ahead_behind(8, ImageVariant::Native, &provider);
        assert_eq!(plan.ready, vec![8, 9, 7, 10, 6, 11]);
        assert_eq!(plan.pending, vec![5]);
        assert_eq!(cache.cached_pages(), vec![5, 6, 7, 8, 9, 10, 11]);
        cache.shutdown();
    }

    #[test]
    fn test_color_mode_change_decodes_again() {
        let provider = TestProvider::new(1);
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();

        cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        cache.wait(0, ImageVariant::Native).unwrap();

        provider.mode.set(ColorMode::Gray);
        let state = cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        assert!(matches!(state, RequestState::Pending(_)));
        let entry = cache.wait(0, ImageVariant::Native).unwrap();
        assert_eq!(entry.color_mode, ColorMode::Gray);
        assert_eq!(cache.stats().decodes_started, 2);
        cache.shutdown();
    }

    #[test]
    fn test_evicted_decode_result_is_discarded() {
        let provider = TestProvider::new(2);
        let mut cache = ImageBitmapCache::new(test_config().with_workers(1)).unwrap();

        cache
            .request(0, ImageVariant::Native, JobPriority::Visible, &provider)
            .unwrap();
        cache
            .request(1, ImageVariant::Native, JobPriority::Prefetch, &provider)
            .unwrap();
        assert!(cache.evict(0));

        // one worker: page 0 finishes before page 1
        cache.wait(1, ImageVariant::Native).unwrap();
        assert!(cache.entry(0, ImageVariant::Native).is_none());
        assert!(cache.poll_completed().is_empty());
        assert_eq!(cache.stats().evictions, 1);
        cache.shutdown();
    }

    #[test]
    fn test_poll_reports_decoded_pages() {
        let provider = TestProvider::new(2);
        let mut cache = ImageBitmapCache::new(test_config()).unwrap();
        cache.render_ahead_behind(0, ImageVariant::Native, &provider);

        let mut decoded = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while decoded.len() < 2 && Instant::now() < deadline {
            for event in cache.poll_completed() {
                if let DecodeEvent::Decoded { page, .. } = event {
                    decoded.push(page);
                }
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        decoded.sort_unstable();
        assert_eq!(decoded, vec![0, 1]);
        cache.shutdown();
    }

    #[test]
    fn test_image_rotation_rules() {
        assert_eq!(image_rotation(false, 2.5, true), -2.5);
        assert_eq!(image_rotation(true, 2.5, false), 2.5);
        assert_eq!(image_rotation(true, 2.5, true), 0.0);
        assert_eq!(image_rotation(false, 2.5, false), 0.0);
    }

    #[test]
    fn test_placement_centres_page() {
        let entry = CacheEntry {
            bitmap: Arc::new(DecodedBitmap {
                width: 200,
                height: 300,
                pixels: Vec::new(),
            }),
            rotated: false,
            upscaled: true,
            color_mode: ColorMode::Color,
        };
        let placement = ImagePlacement::compute(&entry, Dims::new(100.0, 150.0), 30.0, 1.0, true);
        assert_eq!(placement.x, 50.0);
        assert_eq!(placement.y, 105.0);
        assert_eq!(placement.offset_x, 100.0);
        assert_eq!(placement.offset_y, 150.0);
        assert_eq!(placement.scale, 0.5);
        assert_eq!(placement.rotation, -1.0);
        assert!(!placement.needs_rotation_update(-1.005));
        assert!(placement.needs_rotation_update(-1.5));
    }
}
