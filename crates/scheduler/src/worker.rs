//! Decode worker pool.
//!
//! A fixed number of named threads pull jobs from the [`JobScheduler`] and
//! hand them to a [`JobExecutor`]. Workers never see caller state; whatever
//! the executor produces it sends back on its own channel. A panicking
//! executor fails its job and the worker moves on to the next one.

use crate::{Job, JobScheduler};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked by a worker for each job it pulls.
pub type JobExecutor = Arc<dyn Fn(&Job) + Send + Sync>;

/// Pool size and idle behaviour.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,
    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            poll_interval: Duration::from_millis(10),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Fixed-size pool of decode threads.
///
/// Dropping the pool signals shutdown without waiting; call
/// [`shutdown`](Self::shutdown) to join the threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn the workers.
    ///
    /// Fails if a thread cannot be spawned; workers started before the
    /// failure are stopped when the partial pool is dropped.
    pub fn new(
        scheduler: Arc<JobScheduler>,
        executor: JobExecutor,
        config: WorkerPoolConfig,
    ) -> io::Result<Self> {
        let mut pool = Self {
            handles: Vec::with_capacity(config.num_workers),
            stop: Arc::new(AtomicBool::new(false)),
        };

        for index in 0..config.num_workers {
            let scheduler = Arc::clone(&scheduler);
            let executor = Arc::clone(&executor);
            let stop = Arc::clone(&pool.stop);
            let poll = config.poll_interval;
            let handle = thread::Builder::new()
                .name(format!("bitmap-decode-{}", index))
                .spawn(move || decode_loop(&scheduler, &executor, &stop, poll))?;
            pool.handles.push(handle);
        }

        log::debug!("started {} decode workers", pool.handles.len());
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop the workers and wait for them to finish their current job.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("decode").to_string();
            if handle.join().is_err() {
                log::warn!("worker {} panicked", name);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn decode_loop(
    scheduler: &JobScheduler,
    executor: &JobExecutor,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    while !stop.load(Ordering::Acquire) {
        let Some(job) = scheduler.next_job() else {
            thread::sleep(poll_interval);
            continue;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| executor(&job))) {
            Ok(()) => scheduler.complete_job(job.id),
            Err(_) => scheduler.fail_job(job.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobPriority, JobType};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    fn decode(page_index: usize) -> JobType {
        JobType::DecodeBitmap {
            page_index,
            binary: false,
            src: Arc::from("data:,"),
        }
    }

    fn fast(workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig::new(workers).with_poll_interval(Duration::from_millis(1))
    }

    fn wait_until(done: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_default_pool_size() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(fast(4).poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_pool_spawns_and_stops() {
        let scheduler = Arc::new(JobScheduler::new());
        let executor: JobExecutor = Arc::new(|_: &Job| {});

        let pool = WorkerPool::new(scheduler, executor, fast(2)).unwrap();
        assert_eq!(pool.num_workers(), 2);
        assert!(!pool.is_shutting_down());
        pool.shutdown();
    }

    #[test]
    fn test_every_job_runs_once() {
        let scheduler = Arc::new(JobScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let executor: JobExecutor = Arc::new(move |_: &Job| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
        });

        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, fast(2)).unwrap();
        for page in 0..5 {
            scheduler.submit(JobPriority::Prefetch, decode(page));
        }
        wait_until(|| runs.load(Ordering::SeqCst) >= 5);
        pool.shutdown();

        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.stats().jobs_completed, 5);
    }

    #[test]
    fn test_worker_survives_panicking_job() {
        let scheduler = Arc::new(JobScheduler::new());
        scheduler.submit(JobPriority::Visible, decode(0));
        scheduler.submit(JobPriority::Prefetch, decode(1));

        let pages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&pages);
        let executor: JobExecutor = Arc::new(move |job: &Job| {
            let page = job.job_type.page_index();
            if page == 0 {
                panic!("corrupt page {}", page);
            }
            seen.lock().unwrap().push(page);
        });
        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, fast(1)).unwrap();
        wait_until(|| !pages.lock().unwrap().is_empty());
        pool.shutdown();

        assert_eq!(*pages.lock().unwrap(), vec![1]);
        let stats = scheduler.stats();
        assert_eq!((stats.jobs_completed, stats.jobs_failed), (1, 1));
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_raised_job_decoded_before_earlier_prefetch() {
        let scheduler = Arc::new(JobScheduler::new());
        scheduler.submit(JobPriority::Prefetch, decode(1));
        scheduler.submit(JobPriority::Prefetch, decode(2));
        let current = scheduler.submit(JobPriority::Prefetch, decode(3));
        assert!(scheduler.raise_priority(current, JobPriority::Visible));

        let pages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&pages);
        let executor: JobExecutor = Arc::new(move |job: &Job| {
            seen.lock().unwrap().push(job.job_type.page_index());
        });
        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, fast(1)).unwrap();
        wait_until(|| pages.lock().unwrap().len() >= 3);
        pool.shutdown();

        assert_eq!(*pages.lock().unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn test_single_worker_decodes_visible_page_first() {
        let scheduler = Arc::new(JobScheduler::new());
        scheduler.submit(JobPriority::Prefetch, decode(1));
        scheduler.submit(JobPriority::Prefetch, decode(2));
        scheduler.submit(JobPriority::Visible, decode(0));

        let pages = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&pages);
        let executor: JobExecutor = Arc::new(move |job: &Job| {
            seen.lock().unwrap().push(job.job_type.page_index());
        });
        let pool = WorkerPool::new(Arc::clone(&scheduler), executor, fast(1)).unwrap();
        wait_until(|| pages.lock().unwrap().len() >= 3);
        pool.shutdown();

        assert_eq!(*pages.lock().unwrap(), vec![0, 1, 2]);
    }
}
