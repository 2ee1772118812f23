//! Shared decode scheduler.
//!
//! Submission and completion bookkeeping on top of the priority queue.
//! There is no cancellation: a job that is no longer needed runs to
//! completion and the cache discards its result.

use crate::priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters kept by [`JobScheduler`].
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    /// Jobs cleared from the queue before a worker took them
    pub jobs_dropped: u64,
    /// Jobs whose executor panicked
    pub jobs_failed: u64,
    /// Jobs waiting when the snapshot was taken
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Jobs submitted but neither finished nor dropped.
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_dropped - self.jobs_failed
    }
}

/// Queue shared between the cache, which submits, and the workers, which
/// take and complete.
///
/// ```
/// use ocr_canvas_scheduler::{JobScheduler, JobPriority, JobType};
/// use std::sync::Arc;
///
/// let scheduler = JobScheduler::new();
/// let id = scheduler.submit(
///     JobPriority::Visible,
///     JobType::DecodeBitmap { page_index: 0, binary: false, src: Arc::from("data:,") },
/// );
/// let job = scheduler.next_job().unwrap();
/// assert_eq!(job.id, id);
/// scheduler.complete_job(job.id);
/// assert_eq!(scheduler.stats().pending_jobs(), 0);
/// ```
#[derive(Debug, Default)]
pub struct JobScheduler {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    queue: PriorityQueue,
    stats: SchedulerStats,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit(&self, priority: JobPriority, job_type: JobType) -> JobId {
        let page = job_type.page_index();
        let mut inner = self.lock();
        let id = inner.queue.push(priority, job_type);
        inner.stats.jobs_submitted += 1;
        drop(inner);
        log::debug!("queued decode job {} for page {} ({:?})", id, page, priority);
        id
    }

    /// Take the most urgent job.
    pub fn next_job(&self) -> Option<Job> {
        self.lock().queue.pop()
    }

    pub fn complete_job(&self, job_id: JobId) {
        self.lock().stats.jobs_completed += 1;
        log::trace!("decode job {} done", job_id);
    }

    /// Record a job whose executor panicked.
    pub fn fail_job(&self, job_id: JobId) {
        self.lock().stats.jobs_failed += 1;
        log::error!("decode job {} panicked", job_id);
    }

    /// Raise a queued job to `priority`. Returns `false` once a worker has
    /// taken it.
    pub fn raise_priority(&self, job_id: JobId, priority: JobPriority) -> bool {
        let raised = self.lock().queue.raise_priority(job_id, priority);
        if raised {
            log::debug!("decode job {} raised to {:?}", job_id, priority);
        }
        raised
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Id of the job a worker would take next.
    pub fn peek_next_id(&self) -> Option<JobId> {
        self.lock().queue.peek().map(|job| job.id)
    }

    /// Drop every queued job that has not started.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let dropped = inner.queue.clear();
        inner.stats.jobs_dropped += dropped as u64;
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> SchedulerStats {
        let inner = self.lock();
        SchedulerStats {
            queue_size: inner.queue.len(),
            ..inner.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn decode(page_index: usize) -> JobType {
        JobType::DecodeBitmap {
            page_index,
            binary: true,
            src: Arc::from("data:,"),
        }
    }

    #[test]
    fn test_submit_take_complete() {
        let scheduler = JobScheduler::new();
        assert!(scheduler.is_idle());

        let id = scheduler.submit(JobPriority::Visible, decode(0));
        assert_eq!(scheduler.queued(), 1);
        assert_eq!(scheduler.stats().pending_jobs(), 1);

        let job = scheduler.next_job().unwrap();
        assert_eq!(job.id, id);
        assert!(scheduler.is_idle());
        scheduler.complete_job(id);

        let stats = scheduler.stats();
        assert_eq!((stats.jobs_submitted, stats.jobs_completed), (1, 1));
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_visible_page_taken_first() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Prefetch, decode(4));
        let visible = scheduler.submit(JobPriority::Visible, decode(3));

        assert_eq!(scheduler.peek_next_id(), Some(visible));
        assert_eq!(scheduler.next_job().map(|j| j.id), Some(visible));
        assert_eq!(scheduler.next_job().map(|j| j.job_type.page_index()), Some(4));
    }

    #[test]
    fn test_page_becoming_visible_jumps_queue() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Prefetch, decode(5));
        let later = scheduler.submit(JobPriority::Prefetch, decode(6));

        assert!(scheduler.raise_priority(later, JobPriority::Visible));
        assert_eq!(scheduler.peek_next_id(), Some(later));

        let job = scheduler.next_job().unwrap();
        assert_eq!(job.priority, JobPriority::Visible);
        assert!(!scheduler.raise_priority(later, JobPriority::Visible));
    }

    #[test]
    fn test_failed_job_is_not_pending() {
        let scheduler = JobScheduler::new();
        let id = scheduler.submit(JobPriority::Visible, decode(0));
        scheduler.next_job();
        scheduler.fail_job(id);

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.jobs_completed, 0);
        assert_eq!(stats.pending_jobs(), 0);
    }

    #[test]
    fn test_clear_counts_dropped() {
        let scheduler = JobScheduler::new();
        scheduler.submit(JobPriority::Prefetch, decode(1));
        scheduler.submit(JobPriority::Prefetch, decode(2));
        scheduler.clear();

        let stats = scheduler.stats();
        assert_eq!(stats.jobs_dropped, 2);
        assert_eq!(stats.queue_size, 0);
        assert_eq!(stats.pending_jobs(), 0);
    }
}
