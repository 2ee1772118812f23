//! Decode jobs and the heap that orders them.
//!
//! The page on screen is decoded before its look-ahead neighbours; among
//! jobs of equal priority the earlier submission runs first, which keeps
//! neighbours nearest-first because the cache submits them in that order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// How urgently a page bitmap is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Look-ahead and look-behind pages
    Prefetch = 0,

    /// The page currently displayed
    Visible = 1,
}

pub type JobId = u64;

/// Work a decode worker can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobType {
    /// Decode a page image from its source string
    DecodeBitmap {
        page_index: usize,
        /// `true` for the binarized variant
        binary: bool,
        /// Source image, usually a `data:` URL
        src: Arc<str>,
    },
}

impl JobType {
    /// Page the job belongs to.
    pub fn page_index(&self) -> usize {
        match self {
            JobType::DecodeBitmap { page_index, .. } => *page_index,
        }
    }
}

/// A queued decode.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub priority: JobPriority,
    pub job_type: JobType,
    /// Submission sequence number
    seq: u64,
}

impl Job {
    fn rank(&self) -> (JobPriority, std::cmp::Reverse<u64>) {
        (self.priority, std::cmp::Reverse(self.seq))
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl Ord for Job {
    // The heap pops the greatest job: highest priority, then lowest seq.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap of jobs with id assignment.
///
/// Not synchronized; [`JobScheduler`](crate::JobScheduler) owns one behind
/// its lock.
#[derive(Debug)]
pub struct PriorityQueue {
    heap: BinaryHeap<Job>,
    last_id: JobId,
    seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            last_id: 0,
            seq: 0,
        }
    }

    /// Queue `job_type` and return the id it was given. Ids start at 1.
    pub fn push(&mut self, priority: JobPriority, job_type: JobType) -> JobId {
        self.last_id += 1;
        self.seq += 1;
        let job = Job {
            id: self.last_id,
            priority,
            job_type,
            seq: self.seq,
        };
        self.heap.push(job);
        self.last_id
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&Job> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Move a queued job up to `priority`, keeping its submission order
    /// among jobs of that priority.
    ///
    /// Returns `false` if the job is no longer queued or already ranks at
    /// least that high.
    pub fn raise_priority(&mut self, id: JobId, priority: JobPriority) -> bool {
        let mut jobs = std::mem::take(&mut self.heap).into_vec();
        let raised = match jobs.iter_mut().find(|job| job.id == id) {
            Some(job) if job.priority < priority => {
                job.priority = priority;
                true
            }
            _ => false,
        };
        self.heap = BinaryHeap::from(jobs);
        raised
    }

    /// Drop every queued job, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.heap.len();
        self.heap.clear();
        dropped
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
