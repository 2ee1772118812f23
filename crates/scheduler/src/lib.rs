//! OCR Canvas Scheduler Library
//!
//! Priority job queue and worker pool used to decode page bitmaps off the
//! interaction thread.
//!
//! Jobs are ordered by priority (the visible page first, then look-ahead
//! pages) and run FIFO within each priority level.
//!
//! # Example
//!
//! ```
//! use ocr_canvas_scheduler::{Job, JobExecutor, JobPriority, JobScheduler, JobType, WorkerPool, WorkerPoolConfig};
//! use std::sync::Arc;
//!
//! let scheduler = Arc::new(JobScheduler::new());
//! let executor: JobExecutor = Arc::new(|job: &Job| {
//!     let JobType::DecodeBitmap { page_index, .. } = &job.job_type;
//!     println!("decoding page {}", page_index);
//! });
//!
//! let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2)).unwrap();
//! scheduler.submit(
//!     JobPriority::Visible,
//!     JobType::DecodeBitmap { page_index: 0, binary: false, src: Arc::from("data:,") },
//! );
//! pool.shutdown();
//! ```

mod priority;
mod scheduler;
mod worker;

pub use priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
pub use scheduler::{JobScheduler, SchedulerStats};
pub use worker::{JobExecutor, WorkerPool, WorkerPoolConfig};
