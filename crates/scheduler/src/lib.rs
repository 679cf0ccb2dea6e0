//! Overlay Scheduler Library
//!
//! Priority job queue with cooperative cancellation for per-page background
//! work: building a page's text layout index and serializing a page at
//! export time. A page is always the unit of work, so cancelling never leaves
//! a page half processed.
//!
//! # Example
//!
//! ```
//! use overlay_scheduler::{JobPriority, JobScheduler, JobType};
//!
//! let scheduler = JobScheduler::new();
//! for page_index in 0..3 {
//!     scheduler.submit(JobPriority::Background, JobType::IndexPage { page_index });
//! }
//!
//! // The user scrolled to page 2 before it was indexed.
//! scheduler.prioritize_page(2);
//! assert_eq!(scheduler.next_job().unwrap().job_type.page_index(), 2);
//! ```

mod cancel;
mod priority;
mod scheduler;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
pub use scheduler::{JobScheduler, SchedulerStats};
