//! Job scheduler
//!
//! Ties the priority queue to the cancellation registry and keeps
//! lifecycle statistics.

use crate::cancel::{CancellationRegistry, CancellationToken};
use crate::priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Job scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_cancelled: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Jobs that are queued or running
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed)
            .saturating_sub(self.jobs_cancelled)
    }
}

/// Priority scheduler for per-page background work
///
/// # Example
///
/// ```
/// use overlay_scheduler::{JobPriority, JobScheduler, JobType};
///
/// let scheduler = JobScheduler::new();
/// let (job_id, token) =
///     scheduler.submit(JobPriority::Background, JobType::IndexPage { page_index: 0 });
///
/// if let Some(job) = scheduler.next_job() {
///     assert_eq!(job.id, job_id);
///     assert!(!token.is_cancelled());
///     scheduler.complete_job(job.id);
/// }
/// ```
pub struct JobScheduler {
    queue: PriorityQueue,
    stats: Arc<Mutex<SchedulerStats>>,
    cancellation: CancellationRegistry,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            stats: Arc::new(Mutex::new(SchedulerStats::default())),
            cancellation: CancellationRegistry::new(),
        }
    }

    fn stats_mut(&self) -> MutexGuard<'_, SchedulerStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a job and return its id with the token its worker should poll
    pub fn submit(&self, priority: JobPriority, job_type: JobType) -> (JobId, CancellationToken) {
        let job_id = self.queue.push(priority, job_type);
        let token = self.cancellation.register(job_id);
        self.stats_mut().jobs_submitted += 1;

        tracing::trace!(job_id, ?priority, ?job_type, "job submitted");
        (job_id, token)
    }

    /// Take the highest priority job
    ///
    /// Its token stays registered until `complete_job` or `cancel_job`.
    pub fn next_job(&self) -> Option<Job> {
        self.queue.pop()
    }

    pub fn peek_next_job(&self) -> Option<Job> {
        self.queue.peek()
    }

    /// Mark a taken job done. Unknown or already finished ids are ignored.
    pub fn complete_job(&self, job_id: JobId) -> bool {
        let known = self.cancellation.unregister(job_id);
        if known {
            self.stats_mut().jobs_completed += 1;
        } else {
            tracing::trace!(job_id, "completion for unknown job ignored");
        }
        known
    }

    /// Cancel a queued or running job
    ///
    /// Queued jobs are removed outright. Running jobs only see their token
    /// flip and stop at the next page boundary. Returns `true` if the job
    /// was known.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let token_cancelled = self.cancellation.cancel(job_id);
        let removed = self.queue.remove_if(|job| job.id == job_id);

        if removed > 0 {
            self.stats_mut().jobs_cancelled += removed as u64;
            self.cancellation.unregister(job_id);
            true
        } else {
            token_cancelled
        }
    }

    /// Cancel all queued jobs matching a predicate
    pub fn cancel_jobs_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Job) -> bool,
    {
        let job_ids: Vec<JobId> = self
            .queue
            .jobs()
            .into_iter()
            .filter(|job| predicate(job))
            .map(|job| job.id)
            .collect();

        self.cancellation.cancel_many(&job_ids);
        let removed = self.queue.remove_if(predicate);

        if removed > 0 {
            self.stats_mut().jobs_cancelled += removed as u64;
            for job_id in job_ids {
                self.cancellation.unregister(job_id);
            }
        }

        removed
    }

    /// Cancel every queued job touching a page
    pub fn cancel_page_jobs(&self, page_index: u32) -> usize {
        self.cancel_jobs_if(|job| job.job_type.page_index() == page_index)
    }

    /// Promote all queued jobs of a page to `Visible`
    ///
    /// Used when the user scrolls to a page whose index is still pending.
    pub fn prioritize_page(&self, page_index: u32) -> usize {
        self.queue
            .jobs()
            .into_iter()
            .filter(|job| job.job_type.page_index() == page_index)
            .filter(|job| self.queue.reprioritize(job.id, JobPriority::Visible))
            .count()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Cancel and drop everything queued
    pub fn clear(&self) {
        let cancelled = self.queue.len();
        self.cancellation.cancel_all();
        self.queue.clear();

        if cancelled > 0 {
            self.stats_mut().jobs_cancelled += cancelled as u64;
            self.cancellation.clear();
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats_mut().clone();
        stats.queue_size = self.queue.len();
        stats
    }

    pub fn get_cancellation_token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.cancellation.get(job_id)
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
