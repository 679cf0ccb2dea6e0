//! Priority queue for per-page background jobs
//!
//! Jobs run highest priority first and FIFO within a priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Job priority levels
///
/// Higher numeric values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Pages nobody is looking at yet
    Background = 0,

    /// Export of a finished page
    Export = 1,

    /// The page the user is interacting with
    Visible = 2,
}

/// Unique job identifier
pub type JobId = u64;

/// Work that can be scheduled for a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    /// Build the text layout index for a page
    IndexPage { page_index: u32 },

    /// Serialize a page's final scene into drawing instructions
    ExportPage { page_index: u32 },
}

impl JobType {
    /// Page this job operates on
    pub fn page_index(&self) -> u32 {
        match *self {
            JobType::IndexPage { page_index } | JobType::ExportPage { page_index } => page_index,
        }
    }
}

/// A queued job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub priority: JobPriority,
    pub job_type: JobType,

    /// Insertion order, for FIFO within the same priority
    insertion_order: u64,
}

impl Job {
    pub fn new(id: JobId, priority: JobPriority, job_type: JobType, insertion_order: u64) -> Self {
        Self {
            id,
            priority,
            job_type,
            insertion_order,
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Thread-safe priority queue of jobs
pub struct PriorityQueue {
    state: Arc<Mutex<QueueState>>,
}

struct QueueState {
    heap: BinaryHeap<Job>,
    next_job_id: JobId,
    insertion_counter: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_job_id: 1,
                insertion_counter: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a job and return its assigned id
    pub fn push(&self, priority: JobPriority, job_type: JobType) -> JobId {
        let mut state = self.lock();
        let job_id = state.next_job_id;
        state.next_job_id += 1;

        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state
            .heap
            .push(Job::new(job_id, priority, job_type, insertion_order));
        job_id
    }

    pub fn pop(&self) -> Option<Job> {
        self.lock().heap.pop()
    }

    pub fn peek(&self) -> Option<Job> {
        self.lock().heap.peek().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    pub fn clear(&self) {
        self.lock().heap.clear();
    }

    /// Remove all jobs matching a predicate, returning how many were removed
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Job) -> bool,
    {
        let mut state = self.lock();
        let original_len = state.heap.len();
        let remaining: Vec<Job> = state.heap.drain().filter(|job| !predicate(job)).collect();
        state.heap = remaining.into_iter().collect();
        original_len - state.heap.len()
    }

    /// Re-queue a job at a new priority, keeping its id
    ///
    /// Returns `false` if no queued job has that id.
    pub fn reprioritize(&self, job_id: JobId, priority: JobPriority) -> bool {
        let mut state = self.lock();
        let mut jobs: Vec<Job> = state.heap.drain().collect();
        let found = match jobs.iter_mut().find(|job| job.id == job_id) {
            Some(job) => {
                job.priority = priority;
                true
            }
            None => false,
        };
        state.heap = jobs.into_iter().collect();
        found
    }

    /// Snapshot of queued jobs, in arbitrary order
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().heap.iter().cloned().collect()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
