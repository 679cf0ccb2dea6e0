//! Background text indexing
//!
//! Builds the text layout index page by page from an external extraction
//! service. Pages are queued on the job scheduler at background priority;
//! the page the user is looking at can jump the queue. Each page is one
//! job, so cancellation is only observed between pages.

use crate::document::Document;
use crate::error::IndexResult;
use crate::text_layout::{TextLayoutIndex, TextRun};
use overlay_scheduler::{CancellationToken, JobPriority, JobScheduler, JobType};
use std::sync::Arc;

/// Extraction service producing a page's text runs
pub trait TextSource: Send + Sync {
    fn extract(&self, page_index: u32) -> IndexResult<Vec<TextRun>>;
}

/// What happened to one queued page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { page: u32, runs: usize },

    /// Already indexed when its job came up
    Skipped { page: u32 },

    Cancelled { page: u32 },

    /// Extraction failed; the page stays unindexed and searches skip it
    Failed { page: u32 },
}

/// Drives a [`TextSource`] into a [`TextLayoutIndex`]
pub struct IndexBuilder {
    scheduler: JobScheduler,
    index: TextLayoutIndex,
    source: Arc<dyn TextSource>,
}

impl IndexBuilder {
    pub fn new(index: TextLayoutIndex, source: Arc<dyn TextSource>) -> Self {
        Self {
            scheduler: JobScheduler::new(),
            index,
            source,
        }
    }

    /// Builder writing into a document's own index
    pub fn for_document(document: &Document, source: Arc<dyn TextSource>) -> Self {
        Self::new(document.text_index().clone(), source)
    }

    pub fn index(&self) -> &TextLayoutIndex {
        &self.index
    }

    /// Queue every page that is not indexed yet, returning how many
    pub fn enqueue_all(&self) -> usize {
        let queued = (0..self.index.total_pages())
            .filter(|&page| self.enqueue(page, JobPriority::Background))
            .count();
        tracing::debug!(queued, "index pages queued");
        queued
    }

    /// Queue a single page unless it is already indexed
    pub fn enqueue(&self, page_index: u32, priority: JobPriority) -> bool {
        if self.index.is_indexed(page_index) {
            return false;
        }
        self.scheduler
            .submit(priority, JobType::IndexPage { page_index });
        true
    }

    /// Move a page to the front of the queue
    ///
    /// A page that was never queued is queued at the highest priority.
    pub fn prioritize(&self, page_index: u32) -> bool {
        if self.scheduler.prioritize_page(page_index) > 0 {
            return true;
        }
        self.enqueue(page_index, JobPriority::Visible)
    }

    /// Drop a page's queued jobs
    pub fn cancel_page(&self, page_index: u32) -> usize {
        self.scheduler.cancel_page_jobs(page_index)
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending_jobs()
    }

    /// Index the next queued page, if any
    pub fn run_next(&self) -> Option<IndexOutcome> {
        let job = self.scheduler.next_job()?;
        let page = job.job_type.page_index();
        let span = tracing::debug_span!("index_page", page);
        let _enter = span.enter();

        let cancelled = self
            .scheduler
            .get_cancellation_token(job.id)
            .is_some_and(|token| token.is_cancelled());
        let outcome = if cancelled {
            IndexOutcome::Cancelled { page }
        } else if self.index.is_indexed(page) {
            IndexOutcome::Skipped { page }
        } else {
            match self.source.extract(page) {
                Ok(runs) => {
                    let count = runs.len();
                    self.index.insert_page(page, runs);
                    IndexOutcome::Indexed { page, runs: count }
                }
                Err(err) => {
                    tracing::warn!(page, error = %err, "text extraction failed");
                    IndexOutcome::Failed { page }
                }
            }
        };

        self.scheduler.complete_job(job.id);
        Some(outcome)
    }

    /// Work through the queue until it is empty or the token is cancelled
    pub fn run_until_idle(&self, token: &CancellationToken) -> Vec<IndexOutcome> {
        let mut outcomes = Vec::new();
        while !token.is_cancelled() {
            match self.run_next() {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        let stats = self.index.stats();
        tracing::debug!(
            indexed = stats.indexed_pages,
            total = stats.total_pages,
            "indexing idle"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSource;
    use crate::error::IndexError;
    use crate::geometry::{Point, Size};
    use std::sync::Mutex;

    /// One run per page reading "page N"; page 3 always fails
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<u32>>,
    }

    impl TextSource for FakeSource {
        fn extract(&self, page_index: u32) -> IndexResult<Vec<TextRun>> {
            self.calls.lock().unwrap().push(page_index);
            if page_index == 3 {
                return Err(IndexError::Extraction {
                    page: page_index,
                    reason: "corrupt page".to_string(),
                });
            }
            Ok(vec![TextRun::new(
                page_index,
                format!("page {page_index}"),
                Point::new(10.0, 20.0),
                50.0,
                10.0,
            )])
        }
    }

    fn setup(pages: u32) -> (IndexBuilder, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::default());
        let builder = IndexBuilder::new(TextLayoutIndex::new(pages), source.clone());
        (builder, source)
    }

    #[test]
    fn test_indexes_all_pages_in_order() {
        let (builder, source) = setup(3);
        assert_eq!(builder.enqueue_all(), 3);

        let outcomes = builder.run_until_idle(&CancellationToken::new());
        assert_eq!(outcomes.len(), 3);
        assert_eq!(*source.calls.lock().unwrap(), vec![0, 1, 2]);
        assert!(builder.index().stats().is_complete());
    }

    #[test]
    fn test_prioritized_page_runs_first() {
        let (builder, source) = setup(4);
        builder.enqueue_all();
        assert!(builder.prioritize(2));

        assert_eq!(
            builder.run_next(),
            Some(IndexOutcome::Indexed { page: 2, runs: 1 })
        );
        assert_eq!(source.calls.lock().unwrap()[0], 2);
    }

    #[test]
    fn test_failed_page_stays_unindexed() {
        let (builder, _) = setup(4);
        builder.enqueue(3, JobPriority::Background);

        assert_eq!(builder.run_next(), Some(IndexOutcome::Failed { page: 3 }));
        assert!(!builder.index().is_indexed(3));
        assert!(builder.index().search("page", false).is_empty());
    }

    #[test]
    fn test_already_indexed_pages_are_not_queued() {
        let (builder, source) = setup(2);
        builder.index().insert_page(0, Vec::new());

        assert_eq!(builder.enqueue_all(), 1);
        builder.run_until_idle(&CancellationToken::new());
        assert_eq!(*source.calls.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_cancel_page_and_token() {
        let (builder, source) = setup(3);
        builder.enqueue_all();
        assert_eq!(builder.cancel_page(1), 1);

        let token = CancellationToken::new();
        token.cancel();
        assert!(builder.run_until_idle(&token).is_empty());
        assert_eq!(builder.pending(), 2);

        builder.run_until_idle(&CancellationToken::new());
        assert_eq!(*source.calls.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_builds_document_index_from_worker_thread() {
        let document = Document::load(DocumentSource::uniform(3, Size::new(600.0, 800.0))).unwrap();
        let builder = IndexBuilder::for_document(&document, Arc::new(FakeSource::default()));
        builder.enqueue_all();

        std::thread::scope(|scope| {
            scope.spawn(|| builder.run_until_idle(&CancellationToken::new()));
        });

        let hit = document.text_index().hit_test(1, &Point::new(20.0, 15.0));
        assert_eq!(hit.map(|run| run.content), Some("page 1".to_string()));
        assert_eq!(document.text_index().search("page", false).len(), 3);
    }
}
