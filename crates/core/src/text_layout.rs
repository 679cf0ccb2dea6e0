//! Text layout index
//!
//! Positioned text runs extracted from the original document, per page, for
//! hit-testing clicks against existing text and for search. Pages can be
//! indexed in any order and at any time; queries against a page that has
//! not been indexed yet simply find nothing.

use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// An immutable span of original text
///
/// `origin` is the left end of the baseline in top-down page space, so the
/// run's box extends upward from it by `height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub page_index: u32,
    pub content: String,
    pub origin: Point,
    pub width: f32,

    /// Roughly the font size
    pub height: f32,
}

impl TextRun {
    pub fn new(page_index: u32, content: impl Into<String>, origin: Point, width: f32, height: f32) -> Self {
        Self {
            page_index,
            content: content.into(),
            origin,
            width,
            height,
        }
    }

    /// `[x, x + width] × [y - height, y]`
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y - self.height,
            self.width,
            self.height,
        )
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        self.bounds().contains_point(point)
    }

    pub fn matches(&self, query: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.content.contains(query)
        } else {
            self.content.to_lowercase().contains(&query.to_lowercase())
        }
    }
}

/// Runs of one page in reading order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTextLayout {
    pub page_index: u32,
    pub runs: Vec<TextRun>,
}

impl PageTextLayout {
    pub fn new(page_index: u32, runs: Vec<TextRun>) -> Self {
        Self { page_index, runs }
    }

    /// First run whose box contains the point
    pub fn hit_test(&self, point: &Point) -> Option<&TextRun> {
        self.runs.iter().find(|run| run.contains_point(point))
    }

    /// Runs joined with newlines
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A run containing a search query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub page_index: u32,

    /// Position of the run in its page
    pub run_index: usize,
    pub run: TextRun,

    /// Position in the full match list
    pub match_index: usize,
}

/// Coverage of the index over the document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub total_pages: u32,
    pub indexed_pages: usize,
    pub total_runs: usize,
}

impl IndexStats {
    pub fn is_complete(&self) -> bool {
        self.indexed_pages == self.total_pages as usize
    }

    pub fn coverage_percent(&self) -> f32 {
        if self.total_pages == 0 {
            return 100.0;
        }
        self.indexed_pages as f32 / self.total_pages as f32 * 100.0
    }
}

/// Thread-safe per-page text index for a whole document
///
/// Cloning shares the underlying index.
#[derive(Debug, Clone)]
pub struct TextLayoutIndex {
    pages: Arc<RwLock<HashMap<u32, PageTextLayout>>>,
    total_pages: u32,
}

impl TextLayoutIndex {
    pub fn new(total_pages: u32) -> Self {
        Self {
            pages: Arc::new(RwLock::new(HashMap::new())),
            total_pages,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<u32, PageTextLayout>> {
        self.pages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<u32, PageTextLayout>> {
        self.pages.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a page's runs
    ///
    /// Runs are stamped with the page index and kept in the given order.
    pub fn insert_page(&self, page_index: u32, mut runs: Vec<TextRun>) {
        for run in &mut runs {
            run.page_index = page_index;
        }
        let count = runs.len();
        self.write()
            .insert(page_index, PageTextLayout::new(page_index, runs));
        tracing::debug!(page = page_index, runs = count, "page indexed");
    }

    pub fn is_indexed(&self, page_index: u32) -> bool {
        self.read().contains_key(&page_index)
    }

    /// Indexed pages in ascending order
    pub fn indexed_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.read().keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn runs(&self, page_index: u32) -> Vec<TextRun> {
        self.read()
            .get(&page_index)
            .map(|layout| layout.runs.clone())
            .unwrap_or_default()
    }

    pub fn page_text(&self, page_index: u32) -> Option<String> {
        self.read().get(&page_index).map(PageTextLayout::text)
    }

    /// First run on the page containing the point
    pub fn hit_test(&self, page_index: u32, point: &Point) -> Option<TextRun> {
        self.read()
            .get(&page_index)
            .and_then(|layout| layout.hit_test(point).cloned())
    }

    /// Runs containing `query`, in page order then reading order
    ///
    /// An empty query matches nothing.
    pub fn search(&self, query: &str, case_sensitive: bool) -> Vec<SearchMatch> {
        if query.is_empty() {
            return Vec::new();
        }

        let pages = self.read();
        let mut page_indices: Vec<u32> = pages.keys().copied().collect();
        page_indices.sort_unstable();

        let mut matches = Vec::new();
        for page_index in page_indices {
            let Some(layout) = pages.get(&page_index) else {
                continue;
            };
            for (run_index, run) in layout.runs.iter().enumerate() {
                if run.matches(query, case_sensitive) {
                    matches.push(SearchMatch {
                        page_index,
                        run_index,
                        run: run.clone(),
                        match_index: matches.len(),
                    });
                }
            }
        }
        matches
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn stats(&self) -> IndexStats {
        let pages = self.read();
        IndexStats {
            total_pages: self.total_pages,
            indexed_pages: pages.len(),
            total_runs: pages.values().map(|l| l.runs.len()).sum(),
        }
    }
}
