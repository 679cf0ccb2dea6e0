//! Find and replace over original page text
//!
//! Searching reads the text layout index; replacing never touches the
//! original content. Each replacement masks the matched run with a whiteout
//! and places a new text object carrying the substituted run text on top.

use crate::annotation::{AnnotationObject, TextContent};
use crate::document::Document;
use crate::error::DocumentResult;
use crate::geometry::{Point, Rect};
use crate::text_layout::SearchMatch;
use std::collections::HashMap;

/// Slack when deciding whether a whiteout fully covers a run
const COVER_TOLERANCE: f32 = 0.01;

/// Result of `replace_current`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Replaced; the cursor moved to this match
    Replaced { next: usize },

    /// The last match was replaced, or an earlier call already reached it
    EndOfDocument,

    NoMatches,
}

/// Search session with a current-match cursor
#[derive(Debug, Clone, Default)]
pub struct FindReplace {
    query: String,
    replacement: String,
    case_sensitive: bool,
    matches: Vec<SearchMatch>,
    cursor: usize,
    exhausted: bool,
}

impl FindReplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = replacement.into();
        self
    }

    pub fn set_replacement(&mut self, replacement: impl Into<String>) {
        self.replacement = replacement.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Run a search and reset the cursor, returning the match count
    ///
    /// Runs already hidden under a whiteout are skipped. Pages whose text
    /// has not been indexed yet simply contribute no matches, and so do
    /// indexed pages the document does not have.
    pub fn search(
        &mut self,
        document: &Document,
        query: impl Into<String>,
        case_sensitive: bool,
    ) -> DocumentResult<usize> {
        self.query = query.into();
        self.case_sensitive = case_sensitive;
        self.cursor = 0;
        self.exhausted = false;

        let found = document.text_index().search(&self.query, case_sensitive);
        let mut masks: HashMap<u32, Vec<Rect>> = HashMap::new();
        let mut matches = Vec::with_capacity(found.len());
        let page_count = document.page_count();
        for m in found {
            if m.page_index >= page_count {
                tracing::warn!(page = m.page_index, page_count, "indexed page outside document");
                continue;
            }
            if !masks.contains_key(&m.page_index) {
                let rects = document
                    .foreground(m.page_index)?
                    .iter()
                    .filter(|o| o.is_whiteout())
                    .map(AnnotationObject::bounding_box)
                    .collect();
                masks.insert(m.page_index, rects);
            }
            let run_bounds = m.run.bounds();
            let masked = masks
                .get(&m.page_index)
                .is_some_and(|rects| rects.iter().any(|r| covers(r, &run_bounds)));
            if !masked {
                matches.push(m);
            }
        }

        tracing::debug!(query = %self.query, case_sensitive, matches = matches.len(), "search");
        self.matches = matches;
        Ok(self.matches.len())
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&SearchMatch> {
        self.matches.get(self.cursor)
    }

    /// Move to the next match, wrapping after the last
    pub fn next(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.matches.len();
        self.exhausted = false;
        self.current()
    }

    /// Move to the previous match, wrapping before the first
    pub fn previous(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        self.cursor = self
            .cursor
            .checked_sub(1)
            .unwrap_or(self.matches.len() - 1);
        self.exhausted = false;
        self.current()
    }

    /// Replace the match at the cursor and advance
    pub fn replace_current(&mut self, document: &Document) -> DocumentResult<ReplaceOutcome> {
        if self.matches.is_empty() {
            return Ok(ReplaceOutcome::NoMatches);
        }
        if self.exhausted {
            return Ok(ReplaceOutcome::EndOfDocument);
        }
        let Some(current) = self.matches.get(self.cursor) else {
            return Ok(ReplaceOutcome::EndOfDocument);
        };

        self.substitute(document, current)?;
        if self.cursor + 1 >= self.matches.len() {
            self.exhausted = true;
            return Ok(ReplaceOutcome::EndOfDocument);
        }
        self.cursor += 1;
        Ok(ReplaceOutcome::Replaced { next: self.cursor })
    }

    /// Replace every match in order, then clear the results
    pub fn replace_all(&mut self, document: &Document) -> DocumentResult<usize> {
        let matches = std::mem::take(&mut self.matches);
        for m in &matches {
            self.substitute(document, m)?;
        }
        self.cursor = 0;
        self.exhausted = false;
        tracing::debug!(query = %self.query, replaced = matches.len(), "replace all");
        Ok(matches.len())
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.cursor = 0;
        self.exhausted = false;
    }

    /// Whiteout over the run, then the substituted text on top
    fn substitute(&self, document: &Document, m: &SearchMatch) -> DocumentResult<()> {
        let config = document.config();
        let run = &m.run;
        let top = run.origin.y - run.height;

        let mask = Rect::new(run.origin.x, top, run.width, run.height * config.whiteout_mask_ratio);
        document.add(m.page_index, AnnotationObject::whiteout(m.page_index, mask))?;

        let text = replace_in(&run.content, &self.query, &self.replacement, self.case_sensitive);
        if !text.trim().is_empty() {
            let content = TextContent::new(text, config.default_font_family.clone(), run.height);
            let object = AnnotationObject::text(m.page_index, Point::new(run.origin.x, top), content)
                .with_fill(config.default_text_color);
            document.add(m.page_index, object)?;
        }
        Ok(())
    }
}

/// Replace every occurrence of `query` in `haystack`
pub fn replace_in(haystack: &str, query: &str, replacement: &str, case_sensitive: bool) -> String {
    if query.is_empty() {
        return haystack.to_string();
    }
    if case_sensitive {
        return haystack.replace(query, replacement);
    }

    let query: Vec<char> = query.chars().collect();
    let chars: Vec<char> = haystack.chars().collect();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < chars.len() {
        let is_match = i + query.len() <= chars.len()
            && chars[i..i + query.len()]
                .iter()
                .zip(&query)
                .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()));
        if is_match {
            out.push_str(replacement);
            i += query.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn covers(outer: &Rect, inner: &Rect) -> bool {
    outer.x <= inner.x + COVER_TOLERANCE
        && outer.y <= inner.y + COVER_TOLERANCE
        && outer.right() + COVER_TOLERANCE >= inner.right()
        && outer.bottom() + COVER_TOLERANCE >= inner.bottom()
}
