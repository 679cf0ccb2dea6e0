//! Per-page undo/redo
//!
//! Each page keeps its own [`PageHistory`]: the last recorded snapshot plus
//! undo and redo stacks of earlier and later snapshots. A checkpoint only
//! records when the scene actually differs from the last snapshot, so no-op
//! edits never grow the undo stack.

use crate::scene::{PageScene, SceneSnapshot};
use std::collections::VecDeque;

/// What a checkpoint did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// The previous state was pushed onto the undo stack
    Recorded,
    /// The scene matched the last snapshot
    Unchanged,
}

/// Undo/redo stacks for one page
#[derive(Debug, Clone)]
pub struct PageHistory {
    /// State the scene had at the last checkpoint, undo or redo.
    /// Starts as the load-time baseline.
    last: SceneSnapshot,
    undo_stack: VecDeque<SceneSnapshot>,
    redo_stack: Vec<SceneSnapshot>,
    limit: usize,
}

impl PageHistory {
    /// Start tracking with the scene's load-time state as baseline
    pub fn new(scene: &PageScene, limit: usize) -> Self {
        Self {
            last: scene.capture(),
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the scene's state after a mutation
    pub fn checkpoint(&mut self, scene: &PageScene) -> CheckpointOutcome {
        let current = scene.capture();
        if current == self.last {
            tracing::debug!(page = scene.page_index(), "checkpoint deduplicated");
            return CheckpointOutcome::Unchanged;
        }

        let previous = std::mem::replace(&mut self.last, current);
        self.undo_stack.push_back(previous);
        if self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();

        tracing::debug!(
            page = scene.page_index(),
            undo_depth = self.undo_stack.len(),
            "checkpoint recorded"
        );
        CheckpointOutcome::Recorded
    }

    /// Restore the previous state. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, scene: &mut PageScene) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push(scene.capture());
        scene.restore(&snapshot);
        self.last = snapshot;

        tracing::debug!(
            page = scene.page_index(),
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "undo"
        );
        true
    }

    /// Re-apply an undone state. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, scene: &mut PageScene) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push_back(scene.capture());
        if self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        scene.restore(&snapshot);
        self.last = snapshot;

        tracing::debug!(
            page = scene.page_index(),
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "redo"
        );
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop both stacks and re-baseline at the scene's current state
    pub fn clear(&mut self, scene: &PageScene) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last = scene.capture();
    }
}
