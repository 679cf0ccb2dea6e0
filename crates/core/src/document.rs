//! Document façade
//!
//! Owns every page's scene and history. Each page's pair sits behind its own
//! mutex, which is the unit of exclusion: edits to one page never wait on
//! another, and export snapshots a page under the same lock its edits take.
//! Every mutation is followed by a history checkpoint on that page.

use crate::annotation::{AnnotationId, AnnotationObject, ObjectPatch, RasterHandle};
use crate::config::EditorConfig;
use crate::error::{DocumentError, DocumentResult, ExportResult};
use crate::geometry::{Point, Size};
use crate::history::{CheckpointOutcome, PageHistory};
use crate::scene::PageScene;
use crate::serializer::{serialize_document, ExportOutput};
use crate::text_layout::{TextLayoutIndex, TextRun};
use overlay_scheduler::CancellationToken;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One page as supplied by the host application
#[derive(Debug, Clone, PartialEq)]
pub struct PageSource {
    pub size: Size,

    /// Backdrop raster, if one was rendered
    pub raster: Option<RasterHandle>,

    /// Extracted runs; `None` leaves the page to be indexed later
    pub text_runs: Option<Vec<TextRun>>,
}

impl PageSource {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            raster: None,
            text_runs: None,
        }
    }

    pub fn with_raster(mut self, raster: RasterHandle) -> Self {
        self.raster = Some(raster);
        self
    }

    pub fn with_text_runs(mut self, runs: Vec<TextRun>) -> Self {
        self.text_runs = Some(runs);
        self
    }
}

/// Everything needed to open a document for editing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSource {
    pub pages: Vec<PageSource>,
}

impl DocumentSource {
    /// Pages of equal size with nothing else attached
    pub fn uniform(page_count: u32, size: Size) -> Self {
        Self {
            pages: (0..page_count).map(|_| PageSource::new(size)).collect(),
        }
    }
}

struct PageEdits {
    scene: PageScene,
    history: PageHistory,
}

struct PageState {
    size: Size,
    edits: Mutex<PageEdits>,
}

/// An open document being annotated
pub struct Document {
    pages: Vec<PageState>,
    text_index: TextLayoutIndex,
    config: EditorConfig,
}

impl Document {
    pub fn load(source: DocumentSource) -> DocumentResult<Self> {
        Self::load_with_config(source, EditorConfig::default())
    }

    pub fn load_with_config(source: DocumentSource, config: EditorConfig) -> DocumentResult<Self> {
        if source.pages.is_empty() {
            return Err(DocumentError::EmptyDocument);
        }

        let page_count = source.pages.len() as u32;
        let text_index = TextLayoutIndex::new(page_count);
        let mut pages = Vec::with_capacity(source.pages.len());

        for (page_index, page) in (0u32..).zip(source.pages) {
            let size = page.size;
            if !(size.width > 0.0 && size.height > 0.0) {
                return Err(DocumentError::InvalidPageSize { page: page_index });
            }

            let scene = match page.raster {
                Some(raster) => PageScene::with_backdrop(
                    page_index,
                    AnnotationObject::backdrop(page_index, size, raster),
                ),
                None => PageScene::new(page_index),
            };
            // Baseline is captured before any user mutation
            let history = PageHistory::new(&scene, config.history_limit);

            if let Some(runs) = page.text_runs {
                text_index.insert_page(page_index, runs);
            }

            pages.push(PageState {
                size,
                edits: Mutex::new(PageEdits { scene, history }),
            });
        }

        tracing::debug!(pages = page_count, "document loaded");
        Ok(Self {
            pages,
            text_index,
            config,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page_size(&self, page: u32) -> DocumentResult<Size> {
        Ok(self.page(page)?.size)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Shared handle to the text index
    pub fn text_index(&self) -> &TextLayoutIndex {
        &self.text_index
    }

    fn page(&self, page: u32) -> DocumentResult<&PageState> {
        self.pages
            .get(page as usize)
            .ok_or(DocumentError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })
    }

    fn lock(&self, page: u32) -> DocumentResult<MutexGuard<'_, PageEdits>> {
        Ok(self
            .page(page)?
            .edits
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Run a mutation on a page's scene, then checkpoint
    fn mutate<T>(&self, page: u32, f: impl FnOnce(&mut PageScene) -> T) -> DocumentResult<T> {
        let mut guard = self.lock(page)?;
        let edits = &mut *guard;
        let result = f(&mut edits.scene);
        edits.history.checkpoint(&edits.scene);
        Ok(result)
    }

    fn read<T>(&self, page: u32, f: impl FnOnce(&PageScene) -> T) -> DocumentResult<T> {
        let guard = self.lock(page)?;
        Ok(f(&guard.scene))
    }

    // Annotation store

    /// Add an object on top of a page, returning its id
    pub fn add(&self, page: u32, object: AnnotationObject) -> DocumentResult<Option<AnnotationId>> {
        let kind = object.kind_tag();
        let id = self.mutate(page, |scene| scene.add(object))?;
        if let Some(id) = id {
            tracing::debug!(page, %id, ?kind, "object added");
        }
        Ok(id)
    }

    /// Apply a patch; unknown ids and no-op patches change nothing
    pub fn update(&self, page: u32, id: AnnotationId, patch: &ObjectPatch) -> DocumentResult<bool> {
        let changed = self.mutate(page, |scene| scene.update(id, patch))?;
        if changed {
            tracing::debug!(page, %id, "object updated");
        }
        Ok(changed)
    }

    pub fn remove(&self, page: u32, id: AnnotationId) -> DocumentResult<Option<AnnotationObject>> {
        let removed = self.mutate(page, |scene| scene.remove(id))?;
        if let Some(object) = &removed {
            tracing::debug!(page, %id, kind = ?object.kind_tag(), "object removed");
        }
        Ok(removed)
    }

    pub fn reorder(&self, page: u32, id: AnnotationId, new_index: usize) -> DocumentResult<bool> {
        let moved = self.mutate(page, |scene| scene.reorder(id, new_index))?;
        if moved {
            tracing::debug!(page, %id, new_index, "object reordered");
        }
        Ok(moved)
    }

    pub fn bring_to_front(&self, page: u32, id: AnnotationId) -> DocumentResult<bool> {
        self.mutate(page, |scene| scene.bring_to_front(id))
    }

    pub fn send_to_back(&self, page: u32, id: AnnotationId) -> DocumentResult<bool> {
        self.mutate(page, |scene| scene.send_to_back(id))
    }

    pub fn duplicate(&self, page: u32, id: AnnotationId, dx: f32, dy: f32) -> DocumentResult<Option<AnnotationId>> {
        let copy = self.mutate(page, |scene| scene.duplicate(id, dx, dy))?;
        if let Some(copy) = copy {
            tracing::debug!(page, source = %id, %copy, "object duplicated");
        }
        Ok(copy)
    }

    pub fn get(&self, page: u32, id: AnnotationId) -> DocumentResult<Option<AnnotationObject>> {
        self.read(page, |scene| scene.get(id).cloned())
    }

    /// Every object on the page, original content included
    pub fn objects(&self, page: u32) -> DocumentResult<Vec<AnnotationObject>> {
        self.read(page, |scene| scene.objects().to_vec())
    }

    /// User objects on the page, bottom to top
    pub fn foreground(&self, page: u32) -> DocumentResult<Vec<AnnotationObject>> {
        self.read(page, |scene| scene.foreground().to_vec())
    }

    pub fn object_at(&self, page: u32, point: &Point) -> DocumentResult<Option<AnnotationObject>> {
        self.read(page, |scene| scene.object_at(point).cloned())
    }

    // History

    pub fn undo(&self, page: u32) -> DocumentResult<bool> {
        let mut guard = self.lock(page)?;
        let edits = &mut *guard;
        Ok(edits.history.undo(&mut edits.scene))
    }

    pub fn redo(&self, page: u32) -> DocumentResult<bool> {
        let mut guard = self.lock(page)?;
        let edits = &mut *guard;
        Ok(edits.history.redo(&mut edits.scene))
    }

    pub fn can_undo(&self, page: u32) -> DocumentResult<bool> {
        Ok(self.lock(page)?.history.can_undo())
    }

    pub fn can_redo(&self, page: u32) -> DocumentResult<bool> {
        Ok(self.lock(page)?.history.can_redo())
    }

    pub fn undo_depth(&self, page: u32) -> DocumentResult<usize> {
        Ok(self.lock(page)?.history.undo_depth())
    }

    pub fn redo_depth(&self, page: u32) -> DocumentResult<usize> {
        Ok(self.lock(page)?.history.redo_depth())
    }

    /// Request a checkpoint without a mutation
    pub fn checkpoint(&self, page: u32) -> DocumentResult<CheckpointOutcome> {
        let mut guard = self.lock(page)?;
        let edits = &mut *guard;
        Ok(edits.history.checkpoint(&edits.scene))
    }

    /// Forget a page's history, keeping its current state as the new baseline
    pub fn clear_history(&self, page: u32) -> DocumentResult<()> {
        let mut guard = self.lock(page)?;
        let edits = &mut *guard;
        edits.history.clear(&edits.scene);
        Ok(())
    }

    // Export

    /// Copy of a page's size and objects, taken under the page lock
    pub fn export_snapshot(&self, page: u32) -> DocumentResult<(Size, Vec<AnnotationObject>)> {
        let size = self.page(page)?.size;
        Ok((size, self.objects(page)?))
    }

    /// Serialize every page
    pub fn export(&self, token: &CancellationToken) -> ExportResult<ExportOutput> {
        serialize_document(self, token)
    }
}
