//! Per-page scene graph
//!
//! A [`PageScene`] owns every object on one page, bottom to top. Original
//! content (the page backdrop) always sits below the user's objects and is
//! never moved, edited, removed or captured in snapshots. Callers refer to
//! objects by [`AnnotationId`] only.

use crate::annotation::{AnnotationId, AnnotationObject, ObjectPatch};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// Ordered capture of a page's user objects with all attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    objects: Vec<AnnotationObject>,
}

impl SceneSnapshot {
    pub fn objects(&self) -> &[AnnotationObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Ordered object list for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageScene {
    page_index: u32,
    objects: Vec<AnnotationObject>,
}

impl PageScene {
    pub fn new(page_index: u32) -> Self {
        Self {
            page_index,
            objects: Vec::new(),
        }
    }

    /// Scene seeded with the page's original content
    pub fn with_backdrop(page_index: u32, backdrop: AnnotationObject) -> Self {
        let mut scene = Self::new(page_index);
        if backdrop.is_original_content() {
            scene.objects.push(backdrop);
        }
        scene
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// Number of leading original-content objects
    fn backdrop_len(&self) -> usize {
        self.objects
            .iter()
            .take_while(|o| o.is_original_content())
            .count()
    }

    fn position_of(&self, id: AnnotationId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    /// Every object, bottom to top, original content included
    pub fn objects(&self) -> &[AnnotationObject] {
        &self.objects
    }

    /// User objects, bottom to top
    pub fn foreground(&self) -> &[AnnotationObject] {
        &self.objects[self.backdrop_len()..]
    }

    pub fn get(&self, id: AnnotationId) -> Option<&AnnotationObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.position_of(id).is_some()
    }

    /// Topmost user object under a point
    pub fn object_at(&self, point: &Point) -> Option<&AnnotationObject> {
        self.foreground()
            .iter()
            .rev()
            .find(|o| o.contains_point(point))
    }

    /// Append an object on top
    ///
    /// A nil or already-used id is replaced with a fresh one. Original
    /// content cannot be added after load.
    pub fn add(&mut self, mut object: AnnotationObject) -> Option<AnnotationId> {
        if object.is_original_content() {
            return None;
        }
        if object.id.is_nil() || self.contains(object.id) {
            object.id = AnnotationId::new_v4();
        }
        object.page_index = self.page_index;
        let id = object.id;
        self.objects.push(object);
        Some(id)
    }

    /// Apply a patch, returning whether anything changed
    pub fn update(&mut self, id: AnnotationId, patch: &ObjectPatch) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) if !object.is_original_content() => patch.apply(object),
            _ => false,
        }
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<AnnotationObject> {
        let index = self.position_of(id)?;
        if self.objects[index].is_original_content() {
            tracing::warn!(page = self.page_index, %id, "refusing to remove original content");
            return None;
        }
        Some(self.objects.remove(index))
    }

    /// Move a user object to `new_index` within the foreground stack
    ///
    /// The index is clamped to the stack. Returns whether the order changed.
    pub fn reorder(&mut self, id: AnnotationId, new_index: usize) -> bool {
        let floor = self.backdrop_len();
        let Some(index) = self.position_of(id) else {
            return false;
        };
        if index < floor {
            return false;
        }
        let target = floor.saturating_add(new_index).min(self.objects.len() - 1);
        if target == index {
            return false;
        }
        let object = self.objects.remove(index);
        self.objects.insert(target, object);
        true
    }

    pub fn bring_to_front(&mut self, id: AnnotationId) -> bool {
        self.reorder(id, usize::MAX)
    }

    pub fn send_to_back(&mut self, id: AnnotationId) -> bool {
        self.reorder(id, 0)
    }

    /// Copy an object on top of the stack, shifted by an offset
    pub fn duplicate(&mut self, id: AnnotationId, dx: f32, dy: f32) -> Option<AnnotationId> {
        let mut copy = self.get(id).filter(|o| !o.is_original_content())?.clone();
        copy.id = AnnotationId::new_v4();
        copy.position = copy.position.offset(dx, dy);
        self.add(copy)
    }

    /// Capture the user objects
    pub fn capture(&self) -> SceneSnapshot {
        SceneSnapshot {
            objects: self.foreground().to_vec(),
        }
    }

    /// Replace the user objects with a snapshot, keeping original content
    pub fn restore(&mut self, snapshot: &SceneSnapshot) {
        let floor = self.backdrop_len();
        self.objects.truncate(floor);
        self.objects.extend(
            snapshot
                .objects
                .iter()
                .filter(|o| !o.is_original_content())
                .cloned(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RasterHandle;
    use crate::geometry::{Rect, Size};

    fn scene_with_backdrop() -> PageScene {
        PageScene::with_backdrop(
            0,
            AnnotationObject::backdrop(0, Size::new(600.0, 800.0), RasterHandle(7)),
        )
    }

    fn rect_at(x: f32) -> AnnotationObject {
        AnnotationObject::rect(0, Rect::new(x, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let mut scene = scene_with_backdrop();
        let a = scene.add(rect_at(0.0)).unwrap();
        let b = scene.add(rect_at(20.0)).unwrap();

        let ids: Vec<_> = scene.foreground().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(scene.objects().len(), 3);
    }

    #[test]
    fn test_add_replaces_nil_and_duplicate_ids() {
        let mut scene = PageScene::new(3);
        let nil = scene.add(rect_at(0.0).with_id(AnnotationId::nil())).unwrap();
        assert!(!nil.is_nil());

        let again = scene.add(rect_at(0.0).with_id(nil)).unwrap();
        assert_ne!(again, nil);
        assert!(scene.foreground().iter().all(|o| o.page_index == 3));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut scene = scene_with_backdrop();
        let patch = ObjectPatch::new().position(Point::new(1.0, 1.0));
        assert!(!scene.update(AnnotationId::new_v4(), &patch));
    }

    #[test]
    fn test_original_content_is_protected() {
        let mut scene = scene_with_backdrop();
        let backdrop_id = scene.objects()[0].id;

        assert!(scene.remove(backdrop_id).is_none());
        assert!(!scene.update(backdrop_id, &ObjectPatch::new().position(Point::new(5.0, 5.0))));
        assert!(!scene.reorder(backdrop_id, 3));
        assert!(scene.duplicate(backdrop_id, 1.0, 1.0).is_none());
        assert!(scene
            .add(AnnotationObject::backdrop(0, Size::new(1.0, 1.0), RasterHandle(1)))
            .is_none());
        assert_eq!(scene.objects()[0].position, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_reorder_stays_above_backdrop() {
        let mut scene = scene_with_backdrop();
        let a = scene.add(rect_at(0.0)).unwrap();
        let b = scene.add(rect_at(20.0)).unwrap();
        let c = scene.add(rect_at(40.0)).unwrap();

        assert!(scene.send_to_back(c));
        let ids: Vec<_> = scene.foreground().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![c, a, b]);
        assert!(scene.objects()[0].is_original_content());

        assert!(scene.bring_to_front(c));
        assert!(!scene.bring_to_front(c));
        assert_eq!(scene.foreground().last().unwrap().id, c);
    }

    #[test]
    fn test_reorder_clamps_large_index() {
        let mut scene = scene_with_backdrop();
        let a = scene.add(rect_at(0.0)).unwrap();
        let b = scene.add(rect_at(20.0)).unwrap();

        assert!(scene.reorder(a, usize::MAX));
        let ids: Vec<_> = scene.foreground().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert!(!scene.reorder(a, usize::MAX));
    }

    #[test]
    fn test_object_at_prefers_topmost() {
        let mut scene = scene_with_backdrop();
        let _below = scene.add(rect_at(0.0)).unwrap();
        let above = scene.add(rect_at(5.0)).unwrap();

        assert_eq!(scene.object_at(&Point::new(7.0, 5.0)).unwrap().id, above);
        assert!(scene.object_at(&Point::new(300.0, 300.0)).is_none());
    }

    #[test]
    fn test_capture_restore_keeps_backdrop() {
        let mut scene = scene_with_backdrop();
        let baseline = scene.capture();
        assert!(baseline.is_empty());

        let id = scene.add(rect_at(0.0)).unwrap();
        let edited = scene.capture();
        scene.restore(&baseline);
        assert_eq!(scene.objects().len(), 1);
        assert!(scene.objects()[0].is_original_content());

        scene.restore(&edited);
        assert_eq!(scene.foreground()[0].id, id);
    }

    #[test]
    fn test_duplicate_offsets_copy() {
        let mut scene = PageScene::new(0);
        let id = scene.add(rect_at(10.0)).unwrap();
        let copy = scene.duplicate(id, 5.0, 5.0).unwrap();

        assert_ne!(copy, id);
        assert_eq!(scene.get(copy).unwrap().position, Point::new(15.0, 5.0));
    }
}
