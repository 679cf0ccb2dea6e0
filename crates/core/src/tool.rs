//! Tool state machine
//!
//! Interprets pointer and keyboard input against the active tool and turns
//! it into store mutations on a [`Document`]. All interaction state lives in
//! [`ToolState`]; objects carry no selectability flags; whether an object
//! reacts to the pointer is computed by [`is_interactive`].
//!
//! Manipulation handles follow the object's rotation. Dragging only updates
//! a preview; the store sees exactly one `update` when the pointer is
//! released.

use crate::annotation::{
    AnnotationId, AnnotationObject, KindTag, ObjectKind, ObjectPatch, Subtype, TextContent,
};
use crate::document::Document;
use crate::error::DocumentResult;
use crate::geometry::{Point, Rect, Scale, Size};

/// Smallest display size a resize may produce
const MIN_DISPLAY_SIZE: f32 = 1.0;

/// Drags shorter than this create a default-sized link
const MIN_LINK_DRAG: f32 = 4.0;

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolMode {
    #[default]
    Select,
    InsertText,
    Whiteout,
    Annotate,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
}

/// Input delivered to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    SetTool(ToolMode),
    PointerDown { page: u32, point: Point },
    PointerMove { page: u32, point: Point },
    PointerUp { page: u32, point: Point },
    Key(Key),
    /// Final text of the object being edited
    CommitText(String),
    /// Attribute change for the selected object
    EditAttributes(ObjectPatch),
}

/// What an input did
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    ToolChanged { from: ToolMode, to: ToolMode },
    Created { page: u32, id: AnnotationId, kind: KindTag },
    Selected { page: u32, id: AnnotationId },
    SelectionCleared,
    EditingStarted { page: u32, id: AnnotationId },
    EditingEnded { page: u32, id: AnnotationId },
    ManipulationStarted { page: u32, id: AnnotationId, handle: HandleType },
    Updated { page: u32, id: AnnotationId },
    Deleted { page: u32, id: AnnotationId },
    DeleteRefused { page: u32, id: AnnotationId },
}

/// Object reference held by the interactive layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub page: u32,
    pub id: AnnotationId,
}

/// Type of manipulation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,

    /// Above the top edge
    Rotate,

    /// The object body
    Move,
}

impl HandleType {
    /// Which local edges a resize handle drags, as (left, top, right, bottom)
    fn edges(self) -> (bool, bool, bool, bool) {
        match self {
            HandleType::TopLeft => (true, true, false, false),
            HandleType::TopRight => (false, true, true, false),
            HandleType::BottomLeft => (true, false, false, true),
            HandleType::BottomRight => (false, false, true, true),
            HandleType::Top => (false, true, false, false),
            HandleType::Bottom => (false, false, false, true),
            HandleType::Left => (true, false, false, false),
            HandleType::Right => (false, false, true, false),
            HandleType::Rotate | HandleType::Move => (false, false, false, false),
        }
    }
}

/// Handle position in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    pub handle_type: HandleType,
    pub position: Point,

    /// Radius of the hit area
    pub size: f32,
    pub annotation_id: AnnotationId,
}

impl ManipulationHandle {
    pub fn hit_test(&self, point: &Point) -> bool {
        point.distance_to(&self.position) <= self.size
    }
}

/// Resize and rotate handles of an object, rotated with it
pub fn generate_handles(
    object: &AnnotationObject,
    handle_size: f32,
    rotation_offset: f32,
) -> Vec<ManipulationHandle> {
    let r = object.local_bounds();
    let cx = r.x + r.width / 2.0;
    let cy = r.y + r.height / 2.0;
    let local = [
        (HandleType::TopLeft, Point::new(r.x, r.y)),
        (HandleType::Top, Point::new(cx, r.y)),
        (HandleType::TopRight, Point::new(r.right(), r.y)),
        (HandleType::Right, Point::new(r.right(), cy)),
        (HandleType::BottomRight, Point::new(r.right(), r.bottom())),
        (HandleType::Bottom, Point::new(cx, r.bottom())),
        (HandleType::BottomLeft, Point::new(r.x, r.bottom())),
        (HandleType::Left, Point::new(r.x, cy)),
        (HandleType::Rotate, Point::new(cx, r.y - rotation_offset)),
    ];

    local
        .into_iter()
        .map(|(handle_type, point)| ManipulationHandle {
            handle_type,
            position: point.rotated_about(&object.position, object.rotation_degrees),
            size: handle_size,
            annotation_id: object.id,
        })
        .collect()
}

/// Whether an object reacts to the pointer under a tool
///
/// Original content never does. In text mode only text objects do, so a
/// click on anything else falls through to the page text underneath.
/// Creation tools place new objects wherever the user clicks.
pub fn is_interactive(object: &AnnotationObject, tool: ToolMode) -> bool {
    if object.is_original_content() {
        return false;
    }
    match tool {
        ToolMode::Select => true,
        ToolMode::InsertText => object.kind_tag() == KindTag::Text,
        ToolMode::Whiteout | ToolMode::Annotate | ToolMode::Link => false,
    }
}

/// Drag in progress
#[derive(Debug, Clone, PartialEq)]
pub struct Manipulation {
    pub target: ObjectRef,
    pub handle: HandleType,
    pub drag_start: Point,
    pub original: AnnotationObject,

    /// Object as it would look if released now
    pub preview: AnnotationObject,
}

impl Manipulation {
    fn new(page: u32, object: AnnotationObject, handle: HandleType, drag_start: Point) -> Self {
        Self {
            target: ObjectRef {
                page,
                id: object.id,
            },
            handle,
            drag_start,
            preview: object.clone(),
            original: object,
        }
    }

    fn drag_to(&mut self, point: Point) {
        self.preview = manipulate(&self.original, self.handle, self.drag_start, point);
    }

    /// Patch turning the original into the preview
    fn patch(&self) -> ObjectPatch {
        let mut patch = ObjectPatch::new()
            .position(self.preview.position)
            .size(self.preview.size)
            .scale(self.preview.scale)
            .rotation(self.preview.rotation_degrees);
        if self.preview.position == self.original.position {
            patch.position = None;
        }
        if self.preview.size == self.original.size {
            patch.size = None;
        }
        if self.preview.scale == self.original.scale {
            patch.scale = None;
        }
        if self.preview.rotation_degrees == self.original.rotation_degrees {
            patch.rotation_degrees = None;
        }
        patch
    }
}

/// New geometry for dragging `handle` from `start` to `current`
pub fn manipulate(
    original: &AnnotationObject,
    handle: HandleType,
    start: Point,
    current: Point,
) -> AnnotationObject {
    let mut object = original.clone();
    let dx = current.x - start.x;
    let dy = current.y - start.y;

    match handle {
        HandleType::Move => {
            object.position = original.position.offset(dx, dy);
        }
        HandleType::Rotate => {
            let center = original
                .local_bounds()
                .center()
                .rotated_about(&original.position, original.rotation_degrees);
            let before = (start.y - center.y).atan2(start.x - center.x);
            let after = (current.y - center.y).atan2(current.x - center.x);
            let rotation = original.rotation_degrees + (after - before).to_degrees();
            object.rotation_degrees = rotation.rem_euclid(360.0);
            // Keep the visual center fixed while turning about the top-left
            let drift = original
                .local_bounds()
                .center()
                .rotated_about(&original.position, object.rotation_degrees);
            object.position = original
                .position
                .offset(center.x - drift.x, center.y - drift.y);
        }
        _ => {
            // Work in the object's unrotated frame
            let origin = Point::new(0.0, 0.0);
            let local = Point::new(dx, dy).rotated_about(&origin, -original.rotation_degrees);
            let (left, top, right, bottom) = handle.edges();
            let display = original.display_size();

            let mut x0 = 0.0;
            let mut y0 = 0.0;
            let mut x1 = display.width;
            let mut y1 = display.height;
            if left {
                x0 = (x0 + local.x).min(x1 - MIN_DISPLAY_SIZE);
            }
            if right {
                x1 = (x1 + local.x).max(x0 + MIN_DISPLAY_SIZE);
            }
            if top {
                y0 = (y0 + local.y).min(y1 - MIN_DISPLAY_SIZE);
            }
            if bottom {
                y1 = (y1 + local.y).max(y0 + MIN_DISPLAY_SIZE);
            }

            let shift = Point::new(x0, y0).rotated_about(&origin, original.rotation_degrees);
            object.position = original.position.offset(shift.x, shift.y);
            resize_display(&mut object, Size::new(x1 - x0, y1 - y0));
        }
    }
    object
}

/// Text scales with its box; everything else changes size
fn resize_display(object: &mut AnnotationObject, display: Size) {
    if object.kind_tag() == KindTag::Text {
        let sx = if object.size.width > 0.0 {
            display.width / object.size.width
        } else {
            1.0
        };
        let sy = if object.size.height > 0.0 {
            display.height / object.size.height
        } else {
            1.0
        };
        object.scale = Scale::new(sx.copysign(object.scale.x), sy.copysign(object.scale.y));
    } else {
        object.size = Size::new(
            display.width / object.scale.x.abs().max(f32::EPSILON),
            display.height / object.scale.y.abs().max(f32::EPSILON),
        );
    }
}

/// Interaction state for one editing session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolState {
    current_tool: ToolMode,
    selection: Option<ObjectRef>,
    editing: Option<ObjectRef>,
    manipulation: Option<Manipulation>,

    /// Anchor of a link rectangle being drawn
    link_anchor: Option<(u32, Point)>,
}

impl ToolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tool(&self) -> ToolMode {
        self.current_tool
    }

    pub fn selection(&self) -> Option<ObjectRef> {
        self.selection
    }

    pub fn editing(&self) -> Option<ObjectRef> {
        self.editing
    }

    pub fn manipulation(&self) -> Option<&Manipulation> {
        self.manipulation.as_ref()
    }

    /// Object as currently dragged, for rendering
    pub fn preview(&self) -> Option<&AnnotationObject> {
        self.manipulation.as_ref().map(|m| &m.preview)
    }

    /// Handles of the selected object
    pub fn handles(&self, document: &Document) -> DocumentResult<Vec<ManipulationHandle>> {
        let Some(selection) = self.selection else {
            return Ok(Vec::new());
        };
        let config = document.config();
        Ok(document
            .get(selection.page, selection.id)?
            .map(|object| generate_handles(&object, config.handle_size, config.rotation_handle_offset))
            .unwrap_or_default())
    }

    /// Apply one input, returning what happened
    pub fn handle(&mut self, input: ToolInput, document: &Document) -> DocumentResult<Vec<ToolEvent>> {
        let mut events = Vec::new();
        match input {
            ToolInput::SetTool(mode) => self.set_tool(mode, document, &mut events)?,
            ToolInput::PointerDown { page, point } => self.pointer_down(page, point, document, &mut events)?,
            ToolInput::PointerMove { page, point } => {
                if let Some(manipulation) = self.manipulation.as_mut() {
                    if manipulation.target.page == page {
                        manipulation.drag_to(point);
                    }
                }
            }
            ToolInput::PointerUp { page, point } => self.pointer_up(page, point, document, &mut events)?,
            ToolInput::Key(key) => self.key(key, document, &mut events)?,
            ToolInput::CommitText(text) => {
                if let Some(target) = self.editing {
                    let patch = ObjectPatch::new().text(text);
                    if document.update(target.page, target.id, &patch)? {
                        events.push(ToolEvent::Updated {
                            page: target.page,
                            id: target.id,
                        });
                    }
                }
            }
            ToolInput::EditAttributes(patch) => {
                if let Some(target) = self.selection {
                    if document.update(target.page, target.id, &patch)? {
                        events.push(ToolEvent::Updated {
                            page: target.page,
                            id: target.id,
                        });
                    }
                }
            }
        }
        Ok(events)
    }

    fn set_tool(&mut self, mode: ToolMode, document: &Document, events: &mut Vec<ToolEvent>) -> DocumentResult<()> {
        self.manipulation = None;
        self.link_anchor = None;
        if mode != ToolMode::InsertText {
            self.end_editing(document, events)?;
        }
        if mode != self.current_tool {
            tracing::debug!(from = ?self.current_tool, to = ?mode, "tool changed");
            events.push(ToolEvent::ToolChanged {
                from: self.current_tool,
                to: mode,
            });
            self.current_tool = mode;
        }
        Ok(())
    }

    /// Automatic return to Select after a one-shot creation tool
    fn revert_to_select(&mut self, events: &mut Vec<ToolEvent>) {
        tracing::debug!(from = ?self.current_tool, "tool reverted to select");
        events.push(ToolEvent::ToolChanged {
            from: self.current_tool,
            to: ToolMode::Select,
        });
        self.current_tool = ToolMode::Select;
    }

    fn pointer_down(
        &mut self,
        page: u32,
        point: Point,
        document: &Document,
        events: &mut Vec<ToolEvent>,
    ) -> DocumentResult<()> {
        self.manipulation = None;

        // Handles of the current selection take precedence
        if let Some(selection) = self.selection.filter(|s| s.page == page) {
            if let Some(object) = document.get(page, selection.id)? {
                let config = document.config();
                let handle = generate_handles(&object, config.handle_size, config.rotation_handle_offset)
                    .into_iter()
                    .find(|h| h.hit_test(&point));
                if let Some(handle) = handle {
                    events.push(ToolEvent::ManipulationStarted {
                        page,
                        id: object.id,
                        handle: handle.handle_type,
                    });
                    self.manipulation = Some(Manipulation::new(page, object, handle.handle_type, point));
                    return Ok(());
                }
            }
        }

        let target = document
            .object_at(page, &point)?
            .filter(|o| is_interactive(o, self.current_tool));
        if let Some(object) = target {
            self.select(page, object.id, document, events)?;
            match self.current_tool {
                ToolMode::InsertText => self.start_editing(page, object.id, events),
                _ => {
                    events.push(ToolEvent::ManipulationStarted {
                        page,
                        id: object.id,
                        handle: HandleType::Move,
                    });
                    self.manipulation = Some(Manipulation::new(page, object, HandleType::Move, point));
                }
            }
            return Ok(());
        }

        match self.current_tool {
            ToolMode::Select => self.clear_selection(document, events)?,
            ToolMode::InsertText => self.insert_text(page, point, document, events)?,
            ToolMode::Whiteout => {
                let size = document.config().whiteout_size;
                let whiteout =
                    AnnotationObject::whiteout(page, Rect::from_origin_size(point, size));
                if let Some(id) = self.create(page, whiteout, document, events)? {
                    self.select(page, id, document, events)?;
                }
                self.revert_to_select(events);
            }
            ToolMode::Annotate => {
                let config = document.config();
                let mut content = TextContent::new(
                    config.sticky_note_text.clone(),
                    config.default_font_family.clone(),
                    config.default_font_size,
                );
                content.background = Some(config.sticky_note_color);
                let mut note = AnnotationObject::text(page, point, content)
                    .with_fill(config.default_text_color)
                    .with_subtype(Subtype::StickyNote);
                note.size = config.sticky_note_size;
                if let Some(id) = self.create(page, note, document, events)? {
                    self.select(page, id, document, events)?;
                }
                self.revert_to_select(events);
            }
            ToolMode::Link => {
                self.clear_selection(document, events)?;
                self.link_anchor = Some((page, point));
            }
        }
        Ok(())
    }

    fn pointer_up(
        &mut self,
        page: u32,
        point: Point,
        document: &Document,
        events: &mut Vec<ToolEvent>,
    ) -> DocumentResult<()> {
        if let Some(mut manipulation) = self.manipulation.take() {
            if manipulation.target.page == page {
                manipulation.drag_to(point);
            }
            let target = manipulation.target;
            if document.update(target.page, target.id, &manipulation.patch())? {
                events.push(ToolEvent::Updated {
                    page: target.page,
                    id: target.id,
                });
            }
            return Ok(());
        }

        if let Some((anchor_page, anchor)) = self.link_anchor.take() {
            if anchor_page != page || self.current_tool != ToolMode::Link {
                return Ok(());
            }
            let dragged = Rect::new(
                anchor.x.min(point.x),
                anchor.y.min(point.y),
                (point.x - anchor.x).abs(),
                (point.y - anchor.y).abs(),
            );
            let bounds = if dragged.width < MIN_LINK_DRAG || dragged.height < MIN_LINK_DRAG {
                Rect::from_origin_size(anchor, document.config().whiteout_size)
            } else {
                dragged
            };
            let link = AnnotationObject::new(
                page,
                ObjectKind::Link(Default::default()),
                Point::new(bounds.x, bounds.y),
                Size::new(bounds.width, bounds.height),
            );
            if let Some(id) = self.create(page, link, document, events)? {
                self.select(page, id, document, events)?;
            }
        }
        Ok(())
    }

    fn key(&mut self, key: Key, document: &Document, events: &mut Vec<ToolEvent>) -> DocumentResult<()> {
        match key {
            Key::Escape => {
                self.manipulation = None;
                self.link_anchor = None;
                self.clear_selection(document, events)?;
            }
            // Keystrokes belong to the text box while editing
            Key::Delete | Key::Backspace if self.editing.is_some() => {}
            Key::Delete | Key::Backspace => {
                let Some(target) = self.selection.take() else {
                    return Ok(());
                };
                self.manipulation = None;
                match document.remove(target.page, target.id)? {
                    Some(_) => events.push(ToolEvent::Deleted {
                        page: target.page,
                        id: target.id,
                    }),
                    None => {
                        tracing::warn!(page = target.page, id = %target.id, "delete refused");
                        events.push(ToolEvent::DeleteRefused {
                            page: target.page,
                            id: target.id,
                        });
                    }
                }
                events.push(ToolEvent::SelectionCleared);
            }
        }
        Ok(())
    }

    /// Edit existing text when a run is hit, otherwise start a new text box
    fn insert_text(
        &mut self,
        page: u32,
        point: Point,
        document: &Document,
        events: &mut Vec<ToolEvent>,
    ) -> DocumentResult<()> {
        let config = document.config();
        let text = match document.text_index().hit_test(page, &point) {
            Some(run) => {
                let mask_height = run.height * config.whiteout_mask_ratio;
                let top = run.origin.y - run.height;
                let mask = AnnotationObject::whiteout(page, Rect::new(run.origin.x, top, run.width, mask_height));
                self.create(page, mask, document, events)?;

                AnnotationObject::text(
                    page,
                    Point::new(run.origin.x, top),
                    TextContent::new(run.content.clone(), config.default_font_family.clone(), run.height),
                )
            }
            None => AnnotationObject::text(
                page,
                point,
                TextContent::new("", config.default_font_family.clone(), config.default_font_size),
            ),
        }
        .with_fill(config.default_text_color);

        if let Some(id) = self.create(page, text, document, events)? {
            self.select(page, id, document, events)?;
            self.start_editing(page, id, events);
        }
        Ok(())
    }

    fn create(
        &mut self,
        page: u32,
        object: AnnotationObject,
        document: &Document,
        events: &mut Vec<ToolEvent>,
    ) -> DocumentResult<Option<AnnotationId>> {
        let kind = object.kind_tag();
        let id = document.add(page, object)?;
        if let Some(id) = id {
            events.push(ToolEvent::Created { page, id, kind });
        }
        Ok(id)
    }

    fn select(
        &mut self,
        page: u32,
        id: AnnotationId,
        document: &Document,
        events: &mut Vec<ToolEvent>,
    ) -> DocumentResult<()> {
        let target = ObjectRef { page, id };
        if self.editing.is_some_and(|e| e != target) {
            self.end_editing(document, events)?;
        }
        if self.selection != Some(target) {
            self.selection = Some(target);
            events.push(ToolEvent::Selected { page, id });
        }
        Ok(())
    }

    fn clear_selection(&mut self, document: &Document, events: &mut Vec<ToolEvent>) -> DocumentResult<()> {
        self.end_editing(document, events)?;
        if self.selection.take().is_some() {
            events.push(ToolEvent::SelectionCleared);
        }
        Ok(())
    }

    fn start_editing(&mut self, page: u32, id: AnnotationId, events: &mut Vec<ToolEvent>) {
        let target = ObjectRef { page, id };
        if self.editing != Some(target) {
            self.editing = Some(target);
            events.push(ToolEvent::EditingStarted { page, id });
        }
    }

    /// Leave text editing; a text box left empty is removed
    fn end_editing(&mut self, document: &Document, events: &mut Vec<ToolEvent>) -> DocumentResult<()> {
        let Some(target) = self.editing.take() else {
            return Ok(());
        };
        events.push(ToolEvent::EditingEnded {
            page: target.page,
            id: target.id,
        });

        let is_empty = document
            .get(target.page, target.id)?
            .and_then(|o| o.text_content().map(|c| c.text.trim().is_empty()))
            .unwrap_or(false);
        if is_empty && document.remove(target.page, target.id)?.is_some() {
            events.push(ToolEvent::Deleted {
                page: target.page,
                id: target.id,
            });
            if self.selection == Some(target) {
                self.selection = None;
                events.push(ToolEvent::SelectionCleared);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::RasterHandle;
    use crate::document::{DocumentSource, PageSource};
    use crate::text_layout::TextRun;

    fn document() -> Document {
        let runs = vec![TextRun::new(0, "Invoice 42", Point::new(50.0, 100.0), 120.0, 20.0)];
        Document::load(DocumentSource {
            pages: vec![
                PageSource::new(Size::new(600.0, 800.0))
                    .with_raster(RasterHandle(1))
                    .with_text_runs(runs),
                PageSource::new(Size::new(600.0, 800.0)),
            ],
        })
        .unwrap()
    }

    fn down(page: u32, x: f32, y: f32) -> ToolInput {
        ToolInput::PointerDown {
            page,
            point: Point::new(x, y),
        }
    }

    fn up(page: u32, x: f32, y: f32) -> ToolInput {
        ToolInput::PointerUp {
            page,
            point: Point::new(x, y),
        }
    }

    #[test]
    fn test_initial_state() {
        let state = ToolState::new();
        assert_eq!(state.current_tool(), ToolMode::Select);
        assert!(state.selection().is_none());
    }

    #[test]
    fn test_is_interactive() {
        let text = AnnotationObject::text(0, Point::new(0.0, 0.0), TextContent::new("a", "Helvetica", 12.0));
        let rect = AnnotationObject::rect(0, Rect::new(0.0, 0.0, 1.0, 1.0));
        let backdrop = AnnotationObject::backdrop(0, Size::new(1.0, 1.0), RasterHandle(1));

        assert!(is_interactive(&rect, ToolMode::Select));
        assert!(!is_interactive(&backdrop, ToolMode::Select));
        assert!(is_interactive(&text, ToolMode::InsertText));
        assert!(!is_interactive(&rect, ToolMode::InsertText));
        assert!(!is_interactive(&text, ToolMode::Whiteout));
    }

    #[test]
    fn test_insert_text_over_existing_run() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::InsertText), &doc).unwrap();
        let events = state.handle(down(0, 60.0, 95.0), &doc).unwrap();

        let objects = doc.foreground(0).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[0].is_whiteout());
        assert_eq!(objects[0].size, Size::new(120.0, 24.0));
        assert_eq!(objects[0].position, Point::new(50.0, 80.0));

        let text = objects[1].text_content().unwrap();
        assert_eq!(text.text, "Invoice 42");
        assert_eq!(text.font_size, 20.0);

        let target = ObjectRef { page: 0, id: objects[1].id };
        assert_eq!(state.selection(), Some(target));
        assert_eq!(state.editing(), Some(target));
        assert_eq!(state.current_tool(), ToolMode::InsertText);
        assert!(events.contains(&ToolEvent::EditingStarted { page: 0, id: objects[1].id }));
    }

    #[test]
    fn test_insert_text_on_blank_area_then_commit() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::InsertText), &doc).unwrap();
        state.handle(down(1, 100.0, 100.0), &doc).unwrap();

        let created = doc.foreground(1).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].text_content().unwrap().text, "");
        assert_eq!(created[0].position, Point::new(100.0, 100.0));

        state.handle(ToolInput::CommitText("Hello".into()), &doc).unwrap();
        assert_eq!(doc.foreground(1).unwrap()[0].text_content().unwrap().text, "Hello");
    }

    #[test]
    fn test_abandoned_empty_text_is_removed() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::InsertText), &doc).unwrap();
        state.handle(down(1, 100.0, 100.0), &doc).unwrap();
        state.handle(ToolInput::Key(Key::Escape), &doc).unwrap();

        assert!(doc.foreground(1).unwrap().is_empty());
        assert!(state.selection().is_none());
        assert!(state.editing().is_none());
    }

    #[test]
    fn test_whiteout_tool_reverts_to_select() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::Whiteout), &doc).unwrap();
        let events = state.handle(down(1, 10.0, 10.0), &doc).unwrap();

        let objects = doc.foreground(1).unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_whiteout());
        assert_eq!(objects[0].size, Size::new(100.0, 30.0));
        assert_eq!(state.current_tool(), ToolMode::Select);
        assert_eq!(state.selection().map(|s| s.id), Some(objects[0].id));
        assert!(events.contains(&ToolEvent::ToolChanged {
            from: ToolMode::Whiteout,
            to: ToolMode::Select
        }));
    }

    #[test]
    fn test_annotate_creates_sticky_note() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::Annotate), &doc).unwrap();
        state.handle(down(1, 20.0, 20.0), &doc).unwrap();

        let note = &doc.foreground(1).unwrap()[0];
        assert_eq!(note.subtype, Some(Subtype::StickyNote));
        assert_eq!(note.size, Size::new(150.0, 100.0));
        let content = note.text_content().unwrap();
        assert_eq!(content.text, "Note");
        assert_eq!(content.background, Some(crate::geometry::Color::NOTE_YELLOW));
        assert_eq!(state.current_tool(), ToolMode::Select);
    }

    #[test]
    fn test_editing_sticky_note_keeps_its_size() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::Annotate), &doc).unwrap();
        state.handle(down(1, 20.0, 20.0), &doc).unwrap();

        state.handle(ToolInput::SetTool(ToolMode::InsertText), &doc).unwrap();
        state.handle(down(1, 30.0, 30.0), &doc).unwrap();
        state.handle(ToolInput::CommitText("Hi".into()), &doc).unwrap();

        let note = &doc.foreground(1).unwrap()[0];
        assert_eq!(note.text_content().unwrap().text, "Hi");
        assert_eq!(note.size, Size::new(150.0, 100.0));
    }

    #[test]
    fn test_select_drag_commits_one_update() {
        let doc = document();
        let id = doc
            .add(1, AnnotationObject::rect(1, Rect::new(100.0, 100.0, 50.0, 50.0)))
            .unwrap()
            .unwrap();
        let mut state = ToolState::new();
        let depth_before = doc.undo_depth(1).unwrap();

        state.handle(down(1, 120.0, 120.0), &doc).unwrap();
        for step in 1..=5 {
            let offset = step as f32 * 2.0;
            state
                .handle(
                    ToolInput::PointerMove {
                        page: 1,
                        point: Point::new(120.0 + offset, 120.0 + offset),
                    },
                    &doc,
                )
                .unwrap();
        }
        assert_eq!(state.preview().unwrap().position, Point::new(110.0, 110.0));
        assert_eq!(doc.get(1, id).unwrap().unwrap().position, Point::new(100.0, 100.0));

        state.handle(up(1, 130.0, 130.0), &doc).unwrap();
        assert_eq!(doc.get(1, id).unwrap().unwrap().position, Point::new(110.0, 110.0));
        assert_eq!(doc.undo_depth(1).unwrap(), depth_before + 1);
    }

    #[test]
    fn test_click_without_drag_adds_no_history() {
        let doc = document();
        doc.add(1, AnnotationObject::rect(1, Rect::new(100.0, 100.0, 50.0, 50.0)))
            .unwrap();
        let mut state = ToolState::new();
        let depth_before = doc.undo_depth(1).unwrap();

        state.handle(down(1, 120.0, 120.0), &doc).unwrap();
        state.handle(up(1, 120.0, 120.0), &doc).unwrap();
        assert_eq!(doc.undo_depth(1).unwrap(), depth_before);
    }

    #[test]
    fn test_resize_handle() {
        let doc = document();
        let id = doc
            .add(1, AnnotationObject::rect(1, Rect::new(100.0, 100.0, 50.0, 50.0)))
            .unwrap()
            .unwrap();
        let mut state = ToolState::new();
        state.handle(down(1, 120.0, 120.0), &doc).unwrap();
        state.handle(up(1, 120.0, 120.0), &doc).unwrap();

        // Drag the bottom-right corner outward.
        state.handle(down(1, 150.0, 150.0), &doc).unwrap();
        assert_eq!(state.manipulation().unwrap().handle, HandleType::BottomRight);
        state.handle(up(1, 170.0, 160.0), &doc).unwrap();

        let object = doc.get(1, id).unwrap().unwrap();
        assert_eq!(object.position, Point::new(100.0, 100.0));
        assert_eq!(object.size, Size::new(70.0, 60.0));
    }

    #[test]
    fn test_resize_from_top_left_moves_origin() {
        let object = AnnotationObject::rect(0, Rect::new(100.0, 100.0, 50.0, 50.0));
        let resized = manipulate(&object, HandleType::TopLeft, Point::new(100.0, 100.0), Point::new(90.0, 80.0));
        assert_eq!(resized.position, Point::new(90.0, 80.0));
        assert_eq!(resized.size, Size::new(60.0, 70.0));

        let clamped = manipulate(&object, HandleType::Left, Point::new(100.0, 125.0), Point::new(400.0, 125.0));
        assert_eq!(clamped.size.width, MIN_DISPLAY_SIZE);
    }

    #[test]
    fn test_rotate_handle_keeps_center() {
        let object = AnnotationObject::rect(0, Rect::new(100.0, 100.0, 40.0, 20.0));
        let center = object.local_bounds().center();
        // Drag from straight above the center to straight right of it.
        let rotated = manipulate(
            &object,
            HandleType::Rotate,
            Point::new(center.x, center.y - 50.0),
            Point::new(center.x + 50.0, center.y),
        );
        assert!((rotated.rotation_degrees - 90.0).abs() < 1e-3);

        let new_center = rotated
            .local_bounds()
            .center()
            .rotated_about(&rotated.position, rotated.rotation_degrees);
        assert!(new_center.distance_to(&center) < 1e-3);
    }

    #[test]
    fn test_handles_follow_rotation() {
        let object = AnnotationObject::rect(0, Rect::new(0.0, 0.0, 10.0, 10.0)).with_rotation(90.0);
        let handles = generate_handles(&object, 6.0, 30.0);
        assert_eq!(handles.len(), 9);

        let top_right = handles
            .iter()
            .find(|h| h.handle_type == HandleType::TopRight)
            .unwrap();
        assert!(top_right.position.distance_to(&Point::new(0.0, 10.0)) < 1e-3);
    }

    #[test]
    fn test_delete_key() {
        let doc = document();
        let id = doc
            .add(1, AnnotationObject::rect(1, Rect::new(0.0, 0.0, 50.0, 50.0)))
            .unwrap()
            .unwrap();
        let mut state = ToolState::new();
        state.handle(down(1, 10.0, 10.0), &doc).unwrap();
        state.handle(up(1, 10.0, 10.0), &doc).unwrap();

        let events = state.handle(ToolInput::Key(Key::Delete), &doc).unwrap();
        assert!(events.contains(&ToolEvent::Deleted { page: 1, id }));
        assert!(doc.foreground(1).unwrap().is_empty());
        assert!(state.selection().is_none());
    }

    #[test]
    fn test_backdrop_is_never_selected() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(down(0, 300.0, 300.0), &doc).unwrap();
        assert!(state.selection().is_none());

        state.handle(ToolInput::Key(Key::Delete), &doc).unwrap();
        assert_eq!(doc.objects(0).unwrap().len(), 1);
    }

    #[test]
    fn test_edit_attributes_routes_through_update() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::InsertText), &doc).unwrap();
        state.handle(down(0, 60.0, 95.0), &doc).unwrap();
        let depth = doc.undo_depth(0).unwrap();

        let patch = ObjectPatch::new()
            .font_family("Times")
            .font_size(24.0)
            .underline(true);
        let events = state.handle(ToolInput::EditAttributes(patch), &doc).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(doc.undo_depth(0).unwrap(), depth + 1);

        let id = state.selection().unwrap().id;
        let content = doc.get(0, id).unwrap().unwrap().text_content().cloned().unwrap();
        assert_eq!(content.font_family, "Times");
        assert!(content.underline);
    }

    #[test]
    fn test_link_drag_creates_link() {
        let doc = document();
        let mut state = ToolState::new();
        state.handle(ToolInput::SetTool(ToolMode::Link), &doc).unwrap();
        state.handle(down(1, 10.0, 10.0), &doc).unwrap();
        state.handle(up(1, 110.0, 40.0), &doc).unwrap();

        let link = &doc.foreground(1).unwrap()[0];
        assert_eq!(link.kind_tag(), KindTag::Link);
        assert_eq!(link.size, Size::new(100.0, 30.0));
        assert_eq!(state.current_tool(), ToolMode::Link);

        let patch = ObjectPatch::new().target_url(Some("https://example.com".into()));
        state.handle(ToolInput::EditAttributes(patch), &doc).unwrap();
        let ObjectKind::Link(target) = doc.get(1, link.id).unwrap().unwrap().kind else {
            panic!("expected link");
        };
        assert_eq!(target.url.as_deref(), Some("https://example.com"));
    }
}
