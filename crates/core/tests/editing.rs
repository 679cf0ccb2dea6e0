use overlay_core::{
    AnnotationObject, Color, Document, DocumentSource, FindReplace, Key, ObjectPatch, PageSource,
    Point, RasterHandle, Rect, Size, TextContent, TextRun, ToolInput, ToolMode, ToolState,
};
use overlay_scheduler::CancellationToken;
use std::collections::HashSet;

const PAGE: Size = Size {
    width: 600.0,
    height: 800.0,
};

fn scanned_document(pages: u32) -> Document {
    let pages = (0..pages)
        .map(|page| {
            PageSource::new(PAGE)
                .with_raster(RasterHandle(u64::from(page)))
                .with_text_runs(vec![
                    TextRun::new(page, "Invoice number 1001", Point::new(50.0, 100.0), 180.0, 14.0),
                    TextRun::new(page, "Amount due: 40 EUR", Point::new(50.0, 140.0), 160.0, 14.0),
                ])
        })
        .collect();
    Document::load(DocumentSource { pages }).expect("document should load")
}

fn hello() -> AnnotationObject {
    AnnotationObject::text(
        0,
        Point::new(100.0, 100.0),
        TextContent::new("Hello", "Helvetica", 16.0),
    )
}

#[test]
fn insert_undo_redo_export_round_trip() {
    let doc = Document::load(DocumentSource::uniform(2, PAGE)).expect("document should load");

    doc.add(0, hello()).expect("page 0 exists");
    assert!(doc.undo(0).expect("page 0 exists"));
    assert!(doc.foreground(0).expect("page 0 exists").is_empty());

    assert!(doc.redo(0).expect("page 0 exists"));
    let objects = doc.foreground(0).expect("page 0 exists");
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].text_content().map(|c| c.text.as_str()), Some("Hello"));

    let output = doc.export(&CancellationToken::new()).expect("export should succeed");
    let texts: Vec<_> = output.pages[0]
        .instructions
        .iter()
        .filter(|i| i.is_text())
        .collect();
    assert_eq!(texts.len(), 1);
    match texts[0] {
        overlay_core::DrawInstruction::Text { origin, text, .. } => {
            assert_eq!(text, "Hello");
            assert_eq!(origin.x, 100.0);
            assert_eq!(origin.y, 684.0);
        }
        other => panic!("unexpected instruction {other:?}"),
    }
    assert!(output.pages[1].instructions.is_empty());
}

#[test]
fn undo_redo_inverse_law() {
    let doc = Document::load(DocumentSource::uniform(1, PAGE)).expect("document should load");
    let baseline = doc.objects(0).expect("page exists");

    let rect_id = doc
        .add(0, AnnotationObject::rect(0, Rect::new(10.0, 10.0, 50.0, 50.0)))
        .expect("page exists")
        .expect("rect added");
    doc.add(0, hello()).expect("page exists");
    doc.update(0, rect_id, &ObjectPatch::new().fill(Some(Color::RED)))
        .expect("page exists");
    doc.update(0, rect_id, &ObjectPatch::new().rotation(30.0))
        .expect("page exists");
    let edited = doc.objects(0).expect("page exists");

    let mutations = 4;
    for _ in 0..mutations {
        assert!(doc.undo(0).expect("page exists"));
    }
    assert!(!doc.can_undo(0).expect("page exists"));
    assert_eq!(doc.objects(0).expect("page exists"), baseline);

    for _ in 0..mutations {
        assert!(doc.redo(0).expect("page exists"));
    }
    assert_eq!(doc.objects(0).expect("page exists"), edited);
}

#[test]
fn undo_never_crosses_pages() {
    let doc = scanned_document(2);

    doc.add(0, AnnotationObject::rect(0, Rect::new(0.0, 0.0, 10.0, 10.0)))
        .expect("page 0 exists");
    doc.add(1, AnnotationObject::rect(1, Rect::new(5.0, 5.0, 10.0, 10.0)))
        .expect("page 1 exists");
    doc.add(0, hello()).expect("page 0 exists");
    let page_one = doc.objects(1).expect("page 1 exists");

    while doc.undo(0).expect("page 0 exists") {}

    assert_eq!(doc.objects(1).expect("page 1 exists"), page_one);
    assert_eq!(doc.undo_depth(1).expect("page 1 exists"), 1);
    assert_eq!(doc.objects(0).expect("page 0 exists").len(), 1);
}

#[test]
fn edits_on_one_page_keep_another_pages_redo() {
    let doc = scanned_document(2);

    doc.add(0, hello()).expect("page 0 exists");
    let page_zero_edited = doc.objects(0).expect("page 0 exists");
    assert!(doc.undo(0).expect("page 0 exists"));
    assert!(doc.can_redo(0).expect("page 0 exists"));

    let rect_id = doc
        .add(1, AnnotationObject::rect(1, Rect::new(5.0, 5.0, 10.0, 10.0)))
        .expect("page 1 exists")
        .expect("rect added");
    doc.update(1, rect_id, &ObjectPatch::new().fill(Some(Color::RED)))
        .expect("page 1 exists");

    assert!(doc.can_redo(0).expect("page 0 exists"));
    assert!(doc.redo(0).expect("page 0 exists"));
    assert_eq!(doc.objects(0).expect("page 0 exists"), page_zero_edited);
    assert!(!doc.can_redo(1).expect("page 1 exists"));
}

#[test]
fn identical_update_does_not_grow_history() {
    let doc = Document::load(DocumentSource::uniform(1, PAGE)).expect("document should load");
    let id = doc
        .add(0, AnnotationObject::rect(0, Rect::new(10.0, 10.0, 20.0, 20.0)).with_fill(Color::BLUE))
        .expect("page exists")
        .expect("rect added");
    let depth = doc.undo_depth(0).expect("page exists");

    let same = ObjectPatch::new()
        .position(Point::new(10.0, 10.0))
        .fill(Some(Color::BLUE));
    assert!(!doc.update(0, id, &same).expect("page exists"));
    assert_eq!(doc.undo_depth(0).expect("page exists"), depth);
}

#[test]
fn original_content_survives_every_public_operation() {
    let doc = scanned_document(1);
    let backdrop = doc.objects(0).expect("page exists")[0].clone();
    assert!(backdrop.is_original_content());

    assert!(doc.remove(0, backdrop.id).expect("page exists").is_none());
    assert!(!doc
        .update(0, backdrop.id, &ObjectPatch::new().position(Point::new(40.0, 40.0)))
        .expect("page exists"));
    assert!(!doc.reorder(0, backdrop.id, 3).expect("page exists"));
    assert!(doc.add(0, backdrop.clone()).expect("page exists").is_none());

    let mut tools = ToolState::new();
    tools
        .handle(ToolInput::PointerDown { page: 0, point: Point::new(300.0, 500.0) }, &doc)
        .expect("page exists");
    tools.handle(ToolInput::Key(Key::Delete), &doc).expect("page exists");

    doc.add(0, hello()).expect("page exists");
    while doc.undo(0).expect("page exists") {}

    let objects = doc.objects(0).expect("page exists");
    assert_eq!(objects, vec![backdrop]);

    let output = doc.export(&CancellationToken::new()).expect("export should succeed");
    assert!(output.pages[0].instructions.is_empty());
}

#[test]
fn edit_existing_text_then_restyle() {
    let doc = scanned_document(1);
    let mut tools = ToolState::new();

    tools
        .handle(ToolInput::SetTool(ToolMode::InsertText), &doc)
        .expect("page exists");
    tools
        .handle(ToolInput::PointerDown { page: 0, point: Point::new(60.0, 130.0) }, &doc)
        .expect("page exists");
    tools
        .handle(ToolInput::CommitText("Amount due: 45 EUR".into()), &doc)
        .expect("page exists");
    tools
        .handle(
            ToolInput::EditAttributes(ObjectPatch::new().text_color(Color::RED)),
            &doc,
        )
        .expect("page exists");

    let objects = doc.foreground(0).expect("page exists");
    assert_eq!(objects.len(), 2);
    assert!(objects[0].is_whiteout());
    let text = objects[1].text_content().expect("text object");
    assert_eq!(text.text, "Amount due: 45 EUR");
    assert_eq!(text.font_size, 14.0);
    assert_eq!(objects[1].style.fill_color, Some(Color::RED));

    // Whiteout, text, commit and recolor are each one undo step
    assert_eq!(doc.undo_depth(0).expect("page exists"), 4);
    assert_eq!(tools.current_tool(), ToolMode::InsertText);
}

#[test]
fn search_is_deterministic_and_replace_all_clears_it() {
    let doc = scanned_document(3);
    let mut find = FindReplace::new().with_replacement("Bill");

    let first = find.search(&doc, "invoice", false).expect("search runs");
    let order: Vec<(u32, usize)> = find.matches().iter().map(|m| (m.page_index, m.run_index)).collect();
    assert_eq!(first, 3);
    assert_eq!(order, vec![(0, 0), (1, 0), (2, 0)]);

    find.search(&doc, "invoice", false).expect("search runs");
    let again: Vec<(u32, usize)> = find.matches().iter().map(|m| (m.page_index, m.run_index)).collect();
    assert_eq!(order, again);

    assert_eq!(find.replace_all(&doc).expect("replace runs"), 3);
    assert_eq!(find.search(&doc, "invoice", false).expect("search runs"), 0);

    let pages: HashSet<u32> = (0..3)
        .filter(|&page| doc.foreground(page).expect("page exists").len() == 2)
        .collect();
    assert_eq!(pages.len(), 3);
}

#[test]
fn replacement_text_exports_at_run_geometry() {
    let doc = scanned_document(1);
    let mut find = FindReplace::new().with_replacement("2002");
    find.search(&doc, "1001", true).expect("search runs");
    find.replace_current(&doc).expect("replace runs");

    let output = doc.export(&CancellationToken::new()).expect("export should succeed");
    let instructions = &output.pages[0].instructions;
    assert_eq!(instructions.len(), 2);
    match &instructions[1] {
        overlay_core::DrawInstruction::Text { text, origin, font_size, .. } => {
            assert_eq!(text, "Invoice number 2002");
            assert_eq!(*font_size, 14.0);
            assert_eq!(origin.y, 800.0 - 86.0 - 14.0);
        }
        other => panic!("unexpected instruction {other:?}"),
    }
}
