//! Scene serialization
//!
//! Turns each page's final objects into drawing instructions in the output
//! coordinate space: origin at the bottom-left, Y increasing upward,
//! rotation counter-clockwise-positive. The conversion for a box whose
//! top-left sits at `(x, y)` with scaled height `h` on a page of height `H`
//! is `output_y = H - y - h`.
//!
//! Objects are emitted in list order, so later instructions paint over
//! earlier ones. Per-object failures (an image that cannot be embedded) are
//! logged and reported without aborting the page.

use crate::annotation::{
    AnnotationId, AnnotationObject, ImageContent, ImageEncoding, ImageSource, ObjectKind, LINE_HEIGHT,
};
use crate::document::Document;
use crate::error::{ExportError, ExportResult};
use crate::fonts::StandardFont;
use crate::geometry::{Color, Flip, Point, Scale, Size};
use overlay_scheduler::{CancellationToken, JobPriority, JobScheduler, JobType};
use serde::Serialize;
use std::sync::Arc;

/// Glyph advance estimate used for underline length
const UNDERLINE_GLYPH_WIDTH: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputPoint {
    pub x: f32,
    pub y: f32,
}

/// Rectangle in output space, `(x, y)` is the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where a box lands and how it turns
///
/// The writer rotates `rect` by `rotation_degrees` about `rotation_origin`,
/// which is the object's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub rect: OutputRect,
    pub rotation_degrees: f32,
    pub rotation_origin: OutputPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

/// Image bytes verified to be embeddable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedImage {
    pub encoding: ImageEncoding,
    pub pixel_width: u32,
    pub pixel_height: u32,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
}

/// One drawing operation for the page writer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawInstruction {
    Rect {
        placement: Placement,
        fill: Option<Color>,
        stroke: Option<Stroke>,
        opacity: f32,
    },
    Ellipse {
        placement: Placement,
        fill: Option<Color>,
        stroke: Option<Stroke>,
        opacity: f32,
    },
    /// One line of text, `origin` on its baseline
    Text {
        origin: OutputPoint,
        text: String,
        font: StandardFont,
        font_size: f32,
        color: Color,
        opacity: f32,
        rotation_degrees: f32,
        rotation_origin: OutputPoint,
    },
    Line {
        start: OutputPoint,
        end: OutputPoint,
        color: Color,
        width: f32,
        opacity: f32,
        rotation_degrees: f32,
        rotation_origin: OutputPoint,
    },
    Image {
        id: AnnotationId,
        placement: Placement,
        opacity: f32,
        flip: Flip,
        image: EmbeddedImage,
    },
    /// Clickable region, not painted
    LinkArea { rect: OutputRect, url: String },
}

impl DrawInstruction {
    pub fn is_text(&self) -> bool {
        matches!(self, DrawInstruction::Text { .. })
    }

    pub fn is_link_area(&self) -> bool {
        matches!(self, DrawInstruction::LinkArea { .. })
    }
}

/// Outcome of one attempted image embed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageEmbedReport {
    pub id: AnnotationId,
    pub success: bool,
    pub error: Option<String>,
}

/// Serialized page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOutput {
    pub page_index: u32,
    pub page_size: Size,
    pub instructions: Vec<DrawInstruction>,
    pub image_reports: Vec<ImageEmbedReport>,

    /// Objects that should have produced output
    pub attempted_objects: usize,
    pub failed_objects: usize,
}

impl PageOutput {
    /// Every object this page tried to emit failed
    pub fn is_failed(&self) -> bool {
        self.attempted_objects > 0 && self.failed_objects == self.attempted_objects
    }
}

/// Serialized document, one entry per page in page order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportOutput {
    pub pages: Vec<PageOutput>,
}

impl ExportOutput {
    pub fn instruction_count(&self) -> usize {
        self.pages.iter().map(|p| p.instructions.len()).sum()
    }

    pub fn image_reports(&self) -> impl Iterator<Item = &ImageEmbedReport> {
        self.pages.iter().flat_map(|p| p.image_reports.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Serialize one page's objects
///
/// `objects` is the page's full list; original content is skipped here.
pub fn serialize_page(page_index: u32, page_size: Size, objects: &[AnnotationObject]) -> PageOutput {
    let _span = tracing::debug_span!("export_page", page = page_index).entered();

    let mut output = PageOutput {
        page_index,
        page_size,
        instructions: Vec::new(),
        image_reports: Vec::new(),
        attempted_objects: 0,
        failed_objects: 0,
    };

    let mut flattened = Vec::with_capacity(objects.len());
    for object in objects.iter().filter(|o| !o.is_original_content()) {
        flatten_into(object, &mut flattened);
    }

    let writer = PageWriter {
        page_height: page_size.height,
    };
    for object in flattened.iter().filter(|o| !o.is_original_content()) {
        if let Err(err) = writer.emit(object, &mut output) {
            tracing::warn!(page = page_index, id = %object.id, error = %err, "object skipped during export");
            output.failed_objects += 1;
        }
    }

    output
}

/// Serialize every page of a document
///
/// Each page is one export job, run in page order from a snapshot taken
/// under that page's lock. Cancellation is checked between jobs, never in
/// the middle of a page.
pub fn serialize_document(document: &Document, token: &CancellationToken) -> ExportResult<ExportOutput> {
    let page_count = document.page_count();
    let scheduler = JobScheduler::new();
    for page_index in 0..page_count {
        scheduler.submit(JobPriority::Export, JobType::ExportPage { page_index });
    }

    let mut output = ExportOutput::default();
    while let Some(job) = scheduler.next_job() {
        let page_index = job.job_type.page_index();
        if token.is_cancelled() {
            tracing::info!(page = page_index, "export cancelled");
            scheduler.clear();
            return Err(ExportError::Cancelled { page: page_index });
        }

        let snapshot = document.export_snapshot(page_index);
        scheduler.complete_job(job.id);
        let (page_size, objects) = snapshot?;
        output.pages.push(serialize_page(page_index, page_size, &objects));
    }

    if page_count > 0 && output.pages.iter().all(PageOutput::is_failed) {
        return Err(ExportError::AllPagesFailed { page_count });
    }

    tracing::info!(
        pages = output.pages.len(),
        jobs = scheduler.stats().jobs_completed,
        instructions = output.instruction_count(),
        "export finished"
    );
    Ok(output)
}

/// Expand groups into absolutely positioned leaves
fn flatten_into(object: &AnnotationObject, out: &mut Vec<AnnotationObject>) {
    match &object.kind {
        ObjectKind::Group(children) => {
            for child in children {
                flatten_into(&compose_child(object, child), out);
            }
        }
        _ => out.push(object.clone()),
    }
}

/// Move a group child into page space
fn compose_child(group: &AnnotationObject, child: &AnnotationObject) -> AnnotationObject {
    let mut composed = child.clone();
    let unrotated = Point::new(
        group.position.x + child.position.x * group.scale.x.abs(),
        group.position.y + child.position.y * group.scale.y.abs(),
    );
    composed.position = unrotated.rotated_about(&group.position, group.rotation_degrees);
    composed.scale = Scale::new(child.scale.x * group.scale.x, child.scale.y * group.scale.y);
    composed.rotation_degrees = child.rotation_degrees + group.rotation_degrees;
    composed.style.opacity = child.style.opacity * group.style.opacity;
    composed.flip = Flip {
        horizontal: child.flip.horizontal ^ group.flip.horizontal,
        vertical: child.flip.vertical ^ group.flip.vertical,
    };
    composed.page_index = group.page_index;
    composed
}

struct PageWriter {
    page_height: f32,
}

impl PageWriter {
    fn flip_point(&self, point: Point) -> OutputPoint {
        OutputPoint {
            x: point.x,
            y: self.page_height - point.y,
        }
    }

    fn placement(&self, object: &AnnotationObject) -> Placement {
        let size = object.display_size();
        Placement {
            rect: OutputRect {
                x: object.position.x,
                y: self.page_height - object.position.y - size.height,
                width: size.width,
                height: size.height,
            },
            rotation_degrees: -object.rotation_degrees,
            rotation_origin: self.flip_point(object.position),
        }
    }

    fn stroke(object: &AnnotationObject) -> Option<Stroke> {
        if !object.style.has_visible_stroke() {
            return None;
        }
        object.style.stroke_color.map(|color| Stroke {
            color,
            width: object.style.stroke_width.unwrap_or(1.0),
        })
    }

    fn emit(&self, object: &AnnotationObject, output: &mut PageOutput) -> ExportResult<()> {
        if object.is_whiteout() {
            output.attempted_objects += 1;
            output.instructions.push(DrawInstruction::Rect {
                placement: self.placement(object),
                fill: Some(Color::WHITE),
                stroke: None,
                opacity: 1.0,
            });
            return Ok(());
        }

        let visible = object.style.opacity > 0.0 || object.style.has_visible_stroke();

        if let ObjectKind::Link(target) = &object.kind {
            if let Some(url) = target.url.as_deref().filter(|u| !u.is_empty()) {
                output.attempted_objects += 1;
                let has_paint = object.style.has_visible_fill() || object.style.has_visible_stroke();
                if visible && has_paint {
                    output.instructions.push(DrawInstruction::Rect {
                        placement: self.placement(object),
                        fill: object.style.fill_color.filter(|c| !c.is_transparent()),
                        stroke: Self::stroke(object),
                        opacity: object.style.opacity,
                    });
                }
                output.instructions.push(DrawInstruction::LinkArea {
                    rect: self.link_rect(object),
                    url: url.to_string(),
                });
            }
            return Ok(());
        }

        if !visible {
            return Ok(());
        }

        match &object.kind {
            ObjectKind::Rect => {
                output.attempted_objects += 1;
                output.instructions.push(DrawInstruction::Rect {
                    placement: self.placement(object),
                    fill: object.style.fill_color,
                    stroke: Self::stroke(object),
                    opacity: object.style.opacity,
                });
            }
            ObjectKind::Ellipse => {
                output.attempted_objects += 1;
                output.instructions.push(DrawInstruction::Ellipse {
                    placement: self.placement(object),
                    fill: object.style.fill_color,
                    stroke: Self::stroke(object),
                    opacity: object.style.opacity,
                });
            }
            ObjectKind::Text(_) => self.emit_text(object, output),
            ObjectKind::Image(content) => {
                output.attempted_objects += 1;
                match embed_image(object.id, content) {
                    Ok(image) => {
                        output.image_reports.push(ImageEmbedReport {
                            id: object.id,
                            success: true,
                            error: None,
                        });
                        output.instructions.push(DrawInstruction::Image {
                            id: object.id,
                            placement: self.placement(object),
                            opacity: object.style.opacity,
                            flip: object.flip,
                            image,
                        });
                    }
                    Err(err) => {
                        output.image_reports.push(ImageEmbedReport {
                            id: object.id,
                            success: false,
                            error: Some(err.to_string()),
                        });
                        return Err(err);
                    }
                }
            }
            ObjectKind::Group(_) | ObjectKind::Link(_) => {}
        }
        Ok(())
    }

    fn emit_text(&self, object: &AnnotationObject, output: &mut PageOutput) {
        let Some(content) = object.text_content() else {
            return;
        };
        let has_background = content.background.is_some_and(|c| !c.is_transparent());
        let has_text = content.lines().any(|l| !l.trim().is_empty());
        if !has_text && !has_background {
            return;
        }
        output.attempted_objects += 1;

        let rotation_degrees = -object.rotation_degrees;
        let rotation_origin = self.flip_point(object.position);

        if let Some(background) = content.background.filter(|c| !c.is_transparent()) {
            output.instructions.push(DrawInstruction::Rect {
                placement: self.placement(object),
                fill: Some(background),
                stroke: None,
                opacity: object.style.opacity,
            });
        }

        let font = StandardFont::for_text(content);
        let font_size = content.font_size * object.scale.y.abs();
        let color = object.style.fill_color.unwrap_or(Color::BLACK);

        for (line_number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_top = object.position.y + line_number as f32 * font_size * LINE_HEIGHT;
            let origin = OutputPoint {
                x: object.position.x,
                y: self.page_height - line_top - font_size,
            };
            output.instructions.push(DrawInstruction::Text {
                origin,
                text: line.to_string(),
                font,
                font_size,
                color,
                opacity: object.style.opacity,
                rotation_degrees,
                rotation_origin,
            });

            if content.underline {
                let offset = font_size * 0.1;
                let length = line.chars().count() as f32
                    * content.font_size
                    * UNDERLINE_GLYPH_WIDTH
                    * object.scale.x.abs();
                output.instructions.push(DrawInstruction::Line {
                    start: OutputPoint {
                        x: origin.x,
                        y: origin.y - offset,
                    },
                    end: OutputPoint {
                        x: origin.x + length,
                        y: origin.y - offset,
                    },
                    color,
                    width: (font_size / 16.0).max(0.5),
                    opacity: object.style.opacity,
                    rotation_degrees,
                    rotation_origin,
                });
            }
        }
    }

    /// Axis-aligned clickable area covering the rotated object
    fn link_rect(&self, object: &AnnotationObject) -> OutputRect {
        let bbox = object.bounding_box();
        OutputRect {
            x: bbox.x,
            y: self.page_height - bbox.y - bbox.height,
            width: bbox.width,
            height: bbox.height,
        }
    }
}

/// Check that an image can be embedded and read its dimensions
fn embed_image(id: AnnotationId, content: &ImageContent) -> ExportResult<EmbeddedImage> {
    let (bytes, declared) = match &content.source {
        ImageSource::Encoded { bytes, encoding } => (bytes, *encoding),
        ImageSource::Raster(_) => {
            return Err(ExportError::UnsupportedImage {
                id,
                encoding: ImageEncoding::Unknown,
            })
        }
    };

    let encoding = match declared {
        ImageEncoding::Unknown => ImageEncoding::sniff(bytes),
        known => known,
    };
    let format = encoding
        .image_format()
        .filter(|_| encoding.is_embeddable())
        .ok_or(ExportError::UnsupportedImage { id, encoding })?;

    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| ExportError::ImageDecode {
        id,
        reason: e.to_string(),
    })?;

    Ok(EmbeddedImage {
        encoding,
        pixel_width: decoded.width(),
        pixel_height: decoded.height(),
        bytes: Arc::clone(bytes),
    })
}
