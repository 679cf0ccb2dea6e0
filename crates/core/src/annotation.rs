//! Annotation object model
//!
//! An [`AnnotationObject`] is the unit the user edits: a text box, an image,
//! a shape, a group or a link placed on top of a page. Kind-specific data
//! lives in the closed [`ObjectKind`] union so invalid attribute
//! combinations (a font size on an image, a URL on a rectangle) cannot be
//! expressed.
//!
//! Geometry is stored in top-down page space. `position` is the object's
//! top-left corner and the origin of its rotation.

use crate::geometry::{Color, Flip, Point, Rect, Scale, Size};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique identifier for an annotation object
pub type AnnotationId = uuid::Uuid;

/// Line height as a multiple of font size
pub const LINE_HEIGHT: f32 = 1.2;

/// Average glyph advance as a multiple of font size, used for text box sizing
const AVERAGE_GLYPH_WIDTH: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Text payload and typography
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub underline: bool,

    /// Box tint drawn behind the text (sticky notes)
    pub background: Option<Color>,
}

impl TextContent {
    pub fn new(text: impl Into<String>, font_family: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_family: font_family.into(),
            font_size,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            underline: false,
            background: None,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Unscaled box size the text occupies
    ///
    /// An estimate from average glyph width; exact shaping is the page
    /// writer's job.
    pub fn estimated_size(&self) -> Size {
        let line_count = self.lines().count().max(1);
        let longest = self.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        Size::new(
            longest as f32 * self.font_size * AVERAGE_GLYPH_WIDTH,
            line_count as f32 * self.font_size * LINE_HEIGHT,
        )
    }
}

/// Opaque handle to a decoded page raster owned by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterHandle(pub u64);

/// Declared encoding of inserted image bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageEncoding {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Unknown,
}

impl ImageEncoding {
    /// Whether the page writer can embed this encoding directly
    pub fn is_embeddable(self) -> bool {
        matches!(self, ImageEncoding::Png | ImageEncoding::Jpeg)
    }

    /// Detect the encoding from magic bytes
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => ImageEncoding::Png,
            Ok(image::ImageFormat::Jpeg) => ImageEncoding::Jpeg,
            Ok(image::ImageFormat::Gif) => ImageEncoding::Gif,
            Ok(image::ImageFormat::WebP) => ImageEncoding::Webp,
            Ok(image::ImageFormat::Bmp) => ImageEncoding::Bmp,
            _ => ImageEncoding::Unknown,
        }
    }

    /// Format to hand to the `image` decoder, if any
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            ImageEncoding::Png => Some(image::ImageFormat::Png),
            ImageEncoding::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageEncoding::Gif => Some(image::ImageFormat::Gif),
            ImageEncoding::Webp => Some(image::ImageFormat::WebP),
            ImageEncoding::Bmp => Some(image::ImageFormat::Bmp),
            ImageEncoding::Unknown => None,
        }
    }
}

/// Where an image's pixels come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Page backdrop raster (original content only)
    Raster(RasterHandle),

    /// Encoded bytes supplied by the user (inserted images, signatures, stamps).
    /// Shared so snapshots never copy pixel data.
    Encoded {
        bytes: Arc<[u8]>,
        encoding: ImageEncoding,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub source: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkTarget {
    pub url: Option<String>,
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Text(TextContent),
    Image(ImageContent),
    Rect,
    Ellipse,
    /// Children positioned relative to the group's top-left corner
    Group(Vec<AnnotationObject>),
    Link(LinkTarget),
}

/// Discriminant of [`ObjectKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    Text,
    Image,
    Rect,
    Ellipse,
    Group,
    Link,
}

impl ObjectKind {
    pub fn tag(&self) -> KindTag {
        match self {
            ObjectKind::Text(_) => KindTag::Text,
            ObjectKind::Image(_) => KindTag::Image,
            ObjectKind::Rect => KindTag::Rect,
            ObjectKind::Ellipse => KindTag::Ellipse,
            ObjectKind::Group(_) => KindTag::Group,
            ObjectKind::Link(_) => KindTag::Link,
        }
    }
}

/// Role marker layered on top of the kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    /// Redaction rectangle, always exported opaque white
    Whiteout,
    StickyNote,
    Signature,
    Stamp,
    Custom(String),
}

/// Paint attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStyle {
    pub fill_color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke_width: Option<f32>,

    /// 0.0 = invisible, 1.0 = opaque
    pub opacity: f32,
}

impl ObjectStyle {
    /// Whether a stroke would actually paint something
    pub fn has_visible_stroke(&self) -> bool {
        matches!(self.stroke_color, Some(c) if !c.is_transparent())
            && self.stroke_width.unwrap_or(1.0) > 0.0
    }

    pub fn has_visible_fill(&self) -> bool {
        matches!(self.fill_color, Some(c) if !c.is_transparent())
    }
}

impl Default for ObjectStyle {
    fn default() -> Self {
        Self {
            fill_color: None,
            stroke_color: None,
            stroke_width: None,
            opacity: 1.0,
        }
    }
}

/// A visual object placed on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationObject {
    pub id: AnnotationId,
    pub page_index: u32,
    pub kind: ObjectKind,

    /// Top-left corner, also the rotation origin
    pub position: Point,
    pub size: Size,
    pub scale: Scale,

    /// Clockwise-positive, in degrees
    pub rotation_degrees: f32,
    pub flip: Flip,
    pub style: ObjectStyle,
    pub subtype: Option<Subtype>,

    /// Page backdrop flag. Only [`AnnotationObject::backdrop`] sets it, and
    /// nothing clears it.
    is_original_content: bool,
}

impl AnnotationObject {
    /// Base constructor with a fresh id and default style
    pub fn new(page_index: u32, kind: ObjectKind, position: Point, size: Size) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page_index,
            kind,
            position,
            size,
            scale: Scale::IDENTITY,
            rotation_degrees: 0.0,
            flip: Flip::default(),
            style: ObjectStyle::default(),
            subtype: None,
            is_original_content: false,
        }
    }

    /// The read-only raster layer of a page
    pub fn backdrop(page_index: u32, page_size: Size, raster: RasterHandle) -> Self {
        let mut object = Self::new(
            page_index,
            ObjectKind::Image(ImageContent {
                source: ImageSource::Raster(raster),
            }),
            Point::new(0.0, 0.0),
            page_size,
        );
        object.is_original_content = true;
        object
    }

    /// Text box sized to its content
    pub fn text(page_index: u32, position: Point, content: TextContent) -> Self {
        let size = content.estimated_size();
        let mut object = Self::new(page_index, ObjectKind::Text(content), position, size);
        object.style.fill_color = Some(Color::BLACK);
        object
    }

    pub fn rect(page_index: u32, bounds: Rect) -> Self {
        Self::new(
            page_index,
            ObjectKind::Rect,
            Point::new(bounds.x, bounds.y),
            Size::new(bounds.width, bounds.height),
        )
    }

    pub fn ellipse(page_index: u32, bounds: Rect) -> Self {
        Self::new(
            page_index,
            ObjectKind::Ellipse,
            Point::new(bounds.x, bounds.y),
            Size::new(bounds.width, bounds.height),
        )
    }

    /// Opaque white redaction rectangle
    pub fn whiteout(page_index: u32, bounds: Rect) -> Self {
        Self::rect(page_index, bounds)
            .with_fill(Color::WHITE)
            .with_subtype(Subtype::Whiteout)
    }

    pub fn image(
        page_index: u32,
        bounds: Rect,
        bytes: impl Into<Arc<[u8]>>,
        encoding: ImageEncoding,
    ) -> Self {
        Self::new(
            page_index,
            ObjectKind::Image(ImageContent {
                source: ImageSource::Encoded {
                    bytes: bytes.into(),
                    encoding,
                },
            }),
            Point::new(bounds.x, bounds.y),
            Size::new(bounds.width, bounds.height),
        )
    }

    pub fn link(page_index: u32, bounds: Rect, url: impl Into<String>) -> Self {
        Self::new(
            page_index,
            ObjectKind::Link(LinkTarget {
                url: Some(url.into()),
            }),
            Point::new(bounds.x, bounds.y),
            Size::new(bounds.width, bounds.height),
        )
    }

    /// Group whose children are positioned relative to `bounds`' top-left
    pub fn group(page_index: u32, bounds: Rect, children: Vec<AnnotationObject>) -> Self {
        Self::new(
            page_index,
            ObjectKind::Group(children),
            Point::new(bounds.x, bounds.y),
            Size::new(bounds.width, bounds.height),
        )
    }

    pub fn with_id(mut self, id: AnnotationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_fill(mut self, color: Color) -> Self {
        self.style.fill_color = Some(color);
        self
    }

    pub fn with_stroke(mut self, color: Color, width: f32) -> Self {
        self.style.stroke_color = Some(color);
        self.style.stroke_width = Some(width);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.style.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_subtype(mut self, subtype: Subtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_original_content(&self) -> bool {
        self.is_original_content
    }

    pub fn is_whiteout(&self) -> bool {
        self.subtype == Some(Subtype::Whiteout)
    }

    pub fn kind_tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn text_content(&self) -> Option<&TextContent> {
        match &self.kind {
            ObjectKind::Text(content) => Some(content),
            _ => None,
        }
    }

    /// Size after scale
    pub fn display_size(&self) -> Size {
        Size::new(
            self.size.width * self.scale.x.abs(),
            self.size.height * self.scale.y.abs(),
        )
    }

    /// Unrotated box at `position` with the display size
    pub fn local_bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.display_size())
    }

    /// Corners of the rotated box: top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> [Point; 4] {
        let r = self.local_bounds();
        [
            Point::new(r.x, r.y),
            Point::new(r.right(), r.y),
            Point::new(r.right(), r.bottom()),
            Point::new(r.x, r.bottom()),
        ]
        .map(|p| p.rotated_about(&self.position, self.rotation_degrees))
    }

    /// Axis-aligned bounds of the rotated box
    pub fn bounding_box(&self) -> Rect {
        let corners = self.corners();
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for c in &corners {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Hit test honoring rotation
    pub fn contains_point(&self, point: &Point) -> bool {
        let local = point.rotated_about(&self.position, -self.rotation_degrees);
        self.local_bounds().contains_point(&local)
    }

    /// Recompute a text box's size from its content
    ///
    /// Sticky notes keep their box and only grow when the text outgrows it.
    pub(crate) fn refit_text(&mut self) {
        if let ObjectKind::Text(content) = &self.kind {
            let estimated = content.estimated_size();
            self.size = if self.subtype == Some(Subtype::StickyNote) {
                Size::new(
                    self.size.width.max(estimated.width),
                    self.size.height.max(estimated.height),
                )
            } else {
                estimated
            };
        }
    }
}

/// Partial attribute update
///
/// Every field is optional; `None` leaves the attribute alone. Text and link
/// fields are ignored on objects of other kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPatch {
    pub position: Option<Point>,
    pub size: Option<Size>,
    pub scale: Option<Scale>,
    pub rotation_degrees: Option<f32>,
    pub flip: Option<Flip>,
    pub fill_color: Option<Option<Color>>,
    pub stroke_color: Option<Option<Color>>,
    pub stroke_width: Option<Option<f32>>,
    pub opacity: Option<f32>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    pub underline: Option<bool>,
    pub text_color: Option<Color>,
    pub target_url: Option<Option<String>>,
}

impl ObjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation_degrees = Some(degrees);
        self
    }

    pub fn fill(mut self, color: Option<Color>) -> Self {
        self.fill_color = Some(color);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn font_weight(mut self, weight: FontWeight) -> Self {
        self.font_weight = Some(weight);
        self
    }

    pub fn font_style(mut self, style: FontStyle) -> Self {
        self.font_style = Some(style);
        self
    }

    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    pub fn text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    pub fn target_url(mut self, url: Option<String>) -> Self {
        self.target_url = Some(url);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an object, returning whether any attribute changed
    pub fn apply(&self, object: &mut AnnotationObject) -> bool {
        let before = object.clone();

        if let Some(position) = self.position {
            object.position = position;
        }
        if let Some(size) = self.size {
            object.size = size;
        }
        if let Some(scale) = self.scale {
            object.scale = scale;
        }
        if let Some(rotation) = self.rotation_degrees {
            object.rotation_degrees = rotation;
        }
        if let Some(flip) = self.flip {
            object.flip = flip;
        }
        if let Some(fill) = self.fill_color {
            object.style.fill_color = fill;
        }
        if let Some(stroke) = self.stroke_color {
            object.style.stroke_color = stroke;
        }
        if let Some(width) = self.stroke_width {
            object.style.stroke_width = width;
        }
        if let Some(opacity) = self.opacity {
            object.style.opacity = opacity.clamp(0.0, 1.0);
        }

        let mut text_changed = false;
        if let ObjectKind::Text(content) = &mut object.kind {
            if let Some(text) = &self.text {
                content.text.clone_from(text);
                text_changed = true;
            }
            if let Some(family) = &self.font_family {
                content.font_family.clone_from(family);
                text_changed = true;
            }
            if let Some(size) = self.font_size {
                content.font_size = size;
                text_changed = true;
            }
            if let Some(weight) = self.font_weight {
                content.font_weight = weight;
            }
            if let Some(style) = self.font_style {
                content.font_style = style;
            }
            if let Some(underline) = self.underline {
                content.underline = underline;
            }
        }
        if object.kind_tag() == KindTag::Text {
            if let Some(color) = self.text_color {
                object.style.fill_color = Some(color);
            }
        }
        if let ObjectKind::Link(target) = &mut object.kind {
            if let Some(url) = &self.target_url {
                target.url.clone_from(url);
            }
        }

        // An explicit size wins over the content-derived one
        if text_changed && self.size.is_none() {
            object.refit_text();
        }

        *object != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_object_sized_from_content() {
        let object = AnnotationObject::text(
            0,
            Point::new(10.0, 10.0),
            TextContent::new("Hello\nWorld!", "Helvetica", 10.0),
        );
        assert_eq!(object.kind_tag(), KindTag::Text);
        assert!((object.size.width - 36.0).abs() < 1e-4);
        assert!((object.size.height - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_backdrop_is_original_content() {
        let backdrop = AnnotationObject::backdrop(0, Size::new(612.0, 792.0), RasterHandle(1));
        assert!(backdrop.is_original_content());
        assert!(!AnnotationObject::rect(0, Rect::new(0.0, 0.0, 1.0, 1.0)).is_original_content());
    }

    #[test]
    fn test_whiteout_builder() {
        let w = AnnotationObject::whiteout(0, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(w.is_whiteout());
        assert_eq!(w.style.fill_color, Some(Color::WHITE));
    }

    #[test]
    fn test_hit_test_honors_rotation() {
        let object = AnnotationObject::rect(0, Rect::new(100.0, 100.0, 50.0, 10.0)).with_rotation(90.0);
        // Rotated clockwise about the top-left, the box now hangs below it.
        assert!(object.contains_point(&Point::new(95.0, 140.0)));
        assert!(!object.contains_point(&Point::new(140.0, 105.0)));

        let bbox = object.bounding_box();
        assert!((bbox.x - 90.0).abs() < 1e-3);
        assert!((bbox.bottom() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_display_size_uses_scale() {
        let object = AnnotationObject::rect(0, Rect::new(0.0, 0.0, 20.0, 10.0))
            .with_scale(Scale::new(2.0, -0.5));
        assert_eq!(object.display_size(), Size::new(40.0, 5.0));
    }

    #[test]
    fn test_patch_reports_changes() {
        let mut object = AnnotationObject::rect(0, Rect::new(0.0, 0.0, 20.0, 10.0));
        assert!(!ObjectPatch::new().apply(&mut object));
        assert!(!ObjectPatch::new().position(Point::new(0.0, 0.0)).apply(&mut object));
        assert!(ObjectPatch::new().position(Point::new(5.0, 0.0)).apply(&mut object));
        assert!(!ObjectPatch::new().opacity(3.0).apply(&mut object));
        assert_eq!(object.style.opacity, 1.0);
    }

    #[test]
    fn test_patch_ignores_text_fields_on_shapes() {
        let mut object = AnnotationObject::rect(0, Rect::new(0.0, 0.0, 20.0, 10.0));
        assert!(!ObjectPatch::new().text("nope").font_size(40.0).apply(&mut object));
    }

    #[test]
    fn test_patch_refits_text() {
        let mut object = AnnotationObject::text(
            0,
            Point::new(0.0, 0.0),
            TextContent::new("Hi", "Helvetica", 10.0),
        );
        let width_before = object.size.width;
        assert!(ObjectPatch::new().text("Hello there").apply(&mut object));
        assert!(object.size.width > width_before);
        assert_eq!(object.text_content().unwrap().text, "Hello there");
    }

    #[test]
    fn test_sticky_note_keeps_its_box_on_edit() {
        let mut note = AnnotationObject::text(
            0,
            Point::new(20.0, 20.0),
            TextContent::new("Note", "Helvetica", 12.0),
        )
        .with_subtype(Subtype::StickyNote);
        note.size = Size::new(150.0, 100.0);

        assert!(ObjectPatch::new().text("Hi").apply(&mut note));
        assert_eq!(note.size, Size::new(150.0, 100.0));

        let long = "x".repeat(40);
        assert!(ObjectPatch::new().text(long).apply(&mut note));
        assert!(note.size.width > 150.0);
        assert_eq!(note.size.height, 100.0);
    }

    #[test]
    fn test_sniff_png_magic() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(ImageEncoding::sniff(&png_magic), ImageEncoding::Png);
        assert_eq!(ImageEncoding::sniff(b"not an image"), ImageEncoding::Unknown);
        assert!(ImageEncoding::Jpeg.is_embeddable());
        assert!(!ImageEncoding::Gif.is_embeddable());
    }
}
