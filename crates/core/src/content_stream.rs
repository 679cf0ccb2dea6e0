//! PDF content-stream encoding
//!
//! Encodes a serialized page as PDF drawing operators with `lopdf`. The page
//! writer that assembles the output file registers the returned font, image
//! and graphics-state resources under the names used in the stream, and adds
//! the link areas as `/Link` annotations.

use crate::annotation::AnnotationId;
use crate::error::ExportResult;
use crate::geometry::Color;
use crate::serializer::{DrawInstruction, EmbeddedImage, OutputPoint, OutputRect, PageOutput, Stroke};
use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

/// Bezier control distance for quarter ellipses
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, PartialEq)]
pub struct FontResource {
    /// Resource name, e.g. `F1`
    pub name: String,
    pub base_font: &'static str,

    /// `/Encoding` the page writer must declare; text is written in it
    pub encoding: &'static str,
}

/// Encoding of every string shown with a standard font
pub const TEXT_ENCODING: &str = "WinAnsiEncoding";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    /// Resource name, e.g. `Im0`
    pub name: String,
    pub id: AnnotationId,
    pub image: EmbeddedImage,
}

/// Constant-alpha graphics state
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaResource {
    pub name: String,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    /// `[llx, lly, urx, ury]`
    pub rect: [f32; 4],
    pub url: String,
}

/// Content stream plus the resources it references
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedPage {
    pub content: Vec<u8>,
    pub fonts: Vec<FontResource>,
    pub images: Vec<ImageResource>,
    pub alphas: Vec<AlphaResource>,
    pub links: Vec<LinkAnnotation>,
}

/// Encode a page's instructions into a content stream
pub fn encode_page(page: &PageOutput) -> ExportResult<EncodedPage> {
    let mut encoder = Encoder::default();
    for instruction in &page.instructions {
        encoder.instruction(instruction);
    }

    let content = Content {
        operations: encoder.operations,
    }
    .encode()?;

    Ok(EncodedPage {
        content,
        fonts: encoder.fonts,
        images: encoder.images,
        alphas: encoder.alphas,
        links: encoder.links,
    })
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn reals<const N: usize>(values: [f32; N]) -> Vec<Object> {
    values.into_iter().map(Object::from).collect()
}

fn name(name: &str) -> Object {
    Object::Name(name.as_bytes().to_vec())
}

fn rgb(color: Color) -> [f32; 3] {
    let (r, g, b, _) = color.to_normalized();
    [r, g, b]
}

#[derive(Default)]
struct Encoder {
    operations: Vec<Operation>,
    fonts: Vec<FontResource>,
    images: Vec<ImageResource>,
    alphas: Vec<AlphaResource>,
    links: Vec<LinkAnnotation>,
}

impl Encoder {
    fn instruction(&mut self, instruction: &DrawInstruction) {
        match instruction {
            DrawInstruction::Rect {
                placement,
                fill,
                stroke,
                opacity,
            } => {
                self.begin(*opacity, placement.rotation_degrees, placement.rotation_origin);
                let r = placement.rect;
                self.colors(*fill, *stroke);
                self.operations
                    .push(op("re", reals([r.x, r.y, r.width, r.height])));
                self.paint(*fill, *stroke);
                self.end();
            }
            DrawInstruction::Ellipse {
                placement,
                fill,
                stroke,
                opacity,
            } => {
                self.begin(*opacity, placement.rotation_degrees, placement.rotation_origin);
                self.colors(*fill, *stroke);
                self.ellipse_path(placement.rect);
                self.paint(*fill, *stroke);
                self.end();
            }
            DrawInstruction::Text {
                origin,
                text,
                font,
                font_size,
                color,
                opacity,
                rotation_degrees,
                rotation_origin,
            } => {
                let font_name = self.font(font.base_font());
                self.begin(*opacity, *rotation_degrees, *rotation_origin);
                self.operations.push(op("BT", vec![]));
                self.operations
                    .push(op("Tf", vec![name(&font_name), Object::from(*font_size)]));
                self.operations.push(op("rg", reals(rgb(*color))));
                self.operations.push(op("Td", reals([origin.x, origin.y])));
                let (bytes, replaced) = win_ansi(text);
                if replaced > 0 {
                    tracing::debug!(replaced, "characters outside WinAnsi replaced");
                }
                self.operations
                    .push(op("Tj", vec![Object::String(bytes, StringFormat::Literal)]));
                self.operations.push(op("ET", vec![]));
                self.end();
            }
            DrawInstruction::Line {
                start,
                end,
                color,
                width,
                opacity,
                rotation_degrees,
                rotation_origin,
            } => {
                self.begin(*opacity, *rotation_degrees, *rotation_origin);
                self.operations.push(op("RG", reals(rgb(*color))));
                self.operations.push(op("w", reals([*width])));
                self.operations.push(op("m", reals([start.x, start.y])));
                self.operations.push(op("l", reals([end.x, end.y])));
                self.operations.push(op("S", vec![]));
                self.end();
            }
            DrawInstruction::Image {
                id,
                placement,
                opacity,
                flip,
                image,
            } => {
                let image_name = format!("Im{}", self.images.len());
                self.images.push(ImageResource {
                    name: image_name.clone(),
                    id: *id,
                    image: image.clone(),
                });
                self.begin(*opacity, placement.rotation_degrees, placement.rotation_origin);
                let r = placement.rect;
                let (a, e) = if flip.horizontal {
                    (-r.width, r.x + r.width)
                } else {
                    (r.width, r.x)
                };
                let (d, f) = if flip.vertical {
                    (-r.height, r.y + r.height)
                } else {
                    (r.height, r.y)
                };
                self.operations
                    .push(op("cm", reals([a, 0.0, 0.0, d, e, f])));
                self.operations.push(op("Do", vec![name(&image_name)]));
                self.end();
            }
            DrawInstruction::LinkArea { rect, url } => self.links.push(LinkAnnotation {
                rect: [rect.x, rect.y, rect.x + rect.width, rect.y + rect.height],
                url: url.clone(),
            }),
        }
    }

    /// Save state, then apply alpha and rotation
    fn begin(&mut self, opacity: f32, rotation_degrees: f32, origin: OutputPoint) {
        self.operations.push(op("q", vec![]));
        if opacity < 1.0 {
            let alpha_name = self.alpha(opacity);
            self.operations.push(op("gs", vec![name(&alpha_name)]));
        }
        if rotation_degrees != 0.0 {
            let (sin, cos) = rotation_degrees.to_radians().sin_cos();
            let tx = origin.x - origin.x * cos + origin.y * sin;
            let ty = origin.y - origin.x * sin - origin.y * cos;
            self.operations
                .push(op("cm", reals([cos, sin, -sin, cos, tx, ty])));
        }
    }

    fn end(&mut self) {
        self.operations.push(op("Q", vec![]));
    }

    /// Color state must be set before path construction starts
    fn colors(&mut self, fill: Option<Color>, stroke: Option<Stroke>) {
        if let Some(color) = fill {
            self.operations.push(op("rg", reals(rgb(color))));
        }
        if let Some(stroke) = stroke {
            self.operations.push(op("RG", reals(rgb(stroke.color))));
            self.operations.push(op("w", reals([stroke.width])));
        }
    }

    fn paint(&mut self, fill: Option<Color>, stroke: Option<Stroke>) {
        let operator = match (fill.is_some(), stroke.is_some()) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => "n",
        };
        self.operations.push(op(operator, vec![]));
    }

    fn ellipse_path(&mut self, rect: OutputRect) {
        let rx = rect.width / 2.0;
        let ry = rect.height / 2.0;
        let cx = rect.x + rx;
        let cy = rect.y + ry;
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);

        self.operations.push(op("m", reals([cx + rx, cy])));
        let curves = [
            [cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry],
            [cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy],
            [cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry],
            [cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy],
        ];
        for curve in curves {
            self.operations.push(op("c", reals(curve)));
        }
        self.operations.push(op("h", vec![]));
    }

    fn font(&mut self, base_font: &'static str) -> String {
        if let Some(existing) = self.fonts.iter().find(|f| f.base_font == base_font) {
            return existing.name.clone();
        }
        let font_name = format!("F{}", self.fonts.len() + 1);
        self.fonts.push(FontResource {
            name: font_name.clone(),
            base_font,
            encoding: TEXT_ENCODING,
        });
        font_name
    }

    fn alpha(&mut self, alpha: f32) -> String {
        let alpha = alpha.clamp(0.0, 1.0);
        if let Some(existing) = self.alphas.iter().find(|a| a.alpha == alpha) {
            return existing.name.clone();
        }
        let alpha_name = format!("GS{}", self.alphas.len() + 1);
        self.alphas.push(AlphaResource {
            name: alpha_name.clone(),
            alpha,
        });
        alpha_name
    }
}

/// Transcode to WinAnsi, returning the bytes and how many characters had
/// no code and became `?`
pub fn win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|ch| match ch {
            '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        })
        .collect();
    (bytes, replaced)
}
