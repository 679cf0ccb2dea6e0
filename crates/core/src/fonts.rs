//! Standard font resolution
//!
//! Maps a free-form family name plus weight and style onto the twelve
//! built-in Helvetica, Times and Courier faces every page writer ships.
//! Resolution never fails: unknown families fall back to Helvetica.

use crate::annotation::{FontStyle, FontWeight, TextContent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Classify a family name, falling back to Helvetica
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("courier") || name.contains("mono") {
            FontFamily::Courier
        } else if name.contains("sans") || name.contains("helvetica") || name.contains("arial") {
            FontFamily::Helvetica
        } else if name.contains("times") || name.contains("serif") || name.contains("georgia") {
            FontFamily::Times
        } else {
            FontFamily::Helvetica
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontVariant {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    pub fn from_weight_style(weight: FontWeight, style: FontStyle) -> Self {
        match (weight, style) {
            (FontWeight::Normal, FontStyle::Normal) => FontVariant::Regular,
            (FontWeight::Bold, FontStyle::Normal) => FontVariant::Bold,
            (FontWeight::Normal, FontStyle::Italic) => FontVariant::Italic,
            (FontWeight::Bold, FontStyle::Italic) => FontVariant::BoldItalic,
        }
    }
}

/// One of the twelve built-in faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StandardFont {
    pub family: FontFamily,
    pub variant: FontVariant,
}

impl StandardFont {
    pub fn resolve(family: &str, weight: FontWeight, style: FontStyle) -> Self {
        Self {
            family: FontFamily::from_name(family),
            variant: FontVariant::from_weight_style(weight, style),
        }
    }

    pub fn for_text(content: &TextContent) -> Self {
        Self::resolve(&content.font_family, content.font_weight, content.font_style)
    }

    /// PostScript base-font name
    pub fn base_font(&self) -> &'static str {
        use FontFamily::*;
        use FontVariant::*;
        match (self.family, self.variant) {
            (Helvetica, Regular) => "Helvetica",
            (Helvetica, Bold) => "Helvetica-Bold",
            (Helvetica, Italic) => "Helvetica-Oblique",
            (Helvetica, BoldItalic) => "Helvetica-BoldOblique",
            (Times, Regular) => "Times-Roman",
            (Times, Bold) => "Times-Bold",
            (Times, Italic) => "Times-Italic",
            (Times, BoldItalic) => "Times-BoldItalic",
            (Courier, Regular) => "Courier",
            (Courier, Bold) => "Courier-Bold",
            (Courier, Italic) => "Courier-Oblique",
            (Courier, BoldItalic) => "Courier-BoldOblique",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification() {
        assert_eq!(FontFamily::from_name("Times New Roman"), FontFamily::Times);
        assert_eq!(FontFamily::from_name("serif"), FontFamily::Times);
        assert_eq!(FontFamily::from_name("sans-serif"), FontFamily::Helvetica);
        assert_eq!(FontFamily::from_name("Courier New"), FontFamily::Courier);
        assert_eq!(FontFamily::from_name("monospace"), FontFamily::Courier);
        assert_eq!(FontFamily::from_name("Arial"), FontFamily::Helvetica);
    }

    #[test]
    fn test_unknown_family_falls_back_to_helvetica() {
        let font = StandardFont::resolve("Comic Sans MS", FontWeight::Bold, FontStyle::Italic);
        assert_eq!(font.base_font(), "Helvetica-BoldOblique");

        let font = StandardFont::resolve("Papyrus", FontWeight::Normal, FontStyle::Normal);
        assert_eq!(font.base_font(), "Helvetica");
    }

    #[test]
    fn test_variants() {
        let cases = [
            (FontWeight::Normal, FontStyle::Normal, "Times-Roman"),
            (FontWeight::Bold, FontStyle::Normal, "Times-Bold"),
            (FontWeight::Normal, FontStyle::Italic, "Times-Italic"),
            (FontWeight::Bold, FontStyle::Italic, "Times-BoldItalic"),
        ];
        for (weight, style, expected) in cases {
            assert_eq!(StandardFont::resolve("Times", weight, style).base_font(), expected);
        }
    }
}
