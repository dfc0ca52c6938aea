//! # Font Management
//!
//! Resolves font identifiers to something the PDF writer can reference and
//! the layout code can measure.
//!
//! The standard PDF faces (Helvetica, Times, Courier) need no embedding.
//! Common certificate families are aliased onto them, so `freeserif` draws
//! as Times and `freesans` as Helvetica. Custom TrueType fonts can be
//! registered at runtime; their metrics come from ttf-parser and the PDF
//! writer embeds them.

pub mod metrics;
pub mod spec;

pub use metrics::StandardFontMetrics;
pub use spec::FontSpec;

use std::collections::HashMap;

use crate::error::{ParchmentError, Result};

/// Points per millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// The standard PDF faces Parchment draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    fn face(base: StandardBase, bold: bool, italic: bool) -> Self {
        match (base, bold, italic) {
            (StandardBase::Helvetica, false, false) => Self::Helvetica,
            (StandardBase::Helvetica, true, false) => Self::HelveticaBold,
            (StandardBase::Helvetica, false, true) => Self::HelveticaOblique,
            (StandardBase::Helvetica, true, true) => Self::HelveticaBoldOblique,
            (StandardBase::Times, false, false) => Self::TimesRoman,
            (StandardBase::Times, true, false) => Self::TimesBold,
            (StandardBase::Times, false, true) => Self::TimesItalic,
            (StandardBase::Times, true, true) => Self::TimesBoldItalic,
            (StandardBase::Courier, false, false) => Self::Courier,
            (StandardBase::Courier, true, false) => Self::CourierBold,
            (StandardBase::Courier, false, true) => Self::CourierOblique,
            (StandardBase::Courier, true, true) => Self::CourierBoldOblique,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StandardBase {
    Helvetica,
    Times,
    Courier,
}

/// Family names drawn with a standard face, and which one.
const STANDARD_FAMILIES: &[(&str, StandardBase)] = &[
    ("helvetica", StandardBase::Helvetica),
    ("freesans", StandardBase::Helvetica),
    ("arial", StandardBase::Helvetica),
    ("dejavusans", StandardBase::Helvetica),
    ("times", StandardBase::Times),
    ("freeserif", StandardBase::Times),
    ("dejavuserif", StandardBase::Times),
    ("courier", StandardBase::Courier),
    ("freemono", StandardBase::Courier),
    ("dejavusansmono", StandardBase::Courier),
];

/// What a font spec resolves to.
#[derive(Debug, Clone, Copy)]
pub enum FontData<'a> {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType font that needs to be embedded.
    Custom {
        data: &'a [u8],
        metrics: &'a CustomFontMetrics,
    },
}

#[derive(Debug)]
struct CustomFont {
    data: Vec<u8>,
    metrics: CustomFontMetrics,
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        // Basic Multilingual Plane only; certificates don't need more.
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            glyph_ids,
        })
    }
}

/// Maps a decoded font spec to font data.
pub struct FontRegistry {
    custom: HashMap<FontSpec, CustomFont>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
        }
    }

    /// Look up a font. Custom fonts win over aliases; anything unknown
    /// draws as Helvetica with the requested style.
    pub fn resolve(&self, spec: &FontSpec) -> FontData<'_> {
        if let Some(font) = self.custom.get(spec) {
            return FontData::Custom {
                data: &font.data,
                metrics: &font.metrics,
            };
        }
        let base = STANDARD_FAMILIES
            .iter()
            .find(|(family, _)| *family == spec.family)
            .map(|(_, base)| *base)
            .unwrap_or(StandardBase::Helvetica);
        FontData::Standard(StandardFont::face(base, spec.bold, spec.italic))
    }

    /// Register a custom TrueType font for one family/style combination.
    pub fn register(&mut self, spec: FontSpec, data: Vec<u8>) -> Result<()> {
        let metrics = CustomFontMetrics::from_font_data(&data).ok_or_else(|| {
            ParchmentError::Render(format!("'{}' is not a usable TrueType font", spec.encode()))
        })?;
        self.custom.insert(spec, CustomFont { data, metrics });
        Ok(())
    }

    pub fn is_custom(&self, spec: &FontSpec) -> bool {
        self.custom.contains_key(spec)
    }

    fn custom_families(&self) -> Vec<String> {
        let mut families: Vec<String> = self.custom.keys().map(|s| s.family.clone()).collect();
        families.sort();
        families.dedup();
        families
    }
}

/// Shared font context used by the renderers.
/// Provides text measurement with real glyph metrics.
#[derive(Default)]
pub struct FontContext {
    registry: FontRegistry,
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Measure the width of a string in points.
    pub fn measure_string(&self, text: &str, spec: &FontSpec, font_size: f64) -> f64 {
        match self.registry.resolve(spec) {
            FontData::Standard(std_font) => std_font.metrics().measure_string(text, font_size, 0.0),
            FontData::Custom { metrics, .. } => {
                text.chars().map(|ch| metrics.char_width(ch, font_size)).sum()
            }
        }
    }

    /// Measure the width of a string in millimetres.
    pub fn measure_mm(&self, text: &str, spec: &FontSpec, font_size: f64) -> f64 {
        self.measure_string(text, spec, font_size) / PT_PER_MM
    }

    pub fn resolve(&self, spec: &FontSpec) -> FontData<'_> {
        self.registry.resolve(spec)
    }

    pub fn register(&mut self, spec: FontSpec, data: Vec<u8>) -> Result<()> {
        self.registry.register(spec, data)
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    /// Font identifiers offered by the element edit form, as (identifier, label).
    pub fn available_fonts(&self) -> Vec<(String, String)> {
        let mut families: Vec<String> = ["courier", "helvetica", "times", "freesans", "freeserif"]
            .iter()
            .map(|f| f.to_string())
            .collect();
        for family in self.registry.custom_families() {
            if !families.contains(&family) {
                families.push(family);
            }
        }

        let mut fonts = Vec::new();
        for family in families {
            for (bold, italic, style) in [
                (false, false, ""),
                (true, false, " Bold"),
                (false, true, " Italic"),
                (true, true, " Bold Italic"),
            ] {
                let spec = FontSpec::new(&family, bold, italic);
                fonts.push((spec.encode(), format!("{}{}", capitalise(&family), style)));
            }
        }
        fonts
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
