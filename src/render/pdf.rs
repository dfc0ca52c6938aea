//! # PDF Canvas
//!
//! A [`Canvas`] that records drawing operations page by page and writes a
//! PDF 1.7 file on [`PdfCanvas::finish`].
//!
//! ```text
//! %PDF-1.7
//! 1 0 obj Catalog        2 0 obj Pages
//! fonts, image XObjects, then per page: content stream + Page
//! Info, xref, trailer, %%EOF
//! ```
//!
//! Content streams are built as the elements draw, already in PDF user
//! space (points, origin bottom-left). The canvas itself takes
//! millimetres from the top-left like the rest of the engine.
//!
//! Standard fonts are Type1 references with WinAnsiEncoding. Custom
//! TrueType fonts are embedded whole as CIDFontType2 with Identity-H, the
//! CIDs being the font's own glyph ids.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use miniz_oxide::deflate::compress_to_vec_zlib;

use super::Canvas;
use crate::color::Color;
use crate::error::{ParchmentError, Result};
use crate::font::{CustomFontMetrics, FontContext, FontData, FontSpec, PT_PER_MM};
use crate::image_loader::{ImagePixelData, JpegColorSpace, LoadedImage};
use crate::model::{Alignment, Orientation};
use crate::text::break_into_lines;

/// Line height as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.25;

struct CanvasPage {
    width: f64,
    height: f64,
    left_margin: f64,
    right_margin: f64,
    content: String,
}

struct TextState {
    font: usize,
    size: f64,
    color: Color,
}

pub struct PdfCanvas<'a> {
    fonts: &'a FontContext,
    title: Option<String>,
    creator: String,
    pages: Vec<CanvasPage>,
    /// Fonts in first-use order; the index is the `/F` resource number.
    used_fonts: Vec<FontSpec>,
    /// Characters drawn per custom font, for its /W and ToUnicode tables.
    used_chars: HashMap<usize, BTreeSet<char>>,
    /// Images in first-use order; the index is the `/Im` resource number.
    images: Vec<LoadedImage>,
    text: TextState,
    cursor: (f64, f64),
}

struct PdfObject {
    data: Vec<u8>,
}

impl<'a> PdfCanvas<'a> {
    pub fn new(fonts: &'a FontContext) -> Self {
        let mut canvas = Self {
            fonts,
            title: None,
            creator: "Parchment".to_string(),
            pages: Vec::new(),
            used_fonts: Vec::new(),
            used_chars: HashMap::new(),
            images: Vec::new(),
            text: TextState {
                font: 0,
                size: 12.0,
                color: Color::BLACK,
            },
            cursor: (0.0, 0.0),
        };
        canvas.text.font = canvas.font_index(&FontSpec::new("times", false, false));
        canvas
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_creator(mut self, creator: &str) -> Self {
        self.creator = creator.to_string();
        self
    }

    /// Left and right margin of the current page.
    pub fn margins(&self) -> Option<(f64, f64)> {
        self.pages.last().map(|p| (p.left_margin, p.right_margin))
    }

    fn current_page(&mut self) -> Result<&mut CanvasPage> {
        self.pages
            .last_mut()
            .ok_or_else(|| ParchmentError::Render("no page is open; call add_page first".to_string()))
    }

    fn font_index(&mut self, spec: &FontSpec) -> usize {
        match self.used_fonts.iter().position(|f| f == spec) {
            Some(i) => i,
            None => {
                self.used_fonts.push(spec.clone());
                self.used_fonts.len() - 1
            }
        }
    }

    fn measure_pt(&self, text: &str) -> f64 {
        self.fonts
            .measure_string(text, &self.used_fonts[self.text.font], self.text.size)
    }

    /// Encode a line for the current font as a PDF string operand.
    fn encode_text(&mut self, text: &str) -> String {
        let fonts = self.fonts;
        match fonts.resolve(&self.used_fonts[self.text.font]) {
            FontData::Standard(_) => {
                let mut out = String::from("(");
                for ch in text.chars() {
                    match unicode_to_winansi(ch).unwrap_or(b'?') {
                        b'(' => out.push_str("\\("),
                        b')' => out.push_str("\\)"),
                        b'\\' => out.push_str("\\\\"),
                        b @ 0x20..=0x7E => out.push(b as char),
                        b => {
                            let _ = write!(out, "\\{:03o}", b);
                        }
                    }
                }
                out.push(')');
                out
            }
            FontData::Custom { metrics, .. } => {
                let chars = self.used_chars.entry(self.text.font).or_default();
                let mut out = String::from("<");
                for ch in text.chars() {
                    chars.insert(ch);
                    let gid = metrics.glyph_ids.get(&ch).copied().unwrap_or(0);
                    let _ = write!(out, "{:04X}", gid);
                }
                out.push('>');
                out
            }
        }
    }

    /// Serialize everything drawn so far.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(ParchmentError::Render("document has no pages".to_string()));
        }

        let mut objects: Vec<PdfObject> = Vec::new();
        // 0 is the free-list head, 1 the Catalog, 2 the page tree.
        for _ in 0..3 {
            objects.push(PdfObject { data: Vec::new() });
        }

        let mut font_refs = Vec::new();
        for (index, spec) in self.used_fonts.iter().enumerate() {
            let id = match self.fonts.resolve(spec) {
                FontData::Standard(font) => push_object(
                    &mut objects,
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                        font.pdf_name()
                    )
                    .into_bytes(),
                ),
                FontData::Custom { data, metrics } => {
                    let chars = self.used_chars.get(&index).cloned().unwrap_or_default();
                    write_custom_font_objects(&mut objects, spec, data, metrics, &chars)?
                }
            };
            font_refs.push(format!("/F{} {} 0 R", index, id));
        }

        let mut image_refs = Vec::new();
        for (index, image) in self.images.iter().enumerate() {
            let id = write_image_xobject(&mut objects, image);
            image_refs.push(format!("/Im{} {} 0 R", index, id));
        }

        let mut resources = format!("/Font << {} >>", font_refs.join(" "));
        if !image_refs.is_empty() {
            let _ = write!(resources, " /XObject << {} >>", image_refs.join(" "));
        }

        let mut page_ids = Vec::new();
        for page in &self.pages {
            let content_id = push_object(&mut objects, compressed_stream("", page.content.as_bytes()));
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Contents {} 0 R /Resources << {} >> >>",
                page.width * PT_PER_MM,
                page.height * PT_PER_MM,
                content_id,
                resources
            );
            page_ids.push(push_object(&mut objects, page_dict.into_bytes()));
        }

        objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
        objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_ids.len()
        )
        .into_bytes();

        let mut info = String::from("<< ");
        if let Some(title) = &self.title {
            let _ = write!(info, "/Title ({}) ", escape_pdf_string(title));
        }
        let _ = write!(
            info,
            "/Producer (Parchment {}) /Creator ({}) >>",
            env!("CARGO_PKG_VERSION"),
            escape_pdf_string(&self.creator)
        );
        let info_id = push_object(&mut objects, info.into_bytes());

        log::debug!(
            "writing PDF: {} pages, {} fonts, {} images",
            self.pages.len(),
            self.used_fonts.len(),
            self.images.len()
        );
        Ok(serialize(&objects, info_id))
    }
}

impl Canvas for PdfCanvas<'_> {
    fn add_page(&mut self, orientation: Orientation, width: f64, height: f64) -> Result<()> {
        if width <= 0.0 || height <= 0.0 {
            return Err(ParchmentError::Render(format!(
                "invalid page size {}x{}",
                width, height
            )));
        }
        // The orientation decides which side is the long one.
        let (width, height) = match orientation {
            Orientation::Landscape => (width.max(height), width.min(height)),
            Orientation::Portrait => (width.min(height), width.max(height)),
        };
        self.pages.push(CanvasPage {
            width,
            height,
            left_margin: 0.0,
            right_margin: 0.0,
            content: String::new(),
        });
        self.cursor = (0.0, 0.0);
        Ok(())
    }

    fn set_margins(&mut self, left: f64, right: f64) -> Result<()> {
        let page = self.current_page()?;
        page.left_margin = left.max(0.0);
        page.right_margin = right.max(0.0);
        Ok(())
    }

    fn set_xy(&mut self, x: f64, y: f64) -> Result<()> {
        self.current_page()?;
        self.cursor = (x, y);
        Ok(())
    }

    fn set_font(&mut self, spec: &FontSpec, size_pt: f64) -> Result<()> {
        self.current_page()?;
        if size_pt <= 0.0 {
            return Err(ParchmentError::Render(format!("invalid font size {}", size_pt)));
        }
        self.text.font = self.font_index(spec);
        self.text.size = size_pt;
        Ok(())
    }

    fn set_text_color(&mut self, color: Color) -> Result<()> {
        self.current_page()?;
        self.text.color = color;
        Ok(())
    }

    fn string_width(&self, text: &str) -> f64 {
        self.measure_pt(text) / PT_PER_MM
    }

    fn write_cell(&mut self, width: f64, text: &str, align: Alignment) -> Result<()> {
        let (x, y) = self.cursor;
        let (page_width, page_height, right_margin) = {
            let page = self.current_page()?;
            (page.width, page.height, page.right_margin)
        };

        let cell_width = if width > 0.0 {
            width
        } else {
            (page_width - right_margin - x).max(0.0)
        };

        let lines = break_into_lines(text, cell_width, |s| self.measure_pt(s) / PT_PER_MM);

        let size_mm = self.text.size / PT_PER_MM;
        let line_height = size_mm * LINE_HEIGHT;
        let mut ops = String::new();
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_width = self.measure_pt(line) / PT_PER_MM;
            let offset = match align {
                Alignment::L => 0.0,
                Alignment::C => ((cell_width - line_width) / 2.0).max(0.0),
                Alignment::R => (cell_width - line_width).max(0.0),
            };
            let top = y + i as f64 * line_height;
            let baseline = top + (line_height - size_mm) / 2.0 + size_mm * 0.8;
            let operand = self.encode_text(line);
            let c = self.text.color;
            let _ = write!(
                ops,
                "BT\n/F{} {:.2} Tf\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} Td\n{} Tj\nET\n",
                self.text.font,
                self.text.size,
                c.r,
                c.g,
                c.b,
                (x + offset) * PT_PER_MM,
                (page_height - baseline) * PT_PER_MM,
                operand
            );
        }

        self.current_page()?.content.push_str(&ops);
        self.cursor = (x, y + lines.len() as f64 * line_height);
        Ok(())
    }

    fn image(&mut self, image: &LoadedImage, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        let page_height = self.current_page()?.height;
        let index = self.images.len();
        self.images.push(image.clone());
        let page = self.current_page()?;
        let _ = write!(
            page.content,
            "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
            width * PT_PER_MM,
            height * PT_PER_MM,
            x * PT_PER_MM,
            (page_height - y - height) * PT_PER_MM,
            index
        );
        Ok(())
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, line_width: f64, color: Color) -> Result<()> {
        let page = self.current_page()?;
        let h = page.height;
        let _ = write!(
            page.content,
            "q\n{:.3} {:.3} {:.3} RG\n{:.2} w\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
            color.r,
            color.g,
            color.b,
            line_width * PT_PER_MM,
            x1 * PT_PER_MM,
            (h - y1) * PT_PER_MM,
            x2 * PT_PER_MM,
            (h - y2) * PT_PER_MM
        );
        Ok(())
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) -> Result<()> {
        let page = self.current_page()?;
        let h = page.height;
        let _ = write!(
            page.content,
            "q\n{:.3} {:.3} {:.3} rg\n{:.3} {:.3} {:.3} {:.3} re\nf\nQ\n",
            color.r,
            color.g,
            color.b,
            x * PT_PER_MM,
            (h - y - height) * PT_PER_MM,
            width * PT_PER_MM,
            height * PT_PER_MM
        );
        Ok(())
    }

    fn page_width(&self) -> f64 {
        self.pages.last().map(|p| p.width).unwrap_or(0.0)
    }

    fn page_height(&self) -> f64 {
        self.pages.last().map(|p| p.height).unwrap_or(0.0)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }
}

fn push_object(objects: &mut Vec<PdfObject>, data: Vec<u8>) -> usize {
    objects.push(PdfObject { data });
    objects.len() - 1
}

/// A FlateDecode stream object. `extra` goes into the dictionary as-is.
fn compressed_stream(extra: &str, raw: &[u8]) -> Vec<u8> {
    let compressed = compress_to_vec_zlib(raw, 6);
    let mut data: Vec<u8> = Vec::new();
    let _ = write!(
        data,
        "<< /Length {}{} /Filter /FlateDecode >>\nstream\n",
        compressed.len(),
        extra
    );
    data.extend_from_slice(&compressed);
    data.extend_from_slice(b"\nendstream");
    data
}

fn write_image_xobject(objects: &mut Vec<PdfObject>, image: &LoadedImage) -> usize {
    match &image.pixel_data {
        ImagePixelData::Jpeg { data, color_space } => {
            let color_space = match color_space {
                JpegColorSpace::DeviceRGB => "/DeviceRGB",
                JpegColorSpace::DeviceGray => "/DeviceGray",
            };
            let mut obj: Vec<u8> = Vec::new();
            let _ = write!(
                obj,
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} \
                 /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
                image.width_px,
                image.height_px,
                color_space,
                data.len()
            );
            obj.extend_from_slice(data);
            obj.extend_from_slice(b"\nendstream");
            push_object(objects, obj)
        }
        ImagePixelData::Decoded { rgb, alpha } => {
            let smask = alpha.as_ref().map(|alpha| {
                let dict = format!(
                    " /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8",
                    image.width_px, image.height_px
                );
                push_object(objects, compressed_stream(&dict, alpha))
            });
            let mut dict = format!(
                " /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8",
                image.width_px, image.height_px
            );
            if let Some(id) = smask {
                let _ = write!(dict, " /SMask {} 0 R", id);
            }
            push_object(objects, compressed_stream(&dict, rgb))
        }
    }
}

/// Embed a TrueType font as the five objects a Type0/CIDFontType2 font
/// needs. Returns the Type0 object id.
fn write_custom_font_objects(
    objects: &mut Vec<PdfObject>,
    spec: &FontSpec,
    ttf_data: &[u8],
    metrics: &CustomFontMetrics,
    used_chars: &BTreeSet<char>,
) -> Result<usize> {
    let face = ttf_parser::Face::parse(ttf_data, 0).map_err(|e| {
        ParchmentError::Render(format!("failed to parse font '{}': {}", spec.encode(), e))
    })?;
    let name = sanitize_font_name(spec);
    let scale = 1000.0 / metrics.units_per_em as f64;

    let fontfile_id = push_object(
        objects,
        compressed_stream(&format!(" /Length1 {}", ttf_data.len()), ttf_data),
    );

    let bbox = face.global_bounding_box();
    let cap_height = face.capital_height().unwrap_or(metrics.ascender) as f64 * scale;
    let descriptor = format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags 4 /FontBBox [{} {} {} {}] /ItalicAngle {} \
         /Ascent {} /Descent {} /CapHeight {} /StemV {} /FontFile2 {} 0 R >>",
        name,
        (bbox.x_min as f64 * scale) as i32,
        (bbox.y_min as f64 * scale) as i32,
        (bbox.x_max as f64 * scale) as i32,
        (bbox.y_max as f64 * scale) as i32,
        if spec.italic { -12 } else { 0 },
        (metrics.ascender as f64 * scale) as i32,
        (metrics.descender as f64 * scale) as i32,
        cap_height as i32,
        if spec.bold { 120 } else { 80 },
        fontfile_id
    );
    let descriptor_id = push_object(objects, descriptor.into_bytes());

    let glyphs: Vec<(char, u16)> = used_chars
        .iter()
        .filter_map(|ch| metrics.glyph_ids.get(ch).map(|gid| (*ch, *gid)))
        .collect();

    let mut widths = String::from("[");
    let mut seen = BTreeSet::new();
    for (ch, gid) in &glyphs {
        if seen.insert(*gid) {
            let advance = metrics.advance_widths.get(ch).copied().unwrap_or(metrics.default_advance);
            let _ = write!(widths, " {} [{}]", gid, (advance as f64 * scale) as u32);
        }
    }
    widths.push_str(" ]");

    let cidfont = format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
         /FontDescriptor {} 0 R /DW {} /W {} /CIDToGIDMap /Identity >>",
        name,
        descriptor_id,
        (metrics.default_advance as f64 * scale) as u32,
        widths
    );
    let cidfont_id = push_object(objects, cidfont.into_bytes());

    let cmap = build_tounicode_cmap(&glyphs, &name);
    let tounicode_id = push_object(objects, compressed_stream("", cmap.as_bytes()));

    let type0 = format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H \
         /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        name, cidfont_id, tounicode_id
    );
    Ok(push_object(objects, type0.into_bytes()))
}

fn build_tounicode_cmap(glyphs: &[(char, u16)], font_name: &str) -> String {
    let mut sorted: Vec<(u16, u32)> = glyphs.iter().map(|(ch, gid)| (*gid, *ch as u32)).collect();
    sorted.sort_unstable();
    sorted.dedup_by_key(|(gid, _)| *gid);

    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    cmap.push_str("/CIDSystemInfo\n<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
    cmap.push_str("/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");
    // At most 100 entries per bfchar block.
    for chunk in sorted.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, unicode) in chunk {
            let _ = writeln!(cmap, "<{:04X}> <{:04X}>", gid, unicode);
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

fn sanitize_font_name(spec: &FontSpec) -> String {
    let mut name: String = spec
        .family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        name = "CustomFont".to_string();
    }
    if spec.bold {
        name.push_str("-Bold");
    }
    if spec.italic {
        name.push_str("-Italic");
    }
    name
}

fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Map a character to its WinAnsiEncoding (Windows-1252) byte.
fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95),
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

fn serialize(objects: &[PdfObject], info_id: usize) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::new();
    let mut offsets = vec![0usize; objects.len()];

    output.extend_from_slice(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");
    for (i, obj) in objects.iter().enumerate().skip(1) {
        offsets[i] = output.len();
        let _ = write!(output, "{} 0 obj\n", i);
        output.extend_from_slice(&obj.data);
        output.extend_from_slice(b"\nendobj\n\n");
    }

    let xref_offset = output.len();
    let _ = write!(output, "xref\n0 {}\n0000000000 65535 f \n", objects.len());
    for offset in offsets.iter().skip(1) {
        let _ = write!(output, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        output,
        "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len(),
        info_id,
        xref_offset
    );
    output
}
