//! # Rendering
//!
//! Two backends draw the same elements:
//!
//! ```text
//!   Template → Page(s) → Element(s) in sequence order
//!                              │
//!               ┌──────────────┴──────────────┐
//!        Renderable::render           Renderable::render_html
//!               │                             │
//!        dyn Canvas (PdfCanvas)         HtmlRenderer
//!               └───── layout::place ─────────┘
//! ```
//!
//! [`Canvas`] is the document surface. It works in millimetres with the
//! origin at the top-left of the page; the PDF writer converts on output.
//! Text-bearing elements never position themselves: they call
//! [`render_content`] (or [`html::HtmlRenderer::render_content`]) so the
//! reference-point rules live in one place.

pub mod html;
pub mod orchestrator;
pub mod pdf;

use crate::color::Color;
use crate::config::EngineConfig;
use crate::context::{DomainLookups, FileStorage, NoDomainData, NoFiles};
use crate::error::Result;
use crate::font::{FontContext, FontSpec};
use crate::image_loader::LoadedImage;
use crate::issuance::{IssueLookup, NoIssues};
use crate::layout;
use crate::model::{Alignment, ElementRecord, Orientation};

/// A paginated drawing surface.
///
/// Every drawing call fails with a render error until [`Canvas::add_page`]
/// has opened a page.
pub trait Canvas {
    /// Open a new page and make it current. Sizes are millimetres.
    fn add_page(&mut self, orientation: Orientation, width: f64, height: f64) -> Result<()>;
    fn set_margins(&mut self, left: f64, right: f64) -> Result<()>;
    /// Move the cursor.
    fn set_xy(&mut self, x: f64, y: f64) -> Result<()>;
    fn set_font(&mut self, spec: &FontSpec, size_pt: f64) -> Result<()>;
    fn set_text_color(&mut self, color: Color) -> Result<()>;
    /// Width of `text` in the current font, in millimetres.
    fn string_width(&self, text: &str) -> f64;
    /// Write `text` into a cell of `width` at the cursor, wrapping lines
    /// that do not fit. Zero width extends the cell to the right margin.
    fn write_cell(&mut self, width: f64, text: &str, align: Alignment) -> Result<()>;
    fn image(&mut self, image: &LoadedImage, x: f64, y: f64, width: f64, height: f64) -> Result<()>;
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, line_width: f64, color: Color) -> Result<()>;
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) -> Result<()>;
    /// Current page width in millimetres, 0 with no page open.
    fn page_width(&self) -> f64;
    fn page_height(&self) -> f64;
    fn page_count(&self) -> usize;
}

/// Read-only collaborators and settings available to elements while they
/// draw.
pub struct RenderContext<'a> {
    pub config: &'a EngineConfig,
    pub fonts: &'a FontContext,
    pub lookups: &'a dyn DomainLookups,
    pub files: &'a dyn FileStorage,
    pub issues: &'a dyn IssueLookup,
}

impl<'a> RenderContext<'a> {
    /// A context with no course data, files or issues behind it.
    pub fn standalone(config: &'a EngineConfig, fonts: &'a FontContext) -> Self {
        Self {
            config,
            fonts,
            lookups: &NoDomainData,
            files: &NoFiles,
            issues: &NoIssues,
        }
    }

    pub fn with_lookups(mut self, lookups: &'a dyn DomainLookups) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn with_files(mut self, files: &'a dyn FileStorage) -> Self {
        self.files = files;
        self
    }

    pub fn with_issues(mut self, issues: &'a dyn IssueLookup) -> Self {
        self.issues = issues;
        self
    }
}

/// Draw a run of text for an element, honouring its font, colour,
/// reference point and width constraint.
pub fn render_content(canvas: &mut dyn Canvas, record: &ElementRecord, content: &str) -> Result<()> {
    let spec = record.font_spec()?;
    canvas.set_font(&spec, record.font_size)?;
    canvas.set_text_color(element_colour(record))?;

    let actual_width = canvas.string_width(content);
    let placement = layout::place(record.posx, record.width_constraint(), record.refpoint, actual_width);

    canvas.set_xy(placement.x, record.posy)?;
    canvas.write_cell(placement.width, content, record.alignment)
}

/// The element's colour, black if the stored value does not parse.
pub fn element_colour(record: &ElementRecord) -> Color {
    Color::parse(&record.colour).unwrap_or(Color::BLACK)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ParchmentError;

    /// Records every call, measuring every character as 2mm wide.
    #[derive(Default)]
    pub(crate) struct RecordingCanvas {
        pub pages: Vec<(Orientation, f64, f64)>,
        pub ops: Vec<String>,
        cursor: (f64, f64),
    }

    impl RecordingCanvas {
        fn require_page(&self) -> Result<()> {
            if self.pages.is_empty() {
                Err(ParchmentError::Render("no page open".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl Canvas for RecordingCanvas {
        fn add_page(&mut self, orientation: Orientation, width: f64, height: f64) -> Result<()> {
            self.pages.push((orientation, width, height));
            self.ops.push(format!("page {}x{}", width, height));
            Ok(())
        }
        fn set_margins(&mut self, left: f64, right: f64) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!("margins {} {}", left, right));
            Ok(())
        }
        fn set_xy(&mut self, x: f64, y: f64) -> Result<()> {
            self.require_page()?;
            self.cursor = (x, y);
            Ok(())
        }
        fn set_font(&mut self, spec: &FontSpec, size_pt: f64) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!("font {} {}", spec.encode(), size_pt));
            Ok(())
        }
        fn set_text_color(&mut self, _color: Color) -> Result<()> {
            self.require_page()
        }
        fn string_width(&self, text: &str) -> f64 {
            text.chars().count() as f64 * 2.0
        }
        fn write_cell(&mut self, width: f64, text: &str, align: Alignment) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!(
                "cell x={:.1} y={:.1} w={:.1} {} '{}'",
                self.cursor.0,
                self.cursor.1,
                width,
                align.as_str(),
                text
            ));
            Ok(())
        }
        fn image(&mut self, image: &LoadedImage, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!(
                "image {}x{}px at {:.1},{:.1} {:.1}x{:.1}",
                image.width_px, image.height_px, x, y, width, height
            ));
            Ok(())
        }
        fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, _w: f64, _c: Color) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!("line {:.1},{:.1} {:.1},{:.1}", x1, y1, x2, y2));
            Ok(())
        }
        fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, _c: Color) -> Result<()> {
            self.require_page()?;
            self.ops.push(format!("rect {:.2},{:.2} {:.2}x{:.2}", x, y, width, height));
            Ok(())
        }
        fn page_width(&self) -> f64 {
            self.pages.last().map(|p| p.1).unwrap_or(0.0)
        }
        fn page_height(&self) -> f64 {
            self.pages.last().map(|p| p.2).unwrap_or(0.0)
        }
        fn page_count(&self) -> usize {
            self.pages.len()
        }
    }

    impl RecordingCanvas {
        pub fn cells(&self) -> Vec<&str> {
            self.ops
                .iter()
                .filter(|op| op.starts_with("cell"))
                .map(String::as_str)
                .collect()
        }
    }

    #[test]
    fn test_render_content_applies_reference_point() {
        let mut canvas = RecordingCanvas::default();
        canvas.add_page(Orientation::Portrait, 210.0, 297.0).unwrap();

        let mut record = ElementRecord::new(1, "text", "T");
        record.posx = 105.0;
        record.posy = 50.0;
        // "Award" is 10mm wide in the recording canvas.
        render_content(&mut canvas, &record, "Award").unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=100.0 y=50.0 w=10.0 L 'Award'"]);
    }

    #[test]
    fn test_render_content_needs_a_page() {
        let mut canvas = RecordingCanvas::default();
        let record = ElementRecord::new(1, "text", "T");
        assert!(matches!(
            render_content(&mut canvas, &record, "x"),
            Err(ParchmentError::Render(_))
        ));
    }

    #[test]
    fn test_bad_font_is_rejected_before_drawing() {
        let mut canvas = RecordingCanvas::default();
        canvas.add_page(Orientation::Portrait, 210.0, 297.0).unwrap();
        let mut record = ElementRecord::new(1, "text", "T");
        record.font = "x".to_string();
        assert!(matches!(
            render_content(&mut canvas, &record, "x"),
            Err(ParchmentError::InvalidFontSpec(_))
        ));
        assert!(canvas.cells().is_empty());
    }
}
