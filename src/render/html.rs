//! HTML preview backend.
//!
//! Produces the markup the drag-and-drop editor works on. A page is a
//! container sized in millimetres with its margins drawn as guides; each
//! element is an absolutely positioned `div.element` carrying its id and
//! reference point so the editor can translate drags back into `posx`.

use std::fmt::Write as FmtWrite;

use super::{element_colour, RenderContext};
use crate::error::Result;
use crate::font::{FontData, FontSpec, StandardFont};
use crate::layout;
use crate::model::{ElementRecord, Page};

pub struct HtmlRenderer<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RenderContext<'a> {
        self.ctx
    }

    /// Markup for a run of text, placed by the element's reference point.
    pub fn render_content(&self, record: &ElementRecord, content: &str) -> Result<String> {
        let spec = record.font_spec()?;
        let actual_width = self.ctx.fonts.measure_mm(content, &spec, record.font_size);
        let placement = layout::place(record.posx, record.width_constraint(), record.refpoint, actual_width);

        let mut style = String::new();
        let _ = write!(
            style,
            "font-family: {}; font-size: {}pt; color: {}; text-align: {};",
            self.css_font_family(&spec),
            record.font_size,
            element_colour(record).to_hex(),
            record.alignment.css(),
        );
        if spec.bold {
            style.push_str(" font-weight: bold;");
        }
        if spec.italic {
            style.push_str(" font-style: italic;");
        }

        let width = if placement.width > 0.0 {
            Some(placement.width)
        } else {
            None
        };
        let inner = format!(
            "<div class=\"content\" style=\"{}\">{}</div>",
            style,
            escape_html(content).replace('\n', "<br>")
        );
        Ok(self.positioned(record, placement.x, record.posy, width, None, &inner))
    }

    /// Wrap already-built markup in the element's positioned container.
    pub fn positioned(
        &self,
        record: &ElementRecord,
        x: f64,
        y: f64,
        width: Option<f64>,
        height: Option<f64>,
        inner: &str,
    ) -> String {
        let mut style = format!("position: absolute; left: {:.2}mm; top: {:.2}mm;", x, y);
        if let Some(w) = width {
            let _ = write!(style, " width: {:.4}mm;", w);
        }
        if let Some(h) = height {
            let _ = write!(style, " height: {:.2}mm;", h);
        }
        format!(
            "<div class=\"element {}\" data-id=\"{}\" data-refpoint=\"{}\" style=\"{}\">{}</div>",
            escape_html(&record.element_type),
            record.id,
            record.refpoint.code(),
            style,
            inner
        )
    }

    /// Wrap markup in a container covering the whole page.
    pub fn full_page(&self, record: &ElementRecord, inner: &str) -> String {
        format!(
            "<div class=\"element {}\" data-id=\"{}\" \
             style=\"position: absolute; left: 0; top: 0; width: 100%; height: 100%;\">{}</div>",
            escape_html(&record.element_type),
            record.id,
            inner
        )
    }

    /// The page container around the element markup.
    pub fn page(&self, page: &Page, elements: &[String]) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<div class=\"page\" data-id=\"{}\" data-sequence=\"{}\" \
             style=\"position: relative; width: {}mm; height: {}mm;\">",
            page.id, page.sequence, page.width, page.height
        );
        if page.left_margin > 0.0 {
            let _ = write!(
                html,
                "<div class=\"margin-guide left\" style=\"position: absolute; left: {}mm; top: 0; height: 100%;\"></div>",
                page.left_margin
            );
        }
        if page.right_margin > 0.0 {
            let _ = write!(
                html,
                "<div class=\"margin-guide right\" style=\"position: absolute; right: {}mm; top: 0; height: 100%;\"></div>",
                page.right_margin
            );
        }
        for element in elements {
            html.push_str(element);
        }
        html.push_str("</div>");
        html
    }

    fn css_font_family(&self, spec: &FontSpec) -> String {
        match self.ctx.fonts.resolve(spec) {
            FontData::Standard(font) => match font {
                StandardFont::TimesRoman
                | StandardFont::TimesBold
                | StandardFont::TimesItalic
                | StandardFont::TimesBoldItalic => "Times, serif".to_string(),
                StandardFont::Courier
                | StandardFont::CourierBold
                | StandardFont::CourierOblique
                | StandardFont::CourierBoldOblique => "Courier, monospace".to_string(),
                _ => "Helvetica, Arial, sans-serif".to_string(),
            },
            FontData::Custom { .. } => format!("'{}'", escape_html(&spec.family)),
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::font::FontContext;
    use crate::layout::ReferencePoint;
    use crate::model::PageSettings;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_content_is_placed_like_the_document() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let html = HtmlRenderer::new(&ctx);

        let mut record = ElementRecord::new(1, "text", "T");
        record.id = 42;
        record.font = "courier".to_string();
        record.posx = 100.0;
        record.posy = 20.0;
        record.refpoint = ReferencePoint::TopRight;
        // 10 Courier chars at 12pt = 25.4mm
        let out = html.render_content(&record, "0123456789").unwrap();
        assert!(out.contains("left: 74.60mm"), "{}", out);
        assert!(out.contains("width: 25.4001mm"), "{}", out);
        assert!(out.contains("data-id=\"42\""));
        assert!(out.contains("data-refpoint=\"2\""));
        assert!(out.contains("Courier, monospace"));
    }

    #[test]
    fn test_page_container_has_margin_guides() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let html = HtmlRenderer::new(&ctx);

        let mut settings = PageSettings::A4;
        settings.left_margin = 10.0;
        let page = Page::new(1, settings);
        let out = html.page(&page, &["<p>x</p>".to_string()]);
        assert!(out.starts_with("<div class=\"page\""));
        assert!(out.contains("width: 210mm; height: 297mm;"));
        assert!(out.contains("margin-guide left"));
        assert!(!out.contains("margin-guide right"));
        assert!(out.ends_with("<p>x</p></div>"));
    }
}
