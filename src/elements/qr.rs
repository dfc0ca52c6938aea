//! A QR code linking to the certificate's verification page.

use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

use crate::context::User;
use crate::element::form::format_number;
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Validatable, POSITION_FIELDS,
};
use crate::error::{Result, ValidationErrors};
use crate::model::{ElementRecord, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{element_colour, Canvas, RenderContext};

pub const TAG: &str = "qrcode";

const DEFAULT_SIZE: f64 = 35.0;
const CSS_PX_PER_MM: f64 = 96.0 / 25.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrCodePayload {
    pub width: f64,
    pub height: f64,
}

impl Default for QrCodePayload {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
        }
    }
}

pub struct QrCodeElement {
    record: ElementRecord,
}

impl QrCodeElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn payload(&self) -> Result<QrCodePayload> {
        Ok(self.record.payload::<QrCodePayload>()?.unwrap_or_default())
    }

    fn encode(&self, url: &str) -> Option<QrCode> {
        match QrCode::new(url.as_bytes()) {
            Ok(code) => Some(code),
            Err(e) => {
                log::warn!("qrcode element {}: cannot encode '{}': {}", self.record.id, url, e);
                None
            }
        }
    }
}

impl ElementType for QrCodeElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
    }

    fn common_fields(&self) -> &'static [&'static str] {
        POSITION_FIELDS
    }

    fn as_renderable(&self) -> Option<&dyn Renderable> {
        Some(self)
    }
    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
    fn as_form_definable(&self) -> Option<&dyn FormDefinable> {
        Some(self)
    }
    fn as_preparable(&self) -> Option<&dyn Preparable> {
        Some(self)
    }
    fn as_validatable(&self) -> Option<&dyn Validatable> {
        Some(self)
    }
}

impl Renderable for QrCodeElement {
    fn render(&self, canvas: &mut dyn Canvas, preview: bool, user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        let url = if preview {
            ctx.config.site_url.clone()
        } else {
            match ctx.issues.issue_code(user) {
                Some(code) => ctx.config.verify_url(&code),
                None => {
                    log::debug!("qrcode element {}: user {} has no issue", self.record.id, user.id);
                    return Ok(());
                }
            }
        };
        let Some(code) = self.encode(&url) else {
            return Ok(());
        };

        let payload = self.payload()?;
        let modules = code.width();
        let module_w = payload.width / modules as f64;
        let module_h = payload.height / modules as f64;
        let colour = element_colour(&self.record);
        for (i, module) in code.to_colors().into_iter().enumerate() {
            if module != qrcode::Color::Dark {
                continue;
            }
            let (row, col) = (i / modules, i % modules);
            canvas.fill_rect(
                self.record.posx + col as f64 * module_w,
                self.record.posy + row as f64 * module_h,
                module_w,
                module_h,
                colour,
            )?;
        }
        Ok(())
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let payload = self.payload()?;
        let Some(code) = self.encode(&html.context().config.site_url) else {
            return Ok(String::new());
        };
        let dark = element_colour(&self.record).to_hex();
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(
                (payload.width * CSS_PX_PER_MM).round() as u32,
                (payload.height * CSS_PX_PER_MM).round() as u32,
            )
            .dark_color(svg::Color(&dark))
            .light_color(svg::Color("#ffffff"))
            .quiet_zone(false)
            .build();
        Ok(html.positioned(
            &self.record,
            self.record.posx,
            self.record.posy,
            Some(payload.width),
            Some(payload.height),
            &image,
        ))
    }
}

impl Persistable for QrCodeElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let defaults = QrCodePayload::default();
        let payload = QrCodePayload {
            width: form.get_f64("width").filter(|w| *w > 0.0).unwrap_or(defaults.width),
            height: form.get_f64("height").filter(|h| *h > 0.0).unwrap_or(defaults.height),
        };
        Payload::encode(TAG, &payload).map(Some)
    }
}

impl FormDefinable for QrCodeElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::number("width", "Width"));
        fields.push(FormField::number("height", "Height"));
    }
}

impl Preparable for QrCodeElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(payload) = self.payload() {
            form.set("width", format_number(payload.width));
            form.set("height", format_number(payload.height));
        }
    }
}

impl Validatable for QrCodeElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(height) = form.get_trimmed("height") {
            match height.parse::<f64>() {
                Ok(h) if h >= 0.0 => {}
                _ => errors.add("height", "Must be a number of at least 0"),
            }
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::elements::testutil::{a4_canvas, record};
    use crate::font::FontContext;
    use crate::issuance::{CertificateIssues, Issuer, MemoryIssueStore};

    fn rects(ops: &[String]) -> Vec<&String> {
        ops.iter().filter(|op| op.starts_with("rect")).collect()
    }

    #[test]
    fn test_preview_draws_modules_inside_the_box() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = a4_canvas();

        QrCodeElement::new(record(TAG, Some(r#"{"width":42,"height":42}"#)))
            .render(&mut canvas, true, &User::preview(), &ctx)
            .unwrap();
        let drawn = rects(&canvas.ops);
        assert!(!drawn.is_empty());
        // The top-left finder pattern starts at the element's position.
        assert!(drawn[0].starts_with("rect 10.00,20.00 "), "{}", drawn[0]);
    }

    #[test]
    fn test_real_render_needs_an_issue() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let user = User::new(1, "Ada", "Lovelace");
        let mut store = MemoryIssueStore::new();
        let ctx_empty = RenderContext::standalone(&config, &fonts);

        let mut canvas = a4_canvas();
        let element = QrCodeElement::new(record(TAG, None));
        element.render(&mut canvas, false, &user, &ctx_empty).unwrap();
        assert!(rects(&canvas.ops).is_empty());

        Issuer::new(&mut store, &config).issue(4, &user).unwrap();
        let issues = CertificateIssues::new(&store, 4);
        let ctx = RenderContext::standalone(&config, &fonts).with_issues(&issues);
        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &user, &ctx).unwrap();
        assert!(!rects(&canvas.ops).is_empty());
    }

    #[test]
    fn test_html_is_inline_svg() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let html = HtmlRenderer::new(&ctx);
        let markup = QrCodeElement::new(record(TAG, None)).render_html(&html).unwrap();
        assert!(markup.contains("<svg"), "{}", markup);
        assert!(markup.contains("width: 35.0000mm; height: 35.00mm;"));
    }

    #[test]
    fn test_url_beyond_capacity_draws_nothing() {
        let config = EngineConfig {
            site_url: format!("https://example.org/{}", "a".repeat(3000)),
            ..EngineConfig::default()
        };
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let element = QrCodeElement::new(record(TAG, None));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, true, &User::preview(), &ctx).unwrap();
        assert!(rects(&canvas.ops).is_empty());

        let html = HtmlRenderer::new(&ctx);
        assert_eq!(element.render_html(&html).unwrap(), "");
    }

    #[test]
    fn test_blank_size_falls_back() {
        let element = QrCodeElement::new(record(TAG, None));
        let data = element
            .normalise_data(&FormData::from_pairs([("width", ""), ("height", "20")]))
            .unwrap();
        assert_eq!(data.as_deref(), Some(r#"{"width":35.0,"height":20.0}"#));
    }
}
