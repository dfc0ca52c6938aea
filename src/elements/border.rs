//! A line around the edge of the page.

use serde::{Deserialize, Serialize};

use crate::context::User;
use crate::element::form::format_number;
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Validatable,
};
use crate::error::{Result, ValidationErrors};
use crate::model::{ElementRecord, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{element_colour, Canvas, RenderContext};

pub const TAG: &str = "border";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderPayload {
    /// Line width in millimetres.
    pub width: f64,
}

pub struct BorderElement {
    record: ElementRecord,
}

impl BorderElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn payload(&self) -> Result<BorderPayload> {
        Ok(self.record.payload::<BorderPayload>()?.unwrap_or_default())
    }
}

impl ElementType for BorderElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
    }

    fn common_fields(&self) -> &'static [&'static str] {
        &["name", "colour"]
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

impl Renderable for BorderElement {
    fn render(&self, canvas: &mut dyn Canvas, _preview: bool, _user: &User, _ctx: &RenderContext<'_>) -> Result<()> {
        let line_width = self.payload()?.width;
        if line_width <= 0.0 {
            return Ok(());
        }
        let colour = element_colour(&self.record);
        let (w, h) = (canvas.page_width(), canvas.page_height());
        canvas.line(0.0, 0.0, w, 0.0, line_width, colour)?;
        canvas.line(w, 0.0, w, h, line_width, colour)?;
        canvas.line(0.0, h, w, h, line_width, colour)?;
        canvas.line(0.0, 0.0, 0.0, h, line_width, colour)
    }

    /// The editor draws the border itself.
    fn render_html(&self, _html: &HtmlRenderer<'_>) -> Result<String> {
        Ok(String::new())
    }
}

impl Persistable for BorderElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let width = form.get_f64("width").unwrap_or(0.0).max(0.0);
        Payload::encode(TAG, &BorderPayload { width }).map(Some)
    }
}

impl FormDefinable for BorderElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::number("width", "Border width"));
    }
}

impl Preparable for BorderElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(payload) = self.payload() {
            form.set("width", format_number(payload.width));
        }
    }
}

impl Validatable for BorderElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if form.get_trimmed("width").is_none() {
            errors.add("width", "Required");
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

    #[test]
    fn test_four_edges() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = a4_canvas();

        BorderElement::new(record(TAG, Some(r#"{"width":2}"#)))
            .render(&mut canvas, false, &User::preview(), &ctx)
            .unwrap();
        let lines: Vec<&String> = canvas.ops.iter().filter(|op| op.starts_with("line")).collect();
        assert_eq!(
            lines,
            vec![
                "line 0.0,0.0 210.0,0.0",
                "line 210.0,0.0 210.0,297.0",
                "line 0.0,297.0 210.0,297.0",
                "line 0.0,0.0 0.0,297.0",
            ]
        );
    }

    #[test]
    fn test_zero_width_draws_nothing() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = a4_canvas();
        BorderElement::new(record(TAG, None))
            .render(&mut canvas, false, &User::preview(), &ctx)
            .unwrap();
        assert!(!canvas.ops.iter().any(|op| op.starts_with("line")));
    }

    #[test]
    fn test_width_is_required() {
        let element = BorderElement::new(record(TAG, None));
        assert!(element.validate(&FormData::new()).unwrap().contains("width"));
        assert!(element
            .validate(&FormData::from_pairs([("width", "3")]))
            .unwrap()
            .is_empty());
    }
}
