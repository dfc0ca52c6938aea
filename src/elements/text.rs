//! Free text.

use serde::{Deserialize, Serialize};

use crate::context::User;
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
};
use crate::error::Result;
use crate::model::{ElementRecord, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const TAG: &str = "text";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

pub struct TextElement {
    record: ElementRecord,
}

impl TextElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn text(&self) -> Result<String> {
        Ok(self
            .record
            .payload::<TextPayload>()?
            .map(|p| p.text)
            .unwrap_or_default())
    }
}

impl ElementType for TextElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
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
}

impl Renderable for TextElement {
    fn render(&self, canvas: &mut dyn Canvas, _preview: bool, _user: &User, _ctx: &RenderContext<'_>) -> Result<()> {
        render_content(canvas, &self.record, &self.text()?)
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        html.render_content(&self.record, &self.text()?)
    }
}

impl Persistable for TextElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let text = form.get("text").unwrap_or_default().to_string();
        Payload::encode(TAG, &TextPayload { text }).map(Some)
    }
}

impl FormDefinable for TextElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::TextArea {
            name: "text".to_string(),
            label: "Text".to_string(),
        });
    }
}

impl Preparable for TextElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(text) = self.text() {
            form.set("text", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::elements::testutil::{a4_canvas, record};
    use crate::font::FontContext;

    #[test]
    fn test_renders_stored_text() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = a4_canvas();

        let element = TextElement::new(record(TAG, Some(r#"{"text":"Awarded"}"#)));
        element.render(&mut canvas, false, &User::preview(), &ctx).unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=10.0 y=20.0 w=0.0 L 'Awarded'"]);
    }

    #[test]
    fn test_form_round_trip() {
        let element = TextElement::new(record(TAG, None));
        let data = element
            .normalise_data(&FormData::from_pairs([("text", "Hello\nworld")]))
            .unwrap();
        assert_eq!(data.as_deref(), Some(r#"{"text":"Hello\nworld"}"#));

        let reopened = TextElement::new(record(TAG, data.as_deref()));
        let mut form = FormData::new();
        reopened.prepare_form(&mut form);
        assert_eq!(form.get("text"), Some("Hello\nworld"));
    }

    #[test]
    fn test_missing_payload_renders_empty() {
        let element = TextElement::new(record(TAG, None));
        assert_eq!(element.text().unwrap(), "");
    }
}
