//! The recipient's name.

use crate::context::User;
use crate::element::{ElementType, Renderable};
use crate::error::Result;
use crate::model::ElementRecord;
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const TAG: &str = "studentname";

pub struct StudentNameElement {
    record: ElementRecord,
}

impl StudentNameElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }
}

impl ElementType for StudentNameElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
    }
    fn as_renderable(&self) -> Option<&dyn Renderable> {
        Some(self)
    }
}

impl Renderable for StudentNameElement {
    fn render(&self, canvas: &mut dyn Canvas, _preview: bool, user: &User, _ctx: &RenderContext<'_>) -> Result<()> {
        render_content(canvas, &self.record, &user.full_name())
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        html.render_content(&self.record, &User::preview().full_name())
    }
}
