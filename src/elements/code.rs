//! The unique code of the user's issued certificate.

use crate::context::User;
use crate::element::{ElementType, Renderable};
use crate::error::Result;
use crate::issuance::CodeGenerator;
use crate::model::ElementRecord;
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const TAG: &str = "code";

pub struct CodeElement {
    record: ElementRecord,
}

impl CodeElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn sample(ctx: &RenderContext<'_>) -> String {
        CodeGenerator::new(ctx.config.code_format).generate()
    }
}

impl ElementType for CodeElement {
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

impl Renderable for CodeElement {
    fn render(&self, canvas: &mut dyn Canvas, preview: bool, user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        let code = if preview {
            Some(Self::sample(ctx))
        } else {
            ctx.issues.issue_code(user)
        };
        match code {
            Some(code) => render_content(canvas, &self.record, &code),
            None => {
                log::debug!("code element {}: user {} has no issue", self.record.id, user.id);
                Ok(())
            }
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        html.render_content(&self.record, &Self::sample(html.context()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::elements::testutil::{a4_canvas, record};
    use crate::font::FontContext;
    use crate::issuance::{CertificateIssues, CodeFormat, Issuer, MemoryIssueStore};
    use regex::Regex;

    #[test]
    fn test_real_render_reads_the_issue() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let user = User::new(8, "Ada", "Lovelace");
        let mut store = MemoryIssueStore::new();
        let code = Issuer::new(&mut store, &config).issue(3, &user).unwrap().code;
        let issues = CertificateIssues::new(&store, 3);
        let ctx = RenderContext::standalone(&config, &fonts).with_issues(&issues);

        let mut canvas = a4_canvas();
        CodeElement::new(record(TAG, None))
            .render(&mut canvas, false, &user, &ctx)
            .unwrap();
        assert_eq!(canvas.cells(), vec![format!("cell x=10.0 y=20.0 w=0.0 L '{}'", code).as_str()]);

        let mut canvas = a4_canvas();
        CodeElement::new(record(TAG, None))
            .render(&mut canvas, false, &User::new(9, "No", "Issue"), &ctx)
            .unwrap();
        assert!(canvas.cells().is_empty());
    }

    #[test]
    fn test_preview_generates_in_the_configured_format() {
        let config = EngineConfig {
            code_format: CodeFormat::DigitsWithHyphens,
            ..EngineConfig::default()
        };
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = a4_canvas();
        CodeElement::new(record(TAG, None))
            .render(&mut canvas, true, &User::preview(), &ctx)
            .unwrap();
        let pattern = Regex::new(r"'\d{4}-\d{4}-\d{4}'$").unwrap();
        assert!(pattern.is_match(canvas.cells()[0]), "{:?}", canvas.cells());
    }
}
