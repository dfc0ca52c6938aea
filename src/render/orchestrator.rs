//! Drives a render: load a page, open it on the canvas, then dispatch each
//! element in sequence order.
//!
//! ```text
//!   load page → add_page(orientation, size) → set_margins → set_xy(0, 0)
//!             → for each element by sequence: render → done
//! ```
//!
//! The canvas page is always opened before the first element draws.
//! Elements without the render capability are skipped.

use super::html::HtmlRenderer;
use super::pdf::PdfCanvas;
use super::{Canvas, RenderContext};
use crate::context::User;
use crate::element::ElementRegistry;
use crate::error::Result;
use crate::model::Id;
use crate::store::Store;

/// Draw one page onto the canvas as a new canvas page.
pub fn render_document_page<S: Store + ?Sized>(
    store: &S,
    registry: &ElementRegistry,
    page_id: Id,
    canvas: &mut dyn Canvas,
    user: &User,
    preview: bool,
    ctx: &RenderContext<'_>,
) -> Result<()> {
    let page = store.page(page_id)?;
    log::debug!(
        "page {}: opening {:?} {}x{}mm",
        page.id,
        page.orientation(),
        page.width,
        page.height
    );
    canvas.add_page(page.orientation(), page.width, page.height)?;
    canvas.set_margins(page.left_margin, page.right_margin)?;
    canvas.set_xy(0.0, 0.0)?;

    for record in store.elements(page.id) {
        let element = registry.create(record)?;
        match element.as_renderable() {
            Some(renderable) => {
                log::debug!("page {}: element {} ({})", page.id, element.record().id, element.tag());
                renderable.render(canvas, preview, user, ctx)?;
            }
            None => log::debug!("page {}: element {} does not render", page.id, element.record().id),
        }
    }
    Ok(())
}

/// The editor markup for one page.
pub fn render_preview_page<S: Store + ?Sized>(
    store: &S,
    registry: &ElementRegistry,
    page_id: Id,
    ctx: &RenderContext<'_>,
) -> Result<String> {
    let page = store.page(page_id)?;
    let html = HtmlRenderer::new(ctx);
    let mut fragments = Vec::new();
    for record in store.elements(page.id) {
        let element = registry.create(record)?;
        if let Some(renderable) = element.as_renderable() {
            fragments.push(renderable.render_html(&html)?);
        }
    }
    Ok(html.page(&page, &fragments))
}

/// Draw every page of a template in sequence order.
pub fn render_template<S: Store + ?Sized>(
    store: &S,
    registry: &ElementRegistry,
    template_id: Id,
    canvas: &mut dyn Canvas,
    user: &User,
    preview: bool,
    ctx: &RenderContext<'_>,
) -> Result<()> {
    store.template(template_id)?;
    for page in store.pages(template_id) {
        render_document_page(store, registry, page.id, canvas, user, preview, ctx)?;
    }
    Ok(())
}

/// Render a whole template to PDF bytes.
pub fn generate_pdf<S: Store + ?Sized>(
    store: &S,
    registry: &ElementRegistry,
    template_id: Id,
    user: &User,
    preview: bool,
    ctx: &RenderContext<'_>,
) -> Result<Vec<u8>> {
    let template = store.template(template_id)?;
    let mut canvas = PdfCanvas::new(ctx.fonts)
        .with_title(&template.name)
        .with_creator(&ctx.config.creator);
    render_template(store, registry, template_id, &mut canvas, user, preview, ctx)?;
    canvas.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ParchmentError;
    use crate::font::FontContext;
    use crate::model::{ElementRecord, Orientation, Page, PageSettings, Template};
    use crate::render::tests::RecordingCanvas;
    use crate::store::MemoryStore;

    fn text(page_id: Id, sequence: u32, text: &str) -> ElementRecord {
        let mut record = ElementRecord::new(page_id, "text", text);
        record.sequence = sequence;
        record.posx = 100.0;
        record.posy = 10.0 * sequence as f64;
        record.data = Some(format!(r#"{{"text":"{}"}}"#, text));
        record
    }

    fn two_page_store() -> (MemoryStore, Id) {
        let mut store = MemoryStore::new();
        let template_id = store.insert_template(Template::new("Award", 1)).unwrap();

        let mut portrait = Page::new(template_id, PageSettings::A4);
        portrait.sequence = 1;
        let mut landscape = Page::new(template_id, PageSettings::A4.landscape());
        landscape.sequence = 2;
        // Inserted out of order on purpose.
        let landscape_id = store.insert_page(landscape).unwrap();
        let portrait_id = store.insert_page(portrait).unwrap();

        store.insert_element(text(portrait_id, 2, "Second")).unwrap();
        store.insert_element(text(portrait_id, 1, "First")).unwrap();
        store.insert_element(text(landscape_id, 1, "Back")).unwrap();
        (store, template_id)
    }

    #[test]
    fn test_pages_and_elements_in_sequence_order() {
        let (store, template_id) = two_page_store();
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let registry = ElementRegistry::with_builtin();
        let mut canvas = RecordingCanvas::default();

        render_template(&store, &registry, template_id, &mut canvas, &User::preview(), false, &ctx).unwrap();

        assert_eq!(
            canvas.pages,
            vec![
                (Orientation::Portrait, 210.0, 297.0),
                (Orientation::Landscape, 297.0, 210.0)
            ]
        );
        let texts: Vec<&str> = canvas
            .cells()
            .iter()
            .map(|c| c.rsplit(' ').next().unwrap_or(""))
            .collect();
        assert_eq!(texts, vec!["'First'", "'Second'", "'Back'"]);
    }

    #[test]
    fn test_page_opens_before_elements() {
        let (store, template_id) = two_page_store();
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let registry = ElementRegistry::with_builtin();
        let first_page = store.pages(template_id)[0].id;
        let mut canvas = RecordingCanvas::default();

        render_document_page(&store, &registry, first_page, &mut canvas, &User::preview(), true, &ctx).unwrap();
        assert_eq!(canvas.ops[0], "page 210x297");
        assert_eq!(canvas.ops[1], "margins 0 0");
    }

    #[test]
    fn test_unknown_type_fails_the_render() {
        let (mut store, template_id) = two_page_store();
        let page_id = store.pages(template_id)[0].id;
        let mut odd = ElementRecord::new(page_id, "hologram", "Shiny");
        odd.sequence = 3;
        store.insert_element(odd).unwrap();

        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let mut canvas = RecordingCanvas::default();
        let result = render_template(
            &store,
            &ElementRegistry::with_builtin(),
            template_id,
            &mut canvas,
            &User::preview(),
            false,
            &ctx,
        );
        assert!(matches!(result, Err(ParchmentError::UnknownElementType(t)) if t == "hologram"));
    }

    #[test]
    fn test_preview_markup_wraps_elements_in_the_page() {
        let (store, template_id) = two_page_store();
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let page_id = store.pages(template_id)[0].id;

        let html = render_preview_page(&store, &ElementRegistry::with_builtin(), page_id, &ctx).unwrap();
        assert!(html.starts_with("<div class=\"page\""));
        let first = html.find("First").unwrap();
        let second = html.find("Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_generate_pdf() {
        let (store, template_id) = two_page_store();
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);

        let pdf = generate_pdf(&store, &ElementRegistry::with_builtin(), template_id, &User::preview(), true, &ctx).unwrap();
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.starts_with("%PDF-1.7"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/Title (Award)"));
    }
}
