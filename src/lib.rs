//! # Parchment
//!
//! A certificate template engine.
//!
//! A template is an ordered list of pages, each a fixed-size canvas holding
//! an ordered list of positioned elements: text, the recipient's name, a
//! date, a grade, an image, a border, a QR code. Element types are plug-ins
//! that opt into capabilities (render, persist, form, validate, restore)
//! and are looked up by a string tag at runtime. The same template renders
//! to a PDF for a real recipient or to HTML for the editor preview.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON document / editor forms)
//!       ↓
//!   [template]  Structural operations, events after commit
//!       ↓
//!   [store]     Templates, pages, element records
//!       ↓
//!   [element]   Registry + capability traits; [elements] ships the types
//!       ↓
//!   [layout]    Reference-point placement
//!       ↓
//!   [render]    PdfCanvas (PDF bytes) or HtmlRenderer (preview markup)
//! ```

pub mod color;
pub mod config;
pub mod context;
pub mod element;
pub mod elements;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod issuance;
pub mod layout;
pub mod model;
pub mod render;
pub mod sequence;
pub mod store;
pub mod template;
pub mod text;

pub use config::EngineConfig;
pub use context::User;
pub use element::ElementRegistry;
pub use error::{ParchmentError, Result};
pub use store::{MemoryStore, Store};
pub use template::{TemplateDocument, TemplateEvent, TemplateService};

use context::AllowAll;
use font::FontContext;
use model::Id;
use render::RenderContext;

/// Import a template document into a fresh in-memory store.
fn import(json: &str, config: &EngineConfig) -> Result<(TemplateService<MemoryStore>, Id)> {
    let document = TemplateDocument::from_json(json)?;
    let mut service = TemplateService::new(
        MemoryStore::new(),
        ElementRegistry::with_builtin(),
        Box::new(AllowAll),
        config.clone(),
    );
    let template_id = service.import_document(&document)?;
    Ok((service, template_id))
}

/// Render a template document described as JSON to PDF bytes.
///
/// Nothing backs the render with course data, files or issues, so
/// data-bound elements show their preview values when `preview` is set
/// and draw nothing otherwise.
pub fn render_json(json: &str, preview: bool) -> Result<Vec<u8>> {
    render_json_with(json, preview, &EngineConfig::default())
}

pub fn render_json_with(json: &str, preview: bool, config: &EngineConfig) -> Result<Vec<u8>> {
    let (service, template_id) = import(json, config)?;
    let fonts = FontContext::new();
    let ctx = RenderContext::standalone(config, &fonts);
    render::orchestrator::generate_pdf(
        service.store(),
        service.registry(),
        template_id,
        &User::preview(),
        preview,
        &ctx,
    )
}

/// The editor preview markup for one page (zero-based) of a template
/// document.
pub fn preview_json(json: &str, page_index: usize) -> Result<String> {
    let config = EngineConfig::default();
    let (service, template_id) = import(json, &config)?;
    let page = service
        .store()
        .pages(template_id)
        .into_iter()
        .nth(page_index)
        .ok_or(ParchmentError::NotFound {
            kind: "page",
            id: page_index as u64,
        })?;
    let fonts = FontContext::new();
    let ctx = RenderContext::standalone(&config, &fonts);
    render::orchestrator::render_preview_page(service.store(), service.registry(), page.id, &ctx)
}
