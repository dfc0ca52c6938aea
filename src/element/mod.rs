//! # Element Type System
//!
//! An element is a stored [`ElementRecord`] plus behaviour selected by its
//! type tag. The behaviour is split into narrow capabilities that a type
//! opts into:
//!
//! ```text
//!   ElementType ──┬── as_renderable()     draw to a Canvas / preview HTML
//!                 ├── as_persistable()    form submission → payload
//!                 ├── as_form_definable() extra edit-form fields
//!                 ├── as_preparable()     payload → edit-form values
//!                 ├── as_validatable()    extra validation rules
//!                 └── as_restorable()     remap ids after a restore
//! ```
//!
//! Callers ask for a capability and skip the element when it says `None`.
//! The orchestrator never matches on type tags; the [`ElementRegistry`] is
//! the only place a tag turns into code.

pub mod form;
pub mod legacy;
pub mod registry;

pub use form::{FormData, FormField};
pub use legacy::{LegacyAdapter, LegacyElement};
pub use registry::ElementRegistry;

use crate::context::{IdMapping, User};
use crate::error::{Result, ValidationErrors};
use crate::model::ElementRecord;
use crate::render::html::HtmlRenderer;
use crate::render::{Canvas, RenderContext};

/// Common form fields for text-bearing elements.
pub const TEXT_FIELDS: &[&str] = &[
    "name", "font", "fontsize", "colour", "posx", "posy", "width", "refpoint", "alignment",
];

/// Common form fields for elements that only have a position.
pub const POSITION_FIELDS: &[&str] = &["name", "posx", "posy", "refpoint"];

/// A concrete element built from a stored record.
pub trait ElementType {
    fn record(&self) -> &ElementRecord;
    fn record_mut(&mut self) -> &mut ElementRecord;

    fn tag(&self) -> &str {
        &self.record().element_type
    }

    /// Which of the common fields the edit form shows for this type.
    fn common_fields(&self) -> &'static [&'static str] {
        TEXT_FIELDS
    }

    fn as_renderable(&self) -> Option<&dyn Renderable> {
        None
    }
    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
    fn as_form_definable(&self) -> Option<&dyn FormDefinable> {
        None
    }
    fn as_preparable(&self) -> Option<&dyn Preparable> {
        None
    }
    fn as_validatable(&self) -> Option<&dyn Validatable> {
        None
    }
    fn as_restorable(&self) -> Option<&dyn Restorable> {
        None
    }
}

pub trait Renderable {
    /// Draw onto the current canvas page.
    ///
    /// In preview mode the element must not read real issuance data and
    /// shows placeholder values instead.
    fn render(
        &self,
        canvas: &mut dyn Canvas,
        preview: bool,
        user: &User,
        ctx: &RenderContext<'_>,
    ) -> Result<()>;

    /// Markup for the drag-and-drop editor.
    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String>;
}

pub trait Persistable {
    /// Turn a form submission into the payload to store. `None` clears it.
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>>;
}

pub trait FormDefinable {
    fn form_fields(&self, fields: &mut Vec<FormField>);
}

pub trait Preparable {
    /// Fill type-specific form values from the stored payload.
    fn prepare_form(&self, form: &mut FormData);
}

pub trait Validatable {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors>;
}

pub trait Restorable {
    /// The rewritten payload, or `None` if nothing referenced a remapped id.
    fn after_restore(&self, mapping: &dyn IdMapping) -> Result<Option<String>>;
}
