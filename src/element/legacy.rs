//! Adapter for element types written against the older, single-trait
//! element API.
//!
//! Those types implement [`LegacyElement`]: one trait with every hook,
//! most of them optional. [`LegacyAdapter`] exposes such a type through
//! the capability interface, so the orchestrator and the template service
//! only ever see [`ElementType`].

use super::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Restorable, Validatable,
};
use crate::context::{IdMapping, User};
use crate::error::{Result, ValidationErrors};
use crate::model::ElementRecord;
use crate::render::html::HtmlRenderer;
use crate::render::{Canvas, RenderContext};

pub trait LegacyElement {
    fn record(&self) -> &ElementRecord;
    fn record_mut(&mut self) -> &mut ElementRecord;

    fn render(
        &self,
        canvas: &mut dyn Canvas,
        preview: bool,
        user: &User,
        ctx: &RenderContext<'_>,
    ) -> Result<()>;

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String>;

    /// The payload to store for a submission. The default keeps none.
    fn save_unique_data(&self, _form: &FormData) -> Option<String> {
        None
    }

    fn render_form_elements(&self, _fields: &mut Vec<FormField>) {}

    fn definition_after_data(&self, _form: &mut FormData) {}

    fn validate_form_elements(&self, _form: &FormData) -> ValidationErrors {
        ValidationErrors::new()
    }

    fn after_restore(&self, _mapping: &dyn IdMapping) -> Option<String> {
        None
    }
}

pub struct LegacyAdapter<T> {
    inner: T,
}

impl<T: LegacyElement> LegacyAdapter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: LegacyElement> ElementType for LegacyAdapter<T> {
    fn record(&self) -> &ElementRecord {
        self.inner.record()
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        self.inner.record_mut()
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
    fn as_restorable(&self) -> Option<&dyn Restorable> {
        Some(self)
    }
}

impl<T: LegacyElement> Renderable for LegacyAdapter<T> {
    fn render(
        &self,
        canvas: &mut dyn Canvas,
        preview: bool,
        user: &User,
        ctx: &RenderContext<'_>,
    ) -> Result<()> {
        self.inner.render(canvas, preview, user, ctx)
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        self.inner.render_html(html)
    }
}

impl<T: LegacyElement> Persistable for LegacyAdapter<T> {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        Ok(self.inner.save_unique_data(form))
    }
}

impl<T: LegacyElement> FormDefinable for LegacyAdapter<T> {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        self.inner.render_form_elements(fields)
    }
}

impl<T: LegacyElement> Preparable for LegacyAdapter<T> {
    fn prepare_form(&self, form: &mut FormData) {
        self.inner.definition_after_data(form)
    }
}

impl<T: LegacyElement> Validatable for LegacyAdapter<T> {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        Ok(self.inner.validate_form_elements(form))
    }
}

impl<T: LegacyElement> Restorable for LegacyAdapter<T> {
    fn after_restore(&self, mapping: &dyn IdMapping) -> Result<Option<String>> {
        Ok(self.inner.after_restore(mapping))
    }
}
