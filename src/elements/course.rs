//! Course name and course category name.
//!
//! The category element is written against the legacy element API and
//! reaches the engine through [`LegacyAdapter`](crate::element::LegacyAdapter).

use serde::{Deserialize, Serialize};

use super::options;
use crate::context::{Course, User};
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, LegacyElement, Persistable, Preparable,
    Renderable, Validatable,
};
use crate::error::{Result, ValidationErrors};
use crate::model::{ElementRecord, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const COURSE_NAME_TAG: &str = "coursename";
pub const CATEGORY_NAME_TAG: &str = "categoryname";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseNameField {
    #[default]
    Fullname,
    Shortname,
}

impl CourseNameField {
    fn of(self, course: &Course) -> String {
        match self {
            CourseNameField::Fullname => course.full_name.clone(),
            CourseNameField::Shortname => course.short_name.clone(),
        }
    }

    fn from_form_value(value: &str) -> Option<Self> {
        match value {
            "fullname" => Some(CourseNameField::Fullname),
            "shortname" => Some(CourseNameField::Shortname),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CourseNameField::Fullname => "fullname",
            CourseNameField::Shortname => "shortname",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseNamePayload {
    #[serde(default)]
    pub field: CourseNameField,
}

pub struct CourseNameElement {
    record: ElementRecord,
}

impl CourseNameElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn field(&self) -> Result<CourseNameField> {
        Ok(self
            .record
            .payload::<CourseNamePayload>()?
            .map(|p| p.field)
            .unwrap_or_default())
    }

    fn content(&self, preview: bool, ctx: &RenderContext<'_>) -> Result<Option<String>> {
        let field = self.field()?;
        match ctx.lookups.course() {
            Some(course) => Ok(Some(field.of(&course))),
            None if preview => Ok(Some("Course name".to_string())),
            None => {
                log::warn!("no course to name for element {}", self.record.id);
                Ok(None)
            }
        }
    }
}

impl ElementType for CourseNameElement {
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
    fn as_validatable(&self) -> Option<&dyn Validatable> {
        Some(self)
    }
}

impl Renderable for CourseNameElement {
    fn render(&self, canvas: &mut dyn Canvas, preview: bool, _user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        match self.content(preview, ctx)? {
            Some(name) => render_content(canvas, &self.record, &name),
            None => Ok(()),
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let name = self.content(true, html.context())?.unwrap_or_default();
        html.render_content(&self.record, &name)
    }
}

impl Persistable for CourseNameElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let field = form
            .get_trimmed("field")
            .and_then(CourseNameField::from_form_value)
            .unwrap_or_default();
        Payload::encode(COURSE_NAME_TAG, &CourseNamePayload { field }).map(Some)
    }
}

impl FormDefinable for CourseNameElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::select(
            "field",
            "Course name to display",
            options(&[("fullname", "Full name"), ("shortname", "Short name")]),
        ));
    }
}

impl Preparable for CourseNameElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(field) = self.field() {
            form.set("field", field.as_str());
        }
    }
}

impl Validatable for CourseNameElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(value) = form.get_trimmed("field") {
            if CourseNameField::from_form_value(value).is_none() {
                errors.add("field", "Choose the full or short name");
            }
        }
        Ok(errors)
    }
}

/// The course's category name.
pub struct CategoryNameElement {
    record: ElementRecord,
}

impl CategoryNameElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn category(ctx: &RenderContext<'_>) -> Option<String> {
        ctx.lookups.course().map(|c| c.category_name)
    }
}

impl LegacyElement for CategoryNameElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
    }

    fn render(&self, canvas: &mut dyn Canvas, preview: bool, _user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        match Self::category(ctx) {
            Some(name) => render_content(canvas, &self.record, &name),
            None if preview => render_content(canvas, &self.record, "Category name"),
            None => Ok(()),
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let name = Self::category(html.context()).unwrap_or_else(|| "Category name".to_string());
        html.render_content(&self.record, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::context::StaticLookups;
    use crate::element::ElementRegistry;
    use crate::elements::testutil::{a4_canvas, record};
    use crate::font::FontContext;

    fn course() -> Course {
        Course {
            id: 2,
            full_name: "Introduction to Typesetting".to_string(),
            short_name: "TYPE101".to_string(),
            category_name: "Design".to_string(),
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn test_short_name_from_lookups() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let lookups = StaticLookups::new().with_course(course());
        let ctx = RenderContext::standalone(&config, &fonts).with_lookups(&lookups);
        let mut canvas = a4_canvas();

        CourseNameElement::new(record(COURSE_NAME_TAG, Some(r#"{"field":"shortname"}"#)))
            .render(&mut canvas, false, &User::preview(), &ctx)
            .unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=10.0 y=20.0 w=0.0 L 'TYPE101'"]);
    }

    #[test]
    fn test_placeholder_only_in_preview() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let element = CourseNameElement::new(record(COURSE_NAME_TAG, None));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, true, &User::preview(), &ctx).unwrap();
        assert_eq!(canvas.cells().len(), 1);
        assert!(canvas.cells()[0].ends_with("'Course name'"));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &User::preview(), &ctx).unwrap();
        assert!(canvas.cells().is_empty());
    }

    #[test]
    fn test_rejects_unknown_field() {
        let element = CourseNameElement::new(record(COURSE_NAME_TAG, None));
        let errors = element
            .validate(&FormData::from_pairs([("field", "idnumber")]))
            .unwrap();
        assert!(errors.contains("field"));
    }

    #[test]
    fn test_category_goes_through_the_adapter() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let lookups = StaticLookups::new().with_course(course());
        let ctx = RenderContext::standalone(&config, &fonts).with_lookups(&lookups);
        let mut canvas = a4_canvas();

        let element = ElementRegistry::with_builtin()
            .create(record(CATEGORY_NAME_TAG, None))
            .unwrap();
        let renderable = element.as_renderable().unwrap();
        renderable.render(&mut canvas, false, &User::preview(), &ctx).unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=10.0 y=20.0 w=0.0 L 'Design'"]);
        // Legacy types keep no payload.
        assert_eq!(
            element.as_persistable().unwrap().normalise_data(&FormData::new()).unwrap(),
            None
        );
    }
}
