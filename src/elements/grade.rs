//! The user's grade for the course, a grade item or a course module.

use serde::{Deserialize, Serialize};

use super::options;
use crate::context::{GradeInfo, GradeItemRef, IdMapping, MappedKind, User};
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Restorable, Validatable,
};
use crate::error::{Result, ValidationErrors};
use crate::model::{ElementRecord, Id, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const TAG: &str = "grade";

const GRADE_ITEM_PREFIX: &str = "gradeitem:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GradeFormat {
    #[default]
    Percentage,
    Points,
    Letter,
}

impl GradeFormat {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(GradeFormat::Percentage),
            2 => Some(GradeFormat::Points),
            3 => Some(GradeFormat::Letter),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            GradeFormat::Percentage => 1,
            GradeFormat::Points => 2,
            GradeFormat::Letter => 3,
        }
    }

    pub fn format(self, grade: &GradeInfo) -> String {
        match self {
            GradeFormat::Percentage => format!("{:.2}%", grade.percentage),
            GradeFormat::Points => format!("{:.2}", grade.points),
            GradeFormat::Letter => grade.letter.clone(),
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            GradeFormat::Percentage => "100.00%",
            GradeFormat::Points => "100.00",
            GradeFormat::Letter => "A",
        }
    }
}

/// Parse a stored grade item: `course`, `gradeitem:<id>` or a course
/// module id.
pub fn parse_grade_item(value: &str) -> Option<GradeItemRef> {
    let value = value.trim();
    if value == "course" {
        return Some(GradeItemRef::Course);
    }
    if let Some(id) = value.strip_prefix(GRADE_ITEM_PREFIX) {
        return id.parse().ok().map(GradeItemRef::Item);
    }
    value.parse::<Id>().ok().map(GradeItemRef::Module)
}

pub fn encode_grade_item(item: &GradeItemRef) -> String {
    match item {
        GradeItemRef::Course => "course".to_string(),
        GradeItemRef::Item(id) => format!("{}{}", GRADE_ITEM_PREFIX, id),
        GradeItemRef::Module(id) => id.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradePayload {
    pub gradeitem: String,
    pub gradeformat: u8,
}

impl Default for GradePayload {
    fn default() -> Self {
        Self {
            gradeitem: "course".to_string(),
            gradeformat: GradeFormat::Percentage.code(),
        }
    }
}

impl GradePayload {
    fn format(&self) -> GradeFormat {
        GradeFormat::from_code(self.gradeformat as i64).unwrap_or_default()
    }
}

pub struct GradeElement {
    record: ElementRecord,
}

impl GradeElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn payload(&self) -> Result<GradePayload> {
        Ok(self.record.payload::<GradePayload>()?.unwrap_or_default())
    }
}

impl ElementType for GradeElement {
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
    fn as_restorable(&self) -> Option<&dyn Restorable> {
        Some(self)
    }
}

impl Renderable for GradeElement {
    fn render(&self, canvas: &mut dyn Canvas, preview: bool, user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        let format = payload.format();
        if preview {
            return render_content(canvas, &self.record, format.placeholder());
        }
        let grade = parse_grade_item(&payload.gradeitem).and_then(|item| ctx.lookups.grade(user, &item));
        match grade {
            Some(grade) => render_content(canvas, &self.record, &format.format(&grade)),
            None => {
                log::debug!(
                    "grade element {}: no grade for '{}'",
                    self.record.id,
                    payload.gradeitem
                );
                Ok(())
            }
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let payload = self.payload()?;
        html.render_content(&self.record, payload.format().placeholder())
    }
}

impl Persistable for GradeElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let defaults = GradePayload::default();
        let payload = GradePayload {
            gradeitem: form
                .get_trimmed("gradeitem")
                .and_then(parse_grade_item)
                .map(|item| encode_grade_item(&item))
                .unwrap_or(defaults.gradeitem),
            gradeformat: form
                .get_i64("gradeformat")
                .and_then(GradeFormat::from_code)
                .map(GradeFormat::code)
                .unwrap_or(defaults.gradeformat),
        };
        Payload::encode(TAG, &payload).map(Some)
    }
}

impl FormDefinable for GradeElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::text("gradeitem", "Grade item"));
        fields.push(FormField::select(
            "gradeformat",
            "Grade format",
            options(&[("1", "Percentage"), ("2", "Points"), ("3", "Letter")]),
        ));
    }
}

impl Preparable for GradeElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(payload) = self.payload() {
            form.set("gradeitem", payload.gradeitem);
            form.set("gradeformat", payload.gradeformat.to_string());
        }
    }
}

impl Validatable for GradeElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(item) = form.get("gradeitem") {
            if parse_grade_item(item).is_none() {
                errors.add("gradeitem", "Unknown grade item");
            }
        }
        if form.contains("gradeformat") && form.get_i64("gradeformat").and_then(GradeFormat::from_code).is_none() {
            errors.add("gradeformat", "Unknown grade format");
        }
        Ok(errors)
    }
}

impl Restorable for GradeElement {
    fn after_restore(&self, mapping: &dyn IdMapping) -> Result<Option<String>> {
        let payload = self.payload()?;
        let remapped = match parse_grade_item(&payload.gradeitem) {
            Some(GradeItemRef::Item(old)) => mapping.map(MappedKind::GradeItem, old).map(GradeItemRef::Item),
            Some(GradeItemRef::Module(old)) => mapping
                .map(MappedKind::CourseModule, old)
                .map(GradeItemRef::Module),
            _ => None,
        };
        match remapped {
            Some(item) => Payload::encode(
                TAG,
                &GradePayload {
                    gradeitem: encode_grade_item(&item),
                    ..payload
                },
            )
            .map(Some),
            None => Ok(None),
        }
    }
}
