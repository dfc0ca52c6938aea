//! A date taken from the issue, the course, the enrolment or a grade.

use std::fmt::Write as FmtWrite;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::options;
use crate::context::{GradeItemRef, IdMapping, MappedKind, User};
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Restorable, Validatable,
};
use crate::error::{Result, ValidationErrors};
use crate::model::{ElementRecord, Id, Payload};
use crate::render::html::HtmlRenderer;
use crate::render::{render_content, Canvas, RenderContext};

pub const TAG: &str = "date";

/// Format code used when the stored one is unusable.
pub const DEFAULT_FORMAT: &str = "1";

/// Which date the element shows. Stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateItem {
    Issue,
    Completion,
    CourseStart,
    CourseEnd,
    Current,
    EnrolmentStart,
    EnrolmentEnd,
    /// When the course total was graded.
    CourseGrade,
    /// When the grade of a course module was set.
    ModuleGrade(Id),
}

impl DateItem {
    pub fn from_code(code: i64) -> Option<Self> {
        let item = match code {
            -1 => DateItem::Issue,
            -2 => DateItem::Completion,
            -3 => DateItem::CourseStart,
            -4 => DateItem::CourseEnd,
            -5 => DateItem::Current,
            -6 => DateItem::EnrolmentStart,
            -7 => DateItem::EnrolmentEnd,
            0 => DateItem::CourseGrade,
            id if id > 0 => DateItem::ModuleGrade(id as Id),
            _ => return None,
        };
        Some(item)
    }

    pub fn code(self) -> i64 {
        match self {
            DateItem::Issue => -1,
            DateItem::Completion => -2,
            DateItem::CourseStart => -3,
            DateItem::CourseEnd => -4,
            DateItem::Current => -5,
            DateItem::EnrolmentStart => -6,
            DateItem::EnrolmentEnd => -7,
            DateItem::CourseGrade => 0,
            DateItem::ModuleGrade(id) => id as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatePayload {
    pub dateitem: i64,
    pub dateformat: String,
}

impl Default for DatePayload {
    fn default() -> Self {
        Self {
            dateitem: DateItem::Issue.code(),
            dateformat: DEFAULT_FORMAT.to_string(),
        }
    }
}

/// Format a date with one of the numbered presets or a strftime pattern.
///
/// `None` if the pattern does not parse.
pub fn format_date(date: &DateTime<Utc>, format: &str) -> Option<String> {
    let pattern = match format {
        "1" => "%B %-d, %Y",
        "2" => {
            return Some(format!(
                "{} {}{}, {}",
                date.format("%B"),
                date.day(),
                ordinal_suffix(date.day()),
                date.year()
            ))
        }
        "3" => "%-d %B %Y",
        "4" => "%B %Y",
        custom => custom,
    };
    if !is_valid_pattern(pattern) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", date.format_with_items(StrftimeItems::new(pattern))).ok()?;
    Some(out)
}

fn is_valid_pattern(pattern: &str) -> bool {
    !pattern.trim().is_empty() && !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

pub struct DateElement {
    record: ElementRecord,
}

impl DateElement {
    pub fn new(record: ElementRecord) -> Self {
        Self { record }
    }

    fn payload(&self) -> Result<DatePayload> {
        Ok(self.record.payload::<DatePayload>()?.unwrap_or_default())
    }

    fn resolve(item: DateItem, user: &User, ctx: &RenderContext<'_>) -> Option<DateTime<Utc>> {
        match item {
            DateItem::Issue => ctx.issues.issue_date(user),
            DateItem::Completion => ctx.lookups.completion_date(user),
            DateItem::CourseStart => ctx.lookups.course().and_then(|c| c.start_date),
            DateItem::CourseEnd => ctx.lookups.course().and_then(|c| c.end_date),
            DateItem::Current => Some(Utc::now()),
            DateItem::EnrolmentStart => ctx.lookups.enrolment(user).and_then(|e| e.start),
            DateItem::EnrolmentEnd => ctx.lookups.enrolment(user).and_then(|e| e.end),
            DateItem::CourseGrade => ctx
                .lookups
                .grade(user, &GradeItemRef::Course)
                .and_then(|g| g.date_graded),
            DateItem::ModuleGrade(cmid) => ctx
                .lookups
                .grade(user, &GradeItemRef::Module(cmid))
                .and_then(|g| g.date_graded),
        }
    }

    fn formatted(&self, date: &DateTime<Utc>, format: &str) -> String {
        format_date(date, format).unwrap_or_else(|| {
            log::warn!(
                "date element {} has an unusable format '{}'",
                self.record.id,
                format
            );
            format_date(date, DEFAULT_FORMAT).unwrap_or_default()
        })
    }
}

impl ElementType for DateElement {
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

impl Renderable for DateElement {
    fn render(&self, canvas: &mut dyn Canvas, preview: bool, user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        let date = if preview {
            Some(Utc::now())
        } else {
            DateItem::from_code(payload.dateitem).and_then(|item| Self::resolve(item, user, ctx))
        };
        match date {
            Some(date) => render_content(canvas, &self.record, &self.formatted(&date, &payload.dateformat)),
            None => {
                log::debug!(
                    "date element {}: no date for item {}",
                    self.record.id,
                    payload.dateitem
                );
                Ok(())
            }
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let payload = self.payload()?;
        html.render_content(&self.record, &self.formatted(&Utc::now(), &payload.dateformat))
    }
}

impl Persistable for DateElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let defaults = DatePayload::default();
        let payload = DatePayload {
            dateitem: form.get_i64("dateitem").unwrap_or(defaults.dateitem),
            dateformat: form
                .get_trimmed("dateformat")
                .map(str::to_string)
                .unwrap_or(defaults.dateformat),
        };
        Payload::encode(TAG, &payload).map(Some)
    }
}

impl FormDefinable for DateElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::select(
            "dateitem",
            "Date item",
            options(&[
                ("-1", "Issued date"),
                ("-2", "Completion date"),
                ("-3", "Course start date"),
                ("-4", "Course end date"),
                ("-5", "Current date"),
                ("-6", "Enrolment start date"),
                ("-7", "Enrolment end date"),
                ("0", "Course grade date"),
            ]),
        ));
        fields.push(FormField::select(
            "dateformat",
            "Date format",
            options(&[
                ("1", "January 1, 2026"),
                ("2", "January 1st, 2026"),
                ("3", "1 January 2026"),
                ("4", "January 2026"),
                ("%d/%m/%Y", "01/01/2026"),
                ("%Y-%m-%d", "2026-01-01"),
            ]),
        ));
    }
}

impl Preparable for DateElement {
    fn prepare_form(&self, form: &mut FormData) {
        if let Ok(payload) = self.payload() {
            form.set("dateitem", payload.dateitem.to_string());
            form.set("dateformat", payload.dateformat);
        }
    }
}

impl Validatable for DateElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if form.contains("dateitem") && form.get_i64("dateitem").and_then(DateItem::from_code).is_none() {
            errors.add("dateitem", "Unknown date item");
        }
        if let Some(format) = form.get("dateformat") {
            if !matches!(format.trim(), "1" | "2" | "3" | "4") && !is_valid_pattern(format.trim()) {
                errors.add("dateformat", "Invalid date format");
            }
        }
        Ok(errors)
    }
}

impl Restorable for DateElement {
    fn after_restore(&self, mapping: &dyn IdMapping) -> Result<Option<String>> {
        let payload = self.payload()?;
        let Some(DateItem::ModuleGrade(old)) = DateItem::from_code(payload.dateitem) else {
            return Ok(None);
        };
        match mapping.map(MappedKind::CourseModule, old) {
            Some(new) => Payload::encode(
                TAG,
                &DatePayload {
                    dateitem: DateItem::ModuleGrade(new).code(),
                    ..payload
                },
            )
            .map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::config::EngineConfig;
    use crate::context::{Enrolment, GradeInfo, RestoreMapping, StaticLookups};
    use crate::elements::testutil::{a4_canvas, record};
    use crate::font::FontContext;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_preset_formats() {
        let date = day(2026, 3, 2);
        assert_eq!(format_date(&date, "1").unwrap(), "March 2, 2026");
        assert_eq!(format_date(&date, "2").unwrap(), "March 2nd, 2026");
        assert_eq!(format_date(&date, "3").unwrap(), "2 March 2026");
        assert_eq!(format_date(&date, "4").unwrap(), "March 2026");
        assert_eq!(format_date(&date, "%d/%m/%Y").unwrap(), "02/03/2026");
        assert!(format_date(&date, "%Q").is_none());
    }

    #[test]
    fn test_ordinals() {
        let names: Vec<&str> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 31]
            .iter()
            .map(|d| ordinal_suffix(*d))
            .collect();
        assert_eq!(names, vec!["st", "nd", "rd", "th", "th", "th", "th", "st", "nd", "rd", "st"]);
    }

    #[test]
    fn test_date_item_codes() {
        for code in -7..=3 {
            assert_eq!(DateItem::from_code(code).unwrap().code(), code);
        }
        assert!(DateItem::from_code(-8).is_none());
    }

    #[test]
    fn test_enrolment_start_for_the_user() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let user = User::new(4, "Ada", "Lovelace");
        let lookups = StaticLookups::new().with_enrolment(
            4,
            Enrolment {
                start: Some(day(2025, 9, 1)),
                end: None,
            },
        );
        let ctx = RenderContext::standalone(&config, &fonts).with_lookups(&lookups);
        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":-6,"dateformat":"3"}"#)));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &user, &ctx).unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=10.0 y=20.0 w=0.0 L '1 September 2025'"]);

        // The end date is unknown, so nothing is drawn.
        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":-7,"dateformat":"3"}"#)));
        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &user, &ctx).unwrap();
        assert!(canvas.cells().is_empty());
    }

    #[test]
    fn test_module_grade_date() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let user = User::new(4, "Ada", "Lovelace");
        let lookups = StaticLookups::new().with_grade(
            4,
            GradeItemRef::Module(12),
            GradeInfo {
                percentage: 90.0,
                points: 9.0,
                max_points: 10.0,
                letter: "A-".to_string(),
                date_graded: Some(day(2026, 1, 11)),
            },
        );
        let ctx = RenderContext::standalone(&config, &fonts).with_lookups(&lookups);
        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":12,"dateformat":"2"}"#)));
        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &user, &ctx).unwrap();
        assert_eq!(canvas.cells(), vec!["cell x=10.0 y=20.0 w=0.0 L 'January 11th, 2026'"]);
    }

    #[test]
    fn test_preview_uses_today_without_an_issue() {
        let config = EngineConfig::default();
        let fonts = FontContext::new();
        let ctx = RenderContext::standalone(&config, &fonts);
        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":-1,"dateformat":"%Y"}"#)));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, true, &User::preview(), &ctx).unwrap();
        let year = Utc::now().year().to_string();
        assert_eq!(canvas.cells().len(), 1);
        assert!(canvas.cells()[0].ends_with(&format!("'{}'", year)));

        let mut canvas = a4_canvas();
        element.render(&mut canvas, false, &User::preview(), &ctx).unwrap();
        assert!(canvas.cells().is_empty());
    }

    #[test]
    fn test_validation() {
        let element = DateElement::new(record(TAG, None));
        let errors = element
            .validate(&FormData::from_pairs([("dateitem", "-9"), ("dateformat", "%Q")]))
            .unwrap();
        assert!(errors.contains("dateitem"));
        assert!(errors.contains("dateformat"));

        let ok = element
            .validate(&FormData::from_pairs([("dateitem", "15"), ("dateformat", "%e %b")]))
            .unwrap();
        assert!(ok.is_empty());
    }

    #[test]
    fn test_restore_remaps_module_only() {
        let mut mapping = RestoreMapping::new();
        mapping.insert(MappedKind::CourseModule, 12, 40);

        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":12,"dateformat":"1"}"#)));
        assert_eq!(
            element.after_restore(&mapping).unwrap().as_deref(),
            Some(r#"{"dateitem":40,"dateformat":"1"}"#)
        );

        let element = DateElement::new(record(TAG, Some(r#"{"dateitem":-2,"dateformat":"1"}"#)));
        assert_eq!(element.after_restore(&mapping).unwrap(), None);
    }
}
