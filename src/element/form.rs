//! Edit forms: the raw submission, the field descriptors, and the checks
//! every element type shares.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ElementType;
use crate::color::is_valid_colour;
use crate::error::{ParchmentError, Result, ValidationErrors};
use crate::font::{FontContext, FontSpec};
use crate::layout::ReferencePoint;
use crate::model::{Alignment, ElementRecord};

/// A raw form submission: field name → submitted string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData {
    values: BTreeMap<String, String>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.values.insert(field.to_string(), value.into());
    }

    /// Set a value only if the field is still empty.
    pub fn set_default(&mut self, field: &str, value: impl Into<String>) {
        self.values
            .entry(field.to_string())
            .or_insert_with(|| value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// The trimmed value, treating blank as absent.
    pub fn get_trimmed(&self, field: &str) -> Option<&str> {
        self.get(field).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get_trimmed(field).and_then(|v| v.parse().ok())
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get_trimmed(field).and_then(|v| v.parse().ok())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }
}

/// One input on an element's edit form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormField {
    Header { label: String },
    Text { name: String, label: String },
    TextArea { name: String, label: String },
    Number { name: String, label: String },
    Colour { name: String, label: String },
    Select {
        name: String,
        label: String,
        options: Vec<(String, String)>,
    },
    FilePicker { name: String, label: String },
}

impl FormField {
    pub fn text(name: &str, label: &str) -> Self {
        FormField::Text {
            name: name.to_string(),
            label: label.to_string(),
        }
    }

    pub fn number(name: &str, label: &str) -> Self {
        FormField::Number {
            name: name.to_string(),
            label: label.to_string(),
        }
    }

    pub fn select(name: &str, label: &str, options: Vec<(String, String)>) -> Self {
        FormField::Select {
            name: name.to_string(),
            label: label.to_string(),
            options,
        }
    }

    /// `None` for headers.
    pub fn name(&self) -> Option<&str> {
        match self {
            FormField::Header { .. } => None,
            FormField::Text { name, .. }
            | FormField::TextArea { name, .. }
            | FormField::Number { name, .. }
            | FormField::Colour { name, .. }
            | FormField::Select { name, .. }
            | FormField::FilePicker { name, .. } => Some(name),
        }
    }
}

fn common_field(field: &str, fonts: &FontContext) -> Option<FormField> {
    let f = match field {
        "name" => FormField::text("name", "Element name"),
        "font" => FormField::select("font", "Font", fonts.available_fonts()),
        "fontsize" => FormField::select(
            "fontsize",
            "Font size",
            (5..=60).map(|s| (s.to_string(), s.to_string())).collect(),
        ),
        "colour" => FormField::Colour {
            name: "colour".to_string(),
            label: "Font colour".to_string(),
        },
        "posx" => FormField::number("posx", "Position X"),
        "posy" => FormField::number("posy", "Position Y"),
        "width" => FormField::number("width", "Width"),
        "refpoint" => FormField::select(
            "refpoint",
            "Reference point",
            vec![
                ("0".to_string(), "Top left".to_string()),
                ("1".to_string(), "Top center".to_string()),
                ("2".to_string(), "Top right".to_string()),
            ],
        ),
        "alignment" => FormField::select(
            "alignment",
            "Alignment",
            vec![
                ("L".to_string(), "Left".to_string()),
                ("C".to_string(), "Centre".to_string()),
                ("R".to_string(), "Right".to_string()),
            ],
        ),
        _ => return None,
    };
    Some(f)
}

/// The full edit form for an element: its common fields, then its own.
pub fn build_form(element: &dyn ElementType, fonts: &FontContext) -> Vec<FormField> {
    let mut fields: Vec<FormField> = element
        .common_fields()
        .iter()
        .filter_map(|f| common_field(f, fonts))
        .collect();
    if let Some(definable) = element.as_form_definable() {
        definable.form_fields(&mut fields);
    }
    fields
}

/// Checks shared by every element type. Only fields present in the
/// submission are checked.
pub fn validate_common(form: &FormData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if let Some(name) = form.get("name") {
        if name.trim().is_empty() {
            errors.add("name", "Required");
        }
    }

    if let Some(colour) = form.get("colour") {
        if !is_valid_colour(colour.trim()) {
            errors.add("colour", "Invalid colour");
        }
    }

    for field in ["posx", "posy"] {
        if form.contains(field) {
            match form.get_f64(field) {
                Some(v) if v >= 0.0 => {}
                _ => errors.add(field, "Must be a number of at least 0"),
            }
        }
    }

    if let Some(width) = form.get_trimmed("width") {
        match width.parse::<i64>() {
            Ok(w) if w >= 0 => {}
            _ => errors.add("width", "Must be a whole number of at least 0"),
        }
    }

    if form.contains("fontsize") {
        match form.get_f64("fontsize") {
            Some(v) if v > 0.0 => {}
            _ => errors.add("fontsize", "Must be a positive number"),
        }
    }

    if let Some(font) = form.get_trimmed("font") {
        if FontSpec::parse(font).is_err() {
            errors.add("font", "Unknown font");
        }
    }

    if let Some(refpoint) = form.get_trimmed("refpoint") {
        let known = refpoint
            .parse::<u8>()
            .ok()
            .and_then(ReferencePoint::from_code)
            .is_some();
        if !known {
            errors.add("refpoint", "Invalid reference point");
        }
    }

    if let Some(alignment) = form.get_trimmed("alignment") {
        if Alignment::from_form_value(alignment).is_none() {
            errors.add("alignment", "Invalid alignment");
        }
    }

    errors
}

/// Common checks plus the element's own.
///
/// A type-specific hook that fails outright does not abort validation; its
/// failure becomes an error on the always-present `name` field.
pub fn validate(element: &dyn ElementType, form: &FormData) -> ValidationErrors {
    let mut errors = validate_common(form);
    if let Some(validatable) = element.as_validatable() {
        match validatable.validate(form) {
            Ok(extra) => errors.merge(extra),
            Err(e) => {
                log::warn!("validation hook for '{}' failed: {}", element.tag(), e);
                errors.add("name", "This element could not be validated");
            }
        }
    }
    errors
}

/// Copy the submitted common attributes in `fields` onto the record.
///
/// Call after validation. Fields absent from the form keep their current
/// values; a blank width clears the constraint.
pub fn apply_common(record: &mut ElementRecord, form: &FormData, fields: &[&str]) -> Result<()> {
    let owned: Vec<(&str, String)> = fields
        .iter()
        .filter_map(|f| form.get(f).map(|v| (*f, v.to_string())))
        .collect();
    let form = FormData::from_pairs(owned);

    if let Some(name) = form.get_trimmed("name") {
        record.name = name.to_string();
    }
    if let Some(font) = form.get_trimmed("font") {
        FontSpec::parse(font)?;
        record.font = font.to_string();
    }
    if let Some(size) = form.get_f64("fontsize") {
        record.font_size = size;
    }
    if let Some(colour) = form.get_trimmed("colour") {
        record.colour = colour.to_string();
    }
    if let Some(x) = form.get_f64("posx") {
        record.posx = x;
    }
    if let Some(y) = form.get_f64("posy") {
        record.posy = y;
    }
    if form.contains("width") {
        record.width = form.get_f64("width").filter(|w| *w > 0.0);
    }
    if let Some(code) = form.get_trimmed("refpoint") {
        record.refpoint = code
            .parse::<u8>()
            .ok()
            .and_then(ReferencePoint::from_code)
            .ok_or_else(|| ParchmentError::Structure(format!("invalid reference point '{}'", code)))?;
    }
    if let Some(alignment) = form.get_trimmed("alignment").and_then(Alignment::from_form_value) {
        record.alignment = alignment;
    }
    Ok(())
}

/// Form values for re-opening an element's editor.
pub fn prepare_form(element: &dyn ElementType) -> FormData {
    let record = element.record();
    let mut form = FormData::new();
    for field in element.common_fields() {
        let value = match *field {
            "name" => record.name.clone(),
            "font" => record.font.clone(),
            "fontsize" => format_number(record.font_size),
            "colour" => record.colour.clone(),
            "posx" => format_number(record.posx),
            "posy" => format_number(record.posy),
            "width" => record.width.map(format_number).unwrap_or_default(),
            "refpoint" => record.refpoint.code().to_string(),
            "alignment" => record.alignment.as_str().to_string(),
            _ => continue,
        };
        form.set(field, value);
    }
    if let Some(preparable) = element.as_preparable() {
        preparable.prepare_form(&mut form);
    }
    form
}

/// Whole numbers without a trailing `.0`.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Validatable, TEXT_FIELDS};

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_valid_submission_has_no_errors() {
        let errors = validate_common(&form(&[
            ("name", "Title"),
            ("colour", "#112233"),
            ("posx", "10"),
            ("posy", "20.5"),
            ("width", ""),
            ("fontsize", "12"),
            ("font", "timesb"),
            ("refpoint", "1"),
        ]));
        assert!(errors.is_empty(), "{}", errors);
    }

    #[test]
    fn test_common_rule_violations() {
        let errors = validate_common(&form(&[
            ("colour", "notacolor"),
            ("posx", "-1"),
            ("posy", "abc"),
            ("width", "12.5"),
            ("fontsize", "0"),
            ("font", "t"),
        ]));
        for field in ["colour", "posx", "posy", "width", "fontsize", "font"] {
            assert!(errors.contains(field), "expected error on {}", field);
        }
    }

    #[test]
    fn test_padded_font_is_checked_like_apply_common_reads_it() {
        let errors = validate_common(&form(&[("font", " x")]));
        assert!(errors.contains("font"));
        assert!(validate_common(&form(&[("font", " timesb ")])).is_empty());

        let mut record = ElementRecord::new(1, "text", "Title");
        apply_common(&mut record, &form(&[("font", " timesb ")]), TEXT_FIELDS).unwrap();
        assert_eq!(record.font, "timesb");
    }

    struct BrokenHook {
        record: ElementRecord,
    }

    impl ElementType for BrokenHook {
        fn record(&self) -> &ElementRecord {
            &self.record
        }
        fn record_mut(&mut self) -> &mut ElementRecord {
            &mut self.record
        }
        fn as_validatable(&self) -> Option<&dyn Validatable> {
            Some(self)
        }
    }

    impl Validatable for BrokenHook {
        fn validate(&self, _form: &FormData) -> Result<ValidationErrors> {
            Err(ParchmentError::Structure("lookup unavailable".to_string()))
        }
    }

    #[test]
    fn test_failing_hook_becomes_a_name_error() {
        let element = BrokenHook {
            record: ElementRecord::new(1, "broken", "Broken"),
        };
        let errors = validate(&element, &form(&[("name", "Broken"), ("colour", "notacolor"), ("posx", "-3")]));
        assert!(errors.contains("colour"));
        assert!(errors.contains("posx"));
        assert_eq!(errors.get("name"), Some("This element could not be validated"));
    }

    #[test]
    fn test_absent_fields_are_not_checked() {
        assert!(validate_common(&FormData::new()).is_empty());
    }

    #[test]
    fn test_apply_common_updates_record() {
        let mut record = ElementRecord::new(1, "text", "Old");
        apply_common(
            &mut record,
            &form(&[("name", "New"), ("posx", "105"), ("width", "40"), ("refpoint", "2"), ("alignment", "C")]),
            TEXT_FIELDS,
        )
        .unwrap();
        assert_eq!(record.name, "New");
        assert_eq!(record.posx, 105.0);
        assert_eq!(record.width, Some(40.0));
        assert_eq!(record.refpoint, ReferencePoint::TopRight);
        assert_eq!(record.alignment, Alignment::C);

        apply_common(&mut record, &form(&[("width", "")]), TEXT_FIELDS).unwrap();
        assert_eq!(record.width, None);
    }

    #[test]
    fn test_apply_common_ignores_fields_the_type_lacks() {
        let mut record = ElementRecord::new(1, "border", "Border");
        apply_common(&mut record, &form(&[("width", "3"), ("colour", "red")]), &["name", "colour"]).unwrap();
        assert_eq!(record.width, None);
        assert_eq!(record.colour, "red");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(12.5), "12.5");
    }
}
