//! # Template Model
//!
//! The stored representation of a certificate design. A template owns an
//! ordered list of pages, a page owns an ordered list of elements. Ordering
//! is carried by a dense `sequence` (1..N) among siblings rather than by
//! position in a vector, because records live in a store and are loaded per
//! parent.
//!
//! Positions and sizes are millimetres. Font sizes are points.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ParchmentError, Result};
use crate::font::FontSpec;
use crate::layout::ReferencePoint;

/// Record identifier. Assigned by the store on insert.
pub type Id = u64;

/// A named, ordered collection of pages owned by a security context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Id,
    pub name: String,
    /// The security context that owns this template.
    pub context_id: Id,
    pub time_created: DateTime<Utc>,
    pub time_modified: DateTime<Utc>,
}

impl Template {
    pub fn new(name: &str, context_id: Id) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.to_string(),
            context_id,
            time_created: now,
            time_modified: now,
        }
    }
}

/// Page orientation. Never stored, always derived from the dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape iff width > height.
    pub fn of(width: f64, height: f64) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// A physical canvas belonging to one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: Id,
    pub template_id: Id,
    /// Width in millimetres.
    pub width: f64,
    /// Height in millimetres.
    pub height: f64,
    pub left_margin: f64,
    pub right_margin: f64,
    /// Position among the template's pages, 1..N.
    pub sequence: u32,
    pub time_created: DateTime<Utc>,
    pub time_modified: DateTime<Utc>,
}

impl Page {
    pub fn new(template_id: Id, settings: PageSettings) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            template_id,
            width: settings.width,
            height: settings.height,
            left_margin: settings.left_margin,
            right_margin: settings.right_margin,
            sequence: 0,
            time_created: now,
            time_modified: now,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::of(self.width, self.height)
    }

    pub fn settings(&self) -> PageSettings {
        PageSettings {
            width: self.width,
            height: self.height,
            left_margin: self.left_margin,
            right_margin: self.right_margin,
        }
    }
}

/// The editable physical properties of a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub left_margin: f64,
    #[serde(default)]
    pub right_margin: f64,
}

impl PageSettings {
    /// A4 portrait, no margins.
    pub const A4: PageSettings = PageSettings {
        width: 210.0,
        height: 297.0,
        left_margin: 0.0,
        right_margin: 0.0,
    };

    pub fn landscape(self) -> Self {
        Self {
            width: self.width.max(self.height),
            height: self.width.min(self.height),
            ..self
        }
    }
}

/// Horizontal alignment of text inside the cell an element draws into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    L,
    C,
    R,
}

impl Alignment {
    pub fn from_form_value(value: &str) -> Option<Self> {
        match value {
            "L" => Some(Alignment::L),
            "C" => Some(Alignment::C),
            "R" => Some(Alignment::R),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::L => "L",
            Alignment::C => "C",
            Alignment::R => "R",
        }
    }

    pub fn css(&self) -> &'static str {
        match self {
            Alignment::L => "left",
            Alignment::C => "center",
            Alignment::R => "right",
        }
    }
}

/// A positioned, typed unit of content on a page.
///
/// The common visual attributes live here. Everything specific to the
/// element's type tag is in `data`, a serialized payload only the type's
/// own implementation interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: Id,
    pub page_id: Id,
    /// The type tag, resolved to behaviour by the element registry.
    pub element_type: String,
    pub name: String,
    /// Serialized type-specific payload.
    pub data: Option<String>,
    /// Font identifier, e.g. `times`, `helveticab`, `courierbi`.
    pub font: String,
    /// Font size in points.
    pub font_size: f64,
    pub colour: String,
    pub posx: f64,
    pub posy: f64,
    /// Optional width constraint in millimetres. `None` or zero means unconstrained.
    pub width: Option<f64>,
    pub refpoint: ReferencePoint,
    pub alignment: Alignment,
    /// Position among the page's elements, 1..N. Also the draw order.
    pub sequence: u32,
    pub time_created: DateTime<Utc>,
    pub time_modified: DateTime<Utc>,
}

impl ElementRecord {
    /// A record with the given tag and default visual attributes.
    pub fn new(page_id: Id, element_type: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            page_id,
            element_type: element_type.to_string(),
            name: name.to_string(),
            data: None,
            font: "times".to_string(),
            font_size: 12.0,
            colour: "#000000".to_string(),
            posx: 0.0,
            posy: 0.0,
            width: None,
            refpoint: ReferencePoint::TopCenter,
            alignment: Alignment::L,
            sequence: 0,
            time_created: now,
            time_modified: now,
        }
    }

    pub fn font_spec(&self) -> Result<FontSpec> {
        FontSpec::parse(&self.font)
    }

    /// The width constraint if one is set (non-zero).
    pub fn width_constraint(&self) -> Option<f64> {
        self.width.filter(|w| *w > 0.0)
    }

    /// Decode the payload into the type's own structure.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.data.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Payload::decode(&self.element_type, raw).map(Some),
        }
    }
}

/// Encoding helpers for element payloads.
///
/// Payloads are JSON text inside the record. Each element type owns a
/// serde structure for its payload and goes through these two functions
/// at the boundary.
pub struct Payload;

impl Payload {
    pub fn encode<T: Serialize>(element_type: &str, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|source| ParchmentError::Payload {
            element_type: element_type.to_string(),
            source,
        })
    }

    pub fn decode<T: DeserializeOwned>(element_type: &str, raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|source| ParchmentError::Payload {
            element_type: element_type.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        dateitem: i64,
    }

    #[test]
    fn test_orientation_derived_from_dimensions() {
        assert_eq!(Orientation::of(297.0, 210.0), Orientation::Landscape);
        assert_eq!(Orientation::of(210.0, 297.0), Orientation::Portrait);
        // Square pages are portrait.
        assert_eq!(Orientation::of(200.0, 200.0), Orientation::Portrait);
    }

    #[test]
    fn test_payload_round_trip_through_record() {
        let mut record = ElementRecord::new(1, "date", "Date");
        record.data = Some(Payload::encode("date", &Sample { dateitem: -2 }).unwrap());
        let decoded: Option<Sample> = record.payload().unwrap();
        assert_eq!(decoded, Some(Sample { dateitem: -2 }));
    }

    #[test]
    fn test_empty_payload_decodes_to_none() {
        let record = ElementRecord::new(1, "studentname", "Name");
        let decoded: Option<Sample> = record.payload().unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_bad_payload_names_element_type() {
        let mut record = ElementRecord::new(1, "date", "Date");
        record.data = Some("{not json".to_string());
        let err = record.payload::<Sample>().unwrap_err();
        assert!(err.to_string().contains("'date'"));
    }

    #[test]
    fn test_width_constraint_ignores_zero() {
        let mut record = ElementRecord::new(1, "text", "Text");
        record.width = Some(0.0);
        assert_eq!(record.width_constraint(), None);
        record.width = Some(40.0);
        assert_eq!(record.width_constraint(), Some(40.0));
    }
}
