//! The template document format: a whole template as one JSON value.
//!
//! ```json
//! {
//!   "name": "Course completion",
//!   "contextId": 1,
//!   "pages": [
//!     { "width": 297, "height": 210, "leftMargin": 0, "rightMargin": 0,
//!       "elements": [
//!         { "type": "text", "name": "Title", "data": { "text": "Certificate" },
//!           "posx": 148.5, "posy": 40, "fontsize": 28, "refpoint": "TOP_CENTER" }
//!       ] }
//!   ]
//! }
//! ```
//!
//! Payloads are carried as JSON values and stored as their serialized
//! text, so an export returns exactly what was imported.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate_page;
use crate::element::form::{self, format_number, FormData};
use crate::element::ElementRegistry;
use crate::error::{ParchmentError, Result, ValidationErrors};
use crate::font::FontSpec;
use crate::layout::ReferencePoint;
use crate::model::{Alignment, ElementRecord, Id, Page, PageSettings, Template};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub name: String,
    #[serde(default)]
    pub context_id: Id,
    #[serde(default)]
    pub pages: Vec<PageDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    #[serde(flatten)]
    pub settings: PageSettings,
    #[serde(default)]
    pub elements: Vec<ElementDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDocument {
    #[serde(rename = "type")]
    pub element_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub fontsize: f64,
    #[serde(default = "default_colour")]
    pub colour: String,
    #[serde(default)]
    pub posx: f64,
    #[serde(default)]
    pub posy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub refpoint: ReferencePoint,
    #[serde(default)]
    pub alignment: Alignment,
}

fn default_font() -> String {
    "times".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

fn default_colour() -> String {
    "#000000".to_string()
}

impl ElementDocument {
    fn from_record(record: &ElementRecord) -> Result<Self> {
        let data = match record.data.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(serde_json::from_str(raw).map_err(|source| ParchmentError::Payload {
                element_type: record.element_type.clone(),
                source,
            })?),
        };
        Ok(Self {
            element_type: record.element_type.clone(),
            name: record.name.clone(),
            data,
            font: record.font.clone(),
            fontsize: record.font_size,
            colour: record.colour.clone(),
            posx: record.posx,
            posy: record.posy,
            width: record.width,
            refpoint: record.refpoint,
            alignment: record.alignment,
        })
    }

    /// The common attributes as an edit form submission would carry them.
    fn as_form(&self) -> FormData {
        let mut form = FormData::from_pairs([
            ("name", self.name.clone()),
            ("colour", self.colour.clone()),
            ("posx", format_number(self.posx)),
            ("posy", format_number(self.posy)),
            ("fontsize", format_number(self.fontsize)),
        ]);
        if let Some(width) = self.width {
            form.set("width", format_number(width));
        }
        form
    }

    fn to_record(&self, page_id: Id, sequence: u32) -> ElementRecord {
        let mut record = ElementRecord::new(page_id, &self.element_type, &self.name);
        record.data = self.data.as_ref().filter(|v| !v.is_null()).map(Value::to_string);
        record.font = self.font.clone();
        record.font_size = self.fontsize;
        record.colour = self.colour.clone();
        record.posx = self.posx;
        record.posy = self.posy;
        record.width = self.width;
        record.refpoint = self.refpoint;
        record.alignment = self.alignment;
        record.sequence = sequence;
        record
    }
}

impl TemplateDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a stored template back out as a document.
    pub fn export<S: Store + ?Sized>(store: &S, template_id: Id) -> Result<Self> {
        let template = store.template(template_id)?;
        let mut pages = Vec::new();
        for page in store.pages(template_id) {
            let elements = store
                .elements(page.id)
                .iter()
                .map(ElementDocument::from_record)
                .collect::<Result<Vec<_>>>()?;
            pages.push(PageDocument {
                settings: page.settings(),
                elements,
            });
        }
        Ok(Self {
            name: template.name,
            context_id: template.context_id,
            pages,
        })
    }

    /// Reject documents the store should never hold: unknown element
    /// types, malformed font identifiers, and pages or elements that the
    /// edit forms would refuse. Field errors are keyed by their path, e.g.
    /// `pages.0.elements.2.colour`.
    pub fn check(&self, registry: &ElementRegistry) -> Result<()> {
        for element in self.pages.iter().flat_map(|p| &p.elements) {
            if !registry.is_registered(&element.element_type) {
                return Err(ParchmentError::UnknownElementType(element.element_type.clone()));
            }
            FontSpec::parse(&element.font)?;
        }

        let mut errors = ValidationErrors::new();
        for (p, page) in self.pages.iter().enumerate() {
            for (field, message) in validate_page(&page.settings).iter() {
                errors.add(&format!("pages.{}.{}", p, field), message);
            }
            for (e, element) in page.elements.iter().enumerate() {
                for (field, message) in form::validate_common(&element.as_form()).iter() {
                    errors.add(&format!("pages.{}.elements.{}.{}", p, e, field), message);
                }
            }
        }
        errors.into_result()
    }

    /// Insert the document as a new template, pages and elements numbered
    /// in document order. Returns the ids created, template first.
    pub(crate) fn insert_into<S: Store + ?Sized>(&self, store: &mut S) -> Result<Inserted> {
        let template_id = store.insert_template(Template::new(&self.name, self.context_id))?;
        let mut inserted = Inserted {
            template_id,
            pages: Vec::new(),
            elements: Vec::new(),
        };
        for (index, page_doc) in self.pages.iter().enumerate() {
            let mut page = Page::new(template_id, page_doc.settings);
            page.sequence = index as u32 + 1;
            let page_id = store.insert_page(page)?;
            inserted.pages.push(page_id);
            for (position, element) in page_doc.elements.iter().enumerate() {
                let id = store.insert_element(element.to_record(page_id, position as u32 + 1))?;
                inserted.elements.push((page_id, id));
            }
        }
        Ok(inserted)
    }
}

/// Ids created by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Inserted {
    pub template_id: Id,
    pub pages: Vec<Id>,
    pub elements: Vec<(Id, Id)>,
}
