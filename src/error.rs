//! Structured error types for the Parchment engine.
//!
//! Lookup and integrity failures are hard errors that propagate to the
//! caller. Missing assets during rendering are not errors at all: the
//! affected element logs a warning and draws nothing.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParchmentError>;

/// The unified error type returned by all public Parchment API functions.
#[derive(Debug, Error)]
pub enum ParchmentError {
    /// JSON input failed to parse as a valid template document.
    #[error("Failed to parse document: {source}{}", format_hint(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    /// No constructor is registered for this type tag.
    #[error("Unknown element type: {0}")]
    UnknownElementType(String),

    /// A template, page or element id did not resolve.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    /// Form input failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// An item was addressed through a parent it does not belong to.
    #[error("Structure error: {0}")]
    Structure(String),

    #[error("Invalid font identifier '{0}': at least two characters are required")]
    InvalidFontSpec(String),

    #[error("Invalid move direction '{0}': expected 'up' or 'down'")]
    InvalidDirection(String),

    #[error("Permission denied: cannot manage templates in context {context_id}")]
    PermissionDenied { context_id: u64 },

    /// Drawing or PDF generation failed.
    #[error("Render error: {0}")]
    Render(String),

    #[error("Image error: {0}")]
    Image(String),

    /// A stored payload could not be encoded or decoded for its element type.
    #[error("Invalid payload for element type '{element_type}': {source}")]
    Payload {
        element_type: String,
        source: serde_json::Error,
    },

    #[error("Issuance error: {0}")]
    Issuance(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl ParchmentError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        ParchmentError::NotFound { kind, id }
    }
}

impl From<serde_json::Error> for ParchmentError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the template document schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        ParchmentError::Parse { source: e, hint }
    }
}

impl From<ValidationErrors> for ParchmentError {
    fn from(errors: ValidationErrors) -> Self {
        ParchmentError::Validation(errors)
    }
}

/// Field name → message, collected across the common and type-specific checks.
///
/// Only the first error reported for a field is kept, matching how an edit
/// form shows one message per input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// One error on one field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.errors {
            self.add(&field, message);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was collected, otherwise the collected errors.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ParchmentError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_hint() {
        let err: ParchmentError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let text = err.to_string();
        assert!(text.starts_with("Failed to parse document"));
        assert!(text.contains("trailing commas"));
    }

    #[test]
    fn test_validation_keeps_first_message_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("colour", "first");
        errors.add("colour", "second");
        errors.add("posx", "bad");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("colour"), Some("first"));
        assert_eq!(errors.to_string(), "colour: first; posx: bad");
    }

    #[test]
    fn test_empty_validation_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
