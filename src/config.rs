//! Engine configuration.
//!
//! Everything has a default, so an empty JSON object is a valid config
//! and `EngineConfig::default()` is what the library uses when nobody
//! passes one in.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParchmentError, Result};
use crate::issuance::CodeFormat;
use crate::layout::ReferencePoint;
use crate::model::PageSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Font identifier for new elements.
    pub default_font: String,
    /// Font size in points for new elements.
    pub default_font_size: f64,
    pub default_colour: String,
    pub default_refpoint: ReferencePoint,
    /// Size and margins for new pages, in millimetres.
    pub default_page: PageSettings,
    /// Base URL for QR code verification links.
    pub site_url: String,
    pub code_format: CodeFormat,
    /// How many times issuance retries a colliding code before giving up.
    pub max_code_attempts: u32,
    /// Certificates processed per email run.
    pub email_batch_size: usize,
    /// Written to the PDF Info dictionary as /Creator.
    pub creator: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_font: "times".to_string(),
            default_font_size: 12.0,
            default_colour: "#000000".to_string(),
            default_refpoint: ReferencePoint::TopCenter,
            default_page: PageSettings::A4,
            site_url: "http://localhost".to_string(),
            code_format: CodeFormat::Alphanumeric,
            max_code_attempts: 10,
            email_batch_size: 100,
            creator: "Parchment".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The verification URL encoded into QR codes for an issue code.
    pub fn verify_url(&self, code: &str) -> String {
        format!("{}/verify?code={}", self.site_url.trim_end_matches('/'), code)
    }

    fn check(&self) -> Result<()> {
        if self.default_font.chars().count() < 2 {
            return Err(ParchmentError::Config(format!(
                "defaultFont '{}' must be at least two characters",
                self.default_font
            )));
        }
        if self.default_font_size <= 0.0 {
            return Err(ParchmentError::Config("defaultFontSize must be positive".to_string()));
        }
        if !crate::color::is_valid_colour(&self.default_colour) {
            return Err(ParchmentError::Config(format!(
                "defaultColour '{}' is not a colour",
                self.default_colour
            )));
        }
        if self.default_page.width <= 0.0 || self.default_page.height <= 0.0 {
            return Err(ParchmentError::Config("defaultPage must have a positive size".to_string()));
        }
        if self.max_code_attempts == 0 {
            return Err(ParchmentError::Config("maxCodeAttempts must be at least 1".to_string()));
        }
        if self.email_batch_size == 0 {
            return Err(ParchmentError::Config("emailBatchSize must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_font, "times");
        assert_eq!(config.default_page.width, 210.0);
        assert_eq!(config.max_code_attempts, 10);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = EngineConfig::from_json_str(
            r##"{"defaultFontSize": 14, "siteUrl": "https://lms.example.org/", "codeFormat": "digitsWithHyphens",
                 "defaultRefpoint": "TOP_LEFT", "defaultPage": {"width": 297, "height": 210}}"##,
        )
        .unwrap();
        assert_eq!(config.default_font_size, 14.0);
        assert_eq!(config.code_format, CodeFormat::DigitsWithHyphens);
        assert_eq!(config.default_refpoint, ReferencePoint::TopLeft);
        assert_eq!(config.default_page.left_margin, 0.0);
        assert_eq!(
            config.verify_url("ABC"),
            "https://lms.example.org/verify?code=ABC"
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"defaultFont": "t"}"#),
            Err(ParchmentError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"defaultColour": "notacolor"}"#),
            Err(ParchmentError::Config(_))
        ));
        assert!(EngineConfig::from_json_str(r#"{"emailBatchSize": 0}"#).is_err());
    }
}
