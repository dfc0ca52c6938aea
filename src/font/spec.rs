//! Font identifiers.
//!
//! An identifier is a lower-case family name with optional style letters
//! appended: `b` for bold, `i` for italic, `bi` for both. `times`,
//! `timesb`, `timesi` and `timesbi` are the four faces of Times.
//!
//! Decoding only ever looks at the last two characters, so a family whose
//! name itself ends in `b` or `i` cannot be expressed without a style.

use serde::{Deserialize, Serialize};

use crate::error::{ParchmentError, Result};

/// A decoded font identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontSpec {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
            italic,
        }
    }

    /// Decode an identifier into family and style flags.
    ///
    /// Identifiers must be at least two characters long.
    pub fn parse(identifier: &str) -> Result<Self> {
        let mut chars: Vec<char> = identifier.chars().collect();
        if chars.len() < 2 {
            return Err(ParchmentError::InvalidFontSpec(identifier.to_string()));
        }

        let mut bold = false;
        let mut italic = false;
        match chars.last() {
            Some('i') => {
                chars.pop();
                italic = true;
                if chars.last() == Some(&'b') {
                    chars.pop();
                    bold = true;
                }
            }
            Some('b') => {
                chars.pop();
                bold = true;
            }
            _ => {}
        }

        Ok(Self {
            family: chars.into_iter().collect(),
            bold,
            italic,
        })
    }

    /// The identifier this spec decodes from.
    pub fn encode(&self) -> String {
        let mut id = self.family.clone();
        if self.bold {
            id.push('b');
        }
        if self.italic {
            id.push('i');
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_family() {
        assert_eq!(FontSpec::parse("times").unwrap(), FontSpec::new("times", false, false));
    }

    #[test]
    fn test_style_suffixes() {
        assert_eq!(FontSpec::parse("timesb").unwrap(), FontSpec::new("times", true, false));
        assert_eq!(FontSpec::parse("timesi").unwrap(), FontSpec::new("times", false, true));
        assert_eq!(FontSpec::parse("timesbi").unwrap(), FontSpec::new("times", true, true));
    }

    #[test]
    fn test_ib_is_not_a_style_pair() {
        // Only `bi` is recognised; a trailing `b` after `i` strips the `b` alone.
        assert_eq!(FontSpec::parse("timesib").unwrap(), FontSpec::new("timesi", true, false));
    }

    #[test]
    fn test_two_character_minimum() {
        assert!(matches!(FontSpec::parse(""), Err(ParchmentError::InvalidFontSpec(_))));
        assert!(matches!(FontSpec::parse("i"), Err(ParchmentError::InvalidFontSpec(_))));
        assert_eq!(FontSpec::parse("bi").unwrap(), FontSpec::new("", true, true));
    }

    #[test]
    fn test_encode_inverts_parse() {
        for id in ["courier", "courierb", "courieri", "courierbi", "freesans"] {
            assert_eq!(FontSpec::parse(id).unwrap().encode(), id);
        }
    }
}
