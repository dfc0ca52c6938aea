//! # Text Wrapping
//!
//! Breaks element content into lines that fit a cell width. Break
//! opportunities come from UAX#14; a word wider than the whole cell is
//! split between characters.

use unicode_linebreak::{linebreaks, BreakOpportunity};

/// Break `text` into lines no wider than `max_width`.
///
/// `measure` returns the width of a string in the same unit as
/// `max_width`. A non-positive `max_width` disables wrapping, but explicit
/// newlines still start new lines.
pub fn break_into_lines<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (end, opportunity) in linebreaks(text) {
        let segment = &text[start..end];
        start = end;

        let mandatory = matches!(opportunity, BreakOpportunity::Mandatory);
        let segment = if mandatory {
            segment.trim_end_matches(['\n', '\r'])
        } else {
            segment
        };

        if max_width <= 0.0 {
            current.push_str(segment);
        } else {
            let candidate = format!("{}{}", current, segment);
            if current.is_empty() || measure(candidate.trim_end()) <= max_width {
                current = candidate;
            } else {
                lines.push(current.trim_end().to_string());
                current = segment.to_string();
            }

            if measure(current.trim_end()) > max_width {
                split_long_word(&mut current, &mut lines, max_width, &measure);
            }
        }

        if mandatory {
            lines.push(current.trim_end().to_string());
            current.clear();
        }
    }

    if !current.is_empty() {
        lines.push(current.trim_end().to_string());
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Move whole lines' worth of characters from `current` into `lines` until
/// the remainder fits.
fn split_long_word<F>(current: &mut String, lines: &mut Vec<String>, max_width: f64, measure: &F)
where
    F: Fn(&str) -> f64,
{
    while measure(current.trim_end()) > max_width {
        let mut fitted = String::new();
        let mut taken = 0;
        for ch in current.chars() {
            let mut next = fitted.clone();
            next.push(ch);
            if !fitted.is_empty() && measure(&next) > max_width {
                break;
            }
            fitted = next;
            taken += ch.len_utf8();
        }
        if taken >= current.len() {
            break;
        }
        lines.push(fitted);
        *current = current[taken..].to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is one unit wide.
    fn unit(s: &str) -> f64 {
        s.chars().count() as f64
    }

    #[test]
    fn test_no_wrap_when_width_disabled() {
        let lines = break_into_lines("Certificate of Completion", 0.0, unit);
        assert_eq!(lines, vec!["Certificate of Completion"]);
    }

    #[test]
    fn test_wraps_at_spaces() {
        let lines = break_into_lines("Certificate of Completion", 14.0, unit);
        assert_eq!(lines, vec!["Certificate of", "Completion"]);
    }

    #[test]
    fn test_explicit_newlines() {
        let lines = break_into_lines("Awarded to\nJane Doe", 0.0, unit);
        assert_eq!(lines, vec!["Awarded to", "Jane Doe"]);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = break_into_lines("abcdefghij", 4.0, unit);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_empty_text_is_one_empty_line() {
        assert_eq!(break_into_lines("", 10.0, unit), vec![String::new()]);
    }
}
