//! # Reference-Point Layout
//!
//! Elements store a single anchor x-position. Where the text actually goes
//! depends on the element's reference point and on how wide the text turns
//! out to be once measured with the current font:
//!
//! ```text
//!   TOP_LEFT         TOP_CENTER          TOP_RIGHT
//!   x                     x                       x
//!   |Certificate      Certif|icate      Certificate|
//! ```
//!
//! Every text-bearing element goes through [`place`], in both the PDF and
//! the HTML backend.

use serde::{Deserialize, Serialize};

/// Added to any non-zero cell width so the wrapping pass beneath never
/// clips a line that measures exactly the cell width.
pub const WIDTH_EPSILON: f64 = 0.0001;

/// How the stored x-position of an element maps to its drawn position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferencePoint {
    TopLeft,
    #[default]
    TopCenter,
    TopRight,
}

impl ReferencePoint {
    /// The numeric code used by edit forms and the preview markup.
    pub fn code(&self) -> u8 {
        match self {
            ReferencePoint::TopLeft => 0,
            ReferencePoint::TopCenter => 1,
            ReferencePoint::TopRight => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReferencePoint::TopLeft),
            1 => Some(ReferencePoint::TopCenter),
            2 => Some(ReferencePoint::TopRight),
            _ => None,
        }
    }
}

/// Where and how wide to draw a text run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    /// Cell width. Zero means "up to the right margin".
    pub width: f64,
}

/// Compute the draw x and cell width for a run of measured text.
///
/// `width` is the element's optional width constraint; `actual_width` is
/// the measured width of the text in the current font.
pub fn place(
    posx: f64,
    width: Option<f64>,
    refpoint: ReferencePoint,
    actual_width: f64,
) -> Placement {
    let mut w = width.filter(|w| *w != 0.0).unwrap_or(0.0);
    let mut actual_width = actual_width;
    if w != 0.0 && w < actual_width {
        actual_width = w;
    }

    let mut x = posx;
    match refpoint {
        ReferencePoint::TopLeft => {}
        ReferencePoint::TopRight => {
            x = posx - actual_width;
            if x < 0.0 {
                x = 0.0;
                w = posx;
            } else {
                w = actual_width;
            }
        }
        ReferencePoint::TopCenter => {
            x = posx - actual_width / 2.0;
            if x < 0.0 {
                x = 0.0;
                w = posx * 2.0;
            } else {
                w = actual_width;
            }
        }
    }

    if w != 0.0 {
        w += WIDTH_EPSILON;
    }

    Placement { x, width: w }
}
