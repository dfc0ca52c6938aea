//! # Shipped Element Types
//!
//! Each type is a thin wrapper around its [`ElementRecord`] that opts into
//! the capabilities it needs. Text-bearing types hand their content to
//! [`render_content`](crate::render::render_content) and never position
//! themselves; image-like types draw at their stored position directly.
//!
//! | tag            | module      | payload                         |
//! |----------------|-------------|---------------------------------|
//! | `text`         | [`text`]    | `{ text }`                      |
//! | `studentname`  | [`student`] | none                            |
//! | `coursename`   | [`course`]  | `{ field }`                     |
//! | `categoryname` | [`course`]  | none (legacy API)               |
//! | `date`         | [`date`]    | `{ dateitem, dateformat }`      |
//! | `code`         | [`code`]    | none                            |
//! | `grade`        | [`grade`]   | `{ gradeitem, gradeformat }`    |
//! | `image`        | [`image`]   | `{ width, height, file, ... }`  |
//! | `bgimage`      | [`image`]   | as `image`                      |
//! | `signature`    | [`image`]   | as `image`                      |
//! | `border`       | [`border`]  | `{ width }`                     |
//! | `qrcode`       | [`qr`]      | `{ width, height }`             |

pub mod border;
pub mod code;
pub mod course;
pub mod date;
pub mod grade;
pub mod image;
pub mod qr;
pub mod student;
pub mod text;

use crate::element::{ElementRegistry, ElementType};
use crate::error::Result;
use crate::model::ElementRecord;

fn boxed<T: ElementType + 'static>(element: T) -> Result<Box<dyn ElementType>> {
    Ok(Box::new(element))
}

/// Register every element type this crate ships.
pub fn register_builtin(registry: &mut ElementRegistry) {
    registry.register(text::TAG, |r: ElementRecord| boxed(text::TextElement::new(r)));
    registry.register(student::TAG, |r: ElementRecord| boxed(student::StudentNameElement::new(r)));
    registry.register(course::COURSE_NAME_TAG, |r: ElementRecord| {
        boxed(course::CourseNameElement::new(r))
    });
    registry.register_legacy(course::CATEGORY_NAME_TAG, course::CategoryNameElement::new);
    registry.register(date::TAG, |r: ElementRecord| boxed(date::DateElement::new(r)));
    registry.register(code::TAG, |r: ElementRecord| boxed(code::CodeElement::new(r)));
    registry.register(grade::TAG, |r: ElementRecord| boxed(grade::GradeElement::new(r)));
    for kind in [image::ImageKind::Image, image::ImageKind::Background, image::ImageKind::Signature] {
        registry.register(kind.tag(), move |r: ElementRecord| boxed(image::ImageElement::new(kind, r)));
    }
    registry.register(border::TAG, |r: ElementRecord| boxed(border::BorderElement::new(r)));
    registry.register(qr::TAG, |r: ElementRecord| boxed(qr::QrCodeElement::new(r)));
}

/// Select options for a form field from `(value, label)` pairs.
fn options(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(v, l)| (v.to_string(), l.to_string()))
        .collect()
}
