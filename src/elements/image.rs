//! Images, background images and signatures.
//!
//! All three share one payload. A background image ignores its stored
//! position and is stretched over the whole page. A file that no longer
//! resolves, or does not decode, is logged and the element draws nothing.

use serde::{Deserialize, Serialize};

use crate::context::{FileRef, IdMapping, MappedKind, User};
use crate::element::{
    ElementType, FormData, FormDefinable, FormField, Persistable, Preparable, Renderable,
    Restorable, Validatable, POSITION_FIELDS,
};
use crate::error::{Result, ValidationErrors};
use crate::image_loader::{self, LoadedImage};
use crate::model::{ElementRecord, Payload};
use crate::render::html::{escape_html, HtmlRenderer};
use crate::render::{Canvas, RenderContext};

/// Resolution assumed for images drawn at their natural size.
const NATURAL_DPI: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Image,
    Background,
    Signature,
}

impl ImageKind {
    pub fn tag(self) -> &'static str {
        match self {
            ImageKind::Image => "image",
            ImageKind::Background => "bgimage",
            ImageKind::Signature => "signature",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub file: Option<FileRef>,
    /// Inline `data:` URI, used by imported documents that carry their
    /// own image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Opacity between 0 and 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphachannel: Option<f64>,
}

impl ImagePayload {
    /// Draw size in millimetres. A zero side follows the image's aspect
    /// ratio; both zero means the natural size.
    pub fn draw_size(&self, image: &LoadedImage) -> (f64, f64) {
        let aspect = image.aspect_ratio();
        match (self.width > 0.0, self.height > 0.0) {
            (true, true) => (self.width, self.height),
            (true, false) => (self.width, self.width * aspect),
            (false, true) => (self.height / aspect, self.height),
            (false, false) => (
                image.width_px as f64 * 25.4 / NATURAL_DPI,
                image.height_px as f64 * 25.4 / NATURAL_DPI,
            ),
        }
    }
}

/// `<context id>:<path>`, as the file picker submits it.
pub fn parse_file_value(value: &str) -> Option<FileRef> {
    let (context, path) = value.trim().split_once(':')?;
    let context_id = context.trim().parse().ok()?;
    if path.is_empty() {
        return None;
    }
    Some(FileRef {
        context_id,
        path: path.to_string(),
    })
}

fn file_value(file: &FileRef) -> String {
    format!("{}:{}", file.context_id, file.path)
}

pub struct ImageElement {
    kind: ImageKind,
    record: ElementRecord,
}

impl ImageElement {
    pub fn new(kind: ImageKind, record: ElementRecord) -> Self {
        Self { kind, record }
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    fn payload(&self) -> Result<ImagePayload> {
        Ok(self.record.payload::<ImagePayload>()?.unwrap_or_default())
    }

    /// The raw bytes and mime type behind the payload, if they still exist.
    fn bytes(&self, payload: &ImagePayload, ctx: &RenderContext<'_>) -> Option<(Vec<u8>, String)> {
        if let Some(file) = &payload.file {
            return match ctx.files.resolve(file) {
                Some(stored) => Some((stored.bytes, stored.mime)),
                None => {
                    log::warn!(
                        "{} element {}: file '{}' not found",
                        self.kind.tag(),
                        self.record.id,
                        file_value(file)
                    );
                    None
                }
            };
        }
        let src = payload.src.as_deref()?;
        match image_loader::data_uri_bytes(src) {
            Ok(bytes) => {
                let mime = image_loader::sniff_mime(&bytes).to_string();
                Some((bytes, mime))
            }
            Err(e) => {
                log::warn!("{} element {}: {}", self.kind.tag(), self.record.id, e);
                None
            }
        }
    }

    fn load(&self, payload: &ImagePayload, ctx: &RenderContext<'_>) -> Option<LoadedImage> {
        let (bytes, _) = self.bytes(payload, ctx)?;
        let decoded = image_loader::decode_image_bytes(&bytes).and_then(|image| match payload.alphachannel {
            Some(opacity) => image.with_opacity(opacity),
            None => Ok(image),
        });
        match decoded {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("{} element {}: {}", self.kind.tag(), self.record.id, e);
                None
            }
        }
    }
}

impl ElementType for ImageElement {
    fn record(&self) -> &ElementRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut ElementRecord {
        &mut self.record
    }

    fn common_fields(&self) -> &'static [&'static str] {
        match self.kind {
            ImageKind::Background => &["name"],
            ImageKind::Image | ImageKind::Signature => POSITION_FIELDS,
        }
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

impl Renderable for ImageElement {
    fn render(&self, canvas: &mut dyn Canvas, _preview: bool, _user: &User, ctx: &RenderContext<'_>) -> Result<()> {
        let payload = self.payload()?;
        let Some(image) = self.load(&payload, ctx) else {
            return Ok(());
        };
        match self.kind {
            ImageKind::Background => {
                let (w, h) = (canvas.page_width(), canvas.page_height());
                canvas.image(&image, 0.0, 0.0, w, h)
            }
            ImageKind::Image | ImageKind::Signature => {
                let (w, h) = payload.draw_size(&image);
                canvas.image(&image, self.record.posx, self.record.posy, w, h)
            }
        }
    }

    fn render_html(&self, html: &HtmlRenderer<'_>) -> Result<String> {
        let payload = self.payload()?;
        let Some((bytes, mime)) = self.bytes(&payload, html.context()) else {
            return Ok(String::new());
        };
        let mut style = String::new();
        if let Some(opacity) = payload.alphachannel {
            style.push_str(&format!("opacity: {};", opacity.clamp(0.0, 1.0)));
        }
        let inner = format!(
            "<img src=\"{}\" style=\"width: 100%; height: 100%; {}\" alt=\"\">",
            escape_html(&image_loader::to_data_uri(&mime, &bytes)),
            style
        );
        if self.kind == ImageKind::Background {
            return Ok(html.full_page(&self.record, &inner));
        }

        let (width, height) = match image_loader::decode_image_bytes(&bytes) {
            Ok(image) => {
                let (w, h) = payload.draw_size(&image);
                (Some(w), Some(h))
            }
            Err(_) => (None, None),
        };
        Ok(html.positioned(&self.record, self.record.posx, self.record.posy, width, height, &inner))
    }
}

impl Persistable for ImageElement {
    fn normalise_data(&self, form: &FormData) -> Result<Option<String>> {
        let current = self.payload()?;
        let file = match form.get("file") {
            Some(value) => parse_file_value(value),
            None => current.file.clone(),
        };
        let payload = ImagePayload {
            width: form.get_f64("width").unwrap_or(0.0),
            height: form.get_f64("height").unwrap_or(0.0),
            src: if file.is_some() { None } else { current.src },
            file,
            alphachannel: match self.kind {
                ImageKind::Signature => None,
                _ => form.get_f64("alphachannel").filter(|a| *a < 1.0),
            },
        };
        Payload::encode(self.kind.tag(), &payload).map(Some)
    }
}

impl FormDefinable for ImageElement {
    fn form_fields(&self, fields: &mut Vec<FormField>) {
        fields.push(FormField::FilePicker {
            name: "file".to_string(),
            label: match self.kind {
                ImageKind::Signature => "Signature".to_string(),
                _ => "Image".to_string(),
            },
        });
        if self.kind != ImageKind::Background {
            fields.push(FormField::number("width", "Width"));
            fields.push(FormField::number("height", "Height"));
        }
        if self.kind != ImageKind::Signature {
            let opacities: Vec<(String, String)> = (0..=10)
                .rev()
                .map(|step| {
                    let value = step as f64 / 10.0;
                    (value.to_string(), format!("{}%", step * 10))
                })
                .collect();
            fields.push(FormField::select("alphachannel", "Opacity", opacities));
        }
    }
}

impl Preparable for ImageElement {
    fn prepare_form(&self, form: &mut FormData) {
        let Ok(payload) = self.payload() else {
            return;
        };
        if let Some(file) = &payload.file {
            form.set("file", file_value(file));
        }
        if self.kind != ImageKind::Background {
            form.set("width", crate::element::form::format_number(payload.width));
            form.set("height", crate::element::form::format_number(payload.height));
        }
        if let Some(alpha) = payload.alphachannel {
            form.set("alphachannel", alpha.to_string());
        }
    }
}

impl Validatable for ImageElement {
    fn validate(&self, form: &FormData) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for field in ["width", "height"] {
            if let Some(value) = form.get_trimmed(field) {
                match value.parse::<f64>() {
                    Ok(v) if v >= 0.0 => {}
                    _ => errors.add(field, "Must be a number of at least 0"),
                }
            }
        }
        if let Some(file) = form.get_trimmed("file") {
            if parse_file_value(file).is_none() {
                errors.add("file", "Unknown file");
            }
        }
        if let Some(alpha) = form.get_trimmed("alphachannel") {
            match alpha.parse::<f64>() {
                Ok(a) if (0.0..=1.0).contains(&a) => {}
                _ => errors.add("alphachannel", "Must be between 0 and 1"),
            }
        }
        Ok(errors)
    }
}

impl Restorable for ImageElement {
    fn after_restore(&self, mapping: &dyn IdMapping) -> Result<Option<String>> {
        let payload = self.payload()?;
        let Some(file) = &payload.file else {
            return Ok(None);
        };
        match mapping.map(MappedKind::Context, file.context_id) {
            Some(context_id) => {
                let file = FileRef {
                    context_id,
                    path: file.path.clone(),
                };
                Payload::encode(
                    self.kind.tag(),
                    &ImagePayload {
                        file: Some(file),
                        ..payload
                    },
                )
                .map(Some)
            }
            None => Ok(None),
        }
    }
}
