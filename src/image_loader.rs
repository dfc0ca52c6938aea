//! # Image Decoding
//!
//! Turns the bytes behind an image, background or signature element into
//! something both backends can use. JPEG passes through untouched (the PDF
//! writer embeds it with DCTDecode). PNG is decoded to RGB with a separate
//! alpha plane for an SMask.
//!
//! Bytes come from the file-storage collaborator or from a `data:` URI in
//! an imported template document.

use std::io::Cursor;

use base64::Engine;

use crate::error::{ParchmentError, Result};

/// A decoded image ready for embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes, embedded as-is.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    Decoded {
        /// width * height * 3 bytes
        rgb: Vec<u8>,
        /// width * height bytes. `None` if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

impl LoadedImage {
    /// Height over width. Zero-width images report 1.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width_px == 0 {
            1.0
        } else {
            self.height_px as f64 / self.width_px as f64
        }
    }
}

impl LoadedImage {
    /// Scale the image's alpha by `opacity` (0..=1). JPEGs are decoded so
    /// they can carry an alpha plane.
    pub fn with_opacity(self, opacity: f64) -> Result<LoadedImage> {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 {
            return Ok(self);
        }
        let pixel_count = (self.width_px * self.height_px) as usize;
        let (rgb, alpha) = match self.pixel_data {
            ImagePixelData::Jpeg { data, .. } => {
                let rgb = image::load_from_memory(&data)
                    .map_err(|e| ParchmentError::Image(format!("Failed to decode JPEG: {}", e)))?
                    .to_rgb8()
                    .into_raw();
                (rgb, vec![255u8; pixel_count])
            }
            ImagePixelData::Decoded { rgb, alpha } => {
                let alpha = alpha.unwrap_or_else(|| vec![255u8; pixel_count]);
                (rgb, alpha)
            }
        };
        let alpha = alpha
            .into_iter()
            .map(|a| (a as f64 * opacity).round() as u8)
            .collect();
        Ok(LoadedImage {
            pixel_data: ImagePixelData::Decoded {
                rgb,
                alpha: Some(alpha),
            },
            width_px: self.width_px,
            height_px: self.height_px,
        })
    }
}

/// Decode image bytes, detecting the format from magic bytes.
pub fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage> {
    if data.len() < 4 {
        return Err(ParchmentError::Image("Image data too short".to_string()));
    }

    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) {
        decode_png(data)
    } else {
        Err(ParchmentError::Image(
            "Unsupported image format (expected JPEG or PNG)".to_string(),
        ))
    }
}

/// Decode a `data:image/...;base64,...` URI.
pub fn load_data_uri(src: &str) -> Result<LoadedImage> {
    decode_image_bytes(&data_uri_bytes(src)?)
}

/// The raw bytes behind a base64 data URI.
pub fn data_uri_bytes(src: &str) -> Result<Vec<u8>> {
    if !src.starts_with("data:image/") {
        return Err(ParchmentError::Image("Not an image data URI".to_string()));
    }
    let comma = src
        .find(',')
        .ok_or_else(|| ParchmentError::Image("Invalid data URI: missing comma".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(&src[comma + 1..])
        .map_err(|e| ParchmentError::Image(format!("Base64 decode error: {}", e)))
}

/// Encode image bytes as a data URI for inline HTML.
pub fn to_data_uri(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Best guess at a mime type from magic bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    if is_jpeg(data) {
        "image/jpeg"
    } else if is_png(data) {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

fn decode_jpeg(data: &[u8]) -> Result<LoadedImage> {
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ParchmentError::Image(format!("JPEG format detection error: {}", e)))?
        .into_dimensions()
        .map_err(|e| ParchmentError::Image(format!("Failed to read JPEG dimensions: {}", e)))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
    })
}

/// Read the component count from the first SOF segment.
fn jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2;
    while i + 3 < data.len() && data[i] == 0xFF {
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return if data[i + 9] == 1 {
                JpegColorSpace::DeviceGray
            } else {
                JpegColorSpace::DeviceRGB
            };
        }
        let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + seg_len;
    }
    JpegColorSpace::DeviceRGB
}

fn decode_png(data: &[u8]) -> Result<LoadedImage> {
    let img = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ParchmentError::Image(format!("PNG format detection error: {}", e)))?
        .decode()
        .map_err(|e| ParchmentError::Image(format!("Failed to decode PNG: {}", e)))?;

    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);

    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }
    let opaque = alpha.iter().all(|a| *a == 255);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if opaque { None } else { Some(alpha) },
        },
        width_px: width,
        height_px: height,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), w, h, image::ColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn test_opacity_scales_alpha() {
        let img = decode_image_bytes(&png_bytes(2, 1, [10, 20, 30, 255])).unwrap();
        let faded = img.with_opacity(0.5).unwrap();
        match faded.pixel_data {
            ImagePixelData::Decoded { alpha, .. } => assert_eq!(alpha, Some(vec![128, 128])),
            other => panic!("expected decoded pixels, got {:?}", other),
        }
    }

    #[test]
    fn test_magic_bytes() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(is_png(&[0x89, 0x50, 0x4E, 0x47]));
        assert_eq!(sniff_mime(&[0x89, 0x50, 0x4E, 0x47]), "image/png");
        assert_eq!(sniff_mime(&[0, 1, 2, 3]), "application/octet-stream");
    }

    #[test]
    fn test_rejects_short_and_unknown_data() {
        assert!(matches!(decode_image_bytes(&[0, 1]), Err(ParchmentError::Image(_))));
        assert!(matches!(decode_image_bytes(&[0, 1, 2, 3, 4]), Err(ParchmentError::Image(_))));
    }

    #[test]
    fn test_opaque_png_has_no_alpha() {
        let loaded = decode_image_bytes(&png_bytes(1, 1, [255, 0, 0, 255])).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (1, 1));
        match loaded.pixel_data {
            ImagePixelData::Decoded { rgb, alpha } => {
                assert_eq!(rgb, vec![255, 0, 0]);
                assert!(alpha.is_none());
            }
            _ => panic!("PNG should decode to Decoded"),
        }
    }

    #[test]
    fn test_translucent_png_keeps_alpha() {
        let loaded = decode_image_bytes(&png_bytes(1, 1, [255, 0, 0, 128])).unwrap();
        match loaded.pixel_data {
            ImagePixelData::Decoded { alpha, .. } => assert_eq!(alpha, Some(vec![128])),
            _ => panic!("PNG should decode to Decoded"),
        }
    }

    #[test]
    fn test_jpeg_passes_through() {
        let img = image::RgbImage::from_fn(2, 2, |_, _| image::Rgb([0, 128, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8)
            .unwrap();

        let loaded = decode_image_bytes(&buf).unwrap();
        match loaded.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                assert_eq!(data, buf);
                assert_eq!(color_space, JpegColorSpace::DeviceRGB);
            }
            _ => panic!("JPEG should stay as Jpeg"),
        }
    }

    #[test]
    fn test_data_uri_round_trip() {
        let png = png_bytes(3, 2, [0, 255, 0, 255]);
        let uri = to_data_uri("image/png", &png);
        assert!(uri.starts_with("data:image/png;base64,"));
        let loaded = load_data_uri(&uri).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (3, 2));
        assert!((loaded.aspect_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_data_uri_without_comma() {
        assert!(load_data_uri("data:image/png;base64").is_err());
    }
}
