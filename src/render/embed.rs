//! Image preparation: source bytes → baseline JPEG for a DCTDecode XObject.
//!
//! Whatever the upload format (PNG, WebP, GIF, ...), the PDF embeds a
//! single RGB JPEG. JPEG can go into the file as-is with `/DCTDecode`, so
//! the writer needs no image codec of its own. Alpha is flattened onto white
//! first because JPEG cannot carry it.

use super::layout::ImageSize;
use crate::error::RenderError;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::{debug, warn};

/// A decoded, re-encoded image ready to embed.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub size: ImageSize,
    pub jpeg: Vec<u8>,
}

/// Decode `bytes` and re-encode as JPEG.
pub fn prepare_image(bytes: &[u8]) -> Result<EmbeddedImage, RenderError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| RenderError::ImageEncode(e.to_string()))?;
    let rgb = flatten_onto_white(&decoded);
    let size = ImageSize {
        width_px: rgb.width(),
        height_px: rgb.height(),
    };

    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| RenderError::ImageEncode(e.to_string()))?;

    debug!(
        "Prepared {}x{} image → {} bytes JPEG",
        size.width_px,
        size.height_px,
        jpeg.len()
    );
    Ok(EmbeddedImage { size, jpeg })
}

/// Like [`prepare_image`], but a bad image only costs a warning.
pub fn prepare_image_lossy(bytes: &[u8]) -> Option<EmbeddedImage> {
    match prepare_image(bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Could not add image to PDF, continuing without it: {}", e);
            None
        }
    }
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let blend = |c: u8| -> u8 {
            let a = u16::from(a);
            ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
