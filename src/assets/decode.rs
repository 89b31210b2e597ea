use std::{io::Cursor, path::Path};

use anyhow::Context;

use crate::{
    assets::image_data::ImageData,
    foundation::error::{StageError, StageResult},
};

/// Encoded output formats supported by [`encode_image`] and [`crate::export_image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PNG with straight alpha.
    Png,
    /// Baseline JPEG, no alpha channel.
    Jpeg,
}

impl ExportFormat {
    /// `true` when the format can carry per-pixel alpha.
    pub fn supports_alpha(self) -> bool {
        matches!(self, Self::Png)
    }

    /// Pick a format from a file extension (`png`, `jpg`, `jpeg`).
    pub fn from_path(path: &Path) -> StageResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(StageError::validation(format!(
                "unsupported export extension '{other}'"
            ))),
        }
    }
}

/// Decode encoded image bytes (PNG, JPEG, WebP) into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> StageResult<ImageData> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    ImageData::from_straight_rgba8(width, height, rgba.into_raw())
}

/// Encode an image.
///
/// JPEG has no alpha channel, so the image must already be opaque; flatten it
/// with [`crate::flatten_onto`] first (or use [`crate::export_image`]).
pub fn encode_image(img: &ImageData, format: ExportFormat, jpeg_quality: u8) -> StageResult<Vec<u8>> {
    if img.canvas().is_empty() {
        return Err(StageError::invalid_geometry("cannot encode a zero-area image"));
    }
    let mut buf = Vec::new();
    match format {
        ExportFormat::Png => {
            let rgba = image::RgbaImage::from_raw(img.width(), img.height(), img.to_straight_rgba8())
                .ok_or_else(|| StageError::invalid_geometry("rgba buffer does not match dimensions"))?;
            image::DynamicImage::ImageRgba8(rgba)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .context("encode png")?;
        }
        ExportFormat::Jpeg => {
            if !img.is_opaque() {
                return Err(StageError::validation(
                    "jpeg output requires an opaque image; flatten it first",
                ));
            }
            let rgb: Vec<u8> = img
                .as_bytes()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let rgb = image::RgbImage::from_raw(img.width(), img.height(), rgb)
                .ok_or_else(|| StageError::invalid_geometry("rgb buffer does not match dimensions"))?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                Cursor::new(&mut buf),
                jpeg_quality.clamp(1, 100),
            );
            rgb.write_with_encoder(encoder).context("encode jpeg")?;
        }
    }
    Ok(buf)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
