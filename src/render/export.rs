use rayon::prelude::*;

use crate::{
    assets::decode::{ExportFormat, encode_image},
    assets::image_data::ImageData,
    config::StudioConfig,
    foundation::error::StageResult,
    foundation::math::{over, premultiply_px},
};

/// Composite `img` over a solid straight-RGBA8 backdrop.
///
/// With an opaque backdrop the result is opaque. Pixels are otherwise left
/// untouched, so this is the only place a rendered image loses its alpha.
pub fn flatten_onto(img: &ImageData, backdrop_straight: [u8; 4]) -> ImageData {
    let backdrop = premultiply_px(backdrop_straight);
    let mut out = img.clone();
    out.as_bytes_mut().par_chunks_exact_mut(4).for_each(|px| {
        let flat = over(backdrop, [px[0], px[1], px[2], px[3]], 255);
        px.copy_from_slice(&flat);
    });
    out
}

/// Encode a rendered image for delivery.
///
/// PNG keeps the alpha channel as is. JPEG is flattened onto
/// `config.export_backdrop` first and encoded at `config.jpeg_quality`.
/// An invalid `config` (for example a translucent backdrop) is rejected up front.
#[tracing::instrument(skip(img, config), fields(width = img.width(), height = img.height()))]
pub fn export_image(img: &ImageData, format: ExportFormat, config: &StudioConfig) -> StageResult<Vec<u8>> {
    config.validate()?;
    let bytes = if format.supports_alpha() {
        encode_image(img, format, config.jpeg_quality)?
    } else {
        let flat = flatten_onto(img, config.export_backdrop);
        encode_image(&flat, format, config.jpeg_quality)?
    };
    tracing::debug!(bytes = bytes.len(), "exported");
    Ok(bytes)
}
