use crate::foundation::{
    core::Canvas,
    error::{StageError, StageResult},
    math::{premultiply_px, unpremultiply_px},
};

/// Owned raster in premultiplied RGBA8, row-major.
///
/// `Clone` is a deep copy: two values never share pixel storage, so a layer
/// built from a processed image can be edited without touching the source.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    rgba8_premul: Vec<u8>,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_len", &self.rgba8_premul.len())
            .finish()
    }
}

impl ImageData {
    /// Wrap premultiplied RGBA8 bytes. The buffer length must be `width * height * 4`.
    pub fn new(width: u32, height: u32, rgba8_premul: Vec<u8>) -> StageResult<Self> {
        let expected = Canvas::new(width, height)
            .rgba8_len()
            .ok_or_else(|| StageError::invalid_geometry("image buffer size overflow"))?;
        if rgba8_premul.len() != expected {
            return Err(StageError::invalid_geometry(format!(
                "expected {expected} bytes for {width}x{height} rgba8, got {}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul,
        })
    }

    /// Wrap straight (non-premultiplied) RGBA8 bytes, premultiplying them.
    pub fn from_straight_rgba8(width: u32, height: u32, mut rgba8: Vec<u8>) -> StageResult<Self> {
        for px in rgba8.chunks_exact_mut(4) {
            let p = premultiply_px([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&p);
        }
        Self::new(width, height, rgba8)
    }

    /// Fully transparent image of the given size.
    pub fn transparent(width: u32, height: u32) -> StageResult<Self> {
        let len = Canvas::new(width, height)
            .rgba8_len()
            .ok_or_else(|| StageError::invalid_geometry("image buffer size overflow"))?;
        Self::new(width, height, vec![0u8; len])
    }

    /// Image filled with one straight RGBA8 color.
    pub fn filled(width: u32, height: u32, straight_rgba: [u8; 4]) -> StageResult<Self> {
        let mut img = Self::transparent(width, height)?;
        let px = premultiply_px(straight_rgba);
        for c in img.rgba8_premul.chunks_exact_mut(4) {
            c.copy_from_slice(&px);
        }
        Ok(img)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions as a [`Canvas`].
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height)
    }

    /// Premultiplied RGBA8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba8_premul
    }

    /// Consume into the premultiplied RGBA8 buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.rgba8_premul
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.rgba8_premul
    }

    /// Premultiplied pixel at `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8_premul[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Straight-alpha copy of the pixels, as expected by PNG encoders.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.rgba8_premul.clone();
        for px in out.chunks_exact_mut(4) {
            let p = unpremultiply_px([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&p);
        }
        out
    }

    /// `true` when every pixel has alpha 255.
    pub fn is_opaque(&self) -> bool {
        self.rgba8_premul.chunks_exact(4).all(|px| px[3] == 255)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/image_data.rs"]
mod tests;
