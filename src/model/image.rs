use crate::{
    assets::{decode::decode_image, image_data::ImageData},
    foundation::core::{ImageId, SessionId, Timestamp},
    foundation::error::StageResult,
};

/// Output of the external capture/segmentation pipeline, before it is stored.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    /// When the photo was taken.
    pub captured_at: Timestamp,
    /// Segmented pixels.
    pub pixels: ImageData,
}

impl CapturedImage {
    /// Build from already decoded pixels.
    pub fn new(captured_at: Timestamp, pixels: ImageData) -> Self {
        Self {
            captured_at,
            pixels,
        }
    }

    /// Build from encoded bytes (PNG, JPEG, WebP).
    ///
    /// The file is decoded and premultiplied here, once. The encoded bytes are
    /// not kept; everything downstream works on the resulting raster.
    pub fn from_encoded(captured_at: Timestamp, bytes: &[u8]) -> StageResult<Self> {
        Ok(Self::new(captured_at, decode_image(bytes)?))
    }
}

/// A processed photo stored verbatim under its owning session.
///
/// "Verbatim" is measured on the premultiplied raster handed in through
/// [`CapturedImage`]: ingest, snapshots and blob storage never alter a byte of it.
/// Conversion from straight alpha happens before that boundary, in
/// [`CapturedImage::from_encoded`] or [`ImageData::from_straight_rgba8`], and is
/// lossy for colour under very low alpha. Callers that must keep the original
/// file keep it themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedImage {
    pub(crate) id: ImageId,
    pub(crate) session: SessionId,
    pub(crate) captured_at: Timestamp,
    pub(crate) pixels: ImageData,
}

impl ProcessedImage {
    pub(crate) fn new(session: SessionId, captured: CapturedImage) -> Self {
        Self {
            id: ImageId::generate(),
            session,
            captured_at: captured.captured_at,
            pixels: captured.pixels,
        }
    }

    /// Image identifier.
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Owning session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Capture time.
    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Pixels as delivered by the capture pipeline.
    pub fn pixels(&self) -> &ImageData {
        &self.pixels
    }
}
