use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::foundation::error::{StageError, StageResult};

pub use kurbo::{Affine, Vec2};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub(crate) fn now() -> Timestamp {
    chrono::Utc::now()
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocate a fresh, globally unique identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(raw: Uuid) -> Self {
                Self(raw)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = StageError;

            fn from_str(s: &str) -> StageResult<Self> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| StageError::validation(format!("invalid id '{s}': {e}")))
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`crate::CaptureSession`].
    SessionId
);
entity_id!(
    /// Identifier of a [`crate::ProcessedImage`].
    ImageId
);
entity_id!(
    /// Identifier of a [`crate::Composition`].
    CompositionId
);
entity_id!(
    /// Identifier of a [`crate::Layer`].
    LayerId
);
entity_id!(
    /// Identifier of a [`crate::BackgroundAsset`].
    BackgroundId
);

/// Entity table an identifier belongs to. Used in error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Capture session.
    Session,
    /// Processed image.
    Image,
    /// Composition.
    Composition,
    /// Layer.
    Layer,
    /// Background asset.
    Background,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Image => "image",
            Self::Composition => "composition",
            Self::Layer => "layer",
            Self::Background => "background",
        })
    }
}

/// Pixel dimensions of a raster or render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Build a canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes of an RGBA8 buffer covering this canvas, `None` on overflow.
    pub fn rgba8_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(4))
    }

    pub(crate) fn center(self) -> Vec2 {
        Vec2::new(f64::from(self.width) * 0.5, f64::from(self.height) * 0.5)
    }
}

/// Placement of a layer on the composition canvas.
///
/// Units are fixed for the whole crate:
/// - `offset` is in absolute canvas pixels (x right, y down).
/// - `scale` is a uniform factor, strictly positive.
/// - `rotation_rad` is in radians, clockwise on screen (y-down image space).
///
/// Scale and rotation pivot about the layer's own centre. The identity transform
/// places the layer's top-left corner at the canvas origin at native size.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerTransform {
    /// Translation in canvas pixels.
    pub offset: Vec2,
    /// Uniform scale factor (> 0).
    pub scale: f64,
    /// Rotation in radians.
    pub rotation_rad: f64,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            rotation_rad: 0.0,
        }
    }
}

impl LayerTransform {
    /// Reject non-finite components and non-positive scale.
    pub fn validate(&self) -> StageResult<()> {
        if !self.offset.x.is_finite() || !self.offset.y.is_finite() {
            return Err(StageError::validation("transform offset must be finite"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(StageError::validation(
                "transform scale must be finite and > 0",
            ));
        }
        if !self.rotation_rad.is_finite() {
            return Err(StageError::validation("transform rotation must be finite"));
        }
        Ok(())
    }

    /// Layer-local to canvas mapping for a layer whose pivot (centre) is `pivot`.
    pub fn to_affine(self, pivot: Vec2) -> Affine {
        let t_offset = Affine::translate(self.offset);
        let t_pivot = Affine::translate(pivot);
        let t_unpivot = Affine::translate(-pivot);
        let t_rotate = Affine::rotate(self.rotation_rad);
        let t_scale = Affine::scale(self.scale);

        // T(offset) * T(pivot) * R(rot) * S(scale) * T(-pivot)
        t_offset * t_pivot * t_rotate * t_scale * t_unpivot
    }

    /// Apply a partial edit; fields left `None` keep their current value.
    pub fn patched(self, patch: TransformPatch) -> Self {
        Self {
            offset: patch.offset.unwrap_or(self.offset),
            scale: patch.scale.unwrap_or(self.scale),
            rotation_rad: patch.rotation_rad.unwrap_or(self.rotation_rad),
        }
    }
}

/// Partial transform edit as accepted by [`crate::Layer::set_transform`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransformPatch {
    /// New offset in canvas pixels.
    pub offset: Option<Vec2>,
    /// New uniform scale factor.
    pub scale: Option<f64>,
    /// New rotation in radians.
    pub rotation_rad: Option<f64>,
}

impl TransformPatch {
    /// Patch that only moves the layer.
    pub fn offset(offset: Vec2) -> Self {
        Self {
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// Patch that only rescales the layer.
    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    /// Patch that only rotates the layer.
    pub fn rotation(rotation_rad: f64) -> Self {
        Self {
            rotation_rad: Some(rotation_rad),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
