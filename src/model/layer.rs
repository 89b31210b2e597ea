use std::fmt;

use crate::{
    assets::image_data::ImageData,
    foundation::core::{
        Affine, CompositionId, ImageId, LayerId, LayerTransform, Timestamp, TransformPatch, now,
    },
    foundation::error::{StageError, StageResult},
};

/// What a layer represents. Persisted as its snake_case tag; unknown tags decode
/// to [`LayerKind::UploadedFile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LayerKind {
    /// Segmented subject from a processed image.
    Subject,
    /// Backdrop imagery placed as a regular layer.
    Background,
    /// Adjustment overlay (shadows, reflections, tints).
    Adjustment,
    /// Arbitrary user-uploaded file.
    UploadedFile,
}

impl LayerKind {
    /// Canonical persisted tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Background => "background",
            Self::Adjustment => "adjustment",
            Self::UploadedFile => "uploaded_file",
        }
    }

    /// Decode a tag, falling back to [`LayerKind::UploadedFile`].
    pub fn parse_lenient(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "subject" => Self::Subject,
            "background" => Self::Background,
            "adjustment" => Self::Adjustment,
            _ => Self::UploadedFile,
        }
    }

    fn default_name(self) -> &'static str {
        match self {
            Self::Subject => "Subject",
            Self::Background => "Background",
            Self::Adjustment => "Adjustment",
            Self::UploadedFile => "Upload",
        }
    }
}

impl From<String> for LayerKind {
    fn from(tag: String) -> Self {
        Self::parse_lenient(&tag)
    }
}

impl From<LayerKind> for String {
    fn from(kind: LayerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positioned, transformed, opacity-controlled image inside a composition.
///
/// The layer owns its pixels outright. `source_image` only records where they
/// were copied from.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) composition: CompositionId,
    pub(crate) name: String,
    pub(crate) kind: LayerKind,
    pub(crate) order_index: u32,
    pub(crate) opacity: f32,
    pub(crate) transform: LayerTransform,
    pub(crate) locked: bool,
    pub(crate) visible: bool,
    pub(crate) pixels: ImageData,
    pub(crate) source_image: Option<ImageId>,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
}

impl Layer {
    pub(crate) fn new(
        composition: CompositionId,
        name: Option<String>,
        kind: LayerKind,
        order_index: u32,
        pixels: ImageData,
        source_image: Option<ImageId>,
    ) -> Self {
        let created_at = now();
        Self {
            id: LayerId::generate(),
            composition,
            name: name.unwrap_or_else(|| kind.default_name().to_string()),
            kind,
            order_index,
            opacity: 1.0,
            transform: LayerTransform::default(),
            locked: false,
            visible: true,
            pixels,
            source_image,
            created_at,
            updated_at: created_at,
        }
    }

    /// Layer identifier.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Owning composition.
    pub fn composition(&self) -> CompositionId {
        self.composition
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer kind.
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Z-order position inside the composition (0 paints first).
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    /// Opacity in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Current placement.
    pub fn transform(&self) -> LayerTransform {
        self.transform
    }

    /// Locked layers reject transform edits.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Hidden layers are skipped by the compositor.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The layer's own pixel copy.
    pub fn pixels(&self) -> &ImageData {
        &self.pixels
    }

    /// Processed image the pixels were copied from, for traceability.
    pub fn source_image(&self) -> Option<ImageId> {
        self.source_image
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last semantic mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Layer-local to canvas mapping, pivoting about the layer centre.
    pub fn affine(&self) -> Affine {
        self.transform.to_affine(self.pixels.canvas().center())
    }

    /// Edit offset, scale and/or rotation.
    ///
    /// Fails with [`StageError::LayerLocked`] on a locked layer, and with a
    /// validation error on a non-finite or non-positive value; the layer is left
    /// unchanged in both cases.
    pub fn set_transform(&mut self, patch: TransformPatch) -> StageResult<()> {
        if self.locked {
            return Err(StageError::LayerLocked(self.id));
        }
        let next = self.transform.patched(patch);
        next.validate()?;
        self.transform = next;
        self.touch();
        Ok(())
    }

    /// Set opacity, clamped to `[0, 1]`. Allowed on locked layers.
    pub fn set_opacity(&mut self, opacity: f32) -> StageResult<()> {
        if !opacity.is_finite() {
            return Err(StageError::validation("opacity must be finite"));
        }
        self.opacity = opacity.clamp(0.0, 1.0);
        self.touch();
        Ok(())
    }

    /// Show or hide. Allowed on locked layers.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.touch();
    }

    /// Lock or unlock transform edits.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.touch();
    }

    /// Rename the layer.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now().max(self.updated_at);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/layer.rs"]
mod tests;
