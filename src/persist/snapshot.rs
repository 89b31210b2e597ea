//! Durable, JSON-serializable form of one capture session subtree.
//!
//! Pixel payloads are written out-of-line through a [`BlobStore`] and referenced
//! by [`BlobRef`]. Everything else (ids, timestamps, ordering, links) is stored
//! verbatim so that a snapshot re-imports into an identical entity graph.

use std::path::Path;

use anyhow::Context;

use crate::{
    foundation::core::{
        BackgroundId, CompositionId, ImageId, LayerId, LayerTransform, SessionId, Timestamp,
    },
    foundation::error::{StageError, StageResult},
    model::{
        background::BackgroundAsset,
        composition::Composition,
        image::ProcessedImage,
        layer::{Layer, LayerKind},
        session::{CaptureSession, SessionStatus},
    },
    persist::blob::{BlobRef, BlobStore},
    prompt::catalog::Category,
};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Session subtree: the session plus every image, composition, layer and
/// background it owns.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    /// Layout version, see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Session fields.
    pub session: SessionRecord,
    /// Owned processed images, in capture order.
    pub images: Vec<ImageRecord>,
    /// Owned compositions, in creation order, each with its layers.
    pub compositions: Vec<CompositionRecord>,
    /// Owned backgrounds, in request order.
    pub backgrounds: Vec<BackgroundRecord>,
}

/// Persisted [`CaptureSession`] fields. Owned entity ids are implied by the
/// snapshot's lists.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct SessionRecord {
    pub id: SessionId,
    pub stock_number: String,
    pub title: String,
    pub notes: String,
    pub status: SessionStatus,
    pub categories: Vec<String>,
    pub cover_image: Option<BlobRef>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Persisted [`ProcessedImage`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct ImageRecord {
    pub id: ImageId,
    pub captured_at: Timestamp,
    pub pixels: BlobRef,
}

/// Persisted [`Composition`] with its layers in z-order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct CompositionRecord {
    pub id: CompositionId,
    pub name: String,
    pub notes: String,
    pub background: Option<BackgroundId>,
    pub layers: Vec<LayerRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Persisted [`Layer`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct LayerRecord {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub order_index: u32,
    pub opacity: f32,
    pub transform: LayerTransform,
    pub locked: bool,
    pub visible: bool,
    pub pixels: BlobRef,
    pub source_image: Option<ImageId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Persisted [`BackgroundAsset`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct BackgroundRecord {
    pub id: BackgroundId,
    pub prompt: String,
    pub category: Category,
    pub aspect_ratio: String,
    pub shared: bool,
    pub pixels: Option<BlobRef>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SessionSnapshot {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> StageResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON, rejecting unknown layout versions.
    pub fn from_json(json: &str) -> StageResult<Self> {
        let snap: Self = serde_json::from_str(json)?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(StageError::validation(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snap.version
            )));
        }
        Ok(snap)
    }

    /// Write JSON to `path`.
    pub fn write_file(&self, path: &Path) -> StageResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("write snapshot '{}'", path.display()))?;
        Ok(())
    }

    /// Read JSON from `path`.
    pub fn read_file(path: &Path) -> StageResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read snapshot '{}'", path.display()))?;
        Self::from_json(&text)
    }
}

impl SessionRecord {
    pub(crate) fn capture<B: BlobStore + ?Sized>(
        s: &CaptureSession,
        blobs: &mut B,
    ) -> StageResult<Self> {
        Ok(Self {
            id: s.id,
            stock_number: s.stock_number.clone(),
            title: s.title.clone(),
            notes: s.notes.clone(),
            status: s.status,
            categories: s.categories.clone(),
            cover_image: s.cover_image.as_ref().map(|c| blobs.put(c)).transpose()?,
            created_at: s.created_at,
            updated_at: s.updated_at,
        })
    }

    pub(crate) fn restore<B: BlobStore + ?Sized>(&self, blobs: &B) -> StageResult<CaptureSession> {
        if self.stock_number.trim().is_empty() {
            return Err(StageError::validation("stock number must be non-empty"));
        }
        Ok(CaptureSession {
            id: self.id,
            stock_number: self.stock_number.clone(),
            title: self.title.clone(),
            notes: self.notes.clone(),
            status: self.status,
            categories: self.categories.clone(),
            cover_image: self.cover_image.as_ref().map(|b| blobs.get(b)).transpose()?,
            image_ids: Vec::new(),
            composition_ids: Vec::new(),
            background_ids: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ImageRecord {
    pub(crate) fn capture<B: BlobStore + ?Sized>(
        img: &ProcessedImage,
        blobs: &mut B,
    ) -> StageResult<Self> {
        Ok(Self {
            id: img.id,
            captured_at: img.captured_at,
            pixels: blobs.put(&img.pixels)?,
        })
    }

    pub(crate) fn restore<B: BlobStore + ?Sized>(
        &self,
        session: SessionId,
        blobs: &B,
    ) -> StageResult<ProcessedImage> {
        Ok(ProcessedImage {
            id: self.id,
            session,
            captured_at: self.captured_at,
            pixels: blobs.get(&self.pixels)?,
        })
    }
}

impl CompositionRecord {
    pub(crate) fn capture<B: BlobStore + ?Sized>(
        comp: &Composition,
        layers: &[&Layer],
        blobs: &mut B,
    ) -> StageResult<Self> {
        Ok(Self {
            id: comp.id,
            name: comp.name.clone(),
            notes: comp.notes.clone(),
            background: comp.background,
            layers: layers
                .iter()
                .map(|l| LayerRecord::capture(l, blobs))
                .collect::<StageResult<_>>()?,
            created_at: comp.created_at,
            updated_at: comp.updated_at,
        })
    }

    /// Rebuild the composition and its layers. Layer order must be exactly
    /// `0..n` in list order.
    pub(crate) fn restore<B: BlobStore + ?Sized>(
        &self,
        session: SessionId,
        blobs: &B,
    ) -> StageResult<(Composition, Vec<Layer>)> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for (i, rec) in self.layers.iter().enumerate() {
            if rec.order_index as usize != i {
                return Err(StageError::validation(format!(
                    "composition {}: layer {} has order index {} at position {i}",
                    self.id, rec.id, rec.order_index
                )));
            }
            layers.push(rec.restore(self.id, blobs)?);
        }
        let comp = Composition {
            id: self.id,
            name: self.name.clone(),
            notes: self.notes.clone(),
            session: Some(session),
            background: self.background,
            layer_ids: layers.iter().map(|l| l.id).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok((comp, layers))
    }
}

impl LayerRecord {
    fn capture<B: BlobStore + ?Sized>(l: &Layer, blobs: &mut B) -> StageResult<Self> {
        Ok(Self {
            id: l.id,
            name: l.name.clone(),
            kind: l.kind,
            order_index: l.order_index,
            opacity: l.opacity,
            transform: l.transform,
            locked: l.locked,
            visible: l.visible,
            pixels: blobs.put(&l.pixels)?,
            source_image: l.source_image,
            created_at: l.created_at,
            updated_at: l.updated_at,
        })
    }

    fn restore<B: BlobStore + ?Sized>(
        &self,
        composition: CompositionId,
        blobs: &B,
    ) -> StageResult<Layer> {
        self.transform.validate()?;
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(StageError::validation(format!(
                "layer {}: opacity {} outside [0, 1]",
                self.id, self.opacity
            )));
        }
        Ok(Layer {
            id: self.id,
            composition,
            name: self.name.clone(),
            kind: self.kind,
            order_index: self.order_index,
            opacity: self.opacity,
            transform: self.transform,
            locked: self.locked,
            visible: self.visible,
            pixels: blobs.get(&self.pixels)?,
            source_image: self.source_image,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl BackgroundRecord {
    pub(crate) fn capture<B: BlobStore + ?Sized>(
        bg: &BackgroundAsset,
        blobs: &mut B,
    ) -> StageResult<Self> {
        Ok(Self {
            id: bg.id,
            prompt: bg.prompt.clone(),
            category: bg.category,
            aspect_ratio: bg.aspect_ratio.clone(),
            shared: bg.shared,
            pixels: bg.pixels.as_ref().map(|p| blobs.put(p)).transpose()?,
            created_at: bg.created_at,
            updated_at: bg.updated_at,
        })
    }

    pub(crate) fn restore<B: BlobStore + ?Sized>(
        &self,
        session: SessionId,
        blobs: &B,
    ) -> StageResult<BackgroundAsset> {
        Ok(BackgroundAsset {
            id: self.id,
            session: Some(session),
            prompt: self.prompt.clone(),
            category: self.category,
            aspect_ratio: self.aspect_ratio.clone(),
            shared: self.shared,
            pixels: self.pixels.as_ref().map(|b| blobs.get(b)).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
