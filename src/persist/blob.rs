use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    assets::image_data::ImageData,
    foundation::error::{StageError, StageResult},
    foundation::math::Fnv1a64,
};

/// Content-addressed handle to stored pixels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlobRef {
    /// FNV-1a 64 over dimensions and premultiplied bytes, lowercase hex.
    pub key: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BlobRef {
    /// Reference for `img`. Identical pixels always produce the same key.
    pub fn for_image(img: &ImageData) -> Self {
        Self {
            key: content_key(img),
            width: img.width(),
            height: img.height(),
        }
    }
}

fn content_key(img: &ImageData) -> String {
    let mut h = Fnv1a64::new_default();
    h.write_u32(img.width());
    h.write_u32(img.height());
    h.write_bytes(img.as_bytes());
    format!("{:016x}", h.finish())
}

fn check_integrity(blob: &BlobRef, img: &ImageData) -> StageResult<()> {
    if img.width() != blob.width || img.height() != blob.height || content_key(img) != blob.key {
        return Err(StageError::validation(format!(
            "blob {} does not match its content",
            blob.key
        )));
    }
    Ok(())
}

/// Storage for the pixel payloads a [`crate::SessionSnapshot`] points at.
pub trait BlobStore {
    /// Store `img` (deduplicated by content) and return its handle.
    fn put(&mut self, img: &ImageData) -> StageResult<BlobRef>;

    /// Load the pixels behind `blob`. Fails when missing or corrupted.
    fn get(&self, blob: &BlobRef) -> StageResult<ImageData>;

    /// `true` when `blob` is present.
    fn contains(&self, blob: &BlobRef) -> bool;
}

/// In-process blob store.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, ImageData>,
}

impl MemoryBlobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// `true` when no blobs are held.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&mut self, img: &ImageData) -> StageResult<BlobRef> {
        let blob = BlobRef::for_image(img);
        self.blobs
            .entry(blob.key.clone())
            .or_insert_with(|| img.clone());
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> StageResult<ImageData> {
        let img = self
            .blobs
            .get(&blob.key)
            .ok_or_else(|| StageError::validation(format!("missing blob {}", blob.key)))?;
        check_integrity(blob, img)?;
        Ok(img.clone())
    }

    fn contains(&self, blob: &BlobRef) -> bool {
        self.blobs.contains_key(&blob.key)
    }
}

/// Blob store backed by one raw premultiplied RGBA8 file per blob.
#[derive(Clone, Debug)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Open (creating if needed) a blob directory.
    pub fn open(root: impl Into<PathBuf>) -> StageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create blob dir '{}'", root.display()))?;
        Ok(Self { root })
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StageResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StageError::validation(format!("malformed blob key '{key}'")));
        }
        Ok(self.root.join(format!("{key}.rgba")))
    }
}

impl BlobStore for DirBlobStore {
    fn put(&mut self, img: &ImageData) -> StageResult<BlobRef> {
        let blob = BlobRef::for_image(img);
        let path = self.path_for(&blob.key)?;
        if !path.exists() {
            std::fs::write(&path, img.as_bytes())
                .with_context(|| format!("write blob '{}'", path.display()))?;
            tracing::trace!(key = %blob.key, "blob written");
        }
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> StageResult<ImageData> {
        let path = self.path_for(&blob.key)?;
        let bytes =
            std::fs::read(&path).with_context(|| format!("read blob '{}'", path.display()))?;
        let img = ImageData::new(blob.width, blob.height, bytes)?;
        check_integrity(blob, &img)?;
        Ok(img)
    }

    fn contains(&self, blob: &BlobRef) -> bool {
        self.path_for(&blob.key).is_ok_and(|p| p.exists())
    }
}
