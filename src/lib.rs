//! Photostage is the composition core of a product-photography studio.
//!
//! A capture session collects processed photos (subject already segmented by an
//! external pipeline). Compositions stack those photos as layers over an optional
//! backdrop, and the compositor flattens the stack into a single premultiplied
//! RGBA8 image.
//!
//! # Pipeline overview
//!
//! 1. **Capture**: [`Studio::ingest_image`] stores processed images under a [`CaptureSession`].
//! 2. **Backdrop**: [`Studio::request_generation`] renders a category prompt
//!    ([`render_prompt`]) into a pending [`BackgroundAsset`]; a [`BackgroundGenerator`]
//!    fills in the pixels asynchronously.
//! 3. **Compose**: layers are added, reordered and transformed on a [`Composition`].
//! 4. **Render**: [`Compositor::render`] paints the backdrop (aspect-fill) and then each
//!    visible layer with source-over alpha compositing onto a transparent canvas.
//! 5. **Export** (optional): [`export_image`] flattens onto an opaque backdrop only when the
//!    target format has no alpha channel.
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Arena storage**: entities live in per-type tables inside [`Studio`]; ownership edges
//!   are id lists on the owner and weak links are resolved by lookup.
//! - **Premultiplied RGBA8** end-to-end; alpha survives every intermediate step.
//! - **Single-owner pixels**: every layer owns an independent copy of its pixel data.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;
mod generation;
mod model;
mod persist;
mod prompt;
mod render;
mod studio;

/// Runtime configuration (aspect ratios, export settings, render threads).
pub mod config;

pub use assets::decode::{ExportFormat, decode_image, encode_image};
pub use assets::image_data::ImageData;
pub use config::StudioConfig;
pub use foundation::core::{
    Affine, BackgroundId, Canvas, CompositionId, EntityKind, ImageId, LayerId, LayerTransform,
    SessionId, Timestamp, TransformPatch, Vec2,
};
pub use foundation::error::{StageError, StageResult};
pub use generation::dedup::DedupGenerator;
pub use generation::request::{
    BackgroundGenerator, GenerationOutcome, GenerationRequest, GenerationTicket,
    PendingGeneration,
};
pub use model::background::BackgroundAsset;
pub use model::composition::Composition;
pub use model::image::{CapturedImage, ProcessedImage};
pub use model::layer::{Layer, LayerKind};
pub use model::session::{CaptureSession, SessionStatus};
pub use persist::blob::{BlobRef, BlobStore, DirBlobStore, MemoryBlobStore};
pub use persist::snapshot::{
    BackgroundRecord, CompositionRecord, ImageRecord, LayerRecord, SNAPSHOT_VERSION,
    SessionRecord, SessionSnapshot,
};
pub use prompt::catalog::{
    CONSTRAINTS_LINE, Category, PromptComponents, default_components, render_prompt,
};
pub use render::compositor::{Compositor, RenderJob, RenderSettings};
pub use render::export::{export_image, flatten_onto};
pub use studio::{SessionDeletion, Studio};
