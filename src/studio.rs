//! Entity arena.
//!
//! Every entity type lives in its own table keyed by id. Ownership edges are id
//! lists on the owner (session -> images/compositions/backgrounds, composition ->
//! layers) and weak links are plain ids resolved by lookup. Deleting an owner
//! cascades through its id lists; deleting a link target clears the links that
//! point at it.

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    hash::Hash,
};

use crate::{
    assets::image_data::ImageData,
    config::StudioConfig,
    foundation::core::{
        BackgroundId, CompositionId, EntityKind, ImageId, LayerId, SessionId, TransformPatch,
    },
    foundation::error::{StageError, StageResult},
    generation::request::{GenerationOutcome, GenerationRequest, GenerationTicket},
    model::{
        background::BackgroundAsset,
        composition::Composition,
        image::{CapturedImage, ProcessedImage},
        layer::{Layer, LayerKind},
        session::{CaptureSession, SessionStatus},
    },
    persist::{
        blob::BlobStore,
        snapshot::{
            BackgroundRecord, CompositionRecord, ImageRecord, SNAPSHOT_VERSION, SessionRecord,
            SessionSnapshot,
        },
    },
    prompt::catalog::{Category, default_components, render_prompt},
    render::compositor::{Compositor, RenderJob},
};

/// What [`Studio::delete_session`] removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionDeletion {
    /// Processed images deleted.
    pub images: usize,
    /// Owned compositions deleted.
    pub compositions: usize,
    /// Layers deleted along with those compositions.
    pub layers: usize,
    /// Background assets deleted.
    pub backgrounds: usize,
    /// Compositions outside the session whose session or background link was cleared.
    pub unlinked_compositions: usize,
}

/// In-process owner of every session, image, composition, layer and background.
#[derive(Clone, Debug, Default)]
pub struct Studio {
    config: StudioConfig,
    sessions: BTreeMap<SessionId, CaptureSession>,
    images: BTreeMap<ImageId, ProcessedImage>,
    compositions: BTreeMap<CompositionId, Composition>,
    layers: BTreeMap<LayerId, Layer>,
    backgrounds: BTreeMap<BackgroundId, BackgroundAsset>,
}

impl Studio {
    /// Empty studio using `config`.
    pub fn new(config: StudioConfig) -> StageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Lookups

    /// Session by id.
    pub fn session(&self, id: SessionId) -> StageResult<&CaptureSession> {
        self.sessions
            .get(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Session, id.as_uuid()))
    }

    /// Processed image by id.
    pub fn image(&self, id: ImageId) -> StageResult<&ProcessedImage> {
        self.images
            .get(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Image, id.as_uuid()))
    }

    /// Composition by id.
    pub fn composition(&self, id: CompositionId) -> StageResult<&Composition> {
        self.compositions
            .get(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Composition, id.as_uuid()))
    }

    /// Layer by id.
    pub fn layer(&self, id: LayerId) -> StageResult<&Layer> {
        self.layers
            .get(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Layer, id.as_uuid()))
    }

    /// Background asset by id.
    pub fn background(&self, id: BackgroundId) -> StageResult<&BackgroundAsset> {
        self.backgrounds
            .get(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Background, id.as_uuid()))
    }

    /// All sessions, ordered by id.
    pub fn sessions(&self) -> impl Iterator<Item = &CaptureSession> {
        self.sessions.values()
    }

    /// All compositions, ordered by id.
    pub fn compositions(&self) -> impl Iterator<Item = &Composition> {
        self.compositions.values()
    }

    /// All background assets, ordered by id.
    pub fn backgrounds(&self) -> impl Iterator<Item = &BackgroundAsset> {
        self.backgrounds.values()
    }

    /// Sessions grouped under one stock number.
    pub fn sessions_by_stock_number<'a>(
        &'a self,
        stock_number: &'a str,
    ) -> impl Iterator<Item = &'a CaptureSession> + 'a {
        let wanted = stock_number.trim();
        self.sessions
            .values()
            .filter(move |s| s.stock_number() == wanted)
    }

    /// Background assets marked for community reuse that already have pixels.
    pub fn shared_backgrounds(&self) -> impl Iterator<Item = &BackgroundAsset> {
        self.backgrounds
            .values()
            .filter(|b| b.is_shared() && !b.is_pending())
    }

    /// Entity counts `(sessions, images, compositions, layers, backgrounds)`.
    pub fn counts(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.sessions.len(),
            self.images.len(),
            self.compositions.len(),
            self.layers.len(),
            self.backgrounds.len(),
        )
    }

    fn session_mut(&mut self, id: SessionId) -> StageResult<&mut CaptureSession> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Session, id.as_uuid()))
    }

    fn composition_mut(&mut self, id: CompositionId) -> StageResult<&mut Composition> {
        self.compositions
            .get_mut(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Composition, id.as_uuid()))
    }

    fn layer_mut(&mut self, id: LayerId) -> StageResult<&mut Layer> {
        self.layers
            .get_mut(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Layer, id.as_uuid()))
    }

    fn background_mut(&mut self, id: BackgroundId) -> StageResult<&mut BackgroundAsset> {
        self.backgrounds
            .get_mut(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Background, id.as_uuid()))
    }

    fn require_session_link(&self, id: SessionId) -> StageResult<()> {
        if self.sessions.contains_key(&id) {
            Ok(())
        } else {
            Err(StageError::dangling(EntityKind::Session, id.as_uuid()))
        }
    }

    // ---------------------------------------------------------------------
    // Sessions

    /// Start a capture batch in the `planning` state.
    pub fn create_session(&mut self, stock_number: &str) -> StageResult<SessionId> {
        let session = CaptureSession::new(stock_number)?;
        let id = session.id;
        tracing::debug!(session = %id, stock = session.stock_number(), "session created");
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Delete a session and everything it owns.
    ///
    /// Owned images, compositions (with their layers) and backgrounds are removed.
    /// Compositions outside the session keep existing; their links to the session
    /// or to any deleted background are cleared.
    #[tracing::instrument(skip(self))]
    pub fn delete_session(&mut self, id: SessionId) -> StageResult<SessionDeletion> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Session, id.as_uuid()))?;
        let mut report = SessionDeletion::default();

        for image in &session.image_ids {
            if self.images.remove(image).is_some() {
                report.images += 1;
            }
            self.clear_source_links(*image);
        }
        for comp in &session.composition_ids {
            if let Some(removed) = self.compositions.remove(comp) {
                report.compositions += 1;
                report.layers += self.drop_layers(&removed.layer_ids);
            }
        }
        for bg in &session.background_ids {
            if self.backgrounds.remove(bg).is_some() {
                report.backgrounds += 1;
            }
        }

        for comp in self.compositions.values_mut() {
            let mut changed = false;
            if comp.session == Some(id) {
                comp.session = None;
                changed = true;
            }
            if comp
                .background
                .is_some_and(|bg| session.background_ids.contains(&bg))
            {
                comp.background = None;
                changed = true;
            }
            if changed {
                comp.touch();
                report.unlinked_compositions += 1;
            }
        }
        debug_assert!(self.images.values().all(|i| i.session != id));
        debug_assert!(self.backgrounds.values().all(|b| b.session != Some(id)));

        tracing::info!(
            session = %id,
            images = report.images,
            compositions = report.compositions,
            layers = report.layers,
            backgrounds = report.backgrounds,
            "session deleted"
        );
        Ok(report)
    }

    /// Move a session to any status.
    pub fn set_session_status(&mut self, id: SessionId, status: SessionStatus) -> StageResult<()> {
        self.session_mut(id)?.set_status(status);
        Ok(())
    }

    /// Replace a session's title.
    pub fn set_session_title(&mut self, id: SessionId, title: &str) -> StageResult<()> {
        self.session_mut(id)?.set_title(title);
        Ok(())
    }

    /// Replace a session's notes.
    pub fn set_session_notes(&mut self, id: SessionId, notes: &str) -> StageResult<()> {
        self.session_mut(id)?.set_notes(notes);
        Ok(())
    }

    /// Add a category tag; `false` when blank or already present.
    pub fn add_session_category(&mut self, id: SessionId, tag: &str) -> StageResult<bool> {
        Ok(self.session_mut(id)?.add_category(tag))
    }

    /// Remove a category tag; `false` when absent.
    pub fn remove_session_category(&mut self, id: SessionId, tag: &str) -> StageResult<bool> {
        Ok(self.session_mut(id)?.remove_category(tag))
    }

    /// Set or clear the cover image.
    pub fn set_session_cover(&mut self, id: SessionId, cover: Option<ImageData>) -> StageResult<()> {
        self.session_mut(id)?.set_cover_image(cover);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Processed images

    /// Store a processed image from the capture pipeline under `session`.
    pub fn ingest_image(&mut self, session: SessionId, captured: CapturedImage) -> StageResult<ImageId> {
        let owner = self.session_mut(session)?;
        let image = ProcessedImage::new(session, captured);
        let id = image.id;
        owner.image_ids.push(id);
        tracing::debug!(%session, image = %id, "image ingested");
        self.images.insert(id, image);
        Ok(id)
    }

    /// Delete a processed image. Layers copied from it keep their pixels; their
    /// traceability link is cleared.
    pub fn remove_image(&mut self, id: ImageId) -> StageResult<()> {
        let image = self
            .images
            .remove(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Image, id.as_uuid()))?;
        if let Some(owner) = self.sessions.get_mut(&image.session) {
            owner.image_ids.retain(|i| *i != id);
        }
        self.clear_source_links(id);
        Ok(())
    }

    fn clear_source_links(&mut self, image: ImageId) {
        for layer in self.layers.values_mut() {
            if layer.source_image == Some(image) {
                layer.source_image = None;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Compositions

    /// Create a composition. With `session`, the session owns it and deletes it
    /// along with itself; without, it stands alone.
    pub fn create_composition(
        &mut self,
        name: &str,
        session: Option<SessionId>,
    ) -> StageResult<CompositionId> {
        if let Some(s) = session {
            self.require_session_link(s)?;
        }
        let comp = Composition::new(name, session);
        let id = comp.id;
        if let Some(s) = session {
            self.session_mut(s)?.composition_ids.push(id);
        }
        self.compositions.insert(id, comp);
        Ok(id)
    }

    /// Delete a composition and its layers. A referenced background is left alone.
    pub fn delete_composition(&mut self, id: CompositionId) -> StageResult<usize> {
        let comp = self
            .compositions
            .remove(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Composition, id.as_uuid()))?;
        if let Some(s) = comp.session
            && let Some(owner) = self.sessions.get_mut(&s)
        {
            owner.composition_ids.retain(|c| *c != id);
        }
        Ok(self.drop_layers(&comp.layer_ids))
    }

    fn drop_layers(&mut self, ids: &[LayerId]) -> usize {
        ids.iter()
            .filter(|l| self.layers.remove(*l).is_some())
            .count()
    }

    /// Rename a composition.
    pub fn rename_composition(&mut self, id: CompositionId, name: &str) -> StageResult<()> {
        let comp = self.composition_mut(id)?;
        comp.name = name.to_string();
        comp.touch();
        Ok(())
    }

    /// Replace a composition's notes.
    pub fn set_composition_notes(&mut self, id: CompositionId, notes: &str) -> StageResult<()> {
        let comp = self.composition_mut(id)?;
        comp.notes = notes.to_string();
        comp.touch();
        Ok(())
    }

    /// Link a standalone composition to a session (weakly), or clear the link.
    ///
    /// Compositions created inside a session are owned by it and cannot be
    /// re-linked.
    pub fn attach_session(
        &mut self,
        id: CompositionId,
        session: Option<SessionId>,
    ) -> StageResult<()> {
        if let Some(s) = session {
            self.require_session_link(s)?;
        }
        let current = self.composition(id)?.session;
        if let Some(owner) = current
            && self
                .sessions
                .get(&owner)
                .is_some_and(|s| s.composition_ids.contains(&id))
        {
            if current == session {
                return Ok(());
            }
            return Err(StageError::validation(format!(
                "composition {id} is owned by session {owner}"
            )));
        }
        let comp = self.composition_mut(id)?;
        comp.session = session;
        comp.touch();
        Ok(())
    }

    /// Point a composition at a background asset (weak link).
    pub fn attach_background(&mut self, id: CompositionId, background: BackgroundId) -> StageResult<()> {
        if !self.backgrounds.contains_key(&background) {
            return Err(StageError::dangling(
                EntityKind::Background,
                background.as_uuid(),
            ));
        }
        let comp = self.composition_mut(id)?;
        comp.background = Some(background);
        comp.touch();
        Ok(())
    }

    /// Clear a composition's background link.
    pub fn detach_background(&mut self, id: CompositionId) -> StageResult<()> {
        let comp = self.composition_mut(id)?;
        if comp.background.take().is_some() {
            comp.touch();
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Layers

    /// Append a layer sourced from a processed image. The pixels are copied.
    pub fn add_layer(
        &mut self,
        composition: CompositionId,
        image: ImageId,
        kind: LayerKind,
    ) -> StageResult<LayerId> {
        let pixels = self.image(image)?.pixels.clone();
        self.push_layer(composition, None, kind, pixels, Some(image))
    }

    /// Append a layer from pixels that did not come through the capture pipeline.
    pub fn add_uploaded_layer(
        &mut self,
        composition: CompositionId,
        name: Option<&str>,
        pixels: ImageData,
    ) -> StageResult<LayerId> {
        self.push_layer(
            composition,
            name.map(str::to_string),
            LayerKind::UploadedFile,
            pixels,
            None,
        )
    }

    fn push_layer(
        &mut self,
        composition: CompositionId,
        name: Option<String>,
        kind: LayerKind,
        pixels: ImageData,
        source: Option<ImageId>,
    ) -> StageResult<LayerId> {
        if pixels.canvas().is_empty() {
            return Err(StageError::invalid_geometry(format!(
                "layer pixels {}x{} have zero area",
                pixels.width(),
                pixels.height()
            )));
        }
        let comp = self.composition_mut(composition)?;
        let order = u32::try_from(comp.layer_ids.len())
            .map_err(|_| StageError::validation("too many layers"))?;
        let layer = Layer::new(composition, name, kind, order, pixels, source);
        let id = layer.id;
        comp.layer_ids.push(id);
        comp.touch();
        self.layers.insert(id, layer);
        self.debug_check_order(composition);
        Ok(id)
    }

    /// Remove a layer and close the gap in the order.
    pub fn remove_layer(&mut self, id: LayerId) -> StageResult<()> {
        let layer = self
            .layers
            .remove(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Layer, id.as_uuid()))?;
        let comp = self.composition_mut(layer.composition)?;
        comp.layer_ids.retain(|l| *l != id);
        comp.touch();
        self.renumber(layer.composition);
        Ok(())
    }

    /// Move the layer at position `from` to position `to`. Ids keep pointing at
    /// the same layers; order indices are renumbered `0..n`.
    pub fn reorder_layer(&mut self, composition: CompositionId, from: usize, to: usize) -> StageResult<()> {
        let comp = self.composition_mut(composition)?;
        let n = comp.layer_ids.len();
        if from >= n || to >= n {
            return Err(StageError::validation(format!(
                "reorder {from} -> {to} out of range for {n} layers"
            )));
        }
        if from == to {
            return Ok(());
        }
        let moved = comp.layer_ids.remove(from);
        comp.layer_ids.insert(to, moved);
        comp.touch();
        self.renumber(composition);
        Ok(())
    }

    fn renumber(&mut self, composition: CompositionId) {
        let Some(comp) = self.compositions.get(&composition) else {
            return;
        };
        for (i, id) in comp.layer_ids.iter().enumerate() {
            if let Some(layer) = self.layers.get_mut(id) {
                let idx = i as u32;
                if layer.order_index != idx {
                    layer.order_index = idx;
                    layer.touch();
                }
            }
        }
        self.debug_check_order(composition);
    }

    fn debug_check_order(&self, composition: CompositionId) {
        if cfg!(debug_assertions)
            && let Some(comp) = self.compositions.get(&composition)
        {
            for (i, id) in comp.layer_ids.iter().enumerate() {
                let layer = self.layers.get(id);
                debug_assert!(
                    layer.is_some_and(|l| l.order_index as usize == i && l.composition == composition),
                    "composition {composition}: layer {id} out of order at {i}"
                );
            }
        }
    }

    /// Edit a layer's transform. Locked layers are left untouched.
    pub fn set_layer_transform(&mut self, id: LayerId, patch: TransformPatch) -> StageResult<()> {
        self.layer_mut(id)?.set_transform(patch)
    }

    /// Set a layer's opacity (clamped to `[0, 1]`).
    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> StageResult<()> {
        self.layer_mut(id)?.set_opacity(opacity)
    }

    /// Show or hide a layer.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> StageResult<()> {
        self.layer_mut(id)?.set_visible(visible);
        Ok(())
    }

    /// Lock or unlock a layer's transform.
    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> StageResult<()> {
        self.layer_mut(id)?.set_locked(locked);
        Ok(())
    }

    /// Rename a layer.
    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> StageResult<()> {
        self.layer_mut(id)?.rename(name);
        Ok(())
    }

    /// Layers of a composition in z-order.
    pub fn sorted_layers(&self, composition: CompositionId) -> StageResult<Vec<&Layer>> {
        let comp = self.composition(composition)?;
        comp.layer_ids.iter().map(|id| self.layer(*id)).collect()
    }

    /// Visible layers of a composition in z-order.
    pub fn visible_layers(&self, composition: CompositionId) -> StageResult<Vec<&Layer>> {
        let mut layers = self.sorted_layers(composition)?;
        layers.retain(|l| l.is_visible());
        Ok(layers)
    }

    // ---------------------------------------------------------------------
    // Backgrounds

    /// Render a category prompt and record a pending background for it.
    ///
    /// The returned ticket carries everything the backend needs; pass its
    /// outcome to [`Studio::complete_generation`].
    #[tracing::instrument(skip(self, custom_subject))]
    pub fn request_generation(
        &mut self,
        session: Option<SessionId>,
        category: Category,
        custom_subject: Option<&str>,
        aspect_ratio: &str,
    ) -> StageResult<GenerationTicket> {
        self.config.check_aspect_ratio(aspect_ratio)?;
        if let Some(s) = session {
            self.require_session_link(s)?;
        }
        let prompt = render_prompt(&default_components(category), custom_subject);
        let asset = BackgroundAsset::pending(session, prompt, category, aspect_ratio.trim().to_string());
        let ticket = ticket_for(&asset);
        self.insert_background(asset)?;
        tracing::debug!(background = %ticket.background, "generation requested");
        Ok(ticket)
    }

    /// Re-issue the request for a background that is still pending.
    pub fn retry_generation(&self, id: BackgroundId) -> StageResult<GenerationTicket> {
        let asset = self.background(id)?;
        if !asset.is_pending() {
            return Err(StageError::validation(format!(
                "background {id} already has pixels"
            )));
        }
        Ok(ticket_for(asset))
    }

    /// Apply a generation outcome.
    ///
    /// Success stores the pixels. Failure leaves the asset pending and is
    /// reported as [`StageError::GenerationFailed`]; retry with
    /// [`Studio::retry_generation`].
    #[tracing::instrument(skip(self, outcome), fields(background = %outcome.background))]
    pub fn complete_generation(&mut self, outcome: GenerationOutcome) -> StageResult<BackgroundId> {
        let id = outcome.background;
        let asset = self.background_mut(id)?;
        match outcome.result {
            Ok(pixels) => {
                asset.fulfill(pixels)?;
                tracing::info!("background generated");
                Ok(id)
            }
            Err(reason) => {
                tracing::warn!(%reason, "background generation failed");
                Err(StageError::generation_failed(id, reason))
            }
        }
    }

    /// Store an uploaded backdrop. The aspect ratio is derived from its size.
    pub fn import_background(
        &mut self,
        session: Option<SessionId>,
        category: Category,
        pixels: ImageData,
    ) -> StageResult<BackgroundId> {
        if pixels.canvas().is_empty() {
            return Err(StageError::invalid_geometry("uploaded background has zero area"));
        }
        if let Some(s) = session {
            self.require_session_link(s)?;
        }
        let aspect = reduced_ratio(pixels.width(), pixels.height());
        let asset = BackgroundAsset::uploaded(session, String::new(), category, aspect, pixels);
        self.insert_background(asset)
    }

    fn insert_background(&mut self, asset: BackgroundAsset) -> StageResult<BackgroundId> {
        let id = asset.id;
        if let Some(s) = asset.session {
            self.session_mut(s)?.background_ids.push(id);
        }
        self.backgrounds.insert(id, asset);
        Ok(id)
    }

    /// Delete a background. Every composition pointing at it loses the link;
    /// returns how many did.
    pub fn delete_background(&mut self, id: BackgroundId) -> StageResult<usize> {
        let asset = self
            .backgrounds
            .remove(&id)
            .ok_or_else(|| StageError::unknown(EntityKind::Background, id.as_uuid()))?;
        if let Some(s) = asset.session
            && let Some(owner) = self.sessions.get_mut(&s)
        {
            owner.background_ids.retain(|b| *b != id);
        }
        let mut cleared = 0;
        for comp in self.compositions.values_mut() {
            if comp.background == Some(id) {
                comp.background = None;
                comp.touch();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Toggle community sharing on a background.
    pub fn set_background_shared(&mut self, id: BackgroundId, shared: bool) -> StageResult<()> {
        self.background_mut(id)?.set_shared(shared);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Rendering

    /// Owned copy of everything needed to render a composition.
    ///
    /// A linked background that is still pending is left out.
    pub fn render_job(&self, composition: CompositionId) -> StageResult<RenderJob> {
        let comp = self.composition(composition)?;
        let layers = self
            .visible_layers(composition)?
            .into_iter()
            .cloned()
            .collect();
        let background = match comp.background {
            Some(bg) => self.background(bg)?.pixels().cloned(),
            None => None,
        };
        Ok(RenderJob {
            composition,
            layers,
            background,
        })
    }

    /// Render a composition on the calling thread.
    pub fn render_composition(
        &self,
        composition: CompositionId,
        compositor: &Compositor,
    ) -> StageResult<ImageData> {
        self.render_job(composition)?.render(compositor)
    }

    // ---------------------------------------------------------------------
    // Persistence

    /// Snapshot a session subtree, writing pixels to `blobs`.
    #[tracing::instrument(skip(self, blobs))]
    pub fn export_session<B: BlobStore + ?Sized>(
        &self,
        id: SessionId,
        blobs: &mut B,
    ) -> StageResult<SessionSnapshot> {
        let session = self.session(id)?;
        let images = session
            .image_ids
            .iter()
            .map(|i| ImageRecord::capture(self.image(*i)?, blobs))
            .collect::<StageResult<Vec<_>>>()?;
        let compositions = session
            .composition_ids
            .iter()
            .map(|c| {
                let comp = self.composition(*c)?;
                let layers = self.sorted_layers(*c)?;
                CompositionRecord::capture(comp, &layers, blobs)
            })
            .collect::<StageResult<Vec<_>>>()?;
        let backgrounds = session
            .background_ids
            .iter()
            .map(|b| BackgroundRecord::capture(self.background(*b)?, blobs))
            .collect::<StageResult<Vec<_>>>()?;
        Ok(SessionSnapshot {
            version: SNAPSHOT_VERSION,
            session: SessionRecord::capture(session, blobs)?,
            images,
            compositions,
            backgrounds,
        })
    }

    /// Rebuild a session subtree from a snapshot.
    ///
    /// Nothing is inserted unless the whole snapshot loads: ids must be new to
    /// this studio and unique within the snapshot, every blob must resolve, and composition background links
    /// must point at a background in the snapshot or already in the studio.
    #[tracing::instrument(skip(self, snapshot, blobs), fields(session = %snapshot.session.id))]
    pub fn import_session<B: BlobStore + ?Sized>(
        &mut self,
        snapshot: &SessionSnapshot,
        blobs: &B,
    ) -> StageResult<SessionId> {
        let sid = snapshot.session.id;
        if self.sessions.contains_key(&sid) {
            return Err(StageError::validation(format!("session {sid} already exists")));
        }
        let mut session = snapshot.session.restore(blobs)?;

        let mut seen_images = HashSet::new();
        let mut images = Vec::with_capacity(snapshot.images.len());
        for rec in &snapshot.images {
            claim_id(&mut seen_images, self.images.contains_key(&rec.id), "image", rec.id)?;
            images.push(rec.restore(sid, blobs)?);
        }
        let mut seen_backgrounds = HashSet::new();
        let mut backgrounds = Vec::with_capacity(snapshot.backgrounds.len());
        for rec in &snapshot.backgrounds {
            claim_id(
                &mut seen_backgrounds,
                self.backgrounds.contains_key(&rec.id),
                "background",
                rec.id,
            )?;
            backgrounds.push(rec.restore(sid, blobs)?);
        }
        let mut seen_compositions = HashSet::new();
        let mut seen_layers = HashSet::new();
        let mut compositions = Vec::with_capacity(snapshot.compositions.len());
        for rec in &snapshot.compositions {
            claim_id(
                &mut seen_compositions,
                self.compositions.contains_key(&rec.id),
                "composition",
                rec.id,
            )?;
            if let Some(bg) = rec.background
                && !self.backgrounds.contains_key(&bg)
                && !seen_backgrounds.contains(&bg)
            {
                return Err(StageError::dangling(EntityKind::Background, bg.as_uuid()));
            }
            let (comp, layers) = rec.restore(sid, blobs)?;
            for l in &layers {
                claim_id(&mut seen_layers, self.layers.contains_key(&l.id), "layer", l.id)?;
            }
            compositions.push((comp, layers));
        }

        session.image_ids = images.iter().map(|i| i.id).collect();
        session.background_ids = backgrounds.iter().map(|b| b.id).collect();
        session.composition_ids = compositions.iter().map(|(c, _)| c.id).collect();

        self.images.extend(images.into_iter().map(|i| (i.id, i)));
        self.backgrounds
            .extend(backgrounds.into_iter().map(|b| (b.id, b)));
        for (comp, layers) in compositions {
            self.layers.extend(layers.into_iter().map(|l| (l.id, l)));
            self.compositions.insert(comp.id, comp);
        }
        self.sessions.insert(sid, session);
        tracing::info!("session imported");
        Ok(sid)
    }
}

fn ticket_for(asset: &BackgroundAsset) -> GenerationTicket {
    GenerationTicket {
        background: asset.id,
        request: GenerationRequest {
            prompt: asset.prompt.clone(),
            aspect_ratio: asset.aspect_ratio.clone(),
        },
    }
}

/// Reserve `id` for an import. It must be free in the studio and not repeated in the snapshot.
fn claim_id<K: Copy + Eq + Hash + Display>(
    seen: &mut HashSet<K>,
    taken: bool,
    what: &str,
    id: K,
) -> StageResult<()> {
    if taken {
        return Err(StageError::validation(format!("{what} {id} already exists")));
    }
    if !seen.insert(id) {
        return Err(StageError::validation(format!(
            "{what} {id} appears more than once in the snapshot"
        )));
    }
    Ok(())
}

fn reduced_ratio(w: u32, h: u32) -> String {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 { a } else { gcd(b, a % b) }
    }
    let g = gcd(w, h).max(1);
    format!("{}:{}", w / g, h / g)
}

#[cfg(test)]
#[path = "../tests/unit/studio.rs"]
mod tests;
