use crate::{
    assets::image_data::ImageData,
    foundation::core::{BackgroundId, SessionId, Timestamp, now},
    foundation::error::{StageError, StageResult},
    prompt::catalog::Category,
};

/// A backdrop image, either AI-generated from a prompt or uploaded.
///
/// Generated assets are created pending (no pixels) when the request is issued
/// and filled in once when the backend answers. After that only the shared flag
/// may change.
#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundAsset {
    pub(crate) id: BackgroundId,
    pub(crate) session: Option<SessionId>,
    pub(crate) prompt: String,
    pub(crate) category: Category,
    pub(crate) aspect_ratio: String,
    pub(crate) shared: bool,
    pub(crate) pixels: Option<ImageData>,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
}

impl BackgroundAsset {
    pub(crate) fn pending(
        session: Option<SessionId>,
        prompt: String,
        category: Category,
        aspect_ratio: String,
    ) -> Self {
        let created_at = now();
        Self {
            id: BackgroundId::generate(),
            session,
            prompt,
            category,
            aspect_ratio,
            shared: false,
            pixels: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub(crate) fn uploaded(
        session: Option<SessionId>,
        prompt: String,
        category: Category,
        aspect_ratio: String,
        pixels: ImageData,
    ) -> Self {
        let mut asset = Self::pending(session, prompt, category, aspect_ratio);
        asset.pixels = Some(pixels);
        asset
    }

    /// Asset identifier.
    pub fn id(&self) -> BackgroundId {
        self.id
    }

    /// Owning session, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Prompt text exactly as sent to the generation backend.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Category the prompt was rendered from.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Aspect ratio string such as `"16:9"`.
    pub fn aspect_ratio(&self) -> &str {
        &self.aspect_ratio
    }

    /// Eligible for community reuse.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Generated or uploaded pixels; `None` while pending or after a failure.
    pub fn pixels(&self) -> Option<&ImageData> {
        self.pixels.as_ref()
    }

    /// `true` until pixels have arrived.
    pub fn is_pending(&self) -> bool {
        self.pixels.is_none()
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last semantic mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Toggle community sharing.
    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
        self.touch();
    }

    pub(crate) fn fulfill(&mut self, pixels: ImageData) -> StageResult<()> {
        if self.pixels.is_some() {
            return Err(StageError::validation(format!(
                "background {} already has pixels",
                self.id
            )));
        }
        if pixels.canvas().is_empty() {
            return Err(StageError::invalid_geometry(
                "generated background has zero area",
            ));
        }
        self.pixels = Some(pixels);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = now().max(self.updated_at);
    }
}
