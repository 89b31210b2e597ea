use std::fmt;

use crate::{
    assets::image_data::ImageData,
    foundation::core::{BackgroundId, CompositionId, ImageId, SessionId, Timestamp, now},
    foundation::error::{StageError, StageResult},
};

/// Capture session lifecycle status.
///
/// Persisted as its lowercase tag. Unknown tags decode to [`SessionStatus::Planning`]
/// so that data written by newer versions still loads.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    /// Batch created, nothing captured yet.
    #[default]
    Planning,
    /// Photos are being taken.
    Capturing,
    /// Compositions are being built.
    Editing,
    /// Work delivered. Can be reopened.
    Completed,
}

impl SessionStatus {
    /// Every status in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Planning,
        Self::Capturing,
        Self::Editing,
        Self::Completed,
    ];

    /// Canonical persisted tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Capturing => "capturing",
            Self::Editing => "editing",
            Self::Completed => "completed",
        }
    }

    /// Decode a tag, falling back to [`SessionStatus::Planning`].
    pub fn parse_lenient(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "capturing" => Self::Capturing,
            "editing" => Self::Editing,
            "completed" => Self::Completed,
            _ => Self::Planning,
        }
    }
}

impl From<String> for SessionStatus {
    fn from(tag: String) -> Self {
        Self::parse_lenient(&tag)
    }
}

impl From<SessionStatus> for String {
    fn from(status: SessionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of captured photos plus everything derived from it.
///
/// The session exclusively owns its processed images, the compositions created
/// inside it and the backgrounds generated for it; the owned entities live in the
/// [`crate::Studio`] tables and are listed here by id.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSession {
    pub(crate) id: SessionId,
    pub(crate) stock_number: String,
    pub(crate) title: String,
    pub(crate) notes: String,
    pub(crate) status: SessionStatus,
    pub(crate) categories: Vec<String>,
    pub(crate) cover_image: Option<ImageData>,
    pub(crate) image_ids: Vec<ImageId>,
    pub(crate) composition_ids: Vec<CompositionId>,
    pub(crate) background_ids: Vec<BackgroundId>,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
}

impl CaptureSession {
    pub(crate) fn new(stock_number: &str) -> StageResult<Self> {
        let stock_number = stock_number.trim();
        if stock_number.is_empty() {
            return Err(StageError::validation("stock number must be non-empty"));
        }
        let created_at = now();
        Ok(Self {
            id: SessionId::generate(),
            stock_number: stock_number.to_string(),
            title: stock_number.to_string(),
            notes: String::new(),
            status: SessionStatus::Planning,
            categories: Vec::new(),
            cover_image: None,
            image_ids: Vec::new(),
            composition_ids: Vec::new(),
            background_ids: Vec::new(),
            created_at,
            updated_at: created_at,
        })
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Stock/batch number used for grouping.
    pub fn stock_number(&self) -> &str {
        &self.stock_number
    }

    /// Display title. Defaults to the stock number.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Free-text notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Category tags in insertion order, without duplicates.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Optional cover/overlay image.
    pub fn cover_image(&self) -> Option<&ImageData> {
        self.cover_image.as_ref()
    }

    /// Owned processed images, in capture order.
    pub fn image_ids(&self) -> &[ImageId] {
        &self.image_ids
    }

    /// Owned compositions, in creation order.
    pub fn composition_ids(&self) -> &[CompositionId] {
        &self.composition_ids
    }

    /// Owned background assets, in request order.
    pub fn background_ids(&self) -> &[BackgroundId] {
        &self.background_ids
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last semantic mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Move to any status. Transitions are not forced forward; a completed
    /// session may be reopened.
    pub fn set_status(&mut self, status: SessionStatus) {
        tracing::debug!(session = %self.id, from = %self.status, to = %status, "session status");
        self.status = status;
        self.touch();
    }

    /// Replace the display title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Replace the notes.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
        self.touch();
    }

    /// Add a category tag. Returns `false` (and leaves the session untouched) when
    /// the tag is blank or already present.
    pub fn add_category(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.categories.iter().any(|c| c == tag) {
            return false;
        }
        self.categories.push(tag.to_string());
        self.touch();
        true
    }

    /// Remove a category tag. Returns `false` when it was not present.
    pub fn remove_category(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        let before = self.categories.len();
        self.categories.retain(|c| c != tag);
        if self.categories.len() == before {
            return false;
        }
        self.touch();
        true
    }

    /// Set or clear the cover image.
    pub fn set_cover_image(&mut self, cover: Option<ImageData>) {
        self.cover_image = cover;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now().max(self.updated_at);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/session.rs"]
mod tests;
