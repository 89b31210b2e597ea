use uuid::Uuid;

use crate::foundation::core::{BackgroundId, EntityKind, LayerId};

/// Convenience result type used across Photostage.
pub type StageResult<T> = Result<T, StageError>;

/// Top-level error taxonomy used by studio, compositor and persistence APIs.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    /// Malformed canvas or layer dimensions. Never retried; the input must change.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Transform edit attempted on a locked layer. Nothing was changed.
    #[error("layer locked: {0}")]
    LayerLocked(LayerId),

    /// The generation backend failed. The background stays pending and may be retried.
    #[error("generation failed: background {background}: {reason}")]
    GenerationFailed {
        /// Background asset left in its pending state.
        background: BackgroundId,
        /// Backend-provided failure description.
        reason: String,
    },

    /// Attempt to link to a session or background that does not exist.
    #[error("dangling reference: {kind} {id}")]
    DanglingReference {
        /// Entity table the missing target belongs to.
        kind: EntityKind,
        /// Missing identifier.
        id: Uuid,
    },

    /// Lookup of an identifier that is not in the studio.
    #[error("unknown entity: {kind} {id}")]
    UnknownEntity {
        /// Entity table that was searched.
        kind: EntityKind,
        /// Missing identifier.
        id: Uuid,
    },

    /// Invalid user-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Build a [`StageError::InvalidGeometry`] value.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Build a [`StageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StageError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`StageError::GenerationFailed`] value.
    pub fn generation_failed(background: BackgroundId, reason: impl Into<String>) -> Self {
        Self::GenerationFailed {
            background,
            reason: reason.into(),
        }
    }

    /// Build a [`StageError::DanglingReference`] value.
    pub fn dangling(kind: EntityKind, id: Uuid) -> Self {
        Self::DanglingReference { kind, id }
    }

    /// Build a [`StageError::UnknownEntity`] value.
    pub fn unknown(kind: EntityKind, id: Uuid) -> Self {
        Self::UnknownEntity { kind, id }
    }

    /// `true` for conditions the caller may recover from by retrying or unlocking.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LayerLocked(_) | Self::GenerationFailed { .. })
    }
}

impl From<serde_json::Error> for StageError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
