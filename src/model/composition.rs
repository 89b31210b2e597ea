use crate::foundation::core::{BackgroundId, CompositionId, LayerId, SessionId, Timestamp, now};

/// An ordered stack of layers plus an optional backdrop.
///
/// `layer_ids` is the z-order (index 0 paints first). The composition owns its
/// layers; the session and background links are weak and are cleared when the
/// target is deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    pub(crate) id: CompositionId,
    pub(crate) name: String,
    pub(crate) notes: String,
    pub(crate) session: Option<SessionId>,
    pub(crate) background: Option<BackgroundId>,
    pub(crate) layer_ids: Vec<LayerId>,
    pub(crate) created_at: Timestamp,
    pub(crate) updated_at: Timestamp,
}

impl Composition {
    pub(crate) fn new(name: impl Into<String>, session: Option<SessionId>) -> Self {
        let created_at = now();
        Self {
            id: CompositionId::generate(),
            name: name.into(),
            notes: String::new(),
            session,
            background: None,
            layer_ids: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Composition identifier.
    pub fn id(&self) -> CompositionId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Linked capture session, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Linked background asset, if any.
    pub fn background(&self) -> Option<BackgroundId> {
        self.background
    }

    /// Layers in z-order; position equals the layer's order index.
    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_ids
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layer_ids.len()
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the last semantic mutation.
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now().max(self.updated_at);
    }
}
