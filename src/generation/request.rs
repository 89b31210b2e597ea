//! Asynchronous background generation.
//!
//! [`crate::Studio::request_generation`] creates the pending asset and hands back a
//! [`GenerationTicket`]. The ticket runs against any [`BackgroundGenerator`] off the
//! studio, and the resulting [`GenerationOutcome`] is applied with
//! [`crate::Studio::complete_generation`]. The studio is never borrowed across an
//! await point.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::{
    assets::image_data::ImageData, foundation::core::BackgroundId,
    foundation::error::StageResult,
};

/// Input sent to a generation backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GenerationRequest {
    /// Fully rendered prompt text.
    pub prompt: String,
    /// Requested aspect ratio, `W:H`.
    pub aspect_ratio: String,
}

/// Backend that turns a prompt into backdrop pixels.
#[async_trait]
pub trait BackgroundGenerator: Send + Sync {
    /// Produce an image for `request`. Errors are reported on the pending asset.
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<ImageData>;
}

#[async_trait]
impl<G: BackgroundGenerator + ?Sized> BackgroundGenerator for Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<ImageData> {
        (**self).generate(request).await
    }
}

/// Work item for one pending background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationTicket {
    pub(crate) background: BackgroundId,
    pub(crate) request: GenerationRequest,
}

impl GenerationTicket {
    /// Pending asset the result belongs to.
    pub fn background(&self) -> BackgroundId {
        self.background
    }

    /// Backend input.
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Run the generator on the current task.
    pub async fn run<G: BackgroundGenerator + ?Sized>(self, generator: &G) -> GenerationOutcome {
        let result = generator
            .generate(&self.request)
            .await
            .map_err(|e| format!("{e:#}"));
        GenerationOutcome {
            background: self.background,
            result,
        }
    }

    /// Spawn the generator on the current tokio runtime.
    ///
    /// Dropping the returned handle aborts the call; the asset simply stays pending.
    /// Fails without spawning anything when called outside a runtime.
    pub fn submit(self, generator: Arc<dyn BackgroundGenerator>) -> StageResult<PendingGeneration> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("submitting a generation requires a tokio runtime")?;
        let background = self.background;
        tracing::debug!(%background, "generation submitted");
        let handle = runtime.spawn(async move { self.run(generator.as_ref()).await });
        Ok(PendingGeneration { background, handle })
    }
}

/// Result of running a [`GenerationTicket`], ready for [`crate::Studio::complete_generation`].
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOutcome {
    /// Pending asset the result belongs to.
    pub background: BackgroundId,
    /// Pixels on success, backend failure description otherwise.
    pub result: Result<ImageData, String>,
}

/// In-flight generation spawned by [`GenerationTicket::submit`].
#[derive(Debug)]
pub struct PendingGeneration {
    background: BackgroundId,
    handle: JoinHandle<GenerationOutcome>,
}

impl PendingGeneration {
    /// Pending asset the call belongs to.
    pub fn background(&self) -> BackgroundId {
        self.background
    }

    /// `true` once the backend call has returned (or the task was aborted).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the backend. A panicking or aborted task becomes a failed outcome.
    pub async fn wait(mut self) -> GenerationOutcome {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = if e.is_cancelled() {
                    "generation cancelled".to_string()
                } else {
                    format!("generation task panicked: {e}")
                };
                GenerationOutcome {
                    background: self.background,
                    result: Err(reason),
                }
            }
        }
    }
}

impl Drop for PendingGeneration {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/request.rs"]
mod tests;
