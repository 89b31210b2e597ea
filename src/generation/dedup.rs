use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::{
    assets::image_data::ImageData,
    generation::request::{BackgroundGenerator, GenerationRequest},
};

type InFlight = Shared<BoxFuture<'static, Result<ImageData, String>>>;
type Table = Mutex<HashMap<GenerationRequest, Entry>>;

struct Entry {
    fut: InFlight,
    waiters: usize,
}

/// Collapses identical concurrent requests into one backend call.
///
/// Requests are identical when prompt and aspect ratio match. Every waiter
/// receives its own copy of the pixels. Entries are dropped once the call
/// resolves, so a later identical request hits the backend again. When every
/// waiter on a request is cancelled the backend call is dropped with them.
pub struct DedupGenerator<G> {
    inner: Arc<G>,
    in_flight: Table,
}

impl<G> std::fmt::Debug for DedupGenerator<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.in_flight.lock().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("DedupGenerator")
            .field("in_flight", &pending)
            .finish()
    }
}

impl<G: BackgroundGenerator + 'static> DedupGenerator<G> {
    /// Wrap a backend.
    pub fn new(inner: G) -> Self {
        Self {
            inner: Arc::new(inner),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Wrapped backend.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Number of distinct requests currently waiting on the backend.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn join_or_start<'a>(&'a self, request: &'a GenerationRequest) -> anyhow::Result<Waiter<'a>> {
        let mut map = self
            .in_flight
            .lock()
            .map_err(|_| anyhow::anyhow!("generation dedup table poisoned"))?;
        if let Some(entry) = map.get_mut(request) {
            tracing::debug!(aspect = %request.aspect_ratio, "joined in-flight generation");
            entry.waiters += 1;
            return Ok(Waiter::new(&self.in_flight, request, entry.fut.clone()));
        }
        let inner = Arc::clone(&self.inner);
        let owned = request.clone();
        let fut = async move {
            inner
                .generate(&owned)
                .await
                .map_err(|e| format!("{e:#}"))
        }
        .boxed()
        .shared();
        map.insert(
            request.clone(),
            Entry {
                fut: fut.clone(),
                waiters: 1,
            },
        );
        Ok(Waiter::new(&self.in_flight, request, fut))
    }
}

/// One caller's interest in an in-flight request.
///
/// On drop the entry leaves the table once the call has resolved, or once the
/// last waiter has gone away without a result.
struct Waiter<'a> {
    table: &'a Table,
    request: &'a GenerationRequest,
    fut: InFlight,
    resolved: bool,
}

impl<'a> Waiter<'a> {
    fn new(table: &'a Table, request: &'a GenerationRequest, fut: InFlight) -> Self {
        Self {
            table,
            request,
            fut,
            resolved: false,
        }
    }

    async fn wait(&mut self) -> Result<ImageData, String> {
        let result = self.fut.clone().await;
        self.resolved = true;
        result
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let Ok(mut map) = self.table.lock() else {
            return;
        };
        let Some(entry) = map.get_mut(self.request) else {
            return;
        };
        // A newer call for the same request may have replaced ours.
        if !entry.fut.ptr_eq(&self.fut) {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if self.resolved || entry.waiters == 0 {
            if !self.resolved {
                tracing::debug!(aspect = %self.request.aspect_ratio, "abandoned in-flight generation");
            }
            map.remove(self.request);
        }
    }
}

#[async_trait]
impl<G: BackgroundGenerator + 'static> BackgroundGenerator for DedupGenerator<G> {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<ImageData> {
        let mut waiter = self.join_or_start(request)?;
        waiter.wait().await.map_err(anyhow::Error::msg)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/dedup.rs"]
mod tests;
