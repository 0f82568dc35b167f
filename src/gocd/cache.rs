//! Per-pass deduplication of HTTP requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;

use crate::error::Result;

use super::client::GoCdClient;

/// Handle to an in-flight or completed request. Cloning is cheap and every
/// clone resolves to the same body (or the same error).
pub type PendingResponse = Shared<BoxFuture<'static, Result<Arc<Value>>>>;

/// Deduplicates fetches of the same URL within one resolution pass.
///
/// The cache lives exactly as long as its resolver: it is not an LRU and
/// never persists across passes. Shared upstream pipelines make graph nodes
/// request the same URL many times; each distinct URL is fetched once.
pub struct RequestCache {
    entries: Mutex<HashMap<String, PendingResponse>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared handle for `url`, issuing the request on first use.
    ///
    /// The request is spawned onto the runtime immediately, so the caller
    /// holds a handle to work already in flight. Check-and-insert happens
    /// under a single lock acquisition: two racing first-callers produce one
    /// request.
    pub fn get_or_fetch(&self, client: &GoCdClient, url: String) -> PendingResponse {
        let mut entries = self.entries.lock().expect("request cache lock poisoned");
        entries
            .entry(url)
            .or_insert_with_key(|url| {
                let client = client.clone();
                let url = url.clone();
                let task = tokio::spawn(async move { client.get_json(&url).await });
                async move { task.await.expect("request task panicked") }
                    .boxed()
                    .shared()
            })
            .clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}
