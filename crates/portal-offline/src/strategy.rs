//! Caching strategies.
//!
//! * cache-first for static assets and pattern-matched hosts,
//! * network-first with background refresh for the CMS API, degrading to a
//!   structured `503` JSON body when offline with nothing cached,
//! * network-first with cache, shell-document and image-placeholder fallbacks
//!   for everything else.

use crate::metrics::OfflineMetrics;
use portal_core::ports::{CacheStorage, Network};
use portal_core::{Error, Request, Response, ResponseType, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Error text of the offline CMS response body.
pub const OFFLINE_ERROR_MESSAGE: &str = "Offline - No cached data available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirstWithRefresh,
    NetworkFirstWithFallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CacheFirst => write!(f, "cache-first"),
            Strategy::NetworkFirstWithRefresh => write!(f, "network-first-with-refresh"),
            Strategy::NetworkFirstWithFallback => write!(f, "network-first-with-fallback"),
        }
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached root document served for an offline navigation.
    ShellFallback,
    /// Blank image served for an offline image request.
    Placeholder,
    /// Structured 503 for offline CMS requests.
    OfflineError,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::ShellFallback => write!(f, "shell-fallback"),
            ResponseSource::Placeholder => write!(f, "placeholder"),
            ResponseSource::OfflineError => write!(f, "offline-error"),
        }
    }
}

/// Result of handling one fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the request to the network itself.
    Passthrough,
    /// Answered by the manager.
    Respond {
        response: Response,
        source: ResponseSource,
    },
    /// The fetch fails for the page.
    Failed(Error),
}

impl FetchOutcome {
    fn respond(response: Response, source: ResponseSource) -> Self {
        FetchOutcome::Respond { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Respond { source, .. } => Some(*source),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct OfflineErrorBody {
    error: &'static str,
    items: Vec<serde_json::Value>,
}

/// The structured response for CMS requests made offline with nothing cached.
pub fn offline_error_response() -> Result<Response> {
    let body = OfflineErrorBody {
        error: OFFLINE_ERROR_MESSAGE,
        items: Vec::new(),
    };
    Response::json(503, &body)
}

async fn write_entry(
    storage: &dyn CacheStorage,
    generation: &str,
    request: &Request,
    response: &Response,
    metrics: &OfflineMetrics,
) {
    match storage.put(generation, request, response).await {
        Ok(()) => {
            metrics.record_write();
            debug!(url = %request.url, generation = %generation, "Cached response");
        }
        Err(e) => {
            metrics.record_write_failure();
            warn!(url = %request.url, error = %e, "Cache write failed");
        }
    }
}

/// Runs the caching strategies against one cache generation.
pub struct StrategyExecutor {
    generation: String,
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
    shell: Request,
    placeholder_content_type: String,
    metrics: Arc<OfflineMetrics>,
    background: Mutex<JoinSet<()>>,
}

impl StrategyExecutor {
    pub fn new(
        generation: impl Into<String>,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
        shell: Request,
        placeholder_content_type: impl Into<String>,
        metrics: Arc<OfflineMetrics>,
    ) -> Self {
        Self {
            generation: generation.into(),
            network,
            storage,
            shell,
            placeholder_content_type: placeholder_content_type.into(),
            metrics,
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub async fn execute(&self, strategy: Strategy, request: &Request) -> FetchOutcome {
        debug!(url = %request.url, strategy = %strategy, "Handling fetch");
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirstWithRefresh => self.network_first_with_refresh(request).await,
            Strategy::NetworkFirstWithFallback => self.network_first_with_fallback(request).await,
        }
    }

    /// Wait for every background cache write started so far.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.background.lock().await);
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Background cache write panicked");
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> FetchOutcome {
        if let Some(cached) = self.lookup(request).await {
            return FetchOutcome::respond(cached, ResponseSource::Cache);
        }

        match self.fetch(request).await {
            Ok(response) => {
                // Pattern-matched third-party hosts are trusted, so the
                // response type is not checked here.
                if response.status == 200 {
                    self.store(request, &response).await;
                }
                FetchOutcome::respond(response, ResponseSource::Network)
            }
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    async fn network_first_with_refresh(&self, request: &Request) -> FetchOutcome {
        match self.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store_in_background(request, &response).await;
                }
                FetchOutcome::respond(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "CMS fetch failed, trying cache");
                self.metrics.record_fallback();
                match self.lookup(request).await {
                    Some(cached) => FetchOutcome::respond(cached, ResponseSource::Cache),
                    None => match offline_error_response() {
                        Ok(response) => {
                            FetchOutcome::respond(response, ResponseSource::OfflineError)
                        }
                        Err(e) => FetchOutcome::Failed(e),
                    },
                }
            }
        }
    }

    async fn network_first_with_fallback(&self, request: &Request) -> FetchOutcome {
        let err = match self.fetch(request).await {
            Ok(response) => {
                if response.status == 200 && response.kind == ResponseType::Basic {
                    self.store_in_background(request, &response).await;
                }
                return FetchOutcome::respond(response, ResponseSource::Network);
            }
            Err(e) => e,
        };

        if let Some(cached) = self.lookup(request).await {
            self.metrics.record_fallback();
            return FetchOutcome::respond(cached, ResponseSource::Cache);
        }

        if request.is_navigation()
            && let Some(shell) = self.lookup(&self.shell).await
        {
            self.metrics.record_fallback();
            return FetchOutcome::respond(shell, ResponseSource::ShellFallback);
        }

        if request.is_image() {
            self.metrics.record_fallback();
            let placeholder = Response::new(200, Vec::new())
                .with_header("content-type", self.placeholder_content_type.clone())
                .with_kind(ResponseType::Synthetic);
            return FetchOutcome::respond(placeholder, ResponseSource::Placeholder);
        }

        FetchOutcome::Failed(err)
    }

    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.metrics.record_fetch();
        self.network.fetch(request).await.inspect_err(|e| {
            self.metrics.record_network_failure();
            debug!(url = %request.url, error = %e, "Network fetch failed");
        })
    }

    /// Cache lookup in the current generation. Store errors count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.storage.match_request(&self.generation, request).await {
            Ok(Some(response)) => {
                self.metrics.record_hit();
                Some(response)
            }
            Ok(None) => {
                self.metrics.record_miss();
                None
            }
            Err(e) => {
                self.metrics.record_miss();
                warn!(url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    async fn store(&self, request: &Request, response: &Response) {
        write_entry(
            self.storage.as_ref(),
            &self.generation,
            request,
            response,
            &self.metrics,
        )
        .await;
    }

    async fn store_in_background(&self, request: &Request, response: &Response) {
        let storage = Arc::clone(&self.storage);
        let metrics = Arc::clone(&self.metrics);
        let generation = self.generation.clone();
        let request = request.clone();
        let response = response.clone();

        let mut background = self.background.lock().await;
        while background.try_join_next().is_some() {}
        background.spawn(async move {
            write_entry(storage.as_ref(), &generation, &request, &response, &metrics).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_error_body_is_exact() {
        let response = offline_error_response().unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(
            response.text(),
            r#"{"error":"Offline - No cached data available","items":[]}"#
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = FetchOutcome::respond(Response::new(200, "x"), ResponseSource::Cache);
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
        assert!(outcome.response().is_some());
        assert!(FetchOutcome::Passthrough.response().is_none());
    }
}
