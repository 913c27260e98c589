//! Install and activate handling for one cache version.

use futures::future::try_join_all;
use portal_core::ports::{CacheStorage, Network};
use portal_core::{Error, Request, Response, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Lifecycle state of a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Pre-warming its cache generation.
    Installing,
    /// Installed, waiting for the previous version to let go.
    Waiting,
    /// Controlling pages and answering fetches.
    Active,
    /// Replaced or failed to install.
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Waiting => write!(f, "waiting"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Generation the assets were written to.
    pub generation: String,
    /// Number of assets cached.
    pub cached: usize,
    /// Activate without waiting for old pages to close.
    pub skip_waiting: bool,
}

/// Result of an activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Superseded generations that were deleted.
    pub deleted: Vec<String>,
    /// Take control of already-open pages.
    pub claim_clients: bool,
}

/// Owns the cache generation of one version: pre-warms it and evicts the others.
pub struct LifecycleController {
    version: String,
    assets: Vec<Url>,
    skip_waiting: bool,
    network: Arc<dyn Network>,
    storage: Arc<dyn CacheStorage>,
}

impl LifecycleController {
    pub fn new(
        version: impl Into<String>,
        assets: Vec<Url>,
        skip_waiting: bool,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> Self {
        Self {
            version: version.into(),
            assets,
            skip_waiting,
            network,
            storage,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn assets(&self) -> &[Url] {
        &self.assets
    }

    /// Fetch every static asset and store them as one batch.
    ///
    /// Any failed fetch or non-2xx status fails the whole install and nothing
    /// is written.
    pub async fn install(&self) -> Result<InstallOutcome> {
        info!(version = %self.version, assets = self.assets.len(), "Installing");

        let fetches = self.assets.iter().map(|url| self.prefetch(url));
        let entries = try_join_all(fetches).await?;
        let cached = entries.len();

        info!(version = %self.version, "Caching app shell");
        self.storage.put_all(&self.version, entries).await?;

        Ok(InstallOutcome {
            generation: self.version.clone(),
            cached,
            skip_waiting: self.skip_waiting,
        })
    }

    async fn prefetch(&self, url: &Url) -> Result<(Request, Response)> {
        let request = Request::get(url.clone());
        match self.network.fetch(&request).await {
            Ok(response) if response.is_ok() => {
                debug!(url = %url, status = response.status, "Pre-cached asset");
                Ok((request, response))
            }
            Ok(response) => Err(Error::InstallFailed {
                version: self.version.clone(),
                url: url.to_string(),
                reason: format!("status {}", response.status),
            }),
            Err(e) => Err(Error::InstallFailed {
                version: self.version.clone(),
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Delete every generation except this version's.
    pub async fn activate(&self) -> Result<ActivateOutcome> {
        info!(version = %self.version, "Activating");

        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.version {
                info!(generation = %name, "Deleting old cache");
                self.storage.delete(&name).await?;
                deleted.push(name);
            }
        }

        info!(version = %self.version, "Claiming clients");
        Ok(ActivateOutcome {
            deleted,
            claim_clients: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use portal_cache::MemoryCacheStorage;
    use tokio_test::{assert_err, assert_ok};

    /// Serves `200 ok` for every URL except those under `/broken`.
    struct StubNetwork;

    #[async_trait]
    impl Network for StubNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            if request.url.path().starts_with("/broken") {
                return Err(Error::Network("connection reset".into()));
            }
            Ok(Response::new(200, "ok"))
        }
    }

    fn controller(
        version: &str,
        paths: &[&str],
        storage: Arc<MemoryCacheStorage>,
    ) -> LifecycleController {
        let assets = paths
            .iter()
            .map(|p| Url::parse("https://portal.test/").unwrap().join(p).unwrap())
            .collect();
        LifecycleController::new(version, assets, true, Arc::new(StubNetwork), storage)
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let storage = Arc::new(MemoryCacheStorage::new());
        assert_ok!(storage.open("v0").await);

        let lifecycle = controller("v1", &["/", "/app.js"], Arc::clone(&storage));
        let installed = assert_ok!(lifecycle.install().await);
        assert_eq!(installed.cached, 2);

        let activated = assert_ok!(lifecycle.activate().await);
        assert_eq!(activated.deleted, vec!["v0".to_string()]);
        assert_eq!(assert_ok!(storage.keys().await), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_install_failure_writes_nothing() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let lifecycle = controller("v1", &["/", "/broken.js"], Arc::clone(&storage));

        assert_err!(lifecycle.install().await);
        assert!(!assert_ok!(storage.has("v1").await));
    }

    #[test]
    fn test_state_predicates() {
        assert!(WorkerState::Active.can_intercept_fetch());
        assert!(!WorkerState::Waiting.can_intercept_fetch());
        assert!(WorkerState::Redundant.is_terminal());
        assert_eq!(WorkerState::Waiting.to_string(), "waiting");
    }
}
