//! The offline cache manager.

use crate::classifier::{RequestClass, RequestClassifier};
use crate::config::OfflineConfig;
use crate::lifecycle::{ActivateOutcome, InstallOutcome, LifecycleController};
use crate::messaging::{MessageOutcome, handle_message};
use crate::metrics::OfflineMetrics;
use crate::strategy::{FetchOutcome, StrategyExecutor};
use crate::worker::ServiceWorker;
use async_trait::async_trait;
use portal_core::ports::{CacheStorage, Network};
use portal_core::{Request, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// One deployed version of the offline cache: lifecycle, classification and
/// strategies bound to the generation named by `config.version`.
pub struct OfflineCacheManager {
    config: OfflineConfig,
    classifier: RequestClassifier,
    lifecycle: LifecycleController,
    executor: StrategyExecutor,
    metrics: Arc<OfflineMetrics>,
}

impl OfflineCacheManager {
    /// Build a manager for a validated configuration.
    pub fn new(
        config: OfflineConfig,
        network: Arc<dyn Network>,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = OfflineMetrics::new();
        let classifier = RequestClassifier::from_config(&config)?;
        let lifecycle = LifecycleController::new(
            config.version.clone(),
            config.static_asset_urls()?,
            config.skip_waiting_on_install,
            Arc::clone(&network),
            Arc::clone(&storage),
        );
        let executor = StrategyExecutor::new(
            config.version.clone(),
            network,
            storage,
            Request::get(config.shell_url()?),
            config.image_placeholder_content_type.clone(),
            Arc::clone(&metrics),
        );

        info!(
            version = %config.version,
            rules = classifier.rules().len(),
            "Offline cache manager ready"
        );

        Ok(Self {
            config,
            classifier,
            lifecycle,
            executor,
            metrics,
        })
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn metrics(&self) -> &Arc<OfflineMetrics> {
        &self.metrics
    }

    /// Classify a request without handling it.
    pub fn classify(&self, request: &Request) -> Option<RequestClass> {
        self.classifier.classify(request)
    }

    /// Wait for background cache writes to finish.
    pub async fn settle(&self) {
        self.executor.settle().await;
    }
}

#[async_trait]
impl ServiceWorker for OfflineCacheManager {
    fn version(&self) -> &str {
        &self.config.version
    }

    async fn on_install(&self) -> Result<InstallOutcome> {
        self.lifecycle.install().await
    }

    async fn on_activate(&self) -> Result<ActivateOutcome> {
        self.lifecycle.activate().await
    }

    async fn on_fetch(&self, request: &Request) -> FetchOutcome {
        match self.classify(request) {
            Some(class) => self.executor.execute(class.strategy(), request).await,
            None => {
                debug!(method = %request.method, url = %request.url, "Bypassing cache");
                self.metrics.record_bypass();
                FetchOutcome::Passthrough
            }
        }
    }

    async fn on_message(&self, message: &Value) -> MessageOutcome {
        handle_message(message)
    }
}
