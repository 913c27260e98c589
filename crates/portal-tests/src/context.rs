//! Test context wiring the offline cache manager to in-process fakes.

use crate::fixtures::{ResponseFixture, origin};
use crate::helpers::ScriptedNetwork;
use portal_cache::MemoryCacheStorage;
use portal_core::Result;
use portal_core::ports::{CacheStorage, Network};
use portal_offline::{OfflineCacheManager, OfflineConfig, Registration};
use std::sync::Arc;

/// Scripted network and in-memory store shared by every manager built from it.
pub struct TestContext {
    pub config: OfflineConfig,
    pub network: Arc<ScriptedNetwork>,
    pub storage: Arc<MemoryCacheStorage>,
}

impl TestContext {
    /// Context whose network serves every static asset of `config`.
    pub fn new(config: OfflineConfig) -> Self {
        crate::init_test_logging();

        let ctx = Self {
            config,
            network: Arc::new(ScriptedNetwork::new(origin())),
            storage: Arc::new(MemoryCacheStorage::new()),
        };
        ctx.serve_assets(&ctx.config);
        ctx
    }

    /// Route a canned `200` for every static asset of `config`.
    pub fn serve_assets(&self, config: &OfflineConfig) {
        for url in config.static_asset_urls().unwrap() {
            let response = if url.path().ends_with(".css") {
                ResponseFixture::css()
            } else {
                ResponseFixture::html(url.as_str())
            };
            self.network.route(&url, response);
        }
    }

    /// Manager for the context's own configuration.
    pub fn manager(&self) -> Result<OfflineCacheManager> {
        self.manager_for(self.config.clone())
    }

    /// Manager for another version sharing this context's network and store.
    pub fn manager_for(&self, config: OfflineConfig) -> Result<OfflineCacheManager> {
        OfflineCacheManager::new(config, self.network(), self.storage())
    }

    pub fn registration(&self) -> Registration {
        Registration::new(self.config.origin.clone(), self.network())
    }

    pub fn network(&self) -> Arc<dyn Network> {
        Arc::clone(&self.network) as Arc<dyn Network>
    }

    pub fn storage(&self) -> Arc<dyn CacheStorage> {
        Arc::clone(&self.storage) as Arc<dyn CacheStorage>
    }
}
