//! In-memory cache store.

use crate::types::CachedResponse;
use async_trait::async_trait;
use portal_core::ports::CacheStorage;
use portal_core::{CacheKey, Error, Method, Request, Response, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

type Generation = HashMap<CacheKey, CachedResponse>;

/// Cache generations held in process memory.
#[derive(Default)]
pub struct MemoryCacheStorage {
    generations: RwLock<BTreeMap<String, Generation>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the full stored entry, including when it was written.
    pub async fn entry(&self, generation: &str, key: &CacheKey) -> Option<CachedResponse> {
        let generations = self.generations.read().await;
        generations.get(generation)?.get(key).cloned()
    }
}

pub(crate) fn ensure_cacheable(request: &Request) -> Result<()> {
    if request.method != Method::Get {
        return Err(Error::CacheStorage(format!(
            "Refusing to store {} request for {}",
            request.method, request.url
        )));
    }
    Ok(())
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn has(&self, generation: &str) -> Result<bool> {
        Ok(self.generations.read().await.contains_key(generation))
    }

    async fn open(&self, generation: &str) -> Result<()> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let removed = self.generations.write().await.remove(generation).is_some();
        if removed {
            debug!(generation = %generation, "Deleted in-memory generation");
        }
        Ok(removed)
    }

    async fn match_request(
        &self,
        generation: &str,
        request: &Request,
    ) -> Result<Option<Response>> {
        if request.method != Method::Get {
            return Ok(None);
        }
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .and_then(|entries| entries.get(&request.cache_key()))
            .map(|entry| entry.response.clone()))
    }

    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<()> {
        ensure_cacheable(request)?;
        let key = request.cache_key();
        let entry = CachedResponse::new(key.clone(), generation, response.clone());

        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .insert(key, entry);
        Ok(())
    }

    async fn put_all(&self, generation: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        // Validate the whole batch before taking the lock so a bad entry
        // leaves the generation untouched.
        for (request, _) in &entries {
            ensure_cacheable(request)?;
        }

        let mut generations = self.generations.write().await;
        let target = generations.entry(generation.to_string()).or_default();
        for (request, response) in entries {
            let key = request.cache_key();
            target.insert(key.clone(), CachedResponse::new(key, generation, response));
        }
        Ok(())
    }

    async fn entry_keys(&self, generation: &str) -> Result<Vec<CacheKey>> {
        let generations = self.generations.read().await;
        let mut keys: Vec<CacheKey> = generations
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}
