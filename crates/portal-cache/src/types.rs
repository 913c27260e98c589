//! Cache entry and generation types.

use crate::keys::request_for_key;
use chrono::{DateTime, Utc};
use portal_core::ports::CacheStorage;
use portal_core::{CacheKey, Response, Result};
use serde::{Deserialize, Serialize};

/// Compression algorithm for stored bodies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    #[default]
    Zstd,
    Gzip,
}

/// A response held in a cache generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Request identity the response is stored under.
    pub key: CacheKey,
    /// Generation the entry belongs to.
    pub generation: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    pub response: Response,
}

impl CachedResponse {
    pub fn new(key: CacheKey, generation: impl Into<String>, response: Response) -> Self {
        Self {
            key,
            generation: generation.into(),
            stored_at: Utc::now(),
            response,
        }
    }
}

/// Summary of one cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    /// Total size of stored bodies, uncompressed.
    pub total_bytes: u64,
}

/// Summarise every generation in a store.
pub async fn describe_generations(storage: &dyn CacheStorage) -> Result<Vec<GenerationInfo>> {
    let mut infos = Vec::new();

    for name in storage.keys().await? {
        let keys = storage.entry_keys(&name).await?;
        let mut total_bytes = 0u64;

        for key in &keys {
            let Some(request) = request_for_key(key) else {
                continue;
            };
            if let Some(response) = storage.match_request(&name, &request).await? {
                total_bytes += response.body.len() as u64;
            }
        }

        infos.push(GenerationInfo {
            name,
            entries: keys.len(),
            total_bytes,
        });
    }

    Ok(infos)
}
