//! Filesystem-backed cache store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/gen-<hash>/.generation          marker with the real generation name
//! <root>/gen-<hash>/<stem>.json          entry metadata (status, headers, checksum)
//! <root>/gen-<hash>/<stem>.bin           compressed body
//! <root>/.staging-<uuid>/                batch being assembled by put_all
//! <root>/.retired-<uuid>/                generation being replaced by put_all
//! ```
//!
//! Directory names are derived from a hash of the generation name, never the
//! name itself. Every file is written to a temporary name and renamed into
//! place, body before metadata, so a reader never sees metadata without its
//! body. Batches are published by renaming a complete directory.

use crate::compression::{compress, decompress};
use crate::keys::{entry_file_stem, generation_dir_name};
use crate::memory::ensure_cacheable;
use crate::types::CompressionType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::http::Headers;
use portal_core::ports::CacheStorage;
use portal_core::{CacheKey, Error, Request, Response, ResponseType, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

const MARKER_FILE: &str = ".generation";
const STAGING_PREFIX: &str = ".staging-";
const RETIRED_PREFIX: &str = ".retired-";

#[derive(Debug, Serialize, Deserialize)]
struct GenerationMarker {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    key: CacheKey,
    status: u16,
    headers: Headers,
    kind: ResponseType,
    url: Option<Url>,
    compression: CompressionType,
    size_bytes: u64,
    checksum: String,
    stored_at: DateTime<Utc>,
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::CacheStorage(format!("{}: {}", context, err))
}

fn checksum(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Cache generations persisted as directories on disk.
pub struct FilesystemCacheStorage {
    root_dir: PathBuf,
    compression: CompressionType,
}

impl FilesystemCacheStorage {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            compression: CompressionType::default(),
        }
    }

    /// Set the compression used for newly written bodies.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root_dir.join(generation_dir_name(generation))
    }

    /// Remove staging and retired directories left by interrupted batch writes.
    ///
    /// Call before any writes start; a batch in progress would lose its staging
    /// directory.
    pub async fn sweep_stale(&self) -> Result<usize> {
        if !tokio::fs::try_exists(&self.root_dir).await.unwrap_or(false) {
            return Ok(0);
        }

        let mut removed = 0;
        let mut read_dir = tokio::fs::read_dir(&self.root_dir)
            .await
            .map_err(|e| storage_err("Failed to read cache root", e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_err("Failed to read cache root entry", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(STAGING_PREFIX) && !name.starts_with(RETIRED_PREFIX) {
                continue;
            }
            tokio::fs::remove_dir_all(entry.path())
                .await
                .map_err(|e| storage_err("Failed to remove stale batch dir", e))?;
            debug!(path = %entry.path().display(), "Removed stale batch dir");
            removed += 1;
        }
        Ok(removed)
    }

    async fn write_marker(dir: &Path, generation: &str) -> Result<()> {
        let marker = GenerationMarker {
            name: generation.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&marker)?;
        tokio::fs::write(dir.join(MARKER_FILE), json)
            .await
            .map_err(|e| storage_err("Failed to write generation marker", e))
    }

    async fn read_marker(dir: &Path) -> Option<GenerationMarker> {
        let bytes = tokio::fs::read(dir.join(MARKER_FILE)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn ensure_generation(&self, generation: &str) -> Result<PathBuf> {
        let dir = self.generation_dir(generation);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err("Failed to create generation dir", e))?;

        let has_marker = tokio::fs::try_exists(dir.join(MARKER_FILE))
            .await
            .unwrap_or(false);
        if !has_marker {
            Self::write_marker(&dir, generation).await?;
        }
        Ok(dir)
    }

    fn encode(&self, key: CacheKey, response: &Response) -> Result<(EntryMetadata, Vec<u8>)> {
        let body = compress(&response.body, self.compression)?;
        let metadata = EntryMetadata {
            key,
            status: response.status,
            headers: response.headers.clone(),
            kind: response.kind,
            url: response.url.clone(),
            compression: self.compression,
            size_bytes: response.body.len() as u64,
            checksum: checksum(&response.body),
            stored_at: Utc::now(),
        };
        Ok((metadata, body))
    }

    async fn write_atomic(dir: &Path, file_name: &str, contents: &[u8]) -> Result<()> {
        let tmp = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| storage_err("Failed to write cache entry", e))?;
        tokio::fs::rename(&tmp, dir.join(file_name))
            .await
            .map_err(|e| storage_err("Failed to commit cache entry", e))
    }

    async fn write_entry(dir: &Path, metadata: &EntryMetadata, body: &[u8]) -> Result<()> {
        let stem = entry_file_stem(&metadata.key);
        Self::write_atomic(dir, &format!("{}.bin", stem), body).await?;
        let json = serde_json::to_vec_pretty(metadata)?;
        Self::write_atomic(dir, &format!("{}.json", stem), &json).await
    }

    async fn read_entry(dir: &Path, key: &CacheKey) -> Result<Option<Response>> {
        let stem = entry_file_stem(key);
        let meta_path = dir.join(format!("{}.json", stem));

        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err("Failed to read entry metadata", e)),
        };
        let metadata: EntryMetadata = serde_json::from_slice(&meta_bytes)?;
        if &metadata.key != key {
            warn!(stored = %metadata.key, requested = %key, "Cache entry stem collision");
            return Ok(None);
        }

        let raw = tokio::fs::read(dir.join(format!("{}.bin", stem)))
            .await
            .map_err(|e| storage_err("Failed to read entry body", e))?;
        let body = decompress(&raw, metadata.compression)?;

        if checksum(&body) != metadata.checksum {
            return Err(Error::CacheStorage(format!(
                "Checksum mismatch for cache entry {}",
                key
            )));
        }

        Ok(Some(Response {
            status: metadata.status,
            headers: metadata.headers,
            body,
            kind: metadata.kind,
            url: metadata.url,
        }))
    }

    /// Copy the entries of `dir` that the batch does not replace into
    /// `staging`, then swap `staging` in for `dir`.
    ///
    /// The existing marker is kept so the generation's creation time does not
    /// change. If the swap fails the old directory is put back.
    async fn merge_into(staging: &Path, dir: &Path) -> Result<()> {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| storage_err("Failed to read generation dir", e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_err("Failed to read generation entry", e))?
        {
            let name = entry.file_name();
            let is_marker = name == MARKER_FILE;
            if name.to_string_lossy().starts_with(".tmp-") {
                continue;
            }
            let target = staging.join(&name);
            if !is_marker && tokio::fs::try_exists(&target).await.unwrap_or(false) {
                continue;
            }
            tokio::fs::copy(entry.path(), &target)
                .await
                .map_err(|e| storage_err("Failed to copy existing entry", e))?;
        }

        let retired = dir.with_file_name(format!("{}{}", RETIRED_PREFIX, Uuid::new_v4()));
        tokio::fs::rename(dir, &retired)
            .await
            .map_err(|e| storage_err("Failed to retire generation dir", e))?;
        if let Err(e) = tokio::fs::rename(staging, dir).await {
            if let Err(restore) = tokio::fs::rename(&retired, dir).await {
                warn!(path = %retired.display(), error = %restore, "Failed to restore generation dir");
            }
            return Err(storage_err("Failed to publish merged generation", e));
        }
        if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
            warn!(path = %retired.display(), error = %e, "Failed to remove retired generation dir");
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for FilesystemCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(&self.root_dir).await.unwrap_or(false) {
            return Ok(vec![]);
        }

        let mut markers = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.root_dir)
            .await
            .map_err(|e| storage_err("Failed to read cache root", e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_err("Failed to read cache root entry", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(marker) = Self::read_marker(&entry.path()).await {
                markers.push(marker);
            }
        }

        markers.sort_by_key(|m| m.created_at);
        Ok(markers.into_iter().map(|m| m.name).collect())
    }

    async fn has(&self, generation: &str) -> Result<bool> {
        Ok(Self::read_marker(&self.generation_dir(generation))
            .await
            .is_some_and(|marker| marker.name == generation))
    }

    async fn open(&self, generation: &str) -> Result<()> {
        self.ensure_generation(generation).await.map(|_| ())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let dir = self.generation_dir(generation);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| storage_err("Failed to delete generation", e))?;
        debug!(generation = %generation, path = %dir.display(), "Deleted generation");
        Ok(true)
    }

    async fn match_request(
        &self,
        generation: &str,
        request: &Request,
    ) -> Result<Option<Response>> {
        if ensure_cacheable(request).is_err() {
            return Ok(None);
        }
        let dir = self.generation_dir(generation);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read_entry(&dir, &request.cache_key()).await
    }

    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<()> {
        ensure_cacheable(request)?;
        let dir = self.ensure_generation(generation).await?;
        let (metadata, body) = self.encode(request.cache_key(), response)?;
        Self::write_entry(&dir, &metadata, &body).await
    }

    async fn put_all(&self, generation: &str, entries: Vec<(Request, Response)>) -> Result<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (request, response) in &entries {
            ensure_cacheable(request)?;
            encoded.push(self.encode(request.cache_key(), response)?);
        }

        let staging = self
            .root_dir
            .join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| storage_err("Failed to create staging dir", e))?;

        let mut staged = Ok(());
        for (metadata, body) in &encoded {
            staged = Self::write_entry(&staging, metadata, body).await;
            if staged.is_err() {
                break;
            }
        }
        if let Err(e) = staged {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        let dir = self.generation_dir(generation);
        let published = if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            Self::merge_into(&staging, &dir).await
        } else {
            match Self::write_marker(&staging, generation).await {
                Ok(()) => tokio::fs::rename(&staging, &dir)
                    .await
                    .map_err(|e| storage_err("Failed to publish generation", e)),
                Err(e) => Err(e),
            }
        };
        if let Err(e) = published {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        debug!(generation = %generation, entries = encoded.len(), "Published batch");
        Ok(())
    }

    async fn entry_keys(&self, generation: &str) -> Result<Vec<CacheKey>> {
        let dir = self.generation_dir(generation);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(vec![]);
        }

        let mut keys = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| storage_err("Failed to read generation dir", e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| storage_err("Failed to read generation entry", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            let bytes = tokio::fs::read(entry.path())
                .await
                .map_err(|e| storage_err("Failed to read entry metadata", e))?;
            let metadata: EntryMetadata = serde_json::from_slice(&bytes)?;
            keys.push(metadata.key);
        }

        keys.sort();
        Ok(keys)
    }
}
