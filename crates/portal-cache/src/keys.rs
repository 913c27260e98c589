//! Key utilities for cache generations and entries.

use portal_core::{CacheKey, Method, Request};
use sha2::{Digest, Sha256};

/// File name stem for an entry: the first 16 bytes of the key's SHA-256.
pub fn entry_file_stem(key: &CacheKey) -> String {
    let hash = Sha256::digest(key.as_str().as_bytes());
    hex::encode(&hash[..16])
}

/// Rebuild the request a key was stored under.
pub fn request_for_key(key: &CacheKey) -> Option<Request> {
    let (method, url) = key.as_str().split_once(' ')?;
    let method: Method = method.parse().ok()?;
    Request::parse(method, url).ok()
}

/// Directory name for a generation.
///
/// Always `gen-` plus 32 hex digits, whatever the name contains, so `.`, `..`
/// and dot-prefixed names never escape the root or hide from listings. The
/// real name lives in the generation marker.
pub fn generation_dir_name(generation: &str) -> String {
    let hash = Sha256::digest(generation.as_bytes());
    format!("gen-{}", hex::encode(&hash[..16]))
}
