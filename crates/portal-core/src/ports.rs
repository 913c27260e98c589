//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the offline cache manager and
//! the platform it runs on: the network it proxies and the cache store it owns.

use crate::http::{CacheKey, Request, Response};
use crate::Result;
use async_trait::async_trait;

/// The network the manager sits in front of.
///
/// A fetch that completes with any HTTP status is `Ok`; only transport
/// failures (offline, DNS, connection reset) are `Err`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Named cache generations holding request/response pairs.
///
/// Only `GET` requests may be stored. Implementations reject anything else.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all existing generations.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Check whether a generation exists.
    async fn has(&self, generation: &str) -> Result<bool>;

    /// Create a generation if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<()>;

    /// Delete a generation and all its entries. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool>;

    /// Look up the stored response for a request.
    async fn match_request(&self, generation: &str, request: &Request)
    -> Result<Option<Response>>;

    /// Store a response, creating the generation if needed. Last write wins.
    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<()>;

    /// Store a batch of responses. Either every entry becomes visible or none does.
    async fn put_all(&self, generation: &str, entries: Vec<(Request, Response)>) -> Result<()>;

    /// Keys of all entries in a generation.
    async fn entry_keys(&self, generation: &str) -> Result<Vec<CacheKey>>;
}
