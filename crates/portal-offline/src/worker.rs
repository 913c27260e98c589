//! The event interface a host drives.

use crate::lifecycle::{ActivateOutcome, InstallOutcome};
use crate::messaging::MessageOutcome;
use crate::strategy::FetchOutcome;
use async_trait::async_trait;
use portal_core::{Request, Result};
use serde_json::Value;

/// A fetch-intercepting worker, one method per lifecycle event.
///
/// The host awaits each call before acting on the returned value: it only
/// moves an instance to waiting once `on_install` succeeds, and only routes
/// fetches to it once `on_activate` has run.
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    /// Version tag identifying this instance's cache generation.
    fn version(&self) -> &str;

    async fn on_install(&self) -> Result<InstallOutcome>;

    async fn on_activate(&self) -> Result<ActivateOutcome>;

    async fn on_fetch(&self, request: &Request) -> FetchOutcome;

    async fn on_message(&self, message: &Value) -> MessageOutcome;
}
