//! Integration test infrastructure for the student portal offline cache.
//!
//! Provides a scripted in-process network, canned site fixtures and a
//! [`TestContext`] wiring them to an in-memory cache store.
//!
//! # Usage
//!
//! ```ignore
//! use portal_tests::{ConfigFixture, TestContext};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new(ConfigFixture::small("waterbear-portal-v1"));
//!     let manager = ctx.manager().unwrap();
//!     // Drive manager.on_install(), ctx.network.set_offline(true), etc.
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,portal_offline=debug")),
        )
        .with_test_writer()
        .try_init();
}
