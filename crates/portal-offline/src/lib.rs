//! Offline cache manager for the student portal.
//!
//! Sits between the portal pages and the network the way a service worker
//! does: it pre-warms a versioned cache generation on install, evicts stale
//! generations on activate, classifies every intercepted request and answers
//! it with one of three caching strategies.

pub mod classifier;
pub mod config;
pub mod lifecycle;
pub mod manager;
pub mod messaging;
pub mod metrics;
pub mod network;
pub mod registration;
pub mod strategy;
pub mod worker;

pub use classifier::{ClassifierRule, Matcher, RequestClass, RequestClassifier};
pub use config::OfflineConfig;
pub use lifecycle::{ActivateOutcome, InstallOutcome, LifecycleController, WorkerState};
pub use manager::OfflineCacheManager;
pub use messaging::{MessageOutcome, handle_message};
pub use metrics::{MetricsSnapshot, OfflineMetrics};
pub use network::HttpNetwork;
pub use registration::{Registration, WorkerHandle};
pub use strategy::{FetchOutcome, OFFLINE_ERROR_MESSAGE, ResponseSource, Strategy, StrategyExecutor};
pub use worker::ServiceWorker;
