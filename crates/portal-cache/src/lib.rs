//! Cache generation stores for the student portal offline cache.
//!
//! Two implementations of [`portal_core::ports::CacheStorage`]: an in-memory
//! store for tests and short-lived hosts, and a filesystem store that keeps
//! generations across restarts.

pub mod compression;
pub mod filesystem;
pub mod keys;
pub mod memory;
pub mod types;

pub use compression::{compress, decompress};
pub use filesystem::FilesystemCacheStorage;
pub use keys::{entry_file_stem, generation_dir_name, request_for_key};
pub use memory::MemoryCacheStorage;
pub use types::{CachedResponse, CompressionType, GenerationInfo, describe_generations};
