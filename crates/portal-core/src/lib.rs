//! Student portal core
//!
//! Request/response model, port traits and error handling shared by the
//! offline cache manager, its cache stores and its hosts. This crate has
//! minimal dependencies and defines the vocabulary used by the other crates.

pub mod error;
pub mod http;
pub mod ids;
pub mod messages;
pub mod ports;

pub use error::{Error, Result};
pub use http::{CacheKey, Destination, Method, Request, RequestMode, Response, ResponseType};
pub use ids::*;
