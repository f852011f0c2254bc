//! # doc-cache
//!
//! A read-through caching layer for document stores.
//!
//! ## Features
//!
//! - **Transparent:** [`CachedAdapter`] implements the same [`DocumentAdapter`] trait it wraps
//! - **Coherent:** every write invalidates the affected cache entries
//! - **Relational:** related documents are resolved through the cache in batched multi-gets, cycles included
//! - **Namespaced:** one key prefix per tenant, `<namespace>:document-<id>`
//! - **Backend Agnostic:** in-memory and Redis cache stores, or your own [`CacheBackend`]
//! - **Degrades gracefully:** an unavailable cache store turns reads into misses
//!
//! ## Quick Start
//!
//! ```
//! use doc_cache::{CachedAdapter, Document, DocumentAdapter, FindOptions, InMemoryAdapter};
//! use doc_cache::backend::InMemoryBackend;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> doc_cache::Result<()> {
//! // 1. Wrap the persistent adapter with a cache store
//! let mut cached = CachedAdapter::new(InMemoryAdapter::new(), InMemoryBackend::new());
//!
//! // 2. Pick the tenant namespace
//! cached.create_namespace("project_1").await?;
//! cached.set_namespace("project_1")?;
//!
//! // 3. Write through the adapter; nested documents become relations
//! let team = Document::from_value(json!({
//!     "$id": "t1",
//!     "name": "Acme",
//!     "owner": {"$id": "u1", "$collection": "users", "name": "Ann"}
//! }))?;
//! cached.create_document("teams", team, &[]).await?;
//!
//! // 4. Read: cache first, relations resolved
//! let team = cached.get_document("teams", "t1").await?.expect("stored");
//! assert_eq!(team.get("owner").unwrap()["name"], json!("Ann"));
//!
//! // 5. Queries pass through; results come from the cache
//! let teams = cached.find(&FindOptions::new().filter("$collection=teams")).await?;
//! assert_eq!(teams.len(), 1);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod adapter;
pub mod backend;
pub mod cached;
pub mod config;
pub mod document;
pub mod error;
pub mod key;
pub mod observability;
pub mod resolver;
pub mod serialization;

// Re-exports for convenience
pub use adapter::{DocumentAdapter, FindOptions, InMemoryAdapter};
pub use backend::CacheBackend;
pub use cached::CachedAdapter;
pub use config::CacheConfig;
pub use document::{Document, RelationDescriptor};
pub use error::{Error, Result};
pub use key::{CacheKeyBuilder, Namespace};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
