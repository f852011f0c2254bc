//! Raw cache store implementations.
//!
//! The cache store is the one shared external resource of this crate. It only
//! needs per-key atomicity: the cached adapter never holds locks across calls.

use crate::error::Result;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Trait for key/value cache stores.
///
/// All methods take `&self`; implementations use interior mutability or an
/// external server. Implementations: InMemory (default), Redis.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (key not found)
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache with optional TTL.
    ///
    /// Document entries are written with `ttl = None`: they live until invalidated.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Invalidate a key immediately (expire-to-zero).
    ///
    /// Deleting an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists in cache.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Bulk get, results aligned with `keys` by position.
    ///
    /// Default implementation calls `get()` for each key. Stores with a native
    /// batch read (Redis MGET) should override this: relation resolution and
    /// `find` rely on one round trip per batch.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Bulk invalidation.
    ///
    /// Default implementation calls `delete()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or fails.
    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Health check - verify the store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
