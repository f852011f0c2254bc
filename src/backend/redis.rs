//! Redis cache store.
//!
//! Document entries are plain string keys; invalidation uses `EXPIRE key 0`,
//! which removes the key immediately and is a no-op for absent keys.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with the REDIS_POOL_SIZE environment variable.
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for the Redis store.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }

    /// Pool size from `REDIS_POOL_SIZE`, falling back to the default.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the variable is set but not a positive integer.
    pub fn pool_size_from_env() -> Result<u32> {
        match std::env::var("REDIS_POOL_SIZE") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => Ok(size),
                _ => Err(Error::ConfigError(format!(
                    "REDIS_POOL_SIZE must be a positive integer, got {:?}",
                    raw
                ))),
            },
            Err(_) => Ok(DEFAULT_POOL_SIZE),
        }
    }
}

/// Redis store with connection pooling.
///
/// # Example
///
/// ```no_run
/// # use doc_cache::backend::{RedisBackend, RedisConfig, CacheBackend};
/// # use doc_cache::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// backend.set("project_1:document-t1", b"value".to_vec(), None).await?;
/// let value = backend.get("project_1:document-t1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis store from configuration.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let backend = Self::with_pool_size(&config.connection_string(), config.pool_size)?;
        info!(
            "✓ Redis cache store initialized: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(backend)
    }

    /// Create from connection string directly.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set.
    ///
    /// # Errors
    /// Returns `Err` if the pool size variable is invalid or pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = RedisConfig::pool_size_from_env()?;
        let backend = Self::with_pool_size(conn_str, pool_size)?;
        info!(
            "✓ Redis cache store initialized from connection string (pool size: {})",
            pool_size
        );
        Ok(backend)
    }

    /// Create from `REDIS_URL` (default `redis://localhost:6379/0`).
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());
        Self::from_connection_string(&url).await
    }

    fn with_pool_size(conn_str: &str, pool_size: u32) -> Result<Self> {
        let mut cfg = PoolConfig::from_url(conn_str);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))?;

        Ok(RedisBackend { pool })
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn().await?;

        match ttl {
            Some(duration) => {
                let seconds = duration.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis SET_EX failed for key {}: {}", key, e))
                    })?;
                debug!("✓ Redis SET {} (TTL: {}s)", key, seconds);
            }
            None => {
                conn.set::<_, _, ()>(key, value).await.map_err(|e| {
                    Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
                })?;
                debug!("✓ Redis SET {}", key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;

        conn.expire::<_, ()>(key, 0).await.map_err(|e| {
            Error::BackendError(format!("Redis EXPIRE failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis EXPIRE {} 0", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        conn.exists(key).await.map_err(|e| {
            Error::BackendError(format!("Redis EXISTS failed for key {}: {}", key, e))
        })
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn().await?;

        // A single-key MGET still replies with an array.
        let values: Vec<Option<Vec<u8>>> = deadpool_redis::redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis MGET failed: {}", e)))?;

        debug!("✓ Redis MGET {} keys", keys.len());
        Ok(values)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn().await?;

        let mut pipe = deadpool_redis::redis::pipe();
        for key in keys {
            pipe.cmd("EXPIRE").arg(*key).arg(0).ignore();
        }
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis EXPIRE (bulk) failed: {}", e)))?;

        debug!("✓ Redis MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }
}
