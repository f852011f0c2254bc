//! Error types for the document cache.

use std::fmt;

/// Result type for cache and adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document cache.
///
/// The cached layer adds no error kinds of its own beyond passthrough: adapter
/// failures surface unchanged, and cache store failures on the read path are
/// absorbed as misses. A missing document is not an error; reads return `Ok(None)`.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a document to cache bytes.
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a document.
    ///
    /// Raised for truncated envelopes and for payloads that are not valid
    /// document JSON.
    ///
    /// **Recovery:** The read path treats the entry as a miss and overwrites it.
    DeserializationError(String),

    /// A relation descriptor list, filter, or other structured input is malformed.
    ValidationError(String),

    /// Cache store error (Redis connection lost, protocol error, etc).
    ///
    /// Reads never surface this: an unreachable cache degrades to a miss.
    /// Writes surface it when the post-write invalidation could not be applied,
    /// since the cache may now hold a stale entry.
    BackendError(String),

    /// Persistent adapter failure on any operation.
    ///
    /// Propagated unchanged; this layer performs no retries and applies no
    /// partial writes.
    PersistenceError(String),

    /// Unique-constraint violation reported by the adapter on create.
    Duplicate(String),

    /// Namespace switch rejected: the namespace is empty or contains the key separator.
    ///
    /// The previously active namespace stays in effect.
    InvalidNamespace(String),

    /// Configuration error (bad environment value, invalid connection string).
    ConfigError(String),

    /// Invalid cache entry: the envelope magic does not match.
    ///
    /// The key holds data that was not written by this crate.
    InvalidCacheEntry(String),

    /// Envelope schema version differs from the running code.
    ///
    /// Expected during deployments; the entry is refetched on the next read.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True for errors raised while decoding a cache entry.
    ///
    /// These are recoverable on the read path by refetching from the adapter.
    pub fn is_cache_entry_error(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
            Error::Duplicate(msg) => write!(f, "Duplicate: {}", msg),
            Error::InvalidNamespace(ns) => write!(f, "Invalid namespace: {:?}", ns),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
