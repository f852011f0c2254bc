//! Versioned cache envelopes for raw documents.
//!
//! Every cache entry follows this format:
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │ PAYLOAD (JSON text)      │
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "DOCC"              u32               serde_json::to_string(T)
//! ```
//!
//! The envelope is encoded with Postcard. Documents are schemaless JSON, which
//! Postcard cannot carry on its own (it is not self-describing), so the payload
//! is the document's JSON text. Entries are stored unresolved, relation
//! descriptors included.
//!
//! # Example
//!
//! ```rust
//! use doc_cache::serialization::{serialize_for_cache, deserialize_from_cache};
//! use doc_cache::Document;
//! use serde_json::json;
//!
//! # fn main() -> doc_cache::Result<()> {
//! let doc = Document::from_value(json!({"$id": "t1", "name": "Acme"}))?;
//!
//! let bytes = serialize_for_cache(&doc)?;
//! let back: Document = deserialize_from_cache(&bytes)?;
//! assert_eq!(doc, back);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic header for document cache entries: b"DOCC"
pub const CACHE_MAGIC: [u8; 4] = *b"DOCC";

/// Current schema version.
///
/// Increment when the raw document representation changes (reserved field
/// names, descriptor layout). Entries written by other versions are refetched.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for cache entries.
///
/// ```rust
/// use doc_cache::serialization::CacheEnvelope;
///
/// let envelope = CacheEnvelope::new("{}".to_string());
/// assert_eq!(envelope.magic, *b"DOCC");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"DOCC"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// The encoded document
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value into an enveloped cache entry.
///
/// # Errors
///
/// Returns `Error::SerializationError` if JSON or Postcard encoding fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_string(value).map_err(|e| {
        error!("Cache payload encoding failed: {}", e);
        Error::SerializationError(e.to_string())
    })?;

    postcard::to_allocvec(&CacheEnvelope::new(payload)).map_err(|e| {
        error!("Cache envelope encoding failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from an enveloped cache entry.
///
/// Checks, in order: the envelope decodes, the magic matches, the version
/// matches, the payload is valid JSON for `T`.
///
/// # Errors
///
/// - `Error::DeserializationError`: Truncated envelope or invalid payload
/// - `Error::InvalidCacheEntry`: Invalid magic header
/// - `Error::VersionMismatch`: Schema version mismatch
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: CacheEnvelope<String> = postcard::from_bytes(bytes).map_err(|e| {
        warn!("Cache envelope decoding failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    serde_json::from_str(&envelope.payload)
        .map_err(|e| Error::DeserializationError(format!("Invalid cached payload: {}", e)))
}
