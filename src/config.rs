//! Configuration for the cached adapter.

use crate::error::{Error, Result};

/// Environment variable overriding [`CacheConfig::max_relation_depth`].
pub const MAX_RELATION_DEPTH_ENV: &str = "DOC_CACHE_MAX_RELATION_DEPTH";

/// Default number of relation levels expanded below a document.
pub const DEFAULT_MAX_RELATION_DEPTH: usize = 8;

/// Settings for [`CachedAdapter`](crate::cached::CachedAdapter).
///
/// # Example
///
/// ```
/// use doc_cache::CacheConfig;
///
/// let config = CacheConfig::default().with_max_relation_depth(3);
/// assert_eq!(config.max_relation_depth, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Relation levels expanded below a document before related documents
    /// are emitted as `{ "$id": ... }` references. Ancestor cycles are cut
    /// regardless of this bound.
    pub max_relation_depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_relation_depth: DEFAULT_MAX_RELATION_DEPTH,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_relation_depth(mut self, depth: usize) -> Self {
        self.max_relation_depth = depth;
        self
    }

    /// Load from the environment, keeping defaults for unset variables.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_RELATION_DEPTH_ENV) {
            config.max_relation_depth = parse_depth(&raw)?;
        }
        Ok(config)
    }
}

fn parse_depth(raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|_| {
        Error::ConfigError(format!(
            "{} must be a non-negative integer, got {:?}",
            MAX_RELATION_DEPTH_ENV, raw
        ))
    })
}
