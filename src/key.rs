//! Cache key management: namespaces and document keys.
//!
//! Every key this crate produces has the shape `<namespace>:document-<id>`.
//! Namespaces may not contain `:`, so a key splits back into exactly one
//! `(namespace, id)` pair and distinct pairs never share a key.

use crate::error::{Error, Result};
use std::fmt;

/// Separator between the namespace and the rest of the key.
pub const SEPARATOR: char = ':';

/// Marker between the separator and the document identifier.
const DOCUMENT_MARKER: &str = "document-";

/// A validated key-prefix scope for one tenant or project.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace name.
    ///
    /// # Errors
    /// Returns `Error::InvalidNamespace` if the name is empty or contains `:`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(Error::InvalidNamespace(name));
        }
        Ok(Namespace(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace("default".to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build the cache key of a document: `<namespace>:document-<id>`.
    pub fn document(namespace: &Namespace, id: &str) -> String {
        format!("{}{}{}{}", namespace, SEPARATOR, DOCUMENT_MARKER, id)
    }

    /// Build the keys of several documents, preserving order.
    pub fn documents<S: AsRef<str>>(namespace: &Namespace, ids: &[S]) -> Vec<String> {
        ids.iter()
            .map(|id| Self::document(namespace, id.as_ref()))
            .collect()
    }

    /// Split a document key back into its namespace and identifier.
    ///
    /// Returns `None` for keys this crate did not produce.
    pub fn parse(key: &str) -> Option<(Namespace, &str)> {
        let (namespace, rest) = key.split_once(SEPARATOR)?;
        let id = rest.strip_prefix(DOCUMENT_MARKER)?;
        Namespace::new(namespace).ok().map(|ns| (ns, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key() {
        let ns = Namespace::new("project_1").expect("valid");
        assert_eq!(
            CacheKeyBuilder::document(&ns, "t1"),
            "project_1:document-t1"
        );
    }

    #[test]
    fn test_namespace_validation() {
        assert!(matches!(
            Namespace::new(""),
            Err(Error::InvalidNamespace(_))
        ));
        assert!(matches!(
            Namespace::new("a:b"),
            Err(Error::InvalidNamespace(_))
        ));
        assert_eq!(Namespace::default().as_str(), "default");
    }

    #[test]
    fn test_documents_preserves_order() {
        let ns = Namespace::new("ns").expect("valid");
        let keys = CacheKeyBuilder::documents(&ns, &["b", "a", "b"]);
        assert_eq!(
            keys,
            vec!["ns:document-b", "ns:document-a", "ns:document-b"]
        );
    }

    #[test]
    fn test_parse_inverts_document() {
        let ns = Namespace::new("ns").expect("valid");
        let key = CacheKeyBuilder::document(&ns, "id:with:colons");
        let (parsed_ns, id) = CacheKeyBuilder::parse(&key).expect("parse");
        assert_eq!(parsed_ns, ns);
        assert_eq!(id, "id:with:colons");
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(CacheKeyBuilder::parse("user:123").is_none());
        assert!(CacheKeyBuilder::parse("nocolon").is_none());
        assert!(CacheKeyBuilder::parse(":document-x").is_none());
    }
}
