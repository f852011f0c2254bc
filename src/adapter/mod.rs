//! The document-operation contract shared by persistent adapters and the cache.
//!
//! [`DocumentAdapter`] is implemented by the authoritative store (any database
//! client, or [`InMemoryAdapter`] for tests) and by
//! [`CachedAdapter`](crate::cached::CachedAdapter), which wraps another
//! implementer of the same trait. Callers hold whichever one they were given.
//!
//! Persistent adapters return *raw* documents: relational fields are described
//! by a `temp-relations` descriptor list instead of being embedded. The cached
//! adapter returns materialized documents with the list resolved and removed.
//!
//! # Error Handling
//!
//! Persistent implementations should return:
//! - `Ok(None)` from `get_document` when nothing is stored under the identifier
//! - `Error::Duplicate` when `create_document` violates a unique key
//! - `Error::PersistenceError` for every other storage failure

use crate::document::Document;
use crate::error::{Error, Result};
use crate::key::Namespace;
use serde_json::{Map, Value};

pub mod inmemory;

pub use inmemory::InMemoryAdapter;

/// Sort direction for [`FindOptions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderType {
    #[default]
    Asc,
    Desc,
}

/// How the order field is compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderCast {
    /// Lexicographic comparison of the field's text.
    #[default]
    String,
    /// Numeric comparison; non-numeric values sort first.
    Int,
}

/// Query passed through to the persistent adapter by `find` and `count`.
///
/// # Example
///
/// ```
/// use doc_cache::adapter::{FindOptions, OrderType};
///
/// let options = FindOptions::new()
///     .filter("$collection=teams")
///     .order_by("dateCreated", OrderType::Desc)
///     .limit(10);
/// assert_eq!(options.filters, vec!["$collection=teams".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: usize,
    pub offset: usize,
    pub order_field: String,
    pub order_type: OrderType,
    pub order_cast: OrderCast,
    /// Case-insensitive term matched against string fields. Empty matches all.
    pub search: String,
    /// `field=value` or `field!=value` expressions, all of which must hold.
    pub filters: Vec<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            limit: 25,
            offset: 0,
            order_field: crate::document::ID_FIELD.to_string(),
            order_type: OrderType::Asc,
            order_cast: OrderCast::String,
            search: String::new(),
            filters: Vec::new(),
        }
    }
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: OrderType) -> Self {
        self.order_field = field.into();
        self.order_type = order;
        self
    }

    pub fn cast(mut self, cast: OrderCast) -> Self {
        self.order_cast = cast;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filters.push(expression.into());
        self
    }
}

/// A parsed filter expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Equal { field: String, value: String },
    NotEqual { field: String, value: String },
}

impl Filter {
    /// Parse `field=value` or `field!=value`.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for expressions without an operator or field.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = || Error::ValidationError(format!("invalid filter: {:?}", expression));

        if let Some((field, value)) = expression.split_once("!=") {
            if field.is_empty() {
                return Err(invalid());
            }
            return Ok(Filter::NotEqual {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        match expression.split_once('=') {
            Some((field, value)) if !field.is_empty() => Ok(Filter::Equal {
                field: field.to_string(),
                value: value.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Equal { field, value } => field_text(doc, field).as_deref() == Some(value),
            Filter::NotEqual { field, value } => field_text(doc, field).as_deref() != Some(value),
        }
    }
}

/// Text form of a scalar field, used by filters and ordering.
pub(crate) fn field_text(doc: &Document, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Trait for document stores.
///
/// Every operation runs against the implementer's active namespace.
#[allow(async_fn_in_trait)]
pub trait DocumentAdapter: Send + Sync {
    /// Active namespace.
    fn namespace(&self) -> &Namespace;

    /// Switch the active namespace for subsequent operations.
    ///
    /// # Errors
    /// Returns `Error::InvalidNamespace` for an empty name or one containing `:`;
    /// the previous namespace stays active.
    fn set_namespace(&mut self, namespace: &str) -> Result<()>;

    /// Fetch a document by identifier.
    ///
    /// An empty `collection` matches any collection.
    ///
    /// # Returns
    /// - `Ok(Some(document))` - Document found
    /// - `Ok(None)` - Nothing stored under `id` (not an error)
    ///
    /// # Errors
    /// Returns `Err` if the store fails.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create a document, enforcing the given unique keys.
    ///
    /// Returns the document as written, with its assigned `$id`.
    ///
    /// # Errors
    /// Returns `Error::Duplicate` if a unique key is taken, `Err` if the store fails.
    async fn create_document(
        &self,
        collection: &str,
        data: Document,
        unique: &[String],
    ) -> Result<Document>;

    /// Replace the document stored under `id`.
    ///
    /// # Errors
    /// Returns `Err` if the document does not exist or the store fails.
    async fn update_document(&self, collection: &str, id: &str, data: Document)
        -> Result<Document>;

    /// Delete a document. Returns whether anything was deleted.
    ///
    /// # Errors
    /// Returns `Err` if the store fails.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool>;

    /// Identifiers of the documents matching `options`, in query order.
    ///
    /// # Errors
    /// Returns `Err` if the query is invalid or the store fails.
    async fn find_ids(&self, options: &FindOptions) -> Result<Vec<String>>;

    /// Documents matching `options`, in query order.
    ///
    /// Default implementation loads each identifier from `find_ids()` with
    /// `get_document()`, dropping documents that vanished in between.
    ///
    /// # Errors
    /// Returns `Err` if the query is invalid or the store fails.
    async fn find(&self, options: &FindOptions) -> Result<Vec<Document>> {
        let ids = self.find_ids(options).await?;
        let mut documents = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(doc) = self.get_document("", id).await? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// Number of documents matching `options`, ignoring offset and limit.
    ///
    /// # Errors
    /// Returns `Err` if the query is invalid or the store fails.
    async fn count(&self, options: &FindOptions) -> Result<u64>;

    /// Create a namespace. Returns `false` if it already existed.
    ///
    /// # Errors
    /// Returns `Err` if the name is invalid or the store fails.
    async fn create_namespace(&self, namespace: &str) -> Result<bool>;

    /// Delete a namespace and its documents. Returns `false` if it did not exist.
    ///
    /// # Errors
    /// Returns `Err` if the store fails.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    /// Diagnostic information about the store.
    fn debug_info(&self) -> Map<String, Value> {
        Map::new()
    }
}
