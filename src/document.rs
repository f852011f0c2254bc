//! Schemaless documents and their relation descriptors.
//!
//! A [`Document`] is a JSON object keyed by field name. Three field names are
//! reserved:
//!
//! - `$id`: the document identifier, unique within its namespace
//! - `$collection`: the collection the document belongs to
//! - `temp-relations`: the relation descriptor list of a *raw* document
//!
//! Raw documents come from the persistent adapter (and from the cache, which
//! stores them verbatim). Relational fields are absent from a raw document and
//! described instead by its descriptor list; resolution replaces the list with
//! the nested documents it names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier field.
pub const ID_FIELD: &str = "$id";

/// Owning collection field.
pub const COLLECTION_FIELD: &str = "$collection";

/// Relation descriptor list field, present only on raw documents.
pub const RELATIONS_FIELD: &str = "temp-relations";

/// Describes one relational field of a raw document.
///
/// # Example
///
/// ```
/// use doc_cache::document::RelationDescriptor;
///
/// let single = RelationDescriptor::single("owner", "user_1");
/// assert!(!single.is_array);
///
/// let many = RelationDescriptor::collection("members", "user_2");
/// assert_eq!(many.target, "user_2");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Field the resolved document is attached under.
    pub key: String,
    /// Identifier of the related document.
    #[serde(rename = "end")]
    pub target: String,
    /// Append to an ordered list at `key` instead of setting it.
    #[serde(rename = "array", default)]
    pub is_array: bool,
}

impl RelationDescriptor {
    pub fn single(key: impl Into<String>, target: impl Into<String>) -> Self {
        RelationDescriptor {
            key: key.into(),
            target: target.into(),
            is_array: false,
        }
    }

    pub fn collection(key: impl Into<String>, target: impl Into<String>) -> Self {
        RelationDescriptor {
            key: key.into(),
            target: target.into(),
            is_array: true,
        }
    }
}

/// A uniquely identified mapping of fields to values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Document { fields: Map::new() }
    }

    /// Create a document holding only an identifier.
    ///
    /// Used as the placeholder for a relation that is not expanded further.
    pub fn reference(id: impl Into<String>) -> Self {
        let mut doc = Document::new();
        doc.set(ID_FIELD, Value::String(id.into()));
        doc
    }

    /// Build a document from a JSON value.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(Error::ValidationError(format!(
                "document must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn collection(&self) -> Option<&str> {
        self.fields.get(COLLECTION_FIELD).and_then(Value::as_str)
    }

    /// Whether this document can be served for a request against `collection`.
    ///
    /// An empty collection matches any document, and so does a document that
    /// does not record its collection.
    pub fn belongs_to(&self, collection: &str) -> bool {
        collection.is_empty() || self.collection().map_or(true, |c| c == collection)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Whether this raw document carries a relation descriptor list.
    pub fn has_relations(&self) -> bool {
        self.fields.contains_key(RELATIONS_FIELD)
    }

    /// Parse the relation descriptor list without removing it.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the list is not an array of descriptors.
    pub fn relations(&self) -> Result<Vec<RelationDescriptor>> {
        match self.fields.get(RELATIONS_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(list) => parse_relations(list.clone(), self.id()),
        }
    }

    /// Remove and parse the relation descriptor list.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the list is malformed. The list is
    /// removed either way.
    pub fn take_relations(&mut self) -> Result<Vec<RelationDescriptor>> {
        match self.fields.remove(RELATIONS_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(list) => parse_relations(list, self.id()),
        }
    }

    /// Replace the relation descriptor list. An empty list removes the field.
    pub fn set_relations(&mut self, relations: &[RelationDescriptor]) -> Result<()> {
        if relations.is_empty() {
            self.fields.remove(RELATIONS_FIELD);
            return Ok(());
        }
        let list = serde_json::to_value(relations)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        self.fields.insert(RELATIONS_FIELD.to_string(), list);
        Ok(())
    }

    /// Identifiers of every document embedded below the top level.
    ///
    /// A nested JSON object carrying a string `$id` counts as an embedded
    /// document; objects are searched recursively, through arrays as well.
    pub fn embedded_document_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for (field, value) in &self.fields {
            if field != RELATIONS_FIELD {
                collect_ids(value, &mut ids);
            }
        }
        ids
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Document { fields }
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

fn parse_relations(list: Value, owner: Option<&str>) -> Result<Vec<RelationDescriptor>> {
    serde_json::from_value(list).map_err(|e| {
        Error::ValidationError(format!(
            "malformed relation descriptors on document {}: {}",
            owner.unwrap_or("<unknown>"),
            e
        ))
    })
}

fn collect_ids(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get(ID_FIELD) {
                ids.push(id.clone());
            }
            for nested in map.values() {
                collect_ids(nested, ids);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_ids(item, ids);
            }
        }
        _ => {}
    }
}
