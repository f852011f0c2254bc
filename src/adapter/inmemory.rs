//! In-memory persistent adapter for tests, demos, and benchmarks.
//!
//! Behaves like a document database adapter: nested documents are stored as
//! documents of their own and linked back through relation descriptors, so
//! reads return raw documents exactly as a real adapter would.

use super::{field_text, DocumentAdapter, Filter, FindOptions, OrderCast, OrderType};
use crate::document::{
    Document, RelationDescriptor, COLLECTION_FIELD, ID_FIELD, RELATIONS_FIELD,
};
use crate::error::{Error, Result};
use crate::key::Namespace;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct NamespaceData {
    documents: HashMap<String, Document>,
    /// Unique key -> owning document id.
    unique: HashMap<String, String>,
}

/// Document store kept in process memory.
///
/// Clones share storage but each clone has its own active namespace.
///
/// # Storing nested documents
///
/// On create and update, a field holding an object with a `$collection`, or a
/// non-empty array of such objects, is split off: each object is stored as its
/// own document (receiving an `$id` if it has none) and the field is replaced
/// by relation descriptors in the stored raw document.
///
/// ```ignore
/// let adapter = InMemoryAdapter::new();
/// adapter.create_document("teams", team_with_owner, &[]).await?;
///
/// // Raw read: `owner` is gone, `temp-relations` names it instead.
/// let raw = adapter.get_document("teams", "t1").await?;
/// ```
#[derive(Clone)]
pub struct InMemoryAdapter {
    namespaces: Arc<DashMap<String, NamespaceData>>,
    namespace: Namespace,
}

impl InMemoryAdapter {
    /// Create an adapter with the `default` namespace created and active.
    pub fn new() -> Self {
        let namespace = Namespace::default();
        let namespaces = DashMap::new();
        namespaces.insert(namespace.as_str().to_string(), NamespaceData::default());
        InMemoryAdapter {
            namespaces: Arc::new(namespaces),
            namespace,
        }
    }

    /// Store a raw document verbatim in the active namespace.
    ///
    /// Unlike `create_document`, nothing is split off and an existing
    /// `temp-relations` list is kept, which lets tests build arbitrary
    /// relation graphs (including cyclic ones). Creates the namespace if needed.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the document has no `$id`.
    pub fn insert_raw(&self, doc: Document) -> Result<()> {
        let id = doc
            .id()
            .ok_or_else(|| Error::ValidationError("raw document without $id".to_string()))?
            .to_string();
        self.namespaces
            .entry(self.namespace.as_str().to_string())
            .or_default()
            .documents
            .insert(id, doc);
        Ok(())
    }

    /// Number of documents in the active namespace.
    pub fn len(&self) -> usize {
        self.namespaces
            .get(self.namespace.as_str())
            .map_or(0, |data| data.documents.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn missing_namespace(&self) -> Error {
        Error::PersistenceError(format!("namespace {} does not exist", self.namespace))
    }

    fn matching_ids(&self, options: &FindOptions) -> Result<Vec<String>> {
        let filters = options
            .filters
            .iter()
            .map(|expression| Filter::parse(expression))
            .collect::<Result<Vec<_>>>()?;

        let data = match self.namespaces.get(self.namespace.as_str()) {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        let search = options.search.to_lowercase();
        let mut matches: Vec<&Document> = data
            .documents
            .values()
            .filter(|doc| filters.iter().all(|f| f.matches(doc)))
            .filter(|doc| search.is_empty() || contains_term(doc, &search))
            .collect();

        // Identifier order first so ties on the order field stay deterministic.
        matches.sort_by(|a, b| a.id().cmp(&b.id()));
        matches.sort_by(|a, b| {
            let ordering = compare_field(a, b, &options.order_field, options.order_cast);
            match options.order_type {
                OrderType::Asc => ordering,
                OrderType::Desc => ordering.reverse(),
            }
        });

        Ok(matches
            .into_iter()
            .filter_map(|doc| doc.id().map(str::to_string))
            .collect())
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAdapter for InMemoryAdapter {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.namespace = Namespace::new(namespace)?;
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let found = self
            .namespaces
            .get(self.namespace.as_str())
            .and_then(|data| data.documents.get(id).cloned())
            .filter(|doc| doc.belongs_to(collection));

        debug!(
            "[memory] GET {}/{} -> {}",
            self.namespace,
            id,
            if found.is_some() { "found" } else { "none" }
        );
        Ok(found)
    }

    async fn create_document(
        &self,
        collection: &str,
        data: Document,
        unique: &[String],
    ) -> Result<Document> {
        let mut entry = self
            .namespaces
            .get_mut(self.namespace.as_str())
            .ok_or_else(|| self.missing_namespace())?;
        let store = entry.value_mut();

        if let Some(taken) = unique.iter().find(|key| store.unique.contains_key(*key)) {
            return Err(Error::Duplicate(format!("unique key {} is taken", taken)));
        }
        if let Some(id) = data.id() {
            if store.documents.contains_key(id) {
                return Err(Error::Duplicate(format!("document {} already exists", id)));
            }
        }

        let written = store_tree(store, collection, data)?;
        let id = written.id().unwrap_or_default().to_string();
        for key in unique {
            store.unique.insert(key.clone(), id.clone());
        }

        debug!("[memory] CREATE {}/{}", self.namespace, id);
        Ok(written)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        mut data: Document,
    ) -> Result<Document> {
        let mut entry = self
            .namespaces
            .get_mut(self.namespace.as_str())
            .ok_or_else(|| self.missing_namespace())?;
        let store = entry.value_mut();

        if !store.documents.contains_key(id) {
            return Err(Error::PersistenceError(format!(
                "document {} does not exist in {}",
                id, self.namespace
            )));
        }

        data.set(ID_FIELD, Value::String(id.to_string()));
        let written = store_tree(store, collection, data)?;

        debug!("[memory] UPDATE {}/{}", self.namespace, id);
        Ok(written)
    }

    async fn delete_document(&self, _collection: &str, id: &str) -> Result<bool> {
        let mut entry = self
            .namespaces
            .get_mut(self.namespace.as_str())
            .ok_or_else(|| self.missing_namespace())?;
        let store = entry.value_mut();

        let removed = store.documents.remove(id).is_some();
        store.unique.retain(|_, owner| owner != id);

        debug!("[memory] DELETE {}/{} -> {}", self.namespace, id, removed);
        Ok(removed)
    }

    async fn find_ids(&self, options: &FindOptions) -> Result<Vec<String>> {
        Ok(self
            .matching_ids(options)?
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn count(&self, options: &FindOptions) -> Result<u64> {
        Ok(self.matching_ids(options)?.len() as u64)
    }

    async fn create_namespace(&self, namespace: &str) -> Result<bool> {
        let namespace = Namespace::new(namespace)?;
        match self.namespaces.entry(namespace.as_str().to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(NamespaceData::default());
                Ok(true)
            }
        }
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.remove(namespace).is_some())
    }

    fn debug_info(&self) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("adapter".to_string(), Value::from("memory"));
        info.insert("namespace".to_string(), Value::from(self.namespace.as_str()));
        info.insert("documents".to_string(), Value::from(self.len()));
        info.insert("namespaces".to_string(), Value::from(self.namespaces.len()));
        info
    }
}

/// Store `doc` and its nested documents; returns `doc` as written.
fn store_tree(store: &mut NamespaceData, collection: &str, mut doc: Document) -> Result<Document> {
    let id = match doc.id() {
        Some(id) => id.to_string(),
        None => {
            let id = new_id();
            doc.set(ID_FIELD, Value::String(id.clone()));
            id
        }
    };
    if doc.collection().is_none() && !collection.is_empty() {
        doc.set(COLLECTION_FIELD, Value::String(collection.to_string()));
    }

    let mut raw = Document::new();
    let mut written = Document::new();
    let mut relations = Vec::new();

    for (field, value) in std::mem::take(doc.fields_mut()) {
        if field == RELATIONS_FIELD {
            continue;
        }
        match value {
            Value::Object(map) if is_nested_document(&map) => {
                let nested = store_tree(store, "", Document::from(map))?;
                relations.push(RelationDescriptor::single(
                    field.clone(),
                    nested.id().unwrap_or_default(),
                ));
                written.set(field, nested.into_value());
            }
            Value::Array(items)
                if !items.is_empty()
                    && items
                        .iter()
                        .all(|item| matches!(item, Value::Object(map) if is_nested_document(map))) =>
            {
                let mut stored = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(map) = item {
                        let nested = store_tree(store, "", Document::from(map))?;
                        relations.push(RelationDescriptor::collection(
                            field.clone(),
                            nested.id().unwrap_or_default(),
                        ));
                        stored.push(nested.into_value());
                    }
                }
                written.set(field, Value::Array(stored));
            }
            value => {
                raw.set(field.clone(), value.clone());
                written.set(field, value);
            }
        }
    }

    raw.set_relations(&relations)?;
    store.documents.insert(id, raw);
    Ok(written)
}

fn is_nested_document(map: &Map<String, Value>) -> bool {
    matches!(map.get(COLLECTION_FIELD), Some(Value::String(_)))
}

fn new_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

fn contains_term(doc: &Document, term: &str) -> bool {
    doc.fields().iter().any(|(field, value)| {
        field != RELATIONS_FIELD
            && matches!(value, Value::String(s) if s.to_lowercase().contains(term))
    })
}

fn compare_field(a: &Document, b: &Document, field: &str, cast: OrderCast) -> Ordering {
    match cast {
        OrderCast::String => field_text(a, field).cmp(&field_text(b, field)),
        OrderCast::Int => field_int(a, field).cmp(&field_int(b, field)),
    }
}

fn field_int(doc: &Document, field: &str) -> Option<i64> {
    match doc.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
