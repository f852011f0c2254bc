//! Relation resolution.
//!
//! Raw documents name their related documents through a `temp-relations`
//! descriptor list. Resolution happens in two phases:
//!
//! 1. The cached adapter fetches raw documents level by level into a
//!    [`RelationGraph`], one multi-get per level (see `CachedAdapter`).
//! 2. [`RelationGraph::assemble`] builds the materialized tree from the graph
//!    without further I/O.
//!
//! Graphs may be cyclic. Assembly tracks the identifiers on the current path
//! from the root; a relation pointing back at one of them, or lying deeper
//! than the configured bound, is emitted as a `{ "$id": ... }` placeholder.
//! Relations to documents known not to exist are dropped at every depth.

use crate::document::{Document, RelationDescriptor};
use crate::error::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Raw documents reachable from one or more roots, keyed by identifier.
///
/// Identifiers that were looked up and found not to exist are remembered, so
/// relations to them are skipped at any depth.
#[derive(Clone, Debug, Default)]
pub struct RelationGraph {
    documents: HashMap<String, Document>,
    absent: HashSet<String>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw document. Returns `false` if it has no `$id` or is already present.
    pub fn insert(&mut self, raw: Document) -> bool {
        let id = match raw.id() {
            Some(id) if !self.documents.contains_key(id) => id.to_string(),
            _ => return false,
        };
        self.absent.remove(&id);
        self.documents.insert(id, raw);
        true
    }

    /// Record that `id` was looked up and does not exist.
    pub fn mark_absent(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.documents.contains_key(&id) {
            self.absent.insert(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn is_absent(&self, id: &str) -> bool {
        self.absent.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Relation targets of `raw` neither in the graph nor known absent,
    /// deduplicated, in descriptor order.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if the descriptor list is malformed.
    pub fn missing_targets(&self, raw: &Document) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(raw
            .relations()?
            .into_iter()
            .map(|relation| relation.target)
            .filter(|target| {
                !self.contains(target) && !self.is_absent(target) && seen.insert(target.clone())
            })
            .collect())
    }

    /// Materialize the document stored under `root`.
    ///
    /// Returns `None` if `root` is not in the graph. See [`assemble_from`](Self::assemble_from).
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if a descriptor list is malformed.
    pub fn assemble(&self, root: &str, max_depth: usize) -> Result<Option<Document>> {
        match self.documents.get(root) {
            Some(raw) => self.assemble_from(raw, max_depth).map(Some),
            None => Ok(None),
        }
    }

    /// Materialize `raw`, which need not be in the graph nor carry an `$id`.
    ///
    /// Relations are expanded up to `max_depth` levels below `raw`. Targets
    /// known to be absent are skipped at any depth, as are targets within the
    /// bound that are not in the graph. Deeper targets that were never looked
    /// up become placeholders.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` if a descriptor list is malformed.
    pub fn assemble_from(&self, raw: &Document, max_depth: usize) -> Result<Document> {
        let mut path = Vec::new();
        self.materialize(raw, 0, max_depth, &mut path)
    }

    fn build(
        &self,
        id: &str,
        depth: usize,
        max_depth: usize,
        path: &mut Vec<String>,
    ) -> Result<Option<Document>> {
        if self.is_absent(id) {
            return Ok(None);
        }

        // Targets past the bound are never fetched, so they are cut before lookup.
        if depth > max_depth || path.iter().any(|ancestor| ancestor == id) {
            trace!("relation to {} cut at depth {}", id, depth);
            return Ok(Some(Document::reference(id)));
        }

        match self.documents.get(id) {
            Some(raw) => self.materialize(raw, depth, max_depth, path).map(Some),
            None => Ok(None),
        }
    }

    fn materialize(
        &self,
        raw: &Document,
        depth: usize,
        max_depth: usize,
        path: &mut Vec<String>,
    ) -> Result<Document> {
        let mut doc = raw.clone();
        let relations = doc.take_relations()?;
        if relations.is_empty() {
            return Ok(doc);
        }

        let id = doc.id().map(str::to_string);
        if let Some(id) = &id {
            path.push(id.clone());
        }
        for RelationDescriptor {
            key,
            target,
            is_array,
        } in relations
        {
            let nested = match self.build(&target, depth + 1, max_depth, path)? {
                Some(nested) => nested.into_value(),
                None => {
                    debug!("relation {} -> {} skipped: target not found", key, target);
                    continue;
                }
            };

            if is_array {
                match doc.fields_mut().get_mut(&key) {
                    Some(Value::Array(items)) => items.push(nested),
                    _ => {
                        doc.set(key, Value::Array(vec![nested]));
                    }
                }
            } else {
                doc.set(key, nested);
            }
        }
        if id.is_some() {
            path.pop();
        }

        Ok(doc)
    }
}
