//! Cache-coherent document adapter.
//!
//! [`CachedAdapter`] wraps a persistent [`DocumentAdapter`] and a
//! [`CacheBackend`] and implements `DocumentAdapter` itself, so callers cannot
//! tell it apart from the adapter it wraps except by speed.
//!
//! Reads go to the cache first and fall back to the adapter, writing the raw
//! document back under `<namespace>:document-<id>`. Writes go to the adapter
//! first and then expire the affected keys; mutated data is never written into
//! the cache directly.
//!
//! # Example
//!
//! ```
//! use doc_cache::{CachedAdapter, Document, DocumentAdapter, InMemoryAdapter};
//! use doc_cache::backend::InMemoryBackend;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> doc_cache::Result<()> {
//! let cached = CachedAdapter::new(InMemoryAdapter::new(), InMemoryBackend::new());
//!
//! let team = Document::from_value(json!({"$id": "t1", "name": "Acme"}))?;
//! cached.create_document("teams", team, &[]).await?;
//!
//! let team = cached.get_document("teams", "t1").await?;
//! assert_eq!(team.and_then(|t| t.get("name").cloned()), Some(json!("Acme")));
//! # Ok(())
//! # }
//! ```

use crate::adapter::{DocumentAdapter, FindOptions};
use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::document::{Document, RELATIONS_FIELD};
use crate::error::{Error, Result};
use crate::key::{CacheKeyBuilder, Namespace};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::resolver::RelationGraph;
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Caching decorator over a persistent document adapter.
///
/// The active namespace is the wrapped adapter's; switching it on the
/// decorator switches both the adapter and the cache key prefix.
///
/// # Cache store failures
///
/// On reads, a failing cache store degrades to a miss: the document is loaded
/// from the adapter and the failure is logged and recorded. On writes, the
/// adapter result stands but a failed invalidation is reported as
/// `Error::BackendError`, since the cache may still hold the old entry.
pub struct CachedAdapter<A: DocumentAdapter, B: CacheBackend> {
    adapter: A,
    backend: B,
    config: CacheConfig,
    metrics: Arc<dyn CacheMetrics>,
}

impl<A: DocumentAdapter, B: CacheBackend> CachedAdapter<A, B> {
    /// Wrap `adapter` with `backend` as its cache store.
    pub fn new(adapter: A, backend: B) -> Self {
        CachedAdapter {
            adapter,
            backend,
            config: CacheConfig::default(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache key of `id` in the active namespace.
    pub fn key(&self, id: &str) -> String {
        CacheKeyBuilder::document(self.adapter.namespace(), id)
    }

    /// Materialize a raw document: expand its relations through the cache
    /// and remove the descriptor list.
    ///
    /// # Errors
    /// Returns `Err` if loading a related document from the adapter fails or a
    /// descriptor list is malformed.
    pub async fn resolve(&self, raw: Document) -> Result<Document> {
        if !raw.has_relations() {
            return Ok(raw);
        }

        let graph = self.expand(vec![raw.clone()]).await?;
        graph.assemble_from(&raw, self.config.max_relation_depth)
    }

    /// Load documents from the adapter and write them into the cache.
    ///
    /// Returns how many of the identifiers exist.
    ///
    /// # Errors
    /// Returns `Err` if the adapter fails. Cache write failures are only logged.
    pub async fn warm<S: AsRef<str>>(&self, ids: &[S]) -> Result<usize> {
        let loaded =
            try_join_all(ids.iter().map(|id| self.load_from_adapter(id.as_ref()))).await?;
        let warmed = loaded.iter().filter(|doc| doc.is_some()).count();

        info!("✓ Warmed {}/{} documents in {}", warmed, ids.len(), self.namespace());
        Ok(warmed)
    }

    /// Decode a cache entry. Empty and undecodable entries count as misses.
    fn decode(&self, key: &str, bytes: Option<Vec<u8>>) -> Option<Document> {
        let bytes = bytes.filter(|bytes| !bytes.is_empty())?;

        match deserialize_from_cache::<Document>(&bytes) {
            Ok(doc) if !doc.is_empty() => Some(doc),
            Ok(_) => None,
            Err(e) if e.is_cache_entry_error() => {
                warn!("Discarding cache entry {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                None
            }
            Err(e) => {
                error!("Failed to read cache entry {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                None
            }
        }
    }

    async fn read_cached(&self, key: &str) -> Option<Document> {
        match self.backend.get(key).await {
            Ok(bytes) => self.decode(key, bytes),
            Err(e) => {
                warn!("Cache read failed for {}, falling back to adapter: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                None
            }
        }
    }

    async fn store(&self, key: &str, raw: &Document) {
        let timer = Instant::now();
        let bytes = match serialize_for_cache(raw) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return;
            }
        };

        match self.backend.set(key, bytes, None).await {
            Ok(()) => self.metrics.record_set(key, timer.elapsed()),
            Err(e) => {
                warn!("Cache write failed for {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
            }
        }
    }

    /// Read-through on miss: load the raw document and cache it.
    async fn load_from_adapter(&self, id: &str) -> Result<Option<Document>> {
        let key = self.key(id);
        let timer = Instant::now();

        let raw = self.adapter.get_document("", id).await?;
        self.metrics.record_miss(&key, timer.elapsed());

        match raw {
            Some(raw) => {
                self.store(&key, &raw).await;
                Ok(Some(raw))
            }
            None => {
                debug!("✗ {} not found in adapter", key);
                Ok(None)
            }
        }
    }

    /// Raw documents for `ids`, in order: one multi-get, then the misses
    /// from the adapter concurrently.
    async fn load_raw_many(&self, ids: &[String]) -> Result<Vec<Option<Document>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = Instant::now();
        let keys = CacheKeyBuilder::documents(self.adapter.namespace(), ids);
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let entries = match self.backend.mget(&key_refs).await {
            Ok(entries) if entries.len() == keys.len() => entries,
            Ok(entries) => {
                warn!(
                    "Cache MGET returned {} values for {} keys, ignoring",
                    entries.len(),
                    keys.len()
                );
                vec![None; keys.len()]
            }
            Err(e) => {
                warn!("Cache MGET failed, falling back to adapter: {}", e);
                self.metrics.record_error(&keys.join(","), &e.to_string());
                vec![None; keys.len()]
            }
        };

        let mut docs = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for (i, (key, entry)) in keys.iter().zip(entries).enumerate() {
            let doc = self.decode(key, entry);
            match &doc {
                Some(_) => self.metrics.record_hit(key, timer.elapsed()),
                None => misses.push(i),
            }
            docs.push(doc);
        }

        debug!(
            "» MGET {} keys: {} hits, {} misses",
            keys.len(),
            keys.len() - misses.len(),
            misses.len()
        );

        let loaded =
            try_join_all(misses.iter().map(|&i| self.load_from_adapter(&ids[i]))).await?;
        for (i, doc) in misses.into_iter().zip(loaded) {
            docs[i] = doc;
        }

        Ok(docs)
    }

    /// Fetch every document reachable from `roots` within the depth bound,
    /// one level per round trip.
    async fn expand(&self, roots: Vec<Document>) -> Result<RelationGraph> {
        let mut graph = RelationGraph::new();
        let mut pending = Vec::new();
        for root in roots {
            pending.extend(graph.missing_targets(&root)?);
            graph.insert(root);
        }

        for _ in 0..self.config.max_relation_depth {
            let mut seen = HashSet::new();
            pending.retain(|id| {
                !graph.contains(id) && !graph.is_absent(id) && seen.insert(id.clone())
            });
            if pending.is_empty() {
                break;
            }

            let fetched = self.load_raw_many(&pending).await?;
            for (id, raw) in std::mem::take(&mut pending).into_iter().zip(fetched) {
                match raw {
                    Some(raw) => {
                        pending.extend(graph.missing_targets(&raw)?);
                        graph.insert(raw);
                    }
                    None => graph.mark_absent(id),
                }
            }
        }

        Ok(graph)
    }

    /// Expire the cache entries of `ids`.
    async fn invalidate(&self, ids: Vec<String>) -> Result<()> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .map(|id| self.key(&id))
            .collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let timer = Instant::now();
        if let Err(e) = self.backend.mdelete(&key_refs).await {
            let joined = keys.join(",");
            error!("Cache invalidation failed for {}: {}", joined, e);
            self.metrics.record_error(&joined, &e.to_string());
            return Err(Error::BackendError(format!(
                "write succeeded but invalidation of {} failed: {}",
                joined, e
            )));
        }

        for key in &keys {
            self.metrics.record_delete(key, timer.elapsed());
        }
        Ok(())
    }

    /// Identifiers whose cache entries a write of `written` makes stale.
    fn written_ids(id: &str, written: &Document) -> Vec<String> {
        let mut ids = vec![id.to_string()];
        ids.extend(written.embedded_document_ids());
        ids
    }
}

impl<A: DocumentAdapter, B: CacheBackend> DocumentAdapter for CachedAdapter<A, B> {
    fn namespace(&self) -> &Namespace {
        self.adapter.namespace()
    }

    fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        Namespace::new(namespace)?;
        self.adapter.set_namespace(namespace)?;
        debug!("» Active namespace: {}", namespace);
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let key = self.key(id);
        let timer = Instant::now();

        let raw = match self.read_cached(&key).await {
            Some(raw) => {
                debug!("✓ Cache hit {}", key);
                self.metrics.record_hit(&key, timer.elapsed());
                raw
            }
            None => {
                debug!("Cache miss {}, loading from adapter", key);
                match self.load_from_adapter(id).await? {
                    Some(raw) => raw,
                    None => return Ok(None),
                }
            }
        };

        if !raw.belongs_to(collection) {
            debug!("{} is not in collection {}", key, collection);
            return Ok(None);
        }

        self.resolve(raw).await.map(Some)
    }

    async fn create_document(
        &self,
        collection: &str,
        data: Document,
        unique: &[String],
    ) -> Result<Document> {
        let mut written = self
            .adapter
            .create_document(collection, data, unique)
            .await?;

        if let Some(id) = written.id() {
            self.invalidate(Self::written_ids(id, &written)).await?;
        }

        written.remove(RELATIONS_FIELD);
        Ok(written)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> Result<Document> {
        let mut written = self.adapter.update_document(collection, id, data).await?;

        self.invalidate(Self::written_ids(id, &written)).await?;

        written.remove(RELATIONS_FIELD);
        Ok(written)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let deleted = self.adapter.delete_document(collection, id).await?;
        self.invalidate(vec![id.to_string()]).await?;
        Ok(deleted)
    }

    async fn find_ids(&self, options: &FindOptions) -> Result<Vec<String>> {
        self.adapter.find_ids(options).await
    }

    async fn find(&self, options: &FindOptions) -> Result<Vec<Document>> {
        let ids = self.adapter.find_ids(options).await?;
        let roots: Vec<Document> = self
            .load_raw_many(&ids)
            .await?
            .into_iter()
            .flatten()
            .collect();

        let order: Vec<String> = roots
            .iter()
            .filter_map(|raw| raw.id().map(str::to_string))
            .collect();
        if order.len() < ids.len() {
            debug!("find: {} of {} results vanished", ids.len() - order.len(), ids.len());
        }

        let graph = self.expand(roots).await?;
        let mut documents = Vec::with_capacity(order.len());
        for id in &order {
            if let Some(doc) = graph.assemble(id, self.config.max_relation_depth)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    async fn count(&self, options: &FindOptions) -> Result<u64> {
        self.adapter.count(options).await
    }

    async fn create_namespace(&self, namespace: &str) -> Result<bool> {
        self.adapter.create_namespace(namespace).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        self.adapter.delete_namespace(namespace).await
    }

    fn debug_info(&self) -> Map<String, Value> {
        self.adapter.debug_info()
    }
}
