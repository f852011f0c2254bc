//! Integration tests for doc-cache
//!
//! These tests verify end-to-end behavior of the cached adapter in front of
//! the in-memory adapter, with counting and failing cache stores.

use doc_cache::adapter::OrderType;
use doc_cache::backend::{CacheBackend, InMemoryBackend};
use doc_cache::observability::CacheMetrics;
use doc_cache::{
    CachedAdapter, Document, DocumentAdapter, Error, FindOptions, InMemoryAdapter, Namespace,
    Result,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test helpers
// ============================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn doc(value: Value) -> Document {
    Document::from_value(value).expect("document must be an object")
}

/// Cache store that counts calls per operation.
#[derive(Clone, Default)]
struct CountingBackend {
    inner: InMemoryBackend,
    gets: Arc<AtomicUsize>,
    mgets: Arc<AtomicUsize>,
    sets: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl CountingBackend {
    fn reset(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.mgets.store(0, Ordering::SeqCst);
        self.sets.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn mgets(&self) -> usize {
        self.mgets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl CacheBackend for CountingBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        self.mgets.fetch_add(1, Ordering::SeqCst);
        self.inner.mget(keys).await
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.mdelete(keys).await
    }
}

/// Cache store whose every call fails, like an unreachable server.
#[derive(Clone, Default)]
struct FailingBackend;

impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn mget(&self, _keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        Err(Error::BackendError("connection refused".to_string()))
    }

    async fn mdelete(&self, _keys: &[&str]) -> Result<()> {
        Err(Error::BackendError("connection refused".to_string()))
    }
}

/// Adapter whose queries also report an identifier that no longer exists,
/// as when a document is deleted between the query and the fetch.
struct VanishingAdapter {
    inner: InMemoryAdapter,
}

impl DocumentAdapter for VanishingAdapter {
    fn namespace(&self) -> &Namespace {
        self.inner.namespace()
    }

    fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.inner.set_namespace(namespace)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get_document(collection, id).await
    }

    async fn create_document(
        &self,
        collection: &str,
        data: Document,
        unique: &[String],
    ) -> Result<Document> {
        self.inner.create_document(collection, data, unique).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: Document,
    ) -> Result<Document> {
        self.inner.update_document(collection, id, data).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        self.inner.delete_document(collection, id).await
    }

    async fn find_ids(&self, options: &FindOptions) -> Result<Vec<String>> {
        let mut ids = self.inner.find_ids(options).await?;
        ids.insert(1, "vanished".to_string());
        Ok(ids)
    }

    async fn count(&self, options: &FindOptions) -> Result<u64> {
        self.inner.count(options).await
    }

    async fn create_namespace(&self, namespace: &str) -> Result<bool> {
        self.inner.create_namespace(namespace).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        self.inner.delete_namespace(namespace).await
    }

    fn debug_info(&self) -> Map<String, Value> {
        self.inner.debug_info()
    }
}

#[derive(Default)]
struct CountingMetrics {
    hits: AtomicUsize,
    misses: AtomicUsize,
    errors: AtomicUsize,
}

impl CacheMetrics for CountingMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn record_error(&self, _key: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting() -> CachedAdapter<InMemoryAdapter, CountingBackend> {
    init_logger();
    CachedAdapter::new(InMemoryAdapter::new(), CountingBackend::default())
}

/// Team `id` owned by user `owner`.
fn team(id: &str, name: &str, owner: &str) -> Document {
    doc(json!({
        "$id": id,
        "name": name,
        "owner": {"$id": owner, "$collection": "users", "name": format!("user {}", owner)}
    }))
}

// ============================================================================
// Coherency
// ============================================================================

#[tokio::test]
async fn test_read_after_update_sees_new_value() {
    let cached = counting();

    cached
        .create_document("teams", doc(json!({"$id": "t1", "name": "Acme", "sum": 1})), &[])
        .await
        .expect("Failed to create");

    let first = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(first.get("name"), Some(&json!("Acme")));

    cached
        .update_document("teams", "t1", doc(json!({"name": "Acme2", "sum": 1})))
        .await
        .expect("Failed to update");

    let second = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(second.get("name"), Some(&json!("Acme2")));
}

#[tokio::test]
async fn test_delete_invalidates() {
    let cached = counting();
    cached
        .create_document("teams", doc(json!({"$id": "t1"})), &[])
        .await
        .unwrap();
    cached.get_document("teams", "t1").await.unwrap();
    assert!(cached.backend().exists("default:document-t1").await.unwrap());

    assert!(cached.delete_document("teams", "t1").await.unwrap());

    assert!(!cached.backend().exists("default:document-t1").await.unwrap());
    assert!(cached.get_document("teams", "t1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_invalidates_stale_entry() {
    let cached = counting();

    // A leftover entry from a previous life of the identifier
    let stale = doc(json!({"$id": "t1", "name": "Stale"}));
    cached
        .backend()
        .set(
            "default:document-t1",
            doc_cache::serialization::serialize_for_cache(&stale).unwrap(),
            None,
        )
        .await
        .unwrap();

    cached
        .create_document("teams", doc(json!({"$id": "t1", "name": "Fresh"})), &[])
        .await
        .unwrap();

    let team = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(team.get("name"), Some(&json!("Fresh")));
}

// ============================================================================
// Transparency
// ============================================================================

#[tokio::test]
async fn test_cold_and_warm_reads_match() {
    let cached = counting();
    cached
        .create_document("teams", team("t1", "Acme", "u1"), &[])
        .await
        .unwrap();

    let cold = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert!(cached.backend().sets() > 0);

    cached.backend().reset();
    let warm = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(cached.backend().sets(), 0, "warm read must not repopulate");

    assert_eq!(cold, warm);

    // Same result as reading straight from the adapter with a fresh cache
    let fresh = CachedAdapter::new(cached.adapter().clone(), InMemoryBackend::new());
    let uncached = fresh.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(cold, uncached);
}

#[tokio::test]
async fn test_absent_document_is_none() {
    let cached = counting();
    assert!(cached.get_document("teams", "nope").await.unwrap().is_none());
}

// ============================================================================
// Relations
// ============================================================================

#[tokio::test]
async fn test_relation_fidelity() {
    let cached = counting();
    let graph = json!({
        "$id": "a",
        "$collection": "nodes",
        "b": {
            "$id": "b",
            "$collection": "nodes",
            "items": [
                {"$id": "c", "$collection": "nodes", "n": 1},
                {"$id": "d", "$collection": "nodes", "n": 2}
            ]
        }
    });

    cached
        .create_document("nodes", doc(graph.clone()), &[])
        .await
        .unwrap();

    let a = cached.get_document("nodes", "a").await.unwrap().unwrap();
    assert_eq!(a.into_value(), graph);

    // Warm read resolves from cached raw entries only
    cached.backend().reset();
    let a = cached.get_document("nodes", "a").await.unwrap().unwrap();
    assert_eq!(a.into_value(), graph);
    assert_eq!(cached.backend().sets(), 0);
}

#[tokio::test]
async fn test_cycle_terminates() {
    let cached = counting();
    cached
        .adapter()
        .insert_raw(doc(json!({
            "$id": "a",
            "temp-relations": [{"key": "peer", "end": "b", "array": false}]
        })))
        .unwrap();
    cached
        .adapter()
        .insert_raw(doc(json!({
            "$id": "b",
            "temp-relations": [{"key": "peer", "end": "a", "array": false}]
        })))
        .unwrap();

    let a = cached.get_document("", "a").await.unwrap().unwrap();
    assert_eq!(
        a.into_value(),
        json!({"$id": "a", "peer": {"$id": "b", "peer": {"$id": "a"}}})
    );

    let b = cached.get_document("", "b").await.unwrap().unwrap();
    assert_eq!(
        b.into_value(),
        json!({"$id": "b", "peer": {"$id": "a", "peer": {"$id": "b"}}})
    );
}

#[tokio::test]
async fn test_missing_relation_target_skipped() {
    let cached = counting();
    cached
        .adapter()
        .insert_raw(doc(json!({
            "$id": "t1",
            "temp-relations": [
                {"key": "owner", "end": "gone", "array": false},
                {"key": "members", "end": "m1", "array": true},
                {"key": "members", "end": "gone", "array": true}
            ]
        })))
        .unwrap();
    cached.adapter().insert_raw(doc(json!({"$id": "m1"}))).unwrap();

    let team = cached.get_document("", "t1").await.unwrap().unwrap();
    assert_eq!(team.into_value(), json!({"$id": "t1", "members": [{"$id": "m1"}]}));
}

// ============================================================================
// find / count
// ============================================================================

#[tokio::test]
async fn test_find_uses_one_multi_get_per_level() {
    let cached = counting();
    for (id, name) in [("t1", "Acme"), ("t2", "Beta"), ("t3", "Gamma")] {
        cached
            .create_document("teams", team(id, name, &format!("u-{}", id)), &[])
            .await
            .unwrap();
    }
    let options = FindOptions::new().filter("$collection=teams");

    let cold = cached.find(&options).await.unwrap();
    assert_eq!(cold.len(), 3);

    cached.backend().reset();
    let warm = cached.find(&options).await.unwrap();
    assert_eq!(cold, warm);

    // Roots, then owners: one multi-get each, no single-key reads.
    assert_eq!(cached.backend().mgets(), 2);
    assert_eq!(cached.backend().gets(), 0);
    assert_eq!(cached.backend().sets(), 0);
}

#[tokio::test]
async fn test_find_preserves_query_order() {
    let cached = counting();
    for (id, name) in [("a", "Beta"), ("b", "Gamma"), ("c", "Alpha")] {
        cached
            .create_document("teams", doc(json!({"$id": id, "name": name})), &[])
            .await
            .unwrap();
    }
    // Warm only one so hits and misses interleave
    cached.get_document("teams", "b").await.unwrap();

    let options = FindOptions::new().order_by("name", OrderType::Desc);
    let names: Vec<Value> = cached
        .find(&options)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|d| d.get("name").cloned())
        .collect();

    assert_eq!(names, vec![json!("Gamma"), json!("Beta"), json!("Alpha")]);
}

#[tokio::test]
async fn test_find_drops_vanished_documents() {
    init_logger();
    let adapter = VanishingAdapter {
        inner: InMemoryAdapter::new(),
    };
    let cached = CachedAdapter::new(adapter, InMemoryBackend::new());
    for id in ["a", "b", "c"] {
        cached
            .create_document("teams", doc(json!({"$id": id})), &[])
            .await
            .unwrap();
    }

    let ids: Vec<String> = cached
        .find(&FindOptions::new())
        .await
        .unwrap()
        .iter()
        .filter_map(|d| d.id().map(str::to_string))
        .collect();

    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_count_passes_through() {
    let cached = counting();
    for id in ["a", "b", "c"] {
        cached
            .create_document("teams", doc(json!({"$id": id})), &[])
            .await
            .unwrap();
    }

    let options = FindOptions::new().limit(1);
    assert_eq!(cached.count(&options).await.unwrap(), 3);
    assert_eq!(cached.find_ids(&options).await.unwrap(), vec!["a"]);
    assert_eq!(cached.backend().mgets(), 0);
    assert_eq!(cached.backend().gets(), 0);
}

// ============================================================================
// Namespaces
// ============================================================================

#[tokio::test]
async fn test_namespace_isolation() {
    let mut cached = counting();
    cached.create_namespace("p1").await.unwrap();
    cached.create_namespace("p2").await.unwrap();

    cached.set_namespace("p1").unwrap();
    cached
        .create_document("teams", doc(json!({"$id": "t1", "name": "One"})), &[])
        .await
        .unwrap();
    cached.get_document("teams", "t1").await.unwrap();

    cached.set_namespace("p2").unwrap();
    assert!(cached.get_document("teams", "t1").await.unwrap().is_none());
    cached
        .create_document("teams", doc(json!({"$id": "t1", "name": "Two"})), &[])
        .await
        .unwrap();
    let two = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(two.get("name"), Some(&json!("Two")));

    cached.set_namespace("p1").unwrap();
    let one = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(one.get("name"), Some(&json!("One")));

    assert_eq!(
        cached.backend().inner.keys(),
        vec!["p1:document-t1", "p2:document-t1"]
    );
}

#[tokio::test]
async fn test_invalid_namespace_keeps_previous() {
    let mut cached = counting();
    cached.create_namespace("p1").await.unwrap();
    cached.set_namespace("p1").unwrap();

    for bad in ["", "a:b"] {
        assert!(matches!(
            cached.set_namespace(bad),
            Err(Error::InvalidNamespace(_))
        ));
    }
    assert_eq!(cached.namespace().as_str(), "p1");
    assert_eq!(cached.key("x"), "p1:document-x");
}

// ============================================================================
// Errors and degraded cache
// ============================================================================

#[tokio::test]
async fn test_reads_degrade_when_cache_fails() {
    init_logger();
    let adapter = InMemoryAdapter::new();
    adapter
        .create_document("teams", team("t1", "Acme", "u1"), &[])
        .await
        .unwrap();

    let metrics = Arc::new(CountingMetrics::default());
    let cached =
        CachedAdapter::new(adapter, FailingBackend).with_metrics(metrics.clone());

    let t1 = cached.get_document("teams", "t1").await.unwrap().unwrap();
    assert_eq!(t1.get("owner").unwrap()["name"], json!("user u1"));

    let found = cached
        .find(&FindOptions::new().filter("$collection=teams"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], t1);

    assert!(metrics.errors.load(Ordering::SeqCst) > 0);
    assert_eq!(metrics.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalidation_failure_is_reported() {
    init_logger();
    let cached = CachedAdapter::new(InMemoryAdapter::new(), FailingBackend);

    let result = cached
        .create_document("teams", doc(json!({"$id": "t1"})), &[])
        .await;
    assert!(matches!(result, Err(Error::BackendError(_))));

    // The write itself went through.
    assert!(cached
        .adapter()
        .get_document("teams", "t1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_duplicate_passes_through() {
    let cached = counting();
    let unique = vec!["name:acme".to_string()];
    cached
        .create_document("teams", doc(json!({"name": "Acme"})), &unique)
        .await
        .unwrap();

    let result = cached
        .create_document("teams", doc(json!({"name": "Acme"})), &unique)
        .await;
    assert!(matches!(result, Err(Error::Duplicate(_))));
}

#[tokio::test]
async fn test_persistence_error_passes_through() {
    let cached = counting();
    let result = cached
        .update_document("teams", "missing", doc(json!({"name": "x"})))
        .await;
    assert!(matches!(result, Err(Error::PersistenceError(_))));
    assert_eq!(cached.backend().deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_metrics_hits_and_misses() {
    init_logger();
    let metrics = Arc::new(CountingMetrics::default());
    let cached = CachedAdapter::new(InMemoryAdapter::new(), InMemoryBackend::new())
        .with_metrics(metrics.clone());
    cached
        .create_document("teams", doc(json!({"$id": "t1"})), &[])
        .await
        .unwrap();

    cached.get_document("teams", "t1").await.unwrap();
    cached.get_document("teams", "t1").await.unwrap();

    assert_eq!(metrics.misses.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_readers_agree() {
    let cached = counting();
    cached
        .create_document("teams", team("t1", "Acme", "u1"), &[])
        .await
        .unwrap();
    let expected = cached.get_document("teams", "t1").await.unwrap().unwrap();

    let reads = (0..8).map(|_| cached.get_document("teams", "t1"));
    for result in futures::future::join_all(reads).await {
        assert_eq!(result.unwrap().unwrap(), expected);
    }
}
