//! Basic usage example of the document cache.

use doc_cache::{
    backend::InMemoryBackend, error::Result, observability::LogMetrics, CacheConfig,
    CachedAdapter, Document, DocumentAdapter, FindOptions, InMemoryAdapter,
};
use serde_json::json;
use std::sync::Arc;

fn team(id: &str, name: &str, owner: &str) -> Result<Document> {
    Document::from_value(json!({
        "$id": id,
        "name": name,
        "owner": {"$id": owner, "$collection": "users", "name": format!("Owner of {}", name)},
        "memberships": [
            {"$collection": "memberships", "role": "admin"},
            {"$collection": "memberships", "role": "member"}
        ]
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== doc-cache - Basic Example ===\n");

    // 1. Wrap the persistent adapter
    println!("1. Wrapping the in-memory adapter with an in-memory cache...");
    let mut cached = CachedAdapter::new(InMemoryAdapter::new(), InMemoryBackend::new())
        .with_config(CacheConfig::from_env()?)
        .with_metrics(Arc::new(LogMetrics));

    cached.create_namespace("project_1").await?;
    cached.set_namespace("project_1")?;
    println!("   ✓ Namespace: {}\n", cached.namespace());

    // 2. Create documents; nested documents become relations
    println!("2. Creating teams:");
    for (id, name, owner) in [("acme", "Acme", "ann"), ("globex", "Globex", "bob")] {
        let written = cached.create_document("teams", team(id, name, owner)?, &[]).await?;
        println!("   ✓ Created {}", written.id().unwrap_or_default());
    }
    println!();

    // 3. First read: cache miss, loaded from the adapter and cached raw
    println!("3. First read of acme (cold):");
    let acme = cached.get_document("teams", "acme").await?;
    if let Some(team) = &acme {
        println!("   ✓ {}\n", serde_json::to_string_pretty(team).unwrap_or_default());
    }
    println!("   Cache keys: {:?}\n", cached.backend().keys());

    // 4. Second read: served from the cache
    println!("4. Second read of acme (warm):");
    let again = cached.get_document("teams", "acme").await?;
    println!("   ✓ Identical to cold read: {}\n", again == acme);

    // 5. Update: the adapter is written, the cache entry expired
    println!("5. Renaming acme:");
    let mut renamed = again.unwrap_or_default();
    renamed.set("name", json!("Acme Corporation"));
    cached.update_document("teams", "acme", renamed).await?;
    let acme = cached.get_document("teams", "acme").await?;
    if let Some(team) = &acme {
        println!("   ✓ Name after update: {}\n", team.get("name").unwrap_or(&json!(null)));
    }

    // 6. Queries pass through to the adapter; documents come from the cache
    println!("6. Listing teams:");
    let options = FindOptions::new().filter("$collection=teams");
    for team in cached.find(&options).await? {
        println!(
            "   - {} ({} memberships)",
            team.get("name").unwrap_or(&json!(null)),
            team.get("memberships")
                .and_then(|m| m.as_array())
                .map_or(0, Vec::len)
        );
    }
    println!("   Total: {}\n", cached.count(&options).await?);

    // 7. Delete
    println!("7. Deleting globex:");
    let deleted = cached.delete_document("teams", "globex").await?;
    println!("   ✓ Deleted: {}", deleted);
    println!(
        "   ✓ Read after delete: {:?}\n",
        cached.get_document("teams", "globex").await?
    );

    println!("=== Example Complete ===\n");
    Ok(())
}
