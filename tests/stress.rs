//! Many namespaces sharded, refined and migrated concurrently

use serde_json::json;
use shardmeta::catalog::{ConfigCatalog, DocumentStore, MemoryStore, ShardCacheRegistry, CF_COORDINATORS};
use shardmeta::chunk::{
    CommitChunkMigrationRequest, KeyPattern, LogicalClock, MigratedChunk, NamespaceString, ShardId,
};
use shardmeta::common::Document;
use shardmeta::coordinator::create::ShardCollectionRequest;
use shardmeta::coordinator::refine::RefineCollectionShardKeyRequest;
use shardmeta::coordinator::{DdlCoordinatorService, DdlRequest, EngineSettings};
use std::sync::Arc;
use std::time::Duration;

const NAMESPACES: usize = 64;
const JOINERS: usize = 4;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[cfg_attr(not(feature = "heavy-tests"), ignore)]
async fn test_concurrent_ddl_across_namespaces() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let catalog = Arc::new(ConfigCatalog::new(store.clone(), Arc::new(LogicalClock::new())));
    let shard_ids: Vec<_> = ["s0", "s1", "s2"]
        .iter()
        .map(|s| ShardId::new(*s).unwrap())
        .collect();
    let registry = Arc::new(ShardCacheRegistry::new(
        shard_ids.clone(),
        catalog.clone(),
        store.clone(),
    ));
    let service = Arc::new(DdlCoordinatorService::new(
        store.clone(),
        catalog.clone(),
        registry.clone(),
        EngineSettings {
            max_phase_attempts: 3,
            retry_initial_delay: Duration::from_millis(1),
        },
    ));

    let mut tasks = Vec::new();
    for i in 0..NAMESPACES {
        let service = service.clone();
        let catalog = catalog.clone();
        let primary = shard_ids[i % shard_ids.len()].clone();
        let recipient = shard_ids[(i + 1) % shard_ids.len()].clone();

        tasks.push(tokio::spawn(async move {
            let ns = NamespaceString::parse(&format!("load.c{}", i)).unwrap();
            let key = KeyPattern::from_value(&json!({"k": 1})).unwrap();
            service
                .run(
                    DdlRequest::ShardCollection(ShardCollectionRequest {
                        ns: ns.clone(),
                        key,
                        unique: false,
                        primary_shard: primary.clone(),
                    }),
                    None,
                )
                .await
                .unwrap();

            let mut middle = Document::new();
            middle.insert("k".into(), json!(0));
            catalog.split_chunk(&ns, middle).await.unwrap();

            let chunk = catalog.chunks(&ns).unwrap().remove(1);
            let version = catalog.collection_version(&ns).unwrap();
            let mut command = Document::new();
            CommitChunkMigrationRequest::append_as_command(
                &mut command,
                &ns,
                &primary,
                &recipient,
                &MigratedChunk::new(chunk.range, chunk.lastmod),
                &version,
                None,
            );
            catalog
                .commit_chunk_migration(&CommitChunkMigrationRequest::parse(&command).unwrap())
                .await
                .unwrap();

            let refined = KeyPattern::from_value(&json!({"k": 1, "t": 1})).unwrap();
            catalog.add_index(&ns, refined.clone()).await.unwrap();
            let refine = DdlRequest::RefineCollectionShardKey(RefineCollectionShardKeyRequest {
                ns: ns.clone(),
                key: refined,
                collection_uuid: None,
            });
            let joins: Vec<_> = (0..JOINERS)
                .map(|_| {
                    let service = service.clone();
                    let refine = refine.clone();
                    tokio::spawn(async move { service.run(refine, None).await })
                })
                .collect();
            for join in joins {
                join.await.unwrap().unwrap();
            }
            ns
        }));
    }

    for task in tasks {
        let ns = task.await.unwrap();
        let coll = catalog.sharded_collection(&ns).unwrap();
        assert_eq!(coll.key.len(), 2);
        let chunks = catalog.chunks(&ns).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.lastmod.epoch == coll.epoch));
    }
    assert!(store.list(CF_COORDINATORS).unwrap().is_empty());
}
