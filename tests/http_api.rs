//! Command and admin endpoints, exercised through the router

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shardmeta::chunk::{ChunkVersion, NamespaceString};
use shardmeta::common::StorageBackend;
use shardmeta::coordinator::http::create_router;
use shardmeta::{Config, ConfigServer};
use tokio_test::assert_ok;
use tower::ServiceExt;

fn router() -> Router {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.shards = vec!["s0".into(), "s1".into()];
    config.coordinator.retry_initial_delay_ms = 1;
    let state = assert_ok!(ConfigServer::build_state(&config));
    create_router(state)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn shard(router: &Router, ns: &str) {
    let (status, body) = call(
        router,
        "POST",
        "/commands/shardCollection",
        Some(json!({"ns": ns, "key": {"a": 1}, "primaryShard": "s0"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ok"], 1);
}

#[tokio::test]
async fn test_health() {
    let router = router();
    let (status, body) = call(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["shards"], json!(["s0", "s1"]));
    assert_eq!(body["version"], shardmeta::VERSION);
    assert_eq!(body["build"], shardmeta::BUILD_INFO);
}

#[tokio::test]
async fn test_shard_then_refine() {
    let router = router();
    shard(&router, "app.users").await;

    let (status, _) = call(
        &router,
        "POST",
        "/commands/createIndexes",
        Some(json!({"ns": "app.users", "key": {"a": 1, "b": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &router,
        "POST",
        "/commands/refineCollectionShardKey",
        Some(json!({"ns": "app.users", "key": {"a": 1, "b": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, info) = call(&router, "GET", "/admin/collections/app.users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["collection"]["key"], json!({"a": 1, "b": 1}));
    assert_eq!(info["chunks"].as_array().unwrap().len(), 1);
    assert_eq!(
        info["shardCaches"]["s0"]["epoch"],
        info["collection"]["epoch"]
    );
}

#[tokio::test]
async fn test_refine_without_supporting_index_is_rejected() {
    let router = router();
    shard(&router, "app.orders").await;

    let (status, body) = call(
        &router,
        "POST",
        "/commands/refineCollectionShardKey",
        Some(json!({"ns": "app.orders", "key": {"a": 1, "z": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], 0);
    assert_eq!(body["code"], "InvalidOptions");

    let (_, ops) = call(&router, "GET", "/admin/currentOp?idle=true", None).await;
    assert_eq!(ops["inprog"], json!([]));
}

#[tokio::test]
async fn test_commit_chunk_migration() {
    let router = router();
    shard(&router, "app.items").await;
    let (_, split) = call(
        &router,
        "POST",
        "/commands/splitChunk",
        Some(json!({"ns": "app.items", "middle": {"a": 100}})),
    )
    .await;
    assert_eq!(split["ok"], 1);

    let (_, info) = call(&router, "GET", "/admin/collections/app.items", None).await;
    let chunk = &info["chunks"][1];
    let command = json!({
        "_configsvrCommitChunkMigration": "app.items",
        "fromShard": "s0",
        "toShard": "s1",
        "migratedChunk": {
            "min": chunk["range"]["min"],
            "max": chunk["range"]["max"],
            "lastmod": chunk["lastmod"],
        },
        "fromShardCollectionVersion": info["collectionVersion"],
    });

    let (status, reply) = call(
        &router,
        "POST",
        "/commands/commitChunkMigration",
        Some(command.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", reply);
    let migrated = ChunkVersion::parse(reply.get("migratedChunkVersion")).unwrap();
    let before = ChunkVersion::parse(info.get("collectionVersion")).unwrap();
    assert_eq!(migrated.major, before.major + 1);
    assert!(reply.get("controlChunkVersion").is_some());

    // Replaying the same command from a donor that never saw the reply
    // returns the versions already installed
    let (status, replay) = call(&router, "POST", "/commands/commitChunkMigration", Some(command)).await;
    assert_eq!(status, StatusCode::OK, "{}", replay);
    assert_eq!(replay["migratedChunkVersion"], reply["migratedChunkVersion"]);

    let ns = NamespaceString::parse("app.items").unwrap();
    let (_, info) = call(&router, "GET", &format!("/admin/collections/{}", ns), None).await;
    assert_eq!(info["chunks"][1]["shard"], "s1");
}

#[tokio::test]
async fn test_malformed_commit_reports_code() {
    let router = router();
    let (status, body) = call(
        &router,
        "POST",
        "/commands/commitChunkMigration",
        Some(json!({"_configsvrCommitChunkMigration": "app.items", "toShard": "s1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], 0);
    assert_eq!(body["code"], "NoSuchKey");
}

#[tokio::test]
async fn test_abort_unknown_coordinator_is_not_found() {
    let router = router();
    let (status, body) = call(
        &router,
        "POST",
        "/admin/coordinators/app.users/refineCollectionShardKey/abort",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NoSuchKey");
}

#[tokio::test]
async fn test_unknown_collection() {
    let router = router();
    let (status, body) = call(&router, "GET", "/admin/collections/app.missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NamespaceNotSharded");
}
