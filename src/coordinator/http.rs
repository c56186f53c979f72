//! HTTP command and admin API of the config server
//!
//! Command responses carry `ok: 1` on success. Failures are returned as
//! `{ok: 0, code, errmsg}` with an HTTP status derived from the error.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::{ConfigCatalog, ShardCacheRegistry, ShardClient};
use crate::chunk::{CommitChunkMigrationRequest, KeyPattern, NamespaceString, ShardId};
use crate::common::{Error, ParseError};
use crate::coordinator::create::ShardCollectionRequest;
use crate::coordinator::document::{CoordinatorId, CoordinatorKind};
use crate::coordinator::engine::CurrentOpMode;
use crate::coordinator::refine::RefineCollectionShardKeyRequest;
use crate::coordinator::service::{DdlCoordinatorService, DdlRequest};

#[derive(Clone)]
pub struct ConfigState {
    pub node_id: String,
    pub catalog: Arc<ConfigCatalog>,
    pub shards: Arc<ShardCacheRegistry>,
    pub service: Arc<DdlCoordinatorService>,
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError(Error::Parse(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.to_http_status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(json!({
                "ok": 0,
                "code": self.0.code_name(),
                "errmsg": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError(Error::Parse(ParseError::UnsupportedFormat(e.to_string()))))
}

fn parse_ns(ns: &str) -> Result<NamespaceString, ApiError> {
    Ok(NamespaceString::parse(ns)?)
}

/// Creates the HTTP router with all command and admin endpoints.
pub fn create_router(state: ConfigState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health))
        // Commands
        .route(
            "/commands/commitChunkMigration",
            axum::routing::post(commit_chunk_migration),
        )
        .route("/commands/shardCollection", axum::routing::post(shard_collection))
        .route(
            "/commands/refineCollectionShardKey",
            axum::routing::post(refine_collection_shard_key),
        )
        .route("/commands/createIndexes", axum::routing::post(create_index))
        .route("/commands/splitChunk", axum::routing::post(split_chunk))
        // Admin
        .route("/admin/currentOp", axum::routing::get(current_op))
        .route(
            "/admin/coordinators/:ns/:kind/abort",
            axum::routing::post(abort_coordinator),
        )
        .route("/admin/collections/:ns", axum::routing::get(collection_info))
        .with_state(state)
}

async fn health(State(state): State<ConfigState>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "healthy",
        "node_id": state.node_id,
        "shards": state.shards.shard_ids(),
        "coordinators": state.service.current_ops(CurrentOpMode::ExcludeIdle).len(),
        "version": crate::VERSION,
        "build": crate::BUILD_INFO,
    }))
}

/// `_configsvrCommitChunkMigration`, sent by the donor shard
async fn commit_chunk_migration(State(state): State<ConfigState>, Json(body): Json<Value>) -> ApiResult {
    let command = body.as_object().ok_or_else(|| {
        ParseError::UnsupportedFormat("command must be a document".into())
    })?;
    let request = CommitChunkMigrationRequest::parse(command)?;
    let response = state.catalog.commit_chunk_migration(&request).await?;

    let mut out = json!({
        "ok": 1,
        "collectionVersion": response.collection_version.to_value(),
        "migratedChunkVersion": response.migrated_chunk_version.to_value(),
    });
    if let Some(control) = response.control_chunk_version {
        out["controlChunkVersion"] = control.to_value();
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShardCollectionBody {
    ns: String,
    key: Value,
    #[serde(default)]
    unique: bool,
    primary_shard: Option<String>,
    max_time_ms: Option<u64>,
}

async fn shard_collection(State(state): State<ConfigState>, Json(body): Json<Value>) -> ApiResult {
    let body: ShardCollectionBody = decode(body)?;
    let primary_shard = match body.primary_shard {
        Some(shard) => ShardId::new(shard)?,
        None => state
            .shards
            .shard_ids()
            .into_iter()
            .next()
            .ok_or_else(|| Error::ShardNotFound("no shards configured".into()))?,
    };
    let request = ShardCollectionRequest {
        ns: parse_ns(&body.ns)?,
        key: KeyPattern::from_value(&body.key)?,
        unique: body.unique,
        primary_shard,
    };

    state
        .service
        .run(DdlRequest::ShardCollection(request), body.max_time_ms.map(Duration::from_millis))
        .await?;

    let coll = state.catalog.sharded_collection(&parse_ns(&body.ns)?)?;
    Ok(Json(json!({
        "ok": 1,
        "collectionsharded": coll.ns,
        "collectionUUID": coll.uuid,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefineBody {
    ns: String,
    key: Value,
    #[serde(rename = "collectionUUID")]
    collection_uuid: Option<Uuid>,
    max_time_ms: Option<u64>,
}

async fn refine_collection_shard_key(
    State(state): State<ConfigState>,
    Json(body): Json<Value>,
) -> ApiResult {
    let body: RefineBody = decode(body)?;
    let request = RefineCollectionShardKeyRequest {
        ns: parse_ns(&body.ns)?,
        key: KeyPattern::from_value(&body.key)?,
        collection_uuid: body.collection_uuid,
    };

    state
        .service
        .run(
            DdlRequest::RefineCollectionShardKey(request),
            body.max_time_ms.map(Duration::from_millis),
        )
        .await?;
    Ok(Json(json!({ "ok": 1 })))
}

#[derive(Debug, Deserialize)]
struct IndexBody {
    ns: String,
    key: Value,
}

async fn create_index(State(state): State<ConfigState>, Json(body): Json<Value>) -> ApiResult {
    let body: IndexBody = decode(body)?;
    let coll = state
        .catalog
        .add_index(&parse_ns(&body.ns)?, KeyPattern::from_value(&body.key)?)
        .await?;
    Ok(Json(json!({ "ok": 1, "indexes": coll.indexes })))
}

#[derive(Debug, Deserialize)]
struct SplitBody {
    ns: String,
    middle: Value,
}

async fn split_chunk(State(state): State<ConfigState>, Json(body): Json<Value>) -> ApiResult {
    let body: SplitBody = decode(body)?;
    let middle = body
        .middle
        .as_object()
        .cloned()
        .ok_or_else(|| ParseError::TypeMismatch {
            field: "middle".into(),
            expected: "object",
        })?;
    let version = state
        .catalog
        .split_chunk(&parse_ns(&body.ns)?, middle)
        .await?;
    Ok(Json(json!({ "ok": 1, "collectionVersion": version.to_value() })))
}

#[derive(Debug, Deserialize)]
struct CurrentOpQuery {
    #[serde(default)]
    idle: bool,
}

async fn current_op(State(state): State<ConfigState>, Query(query): Query<CurrentOpQuery>) -> impl IntoResponse {
    let mode = if query.idle {
        CurrentOpMode::IncludeIdle
    } else {
        CurrentOpMode::ExcludeIdle
    };
    axum::Json(json!({
        "ok": 1,
        "inprog": state.service.current_ops(mode),
    }))
}

#[derive(Debug, Deserialize)]
struct AbortQuery {
    reason: Option<String>,
}

async fn abort_coordinator(
    State(state): State<ConfigState>,
    Path((ns, kind)): Path<(String, String)>,
    Query(query): Query<AbortQuery>,
) -> ApiResult {
    let id = CoordinatorId::new(parse_ns(&ns)?, CoordinatorKind::parse(&kind)?);
    let reason = query.reason.unwrap_or_else(|| "aborted by administrator".into());
    state.service.abort(&id, &reason)?;
    Ok(Json(json!({ "ok": 1 })))
}

async fn collection_info(State(state): State<ConfigState>, Path(ns): Path<String>) -> ApiResult {
    let ns = parse_ns(&ns)?;
    let coll = state.catalog.sharded_collection(&ns)?;
    let chunks = state.catalog.chunks(&ns)?;
    let version = state.catalog.collection_version(&ns)?;

    let mut shards = serde_json::Map::new();
    for shard in state.catalog.shards_owning(&ns)? {
        let cached = state.shards.cached(&shard, &ns)?;
        shards.insert(shard.to_string(), serde_json::to_value(cached).map_err(Error::from)?);
    }

    Ok(Json(json!({
        "ok": 1,
        "collection": coll,
        "collectionVersion": version.to_value(),
        "chunks": chunks,
        "shardCaches": shards,
    })))
}
