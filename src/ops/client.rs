//! HTTP client for the config server command and admin API

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::common::{Document, Error, Result};

/// Successful command response body (`ok: 1`)
pub type CommandReply = Value;

pub struct ConfigClient {
    base_url: String,
    http: reqwest::Client,
}

impl ConfigClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn `{ok: 0, code, errmsg}` bodies into errors
    async fn reply(response: reqwest::Response) -> Result<CommandReply> {
        let status = response.status();
        let body: Value = response.json().await?;
        if status.is_success() && body.get("ok").and_then(Value::as_i64) == Some(1) {
            return Ok(body);
        }

        let code = body.get("code").and_then(Value::as_str).unwrap_or("Unknown");
        let errmsg = body
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("no error message");
        Err(Error::Http(format!("{} ({}): {}", code, status, errmsg)))
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<CommandReply> {
        tracing::debug!("POST {}", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::reply(response).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<CommandReply> {
        tracing::debug!("GET {}", path);
        let response = self.http.get(self.url(path)).query(query).send().await?;
        Self::reply(response).await
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn shard_collection(
        &self,
        ns: &str,
        key: &Value,
        unique: bool,
        primary_shard: Option<&str>,
    ) -> Result<CommandReply> {
        let mut body = json!({ "ns": ns, "key": key, "unique": unique });
        if let Some(shard) = primary_shard {
            body["primaryShard"] = json!(shard);
        }
        self.post("/commands/shardCollection", &body).await
    }

    pub async fn refine_collection_shard_key(
        &self,
        ns: &str,
        key: &Value,
        collection_uuid: Option<uuid::Uuid>,
        max_time: Option<Duration>,
    ) -> Result<CommandReply> {
        let mut body = json!({ "ns": ns, "key": key });
        if let Some(uuid) = collection_uuid {
            body["collectionUUID"] = json!(uuid);
        }
        if let Some(limit) = max_time {
            body["maxTimeMs"] = json!(limit.as_millis() as u64);
        }
        self.post("/commands/refineCollectionShardKey", &body).await
    }

    pub async fn create_index(&self, ns: &str, key: &Value) -> Result<CommandReply> {
        self.post("/commands/createIndexes", &json!({ "ns": ns, "key": key }))
            .await
    }

    pub async fn split_chunk(&self, ns: &str, middle: &Value) -> Result<CommandReply> {
        self.post("/commands/splitChunk", &json!({ "ns": ns, "middle": middle }))
            .await
    }

    /// Send an encoded `_configsvrCommitChunkMigration` command
    pub async fn commit_chunk_migration(&self, command: &Document) -> Result<CommandReply> {
        self.post("/commands/commitChunkMigration", command).await
    }

    pub async fn current_op(&self, include_idle: bool) -> Result<CommandReply> {
        self.get("/admin/currentOp", &[("idle", include_idle.to_string())])
            .await
    }

    pub async fn abort(&self, ns: &str, kind: &str, reason: &str) -> Result<CommandReply> {
        let path = format!("/admin/coordinators/{}/{}/abort", ns, kind);
        let response = self
            .http
            .post(self.url(&path))
            .query(&[("reason", reason)])
            .send()
            .await?;
        Self::reply(response).await
    }

    pub async fn collection(&self, ns: &str) -> Result<CommandReply> {
        self.get(&format!("/admin/collections/{}", ns), &[]).await
    }
}
