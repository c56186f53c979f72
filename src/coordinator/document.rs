//! Coordinator identity and the durable state document
//!
//! ```text
//! {
//!   _id: { ns: "db.coll", kind: "refineCollectionShardKey" },
//!   phase: "commitMetadata",          // last completed phase
//!   status: "active" | "failed",
//!   abortReason: { code, errmsg },    // failed only
//!   createdAt: <RFC 3339>,
//!   ...operation parameters
//! }
//! ```
//!
//! The document's key is the lock for `(namespace, kind)`: inserting it
//! acquires ownership, deleting it releases ownership.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chunk::NamespaceString;
use crate::common::{Error, ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorKind {
    RefineCollectionShardKey,
    CreateCollection,
}

impl CoordinatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CoordinatorKind::RefineCollectionShardKey => "refineCollectionShardKey",
            CoordinatorKind::CreateCollection => "createCollection",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "refineCollectionShardKey" => Ok(CoordinatorKind::RefineCollectionShardKey),
            "createCollection" => Ok(CoordinatorKind::CreateCollection),
            other => Err(Error::InvalidOptions(format!(
                "unknown coordinator kind '{}'",
                other
            ))),
        }
    }

    /// Name reported by currentOp
    pub fn description(self) -> &'static str {
        match self {
            CoordinatorKind::RefineCollectionShardKey => "RefineCollectionShardKeyCoordinator",
            CoordinatorKind::CreateCollection => "CreateCollectionCoordinator",
        }
    }
}

impl fmt::Display for CoordinatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinatorId {
    pub ns: NamespaceString,
    pub kind: CoordinatorKind,
}

impl CoordinatorId {
    pub fn new(ns: NamespaceString, kind: CoordinatorKind) -> Self {
        Self { ns, kind }
    }

    /// Store key of the state document
    pub fn key(&self) -> String {
        format!("{}|{}", self.ns, self.kind)
    }
}

impl fmt::Display for CoordinatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.ns)
    }
}

/// Ordered phases of one coordinator kind. The first variant is the
/// not-started marker and is never executed.
pub trait CoordinatorPhase:
    Copy + Ord + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const NOT_STARTED: Self;

    fn next(self) -> Option<Self>;

    fn as_str(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatorStatus {
    #[default]
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortReason {
    pub code: String,
    pub errmsg: String,
}

impl From<&Error> for AbortReason {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code_name().to_string(),
            errmsg: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument<P, T> {
    #[serde(rename = "_id")]
    pub id: CoordinatorId,
    pub phase: P,
    #[serde(default)]
    pub status: CoordinatorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub params: T,
}

impl<P: CoordinatorPhase, T: Serialize + DeserializeOwned> StateDocument<P, T> {
    pub fn new(id: CoordinatorId, params: T) -> Self {
        Self {
            id,
            phase: P::NOT_STARTED,
            status: CoordinatorStatus::Active,
            abort_reason: None,
            created_at: Utc::now(),
            params,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::MetadataCorrupted(e.to_string()))
    }

    pub fn is_failed(&self) -> bool {
        self.status == CoordinatorStatus::Failed
    }
}

/// Read `_id.kind` of a raw state document without decoding the rest
pub fn peek_kind(raw: &serde_json::Value) -> Result<CoordinatorKind> {
    let kind = raw
        .get("_id")
        .and_then(|id| id.get("kind"))
        .and_then(|k| k.as_str())
        .ok_or_else(|| Error::Parse(ParseError::MissingField("_id.kind".into())))?;
    CoordinatorKind::parse(kind)
}

pub fn peek_status(raw: &serde_json::Value) -> CoordinatorStatus {
    raw.get("status")
        .cloned()
        .and_then(|s| serde_json::from_value(s).ok())
        .unwrap_or_default()
}
