//! Error types for shardmeta

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures produced while decoding a structured command or metadata record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' has the wrong type, expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },

    #[error("Malformed chunk range: {0}")]
    MalformedRange(String),

    #[error("Invalid chunk version: {0}")]
    InvalidVersion(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    // === I/O & Storage Errors ===
    #[error("I/O error: {0}")]
    Io(String),

    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Metadata corrupted: {0}")]
    MetadataCorrupted(String),

    // === Parse Errors ===
    #[error(transparent)]
    Parse(#[from] ParseError),

    // === Staleness Errors ===
    #[error("Stale epoch for {ns}: expected {expected}, found {actual}")]
    StaleEpoch {
        ns: String,
        expected: String,
        actual: String,
    },

    #[error("Stale config for {ns}: received {received}, wanted {wanted}")]
    StaleConfig {
        ns: String,
        received: String,
        wanted: String,
    },

    // === Catalog Errors ===
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Namespace not sharded: {0}")]
    NamespaceNotSharded(String),

    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Incompatible sharding metadata: {0}")]
    IncompatibleShardingMetadata(String),

    #[error("Collection UUID mismatch for {ns}: expected {expected}, actual {actual}")]
    CollectionUuidMismatch {
        ns: String,
        expected: String,
        actual: String,
    },

    #[error("Shard not found: {0}")]
    ShardNotFound(String),

    // === Coordinator Errors ===
    #[error("Conflicting operation in progress: {0}")]
    ConflictingOperationInProgress(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Operation {id} failed: {reason} (state document retained)")]
    CoordinatorFailed { id: String, reason: String },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    #[error("No such coordinator: {0}")]
    NoSuchCoordinator(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::RocksDb(_) | Error::Timeout(_) | Error::Http(_)
        )
    }

    /// Should the caller refresh its routing metadata and retry the whole operation?
    pub fn is_stale(&self) -> bool {
        matches!(self, Error::StaleEpoch { .. } | Error::StaleConfig { .. })
    }

    /// Stable code name reported in command responses
    pub fn code_name(&self) -> &'static str {
        match self {
            Error::Io(_) | Error::RocksDb(_) => "StorageError",
            Error::Serialization(_) | Error::MetadataCorrupted(_) => "FailedToParse",
            Error::Parse(ParseError::MissingField(_)) => "NoSuchKey",
            Error::Parse(ParseError::TypeMismatch { .. }) => "TypeMismatch",
            Error::Parse(ParseError::MalformedRange(_)) => "BadValue",
            Error::Parse(ParseError::InvalidVersion(_)) => "InvalidChunkVersion",
            Error::Parse(ParseError::UnsupportedFormat(_)) => "UnsupportedFormat",
            Error::Parse(ParseError::InvalidNamespace(_)) => "InvalidNamespace",
            Error::StaleEpoch { .. } => "StaleEpoch",
            Error::StaleConfig { .. } => "StaleConfig",
            Error::NamespaceNotFound(_) => "NamespaceNotFound",
            Error::NamespaceNotSharded(_) => "NamespaceNotSharded",
            Error::AlreadyInitialized(_) => "AlreadyInitialized",
            Error::IncompatibleShardingMetadata(_) => "IncompatibleShardingMetadata",
            Error::CollectionUuidMismatch { .. } => "CollectionUUIDMismatch",
            Error::ShardNotFound(_) => "ShardNotFound",
            Error::ConflictingOperationInProgress(_) => "ConflictingOperationInProgress",
            Error::InvalidOptions(_) => "InvalidOptions",
            Error::CoordinatorFailed { .. } => "OperationFailed",
            Error::Cancelled(_) => "CallbackCanceled",
            Error::Interrupted(_) => "Interrupted",
            Error::NoSuchCoordinator(_) => "NoSuchKey",
            Error::InvalidConfig(_) => "BadValue",
            Error::Http(_) => "HostUnreachable",
            Error::Internal(_) => "InternalError",
            Error::Timeout(_) => "ExceededTimeLimit",
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::Parse(_) | Error::InvalidOptions(_) | Error::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NamespaceNotFound(_)
            | Error::NamespaceNotSharded(_)
            | Error::ShardNotFound(_)
            | Error::NoSuchCoordinator(_) => StatusCode::NOT_FOUND,
            Error::StaleEpoch { .. }
            | Error::StaleConfig { .. }
            | Error::ConflictingOperationInProgress(_)
            | Error::AlreadyInitialized(_)
            | Error::IncompatibleShardingMetadata(_)
            | Error::CollectionUuidMismatch { .. } => StatusCode::CONFLICT,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::Interrupted(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Io("disk".into()).is_retryable());
        assert!(Error::Timeout("phase".into()).is_retryable());
        assert!(!Error::ConflictingOperationInProgress("x".into()).is_retryable());
        assert!(!Error::Parse(ParseError::MissingField("fromShard".into())).is_retryable());
    }

    #[test]
    fn test_stale_errors() {
        let err = Error::StaleConfig {
            ns: "db.coll".into(),
            received: "1|0".into(),
            wanted: "2|0".into(),
        };
        assert!(err.is_stale());
        assert_eq!(err.code_name(), "StaleConfig");
        assert_eq!(err.to_http_status(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::UnsupportedFormat("toShard".into()).into();
        assert_eq!(err.code_name(), "UnsupportedFormat");
        assert_eq!(err.to_http_status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
