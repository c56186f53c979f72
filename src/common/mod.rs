//! Common utilities and types shared across shardmeta

pub mod config;
pub mod document;
pub mod error;
pub mod utils;

pub use config::{Config, CoordinatorConfig, StorageBackend, StorageConfig};
pub use document::Document;
pub use error::{Error, ParseError, Result};
pub use utils::{parse_duration, retry_with_backoff, timestamp_now};
