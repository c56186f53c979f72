//! Chunk migration commit command
//!
//! Sent by the donor shard to the config authority once a migration's data
//! transfer is complete. The authority accepts it only when
//! `fromShardCollectionVersion` still matches its record for the collection,
//! which makes the commit a compare-and-swap over the collection version.
//!
//! ```text
//! {
//!   _configsvrCommitChunkMigration: "db.coll",
//!   fromShard: "s0",
//!   toShard: "s1",
//!   migratedChunk: { min: {...}, max: {...}, lastmod: <version> },
//!   fromShardCollectionVersion: <version>,
//!   validAfter: Timestamp(..)          // optional
//! }
//! ```

use serde_json::Value;

use super::{ChunkRange, ChunkVersion, MigratedChunk, NamespaceString, ShardId, Timestamp};
use crate::common::document::{self, Document, ValueKind};
use crate::common::ParseError;

pub const COMMAND_NAME: &str = "_configsvrCommitChunkMigration";
const FROM_SHARD: &str = "fromShard";
const TO_SHARD: &str = "toShard";
const MIGRATED_CHUNK: &str = "migratedChunk";
const FROM_SHARD_COLLECTION_VERSION: &str = "fromShardCollectionVersion";
const VALID_AFTER: &str = "validAfter";
const LASTMOD: &str = "lastmod";

#[derive(Debug, Clone, PartialEq)]
pub struct CommitChunkMigrationRequest {
    pub nss: NamespaceString,
    pub from_shard: ShardId,
    pub to_shard: ShardId,
    pub migrated_chunk: MigratedChunk,
    pub from_shard_collection_version: ChunkVersion,
    /// Lower bound for snapshot reads that must not see the chunk on both shards
    pub valid_after: Option<Timestamp>,
}

/// Parse a range-only chunk: `{min, max, lastmod}` with a set version.
fn extract_chunk(source: &Document, field: &str) -> Result<MigratedChunk, ParseError> {
    let chunk = match document::extract_object_field(source, field) {
        Ok(obj) => obj,
        Err(ParseError::TypeMismatch { .. }) | Err(ParseError::MissingField(_)) => {
            return Err(ParseError::MissingField(field.to_string()))
        }
        Err(e) => return Err(e),
    };

    let range = ChunkRange::from_document(chunk)?;
    let version = ChunkVersion::parse(chunk.get(LASTMOD))?;
    if !version.is_set() {
        return Err(ParseError::InvalidVersion("Version must be set".into()));
    }

    Ok(MigratedChunk::new(range, version))
}

fn extract_shard_id(source: &Document, field: &str) -> Result<ShardId, ParseError> {
    let value = document::extract_string_field(source, field)?;
    if value.is_empty() {
        return Err(ParseError::UnsupportedFormat(format!(
            "The field '{}' cannot be empty",
            field
        )));
    }
    ShardId::new(value)
}

fn extract_valid_after(source: &Document) -> Result<Option<Timestamp>, ParseError> {
    match document::extract_typed_field(source, VALID_AFTER, ValueKind::Timestamp) {
        Ok(value) => Ok(Timestamp::from_value(value)),
        Err(ParseError::MissingField(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl CommitChunkMigrationRequest {
    /// Decode the command. Nothing is returned unless every field is valid.
    pub fn parse(obj: &Document) -> Result<Self, ParseError> {
        let nss = NamespaceString::parse(document::extract_string_field(obj, COMMAND_NAME)?)?;
        let migrated_chunk = extract_chunk(obj, MIGRATED_CHUNK)?;
        let from_shard = extract_shard_id(obj, FROM_SHARD)?;
        let to_shard = extract_shard_id(obj, TO_SHARD)?;
        let from_shard_collection_version =
            ChunkVersion::parse(obj.get(FROM_SHARD_COLLECTION_VERSION))?;
        let valid_after = extract_valid_after(obj)?;

        Ok(Self {
            nss,
            from_shard,
            to_shard,
            migrated_chunk,
            from_shard_collection_version,
            valid_after,
        })
    }

    /// Encode the command into `builder`.
    ///
    /// # Panics
    ///
    /// If `builder` is not empty or the migrated chunk's version is unset.
    /// Callers only ever pass validated inputs, so either is a caller bug.
    pub fn append_as_command(
        builder: &mut Document,
        nss: &NamespaceString,
        from_shard: &ShardId,
        to_shard: &ShardId,
        migrated_chunk: &MigratedChunk,
        from_shard_collection_version: &ChunkVersion,
        valid_after: Option<Timestamp>,
    ) {
        assert!(builder.is_empty(), "commit command builder must be empty");
        assert!(
            migrated_chunk.version.is_set(),
            "migrated chunk version must be set"
        );

        builder.insert(COMMAND_NAME.into(), Value::String(nss.to_string()));
        builder.insert(FROM_SHARD.into(), Value::String(from_shard.to_string()));
        builder.insert(TO_SHARD.into(), Value::String(to_shard.to_string()));

        let mut chunk = Document::new();
        migrated_chunk.range.append(&mut chunk);
        chunk.insert(LASTMOD.into(), migrated_chunk.version.to_value());
        builder.insert(MIGRATED_CHUNK.into(), Value::Object(chunk));

        builder.insert(
            FROM_SHARD_COLLECTION_VERSION.into(),
            from_shard_collection_version.to_value(),
        );
        if let Some(ts) = valid_after {
            builder.insert(VALID_AFTER.into(), ts.to_value());
        }
    }

    pub fn to_command(&self) -> Document {
        let mut builder = Document::new();
        Self::append_as_command(
            &mut builder,
            &self.nss,
            &self.from_shard,
            &self.to_shard,
            &self.migrated_chunk,
            &self.from_shard_collection_version,
            self.valid_after,
        );
        builder
    }

    /// The donor's collection version and the chunk's version belong to the same generation
    pub fn is_same_epoch(&self) -> bool {
        self.from_shard_collection_version
            .is_same_epoch(&self.migrated_chunk.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Epoch;
    use serde_json::json;

    fn d(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn version(epoch: Epoch, major: u32, minor: u32) -> ChunkVersion {
        ChunkVersion::new(major, minor, epoch, Timestamp::new(42, 1))
    }

    fn sample_command(epoch: Epoch) -> Document {
        d(json!({
            "_configsvrCommitChunkMigration": "test.users",
            "fromShard": "s0",
            "toShard": "s1",
            "migratedChunk": {
                "min": {"x": 0},
                "max": {"x": 10},
                "lastmod": version(epoch, 1, 0).to_value(),
            },
            "fromShardCollectionVersion": version(epoch, 1, 0).to_value(),
        }))
    }

    #[test]
    fn test_parse_and_reserialize_example() {
        let epoch = Epoch::generate();
        let cmd = sample_command(epoch);

        let request = CommitChunkMigrationRequest::parse(&cmd).unwrap();
        assert_eq!(request.from_shard.as_str(), "s0");
        assert_eq!(request.to_shard.as_str(), "s1");
        assert_eq!(request.valid_after, None);
        assert!(request.is_same_epoch());

        assert_eq!(request.to_command(), cmd);
    }

    #[test]
    fn test_valid_after_roundtrip() {
        let epoch = Epoch::generate();
        let mut cmd = sample_command(epoch);
        cmd.insert("validAfter".into(), Timestamp::new(77, 3).to_value());

        let request = CommitChunkMigrationRequest::parse(&cmd).unwrap();
        assert_eq!(request.valid_after, Some(Timestamp::new(77, 3)));
        assert_eq!(CommitChunkMigrationRequest::parse(&request.to_command()).unwrap(), request);
    }

    #[test]
    fn test_valid_after_wrong_type_is_propagated() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.insert("validAfter".into(), json!("yesterday"));
        assert!(matches!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_from_shard() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.remove("fromShard");
        assert_eq!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::MissingField("fromShard".into()))
        );
    }

    #[test]
    fn test_empty_to_shard() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.insert("toShard".into(), json!(""));
        assert!(matches!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_migrated_chunk_missing_or_wrong_type() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.insert("migratedChunk".into(), json!("not a chunk"));
        assert_eq!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::MissingField("migratedChunk".into()))
        );

        cmd.remove("migratedChunk");
        assert_eq!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::MissingField("migratedChunk".into()))
        );
    }

    #[test]
    fn test_inverted_range() {
        let epoch = Epoch::generate();
        let mut cmd = sample_command(epoch);
        cmd.insert(
            "migratedChunk".into(),
            json!({"min": {"x": 10}, "max": {"x": 0}, "lastmod": version(epoch, 1, 0).to_value()}),
        );
        assert!(matches!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::MalformedRange(_))
        ));
    }

    #[test]
    fn test_unset_chunk_version() {
        let epoch = Epoch::generate();
        let mut cmd = sample_command(epoch);
        cmd.insert(
            "migratedChunk".into(),
            json!({"min": {"x": 0}, "max": {"x": 10}, "lastmod": version(epoch, 0, 0).to_value()}),
        );
        assert!(matches!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_bad_collection_version_is_typed() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.insert("fromShardCollectionVersion".into(), json!([1, 0]));
        assert!(matches!(
            CommitChunkMigrationRequest::parse(&cmd),
            Err(ParseError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_cross_epoch_request_is_detectable() {
        let mut cmd = sample_command(Epoch::generate());
        cmd.insert(
            "fromShardCollectionVersion".into(),
            version(Epoch::generate(), 1, 0).to_value(),
        );
        let request = CommitChunkMigrationRequest::parse(&cmd).unwrap();
        assert!(!request.is_same_epoch());
    }

    #[test]
    #[should_panic(expected = "builder must be empty")]
    fn test_append_into_non_empty_builder_panics() {
        let request = CommitChunkMigrationRequest::parse(&sample_command(Epoch::generate())).unwrap();
        let mut builder = d(json!({"stray": 1}));
        CommitChunkMigrationRequest::append_as_command(
            &mut builder,
            &request.nss,
            &request.from_shard,
            &request.to_shard,
            &request.migrated_chunk,
            &request.from_shard_collection_version,
            None,
        );
    }

    #[test]
    #[should_panic(expected = "version must be set")]
    fn test_append_with_unset_version_panics() {
        let request = CommitChunkMigrationRequest::parse(&sample_command(Epoch::generate())).unwrap();
        let chunk = MigratedChunk::new(request.migrated_chunk.range.clone(), ChunkVersion::UNSHARDED);
        CommitChunkMigrationRequest::append_as_command(
            &mut Document::new(),
            &request.nss,
            &request.from_shard,
            &request.to_shard,
            &chunk,
            &request.from_shard_collection_version,
            None,
        );
    }
}
