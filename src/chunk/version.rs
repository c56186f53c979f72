//! Chunk versioning: epochs, logical timestamps and `(major, minor)` counters
//!
//! Every chunk carries a [`ChunkVersion`]. The epoch and timestamp identify the
//! generation of the collection's chunk distribution; they change whenever the
//! collection is recreated or its shard key is refined, which invalidates all
//! versions issued before. Within one epoch, versions are ordered by
//! `(major, minor)`. Major bumps on migrations, minor on splits and merges.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::common::document::{self, Document};
use crate::common::ParseError;

/// Logical cluster time: seconds plus an increment within the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "TimestampRepr", from = "TimestampRepr")]
pub struct Timestamp {
    pub secs: u32,
    pub inc: u32,
}

#[derive(Serialize, Deserialize)]
struct TimestampRepr {
    #[serde(rename = "$timestamp")]
    parts: TimestampParts,
}

#[derive(Serialize, Deserialize)]
struct TimestampParts {
    t: u32,
    i: u32,
}

impl From<Timestamp> for TimestampRepr {
    fn from(ts: Timestamp) -> Self {
        TimestampRepr {
            parts: TimestampParts {
                t: ts.secs,
                i: ts.inc,
            },
        }
    }
}

impl From<TimestampRepr> for Timestamp {
    fn from(repr: TimestampRepr) -> Self {
        Timestamp::new(repr.parts.t, repr.parts.i)
    }
}

impl Timestamp {
    pub const fn new(secs: u32, inc: u32) -> Self {
        Self { secs, inc }
    }

    pub fn to_value(self) -> Value {
        document::timestamp_value(self.secs, self.inc)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        document::as_timestamp_parts(value).map(|(t, i)| Self::new(t, i))
    }

    fn pack(self) -> u64 {
        (u64::from(self.secs) << 32) | u64::from(self.inc)
    }

    fn unpack(raw: u64) -> Self {
        Self::new((raw >> 32) as u32, raw as u32)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.secs, self.inc)
    }
}

/// How far a gossiped timestamp may run ahead of the wall clock
pub const MAX_CLOCK_DRIFT_SECS: u32 = 365 * 24 * 60 * 60;

/// Issues strictly increasing timestamps tied to wall-clock seconds.
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> Timestamp {
        let now = crate::common::timestamp_now() as u32;
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let last = Timestamp::unpack(current);
            let next = if now > last.secs {
                Timestamp::new(now, 1)
            } else {
                match last.inc.checked_add(1) {
                    Some(inc) => Timestamp::new(last.secs, inc),
                    None => Timestamp::new(last.secs.saturating_add(1), 1),
                }
            };
            match self.last.compare_exchange_weak(
                current,
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Never issue anything at or below `ts` again. Timestamps further than
    /// `MAX_CLOCK_DRIFT_SECS` ahead of the wall clock are ignored; returns
    /// whether `ts` was accepted.
    pub fn advance(&self, ts: Timestamp) -> bool {
        let now = crate::common::timestamp_now() as u32;
        if ts.secs > now.saturating_add(MAX_CLOCK_DRIFT_SECS) {
            return false;
        }
        self.last.fetch_max(ts.pack(), Ordering::AcqRel);
        true
    }
}

/// Generation identifier of a collection's chunk distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(Uuid);

impl Epoch {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of comparing two chunk versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOrdering {
    Less,
    Equal,
    Greater,
    /// The versions belong to different epochs
    Incomparable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkVersion {
    pub major: u32,
    pub minor: u32,
    pub epoch: Epoch,
    pub timestamp: Timestamp,
}

impl ChunkVersion {
    /// Version reported for collections that are not sharded
    pub const UNSHARDED: ChunkVersion = ChunkVersion {
        major: 0,
        minor: 0,
        epoch: Epoch::nil(),
        timestamp: Timestamp::new(0, 0),
    };

    pub fn new(major: u32, minor: u32, epoch: Epoch, timestamp: Timestamp) -> Self {
        Self {
            major,
            minor,
            epoch,
            timestamp,
        }
    }

    pub fn is_set(&self) -> bool {
        self.major > 0 || self.minor > 0
    }

    pub fn is_same_epoch(&self, other: &ChunkVersion) -> bool {
        self.epoch == other.epoch && self.timestamp == other.timestamp
    }

    pub fn compare(&self, other: &ChunkVersion) -> VersionOrdering {
        if !self.is_same_epoch(other) {
            return VersionOrdering::Incomparable;
        }
        match (self.major, self.minor).cmp(&(other.major, other.minor)) {
            std::cmp::Ordering::Less => VersionOrdering::Less,
            std::cmp::Ordering::Equal => VersionOrdering::Equal,
            std::cmp::Ordering::Greater => VersionOrdering::Greater,
        }
    }

    pub fn inc_major(&mut self) {
        self.major += 1;
        self.minor = 0;
    }

    pub fn inc_minor(&mut self) {
        self.minor += 1;
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "major": self.major,
            "minor": self.minor,
            "epoch": self.epoch.to_string(),
            "timestamp": self.timestamp.to_value(),
        })
    }

    /// Decode a version. Every failure is reported as `InvalidVersion`.
    pub fn parse(value: Option<&Value>) -> Result<Self, ParseError> {
        let invalid = |why: &str| ParseError::InvalidVersion(why.to_string());

        let obj: &Document = value
            .ok_or_else(|| invalid("version is missing"))?
            .as_object()
            .ok_or_else(|| invalid("version must be an object"))?;

        let major = document::extract_u32_field(obj, "major").map_err(|e| invalid(&e.to_string()))?;
        let minor = document::extract_u32_field(obj, "minor").map_err(|e| invalid(&e.to_string()))?;
        let epoch = document::extract_string_field(obj, "epoch")
            .ok()
            .and_then(Epoch::parse)
            .ok_or_else(|| invalid("epoch must be a UUID string"))?;
        let timestamp = obj
            .get("timestamp")
            .and_then(Timestamp::from_value)
            .ok_or_else(|| invalid("timestamp must be a $timestamp value"))?;

        Ok(Self::new(major, minor, epoch, timestamp))
    }
}

impl fmt::Display for ChunkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}||{}||{}",
            self.major, self.minor, self.epoch, self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(epoch: Epoch, major: u32, minor: u32) -> ChunkVersion {
        ChunkVersion::new(major, minor, epoch, Timestamp::new(100, 1))
    }

    #[test]
    fn test_version_ordering_within_epoch() {
        let e = Epoch::generate();
        assert_eq!(v(e, 1, 0).compare(&v(e, 1, 1)), VersionOrdering::Less);
        assert_eq!(v(e, 1, 1).compare(&v(e, 2, 0)), VersionOrdering::Less);
        assert_eq!(v(e, 2, 0).compare(&v(e, 1, 0)), VersionOrdering::Greater);
        assert_eq!(v(e, 2, 0).compare(&v(e, 2, 0)), VersionOrdering::Equal);
    }

    #[test]
    fn test_versions_across_epochs_are_incomparable() {
        let a = v(Epoch::generate(), 1, 0);
        let b = v(Epoch::generate(), 1, 0);
        assert_eq!(a.compare(&b), VersionOrdering::Incomparable);
        assert!(!a.is_same_epoch(&b));
    }

    #[test]
    fn test_tick_after_exhausted_increment() {
        let clock = LogicalClock::new();
        let now = crate::common::timestamp_now() as u32;
        let gossiped = Timestamp::new(now + 5, u32::MAX);
        assert!(clock.advance(gossiped));

        let first = clock.tick();
        let second = clock.tick();
        assert!(first > gossiped);
        assert_eq!(first, Timestamp::new(now + 6, 1));
        assert!(second > first);
    }

    #[test]
    fn test_advance_ignores_far_future() {
        let clock = LogicalClock::new();
        let now = crate::common::timestamp_now() as u32;
        assert!(!clock.advance(Timestamp::new(now + MAX_CLOCK_DRIFT_SECS + 10, 7)));
        assert!(clock.tick().secs <= now + 1);
    }

    #[test]
    fn test_is_set() {
        assert!(!ChunkVersion::UNSHARDED.is_set());
        assert!(v(Epoch::generate(), 0, 1).is_set());
        assert!(v(Epoch::generate(), 1, 0).is_set());
    }

    #[test]
    fn test_inc_major_resets_minor() {
        let mut version = v(Epoch::generate(), 3, 7);
        version.inc_major();
        assert_eq!((version.major, version.minor), (4, 0));
        version.inc_minor();
        assert_eq!((version.major, version.minor), (4, 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ChunkVersion::parse(None),
            Err(ParseError::InvalidVersion(_))
        ));
        assert!(matches!(
            ChunkVersion::parse(Some(&serde_json::json!("1|0"))),
            Err(ParseError::InvalidVersion(_))
        ));
        let missing_epoch = serde_json::json!({"major": 1, "minor": 0});
        assert!(ChunkVersion::parse(Some(&missing_epoch)).is_err());
    }

    #[test]
    fn test_serde_matches_wire_encoding() {
        let version = v(Epoch::generate(), 5, 2);
        let via_serde = serde_json::to_value(version).unwrap();
        assert_eq!(via_serde, version.to_value());
        assert_eq!(ChunkVersion::parse(Some(&via_serde)).unwrap(), version);
    }

    #[test]
    fn test_logical_clock_is_monotonic() {
        let clock = LogicalClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b > a);

        let future = Timestamp::new(a.secs + 1000, 5);
        clock.advance(future);
        assert!(clock.tick() > future);
    }
}
