//! Shard and namespace identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::ParseError;

/// Identifier of a data-bearing shard. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ParseError::UnsupportedFormat(
                "shard id cannot be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShardId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShardId> for String {
    fn from(id: ShardId) -> Self {
        id.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified collection name, `db.collection`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceString {
    ns: String,
    dot: usize,
}

impl NamespaceString {
    pub fn parse(ns: &str) -> Result<Self, ParseError> {
        let invalid = |why: &str| ParseError::InvalidNamespace(format!("'{}': {}", ns, why));

        let dot = ns.find('.').ok_or_else(|| invalid("missing '.'"))?;
        let (db, coll) = (&ns[..dot], &ns[dot + 1..]);
        if db.is_empty() {
            return Err(invalid("empty database name"));
        }
        if coll.is_empty() {
            return Err(invalid("empty collection name"));
        }
        if db.chars().any(|c| matches!(c, ' ' | '$' | '/' | '\\' | '\0' | '"')) {
            return Err(invalid("database name contains an invalid character"));
        }
        if coll.contains('\0') {
            return Err(invalid("collection name contains NUL"));
        }

        Ok(Self {
            ns: ns.to_string(),
            dot,
        })
    }

    pub fn db(&self) -> &str {
        &self.ns[..self.dot]
    }

    pub fn coll(&self) -> &str {
        &self.ns[self.dot + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.ns
    }
}

impl TryFrom<String> for NamespaceString {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NamespaceString> for String {
    fn from(nss: NamespaceString) -> Self {
        nss.ns
    }
}

impl fmt::Display for NamespaceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_id_rejects_empty() {
        assert!(ShardId::new("s0").is_ok());
        assert!(matches!(
            ShardId::new(""),
            Err(ParseError::UnsupportedFormat(_))
        ));
        assert!(serde_json::from_str::<ShardId>("\"\"").is_err());
    }

    #[test]
    fn test_namespace_parse() {
        let nss = NamespaceString::parse("test.users.archive").unwrap();
        assert_eq!(nss.db(), "test");
        assert_eq!(nss.coll(), "users.archive");

        assert!(NamespaceString::parse("nodot").is_err());
        assert!(NamespaceString::parse(".coll").is_err());
        assert!(NamespaceString::parse("db.").is_err());
        assert!(NamespaceString::parse("d$b.coll").is_err());
    }
}
