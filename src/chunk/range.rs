//! Shard key patterns and half-open chunk ranges

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::common::document::{self, compare_documents, Document};
use crate::common::ParseError;

const MIN_FIELD: &str = "min";
const MAX_FIELD: &str = "max";

/// Ordered set of shard key fields, e.g. `{x: 1, y: "hashed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Document", into = "Document")]
pub struct KeyPattern(Document);

impl KeyPattern {
    pub fn new(pattern: Document) -> Result<Self, ParseError> {
        let bad = |why: String| ParseError::UnsupportedFormat(format!("invalid shard key: {}", why));

        if pattern.is_empty() {
            return Err(bad("key pattern cannot be empty".into()));
        }

        let mut hashed = 0;
        let mut normalized = Document::new();
        for (field, value) in pattern {
            if field.is_empty() || field.starts_with('$') {
                return Err(bad(format!("illegal field name '{}'", field)));
            }
            let value = match value {
                // 1.0 and 1 name the same ascending key
                Value::Number(n) if n.as_f64() == Some(1.0) => Value::from(1),
                Value::String(s) if s == "hashed" => {
                    hashed += 1;
                    Value::String(s)
                }
                other => {
                    return Err(bad(format!(
                        "field '{}' must be 1 or \"hashed\", got {}",
                        field, other
                    )))
                }
            };
            normalized.insert(field, value);
        }
        if hashed > 1 {
            return Err(bad("at most one field may be hashed".into()));
        }

        Ok(Self(normalized))
    }

    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        match value.as_object() {
            Some(obj) => Self::new(obj.clone()),
            None => Err(ParseError::UnsupportedFormat(
                "shard key must be an object".into(),
            )),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same fields with the same kinds, in the same order, as the start of `other`
    pub fn is_prefix_of(&self, other: &KeyPattern) -> bool {
        self.len() <= other.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((lf, lv), (rf, rv))| lf == rf && lv == rv)
    }

    /// The document `{field: MinKey, ...}` covering the start of the key space
    pub fn global_min(&self) -> Document {
        self.fields()
            .map(|f| (f.to_string(), document::min_key()))
            .collect()
    }

    pub fn global_max(&self) -> Document {
        self.fields()
            .map(|f| (f.to_string(), document::max_key()))
            .collect()
    }

    /// Pad `bound` for every field of this pattern it lacks. The padding is
    /// MaxKey when the bound already ends in MaxKey, MinKey otherwise.
    pub fn extend_range_bound(&self, bound: &Document) -> Document {
        let ends_at_max = bound.values().last().map(document::is_max_key).unwrap_or(false);
        let mut out = bound.clone();
        for field in self.fields() {
            if !out.contains_key(field) {
                let fill = if ends_at_max {
                    document::max_key()
                } else {
                    document::min_key()
                };
                out.insert(field.to_string(), fill);
            }
        }
        out
    }
}

impl TryFrom<Document> for KeyPattern {
    type Error = ParseError;

    fn try_from(value: Document) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyPattern> for Document {
    fn from(key: KeyPattern) -> Self {
        key.0
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Half-open key interval `[min, max)`. Always `min < max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr", into = "RangeRepr")]
pub struct ChunkRange {
    min: Document,
    max: Document,
}

/// Bounds are equal under the key ordering, so `{x: 0}` and `{x: 0.0}` match
impl PartialEq for ChunkRange {
    fn eq(&self, other: &Self) -> bool {
        let same = |a: &Document, b: &Document| {
            a.keys().eq(b.keys()) && compare_documents(a, b).is_eq()
        };
        same(&self.min, &other.min) && same(&self.max, &other.max)
    }
}

#[derive(Serialize, Deserialize)]
struct RangeRepr {
    min: Document,
    max: Document,
}

impl TryFrom<RangeRepr> for ChunkRange {
    type Error = ParseError;

    fn try_from(repr: RangeRepr) -> Result<Self, Self::Error> {
        ChunkRange::new(repr.min, repr.max)
    }
}

impl From<ChunkRange> for RangeRepr {
    fn from(range: ChunkRange) -> Self {
        RangeRepr {
            min: range.min,
            max: range.max,
        }
    }
}

impl ChunkRange {
    pub fn new(min: Document, max: Document) -> Result<Self, ParseError> {
        let malformed = |why: &str| {
            ParseError::MalformedRange(format!(
                "{} (min: {}, max: {})",
                why,
                Value::Object(min.clone()),
                Value::Object(max.clone())
            ))
        };

        if min.is_empty() || max.is_empty() {
            return Err(malformed("range bounds cannot be empty"));
        }
        if min.len() != max.len() {
            return Err(malformed("range bounds must have the same number of fields"));
        }
        if !min.keys().eq(max.keys()) {
            return Err(malformed("range bounds must use the same fields"));
        }
        if compare_documents(&min, &max) != Ordering::Less {
            return Err(malformed("min must be less than max"));
        }

        Ok(Self { min, max })
    }

    /// Decode `{min: {...}, max: {...}}` from `doc`
    pub fn from_document(doc: &Document) -> Result<Self, ParseError> {
        let bound = |field: &str| -> Result<Document, ParseError> {
            match doc.get(field) {
                Some(Value::Object(obj)) => Ok(obj.clone()),
                Some(_) => Err(ParseError::MalformedRange(format!(
                    "'{}' must be an object",
                    field
                ))),
                None => Err(ParseError::MalformedRange(format!(
                    "missing '{}' bound",
                    field
                ))),
            }
        };
        Self::new(bound(MIN_FIELD)?, bound(MAX_FIELD)?)
    }

    /// Append the `min` and `max` fields to `builder`
    pub fn append(&self, builder: &mut Document) {
        builder.insert(MIN_FIELD.to_string(), Value::Object(self.min.clone()));
        builder.insert(MAX_FIELD.to_string(), Value::Object(self.max.clone()));
    }

    pub fn min(&self) -> &Document {
        &self.min
    }

    pub fn max(&self) -> &Document {
        &self.max
    }

    pub fn contains_key(&self, key: &Document) -> bool {
        compare_documents(&self.min, key) != Ordering::Greater
            && compare_documents(key, &self.max) == Ordering::Less
    }

    /// Adjacent ranges `[a, b)` and `[b, c)` do not overlap
    pub fn overlaps(&self, other: &ChunkRange) -> bool {
        compare_documents(&self.min, &other.max) == Ordering::Less
            && compare_documents(&other.min, &self.max) == Ordering::Less
    }

    /// Extend both bounds to a refined shard key
    pub fn extend_to(&self, key: &KeyPattern) -> ChunkRange {
        ChunkRange {
            min: key.extend_range_bound(&self.min),
            max: key.extend_range_bound(&self.max),
        }
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            Value::Object(self.min.clone()),
            Value::Object(self.max.clone())
        )
    }
}
