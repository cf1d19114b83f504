//! The hierarchical key/value tree produced by decoders and merges.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered mapping from string keys to JSON values.
///
/// Equality is structural: two documents are equal when they hold the same
/// keys with equal values, regardless of key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a document from a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn get_document(&self, key: &str) -> Option<Document> {
        match self.0.get(key) {
            Some(Value::Object(map)) => Some(Document(map.clone())),
            _ => None,
        }
    }

    /// Returns a new document with `source` merged over `self`.
    pub fn merged(&self, source: &Document, deep: bool) -> Document {
        let mut target = self.clone();
        merge_into(&mut target, source, deep);
        target
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

impl Deref for Document {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Merges `source` into `target`; `source` wins on every conflicting key.
///
/// With `deep`, keys holding objects on both sides are merged recursively.
/// Arrays are always replaced wholesale.
pub fn merge_into(target: &mut Document, source: &Document, deep: bool) {
    merge_maps(&mut target.0, &source.0, deep);
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>, deep: bool) {
    for (key, value) in source {
        if deep {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (target.get_mut(key), value)
            {
                merge_maps(existing, incoming, true);
                continue;
            }
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Deep-merges documents in iteration order; later documents win.
pub fn merge_all<'a, I>(documents: I) -> Document
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut merged = Document::new();
    for document in documents {
        merge_into(&mut merged, document, true);
    }
    merged
}

/// Emitted when a tick produces a document different from the cached one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChange {
    pub previous: Arc<Document>,
    pub current: Arc<Document>,
    pub changed_at: DateTime<Utc>,
}

impl ConfigChange {
    pub fn new(previous: Arc<Document>, current: Arc<Document>) -> Self {
        Self {
            previous,
            current,
            changed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
