//! Route data model: the arbitrary-JSON payload stored per path prefix, and
//! the result of a longest-prefix-match lookup against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The data registered for a route, keyed by canonical path prefix.
///
/// Backed by a JSON object so a controller can attach arbitrary metadata
/// alongside the required `target`, mirroring the donor's `labels:
/// HashMap<String, String>` escape hatch on `Route` but permissive of any
/// JSON value rather than strings only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RouteData(Map<String, Value>);

impl RouteData {
    /// Wrap a JSON object (or any value — non-objects are coerced to `{}`
    /// with the caller's intent lost, which should never happen for data
    /// that passed [`RouteData::with_target`] or API validation).
    pub fn new(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }

    /// Build a fresh route pointing at `target`.
    pub fn with_target(target: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("target".to_string(), Value::String(target.into()));
        Self(map)
    }

    pub fn target(&self) -> Option<&str> {
        self.0.get("target").and_then(Value::as_str)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.0
            .get("last_activity")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_last_activity(&mut self, at: DateTime<Utc>) {
        self.0.insert(
            "last_activity".to_string(),
            Value::String(at.to_rfc3339()),
        );
    }

    /// Merge `patch`'s top-level keys into this route's data, as performed
    /// by `RouteStore::update`. Keys set to `Value::Null` are removed.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (k, v) in patch {
            if v.is_null() {
                self.0.remove(k);
            } else {
                self.0.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// The outcome of a longest-prefix-match lookup: the registered prefix that
/// matched, and the data stored at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMatch {
    /// The canonical path prefix that was registered (e.g. `/a/b`), which
    /// may be shorter than the queried path.
    pub prefix: String,
    pub data: RouteData,
}

impl TargetMatch {
    pub fn target(&self) -> Option<&str> {
        self.data.target()
    }
}
