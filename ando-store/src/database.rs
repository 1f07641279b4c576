//! Database-backed route store (`storage_backend = "database"`).
//!
//! A single table keyed by canonical path emulates the trie's
//! longest-prefix-match by trying the query path's ancestors, longest to
//! shortest, exactly as `ando_core::store::ancestor_paths` enumerates them —
//! the same algorithm as the original Python implementation's
//! `TableTrie._split_routes`.

use ando_core::error::AndoError;
use ando_core::path::canonical;
use ando_core::route::{RouteData, TargetMatch};
use ando_core::store::{ancestor_paths, RouteStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::collections::BTreeMap;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:///chp.sqlite";
pub const DEFAULT_DATABASE_TABLE: &str = "chp_routes";

/// Datetime values are stored with this prefix so a dialect-agnostic TEXT
/// column can carry both strings and timestamps without native DATETIME
/// support, exactly as the original Python `_to_json` does.
const DATETIME_SENTINEL: &str = "_dt_:";

pub struct DatabaseStore {
    pool: AnyPool,
    table: String,
}

impl DatabaseStore {
    /// Connect using `CHP_DATABASE_URL`/`CHP_DATABASE_TABLE`, falling back
    /// to [`DEFAULT_DATABASE_URL`]/[`DEFAULT_DATABASE_TABLE`].
    pub async fn connect_from_env() -> Result<Self, AndoError> {
        let url =
            std::env::var("CHP_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let table = std::env::var("CHP_DATABASE_TABLE")
            .unwrap_or_else(|_| DEFAULT_DATABASE_TABLE.to_string());
        Self::connect(&url, &table).await
    }

    pub async fn connect(url: &str, table: &str) -> Result<Self, AndoError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| AndoError::StoreError(format!("connecting to {url}: {e}")))?;

        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), AndoError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                path VARCHAR(128) UNIQUE NOT NULL, \
                data TEXT NOT NULL\
            )",
            self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(format!("creating {}: {e}", self.table)))?;
        Ok(())
    }

    async fn row_at(&self, path: &str) -> Result<Option<AnyRow>, AndoError> {
        let sql = format!(
            "SELECT path, data FROM {} WHERE path = ? ORDER BY id LIMIT 1",
            self.table
        );
        sqlx::query(&sql)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(e.to_string()))
    }

    fn decode_row(row: &AnyRow) -> Result<(String, RouteData), AndoError> {
        let path: String = row
            .try_get("path")
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        let raw: String = row
            .try_get("data")
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw)?;
        Ok((path, RouteData::new(from_json_sentinels(value))))
    }
}

#[async_trait]
impl RouteStore for DatabaseStore {
    async fn add(&self, path: &str, data: RouteData) -> Result<(), AndoError> {
        let path = canonical(path);
        let mut data = data;
        data.set_last_activity(chrono::Utc::now());
        let encoded = serde_json::to_string(&to_json_sentinels(data.into_value()))?;

        let sql = format!(
            "INSERT INTO {t} (path, data) VALUES (?, ?) \
             ON CONFLICT(path) DO UPDATE SET data = excluded.data",
            t = self.table
        );
        sqlx::query(&sql)
            .bind(&path)
            .bind(&encoded)
            .execute(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, path: &str, patch: serde_json::Value) -> Result<(), AndoError> {
        let path = canonical(path);
        let patch = patch
            .as_object()
            .ok_or_else(|| AndoError::BadRequest("patch must be a JSON object".into()))?
            .clone();
        let row = self
            .row_at(&path)
            .await?
            .ok_or_else(|| AndoError::RouteNotFound(path.clone()))?;
        let (_, mut data) = Self::decode_row(&row)?;
        data.merge(&patch);
        let encoded = serde_json::to_string(&to_json_sentinels(data.into_value()))?;

        let sql = format!("UPDATE {} SET data = ? WHERE path = ?", self.table);
        sqlx::query(&sql)
            .bind(&encoded)
            .bind(&path)
            .execute(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<Option<RouteData>, AndoError> {
        let path = canonical(path);
        let existing = self.get(&path).await?;
        if existing.is_none() {
            return Ok(None);
        }
        // Only the exact row is ever deleted — never an ancestor's row,
        // matching the in-memory trie's "prune this node only" semantics.
        let sql = format!("DELETE FROM {} WHERE path = ?", self.table);
        sqlx::query(&sql)
            .bind(&path)
            .execute(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        Ok(existing)
    }

    async fn get(&self, path: &str) -> Result<Option<RouteData>, AndoError> {
        let path = canonical(path);
        match self.row_at(&path).await? {
            Some(row) => Ok(Some(Self::decode_row(&row)?.1)),
            None => Ok(None),
        }
    }

    async fn get_target(&self, path: &str) -> Result<Option<TargetMatch>, AndoError> {
        for candidate in ancestor_paths(path) {
            if let Some(row) = self.row_at(&candidate).await? {
                let (prefix, data) = Self::decode_row(&row)?;
                return Ok(Some(TargetMatch { prefix, data }));
            }
        }
        Ok(None)
    }

    async fn get_all(&self) -> Result<BTreeMap<String, RouteData>, AndoError> {
        let sql = format!("SELECT path, data FROM {} ORDER BY id", self.table);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AndoError::StoreError(e.to_string()))?;
        rows.iter()
            .map(|row| Self::decode_row(row))
            .collect::<Result<BTreeMap<_, _>, _>>()
    }

    async fn touch(&self, path: &str) -> Result<(), AndoError> {
        self.update(
            path,
            serde_json::json!({ "last_activity": chrono::Utc::now().to_rfc3339() }),
        )
        .await
    }
}

/// Recursively rewrite RFC 3339 string values under `last_activity`-style
/// datetime keys into `"_dt_:<iso8601>"` sentinels before serializing to
/// the `data` TEXT column. Ported from the Python reference's `_to_json`:
/// any string already known to be a datetime (we track this by convention —
/// only `last_activity` is ever a datetime in this schema) gets the prefix;
/// nested objects recurse.
fn to_json_sentinels(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let v = if k == "last_activity" {
                    match v {
                        Value::String(s) => Value::String(format!("{DATETIME_SENTINEL}{s}")),
                        other => other,
                    }
                } else {
                    to_json_sentinels(v)
                };
                out.insert(k, v);
            }
            Value::Object(out)
        }
        other => other,
    }
}

/// Inverse of [`to_json_sentinels`]: strip the `_dt_:` prefix back off on
/// read, recursing into nested objects. Ported from `_from_json`.
fn from_json_sentinels(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let v = match v {
                    Value::String(s) => match s.strip_prefix(DATETIME_SENTINEL) {
                        Some(rest) => Value::String(rest.to_string()),
                        None => Value::String(s),
                    },
                    Value::Object(_) => from_json_sentinels(v),
                    other => other,
                };
                out.insert(k, v);
            }
            Value::Object(out)
        }
        other => other,
    }
}
