use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::{DataError, Result};
use crate::model::ApiKey;

fn query_failed(operation: &'static str) -> impl Fn(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_err| DataError::Conflict {
        reason: format!("stored value {raw:?} is not a valid uuid"),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_err| DataError::Conflict {
            reason: format!("stored timestamp {raw:?} is invalid"),
        })
}

fn row_to_api_key(row: SqliteRow) -> Result<ApiKey> {
    let id: String = row.try_get("id").map_err(query_failed("decode id"))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(query_failed("decode created_at"))?;
    Ok(ApiKey {
        id: parse_uuid(&id)?,
        label: row.try_get("label").map_err(query_failed("decode label"))?,
        key_hash: row.try_get("key_hash").map_err(query_failed("decode key_hash"))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// SHA-256 hex digest of a raw bearer token, per §4.2's comparison rule.
#[must_use]
pub fn hash_raw_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

const SELECT_API_KEY: &str = "SELECT id, label, key_hash, created_at FROM api_keys";

impl Store {
    /// Mints a new API key. Returns the row; the raw key itself is generated
    /// by the caller and returned exactly once (never persisted).
    pub async fn insert_api_key(&self, label: Option<String>, key_hash: String) -> Result<ApiKey> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO api_keys (id, label, key_hash, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(id.to_string())
            .bind(&label)
            .bind(&key_hash)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_failed("insert_api_key"))?;
        self.require_api_key(id).await
    }

    /// Fetches an API key by id.
    pub async fn get_api_key(&self, id: Uuid) -> Result<Option<ApiKey>> {
        let row = sqlx::query(&format!("{SELECT_API_KEY} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get_api_key"))?;
        row.map(row_to_api_key).transpose()
    }

    /// Fetches an API key by id, erroring if absent.
    pub async fn require_api_key(&self, id: Uuid) -> Result<ApiKey> {
        self.get_api_key(id).await?.ok_or(DataError::NotFound {
            entity: "api_key",
            id: id.to_string(),
        })
    }

    /// Lists every API key (labels and hashes only; raw keys are never stored).
    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query(&format!("{SELECT_API_KEY} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list_api_keys"))?;
        rows.into_iter().map(row_to_api_key).collect()
    }

    /// Revokes a key. Takes effect immediately on the next request (§4.2).
    pub async fn delete_api_key(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete_api_key"))?;
        Ok(result.rows_affected() > 0)
    }

    /// True if `raw`'s SHA-256 digest matches a currently-stored key hash.
    pub async fn verify_api_key(&self, raw: &str) -> Result<bool> {
        let hash = hash_raw_key(raw);
        let row = sqlx::query("SELECT 1 AS present FROM api_keys WHERE key_hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("verify_api_key"))?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn memory_store() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Store::from_pool(pool)
    }

    #[test]
    fn hash_raw_key_is_deterministic_hex() {
        let hash = hash_raw_key("super-secret");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_raw_key("super-secret"));
        assert_ne!(hash, hash_raw_key("different"));
    }

    #[tokio::test]
    async fn verify_api_key_rejects_after_deletion() {
        let store = memory_store().await;
        let raw = "abc123";
        let key = store
            .insert_api_key(Some("ci".to_string()), hash_raw_key(raw))
            .await
            .unwrap();

        assert!(store.verify_api_key(raw).await.unwrap());
        store.delete_api_key(key.id).await.unwrap();
        assert!(!store.verify_api_key(raw).await.unwrap());
    }
}
