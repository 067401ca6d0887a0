use sqlx::Row;

use super::Store;
use crate::error::{DataError, Result};

impl Store {
    /// Reads a single settings value, if present.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "get_setting",
                source,
            })?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    /// Upserts a settings value.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::QueryFailed {
            operation: "set_setting",
            source,
        })?;
        Ok(())
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

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = memory_store().await;
        assert_eq!(store.get_setting("plex_url").await.unwrap(), None);
        store.set_setting("plex_url", "http://plex.local").await.unwrap();
        assert_eq!(
            store.get_setting("plex_url").await.unwrap(),
            Some("http://plex.local".to_string())
        );
        store.set_setting("plex_url", "http://plex2.local").await.unwrap();
        assert_eq!(
            store.get_setting("plex_url").await.unwrap(),
            Some("http://plex2.local".to_string())
        );
    }
}
