//! The embedded-relational-engine store: one `Store` handle shared by every
//! component, backed by sqlite via `sqlx`. Each public method is a single
//! logical operation; anything touching more than one row runs inside a
//! transaction.

mod api_keys;
mod downloads;
mod libraries;
mod peers;
mod settings;

pub use api_keys::hash_raw_key;
pub use downloads::MAX_RETRIES;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DataError, Result};

const INSTANCE_ID_KEY: &str = "instance_id";

/// Handle to the persistent store. Cheaply cloneable; internally pools connections.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if necessary) the sqlite database at `database_url` and
    /// runs pending migrations, mirroring `RuntimeStore::new`'s startup shape.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| DataError::QueryFailed {
                operation: "parse sqlite connect options",
                source,
            })?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "connect to store",
                source,
            })?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Builds a store directly from an existing pool. Used by test fixtures
    /// that have already run migrations against an in-memory database.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the stable instance id, minting and persisting one on first call.
    pub async fn instance_id(&self) -> Result<Uuid> {
        if let Some(existing) = self.get_setting(INSTANCE_ID_KEY).await? {
            return Uuid::parse_str(&existing).map_err(|_err| DataError::Conflict {
                reason: "stored instance_id is not a valid uuid".to_string(),
            });
        }
        let minted = Uuid::new_v4();
        self.set_setting(INSTANCE_ID_KEY, &minted.to_string())
            .await?;
        Ok(minted)
    }
}

#[cfg(test)]
mod tests {
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
    async fn instance_id_is_minted_once_and_persists() {
        let store = memory_store().await;
        let first = store.instance_id().await.unwrap();
        let second = store.instance_id().await.unwrap();
        assert_eq!(first, second);
    }
}
