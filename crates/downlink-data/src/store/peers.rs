use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::{DataError, Result};
use crate::model::{normalize_peer_url, NewPeer, Peer, PeerPatch};

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

fn row_to_peer(row: SqliteRow) -> Result<Peer> {
    let id: String = row.try_get("id").map_err(query_failed("decode id"))?;
    let instance_id: Option<String> = row
        .try_get("instance_id")
        .map_err(query_failed("decode instance_id"))?;
    let sync_library_id: Option<String> = row
        .try_get("sync_library_id")
        .map_err(query_failed("decode sync_library_id"))?;
    let last_seen: Option<String> = row.try_get("last_seen").map_err(query_failed("decode last_seen"))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(query_failed("decode created_at"))?;
    Ok(Peer {
        id: parse_uuid(&id)?,
        name: row.try_get("name").map_err(query_failed("decode name"))?,
        url: row.try_get("url").map_err(query_failed("decode url"))?,
        api_key: row.try_get("api_key").map_err(query_failed("decode api_key"))?,
        instance_id: instance_id.map(|id| parse_uuid(&id)).transpose()?,
        auto_replicate: row
            .try_get::<i64, _>("auto_replicate")
            .map_err(query_failed("decode auto_replicate"))?
            != 0,
        sync_library_id: sync_library_id.map(|id| parse_uuid(&id)).transpose()?,
        last_seen: last_seen.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

const SELECT_PEER: &str = "SELECT id, name, url, api_key, instance_id, auto_replicate, \
    sync_library_id, last_seen, created_at FROM peers";

impl Store {
    /// Registers a new trusted peer. `url` is normalized (trailing slashes stripped).
    pub async fn insert_peer(&self, new: NewPeer) -> Result<Peer> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let url = normalize_peer_url(&new.url);
        sqlx::query(
            "INSERT INTO peers (id, name, url, api_key, instance_id, auto_replicate, \
             sync_library_id, last_seen, created_at) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, NULL, ?6)",
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&url)
        .bind(&new.api_key)
        .bind(new.instance_id.map(|id| id.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("insert_peer"))?;
        self.require_peer(id).await
    }

    /// Fetches a peer by id.
    pub async fn get_peer(&self, id: Uuid) -> Result<Option<Peer>> {
        let row = sqlx::query(&format!("{SELECT_PEER} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get_peer"))?;
        row.map(row_to_peer).transpose()
    }

    /// Fetches a peer by id, erroring if absent.
    pub async fn require_peer(&self, id: Uuid) -> Result<Peer> {
        self.get_peer(id).await?.ok_or(DataError::NotFound {
            entity: "peer",
            id: id.to_string(),
        })
    }

    /// Lists every registered peer.
    pub async fn list_peers(&self) -> Result<Vec<Peer>> {
        let rows = sqlx::query(&format!("{SELECT_PEER} ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list_peers"))?;
        rows.into_iter().map(row_to_peer).collect()
    }

    /// Lists peers flagged for the Peer-Sync Scheduler (§4.8).
    pub async fn list_auto_replicate_peers(&self) -> Result<Vec<Peer>> {
        let rows = sqlx::query(&format!("{SELECT_PEER} WHERE auto_replicate = 1 ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list_auto_replicate_peers"))?;
        rows.into_iter().map(row_to_peer).collect()
    }

    /// Looks up a peer by the instance id it reported at probe time. Used by
    /// `/federation/announce` and `/federation/resolve/{instanceId}`.
    pub async fn find_peer_by_instance_id(&self, instance_id: Uuid) -> Result<Option<Peer>> {
        let row = sqlx::query(&format!("{SELECT_PEER} WHERE instance_id = ?1"))
            .bind(instance_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("find_peer_by_instance_id"))?;
        row.map(row_to_peer).transpose()
    }

    /// Applies a partial update to a peer row. A supplied `url` is normalized.
    pub async fn update_peer(&self, id: Uuid, patch: PeerPatch) -> Result<Peer> {
        let current = self.require_peer(id).await?;
        let name = patch.name.unwrap_or(current.name);
        let url = patch.url.map_or(current.url, |url| normalize_peer_url(&url));
        let api_key = patch.api_key.unwrap_or(current.api_key);
        let auto_replicate = patch.auto_replicate.unwrap_or(current.auto_replicate);
        let sync_library_id = patch.sync_library_id.unwrap_or(current.sync_library_id);
        sqlx::query(
            "UPDATE peers SET name = ?2, url = ?3, api_key = ?4, auto_replicate = ?5, \
             sync_library_id = ?6 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(&name)
        .bind(&url)
        .bind(&api_key)
        .bind(i64::from(auto_replicate))
        .bind(sync_library_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(query_failed("update_peer"))?;
        self.require_peer(id).await
    }

    /// Deletes a peer row.
    pub async fn delete_peer(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM peers WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete_peer"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Refreshes `last_seen` to now, on a successful probe/resolve/announce.
    pub async fn touch_peer_seen(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE peers SET last_seen = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(query_failed("touch_peer_seen"))?;
        Ok(())
    }

    /// Implements `/federation/announce`: if a peer with `instance_id` is
    /// known, updates its `url` and `last_seen`. Returns whether a row matched.
    pub async fn apply_announce(&self, instance_id: Uuid, url: &str) -> Result<bool> {
        let normalized = normalize_peer_url(url);
        let result = sqlx::query(
            "UPDATE peers SET url = ?2, last_seen = ?3 WHERE instance_id = ?1",
        )
        .bind(instance_id.to_string())
        .bind(normalized)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("apply_announce"))?;
        Ok(result.rows_affected() > 0)
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
    async fn insert_peer_normalizes_trailing_slashes() {
        let store = memory_store().await;
        let peer = store
            .insert_peer(NewPeer {
                name: "node-b".to_string(),
                url: "http://old:3000///".to_string(),
                api_key: "raw-key".to_string(),
                instance_id: Some(Uuid::new_v4()),
            })
            .await
            .unwrap();
        assert_eq!(peer.url, "http://old:3000");
    }

    #[tokio::test]
    async fn apply_announce_updates_known_peer_and_is_noop_for_unknown() {
        let store = memory_store().await;
        let instance_id = Uuid::new_v4();
        let peer = store
            .insert_peer(NewPeer {
                name: "node-b".to_string(),
                url: "http://old:3000".to_string(),
                api_key: "raw-key".to_string(),
                instance_id: Some(instance_id),
            })
            .await
            .unwrap();

        let updated = store.apply_announce(instance_id, "http://new:5000///").await.unwrap();
        assert!(updated);
        let reloaded = store.require_peer(peer.id).await.unwrap();
        assert_eq!(reloaded.url, "http://new:5000");
        assert!(reloaded.last_seen.is_some());

        let noop = store.apply_announce(Uuid::new_v4(), "http://nowhere").await.unwrap();
        assert!(!noop);
    }
}
