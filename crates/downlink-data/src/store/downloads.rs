use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::{DataError, Result};
use crate::model::{Category, Download, DownloadPatch, DownloadStatus, NewDownload};

/// Retry budget before a job gives up and transitions to `failed`, per §4.5.
pub const MAX_RETRIES: i64 = 2;

fn row_to_download(row: SqliteRow) -> Result<Download> {
    let id: String = row.try_get("id").map_err(query_failed("decode id"))?;
    let category: String = row.try_get("category").map_err(query_failed("decode category"))?;
    let status: String = row.try_get("status").map_err(query_failed("decode status"))?;
    let library_id: Option<String> = row
        .try_get("library_id")
        .map_err(query_failed("decode library_id"))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(query_failed("decode created_at"))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(query_failed("decode updated_at"))?;

    Ok(Download {
        id: parse_uuid(&id)?,
        url: row.try_get("url").map_err(query_failed("decode url"))?,
        title: row.try_get("title").map_err(query_failed("decode title"))?,
        category: parse_category(&category)?,
        season: row.try_get("season").map_err(query_failed("decode season"))?,
        episode: row.try_get("episode").map_err(query_failed("decode episode"))?,
        status: parse_status(&status)?,
        progress: row.try_get("progress").map_err(query_failed("decode progress"))?,
        file_path: row
            .try_get("file_path")
            .map_err(query_failed("decode file_path"))?,
        error: row.try_get("error").map_err(query_failed("decode error"))?,
        moved_to_library: row
            .try_get::<i64, _>("moved_to_library")
            .map_err(query_failed("decode moved_to_library"))?
            != 0,
        library_id: library_id.map(|id| parse_uuid(&id)).transpose()?,
        attempts: row.try_get("attempts").map_err(query_failed("decode attempts"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn query_failed(operation: &'static str) -> impl Fn(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_err| DataError::Conflict {
        reason: format!("stored value {raw:?} is not a valid uuid"),
    })
}

fn parse_category(raw: &str) -> Result<Category> {
    raw.parse().map_err(|_err| DataError::Conflict {
        reason: format!("stored category {raw:?} is invalid"),
    })
}

fn parse_status(raw: &str) -> Result<DownloadStatus> {
    raw.parse().map_err(|_err| DataError::Conflict {
        reason: format!("stored status {raw:?} is invalid"),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_err| DataError::Conflict {
            reason: format!("stored timestamp {raw:?} is invalid"),
        })
}

const SELECT_DOWNLOAD: &str = "SELECT id, url, title, category, season, episode, status, \
    progress, file_path, error, moved_to_library, library_id, attempts, created_at, updated_at \
    FROM downloads";

impl Store {
    /// Inserts a new download row, `queued` or `downloading` per `new.status`.
    pub async fn insert_download(&self, new: NewDownload) -> Result<Download> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO downloads (id, url, title, category, season, episode, status, \
             progress, file_path, error, moved_to_library, library_id, attempts, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, NULL, 0, NULL, 0, ?8, ?8)",
        )
        .bind(new.id.to_string())
        .bind(&new.url)
        .bind(&new.title)
        .bind(new.category.to_string())
        .bind(new.season)
        .bind(new.episode)
        .bind(new.status.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("insert_download"))?;

        self.require_download(new.id).await
    }

    /// Fetches a download by id.
    pub async fn get_download(&self, id: Uuid) -> Result<Option<Download>> {
        let row = sqlx::query(&format!("{SELECT_DOWNLOAD} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get_download"))?;
        row.map(row_to_download).transpose()
    }

    /// Fetches a download by id, erroring if absent.
    pub async fn require_download(&self, id: Uuid) -> Result<Download> {
        self.get_download(id).await?.ok_or(DataError::NotFound {
            entity: "download",
            id: id.to_string(),
        })
    }

    /// Lists every download, newest first.
    pub async fn list_downloads(&self) -> Result<Vec<Download>> {
        let rows = sqlx::query(&format!("{SELECT_DOWNLOAD} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list_downloads"))?;
        rows.into_iter().map(row_to_download).collect()
    }

    /// Finds a download by its exact `url`, used by the replicate idempotence check.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Download>> {
        let row = sqlx::query(&format!("{SELECT_DOWNLOAD} WHERE url = ?1"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("find_by_url"))?;
        row.map(row_to_download).transpose()
    }

    /// Lists `queued` rows whose `url` starts with `prefix`, oldest first.
    /// Used by the replicate engine's dedicated per-peer transfer loop, which
    /// runs outside the main Queue worker (§4.7.4).
    pub async fn list_queued_with_url_prefix(&self, prefix: &str) -> Result<Vec<Download>> {
        let rows = sqlx::query(&format!(
            "{SELECT_DOWNLOAD} WHERE status = 'queued' AND url LIKE ?1 ORDER BY created_at ASC"
        ))
        .bind(format!("{prefix}%"))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list_queued_with_url_prefix"))?;
        rows.into_iter().map(row_to_download).collect()
    }

    /// Transitions a row straight to `downloading` with zero progress, without
    /// the FIFO claim semantics of [`Store::claim_next_queued`]. Used by the
    /// replicate engine, which picks its own rows by peer URL prefix.
    pub async fn mark_downloading(&self, id: Uuid) -> Result<Download> {
        sqlx::query("UPDATE downloads SET status = 'downloading', progress = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(query_failed("mark_downloading"))?;
        self.require_download(id).await
    }

    /// Every `completed` download whose `url` is not a federation replica — the
    /// set exposed by `/federation/library` (§4.6).
    pub async fn list_completed_originals(&self) -> Result<Vec<Download>> {
        let rows = sqlx::query(&format!(
            "{SELECT_DOWNLOAD} WHERE status = 'completed' AND url NOT LIKE 'federation://%' \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("list_completed_originals"))?;
        rows.into_iter().map(row_to_download).collect()
    }

    /// Applies a partial update to user-editable fields (PATCH /downloads/{id}).
    pub async fn update_download(&self, id: Uuid, patch: DownloadPatch) -> Result<Download> {
        let current = self.require_download(id).await?;
        let category = patch.category.unwrap_or(current.category);
        let title = patch.title.unwrap_or(current.title);
        let season = patch.season.unwrap_or(current.season);
        let episode = patch.episode.unwrap_or(current.episode);
        sqlx::query(
            "UPDATE downloads SET category = ?2, title = ?3, season = ?4, episode = ?5, \
             updated_at = ?6 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(category.to_string())
        .bind(&title)
        .bind(season)
        .bind(episode)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("update_download"))?;
        self.require_download(id).await
    }

    /// Deletes a download row. Returns `false` if it did not exist.
    pub async fn delete_download(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloads WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete_download"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Picks the oldest `queued` row and atomically transitions it to
    /// `downloading` with `progress = 0`, returning it. `None` if the queue is empty.
    pub async fn claim_next_queued(&self) -> Result<Option<Download>> {
        let mut tx = self.pool.begin().await.map_err(query_failed("claim_next_queued begin"))?;
        let row = sqlx::query(&format!(
            "{SELECT_DOWNLOAD} WHERE status = 'queued' ORDER BY created_at ASC LIMIT 1"
        ))
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed("claim_next_queued select"))?;
        let Some(row) = row else {
            tx.commit().await.map_err(query_failed("claim_next_queued commit"))?;
            return Ok(None);
        };
        let download = row_to_download(row)?;
        sqlx::query("UPDATE downloads SET status = 'downloading', progress = 0, updated_at = ?2 WHERE id = ?1")
            .bind(download.id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("claim_next_queued update"))?;
        tx.commit().await.map_err(query_failed("claim_next_queued commit"))?;
        self.require_download(download.id).await.map(Some)
    }

    /// Demotes any row stuck `downloading` back to `queued`. Called once at
    /// startup to recover from a crash mid-job (§4.5).
    pub async fn demote_stuck_downloads(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE downloads SET status = 'queued', updated_at = ?1 WHERE status = 'downloading'",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("demote_stuck_downloads"))?;
        Ok(result.rows_affected())
    }

    /// Updates the progress percentage of an in-flight download.
    pub async fn set_download_progress(&self, id: Uuid, progress: i64) -> Result<()> {
        let clamped = progress.clamp(0, 100);
        sqlx::query("UPDATE downloads SET progress = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(clamped)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(query_failed("set_download_progress"))?;
        Ok(())
    }

    /// Marks a download `completed`. `tool_title` is adopted as the title only
    /// when the caller never supplied one (the row's current title is empty).
    pub async fn complete_download(
        &self,
        id: Uuid,
        file_path: &str,
        tool_title: Option<&str>,
    ) -> Result<Download> {
        let current = self.require_download(id).await?;
        let title = if current.title.trim().is_empty() {
            tool_title.unwrap_or(&current.title).to_string()
        } else {
            current.title
        };
        sqlx::query(
            "UPDATE downloads SET status = 'completed', progress = 100, file_path = ?2, \
             title = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(file_path)
        .bind(&title)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("complete_download"))?;
        self.require_download(id).await
    }

    /// Records a job failure. Demotes back to `queued` while the next
    /// attempt would still be below `MAX_RETRIES`, otherwise writes a
    /// terminal `failed` with `error`. A job is attempted at most
    /// `MAX_RETRIES` times in total.
    pub async fn fail_download(&self, id: Uuid, error: &str) -> Result<Download> {
        let current = self.require_download(id).await?;
        let now = Utc::now().to_rfc3339();
        if current.attempts + 1 < MAX_RETRIES {
            sqlx::query(
                "UPDATE downloads SET status = 'queued', attempts = attempts + 1, \
                 error = ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(id.to_string())
            .bind(error)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_failed("fail_download retry"))?;
        } else {
            sqlx::query(
                "UPDATE downloads SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(id.to_string())
            .bind(error)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_failed("fail_download terminal"))?;
        }
        self.require_download(id).await
    }

    /// Marks a download `failed` unconditionally, bypassing the retry
    /// demotion `fail_download` applies. Used by federation pull/replicate,
    /// which have no queue worker to pick a row back up.
    pub async fn force_fail_download(&self, id: Uuid, error: &str) -> Result<Download> {
        sqlx::query("UPDATE downloads SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.to_string())
            .bind(error)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(query_failed("force_fail_download"))?;
        self.require_download(id).await
    }

    /// Marks a download `cancelled` with the standard sentinel error message.
    pub async fn cancel_download(&self, id: Uuid) -> Result<Download> {
        sqlx::query(
            "UPDATE downloads SET status = 'cancelled', error = 'Cancelled by user', \
             updated_at = ?2 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("cancel_download"))?;
        self.require_download(id).await
    }

    /// Records that a completed download's file was moved into (or back out
    /// of) a library, rewriting `file_path` accordingly.
    pub async fn set_download_moved(
        &self,
        id: Uuid,
        moved: bool,
        library_id: Option<Uuid>,
        file_path: &str,
    ) -> Result<Download> {
        sqlx::query(
            "UPDATE downloads SET moved_to_library = ?2, library_id = ?3, file_path = ?4, \
             updated_at = ?5 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(i64::from(moved))
        .bind(library_id.map(|id| id.to_string()))
        .bind(file_path)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("set_download_moved"))?;
        self.require_download(id).await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::model::DownloadStatus;

    async fn memory_store() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Store::from_pool(pool)
    }

    fn sample(id: Uuid, url: &str) -> NewDownload {
        NewDownload {
            id,
            url: url.to_string(),
            title: "Ep1".to_string(),
            category: Category::Tv,
            season: Some(1),
            episode: Some(1),
            status: DownloadStatus::Queued,
        }
    }

    #[tokio::test]
    async fn claim_next_queued_picks_oldest_and_transitions() {
        let store = memory_store().await;
        let first = store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=a"))
            .await
            .unwrap();
        store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=b"))
            .await
            .unwrap();

        let claimed = store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, DownloadStatus::Downloading);
        assert_eq!(claimed.progress, 0);
    }

    #[tokio::test]
    async fn fail_download_retries_then_terminates() {
        let store = memory_store().await;
        let download = store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=fail"))
            .await
            .unwrap();

        let after_first = store.fail_download(download.id, "Network error").await.unwrap();
        assert_eq!(after_first.status, DownloadStatus::Queued);
        assert_eq!(after_first.attempts, 1);

        let after_second = store.fail_download(download.id, "Network error").await.unwrap();
        assert_eq!(after_second.status, DownloadStatus::Failed);
        assert_eq!(after_second.attempts, 1);
        assert_eq!(after_second.error.as_deref(), Some("Network error"));
    }

    #[tokio::test]
    async fn demote_stuck_downloads_recovers_crashed_jobs() {
        let store = memory_store().await;
        let download = store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=c"))
            .await
            .unwrap();
        store.claim_next_queued().await.unwrap();

        let demoted = store.demote_stuck_downloads().await.unwrap();
        assert_eq!(demoted, 1);

        let row = store.require_download(download.id).await.unwrap();
        assert_eq!(row.status, DownloadStatus::Queued);
    }

    #[tokio::test]
    async fn list_completed_originals_excludes_federated_and_incomplete() {
        let store = memory_store().await;
        let original = store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=orig"))
            .await
            .unwrap();
        store.complete_download(original.id, "/data/a.mkv", None).await.unwrap();

        let mut replica = sample(Uuid::new_v4(), "federation://peer.example/remote-1");
        replica.status = DownloadStatus::Downloading;
        let replica = store.insert_download(replica).await.unwrap();
        store.complete_download(replica.id, "/data/b.mkv", None).await.unwrap();

        store
            .insert_download(sample(Uuid::new_v4(), "https://youtube.com/watch?v=still-queued"))
            .await
            .unwrap();

        let originals = store.list_completed_originals().await.unwrap();
        assert_eq!(originals.len(), 1);
        assert_eq!(originals[0].id, original.id);
    }

    #[tokio::test]
    async fn find_by_url_supports_replicate_idempotence() {
        let store = memory_store().await;
        assert!(store.find_by_url("federation://peer.example/x").await.unwrap().is_none());
        store
            .insert_download(sample(Uuid::new_v4(), "federation://peer.example/x"))
            .await
            .unwrap();
        assert!(store.find_by_url("federation://peer.example/x").await.unwrap().is_some());
    }
}
