use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::Store;
use crate::error::{DataError, Result};
use crate::model::{Category, Library, LibraryPatch, NewLibrary};

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

fn row_to_library(row: SqliteRow) -> Result<Library> {
    let id: String = row.try_get("id").map_err(query_failed("decode id"))?;
    let kind: String = row.try_get("kind").map_err(query_failed("decode kind"))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(query_failed("decode created_at"))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(query_failed("decode updated_at"))?;
    Ok(Library {
        id: parse_uuid(&id)?,
        name: row.try_get("name").map_err(query_failed("decode name"))?,
        path: row.try_get("path").map_err(query_failed("decode path"))?,
        kind: kind.parse().map_err(|_err| DataError::Conflict {
            reason: format!("stored library kind {kind:?} is invalid"),
        })?,
        plex_section_id: row
            .try_get("plex_section_id")
            .map_err(query_failed("decode plex_section_id"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SELECT_LIBRARY: &str =
    "SELECT id, name, path, kind, plex_section_id, created_at, updated_at FROM libraries";

impl Store {
    /// Inserts a new library row.
    pub async fn insert_library(&self, new: NewLibrary) -> Result<Library> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO libraries (id, name, path, kind, plex_section_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&new.path)
        .bind(new.kind.to_string())
        .bind(new.plex_section_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("insert_library"))?;
        self.require_library(id).await
    }

    /// Fetches a library by id.
    pub async fn get_library(&self, id: Uuid) -> Result<Option<Library>> {
        let row = sqlx::query(&format!("{SELECT_LIBRARY} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get_library"))?;
        row.map(row_to_library).transpose()
    }

    /// Fetches a library by id, erroring if absent.
    pub async fn require_library(&self, id: Uuid) -> Result<Library> {
        self.get_library(id).await?.ok_or(DataError::NotFound {
            entity: "library",
            id: id.to_string(),
        })
    }

    /// Lists every library.
    pub async fn list_libraries(&self) -> Result<Vec<Library>> {
        let rows = sqlx::query(&format!("{SELECT_LIBRARY} ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list_libraries"))?;
        rows.into_iter().map(row_to_library).collect()
    }

    /// Applies a partial update to a library row.
    pub async fn update_library(&self, id: Uuid, patch: LibraryPatch) -> Result<Library> {
        let current = self.require_library(id).await?;
        let name = patch.name.unwrap_or(current.name);
        let path = patch.path.unwrap_or(current.path);
        let kind = patch.kind.unwrap_or(current.kind);
        let plex_section_id = patch.plex_section_id.unwrap_or(current.plex_section_id);
        sqlx::query(
            "UPDATE libraries SET name = ?2, path = ?3, kind = ?4, plex_section_id = ?5, \
             updated_at = ?6 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(&name)
        .bind(&path)
        .bind(kind.to_string())
        .bind(plex_section_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_failed("update_library"))?;
        self.require_library(id).await
    }

    /// Deletes a library row. Does not touch files on disk or detach downloads
    /// (§3's weak-FK rule).
    pub async fn delete_library(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM libraries WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(query_failed("delete_library"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Best-effort classification used by `GET /libraries/scan` to suggest a
    /// `kind` for an unregistered media-root subdirectory.
    #[must_use]
    pub fn detect_kind(name: &str) -> Category {
        Category::detect(name)
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
    async fn insert_then_update_then_delete() {
        let store = memory_store().await;
        let library = store
            .insert_library(NewLibrary {
                name: "Movies".to_string(),
                path: "/media/movies".to_string(),
                kind: Category::Movies,
                plex_section_id: None,
            })
            .await
            .unwrap();

        let updated = store
            .update_library(
                library.id,
                LibraryPatch {
                    plex_section_id: Some(Some(7)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.plex_section_id, Some(7));

        assert!(store.delete_library(library.id).await.unwrap());
        assert!(store.get_library(library.id).await.unwrap().is_none());
    }
}
