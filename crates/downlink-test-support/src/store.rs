//! Embedded-store fixture: a fresh sqlite database per test, migrated and ready.

use downlink_data::Store;
use tempfile::TempDir;

/// A temporary sqlite database plus the directory backing it. The directory
/// must outlive the `Store` (dropping it deletes the database file), so
/// callers hold on to the tuple for the test's duration.
pub struct TempStore {
    /// Backing directory; deleted on drop.
    pub dir: TempDir,
    /// A `Store` connected to a fresh, migrated database under `dir`.
    pub store: Store,
}

/// Builds a fresh sqlite database under a new temporary directory, runs
/// migrations, and returns a ready [`Store`].
///
/// # Panics
///
/// Panics if the temporary directory cannot be created or the store fails to
/// connect or migrate — acceptable for test setup.
pub async fn temp_store() -> TempStore {
    let dir = TempDir::new().expect("create temp dir for test store");
    let db_path = dir.path().join("downlink.sqlite");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let store = Store::connect(&url).await.expect("connect to temp store");
    TempStore { dir, store }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_store_mints_an_instance_id() {
        let fixture = temp_store().await;
        let id = fixture.store.instance_id().await.unwrap();
        assert_eq!(id, fixture.store.instance_id().await.unwrap());
    }
}
