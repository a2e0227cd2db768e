//! File-backed snapshot store.
//!
//! One pretty-printed JSON file per page key (`<dir>/<key>_state.json`).
//! Writes go to a temporary file first and are renamed into place. Writes
//! and removals through one store (and its clones) are serialized, so a
//! save never races another save on the temporary file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::{SnapshotError, SnapshotStore};
use crate::application::services::DashboardSnapshot;

/// Snapshot store writing JSON files into a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileSnapshotStore {
    /// Store snapshots under `dir`, created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}_state.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<DashboardSnapshot>, SnapshotError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), "Loaded snapshot");
        Ok(Some(snapshot))
    }

    async fn save(&self, key: &str, snapshot: &DashboardSnapshot) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::KeySet;
    use crate::domain::record::Record;
    use crate::domain::sort::{SortDirection, SortRule, SortRules};

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));

        let snapshot = DashboardSnapshot {
            records: vec![Record::new().with("StockCode", "600000").with("RealtimePrice", 9.5)],
            sort_rules: SortRules::from(vec![SortRule::new("RealtimePrice", SortDirection::Desc)]),
            hidden: ["600001"].into_iter().collect::<KeySet>(),
            ..DashboardSnapshot::default()
        };
        store.save("stock_dashboard", &snapshot).await.unwrap();

        assert!(dir.path().join("nested/stock_dashboard_state.json").exists());
        let loaded = store.load("stock_dashboard").await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn missing_file_is_none_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(store.load("nothing").await.unwrap().is_none());
        store.clear("nothing").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        std::fs::write(dir.path().join("bad_state.json"), b"{not json").unwrap();
        assert!(matches!(
            store.load("bad").await,
            Err(SnapshotError::Serialization(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let snapshot = DashboardSnapshot {
                        records: vec![Record::new().with("StockCode", format!("{i:06}"))],
                        ..DashboardSnapshot::default()
                    };
                    store.save("k", &snapshot).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = store.load("k").await.unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(!dir.path().join("k_state.json.tmp").exists());
    }

    #[test]
    fn keys_are_sanitized() {
        let store = FileSnapshotStore::new("/data");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/data/___etc_passwd_state.json")
        );
    }
}
