//! In-memory snapshot store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{SnapshotError, SnapshotStore};
use crate::application::services::DashboardSnapshot;

/// In-memory implementation of `SnapshotStore`.
///
/// State lives for the lifetime of the process, like a browser session.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, DashboardSnapshot>>,
}

impl InMemorySnapshotStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<DashboardSnapshot>, SnapshotError> {
        Ok(self.snapshots.read().get(key).cloned())
    }

    async fn save(&self, key: &str, snapshot: &DashboardSnapshot) -> Result<(), SnapshotError> {
        self.snapshots
            .write()
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        self.snapshots.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Record;

    #[tokio::test]
    async fn save_load_clear() {
        let store = InMemorySnapshotStore::new();
        assert!(store.load("a").await.unwrap().is_none());

        let snapshot = DashboardSnapshot {
            records: vec![Record::new().with("StockCode", "1")],
            ..DashboardSnapshot::default()
        };
        store.save("a", &snapshot).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("a").await.unwrap(), Some(snapshot));

        store.clear("a").await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let store = InMemorySnapshotStore::new();
        let snapshot = DashboardSnapshot::default();
        tokio_test::block_on(async {
            tokio_test::assert_ok!(store.save("a", &snapshot).await);
            tokio_test::assert_ok!(store.clear("b").await);
            assert!(store.load("a").await.unwrap().is_some());
            assert!(store.load("b").await.unwrap().is_none());
        });
    }
}
