use crate::fs::FileSystem;
use crate::record::BookmarkRecord;
use crate::state::WorkspaceState;
use crate::Result;
use anchormark_syntax::{is_marker, new_marker_with};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Workspace-state key holding the bookmark document
pub const BOOKMARKS_KEY: &str = "anchormark.bookmarks";
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Change notification sent after every persisted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed { files: Vec<String> },
    Cleared,
}

/// One step of a batched mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Put(BookmarkRecord),
    Delete(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedBookmarks {
    v: u32,
    bookmarks: Vec<BookmarkRecord>,
}

/// Authoritative marker → bookmark map for one workspace.
///
/// Every mutation is written through to the workspace state before it
/// returns, then announced on the event channel.
pub struct BookmarkStore {
    records: BTreeMap<String, BookmarkRecord>,
    state: Option<Arc<dyn WorkspaceState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl BookmarkStore {
    /// Store with no backing workspace; mutations stay in memory
    #[must_use]
    pub fn in_memory() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            records: BTreeMap::new(),
            state: None,
            events,
        }
    }

    /// Load the workspace's bookmarks, dropping records whose file is gone.
    ///
    /// No workspace yields an empty store. A malformed or unknown-version
    /// document also yields an empty store; it is logged, not returned as an error.
    pub async fn load(
        state: Option<Arc<dyn WorkspaceState>>,
        fs: &dyn FileSystem,
    ) -> Result<Self> {
        let mut store = Self::in_memory();
        let Some(state) = state else {
            debug!("No workspace state; starting with an empty bookmark store");
            return Ok(store);
        };
        store.state = Some(state.clone());

        let persisted = match state.get(BOOKMARKS_KEY).await? {
            Some(value) => match serde_json::from_value::<PersistedBookmarks>(value) {
                Ok(persisted) if persisted.v == STORE_SCHEMA_VERSION => persisted.bookmarks,
                Ok(persisted) => {
                    warn!("Ignoring bookmark store with schema v{}", persisted.v);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Ignoring unreadable bookmark store: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let total = persisted.len();
        let mut dropped = 0usize;
        for record in persisted {
            if !is_marker(&record.marker) {
                warn!("Dropping bookmark with malformed marker {:?}", record.marker);
                dropped += 1;
                continue;
            }
            if !fs.exists(&record.file_path).await {
                debug!(
                    "Dropping stale bookmark {} for missing file {}",
                    record.marker, record.file_path
                );
                dropped += 1;
                continue;
            }
            store.records.insert(record.marker.clone(), record);
        }

        if dropped > 0 {
            store.save().await?;
        }
        info!(
            "Loaded {} bookmarks ({} stale dropped of {})",
            store.records.len(),
            dropped,
            total
        );
        Ok(store)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn get(&self, marker: &str) -> Option<&BookmarkRecord> {
        self.records.get(marker)
    }

    #[must_use]
    pub fn contains(&self, marker: &str) -> bool {
        self.records.contains_key(marker)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &BookmarkRecord> {
        self.records.values()
    }

    /// Records of one file, ascending by cached position
    #[must_use]
    pub fn all_for_file(&self, file_path: &str) -> Vec<BookmarkRecord> {
        let mut records: Vec<BookmarkRecord> = self
            .records
            .values()
            .filter(|record| record.file_path == file_path)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.position()
                .cmp(&b.position())
                .then_with(|| a.marker.cmp(&b.marker))
        });
        records
    }

    /// Mint a marker no record in this store uses
    pub fn new_marker(&self) -> Result<String> {
        Ok(new_marker_with(|candidate| self.records.contains_key(candidate))?)
    }

    pub async fn put(&mut self, record: BookmarkRecord) -> Result<()> {
        self.apply(vec![StoreChange::Put(record)]).await
    }

    pub async fn delete(&mut self, marker: &str) -> Result<Option<BookmarkRecord>> {
        let existing = self.records.get(marker).cloned();
        if existing.is_some() {
            self.apply(vec![StoreChange::Delete(marker.to_string())])
                .await?;
        }
        Ok(existing)
    }

    /// Apply several changes in order with a single write and a single event.
    ///
    /// The new record set only replaces the current one once it has been
    /// written; a failed write leaves the store unchanged.
    pub async fn apply(&mut self, changes: Vec<StoreChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut next = self.records.clone();
        let mut files = BTreeSet::new();
        for change in changes {
            match change {
                StoreChange::Put(record) => {
                    if let Some(previous) = next.get(&record.marker) {
                        files.insert(previous.file_path.clone());
                    }
                    files.insert(record.file_path.clone());
                    next.insert(record.marker.clone(), record);
                }
                StoreChange::Delete(marker) => {
                    if let Some(removed) = next.remove(&marker) {
                        files.insert(removed.file_path);
                    }
                }
            }
        }
        self.persist(&next).await?;
        self.records = next;
        let _ = self.events.send(StoreEvent::Changed {
            files: files.into_iter().collect(),
        });
        Ok(())
    }

    /// Remove every record of `file_path`, returning what was removed
    pub async fn delete_file(&mut self, file_path: &str) -> Result<Vec<BookmarkRecord>> {
        let removed = self.all_for_file(file_path);
        let changes = removed
            .iter()
            .map(|record| StoreChange::Delete(record.marker.clone()))
            .collect();
        self.apply(changes).await?;
        Ok(removed)
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.persist(&BTreeMap::new()).await?;
        self.records.clear();
        let _ = self.events.send(StoreEvent::Cleared);
        Ok(())
    }

    /// Write the full record set to the workspace state
    pub async fn save(&self) -> Result<()> {
        self.persist(&self.records).await
    }

    async fn persist(&self, records: &BTreeMap<String, BookmarkRecord>) -> Result<()> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        let persisted = PersistedBookmarks {
            v: STORE_SCHEMA_VERSION,
            bookmarks: records.values().cloned().collect(),
        };
        state
            .set(BOOKMARKS_KEY, serde_json::to_value(persisted)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StaticFileSystem;
    use crate::state::MemoryState;
    use crate::StoreError;
    use anchormark_syntax::Position;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Workspace state whose writes fail while `full` is set
    #[derive(Default)]
    struct FullDisk {
        inner: MemoryState,
        full: AtomicBool,
    }

    #[async_trait]
    impl WorkspaceState for FullDisk {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            if self.full.load(Ordering::SeqCst) {
                return Err(StoreError::Other("disk full".into()));
            }
            self.inner.set(key, value).await
        }
    }

    fn record(marker: &str, file: &str, line: usize) -> BookmarkRecord {
        BookmarkRecord::anchored(marker, file, "/ws", "rust", Position::new(line, 4))
    }

    #[tokio::test]
    async fn test_load_without_workspace_is_empty() {
        let store = BookmarkStore::load(None, &StaticFileSystem::default())
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_all_for_file_sorted_by_position() {
        let mut store = BookmarkStore::in_memory();
        store.put(record(":bbbb;", "a.rs", 9)).await.unwrap();
        store.put(record(":aaaa;", "a.rs", 2)).await.unwrap();
        store.put(record(":cccc;", "b.rs", 1)).await.unwrap();

        let lines: Vec<usize> = store
            .all_for_file("a.rs")
            .iter()
            .map(|r| r.line_number)
            .collect();
        assert_eq!(lines, vec![2, 9]);
    }

    #[tokio::test]
    async fn test_mutations_notify_observers() {
        let mut store = BookmarkStore::in_memory();
        let mut events = store.subscribe();

        store.put(record(":aaaa;", "a.rs", 1)).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Changed {
                files: vec!["a.rs".into()]
            }
        );

        assert!(store.delete(":aaaa;").await.unwrap().is_some());
        assert!(matches!(events.recv().await.unwrap(), StoreEvent::Changed { .. }));

        assert!(store.delete(":aaaa;").await.unwrap().is_none());
        store.clear().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Cleared);
    }

    #[tokio::test]
    async fn test_new_marker_skips_existing() {
        let mut store = BookmarkStore::in_memory();
        for _ in 0..50 {
            let marker = store.new_marker().unwrap();
            assert!(!store.contains(&marker));
            store.put(record(&marker, "a.rs", 0)).await.unwrap();
        }
        assert_eq!(store.len(), 50);
    }

    #[tokio::test]
    async fn test_stale_records_dropped_on_load() {
        let state: Arc<dyn WorkspaceState> = Arc::new(MemoryState::new());
        {
            let mut store = BookmarkStore::load(Some(state.clone()), &StaticFileSystem::default())
                .await
                .unwrap();
            store.put(record(":aaaa;", "kept.rs", 1)).await.unwrap();
            store.put(record(":bbbb;", "gone.rs", 1)).await.unwrap();
        }

        let fs = StaticFileSystem::new(["kept.rs"]);
        let store = BookmarkStore::load(Some(state.clone()), &fs).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(":aaaa;"));

        let persisted = state.get(BOOKMARKS_KEY).await.unwrap().unwrap();
        assert_eq!(persisted["bookmarks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_schema_loads_empty() {
        let state: Arc<dyn WorkspaceState> = Arc::new(MemoryState::new());
        state
            .set(BOOKMARKS_KEY, serde_json::json!({"v": 99, "bookmarks": []}))
            .await
            .unwrap();
        let store = BookmarkStore::load(Some(state), &StaticFileSystem::default())
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_unchanged() {
        let disk = Arc::new(FullDisk::default());
        let state: Arc<dyn WorkspaceState> = disk.clone();
        let mut store = BookmarkStore::load(Some(state), &StaticFileSystem::default())
            .await
            .unwrap();
        store.put(record(":aaaa;", "a.rs", 1)).await.unwrap();
        let mut events = store.subscribe();

        disk.full.store(true, Ordering::SeqCst);
        assert!(store.put(record(":ab12;", "a.rs", 2)).await.is_err());
        assert!(store.delete(":aaaa;").await.is_err());
        assert!(store.clear().await.is_err());
        assert!(!store.contains(":ab12;"));
        assert!(store.contains(":aaaa;"));
        assert!(events.try_recv().is_err());

        disk.full.store(false, Ordering::SeqCst);
        store.put(record(":ab12;", "a.rs", 2)).await.unwrap();
        assert_eq!(store.len(), 2);
        let persisted = disk.get(BOOKMARKS_KEY).await.unwrap().unwrap();
        assert_eq!(persisted["bookmarks"].as_array().unwrap().len(), 2);
    }
}
