use crate::config::EngineConfig;
use crate::document::Document;
use crate::label::LabelGenerator;
use crate::navigation::{adjacent_line, bookmark_lines, Direction};
use crate::placement::{self, ToggleOutcome};
use crate::reconcile::{ReconcileOutcome, ReconcileUpdate, Reconciler};
use crate::symbols::SymbolProvider;
use crate::{EngineError, Result};
use anchormark_store::{BookmarkRecord, BookmarkStore, FileSystem, StoreEvent, WorkspaceState};
use log::info;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as TokioMutex};

/// Everything bookmarks need for one workspace, from activation to shutdown
pub struct Session {
    config: EngineConfig,
    store: Arc<TokioMutex<BookmarkStore>>,
    labels: Arc<LabelGenerator>,
    reconciler: Reconciler,
}

impl Session {
    /// Load the workspace's bookmarks and get ready to reconcile documents
    pub async fn open(
        state: Option<Arc<dyn WorkspaceState>>,
        fs: Arc<dyn FileSystem>,
        symbols: Arc<dyn SymbolProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        let store = Arc::new(TokioMutex::new(
            BookmarkStore::load(state, fs.as_ref()).await?,
        ));
        let labels = Arc::new(LabelGenerator::new(config.clone(), symbols));
        let reconciler = Reconciler::new(store.clone(), fs, labels.clone(), &config);
        Ok(Self {
            config,
            store,
            labels,
            reconciler,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<TokioMutex<BookmarkStore>> {
        self.store.clone()
    }

    /// Notifications for finished reconciliation passes
    #[must_use]
    pub fn updates(&self) -> broadcast::Receiver<ReconcileUpdate> {
        self.reconciler.subscribe()
    }

    /// Notifications for every persisted store change
    pub async fn store_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.lock().await.subscribe()
    }

    pub async fn reconcile(&self, doc: Arc<dyn Document>) -> Result<ReconcileOutcome> {
        self.reconciler.reconcile(doc).await
    }

    /// Toggle the bookmark on `line`; reconcile afterwards to refresh labels
    pub async fn toggle(&self, doc: &mut dyn Document, line: usize) -> Result<ToggleOutcome> {
        let mut store = self.store.lock().await;
        placement::toggle(&mut store, doc, line).await
    }

    pub async fn place_explicit(
        &self,
        doc: &dyn Document,
        line: usize,
    ) -> Result<Option<BookmarkRecord>> {
        let outline = self.labels.outline(doc).await;
        let mut store = self.store.lock().await;
        let Some(mut record) = placement::place_explicit(&mut store, doc, line).await? else {
            return Ok(None);
        };
        self.labels
            .label_records_with(doc, std::slice::from_mut(&mut record), outline.as_deref());
        store.put(record.clone()).await?;
        Ok(Some(record))
    }

    pub async fn clear_file(&self, doc: &mut dyn Document) -> Result<usize> {
        let mut store = self.store.lock().await;
        placement::clear_file(&mut store, doc).await
    }

    /// Forget every bookmark in the workspace; marker text in files is left alone
    pub async fn clear_all(&self) -> Result<()> {
        let mut store = self.store.lock().await;
        let count = store.len();
        store.clear().await?;
        info!("Cleared all {count} bookmarks");
        Ok(())
    }

    /// Next or previous bookmarked line of `doc`, wrapping at the ends
    pub async fn navigate(
        &self,
        doc: &dyn Document,
        from_line: usize,
        direction: Direction,
    ) -> Result<Option<usize>> {
        let records = self.store.lock().await.all_for_file(doc.file_path());
        let lines = bookmark_lines(doc, &records)?;
        Ok(adjacent_line(&lines, from_line, direction))
    }

    /// Every bookmark, grouped by file and ordered by position
    pub async fn list(&self) -> Vec<BookmarkRecord> {
        let store = self.store.lock().await;
        let mut records: Vec<BookmarkRecord> = store.records().cloned().collect();
        records.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.position().cmp(&b.position()))
        });
        records
    }

    /// Flush the store and release the session
    pub async fn close(self) -> Result<()> {
        let store = self.store.lock().await;
        store.save().await?;
        info!("Session closed with {} bookmarks", store.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::symbols::NoSymbols;
    use anchormark_store::{Generation, MemoryState, StaticFileSystem};
    use pretty_assertions::assert_eq;

    async fn session(state: Arc<dyn WorkspaceState>) -> Session {
        Session::open(
            Some(state),
            Arc::new(StaticFileSystem::new(["a.js"])),
            Arc::new(NoSymbols),
            EngineConfig::minimal(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let config = EngineConfig {
            label_max_chars: 0,
            ..EngineConfig::default()
        };
        let result = Session::open(
            None,
            Arc::new(StaticFileSystem::default()),
            Arc::new(NoSymbols),
            config,
        )
        .await;
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_toggle_reconcile_navigate() {
        let state: Arc<dyn WorkspaceState> = Arc::new(MemoryState::new());
        let session = session(state).await;
        let mut doc = TextDocument::new("a.js", "/ws", "javascript", "a();\nb();\nc();\nd();");

        session.toggle(&mut doc, 1).await.unwrap();
        session.toggle(&mut doc, 3).await.unwrap();
        let doc: Arc<dyn Document> = Arc::new(doc);
        session.reconcile(doc.clone()).await.unwrap();

        let records = session.list().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cached_label.as_deref(), Some("b();\\nc();\\nd();"));

        assert_eq!(session.navigate(doc.as_ref(), 1, Direction::Next).await.unwrap(), Some(3));
        assert_eq!(session.navigate(doc.as_ref(), 3, Direction::Next).await.unwrap(), Some(1));
        assert_eq!(session.navigate(doc.as_ref(), 1, Direction::Previous).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_bookmarks_survive_reopen() {
        let state: Arc<dyn WorkspaceState> = Arc::new(MemoryState::new());
        let doc = TextDocument::new("a.js", "/ws", "javascript", "a();\nb();");
        {
            let session = session(state.clone()).await;
            let record = session.place_explicit(&doc, 1).await.unwrap().unwrap();
            assert_eq!(record.cached_label.as_deref(), Some("b();"));
            session.close().await.unwrap();
        }

        let session = session(state).await;
        let records = session.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].generation, Generation::Explicit);
        assert_eq!(records[0].line_number, 1);
    }

    #[tokio::test]
    async fn test_clear_all_notifies() {
        let session = session(Arc::new(MemoryState::new())).await;
        let doc = TextDocument::new("a.js", "/ws", "javascript", "a();");
        session.place_explicit(&doc, 0).await.unwrap();

        let mut events = session.store_events().await;
        session.clear_all().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), StoreEvent::Cleared);
        assert!(session.list().await.is_empty());
    }
}
