use anchormark_store::{
    BookmarkRecord, BookmarkStore, Generation, JsonFileState, LocalFileSystem, WorkspaceState,
    BOOKMARKS_KEY,
};
use anchormark_syntax::Position;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn workspace() -> (TempDir, Arc<dyn WorkspaceState>, LocalFileSystem) {
    let temp = TempDir::new().expect("tempdir");
    let state: Arc<dyn WorkspaceState> = Arc::new(JsonFileState::for_workspace(temp.path()));
    let fs = LocalFileSystem::rooted(temp.path());
    (temp, state, fs)
}

#[tokio::test]
async fn bookmarks_survive_a_session_restart() {
    let (temp, state, fs) = workspace();
    std::fs::write(temp.path().join("lib.rs"), "fn a() {} // :ab12;\n").expect("write");

    {
        let mut store = BookmarkStore::load(Some(state.clone()), &fs)
            .await
            .expect("load");
        let mut record =
            BookmarkRecord::anchored(":ab12;", "lib.rs", "", "rust", Position::new(0, 14));
        record.cached_label = Some("1   a()".into());
        store.put(record).await.expect("put");
    }

    let store = BookmarkStore::load(Some(state), &fs).await.expect("reload");
    let restored = store.get(":ab12;").expect("restored record");
    assert_eq!(restored.generation, Generation::Anchored);
    assert_eq!(restored.position(), Position::new(0, 14));
    assert_eq!(restored.cached_label.as_deref(), Some("1   a()"));
}

#[tokio::test]
async fn removed_file_drops_its_bookmarks_on_next_load() {
    let (temp, state, fs) = workspace();
    let path = temp.path().join("gone.rs");
    std::fs::write(&path, "x();\n").expect("write");

    {
        let mut store = BookmarkStore::load(Some(state.clone()), &fs)
            .await
            .expect("load");
        store
            .put(BookmarkRecord::explicit(
                ":zz00;",
                "gone.rs",
                "",
                "rust",
                Position::new(0, 0),
            ))
            .await
            .expect("put");
    }
    std::fs::remove_file(&path).expect("remove");

    let store = BookmarkStore::load(Some(state.clone()), &fs)
        .await
        .expect("reload");
    assert!(store.is_empty());

    let persisted = state.get(BOOKMARKS_KEY).await.expect("get").expect("value");
    assert_eq!(persisted["bookmarks"], serde_json::json!([]));
}

#[tokio::test]
async fn corrupt_state_file_loads_as_empty_store() {
    let (temp, state, fs) = workspace();
    let dir = temp.path().join(".anchormark");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(
        dir.join("state.json"),
        r#"{"anchormark.bookmarks": {"v": 1, "bookmarks": "nope"}}"#,
    )
    .expect("write");

    let store = BookmarkStore::load(Some(state), &fs).await.expect("load");
    assert!(store.is_empty());
}
