use anchormark_engine::{
    Direction, Document, EngineConfig, ReconcileOutcome, Session, TextDocument, TreeSitterOutline,
};
use anchormark_store::{
    BookmarkRecord, BookmarkStore, Generation, JsonFileState, LocalFileSystem, WorkspaceState,
};
use anchormark_syntax::{is_line_end_safe, Position};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

struct Workspace {
    temp: TempDir,
    state: Arc<dyn WorkspaceState>,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let state: Arc<dyn WorkspaceState> = Arc::new(JsonFileState::for_workspace(temp.path()));
        Self { temp, state }
    }

    fn write(&self, path: &str, text: &str) -> TextDocument {
        std::fs::write(self.temp.path().join(path), text).expect("write");
        TextDocument::new(
            path,
            self.temp.path().to_string_lossy(),
            anchormark_syntax::language_id_for_path(path),
            text,
        )
    }

    async fn session(&self, config: EngineConfig) -> Session {
        Session::open(
            Some(self.state.clone()),
            Arc::new(LocalFileSystem::rooted(self.temp.path())),
            Arc::new(TreeSitterOutline),
            config,
        )
        .await
        .expect("open session")
    }
}

async fn reconcile(session: &Session, doc: TextDocument) -> Arc<dyn Document> {
    let doc: Arc<dyn Document> = Arc::new(doc);
    let outcome = session.reconcile(doc.clone()).await.expect("reconcile");
    assert!(matches!(outcome, ReconcileOutcome::Completed(_)));
    doc
}

#[tokio::test]
async fn marker_in_text_becomes_a_bookmark() {
    let ws = Workspace::new();
    let session = ws.session(EngineConfig::minimal()).await;
    let text = "let a = 0;\nlet b = 0;\nlet c = 0;\nlet d = 0;\nlet e = 0;\nx = 1 // :ab12;\n";
    reconcile(&session, ws.write("main.js", text)).await;

    let records = session.list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].marker, ":ab12;");
    assert_eq!(records[0].line_number, 5);
    assert_eq!(records[0].generation, Generation::Anchored);
}

#[tokio::test]
async fn duplicate_explicit_bookmarks_collapse() {
    let ws = Workspace::new();
    let text: String = (0..12).map(|i| format!("step({i});\n")).collect();
    let doc = ws.write("steps.js", &text);
    {
        let fs = LocalFileSystem::rooted(ws.temp.path());
        let mut store = BookmarkStore::load(Some(ws.state.clone()), &fs)
            .await
            .expect("load");
        for marker in [":k2m9;", ":a7q1;"] {
            store
                .put(BookmarkRecord::explicit(
                    marker,
                    "steps.js",
                    doc.folder_path(),
                    "javascript",
                    Position::new(10, 0),
                ))
                .await
                .expect("put");
        }
    }

    let session = ws.session(EngineConfig::minimal()).await;
    reconcile(&session, doc).await;

    let records = session.list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].marker, ":a7q1;");
    assert_eq!(records[0].line_number, 10);
}

#[test]
fn block_comments_do_not_block_insertion_but_templates_do() {
    let block = "a;\nb;\nc;\n/* open\n  still\n  comment\n  more\n  end */\nd;";
    assert!(is_line_end_safe(block, 5));

    let template = "a;\nb;\nc;\nq = `open\n  still\n  template\n  more\n  end`;\nd;";
    for line in 3..7 {
        assert!(!is_line_end_safe(template, line), "line {line}");
    }
    assert!(is_line_end_safe(template, 7));
}

#[tokio::test]
async fn keyword_only_line_is_skipped_in_label() {
    let ws = Workspace::new();
    let session = ws.session(EngineConfig::minimal()).await;
    let mut doc = ws.write("flow.js", "else {\n  retry(job);\n}\n");
    session.toggle(&mut doc, 0).await.expect("toggle");
    reconcile(&session, doc).await;

    let records = session.list().await;
    assert_eq!(records[0].cached_label.as_deref(), Some("{\\nretry(job);\\n}"));

    let ws = Workspace::new();
    let session = ws.session(EngineConfig::minimal()).await;
    let mut doc = ws.write("loop.js", "while\nrun();\n");
    session.toggle(&mut doc, 0).await.expect("toggle");
    reconcile(&session, doc).await;
    assert_eq!(session.list().await[0].cached_label.as_deref(), Some("run();"));
}

#[tokio::test]
async fn rust_labels_carry_breadcrumbs() {
    let ws = Workspace::new();
    let session = ws
        .session(EngineConfig {
            breadcrumbs: true,
            ..EngineConfig::default()
        })
        .await;
    let code = "struct Cache;\n\nimpl Cache {\n    fn evict(&mut self) {\n        self.clear();\n    }\n}\n";
    let mut doc = ws.write("cache.rs", code);
    session.toggle(&mut doc, 4).await.expect("toggle");
    reconcile(&session, doc).await;

    let label = session.list().await[0].cached_label.clone().expect("label");
    assert!(label.starts_with("5   ‹Cache > evict› "), "{label}");
}

#[tokio::test]
async fn edits_between_passes_keep_bookmarks_attached() {
    let ws = Workspace::new();
    let session = ws.session(EngineConfig::minimal()).await;
    let mut doc = ws.write("app.js", "init();\nserve();\nstop();\n");
    session.toggle(&mut doc, 1).await.expect("toggle");
    let marked = doc.text().to_string();
    reconcile(&session, doc).await;

    // two lines inserted above the bookmarked line
    let edited = format!("// header\n// more\n{marked}");
    let doc = reconcile(&session, ws.write("app.js", &edited)).await;
    let records = session.list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].line_number, 3);

    assert_eq!(
        session
            .navigate(doc.as_ref(), 0, Direction::Next)
            .await
            .expect("navigate"),
        Some(3)
    );

    // state file survives a restart
    session.close().await.expect("close");
    let session = ws.session(EngineConfig::minimal()).await;
    assert_eq!(session.list().await[0].line_number, 3);
}
