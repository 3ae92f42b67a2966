use anchormark_engine::{
    Document, EngineConfig, ReconcileOutcome, Session, TextDocument, TreeSitterOutline,
};
use anchormark_store::{JsonFileState, LocalFileSystem, WorkspaceState};
use anchormark_syntax::language_id_for_path;
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub const CONFIG_FILE_NAME: &str = "anchormark.toml";
pub const STATE_PATH_ENV: &str = "ANCHORMARK_STATE_PATH";

/// `path` relative to `root`, with `/` separators
pub fn to_workspace_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// True for paths under a dot-directory (`.git`, `.anchormark`, ...)
pub fn is_hidden(relative: &str) -> bool {
    relative.split('/').any(|part| part.starts_with('.'))
}

/// An opened workspace root with its bookmark session
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    session: Arc<Session>,
}

impl Workspace {
    pub async fn open(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("Workspace root {} not found", root.display()))?;
        let config = load_config(&root, config_path).await?;

        let state = match env::var(STATE_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => JsonFileState::new(path),
            _ => JsonFileState::for_workspace(&root),
        };
        debug!("Bookmark state at {}", state.path().display());
        let state: Arc<dyn WorkspaceState> = Arc::new(state);

        let session = Session::open(
            Some(state),
            Arc::new(LocalFileSystem::rooted(&root)),
            Arc::new(TreeSitterOutline),
            config,
        )
        .await
        .context("Failed to open bookmark session")?;

        Ok(Self {
            root,
            session: Arc::new(session),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Workspace-relative form of a command-line path.
    ///
    /// Relative paths are taken relative to the workspace root.
    pub fn relative(&self, path: &Path) -> Result<String> {
        if path.is_absolute() {
            return to_workspace_path(&self.root, path)
                .ok_or_else(|| anyhow!("{} is outside {}", path.display(), self.root.display()));
        }
        if path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(anyhow!("{} escapes the workspace root", path.display()));
        }
        let parts: Vec<String> = path
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return Err(anyhow!("{} is not a file path", path.display()));
        }
        Ok(parts.join("/"))
    }

    pub async fn load(&self, path: &Path) -> Result<TextDocument> {
        let relative = self.relative(path)?;
        let text = tokio::fs::read_to_string(self.root.join(&relative))
            .await
            .with_context(|| format!("Failed to read {relative}"))?;
        Ok(TextDocument::new(
            relative.clone(),
            self.root.to_string_lossy(),
            language_id_for_path(&relative),
            text,
        ))
    }

    pub async fn save(&self, doc: &TextDocument) -> Result<()> {
        tokio::fs::write(self.root.join(doc.file_path()), doc.text())
            .await
            .with_context(|| format!("Failed to write {}", doc.file_path()))
    }

    pub async fn reconcile(&self, doc: TextDocument) -> Result<ReconcileOutcome> {
        let path = doc.file_path().to_string();
        self.session
            .reconcile(Arc::new(doc))
            .await
            .with_context(|| format!("Failed to reconcile {path}"))
    }

    /// Persist and shut the session down
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.session) {
            Ok(session) => session.close().await?,
            Err(shared) => shared.store().lock().await.save().await?,
        }
        Ok(())
    }
}

async fn load_config(root: &Path, explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = root.join(CONFIG_FILE_NAME);
            tokio::fs::try_exists(&default)
                .await
                .unwrap_or(false)
                .then_some(default)
        }
    };
    let Some(path) = path else {
        debug!("No {CONFIG_FILE_NAME}; using default engine config");
        return Ok(EngineConfig::default());
    };

    let source = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = EngineConfig::from_toml(&source)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    info!("Loaded engine config from {}", path.display());
    Ok(config)
}
