use crate::{Result, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex as TokioMutex;

/// Directory holding per-workspace state, relative to the workspace root
pub const STATE_DIR_NAME: &str = ".anchormark";
const STATE_FILE_NAME: &str = "state.json";

/// Named values scoped to one workspace
#[async_trait]
pub trait WorkspaceState: Send + Sync {
    /// Stored value, or `None` when the key was never set
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Workspace state in a single JSON object on disk
pub struct JsonFileState {
    path: PathBuf,
    write_lock: TokioMutex<()>,
}

impl JsonFileState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: TokioMutex::new(()),
        }
    }

    /// State file under `<root>/.anchormark/`
    pub fn for_workspace(root: &Path) -> Self {
        Self::new(root.join(STATE_DIR_NAME).join(STATE_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Other(format!(
                "state file {} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl WorkspaceState for JsonFileState {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);

        let parent = self
            .path
            .parent()
            .ok_or_else(|| StoreError::InvalidPath("state path has no parent".into()))?;
        tokio::fs::create_dir_all(parent).await?;

        let bytes = serde_json::to_vec_pretty(&Value::Object(all))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Process-local state, lost on drop
#[derive(Default)]
pub struct MemoryState {
    values: std::sync::Mutex<HashMap<String, Value>>,
}

impl MemoryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceState for MemoryState {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::Other("memory state poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Other("memory state poisoned".into()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
