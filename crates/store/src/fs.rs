use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Existence checks for files referenced by bookmarks
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
}

/// Local disk; relative paths resolve against `root` when one is set
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    root: Option<PathBuf>,
}

impl LocalFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .unwrap_or(false)
    }
}

/// Fixed set of paths that exist; everything else is missing
#[derive(Debug, Clone, Default)]
pub struct StaticFileSystem {
    paths: HashSet<String>,
}

impl StaticFileSystem {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FileSystem for StaticFileSystem {
    async fn exists(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_fs_resolves_relative_paths() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("a.rs"), b"").await.unwrap();

        let fs = LocalFileSystem::rooted(temp.path());
        assert!(fs.exists("a.rs").await);
        assert!(!fs.exists("b.rs").await);

        let absolute = temp.path().join("a.rs");
        assert!(LocalFileSystem::new().exists(&absolute.to_string_lossy()).await);
    }

    #[tokio::test]
    async fn test_static_fs() {
        let fs = StaticFileSystem::new(["a.rs"]);
        assert!(fs.exists("a.rs").await);
        assert!(!fs.exists("b.rs").await);
    }
}
