use crate::document::Document;
use crate::{EngineError, Result};
use anchormark_syntax::{outline_for, SymbolNode};
use async_trait::async_trait;
use log::debug;

/// Source of the symbol hierarchy used for label breadcrumbs
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    /// Top-level symbols of `doc`, or `None` when the language has no outline
    async fn outline(&self, doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>>;
}

/// Outline from a tree-sitter parse of the document text
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterOutline;

#[async_trait]
impl SymbolProvider for TreeSitterOutline {
    async fn outline(&self, doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>> {
        let text = doc.text().to_string();
        let language_id = doc.language_id().to_string();
        let path = doc.file_path().to_string();

        let outline = tokio::task::spawn_blocking(move || outline_for(&text, &language_id))
            .await
            .map_err(|e| EngineError::SymbolError(format!("outline task failed: {e}")))??;
        if outline.is_none() {
            debug!("No outline support for {path}");
        }
        Ok(outline)
    }
}

/// Provider that never has symbols
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

#[async_trait]
impl SymbolProvider for NoSymbols {
    async fn outline(&self, _doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>> {
        Ok(None)
    }
}

/// Fixed outline for every document
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    roots: Vec<SymbolNode>,
}

impl StaticSymbols {
    #[must_use]
    pub fn new(roots: Vec<SymbolNode>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl SymbolProvider for StaticSymbols {
    async fn outline(&self, _doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>> {
        Ok(Some(self.roots.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;

    #[tokio::test]
    async fn test_tree_sitter_outline_for_rust() {
        let doc = TextDocument::new(
            "lib.rs",
            "/ws",
            "rust",
            "struct Cache;\n\nimpl Cache {\n    fn get(&self) {\n        todo!()\n    }\n}\n",
        );
        let roots = TreeSitterOutline.outline(&doc).await.unwrap().unwrap();
        let names: Vec<&str> = roots.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, vec!["Cache", "Cache"]);
        assert_eq!(roots[1].children[0].name, "get");
    }

    #[tokio::test]
    async fn test_tree_sitter_outline_unsupported_language() {
        let doc = TextDocument::new("notes.md", "/ws", "markdown", "# title\n");
        assert!(TreeSitterOutline.outline(&doc).await.unwrap().is_none());
    }
}
