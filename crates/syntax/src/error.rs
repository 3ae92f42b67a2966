use thiserror::Error;

/// Result type for syntax operations
pub type Result<T> = std::result::Result<T, SyntaxError>;

/// Errors that can occur while scanning text or building outlines
#[derive(Error, Debug)]
pub enum SyntaxError {
    /// Failed to parse the source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Language has no outline grammar
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A marker pattern could not be compiled
    #[error("Invalid marker pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Every marker candidate was already taken
    #[error("Marker space exhausted after {attempts} attempts")]
    MarkerSpaceExhausted { attempts: usize },

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl SyntaxError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
