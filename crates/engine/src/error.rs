use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    StoreError(#[from] anchormark_store::StoreError),

    #[error("Syntax error: {0}")]
    SyntaxError(#[from] anchormark_syntax::SyntaxError),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Line {line} is outside a document of {line_count} lines")]
    InvalidLine { line: usize, line_count: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Symbol outline failed: {0}")]
    SymbolError(String),

    #[error("{0}")]
    Other(String),
}
