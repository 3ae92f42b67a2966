use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Syntax error: {0}")]
    SyntaxError(#[from] anchormark_syntax::SyntaxError),

    #[error("Invalid bookmark record: {0}")]
    InvalidRecord(String),

    #[error("Invalid state path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
