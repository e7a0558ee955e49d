use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document {path} is not valid UTF-8 text")]
    Normalization { path: PathBuf },
    #[error("cannot read document {path}: {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid vocabulary: {0}")]
    Classification(String),
    #[error("index write failed: {0}")]
    IndexWrite(#[source] tantivy::TantivyError),
    #[error("index read failed: {0}")]
    IndexRead(#[source] tantivy::TantivyError),
    #[error("invalid query: {0}")]
    QueryParse(String),
    #[error("ledger error: {0}")]
    Ledger(#[from] storage::LedgerError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
