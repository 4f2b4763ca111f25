use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to list directory {path}: {source}")]
    DirList {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Cache serialization error: {0}")]
    CacheSerialization(#[from] serde_json::Error),

    #[error("Coordinator has been disposed")]
    Disposed,

    #[error("Analysis worker panicked")]
    WorkerPanic,

    #[error(transparent)]
    Shared(Arc<IndexError>),

    #[error("{0}")]
    General(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// True when the underlying cause is a "not found" condition callers
    /// treat as "absent" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileRead { source, .. }
            | Self::FileWrite { source, .. }
            | Self::DirList { source, .. }
            | Self::Stat { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Shared(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// Wrap into a cheaply cloneable form for fan-out to concurrent waiters.
    pub fn into_shared(self) -> Arc<IndexError> {
        match self {
            Self::Shared(inner) => inner,
            other => Arc::new(other),
        }
    }
}
