// src/error.rs
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BlockError>;

#[derive(thiserror::Error, Debug)]
pub enum BlockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Path too long ({len} bytes, limit {limit}): {path:?}")]
    PathTooLong { path: PathBuf, len: usize, limit: usize },

    #[error("Cannot create block directory {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BlockError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BlockError::InvalidArgument(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BlockError::Io { path: path.into(), source }
    }
}
