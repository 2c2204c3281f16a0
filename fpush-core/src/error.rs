use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`RemoteFs`](crate::RemoteFs) implementation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote path not found: {0}")]
    NotFound(String),

    #[error("remote operation on {path} failed: {message}")]
    Failed { path: String, message: String },

    /// The transport itself is gone; nothing further can be applied.
    #[error("remote connection lost: {0}")]
    Disconnected(String),

    #[error("cannot read local file {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::Disconnected(_))
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("path {path} is outside sync root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("could not find local folder {0}")]
    MissingLocalAncestor(PathBuf),

    #[error("local io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watching local tree: {0}")]
    Watch(#[from] notify::Error),

    #[error("walking local tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether the applier loop must stop instead of moving on to the next event.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_fatal(),
            SyncError::OutsideRoot { .. }
            | SyncError::NonUtf8Path(_)
            | SyncError::Watch(_)
            | SyncError::Task(_) => true,
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
