use crate::error::RemoteError;
use crate::path::RelPath;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A single remote step derived from a local change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// Create every missing remote ancestor of this relative directory.
    EnsureFolder { rel: RelPath },
    Upload { local: PathBuf, remote: String },
    Remove { remote: String },
}

/// Remote filesystem capability the sync engine drives. Every call is a
/// fresh round-trip; nothing is cached behind this trait.
#[async_trait]
pub trait RemoteFs: Send + Sync + 'static {
    async fn dir_exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Names of the entries directly inside `path`, without `.` and `..`.
    async fn list_entries(&self, path: &str) -> Result<Vec<String>, RemoteError>;

    /// Copy a local file to `remote`, overwriting whatever is there.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError>;

    async fn remove(&self, remote: &str) -> Result<(), RemoteError>;

    async fn create_dir(&self, remote: &str) -> Result<(), RemoteError>;

    /// Modification time in whole seconds since the Unix epoch.
    async fn modify_time(&self, remote: &str) -> Result<u64, RemoteError>;
}
