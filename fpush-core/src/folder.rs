use crate::error::{Result, SyncError};
use crate::path::{PathTranslator, RelPath};
use crate::remote::RemoteFs;
use tracing::{debug, info};

/// Creates missing remote directories along a relative path, parent first.
pub struct FolderEnsurer<'a, R> {
    remote: &'a R,
    paths: &'a PathTranslator,
}

impl<'a, R: RemoteFs> FolderEnsurer<'a, R> {
    pub fn new(remote: &'a R, paths: &'a PathTranslator) -> Self {
        Self { remote, paths }
    }

    /// Walk the cumulative prefixes of `rel` and create each one that is a
    /// local directory but absent remotely. Stops at the first prefix that is
    /// not a local directory. Returns the number of directories created.
    pub async fn ensure(&self, rel: &RelPath) -> Result<usize> {
        let mut created = 0;
        for prefix in rel.prefixes() {
            let local = self.paths.local_of(&prefix);
            let meta = match tokio::fs::metadata(&local).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SyncError::MissingLocalAncestor(local));
                }
                Err(e) => return Err(SyncError::io(local, e)),
            };
            if !meta.is_dir() {
                debug!(path = %prefix, "not a local directory, stop ensuring");
                break;
            }
            let remote = self.paths.remote_of(&prefix);
            if !self.remote.dir_exists(&remote).await? {
                info!("Creating remote folder {remote}");
                self.remote.create_dir(&remote).await?;
                created += 1;
            }
        }
        Ok(created)
    }
}
