use crate::error::Result;
use crate::filter::PathFilter;
use crate::path::{PathTranslator, RelPath};
use crate::remote::RemoteFs;
use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Counters for one initial sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Files absent remotely and pushed.
    pub uploaded: usize,
    /// Files present remotely but older, pushed again.
    pub updated: usize,
    /// Files whose remote copy is as new or newer.
    pub unchanged: usize,
    pub dirs_created: usize,
}

pub(crate) fn mtime_secs(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// One-way additive pass bringing a remote subtree up to date with the local one.
/// Remote entries without a local counterpart are left alone.
pub struct InitialSync<'a, R> {
    remote: &'a R,
    paths: &'a PathTranslator,
    filter: &'a PathFilter,
}

impl<'a, R: RemoteFs> InitialSync<'a, R> {
    pub fn new(remote: &'a R, paths: &'a PathTranslator, filter: &'a PathFilter) -> Self {
        Self {
            remote,
            paths,
            filter,
        }
    }

    /// Sync the subtree at `start` (the root for a full pass). Traversal is
    /// depth-first with each directory created remotely before its children
    /// are visited. The first error aborts the pass.
    pub async fn run(&self, start: &RelPath) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        // Remote listings by directory, only for the lifetime of this pass.
        let mut listings: HashMap<RelPath, HashSet<String>> = HashMap::new();
        self.listing(&mut listings, start).await?;

        let mut walker = WalkDir::new(self.paths.local_of(start))
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry?;
            let rel = self.paths.relative(entry.path())?;
            let parent = rel.parent();
            let name = rel.file_name().unwrap_or_default().to_string();
            let remote = self.paths.remote_of(&rel);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if self.filter.excluded(&rel) {
                    debug!(path = %rel, "excluded directory");
                    walker.skip_current_dir();
                    continue;
                }
                let listed = self
                    .listing(&mut listings, &parent)
                    .await?
                    .contains(name.as_str());
                if listed && self.remote.dir_exists(&remote).await? {
                    continue;
                }
                info!("Creating remote folder {remote}");
                self.remote.create_dir(&remote).await?;
                report.dirs_created += 1;
                listings.insert(rel, HashSet::new());
            } else if file_type.is_file() {
                if !self.filter.check(&rel) {
                    debug!(path = %rel, "excluded file");
                    continue;
                }
                let listed = self
                    .listing(&mut listings, &parent)
                    .await?
                    .contains(name.as_str());
                if !listed {
                    info!("Transferring {remote}");
                    self.remote.upload(entry.path(), &remote).await?;
                    report.uploaded += 1;
                    continue;
                }
                let local_mtime = mtime_secs(&entry.metadata()?);
                let remote_mtime = self.remote.modify_time(&remote).await?;
                if local_mtime > remote_mtime {
                    info!("Updating {remote}");
                    self.remote.upload(entry.path(), &remote).await?;
                    report.updated += 1;
                } else {
                    debug!(path = %rel, local_mtime, remote_mtime, "remote is up to date");
                    report.unchanged += 1;
                }
            } else {
                debug!(path = %rel, "skipping special file");
            }
        }
        Ok(report)
    }

    async fn listing<'m>(
        &self,
        cache: &'m mut HashMap<RelPath, HashSet<String>>,
        dir: &RelPath,
    ) -> Result<&'m HashSet<String>> {
        if !cache.contains_key(dir) {
            let names = self.remote.list_entries(&self.paths.remote_of(dir)).await?;
            cache.insert(dir.clone(), names.into_iter().collect());
        }
        Ok(&cache[dir])
    }
}
