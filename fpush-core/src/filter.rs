use crate::config::Pattern;
use crate::error::{Result, SyncError};
use crate::path::RelPath;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Include / exclude globs evaluated against root-relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobSet,
    exclude: GlobSet,
}

fn build(patterns: &[Pattern]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(&pat.0)
            .map_err(|e| SyncError::Config(format!("invalid glob {:?}: {e}", pat.0)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SyncError::Config(format!("cannot compile globs: {e}")))
}

impl PathFilter {
    /// An empty include list means "include everything".
    pub fn new(include: &[Pattern], exclude: &[Pattern]) -> Result<Self> {
        Ok(Self {
            include: build(include)?,
            exclude: build(exclude)?,
        })
    }

    pub fn allow_all() -> Self {
        Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
        }
    }

    /// Whether a file at `rel` should be pushed.
    pub fn check(&self, rel: &RelPath) -> bool {
        let included = self.include.is_empty() || self.include.is_match(rel.as_str());
        included && !self.excluded(rel)
    }

    /// True when `rel` or any directory above it matches an exclude glob.
    /// Excludes alone decide whether a directory is descended into; include
    /// patterns usually name files and would otherwise prune every folder.
    pub fn excluded(&self, rel: &RelPath) -> bool {
        rel.prefixes()
            .iter()
            .any(|prefix| self.exclude.is_match(prefix.as_str()))
    }
}
