use crate::error::{Result, SyncError};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A path relative to a sync root, `/`-separated with no leading separator.
/// The empty path denotes the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(String);

impl RelPath {
    pub fn root() -> Self {
        RelPath(String::new())
    }

    /// Parse a `/`-separated relative path. Empty and `.` segments are dropped.
    pub fn new(s: &str) -> Self {
        let joined = s
            .split('/')
            .filter(|seg| !seg.is_empty() && *seg != ".")
            .collect::<Vec<_>>()
            .join("/");
        RelPath(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent directory; the root is its own parent.
    pub fn parent(&self) -> RelPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => RelPath(parent.to_string()),
            None => RelPath::root(),
        }
    }

    pub fn join(&self, name: &str) -> RelPath {
        if self.is_root() {
            RelPath::new(name)
        } else {
            RelPath::new(&format!("{}/{}", self.0, name))
        }
    }

    /// Cumulative non-root prefixes, shortest first: `a/b/c` yields `a`, `a/b`, `a/b/c`.
    pub fn prefixes(&self) -> Vec<RelPath> {
        let mut out = Vec::new();
        let mut acc = RelPath::root();
        for seg in self.segments() {
            acc = acc.join(seg);
            out.push(acc.clone());
        }
        out
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Maps paths between the local root and the remote root. The same
/// [`RelPath`] addresses a file in both trees.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    local_root: PathBuf,
    remote_root: String,
}

impl PathTranslator {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: &str) -> Self {
        let trimmed = remote_root.trim_end_matches('/');
        let remote_root = if trimmed.is_empty() && remote_root.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            local_root: local_root.into(),
            remote_root,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Strip the local root from an absolute local path.
    pub fn relative(&self, local: &Path) -> Result<RelPath> {
        let rest = local
            .strip_prefix(&self.local_root)
            .map_err(|_| SyncError::OutsideRoot {
                path: local.to_path_buf(),
                root: self.local_root.clone(),
            })?;
        let mut segs = Vec::new();
        for comp in rest.components() {
            match comp {
                Component::Normal(s) => {
                    let s = s
                        .to_str()
                        .ok_or_else(|| SyncError::NonUtf8Path(local.to_path_buf()))?;
                    segs.push(s);
                }
                Component::CurDir => {}
                _ => {
                    return Err(SyncError::OutsideRoot {
                        path: local.to_path_buf(),
                        root: self.local_root.clone(),
                    })
                }
            }
        }
        Ok(RelPath(segs.join("/")))
    }

    /// Strip the remote root from an absolute remote path.
    pub fn relative_remote(&self, remote: &str) -> Result<RelPath> {
        let outside = || SyncError::OutsideRoot {
            path: PathBuf::from(remote),
            root: PathBuf::from(&self.remote_root),
        };
        let rest = if self.remote_root == "/" {
            remote.strip_prefix('/').ok_or_else(outside)?
        } else {
            let rest = remote.strip_prefix(&self.remote_root).ok_or_else(outside)?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return Err(outside());
            }
            rest
        };
        if rest.split('/').any(|seg| seg == "..") {
            return Err(outside());
        }
        Ok(RelPath::new(rest))
    }

    pub fn remote_of(&self, rel: &RelPath) -> String {
        if rel.is_root() {
            self.remote_root.clone()
        } else if self.remote_root == "/" {
            format!("/{}", rel.as_str())
        } else {
            format!("{}/{}", self.remote_root, rel.as_str())
        }
    }

    pub fn local_of(&self, rel: &RelPath) -> PathBuf {
        rel.segments()
            .fold(self.local_root.clone(), |acc, seg| acc.join(seg))
    }

    pub fn to_remote(&self, local: &Path) -> Result<String> {
        Ok(self.remote_of(&self.relative(local)?))
    }

    pub fn to_local(&self, remote: &str) -> Result<PathBuf> {
        Ok(self.local_of(&self.relative_remote(remote)?))
    }
}
