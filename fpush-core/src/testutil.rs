//! In-memory remote used by the unit tests. Records every call so tests can
//! assert on round-trips and ordering.

use crate::error::RemoteError;
use crate::remote::RemoteFs;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DirExists(String),
    List(String),
    Upload(String),
    Remove(String),
    CreateDir(String),
    ModifyTime(String),
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { content: Vec<u8>, mtime: u64 },
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    calls: Vec<Call>,
    disconnected: bool,
}

pub struct MemoryRemote {
    state: Mutex<State>,
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((p, _)) => Some(p.to_string()),
        None => None,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl MemoryRemote {
    /// A remote whose only content is `root` and its ancestors.
    pub fn with_root(root: &str) -> Self {
        let mut nodes = BTreeMap::new();
        let mut cur = Some(root.to_string());
        while let Some(p) = cur {
            cur = parent_of(&p);
            nodes.insert(p, Node::Dir);
        }
        Self {
            state: Mutex::new(State {
                nodes,
                ..Default::default()
            }),
        }
    }

    pub fn put_dir(&self, path: &str) {
        self.state.lock().unwrap().nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn put_file(&self, path: &str, content: &[u8], mtime: u64) {
        self.state.lock().unwrap().nodes.insert(
            path.to_string(),
            Node::File {
                content: content.to_vec(),
                mtime,
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.lock().unwrap().nodes.get(path), Some(Node::Dir))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Mutating calls only: uploads, removes and directory creations.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Upload(_) | Call::Remove(_) | Call::CreateDir(_)))
            .collect()
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(RemoteError::Disconnected("session closed".into()));
        }
        state.calls.push(call);
        Ok(state)
    }
}

#[async_trait]
impl RemoteFs for MemoryRemote {
    async fn dir_exists(&self, path: &str) -> Result<bool, RemoteError> {
        let state = self.record(Call::DirExists(path.to_string()))?;
        Ok(matches!(state.nodes.get(path), Some(Node::Dir)))
    }

    async fn list_entries(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let state = self.record(Call::List(path.to_string()))?;
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        let names = state
            .nodes
            .keys()
            .filter(|k| parent_of(k).as_deref() == Some(path))
            .filter_map(|k| k.rsplit_once('/').map(|(_, name)| name.to_string()))
            .collect();
        Ok(names)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let mut state = self.record(Call::Upload(remote.to_string()))?;
        let content = std::fs::read(local).map_err(|source| RemoteError::Local {
            path: local.to_path_buf(),
            source,
        })?;
        let parent = parent_of(remote).unwrap_or_default();
        if !matches!(state.nodes.get(&parent), Some(Node::Dir)) {
            return Err(RemoteError::NotFound(remote.to_string()));
        }
        if matches!(state.nodes.get(remote), Some(Node::Dir)) {
            return Err(RemoteError::Failed {
                path: remote.to_string(),
                message: "is a directory".into(),
            });
        }
        state.nodes.insert(
            remote.to_string(),
            Node::File {
                content,
                mtime: now_secs(),
            },
        );
        Ok(())
    }

    async fn remove(&self, remote: &str) -> Result<(), RemoteError> {
        let mut state = self.record(Call::Remove(remote.to_string()))?;
        match state.nodes.get(remote) {
            Some(Node::File { .. }) => {
                state.nodes.remove(remote);
                Ok(())
            }
            Some(Node::Dir) => Err(RemoteError::Failed {
                path: remote.to_string(),
                message: "is a directory".into(),
            }),
            None => Err(RemoteError::NotFound(remote.to_string())),
        }
    }

    async fn create_dir(&self, remote: &str) -> Result<(), RemoteError> {
        let mut state = self.record(Call::CreateDir(remote.to_string()))?;
        let parent = parent_of(remote).unwrap_or_default();
        if !matches!(state.nodes.get(&parent), Some(Node::Dir)) {
            return Err(RemoteError::NotFound(remote.to_string()));
        }
        if state.nodes.contains_key(remote) {
            return Err(RemoteError::Failed {
                path: remote.to_string(),
                message: "already exists".into(),
            });
        }
        state.nodes.insert(remote.to_string(), Node::Dir);
        Ok(())
    }

    async fn modify_time(&self, remote: &str) -> Result<u64, RemoteError> {
        let state = self.record(Call::ModifyTime(remote.to_string()))?;
        match state.nodes.get(remote) {
            Some(Node::File { mtime, .. }) => Ok(*mtime),
            Some(Node::Dir) => Ok(0),
            None => Err(RemoteError::NotFound(remote.to_string())),
        }
    }
}

/// Set a local file's modification time to `secs` since the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + std::time::Duration::from_secs(secs))
        .unwrap();
}

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> std::path::PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}
