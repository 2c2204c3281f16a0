use crate::error::Result;
use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Capacity of the notifier thread → pairing task queue.
const RAW_QUEUE: usize = 1024;

/// One local file mutation, in absolute local paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Add(PathBuf),
    Delete(PathBuf),
    Modify(PathBuf),
    Move { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
    Move,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Add => "add",
            ChangeKind::Delete => "delete",
            ChangeKind::Modify => "modify",
            ChangeKind::Move => "move",
        })
    }
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Add(_) => ChangeKind::Add,
            ChangeEvent::Delete(_) => ChangeKind::Delete,
            ChangeEvent::Modify(_) => ChangeKind::Modify,
            ChangeEvent::Move { .. } => ChangeKind::Move,
        }
    }

    /// Source path; for a move, where the file used to be.
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Add(p) | ChangeEvent::Delete(p) | ChangeEvent::Modify(p) => p,
            ChangeEvent::Move { from, .. } => from,
        }
    }

    pub fn dest_path(&self) -> Option<&Path> {
        match self {
            ChangeEvent::Move { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// Convert a notify event into zero or more change events. Folder
/// create/remove events are dropped: remote folders are created when the
/// files inside them arrive. A folder that appears by rename is walked and
/// reported file by file.
pub fn from_notify(event: notify::Event) -> Vec<ChangeEvent> {
    let mut out = Vec::new();
    match event.kind {
        EventKind::Create(CreateKind::File) => {
            out.extend(event.paths.into_iter().map(ChangeEvent::Add));
        }
        EventKind::Create(CreateKind::Any) => {
            out.extend(
                event
                    .paths
                    .into_iter()
                    .filter(|p| p.is_file())
                    .map(ChangeEvent::Add),
            );
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // (from, to)
            if let [from, to] = event.paths.as_slice() {
                out.extend(renamed(from, to));
            }
        }
        // Moved in from outside the watched tree.
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &event.paths {
                out.extend(added(path));
            }
        }
        // Moved out of the watched tree.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            out.extend(event.paths.into_iter().map(ChangeEvent::Delete));
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            for path in event.paths {
                if path.exists() {
                    out.extend(added(&path));
                } else {
                    out.push(ChangeEvent::Delete(path));
                }
            }
        }
        EventKind::Modify(_) => {
            out.extend(
                event
                    .paths
                    .into_iter()
                    .filter(|p| p.is_file())
                    .map(ChangeEvent::Modify),
            );
        }
        EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
            out.extend(event.paths.into_iter().map(ChangeEvent::Delete));
        }
        _ => {}
    }
    out
}

/// Regular files below `dir`, in file name order.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("cannot walk {}: {e}", dir.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn added(path: &Path) -> Vec<ChangeEvent> {
    if path.is_dir() {
        files_under(path).into_iter().map(ChangeEvent::Add).collect()
    } else {
        vec![ChangeEvent::Add(path.to_path_buf())]
    }
}

fn renamed(from: &Path, to: &Path) -> Vec<ChangeEvent> {
    if !to.is_dir() {
        return vec![ChangeEvent::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }];
    }
    files_under(to)
        .into_iter()
        .filter_map(|file| {
            let rel = file.strip_prefix(to).ok()?.to_path_buf();
            Some(ChangeEvent::Move {
                from: from.join(rel),
                to: file,
            })
        })
        .collect()
}

/// How long a rename source waits for its destination half.
const RENAME_WINDOW: Duration = Duration::from_millis(100);

/// Trackers of already reported renames, kept to swallow a trailing `Both`.
const PAIRED_MEMORY: usize = 32;

/// Joins the `From` and `To` halves of a rename into one move.
///
/// Some backends (inotify) report a rename inside the tree three times: the
/// source half, the destination half, then both paths together, all with
/// the same tracker. Others only send the halves. A source half is held
/// until its destination shows up; if anything else arrives first, or
/// [`flush`](Self::flush) is called, it was moved out of the tree and
/// becomes a delete.
#[derive(Debug, Default)]
pub struct RenamePairer {
    pending: Vec<(Option<usize>, PathBuf)>,
    paired: VecDeque<usize>,
}

impl RenamePairer {
    pub fn push(&mut self, event: notify::Event) -> Vec<ChangeEvent> {
        let tracker = event.tracker();
        let mode = match event.kind {
            EventKind::Modify(ModifyKind::Name(mode)) => Some(mode),
            _ => None,
        };
        match mode {
            Some(RenameMode::From) => {
                self.pending
                    .extend(event.paths.into_iter().map(|path| (tracker, path)));
                Vec::new()
            }
            Some(RenameMode::To) => {
                let source = tracker.and_then(|t| {
                    let i = self.pending.iter().position(|(p, _)| *p == Some(t))?;
                    Some((t, self.pending.remove(i).1))
                });
                let dest = event.paths.first().cloned();
                let mut out = self.flush();
                match (source, dest) {
                    (Some((t, from)), Some(to)) => {
                        out.extend(renamed(&from, &to));
                        self.paired.push_back(t);
                        if self.paired.len() > PAIRED_MEMORY {
                            self.paired.pop_front();
                        }
                    }
                    _ => out.extend(from_notify(event)),
                }
                out
            }
            Some(RenameMode::Both) => {
                if let Some(i) = tracker.and_then(|t| self.paired.iter().position(|p| *p == t)) {
                    self.paired.remove(i);
                    return Vec::new();
                }
                if let Some(from) = event.paths.first() {
                    self.pending.retain(|(_, p)| p != from);
                }
                let mut out = self.flush();
                out.extend(from_notify(event));
                out
            }
            _ => {
                let mut out = self.flush();
                out.extend(from_notify(event));
                out
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Give up on every held source half.
    pub fn flush(&mut self) -> Vec<ChangeEvent> {
        self.pending
            .drain(..)
            .map(|(_, path)| ChangeEvent::Delete(path))
            .collect()
    }
}

async fn forward_events(mut raw: mpsc::Receiver<notify::Event>, tx: mpsc::Sender<ChangeEvent>) {
    let mut pairer = RenamePairer::default();
    loop {
        let changes = tokio::select! {
            event = raw.recv() => match event {
                Some(event) => pairer.push(event),
                None => break,
            },
            _ = tokio::time::sleep(RENAME_WINDOW), if pairer.has_pending() => pairer.flush(),
        };
        for change in changes {
            if tx.send(change).await.is_err() {
                return;
            }
        }
    }
    for change in pairer.flush() {
        if tx.send(change).await.is_err() {
            return;
        }
    }
}

/// Watch `root` recursively and feed change events into `tx`, in the order
/// the filesystem reports them. When the channel is full the notifier thread
/// blocks, so bursts queue here rather than in the applier. Dropping the
/// returned watcher stops the notifications and closes `tx`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_watcher(root: &Path, tx: mpsc::Sender<ChangeEvent>) -> Result<RecommendedWatcher> {
    let (raw_tx, raw_rx) = mpsc::channel::<notify::Event>(RAW_QUEUE);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = raw_tx.blocking_send(event);
            }
            Err(e) => warn!("watch error: {e}"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tokio::spawn(forward_events(raw_rx, tx));
    info!("Watching changes in: {}", root.display());
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};
    use notify::Event;
    use std::time::Duration;

    #[test]
    fn maps_file_events() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();

        let add = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(from_notify(add), vec![ChangeEvent::Add(file.clone())]);

        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        assert_eq!(from_notify(modify), vec![ChangeEvent::Modify(file.clone())]);

        let touch = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)))
            .add_path(file.clone());
        assert_eq!(from_notify(touch), vec![ChangeEvent::Modify(file.clone())]);

        let gone = dir.path().join("gone.txt");
        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(gone.clone());
        assert_eq!(from_notify(remove), vec![ChangeEvent::Delete(gone)]);
    }

    #[test]
    fn maps_renames_with_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("old.txt");
        let to = dir.path().join("new.txt");
        std::fs::write(&to, b"x").unwrap();

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone());
        let events = from_notify(both);
        assert_eq!(events, vec![ChangeEvent::Move { from: from.clone(), to: to.clone() }]);
        assert_eq!(events[0].kind(), ChangeKind::Move);
        assert_eq!(events[0].dest_path(), Some(to.as_path()));

        let half = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(from.clone());
        assert_eq!(from_notify(half), vec![ChangeEvent::Delete(from)]);
    }

    fn rename(mode: RenameMode) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Name(mode)))
    }

    #[test]
    fn folder_rename_moves_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        std::fs::create_dir_all(new.join("deep")).unwrap();
        std::fs::write(new.join("a.txt"), b"a").unwrap();
        std::fs::write(new.join("deep/b.txt"), b"b").unwrap();

        let events = from_notify(rename(RenameMode::Both).add_path(old.clone()).add_path(new.clone()));
        assert_eq!(
            events,
            vec![
                ChangeEvent::Move { from: old.join("a.txt"), to: new.join("a.txt") },
                ChangeEvent::Move { from: old.join("deep/b.txt"), to: new.join("deep/b.txt") },
            ]
        );
    }

    #[test]
    fn moved_in_paths_become_adds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();
        let folder = dir.path().join("incoming");
        std::fs::create_dir_all(folder.join("sub")).unwrap();
        std::fs::write(folder.join("sub/c.txt"), b"c").unwrap();

        assert_eq!(
            from_notify(rename(RenameMode::To).add_path(file.clone())),
            vec![ChangeEvent::Add(file.clone())]
        );
        assert_eq!(
            from_notify(rename(RenameMode::To).add_path(folder.clone())),
            vec![ChangeEvent::Add(folder.join("sub/c.txt"))]
        );
        // Backends that cannot tell the halves apart.
        let gone = dir.path().join("gone.txt");
        assert_eq!(
            from_notify(rename(RenameMode::Any).add_path(file.clone()).add_path(gone.clone())),
            vec![ChangeEvent::Add(file), ChangeEvent::Delete(gone)]
        );
    }

    #[test]
    fn pairer_joins_rename_halves() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("old.txt");
        let to = dir.path().join("new.txt");
        std::fs::write(&to, b"x").unwrap();
        let mut pairer = RenamePairer::default();

        assert!(pairer.push(rename(RenameMode::From).add_path(from.clone()).set_tracker(7)).is_empty());
        assert!(pairer.has_pending());
        assert_eq!(
            pairer.push(rename(RenameMode::To).add_path(to.clone()).set_tracker(7)),
            vec![ChangeEvent::Move { from: from.clone(), to: to.clone() }]
        );
        assert!(!pairer.has_pending());
        let both = rename(RenameMode::Both)
            .add_path(from.clone())
            .add_path(to.clone())
            .set_tracker(7);
        assert!(pairer.push(both).is_empty());

        // Without a tracker the combined event settles the held source.
        assert!(pairer.push(rename(RenameMode::From).add_path(from.clone())).is_empty());
        assert_eq!(
            pairer.push(rename(RenameMode::Both).add_path(from.clone()).add_path(to.clone())),
            vec![ChangeEvent::Move { from, to }]
        );
        assert!(!pairer.has_pending());
    }

    #[test]
    fn pairer_turns_unmatched_source_into_delete() {
        let dir = tempfile::tempdir().unwrap();
        let left = dir.path().join("left.txt");
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();
        let mut pairer = RenamePairer::default();

        assert!(pairer.push(rename(RenameMode::From).add_path(left.clone()).set_tracker(1)).is_empty());
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(
            pairer.push(create),
            vec![ChangeEvent::Delete(left.clone()), ChangeEvent::Add(file.clone())]
        );

        assert!(pairer.push(rename(RenameMode::From).add_path(left.clone()).set_tracker(2)).is_empty());
        assert_eq!(pairer.flush(), vec![ChangeEvent::Delete(left)]);
        assert!(pairer.flush().is_empty());

        // A destination half whose source was already given up on.
        assert_eq!(
            pairer.push(rename(RenameMode::To).add_path(file.clone()).set_tracker(2)),
            vec![ChangeEvent::Add(file)]
        );
    }

    #[test]
    fn ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let mkdir = Event::new(EventKind::Create(CreateKind::Folder)).add_path(sub.clone());
        assert!(from_notify(mkdir).is_empty());
        let any = Event::new(EventKind::Create(CreateKind::Any)).add_path(sub.clone());
        assert!(from_notify(any).is_empty());
        let rmdir = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(sub.clone());
        assert!(from_notify(rmdir).is_empty());
        let meta = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(sub);
        assert!(from_notify(meta).is_empty());
    }

    #[tokio::test]
    async fn watcher_reports_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let _watcher = spawn_watcher(&root, tx).unwrap();

        let file = root.join("hello.txt");
        std::fs::write(&file, b"hi").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(ev) = rx.recv().await {
                if ev.path() == file {
                    return Some(ev);
                }
            }
            None
        })
        .await
        .expect("no event within timeout");
        assert!(matches!(seen, Some(ChangeEvent::Add(_)) | Some(ChangeEvent::Modify(_))));
    }
}
