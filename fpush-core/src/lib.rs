//! Core library for fpush: one-way push of a local directory tree to a remote one.
//!
//! An initial additive pass ([`InitialSync`]) brings the remote tree up to
//! date, after which local change notifications are translated into remote
//! operations by the [`ChangeApplier`], one event at a time.

mod applier;
mod config;
mod error;
mod event;
mod filter;
mod folder;
mod initial;
mod path;
mod remote;
mod task;
#[cfg(test)]
mod testutil;

pub use applier::{ApplyStats, ChangeApplier};
pub use config::{Pattern, SyncConfig};
pub use error::{RemoteError, Result, SyncError};
pub use event::{from_notify, spawn_watcher, ChangeEvent, ChangeKind, RenamePairer};
pub use filter::PathFilter;
pub use folder::FolderEnsurer;
pub use initial::{InitialSync, SyncReport};
pub use path::{PathTranslator, RelPath};
pub use remote::{RemoteFs, RemoteOp};
pub use task::{spawn_task, SyncTask, SyncTaskHandle, TaskCommand, TaskState};
