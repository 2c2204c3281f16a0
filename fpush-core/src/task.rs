use crate::{
    applier::ChangeApplier,
    config::SyncConfig,
    error::{Result, SyncError},
    event::{spawn_watcher, ChangeEvent},
    filter::PathFilter,
    initial::InitialSync,
    path::{PathTranslator, RelPath},
    remote::RemoteFs,
};
use tokio::sync::watch::Ref;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Capacity of the notifier → applier queue.
const EVENT_QUEUE: usize = 1024;

/// Public handle returned to callers for controlling a running sync task.
#[derive(Debug)]
pub struct SyncTaskHandle {
    ctrl_tx: mpsc::Sender<TaskCommand>,
    state_rx: watch::Receiver<TaskState>,
    join: JoinHandle<Result<()>>,
}

impl SyncTaskHandle {
    /// Ask the task to stop after the event it is currently applying.
    pub fn stop(&self) {
        let _ = self.ctrl_tx.try_send(TaskCommand::Stop);
    }

    pub fn state(&self) -> Ref<'_, TaskState> {
        self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_rx.clone()
    }

    /// Wait for the task to finish. Must not be polled again once it has
    /// returned.
    pub async fn join(&mut self) -> Result<()> {
        match (&mut self.join).await {
            Ok(res) => res,
            Err(e) => Err(SyncError::Task(e.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskCommand {
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InitialSync,
    Watching,
    Stopped,
    Error(String),
}

/// A verified local/remote pair ready to be synced.
pub struct SyncTask<R> {
    remote: R,
    paths: PathTranslator,
    filter: PathFilter,
}

impl<R: RemoteFs> SyncTask<R> {
    /// Check the startup preconditions: the local folder is an existing
    /// directory and the remote folder exists as a directory. Nothing is
    /// created on either side.
    pub async fn prepare(cfg: &SyncConfig, remote: R) -> Result<Self> {
        let local_root = tokio::fs::canonicalize(&cfg.local_folder)
            .await
            .map_err(|e| {
                SyncError::Config(format!(
                    "local folder {} does not exist: {e}",
                    cfg.local_folder.display()
                ))
            })?;
        if !tokio::fs::metadata(&local_root)
            .await
            .map_err(|e| SyncError::io(&local_root, e))?
            .is_dir()
        {
            return Err(SyncError::Config(format!(
                "local folder {} is not a directory",
                local_root.display()
            )));
        }
        if !remote.dir_exists(&cfg.remote_folder).await? {
            return Err(SyncError::Config(format!(
                "remote folder {} does not exist",
                cfg.remote_folder
            )));
        }
        let filter = PathFilter::new(&cfg.include, &cfg.exclude)?;
        Ok(Self {
            remote,
            paths: PathTranslator::new(local_root, &cfg.remote_folder),
            filter,
        })
    }

    /// Initial sync, then watch and apply changes until stopped.
    pub async fn run(
        self,
        mut ctrl_rx: mpsc::Receiver<TaskCommand>,
        state_tx: watch::Sender<TaskState>,
    ) -> Result<()> {
        let res = self.run_inner(&mut ctrl_rx, &state_tx).await;
        match &res {
            Ok(()) => {
                let _ = state_tx.send(TaskState::Stopped);
            }
            Err(e) => {
                error!("sync task failed: {e}");
                let _ = state_tx.send(TaskState::Error(e.to_string()));
            }
        }
        res
    }

    async fn run_inner(
        &self,
        ctrl_rx: &mut mpsc::Receiver<TaskCommand>,
        state_tx: &watch::Sender<TaskState>,
    ) -> Result<()> {
        let _ = state_tx.send(TaskState::InitialSync);
        let report = InitialSync::new(&self.remote, &self.paths, &self.filter)
            .run(&RelPath::root())
            .await?;
        info!(
            uploaded = report.uploaded,
            updated = report.updated,
            unchanged = report.unchanged,
            dirs_created = report.dirs_created,
            "initial sync complete"
        );

        let (event_tx, mut event_rx) = mpsc::channel::<ChangeEvent>(EVENT_QUEUE);
        // Dropped on return, which stops the notifications.
        let _watcher = spawn_watcher(self.paths.local_root(), event_tx)?;
        let _ = state_tx.send(TaskState::Watching);

        let stats = ChangeApplier::new(&self.remote, &self.paths, &self.filter)
            .run(&mut event_rx, ctrl_rx)
            .await?;
        info!(applied = stats.applied, failed = stats.failed, "watcher stopped");
        Ok(())
    }
}

/// Verify the preconditions, then run the task in the background.
pub async fn spawn_task<R: RemoteFs>(cfg: &SyncConfig, remote: R) -> Result<SyncTaskHandle> {
    let task = SyncTask::prepare(cfg, remote).await?;
    let (ctrl_tx, ctrl_rx) = mpsc::channel(4);
    let (state_tx, state_rx) = watch::channel(TaskState::Idle);
    let join = tokio::spawn(task.run(ctrl_rx, state_tx));
    Ok(SyncTaskHandle {
        ctrl_tx,
        state_rx,
        join,
    })
}
