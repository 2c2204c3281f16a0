use crate::error::Result;
use crate::event::ChangeEvent;
use crate::filter::PathFilter;
use crate::folder::FolderEnsurer;
use crate::path::PathTranslator;
use crate::remote::{RemoteFs, RemoteOp};
use crate::task::TaskCommand;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub failed: usize,
}

/// Translates local change events into remote operations and runs them,
/// one event at a time.
pub struct ChangeApplier<'a, R> {
    remote: &'a R,
    paths: &'a PathTranslator,
    filter: &'a PathFilter,
}

impl<'a, R: RemoteFs> ChangeApplier<'a, R> {
    pub fn new(remote: &'a R, paths: &'a PathTranslator, filter: &'a PathFilter) -> Self {
        Self {
            remote,
            paths,
            filter,
        }
    }

    /// Remote operations for one event, in execution order. Sides of the
    /// event that the filter excludes produce nothing.
    pub fn plan(&self, event: &ChangeEvent) -> Result<Vec<RemoteOp>> {
        let mut ops = Vec::new();
        match event {
            ChangeEvent::Add(path) => {
                let rel = self.paths.relative(path)?;
                if self.filter.check(&rel) {
                    ops.push(RemoteOp::EnsureFolder { rel: rel.parent() });
                    ops.push(RemoteOp::Upload {
                        local: path.clone(),
                        remote: self.paths.remote_of(&rel),
                    });
                }
            }
            ChangeEvent::Delete(path) => {
                let rel = self.paths.relative(path)?;
                if self.filter.check(&rel) {
                    ops.push(RemoteOp::Remove {
                        remote: self.paths.remote_of(&rel),
                    });
                }
            }
            // The parent must already exist remotely since the file did.
            ChangeEvent::Modify(path) => {
                let rel = self.paths.relative(path)?;
                if self.filter.check(&rel) {
                    ops.push(RemoteOp::Upload {
                        local: path.clone(),
                        remote: self.paths.remote_of(&rel),
                    });
                }
            }
            ChangeEvent::Move { from, to } => {
                let old = self.paths.relative(from)?;
                let new = self.paths.relative(to)?;
                if self.filter.check(&old) {
                    ops.push(RemoteOp::Remove {
                        remote: self.paths.remote_of(&old),
                    });
                }
                if self.filter.check(&new) {
                    ops.push(RemoteOp::EnsureFolder { rel: new.parent() });
                    ops.push(RemoteOp::Upload {
                        local: to.clone(),
                        remote: self.paths.remote_of(&new),
                    });
                }
            }
        }
        Ok(ops)
    }

    /// Apply one event; the first failing operation ends it.
    pub async fn apply(&self, event: &ChangeEvent) -> Result<usize> {
        let ops = self.plan(event)?;
        if ops.is_empty() {
            debug!(path = %event.path().display(), "filtered out");
        }
        for op in &ops {
            self.execute(op).await?;
        }
        Ok(ops.len())
    }

    async fn execute(&self, op: &RemoteOp) -> Result<()> {
        match op {
            RemoteOp::EnsureFolder { rel } => {
                FolderEnsurer::new(self.remote, self.paths).ensure(rel).await?;
            }
            RemoteOp::Upload { local, remote } => {
                info!("Transferring {remote}");
                self.remote.upload(local, remote).await?;
            }
            RemoteOp::Remove { remote } => {
                info!("Removing {remote}");
                self.remote.remove(remote).await?;
            }
        }
        Ok(())
    }

    /// Consume events until the notifier closes or a stop is requested.
    /// A stop is only looked at between events, never during one. Failures
    /// are logged and skipped unless they are fatal.
    pub async fn run(
        &self,
        events: &mut mpsc::Receiver<ChangeEvent>,
        ctrl: &mut mpsc::Receiver<TaskCommand>,
    ) -> Result<ApplyStats> {
        let mut stats = ApplyStats::default();
        loop {
            tokio::select! {
                biased;
                Some(cmd) = ctrl.recv() => match cmd {
                    TaskCommand::Stop => {
                        info!("stop requested");
                        break;
                    }
                },
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("change notifier closed");
                        break;
                    };
                    info!("{}: {}", event.kind(), event.path().display());
                    match self.apply(&event).await {
                        Ok(_) => stats.applied += 1,
                        Err(e) if e.is_fatal() => {
                            error!("{} {} failed: {e}", event.kind(), event.path().display());
                            return Err(e);
                        }
                        Err(e) => {
                            warn!("{} {} failed: {e}", event.kind(), event.path().display());
                            stats.failed += 1;
                        }
                    }
                }
            }
        }
        Ok(stats)
    }
}
