//! SFTP implementation of the fpush remote filesystem.

mod ssh_client;
mod utils;

use crate::utils::{io_error, remote_error};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fpush_core::{RemoteError, RemoteFs};
use russh::client::{self, AuthResult};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg};
use russh_sftp::client::SftpSession;
use ssh_client::Client;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub struct SftpRemote {
    sftp: SftpSession,
    // Keeps the SSH connection open for as long as the SFTP channel is used.
    _session: client::Handle<Client>,
}

impl SftpRemote {
    /// Connect and authenticate with a private key file.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        key_path: &Path,
        allowed_fingerprints: Option<Vec<String>>,
    ) -> Result<Self> {
        let key = load_secret_key(key_path, None)
            .with_context(|| format!("could not load private key {}", key_path.display()))?;

        let config = client::Config::default();
        let mut session = client::connect(
            Arc::new(config),
            (host, port),
            Client {
                allowed_fingerprints,
            },
        )
        .await
        .with_context(|| format!("could not connect to {host}:{port}"))?;

        let hash_alg = session.best_supported_rsa_hash().await?.flatten();
        let res = session
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await?;
        if let AuthResult::Failure {
            remaining_methods,
            partial_success,
        } = res
        {
            return Err(anyhow!(
                "Authentication failed for {user}, remaining_methods: {:?}, partial_success: {}",
                remaining_methods,
                partial_success
            ));
        }

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;
        info!("connected to {user}@{host}:{port}, current path: {:?}", sftp.canonicalize(".").await?);
        Ok(Self {
            sftp,
            _session: session,
        })
    }
}

#[async_trait]
impl RemoteFs for SftpRemote {
    async fn dir_exists(&self, path: &str) -> Result<bool, RemoteError> {
        match self.sftp.metadata(path).await {
            Ok(attrs) => Ok(attrs.is_dir()),
            Err(e) => match remote_error(path, e) {
                RemoteError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn list_entries(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| remote_error(path, e))?;
        Ok(entries
            .map(|entry| entry.file_name())
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let mut reader = tokio::fs::File::open(local)
            .await
            .map_err(|source| RemoteError::Local {
                path: local.to_path_buf(),
                source,
            })?;
        let mut remote_file = self
            .sftp
            .create(remote)
            .await
            .map_err(|e| remote_error(remote, e))?;
        tokio::io::copy(&mut reader, &mut remote_file)
            .await
            .map_err(|e| io_error(remote, e))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| io_error(remote, e))?;
        Ok(())
    }

    async fn remove(&self, remote: &str) -> Result<(), RemoteError> {
        self.sftp
            .remove_file(remote)
            .await
            .map_err(|e| remote_error(remote, e))
    }

    async fn create_dir(&self, remote: &str) -> Result<(), RemoteError> {
        self.sftp
            .create_dir(remote)
            .await
            .map_err(|e| remote_error(remote, e))
    }

    async fn modify_time(&self, remote: &str) -> Result<u64, RemoteError> {
        let attrs = self
            .sftp
            .metadata(remote)
            .await
            .map_err(|e| remote_error(remote, e))?;
        attrs.mtime.map(u64::from).ok_or_else(|| RemoteError::Failed {
            path: remote.to_string(),
            message: "server did not report a modification time".into(),
        })
    }
}
