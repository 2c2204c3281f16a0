use crate::error::{Result, SyncError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Glob pattern, compiled into a [`PathFilter`](crate::PathFilter) at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern(pub String);

/// Everything needed to connect and keep one local folder pushed to a remote one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(alias = "ip")]
    pub host: String,
    pub user: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(alias = "private_key")]
    pub private_key_path: PathBuf,
    pub local_folder: PathBuf,
    pub remote_folder: String,
    #[serde(default)]
    pub include: Vec<Pattern>,
    #[serde(default)]
    pub exclude: Vec<Pattern>,
    /// Allowed host key fingerprints (SHA256) or base64 keys
    #[serde(default)]
    pub fingerprints: Option<Vec<String>>,
}

fn port_from_number_or_string<'de, D>(de: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Num(u16),
        Text(String),
    }
    match Port::deserialize(de)? {
        Port::Num(n) => Ok(n),
        Port::Text(s) if s.trim().is_empty() => Ok(0),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl SyncConfig {
    /// Read and validate a config file. The format follows the extension:
    /// `.json` is JSON, everything else is parsed as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("could not read {}: {e}", path.display())))?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let cfg: SyncConfig = match ext {
            "json" => serde_json::from_str(&text)
                .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?,
            _ => serde_yaml::from_str(&text)
                .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?,
        };
        cfg.validate()
    }

    /// Reject empty required fields and normalise the remote folder.
    pub fn validate(mut self) -> Result<Self> {
        let required = [
            ("host", self.host.trim().is_empty()),
            ("user", self.user.trim().is_empty()),
            ("private_key_path", self.private_key_path.as_os_str().is_empty()),
            ("local_folder", self.local_folder.as_os_str().is_empty()),
            ("remote_folder", self.remote_folder.trim().is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, empty)| *empty) {
            return Err(SyncError::Config(format!("property {name} is empty")));
        }
        if self.port == 0 {
            return Err(SyncError::Config("property port is empty".into()));
        }
        if !self.remote_folder.starts_with('/') {
            return Err(SyncError::Config(format!(
                "remote_folder must be absolute, got {}",
                self.remote_folder
            )));
        }
        let trimmed = self.remote_folder.trim_end_matches('/');
        self.remote_folder = if trimmed.is_empty() { "/".into() } else { trimmed.into() };
        Ok(self)
    }
}
