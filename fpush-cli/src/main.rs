use anyhow::{Context, Result};
use clap::Parser;
use fpush_core::{spawn_task, SyncConfig};
use fpush_sftp::SftpRemote;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fpush", version, about = "fpush: push a local folder to a remote one over SFTP and keep it there")]
struct Cli {
    /// Path to config file (JSON / YAML)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cfg = SyncConfig::load(&cli.config)?;

    let remote = SftpRemote::connect(
        &cfg.host,
        cfg.port,
        &cfg.user,
        &cfg.private_key_path,
        cfg.fingerprints.clone(),
    )
    .await?;
    let mut handle = spawn_task(&cfg, remote)
        .await
        .context("startup check failed")?;

    info!("fpush running... press Ctrl+C to stop");
    tokio::select! {
        res = handle.join() => {
            res?;
            warn!("sync task ended on its own");
        }
        sig = tokio::signal::ctrl_c() => {
            sig?;
            info!("Stopping");
            handle.stop();
            handle.join().await?;
        }
    }
    Ok(())
}
