//! crdtfs shell binary.
//!
//! Opens a filesystem over a store, starts the background refresh and runs
//! filesystem commands from a script or stdin.
//!
//! Usage:
//!   # Interactive, in-memory store
//!   crdtfs
//!
//!   # Run a script against a config file's store
//!   crdtfs --config ~/.config/crdtfs/crdtfs.toml setup.fs
//!
//!   # Debug logging
//!   RUST_LOG=crdtfs_kernel=debug crdtfs --refresh-ms 1000

mod command;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crdtfs_kernel::{CrdtFs, FsConfig, StoreEndpoint};
use crdtfs_store::{MemoryStore, RemoteStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

use crate::command::Command;

/// Command-line driver for the crdtfs filesystem core.
#[derive(Parser, Debug)]
#[command(name = "crdtfs")]
#[command(about = "Run filesystem commands against a CRDT-backed store")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Store endpoint: "memory" or <host>:<port> (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Key namespace in the store (overrides the config file)
    #[arg(long)]
    namespace: Option<String>,

    /// Path-map refresh interval in milliseconds (overrides the config file)
    #[arg(long)]
    refresh_ms: Option<u64>,

    /// Script to run; reads stdin when absent
    script: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<FsConfig> {
        let mut config = match &self.config {
            Some(file) => {
                let path: PathBuf = shellexpand::tilde(file).as_ref().into();
                FsConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?
            }
            None => FsConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.store.endpoint = endpoint.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.store.namespace = namespace.clone();
        }
        if let Some(ms) = self.refresh_ms {
            config = config.with_refresh_interval(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

fn connect(config: &FsConfig) -> Result<Arc<dyn RemoteStore>> {
    match config.store.endpoint()? {
        StoreEndpoint::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreEndpoint::Remote { host, port } => {
            bail!("no transport for remote store {}:{}; use endpoint = \"memory\"", host, port)
        }
    }
}

async fn run_lines(fs: &CrdtFs, input: impl AsyncBufRead + Unpin, prompt: bool) -> Result<usize> {
    let mut lines = input.lines();
    let mut failures = 0;
    let mut stdout = std::io::stdout();

    loop {
        if prompt {
            use std::io::Write;
            print!("crdtfs> ");
            stdout.flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                failures += 1;
                println!("error: {}", e);
                continue;
            }
        };
        if let Err(e) = cmd.execute(fs, &mut stdout).await {
            failures += 1;
            println!("error: {}", e);
        }
    }
    Ok(failures)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let store = connect(&config)?;

    let fs = CrdtFs::open(store, config)
        .await
        .context("opening filesystem")?;
    let scheduler = fs.spawn_refresh();
    tracing::info!(
        refresh_ms = scheduler.period().as_millis() as u64,
        "crdtfs ready"
    );

    let failures = match &args.script {
        Some(script) => {
            let path: PathBuf = shellexpand::tilde(script).as_ref().into();
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening script {}", path.display()))?;
            run_lines(&fs, BufReader::new(file), false).await?
        }
        None => run_lines(&fs, BufReader::new(tokio::io::stdin()), true).await?,
    };

    scheduler.shutdown().await;
    if failures > 0 {
        tracing::warn!(failures, "some commands failed");
    }
    Ok(())
}
