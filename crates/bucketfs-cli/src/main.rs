//! bucketfs command-line host.
//!
//! Mounts a code bucket into an in-memory tree, runs one command against
//! it, then waits for write-back to finish.
//!
//! Usage:
//!   # List the project root
//!   bucketfs --mount '/mtbucket::<base64>/my-project' ls
//!
//!   # Upload a local file
//!   bucketfs --mount "$MOUNT" put src/main.rs ./main.rs
//!
//!   # Play with an empty in-memory bucket
//!   bucketfs --offline --mount "$MOUNT" tree

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bucketfs_client::HttpStore;
use bucketfs_kernel::{FsConfig, MemFs, MemoryStore, RemoteStore};

/// Browse and edit a code bucket.
#[derive(Parser, Debug)]
#[command(name = "bucketfs")]
#[command(about = "Browse and edit a code bucket through an in-memory filesystem")]
struct Args {
    /// Capability path of the bucket (`/mtbucket::<base64>/<project>`)
    #[arg(long, env = "BUCKETFS_MOUNT")]
    mount: Option<String>,

    /// TOML config file
    #[arg(long, env = "BUCKETFS_CONFIG")]
    config: Option<PathBuf>,

    /// Use an empty in-memory store instead of the HTTP API
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file
    Cat { path: String },
    /// Show file attributes
    Stat { path: String },
    /// Upload a local file
    Put {
        path: String,
        local: PathBuf,
        /// Fail if the file already exists
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Move a file or directory
    Mv {
        from: String,
        to: String,
        /// Replace the destination if it exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Create a directory
    Mkdir { path: String },
    /// Print a directory tree
    Tree {
        #[arg(default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("bucketfs: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => FsConfig::load(path)?,
        None => FsConfig::default(),
    };

    let store: Arc<dyn RemoteStore> = if args.offline {
        tracing::info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(HttpStore::from_config(&config)?)
    };
    let fs = MemFs::with_config(store, config);

    if let Some(mount) = &args.mount {
        let remote = fs
            .mount(mount)
            .with_context(|| format!("not a capability path: {mount}"))?;
        tracing::debug!(prefix = %remote.path_prefix, "mount ready");
    }
    fs.ensure_loaded().await.context("failed to load bucket")?;

    commands::execute(&fs, args.command).await?;

    let report = fs.drain_writeback().await;
    tracing::debug!(?report, "write-back drained");

    let dead = fs.take_dead_letters();
    if dead.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    for letter in &dead {
        eprintln!(
            "bucketfs: change to {} was not saved: {:?}",
            letter.op.path, letter.reason
        );
    }
    Ok(ExitCode::FAILURE)
}
