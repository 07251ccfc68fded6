//! `pkgrepo` command line.

use clap::{Parser, Subcommand};
use exn::ResultExt;
use pkgrepo::error::{ErrorKind, Result};
use pkgrepo::{Publisher, Upload, classify};
use pkgrepo_config::{Config, Store};
use pkgrepo_layout::error::ErrorKind as LayoutErrorKind;
use pkgrepo_storage::StoreHandle;
use pkgrepo_storage::backend::LocalBackend;
use pkgrepo_sync::{DebRelease, Mkrepo, SyncCoordinator, SyncSettings, Target};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Publish OS packages into object-store backed repositories.
#[derive(Parser, Debug)]
#[command(name = "pkgrepo", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "PKGREPO_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload packages and regenerate the repositories they land in.
    Upload {
        /// `kind/series/distro/version`; any segment may be an anchor.
        path: String,
        /// Product name, required for deb distributions.
        #[arg(long)]
        product: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Regenerate the existing repositories under a path.
    Update { path: String },
    /// Run the background sync worker until interrupted.
    Sync {
        /// Regenerate every existing repository once, then exit.
        #[arg(long)]
        all: bool,
    },
    /// Tell whether a store path is a file, a directory or missing.
    Stat { path: String },
}

fn open_store(store: &Store) -> Result<StoreHandle> {
    match store {
        #[cfg(feature = "s3")]
        Store::S3 { bucket, region, endpoint, key_id, key_secret, public_read } => {
            let backend = pkgrepo_storage::backend::S3Backend::new(
                "s3",
                bucket,
                region,
                endpoint.as_deref(),
                key_id,
                key_secret,
            )
            .or_raise(|| ErrorKind::Setup("s3 store".to_string()))?;
            Ok(Arc::new(backend.with_public_read(*public_read)))
        },
        #[cfg(not(feature = "s3"))]
        Store::S3 { .. } => exn::bail!(ErrorKind::Setup("s3 store: built without the `s3` feature".to_string())),
        Store::Local { root } => {
            let backend = LocalBackend::new("local", root).or_raise(|| ErrorKind::Setup("local store".to_string()))?;
            Ok(Arc::new(backend))
        },
    }
}

fn generator(config: &Config, store: &Store) -> Result<Mkrepo> {
    let (target, public_read) = match store {
        Store::S3 { bucket, region, endpoint, key_id, key_secret, public_read } => (
            Target::S3(pkgrepo_sync::S3Target {
                bucket: bucket.clone(),
                endpoint: endpoint.clone(),
                region: region.clone(),
                key_id: key_id.clone(),
                key_secret: key_secret.clone(),
            }),
            *public_read,
        ),
        Store::Local { root } => (Target::Local(root.clone()), false),
    };
    let mkrepo = Mkrepo::discover(&config.sync.command, target)
        .or_raise(|| ErrorKind::Setup("metadata generator".to_string()))?;
    Ok(mkrepo.with_force(config.sync.force).with_public_read(public_read).with_deb_release(DebRelease {
        origin: config.sync.deb_origin.clone(),
        label: config.sync.deb_label.clone(),
        description: config.sync.deb_description.clone(),
    }))
}

fn publisher(config: &Config) -> Result<Publisher> {
    let store_config = config.store.store().or_raise(|| ErrorKind::Config)?;
    let repos = config.supported_repos().or_raise(|| ErrorKind::Config)?;
    let layout = config.layout().or_raise(|| ErrorKind::Config)?;
    let store = open_store(&store_config)?;
    let settings = SyncSettings {
        idle_interval: config.sync.idle_interval(),
        retry_backoff: config.sync.retry_backoff(),
        burst_workers: config.sync.burst_workers,
    };
    let sync = SyncCoordinator::with_settings(Arc::new(generator(config, &store_config)?), settings);
    Ok(Publisher::new(store, repos, sync)
        .with_anchors(config.anchors())
        .with_layout(layout)
        .with_signing_keys(config.signing_keys()))
}

async fn read_files(files: &[PathBuf]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut contents = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
            exn::bail!(ErrorKind::Request(LayoutErrorKind::InvalidArtifact(file.display().to_string())));
        };
        let data = tokio::fs::read(file).await.or_raise(|| ErrorKind::Input(file.display().to_string()))?;
        contents.push((name.to_string(), data));
    }
    Ok(contents)
}

/// Waits for the repositories a command dirtied, giving up on any that keep
/// failing. The packages are already published by then, so that is logged
/// rather than failing the command.
async fn regenerate(publisher: &Publisher, config: &Config) -> Result<()> {
    let report = publisher
        .sync()
        .drain_bounded(config.sync.burst_workers, config.sync.max_attempts)
        .await
        .or_raise(|| ErrorKind::Sync)?;
    for repository in &report.failed {
        tracing::error!(repository = %repository, "Metadata is stale; run `pkgrepo update` or `pkgrepo sync` to retry");
    }
    Ok(())
}

async fn serve(publisher: &Publisher, on_start: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let background = publisher.sync().spawn_background(cancel.clone());
    let waited = async {
        if on_start {
            let regenerated = publisher.reconcile().await?;
            tracing::info!(regenerated, "Startup reconciliation complete");
        }
        tokio::signal::ctrl_c().await.or_raise(|| ErrorKind::Setup("signal handler".to_string()))
    }
    .await;
    tracing::info!("Stopping background sync worker");
    cancel.cancel();
    let regenerated = background.await.or_raise(|| ErrorKind::Sync)?;
    tracing::info!(regenerated, "Background sync worker stopped");
    waited
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Upload { path, product, files } => {
            let publisher = publisher(&config)?;
            let upload = Upload { path, product, files: read_files(&files).await? };
            let report = publisher.upload(&upload).await?;
            for key in &report.written {
                println!("{key}");
            }
            regenerate(&publisher, &config).await?;
        },
        Command::Update { path } => {
            let publisher = publisher(&config)?;
            for repository in publisher.update(&path).await? {
                println!("{repository}");
            }
            regenerate(&publisher, &config).await?;
        },
        Command::Sync { all: true } => {
            let regenerated = publisher(&config)?.reconcile().await?;
            tracing::info!(regenerated, "Regenerated all repositories");
        },
        Command::Sync { all: false } => serve(&publisher(&config)?, config.sync.on_start).await?,
        Command::Stat { path } => {
            let store = open_store(&config.store.store().or_raise(|| ErrorKind::Config)?)?;
            println!("{}", classify(store.as_ref(), &path).await?);
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "Command failed");
            if err.is_client_error() { ExitCode::from(2) } else { ExitCode::FAILURE }
        },
    }
}
