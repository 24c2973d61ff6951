//! omnilingo-import - Common Voice dump importer
//!
//! Usage: `omnilingo-import <DATASET_DIR> <INDEX_PATH> [OPTIONS]`

use anyhow::{Context, Result};
use clap::Parser;
use omnilingo_common::config::{load_optional, resolve_config_path, TomlConfig};
use omnilingo_import::config::{resolve_settings, CliOverrides, ImportSettings};
use omnilingo_import::engine::FailurePolicy;
use omnilingo_import::store::{IpfsConnector, LocalHashConnector, StoreConnector};
use omnilingo_import::{ImportOptions, ImportReport, Importer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for omnilingo-import
#[derive(Parser, Debug)]
#[command(name = "omnilingo-import")]
#[command(about = "Import a Common Voice dump into IPFS and index clips by sentence")]
#[command(version)]
struct Args {
    /// Dump directory containing validated.tsv and clips/
    dataset_dir: PathBuf,

    /// Where to write the sentence → clips JSON index
    index_path: PathBuf,

    /// Compute identifiers only: nothing is stored and clips are not tagged
    #[arg(long)]
    dry_run: bool,

    /// Use local SHA-256 identifiers instead of an IPFS node
    #[arg(long)]
    offline: bool,

    /// Upper bound on records per chunk
    #[arg(long)]
    max_chunk: Option<usize>,

    /// Override the detected logical core count
    #[arg(long)]
    workers: Option<usize>,

    /// Keep going when a chunk fails and write the partial index
    #[arg(long)]
    best_effort: bool,

    /// IPFS HTTP API base URL
    #[arg(long)]
    ipfs_api: Option<String>,

    /// Add content to IPFS without pinning it
    #[arg(long)]
    no_pin: bool,

    /// License stored in sentence documents and clip tags
    #[arg(long)]
    copyright: Option<String>,

    /// Config file (default: ~/.config/omnilingo/import.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve /health and /progress on this address while importing
    #[arg(long, env = "OMNILINGO_STATUS_ADDR")]
    status_addr: Option<SocketAddr>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Never draw progress bars
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let loaded = load_optional(config_path.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| TomlConfig::default().logging.level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting omnilingo-import");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let toml_config = loaded.unwrap_or_else(|e| {
        warn!("{}; continuing with defaults", e);
        TomlConfig::default()
    });

    let settings = resolve_settings(
        &CliOverrides {
            ipfs_api_url: args.ipfs_api.clone(),
            max_chunk: args.max_chunk,
            workers: args.workers,
            copyright: args.copyright.clone(),
        },
        &toml_config,
    )?;

    let options = ImportOptions {
        max_chunk: settings.max_chunk,
        host_parallelism: settings.workers,
        policy: if args.best_effort {
            FailurePolicy::BestEffort
        } else {
            FailurePolicy::Strict
        },
        copyright: settings.copyright.clone(),
        dry_run: args.dry_run,
        render_progress: !args.no_progress,
        status_addr: args.status_addr,
        report_path: args.report.clone(),
    };

    let report = if args.offline {
        run(LocalHashConnector, options, &args).await?
    } else {
        let connector = connect_ipfs(&settings, args.dry_run, !args.no_pin).await?;
        run(connector, options, &args).await?
    };

    if !report.failures.is_empty() {
        warn!(
            failed_chunks = report.failures.len(),
            "Import finished with failed chunks, the index is partial"
        );
    }

    Ok(())
}

async fn connect_ipfs(settings: &ImportSettings, only_hash: bool, pin: bool) -> Result<IpfsConnector> {
    let connector = IpfsConnector::new(settings.ipfs_api_url.clone(), only_hash).with_pin(pin);
    connector
        .check()
        .await
        .with_context(|| format!("IPFS node at {} is not reachable", connector.api_url()))?;
    Ok(connector)
}

async fn run<C: StoreConnector>(connector: C, options: ImportOptions, args: &Args) -> Result<ImportReport> {
    let importer = Importer::new(options, Arc::new(connector));
    importer
        .run(&args.dataset_dir, &args.index_path)
        .await
        .with_context(|| format!("Import of {} failed", args.dataset_dir.display()))
}
