//! CLI command implementations

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use reelstream_core::config::ReelstreamConfig;
use reelstream_core::tracing_setup::{CliLogLevel, init_tracing};
use reelstream_core::{Settings, TorrentMetainfo};
use reelstream_search::format_size;
use reelstream_sim::{LibraryEngineFactory, scan_library};
use reelstream_web::{AppState, run_server};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server backed by a local media library
    Server {
        /// Address to bind to
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory whose entries are served as torrents
        #[arg(long)]
        library: Option<PathBuf>,
        /// Console log level
        #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
        log_level: CliLogLevel,
        /// Directory for the per-run trace log
        #[arg(long)]
        logs_dir: Option<PathBuf>,
    },
    /// Print the magnet link of a .torrent file
    Convert {
        /// Path to the .torrent file
        file: PathBuf,
    },
    /// List the magnet links a library directory serves
    Catalog {
        /// Library directory
        #[arg(long, default_value = "library")]
        library: PathBuf,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed, with context
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            library,
            log_level,
            logs_dir,
        } => {
            init_tracing(log_level.as_tracing_level(), logs_dir.as_deref())
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

            let mut config = ReelstreamConfig::from_env();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(library) = library {
                config.simulation.library_dir = library;
            }
            start_server(config).await
        }
        Commands::Convert { file } => {
            println!("{}", convert_torrent(&file).await?);
            Ok(())
        }
        Commands::Catalog { library } => {
            for line in catalog_lines(&library)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn start_server(config: ReelstreamConfig) -> Result<()> {
    let engines = Arc::new(LibraryEngineFactory::new(config.simulation.clone()));
    let catalog = engines.catalog().await.with_context(|| {
        format!(
            "Failed to read library directory {}",
            config.simulation.library_dir.display()
        )
    })?;
    tracing::info!(
        library = %config.simulation.library_dir.display(),
        entries = catalog.len(),
        "Library engine ready"
    );

    let state = AppState::new(config, Settings::from_env(), engines)
        .context("Failed to build server state")?;

    match state.manager.purge_stale_storage().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "Removed leftover session directories"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge leftover session directories"),
    }

    run_server(state).await.context("API server failed")
}

/// Reads a `.torrent` file and returns its magnet link.
async fn convert_torrent(file: &Path) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let metainfo = TorrentMetainfo::parse(&bytes)
        .with_context(|| format!("Invalid torrent file {}", file.display()))?;
    Ok(metainfo.to_magnet().to_uri())
}

/// One line per library entry: size, name and magnet link.
fn catalog_lines(library: &Path) -> Result<Vec<String>> {
    let entries = scan_library(library)
        .with_context(|| format!("Failed to read library directory {}", library.display()))?;
    Ok(entries
        .iter()
        .map(|entry| {
            format!(
                "{:>10}  {}  {}",
                format_size(entry.total_size() as f64),
                entry.name,
                entry.magnet().to_uri()
            )
        })
        .collect())
}
