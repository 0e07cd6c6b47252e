//! Command-line interface for tvbox-sync.
//!
//! `sync` runs the acquisition pipeline from [`tvbox_sync_core`] once;
//! `serve` exposes the publish directory over HTTP. Business logic stays in
//! the core crate, this module only parses arguments, layers configuration
//! and reports the outcome.
//!
//! For programmatic or integration use, build a [`Cli`] and call [`run`].
use crate::load_config::load_config;
use crate::serve::{serve, DEFAULT_HOST, DEFAULT_PORT};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tvbox_sync_core::command::SystemCommandRunner;
use tvbox_sync_core::config::TransportKind;
use tvbox_sync_core::download::transport_for;
use tvbox_sync_core::synchronise::synchronise;

/// CLI for tvbox-sync: mirror a remote tvbox tree and serve it.
#[derive(Parser)]
#[clap(
    name = "tvbox-sync",
    version,
    about = "Synchronise a remote tvbox source tree into a publish directory and serve it"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the remote tree, merge it into the publish directory and rebuild the index
    Sync {
        /// Optional YAML config file; environment variables override it
        #[clap(long)]
        config: Option<PathBuf>,
        /// Acquisition strategy: `clone` or `download`
        #[clap(long)]
        transport: Option<TransportKind>,
        /// Publish directory to merge into
        #[clap(long)]
        publish_dir: Option<PathBuf>,
        /// Domain used in generated index URLs
        #[clap(long)]
        domain: Option<String>,
    },
    /// Serve a directory over HTTP
    Serve {
        #[clap(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        #[clap(long, default_value = "public")]
        dir: PathBuf,
        #[clap(long, default_value = DEFAULT_HOST)]
        host: String,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            transport,
            publish_dir,
            domain,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(kind) = transport {
                config.transport.kind = kind;
            }
            if let Some(dir) = publish_dir {
                config.publish_dir = dir;
            }
            if let Some(domain) = domain {
                config.domain = domain;
            }
            config.trace_loaded();

            tracing::info!(command = "sync", "Starting synchronisation process");
            let transport = transport_for(config.transport.kind);
            match synchronise(&config, transport.as_ref(), &SystemCommandRunner).await {
                Ok(report) => {
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    println!(
                        "Synchronised {} files, {} index entries written to {}",
                        report.files_copied,
                        report.index_entries,
                        report.index_path.display()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Serve { port, dir, host } => {
            tracing::info!(command = "serve", port, dir = %dir.display(), %host, "Starting static server");
            tokio::task::spawn_blocking(move || serve(&dir, &host, port)).await?
        }
    }
}
