//! `reggie` command-line entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use reggie_logging::{init_subscriber, LogConfig};
use reggie_server::{run_server, ServerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reggie")]
#[command(about = "Reggie - a small self-hosted npm registry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the registry server
    Start {
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory for package storage
        #[arg(long)]
        data: Option<PathBuf>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        listen: Option<String>,

        /// Host name clients use to reach the registry
        #[arg(long)]
        host: Option<String>,

        /// Externally visible registry URL
        #[arg(long)]
        url: Option<String>,

        /// Path prefix for every route
        #[arg(long)]
        prefix: Option<String>,

        /// Do not fall back to the public npm registry
        #[arg(long)]
        no_upstream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_subscriber(&LogConfig::from_env());

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            data,
            port,
            listen,
            host,
            url,
            prefix,
            no_upstream,
        } => {
            let mut server_config = match config {
                Some(path) => ServerConfig::load(path)?,
                None => ServerConfig::default(),
            };
            if let Some(data) = data {
                server_config.store.data_dir = data;
            }
            if let Some(port) = port {
                server_config.port = port;
            }
            if let Some(listen) = listen {
                server_config.host = listen;
            }
            if let Some(host) = host {
                server_config.public_host = host;
            }
            if url.is_some() {
                server_config.registry_url = url;
            }
            if prefix.is_some() {
                server_config.prefix = prefix;
            }
            if no_upstream {
                server_config.upstream.enabled = false;
            }

            run_server(server_config).await
        }
    }
}
