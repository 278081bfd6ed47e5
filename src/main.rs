//! PStream - secure client and edge proxy
//!
//! # Usage
//!
//! ```bash
//! # Catalog access through the proxy
//! pstream home
//! pstream search "blade runner" --json
//! pstream details 603
//!
//! # Run the edge proxy
//! BACKEND_INTERNAL_URL=http://127.0.0.1:3000 pstream serve
//! ```

mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pstream::api::{ApiClient, PStreamApi};
use pstream::config::ClientConfig;
use pstream::settings::InstanceSettings;
use pstream::store::{FileStore, KeyValueStore, MemoryStore};

use crate::cli::{Cli, Command, ExitCode, Output};
use crate::commands::Services;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = Cli::parse();
    run_cli(cli).await.into()
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pstream=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Composition root: one client, shared by every service
fn build_services() -> anyhow::Result<Services> {
    let store: Arc<dyn KeyValueStore> = match FileStore::new() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Settings unavailable ({}), using in-memory store", e);
            Arc::new(MemoryStore::new())
        }
    };

    let client = Arc::new(ApiClient::new(ClientConfig::from_env())?);

    Ok(Services {
        api: PStreamApi::new(client.clone(), store.clone()),
        settings: InstanceSettings::new(client, store)?,
    })
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let services = match build_services() {
        Ok(services) => services,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    match cli.command {
        Command::Home => commands::home_cmd(&services, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &services, &output).await,
        Command::Details(cmd) => commands::details_cmd(cmd, &services, &output).await,
        Command::Sources(cmd) => commands::sources_cmd(cmd, &services, &output).await,
        Command::Mock(cmd) => commands::mock_cmd(cmd, &services, &output),
        Command::Instance(cmd) => commands::instance_cmd(cmd, &services, &output).await,
        Command::Serve(cmd) => commands::serve_cmd(cmd, &output).await,
    }
}
