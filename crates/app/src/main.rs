mod config;
mod providers;
mod routes;

use anyhow::Context;
use casefile_core::{Bootstrapper, PineconeStore, SearchCoordinator};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Settings;
use providers::AppEmbedder;
use routes::{create_router, AppState, IngestForwarder};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "casefile", version, about = "Bootstrap a vector index from PDFs and search it")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: String,
    },
    /// Run the bootstrap procedure once and print the outcome.
    Ingest {
        /// Index to populate. Defaults to `PINECONE_INDEX`.
        #[arg(long)]
        index: Option<String>,
    },
    /// Print deduplicated MMR search hits as JSON.
    Search {
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    let client = settings.http_client().context("building http client")?;
    let embedder = Arc::new(AppEmbedder::from_settings(&settings, client.clone())?);
    let index = Arc::new(PineconeStore::new(client, settings.pinecone_config()));
    let bootstrapper = Arc::new(Bootstrapper::new(
        embedder.clone(),
        index.clone(),
        settings.bootstrap_options(),
    )?);
    let search = SearchCoordinator::new(embedder.clone(), index, settings.pinecone_index.clone())
        .with_options(settings.search_options());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        embedder = embedder.name(),
        index = %settings.pinecone_index,
        started_at = %Utc::now().to_rfc3339(),
        "casefile boot"
    );

    match cli.command {
        Command::Serve { bind } => {
            let connect_timeout = Duration::from_secs(settings.connect_timeout_secs);
            let forwarder = settings
                .forward_ingest_url()
                .map(|url| IngestForwarder::new(url, connect_timeout))
                .transpose()
                .context("building ingest forwarder")?;
            let state = Arc::new(AppState {
                index_name: settings.pinecone_index.clone(),
                bootstrapper,
                search,
                forwarder,
            });

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            info!(%bind, "listening");
            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("http server")?;
        }
        Command::Ingest { index } => {
            let index_name = index.unwrap_or_else(|| settings.pinecone_index.clone());
            let outcome = bootstrapper
                .run(&index_name)
                .await
                .with_context(|| format!("bootstrapping {index_name}"))?;
            println!("{}", outcome.message());
        }
        Command::Search { query } => {
            let hits = search.search(&query).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
