mod args;
mod config;
mod fetcher;
mod refresher;
mod routes;
mod script;
mod store;

use anyhow::{Context, Result};
use args::Arguments;
use clap::Parser;
use fetcher::GitHubReleases;
use refresher::Refresher;
use std::sync::Arc;
use store::VersionStore;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Arguments::parse();
    let mut config = config::read_config(args.config_path.as_deref()).await?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    debug!("Config: {:#?}", config);

    let store = Arc::new(VersionStore::new());
    let source = GitHubReleases::new(&config.upstream)
        .with_context(|| "failed to build upstream HTTP client")?;

    let refresher = Refresher::new(
        config.upstream.refresh_interval(),
        Arc::clone(&store),
        Arc::new(source),
    )
    .start();
    debug!(state = ?refresher.state(), "Refresher started");

    let app = routes::build(routes::AppState {
        store,
        repository_url: Arc::from(config.upstream.repository_url.as_str()),
    });

    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", addr))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "HTTP server terminated unexpectedly")?;

    info!("Server stopped; shutting down refresher.");
    refresher.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
