//! Marathon exporter
//!
//! - Scrapes `<uri>/metrics` (and optionally `/v2/apps`) of every source on
//!   each pull of the metrics path
//! - Waits for every source with `startup_check` on to answer `/v2/info`
//!   before serving
//! - Graceful shutdown on Ctrl-C / SIGTERM

use clap::Parser;
use futures_util::future::join_all;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marathon_exporter_core::error::{ExporterError, Result};
use marathon_exporter_server::{
    app_state::AppState,
    cli::Cli,
    exporter::Exporter,
    fetch::HttpFetcher,
    router,
    startup::{self, RetryPolicy},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(kind = e.kind(), error = %e, "marathon-exporter failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = cli.into_config()?;
    let listen = cfg.exporter.listen_addr()?;

    let mut checks = Vec::new();
    for source in cfg.sources.iter().filter(|s| s.startup_check) {
        let fetcher = HttpFetcher::new(source)?;
        let instance = source.instance_id()?;
        checks.push(async move {
            startup::wait_for_source(&fetcher, &instance, RetryPolicy::default()).await
        });
    }
    for res in join_all(checks).await {
        res?;
    }

    let exporter = Exporter::from_config(&cfg)?;
    let state = AppState::new(exporter, &cfg.exporter.metrics_path);
    let app = router::build_router(state);

    tracing::info!(%listen, path = %cfg.exporter.metrics_path, sources = cfg.sources.len(), "marathon-exporter starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ExporterError::Config(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ExporterError::Internal(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("signal received, starting graceful shutdown");
}
