//! netpulse -- client-side network quality probe.
//!
//! Measures round-trip latency and approximate download throughput over
//! HTTP, derives an upload estimate from reported link capacity, and grades
//! the connection into a discrete signal quality.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod diagnostics;
pub mod link;
pub mod probes;
pub mod quality;
pub mod report;
pub mod system;
pub mod throughput;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::NetpulseConfig;
use crate::connectivity::{ConnectivityObserver, ConnectivityState};
use crate::diagnostics::DiagnosticsRunner;

/// Build a runner wired to the host environment: reachability from the
/// routing table, link metadata per `[link]`, HTTP probes per `[probes]`.
pub fn build_runner(cfg: &NetpulseConfig) -> Result<DiagnosticsRunner> {
    let observer = ConnectivityObserver::new(system::network::reachability());
    tracing::info!(connectivity = %observer.current(), "environment connectivity");
    DiagnosticsRunner::from_config(cfg, observer).context("failed to build HTTP probes")
}

/// Serve the diagnostics API until Ctrl-C.
///
/// Connectivity follows default-route changes for the lifetime of the server.
pub async fn serve(cfg: &NetpulseConfig, bind: &str) -> Result<()> {
    let runner = Arc::new(build_runner(cfg)?);
    let observer = runner.connectivity().clone();

    let shutdown = CancellationToken::new();
    let _stop_watcher = shutdown.clone().drop_guard();
    let watcher = tokio::spawn(system::route_monitor::watch_default_route(
        observer.clone(),
        shutdown.clone(),
    ));
    let transitions = observer.subscribe(|state| match state {
        ConnectivityState::Offline => tracing::warn!("connectivity lost, runs will report disconnected"),
        ConnectivityState::Online => tracing::info!("connectivity restored"),
    });

    let app = api::router(api::state::AppState { runner });

    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;
    tracing::info!(%addr, "netpulse API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("shutting down");
    shutdown.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "route monitor task failed");
    }
    transitions.unsubscribe();

    Ok(())
}
