//! AmpLink router daemon - single ingress for remote/button events.
//!
//! Tracks playback-source lifecycles, dispatches events by the routing
//! priority rules, and drives volume through the configured output adapter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use amplink_daemon::{config, signals};
use amplink_router::http;
use amplink_router::registry::SourceRegistry;
use amplink_router::relay::{AutomationHook, UiRelay};
use amplink_router::router::EventRouter;
use amplink_router::volume;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("amplink=info".parse()?)
                .add_directive("amplink_router=debug".parse()?),
        )
        .init();

    let config = config::load()?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting AmpLink router daemon");

    let registry = SourceRegistry::new(config.router.sources.clone());
    info!(count = config.router.sources.len(), "Pre-registered sources from config");

    let adapter =
        volume::build_adapter(&config.router.adapter).context("Failed to build volume adapter")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .context("Failed to build HTTP client")?;
    let relay = UiRelay::new(client.clone(), config.relay.url.clone());
    let fallback = AutomationHook::new(client.clone(), config.router.automation_url.clone());

    let router = Arc::new(EventRouter::new(
        registry,
        adapter,
        relay,
        fallback,
        client,
        config.router.menu.clone(),
        config.router.menu_tail.clone(),
        config.router.volume_step,
        config.router.initial_volume,
    ));

    let addr = format!("0.0.0.0:{}", config.router.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind router API on {addr}"))?;
    info!(%addr, "Router API listening");

    let mut shutdown_rx = signals::shutdown_channel()?;
    axum::serve(listener, http::router(router))
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await;
        })
        .await
        .context("Router API server failed")?;

    info!("AmpLink router daemon stopped");
    Ok(())
}
