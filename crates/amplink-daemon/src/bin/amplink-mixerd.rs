//! AmpLink mixer daemon - protocol engine for the amplifier control bus.
//!
//! Owns the USB handle exclusively: runs the blocking read loop, drains the
//! intake queue toward the router, and serves the local mixer API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amplink_core::mixer::MixerState;
use amplink_daemon::{config, signals};
use amplink_proto::engine::{EventSender, ProtocolEngine, UsbSink};
use amplink_proto::http;
use amplink_proto::mixer::MixerController;
use amplink_proto::queue::IntakeQueue;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("amplink=info".parse()?)
                .add_directive("amplink_proto=debug".parse()?),
        )
        .init();

    let config = config::load()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        device = %config.device.display_name,
        "Starting AmpLink mixer daemon"
    );

    let queue = Arc::new(IntakeQueue::new(config.queue.queue_config()));
    let notify = Arc::new(Notify::new());
    let state = Arc::new(Mutex::new(MixerState::default()));

    // No device, no point: startup failure here is fatal.
    let engine = ProtocolEngine::connect(
        config.device.usb_config()?,
        Arc::clone(&queue),
        Arc::clone(&notify),
        Arc::clone(&state),
    )
    .context("Failed to open the amplifier control bus")?;
    let read_thread = engine.spawn_read_loop();

    let controller = Arc::new(MixerController::new(
        Box::new(UsbSink::new(Arc::clone(&engine))),
        Arc::clone(&state),
        config.mixer.max_volume,
        config.mixer.default_volume,
    ));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .context("Failed to build HTTP client")?;
    let event_url = format!("{}/router/event", config.mixer.router_url.trim_end_matches('/'));
    let sender = EventSender::new(queue, notify, client, event_url, config.relay.url.clone());
    let sender_task = tokio::spawn(async move { sender.run().await });

    let addr = format!("127.0.0.1:{}", config.mixer.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind mixer API on {addr}"))?;
    info!(%addr, "Mixer API listening");

    let mut shutdown_rx = signals::shutdown_channel()?;
    axum::serve(listener, http::router(controller))
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await;
        })
        .await
        .context("Mixer API server failed")?;

    info!("Shutting down...");
    sender_task.abort();
    engine.shutdown();
    let _ = read_thread.join();

    info!("AmpLink mixer daemon stopped");
    Ok(())
}
