//! Signal handling for graceful shutdown.

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::info;

/// Arrange for SIGTERM/SIGINT to deliver one message on the returned
/// channel.
///
/// # Errors
/// Returns an error if the SIGTERM handler cannot be registered.
pub fn shutdown_channel() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(1);
    let mut term = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = term.recv() => info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                if result.is_err() {
                    return;
                }
                info!("Received SIGINT");
            }
        }
        let _ = tx.send(()).await;
    });

    Ok(rx)
}
