//! Shared debounce layer for volume backends.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{VolumeAdapter, VolumeBackend};

struct Pending {
    value: u8,
    generation: u64,
}

/// Wraps a backend so rapid `set_volume` calls coalesce: each call arms a
/// flush after the backend's window, and a newer call supersedes the pending
/// one. Only the most recent value is ever applied.
pub struct Debounced<B> {
    backend: Arc<B>,
    pending: Arc<Mutex<Pending>>,
}

impl<B: VolumeBackend> Debounced<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            pending: Arc::new(Mutex::new(Pending { value: 0, generation: 0 })),
        }
    }
}

#[async_trait]
impl<B: VolumeBackend + 'static> VolumeAdapter for Debounced<B> {
    async fn set_volume(&self, percent: u8) {
        let generation = {
            let mut pending = self.pending.lock();
            pending.generation += 1;
            pending.value = percent;
            pending.generation
        };

        let backend = Arc::clone(&self.backend);
        let pending = Arc::clone(&self.pending);
        let window = backend.debounce_window();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let value = {
                let pending = pending.lock();
                if pending.generation != generation {
                    trace!("debounced volume superseded");
                    return;
                }
                pending.value
            };
            backend.apply_volume(value).await;
        });
    }

    async fn get_volume(&self) -> Option<u8> {
        self.backend.read_volume().await
    }

    async fn power_on(&self) {
        self.backend.power_on().await;
    }

    async fn power_off(&self) {
        self.backend.power_off().await;
    }

    async fn is_on(&self) -> bool {
        self.backend.is_on().await
    }
}
