//! Protocol engine: USB ownership, read loop, reconnect, sender loop.
//!
//! USB reads block, so they live on a dedicated thread; everything network
//! facing runs on the tokio loop. The two sides meet only at the intake
//! queue and the shared mixer state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusb::{DeviceHandle, GlobalContext};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use amplink_core::event::RouterEvent;
use amplink_core::mixer::MixerState;

use crate::error::{ProtoError, ProtoResult};
use crate::frame::{self, ParsedMessage};
use crate::keymap;
use crate::mixer::{self, FrameSink};
use crate::queue::{IntakeQueue, QueueEntry};

/// Blocking bulk-read timeout; expiry is treated as an idle tick.
const READ_TIMEOUT: Duration = Duration::from_secs(1);
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);
/// Granularity of the interruptible reconnect wait.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

// Init handshake and address filter, replayed on every (re)connect.
const INIT_PRIMARY: &[u8] = &[0xF1];
const INIT_SECONDARY: &[u8] = &[0x80, 0x01, 0x00];
const ACCEPT_ALL_FILTER: &[u8] = &[0xF6, 0xFF, 0xFF];

/// USB addressing for the amplifier controller.
#[derive(Debug, Clone)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint_in: u8,
    pub endpoint_out: u8,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x0cd4,
            product_id: 0x0101,
            interface: 0,
            endpoint_in: 0x81,
            endpoint_out: 0x01,
        }
    }
}

/// Reconnect backoff: 2 s, then x1.5 per attempt, capped at 30 s.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_secs(2);
    const MULTIPLIER: f64 = 1.5;
    const MAX: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn new() -> Self {
        Self { current: Self::INITIAL }
    }

    /// The delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(Self::MULTIPLIER).min(Self::MAX);
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the USB handle and the read loop. The handle is exclusive to this
/// process; it is swapped atomically on reconnect.
pub struct ProtocolEngine {
    handle: Mutex<Option<Arc<DeviceHandle<GlobalContext>>>>,
    config: UsbConfig,
    queue: Arc<IntakeQueue>,
    notify: Arc<Notify>,
    state: Arc<Mutex<MixerState>>,
    shutdown: AtomicBool,
}

impl ProtocolEngine {
    /// Open the device and run the init handshake. Failure here is fatal -
    /// the process has nothing to do without its bus.
    ///
    /// # Errors
    /// Returns an error if the device is absent or the handshake fails.
    pub fn connect(
        config: UsbConfig,
        queue: Arc<IntakeQueue>,
        notify: Arc<Notify>,
        state: Arc<Mutex<MixerState>>,
    ) -> ProtoResult<Arc<Self>> {
        let handle = Self::open_device(&config)?;
        Self::init_device(&handle, &config)?;
        info!(vid = config.vendor_id, pid = config.product_id, "amplifier connected");
        state.lock().connected = true;

        Ok(Arc::new(Self {
            handle: Mutex::new(Some(Arc::new(handle))),
            config,
            queue,
            notify,
            state,
            shutdown: AtomicBool::new(false),
        }))
    }

    /// Spawn the blocking read loop on its own named thread.
    pub fn spawn_read_loop(self: &Arc<Self>) -> std::thread::JoinHandle<()> {
        let engine = Arc::clone(self);
        std::thread::Builder::new()
            .name("amplink-usb-read".to_string())
            .spawn(move || engine.read_loop())
            .expect("Failed to spawn USB read thread")
    }

    /// Ask the read loop (and any reconnect wait) to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    fn open_device(config: &UsbConfig) -> ProtoResult<DeviceHandle<GlobalContext>> {
        let mut handle = rusb::open_device_with_vid_pid(config.vendor_id, config.product_id)
            .ok_or(ProtoError::DeviceNotFound)?;
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(config.interface)?;
        Ok(handle)
    }

    /// Two fixed init frames, then the accept-all address filter.
    fn init_device(handle: &DeviceHandle<GlobalContext>, config: &UsbConfig) -> ProtoResult<()> {
        for opcode in [INIT_PRIMARY, INIT_SECONDARY, ACCEPT_ALL_FILTER] {
            handle.write_bulk(config.endpoint_out, &frame::encode(opcode), WRITE_TIMEOUT)?;
        }
        Ok(())
    }

    fn current_handle(&self) -> Option<Arc<DeviceHandle<GlobalContext>>> {
        self.handle.lock().clone()
    }

    fn read_loop(&self) {
        let mut buf = [0u8; 64];
        while !self.shutdown.load(Ordering::Relaxed) {
            let Some(handle) = self.current_handle() else {
                self.reconnect();
                continue;
            };

            match handle.read_bulk(self.config.endpoint_in, &mut buf, READ_TIMEOUT) {
                Ok(n) => self.process_frame(&buf[..n]),
                Err(rusb::Error::Timeout) => {} // idle, nothing on the bus
                Err(rusb::Error::NoDevice) => {
                    warn!("amplifier removed from the bus");
                    self.handle.lock().take();
                    self.state.lock().connected = false;
                    self.reconnect();
                }
                Err(e) => {
                    warn!(error = %e, "USB read failed");
                    std::thread::sleep(SLEEP_SLICE);
                }
            }
        }
        debug!("read loop exiting");
    }

    /// Reconnect with backoff until the device answers or shutdown is
    /// requested. The wait is interruptible.
    fn reconnect(&self) {
        let mut backoff = Backoff::new();
        while !self.shutdown.load(Ordering::Relaxed) {
            let delay = backoff.next_delay();
            info!(seconds = delay.as_secs_f64(), "waiting before reconnect attempt");
            if self.interruptible_sleep(delay) {
                return;
            }

            match Self::open_device(&self.config)
                .and_then(|h| Self::init_device(&h, &self.config).map(|()| h))
            {
                Ok(handle) => {
                    info!("amplifier reconnected");
                    *self.handle.lock() = Some(Arc::new(handle));
                    self.state.lock().connected = true;
                    return;
                }
                Err(e) => debug!(error = %e, "reconnect attempt failed"),
            }
        }
    }

    /// Sleep in slices, returning true if shutdown was requested.
    fn interruptible_sleep(&self, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.shutdown.load(Ordering::Relaxed) {
                return true;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
        self.shutdown.load(Ordering::Relaxed)
    }

    fn process_frame(&self, raw: &[u8]) {
        match frame::decode(raw) {
            Some(ParsedMessage::Feedback(feedback)) => {
                debug!(volume = feedback.volume, "mixer feedback");
                mixer::apply_feedback(&self.state, &feedback);
            }
            Some(ParsedMessage::RemoteKey(key)) => {
                debug!(key = %key.key, link = %key.link, "remote key");
                let mut event = RouterEvent::new(key.key.clone());
                event.extra.insert("link".to_string(), Value::String(key.link));
                event.extra.insert("device".to_string(), Value::String(key.device));

                let command_key = keymap::is_repeatable(&key.key).then(|| key.key);
                self.queue.add(event, command_key);
                self.notify.notify_one();
            }
            Some(ParsedMessage::Other { kind }) => {
                debug!(kind, "unhandled frame type");
            }
            None => debug!(len = raw.len(), "undecodable frame"),
        }
    }
}

/// [`FrameSink`] that writes to the engine's current bulk-out endpoint.
pub struct UsbSink {
    engine: Arc<ProtocolEngine>,
}

impl UsbSink {
    #[must_use]
    pub fn new(engine: Arc<ProtocolEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl FrameSink for UsbSink {
    async fn write_frame(&self, frame: &[u8]) -> ProtoResult<()> {
        let Some(handle) = self.engine.current_handle() else {
            return Err(ProtoError::NotConnected);
        };
        let endpoint = self.engine.config.endpoint_out;
        let data = frame.to_vec();

        tokio::task::spawn_blocking(move || {
            handle.write_bulk(endpoint, &data, WRITE_TIMEOUT).map(|_| ())
        })
        .await
        .map_err(|e| ProtoError::WriteFailed(e.to_string()))?
        .map_err(ProtoError::from)
    }
}

/// Drains the intake queue and forwards each entry to the router, with a
/// fire-and-forget pulse to the UI relay for visual feedback. Failures are
/// logged and dropped - a stale button event is worthless.
pub struct EventSender {
    queue: Arc<IntakeQueue>,
    notify: Arc<Notify>,
    client: reqwest::Client,
    event_url: String,
    relay_url: Option<String>,
}

impl EventSender {
    #[must_use]
    pub fn new(
        queue: Arc<IntakeQueue>,
        notify: Arc<Notify>,
        client: reqwest::Client,
        event_url: String,
        relay_url: Option<String>,
    ) -> Self {
        Self { queue, notify, client, event_url, relay_url }
    }

    /// Run until the task is dropped.
    pub async fn run(&self) {
        loop {
            while let Some(entry) = self.queue.get() {
                self.forward(&entry).await;
            }
            self.notify.notified().await;
        }
    }

    async fn forward(&self, entry: &QueueEntry) {
        debug!(action = %entry.event.action, count = entry.count, "forwarding remote event");
        if let Err(e) = self.client.post(&self.event_url).json(&entry.event).send().await {
            warn!(error = %e, "router unreachable, event dropped");
        }

        if let Some(url) = &self.relay_url {
            let client = self.client.clone();
            let url = url.clone();
            let body = json!({
                "command": "broadcast",
                "params": { "type": "pulse", "data": { "action": entry.event.action } },
            });
            tokio::spawn(async move {
                if let Err(e) = client.post(&url).json(&body).send().await {
                    debug!(error = %e, "UI relay pulse failed");
                }
            });
        }
    }
}
