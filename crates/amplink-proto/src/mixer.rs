//! Mixer command sequencing and state reconciliation.
//!
//! The amplifier gives no error signal for a bad command sequence, only
//! undefined behavior, so the hardware's ordering rules are enforced here
//! procedurally: fixed sequences, fixed delays, relative volume stepping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::debug;

use amplink_core::mixer::{MixerState, RoutingMode};

use crate::error::ProtoResult;
use crate::frame::{
    self, MixerFeedback, OP_POWER_MUTE, OP_ROUTING_PRIMARY, OP_ROUTING_SECONDARY, OP_SET_PARAMS,
    OP_SOURCE_ACTIVATE, OP_VOLUME_STEP,
};

/// Settle time after a power byte before the follow-up command.
const POWER_SETTLE: Duration = Duration::from_millis(50);
/// Minimum gap between consecutive relative volume steps.
const STEP_INTERVAL: Duration = Duration::from_millis(20);

// Operands for OP_POWER_MUTE.
const MUTE_ON: u8 = 0x00;
const MUTE_OFF: u8 = 0x01;
const POWER_ON: u8 = 0x81; // power bit set, device comes up unmute-capable
const POWER_OFF: u8 = 0x80;

// Operands for OP_VOLUME_STEP.
const STEP_UP: u8 = 0x01;
const STEP_DOWN: u8 = 0xFF;

const LOCAL_SOURCE_ID: u8 = 0x01;

/// Sink for encoded frames. The engine writes to the USB bulk pipe; tests
/// record what would have gone over the wire.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Write one complete frame.
    ///
    /// # Errors
    /// Returns an error if the bus write fails or the device is gone.
    async fn write_frame(&self, frame: &[u8]) -> ProtoResult<()>;
}

/// Sequences mixer commands and keeps the tracked [`MixerState`] current.
///
/// State is shared with the read loop, which applies hardware feedback
/// directly; feedback is last-write-wins because the device is authoritative
/// once it reports.
pub struct MixerController {
    sink: Box<dyn FrameSink>,
    state: Arc<Mutex<MixerState>>,
    max_volume: u8,
    default_volume: u8,
}

impl MixerController {
    #[must_use]
    pub fn new(
        sink: Box<dyn FrameSink>,
        state: Arc<Mutex<MixerState>>,
        max_volume: u8,
        default_volume: u8,
    ) -> Self {
        Self { sink, state, max_volume, default_volume }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MixerState {
        self.state.lock().clone()
    }

    /// Power the amplifier on.
    ///
    /// Sequence required by the hardware: power byte, settle, explicit
    /// unmute. Absolute parameters are only reliable in this window, so the
    /// initial volume goes out as an absolute write here.
    ///
    /// # Errors
    /// Returns an error if a bus write fails.
    pub async fn power_on(&self, volume: Option<u8>) -> ProtoResult<()> {
        let target = volume.unwrap_or(self.default_volume).min(self.max_volume);
        debug!(volume = target, "powering on");

        self.send(&[OP_POWER_MUTE, POWER_ON]).await?;
        sleep(POWER_SETTLE).await;
        self.send(&[OP_POWER_MUTE, MUTE_OFF]).await?;

        let params = {
            let mut state = self.state.lock();
            state.powered = true;
            state.muted = false;
            state.volume = target;
            [
                OP_SET_PARAMS,
                target | if state.loudness { 0x80 } else { 0 },
                state.bass as u8,
                state.treble as u8,
                state.balance as u8,
            ]
        };
        self.send(&params).await
    }

    /// Power the amplifier off. Mute must land first; powering off unmuted
    /// crashes the device.
    ///
    /// # Errors
    /// Returns an error if a bus write fails.
    pub async fn power_off(&self) -> ProtoResult<()> {
        debug!("powering off");
        self.send(&[OP_POWER_MUTE, MUTE_ON]).await?;
        sleep(POWER_SETTLE).await;
        self.send(&[OP_POWER_MUTE, POWER_OFF]).await?;

        let mut state = self.state.lock();
        state.muted = true;
        state.powered = false;
        Ok(())
    }

    /// Set the mute state.
    ///
    /// # Errors
    /// Returns an error if the bus write fails.
    pub async fn set_mute(&self, muted: bool) -> ProtoResult<()> {
        self.send(&[OP_POWER_MUTE, if muted { MUTE_ON } else { MUTE_OFF }]).await?;
        self.state.lock().muted = muted;
        Ok(())
    }

    /// Drive the volume to `target` with single-unit relative steps.
    ///
    /// The device does not support atomic absolute writes while running, so
    /// the target is reached one step per command with a small gap between
    /// steps. The tracked volume moves only after every step is on the wire;
    /// a feedback frame arriving mid-sequence wins.
    ///
    /// # Errors
    /// Returns an error if a bus write fails.
    pub async fn set_volume(&self, target: u8) -> ProtoResult<u8> {
        let target = target.min(self.max_volume);
        let diff = {
            let state = self.state.lock();
            i16::from(target) - i16::from(state.volume)
        };
        if diff == 0 {
            return Ok(target);
        }

        let operand = if diff > 0 { STEP_UP } else { STEP_DOWN };
        debug!(target, steps = diff.unsigned_abs(), "stepping volume");
        for i in 0..diff.unsigned_abs() {
            if i > 0 {
                sleep(STEP_INTERVAL).await;
            }
            self.send(&[OP_VOLUME_STEP, operand]).await?;
        }

        self.state.lock().volume = target;
        Ok(target)
    }

    /// Apply a routing mode as its two command bytes. An all-flags-off mode
    /// is audio-off; a local mode also activates the local source input.
    ///
    /// # Errors
    /// Returns an error if a bus write fails.
    pub async fn set_routing(&self, mode: RoutingMode) -> ProtoResult<()> {
        let flags = mode.flags();
        let primary = u8::from(flags.local) | (u8::from(flags.distribute) << 1);
        let secondary = u8::from(flags.from_bus);

        self.send(&[OP_ROUTING_PRIMARY, primary]).await?;
        self.send(&[OP_ROUTING_SECONDARY, secondary]).await?;
        if flags.local {
            self.send(&[OP_SOURCE_ACTIVATE, LOCAL_SOURCE_ID]).await?;
        }
        self.state.lock().routing = mode;
        Ok(())
    }

    async fn send(&self, opcode: &[u8]) -> ProtoResult<()> {
        self.sink.write_frame(&frame::encode(opcode)).await
    }
}

/// Apply device feedback to the tracked state. External changes (a manual
/// knob turn) must win over locally issued commands.
pub fn apply_feedback(state: &Mutex<MixerState>, feedback: &MixerFeedback) {
    let mut state = state.lock();
    state.volume = feedback.volume;
    state.volume_confirmed = feedback.volume;
    state.loudness = feedback.loudness;
    state.bass = feedback.bass;
    state.treble = feedback.treble;
    state.balance = feedback.balance;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl FrameSink for Arc<RecordingSink> {
        async fn write_frame(&self, frame: &[u8]) -> ProtoResult<()> {
            self.frames.lock().push(frame.to_vec());
            Ok(())
        }
    }

    fn controller(initial_volume: u8, max: u8) -> (MixerController, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let state = Arc::new(Mutex::new(MixerState { volume: initial_volume, ..MixerState::default() }));
        (MixerController::new(Box::new(Arc::clone(&sink)), state, max, 28), sink)
    }

    fn opcodes(sink: &RecordingSink) -> Vec<Vec<u8>> {
        // strip the envelope, keep the opcode payload
        sink.frames.lock().iter().map(|f| f[2..f.len() - 1].to_vec()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_stepping_determinism() {
        let (ctrl, sink) = controller(20, 70);
        ctrl.set_volume(35).await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent.len(), 15);
        assert!(sent.iter().all(|op| op == &[OP_VOLUME_STEP, STEP_UP]));
        assert_eq!(ctrl.snapshot().volume, 35);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_no_op_when_on_target() {
        let (ctrl, sink) = controller(20, 70);
        ctrl.set_volume(20).await.unwrap();
        assert!(sink.frames.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_steps_down() {
        let (ctrl, sink) = controller(30, 70);
        ctrl.set_volume(27).await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|op| op == &[OP_VOLUME_STEP, STEP_DOWN]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_clamped_to_max() {
        let (ctrl, sink) = controller(60, 70);
        let v = ctrl.set_volume(90).await.unwrap();
        assert_eq!(v, 70);
        assert_eq!(opcodes(&sink).len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_on_sequence_order() {
        let (ctrl, sink) = controller(0, 70);
        ctrl.power_on(Some(28)).await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent[0], vec![OP_POWER_MUTE, POWER_ON]);
        assert_eq!(sent[1], vec![OP_POWER_MUTE, MUTE_OFF]);
        assert_eq!(sent[2][0], OP_SET_PARAMS);
        assert_eq!(sent[2][1], 28);

        let state = ctrl.snapshot();
        assert!(state.powered);
        assert!(!state.muted);
        assert_eq!(state.volume, 28);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_mutes_first() {
        let (ctrl, sink) = controller(28, 70);
        ctrl.power_off().await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent, vec![vec![OP_POWER_MUTE, MUTE_ON], vec![OP_POWER_MUTE, POWER_OFF]]);
        assert!(!ctrl.snapshot().powered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_overwrites_tracked_volume() {
        let (ctrl, _sink) = controller(20, 70);
        ctrl.set_volume(35).await.unwrap();
        assert_eq!(ctrl.snapshot().volume, 35);

        let feedback = MixerFeedback { volume: 28, loudness: false, bass: 0, treble: 0, balance: 0 };
        apply_feedback(&ctrl.state, &feedback);

        let state = ctrl.snapshot();
        assert_eq!(state.volume, 28);
        assert_eq!(state.volume_confirmed, 28);
    }

    #[tokio::test(start_paused = true)]
    async fn test_routing_bytes() {
        let (ctrl, sink) = controller(0, 70);
        ctrl.set_routing(RoutingMode::Distribute).await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent[0], vec![OP_ROUTING_PRIMARY, 0x03]);
        assert_eq!(sent[1], vec![OP_ROUTING_SECONDARY, 0x00]);
        assert_eq!(sent[2], vec![OP_SOURCE_ACTIVATE, LOCAL_SOURCE_ID]);
        assert_eq!(ctrl.snapshot().routing, RoutingMode::Distribute);
    }

    #[tokio::test(start_paused = true)]
    async fn test_routing_off_sends_no_activate() {
        let (ctrl, sink) = controller(0, 70);
        ctrl.set_routing(RoutingMode::Bus).await.unwrap();

        let sent = opcodes(&sink);
        assert_eq!(sent, vec![vec![OP_ROUTING_PRIMARY, 0x00], vec![OP_ROUTING_SECONDARY, 0x01]]);
    }
}
