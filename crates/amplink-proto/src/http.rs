//! Local mixer HTTP API.
//!
//! Served by the protocol engine process only; every handler delegates to
//! the mixer controller and answers with the resulting state. A failed bus
//! write is reported as `ok: false`, never a 5xx - the control loop must
//! stay responsive even with the amplifier unplugged.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use amplink_core::mixer::{MixerState, RoutingMode};

use crate::mixer::MixerController;

/// Build the mixer API router.
pub fn router(controller: Arc<MixerController>) -> Router {
    Router::new()
        .route("/mixer/volume", post(set_volume))
        .route("/mixer/power", post(set_power))
        .route("/mixer/mute", post(set_mute))
        .route("/mixer/routing", post(set_routing))
        .route("/mixer/status", get(status))
        .with_state(controller)
}

#[derive(Debug, Deserialize)]
struct VolumeRequest {
    volume: u8,
}

#[derive(Debug, Serialize)]
struct VolumeResponse {
    ok: bool,
    volume: u8,
    volume_confirmed: u8,
}

async fn set_volume(
    State(controller): State<Arc<MixerController>>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let ok = match controller.set_volume(req.volume).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "volume change failed");
            false
        }
    };
    let state = controller.snapshot();
    Json(VolumeResponse { ok, volume: state.volume, volume_confirmed: state.volume_confirmed })
}

#[derive(Debug, Deserialize)]
struct PowerRequest {
    on: bool,
    #[serde(default)]
    volume: Option<u8>,
}

#[derive(Debug, Serialize)]
struct PowerResponse {
    ok: bool,
    speakers_on: bool,
}

async fn set_power(
    State(controller): State<Arc<MixerController>>,
    Json(req): Json<PowerRequest>,
) -> Json<PowerResponse> {
    let result = if req.on {
        controller.power_on(req.volume).await
    } else {
        controller.power_off().await
    };
    let ok = match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, on = req.on, "power change failed");
            false
        }
    };
    Json(PowerResponse { ok, speakers_on: controller.snapshot().powered })
}

#[derive(Debug, Deserialize)]
struct MuteRequest {
    muted: bool,
}

#[derive(Debug, Serialize)]
struct MuteResponse {
    ok: bool,
    muted: bool,
}

async fn set_mute(
    State(controller): State<Arc<MixerController>>,
    Json(req): Json<MuteRequest>,
) -> Json<MuteResponse> {
    let ok = match controller.set_mute(req.muted).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "mute change failed");
            false
        }
    };
    Json(MuteResponse { ok, muted: controller.snapshot().muted })
}

#[derive(Debug, Deserialize)]
struct RoutingRequest {
    routing: RoutingMode,
}

#[derive(Debug, Serialize)]
struct RoutingResponse {
    ok: bool,
    routing: RoutingMode,
}

async fn set_routing(
    State(controller): State<Arc<MixerController>>,
    Json(req): Json<RoutingRequest>,
) -> Json<RoutingResponse> {
    let ok = match controller.set_routing(req.routing).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "routing change failed");
            false
        }
    };
    Json(RoutingResponse { ok, routing: controller.snapshot().routing })
}

async fn status(State(controller): State<Arc<MixerController>>) -> Json<MixerState> {
    Json(controller.snapshot())
}
