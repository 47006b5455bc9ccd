//! Router HTTP API.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use amplink_core::event::RouterEvent;
use amplink_core::source::SourceUpdate;

use crate::menu::MenuEntry;
use crate::router::{EventRouter, RouterStatus};

/// Build the router API.
pub fn router(event_router: Arc<EventRouter>) -> Router {
    Router::new()
        .route("/router/event", post(ingest_event))
        .route("/router/source", post(source_update))
        .route("/router/menu", get(menu))
        .route("/router/volume", post(set_volume))
        .route("/router/volume/report", post(report_volume))
        .route("/router/view", post(view))
        .route("/router/status", get(status))
        .with_state(event_router)
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn ingest_event(
    State(router): State<Arc<EventRouter>>,
    Json(event): Json<RouterEvent>,
) -> Json<OkResponse> {
    router.handle_event(event).await;
    Json(OkResponse { ok: true })
}

#[derive(Debug, Serialize)]
struct SourceResponse {
    ok: bool,
    active_source: Option<String>,
}

async fn source_update(
    State(router): State<Arc<EventRouter>>,
    Json(update): Json<SourceUpdate>,
) -> Json<SourceResponse> {
    let active_source = router.apply_source_update(update).await;
    Json(SourceResponse { ok: true, active_source })
}

#[derive(Debug, Serialize)]
struct MenuResponse {
    items: Vec<MenuEntry>,
    active_source: Option<String>,
}

async fn menu(State(router): State<Arc<EventRouter>>) -> Json<MenuResponse> {
    Json(MenuResponse { items: router.menu(), active_source: router.active_source() })
}

#[derive(Debug, Deserialize)]
struct VolumeRequest {
    volume: u8,
}

#[derive(Debug, Serialize)]
struct VolumeResponse {
    ok: bool,
    volume: u8,
}

async fn set_volume(
    State(router): State<Arc<EventRouter>>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let volume = router.set_volume(req.volume).await;
    Json(VolumeResponse { ok: true, volume })
}

async fn report_volume(
    State(router): State<Arc<EventRouter>>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let volume = router.report_volume(req.volume);
    Json(VolumeResponse { ok: true, volume })
}

#[derive(Debug, Deserialize)]
struct ViewRequest {
    view: String,
}

async fn view(
    State(router): State<Arc<EventRouter>>,
    Json(req): Json<ViewRequest>,
) -> Json<OkResponse> {
    router.navigate(req.view).await;
    Json(OkResponse { ok: true })
}

async fn status(State(router): State<Arc<EventRouter>>) -> Json<RouterStatus> {
    Json(router.status())
}
