//! HTTP route handlers for overlay API

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::GeoServerConfig;
use crate::raster::wms::{WmsLayerRequest, opacity_from_percent};
use crate::raster::{GeoBounds, RasterError, RasterSource};

use super::pipeline::RasterPipeline;
use super::types::{SlotSnapshot, SlotStatus};

const MAX_SLOT_LEN: usize = 128;

/// Application state containing the overlay pipeline
#[derive(Clone)]
pub struct OverlayAppState {
    pub pipeline: Arc<RasterPipeline>,
    pub geoserver: GeoServerConfig,
}

/// Error response for overlay API
#[derive(Debug, Serialize)]
pub struct OverlayErrorResponse {
    pub error: String,
    pub code: String,
}

impl OverlayErrorResponse {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "invalid_request".to_string(),
        }
    }

    fn not_found(slot: &str) -> Self {
        Self {
            error: format!("Overlay slot not found: {}", slot),
            code: "not_found".to_string(),
        }
    }
}

impl From<RasterError> for OverlayErrorResponse {
    fn from(e: RasterError) -> Self {
        Self {
            error: e.to_string(),
            code: e.code().to_string(),
        }
    }
}

impl IntoResponse for OverlayErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_request" | "fetch_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Body of PUT /api/overlay/:slot
#[derive(Debug, Deserialize)]
pub struct DisplayRequest {
    pub url: String,
    pub opacity: Option<f64>,
    pub z_index: Option<i32>,
    /// Fixed extent `[minLon, minLat, maxLon, maxLat]`
    pub bounds: Option<[f64; 4]>,
}

/// Body of PUT /api/overlay/:slot/wms
#[derive(Debug, Deserialize)]
pub struct WmsDisplayRequest {
    pub layer: String,
    /// Opacity as shown in the layer panel, 0-100
    pub opacity_percent: Option<f64>,
    pub z_index: Option<i32>,
    pub bbox: Option<[f64; 4]>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Response for accepted display requests (202)
#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayAcceptedResponse {
    pub slot: String,
    pub seq: u64,
    pub status: String, // "loading"
}

fn validate_slot(slot: &str) -> Result<(), OverlayErrorResponse> {
    let valid_chars = slot
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if slot.is_empty() || slot.len() > MAX_SLOT_LEN || !valid_chars {
        return Err(OverlayErrorResponse::invalid(format!(
            "Invalid slot name '{}'",
            slot
        )));
    }
    Ok(())
}

fn validate_bounds(extent: [f64; 4]) -> Result<GeoBounds, OverlayErrorResponse> {
    let bounds = GeoBounds::from_extent(extent);
    if !bounds.is_valid() {
        return Err(OverlayErrorResponse::invalid(format!(
            "Invalid bounds {:?}",
            extent
        )));
    }
    Ok(bounds)
}

impl DisplayRequest {
    fn into_source(self) -> Result<RasterSource, OverlayErrorResponse> {
        let url = Url::parse(&self.url)
            .map_err(|e| OverlayErrorResponse::invalid(format!("Invalid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(OverlayErrorResponse::invalid(format!(
                "Unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        let mut source = RasterSource::new(self.url)
            .with_opacity(self.opacity.unwrap_or(1.0))
            .with_z_index(self.z_index.unwrap_or(0));
        if let Some(extent) = self.bounds {
            source = source.with_bounds(validate_bounds(extent)?);
        }
        Ok(source)
    }
}

async fn accept(state: &OverlayAppState, slot: String, source: RasterSource) -> Response {
    tracing::info!(
        "Displaying {} in slot '{}' (opacity={}, z={})",
        source.url,
        slot,
        source.opacity,
        source.z_index
    );
    let ticket = state.pipeline.spawn_display(&slot, source).await;

    (
        StatusCode::ACCEPTED,
        Json(DisplayAcceptedResponse {
            slot,
            seq: ticket.seq,
            status: "loading".to_string(),
        }),
    )
        .into_response()
}

/// PUT /api/overlay/:slot - Display a raster in a slot
pub async fn display_raster(
    State(state): State<OverlayAppState>,
    Path(slot): Path<String>,
    Json(request): Json<DisplayRequest>,
) -> Result<Response, OverlayErrorResponse> {
    validate_slot(&slot)?;
    let source = request.into_source()?;
    Ok(accept(&state, slot, source).await)
}

/// PUT /api/overlay/:slot/wms - Display a GeoServer layer in a slot
pub async fn display_wms_layer(
    State(state): State<OverlayAppState>,
    Path(slot): Path<String>,
    Json(request): Json<WmsDisplayRequest>,
) -> Result<Response, OverlayErrorResponse> {
    validate_slot(&slot)?;
    if request.layer.is_empty() {
        return Err(OverlayErrorResponse::invalid("Layer name is required"));
    }

    let mut wms = WmsLayerRequest::new(request.layer);
    if let Some(bbox) = request.bbox {
        validate_bounds(bbox)?;
        wms = wms.with_bbox(bbox);
    }
    if let (Some(w), Some(h)) = (request.width, request.height) {
        if w == 0 || h == 0 {
            return Err(OverlayErrorResponse::invalid("Image size must be non-zero"));
        }
        wms = wms.with_size(w, h);
    }

    let source = wms.to_source(
        &state.geoserver,
        opacity_from_percent(request.opacity_percent),
        request.z_index.unwrap_or(0),
    )?;
    Ok(accept(&state, slot, source).await)
}

/// GET /api/overlay - List all slots
pub async fn list_slots(State(state): State<OverlayAppState>) -> Json<Vec<SlotSnapshot>> {
    Json(state.pipeline.manager().snapshots().await)
}

/// GET /api/overlay/:slot - Slot status and current overlay
pub async fn get_slot(
    State(state): State<OverlayAppState>,
    Path(slot): Path<String>,
) -> Result<Json<SlotSnapshot>, OverlayErrorResponse> {
    state
        .pipeline
        .manager()
        .snapshot(&slot)
        .await
        .map(Json)
        .ok_or_else(|| OverlayErrorResponse::not_found(&slot))
}

/// DELETE /api/overlay/:slot - Remove the slot's overlay (idempotent)
pub async fn teardown_slot(
    State(state): State<OverlayAppState>,
    Path(slot): Path<String>,
) -> StatusCode {
    if state.pipeline.manager().teardown(&slot).await {
        tracing::info!("Tore down overlay slot '{}'", slot);
    }
    StatusCode::NO_CONTENT
}

/// DELETE /api/overlay/:slot/error - Dismiss a slot's error state
pub async fn dismiss_error(
    State(state): State<OverlayAppState>,
    Path(slot): Path<String>,
) -> Result<StatusCode, OverlayErrorResponse> {
    let manager = state.pipeline.manager();
    if manager.dismiss_error(&slot).await {
        return Ok(StatusCode::NO_CONTENT);
    }
    match manager.snapshot(&slot).await {
        Some(snapshot) if !matches!(snapshot.status, SlotStatus::Failed { .. }) => {
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(OverlayErrorResponse::not_found(&slot)),
    }
}

/// Build overlay API routes
pub fn overlay_routes(state: OverlayAppState) -> Router {
    Router::new()
        .route("/", get(list_slots))
        .route(
            "/:slot",
            get(get_slot).put(display_raster).delete(teardown_slot),
        )
        .route("/:slot/wms", put(display_wms_layer))
        .route("/:slot/error", delete(dismiss_error))
        .with_state(state)
}
