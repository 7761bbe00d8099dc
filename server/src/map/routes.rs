//! HTTP route handlers for map view API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::raster::LatLng;

use super::memory::MemoryMap;
use super::sink::OverlaySink;
use super::types::{MapLayer, MapView};

/// Application state containing the map view
#[derive(Clone)]
pub struct MapAppState {
    pub map: Arc<MemoryMap>,
}

/// Error response for map API
#[derive(Debug, Serialize)]
pub struct MapErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for MapErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// Body of PUT /api/map/view
#[derive(Debug, Deserialize)]
pub struct SetViewRequest {
    pub center: LatLng,
    pub zoom: u8,
}

/// GET /api/map/view - Current center and zoom
pub async fn get_view(State(state): State<MapAppState>) -> Json<MapView> {
    Json(state.map.view().await)
}

/// PUT /api/map/view - Move the map
pub async fn set_view(
    State(state): State<MapAppState>,
    Json(request): Json<SetViewRequest>,
) -> Result<Json<MapView>, MapErrorResponse> {
    let LatLng { lat, lng } = request.center;
    if !lat.is_finite() || !lng.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(MapErrorResponse {
            error: format!("Invalid map center ({}, {})", lat, lng),
            code: "invalid_request".to_string(),
        });
    }

    let view = state.map.set_view(request.center, request.zoom).await;
    tracing::debug!("Map view set to {:?}", view);
    Ok(Json(view))
}

/// GET /api/map/layers - Overlays currently drawn on the map
pub async fn list_layers(State(state): State<MapAppState>) -> Json<Vec<MapLayer>> {
    Json(state.map.layers().await)
}

/// Build map API routes
pub fn map_routes(state: MapAppState) -> Router {
    Router::new()
        .route("/view", get(get_view).put(set_view))
        .route("/layers", get(list_layers))
        .with_state(state)
}
