//! Shared application state and router assembly

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::map::{MapAppState, MemoryMap, map_routes};
use crate::overlay::{OverlayAppState, OverlayManager, RasterPipeline, overlay_routes};
use crate::raster::{HttpRasterFetcher, RasterDecoder, RasterError, RasterFetcher, TiffRasterDecoder};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub map: Arc<MemoryMap>,
    pub pipeline: Arc<RasterPipeline>,
}

impl AppState {
    /// Build state with the HTTP fetcher and TIFF decoder
    pub fn from_config(config: Config) -> Result<Self, RasterError> {
        let fetcher = Arc::new(HttpRasterFetcher::new(&config.raster)?);
        Ok(Self::with_components(
            config,
            fetcher,
            Arc::new(TiffRasterDecoder::new()),
        ))
    }

    /// Build state around custom fetch / decode stages
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn RasterFetcher>,
        decoder: Arc<dyn RasterDecoder>,
    ) -> Self {
        let map = Arc::new(MemoryMap::new(&config.map));
        let manager = Arc::new(OverlayManager::new(map.clone()));
        let pipeline = Arc::new(RasterPipeline::new(
            fetcher,
            decoder,
            manager,
            &config.raster,
        ));

        Self {
            config,
            map,
            pipeline,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Router with health, map and overlay APIs
pub fn app_router(state: &AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let overlay_api = overlay_routes(OverlayAppState {
        pipeline: state.pipeline.clone(),
        geoserver: state.config.geoserver.clone(),
    });
    let map_api = map_routes(MapAppState {
        map: state.map.clone(),
    });

    Router::new()
        .route("/health", get(health))
        .nest("/api/overlay", overlay_api)
        .nest("/api/map", map_api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
