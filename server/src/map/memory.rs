//! In-memory map view

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::MapConfig;
use crate::raster::{GeoBounds, LatLng};

use super::sink::OverlaySink;
use super::types::{ImageOverlay, LayerId, MapLayer, MapView};

/// Tile edge in pixels; zoom 0 spans 360 degrees of longitude over one tile
const TILE_SIZE: f64 = 256.0;

struct MapState {
    view: MapView,
    layers: BTreeMap<LayerId, ImageOverlay>,
}

/// Map view held in memory: viewport plus the image overlays drawn on it
pub struct MemoryMap {
    state: RwLock<MapState>,
    next_layer_id: AtomicU64,
    viewport_width: u32,
    viewport_height: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl MemoryMap {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            state: RwLock::new(MapState {
                view: MapView {
                    center: LatLng::new(config.center_lat, config.center_lng),
                    zoom: config.zoom.clamp(config.min_zoom, config.max_zoom),
                },
                layers: BTreeMap::new(),
            }),
            next_layer_id: AtomicU64::new(1),
            viewport_width: config.viewport_width.max(1),
            viewport_height: config.viewport_height.max(1),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    /// Set center and zoom (zoom is clamped to the configured range)
    pub async fn set_view(&self, center: LatLng, zoom: u8) -> MapView {
        let mut state = self.state.write().await;
        state.view = MapView {
            center,
            zoom: zoom.clamp(self.min_zoom, self.max_zoom),
        };
        state.view
    }

    /// Layers currently on the map, in insertion order
    pub async fn layers(&self) -> Vec<MapLayer> {
        let state = self.state.read().await;
        state
            .layers
            .iter()
            .map(|(id, overlay)| MapLayer {
                id: *id,
                overlay: overlay.clone(),
            })
            .collect()
    }

    pub async fn layer(&self, id: LayerId) -> Option<ImageOverlay> {
        self.state.read().await.layers.get(&id).cloned()
    }

    pub async fn layer_count(&self) -> usize {
        self.state.read().await.layers.len()
    }

    /// Highest zoom at which `bounds` fits the viewport on both axes
    fn zoom_to_fit(&self, bounds: &GeoBounds) -> u8 {
        let fit_axis = |pixels: u32, span: f64| {
            if span <= 0.0 {
                f64::INFINITY
            } else {
                (pixels as f64 * 360.0 / (TILE_SIZE * span)).log2()
            }
        };
        let zoom = fit_axis(self.viewport_width, bounds.lng_span())
            .min(fit_axis(self.viewport_height, bounds.lat_span()))
            .floor();

        if zoom.is_finite() {
            zoom.clamp(self.min_zoom as f64, self.max_zoom as f64) as u8
        } else {
            self.max_zoom
        }
    }
}

#[async_trait]
impl OverlaySink for MemoryMap {
    async fn add_overlay(&self, overlay: ImageOverlay) -> LayerId {
        let id = self.next_layer_id.fetch_add(1, Ordering::Relaxed);
        self.state.write().await.layers.insert(id, overlay);
        debug!("Added layer {}", id);
        id
    }

    async fn remove_overlay(&self, id: LayerId) -> bool {
        let removed = self.state.write().await.layers.remove(&id).is_some();
        debug!("Removed layer {}: {}", id, removed);
        removed
    }

    async fn fit_bounds(&self, bounds: &GeoBounds) {
        let zoom = self.zoom_to_fit(bounds);
        let mut state = self.state.write().await;
        state.view = MapView {
            center: bounds.center(),
            zoom,
        };
        debug!("Fitted view to {:?}: {:?}", bounds.to_extent(), state.view);
    }

    async fn view(&self) -> MapView {
        self.state.read().await.view
    }
}
