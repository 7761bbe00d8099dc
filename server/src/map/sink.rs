//! OverlaySink trait definition

use async_trait::async_trait;

use crate::raster::GeoBounds;

use super::types::{ImageOverlay, LayerId, MapView};

/// The part of a map the overlay pipeline is allowed to touch
#[async_trait]
pub trait OverlaySink: Send + Sync {
    /// Add an image overlay, returning its layer id
    async fn add_overlay(&self, overlay: ImageOverlay) -> LayerId;

    /// Remove a layer; returns false if it was not on the map
    async fn remove_overlay(&self, id: LayerId) -> bool;

    /// Move the viewport so that `bounds` is fully visible
    async fn fit_bounds(&self, bounds: &GeoBounds);

    /// Current center and zoom
    async fn view(&self) -> MapView;
}
