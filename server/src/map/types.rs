//! Map view types

use serde::{Deserialize, Serialize};

use crate::raster::{GeoBounds, LatLng};

/// Identifier of a layer on the map
pub type LayerId = u64;

/// Current map center and zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
}

/// Image overlay primitive handed to the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    /// Encoded image reference (PNG data URL)
    pub image_url: String,
    /// `[[southLat, westLng], [northLat, eastLng]]`
    pub bounds: [[f64; 2]; 2],
    pub opacity: f64,
    pub z_index: i32,
}

impl ImageOverlay {
    pub fn new(image_url: String, bounds: &GeoBounds, opacity: f64, z_index: i32) -> Self {
        Self {
            image_url,
            bounds: bounds.corners(),
            opacity,
            z_index,
        }
    }
}

/// A layer currently on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayer {
    pub id: LayerId,
    #[serde(flatten)]
    pub overlay: ImageOverlay,
}
