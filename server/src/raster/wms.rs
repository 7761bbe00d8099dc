//! WMS GetMap requests for layers published to GeoServer
//!
//! Uploaded GeoTIFFs are published as `{workspace}:{layer}` coverages. Asking
//! GeoServer for `image/geotiff` output returns a georeferenced raster that the
//! regular pipeline can decode.

use std::path::Path;

use reqwest::Url;

use crate::config::GeoServerConfig;

use super::types::{GeoBounds, RasterError, RasterSource};

/// Whole-globe extent in EPSG:4326
pub const GLOBAL_BBOX: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

const DEFAULT_SIZE: u32 = 768;

/// GetMap request for one published layer
#[derive(Debug, Clone, PartialEq)]
pub struct WmsLayerRequest {
    pub layer: String,
    /// `[minLon, minLat, maxLon, maxLat]`
    pub bbox: [f64; 4],
    pub width: u32,
    pub height: u32,
}

impl WmsLayerRequest {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            bbox: GLOBAL_BBOX,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
        }
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Build the GetMap URL against the configured GeoServer
    pub fn url(&self, geoserver: &GeoServerConfig) -> Result<Url, RasterError> {
        let base = format!(
            "{}/{}/wms",
            geoserver.url.trim_end_matches('/'),
            geoserver.workspace
        );
        let layers = format!("{}:{}", geoserver.workspace, self.layer);
        let bbox = self
            .bbox
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let width = self.width.to_string();
        let height = self.height.to_string();

        Url::parse_with_params(
            &base,
            &[
                ("service", "WMS"),
                ("version", "1.1.0"),
                ("request", "GetMap"),
                ("layers", layers.as_str()),
                ("styles", ""),
                ("bbox", bbox.as_str()),
                ("width", width.as_str()),
                ("height", height.as_str()),
                ("srs", "EPSG:4326"),
                ("transparent", "true"),
                ("format", "image/geotiff"),
            ],
        )
        .map_err(|e| RasterError::Fetch {
            url: base.clone(),
            reason: format!("invalid GeoServer URL: {}", e),
        })
    }

    /// Raster source for this layer, registered over the requested bbox
    pub fn to_source(
        &self,
        geoserver: &GeoServerConfig,
        opacity: f64,
        z_index: i32,
    ) -> Result<RasterSource, RasterError> {
        Ok(RasterSource::new(self.url(geoserver)?.to_string())
            .with_opacity(opacity)
            .with_z_index(z_index)
            .with_bounds(GeoBounds::from_extent(self.bbox)))
    }
}

/// GeoServer layer name for an uploaded file: basename without extension,
/// spaces replaced by underscores, lowercased
pub fn layer_name_from_path(file_path: &str) -> String {
    Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_path)
        .replace(' ', "_")
        .to_lowercase()
}

/// Convert a UI opacity percentage to [0, 1]; zero or missing means fully opaque
pub fn opacity_from_percent(percent: Option<f64>) -> f64 {
    match percent {
        Some(p) if p.is_finite() && p > 0.0 => (p / 100.0).min(1.0),
        _ => 1.0,
    }
}
