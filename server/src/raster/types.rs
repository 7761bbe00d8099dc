//! Raster-related types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while turning a raster source into a map overlay
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RasterError {
    #[error("Failed to fetch raster from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to decode raster: {0}")]
    Decode(String),

    #[error("Failed to geo-register raster: {0}")]
    GeoRegistration(String),
}

impl RasterError {
    /// Stable machine-readable code, used in API responses and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            RasterError::Fetch { .. } => "fetch_error",
            RasterError::Decode(_) => "decode_error",
            RasterError::GeoRegistration(_) => "georegistration_error",
        }
    }
}

/// Geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Geographic rectangle given by its south-west and north-east corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl GeoBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Build bounds from a GeoTIFF-style extent `[minLon, minLat, maxLon, maxLat]`
    pub fn from_extent(extent: [f64; 4]) -> Self {
        let [min_lng, min_lat, max_lng, max_lat] = extent;
        Self {
            south_west: LatLng::new(min_lat.min(max_lat), min_lng.min(max_lng)),
            north_east: LatLng::new(min_lat.max(max_lat), min_lng.max(max_lng)),
        }
    }

    /// Extent in `[minLon, minLat, maxLon, maxLat]` order
    pub fn to_extent(&self) -> [f64; 4] {
        [
            self.south_west.lng,
            self.south_west.lat,
            self.north_east.lng,
            self.north_east.lat,
        ]
    }

    /// Two-corner form accepted by the map: `[[southLat, westLng], [northLat, eastLng]]`
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [
            [self.south_west.lat, self.south_west.lng],
            [self.north_east.lat, self.north_east.lng],
        ]
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    /// True when every coordinate is finite and the box has a non-zero area
    pub fn is_valid(&self) -> bool {
        self.to_extent().iter().all(|v| v.is_finite())
            && self.lat_span() > 0.0
            && self.lng_span() > 0.0
    }
}

/// One raster resource to display in an overlay slot
///
/// Sources are never mutated: a change of URL, opacity or z-order produces a
/// new source and a new pipeline cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSource {
    pub url: String,
    /// Display opacity in [0, 1]
    pub opacity: f64,
    /// Stacking order on the map
    pub z_index: i32,
    /// Fixed extent, overriding any georeferencing embedded in the raster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<GeoBounds>,
}

impl RasterSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            opacity: 1.0,
            z_index: 0,
            bounds: None,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = normalize_opacity(opacity);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

fn normalize_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// Decoded raster samples in planar layout
///
/// The sample for band `b` at pixel `p` is stored at `b * width * height + p`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub samples: Vec<f32>,
    /// Extent read from embedded georeferencing, if any
    pub bounds: Option<GeoBounds>,
}

impl DecodedRaster {
    pub fn planar(width: u32, height: u32, band_count: usize, samples: Vec<f32>) -> Self {
        Self {
            width,
            height,
            band_count,
            samples,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Option<GeoBounds>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Sample for `band` at `pixel`; missing samples read as 0
    pub fn sample(&self, band: usize, pixel: usize) -> f32 {
        self.samples
            .get(band * self.pixel_count() + pixel)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_extent() {
        let bounds = GeoBounds::from_extent([10.0, -5.0, 12.0, 5.0]);
        assert_eq!(bounds.south_west, LatLng::new(-5.0, 10.0));
        assert_eq!(bounds.north_east, LatLng::new(5.0, 12.0));
        assert_eq!(bounds.corners(), [[-5.0, 10.0], [5.0, 12.0]]);
        assert_eq!(bounds.to_extent(), [10.0, -5.0, 12.0, 5.0]);
        assert!(bounds.is_valid());
    }

    #[test]
    fn test_degenerate_bounds_invalid() {
        let bounds = GeoBounds::from_extent([1.0, 1.0, 1.0, 2.0]);
        assert!(!bounds.is_valid());
        let bounds = GeoBounds::from_extent([f64::NAN, 0.0, 1.0, 1.0]);
        assert!(!bounds.is_valid());
    }

    #[test]
    fn test_source_opacity_clamped() {
        assert_eq!(RasterSource::new("u").with_opacity(1.7).opacity, 1.0);
        assert_eq!(RasterSource::new("u").with_opacity(-0.2).opacity, 0.0);
        assert_eq!(RasterSource::new("u").with_opacity(f64::NAN).opacity, 1.0);
        assert_eq!(RasterSource::new("u").with_opacity(0.4).opacity, 0.4);
    }

    #[test]
    fn test_missing_sample_reads_zero() {
        let raster = DecodedRaster::planar(2, 1, 3, vec![1.0, 2.0, 3.0]);
        assert_eq!(raster.sample(0, 1), 2.0);
        assert_eq!(raster.sample(1, 0), 3.0);
        assert_eq!(raster.sample(2, 1), 0.0);
    }

    #[test]
    fn test_error_codes() {
        let err = RasterError::Fetch {
            url: "http://x".into(),
            reason: "404".into(),
        };
        assert_eq!(err.code(), "fetch_error");
        assert_eq!(RasterError::Decode("x".into()).code(), "decode_error");
        assert_eq!(
            RasterError::GeoRegistration("x".into()).code(),
            "georegistration_error"
        );
    }
}
