//! Geo-registration of bitmaps against the map

use tracing::debug;

use crate::map::MapView;

use super::types::{GeoBounds, LatLng, RasterError};

/// Result of registering a bitmap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registration {
    pub bounds: GeoBounds,
    /// Whether the map viewport should be fitted to `bounds` after install
    pub fit_viewport: bool,
}

/// Computes the extent a bitmap is drawn over
///
/// With authoritative bounds (fixed by the source or embedded in the raster)
/// these are used as-is. Without them the extent is estimated from the current
/// view: the latitude span halves with every zoom level and the longitude span
/// follows the bitmap's aspect ratio. The estimate is only meant to put
/// un-georeferenced imagery somewhere sensible on screen.
#[derive(Debug, Clone, Copy)]
pub struct GeoRegistrar {
    /// Latitude span in degrees at zoom 0
    base_span: f64,
}

impl Default for GeoRegistrar {
    fn default() -> Self {
        Self { base_span: 180.0 }
    }
}

impl GeoRegistrar {
    pub fn new(base_span: f64) -> Self {
        Self { base_span }
    }

    pub fn register(
        &self,
        width: u32,
        height: u32,
        authoritative: Option<GeoBounds>,
        view: &MapView,
    ) -> Result<Registration, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::GeoRegistration(format!(
                "bitmap has degenerate size {}x{}",
                width, height
            )));
        }

        if let Some(bounds) = authoritative {
            if !bounds.is_valid() {
                return Err(RasterError::GeoRegistration(format!(
                    "invalid bounds {:?}",
                    bounds.to_extent()
                )));
            }
            return Ok(Registration {
                bounds,
                fit_viewport: true,
            });
        }

        let lat_span = self.base_span * 2f64.powi(-(view.zoom as i32));
        let lng_span = lat_span * (width as f64 / height as f64);
        let center = view.center;

        // Latitude cannot leave the poles; longitude may wrap on the map
        let bounds = GeoBounds::new(
            LatLng::new(
                (center.lat - lat_span / 2.0).max(-90.0),
                center.lng - lng_span / 2.0,
            ),
            LatLng::new(
                (center.lat + lat_span / 2.0).min(90.0),
                center.lng + lng_span / 2.0,
            ),
        );

        debug!(
            "Estimated bounds {:?} for {}x{} bitmap at zoom {}",
            bounds.to_extent(),
            width,
            height,
            view.zoom
        );

        Ok(Registration {
            bounds,
            fit_viewport: false,
        })
    }
}
