//! Raster processing module
//!
//! This module provides the stages of the overlay pipeline up to the map:
//! - `RasterFetcher` for retrieving raster bytes over HTTP
//! - `RasterDecoder` / `TiffRasterDecoder` for turning bytes into planar samples
//! - `Compositor` for building RGBA bitmaps with optional gamma correction
//! - `GeoRegistrar` for computing the geographic extent of a bitmap
//! - WMS GetMap request building for layers published to GeoServer

pub mod composite;
pub mod decode;
pub mod fetch;
pub mod georef;
mod types;
pub mod wms;

pub use composite::{Bitmap, Compositor};
pub use decode::{RasterDecoder, TiffRasterDecoder};
pub use fetch::{HttpRasterFetcher, RasterFetcher};
pub use georef::{GeoRegistrar, Registration};
pub use types::{DecodedRaster, GeoBounds, LatLng, RasterError, RasterSource};
pub use wms::WmsLayerRequest;
