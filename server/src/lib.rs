//! Moonbase Server Library
//!
//! Raster overlay pipeline for the lunar base map: fetch GeoTIFFs, composite
//! them into RGBA bitmaps, geo-register them and keep one overlay per slot on
//! the map. Exported for the binary, integration tests and external tooling.

pub mod config;
pub mod map;
pub mod overlay;
pub mod raster;
pub mod server;

// Re-export commonly used types
pub use map::{MemoryMap, OverlaySink};
pub use overlay::{OverlayManager, RasterPipeline};
pub use raster::{RasterError, RasterSource};
pub use server::{AppState, app_router};
