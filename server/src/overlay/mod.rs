//! Overlay lifecycle module
//!
//! Handles running raster pipeline cycles per overlay slot, keeping a single
//! overlay per slot on the map, and serving slot state over HTTP.

pub mod lifecycle;
pub mod pipeline;
pub mod routes;
pub mod types;

pub use lifecycle::OverlayManager;
pub use pipeline::RasterPipeline;
pub use routes::{OverlayAppState, overlay_routes};
pub use types::{CycleOutcome, CycleTicket, OverlayHandle, SlotId, SlotSnapshot, SlotStatus};
