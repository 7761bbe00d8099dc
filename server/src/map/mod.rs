//! Map view module
//!
//! This module provides:
//! - `OverlaySink`, the narrow capability the overlay pipeline needs from a map
//! - `MemoryMap`, the in-memory map view owned by the server
//! - HTTP routes for reading and updating the view

mod memory;
pub mod routes;
mod sink;
mod types;

pub use memory::MemoryMap;
pub use routes::{MapAppState, map_routes};
pub use sink::OverlaySink;
pub use types::{ImageOverlay, LayerId, MapLayer, MapView};
