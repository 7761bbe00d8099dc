//! Overlay lifecycle types

use serde::{Deserialize, Serialize};

use crate::map::LayerId;
use crate::raster::GeoBounds;

/// Name of an overlay slot, e.g. one per user map in the layer list
pub type SlotId = String;

/// Issued when a pipeline cycle begins for a slot
///
/// Sequence numbers increase monotonically; only the slot's latest ticket may
/// install an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CycleTicket {
    pub slot: SlotId,
    pub seq: u64,
}

/// The overlay currently displayed for a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayHandle {
    pub slot: SlotId,
    pub layer_id: LayerId,
    /// Cycle that installed this overlay
    pub seq: u64,
    pub bounds: GeoBounds,
    pub opacity: f64,
    pub z_index: i32,
}

/// Loading / error indicator for a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotStatus {
    Idle,
    Loading { seq: u64 },
    Ready { seq: u64 },
    Failed { seq: u64, code: String, message: String },
}

impl SlotStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, SlotStatus::Loading { .. })
    }
}

/// Outcome of a pipeline cycle that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Installed(OverlayHandle),
    /// A newer cycle or a teardown took over the slot; nothing was changed
    Superseded,
}

/// Snapshot of a slot for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slot: SlotId,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayHandle>,
}
