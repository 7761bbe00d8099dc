//! Overlay lifecycle management
//!
//! Keeps at most one overlay per slot on the map. Every pipeline cycle gets a
//! ticket with a fresh sequence number; beginning a new cycle or tearing the
//! slot down supersedes all earlier tickets. Superseded cycles may still run to
//! completion but can no longer touch the map or the slot status.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::map::{ImageOverlay, OverlaySink};
use crate::raster::{RasterError, Registration};

use super::types::{CycleOutcome, CycleTicket, OverlayHandle, SlotId, SlotSnapshot, SlotStatus};

struct Slot {
    /// Sequence number of the latest cycle or teardown
    latest_seq: u64,
    handle: Option<OverlayHandle>,
    status: SlotStatus,
}

impl Slot {
    fn new() -> Self {
        Self {
            latest_seq: 0,
            handle: None,
            status: SlotStatus::Idle,
        }
    }
}

/// Owner of all overlay slots and the only writer of overlays to the map
pub struct OverlayManager {
    sink: Arc<dyn OverlaySink>,
    slots: Mutex<HashMap<SlotId, Slot>>,
    next_seq: AtomicU64,
}

impl OverlayManager {
    pub fn new(sink: Arc<dyn OverlaySink>) -> Self {
        Self {
            sink,
            slots: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn sink(&self) -> &Arc<dyn OverlaySink> {
        &self.sink
    }

    /// Must be called with the slot lock held so sequence order matches lock order
    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a new cycle for `slot`, superseding any cycle in flight
    pub async fn begin_cycle(&self, slot: &str) -> CycleTicket {
        let mut slots = self.slots.lock().await;
        let seq = self.issue_seq();
        let entry = slots.entry(slot.to_string()).or_insert_with(Slot::new);
        if entry.status.is_loading() {
            counter!("moonbase_overlay_cycles_superseded_total").increment(1);
            debug!("Slot '{}': cycle {} supersedes {}", slot, seq, entry.latest_seq);
        }
        entry.latest_seq = seq;
        entry.status = SlotStatus::Loading { seq };

        CycleTicket {
            slot: slot.to_string(),
            seq,
        }
    }

    /// Whether `ticket` is still the latest cycle for its slot
    pub async fn is_current(&self, ticket: &CycleTicket) -> bool {
        let slots = self.slots.lock().await;
        slots
            .get(&ticket.slot)
            .is_some_and(|s| s.latest_seq == ticket.seq)
    }

    /// Install a registered overlay, replacing the slot's previous one
    ///
    /// A stale ticket leaves the map and the slot untouched.
    pub async fn install(
        &self,
        ticket: &CycleTicket,
        overlay: ImageOverlay,
        registration: Registration,
    ) -> CycleOutcome {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&ticket.slot) else {
            return CycleOutcome::Superseded;
        };
        if slot.latest_seq != ticket.seq {
            debug!(
                "Slot '{}': discarding result of stale cycle {} (latest {})",
                ticket.slot, ticket.seq, slot.latest_seq
            );
            return CycleOutcome::Superseded;
        }

        if let Some(previous) = slot.handle.take() {
            self.sink.remove_overlay(previous.layer_id).await;
        }

        let opacity = overlay.opacity;
        let z_index = overlay.z_index;
        let layer_id = self.sink.add_overlay(overlay).await;
        if registration.fit_viewport {
            self.sink.fit_bounds(&registration.bounds).await;
        }

        let handle = OverlayHandle {
            slot: ticket.slot.clone(),
            layer_id,
            seq: ticket.seq,
            bounds: registration.bounds,
            opacity,
            z_index,
        };
        slot.handle = Some(handle.clone());
        slot.status = SlotStatus::Ready { seq: ticket.seq };

        info!(
            "Slot '{}': installed layer {} (cycle {})",
            ticket.slot, layer_id, ticket.seq
        );
        CycleOutcome::Installed(handle)
    }

    /// Record a failed cycle; the slot's current overlay stays on the map
    pub async fn fail(&self, ticket: &CycleTicket, error: &RasterError) {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&ticket.slot) else {
            return;
        };
        if slot.latest_seq != ticket.seq {
            debug!(
                "Slot '{}': ignoring failure of stale cycle {}: {}",
                ticket.slot, ticket.seq, error
            );
            return;
        }
        slot.status = SlotStatus::Failed {
            seq: ticket.seq,
            code: error.code().to_string(),
            message: error.to_string(),
        };
    }

    /// Remove the slot's overlay, forget the slot and supersede any cycle in flight
    ///
    /// Safe to call any number of times. A cycle begun before the teardown finds
    /// no slot (or a slot with a newer sequence) and is discarded.
    pub async fn teardown(&self, slot: &str) -> bool {
        let mut slots = self.slots.lock().await;
        let Some(entry) = slots.remove(slot) else {
            return false;
        };

        match entry.handle {
            Some(handle) => {
                if !self.sink.remove_overlay(handle.layer_id).await {
                    warn!(
                        "Slot '{}': layer {} was already gone from the map",
                        slot, handle.layer_id
                    );
                }
                info!("Slot '{}': removed layer {}", slot, handle.layer_id);
                true
            }
            None => false,
        }
    }

    /// Clear an error state; returns false if the slot was not failed
    pub async fn dismiss_error(&self, slot: &str) -> bool {
        let mut slots = self.slots.lock().await;
        let Some(entry) = slots.get_mut(slot) else {
            return false;
        };
        if !matches!(entry.status, SlotStatus::Failed { .. }) {
            return false;
        }
        entry.status = match &entry.handle {
            Some(handle) => SlotStatus::Ready { seq: handle.seq },
            None => SlotStatus::Idle,
        };
        true
    }

    pub async fn snapshot(&self, slot: &str) -> Option<SlotSnapshot> {
        let slots = self.slots.lock().await;
        slots.get(slot).map(|s| SlotSnapshot {
            slot: slot.to_string(),
            status: s.status.clone(),
            overlay: s.handle.clone(),
        })
    }

    pub async fn snapshots(&self) -> Vec<SlotSnapshot> {
        let slots = self.slots.lock().await;
        let mut all: Vec<_> = slots
            .iter()
            .map(|(id, s)| SlotSnapshot {
                slot: id.clone(),
                status: s.status.clone(),
                overlay: s.handle.clone(),
            })
            .collect();
        all.sort_by(|a, b| a.slot.cmp(&b.slot));
        all
    }
}
