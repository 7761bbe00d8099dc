//! Raster overlay pipeline
//!
//! Runs one cycle per display request: fetch → decode → composite → register →
//! install. Stages run strictly in order; after every suspension point the
//! cycle checks that it is still the latest for its slot and quietly stops if
//! it is not. Errors end up in the slot status rather than propagating.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use crate::config::RasterConfig;
use crate::map::ImageOverlay;
use crate::raster::{
    Compositor, GeoRegistrar, RasterDecoder, RasterError, RasterFetcher, RasterSource,
};

use super::lifecycle::OverlayManager;
use super::types::{CycleOutcome, CycleTicket};

/// Everything needed to turn a `RasterSource` into an overlay on the map
pub struct RasterPipeline {
    fetcher: Arc<dyn RasterFetcher>,
    decoder: Arc<dyn RasterDecoder>,
    compositor: Compositor,
    registrar: GeoRegistrar,
    manager: Arc<OverlayManager>,
}

impl RasterPipeline {
    pub fn new(
        fetcher: Arc<dyn RasterFetcher>,
        decoder: Arc<dyn RasterDecoder>,
        manager: Arc<OverlayManager>,
        config: &RasterConfig,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            compositor: Compositor::new(config.effective_gamma()),
            registrar: GeoRegistrar::new(config.heuristic_base_span),
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<OverlayManager> {
        &self.manager
    }

    /// Begin a cycle for `slot` and run it to completion
    pub async fn display(
        &self,
        slot: &str,
        source: RasterSource,
    ) -> Result<CycleOutcome, RasterError> {
        let ticket = self.manager.begin_cycle(slot).await;
        self.run(&ticket, source).await
    }

    /// Begin a cycle and run it in the background; returns the ticket immediately
    pub async fn spawn_display(self: &Arc<Self>, slot: &str, source: RasterSource) -> CycleTicket {
        let ticket = self.manager.begin_cycle(slot).await;
        let pipeline = Arc::clone(self);
        let task_ticket = ticket.clone();
        tokio::spawn(async move {
            // Outcome is recorded in the slot status
            let _ = pipeline.run(&task_ticket, source).await;
        });
        ticket
    }

    /// Run a cycle for an already issued ticket
    pub async fn run(
        &self,
        ticket: &CycleTicket,
        source: RasterSource,
    ) -> Result<CycleOutcome, RasterError> {
        let start = Instant::now();
        counter!("moonbase_overlay_cycles_total").increment(1);

        let result = self.run_stages(ticket, &source).await;
        histogram!("moonbase_overlay_cycle_duration_seconds").record(start.elapsed());

        match &result {
            Ok(CycleOutcome::Installed(handle)) => {
                debug!(
                    "Slot '{}': cycle {} installed layer {} in {:?}",
                    ticket.slot,
                    ticket.seq,
                    handle.layer_id,
                    start.elapsed()
                );
            }
            Ok(CycleOutcome::Superseded) => {
                counter!("moonbase_overlay_results_discarded_total").increment(1);
                debug!(
                    "Slot '{}': cycle {} superseded, result discarded",
                    ticket.slot, ticket.seq
                );
            }
            Err(e) => {
                counter!("moonbase_overlay_cycle_errors_total", "code" => e.code()).increment(1);
                match e {
                    RasterError::GeoRegistration(_) => {
                        error!("Slot '{}': cycle {} failed: {}", ticket.slot, ticket.seq, e)
                    }
                    _ => warn!("Slot '{}': cycle {} failed: {}", ticket.slot, ticket.seq, e),
                }
                self.manager.fail(ticket, e).await;
            }
        }

        result
    }

    async fn run_stages(
        &self,
        ticket: &CycleTicket,
        source: &RasterSource,
    ) -> Result<CycleOutcome, RasterError> {
        let stage = Instant::now();
        let bytes = self.fetcher.fetch(&source.url).await?;
        record_stage("fetch", stage);
        if !self.manager.is_current(ticket).await {
            return Ok(CycleOutcome::Superseded);
        }

        let stage = Instant::now();
        let decoder = Arc::clone(&self.decoder);
        let compositor = self.compositor;
        let (raster, bitmap) = tokio::task::spawn_blocking(move || {
            let raster = decoder.decode(&bytes)?;
            let bitmap = compositor.composite(&raster)?;
            Ok::<_, RasterError>((raster, bitmap))
        })
        .await
        .map_err(|e| RasterError::Decode(format!("decode task failed: {}", e)))??;
        record_stage("decode", stage);
        if !self.manager.is_current(ticket).await {
            return Ok(CycleOutcome::Superseded);
        }

        let view = self.manager.sink().view().await;
        let authoritative = source.bounds.or(raster.bounds);
        let registration = self
            .registrar
            .register(bitmap.width, bitmap.height, authoritative, &view)?;
        if !self.manager.is_current(ticket).await {
            return Ok(CycleOutcome::Superseded);
        }

        let stage = Instant::now();
        let image_url = tokio::task::spawn_blocking(move || bitmap.to_data_url())
            .await
            .map_err(|e| RasterError::Decode(format!("encode task failed: {}", e)))??;
        record_stage("encode", stage);

        let overlay = ImageOverlay::new(
            image_url,
            &registration.bounds,
            source.opacity,
            source.z_index,
        );
        Ok(self.manager.install(ticket, overlay, registration).await)
    }
}

fn record_stage(stage: &'static str, start: Instant) {
    histogram!("moonbase_overlay_stage_duration_seconds", "stage" => stage)
        .record(start.elapsed());
}
