//! Déclenchement périodique du pipeline
//!
//! Chaque tick tente d'abord de vider la file hors-ligne (un périphérique
//! a pu réapparaître depuis la dernière exécution), puis lance une
//! découverte. Un tick qui recouvre une exécution encore en cours est
//! sauté, jamais mis en attente.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// Planificateur du pipeline
pub struct Scheduler;

impl Scheduler {
    /// Démarre la boucle périodique et retourne son handle
    ///
    /// Le premier tick part immédiatement, les suivants à `interval`.
    pub fn spawn(pipeline: Arc<Pipeline>, interval: Duration) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting discovery scheduler");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                Self::tick(&pipeline).await;
            }
        })
    }

    async fn tick(pipeline: &Pipeline) {
        if pipeline.is_running() {
            warn!("Previous run still in progress, skipping scheduled tick");
            return;
        }

        match pipeline.drain().await {
            Ok(summary) if summary.attempted > 0 => {
                info!(queued = summary.queued, remaining = summary.remaining,
                      "Scheduled drain finished");
            }
            Ok(_) => {}
            Err(PipelineError::AlreadyRunning) => {
                warn!("Drain skipped, pipeline became busy");
                return;
            }
            Err(err) => error!(error=%err, "Scheduled drain failed"),
        }

        match pipeline.run().await {
            Ok(summary) => {
                info!(
                    enqueued = summary.enqueued,
                    deferred = summary.deferred,
                    errors = summary.per_preference_errors.len(),
                    "Scheduled run finished"
                );
            }
            Err(PipelineError::AlreadyRunning) => {
                warn!("Run skipped, another trigger got in first");
            }
            Err(err) => error!(error=%err, "Scheduled run failed"),
        }
    }
}
