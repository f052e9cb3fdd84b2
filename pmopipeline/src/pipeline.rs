//! Pipeline de découverte : fetch → filter → score → enqueue → finalize

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use futures::future::join_all;
use pmodispatch::{DispatchError, Router};
use pmomodel::{
    Episode, Evaluation, PendingEntry, PendingReason, Preference, PreferenceFailure, RunSummary,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::state::RunState;

/// Réglages d'une exécution
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Score minimal pour qu'un épisode soit mis en file de lecture
    pub relevance_threshold: f64,
    /// Plafond de candidats traités par exécution
    pub max_episodes_per_run: usize,
    /// Délai de base avant l'unique retry d'un enqueue transitoire
    pub retry_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.6,
            max_episodes_per_run: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Résultat d'un drain de la file hors-ligne
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainSummary {
    /// Entrées tentées
    pub attempted: usize,
    /// Entrées mises en file de lecture et retirées
    pub queued: usize,
    /// Entrées restantes après le drain
    pub remaining: usize,
}

/// Un candidat et les préférences qui l'ont fait émerger
struct Candidate {
    episode: Episode,
    matching: Vec<Preference>,
}

/// Remet le flag d'exécution à zéro et l'état à sa valeur terminale
struct RunGuard<'a> {
    running: &'a AtomicBool,
    state: &'a StdRwLock<RunState>,
    terminal: RunState,
}

impl<'a> RunGuard<'a> {
    fn abort(mut self) {
        self.terminal = RunState::Aborted;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.state.write().unwrap() = self.terminal;
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Pipeline de découverte, seul appelant du routeur de dispatch
pub struct Pipeline {
    router: Arc<Router>,
    settings: PipelineSettings,
    preferences: RwLock<Vec<Preference>>,
    state: StdRwLock<RunState>,
    running: AtomicBool,
}

impl Pipeline {
    pub fn new(router: Arc<Router>, settings: PipelineSettings, preferences: Vec<Preference>) -> Self {
        Self {
            router,
            settings,
            preferences: RwLock::new(preferences),
            state: StdRwLock::new(RunState::Idle),
            running: AtomicBool::new(false),
        }
    }

    /// État courant, pour l'API de statut
    pub fn state(&self) -> RunState {
        *self.state.read().unwrap()
    }

    /// Vrai quand une exécution (ou un drain) est en cours
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Préférences actives
    pub async fn preferences(&self) -> Vec<Preference> {
        self.preferences.read().await.clone()
    }

    /// Ajoute une préférence pour les exécutions suivantes
    pub async fn add_preference(&self, preference: Preference) {
        info!(preference=%preference, "Added discovery preference");
        self.preferences.write().await.push(preference);
    }

    fn set_state(&self, state: RunState) {
        debug!(state=%state, "Pipeline state change");
        *self.state.write().unwrap() = state;
    }

    /// Prend le verrou d'exécution, au-plus-une à la fois
    fn try_begin(&self) -> Result<RunGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }
        Ok(RunGuard {
            running: &self.running,
            state: &self.state,
            terminal: RunState::Idle,
        })
    }

    /// Exécute une découverte complète et retourne son résumé
    ///
    /// Le résumé est produit même quand chaque élément a échoué; seule une
    /// erreur de configuration avorte l'exécution.
    pub async fn run(&self) -> Result<RunSummary> {
        let guard = self.try_begin()?;
        info!("Starting discovery run");

        let preferences = self.preferences.read().await.clone();
        if preferences.is_empty() {
            warn!("No discovery preferences configured, aborting run");
            guard.abort();
            return Err(PipelineError::Configuration(
                "No podcast preferences configured".to_string(),
            ));
        }

        let mut summary = RunSummary::default();

        // ---- Fetching ----
        self.set_state(RunState::Fetching);
        let candidates = self.fetch_candidates(&preferences, &mut summary).await;

        // ---- Filtering ----
        self.set_state(RunState::Filtering);
        let survivors = self.filter_candidates(candidates, &mut summary).await;

        // ---- Scoring + Enqueuing ----
        self.set_state(RunState::Scoring);
        for candidate in survivors {
            let evaluation = match self.score(&candidate).await {
                Ok(evaluation) => evaluation,
                Err(err) => {
                    // Un scoring raté saute l'épisode, jamais l'exécution
                    warn!(episode_id=%candidate.episode.id, error=%err,
                          "Scoring failed, skipping episode");
                    continue;
                }
            };
            summary.scored += 1;

            self.set_state(RunState::Enqueuing);
            self.settle(&candidate.episode, &evaluation, &mut summary).await;
            self.set_state(RunState::Scoring);
        }

        // ---- Finalizing ----
        self.set_state(RunState::Finalizing);
        info!(
            fetched = summary.fetched,
            filtered = summary.filtered,
            scored = summary.scored,
            enqueued = summary.enqueued,
            deferred = summary.deferred,
            errors = summary.per_preference_errors.len(),
            "Discovery run complete"
        );
        drop(guard);
        Ok(summary)
    }

    /// Récupère les candidats de toutes les préférences, en parallèle
    ///
    /// L'ordre de découverte est déterministe : celui des préférences, puis
    /// celui des réponses du catalogue. Un épisode émergé par plusieurs
    /// préférences n'apparaît qu'une fois, porteur de toutes ses préférences.
    async fn fetch_candidates(
        &self,
        preferences: &[Preference],
        summary: &mut RunSummary,
    ) -> Vec<Candidate> {
        let fetches = preferences.iter().map(|preference| {
            let router = self.router.clone();
            async move {
                let result = router
                    .call(
                        "catalog",
                        "search_episodes",
                        json!({"preference": preference}),
                    )
                    .await;
                (preference, result)
            }
        });

        let mut candidates: Vec<Candidate> = Vec::new();
        for (preference, result) in join_all(fetches).await {
            let episodes = match result.and_then(parse_episodes) {
                Ok(episodes) => episodes,
                Err(err) => {
                    // L'échec d'une préférence ne bloque pas les autres
                    warn!(preference=%preference, error=%err, "Preference fetch failed");
                    summary.per_preference_errors.push(PreferenceFailure {
                        preference: preference.to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            summary.fetched += episodes.len();
            for episode in episodes {
                match candidates
                    .iter_mut()
                    .find(|c| c.episode.id == episode.id)
                {
                    Some(existing) => existing.matching.push(preference.clone()),
                    None => candidates.push(Candidate {
                        episode,
                        matching: vec![preference.clone()],
                    }),
                }
            }
        }
        candidates
    }

    /// Dédup (registre + intra-exécution), durée, plafond par exécution
    async fn filter_candidates(
        &self,
        candidates: Vec<Candidate>,
        summary: &mut RunSummary,
    ) -> Vec<Candidate> {
        let mut survivors = Vec::new();
        for candidate in candidates {
            if survivors.len() >= self.settings.max_episodes_per_run {
                debug!(cap = self.settings.max_episodes_per_run, "Per-run cap reached");
                break;
            }

            match self.is_processed(&candidate.episode.id).await {
                Ok(true) => {
                    debug!(episode_id=%candidate.episode.id, "Already processed, skipping");
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    // Registre injoignable : sauter plutôt que risquer un doublon
                    warn!(episode_id=%candidate.episode.id, error=%err,
                          "Ledger check failed, skipping episode");
                    continue;
                }
            }

            // La durée convient dès qu'UNE préférence correspondante l'accepte
            let duration = candidate.episode.duration_seconds;
            if !candidate.matching.iter().any(|p| p.duration_ok(duration)) {
                debug!(episode_id=%candidate.episode.id, duration,
                       "Duration outside preference bounds");
                continue;
            }

            survivors.push(candidate);
        }
        summary.filtered = survivors.len();
        survivors
    }

    async fn is_processed(&self, episode_id: &str) -> std::result::Result<bool, DispatchError> {
        let result = self
            .router
            .call("queue", "is_processed", json!({"episode_id": episode_id}))
            .await?;
        Ok(result["processed"].as_bool().unwrap_or(false))
    }

    /// Un épisode est évalué UNE fois, avec toutes ses préférences
    async fn score(&self, candidate: &Candidate) -> std::result::Result<Evaluation, DispatchError> {
        let result = self
            .router
            .call(
                "scorer",
                "evaluate",
                json!({
                    "episode": candidate.episode,
                    "preferences": candidate.matching,
                }),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| DispatchError::Domain {
            kind: "scorer".to_string(),
            message: format!("Invalid evaluation payload: {}", e),
        })
    }

    /// Décision terminale d'un épisode évalué : file de lecture, report,
    /// ou non-pertinence. Chaque issue terminale marque l'épisode traité,
    /// exactement une fois.
    async fn settle(&self, episode: &Episode, evaluation: &Evaluation, summary: &mut RunSummary) {
        info!(episode_id=%episode.id, score = evaluation.relevance_score,
              "Episode evaluated");

        if evaluation.relevance_score < self.settings.relevance_threshold {
            // Non pertinent : décision terminale
            self.mark_processed(&episode.id).await;
            return;
        }

        let Some(uri) = episode.uri.clone() else {
            warn!(episode_id=%episode.id, "Relevant episode has no playback URI");
            self.mark_processed(&episode.id).await;
            return;
        };

        match self.enqueue_with_retry(episode, &uri).await {
            Ok(()) => {
                info!(episode_id=%episode.id, "Episode enqueued for playback");
                summary.enqueued += 1;
                self.mark_processed(&episode.id).await;
            }
            Err(reason) => match reason {
                Some(reason) => {
                    self.defer(episode, reason).await;
                    summary.deferred += 1;
                    self.mark_processed(&episode.id).await;
                }
                // Échec non opérationnel : pas une décision terminale,
                // l'épisode redeviendra candidat à la prochaine exécution
                None => {}
            },
        }
    }

    /// Tente l'enqueue, avec un unique retry borné sur échec transitoire
    ///
    /// `Ok(())` en cas de succès; `Err(Some(reason))` quand l'épisode doit
    /// être reporté; `Err(None)` pour un échec non opérationnel.
    async fn enqueue_with_retry(
        &self,
        episode: &Episode,
        uri: &str,
    ) -> std::result::Result<(), Option<PendingReason>> {
        let first = self.enqueue_once(episode, uri).await;
        let err = match first {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if err.is_no_device() {
            return Err(Some(PendingReason::NoDevice));
        }
        if !err.is_transient() {
            warn!(episode_id=%episode.id, error=%err, "Enqueue failed");
            return Err(None);
        }

        // Retry unique, délai de base + jitter
        let jitter = rand::rng().random_range(0..=self.settings.retry_delay.as_millis() as u64 / 2);
        let delay = self.settings.retry_delay + Duration::from_millis(jitter);
        debug!(episode_id=%episode.id, delay_ms = delay.as_millis() as u64,
               "Transient enqueue failure, retrying once");
        tokio::time::sleep(delay).await;

        match self.enqueue_once(episode, uri).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_no_device() => Err(Some(PendingReason::NoDevice)),
            Err(err) => {
                warn!(episode_id=%episode.id, error=%err, "Enqueue retry failed, deferring");
                Err(Some(PendingReason::TransientFailure))
            }
        }
    }

    async fn enqueue_once(
        &self,
        episode: &Episode,
        uri: &str,
    ) -> std::result::Result<(), DispatchError> {
        self.router
            .call(
                "catalog",
                "enqueue_now",
                json!({"episode_id": episode.id, "uri": uri}),
            )
            .await
            .map(|_| ())
    }

    async fn defer(&self, episode: &Episode, reason: PendingReason) {
        let entry = PendingEntry::new(episode.clone(), reason);
        if let Err(err) = self
            .router
            .call("queue", "add_pending", json!({"entry": entry}))
            .await
        {
            warn!(episode_id=%episode.id, error=%err, "Failed to defer episode");
        }
    }

    async fn mark_processed(&self, episode_id: &str) {
        if let Err(err) = self
            .router
            .call("queue", "mark_processed", json!({"episode_id": episode_id}))
            .await
        {
            warn!(episode_id, error=%err, "Failed to mark episode as processed");
        }
    }

    /// Tente de vider la file hors-ligne vers la file de lecture
    ///
    /// Les entrées mises en file avec succès sont retirées; celles qui
    /// échouent restent en place. Le registre des traités n'est pas touché
    /// (l'ajout a eu lieu au moment du report).
    pub async fn drain(&self) -> Result<DrainSummary> {
        let guard = self.try_begin()?;

        let entries = match self
            .router
            .call("queue", "get_pending", Value::Null)
            .await
            .and_then(parse_entries)
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error=%err, "Cannot read pending queue");
                drop(guard);
                return Ok(DrainSummary::default());
            }
        };

        let total = entries.len();
        if total == 0 {
            drop(guard);
            return Ok(DrainSummary::default());
        }

        // Sans périphérique actif, inutile de tenter entrée par entrée
        if !self.any_active_device().await {
            info!(pending = total, "No active device, pending queue untouched");
            drop(guard);
            return Ok(DrainSummary {
                attempted: 0,
                queued: 0,
                remaining: total,
            });
        }

        info!(pending = total, "Draining pending queue");
        let mut summary = DrainSummary {
            attempted: total,
            ..DrainSummary::default()
        };
        for entry in entries {
            let Some(uri) = entry.episode.uri.clone() else {
                warn!(episode_id=%entry.episode.id, "Pending entry has no URI, leaving in place");
                continue;
            };
            match self.enqueue_once(&entry.episode, &uri).await {
                Ok(()) => {
                    summary.queued += 1;
                    if let Err(err) = self
                        .router
                        .call(
                            "queue",
                            "remove_pending",
                            json!({"episode_id": entry.episode.id}),
                        )
                        .await
                    {
                        warn!(episode_id=%entry.episode.id, error=%err,
                              "Queued but failed to remove pending entry");
                    }
                }
                Err(err) => {
                    debug!(episode_id=%entry.episode.id, error=%err,
                           "Pending entry still not queueable");
                }
            }
        }
        summary.remaining = total - summary.queued;
        info!(queued = summary.queued, remaining = summary.remaining, "Drain complete");
        drop(guard);
        Ok(summary)
    }

    async fn any_active_device(&self) -> bool {
        match self.router.call("catalog", "get_devices", Value::Null).await {
            Ok(result) => result["devices"]
                .as_array()
                .map(|devices| {
                    devices
                        .iter()
                        .any(|d| d["is_active"].as_bool().unwrap_or(false))
                })
                .unwrap_or(false),
            Err(err) => {
                warn!(error=%err, "Device listing failed");
                false
            }
        }
    }
}

fn parse_episodes(result: Value) -> std::result::Result<Vec<Episode>, DispatchError> {
    serde_json::from_value(result["episodes"].clone()).map_err(|e| DispatchError::Domain {
        kind: "catalog".to_string(),
        message: format!("Invalid episodes payload: {}", e),
    })
}

fn parse_entries(result: Value) -> std::result::Result<Vec<PendingEntry>, DispatchError> {
    serde_json::from_value(result["entries"].clone()).map_err(|e| DispatchError::Domain {
        kind: "queue".to_string(),
        message: format!("Invalid pending payload: {}", e),
    })
}
