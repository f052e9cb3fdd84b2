//! Tests du pipeline complet à travers le routeur de dispatch
//!
//! Les modules de capacités sont les vrais (`catalog`, `scorer`, `queue`),
//! seuls les clients externes sont remplacés par des implémentations
//! scriptées en mémoire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pmodispatch::Router;
use pmomodel::{Device, Episode, PendingEntry, PendingReason, Preference, Show};
use pmopending::{MemoryPendingStore, PendingStore, QueueModule};
use pmopipeline::{Pipeline, PipelineError, PipelineSettings, RunState};
use pmoscorer::{RelevanceScorer, ScorerError, ScorerModule};
use pmospotify::{CatalogModule, PodcastCatalog, SpotifyError};

// ===== Catalogue scripté =====

#[derive(Clone, Copy, PartialEq)]
enum EnqueueMode {
    Ok,
    NoDevice,
    /// Premier essai transitoire, puis succès ou nouvel échec transitoire
    Transient {
        then_ok: bool,
    },
}

struct ScriptedCatalog {
    episodes: Vec<Episode>,
    enqueue_mode: EnqueueMode,
    enqueue_attempts: AtomicUsize,
    enqueued: Mutex<Vec<String>>,
    has_active_device: bool,
    /// Les recherches contenant ce texte échouent (isolation des préférences)
    failing_query: Option<String>,
    /// Latence artificielle des recherches (test de recouvrement)
    search_delay: Duration,
}

impl ScriptedCatalog {
    fn new(episodes: Vec<Episode>) -> Self {
        Self {
            episodes,
            enqueue_mode: EnqueueMode::Ok,
            enqueue_attempts: AtomicUsize::new(0),
            enqueued: Mutex::new(Vec::new()),
            has_active_device: true,
            failing_query: None,
            search_delay: Duration::ZERO,
        }
    }

    fn with_enqueue_mode(mut self, mode: EnqueueMode) -> Self {
        self.enqueue_mode = mode;
        self
    }

    fn with_active_device(mut self, active: bool) -> Self {
        self.has_active_device = active;
        self
    }

    fn with_failing_query(mut self, marker: &str) -> Self {
        self.failing_query = Some(marker.to_string());
        self
    }

    fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    fn enqueued_uris(&self) -> Vec<String> {
        self.enqueued.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodcastCatalog for ScriptedCatalog {
    async fn search_shows(&self, query: &str, _limit: usize) -> pmospotify::Result<Vec<Show>> {
        if self.search_delay > Duration::ZERO {
            tokio::time::sleep(self.search_delay).await;
        }
        if let Some(marker) = &self.failing_query {
            if query.contains(marker) {
                return Err(SpotifyError::ApiError {
                    status: 502,
                    message: "scripted search failure".to_string(),
                });
            }
        }
        Ok(vec![Show {
            id: "show-1".to_string(),
            name: "Scripted Show".to_string(),
            description: String::new(),
            publisher: "Tests".to_string(),
        }])
    }

    async fn show(&self, show_id: &str) -> pmospotify::Result<Show> {
        Ok(Show {
            id: show_id.to_string(),
            name: "Scripted Show".to_string(),
            description: String::new(),
            publisher: "Tests".to_string(),
        })
    }

    async fn show_episodes(
        &self,
        _show_id: &str,
        _limit: usize,
    ) -> pmospotify::Result<Vec<Episode>> {
        Ok(self.episodes.clone())
    }

    async fn devices(&self) -> pmospotify::Result<Vec<Device>> {
        if self.has_active_device {
            Ok(vec![Device {
                id: "d1".to_string(),
                name: "Living room".to_string(),
                is_active: true,
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn enqueue(&self, uri: &str) -> pmospotify::Result<()> {
        let attempt = self.enqueue_attempts.fetch_add(1, Ordering::SeqCst);
        match self.enqueue_mode {
            EnqueueMode::Ok => {
                self.enqueued.lock().unwrap().push(uri.to_string());
                Ok(())
            }
            EnqueueMode::NoDevice => Err(SpotifyError::NoActiveDevice),
            EnqueueMode::Transient { then_ok } => {
                if attempt == 0 || !then_ok {
                    Err(SpotifyError::Transient("scripted timeout".to_string()))
                } else {
                    self.enqueued.lock().unwrap().push(uri.to_string());
                    Ok(())
                }
            }
        }
    }

    async fn start_playback(&self, _device_id: Option<&str>) -> pmospotify::Result<()> {
        Ok(())
    }
}

// ===== Scorer scripté =====

struct ScriptedScorer {
    scores: HashMap<String, f64>,
    failing: Vec<String>,
    calls: AtomicUsize,
    last_preference_count: AtomicUsize,
}

impl ScriptedScorer {
    fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|(id, score)| (id.to_string(), *score))
                .collect(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
            last_preference_count: AtomicUsize::new(0),
        }
    }

    fn with_failing(mut self, episode_id: &str) -> Self {
        self.failing.push(episode_id.to_string());
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceScorer for ScriptedScorer {
    async fn evaluate(
        &self,
        episode: &Episode,
        preferences: &[Preference],
    ) -> pmoscorer::Result<pmomodel::Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_preference_count
            .store(preferences.len(), Ordering::SeqCst);
        if self.failing.contains(&episode.id) {
            return Err(ScorerError::InvalidResponse("scripted failure".to_string()));
        }
        let score = self.scores.get(&episode.id).copied().unwrap_or(0.0);
        Ok(pmomodel::Evaluation::new(
            episode.id.clone(),
            score,
            "scripted",
        ))
    }

    async fn summarize(&self, episode: &Episode) -> pmoscorer::Result<String> {
        Ok(format!("Summary of {}", episode.name))
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}

// ===== Harnais =====

fn episode(id: &str, duration_seconds: u32) -> Episode {
    Episode {
        id: id.to_string(),
        show_id: "show-1".to_string(),
        name: format!("Episode {}", id),
        description: String::new(),
        duration_seconds,
        published_at: Utc::now(),
        uri: Some(format!("spotify:episode:{}", id)),
    }
}

struct Harness {
    pipeline: Pipeline,
    catalog: Arc<ScriptedCatalog>,
    scorer: Arc<ScriptedScorer>,
    store: Arc<MemoryPendingStore>,
}

fn harness(
    catalog: ScriptedCatalog,
    scorer: ScriptedScorer,
    preferences: Vec<Preference>,
) -> Harness {
    harness_with_settings(catalog, scorer, preferences, test_settings())
}

fn test_settings() -> PipelineSettings {
    PipelineSettings {
        relevance_threshold: 0.7,
        max_episodes_per_run: 10,
        retry_delay: Duration::from_millis(10),
    }
}

fn harness_with_settings(
    catalog: ScriptedCatalog,
    scorer: ScriptedScorer,
    preferences: Vec<Preference>,
    settings: PipelineSettings,
) -> Harness {
    let catalog = Arc::new(catalog);
    let scorer = Arc::new(scorer);
    let store = Arc::new(MemoryPendingStore::new());

    let mut router = Router::new();
    router
        .register_module(Arc::new(CatalogModule::new(catalog.clone()).unwrap()))
        .unwrap();
    router
        .register_module(Arc::new(ScorerModule::new(scorer.clone()).unwrap()))
        .unwrap();
    router
        .register_module(Arc::new(
            QueueModule::new(store.clone() as Arc<dyn PendingStore>).unwrap(),
        ))
        .unwrap();

    Harness {
        pipeline: Pipeline::new(Arc::new(router), settings, preferences),
        catalog,
        scorer,
        store,
    }
}

// ===== Tests =====

#[tokio::test]
async fn duration_filter_keeps_only_episodes_in_bounds() {
    // Une préférence min 600s, un épisode de 500s et un de 900s
    let preference = Preference::for_topics(["ai"]).with_duration(Some(600), None);
    let h = harness(
        ScriptedCatalog::new(vec![episode("short", 500), episode("long", 900)]),
        ScriptedScorer::new(&[("long", 0.9), ("short", 0.9)]),
        vec![preference],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.filtered, 1);
    assert_eq!(summary.enqueued, 1);
    assert_eq!(h.catalog.enqueued_uris(), vec!["spotify:episode:long"]);

    // L'épisode hors bornes n'est pas une décision terminale
    assert!(!h.store.is_processed("short").await.unwrap());
}

#[tokio::test]
async fn threshold_splits_enqueued_from_irrelevant() {
    // Seuil 0.7, scores [0.9, 0.4] : un seul épisode part en file
    let h = harness(
        ScriptedCatalog::new(vec![episode("good", 900), episode("meh", 900)]),
        ScriptedScorer::new(&[("good", 0.9), ("meh", 0.4)]),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.enqueued, 1);
    assert_eq!(summary.deferred, 0);

    // Les deux décisions sont terminales : plus jamais réévaluées
    assert!(h.store.is_processed("good").await.unwrap());
    assert!(h.store.is_processed("meh").await.unwrap());
}

#[tokio::test]
async fn no_device_defers_exactly_once() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)])
            .with_enqueue_mode(EnqueueMode::NoDevice),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.enqueued, 0);
    assert_eq!(summary.deferred, 1);

    // Exactement une entrée en attente et une inscription au registre
    let pending = h.store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].episode.id, "e1");
    assert_eq!(pending[0].reason, PendingReason::NoDevice);
    assert_eq!(h.store.processed_count().await.unwrap(), 1);

    // Pas de retry sur no_device
    assert_eq!(h.catalog.enqueue_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failure_retries_once_then_defers() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)])
            .with_enqueue_mode(EnqueueMode::Transient { then_ok: false }),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.deferred, 1);
    // Un essai + un unique retry, jamais de boucle
    assert_eq!(h.catalog.enqueue_attempts.load(Ordering::SeqCst), 2);

    let pending = h.store.list_pending().await.unwrap();
    assert_eq!(pending[0].reason, PendingReason::TransientFailure);
}

#[tokio::test]
async fn transient_failure_then_success_enqueues() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)])
            .with_enqueue_mode(EnqueueMode::Transient { then_ok: true }),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.enqueued, 1);
    assert_eq!(summary.deferred, 0);
    assert_eq!(h.catalog.enqueue_attempts.load(Ordering::SeqCst), 2);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn scoring_failure_skips_episode_but_not_the_run() {
    let h = harness(
        ScriptedCatalog::new(vec![
            episode("e1", 900),
            episode("e2", 900),
            episode("e3", 900),
        ]),
        ScriptedScorer::new(&[("e2", 0.9), ("e3", 0.8)]).with_failing("e1"),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.filtered, 3);
    assert_eq!(summary.scored, 2);
    assert_eq!(summary.enqueued, 2);

    // L'épisode en échec de scoring reste candidat pour la prochaine fois
    assert!(!h.store.is_processed("e1").await.unwrap());
    assert!(h.store.is_processed("e2").await.unwrap());
}

#[tokio::test]
async fn one_failing_preference_does_not_block_the_others() {
    let bad = Preference::for_show_name("always-fails");
    let good = Preference::for_topics(["ai"]);
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)]).with_failing_query("always-fails"),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![bad, good],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.per_preference_errors.len(), 1);
    assert!(summary.per_preference_errors[0]
        .preference
        .contains("always-fails"));
    assert_eq!(summary.enqueued, 1);
}

#[tokio::test]
async fn second_run_re_evaluates_nothing() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900), episode("e2", 900)]),
        ScriptedScorer::new(&[("e1", 0.9), ("e2", 0.2)]),
        vec![Preference::for_topics(["ai"])],
    );

    let first = h.pipeline.run().await.unwrap();
    assert_eq!(first.scored, 2);
    let calls_after_first = h.scorer.call_count();

    let second = h.pipeline.run().await.unwrap();
    assert_eq!(second.fetched, 2);
    assert_eq!(second.filtered, 0);
    assert_eq!(second.scored, 0);
    assert_eq!(second.enqueued, 0);
    assert_eq!(h.scorer.call_count(), calls_after_first);
}

#[tokio::test]
async fn per_run_cap_preserves_discovery_order() {
    let episodes: Vec<Episode> = (1..=5).map(|i| episode(&format!("e{}", i), 900)).collect();
    let h = harness_with_settings(
        ScriptedCatalog::new(episodes),
        ScriptedScorer::new(&[("e1", 0.9), ("e2", 0.9), ("e3", 0.9)]),
        vec![Preference::for_topics(["ai"])],
        PipelineSettings {
            max_episodes_per_run: 2,
            ..test_settings()
        },
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.filtered, 2);
    // Premiers découverts, premiers gardés
    assert_eq!(
        h.catalog.enqueued_uris(),
        vec!["spotify:episode:e1", "spotify:episode:e2"]
    );
}

#[tokio::test]
async fn episode_matching_two_preferences_is_scored_once() {
    let pref_a = Preference::for_topics(["ai"]);
    let pref_b = Preference::for_topics(["technology"]);
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)]),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![pref_a, pref_b],
    );

    let summary = h.pipeline.run().await.unwrap();
    // Récupéré par les deux préférences, évalué une seule fois
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.filtered, 1);
    assert_eq!(h.scorer.call_count(), 1);
    assert_eq!(
        h.scorer.last_preference_count.load(Ordering::SeqCst),
        2
    );
}

#[tokio::test]
async fn relevant_episode_without_uri_is_settled_without_enqueue() {
    let mut no_uri = episode("e1", 900);
    no_uri.uri = None;
    let h = harness(
        ScriptedCatalog::new(vec![no_uri]),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![Preference::for_topics(["ai"])],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.enqueued, 0);
    assert_eq!(summary.deferred, 0);
    // Injouable pour toujours : décision terminale
    assert!(h.store.is_processed("e1").await.unwrap());
}

#[tokio::test]
async fn empty_preferences_abort_before_fetching() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)]),
        ScriptedScorer::new(&[]),
        Vec::new(),
    );

    let err = h.pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(h.pipeline.state(), RunState::Aborted);
    assert_eq!(h.scorer.call_count(), 0);
    assert!(!h.pipeline.is_running());
}

#[tokio::test]
async fn overlapping_run_is_rejected() {
    let h = harness(
        ScriptedCatalog::new(vec![episode("e1", 900)])
            .with_search_delay(Duration::from_millis(100)),
        ScriptedScorer::new(&[("e1", 0.9)]),
        vec![Preference::for_topics(["ai"])],
    );
    let h = Arc::new(h);

    let background = {
        let h = h.clone();
        tokio::spawn(async move { h.pipeline.run().await })
    };
    // Laisser la première exécution prendre le verrou
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = h.pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning));

    let first = background.await.unwrap().unwrap();
    assert_eq!(first.enqueued, 1);
    assert!(!h.pipeline.is_running());
}

#[tokio::test]
async fn drain_moves_pending_to_queue_and_leaves_ledger_alone() {
    let h = harness(
        ScriptedCatalog::new(Vec::new()),
        ScriptedScorer::new(&[]),
        vec![Preference::for_topics(["ai"])],
    );

    // Une entrée différée lors d'une exécution précédente
    h.store
        .add_pending(PendingEntry::new(episode("e1", 900), PendingReason::NoDevice))
        .await
        .unwrap();
    h.store.mark_processed("e1").await.unwrap();
    let processed_before = h.store.processed_count().await.unwrap();

    let summary = h.pipeline.drain().await.unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.queued, 1);
    assert_eq!(summary.remaining, 0);

    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    assert_eq!(h.store.processed_count().await.unwrap(), processed_before);
    assert_eq!(h.catalog.enqueued_uris(), vec!["spotify:episode:e1"]);
}

#[tokio::test]
async fn drain_without_device_leaves_entries_in_place() {
    let h = harness(
        ScriptedCatalog::new(Vec::new()).with_active_device(false),
        ScriptedScorer::new(&[]),
        vec![Preference::for_topics(["ai"])],
    );

    h.store
        .add_pending(PendingEntry::new(episode("e1", 900), PendingReason::NoDevice))
        .await
        .unwrap();

    let summary = h.pipeline.drain().await.unwrap();
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.queued, 0);
    assert_eq!(summary.remaining, 1);
    assert_eq!(h.store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn summary_distinguishes_nothing_found_from_everything_failed() {
    // Tout échoue : le résumé existe quand même, compteurs à zéro + erreurs
    let failing = Preference::for_show_name("always-fails");
    let h = harness(
        ScriptedCatalog::new(Vec::new()).with_failing_query("always-fails"),
        ScriptedScorer::new(&[]),
        vec![failing],
    );

    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.per_preference_errors.len(), 1);

    // Rien trouvé : résumé identique mais sans erreur
    let h = harness(
        ScriptedCatalog::new(Vec::new()),
        ScriptedScorer::new(&[]),
        vec![Preference::for_topics(["ai"])],
    );
    let summary = h.pipeline.run().await.unwrap();
    assert_eq!(summary.fetched, 0);
    assert!(summary.per_preference_errors.is_empty());
}
