//! Trait du store des épisodes en attente + implémentation mémoire
//!
//! Le store est un objet explicite passé au module `queue`, jamais un état
//! global : l'implémentation SQLite sert en production, l'implémentation
//! mémoire sert aux tests et aux déploiements jetables.

use async_trait::async_trait;
use pmomodel::PendingEntry;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::Result;

/// Page d'entrées en attente : identifiant de curseur + entrée
pub type PendingPage = Vec<(i64, PendingEntry)>;

/// Store durable des épisodes différés et du registre de dédup
///
/// Contrats (voir aussi les tests d'intégration) :
/// - `add_pending` ajoute en fin de séquence; un épisode déjà présent n'est
///   pas dupliqué;
/// - `list_pending` restitue l'ordre d'insertion;
/// - `pending_page` est un curseur relançable : repasser le dernier
///   identifiant retourné reprend la séquence où elle s'était arrêtée;
/// - `remove_pending` est silencieux si l'identifiant est absent;
/// - `mark_processed` est idempotent et est le SEUL écrivain du registre;
/// - les écritures sont sérialisées en interne, les implémentations sont
///   sûres sous appels concurrents.
#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn add_pending(&self, entry: PendingEntry) -> Result<()>;

    async fn list_pending(&self) -> Result<Vec<PendingEntry>>;

    /// Page d'entrées strictement après le curseur `after` (None = début)
    async fn pending_page(&self, after: Option<i64>, limit: usize) -> Result<PendingPage>;

    /// Retire une entrée; no-op silencieux si absente. Retourne vrai si retirée.
    async fn remove_pending(&self, episode_id: &str) -> Result<bool>;

    /// Ajoute l'identifiant au registre des traités. Retourne vrai à la
    /// première insertion, faux ensuite (idempotence).
    async fn mark_processed(&self, episode_id: &str) -> Result<bool>;

    async fn is_processed(&self, episode_id: &str) -> Result<bool>;

    async fn pending_count(&self) -> Result<usize>;

    async fn processed_count(&self) -> Result<usize>;

    /// Remise à zéro du registre (action opérateur). Retourne le nombre
    /// d'identifiants effacés.
    async fn reset_processed(&self) -> Result<usize>;
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    pending: Vec<(i64, PendingEntry)>,
    processed: HashSet<String>,
}

/// Implémentation mémoire du store, pour les tests
#[derive(Default)]
pub struct MemoryPendingStore {
    state: Mutex<MemoryState>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingStore for MemoryPendingStore {
    async fn add_pending(&self, entry: PendingEntry) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state
            .pending
            .iter()
            .any(|(_, e)| e.episode.id == entry.episode.id)
        {
            return Ok(());
        }
        state.next_id += 1;
        let id = state.next_id;
        state.pending.push((id, entry));
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PendingEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state.pending.iter().map(|(_, e)| e.clone()).collect())
    }

    async fn pending_page(&self, after: Option<i64>, limit: usize) -> Result<PendingPage> {
        let state = self.state.lock().unwrap();
        let cursor = after.unwrap_or(0);
        Ok(state
            .pending
            .iter()
            .filter(|(id, _)| *id > cursor)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn remove_pending(&self, episode_id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.pending.len();
        state.pending.retain(|(_, e)| e.episode.id != episode_id);
        Ok(state.pending.len() != before)
    }

    async fn mark_processed(&self, episode_id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.processed.insert(episode_id.to_string()))
    }

    async fn is_processed(&self, episode_id: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.processed.contains(episode_id))
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().pending.len())
    }

    async fn processed_count(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().processed.len())
    }

    async fn reset_processed(&self) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let cleared = state.processed.len();
        state.processed.clear();
        Ok(cleared)
    }
}
