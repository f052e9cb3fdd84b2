//! Trait du catalogue de podcasts
//!
//! La couture de test du module `catalog` : le module ne connaît que ce
//! trait, jamais le client Spotify concret. Les tests du pipeline et du
//! module substituent une implémentation en mémoire.

use async_trait::async_trait;
use pmomodel::{Device, Episode, Show};

use crate::error::Result;

/// Accès au catalogue de podcasts et à la file de lecture
///
/// # Thread Safety
///
/// Toutes les implémentations doivent être `Send + Sync`.
#[async_trait]
pub trait PodcastCatalog: Send + Sync {
    /// Recherche des shows par requête libre
    async fn search_shows(&self, query: &str, limit: usize) -> Result<Vec<Show>>;

    /// Métadonnées d'un show par identifiant
    async fn show(&self, show_id: &str) -> Result<Show>;

    /// Derniers épisodes d'un show, du plus récent au plus ancien
    async fn show_episodes(&self, show_id: &str, limit: usize) -> Result<Vec<Episode>>;

    /// Périphériques de lecture connus
    async fn devices(&self) -> Result<Vec<Device>>;

    /// Ajoute un épisode (par URI) à la file de lecture active
    ///
    /// # Errors
    ///
    /// [`SpotifyError::NoActiveDevice`](crate::SpotifyError::NoActiveDevice)
    /// quand aucun périphérique n'est joignable;
    /// [`SpotifyError::Transient`](crate::SpotifyError::Transient) ou
    /// [`SpotifyError::RateLimitExceeded`](crate::SpotifyError::RateLimitExceeded)
    /// pour les échecs réessayables.
    async fn enqueue(&self, uri: &str) -> Result<()>;

    /// Démarre la lecture, sur un périphérique donné ou le périphérique actif
    async fn start_playback(&self, device_id: Option<&str>) -> Result<()>;
}
