//! Trait du scorer de pertinence
//!
//! Couture de test du module `scorer` : le module ne connaît que ce trait.

use async_trait::async_trait;
use pmomodel::{Episode, Evaluation, Preference};

use crate::error::Result;

/// Évaluation de pertinence d'épisodes par rapport aux préférences
///
/// # Thread Safety
///
/// Toutes les implémentations doivent être `Send + Sync`.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Évalue un épisode contre l'ensemble des préférences qui l'ont
    /// fait émerger. Produit un score dans [0, 1] et un résumé.
    async fn evaluate(&self, episode: &Episode, preferences: &[Preference])
        -> Result<Evaluation>;

    /// Résumé court d'un épisode, indépendant des préférences
    async fn summarize(&self, episode: &Episode) -> Result<String>;

    /// Nom du modèle sous-jacent, pour l'introspection
    fn model_name(&self) -> String;
}
