//! # pmomodel - Domain model for PMOPodcast
//!
//! Types partagés entre le catalogue, le scorer, la file d'attente et le
//! pipeline de découverte. Tous les types sont sérialisables (serde) et
//! traversent la frontière dispatch sous forme de `serde_json::Value`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Erreurs de validation du modèle
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("A preference needs at least a show id, a show name or one topic")]
    EmptyPreference,
}

/// Type Result spécialisé pour pmomodel
pub type Result<T> = std::result::Result<T, ModelError>;

/// Un épisode de podcast tel que retourné par le catalogue
///
/// L'identité d'un épisode est son `id`; le reste des champs est immuable
/// après récupération.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Episode {
    /// Identifiant unique de l'épisode dans le catalogue
    pub id: String,
    /// Identifiant du show parent
    pub show_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Durée en secondes
    pub duration_seconds: u32,
    pub published_at: DateTime<Utc>,
    /// URI de lecture (nécessaire pour la mise en file d'attente)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Un show (émission) du catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Show {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publisher: String,
}

/// Un périphérique de lecture connu du catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// Préférence utilisateur pour la découverte d'épisodes
///
/// Au moins un critère d'identification (show_id, show_name ou topics) doit
/// être présent; l'invariant est garanti par [`Preference::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Preference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub topics: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_seconds: Option<u32>,
}

impl Preference {
    /// Construit une préférence en vérifiant l'invariant de création
    pub fn new(
        show_id: Option<String>,
        show_name: Option<String>,
        topics: BTreeSet<String>,
        min_duration_seconds: Option<u32>,
        max_duration_seconds: Option<u32>,
    ) -> Result<Self> {
        let pref = Self {
            show_id,
            show_name,
            topics,
            min_duration_seconds,
            max_duration_seconds,
        };
        pref.validate()?;
        Ok(pref)
    }

    /// Préférence ciblant un show par son identifiant
    pub fn for_show_id(show_id: impl Into<String>) -> Self {
        Self {
            show_id: Some(show_id.into()),
            show_name: None,
            topics: BTreeSet::new(),
            min_duration_seconds: None,
            max_duration_seconds: None,
        }
    }

    /// Préférence ciblant un show par son nom
    pub fn for_show_name(show_name: impl Into<String>) -> Self {
        Self {
            show_id: None,
            show_name: Some(show_name.into()),
            topics: BTreeSet::new(),
            min_duration_seconds: None,
            max_duration_seconds: None,
        }
    }

    /// Préférence thématique
    pub fn for_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            show_id: None,
            show_name: None,
            topics: topics.into_iter().map(Into::into).collect(),
            min_duration_seconds: None,
            max_duration_seconds: None,
        }
    }

    /// Ajoute une contrainte de durée (en secondes)
    pub fn with_duration(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_duration_seconds = min;
        self.max_duration_seconds = max;
        self
    }

    /// Vérifie l'invariant de création (utile après désérialisation)
    pub fn validate(&self) -> Result<()> {
        if self.show_id.is_none() && self.show_name.is_none() && self.topics.is_empty() {
            return Err(ModelError::EmptyPreference);
        }
        Ok(())
    }

    /// Teste la contrainte de durée, quand elle est définie
    pub fn duration_ok(&self, duration_seconds: u32) -> bool {
        if let Some(min) = self.min_duration_seconds {
            if duration_seconds < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration_seconds {
            if duration_seconds > max {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.show_name {
            write!(f, "Podcast: {}", name)
        } else if let Some(id) = &self.show_id {
            write!(f, "Show: {}", id)
        } else {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();
            write!(f, "Topics: {}", topics.join(", "))
        }
    }
}

/// Résultat de l'évaluation de pertinence d'un épisode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Evaluation {
    pub episode_id: String,
    /// Score dans [0, 1]
    pub relevance_score: f64,
    pub summary: String,
}

impl Evaluation {
    /// Construit une évaluation, score ramené dans [0, 1]
    pub fn new(episode_id: impl Into<String>, relevance_score: f64, summary: impl Into<String>) -> Self {
        Self {
            episode_id: episode_id.into(),
            relevance_score: relevance_score.clamp(0.0, 1.0),
            summary: summary.into(),
        }
    }
}

/// Raison du report d'un épisode dans la file d'attente hors-ligne
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum PendingReason {
    /// Aucun périphérique de lecture joignable
    NoDevice,
    /// Échec transitoire (timeout, rate limit) après retry
    TransientFailure,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingReason::NoDevice => write!(f, "no_device"),
            PendingReason::TransientFailure => write!(f, "transient_failure"),
        }
    }
}

impl std::str::FromStr for PendingReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no_device" => Ok(PendingReason::NoDevice),
            "transient_failure" => Ok(PendingReason::TransientFailure),
            other => Err(format!("Unknown pending reason: {}", other)),
        }
    }
}

/// Épisode différé en attente d'un périphérique de lecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PendingEntry {
    pub episode: Episode,
    pub queued_at: DateTime<Utc>,
    pub reason: PendingReason,
}

impl PendingEntry {
    pub fn new(episode: Episode, reason: PendingReason) -> Self {
        Self {
            episode,
            queued_at: Utc::now(),
            reason,
        }
    }
}

/// Échec enregistré pour une préférence pendant une exécution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PreferenceFailure {
    /// Description lisible de la préférence concernée
    pub preference: String,
    pub message: String,
}

/// Résumé d'une exécution du pipeline de découverte
///
/// C'est le seul résultat visible de l'extérieur d'une exécution; il est
/// toujours produit, même quand chaque élément a échoué. La distinction
/// entre « rien de pertinent » et « tout a échoué » reste lisible dans les
/// compteurs et `per_preference_errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunSummary {
    /// Épisodes candidats récupérés du catalogue
    pub fetched: usize,
    /// Candidats survivant au filtrage (dédup + durée + plafond)
    pub filtered: usize,
    /// Candidats effectivement évalués par le scorer
    pub scored: usize,
    /// Épisodes ajoutés à la file de lecture
    pub enqueued: usize,
    /// Épisodes reportés dans la file hors-ligne
    pub deferred: usize,
    pub per_preference_errors: Vec<PreferenceFailure>,
}
