//! Structures de données de l'API Web Spotify
//!
//! Types de désérialisation bruts + conversions vers le modèle partagé
//! (`pmomodel`). Les épisodes Spotify arrivent sans identifiant de show;
//! il est injecté au moment de la conversion.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pmomodel::{Device, Episode, Show};
use serde::Deserialize;

/// Pagination générique de l'API Spotify
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    /// Les éléments peuvent être null dans les réponses de recherche
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub total: u32,
}

impl<T> Paging<T> {
    /// Éléments non nuls, dans l'ordre de la réponse
    pub fn into_items(self) -> Vec<T> {
        self.items.into_iter().flatten().collect()
    }
}

/// Réponse de `GET /v1/search?type=show`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchShowsResponse {
    pub shows: Paging<ShowObject>,
}

/// Un show tel que retourné par l'API
#[derive(Debug, Clone, Deserialize)]
pub struct ShowObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publisher: String,
}

impl From<ShowObject> for Show {
    fn from(show: ShowObject) -> Self {
        Show {
            id: show.id,
            name: show.name,
            description: show.description,
            publisher: show.publisher,
        }
    }
}

/// Un épisode tel que retourné par `GET /v1/shows/{id}/episodes`
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_ms: u64,
    /// Précision variable : "2025", "2025-03" ou "2025-03-14"
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub uri: Option<String>,
}

impl EpisodeObject {
    /// Conversion vers le modèle partagé, show parent injecté
    pub fn into_episode(self, show_id: &str) -> Episode {
        Episode {
            id: self.id,
            show_id: show_id.to_string(),
            name: self.name,
            description: self.description,
            duration_seconds: (self.duration_ms / 1000) as u32,
            published_at: parse_release_date(&self.release_date),
            uri: self.uri,
        }
    }
}

/// Réponse de `GET /v1/me/player/devices`
#[derive(Debug, Clone, Deserialize)]
pub struct DevicesResponse {
    #[serde(default = "Vec::new")]
    pub devices: Vec<DeviceObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceObject {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

impl From<DeviceObject> for Device {
    fn from(device: DeviceObject) -> Self {
        Device {
            id: device.id.unwrap_or_default(),
            name: device.name,
            is_active: device.is_active,
        }
    }
}

/// Réponse du endpoint de token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// Corps d'erreur standard de l'API (`{"error": {"status", "message", "reason"?}}`)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parse une date de publication à précision variable, minuit UTC par défaut
fn parse_release_date(raw: &str) -> DateTime<Utc> {
    let candidates = [
        raw.to_string(),
        format!("{}-01", raw),
        format!("{}-01-01", raw),
    ];
    for candidate in &candidates {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
            if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
                return Utc.from_utc_datetime(&datetime);
            }
        }
    }
    // Date inconnue : époque plutôt qu'un échec de désérialisation
    Utc.timestamp_opt(0, 0).unwrap()
}
