//! Gestion des erreurs pour le client Spotify

use pmodispatch::{kinds, DomainError};
use thiserror::Error;

/// Type Result personnalisé pour pmospotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Erreurs possibles lors de l'utilisation du client Spotify
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Erreur d'authentification (credentials ou token invalides)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Aucun périphérique de lecture actif
    #[error("No active playback device")]
    NoActiveDevice,

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// Erreur transitoire (timeout, 5xx)
    #[error("Transient error: {0}")]
    Transient(String),

    /// Ressource non trouvée (show, épisode)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur de configuration (credentials manquants)
    #[error("Spotify configuration error: {0}")]
    Configuration(String),

    /// Erreur de l'API Spotify
    #[error("Spotify API error (status {status}): {message}")]
    ApiError { status: u16, message: String },
}

impl From<reqwest::Error> for SpotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SpotifyError::Transient(err.to_string())
        } else {
            SpotifyError::ApiError {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl SpotifyError {
    /// Kind stable pour l'enveloppe d'erreur du protocole
    pub fn kind(&self) -> &str {
        match self {
            SpotifyError::NoActiveDevice => kinds::NO_DEVICE,
            SpotifyError::RateLimitExceeded | SpotifyError::Transient(_) => kinds::TRANSIENT,
            _ => "catalog",
        }
    }
}

impl From<SpotifyError> for DomainError {
    fn from(err: SpotifyError) -> Self {
        DomainError::new(err.kind(), err.to_string())
    }
}
