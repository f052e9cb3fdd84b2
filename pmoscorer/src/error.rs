//! Gestion des erreurs pour le scorer

use pmodispatch::{kinds, DomainError};
use thiserror::Error;

/// Type Result personnalisé pour pmoscorer
pub type Result<T> = std::result::Result<T, ScorerError>;

/// Erreurs possibles lors de l'évaluation d'un épisode
#[derive(Error, Debug)]
pub enum ScorerError {
    /// Clé API refusée
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// Erreur transitoire (timeout, 5xx)
    #[error("Transient error: {0}")]
    Transient(String),

    /// Le modèle n'a pas respecté le contrat JSON
    #[error("Model response is not the expected JSON: {0}")]
    InvalidResponse(String),

    /// Erreur de configuration (clé manquante)
    #[error("Scorer configuration error: {0}")]
    Configuration(String),

    /// Erreur de l'API du fournisseur
    #[error("Scorer API error (status {status}): {message}")]
    ApiError { status: u16, message: String },
}

impl From<reqwest::Error> for ScorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ScorerError::Transient(err.to_string())
        } else {
            ScorerError::ApiError {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

impl ScorerError {
    /// Kind stable pour l'enveloppe d'erreur du protocole
    pub fn kind(&self) -> &str {
        match self {
            ScorerError::RateLimitExceeded | ScorerError::Transient(_) => kinds::TRANSIENT,
            _ => "scorer",
        }
    }
}

impl From<ScorerError> for DomainError {
    fn from(err: ScorerError) -> Self {
        DomainError::new(err.kind(), err.to_string())
    }
}
