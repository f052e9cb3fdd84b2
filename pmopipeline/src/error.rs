//! Types d'erreurs pour pmopipeline

/// Erreurs fatales d'une exécution du pipeline
///
/// Tout le reste (préférence en échec, scoring raté, périphérique absent)
/// est absorbé par l'exécution et visible dans le résumé.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration invalide; l'exécution avorte avant `Fetching`
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Une exécution est déjà en cours (au-plus-une à la fois)
    #[error("A run is already in progress")]
    AlreadyRunning,
}

/// Type Result spécialisé pour pmopipeline
pub type Result<T> = std::result::Result<T, PipelineError>;
