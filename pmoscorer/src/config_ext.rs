//! Extension pour intégrer la configuration du scorer dans pmoconfig

use anyhow::{anyhow, Result};
use pmoconfig::Config;
use serde_yaml::Value;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Trait d'extension pour gérer la configuration du scorer
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmoscorer::ScorerConfigExt;
///
/// let config = get_config();
/// let key = config.get_scorer_api_key()?;
/// ```
pub trait ScorerConfigExt {
    /// Récupère la clé API du scorer
    ///
    /// # Errors
    ///
    /// Retourne une erreur si la clé n'est pas configurée; c'est une
    /// erreur de configuration fatale pour une exécution.
    fn get_scorer_api_key(&self) -> Result<String>;

    /// Définit la clé API du scorer
    fn set_scorer_api_key(&self, key: &str) -> Result<()>;

    /// Endpoint compatible chat-completions (défaut : api.openai.com)
    fn get_scorer_endpoint(&self) -> String;

    /// Nom du modèle à utiliser (défaut : gpt-4o)
    fn get_scorer_model(&self) -> String;

    /// Définit le modèle à utiliser
    fn set_scorer_model(&self, model: &str) -> Result<()>;
}

impl ScorerConfigExt for Config {
    fn get_scorer_api_key(&self) -> Result<String> {
        match self.get_value(&["scorer", "api_key"]) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => Err(anyhow!("Scorer API key is not configured")),
        }
    }

    fn set_scorer_api_key(&self, key: &str) -> Result<()> {
        self.set_value(&["scorer", "api_key"], Value::String(key.to_string()))
    }

    fn get_scorer_endpoint(&self) -> String {
        match self.get_value(&["scorer", "endpoint"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => DEFAULT_ENDPOINT.to_string(),
        }
    }

    fn get_scorer_model(&self) -> String {
        match self.get_value(&["scorer", "model"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => DEFAULT_MODEL.to_string(),
        }
    }

    fn set_scorer_model(&self, model: &str) -> Result<()> {
        self.set_value(&["scorer", "model"], Value::String(model.to_string()))
    }
}
