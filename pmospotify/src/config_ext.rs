//! Extension pour intégrer la configuration du catalogue dans pmoconfig
//!
//! Ce module fournit le trait `CatalogConfigExt` qui ajoute les méthodes de
//! gestion des credentials Spotify à pmoconfig::Config.

use anyhow::{anyhow, Result};
use pmoconfig::Config;
use serde_yaml::Value;

/// Trait d'extension pour gérer la configuration du catalogue
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmospotify::CatalogConfigExt;
///
/// let config = get_config();
/// let (client_id, client_secret, refresh_token) = config.get_catalog_credentials()?;
/// ```
pub trait CatalogConfigExt {
    /// Récupère l'identifiant client de l'API
    fn get_catalog_client_id(&self) -> Result<String>;

    /// Récupère le secret client de l'API
    fn get_catalog_client_secret(&self) -> Result<String>;

    /// Récupère le refresh token OAuth de l'utilisateur
    fn get_catalog_refresh_token(&self) -> Result<String>;

    /// Récupère les trois credentials d'un coup
    ///
    /// # Errors
    ///
    /// Retourne une erreur si l'un des credentials n'est pas configuré;
    /// c'est une erreur de configuration fatale pour une exécution.
    fn get_catalog_credentials(&self) -> Result<(String, String, String)>;

    /// Définit les credentials du catalogue
    fn set_catalog_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<()>;
}

fn get_non_empty(config: &Config, path: &[&str], what: &str) -> Result<String> {
    match config.get_value(path) {
        Ok(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(anyhow!("Catalog {} is not configured", what)),
    }
}

impl CatalogConfigExt for Config {
    fn get_catalog_client_id(&self) -> Result<String> {
        get_non_empty(self, &["catalog", "client_id"], "client id")
    }

    fn get_catalog_client_secret(&self) -> Result<String> {
        get_non_empty(self, &["catalog", "client_secret"], "client secret")
    }

    fn get_catalog_refresh_token(&self) -> Result<String> {
        get_non_empty(self, &["catalog", "refresh_token"], "refresh token")
    }

    fn get_catalog_credentials(&self) -> Result<(String, String, String)> {
        Ok((
            self.get_catalog_client_id()?,
            self.get_catalog_client_secret()?,
            self.get_catalog_refresh_token()?,
        ))
    }

    fn set_catalog_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<()> {
        self.set_value(
            &["catalog", "client_id"],
            Value::String(client_id.to_string()),
        )?;
        self.set_value(
            &["catalog", "client_secret"],
            Value::String(client_secret.to_string()),
        )?;
        self.set_value(
            &["catalog", "refresh_token"],
            Value::String(refresh_token.to_string()),
        )
    }
}
