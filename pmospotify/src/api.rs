//! Couche d'accès bas-niveau à l'API Web Spotify
//!
//! Gère le token d'accès (refresh token OAuth) et la traduction des
//! statuts HTTP en erreurs typées. La file de lecture sans périphérique
//! actif répond 404 avec `reason: NO_ACTIVE_DEVICE`; c'est une condition
//! opérationnelle, pas une erreur de programmation.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SpotifyError};
use crate::models::{ApiErrorBody, TokenResponse};

/// URL de base de l'API Web
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Endpoint d'échange de tokens
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Marge de sécurité avant expiration du token
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Client API bas-niveau pour communiquer avec Spotify
pub struct SpotifyApi {
    /// Client HTTP
    client: Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    /// Token d'accès courant, rafraîchi à la demande
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyApi {
    /// Crée une nouvelle instance de l'API
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token: Mutex::new(None),
        })
    }

    /// Retourne un token d'accès valide, rafraîchi si nécessaire
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("Refreshing Spotify access token");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::BAD_REQUEST
        {
            return Err(SpotifyError::Unauthorized(
                "Token refresh rejected; check client credentials and refresh token".to_string(),
            ));
        }
        let response = Self::check_status(response).await?;
        let token: TokenResponse = response.json().await?;

        let expires_in = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + expires_in,
        });
        Ok(token.access_token)
    }

    /// Traduit un statut d'erreur HTTP en erreur typée
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorBody>(&body).ok();
        let reason = detail
            .as_ref()
            .and_then(|b| b.error.reason.clone())
            .unwrap_or_default();
        let message = detail
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(body);

        let err = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SpotifyError::Unauthorized(message)
            }
            StatusCode::TOO_MANY_REQUESTS => SpotifyError::RateLimitExceeded,
            StatusCode::NOT_FOUND if reason == "NO_ACTIVE_DEVICE" => {
                SpotifyError::NoActiveDevice
            }
            StatusCode::NOT_FOUND => SpotifyError::NotFound(message),
            s if s.is_server_error() => SpotifyError::Transient(format!("{}: {}", s, message)),
            s => {
                warn!(status=%s, "Unexpected Spotify API status");
                SpotifyError::ApiError {
                    status: s.as_u16(),
                    message,
                }
            }
        };
        Err(err)
    }

    /// GET authentifié retournant du JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}{}", API_BASE_URL, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST authentifié sans corps (la file de lecture s'adresse en query)
    pub async fn post_empty(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}{}", API_BASE_URL, path))
            .bearer_auth(token)
            .query(query)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// PUT authentifié avec corps JSON optionnel
    pub async fn put_json(&self, path: &str, body: Option<serde_json::Value>) -> Result<()> {
        let token = self.access_token().await?;
        let mut request = self
            .client
            .put(format!("{}{}", API_BASE_URL, path))
            .bearer_auth(token);
        request = match body {
            Some(body) => request.json(&body),
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        let response = request.send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
