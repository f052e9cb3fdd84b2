//! Client principal pour interagir avec l'API Web Spotify
//!
//! Implémente [`PodcastCatalog`] au-dessus de la couche API bas-niveau.

use async_trait::async_trait;
use pmomodel::{Device, Episode, Show};
use tracing::{debug, info};

use crate::api::SpotifyApi;
use crate::catalog::PodcastCatalog;
use crate::config_ext::CatalogConfigExt;
use crate::error::Result;
use crate::models::{DevicesResponse, EpisodeObject, Paging, SearchShowsResponse};

/// Client Spotify haut-niveau
pub struct SpotifyCatalog {
    /// API bas-niveau
    api: SpotifyApi,
}

impl SpotifyCatalog {
    /// Crée un client avec des credentials explicites
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api: SpotifyApi::new(client_id, client_secret, refresh_token)?,
        })
    }

    /// Crée un client en utilisant la configuration de pmoconfig
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmoconfig::get_config;
    /// use pmospotify::SpotifyCatalog;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let catalog = SpotifyCatalog::from_config(&get_config())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        let (client_id, client_secret, refresh_token) = config
            .get_catalog_credentials()
            .map_err(|e| crate::SpotifyError::Configuration(e.to_string()))?;
        info!("Creating Spotify catalog client");
        Self::new(client_id, client_secret, refresh_token)
    }
}

#[async_trait]
impl PodcastCatalog for SpotifyCatalog {
    async fn search_shows(&self, query: &str, limit: usize) -> Result<Vec<Show>> {
        debug!(query, limit, "Searching shows");
        let response: SearchShowsResponse = self
            .api
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "show".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response
            .shows
            .into_items()
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn show(&self, show_id: &str) -> Result<Show> {
        let show: crate::models::ShowObject = self
            .api
            .get_json(&format!("/shows/{}", show_id), &[])
            .await?;
        Ok(show.into())
    }

    async fn show_episodes(&self, show_id: &str, limit: usize) -> Result<Vec<Episode>> {
        debug!(show_id, limit, "Fetching show episodes");
        let response: Paging<EpisodeObject> = self
            .api
            .get_json(
                &format!("/shows/{}/episodes", show_id),
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(response
            .into_items()
            .into_iter()
            .map(|episode| episode.into_episode(show_id))
            .collect())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let response: DevicesResponse = self.api.get_json("/me/player/devices", &[]).await?;
        Ok(response.devices.into_iter().map(Into::into).collect())
    }

    async fn enqueue(&self, uri: &str) -> Result<()> {
        info!(uri, "Adding episode to playback queue");
        self.api
            .post_empty("/me/player/queue", &[("uri", uri.to_string())])
            .await
    }

    async fn start_playback(&self, device_id: Option<&str>) -> Result<()> {
        let query = match device_id {
            Some(id) => format!("/me/player/play?device_id={}", id),
            None => "/me/player/play".to_string(),
        };
        self.api.put_json(&query, None).await
    }
}
