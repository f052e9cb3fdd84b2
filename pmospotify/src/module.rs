//! Module de capacités `catalog`
//!
//! Expose la recherche d'épisodes, la file de lecture et les périphériques
//! au routeur de dispatch. Seul ce module parle au catalogue externe.

use std::sync::Arc;

use pmodispatch::{
    accessor, async_trait, handler, CapabilityModule, DomainError, OperationRegistry,
    ResourceRegistry, ResourceSpec, Schema, ValueKind,
};
use pmomodel::{Episode, Preference};
use serde_json::json;
use tracing::debug;

use crate::catalog::PodcastCatalog;

const MODULE_NAME: &str = "catalog";
const MODULE_VERSION: &str = "1.0.0";

// Limites de récupération : bornent le coût d'une préférence
const SHOW_EPISODE_LIMIT: usize = 10;
const TOPIC_SHOW_LIMIT: usize = 5;
const TOPIC_EPISODE_LIMIT: usize = 3;
const DEFAULT_SEARCH_LIMIT: usize = 5;

fn invalid_args(message: impl Into<String>) -> DomainError {
    DomainError::new("catalog", message)
}

/// Récupère les épisodes candidats pour une préférence
///
/// Par identifiant de show directement; par nom de show via une recherche
/// limitée à un résultat; par thèmes via une recherche OR sur plusieurs
/// shows, quelques épisodes chacun.
async fn episodes_for_preference(
    catalog: &Arc<dyn PodcastCatalog>,
    preference: &Preference,
) -> Result<Vec<Episode>, DomainError> {
    if let Some(show_id) = &preference.show_id {
        return Ok(catalog.show_episodes(show_id, SHOW_EPISODE_LIMIT).await?);
    }

    if let Some(show_name) = &preference.show_name {
        let shows = catalog.search_shows(show_name, 1).await?;
        return match shows.first() {
            Some(show) => Ok(catalog.show_episodes(&show.id, SHOW_EPISODE_LIMIT).await?),
            None => Ok(Vec::new()),
        };
    }

    let topics: Vec<&str> = preference.topics.iter().map(String::as_str).collect();
    let query = topics.join(" OR ");
    let shows = catalog.search_shows(&query, TOPIC_SHOW_LIMIT).await?;
    let mut episodes = Vec::new();
    for show in shows {
        episodes.extend(catalog.show_episodes(&show.id, TOPIC_EPISODE_LIMIT).await?);
    }
    Ok(episodes)
}

/// Module `catalog` : recherche, file de lecture, périphériques
pub struct CatalogModule {
    operations: OperationRegistry,
    resources: ResourceRegistry,
}

impl CatalogModule {
    pub fn new(catalog: Arc<dyn PodcastCatalog>) -> pmodispatch::Result<Self> {
        let mut operations = OperationRegistry::new();

        let cat = catalog.clone();
        operations.register(
            "search_shows",
            Schema::object()
                .field("query", ValueKind::String)
                .optional("limit", ValueKind::Integer),
            handler(move |args| {
                let cat = cat.clone();
                async move {
                    let query = args["query"].as_str().unwrap_or_default();
                    let limit = args["limit"]
                        .as_u64()
                        .map(|l| l as usize)
                        .unwrap_or(DEFAULT_SEARCH_LIMIT);
                    let shows = cat.search_shows(query, limit).await?;
                    Ok(json!({"shows": shows}))
                }
            }),
        )?;

        let cat = catalog.clone();
        operations.register(
            "show_episodes",
            Schema::object()
                .field("show_id", ValueKind::String)
                .optional("limit", ValueKind::Integer),
            handler(move |args| {
                let cat = cat.clone();
                async move {
                    let show_id = args["show_id"].as_str().unwrap_or_default();
                    let limit = args["limit"]
                        .as_u64()
                        .map(|l| l as usize)
                        .unwrap_or(SHOW_EPISODE_LIMIT);
                    let episodes = cat.show_episodes(show_id, limit).await?;
                    Ok(json!({"episodes": episodes}))
                }
            }),
        )?;

        let cat = catalog.clone();
        operations.register(
            "search_episodes",
            Schema::object().field("preference", ValueKind::Object),
            handler(move |args| {
                let cat = cat.clone();
                async move {
                    let preference: Preference =
                        serde_json::from_value(args["preference"].clone())
                            .map_err(|e| invalid_args(format!("Invalid preference: {}", e)))?;
                    preference
                        .validate()
                        .map_err(|e| invalid_args(e.to_string()))?;
                    debug!(preference=%preference, "Searching episodes for preference");
                    let episodes = episodes_for_preference(&cat, &preference).await?;
                    Ok(json!({"episodes": episodes}))
                }
            }),
        )?;

        let cat = catalog.clone();
        operations.register(
            "enqueue_now",
            Schema::object()
                .field("episode_id", ValueKind::String)
                .field("uri", ValueKind::String),
            handler(move |args| {
                let cat = cat.clone();
                async move {
                    let episode_id = args["episode_id"].as_str().unwrap_or_default();
                    let uri = args["uri"].as_str().unwrap_or_default();
                    debug!(episode_id, uri, "Enqueue requested");
                    cat.enqueue(uri).await?;
                    Ok(json!({"queued": true}))
                }
            }),
        )?;

        let cat = catalog.clone();
        operations.register(
            "get_devices",
            Schema::object(),
            handler(move |_| {
                let cat = cat.clone();
                async move {
                    let devices = cat.devices().await?;
                    Ok(json!({"devices": devices}))
                }
            }),
        )?;

        let cat = catalog.clone();
        operations.register(
            "start_playback",
            Schema::object().optional("device_id", ValueKind::String),
            handler(move |args| {
                let cat = cat.clone();
                async move {
                    let device_id = args["device_id"].as_str();
                    cat.start_playback(device_id).await?;
                    Ok(json!({"started": true}))
                }
            }),
        )?;

        let mut resources = ResourceRegistry::new();

        let cat = catalog.clone();
        resources.register(
            ResourceSpec::new("catalog://devices", "Playback Devices", "application/json"),
            accessor(move |_| {
                let cat = cat.clone();
                async move {
                    let devices = cat.devices().await?;
                    Ok(json!({"devices": devices}))
                }
            }),
        )?;

        let cat = catalog.clone();
        resources.register(
            ResourceSpec::new("catalog://shows/*", "Show Metadata", "application/json"),
            accessor(move |uri| {
                let cat = cat.clone();
                async move {
                    let show_id = uri
                        .strip_prefix("catalog://shows/")
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| invalid_args(format!("Missing show id in {}", uri)))?;
                    let show = cat.show(show_id).await?;
                    Ok(serde_json::to_value(show)
                        .map_err(|e| invalid_args(e.to_string()))?)
                }
            }),
        )?;

        Ok(Self {
            operations,
            resources,
        })
    }
}

#[async_trait]
impl CapabilityModule for CatalogModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn version(&self) -> &str {
        MODULE_VERSION
    }

    fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }
}
