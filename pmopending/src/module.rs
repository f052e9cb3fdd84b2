//! Module de capacités `queue`
//!
//! Expose le store des épisodes en attente et le registre de dédup au
//! routeur de dispatch. Seul ce module touche le store.

use std::sync::Arc;

use pmodispatch::{
    accessor, async_trait, handler, CapabilityModule, DomainError, OperationRegistry,
    ResourceRegistry, ResourceSpec, Schema, ValueKind,
};
use pmomodel::PendingEntry;
use serde_json::json;
use tracing::info;

use crate::store::PendingStore;

const MODULE_NAME: &str = "queue";
const MODULE_VERSION: &str = "1.0.0";

/// Kind des erreurs domaine émises par ce module
const ERROR_KIND: &str = "queue";

fn store_error(err: crate::Error) -> DomainError {
    DomainError::new(ERROR_KIND, err.to_string())
}

/// Module `queue` : file hors-ligne + registre des épisodes traités
pub struct QueueModule {
    operations: OperationRegistry,
    resources: ResourceRegistry,
}

impl QueueModule {
    pub fn new(store: Arc<dyn PendingStore>) -> pmodispatch::Result<Self> {
        let mut operations = OperationRegistry::new();

        let st = store.clone();
        operations.register(
            "add_pending",
            Schema::object().field("entry", ValueKind::Object),
            handler(move |args| {
                let st = st.clone();
                async move {
                    let entry: PendingEntry = serde_json::from_value(args["entry"].clone())
                        .map_err(|e| DomainError::new(ERROR_KIND, format!("Invalid entry: {}", e)))?;
                    info!(episode_id=%entry.episode.id, reason=%entry.reason,
                          "Deferring episode to pending queue");
                    st.add_pending(entry).await.map_err(store_error)?;
                    let pending = st.pending_count().await.map_err(store_error)?;
                    Ok(json!({"pending": pending}))
                }
            }),
        )?;

        let st = store.clone();
        operations.register(
            "get_pending",
            Schema::object(),
            handler(move |_| {
                let st = st.clone();
                async move {
                    let entries = st.list_pending().await.map_err(store_error)?;
                    Ok(json!({"entries": entries}))
                }
            }),
        )?;

        let st = store.clone();
        operations.register(
            "remove_pending",
            Schema::object().field("episode_id", ValueKind::String),
            handler(move |args| {
                let st = st.clone();
                async move {
                    let id = args["episode_id"].as_str().unwrap_or_default();
                    let removed = st.remove_pending(id).await.map_err(store_error)?;
                    Ok(json!({"removed": removed}))
                }
            }),
        )?;

        let st = store.clone();
        operations.register(
            "is_processed",
            Schema::object().field("episode_id", ValueKind::String),
            handler(move |args| {
                let st = st.clone();
                async move {
                    let id = args["episode_id"].as_str().unwrap_or_default();
                    let processed = st.is_processed(id).await.map_err(store_error)?;
                    Ok(json!({"processed": processed}))
                }
            }),
        )?;

        let st = store.clone();
        operations.register(
            "mark_processed",
            Schema::object().field("episode_id", ValueKind::String),
            handler(move |args| {
                let st = st.clone();
                async move {
                    let id = args["episode_id"].as_str().unwrap_or_default();
                    let inserted = st.mark_processed(id).await.map_err(store_error)?;
                    Ok(json!({"inserted": inserted}))
                }
            }),
        )?;

        let st = store.clone();
        operations.register(
            "reset_processed",
            Schema::object(),
            handler(move |_| {
                let st = st.clone();
                async move {
                    let cleared = st.reset_processed().await.map_err(store_error)?;
                    info!(cleared, "Processed ledger reset by operator");
                    Ok(json!({"cleared": cleared}))
                }
            }),
        )?;

        let mut resources = ResourceRegistry::new();

        let st = store.clone();
        resources.register(
            ResourceSpec::new("queue://pending", "Pending Episodes", "application/json"),
            accessor(move |_| {
                let st = st.clone();
                async move {
                    let entries = st.list_pending().await.map_err(store_error)?;
                    Ok(json!({"entries": entries}))
                }
            }),
        )?;

        let st = store.clone();
        resources.register(
            ResourceSpec::new(
                "queue://processed/count",
                "Processed Ledger Size",
                "application/json",
            ),
            accessor(move |_| {
                let st = st.clone();
                async move {
                    let count = st.processed_count().await.map_err(store_error)?;
                    Ok(json!({"count": count}))
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
impl CapabilityModule for QueueModule {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPendingStore;
    use chrono::Utc;
    use pmomodel::{Episode, PendingReason};
    use serde_json::Value;

    fn episode(id: &str) -> Episode {
        Episode {
            id: id.to_string(),
            show_id: "show-1".to_string(),
            name: format!("Episode {}", id),
            description: String::new(),
            duration_seconds: 900,
            published_at: Utc::now(),
            uri: Some(format!("spotify:episode:{}", id)),
        }
    }

    fn module() -> QueueModule {
        QueueModule::new(Arc::new(MemoryPendingStore::new())).unwrap()
    }

    #[tokio::test]
    async fn add_then_get_pending() {
        let module = module();
        let entry = PendingEntry::new(episode("e1"), PendingReason::NoDevice);

        let result = module
            .invoke("add_pending", json!({"entry": entry}))
            .await
            .unwrap();
        assert_eq!(result["pending"], 1);

        let listed = module.invoke("get_pending", Value::Null).await.unwrap();
        assert_eq!(listed["entries"].as_array().unwrap().len(), 1);
        assert_eq!(listed["entries"][0]["episode"]["id"], "e1");
    }

    #[tokio::test]
    async fn mark_processed_is_idempotent_through_the_module() {
        let module = module();

        let first = module
            .invoke("mark_processed", json!({"episode_id": "e1"}))
            .await
            .unwrap();
        assert_eq!(first["inserted"], true);

        let second = module
            .invoke("mark_processed", json!({"episode_id": "e1"}))
            .await
            .unwrap();
        assert_eq!(second["inserted"], false);

        let processed = module
            .invoke("is_processed", json!({"episode_id": "e1"}))
            .await
            .unwrap();
        assert_eq!(processed["processed"], true);
    }

    #[tokio::test]
    async fn remove_absent_is_silent() {
        let module = module();
        let result = module
            .invoke("remove_pending", json!({"episode_id": "ghost"}))
            .await
            .unwrap();
        assert_eq!(result["removed"], false);
    }

    #[tokio::test]
    async fn resources_reflect_store_state() {
        let module = module();
        module
            .invoke("mark_processed", json!({"episode_id": "e1"}))
            .await
            .unwrap();

        let count = module.read("queue://processed/count").await.unwrap();
        assert_eq!(count["count"], 1);

        let pending = module.read("queue://pending").await.unwrap();
        assert_eq!(pending["entries"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn reset_clears_ledger() {
        let module = module();
        for id in ["a", "b", "c"] {
            module
                .invoke("mark_processed", json!({"episode_id": id}))
                .await
                .unwrap();
        }
        let result = module.invoke("reset_processed", Value::Null).await.unwrap();
        assert_eq!(result["cleared"], 3);
    }

    #[test]
    fn describe_lists_everything() {
        let description = module().describe();
        assert_eq!(description.name, "queue");
        assert_eq!(description.operations.len(), 6);
        assert_eq!(description.resources.len(), 2);
    }
}
