//! Module de capacités `scorer`
//!
//! Expose l'évaluation de pertinence au routeur de dispatch. Seul ce
//! module parle au fournisseur de modèle de langage.

use std::sync::Arc;

use pmodispatch::{
    accessor, async_trait, handler, CapabilityModule, DomainError, OperationRegistry,
    ResourceRegistry, ResourceSpec, Schema, ValueKind,
};
use pmomodel::{Episode, Preference};
use serde_json::{json, Value};

use crate::scorer::RelevanceScorer;

const MODULE_NAME: &str = "scorer";
const MODULE_VERSION: &str = "1.0.0";

fn invalid_args(message: impl Into<String>) -> DomainError {
    DomainError::new("scorer", message)
}

fn parse_episode(args: &Value) -> Result<Episode, DomainError> {
    serde_json::from_value(args["episode"].clone())
        .map_err(|e| invalid_args(format!("Invalid episode: {}", e)))
}

/// Module `scorer` : évaluation et résumé d'épisodes
pub struct ScorerModule {
    operations: OperationRegistry,
    resources: ResourceRegistry,
}

impl ScorerModule {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> pmodispatch::Result<Self> {
        let mut operations = OperationRegistry::new();

        let sc = scorer.clone();
        operations.register(
            "evaluate",
            Schema::object()
                .field("episode", ValueKind::Object)
                .field("preferences", ValueKind::Array(Box::new(ValueKind::Object))),
            handler(move |args| {
                let sc = sc.clone();
                async move {
                    let episode = parse_episode(&args)?;
                    let preferences: Vec<Preference> =
                        serde_json::from_value(args["preferences"].clone())
                            .map_err(|e| invalid_args(format!("Invalid preferences: {}", e)))?;
                    let evaluation = sc.evaluate(&episode, &preferences).await?;
                    Ok(serde_json::to_value(evaluation)
                        .map_err(|e| invalid_args(e.to_string()))?)
                }
            }),
        )?;

        let sc = scorer.clone();
        operations.register(
            "summarize",
            Schema::object().field("episode", ValueKind::Object),
            handler(move |args| {
                let sc = sc.clone();
                async move {
                    let episode = parse_episode(&args)?;
                    let summary = sc.summarize(&episode).await?;
                    Ok(json!({"summary": summary}))
                }
            }),
        )?;

        let mut resources = ResourceRegistry::new();

        let sc = scorer.clone();
        resources.register(
            ResourceSpec::new("scorer://model", "Scoring Model", "application/json"),
            accessor(move |_| {
                let sc = sc.clone();
                async move { Ok(json!({"model": sc.model_name()})) }
            }),
        )?;

        Ok(Self {
            operations,
            resources,
        })
    }
}

#[async_trait]
impl CapabilityModule for ScorerModule {
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
    use crate::error::ScorerError;
    use chrono::Utc;
    use pmodispatch::DispatchError;
    use pmomodel::Evaluation;

    /// Scorer naïf : pertinent si un thème apparaît dans le titre
    struct KeywordScorer;

    #[async_trait]
    impl RelevanceScorer for KeywordScorer {
        async fn evaluate(
            &self,
            episode: &Episode,
            preferences: &[Preference],
        ) -> crate::Result<Evaluation> {
            let name = episode.name.to_lowercase();
            let hit = preferences
                .iter()
                .flat_map(|p| p.topics.iter())
                .any(|topic| name.contains(&topic.to_lowercase()));
            let score = if hit { 0.9 } else { 0.1 };
            Ok(Evaluation::new(episode.id.clone(), score, "keyword match"))
        }

        async fn summarize(&self, episode: &Episode) -> crate::Result<String> {
            if episode.description.is_empty() {
                return Err(ScorerError::InvalidResponse("nothing to summarize".into()));
            }
            Ok(episode.description.clone())
        }

        fn model_name(&self) -> String {
            "keyword".to_string()
        }
    }

    fn episode(name: &str) -> Episode {
        Episode {
            id: "e1".to_string(),
            show_id: "s1".to_string(),
            name: name.to_string(),
            description: String::new(),
            duration_seconds: 900,
            published_at: Utc::now(),
            uri: None,
        }
    }

    fn module() -> ScorerModule {
        ScorerModule::new(Arc::new(KeywordScorer)).unwrap()
    }

    #[tokio::test]
    async fn evaluate_returns_evaluation_json() {
        let preferences = vec![Preference::for_topics(["rust"])];
        let result = module()
            .invoke(
                "evaluate",
                json!({"episode": episode("Rust in production"), "preferences": preferences}),
            )
            .await
            .unwrap();
        assert_eq!(result["episode_id"], "e1");
        assert_eq!(result["relevance_score"], 0.9);
    }

    #[tokio::test]
    async fn evaluate_requires_preferences_array() {
        let err = module()
            .invoke("evaluate", json!({"episode": episode("x")}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn summarize_failure_keeps_scorer_kind() {
        let err = module()
            .invoke("summarize", json!({"episode": episode("no description")}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "scorer");
    }

    #[tokio::test]
    async fn model_resource() {
        let value = module().read("scorer://model").await.unwrap();
        assert_eq!(value["model"], "keyword");
    }
}
