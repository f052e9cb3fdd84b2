//! Dispatch router
//!
//! The router owns the module map and does exactly two things: name
//! resolution and uniform error shaping. No business logic lives here, so
//! capability modules can be tested, replaced or mocked independently of
//! the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::envelope::{Request, RequestKind, Response};
use crate::error::DispatchError;
use crate::module::{CapabilityModule, ModuleDescription};

/// Table de routage des modules de capacités
#[derive(Default)]
pub struct Router {
    modules: HashMap<String, Arc<dyn CapabilityModule>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un module; le nom doit être unique sur le routeur
    pub fn register_module(&mut self, module: Arc<dyn CapabilityModule>) -> crate::Result<()> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(DispatchError::DuplicateModule(name));
        }
        debug!(module=%name, version=%module.version(), "Registered capability module");
        self.modules.insert(name, module);
        Ok(())
    }

    fn module(&self, name: &str) -> crate::Result<&Arc<dyn CapabilityModule>> {
        self.modules
            .get(name)
            .ok_or_else(|| DispatchError::UnknownModule(name.to_string()))
    }

    /// Appelle une opération `(module, operation, arguments)`
    pub async fn call(
        &self,
        module: &str,
        operation: &str,
        arguments: Value,
    ) -> crate::Result<Value> {
        self.module(module)?.invoke(operation, arguments).await
    }

    /// Lit une ressource `(module, uri)`
    pub async fn read(&self, module: &str, uri: &str) -> crate::Result<Value> {
        self.module(module)?.read(uri).await
    }

    /// Capacités d'un module
    pub fn describe(&self, module: &str) -> crate::Result<ModuleDescription> {
        Ok(self.module(module)?.describe())
    }

    /// Capacités de tous les modules, triées par nom
    pub fn describe_all(&self) -> Vec<ModuleDescription> {
        let mut all: Vec<ModuleDescription> =
            self.modules.values().map(|m| m.describe()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Noms des modules enregistrés, triés
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Traite une enveloppe de requête et produit la réponse corrélée
    ///
    /// Toute défaillance, y compris une erreur domaine d'un handler, est
    /// projetée dans l'enveloppe d'erreur `{kind, message}` sans perdre le
    /// kind d'origine. L'opération `describe` est résolue par le routeur
    /// quand le module n'en déclare pas une : un appelant découvre ainsi
    /// les capacités d'un module sans connaissance préalable.
    pub async fn dispatch(&self, request: Request) -> Response {
        let outcome = match request.kind {
            RequestKind::Call => {
                if request.target == "describe"
                    && !self
                        .modules
                        .get(&request.module)
                        .is_some_and(|m| m.operations().contains("describe"))
                {
                    self.describe(&request.module)
                        .and_then(|d| {
                            serde_json::to_value(d).map_err(|e| DispatchError::Domain {
                                kind: "dispatch".to_string(),
                                message: e.to_string(),
                            })
                        })
                } else {
                    self.call(&request.module, &request.target, request.arguments)
                        .await
                }
            }
            RequestKind::Read => self.read(&request.module, &request.target).await,
        };

        match outcome {
            Ok(result) => Response::success(request.id, result),
            Err(err) => {
                debug!(module=%request.module, target=%request.target, kind=%err.kind(),
                       "Dispatch failed");
                Response::failure(request.id, &err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{accessor, handler, OperationRegistry, ResourceRegistry, ResourceSpec};
    use crate::schema::{Schema, ValueKind};
    use async_trait::async_trait;
    use serde_json::json;

    struct TestModule {
        operations: OperationRegistry,
        resources: ResourceRegistry,
    }

    impl TestModule {
        fn new() -> Self {
            let mut operations = OperationRegistry::new();
            operations
                .register(
                    "double",
                    Schema::object().field("value", ValueKind::Integer),
                    handler(|args| async move {
                        let value = args["value"].as_i64().unwrap_or(0);
                        Ok(json!(value * 2))
                    }),
                )
                .unwrap();
            operations
                .register(
                    "always_fails",
                    Schema::object(),
                    handler(|_| async {
                        Err(crate::DomainError::no_device("no active device"))
                    }),
                )
                .unwrap();

            let mut resources = ResourceRegistry::new();
            resources
                .register(
                    ResourceSpec::new("test://state", "State", "application/json"),
                    accessor(|_| async { Ok(json!({"ready": true})) }),
                )
                .unwrap();

            Self {
                operations,
                resources,
            }
        }
    }

    #[async_trait]
    impl CapabilityModule for TestModule {
        fn name(&self) -> &str {
            "test"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn operations(&self) -> &OperationRegistry {
            &self.operations
        }

        fn resources(&self) -> &ResourceRegistry {
            &self.resources
        }
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.register_module(Arc::new(TestModule::new())).unwrap();
        router
    }

    #[tokio::test]
    async fn call_resolves_module_and_operation() {
        let result = router().call("test", "double", json!({"value": 21})).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn unknown_module_is_rejected() {
        let err = router().call("nope", "double", Value::Null).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownModule(_)));
    }

    #[test]
    fn duplicate_module_is_rejected() {
        let mut r = router();
        let err = r.register_module(Arc::new(TestModule::new())).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateModule(_)));
    }

    #[tokio::test]
    async fn read_resolves_resource() {
        let value = router().read("test", "test://state").await.unwrap();
        assert_eq!(value, json!({"ready": true}));
    }

    #[tokio::test]
    async fn dispatch_wraps_success() {
        let request = Request::call("test", "double", json!({"value": 3}));
        let id = request.id.clone();
        let response = router().dispatch(request).await;
        assert_eq!(response.id, id);
        assert!(response.ok);
        assert_eq!(response.result, Some(json!(6)));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn dispatch_preserves_domain_kind() {
        let request = Request::call("test", "always_fails", Value::Null);
        let response = router().dispatch(request).await;
        assert!(!response.ok);
        let body = response.error.unwrap();
        assert_eq!(body.kind, crate::kinds::NO_DEVICE);
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn dispatch_shapes_schema_mismatch() {
        let request = Request::call("test", "double", json!({"value": "three"}));
        let response = router().dispatch(request).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, "schema_mismatch");
    }

    #[tokio::test]
    async fn dispatch_read_unknown_resource() {
        let request = Request::read("test", "test://missing");
        let response = router().dispatch(request).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, "resource_not_found");
    }

    #[tokio::test]
    async fn dispatch_resolves_builtin_describe() {
        let request = Request::call("test", "describe", Value::Null);
        let response = router().dispatch(request).await;
        assert!(response.ok);
        let description = response.result.unwrap();
        assert_eq!(description["name"], "test");
        assert_eq!(description["operations"].as_array().unwrap().len(), 2);

        // Module inconnu : l'introspection passe par la même résolution de nom
        let response = router()
            .dispatch(Request::call("ghost", "describe", Value::Null))
            .await;
        assert_eq!(response.error.unwrap().kind, "unknown_module");
    }

    #[test]
    fn describe_exposes_capabilities() {
        let description = router().describe("test").unwrap();
        assert_eq!(description.name, "test");
        let names: Vec<&str> = description
            .operations
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["always_fails", "double"]);
        assert_eq!(description.resources[0].uri_pattern, "test://state");
        assert_eq!(router().module_names(), vec!["test"]);
    }
}
