//! Operation and resource registries
//!
//! Registration happens while the owning module is being built (`&mut self`);
//! afterwards the registries are only read (`&self`), which makes invocation
//! safe under concurrent callers without any lock on the hot path.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{DispatchError, DomainError};
use crate::module::{OperationInfo, ResourceInfo};
use crate::schema::Schema;

/// Future retourné par un handler d'opération ou un accesseur de ressource
pub type OperationFuture = BoxFuture<'static, std::result::Result<Value, DomainError>>;

/// Handler d'une opération : arguments JSON déjà validés en entrée
pub type OperationHandler = Arc<dyn Fn(Value) -> OperationFuture + Send + Sync>;

/// Accesseur d'une ressource : reçoit l'URI concrète demandée
pub type ResourceAccessor = Arc<dyn Fn(String) -> OperationFuture + Send + Sync>;

struct Operation {
    schema: Schema,
    handler: OperationHandler,
}

/// Registre des opérations d'un module
///
/// Contract: [`register`](Self::register) fails with `DuplicateName` when the
/// name is taken; [`invoke`](Self::invoke) fails with `NotFound` for unknown
/// names and `SchemaMismatch` when the arguments do not validate, in which
/// case the handler is never called. A handler's own error is forwarded
/// untouched.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une opération; une seule fois par nom
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
        handler: OperationHandler,
    ) -> crate::Result<()> {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(DispatchError::DuplicateName(name));
        }
        self.operations.insert(name, Operation { schema, handler });
        Ok(())
    }

    /// Invoque une opération après validation structurelle des arguments
    pub async fn invoke(&self, name: &str, arguments: Value) -> crate::Result<Value> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| DispatchError::NotFound(name.to_string()))?;

        operation
            .schema
            .validate(&arguments)
            .map_err(|detail| DispatchError::SchemaMismatch {
                operation: name.to_string(),
                detail,
            })?;

        (operation.handler)(arguments).await.map_err(Into::into)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Liste triée des opérations, pour l'introspection
    pub fn list(&self) -> Vec<OperationInfo> {
        let mut infos: Vec<OperationInfo> = self
            .operations
            .iter()
            .map(|(name, op)| OperationInfo {
                name: name.clone(),
                input_schema: op.schema.describe(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

/// Déclaration d'une ressource adressable
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// Motif d'URI : exact (`queue://pending`) ou préfixe (`catalog://shows/*`)
    pub uri_pattern: String,
    pub name: String,
    pub mime_type: String,
}

impl ResourceSpec {
    pub fn new(
        uri_pattern: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            uri_pattern: uri_pattern.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }
}

struct Resource {
    spec: ResourceSpec,
    accessor: ResourceAccessor,
}

/// Registre des ressources en lecture seule d'un module
///
/// Matching: une correspondance exacte gagne toujours; sinon le motif
/// wildcard (`prefix/*`) au préfixe le plus long l'emporte.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ResourceSpec, accessor: ResourceAccessor) -> crate::Result<()> {
        if self
            .resources
            .iter()
            .any(|r| r.spec.uri_pattern == spec.uri_pattern)
        {
            return Err(DispatchError::DuplicateName(spec.uri_pattern));
        }
        self.resources.push(Resource { spec, accessor });
        Ok(())
    }

    fn resolve(&self, uri: &str) -> Option<&Resource> {
        // Correspondance exacte d'abord
        if let Some(resource) = self
            .resources
            .iter()
            .find(|r| r.spec.uri_pattern == uri)
        {
            return Some(resource);
        }

        // Puis le wildcard au préfixe le plus long
        self.resources
            .iter()
            .filter_map(|resource| {
                let pattern = &resource.spec.uri_pattern;
                let prefix = pattern.strip_suffix('*')?;
                uri.starts_with(prefix).then_some((prefix.len(), resource))
            })
            .max_by_key(|(prefix_len, _)| *prefix_len)
            .map(|(_, resource)| resource)
    }

    /// Lit la ressource correspondant le plus spécifiquement à l'URI
    pub async fn read(&self, uri: &str) -> crate::Result<Value> {
        let resource = self
            .resolve(uri)
            .ok_or_else(|| DispatchError::ResourceNotFound(uri.to_string()))?;
        (resource.accessor)(uri.to_string()).await.map_err(Into::into)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Liste des ressources déclarées, pour l'introspection
    pub fn list(&self) -> Vec<ResourceInfo> {
        self.resources
            .iter()
            .map(|r| ResourceInfo {
                uri_pattern: r.spec.uri_pattern.clone(),
                name: r.spec.name.clone(),
                mime_type: r.spec.mime_type.clone(),
            })
            .collect()
    }
}

/// Adapte une closure async en [`OperationHandler`]
///
/// ```rust,ignore
/// registry.register("echo", Schema::object(), handler(|args| async move { Ok(args) }))?;
/// ```
pub fn handler<F, Fut>(f: F) -> OperationHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = std::result::Result<Value, DomainError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Adapte une closure async en [`ResourceAccessor`]
pub fn accessor<F, Fut>(f: F) -> ResourceAccessor
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = std::result::Result<Value, DomainError>> + Send + 'static,
{
    Arc::new(move |uri| Box::pin(f(uri)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo_registry(calls: Arc<AtomicUsize>) -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                "echo",
                Schema::object().field("text", ValueKind::String),
                handler(move |args| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(args["text"].clone())
                    }
                }),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn invoke_runs_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(calls.clone());

        let result = registry.invoke("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(result, json!("hi"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schema_mismatch_never_calls_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(calls.clone());

        let err = registry.invoke("echo", json!({"text": 7})).await.unwrap_err();
        assert!(matches!(err, DispatchError::SchemaMismatch { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, DispatchError::SchemaMismatch { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_operation_is_not_found() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));
        let err = registry.invoke("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = OperationRegistry::new();
        let noop = handler(|_| async { Ok(Value::Null) });
        registry.register("op", Schema::object(), noop.clone()).unwrap();
        let err = registry.register("op", Schema::object(), noop).unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn domain_error_forwarded_untouched() {
        let mut registry = OperationRegistry::new();
        registry
            .register(
                "fail",
                Schema::object(),
                handler(|_| async { Err(DomainError::transient("rate limited")) }),
            )
            .unwrap();

        let err = registry.invoke("fail", Value::Null).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn most_specific_resource_pattern_wins() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(
                ResourceSpec::new("catalog://shows/*", "Shows", "application/json"),
                accessor(|_| async { Ok(json!("any show")) }),
            )
            .unwrap();
        registry
            .register(
                ResourceSpec::new("catalog://shows/featured/*", "Featured", "application/json"),
                accessor(|_| async { Ok(json!("featured")) }),
            )
            .unwrap();
        registry
            .register(
                ResourceSpec::new("catalog://devices", "Devices", "application/json"),
                accessor(|_| async { Ok(json!("devices")) }),
            )
            .unwrap();

        assert_eq!(registry.read("catalog://devices").await.unwrap(), json!("devices"));
        assert_eq!(
            registry.read("catalog://shows/abc").await.unwrap(),
            json!("any show")
        );
        assert_eq!(
            registry.read("catalog://shows/featured/abc").await.unwrap(),
            json!("featured")
        );

        let err = registry.read("catalog://nope").await.unwrap_err();
        assert!(matches!(err, DispatchError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn accessor_receives_concrete_uri() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(
                ResourceSpec::new("catalog://shows/*", "Shows", "application/json"),
                accessor(|uri| async move { Ok(json!(uri)) }),
            )
            .unwrap();

        assert_eq!(
            registry.read("catalog://shows/42").await.unwrap(),
            json!("catalog://shows/42")
        );
    }
}
