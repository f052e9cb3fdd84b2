//! Capability module interface
//!
//! A capability module is a named, independently replaceable unit exposing
//! an operation registry and a resource registry. Modules are created once
//! at process start, registered on the router, and never mutated afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{OperationRegistry, ResourceRegistry};

/// Description d'une opération pour l'introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub input_schema: Value,
}

/// Description d'une ressource pour l'introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub uri_pattern: String,
    pub name: String,
    pub mime_type: String,
}

/// Capacités complètes d'un module, découvrables sans connaissance préalable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub name: String,
    pub version: String,
    pub operations: Vec<OperationInfo>,
    pub resources: Vec<ResourceInfo>,
}

/// Main trait for capability modules
///
/// Implementations build their registries at construction time and are the
/// only code touching their external system or store. All implementations
/// must be `Send + Sync`; after registration completes, `invoke` and `read`
/// are safe under concurrent callers.
///
/// # Examples
///
/// ```rust,no_run
/// use pmodispatch::{
///     async_trait, CapabilityModule, OperationRegistry, ResourceRegistry, Schema,
/// };
/// use pmodispatch::registry::handler;
///
/// struct EchoModule {
///     operations: OperationRegistry,
///     resources: ResourceRegistry,
/// }
///
/// impl EchoModule {
///     fn new() -> Self {
///         let mut operations = OperationRegistry::new();
///         operations
///             .register("echo", Schema::object(), handler(|args| async move { Ok(args) }))
///             .expect("echo registered once");
///         Self {
///             operations,
///             resources: ResourceRegistry::new(),
///         }
///     }
/// }
///
/// #[async_trait]
/// impl CapabilityModule for EchoModule {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn version(&self) -> &str {
///         "1.0.0"
///     }
///
///     fn operations(&self) -> &OperationRegistry {
///         &self.operations
///     }
///
///     fn resources(&self) -> &ResourceRegistry {
///         &self.resources
///     }
/// }
/// ```
#[async_trait]
pub trait CapabilityModule: Send + Sync {
    /// Unique module name across the router (e.g. "catalog")
    fn name(&self) -> &str;

    /// Module version, reported through introspection
    fn version(&self) -> &str;

    fn operations(&self) -> &OperationRegistry;

    fn resources(&self) -> &ResourceRegistry;

    /// Invoque une opération du module
    async fn invoke(&self, operation: &str, arguments: Value) -> crate::Result<Value> {
        self.operations().invoke(operation, arguments).await
    }

    /// Lit une ressource du module
    async fn read(&self, uri: &str) -> crate::Result<Value> {
        self.resources().read(uri).await
    }

    /// Capacités du module, sans connaissance préalable côté appelant
    fn describe(&self) -> ModuleDescription {
        ModuleDescription {
            name: self.name().to_string(),
            version: self.version().to_string(),
            operations: self.operations().list(),
            resources: self.resources().list(),
        }
    }
}
