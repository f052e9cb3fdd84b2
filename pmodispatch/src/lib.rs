//! # PMODispatch
//!
//! Minimal service-dispatch protocol for PMOPodcast.
//!
//! This crate provides the foundational abstractions that let independently
//! pluggable capability modules (catalog, scorer, queue) register named
//! operations and read-only resources, be invoked uniformly, and be composed
//! by the discovery pipeline:
//!
//! - **Operations**: named handlers with a structural input schema, checked
//!   before the handler runs.
//! - **Resources**: read-only accessors addressed by `module://` URIs, most
//!   specific pattern wins.
//! - **Capability modules**: one [`CapabilityModule`] per external concern,
//!   discoverable through [`CapabilityModule::describe`].
//! - **Router**: name resolution and uniform error shaping, nothing else.
//! - **Envelopes**: the wire shape used for remote or logged invocations,
//!   with request/response correlation ids.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! router.register_module(Arc::new(my_module))?;
//!
//! let result = router.call("catalog", "search_shows", json!({"query": "ai"})).await?;
//! let devices = router.read("catalog", "catalog://devices").await?;
//! ```

pub mod envelope;
pub mod error;
pub mod module;
pub mod registry;
pub mod router;
pub mod schema;

pub use envelope::{ErrorBody, Request, RequestKind, Response};
pub use error::{kinds, DispatchError, DomainError};
pub use module::{CapabilityModule, ModuleDescription, OperationInfo, ResourceInfo};
pub use registry::{
    accessor, handler, OperationFuture, OperationHandler, OperationRegistry, ResourceAccessor,
    ResourceRegistry, ResourceSpec,
};
pub use router::Router;
pub use schema::{Schema, ValueKind};

// Re-export pour les implémentations de modules
pub use async_trait::async_trait;

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
