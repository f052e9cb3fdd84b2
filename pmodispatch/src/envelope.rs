//! Wire envelopes for dispatched invocations
//!
//! Every invocation of the protocol, even in-process, can be expressed as a
//! [`Request`]/[`Response`] pair. The correlation `id` round-trips unchanged;
//! `ok=false` implies `error` is present and `result` absent, and inversely.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DispatchError;

/// Nature d'une requête : appel d'opération ou lecture de ressource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Call,
    Read,
}

/// Requête du protocole de dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Identifiant de corrélation, unique par appel en cours
    pub id: String,
    pub module: String,
    pub kind: RequestKind,
    /// Nom d'opération (`call`) ou URI de ressource (`read`)
    pub target: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

impl Request {
    /// Requête d'appel d'opération avec un id généré
    pub fn call(module: impl Into<String>, operation: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            module: module.into(),
            kind: RequestKind::Call,
            target: operation.into(),
            arguments,
        }
    }

    /// Requête de lecture de ressource avec un id généré
    pub fn read(module: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            module: module.into(),
            kind: RequestKind::Read,
            target: uri.into(),
            arguments: Value::Null,
        }
    }
}

/// Corps d'erreur du protocole : kind stable + message lisible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&DispatchError> for ErrorBody {
    fn from(err: &DispatchError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Réponse du protocole de dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, err: &DispatchError) -> Self {
        Self {
            id: id.into(),
            ok: false,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialization_shape() {
        let request = Request {
            id: "req-1".into(),
            module: "catalog".into(),
            kind: RequestKind::Call,
            target: "search_shows".into(),
            arguments: json!({"query": "ai"}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "req-1",
                "module": "catalog",
                "kind": "call",
                "target": "search_shows",
                "arguments": {"query": "ai"},
            })
        );
    }

    #[test]
    fn read_request_omits_arguments() {
        let request = Request::read("queue", "queue://pending");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("arguments").is_none());
        assert_eq!(value["kind"], "read");
    }

    #[test]
    fn id_round_trips() {
        let request = Request::call("catalog", "get_devices", Value::Null);
        let response = Response::success(request.id.clone(), json!({"devices": []}));
        assert_eq!(request.id, response.id);

        let parsed: Response =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(parsed.id, request.id);
    }

    #[test]
    fn failure_has_error_and_no_result() {
        let err = DispatchError::UnknownModule("nope".into());
        let response = Response::failure("req-2", &err);
        assert!(!response.ok);
        assert!(response.result.is_none());
        let body = response.error.unwrap();
        assert_eq!(body.kind, "unknown_module");
        assert!(body.message.contains("nope"));
    }

    #[test]
    fn success_has_result_and_no_error() {
        let response = Response::success("req-3", json!(1));
        assert!(response.ok);
        assert!(response.error.is_none());
        assert_eq!(response.result, Some(json!(1)));
    }
}
