//! Inbound events.
//!
//! A function receives one JSON document per invocation. Three shapes are
//! recognised:
//!
//! | Shape | Detected by | Goes to |
//! |---|---|---|
//! | API Gateway proxy event | `httpMethod` key | route table |
//! | RPC call | `action` string key | RPC table |
//! | anything else | - | fallback handler |

use std::collections::{BTreeMap, HashMap};

use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// An API Gateway (REST, payload v1) proxy event, reduced to what dispatch
/// reads.
///
/// Invocation payloads are parsed by [`ApiGatewayProxyRequest`] and
/// converted, so `null` where a map or flag is expected reads as empty.
/// `pathParameters` is carried for completeness but never trusted: routing
/// re-derives placeholder bindings from `path`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyEvent {
    pub http_method: String,
    pub path: String,
    pub path_parameters: Option<HashMap<String, String>>,
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
    pub request_context: Option<Value>,
}

impl From<ApiGatewayProxyRequest> for ProxyEvent {
    fn from(req: ApiGatewayProxyRequest) -> Self {
        let query: BTreeMap<String, String> = req.query_string_parameters.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let headers: HashMap<String, String> = req.headers.iter()
            .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
            .collect();

        Self {
            http_method: req.http_method.as_str().to_owned(),
            path: req.path.unwrap_or_default(),
            path_parameters: (!req.path_parameters.is_empty()).then_some(req.path_parameters),
            query_string_parameters: (!query.is_empty()).then_some(query),
            headers: (!headers.is_empty()).then_some(headers),
            body: req.body,
            is_base64_encoded: req.is_base64_encoded,
            // Authorizer claims are read as JSON, whatever authorizer produced them.
            request_context: serde_json::to_value(&req.request_context).ok(),
        }
    }
}

impl ProxyEvent {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { http_method: method.into(), path: path.into(), ..Self::default() }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(HashMap::new).insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets `requestContext.authorizer.claims`, where identity providers put
    /// the caller's token claims.
    pub fn claims(mut self, claims: Value) -> Self {
        self.request_context = Some(serde_json::json!({ "authorizer": { "claims": claims } }));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A direct function call: `{"action": "name", "payload": …}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEvent {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// One invocation's input, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Http(ProxyEvent),
    Rpc(RpcEvent),
    Raw(Value),
}

impl Event {
    /// Classifies a raw invocation payload.
    ///
    /// A document with `httpMethod` that does not deserialise as a proxy event
    /// is a validation failure rather than a raw event: the caller clearly
    /// meant HTTP.
    pub fn classify(value: Value) -> Result<Self> {
        if value.get("httpMethod").is_some() {
            return serde_json::from_value::<ApiGatewayProxyRequest>(value)
                .map(|req| Self::Http(req.into()))
                .map_err(|e| Error::validation(format!("Malformed HTTP event: {e}")));
        }
        if value.get("action").is_some_and(Value::is_string) {
            return serde_json::from_value(value)
                .map(Self::Rpc)
                .map_err(|e| Error::validation(format!("Malformed RPC event: {e}")));
        }
        Ok(Self::Raw(value))
    }

    pub fn http(&self) -> Option<&ProxyEvent> {
        match self {
            Self::Http(event) => Some(event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_proxy_events() {
        let event = Event::classify(json!({
            "httpMethod": "GET",
            "path": "/test/42",
            "queryStringParameters": null,
            "body": null,
        }))
        .unwrap();

        let http = event.http().unwrap();
        assert_eq!(http.http_method, "GET");
        assert_eq!(http.path, "/test/42");
        assert!(http.query_string_parameters.is_none());
    }

    #[test]
    fn nullish_fields_read_as_empty() {
        let event = Event::classify(json!({
            "httpMethod": "POST",
            "path": "/x",
            "headers": null,
            "multiValueHeaders": null,
            "pathParameters": null,
            "isBase64Encoded": null,
            "body": "{}",
        }))
        .unwrap();

        let http = event.http().unwrap();
        assert_eq!(http.http_method, "POST");
        assert!(http.headers.is_none());
        assert!(http.path_parameters.is_none());
        assert!(!http.is_base64_encoded);
        assert_eq!(http.body.as_deref(), Some("{}"));
    }

    #[test]
    fn gateway_fields_are_carried_over() {
        let event = Event::classify(json!({
            "httpMethod": "GET",
            "path": "/test-query",
            "headers": { "X-Role": "ADMIN" },
            "queryStringParameters": { "age": "25" },
            "requestContext": {
                "httpMethod": "GET",
                "authorizer": { "claims": { "cognito:groups": "ADMIN" } },
            },
        }))
        .unwrap();

        let http = event.http().unwrap();
        assert_eq!(http.header_value("x-role"), Some("ADMIN"));
        assert_eq!(http.query_string_parameters.as_ref().unwrap()["age"], "25");
        let claims = http.request_context.as_ref().and_then(|rc| rc.pointer("/authorizer/claims/cognito:groups"));
        assert_eq!(claims, Some(&json!("ADMIN")));
    }

    #[test]
    fn classifies_rpc_and_raw_events() {
        let rpc = Event::classify(json!({"action": "rpcMethod", "payload": {"a": 1}})).unwrap();
        assert_eq!(rpc, Event::Rpc(RpcEvent { action: "rpcMethod".into(), payload: json!({"a": 1}) }));

        let raw = Event::classify(json!({"Records": []})).unwrap();
        assert!(matches!(raw, Event::Raw(_)));
    }

    #[test]
    fn broken_proxy_event_is_a_validation_failure() {
        let err = Event::classify(json!({"httpMethod": 7})).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let event = ProxyEvent::new("GET", "/").header("Content-Type", "application/json");
        assert_eq!(event.header_value("content-type"), Some("application/json"));
    }
}
