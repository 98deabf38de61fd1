//! Outgoing wire response and error translation.
//!
//! A function answers with `{statusCode, headers, body}` where `body` is a JSON
//! string. Handlers never build this themselves: their value becomes the body
//! of a `200`, and any [`Error`] goes through [`Response::from_error`].

use std::collections::BTreeMap;

use aws_lambda_events::apigw::ApiGatewayProxyResponse;
use aws_lambda_events::encodings::Body;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde_json::{Value, json};
use tracing::warn;

use crate::config::Config;
use crate::error::Error;

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing response in API Gateway proxy shape.
///
/// ```rust
/// use serde_json::json;
/// use switchyard::Response;
///
/// let ok = Response::json(&json!({"message": "Hello worldss"}));
/// assert_eq!(ok.status_code(), 200);
/// assert_eq!(ok.body(), r#"{"message":"Hello worldss"}"#);
///
/// let created = Response::builder()
///     .status(201)
///     .header("Location", "/test/99")
///     .json(&json!({"id": 99}));
/// assert_eq!(created.header("location"), Some("/test/99"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status_code: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl Response {
    /// `200 OK` with `value` as the JSON body.
    pub fn json(value: &Value) -> Self {
        Self::builder().json(value)
    }

    /// `{"errorMessage": message}` with the given status.
    pub fn error(status: u16, message: &str) -> Self {
        Self::builder().status(status).json(&json!({ "errorMessage": message }))
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: 200 }
    }

    /// Translates a dispatch failure into its response.
    ///
    /// 1. no route → `config.route_not_found_status` (500 unless configured),
    /// 2. rejected caller → 403,
    /// 3. failures carrying a status → that status,
    /// 4. anything else → 500.
    ///
    /// The body is always `{"errorMessage": …}` with the error's message and
    /// nothing else.
    pub fn from_error(err: &Error, config: &Config) -> Self {
        let status = match err {
            Error::RouteNotFound { .. } => config.route_not_found_status,
            other => other.status_code(),
        };
        Self::error(status, &err.to_string())
    }

    pub fn status_code(&self) -> u16 { self.status_code }
    pub fn headers(&self) -> &BTreeMap<String, String> { &self.headers }
    pub fn body(&self) -> &str { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body back into JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }

    /// The response as the JSON document a function returns, in
    /// [`ApiGatewayProxyResponse`] shape.
    pub fn into_value(self) -> Value {
        serde_json::to_value(ApiGatewayProxyResponse::from(self)).unwrap_or_else(|e| {
            warn!(error = %e, "response could not be serialised");
            json!({ "statusCode": 500, "body": json!({ "errorMessage": e.to_string() }).to_string() })
        })
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let headers = self.header_map();
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = StatusCode::from_u16(self.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *res.headers_mut() = headers;
        res
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => warn!(header = %name, "dropping header that is not valid HTTP"),
            }
        }
        map
    }
}

impl From<Response> for ApiGatewayProxyResponse {
    fn from(res: Response) -> Self {
        let mut out = ApiGatewayProxyResponse::default();
        out.status_code = i64::from(res.status_code);
        out.headers = res.header_map();
        out.body = Some(Body::Text(res.body));
        out
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200`. Terminated by
/// [`ResponseBuilder::json`]; `Content-Type: application/json` is always set.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn json(self, body: &Value) -> Response {
        let mut headers = BTreeMap::from([(CONTENT_TYPE.to_owned(), APPLICATION_JSON.to_owned())]);
        headers.extend(self.headers);
        Response { status_code: self.status, headers, body: body.to_string() }
    }
}
