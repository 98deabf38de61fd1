//! What a handler receives.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::event::{Event, ProxyEvent};
use crate::params;

/// One invocation as seen by a handler: the frozen [`Context`] plus the
/// arguments bound from the route's parameter specs, in declaration order.
///
/// RPC and fallback handlers receive a single argument: the RPC payload or the
/// raw event.
#[derive(Debug, Clone)]
pub struct Request {
    context: Arc<Context>,
    args: Vec<Value>,
}

impl Request {
    pub(crate) fn new(context: Arc<Context>, args: Vec<Value>) -> Self {
        Self { context, args }
    }

    pub fn context(&self) -> &Context { &self.context }
    pub fn event(&self) -> &Event { self.context.event() }
    pub fn http(&self) -> Option<&ProxyEvent> { self.context.http() }

    /// Returns a placeholder value from the matched path.
    ///
    /// For a route `/test/:id`, `req.param("id")` on `/test/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.context.path_param(name)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.context.query_param(name)
    }

    /// The bound argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn args(&self) -> &[Value] { &self.args }

    /// Deserialises the bound argument at `index` into `T`.
    ///
    /// A missing argument or a shape mismatch is a `400`.
    pub fn extract<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.args.get(index)
            .ok_or_else(|| Error::validation(format!("Missing argument {index}")))?;
        T::deserialize(value).map_err(|e| Error::validation(format!("Invalid argument {index}: {e}")))
    }

    /// Parses the raw HTTP body as JSON, for handlers that declare no body
    /// argument. A malformed or absent body is a `400`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.http()
            .map(params::decode_body)
            .transpose()?
            .flatten()
            .ok_or_else(|| Error::validation("Request body is required"))?;
        serde_json::from_value(body).map_err(|e| Error::validation(format!("Invalid request body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn request(event: ProxyEvent, args: Vec<Value>) -> Request {
        let ctx = Context::new(
            Arc::new(Event::Http(event)),
            None,
            BTreeMap::from([("id".to_owned(), "7".to_owned())]),
            Default::default(),
        );
        Request::new(Arc::new(ctx), args)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User { name: String, age: u32 }

    #[test]
    fn typed_extraction() {
        let req = request(ProxyEvent::new("POST", "/"), vec![json!({"name": "Jane", "age": 25})]);
        assert_eq!(req.extract::<User>(0).unwrap(), User { name: "Jane".into(), age: 25 });
        assert_eq!(req.extract::<User>(1).unwrap_err().status_code(), 400);
        assert_eq!(req.param("id"), Some("7"));
    }

    #[test]
    fn shape_mismatch_is_a_bad_request() {
        let req = request(ProxyEvent::new("POST", "/"), vec![json!({"name": "Jane", "age": "old"})]);
        assert_eq!(req.extract::<User>(0).unwrap_err().status_code(), 400);
    }

    #[test]
    fn raw_json_body() {
        let req = request(ProxyEvent::new("POST", "/test").body(r#"{"test":"data"}"#), vec![]);
        assert_eq!(req.json_body::<Value>().unwrap(), json!({"test": "data"}));

        let req = request(ProxyEvent::new("POST", "/test"), vec![]);
        assert!(req.json_body::<Value>().is_err());
    }
}
