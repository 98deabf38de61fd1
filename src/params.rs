//! Handler argument binding.
//!
//! Each [`ParamSpec`] says where one argument comes from (path placeholder,
//! one query value, the whole query map, or the JSON body) and optionally how
//! to transform and validate it. Specs bind in declaration order; the first
//! failure aborts the dispatch before the handler runs.
//!
//! Values travel as [`serde_json::Value`]. Path and query values start as
//! strings (`null` for an absent query value) and stay strings unless a
//! transform says otherwise:
//!
//! ```rust
//! use switchyard::ParamSpec;
//! use switchyard::params;
//!
//! let name = ParamSpec::query("name").required();
//! let age = ParamSpec::query("age").transform(params::integer);
//! let filters = ParamSpec::query_all();
//! ```

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::event::ProxyEvent;

/// Where an argument is read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// A placeholder segment of the route pattern.
    Path,
    /// One value of the query string.
    Query,
    /// The whole query string as an object of strings.
    QueryAll,
    /// The request body, parsed as JSON.
    Body,
}

type Transform = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;
type Validate = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// Declarative description of one handler argument.
#[derive(Clone)]
pub struct ParamSpec {
    source: Source,
    name: String,
    required: bool,
    transform: Option<Transform>,
    validate: Option<Validate>,
}

impl ParamSpec {
    fn new(source: Source, name: impl Into<String>) -> Self {
        Self { source, name: name.into(), required: false, transform: None, validate: None }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(Source::Path, name)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(Source::Query, name)
    }

    /// The entire query map, unmodified. Transforms and validators are not
    /// applied to it.
    pub fn query_all() -> Self {
        Self::new(Source::QueryAll, "")
    }

    pub fn body() -> Self {
        Self::new(Source::Body, "")
    }

    /// Fail with `400` when the value is absent. Path arguments are always
    /// present once the route matched.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Maps the raw value to the argument the handler sees.
    ///
    /// For a body argument the transform doubles as its validator: return
    /// [`Error::status`] to reject the request with a specific code. A plain
    /// [`Error::Handler`] from a transform is reported as a `400`.
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Checks the (transformed) value.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Predicate form of [`ParamSpec::validate`]; `false` fails with `message`.
    pub fn ensure<F>(self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        self.validate(move |value| {
            if predicate(value) { Ok(()) } else { Err(Error::validation(message.clone())) }
        })
    }

    pub fn source(&self) -> Source { self.source }
    pub fn name(&self) -> &str { &self.name }
    pub fn is_required(&self) -> bool { self.required }

    fn bind(&self, ctx: &Context) -> Result<Value> {
        let raw = match self.source {
            Source::Path => match ctx.path_param(&self.name) {
                Some(v) => Value::String(v.to_owned()),
                None => return Err(Error::validation(format!("Missing path parameter {}", self.name))),
            },
            Source::Query => match ctx.query_param(&self.name) {
                Some(v) => Value::String(v.to_owned()),
                None if self.required => {
                    return Err(Error::validation(format!("Missing required query parameter {}", self.name)));
                }
                None => Value::Null,
            },
            Source::QueryAll => {
                let map = ctx.query_params().iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                return Ok(Value::Object(map));
            }
            Source::Body => match ctx.http().map(decode_body).transpose()?.flatten() {
                Some(v) => v,
                None if self.required => return Err(Error::validation("Request body is required")),
                None => Value::Null,
            },
        };

        let value = match &self.transform {
            Some(transform) => transform(raw).map_err(as_validation)?,
            None => raw,
        };
        if let Some(validate) = &self.validate {
            validate(&value).map_err(as_validation)?;
        }
        Ok(value)
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("source", &self.source)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("transform", &self.transform.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Hooks are validation: an untyped failure from one is the caller's fault.
fn as_validation(err: Error) -> Error {
    match err {
        Error::Handler(message) => Error::validation(message),
        other => other,
    }
}

/// Binds every spec in order, stopping at the first failure.
pub(crate) fn bind(specs: &[ParamSpec], ctx: &Context) -> Result<Vec<Value>> {
    specs.iter().map(|spec| spec.bind(ctx)).collect()
}

/// Parses the event body as JSON, decoding base64 first when flagged.
///
/// `Ok(None)` means there is no body at all; an empty string counts as none.
pub(crate) fn decode_body(event: &ProxyEvent) -> Result<Option<Value>> {
    let Some(body) = event.body.as_deref().filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    let bytes = if event.is_base64_encoded {
        STANDARD.decode(body).map_err(|_| Error::validation("Request body is not valid base64"))?
    } else {
        body.as_bytes().to_vec()
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::validation(format!("Malformed request body: {e}")))
}

// ── Stock transforms ──────────────────────────────────────────────────────────

/// Parses a string argument as a base-10 integer. `null` passes through.
pub fn integer(value: Value) -> Result<Value> {
    match value {
        Value::String(s) => s.trim().parse::<i64>()
            .map(Value::from)
            .map_err(|_| Error::validation(format!("Expected an integer, got `{s}`"))),
        Value::Null => Ok(Value::Null),
        other if other.is_i64() || other.is_u64() => Ok(other),
        other => Err(Error::validation(format!("Expected an integer, got {other}"))),
    }
}

/// Parses a string argument as `true` / `false`. `null` passes through.
pub fn boolean(value: Value) -> Result<Value> {
    match value {
        Value::String(s) => match s.as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::validation(format!("Expected a boolean, got `{s}`"))),
        },
        Value::Null | Value::Bool(_) => Ok(value),
        other => Err(Error::validation(format!("Expected a boolean, got {other}"))),
    }
}
