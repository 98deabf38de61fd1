//! The dispatcher: one entry point for every operation.
//!
//! ```text
//! event → resolve route ──(no match)──────────────────────────────┐
//!             │                                                   │
//!             ▼                                                   ▼
//!      middleware setups → authorize → bind args → handler    translate
//!             │                                       │           ▲
//!             └──────── teardowns (reverse) ◀─────────┘───────────┘
//! ```
//!
//! The dispatcher owns nothing mutable. It is built once at cold start and
//! cloned freely (an `Arc` bump) into every invocation.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{Instrument, debug, error, info_span};

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::event::{Event, ProxyEvent, RpcEvent};
use crate::guard::{self, ClaimRoles, RoleClaims};
use crate::handler::BoxedHandler;
use crate::middleware::{Middleware, Pipeline};
use crate::params;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Turns inbound events into responses.
///
/// ```rust
/// use serde_json::json;
/// use switchyard::{Dispatcher, Error, Method, Request, Router, middleware};
///
/// async fn hello(_req: Request) -> Result<serde_json::Value, Error> {
///     Ok(json!({"message": "Hello worldss"}))
/// }
///
/// let dispatcher = Dispatcher::builder()
///     .middleware(middleware::from_fn("stamp", |ctx| ctx.insert("stamped", true)))
///     .build(Router::new().on(Method::Get, "/test", hello));
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    router: Router,
    pipeline: Pipeline,
    roles: Box<dyn RoleClaims>,
    config: Config,
}

impl Dispatcher {
    pub fn builder() -> Builder {
        Builder { pipeline: Pipeline::new(), roles: None, config: Config::default() }
    }

    /// A dispatcher with no middleware and the default configuration.
    pub fn new(router: Router) -> Self {
        Self::builder().build(router)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Dispatches one HTTP event. Never fails: every error becomes a response.
    pub async fn dispatch(&self, event: ProxyEvent) -> Response {
        let span = info_span!("dispatch", method = %event.http_method, path = %event.path);
        async move {
            match self.try_dispatch(event).await {
                Ok(value) => Response::json(&value),
                Err(e) => self.translate(&e),
            }
        }
        .instrument(span)
        .await
    }

    /// Function entry point: classifies a raw invocation payload and answers
    /// with the JSON document the platform expects back.
    ///
    /// - proxy events → [`Dispatcher::dispatch`], response in wire shape;
    /// - `{action, payload}` → the named RPC handler's raw result;
    /// - anything else → the fallback handler's raw result.
    ///
    /// RPC and fallback failures come back as `{"errorMessage": …}`.
    pub async fn invoke(&self, payload: Value) -> Value {
        let outcome = match Event::classify(payload) {
            Ok(Event::Http(event)) => return self.dispatch(event).await.into_value(),
            Ok(Event::Rpc(rpc)) => self.call_rpc(rpc).await,
            Ok(Event::Raw(raw)) => self.call_fallback(raw).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(|e| {
            log_failure(&e);
            json!({ "errorMessage": e.to_string() })
        })
    }

    async fn try_dispatch(&self, event: ProxyEvent) -> Result<Value> {
        let resolved = self.inner.router.resolve(&event.http_method, &event.path)?;
        let route = resolved.route;
        debug!(pattern = route.pattern(), "route resolved");

        let event = Arc::new(Event::Http(event));
        let roles = self.inner.roles.roles(&event);
        let ctx = Context::new(event, Some(route.info()), resolved.path_params, roles);

        self.inner.pipeline.run(ctx, move |ctx| async move {
            guard::authorize(&route, &ctx)?;
            let args = params::bind(route.params(), &ctx)?;
            route.handler().call(Request::new(ctx, args)).await
        })
        .await
    }

    async fn call_rpc(&self, rpc: RpcEvent) -> Result<Value> {
        let span = info_span!("rpc", action = %rpc.action);
        async move {
            let handler = self.inner.router.action(&rpc.action)
                .ok_or_else(|| Error::RouteNotFound { method: "RPC".into(), path: rpc.action.clone() })?;
            let payload = rpc.payload.clone();
            self.run_single(handler, Event::Rpc(rpc), payload).await
        }
        .instrument(span)
        .await
    }

    async fn call_fallback(&self, raw: Value) -> Result<Value> {
        let handler = self.inner.router.fallback_handler()
            .ok_or_else(|| Error::validation("Unsupported event"))?;
        self.run_single(handler, Event::Raw(raw.clone()), raw).await
    }

    /// Runs a non-HTTP handler inside the pipeline with one argument.
    async fn run_single(&self, handler: &BoxedHandler, event: Event, arg: Value) -> Result<Value> {
        let event = Arc::new(event);
        let roles = self.inner.roles.roles(&event);
        let ctx = Context::new(event, None, Default::default(), roles);
        let handler = Arc::clone(handler);

        self.inner.pipeline
            .run(ctx, move |ctx| async move { handler.call(Request::new(ctx, vec![arg])).await })
            .await
    }

    fn translate(&self, err: &Error) -> Response {
        log_failure(err);
        Response::from_error(err, &self.inner.config)
    }
}

/// Expected failures are the caller's business; only unexpected ones are
/// errors on our side.
fn log_failure(err: &Error) {
    match err.kind() {
        ErrorKind::HandlerError if err.status_code() >= 500 => error!(error = %err, "handler failed"),
        _ => debug!(error = %err, status = err.status_code(), "dispatch rejected"),
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects middleware and configuration before the first dispatch.
pub struct Builder {
    pipeline: Pipeline,
    roles: Option<Box<dyn RoleClaims>>,
    config: Config,
}

impl Builder {
    /// Appends a middleware. Setups run in the order added.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.pipeline.push(middleware);
        self
    }

    /// Replaces the role accessor. Without one, roles are read from the
    /// token claim named by [`Config::role_claim`].
    pub fn roles(mut self, roles: impl RoleClaims) -> Self {
        self.roles = Some(Box::new(roles));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, router: Router) -> Dispatcher {
        let roles = self.roles
            .unwrap_or_else(|| Box::new(ClaimRoles::new(self.config.role_claim.clone())) as Box<dyn RoleClaims>);
        Dispatcher {
            inner: Arc::new(Inner { router, pipeline: self.pipeline, roles, config: self.config }),
        }
    }
}
