//! Local development server.
//!
//! Runs a [`Dispatcher`] behind a real HTTP listener so routes can be
//! exercised with `curl` before deploying. Each request is converted into the
//! same proxy event the function runtime would deliver and answered with the
//! dispatcher's response.
//!
//! # Stages
//!
//! Deployed APIs are usually reached as `https://host/<stage>/…`. With
//! [`Server::stage`] set, a leading `/<stage>` segment is stripped before
//! routing so local URLs match deployed ones. Paths without the prefix are
//! routed unchanged.
//!
//! # Body size
//!
//! Request bodies are capped at [`DEFAULT_BODY_LIMIT`] (the function
//! runtime's own payload limit) unless [`Server::body_limit`] says otherwise.
//! Larger bodies get a `413` without reaching the dispatcher.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, and only then returns from [`Server::serve`].

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::event::ProxyEvent;
use crate::response::Response;

/// Largest request body accepted by default, in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Serves a dispatcher over HTTP.
pub struct Server {
    addr: String,
    stage: Option<String>,
    body_limit: usize,
}

impl Server {
    /// Configures the server to listen on `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called. The address is resolved there, so
    /// a bad one surfaces as an error instead of a panic.
    ///
    /// ```rust,no_run
    /// use switchyard::Server;
    /// let server = Server::bind("0.0.0.0:3000").stage("dev");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), stage: None, body_limit: DEFAULT_BODY_LIMIT }
    }

    /// Strips a leading `/<stage>` from incoming paths.
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into().trim_matches('/').to_owned();
        self.stage = (!stage.is_empty()).then_some(stage);
        self
    }

    /// Caps request bodies at `bytes`.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Accepts connections until a shutdown signal, then drains them.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, stage = self.stage.as_deref().unwrap_or(""), "switchyard listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued accepts.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = dispatcher.clone();
                    let stage = self.stage.clone();
                    let limit = self.body_limit;
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let dispatcher = dispatcher.clone();
                            let stage = stage.clone();
                            async move { handle(dispatcher, req, stage.as_deref(), limit).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("switchyard stopped");
        Ok(())
    }
}

async fn handle(
    dispatcher: Dispatcher,
    req: hyper::Request<hyper::body::Incoming>,
    stage: Option<&str>,
    limit: usize,
) -> std::result::Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match read_body(body, limit).await {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection.into_http()),
    };

    let event = to_event(&parts, &body, stage);
    debug!(method = %event.http_method, path = %event.path, "local request");
    Ok(dispatcher.dispatch(event).await.into_http())
}

async fn read_body<B>(body: B, limit: usize) -> std::result::Result<Bytes, Response>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(limit, "request body over limit");
            Err(Response::error(413, "Request body too large"))
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Err(Response::error(400, "Could not read request body"))
        }
    }
}

/// Builds the proxy event the function runtime would have delivered.
///
/// Bodies that are not UTF-8 are base64-encoded and flagged. Repeated query
/// keys keep their last value, as single-value proxy events do.
pub(crate) fn to_event(parts: &http::request::Parts, body: &[u8], stage: Option<&str>) -> ProxyEvent {
    let mut event = ProxyEvent::new(parts.method.as_str(), strip_stage(parts.uri.path(), stage));

    if let Some(query) = parts.uri.query() {
        let params: BTreeMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        if !params.is_empty() {
            event.query_string_parameters = Some(params);
        }
    }

    let headers: HashMap<String, String> = parts.headers.iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();
    if !headers.is_empty() {
        event.headers = Some(headers);
    }

    if !body.is_empty() {
        match std::str::from_utf8(body) {
            Ok(text) => event.body = Some(text.to_owned()),
            Err(_) => {
                event.body = Some(STANDARD.encode(body));
                event.is_base64_encoded = true;
            }
        }
    }

    event
}

fn strip_stage(path: &str, stage: Option<&str>) -> String {
    let Some(stage) = stage else {
        return path.to_owned();
    };
    let rest = path.strip_prefix('/')
        .and_then(|p| p.strip_prefix(stage))
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));
    match rest {
        Some("") => "/".to_owned(),
        Some(rest) => rest.to_owned(),
        None => path.to_owned(),
    }
}

/// Resolves on SIGTERM or Ctrl-C. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
