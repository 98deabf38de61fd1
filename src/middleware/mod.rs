//! Middleware layer.
//!
//! A middleware is a setup/teardown pair wrapped around every dispatch: the
//! right place for cross-cutting concerns such as scoped resources, request
//! stamping, or role population from a custom identity scheme.
//!
//! # Lifecycle
//!
//! ```text
//! setup A → setup B → setup C → handler → teardown C → teardown B → teardown A
//! ```
//!
//! A teardown runs if and only if its own setup succeeded. If B's setup
//! fails, C is never entered, the handler never runs, A is torn down, and the
//! dispatch fails with B's error. Teardown failures are logged and swallowed;
//! they never replace the dispatch outcome or stop the remaining teardowns.
//!
//! # Writing middleware
//!
//! Synchronous pairs are closures:
//!
//! ```rust
//! use switchyard::middleware;
//!
//! let stamp = middleware::from_fn("stamp", |ctx| ctx.insert("stamped", true));
//! let audit = middleware::pair(
//!     "audit",
//!     |_ctx| { tracing::info!("audit setup"); Ok(()) },
//!     |_ctx| { tracing::info!("audit teardown"); Ok(()) },
//! );
//! ```
//!
//! Anything that needs to await (connection checkout, remote lookups)
//! implements [`Middleware`] directly.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::BoxFuture;

/// A setup/teardown pair.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn setup<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>>;

    fn teardown<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, Result<()>> {
        let done: Result<()> = Ok(());
        Box::pin(async move { done })
    }
}

// ── Closure middleware ────────────────────────────────────────────────────────

/// Setup-only middleware from a closure.
pub fn from_fn<S>(name: impl Into<String>, setup: S) -> impl Middleware
where
    S: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
{
    FnPair { name: name.into(), setup, teardown: no_teardown }
}

/// Middleware from a setup closure and a teardown closure.
pub fn pair<S, T>(name: impl Into<String>, setup: S, teardown: T) -> impl Middleware
where
    S: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    T: Fn(&Context) -> Result<()> + Send + Sync + 'static,
{
    FnPair { name: name.into(), setup, teardown }
}

fn no_teardown(_ctx: &Context) -> Result<()> {
    Ok(())
}

struct FnPair<S, T> {
    name: String,
    setup: S,
    teardown: T,
}

impl<S, T> Middleware for FnPair<S, T>
where
    S: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    T: Fn(&Context) -> Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn setup<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        let outcome = (self.setup)(ctx);
        Box::pin(async move { outcome })
    }

    fn teardown<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, Result<()>> {
        let outcome = (self.teardown)(ctx);
        Box::pin(async move { outcome })
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Ordered middleware list, fixed before the first dispatch.
#[derive(Clone, Default)]
pub struct Pipeline {
    entries: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: impl Middleware) {
        self.entries.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every setup, then `body`, then the teardowns of every entered
    /// middleware in reverse order, and returns `body`'s outcome (or the
    /// failing setup's error).
    ///
    /// A panic inside `body` is caught and reported as a 500 failure; the
    /// teardowns still run.
    pub async fn run<T, F, Fut>(&self, mut ctx: Context, body: F) -> Result<T>
    where
        F: FnOnce(Arc<Context>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut entered = 0;
        let mut failed = None;
        for middleware in &self.entries {
            debug!(middleware = middleware.name(), "setup");
            if let Err(e) = middleware.setup(&mut ctx).await {
                warn!(middleware = middleware.name(), error = %e, "setup failed, unwinding");
                failed = Some(e);
                break;
            }
            entered += 1;
        }

        let ctx = Arc::new(ctx);
        let outcome = match failed {
            Some(e) => Err(e),
            None => AssertUnwindSafe(body(Arc::clone(&ctx)))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(panicked(payload))),
        };

        for middleware in self.entries[..entered].iter().rev() {
            debug!(middleware = middleware.name(), "teardown");
            if let Err(e) = middleware.teardown(&ctx).await {
                warn!(middleware = middleware.name(), error = %e, "teardown failed, ignored");
            }
        }

        outcome
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Error {
    let message = payload.downcast_ref::<&str>().map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned());
    error!(panic = %message, "handler panicked");
    Error::msg(message)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::error::Error;
    use crate::event::Event;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn tracked(journal: &Journal, name: &'static str, fail_setup: bool, fail_teardown: bool) -> impl Middleware {
        let (on_setup, on_teardown) = (Arc::clone(journal), Arc::clone(journal));
        pair(
            name,
            move |_ctx| {
                on_setup.lock().unwrap().push(format!("setup {name}"));
                if fail_setup { Err(Error::status(format!("{name} refused"), 401)) } else { Ok(()) }
            },
            move |_ctx| {
                on_teardown.lock().unwrap().push(format!("teardown {name}"));
                if fail_teardown { Err(Error::msg("teardown broke")) } else { Ok(()) }
            },
        )
    }

    fn ctx() -> Context {
        Context::from_event(Event::Raw(Value::Null))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn teardowns_mirror_setups() {
        let journal = Journal::default();
        let mut pipeline = Pipeline::new();
        for name in ["A", "B", "C"] {
            pipeline.push(tracked(&journal, name, false, false));
        }

        let body_journal = Arc::clone(&journal);
        let out = pipeline.run(ctx(), |_| async move {
            body_journal.lock().unwrap().push("body".into());
            Ok::<_, Error>(7)
        }).await;

        assert_eq!(out.unwrap(), 7);
        assert_eq!(entries(&journal), [
            "setup A", "setup B", "setup C", "body", "teardown C", "teardown B", "teardown A",
        ]);
    }

    #[tokio::test]
    async fn failed_setup_unwinds_only_entered_middleware() {
        let journal = Journal::default();
        let mut pipeline = Pipeline::new();
        pipeline.push(tracked(&journal, "A", false, false));
        pipeline.push(tracked(&journal, "B", true, false));
        pipeline.push(tracked(&journal, "C", false, false));

        let body_ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&body_ran);
        let err = pipeline.run(ctx(), |_| async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();

        assert!(!body_ran.load(Ordering::SeqCst));
        assert_eq!(err.to_string(), "B refused");
        assert_eq!(err.status_code(), 401);
        assert_eq!(entries(&journal), ["setup A", "setup B", "teardown A"]);
    }

    #[tokio::test]
    async fn body_errors_still_unwind() {
        let journal = Journal::default();
        let mut pipeline = Pipeline::new();
        pipeline.push(tracked(&journal, "A", false, false));

        let err = pipeline.run(ctx(), |_| async { Err::<(), _>(Error::msg("Oh no :(")) }).await.unwrap_err();
        assert_eq!(err.to_string(), "Oh no :(");
        assert_eq!(entries(&journal), ["setup A", "teardown A"]);
    }

    #[tokio::test]
    async fn panicking_body_still_unwinds() {
        let journal = Journal::default();
        let mut pipeline = Pipeline::new();
        pipeline.push(tracked(&journal, "A", false, false));

        let err = pipeline.run(ctx(), |_| faulty()).await.unwrap_err();

        assert_eq!(err.to_string(), "handler fault");
        assert_eq!(err.status_code(), 500);
        assert_eq!(entries(&journal), ["setup A", "teardown A"]);
    }

    async fn faulty() -> Result<()> {
        panic!("handler fault")
    }

    #[tokio::test]
    async fn teardown_failures_are_isolated() {
        let journal = Journal::default();
        let mut pipeline = Pipeline::new();
        pipeline.push(tracked(&journal, "A", false, false));
        pipeline.push(tracked(&journal, "B", false, true));

        let out = pipeline.run(ctx(), |_| async { Ok::<_, Error>("fine") }).await;
        assert_eq!(out.unwrap(), "fine");
        assert_eq!(entries(&journal), ["setup A", "setup B", "teardown B", "teardown A"]);
    }

    #[tokio::test]
    async fn setup_writes_are_visible_to_the_body() {
        let mut pipeline = Pipeline::new();
        pipeline.push(from_fn("stamp", |ctx| ctx.insert("random", 4)));

        let seen = pipeline.run(ctx(), |ctx| async move { Ok::<_, Error>(ctx.get_as::<u8>("random")) }).await;
        assert_eq!(seen.unwrap(), Some(4));
    }
}
