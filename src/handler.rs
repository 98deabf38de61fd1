//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table holds handlers of *different* types side by side, so each
//! one is hidden behind a trait object (`dyn ErasedHandler`) and stored
//! uniformly:
//!
//! ```text
//! async fn get_test(req: Request) -> Result<Out, Error> { … }   ← user writes this
//!        ↓ Route::new(Method::Get, "/test/:id", get_test)
//! get_test.into_boxed_handler()                                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_test))                                 ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at dispatch time                           ← one vtable call
//!        ↓
//! Box::pin(async { get_test(req).await.into_reply() })          ← BoxFuture<Result<Value>>
//! ```
//!
//! Handlers never build responses themselves. They return a value, which
//! becomes the JSON body of a `200`, or an [`Error`], which the dispatcher
//! translates.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::request::Request;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Value>>;
}

/// A type-erased handler shared across concurrent dispatches.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid operation handler.
///
/// Satisfied automatically by any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoReply
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Value>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_reply() })
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a JSON result.
///
/// `Ok(value)` is serialised with serde and sent as the body of a `200`;
/// `Err(e)` goes through error translation. Plain `Value` and `()` are
/// accepted for handlers that cannot fail.
pub trait IntoReply {
    fn into_reply(self) -> Result<Value>;
}

impl<T, E> IntoReply for std::result::Result<T, E>
where
    T: Serialize,
    E: Into<Error>,
{
    fn into_reply(self) -> Result<Value> {
        let value = self.map_err(Into::into)?;
        Ok(serde_json::to_value(value)?)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Value> { Ok(self) }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Value> { Ok(Value::Null) }
}
