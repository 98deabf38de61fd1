//! Function runtime entry point.
//!
//! Polls the Lambda runtime API and hands every invocation payload to
//! [`Dispatcher::invoke`]. The dispatcher never fails an invocation: HTTP
//! errors come back as proxy responses and RPC or fallback errors as
//! `{"errorMessage": …}` documents, so the runtime only ever reports success.
//!
//! ```rust,no_run
//! use switchyard::{Dispatcher, Router, lambda};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     lambda::run(Dispatcher::new(Router::new())).await
//! }
//! ```

use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;

/// Serves invocations until the runtime shuts the process down.
pub async fn run(dispatcher: Dispatcher) -> Result<(), Error> {
    info!("switchyard waiting for invocations");
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let dispatcher = dispatcher.clone();
        async move { handle(&dispatcher, event).await }
    }))
    .await
}

async fn handle(dispatcher: &Dispatcher, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    debug!(request_id = %context.request_id, "invocation");
    Ok(dispatcher.invoke(payload).await)
}
