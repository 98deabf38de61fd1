//! Role-based access control.
//!
//! Roles are read once per invocation by a [`RoleClaims`] accessor and stored
//! in the [`Context`]; [`authorize`] then compares them with the route's
//! allow-list before any argument is bound or any handler code runs.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::router::Route;

/// Reads the caller's roles from an inbound event.
///
/// Implemented for any `Fn(&Event) -> BTreeSet<String>`, so a closure is
/// enough for custom identity schemes.
pub trait RoleClaims: Send + Sync + 'static {
    fn roles(&self, event: &Event) -> BTreeSet<String>;
}

impl<F> RoleClaims for F
where
    F: Fn(&Event) -> BTreeSet<String> + Send + Sync + 'static,
{
    fn roles(&self, event: &Event) -> BTreeSet<String> {
        self(event)
    }
}

/// Reads roles from one claim of the authorizer's token claims.
///
/// Looks in `requestContext.authorizer.claims` (REST authorizers) and then
/// `requestContext.authorizer.jwt.claims` (JWT authorizers). The claim may be
/// a JSON array, a comma- or space-separated string, or the bracketed
/// `"[ADMIN USER]"` form some identity providers emit for group lists.
#[derive(Debug, Clone)]
pub struct ClaimRoles {
    claim: String,
}

impl ClaimRoles {
    pub fn new(claim: impl Into<String>) -> Self {
        Self { claim: claim.into() }
    }
}

impl RoleClaims for ClaimRoles {
    fn roles(&self, event: &Event) -> BTreeSet<String> {
        let Some(authorizer) = event.http()
            .and_then(|http| http.request_context.as_ref())
            .and_then(|rc| rc.get("authorizer"))
        else {
            return BTreeSet::new();
        };

        let claim = authorizer.get("claims")
            .or_else(|| authorizer.pointer("/jwt/claims"))
            .and_then(|claims| claims.get(&self.claim));

        match claim {
            Some(Value::Array(items)) => items.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            Some(Value::String(s)) => s.trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|role| !role.is_empty())
                .map(str::to_owned)
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// Passes when the route declares no roles or the caller holds at least one
/// of them; otherwise fails with `403`.
pub fn authorize(route: &Route, ctx: &Context) -> Result<()> {
    let Some(allowed) = route.authorized_roles() else {
        return Ok(());
    };
    if allowed.intersection(ctx.roles()).next().is_some() {
        return Ok(());
    }
    warn!(
        method = %route.method(),
        pattern = route.pattern(),
        "caller rejected: no required role"
    );
    Err(Error::unauthorized(format!(
        "User is not authorized to access {} {}",
        route.method(),
        route.pattern(),
    )))
}
