//! Route table.
//!
//! One table per HTTP method, filled once at startup and read-only afterwards.
//! Patterns are matched segment by segment: `:name` (or `{name}`) binds any
//! single non-empty segment, everything else must match exactly. When several
//! patterns fit a path the most literal one wins, so registration order never
//! changes the outcome.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::params::{ParamSpec, Source};

// ── Route ─────────────────────────────────────────────────────────────────────

/// A declared operation: method, path pattern, handler, and the metadata the
/// dispatcher needs before calling it.
///
/// ```rust
/// use switchyard::{Method, ParamSpec, Request, Route, Error};
///
/// async fn get_test(req: Request) -> Result<String, Error> {
///     Ok(format!("Hello world {}", req.param("id").unwrap_or_default()))
/// }
///
/// let route = Route::new(Method::Get, "/test/:id", get_test)
///     .roles(["ADMIN"])
///     .param(ParamSpec::path("id"));
/// ```
pub struct Route {
    method: Method,
    pattern: String,
    handler: BoxedHandler,
    roles: Option<BTreeSet<String>>,
    params: Vec<ParamSpec>,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            handler: handler.into_boxed_handler(),
            roles: None,
            params: Vec::new(),
        }
    }

    /// Restricts the route to callers holding at least one of `roles`.
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Appends one handler argument. Arguments bind in declaration order.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn authorized_roles(&self) -> Option<&BTreeSet<String>> { self.roles.as_ref() }
    pub fn params(&self) -> &[ParamSpec] { &self.params }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }

    pub(crate) fn info(&self) -> RouteInfo {
        RouteInfo { method: self.method, pattern: self.pattern.clone() }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("roles", &self.roles)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// The `(method, pattern)` a request was resolved to, as seen by middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: String,
}

// ── Pattern ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug)]
struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidPattern { pattern: raw.to_owned(), reason };

        if !raw.starts_with('/') {
            return Err(invalid("must start with `/`".into()));
        }

        let mut segments = Vec::new();
        let mut names = BTreeSet::new();
        for part in split_path(raw) {
            let name = part
                .strip_prefix(':')
                .or_else(|| part.strip_prefix('{').and_then(|p| p.strip_suffix('}')));
            let segment = match name {
                Some("") => return Err(invalid("placeholder without a name".into())),
                Some(name) => {
                    if !names.insert(name) {
                        return Err(invalid(format!("placeholder `{name}` appears twice")));
                    }
                    Segment::Param(name.to_owned())
                }
                None if part.is_empty() => return Err(invalid("empty segment".into())),
                None => Segment::Literal(part.to_owned()),
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Two patterns collide when they have the same literals in the same
    /// places; placeholder names do not matter.
    fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Param(_), Segment::Param(_)) => true,
                _ => false,
            })
    }

    fn has_param(&self, name: &str) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Param(p) if p == name))
    }

    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut bound = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit.as_str() == *part => {}
                Segment::Param(name) if !part.is_empty() => {
                    bound.insert(name.clone(), (*part).to_owned());
                }
                _ => return None,
            }
        }
        Some(bound)
    }

    /// Ordering key for competing matches: more literals first, then the
    /// pattern whose first literal-vs-placeholder difference is a literal.
    fn specificity(&self) -> (usize, Vec<bool>) {
        let mask: Vec<bool> = self.segments.iter().map(|s| matches!(s, Segment::Literal(_))).collect();
        (mask.iter().filter(|lit| **lit).count(), mask)
    }
}

/// Splits a path into segments, ignoring the leading slash and one trailing
/// slash. `/` has no segments.
fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

struct Entry {
    pattern: Pattern,
    route: Arc<Route>,
}

/// A resolved request: the route plus the placeholder values taken from the
/// literal path.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub route: Arc<Route>,
    pub path_params: BTreeMap<String, String>,
}

/// The application route table.
///
/// Build it once at startup and hand it to
/// [`Dispatcher::builder`](crate::Dispatcher::builder). The chaining methods
/// (`on`, `route`, `rpc`) panic on registration errors, which can only be
/// programming mistakes; [`Router::register`] reports them as values instead.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Entry>>,
    actions: HashMap<String, BoxedHandler>,
    fallback: Option<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bare route (no role restriction, no declared arguments).
    ///
    /// # Panics
    ///
    /// Panics if the pattern is malformed or already registered for `method`.
    pub fn on(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, pattern, handler))
    }

    /// Chaining form of [`Router::register`].
    ///
    /// # Panics
    ///
    /// Panics on any registration error.
    pub fn route(mut self, route: Route) -> Self {
        if let Err(e) = self.register(route) {
            panic!("{e}");
        }
        self
    }

    /// Adds one route.
    ///
    /// Fails if `(method, pattern)` is already taken, if the pattern is
    /// malformed, or if a path argument names a placeholder the pattern does
    /// not have.
    pub fn register(&mut self, route: Route) -> Result<()> {
        let pattern = Pattern::parse(&route.pattern)?;

        for spec in route.params.iter().filter(|s| s.source() == Source::Path) {
            if !pattern.has_param(spec.name()) {
                return Err(Error::InvalidPattern {
                    pattern: route.pattern.clone(),
                    reason: format!("no placeholder for path argument `{}`", spec.name()),
                });
            }
        }

        let table = self.routes.entry(route.method).or_default();
        if table.iter().any(|entry| entry.pattern.same_shape(&pattern)) {
            return Err(Error::DuplicateRoute { method: route.method, pattern: route.pattern });
        }
        table.push(Entry { pattern, route: Arc::new(route) });
        Ok(())
    }

    /// Registers a named RPC operation, invoked by `{"action": name, …}`
    /// events.
    ///
    /// # Panics
    ///
    /// Panics if `action` is already registered.
    pub fn rpc(mut self, action: &str, handler: impl Handler) -> Self {
        if let Err(e) = self.register_rpc(action, handler) {
            panic!("{e}");
        }
        self
    }

    pub fn register_rpc(&mut self, action: &str, handler: impl Handler) -> Result<()> {
        if self.actions.contains_key(action) {
            return Err(Error::DuplicateAction(action.to_owned()));
        }
        self.actions.insert(action.to_owned(), handler.into_boxed_handler());
        Ok(())
    }

    /// Sets the handler for events that are neither HTTP nor RPC. A later call
    /// replaces an earlier one.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(handler.into_boxed_handler());
        self
    }

    /// Finds the single route for `method` + `path`.
    pub fn resolve(&self, method: &str, path: &str) -> Result<Resolved> {
        let not_found = || Error::RouteNotFound { method: method.to_owned(), path: path.to_owned() };

        let method: Method = method.parse().map_err(|_| not_found())?;
        let table = self.routes.get(&method).ok_or_else(not_found)?;
        let parts = split_path(path);

        table.iter()
            .filter_map(|entry| entry.pattern.matches(&parts).map(|bound| (entry, bound)))
            .max_by(|(a, _), (b, _)| a.pattern.specificity().cmp(&b.pattern.specificity()))
            .map(|(entry, path_params)| Resolved { route: Arc::clone(&entry.route), path_params })
            .ok_or_else(not_found)
    }

    pub(crate) fn action(&self, name: &str) -> Option<&BoxedHandler> {
        self.actions.get(name)
    }

    pub(crate) fn fallback_handler(&self) -> Option<&BoxedHandler> {
        self.fallback.as_ref()
    }

    /// Number of HTTP routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
