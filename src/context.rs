//! Per-invocation context.
//!
//! Created fresh for every dispatch, mutated only by middleware setup, then
//! frozen behind an `Arc` while the handler and the teardowns run. Never
//! shared between invocations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::event::{Event, ProxyEvent};
use crate::router::RouteInfo;

#[derive(Debug, Clone)]
pub struct Context {
    event: Arc<Event>,
    route: Option<RouteInfo>,
    path_params: BTreeMap<String, String>,
    query_params: BTreeMap<String, String>,
    roles: BTreeSet<String>,
    data: Map<String, Value>,
}

impl Context {
    /// Builds a context for one invocation. Query parameters are copied out
    /// of the event when it is an HTTP event.
    pub fn new(
        event: Arc<Event>,
        route: Option<RouteInfo>,
        path_params: BTreeMap<String, String>,
        roles: BTreeSet<String>,
    ) -> Self {
        let query_params = event.http()
            .and_then(|http| http.query_string_parameters.clone())
            .unwrap_or_default();
        Self { event, route, path_params, query_params, roles, data: Map::new() }
    }

    /// A context with no route, no path parameters and no roles.
    pub fn from_event(event: Event) -> Self {
        Self::new(Arc::new(event), None, BTreeMap::new(), BTreeSet::new())
    }

    pub fn event(&self) -> &Event { &self.event }

    /// The proxy event, for HTTP invocations.
    pub fn http(&self) -> Option<&ProxyEvent> { self.event.http() }

    /// The matched route, for HTTP invocations.
    pub fn route(&self) -> Option<&RouteInfo> { self.route.as_ref() }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &BTreeMap<String, String> { &self.path_params }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &BTreeMap<String, String> { &self.query_params }

    pub fn roles(&self) -> &BTreeSet<String> { &self.roles }

    pub fn has_role(&self, role: &str) -> bool { self.roles.contains(role) }

    /// Middleware may grant or drop roles during setup.
    pub fn roles_mut(&mut self) -> &mut BTreeSet<String> { &mut self.roles }

    /// Stores a value for later middleware and for the handler.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> { self.data.get(key) }

    /// Reads a stored value back as `T`. `None` if absent or of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| T::deserialize(v).ok())
    }

    /// Everything middleware stored, as one JSON object.
    pub fn data(&self) -> &Map<String, Value> { &self.data }
}
