//! Dispatcher configuration.
//!
//! Defaults reproduce the established wire contract. `from_env` lets a
//! deployment adjust them without a rebuild:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `SWITCHYARD_ROUTE_NOT_FOUND_STATUS` | `route_not_found_status` | `500` |
//! | `SWITCHYARD_ROLE_CLAIM` | `role_claim` | `cognito:groups` |

use std::env;

/// Settings fixed when the dispatcher is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Status returned when no route matches. Clients depend on `500`, so it
    /// stays the default; set `404` to opt out.
    pub route_not_found_status: u16,
    /// Token claim the default role accessor reads caller roles from.
    pub role_claim: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route_not_found_status: 500,
            role_claim: "cognito:groups".to_owned(),
        }
    }
}

impl Config {
    /// Defaults overridden by `SWITCHYARD_*` environment variables. Values
    /// that do not parse (or are not valid status codes) are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(status) = lookup("SWITCHYARD_ROUTE_NOT_FOUND_STATUS")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|s| (100..=599).contains(s))
        {
            config.route_not_found_status = status;
        }
        if let Some(claim) = lookup("SWITCHYARD_ROLE_CLAIM").filter(|v| !v.trim().is_empty()) {
            config.role_claim = claim.trim().to_owned();
        }
        config
    }

    pub fn with_route_not_found_status(mut self, status: u16) -> Self {
        self.route_not_found_status = status;
        self
    }

    pub fn with_role_claim(mut self, claim: impl Into<String>) -> Self {
        self.role_claim = claim.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.route_not_found_status, 500);
        assert_eq!(config.role_claim, "cognito:groups");
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SWITCHYARD_ROUTE_NOT_FOUND_STATUS", "404"),
            ("SWITCHYARD_ROLE_CLAIM", "custom:role"),
        ]));
        assert_eq!(config, Config::default().with_route_not_found_status(404).with_role_claim("custom:role"));
    }

    #[test]
    fn garbage_is_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("SWITCHYARD_ROUTE_NOT_FOUND_STATUS", "four-oh-four"),
            ("SWITCHYARD_ROLE_CLAIM", "  "),
        ]));
        assert_eq!(config, Config::default());

        let config = Config::from_lookup(lookup(&[("SWITCHYARD_ROUTE_NOT_FOUND_STATUS", "42")]));
        assert_eq!(config.route_not_found_status, 500);
    }
}
