//! Unified error type.
//!
//! Every failure a dispatch can hit is an [`Error`]: an unmatched route, a
//! rejected caller, a parameter that failed validation, or whatever the
//! handler returned. [`Response::from_error`](crate::Response::from_error)
//! turns it into the wire response. Registration mistakes (duplicate routes,
//! malformed patterns) use the same type but surface at startup, never during
//! a dispatch.

use crate::method::Method;

/// `Result` with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    RouteNotFound,
    Unauthorized,
    ValidationFailed,
    HandlerError,
    /// Raised while building the route table, before any dispatch.
    Registration,
}

/// The error type returned by switchyard's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Route {path} not found")]
    RouteNotFound { method: String, path: String },

    #[error("{0}")]
    Unauthorized(String),

    /// Missing parameter, malformed body, or a rejected transform/validate hook.
    #[error("{message}")]
    Validation { message: String, status: u16 },

    /// A failure raised deliberately with an explicit status code.
    #[error("{message}")]
    Status { message: String, status: u16 },

    /// Anything else a handler or middleware reports.
    #[error("{0}")]
    Handler(String),

    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute { method: Method, pattern: String },

    #[error("rpc action `{0}` is already registered")]
    DuplicateAction(String),

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A failure carrying its own status code.
    ///
    /// ```rust
    /// use switchyard::Error;
    ///
    /// let err = Error::status("You can't :(", 403);
    /// assert_eq!(err.status_code(), 403);
    /// ```
    pub fn status(message: impl Into<String>, status: u16) -> Self {
        Self::Status { message: message.into(), status }
    }

    /// A `400 Bad Request` validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), status: 400 }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// A generic failure, reported as `500`.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Validation { .. } => ErrorKind::ValidationFailed,
            Self::Status { .. } | Self::Handler(_) | Self::Io(_) => ErrorKind::HandlerError,
            Self::DuplicateRoute { .. } | Self::DuplicateAction(_) | Self::InvalidPattern { .. } => {
                ErrorKind::Registration
            }
        }
    }

    /// The HTTP status this error maps to.
    ///
    /// `RouteNotFound` reports 500 here; the dispatcher may override it through
    /// [`Config::route_not_found_status`](crate::Config).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 403,
            Self::Validation { status, .. } | Self::Status { status, .. } => *status,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Handler(e.to_string())
    }
}
