//! Error types for registration and request handling.

use crate::method::MethodMask;

use hyper::{Method, StatusCode};
use std::fmt;
use thiserror::Error;

/// An error raised while building a router. These are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The path template could not be parsed.
    #[error("malformed route template '{template}': {reason}")]
    MalformedTemplate { template: String, reason: String },

    /// A template with the same shape is already registered for an overlapping set of methods.
    #[error("route '{template}' is already registered for {methods}")]
    DuplicateRoute { template: String, methods: MethodMask },

    /// The fallback handler was registered twice.
    #[error("an any handler is already registered")]
    DuplicateAny,

    /// A validation rule carries an unparsable condition expression.
    #[error("invalid validation condition for '{field}': {reason}")]
    InvalidCondition { field: String, reason: String },

    /// An error route was registered with an impossible status range.
    #[error("invalid error route status range {start}..={end}")]
    InvalidErrorStatus { start: u16, end: u16 },

    /// The mount point is not an absolute path.
    #[error("invalid mount point '{0}': expected a path beginning with '/'")]
    InvalidMount(String),
}

/// The category of a request failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No route matched and no any handler exists.
    NotFound,
    /// The matched route does not accept the request method.
    MethodNotAllowed { allowed: MethodMask },
    /// A validation rule rejected a field before the handler ran.
    Validation { field: String },
    /// The handler body failed.
    Handler,
}

/// A request failure carrying the HTTP status it should be answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
    kind: ErrorKind,
}

impl HttpError {
    /// A handler failure with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            kind: ErrorKind::Handler,
        }
    }

    /// A handler failure with the given status and message.
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status).message(message)
    }

    /// A `500 Internal Server Error`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// A `404 Not Found`.
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: None,
            kind: ErrorKind::NotFound,
        }
    }

    /// A `405 Method Not Allowed` listing the methods the route accepts.
    pub fn method_not_allowed(method: &Method, allowed: MethodMask) -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: Some(format!(
                "The specified method: {} cannot be used for this URL.",
                method
            )),
            kind: ErrorKind::MethodNotAllowed { allowed },
        }
    }

    /// A `400 Bad Request` raised by validation.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: Some(message.into()),
            kind: ErrorKind::Validation {
                field: field.into(),
            },
        }
    }

    /// Replaces the message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message_str(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Methods to advertise in an `Allow` header, if this is a 405.
    pub fn allowed(&self) -> Option<MethodMask> {
        match self.kind {
            ErrorKind::MethodNotAllowed { allowed } => Some(allowed),
            _ => None,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.status, message),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<StatusCode> for HttpError {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        Self::with_message(StatusCode::BAD_REQUEST, err.to_string())
    }
}

/// A validation rule rejected a field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::validation(err.field, err.message)
    }
}
