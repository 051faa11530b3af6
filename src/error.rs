//! Error handling for the EFarmerConnect client

use std::fmt;

use efarmer_auth::{AuthError, RefreshError};
use serde_json::Value;
use thiserror::Error;

/// Unified error type for the EFarmerConnect client
#[derive(Error, Debug)]
pub enum Error {
    /// Errors building a request or decoding a response body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No response was received: connection failure, CORS or timeout
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Session errors: missing tokens or a failed refresh
    #[error("Session error: {0}")]
    Session(#[from] AuthError),

    /// Authentication errors with a user-facing message
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Api { status: u16, body: Value },

    /// A success response whose body reports a forbidden operation
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<RefreshError> for Error {
    fn from(err: RefreshError) -> Self {
        Error::Session(AuthError::Refresh(err))
    }
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Application(err) => Some(err.code),
            Error::Http(err) | Error::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Response body carried by the error, if any
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::Api { body, .. } => Some(body),
            Error::Application(err) => Some(&err.body),
            _ => None,
        }
    }

    /// Whether this is an application-level error rather than a transport one
    pub fn is_application_error(&self) -> bool {
        matches!(self, Error::Application(_))
    }

    /// Whether the request never reached the server
    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// `detail` from a DRF error body, when present
    pub fn detail(&self) -> Option<&str> {
        self.body()
            .and_then(|body| body.get("detail"))
            .and_then(Value::as_str)
    }
}

/// A business-logic refusal signaled inside a success response.
///
/// `http_error` is always `false`, which is what tells it apart from a
/// transport-level 403.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{name}: {message}")]
pub struct ApplicationError {
    pub name: String,
    pub message: String,
    pub code: u16,
    pub http_status: u16,
    pub http_error: bool,
    pub body: Value,
}

impl ApplicationError {
    /// Builds the error from a body carrying `code: 403` or `status_code: 403`.
    pub fn forbidden(http_status: u16, body: Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        let message = text("message")
            .or_else(|| text("detail"))
            .unwrap_or_else(|| "Forbidden".to_string());
        let name = text("name").unwrap_or_else(|| "ApplicationError".to_string());

        Self {
            name,
            message,
            code: 403,
            http_status,
            http_error: false,
            body,
        }
    }
}

/// Result alias used throughout the client
pub type Result<T> = std::result::Result<T, Error>;
