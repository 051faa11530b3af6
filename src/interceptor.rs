//! Request and response interception for API calls
//!
//! Everything sent through [`crate::fetch::FetchBuilder`] passes through here:
//! the request side decides which bearer credential goes out, the response
//! side turns statuses into user-facing notifications and typed errors.

use efarmer_auth::SessionManager;
use log::{debug, error};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::{ApplicationError, Error};

pub const NETWORK_ERROR: &str = "Network error. Please check your connection.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
pub const SERVER_ERROR: &str = "Server error. Please try again later.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND: &str = "The requested resource was not found.";
pub const INVALID_DATA: &str = "Invalid data provided";

/// A route reachable without a session.
#[derive(Debug, Clone, Copy)]
pub struct PublicEndpoint {
    /// Path prefix relative to the API base, ending at a segment boundary
    pub prefix: &'static str,
    /// Only the prefix itself matches, not the routes below it
    pub exact: bool,
    /// Only reads are public
    pub get_only: bool,
}

pub const PUBLIC_ENDPOINTS: &[PublicEndpoint] = &[
    PublicEndpoint { prefix: "/token/", exact: true, get_only: false },
    PublicEndpoint { prefix: "/token/refresh/", exact: false, get_only: false },
    PublicEndpoint { prefix: "/register/", exact: false, get_only: false },
    PublicEndpoint { prefix: "/password-reset/request/", exact: false, get_only: false },
    PublicEndpoint { prefix: "/password-reset/confirm/", exact: false, get_only: false },
    PublicEndpoint { prefix: "/categories/", exact: false, get_only: true },
    PublicEndpoint { prefix: "/products/", exact: false, get_only: true },
];

/// Whether `path` (relative to the API base) skips session handling.
///
/// Matches from the start of the path, so `/farmer/products/` is not public.
pub fn is_public_endpoint(method: &Method, path: &str) -> bool {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    PUBLIC_ENDPOINTS.iter().any(|endpoint| {
        let at_prefix = path == endpoint.prefix || path == endpoint.prefix.trim_end_matches('/');
        let matches = at_prefix || (!endpoint.exact && path.starts_with(endpoint.prefix));
        matches && (!endpoint.get_only || *method == Method::GET)
    })
}

/// Where a request is headed, as far as session handling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Outside the configured API base: no credentials attached
    Foreign,
    /// On the API base but public: default bearer only
    Public,
    /// On the API base and requires a session
    Authenticated,
}

impl RequestScope {
    pub fn is_own_api(&self) -> bool {
        !matches!(self, RequestScope::Foreign)
    }
}

/// Picks the bearer token for an outgoing request, refreshing it when stale.
///
/// `override_token` is the token obtained by a reactive refresh for a retry.
pub(crate) async fn prepare_request(
    session: &SessionManager,
    scope: RequestScope,
    override_token: Option<String>,
) -> Result<Option<String>, Error> {
    match (scope, override_token) {
        (RequestScope::Foreign, _) => Ok(None),
        (_, Some(token)) => {
            session.stamp_activity();
            Ok(Some(token))
        }
        (RequestScope::Public, None) => Ok(session.default_bearer()),
        (RequestScope::Authenticated, None) => Ok(Some(session.authorize_request().await?)),
    }
}

/// No response reached us.
pub(crate) fn on_network_failure(session: &SessionManager, err: reqwest::Error) -> Error {
    error!("Request failed without a response: {}", err);
    session.notifier().error(NETWORK_ERROR);
    Error::Network(err)
}

/// Returns the synthesized error if `body` signals an application-level 403.
pub fn application_error(http_status: u16, body: &Value) -> Option<ApplicationError> {
    let forbidden = |key: &str| body.get(key).and_then(Value::as_f64) == Some(403.0);
    if forbidden("code") || forbidden("status_code") {
        Some(ApplicationError::forbidden(http_status, body.clone()))
    } else {
        None
    }
}

/// Success path: stamp activity and normalize forbidden-shaped bodies from
/// our own API.
pub(crate) fn on_success(
    session: &SessionManager,
    scope: RequestScope,
    url: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<(), Error> {
    session.stamp_activity();

    if !scope.is_own_api() {
        return Ok(());
    }

    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return Ok(());
    };
    match application_error(status.as_u16(), &json) {
        Some(err) => {
            error!(
                "Application-level 403 detected: url={} status={} body={}",
                url, status, json
            );
            Err(Error::Application(err))
        }
        None => Ok(()),
    }
}

/// Non-success statuses other than a recoverable 401.
pub(crate) fn on_error_status(session: &SessionManager, status: StatusCode, body: Value) -> Error {
    debug!("Request failed with status {}", status);
    let notifier = session.notifier();

    if status.is_server_error() {
        notifier.error(SERVER_ERROR);
    } else if status == StatusCode::FORBIDDEN {
        notifier.error(PERMISSION_DENIED);
    } else if status == StatusCode::NOT_FOUND {
        notifier.error(NOT_FOUND);
    } else if status == StatusCode::BAD_REQUEST {
        notifier.error(&flatten_validation_errors(&body));
    }

    Error::Api {
        status: status.as_u16(),
        body,
    }
}

/// Joins every field message of a DRF validation body into one string,
/// one message per line.
pub fn flatten_validation_errors(body: &Value) -> String {
    let messages = validation_messages(body);
    if messages.is_empty() {
        INVALID_DATA.to_string()
    } else {
        messages.join("\n")
    }
}

/// Every message in a DRF error body, in field order.
pub fn validation_messages(body: &Value) -> Vec<String> {
    let mut messages = Vec::new();
    collect_messages(body, &mut messages);
    messages
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(message) if message.is_empty() => {}
        Value::String(message) => out.push(message.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_messages(item, out)),
        Value::Object(fields) => fields.values().for_each(|v| collect_messages(v, out)),
        other => out.push(other.to_string()),
    }
}
