//! Configuration options for the EFarmerConnect client

use std::time::Duration;

use efarmer_auth::SessionOptions;

use crate::error::Error;

/// Default API base used by the development backend
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Configuration options for the EFarmerConnect client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The API base URL every relative path is resolved against
    pub api_url: String,

    /// The request timeout
    pub request_timeout: Duration,

    /// How long before expiry an access token is refreshed
    pub refresh_margin: Duration,

    /// Idle time after which the session is dropped
    pub inactivity_timeout: Duration,

    /// How often the inactivity monitor checks
    pub inactivity_check_interval: Duration,

    /// Where the user is sent when the session ends
    pub login_path: String,

    /// Cookie holding the CSRF token
    pub csrf_cookie_name: String,

    /// Header the CSRF token is echoed in
    pub csrf_header_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let session = SessionOptions::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            refresh_margin: session.refresh_margin,
            inactivity_timeout: session.inactivity_timeout,
            inactivity_check_interval: session.inactivity_check_interval,
            login_path: session.login_path,
            csrf_cookie_name: "csrftoken".to_string(),
            csrf_header_name: "X-CSRFToken".to_string(),
        }
    }
}

impl ClientOptions {
    /// Builds options from `EFARMER_API_URL`, `EFARMER_REQUEST_TIMEOUT_SECS`
    /// and `EFARMER_INACTIVITY_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, Error> {
        let mut options = Self::default();

        if let Ok(url) = std::env::var("EFARMER_API_URL") {
            url::Url::parse(&url)?;
            options.api_url = url;
        }
        if let Some(secs) = env_secs("EFARMER_REQUEST_TIMEOUT_SECS")? {
            options.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("EFARMER_INACTIVITY_TIMEOUT_SECS")? {
            options.inactivity_timeout = Duration::from_secs(secs);
        }

        Ok(options)
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, value: &str) -> Self {
        self.api_url = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the refresh margin
    pub fn with_refresh_margin(mut self, value: Duration) -> Self {
        self.refresh_margin = value;
        self
    }

    /// Set the inactivity timeout
    pub fn with_inactivity_timeout(mut self, value: Duration) -> Self {
        self.inactivity_timeout = value;
        self
    }

    /// Set the inactivity check interval
    pub fn with_inactivity_check_interval(mut self, value: Duration) -> Self {
        self.inactivity_check_interval = value;
        self
    }

    /// Set the login path
    pub fn with_login_path(mut self, value: &str) -> Self {
        self.login_path = value.to_string();
        self
    }

    /// Set the CSRF cookie name
    pub fn with_csrf_cookie_name(mut self, value: &str) -> Self {
        self.csrf_cookie_name = value.to_string();
        self
    }

    /// The session layer's view of these options
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_refresh_margin(self.refresh_margin)
            .with_inactivity_timeout(self.inactivity_timeout)
            .with_inactivity_check_interval(self.inactivity_check_interval)
            .with_login_path(&self.login_path)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| Error::config(format!("{} must be a number of seconds: {}", name, err))),
        Err(_) => Ok(None),
    }
}
