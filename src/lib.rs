//! EFarmerConnect Rust Client Library
//!
//! A Rust client for the EFarmerConnect marketplace API. It keeps the user's
//! session alive across requests: tokens are persisted, refreshed before they
//! expire, attached to every authenticated call, and dropped after a period
//! of inactivity.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod interceptor;
pub mod notifications;

use std::sync::Arc;

use efarmer_auth::{ActivitySource, Environment, InactivityMonitor, SessionManager};

use crate::analytics::AnalyticsApi;
use crate::auth::AuthApi;
use crate::config::ClientOptions;
use crate::error::Result;
use crate::fetch::{ApiClient, FetchBuilder};
use crate::notifications::NotificationApi;

pub use efarmer_auth as session;

/// The main entry point for the EFarmerConnect Rust client
pub struct EFarmer {
    /// The API base URL
    pub url: String,
    /// HTTP client used for requests
    pub api: ApiClient,
    /// Client options
    pub options: ClientOptions,
}

impl EFarmer {
    /// Create a new client with an in-memory session
    ///
    /// # Example
    ///
    /// ```
    /// use efarmer_client::EFarmer;
    ///
    /// let client = EFarmer::new("http://127.0.0.1:8000/api").unwrap();
    /// assert!(!client.auth().is_authenticated());
    /// ```
    pub fn new(api_url: &str) -> Result<Self> {
        Self::new_with_options(
            ClientOptions::default().with_api_url(api_url),
            Environment::default(),
        )
    }

    /// Create a new client with custom options and host environment
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use efarmer_client::{EFarmer, config::ClientOptions, session::{Environment, MemoryStore}};
    ///
    /// let options = ClientOptions::default()
    ///     .with_api_url("http://127.0.0.1:8000/api")
    ///     .with_request_timeout(Duration::from_secs(10));
    /// let env = Environment::default().with_store(Arc::new(MemoryStore::new()));
    /// let _client = EFarmer::new_with_options(options, env).unwrap();
    /// ```
    pub fn new_with_options(options: ClientOptions, env: Environment) -> Result<Self> {
        let api = ApiClient::new(options.clone(), env)?;
        Ok(Self {
            url: options.api_url.clone(),
            api,
            options,
        })
    }

    /// Create a client from `EFARMER_*` environment variables
    pub fn from_env(env: Environment) -> Result<Self> {
        Self::new_with_options(ClientOptions::from_env()?, env)
    }

    /// Login, registration, password and profile operations
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.api.clone())
    }

    /// Notification operations
    pub fn notifications(&self) -> NotificationApi {
        NotificationApi::new(self.api.clone())
    }

    /// Sales, user and product reports
    pub fn analytics(&self) -> AnalyticsApi {
        AnalyticsApi::new(self.api.clone())
    }

    /// The session shared by every request of this client
    pub fn session(&self) -> &Arc<SessionManager> {
        self.api.session()
    }

    /// Start logging the user out after inactivity; keep the returned handle
    /// alive for as long as the application runs.
    pub fn start_inactivity_monitor(&self, source: &dyn ActivitySource) -> InactivityMonitor {
        InactivityMonitor::start(self.session().clone(), source)
    }

    /// Create a GET request against the API
    pub fn get(&self, path: &str) -> FetchBuilder<'_> {
        self.api.get(path)
    }

    /// Create a POST request against the API
    pub fn post(&self, path: &str) -> FetchBuilder<'_> {
        self.api.post(path)
    }

    /// Create a PUT request against the API
    pub fn put(&self, path: &str) -> FetchBuilder<'_> {
        self.api.put(path)
    }

    /// Create a PATCH request against the API
    pub fn patch(&self, path: &str) -> FetchBuilder<'_> {
        self.api.patch(path)
    }

    /// Create a DELETE request against the API
    pub fn delete(&self, path: &str) -> FetchBuilder<'_> {
        self.api.delete(path)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::{ApplicationError, Error};
    pub use crate::EFarmer;
    pub use efarmer_auth::{ActivityEvent, ActivityHub, Environment};
}
