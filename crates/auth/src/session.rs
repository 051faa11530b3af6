//! Session lifecycle: tokens, activity stamps, refresh and teardown.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{AuthError, RefreshError};
use crate::host::{Environment, Navigator, Notifier};
use crate::jwt::{self, REFRESH_MARGIN};
use crate::refresh::{RefreshCoordinator, TokenRefresher};
use crate::store::{TokenStore, ACCESS_TOKEN, LAST_ACTIVITY, REFRESH_TOKEN};

pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";
pub const LOGIN_REQUIRED: &str = "Please log in to continue";
pub const INACTIVITY_LOGOUT: &str = "You have been logged out due to inactivity.";
pub const LOGGED_OUT: &str = "You have been logged out.";

/// Default period between inactivity checks.
pub const INACTIVITY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default idle time after which the session is dropped.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// セッション設定
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refresh_margin: Duration,
    pub inactivity_timeout: Duration,
    pub inactivity_check_interval: Duration,
    pub login_path: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_margin: REFRESH_MARGIN,
            inactivity_timeout: INACTIVITY_TIMEOUT,
            inactivity_check_interval: INACTIVITY_CHECK_INTERVAL,
            login_path: "/login".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn with_refresh_margin(mut self, value: Duration) -> Self {
        self.refresh_margin = value;
        self
    }

    pub fn with_inactivity_timeout(mut self, value: Duration) -> Self {
        self.inactivity_timeout = value;
        self
    }

    pub fn with_inactivity_check_interval(mut self, value: Duration) -> Self {
        self.inactivity_check_interval = value;
        self
    }

    pub fn with_login_path(mut self, value: &str) -> Self {
        self.login_path = value.to_string();
        self
    }
}

/// The persisted session as currently stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub last_activity: Option<i64>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.last_activity.is_none()
    }
}

/// Owns the token store, the refresh coordinator and the default bearer
/// credential. One per client; share it behind an `Arc`.
pub struct SessionManager {
    store: TokenStore,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    refresher: Arc<dyn TokenRefresher>,
    coordinator: RefreshCoordinator,
    default_bearer: RwLock<Option<String>>,
    options: SessionOptions,
}

impl SessionManager {
    pub fn new(
        env: Environment,
        refresher: Arc<dyn TokenRefresher>,
        options: SessionOptions,
    ) -> Self {
        let store = TokenStore::new(env.store);
        // Pick up a session persisted by an earlier run.
        let default_bearer = store.get_item::<String>(ACCESS_TOKEN);

        Self {
            store,
            clock: env.clock,
            navigator: env.navigator,
            notifier: env.notifier,
            refresher,
            coordinator: RefreshCoordinator::new(),
            default_bearer: RwLock::new(default_bearer),
            options,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn access_token(&self) -> Option<String> {
        self.store
            .get_item::<String>(ACCESS_TOKEN)
            .filter(|token| !token.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store
            .get_item::<String>(REFRESH_TOKEN)
            .filter(|token| !token.is_empty())
    }

    pub fn last_activity(&self) -> Option<i64> {
        self.store.get_item::<i64>(LAST_ACTIVITY)
    }

    pub fn snapshot(&self) -> Session {
        Session {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            last_activity: self.last_activity(),
        }
    }

    /// Persists a freshly issued token pair, as after a successful login.
    pub fn establish(&self, access: &str, refresh: &str) {
        self.store.set_item(ACCESS_TOKEN, access);
        self.store.set_item(REFRESH_TOKEN, refresh);
        self.stamp_activity();
        self.set_access_token(Some(access));
        info!("Session established");
    }

    /// Stores `token` and makes it the default bearer credential; `None`
    /// removes both.
    pub fn set_access_token(&self, token: Option<&str>) {
        match token {
            Some(token) => self.store.set_item(ACCESS_TOKEN, token),
            None => self.store.remove_item(ACCESS_TOKEN),
        }
        *self
            .default_bearer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.map(str::to_string);
    }

    /// Bearer credential sent on every request once a session exists.
    pub fn default_bearer(&self) -> Option<String> {
        self.default_bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stamp_activity(&self) {
        self.store.set_item(LAST_ACTIVITY, &self.clock.now_millis());
    }

    pub fn is_access_token_expired(&self, token: Option<&str>) -> bool {
        jwt::is_token_expired(token, self.clock.now_millis(), self.options.refresh_margin)
    }

    pub fn is_authenticated(&self) -> bool {
        let token = self.access_token();
        token.is_some() && !self.is_access_token_expired(token.as_deref())
    }

    /// Resolves the bearer token for an authenticated request, refreshing it
    /// first when stale. Missing tokens tear the session down.
    pub async fn authorize_request(&self) -> Result<String, AuthError> {
        let (access, _refresh) = match (self.access_token(), self.refresh_token()) {
            (Some(access), Some(refresh)) => (access, refresh),
            _ => {
                self.teardown(LOGIN_REQUIRED);
                return Err(AuthError::MissingTokens);
            }
        };

        let token = if self.is_access_token_expired(Some(&access)) {
            debug!("Access token is stale, refreshing before request");
            self.refresh_access_token().await?
        } else {
            access
        };

        self.stamp_activity();
        Ok(token)
    }

    /// Exchanges the stored refresh token for a new access token. Concurrent
    /// callers share a single network call.
    pub async fn refresh_access_token(&self) -> Result<String, RefreshError> {
        self.coordinator.run(|| self.perform_refresh()).await
    }

    async fn perform_refresh(&self) -> Result<String, RefreshError> {
        let result = match self.refresh_token() {
            Some(refresh_token) => self.refresher.refresh(&refresh_token).await,
            None => Err(RefreshError::MissingRefreshToken),
        };

        match result {
            Ok(tokens) => {
                if let Some(rotated) = &tokens.refresh {
                    self.store.set_item(REFRESH_TOKEN, rotated);
                }
                self.set_access_token(Some(&tokens.access));
                info!("Access token refreshed");
                Ok(tokens.access)
            }
            Err(err) => {
                error!("Token refresh failed: {}", err);
                self.teardown(SESSION_EXPIRED);
                Err(err)
            }
        }
    }

    fn on_login_page(&self) -> bool {
        self.navigator
            .current_path()
            .contains(self.options.login_path.as_str())
    }

    /// Clears every session key and sends the user to the login page,
    /// unless they are already there.
    pub fn teardown(&self, message: &str) {
        warn!("Clearing session: {}", message);
        self.store.clear_all();
        self.clear_default_bearer();

        if !self.on_login_page() {
            self.notifier.error(message);
            self.navigator.redirect(&self.options.login_path);
        }
    }

    pub fn logout(&self) {
        self.store.clear_all();
        self.clear_default_bearer();
        self.navigator.redirect(&self.options.login_path);
        self.notifier.info(LOGGED_OUT);
        info!("Logged out");
    }

    fn clear_default_bearer(&self) {
        *self
            .default_bearer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
