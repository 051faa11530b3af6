//! Session management for the EFarmerConnect client
//!
//! This crate holds the pieces of the client that carry state between
//! requests: persisted tokens, expiry checks, single-flight token refresh
//! and inactivity logout. The host application supplies storage, a clock,
//! navigation and notifications through an [`Environment`].

pub mod clock;
pub mod error;
pub mod host;
pub mod jwt;
pub mod monitor;
pub mod refresh;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, RefreshError, StorageError};
pub use host::{
    ActivityEvent, ActivityHub, ActivityListener, ActivitySource, Environment, LogNavigator,
    LogNotifier, Navigator, Notifier, Subscription,
};
pub use jwt::{is_token_expired, token_expiry, REFRESH_MARGIN};
pub use monitor::InactivityMonitor;
pub use refresh::{
    HttpTokenRefresher, RefreshCoordinator, RefreshState, RefreshedTokens, TokenRefresher,
};
pub use session::{Session, SessionManager, SessionOptions};
pub use store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
