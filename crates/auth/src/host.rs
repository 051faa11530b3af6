//! Capabilities the session layer needs from its host application:
//! navigation, user-facing notifications and interaction events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use log::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::store::{KeyValueStore, MemoryStore};

/// Moves the user between screens (the browser's location, in a web host).
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect(&self, path: &str);
}

/// Toast-style messages shown to the user.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
    fn success(&self, message: &str);
    fn info(&self, message: &str);
}

/// ユーザー操作イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityEvent {
    Click,
    MouseMove,
    KeyPress,
    Scroll,
    TouchStart,
}

impl ActivityEvent {
    pub const ALL: [ActivityEvent; 5] = [
        ActivityEvent::Click,
        ActivityEvent::MouseMove,
        ActivityEvent::KeyPress,
        ActivityEvent::Scroll,
        ActivityEvent::TouchStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::MouseMove => "mousemove",
            Self::KeyPress => "keypress",
            Self::Scroll => "scroll",
            Self::TouchStart => "touchstart",
        }
    }
}

pub type ActivityListener = Arc<dyn Fn(ActivityEvent) + Send + Sync>;

/// Something that reports user interaction.
pub trait ActivitySource: Send + Sync {
    /// The listener stays registered until the returned handle is dropped.
    fn subscribe(&self, events: &[ActivityEvent], listener: ActivityListener) -> Subscription;
}

/// Unregisters its listener when dropped.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// For sources that have nothing to release.
    pub fn detached() -> Self {
        Self { cancel: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

type Listeners = RwLock<Vec<(u64, Vec<ActivityEvent>, ActivityListener)>>;

/// In-process fan-out of interaction events; the host calls [`ActivityHub::emit`].
#[derive(Default)]
pub struct ActivityHub {
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl ActivityHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ActivityEvent) {
        let listeners: Vec<ActivityListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, events, _)| events.contains(&event))
            .map(|(_, _, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ActivitySource for ActivityHub {
    fn subscribe(&self, events: &[ActivityEvent], listener: ActivityListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, events.to_vec(), listener));

        let listeners: Weak<Listeners> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(entry, _, _)| *entry != id);
            }
        })
    }
}

/// Navigator for headless hosts: remembers the path and logs the move.
#[derive(Debug)]
pub struct LogNavigator {
    path: RwLock<String>,
}

impl LogNavigator {
    pub fn new(initial_path: &str) -> Self {
        Self {
            path: RwLock::new(initial_path.to_string()),
        }
    }
}

impl Default for LogNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for LogNavigator {
    fn current_path(&self) -> String {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, path: &str) {
        info!("Redirecting to {}", path);
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path.to_string();
    }
}

/// Routes notifications to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        error!("{}", message);
    }

    fn success(&self, message: &str) {
        info!("{}", message);
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }
}

/// Everything the session layer touches outside itself.
#[derive(Clone)]
pub struct Environment {
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            navigator: Arc::new(LogNavigator::default()),
            notifier: Arc::new(LogNotifier),
        }
    }
}

impl Environment {
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hub_only_notifies_subscribed_events() {
        let hub = ActivityHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = hub.subscribe(
            &[ActivityEvent::Click, ActivityEvent::Scroll],
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        hub.emit(ActivityEvent::Click);
        hub.emit(ActivityEvent::MouseMove);
        hub.emit(ActivityEvent::Scroll);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(hub.listener_count(), 1);

        drop(subscription);
        hub.emit(ActivityEvent::Click);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_hub_is_harmless() {
        let hub = ActivityHub::new();
        let subscription = hub.subscribe(&ActivityEvent::ALL, Arc::new(|_| {}));
        drop(hub);
        drop(subscription);
    }

    #[test]
    fn test_log_navigator_tracks_path() {
        let navigator = LogNavigator::new("/cart");
        navigator.redirect("/login");
        assert_eq!(navigator.current_path(), "/login");
    }
}
