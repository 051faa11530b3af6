//! Inactivity-based automatic logout.

use std::sync::{Arc, Weak};

use log::{debug, info};
use tokio::task::JoinHandle;

use crate::host::{ActivityEvent, ActivitySource, Subscription};
use crate::session::{SessionManager, INACTIVITY_LOGOUT};

/// Watches user interaction and drops the session after a period of
/// inactivity.
///
/// The periodic check runs on a tokio task and the activity listener stays
/// registered for as long as this handle is alive; dropping the handle
/// releases both.
pub struct InactivityMonitor {
    session: Arc<SessionManager>,
    task: Option<JoinHandle<()>>,
    _subscription: Subscription,
}

impl InactivityMonitor {
    /// Subscribes to interaction events and spawns the periodic check.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(session: Arc<SessionManager>, source: &dyn ActivitySource) -> Self {
        let mut monitor = Self::attach(session, source);

        let weak = Arc::downgrade(&monitor.session);
        let period = monitor.session.options().inactivity_check_interval;
        monitor.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                check_inactivity(&session);
            }
        }));

        info!("Inactivity monitor started");
        monitor
    }

    /// Subscribes to interaction events without spawning a timer; the host
    /// is expected to call [`InactivityMonitor::check`] itself.
    pub fn attach(session: Arc<SessionManager>, source: &dyn ActivitySource) -> Self {
        session.stamp_activity();

        let weak: Weak<SessionManager> = Arc::downgrade(&session);
        let subscription = source.subscribe(
            &ActivityEvent::ALL,
            Arc::new(move |event| {
                if let Some(session) = weak.upgrade() {
                    debug!("User activity: {}", event.as_str());
                    session.stamp_activity();
                }
            }),
        );

        Self {
            session,
            task: None,
            _subscription: subscription,
        }
    }

    /// Records an interaction that did not come through the activity source.
    pub fn record(&self, event: ActivityEvent) {
        debug!("User activity: {}", event.as_str());
        self.session.stamp_activity();
    }

    /// Runs one inactivity check. Returns `true` if the session was dropped.
    pub fn check(&self) -> bool {
        check_inactivity(&self.session)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn check_inactivity(session: &SessionManager) -> bool {
    let Some(last_activity) = session.last_activity() else {
        return false;
    };

    let idle = session.now_millis() - last_activity;
    let timeout = session.options().inactivity_timeout.as_millis() as i64;
    if idle > timeout {
        info!("Idle for {} ms, logging out", idle);
        session.teardown(INACTIVITY_LOGOUT);
        true
    } else {
        false
    }
}
