#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use efarmer_auth::{Environment, MemoryStore, Navigator, Notifier};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

/// Navigator that records every redirect and follows it.
pub struct RecordingNavigator {
    path: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new(path: &str) -> Arc<Self> {
        Arc::new(Self {
            path: Mutex::new(path.to_string()),
            redirects: Mutex::new(Vec::new()),
        })
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    fn redirect(&self, path: &str) {
        *self.path.lock().unwrap() = path.to_string();
        self.redirects.lock().unwrap().push(path.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _)| *level == "error")
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<(&'static str, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(("error", message.to_string()));
    }

    fn success(&self, message: &str) {
        self.messages.lock().unwrap().push(("success", message.to_string()));
    }

    fn info(&self, message: &str) {
        self.messages.lock().unwrap().push(("info", message.to_string()));
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub env: Environment,
}

pub fn harness(path: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let navigator = RecordingNavigator::new(path);
    let notifier = RecordingNotifier::new();
    let env = Environment::default()
        .with_store(store.clone())
        .with_navigator(navigator.clone())
        .with_notifier(notifier.clone());

    Harness {
        store,
        navigator,
        notifier,
        env,
    }
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// A signed JWT whose `exp` lies `secs` from now (negative for the past).
pub fn token_expiring_in(secs: i64, subject: &str) -> String {
    encode(
        &Header::default(),
        &json!({"token_type": "access", "user_id": subject, "exp": now_secs() + secs}),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}
