#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use efarmer_client::config::ClientOptions;
use efarmer_client::session::{Environment, MemoryStore, Navigator, Notifier};
use efarmer_client::EFarmer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use wiremock::MockServer;

pub struct RecordingNavigator {
    path: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
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
    errors: Mutex<Vec<String>>,
    successes: Mutex<Vec<String>>,
    infos: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }
}

/// A client talking to `{server}/api` with observable host capabilities.
pub struct TestClient {
    pub client: EFarmer,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn test_client(api_url: &str, current_path: &str) -> TestClient {
    test_client_with(api_url, current_path, Environment::default())
}

/// Like [`test_client`], keeping the clock of `base`.
pub fn test_client_with(api_url: &str, current_path: &str, base: Environment) -> TestClient {
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(RecordingNavigator {
        path: Mutex::new(current_path.to_string()),
        redirects: Mutex::new(Vec::new()),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let env = base
        .with_store(store.clone())
        .with_navigator(navigator.clone())
        .with_notifier(notifier.clone());

    let client =
        EFarmer::new_with_options(ClientOptions::default().with_api_url(api_url), env).unwrap();

    TestClient {
        client,
        store,
        navigator,
        notifier,
    }
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// A signed JWT whose `exp` lies `secs` from now (negative for the past).
pub fn access_token(secs: i64, user: &str) -> String {
    encode(
        &Header::default(),
        &json!({"token_type": "access", "user_id": user, "exp": now_secs() + secs}),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap()
}
