//! Single-flight access token refresh.
//!
//! Whoever finds the access token stale first performs the refresh; anyone
//! arriving while it is in flight waits for that same outcome instead of
//! issuing a second call.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::RefreshError;

/// Tokens returned by the refresh endpoint. `refresh` is only present when
/// the server rotates refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access: String,
    pub refresh: Option<String>,
}

/// Network seam for exchanging a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

/// `POST {api_url}/token/refresh/` with a bare client, bypassing any
/// request interception.
pub struct HttpTokenRefresher {
    url: String,
    http_client: Client,
}

impl HttpTokenRefresher {
    pub fn new(api_url: &str, http_client: Client) -> Self {
        Self {
            url: format!("{}/token/refresh/", api_url.trim_end_matches('/')),
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorDetail>(&text)
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or(text);
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.json::<RefreshResponse>().await?;
        match body.access {
            Some(access) if !access.is_empty() => Ok(RefreshedTokens {
                access,
                refresh: body.refresh.filter(|token| !token.is_empty()),
            }),
            _ => Err(RefreshError::MissingAccessToken),
        }
    }
}

/// リフレッシュ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Default)]
struct Inner {
    refreshing: bool,
    waiters: VecDeque<Waiter>,
}

#[derive(Default)]
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RefreshState {
        if self.lock().refreshing {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of callers parked behind the in-flight refresh.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Runs `refresh` unless one is already in flight, in which case the
    /// caller is queued and receives the in-flight outcome.
    pub async fn run<F, Fut>(&self, refresh: F) -> Result<String, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RefreshError>>,
    {
        let queued = {
            let mut inner = self.lock();
            if inner.refreshing {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(tx);
                Some(rx)
            } else {
                inner.refreshing = true;
                None
            }
        };

        if let Some(rx) = queued {
            debug!("Token refresh already in flight, waiting for it");
            return rx.await.unwrap_or(Err(RefreshError::Aborted));
        }

        let mut in_flight = InFlight {
            coordinator: self,
            settled: false,
        };
        let outcome = refresh().await;
        in_flight.settle(outcome.clone());
        outcome
    }

    fn settle(&self, outcome: Result<String, RefreshError>) {
        let waiters = {
            let mut inner = self.lock();
            inner.refreshing = false;
            std::mem::take(&mut inner.waiters)
        };

        debug!("Token refresh settled, releasing {} waiter(s)", waiters.len());
        for waiter in waiters {
            // A waiter whose request was dropped has nobody to tell.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to idle even if the leading future is dropped.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, outcome: Result<String, RefreshError>) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(Err(RefreshError::Aborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..8).map(|_| {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            async move {
                coordinator
                    .run(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("fresh-token".to_string())
                    })
                    .await
            }
        });

        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("fresh-token")));
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.waiting(), 0);
    }

    #[tokio::test]
    async fn test_failure_rejects_every_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let callers = (0..4).map(|_| {
            let coordinator = coordinator.clone();
            async move {
                coordinator
                    .run(|| async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(RefreshError::Rejected {
                            status: 401,
                            detail: "Token is invalid or expired".to_string(),
                        })
                    })
                    .await
            }
        });

        let results = join_all(callers).await;

        for result in results {
            assert_eq!(
                result,
                Err(RefreshError::Rejected {
                    status: 401,
                    detail: "Token is invalid or expired".to_string(),
                })
            );
        }
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|| std::future::pending::<Result<String, RefreshError>>())
                    .await
            })
        };
        while coordinator.state() != RefreshState::Refreshing {
            tokio::task::yield_now().await;
        }

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(|| async { Ok("unused".to_string()) })
                    .await
            })
        };
        while coordinator.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        assert_eq!(waiter.await.unwrap(), Err(RefreshError::Aborted));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[test]
    fn test_next_refresh_after_settle_runs_again() {
        tokio_test::block_on(async {
            let coordinator = RefreshCoordinator::new();
            let first = coordinator.run(|| async { Ok("one".to_string()) }).await;
            let second = coordinator.run(|| async { Ok("two".to_string()) }).await;
            assert_eq!(first.as_deref(), Ok("one"));
            assert_eq!(second.as_deref(), Ok("two"));
            assert_eq!(coordinator.state(), RefreshState::Idle);
        });
    }
}
