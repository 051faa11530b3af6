//! In-app notifications for the signed-in user

use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::fetch::ApiClient;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Order,
    Payment,
    Weather,
    Price,
    Advice,
    #[serde(other)]
    Other,
}

/// A notification addressed to the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: NotificationType,

    pub title: String,
    pub message: String,

    #[serde(default)]
    pub is_read: bool,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub user: Option<i64>,
}

/// Client for the notifications endpoints
#[derive(Clone)]
pub struct NotificationApi {
    client: ApiClient,
}

impl NotificationApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// All notifications for the current user
    pub async fn list(&self) -> Result<Vec<Notification>> {
        self.client
            .get("/notifications/")
            .execute()
            .await
            .map_err(|err| {
                error!("Failed to fetch notifications: {}", err);
                err
            })
    }

    pub async fn mark_as_read(&self, notification_id: i64) -> Result<Notification> {
        self.client
            .patch(&format!("/notifications/{}/", notification_id))
            .json(&json!({"is_read": true}))?
            .execute()
            .await
            .map_err(|err| {
                error!("Failed to mark notification as read: {}", err);
                err
            })
    }

    /// Bulk update; older servers may not expose this endpoint
    pub async fn mark_all_as_read(&self) -> Result<Value> {
        self.client
            .post("/notifications/mark-all-read/")
            .execute()
            .await
            .map_err(|err| {
                warn!("Bulk mark as read not supported: {}", err);
                err
            })
    }
}
