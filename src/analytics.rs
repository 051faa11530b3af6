//! Reporting endpoints for the marketplace dashboards

use std::collections::HashMap;

use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::fetch::ApiClient;

/// Window used by the dashboards when none is chosen
pub const DEFAULT_PERIOD: &str = "30d";

/// Client for the analytics endpoints
#[derive(Clone)]
pub struct AnalyticsApi {
    client: ApiClient,
}

impl AnalyticsApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sales figures over `period`, e.g. `7d`, `30d` or `1y`
    pub async fn sales(&self, period: &str) -> Result<Value> {
        let mut query = HashMap::new();
        query.insert("period".to_string(), period.to_string());

        self.client
            .get("/analytics/sales/")
            .query(query)
            .execute()
            .await
            .map_err(|err| {
                error!("Failed to fetch sales analytics: {}", err);
                err
            })
    }

    pub async fn users(&self) -> Result<Value> {
        self.client.get("/analytics/users/").execute().await
    }

    pub async fn products(&self) -> Result<Value> {
        self.client.get("/analytics/products/").execute().await
    }

    /// Ad-hoc report; `filters` is passed through as the request body
    pub async fn custom_report<F: Serialize + ?Sized>(&self, filters: &F) -> Result<Value> {
        self.client
            .post("/analytics/custom-report/")
            .json(filters)?
            .execute()
            .await
            .map_err(|err| {
                error!("Failed to build custom report: {}", err);
                err
            })
    }
}
