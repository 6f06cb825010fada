//! Google Analytics Data API client (v1beta `runReport`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::auth::ServiceAccountAuth;
use crate::config::Config;
use crate::error::{ApiError, ReportError};
use crate::query::{ReportQuery, RunReportRequest};

/// A single cell value in a report row.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CellValue {
    pub value: Option<String>,
}

/// A raw report row. Only the first dimension and first metric are read.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub dimension_values: Option<Vec<CellValue>>,
    pub metric_values: Option<Vec<CellValue>>,
}

impl Row {
    /// Convenience constructor for a one-dimension, one-metric row.
    pub fn new(dimension: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            dimension_values: Some(vec![CellValue {
                value: Some(dimension.into()),
            }]),
            metric_values: Some(vec![CellValue {
                value: Some(metric.into()),
            }]),
        }
    }
}

/// `runReport` response. Rows are absent when nothing matched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Option<Vec<Row>>,
    pub row_count: Option<i64>,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[allow(dead_code)]
    code: Option<i64>,
    message: String,
    #[serde(default)]
    status: String,
}

/// Anything that can run a report query for a property.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn run_report(
        &self,
        property: &str,
        query: &ReportQuery,
    ) -> Result<RunReportResponse, ApiError>;
}

/// Resource name for a GA4 property id.
pub fn property_resource(property: &str) -> String {
    format!("properties/{}", property)
}

/// HTTP client for the Analytics Data API.
#[derive(Clone)]
pub struct AnalyticsDataClient {
    base_url: String,
    http_client: Client,
    auth: ServiceAccountAuth,
}

impl AnalyticsDataClient {
    /// Create a new Data API client.
    pub fn new(
        base_url: String,
        auth: ServiceAccountAuth,
        timeout: std::time::Duration,
    ) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::HttpClientInit(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            auth,
        })
    }

    /// Build the client and authorizer from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ReportError> {
        let credentials = config.report.credentials()?;
        let property = config.report.property_id()?.to_string();
        let wrap = |source: ApiError| ReportError::Api {
            property: property.clone(),
            source,
        };

        let auth =
            ServiceAccountAuth::new(credentials, config.token_url.clone(), config.timeout())
                .map_err(|e| wrap(e.into()))?;
        Self::new(config.api_base_url.clone(), auth, config.timeout()).map_err(wrap)
    }

    fn run_report_url(&self, property: &str) -> String {
        format!("{}/{}:runReport", self.base_url, property_resource(property))
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<RunReportResponse, ApiError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            tracing::trace!(body = %truncate(&body, 500), "runReport response");
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body = %truncate(&body, 500), "runReport failed");
            Err(parse_error_response(status, &body))
        }
    }
}

#[async_trait]
impl ReportSource for AnalyticsDataClient {
    async fn run_report(
        &self,
        property: &str,
        query: &ReportQuery,
    ) -> Result<RunReportResponse, ApiError> {
        let token = self.auth.authorize().await?;
        let url = self.run_report_url(property);
        let body = RunReportRequest::from(query);

        tracing::debug!(%url, dimension = %query.dimension, metric = %query.metric, "POST runReport");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }
}

/// Map an error response to `ApiError`.
fn parse_error_response(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(error) => ApiError::ServiceError {
            status,
            code: error.error.status,
            message: error.error.message,
        },
        Err(_) => ApiError::HttpError {
            status,
            body: body.to_string(),
        },
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...(truncated)", &s[..idx]),
        None => s.to_string(),
    }
}

impl std::fmt::Debug for AnalyticsDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsDataClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}
