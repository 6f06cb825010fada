//! Error types for the trending report client.

use reqwest::StatusCode;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service account authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token request failed with status {status}: {body}")]
    TokenRequestFailed { status: StatusCode, body: String },

    #[error("Token parse error: {0}")]
    TokenParse(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign assertion")]
    Signing,
}

/// Reporting API request/response errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("Analytics API error [{code}]: {message}")]
    ServiceError {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to create HTTP client: {0}")]
    HttpClientInit(String),
}

/// Errors surfaced by `get_report`.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to get analytics report for property {property}: {source}")]
    Api {
        property: String,
        #[source]
        source: ApiError,
    },
}

impl ReportError {
    /// True when the failure came from credentials being rejected.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ReportError::Api {
                source: ApiError::Auth(_),
                ..
            }
        )
    }
}
