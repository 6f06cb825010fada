//! Trending page reports from the Google Analytics Data API.
//!
//! Builds a single `runReport` query from sparse options, runs it with a
//! service account, and maps the rows to `{path, value}` records that a
//! static-site host can register as build-graph nodes.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod nodes;
pub mod query;
pub mod report;

pub use analytics::{AnalyticsDataClient, ReportSource, Row, RunReportResponse};
pub use config::{Config, ReportConfig};
pub use error::{ApiError, AuthError, ConfigError, ReportError};
pub use nodes::{source_nodes, NodeSink, PageViewsNode};
pub use query::{build_query, effective_dimension, ReportQuery, SortOrder};
pub use report::{fetch_report, get_report, normalize, TrendingReport};
