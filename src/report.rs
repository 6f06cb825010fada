//! Trending reports: query, fetch, and normalize.

use serde::Serialize;

use crate::analytics::{AnalyticsDataClient, CellValue, ReportSource, Row};
use crate::config::{Config, ReportConfig};
use crate::error::ReportError;
use crate::query::build_query;

/// Stand-in for a missing dimension cell. Decoding it yields this literal
/// string, which is what hosts of the plugin have always received.
pub const MISSING_VALUE: &str = "undefined";

/// One page and its metric total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingReport {
    pub path: String,
    pub value: f64,
}

/// Decode a percent-encoded dimension value.
///
/// Values that do not decode to UTF-8 are kept as-is so one bad row does
/// not sink the batch.
pub fn decode_path(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or(MISSING_VALUE);
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::warn!(
                value = raw,
                error = %e,
                "dimension value is not valid percent-encoding, keeping raw value"
            );
            raw.to_string()
        }
    }
}

/// Convert a metric cell to a number. Anything unparsable is NaN.
pub fn parse_metric_value(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return f64::NAN;
    };
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix_prefixes = [
        ("0x", 16),
        ("0X", 16),
        ("0o", 8),
        ("0O", 8),
        ("0b", 2),
        ("0B", 2),
    ];
    for (prefix, radix) in radix_prefixes {
        if let Some(digits) = s.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN);
        }
    }

    // Rust also parses "inf" and "nan"; a metric value never legitimately does.
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn first_value(cells: &Option<Vec<CellValue>>) -> Option<&str> {
    cells.as_ref()?.first()?.value.as_deref()
}

/// Map one raw row to a report record.
pub fn construct_report(row: &Row) -> TrendingReport {
    TrendingReport {
        path: decode_path(first_value(&row.dimension_values)),
        value: parse_metric_value(first_value(&row.metric_values)),
    }
}

/// Map rows to records, one-to-one and in order.
pub fn normalize(rows: &[Row]) -> Vec<TrendingReport> {
    rows.iter().map(construct_report).collect()
}

/// Fetch and normalize a report from `source`.
pub async fn fetch_report<S>(
    source: &S,
    config: &ReportConfig,
) -> Result<Vec<TrendingReport>, ReportError>
where
    S: ReportSource + ?Sized,
{
    config.validate()?;
    let property = config.property_id()?;
    let query = build_query(config);

    tracing::debug!(
        property,
        dimension = %query.dimension,
        metric = %query.metric,
        start_date = %query.date_range.start_date,
        end_date = %query.date_range.end_date,
        limit = ?query.limit,
        "running report"
    );

    let response = source
        .run_report(property, &query)
        .await
        .map_err(|err| ReportError::Api {
            property: property.to_string(),
            source: err,
        })?;

    let reports = normalize(response.rows.as_deref().unwrap_or_default());
    tracing::info!(property, rows = reports.len(), "analytics report fetched");
    Ok(reports)
}

/// Fetch a report with explicit runtime settings.
pub async fn get_report_with(config: &Config) -> Result<Vec<TrendingReport>, ReportError> {
    config.report.validate()?;
    let client = AnalyticsDataClient::from_config(config)?;
    fetch_report(&client, &config.report).await
}

/// Fetch the trending report for `config` from the Analytics Data API.
///
/// Errors from authorization or the report call are returned, never
/// swallowed.
pub async fn get_report(config: &ReportConfig) -> Result<Vec<TrendingReport>, ReportError> {
    get_report_with(&Config::new(config.clone())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RunReportResponse;
    use crate::error::{ApiError, AuthError, ConfigError};
    use crate::query::{ReportQuery, SortOrder};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::num::NonZeroU32;
    use std::sync::Mutex;

    /// Returns canned rows and records every query it receives.
    struct StubSource {
        rows: Option<Vec<Row>>,
        calls: Mutex<Vec<(String, ReportQuery)>>,
    }

    impl StubSource {
        fn with_rows(rows: Option<Vec<Row>>) -> Self {
            Self {
                rows,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReportSource for StubSource {
        async fn run_report(
            &self,
            property: &str,
            query: &ReportQuery,
        ) -> Result<RunReportResponse, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((property.to_string(), query.clone()));
            Ok(RunReportResponse {
                rows: self.rows.clone(),
                row_count: self.rows.as_ref().map(|r| r.len() as i64),
            })
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ReportSource for FailingSource {
        async fn run_report(
            &self,
            _property: &str,
            _query: &ReportQuery,
        ) -> Result<RunReportResponse, ApiError> {
            Err(ApiError::Auth(AuthError::TokenRequestFailed {
                status: StatusCode::BAD_REQUEST,
                body: "invalid_grant".to_string(),
            }))
        }
    }

    fn config() -> ReportConfig {
        ReportConfig {
            service_account_email: Some("reporter@demo.iam.gserviceaccount.com".to_string()),
            private_key: Some("key".to_string()),
            property: Some("123".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_decodes_path() {
        let reports = normalize(&[Row::new("%2Fblog%2Fpost", "42")]);
        assert_eq!(
            reports,
            vec![TrendingReport {
                path: "/blog/post".to_string(),
                value: 42.0,
            }]
        );
    }

    #[test]
    fn test_normalize_non_numeric_value_is_nan() {
        let reports = normalize(&[Row::new("/a", "abc")]);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].value.is_nan());
    }

    #[test]
    fn test_normalize_preserves_order() {
        let rows = vec![
            Row::new("/low", "1"),
            Row::new("/high", "100"),
            Row::new("/mid", "50"),
        ];
        let paths: Vec<String> = normalize(&rows).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/low", "/high", "/mid"]);
    }

    #[test]
    fn test_normalize_missing_slots() {
        let rows = vec![
            Row::default(),
            Row {
                dimension_values: Some(vec![]),
                metric_values: Some(vec![CellValue { value: None }]),
            },
        ];
        for report in normalize(&rows) {
            assert_eq!(report.path, "undefined");
            assert!(report.value.is_nan());
        }
    }

    #[test]
    fn test_normalize_uses_first_slot_only() {
        let row = Row {
            dimension_values: Some(vec![
                CellValue {
                    value: Some("/first".to_string()),
                },
                CellValue {
                    value: Some("/second".to_string()),
                },
            ]),
            metric_values: Some(vec![
                CellValue {
                    value: Some("3".to_string()),
                },
                CellValue {
                    value: Some("4".to_string()),
                },
            ]),
        };
        assert_eq!(
            construct_report(&row),
            TrendingReport {
                path: "/first".to_string(),
                value: 3.0,
            }
        );
    }

    #[test]
    fn test_decode_path_invalid_utf8_passes_through() {
        assert_eq!(decode_path(Some("%FF%FE")), "%FF%FE");
        assert_eq!(decode_path(Some("/caf%C3%A9")), "/café");
        assert_eq!(decode_path(Some("/a+b")), "/a+b");
    }

    #[test]
    fn test_parse_metric_value() {
        assert_eq!(parse_metric_value(Some("42")), 42.0);
        assert_eq!(parse_metric_value(Some(" 12.5 ")), 12.5);
        assert_eq!(parse_metric_value(Some("1e3")), 1000.0);
        assert_eq!(parse_metric_value(Some("")), 0.0);
        assert_eq!(parse_metric_value(Some("0x1A")), 26.0);
        assert_eq!(parse_metric_value(Some("-Infinity")), f64::NEG_INFINITY);
        assert!(parse_metric_value(Some("inf")).is_nan());
        assert!(parse_metric_value(Some("NaN")).is_nan());
        assert!(parse_metric_value(Some("12abc")).is_nan());
        assert!(parse_metric_value(None).is_nan());
    }

    #[tokio::test]
    async fn test_fetch_report_end_to_end() {
        let source = StubSource::with_rows(Some(vec![
            Row::new("%2Fposts%2Frust", "120"),
            Row::new("%2Fposts%2Fgo", "80"),
        ]));
        let config = ReportConfig {
            limit: NonZeroU32::new(2),
            desc: Some(true),
            ..config()
        };

        let reports = fetch_report(&source, &config).await.unwrap();
        assert_eq!(
            reports,
            vec![
                TrendingReport {
                    path: "/posts/rust".to_string(),
                    value: 120.0,
                },
                TrendingReport {
                    path: "/posts/go".to_string(),
                    value: 80.0,
                },
            ]
        );

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (property, query) = &calls[0];
        assert_eq!(property, "123");
        assert_eq!(query.limit, NonZeroU32::new(2));
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.dimension, "pagePath");
        assert_eq!(query.metric, "screenPageViews");
    }

    #[tokio::test]
    async fn test_fetch_report_without_rows() {
        let source = StubSource::with_rows(None);
        assert!(fetch_report(&source, &config()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_report_propagates_failure() {
        let err = fetch_report(&FailingSource, &config()).await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("property 123"));
    }

    #[tokio::test]
    async fn test_missing_property_fails_before_call() {
        let source = StubSource::with_rows(Some(vec![Row::new("/", "1")]));
        let config = ReportConfig {
            property: None,
            ..config()
        };
        let err = fetch_report(&source, &config).await.unwrap_err();
        assert!(matches!(
            err,
            ReportError::Config(ConfigError::MissingField(ref field)) if field == "property"
        ));
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_report_missing_identity() {
        let config = ReportConfig {
            service_account_email: None,
            ..config()
        };
        let err = get_report(&config).await.unwrap_err();
        assert!(matches!(
            err,
            ReportError::Config(ConfigError::MissingField(ref field)) if field == "serviceAccountEmail"
        ));
    }
}
