//! Report query builder.
//!
//! Resolves a sparse [`ReportConfig`] into a fully specified [`ReportQuery`]
//! and renders it as a Data API `runReport` request body.

use serde::Serialize;
use std::num::NonZeroU32;

use crate::config::{non_empty, ReportConfig};

pub const DEFAULT_METRIC: &str = "screenPageViews";
pub const DEFAULT_DIMENSION: &str = "pagePath";
pub const DEFAULT_START_DATE: &str = "365daysAgo";
pub const DEFAULT_END_DATE: &str = "today";

/// Metrics with this prefix are only reported per landing page.
pub const ORGANIC_SEARCH_METRIC_PREFIX: &str = "organicGoogleSearch";
pub const ORGANIC_SEARCH_DIMENSION: &str = "landingPagePlusQueryString";

/// Sort order by metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything but an explicit `false` sorts descending.
    pub fn from_desc(desc: Option<bool>) -> Self {
        match desc {
            Some(false) => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn is_desc(self) -> bool {
        self == SortOrder::Desc
    }
}

/// Inclusive date range in Data API date grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

/// Partial regular-expression match on a dimension value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexFilter {
    pub field_name: String,
    pub pattern: String,
}

/// A fully resolved report query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub dimension: String,
    pub metric: String,
    pub date_range: DateRange,
    pub filter: Option<RegexFilter>,
    pub order: SortOrder,
    pub limit: Option<NonZeroU32>,
}

/// Resolve the metric, falling back to [`DEFAULT_METRIC`].
pub fn resolve_metric(metric: Option<&str>) -> &str {
    metric.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_METRIC)
}

/// Dimension actually queried for `metric`.
///
/// Organic search metrics force [`ORGANIC_SEARCH_DIMENSION`], even over an
/// explicitly configured dimension.
pub fn effective_dimension<'a>(metric: &str, configured: Option<&'a str>) -> &'a str {
    if metric.starts_with(ORGANIC_SEARCH_METRIC_PREFIX) {
        return ORGANIC_SEARCH_DIMENSION;
    }
    configured
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DIMENSION)
}

/// Build the report query for `config`.
pub fn build_query(config: &ReportConfig) -> ReportQuery {
    let metric = resolve_metric(config.metric.as_deref());
    let dimension = effective_dimension(metric, config.dimension.as_deref());

    let date_range = DateRange {
        start_date: non_empty(&config.start_date)
            .unwrap_or(DEFAULT_START_DATE)
            .to_string(),
        end_date: non_empty(&config.end_date)
            .unwrap_or(DEFAULT_END_DATE)
            .to_string(),
    };

    let filter = non_empty(&config.regex_filter).map(|pattern| RegexFilter {
        field_name: dimension.to_string(),
        pattern: pattern.to_string(),
    });

    ReportQuery {
        dimension: dimension.to_string(),
        metric: metric.to_string(),
        date_range,
        filter,
        order: SortOrder::from_desc(config.desc),
        limit: config.limit,
    }
}

// ============================================================================
// runReport request body
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Dimension {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    pub match_type: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_name: String,
    pub string_filter: StringFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterExpression {
    pub filter: Filter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrderBy {
    pub metric_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBy {
    pub metric: MetricOrderBy,
    pub desc: bool,
}

/// Body of `POST properties/{property}:runReport`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    pub date_ranges: Vec<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter: Option<FilterExpression>,
    pub order_bys: Vec<OrderBy>,
    /// int64 fields travel as JSON strings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

impl From<&ReportQuery> for RunReportRequest {
    fn from(query: &ReportQuery) -> Self {
        Self {
            dimensions: vec![Dimension {
                name: query.dimension.clone(),
            }],
            metrics: vec![Metric {
                name: query.metric.clone(),
            }],
            date_ranges: vec![query.date_range.clone()],
            dimension_filter: query.filter.as_ref().map(|f| FilterExpression {
                filter: Filter {
                    field_name: f.field_name.clone(),
                    string_filter: StringFilter {
                        match_type: "PARTIAL_REGEXP",
                        value: f.pattern.clone(),
                    },
                },
            }),
            order_bys: vec![OrderBy {
                metric: MetricOrderBy {
                    metric_name: query.metric.clone(),
                },
                desc: query.order.is_desc(),
            }],
            limit: query.limit.map(|l| l.to_string()),
        }
    }
}
