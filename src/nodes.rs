//! Build-graph nodes for trending reports.
//!
//! A static-site host registers one `PageViews` node per report row. Node ids
//! are derived from the decoded path and a content digest lets the host skip
//! unchanged nodes between builds.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use uuid::Uuid;

use crate::analytics::{AnalyticsDataClient, ReportSource};
use crate::config::Config;
use crate::report::{fetch_report, TrendingReport};

pub const NODE_TYPE: &str = "PageViews";
const NODE_DESCRIPTION: &str = "Metric calculation by page path";

/// Host-side bookkeeping for a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub node_type: String,
    pub content_digest: String,
    pub description: String,
}

/// A page views node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewsNode {
    pub id: String,
    pub path: String,
    pub total_count: f64,
    pub internal: NodeInternal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DigestInput<'a> {
    path: &'a str,
    total_count: f64,
}

/// Deterministic node id for a path.
pub fn node_id(path: &str) -> String {
    let name = format!("{}:{}", NODE_TYPE, path);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// SHA-256 hex digest of the node content.
pub fn content_digest(path: &str, total_count: f64) -> String {
    // f64 serialization cannot fail; NaN becomes null
    let bytes = serde_json::to_vec(&DigestInput { path, total_count }).unwrap_or_default();
    hex::encode(Sha256::digest(bytes))
}

impl From<&TrendingReport> for PageViewsNode {
    fn from(report: &TrendingReport) -> Self {
        Self {
            id: node_id(&report.path),
            path: report.path.clone(),
            total_count: report.value,
            internal: NodeInternal {
                node_type: NODE_TYPE.to_string(),
                content_digest: content_digest(&report.path, report.value),
                description: NODE_DESCRIPTION.to_string(),
            },
        }
    }
}

/// Receives nodes created from a report.
pub trait NodeSink {
    fn create_node(&mut self, node: PageViewsNode) -> std::io::Result<()>;
}

/// Collects nodes in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub nodes: Vec<PageViewsNode>,
}

impl NodeSink for VecSink {
    fn create_node(&mut self, node: PageViewsNode) -> std::io::Result<()> {
        self.nodes.push(node);
        Ok(())
    }
}

/// Writes one JSON object per node.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> NodeSink for JsonLinesSink<W> {
    fn create_node(&mut self, node: PageViewsNode) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, &node)?;
        self.writer.write_all(b"\n")
    }
}

/// Register one node per report, in order.
pub fn create_nodes(
    reports: &[TrendingReport],
    sink: &mut dyn NodeSink,
) -> std::io::Result<usize> {
    for report in reports {
        sink.create_node(PageViewsNode::from(report))?;
    }
    Ok(reports.len())
}

/// Fetch from `source` and register nodes.
///
/// Failures are logged and swallowed: the host build continues with no
/// nodes. Returns the number of nodes created.
pub async fn source_nodes_from<S>(
    source: &S,
    config: &Config,
    sink: &mut dyn NodeSink,
) -> usize
where
    S: ReportSource + ?Sized,
{
    match fetch_report(source, &config.report).await {
        Ok(reports) => match create_nodes(&reports, sink) {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "failed to create page views nodes");
                0
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to get analytics report");
            0
        }
    }
}

/// Fetch from the Analytics Data API and register nodes, swallowing failures.
pub async fn source_nodes(config: &Config, sink: &mut dyn NodeSink) -> usize {
    let client = match AnalyticsDataClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to get analytics report");
            return 0;
        }
    };
    source_nodes_from(&client, config, sink).await
}
