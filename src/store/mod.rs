use crate::model::{Finding, GraphEdge, GraphNode};
use anyhow::Result;
use serde_json::Value;

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteStore;

/// A node ready for persistence. Durable IDs do not exist yet; edges at this
/// stage point at positions in the batch, not at rows.
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub kind: crate::model::NodeKind,
    pub name: String,
    pub file: Option<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub metadata: Value,
}

/// An edge ready for persistence, already resolved to durable node IDs.
#[derive(Debug, Clone)]
pub struct EdgeInput {
    pub source_id: i64,
    pub target_id: i64,
    pub kind: crate::model::EdgeKind,
    pub metadata: Value,
}

/// Persistence seam for graph data. The builder and analyzer work against
/// this trait so tests can swap the backing store.
pub trait GraphStore {
    /// Remove every node and edge for one analysis. Rebuilds call this first
    /// so repeating a build leaves no stale rows behind. Findings are
    /// collaborator-owned input and are not touched.
    fn delete_analysis(&self, analysis_id: &str) -> Result<()>;

    /// Insert a batch of nodes in one transaction and return their durable
    /// IDs in input order.
    fn insert_nodes(&self, analysis_id: &str, nodes: &[NodeInput]) -> Result<Vec<i64>>;

    /// Insert a batch of edges in one transaction.
    fn insert_edges(&self, analysis_id: &str, edges: &[EdgeInput]) -> Result<usize>;

    fn load_nodes(&self, analysis_id: &str) -> Result<Vec<GraphNode>>;

    fn load_edges(&self, analysis_id: &str) -> Result<Vec<GraphEdge>>;
}

/// Persistence seam for the security finding feed.
pub trait FindingStore {
    fn insert_findings(&self, analysis_id: &str, findings: &[Finding]) -> Result<usize>;

    fn list_findings(&self, analysis_id: &str) -> Result<Vec<Finding>>;
}
