use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of a graph node. The vocabulary is closed; storage round-trips
/// through `as_str`/`FromStr`.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Variable,
    Import,
    Export,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Variable => "variable",
            NodeKind::Import => "import",
            NodeKind::Export => "export",
        }
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw {
            "module" => Ok(NodeKind::Module),
            "class" => Ok(NodeKind::Class),
            "function" => Ok(NodeKind::Function),
            "variable" => Ok(NodeKind::Variable),
            "import" => Ok(NodeKind::Import),
            "export" => Ok(NodeKind::Export),
            other => Err(anyhow!("unknown node kind: {other}")),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a graph edge.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Imports,
    Calls,
    Inherits,
    Implements,
    Uses,
    Defines,
    Contains,
    DependsOn,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::Calls => "calls",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::Uses => "uses",
            EdgeKind::Defines => "defines",
            EdgeKind::Contains => "contains",
            EdgeKind::DependsOn => "depends_on",
        }
    }
}

impl FromStr for EdgeKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw {
            "imports" => Ok(EdgeKind::Imports),
            "calls" => Ok(EdgeKind::Calls),
            "inherits" => Ok(EdgeKind::Inherits),
            "implements" => Ok(EdgeKind::Implements),
            "uses" => Ok(EdgeKind::Uses),
            "defines" => Ok(EdgeKind::Defines),
            "contains" => Ok(EdgeKind::Contains),
            "depends_on" => Ok(EdgeKind::DependsOn),
            other => Err(anyhow!("unknown edge kind: {other}")),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted declaration: one module, class, function, variable, import or
/// export within an analysis. Created once during a build pass and never
/// mutated afterwards.
#[derive(Debug, Serialize, Clone)]
pub struct GraphNode {
    pub id: i64,
    pub analysis_id: String,
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<i64>,
    pub metadata: Value,
}

impl GraphNode {
    /// Placeholder nodes stand in for targets outside the project tree.
    pub fn is_external(&self) -> bool {
        self.metadata
            .get("external")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_exported(&self) -> bool {
        self.metadata
            .get("exported")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// A resolved relationship between two nodes of the same analysis. Both
/// endpoints are guaranteed to exist post-resolution.
#[derive(Debug, Serialize, Clone)]
pub struct GraphEdge {
    pub id: i64,
    pub analysis_id: String,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub metadata: Value,
}

/// Per-kind node and edge tallies, recomputed from the graph on read.
#[derive(Debug, Serialize, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn tabulate(nodes: &[GraphNode], edges: &[GraphEdge]) -> Self {
        let mut stats = GraphStats {
            node_count: nodes.len(),
            edge_count: edges.len(),
            ..Default::default()
        };
        for node in nodes {
            *stats
                .nodes_by_kind
                .entry(node.kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        for edge in edges {
            *stats
                .edges_by_kind
                .entry(edge.kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats
    }
}

/// Aggregate view of one analysis's graph.
#[derive(Debug, Serialize)]
pub struct CodeGraph {
    pub analysis_id: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(anyhow!("unknown severity: {other}")),
        }
    }
}

/// A scanner-normalized issue keyed by file. Consumed only for
/// vulnerability-propagation annotation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub file: String,
}

/// A node that depends (directly or transitively) on the impact target.
#[derive(Debug, Serialize, Clone)]
pub struct DependentNode {
    pub node_id: i64,
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Links a high/critical finding on the target file to the files that
/// directly depend on it. Reachability annotation, not proof of
/// exploitability.
#[derive(Debug, Serialize, Clone)]
pub struct VulnerabilityPropagation {
    pub finding: Finding,
    pub path: Vec<String>,
}

/// Result of a change-impact query against a loaded graph.
#[derive(Debug, Serialize)]
pub struct ImpactReport {
    pub target_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_function: Option<String>,
    pub direct_dependents: Vec<DependentNode>,
    pub transitive_dependents: Vec<DependentNode>,
    pub affected_files: Vec<String>,
    pub impact_score: u32,
    pub vulnerability_propagation: Vec<VulnerabilityPropagation>,
}

/// Counters logged at the end of a build pass.
#[derive(Debug, Serialize, Default)]
pub struct BuildStats {
    pub scanned: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub parse_errors: usize,
    pub nodes: usize,
    pub edges: usize,
    pub placeholders: usize,
    pub dropped_edges: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in [
            NodeKind::Module,
            NodeKind::Class,
            NodeKind::Function,
            NodeKind::Variable,
            NodeKind::Import,
            NodeKind::Export,
        ] {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        for kind in [
            EdgeKind::Imports,
            EdgeKind::Calls,
            EdgeKind::Inherits,
            EdgeKind::Implements,
            EdgeKind::Uses,
            EdgeKind::Defines,
            EdgeKind::Contains,
            EdgeKind::DependsOn,
        ] {
            assert_eq!(kind.as_str().parse::<EdgeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn stats_tabulate_counts_by_kind() {
        let nodes = vec![
            GraphNode {
                id: 1,
                analysis_id: "a".into(),
                kind: NodeKind::Module,
                name: "m".into(),
                file: Some("m.js".into()),
                line_start: Some(1),
                line_end: Some(10),
                metadata: Value::Null,
            },
            GraphNode {
                id: 2,
                analysis_id: "a".into(),
                kind: NodeKind::Function,
                name: "f".into(),
                file: Some("m.js".into()),
                line_start: Some(2),
                line_end: Some(4),
                metadata: Value::Null,
            },
        ];
        let edges = vec![GraphEdge {
            id: 1,
            analysis_id: "a".into(),
            source_id: 1,
            target_id: 2,
            kind: EdgeKind::Contains,
            metadata: Value::Null,
        }];
        let stats = GraphStats::tabulate(&nodes, &edges);
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.nodes_by_kind.get("function"), Some(&1));
        assert_eq!(stats.edges_by_kind.get("contains"), Some(&1));
    }
}
