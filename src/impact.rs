use crate::model::{
    DependentNode, GraphNode, ImpactReport, NodeKind, Severity, VulnerabilityPropagation,
};
use crate::store::{FindingStore, GraphStore};
use anyhow::{Result, anyhow, bail};
use std::collections::{HashMap, HashSet, VecDeque};

pub const DEFAULT_IMPACT_DEPTH: usize = 5;
pub const DEFAULT_CHAIN_DEPTH: usize = 10;

/// Read-only view of one analysis, shaped for traversal: node map, file
/// index and both adjacency directions. Built once per `load_graph` call in
/// O(nodes + edges).
struct GraphSnapshot {
    nodes: HashMap<i64, GraphNode>,
    by_file: HashMap<String, Vec<i64>>,
    /// source -> targets (what a node depends on).
    forward: HashMap<i64, Vec<i64>>,
    /// target -> sources (who depends on a node).
    reverse: HashMap<i64, Vec<i64>>,
    total_nodes: usize,
}

/// Answers impact, dead-code and dependency-chain queries over loaded
/// snapshots. Queries against an analysis that was never loaded are a
/// caller bug and fail hard.
pub struct ImpactAnalyzer<'a> {
    graph_store: &'a dyn GraphStore,
    finding_store: &'a dyn FindingStore,
    snapshots: HashMap<String, GraphSnapshot>,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(graph_store: &'a dyn GraphStore, finding_store: &'a dyn FindingStore) -> Self {
        Self {
            graph_store,
            finding_store,
            snapshots: HashMap::new(),
        }
    }

    /// Load (or reload) one analysis into memory.
    pub fn load_graph(&mut self, analysis_id: &str) -> Result<()> {
        let nodes = self.graph_store.load_nodes(analysis_id)?;
        let edges = self.graph_store.load_edges(analysis_id)?;

        let mut snapshot = GraphSnapshot {
            total_nodes: nodes.len(),
            nodes: HashMap::with_capacity(nodes.len()),
            by_file: HashMap::new(),
            forward: HashMap::new(),
            reverse: HashMap::new(),
        };
        for node in nodes {
            if let Some(file) = &node.file {
                snapshot.by_file.entry(file.clone()).or_default().push(node.id);
            }
            snapshot.nodes.insert(node.id, node);
        }
        for edge in &edges {
            snapshot
                .forward
                .entry(edge.source_id)
                .or_default()
                .push(edge.target_id);
            snapshot
                .reverse
                .entry(edge.target_id)
                .or_default()
                .push(edge.source_id);
        }
        self.snapshots.insert(analysis_id.to_string(), snapshot);
        Ok(())
    }

    fn snapshot(&self, analysis_id: &str) -> Result<&GraphSnapshot> {
        self.snapshots
            .get(analysis_id)
            .ok_or_else(|| anyhow!("graph not loaded for analysis {analysis_id}"))
    }

    /// Who breaks when this file (or one function in it) changes.
    pub fn analyze_file_impact(
        &self,
        analysis_id: &str,
        target_file: &str,
        target_function: Option<&str>,
        max_depth: usize,
    ) -> Result<ImpactReport> {
        let snapshot = self.snapshot(analysis_id)?;

        let mut targets: Vec<i64> = snapshot
            .by_file
            .get(target_file)
            .cloned()
            .unwrap_or_default();
        if let Some(function) = target_function {
            targets.retain(|id| {
                snapshot
                    .nodes
                    .get(id)
                    .map(|node| node.kind == NodeKind::Function && node.name == function)
                    .unwrap_or(false)
            });
        }
        let target_set: HashSet<i64> = targets.iter().copied().collect();
        if target_set.is_empty() {
            // Unknown file or function: zero impact, not an error.
            return Ok(ImpactReport {
                target_file: target_file.to_string(),
                target_function: target_function.map(|s| s.to_string()),
                direct_dependents: Vec::new(),
                transitive_dependents: Vec::new(),
                affected_files: Vec::new(),
                impact_score: 0,
                vulnerability_propagation: Vec::new(),
            });
        }

        let mut direct: Vec<i64> = Vec::new();
        let mut direct_set: HashSet<i64> = HashSet::new();
        for target in &targets {
            for &source in snapshot.reverse.get(target).map(Vec::as_slice).unwrap_or(&[]) {
                if !target_set.contains(&source) && direct_set.insert(source) {
                    direct.push(source);
                }
            }
        }

        // Transitive dependents: bounded BFS over reverse adjacency, with
        // the visited set seeded by the targets so cycles terminate.
        let mut visited: HashSet<i64> = target_set.clone();
        visited.extend(direct_set.iter().copied());
        let mut transitive: Vec<i64> = Vec::new();
        let mut frontier: VecDeque<(i64, usize)> =
            direct.iter().map(|&id| (id, 1)).collect();
        while let Some((id, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &source in snapshot.reverse.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if visited.insert(source) {
                    transitive.push(source);
                    frontier.push_back((source, depth + 1));
                }
            }
        }

        let dependent_count = direct.len() + transitive.len();
        let impact_score = if dependent_count == 0 || snapshot.total_nodes == 0 {
            0
        } else {
            let raw = (100.0 * dependent_count as f64 / snapshot.total_nodes as f64).round();
            (raw as u32).min(100)
        };

        let mut affected_files: Vec<String> = Vec::new();
        let mut seen_files: HashSet<&str> = HashSet::new();
        for id in direct.iter().chain(&transitive) {
            let Some(file) = snapshot.nodes.get(id).and_then(|n| n.file.as_deref()) else {
                continue;
            };
            if file != target_file && seen_files.insert(file) {
                affected_files.push(file.to_string());
            }
        }
        affected_files.sort();

        let vulnerability_propagation =
            self.propagate_findings(analysis_id, target_file, snapshot, &direct)?;

        Ok(ImpactReport {
            target_file: target_file.to_string(),
            target_function: target_function.map(|s| s.to_string()),
            direct_dependents: to_dependents(snapshot, &direct),
            transitive_dependents: to_dependents(snapshot, &transitive),
            affected_files,
            impact_score,
            vulnerability_propagation,
        })
    }

    /// For each critical/high finding on the target file, pair it with the
    /// files one hop away. Reachability annotation only.
    fn propagate_findings(
        &self,
        analysis_id: &str,
        target_file: &str,
        snapshot: &GraphSnapshot,
        direct: &[i64],
    ) -> Result<Vec<VulnerabilityPropagation>> {
        let findings = self.finding_store.list_findings(analysis_id)?;
        let relevant: Vec<_> = findings
            .into_iter()
            .filter(|finding| {
                finding.file == target_file
                    && matches!(finding.severity, Severity::Critical | Severity::High)
            })
            .collect();
        if relevant.is_empty() {
            return Ok(Vec::new());
        }

        let mut path = vec![target_file.to_string()];
        let mut seen: HashSet<&str> = HashSet::new();
        for id in direct {
            if path.len() > 5 {
                break;
            }
            let Some(file) = snapshot.nodes.get(id).and_then(|n| n.file.as_deref()) else {
                continue;
            };
            if file != target_file && seen.insert(file) {
                path.push(file.to_string());
            }
        }

        Ok(relevant
            .into_iter()
            .map(|finding| VulnerabilityPropagation {
                finding,
                path: path.clone(),
            })
            .collect())
    }

    /// Declarations nothing points at: not exported, not a module/import/
    /// export node, zero incoming edges.
    pub fn find_dead_code(&self, analysis_id: &str) -> Result<Vec<GraphNode>> {
        let snapshot = self.snapshot(analysis_id)?;
        let mut dead: Vec<GraphNode> = snapshot
            .nodes
            .values()
            .filter(|node| {
                !matches!(
                    node.kind,
                    NodeKind::Module | NodeKind::Import | NodeKind::Export
                ) && !node.is_exported()
                    && snapshot
                        .reverse
                        .get(&node.id)
                        .map(|sources| sources.is_empty())
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        dead.sort_by(|a, b| (a.file.as_deref(), a.line_start).cmp(&(b.file.as_deref(), b.line_start)));
        Ok(dead)
    }

    /// Forward BFS trace of what a node depends on, as `kind:name (file)`
    /// strings in visitation order.
    pub fn dependency_chain(
        &self,
        analysis_id: &str,
        node_id: i64,
        max_depth: usize,
    ) -> Result<Vec<String>> {
        let snapshot = self.snapshot(analysis_id)?;
        if !snapshot.nodes.contains_key(&node_id) {
            bail!("node {node_id} not found in analysis {analysis_id}");
        }

        let mut chain = Vec::new();
        let mut visited: HashSet<i64> = HashSet::new();
        visited.insert(node_id);
        let mut frontier: VecDeque<(i64, usize)> = VecDeque::new();
        frontier.push_back((node_id, 0));
        while let Some((id, depth)) = frontier.pop_front() {
            if let Some(node) = snapshot.nodes.get(&id) {
                chain.push(describe_node(node));
            }
            if depth >= max_depth {
                continue;
            }
            for &target in snapshot.forward.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if visited.insert(target) {
                    frontier.push_back((target, depth + 1));
                }
            }
        }
        Ok(chain)
    }
}

fn describe_node(node: &GraphNode) -> String {
    let location = node.file.as_deref().unwrap_or("external");
    format!("{}:{} ({location})", node.kind.as_str(), node.name)
}

fn to_dependents(snapshot: &GraphSnapshot, ids: &[i64]) -> Vec<DependentNode> {
    let mut dependents: Vec<DependentNode> = ids
        .iter()
        .filter_map(|id| snapshot.nodes.get(id))
        .map(|node| DependentNode {
            node_id: node.id,
            kind: node.kind,
            name: node.name.clone(),
            file: node.file.clone(),
        })
        .collect();
    dependents.sort_by_key(|d| d.node_id);
    dependents
}
