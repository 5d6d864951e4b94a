use crate::config::Config;
use crate::model::{BuildStats, CodeGraph, EdgeKind, GraphStats, NodeKind};
use crate::parser::{self, ExtractionResult, ParserDispatcher};
use crate::store::{EdgeInput, GraphStore, NodeInput};
use anyhow::Result;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub mod scan;

/// Shared flag for stopping a build between files. Cancellation is
/// cooperative: nothing is persisted once the flag is set, so a cancelled
/// analysis stays empty rather than half-written.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub analysis_id: String,
    pub project_path: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_files: Option<usize>,
    pub max_file_size: Option<u64>,
    pub no_ignore: bool,
}

impl BuildOptions {
    pub fn new(analysis_id: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            project_path: project_path.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_files: None,
            max_file_size: None,
            no_ignore: false,
        }
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: CodeGraph,
    pub stats: BuildStats,
}

/// Builds one analysis from a project tree: scan, parse on a worker pool,
/// resolve symbolic refs, persist nodes and edges in batches.
pub struct GraphBuilder<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub fn build(&self, options: &BuildOptions) -> Result<BuildOutcome> {
        self.build_with_cancel(options, &CancelToken::new())
    }

    pub fn build_with_cancel(
        &self,
        options: &BuildOptions,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome> {
        let started = Instant::now();
        let analysis_id = options.analysis_id.as_str();
        let project_root =
            std::fs::canonicalize(&options.project_path).unwrap_or(options.project_path.clone());

        // Rebuilds are idempotent: the previous graph for this analysis goes
        // away before anything new is written.
        self.store.delete_analysis(analysis_id)?;

        let scan_options = scan::ScanOptions {
            no_ignore: options.no_ignore,
            include: options.include.clone(),
            exclude: options.exclude.clone(),
            max_files: options.max_files,
            max_file_size: options.max_file_size,
        };
        let scanned = scan::scan_project(&project_root, &scan_options)?;

        let mut stats = BuildStats {
            scanned: scanned.files.len() + scanned.skipped,
            skipped: scanned.skipped,
            ..Default::default()
        };

        let results = parse_files(&project_root, &scanned.files, cancel);
        if cancel.is_cancelled() {
            eprintln!("codegraph: build {analysis_id} cancelled, nothing persisted");
            stats.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(BuildOutcome {
                graph: CodeGraph {
                    analysis_id: analysis_id.to_string(),
                    nodes: Vec::new(),
                    edges: Vec::new(),
                    stats: GraphStats::tabulate(&[], &[]),
                },
                stats,
            });
        }
        stats.parsed = results.len();
        for result in &results {
            for err in &result.errors {
                eprintln!("codegraph: parse: {err}");
            }
            if !result.errors.is_empty() {
                stats.parse_errors += 1;
            }
        }

        // Step 4: persist every extracted element as a node in one batch.
        let by_path: HashMap<&str, &scan::ScannedFile> = scanned
            .files
            .iter()
            .map(|file| (file.rel_path.as_str(), file))
            .collect();
        let mut node_inputs = Vec::new();
        for result in &results {
            let scanned_file = by_path.get(result.file.as_str());
            for element in &result.elements {
                let mut metadata = element.metadata.clone();
                metadata.insert("language".to_string(), json!(result.language));
                if element.kind == NodeKind::Module {
                    if let Some(file) = scanned_file {
                        metadata.insert("hash".to_string(), json!(file.hash));
                        metadata.insert("size".to_string(), json!(file.size));
                    }
                }
                node_inputs.push(NodeInput {
                    kind: element.kind,
                    name: element.name.clone(),
                    file: Some(result.file.clone()),
                    line_start: Some(element.line_start),
                    line_end: Some(element.line_end),
                    metadata: Value::Object(metadata),
                });
            }
        }
        let node_ids = self.store.insert_nodes(analysis_id, &node_inputs)?;

        // Step 5: name index with candidate lists, in declaration order.
        let index = NameIndex::new(&node_inputs);

        // Step 6: resolve symbolic edges against the index.
        let mut placeholder_inputs: Vec<NodeInput> = Vec::new();
        let mut placeholder_by_ref: HashMap<String, usize> = HashMap::new();
        let mut pending: Vec<PendingEdge> = Vec::new();
        for result in &results {
            for edge in &result.edges {
                let Some(source) = index.resolve(&edge.source_ref, &result.file) else {
                    stats.dropped_edges += 1;
                    eprintln!(
                        "codegraph: dropping {} edge {} -> {} (unresolved source)",
                        edge.kind.as_str(),
                        edge.source_ref,
                        edge.target_ref
                    );
                    continue;
                };
                let mut metadata = edge.metadata.clone();
                let target = match index.resolve(&edge.target_ref, &result.file) {
                    Some(target) => PendingTarget::Node(target),
                    None => {
                        metadata.insert("unresolved_target".to_string(), json!(true));
                        let slot = *placeholder_by_ref
                            .entry(edge.target_ref.clone())
                            .or_insert_with(|| {
                                placeholder_inputs.push(external_placeholder(&edge.target_ref));
                                placeholder_inputs.len() - 1
                            });
                        PendingTarget::Placeholder(slot)
                    }
                };
                pending.push(PendingEdge {
                    source,
                    target,
                    kind: edge.kind,
                    metadata,
                });
            }
        }
        let placeholder_ids = self.store.insert_nodes(analysis_id, &placeholder_inputs)?;
        stats.placeholders = placeholder_ids.len();

        // Step 7: persist edges in one batch.
        let edge_inputs: Vec<EdgeInput> = pending
            .into_iter()
            .map(|edge| EdgeInput {
                source_id: node_ids[edge.source],
                target_id: match edge.target {
                    PendingTarget::Node(i) => node_ids[i],
                    PendingTarget::Placeholder(p) => placeholder_ids[p],
                },
                kind: edge.kind,
                metadata: Value::Object(edge.metadata),
            })
            .collect();
        self.store.insert_edges(analysis_id, &edge_inputs)?;

        let nodes = self.store.load_nodes(analysis_id)?;
        let edges = self.store.load_edges(analysis_id)?;
        stats.nodes = nodes.len();
        stats.edges = edges.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        eprintln!(
            "codegraph: build {analysis_id}: scanned={} parsed={} skipped={} errors={} \
             nodes={} edges={} placeholders={} dropped={} ({} ms)",
            stats.scanned,
            stats.parsed,
            stats.skipped,
            stats.parse_errors,
            stats.nodes,
            stats.edges,
            stats.placeholders,
            stats.dropped_edges,
            stats.duration_ms
        );

        let graph_stats = GraphStats::tabulate(&nodes, &edges);
        Ok(BuildOutcome {
            graph: CodeGraph {
                analysis_id: analysis_id.to_string(),
                nodes,
                edges,
                stats: graph_stats,
            },
            stats,
        })
    }
}

/// Parse admitted files on a bounded pool, one dispatcher per worker
/// (tree-sitter parsers are Send but not shareable). Results come back in
/// scan order regardless of which worker handled them.
fn parse_files(
    project_root: &std::path::Path,
    files: &[scan::ScannedFile],
    cancel: &CancelToken,
) -> Vec<ExtractionResult> {
    if files.is_empty() {
        return Vec::new();
    }
    let workers = Config::get().effective_workers().min(files.len());
    let queue: Mutex<VecDeque<usize>> = Mutex::new((0..files.len()).collect());
    let collected: Mutex<Vec<(usize, ExtractionResult)>> =
        Mutex::new(Vec::with_capacity(files.len()));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let queue = &queue;
            let collected = &collected;
            scope.spawn(move || {
                let mut dispatcher = match ParserDispatcher::new() {
                    Ok(dispatcher) => dispatcher,
                    Err(err) => {
                        eprintln!("codegraph: parser init failed: {err}");
                        return;
                    }
                };
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let next = queue.lock().unwrap().pop_front();
                    let Some(idx) = next else {
                        return;
                    };
                    let file = &files[idx];
                    let result = match crate::util::read_to_string(&file.abs_path) {
                        Ok(content) => {
                            dispatcher.parse_file(project_root, &file.rel_path, &content)
                        }
                        Err(err) => {
                            let mut result =
                                ExtractionResult::empty(&file.rel_path, &file.language);
                            result.errors.push(format!("read {}: {err}", file.rel_path));
                            result
                        }
                    };
                    collected.lock().unwrap().push((idx, result));
                }
            });
        }
    });

    let mut collected = collected.into_inner().unwrap();
    collected.sort_by_key(|(idx, _)| *idx);
    collected.into_iter().map(|(_, result)| result).collect()
}

enum PendingTarget {
    Node(usize),
    Placeholder(usize),
}

struct PendingEdge {
    source: usize,
    target: PendingTarget,
    kind: EdgeKind,
    metadata: Map<String, Value>,
}

fn external_placeholder(target_ref: &str) -> NodeInput {
    let (_, name) = parser::split_ref(target_ref);
    NodeInput {
        kind: NodeKind::Module,
        name: name.to_string(),
        file: None,
        line_start: None,
        line_end: None,
        metadata: json!({ "external": true, "reference": target_ref }),
    }
}

/// Candidate-list name index. Keys are bare names and `file:name`
/// composites; candidates keep declaration order so ambiguous lookups
/// tie-break deterministically (same file first, else first declared).
struct NameIndex<'a> {
    by_composite: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, Vec<usize>>,
    inputs: &'a [NodeInput],
}

impl<'a> NameIndex<'a> {
    fn new(inputs: &'a [NodeInput]) -> Self {
        let mut by_composite: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, input) in inputs.iter().enumerate() {
            if let Some(file) = &input.file {
                by_composite
                    .entry(parser::composite_ref(file, &input.name))
                    .or_default()
                    .push(i);
            }
            by_name.entry(input.name.clone()).or_default().push(i);
        }
        Self {
            by_composite,
            by_name,
            inputs,
        }
    }

    fn resolve(&self, raw: &str, current_file: &str) -> Option<usize> {
        let (file, _) = parser::split_ref(raw);
        if file.is_some() {
            return self.pick(self.by_composite.get(raw)?, current_file);
        }
        if let Some(candidates) = self
            .by_composite
            .get(&parser::composite_ref(current_file, raw))
        {
            return self.pick(candidates, current_file);
        }
        self.pick(self.by_name.get(raw)?, current_file)
    }

    fn pick(&self, candidates: &[usize], current_file: &str) -> Option<usize> {
        // Import/export markers share names with the declarations they
        // mirror; edges should land on the declaration when one exists.
        let declared = |i: usize| {
            !matches!(self.inputs[i].kind, NodeKind::Import | NodeKind::Export)
        };
        let same_file =
            |i: usize| self.inputs[i].file.as_deref() == Some(current_file);
        candidates
            .iter()
            .copied()
            .find(|&i| declared(i) && same_file(i))
            .or_else(|| candidates.iter().copied().find(|&i| declared(i)))
            .or_else(|| candidates.iter().copied().find(|&i| same_file(i)))
            .or_else(|| candidates.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, file: &str) -> NodeInput {
        NodeInput {
            kind: NodeKind::Function,
            name: name.to_string(),
            file: Some(file.to_string()),
            line_start: Some(1),
            line_end: Some(1),
            metadata: json!({}),
        }
    }

    #[test]
    fn index_prefers_same_file_then_first_declared() {
        let inputs = vec![input("helper", "a.js"), input("helper", "b.js")];
        let index = NameIndex::new(&inputs);
        assert_eq!(index.resolve("helper", "b.js"), Some(1));
        assert_eq!(index.resolve("helper", "c.js"), Some(0));
        assert_eq!(index.resolve("a.js:helper", "c.js"), Some(0));
        assert_eq!(index.resolve("missing", "a.js"), None);
    }

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }
}
