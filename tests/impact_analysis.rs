use codegraph::builder::{BuildOptions, GraphBuilder};
use codegraph::impact::{DEFAULT_CHAIN_DEPTH, DEFAULT_IMPACT_DEPTH, ImpactAnalyzer};
use codegraph::model::{Finding, NodeKind, Severity};
use codegraph::store::{FindingStore, SqliteStore};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// a.js calls into b.js; c.js holds an unexported, unreferenced helper.
fn built_project() -> (tempfile::TempDir, tempfile::TempDir, SqliteStore) {
    let project = tempfile::tempdir().unwrap();
    write_file(
        project.path(),
        "a.js",
        "import { bar } from './b';\nexport function foo() { bar(); }\n",
    );
    write_file(project.path(), "b.js", "export function bar() {}\n");
    write_file(project.path(), "c.js", "function orphan() {}\n");

    let db = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&db.path().join("g.sqlite")).unwrap();
    let options = BuildOptions::new("it", project.path());
    GraphBuilder::new(&store).build(&options).unwrap();
    (project, db, store)
}

#[test]
fn function_impact_reports_calling_file() {
    let (_project, _db, store) = built_project();
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();

    let report = analyzer
        .analyze_file_impact("it", "b.js", Some("bar"), DEFAULT_IMPACT_DEPTH)
        .unwrap();
    let direct_files: Vec<&str> = report
        .direct_dependents
        .iter()
        .filter_map(|d| d.file.as_deref())
        .collect();
    assert_eq!(direct_files, vec!["a.js"]);
    assert!(report.impact_score > 0);
    assert!(report.impact_score <= 100);
    assert_eq!(report.affected_files, vec!["a.js"]);
}

#[test]
fn dependent_sets_are_disjoint_and_exclude_the_target() {
    let (_project, _db, store) = built_project();
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();

    let report = analyzer
        .analyze_file_impact("it", "b.js", None, DEFAULT_IMPACT_DEPTH)
        .unwrap();
    let direct: HashSet<i64> = report.direct_dependents.iter().map(|d| d.node_id).collect();
    let transitive: HashSet<i64> = report
        .transitive_dependents
        .iter()
        .map(|d| d.node_id)
        .collect();
    assert!(direct.is_disjoint(&transitive));
    assert!(!report.affected_files.contains(&"b.js".to_string()));
    for dependent in report
        .direct_dependents
        .iter()
        .chain(&report.transitive_dependents)
    {
        assert_ne!(dependent.file.as_deref(), Some("b.js"));
    }
}

#[test]
fn dead_code_finds_exactly_the_orphan() {
    let (_project, _db, store) = built_project();
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();

    let dead = analyzer.find_dead_code("it").unwrap();
    let functions: Vec<&str> = dead
        .iter()
        .filter(|n| n.kind == NodeKind::Function)
        .map(|n| n.name.as_str())
        .collect();
    assert_eq!(functions, vec!["orphan"]);
    for node in &dead {
        assert!(!node.is_exported());
        assert!(!matches!(
            node.kind,
            NodeKind::Module | NodeKind::Import | NodeKind::Export
        ));
    }
}

#[test]
fn dependency_chain_traces_forward_edges() {
    let (_project, _db, store) = built_project();
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();

    let graph = codegraph::store::GraphStore::load_nodes(&store, "it").unwrap();
    let foo = graph
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "foo")
        .unwrap();
    let chain = analyzer
        .dependency_chain("it", foo.id, DEFAULT_CHAIN_DEPTH)
        .unwrap();
    assert_eq!(chain, vec!["function:foo (a.js)", "function:bar (b.js)"]);
}

#[test]
fn critical_findings_annotate_the_impact_report() {
    let (_project, _db, store) = built_project();
    store
        .insert_findings(
            "it",
            &[Finding {
                severity: Severity::Critical,
                title: "command injection".to_string(),
                file: "b.js".to_string(),
            }],
        )
        .unwrap();

    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();
    let report = analyzer
        .analyze_file_impact("it", "b.js", None, DEFAULT_IMPACT_DEPTH)
        .unwrap();
    assert_eq!(report.vulnerability_propagation.len(), 1);
    let propagation = &report.vulnerability_propagation[0];
    assert_eq!(propagation.finding.title, "command injection");
    assert_eq!(propagation.path[0], "b.js");
    assert!(propagation.path.contains(&"a.js".to_string()));
    assert!(propagation.path.len() <= 6);
}

#[test]
fn findings_survive_a_rebuild() {
    let (project, _db, store) = built_project();
    store
        .insert_findings(
            "it",
            &[Finding {
                severity: Severity::Critical,
                title: "command injection".to_string(),
                file: "b.js".to_string(),
            }],
        )
        .unwrap();

    // The findings feed is imported separately; rebuilding the graph must
    // not wipe it.
    let options = BuildOptions::new("it", project.path());
    GraphBuilder::new(&store).build(&options).unwrap();
    assert_eq!(store.list_findings("it").unwrap().len(), 1);

    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();
    let report = analyzer
        .analyze_file_impact("it", "b.js", None, DEFAULT_IMPACT_DEPTH)
        .unwrap();
    assert_eq!(report.vulnerability_propagation.len(), 1);
}

#[test]
fn rebuilt_analysis_answers_queries_after_reload() {
    let (project, _db, store) = built_project();
    // Rebuild over the same tree, then reload the snapshot.
    let options = BuildOptions::new("it", project.path());
    GraphBuilder::new(&store).build(&options).unwrap();

    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("it").unwrap();
    let report = analyzer
        .analyze_file_impact("it", "b.js", Some("bar"), DEFAULT_IMPACT_DEPTH)
        .unwrap();
    assert_eq!(report.direct_dependents.len(), 1);
}
