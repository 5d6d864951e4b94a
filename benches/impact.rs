use codegraph::builder::{BuildOptions, GraphBuilder};
use codegraph::impact::{DEFAULT_CHAIN_DEPTH, DEFAULT_IMPACT_DEPTH, ImpactAnalyzer};
use codegraph::model::NodeKind;
use codegraph::store::{GraphStore, SqliteStore};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::fmt::Write as _;
use std::fs;

/// Synthetic project: a core module plus N layers that each call into the
/// previous layer, so impact queries have real depth to walk.
fn generate_project(root: &std::path::Path, layers: usize) {
    fs::write(root.join("core.js"), "export function core() {}\n").unwrap();
    for i in 0..layers {
        let mut source = String::new();
        if i == 0 {
            source.push_str("import { core } from './core';\n");
            writeln!(source, "export function layer0() {{ core(); }}").unwrap();
        } else {
            writeln!(source, "import {{ layer{} }} from './layer{}';", i - 1, i - 1).unwrap();
            writeln!(source, "export function layer{i}() {{ layer{}(); }}", i - 1).unwrap();
        }
        writeln!(source, "function helper{i}() {{ layer{i}(); }}").unwrap();
        fs::write(root.join(format!("layer{i}.js")), source).unwrap();
    }
}

fn setup(layers: usize) -> (tempfile::TempDir, tempfile::TempDir, SqliteStore) {
    let project = tempfile::tempdir().unwrap();
    generate_project(project.path(), layers);

    let db = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&db.path().join("bench.sqlite")).unwrap();
    let options = BuildOptions::new("bench", project.path());
    GraphBuilder::new(&store).build(&options).unwrap();
    (project, db, store)
}

fn bench_file_impact(c: &mut Criterion) {
    let (_project, _db, store) = setup(50);
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("bench").unwrap();

    c.bench_function("impact_core_depth5", |b| {
        b.iter(|| {
            let report = analyzer
                .analyze_file_impact(
                    black_box("bench"),
                    black_box("core.js"),
                    black_box(Some("core")),
                    black_box(DEFAULT_IMPACT_DEPTH),
                )
                .unwrap();
            black_box(report)
        })
    });

    let mut group = c.benchmark_group("impact_varying_depth");
    for depth in [1, 2, 5, 10] {
        group.bench_with_input(format!("depth_{depth}"), &depth, |b, &depth| {
            b.iter(|| {
                let report = analyzer
                    .analyze_file_impact(black_box("bench"), "core.js", Some("core"), depth)
                    .unwrap();
                black_box(report)
            })
        });
    }
    group.finish();
}

fn bench_dead_code(c: &mut Criterion) {
    let (_project, _db, store) = setup(50);
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("bench").unwrap();

    c.bench_function("dead_code_scan", |b| {
        b.iter(|| black_box(analyzer.find_dead_code(black_box("bench")).unwrap()))
    });
}

fn bench_dependency_chain(c: &mut Criterion) {
    let (_project, _db, store) = setup(50);
    let mut analyzer = ImpactAnalyzer::new(&store, &store);
    analyzer.load_graph("bench").unwrap();
    let deepest = store
        .load_nodes("bench")
        .unwrap()
        .into_iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "layer49")
        .unwrap();

    c.bench_function("chain_depth10", |b| {
        b.iter(|| {
            black_box(
                analyzer
                    .dependency_chain(black_box("bench"), deepest.id, DEFAULT_CHAIN_DEPTH)
                    .unwrap(),
            )
        })
    });
}

fn bench_load_graph(c: &mut Criterion) {
    let (_project, _db, store) = setup(50);

    c.bench_function("load_graph_snapshot", |b| {
        b.iter(|| {
            let mut analyzer = ImpactAnalyzer::new(&store, &store);
            analyzer.load_graph(black_box("bench")).unwrap();
            black_box(analyzer)
        })
    });
}

criterion_group!(
    benches,
    bench_file_impact,
    bench_dead_code,
    bench_dependency_chain,
    bench_load_graph,
);

criterion_main!(benches);
