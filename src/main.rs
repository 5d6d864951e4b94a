use anyhow::Result;
use clap::Parser;
use codegraph::builder::{BuildOptions, GraphBuilder};
use codegraph::impact::ImpactAnalyzer;
use codegraph::model::Finding;
use codegraph::store::{FindingStore, GraphStore, SqliteStore};
use codegraph::{cli, model};
use serde_json::json;
use std::path::PathBuf;

fn default_db_path(project: &PathBuf) -> PathBuf {
    project.join(".codegraph").join("codegraph.sqlite")
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Build {
            project,
            db,
            analysis,
            include,
            exclude,
            max_files,
            max_file_size,
            no_ignore,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let store = SqliteStore::open(&db_path)?;
            let mut options = BuildOptions::new(analysis, project);
            options.include = include;
            options.exclude = exclude;
            options.max_files = max_files;
            options.max_file_size = max_file_size;
            options.no_ignore = no_ignore;
            let outcome = GraphBuilder::new(&store).build(&options)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "analysis_id": outcome.graph.analysis_id,
                    "stats": outcome.graph.stats,
                    "build": outcome.stats,
                }))?
            );
            Ok(())
        }
        cli::Command::Impact {
            project,
            db,
            analysis,
            file,
            function,
            max_depth,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let store = SqliteStore::open(&db_path)?;
            let mut analyzer = ImpactAnalyzer::new(&store, &store);
            analyzer.load_graph(&analysis)?;
            let report =
                analyzer.analyze_file_impact(&analysis, &file, function.as_deref(), max_depth)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        cli::Command::DeadCode {
            project,
            db,
            analysis,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let store = SqliteStore::open(&db_path)?;
            let mut analyzer = ImpactAnalyzer::new(&store, &store);
            analyzer.load_graph(&analysis)?;
            let dead = analyzer.find_dead_code(&analysis)?;
            println!("{}", serde_json::to_string_pretty(&dead)?);
            Ok(())
        }
        cli::Command::Chain {
            project,
            db,
            analysis,
            node_id,
            max_depth,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let store = SqliteStore::open(&db_path)?;
            let mut analyzer = ImpactAnalyzer::new(&store, &store);
            analyzer.load_graph(&analysis)?;
            let chain = analyzer.dependency_chain(&analysis, node_id, max_depth)?;
            println!("{}", serde_json::to_string_pretty(&chain)?);
            Ok(())
        }
        cli::Command::FindingsImport {
            project,
            db,
            analysis,
            path,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let abs = if path.is_absolute() {
                path
            } else {
                project.join(path)
            };
            let content = std::fs::read_to_string(&abs)?;
            let findings: Vec<Finding> = serde_json::from_str(&content)?;
            let store = SqliteStore::open(&db_path)?;
            let imported = store.insert_findings(&analysis, &findings)?;
            println!("{}", json!({ "imported": imported }));
            Ok(())
        }
        cli::Command::Overview {
            project,
            db,
            analysis,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&project));
            let store = SqliteStore::open(&db_path)?;
            let nodes = store.load_nodes(&analysis)?;
            let edges = store.load_edges(&analysis)?;
            let stats = model::GraphStats::tabulate(&nodes, &edges);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "analysis_id": analysis,
                    "stats": stats,
                }))?
            );
            Ok(())
        }
    }
}
