use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "codegraph",
    version,
    about = "Knowledge graph engine for code analysis",
    after_help = r#"Examples:
  codegraph build --project . --analysis main
  codegraph impact --analysis main --file src/auth.js --function login
  codegraph dead-code --analysis main
  codegraph chain --analysis main --node-id 42
  codegraph findings-import --analysis main --path findings.json
  codegraph overview --analysis main
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build (or rebuild) the graph for one analysis.
    Build {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
        /// Include globs; everything parseable when omitted.
        #[arg(long = "include", value_delimiter = ',')]
        include: Vec<String>,
        /// Exclude globs, on top of the fixed default excludes.
        #[arg(long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,
        /// Override the configured file cap for this build.
        #[arg(long)]
        max_files: Option<usize>,
        /// Override the configured per-file size cap in bytes.
        #[arg(long)]
        max_file_size: Option<u64>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Report who depends on a file (or one function in it).
    Impact {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
        /// Target file, relative to the project root.
        #[arg(long)]
        file: String,
        /// Narrow the target to one function in the file.
        #[arg(long)]
        function: Option<String>,
        #[arg(long, default_value_t = crate::impact::DEFAULT_IMPACT_DEPTH)]
        max_depth: usize,
    },
    /// List declarations nothing references.
    DeadCode {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
    },
    /// Trace what one node depends on.
    Chain {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
        #[arg(long)]
        node_id: i64,
        #[arg(long, default_value_t = crate::impact::DEFAULT_CHAIN_DEPTH)]
        max_depth: usize,
    },
    /// Import a JSON findings feed for vulnerability propagation.
    FindingsImport {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
        #[arg(long)]
        path: PathBuf,
    },
    /// Print node/edge tallies for one analysis.
    Overview {
        #[arg(long, default_value = ".")]
        project: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value = "default")]
        analysis: String,
    },
}
