use crate::config::Config;
use crate::parser;
use anyhow::{Context, Result};
use blake3::Hasher;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never worth parsing, applied on top of gitignore rules.
static DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".pytest_cache",
    "dist",
    "build",
    ".next",
    "coverage",
    ".venv",
    "venv",
    "vendor",
    ".codegraph",
];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub hash: String,
    pub size: i64,
    pub language: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub no_ignore: bool,
    /// Caller include globs; empty means everything parseable.
    pub include: Vec<String>,
    /// Caller exclude globs, unioned with the fixed default set.
    pub exclude: Vec<String>,
    /// Overrides for the configured admission limits.
    pub max_files: Option<usize>,
    pub max_file_size: Option<u64>,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    /// Files passed over for size or read problems.
    pub skipped: usize,
    /// True when the walk stopped at the max_files cap.
    pub truncated: bool,
}

/// Walk the project tree and collect parseable source files. Results are
/// sorted by path so a rebuild over an unchanged tree is deterministic.
pub fn scan_project(project_root: &Path, options: &ScanOptions) -> Result<ScanOutcome> {
    let config = Config::get();
    let max_files = options.max_files.unwrap_or(config.max_files);
    let max_file_size = options.max_file_size.unwrap_or(config.max_file_size);
    let mut outcome = ScanOutcome::default();

    let mut builder = WalkBuilder::new(project_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    if !options.include.is_empty() || !options.exclude.is_empty() {
        let mut overrides = OverrideBuilder::new(project_root);
        for pattern in &options.include {
            overrides
                .add(pattern)
                .with_context(|| format!("bad include pattern: {pattern}"))?;
        }
        for pattern in &options.exclude {
            overrides
                .add(&format!("!{pattern}"))
                .with_context(|| format!("bad exclude pattern: {pattern}"))?;
        }
        builder.overrides(overrides.build()?);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_excluded_entry(entry))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                eprintln!("codegraph: walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let rel_path = match crate::util::normalize_rel_path(project_root, path) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let Some(language) = parser::language_for_path(&rel_path) else {
            continue;
        };

        if outcome.files.len() >= max_files {
            eprintln!(
                "codegraph: Warning: file cap reached ({max_files}), remaining files ignored"
            );
            outcome.truncated = true;
            break;
        }

        let metadata = match fs::metadata(path) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("codegraph: stat error {rel_path}: {err}");
                outcome.skipped += 1;
                continue;
            }
        };
        if metadata.len() > max_file_size {
            eprintln!(
                "codegraph: skipping large file ({} bytes): {rel_path}",
                metadata.len()
            );
            outcome.skipped += 1;
            continue;
        }

        let hash = match hash_file(path) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("codegraph: read error {rel_path}: {err}");
                outcome.skipped += 1;
                continue;
            }
        };
        outcome.files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            hash,
            size: metadata.len() as i64,
            language: language.to_string(),
        });
    }

    outcome.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(outcome)
}

fn is_excluded_entry(entry: &ignore::DirEntry) -> bool {
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
    is_dir && DEFAULT_EXCLUDES.iter().any(|dir| *dir == name)
}

fn hash_file(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Hasher::new();
    hasher.update(&data);
    Ok(hasher.finalize().to_hex().to_string())
}
