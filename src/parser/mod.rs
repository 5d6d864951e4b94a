use crate::model::{EdgeKind, NodeKind};
use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

pub mod javascript;
pub mod python;

/// A declaration pulled out of one file, before durable IDs exist.
#[derive(Debug, Clone)]
pub struct ExtractedElement {
    pub kind: NodeKind,
    pub name: String,
    pub line_start: i64,
    pub line_end: i64,
    pub metadata: Map<String, Value>,
}

/// A symbolic relationship reference. Refs are bare names or `file:name`
/// composites, never graph IDs; the graph builder owns resolution.
#[derive(Debug, Clone)]
pub struct ExtractedEdge {
    pub kind: EdgeKind,
    pub source_ref: String,
    pub target_ref: String,
    pub metadata: Map<String, Value>,
}

/// Per-file extraction output. Errors accumulate here instead of failing the
/// build: one bad file never aborts a pass.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub file: String,
    pub language: String,
    pub elements: Vec<ExtractedElement>,
    pub edges: Vec<ExtractedEdge>,
    pub errors: Vec<String>,
}

impl ExtractionResult {
    pub fn empty(file: &str, language: &str) -> Self {
        Self {
            file: file.to_string(),
            language: language.to_string(),
            ..Default::default()
        }
    }
}

/// Build a `file:name` composite reference.
pub fn composite_ref(file: &str, name: &str) -> String {
    format!("{file}:{name}")
}

/// Split a composite reference back into `(file, name)`. Bare names yield
/// `(None, name)`. Splits on the last colon so Windows-ish prefixes survive.
pub fn split_ref(raw: &str) -> (Option<&str>, &str) {
    match raw.rsplit_once(':') {
        Some((file, name)) if !file.is_empty() && !name.is_empty() => (Some(file), name),
        _ => (None, raw),
    }
}

/// Capability object for one language: turn source text into elements plus
/// unresolved edges, and rewrite relative import refs against the tree.
pub trait LanguageExtractor {
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractionResult>;

    /// Rewrite relative `imports` targets to `file:name` composites when the
    /// target file exists in the project. Bare specifiers stay bare and
    /// become external placeholders during resolution.
    fn resolve_imports(&self, project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]);
}

struct LanguageEntry {
    language: &'static str,
    extensions: &'static [&'static str],
}

static LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        language: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageEntry {
        language: "typescript",
        extensions: &["ts", "mts", "cts"],
    },
    LanguageEntry {
        language: "tsx",
        extensions: &["tsx"],
    },
    LanguageEntry {
        language: "python",
        extensions: &["py", "pyi"],
    },
];

pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension().and_then(|ext| ext.to_str())?;
    for entry in LANGUAGES {
        if entry.extensions.iter().any(|candidate| *candidate == ext) {
            return Some(entry.language);
        }
    }
    None
}

/// Maps file extension to extractor and runs one file end-to-end. The table
/// is fixed at construction; there is no runtime registry.
pub struct ParserDispatcher {
    javascript: javascript::JavascriptExtractor,
    typescript: javascript::TypescriptExtractor,
    tsx: javascript::TsxExtractor,
    python: python::PythonExtractor,
}

impl ParserDispatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            javascript: javascript::JavascriptExtractor::new()?,
            typescript: javascript::TypescriptExtractor::new()?,
            tsx: javascript::TsxExtractor::new()?,
            python: python::PythonExtractor::new()?,
        })
    }

    /// Parse one file into elements and unresolved edges. Never returns Err
    /// for parse-level problems: an unknown extension or a failed extraction
    /// comes back as an `errors` entry on an otherwise usable result.
    pub fn parse_file(
        &mut self,
        project_root: &Path,
        rel_path: &str,
        content: &str,
    ) -> ExtractionResult {
        let Some(language) = language_for_path(rel_path) else {
            let mut result = ExtractionResult::empty(rel_path, "unknown");
            result
                .errors
                .push(format!("unsupported extension: {rel_path}"));
            return result;
        };

        let extractor: &mut dyn LanguageExtractor = match language {
            "javascript" => &mut self.javascript,
            "typescript" => &mut self.typescript,
            "tsx" => &mut self.tsx,
            "python" => &mut self.python,
            _ => unreachable!("language table and dispatch table diverged"),
        };

        let mut result = match extractor.extract(rel_path, content) {
            Ok(result) => result,
            Err(err) => {
                let mut result = ExtractionResult::empty(rel_path, language);
                result.errors.push(format!("extract {rel_path}: {err}"));
                return result;
            }
        };
        extractor.resolve_imports(project_root, rel_path, &mut result.edges);
        dedupe_elements(&mut result.elements);
        result
    }
}

/// Overlapping AST shapes (an arrow function also matching a generic
/// assignment pattern) can produce the same declaration twice.
fn dedupe_elements(elements: &mut Vec<ExtractedElement>) {
    let mut seen: HashSet<(NodeKind, String, i64)> = HashSet::new();
    elements.retain(|el| seen.insert((el.kind, el.name.clone(), el.line_start)));
}
