use crate::model::{EdgeKind, NodeKind};
use crate::parser::{
    composite_ref, ExtractedEdge, ExtractedElement, ExtractionResult, LanguageExtractor,
};
use crate::util;
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tree_sitter::{Node, Parser};

const ENTRY_POINT_STEMS: &[&str] = &["__main__", "main", "index"];

#[derive(Clone)]
struct Context {
    file: String,
    module: String,
    scope: String,
    class_stack: Vec<String>,
    fn_depth: usize,
}

pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for PythonExtractor {
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractionResult> {
        let mut output = ExtractionResult::empty(rel_path, "python");
        let module = util::file_stem(rel_path);
        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                output
                    .elements
                    .push(module_element(&module, (1, line_count(source))));
                output.errors.push(format!("parse failed: {rel_path}"));
                return Ok(output);
            }
        };
        let root = tree.root_node();
        output.elements.push(module_element(&module, span(root)));
        if root.has_error() {
            output.errors.push(format!("syntax errors in {rel_path}"));
        }

        let exports = collect_dunder_all(root, source);
        let ctx = Context {
            file: rel_path.to_string(),
            module: module.clone(),
            scope: module,
            class_stack: Vec::new(),
            fn_depth: 0,
        };
        walk_node(root, &ctx, source, &exports, &mut output);
        Ok(output)
    }

    fn resolve_imports(&self, project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
        resolve_import_refs(project_root, rel_path, edges);
    }
}

fn module_element(module: &str, span: (i64, i64)) -> ExtractedElement {
    let mut metadata = Map::new();
    metadata.insert(
        "entry_point".to_string(),
        json!(ENTRY_POINT_STEMS.contains(&module)),
    );
    ExtractedElement {
        kind: NodeKind::Module,
        name: module.to_string(),
        line_start: span.0,
        line_end: span.1,
        metadata,
    }
}

/// Names listed in a top-level `__all__` assignment count as exported.
fn collect_dunder_all(root: Node<'_>, source: &str) -> HashSet<String> {
    let mut exports = HashSet::new();
    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
            continue;
        };
        let Some(left) = assignment.child_by_field_name("left") else {
            continue;
        };
        if node_text(left, source) != "__all__" {
            continue;
        }
        let Some(right) = assignment.child_by_field_name("right") else {
            continue;
        };
        let mut list_cursor = right.walk();
        for item in right.named_children(&mut list_cursor) {
            if item.kind() == "string" {
                if let Some(name) = unquote_string_literal(&node_text(item, source)) {
                    exports.insert(name);
                }
            }
        }
    }
    exports
}

fn walk_node(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    exports: &HashSet<String>,
    output: &mut ExtractionResult,
) {
    if node.kind() == "decorated_definition" {
        let decorators = decorator_names(node, source);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => {
                    handle_function(child, ctx, source, exports, &decorators, output);
                }
                "class_definition" => {
                    handle_class(child, ctx, source, exports, &decorators, output);
                }
                _ => {}
            }
        }
        return;
    }
    if node.kind() == "call" {
        handle_call(node, ctx, source, output);
    }
    match node.kind() {
        "function_definition" => {
            handle_function(node, ctx, source, exports, &[], output);
            return;
        }
        "class_definition" => {
            handle_class(node, ctx, source, exports, &[], output);
            return;
        }
        "import_statement" => {
            handle_import(node, ctx, source, output);
            return;
        }
        "import_from_statement" => {
            handle_import_from(node, ctx, source, output);
            return;
        }
        "expression_statement" => {
            handle_assignment(node, ctx, source, exports, output);
            // Fall through for calls inside the expression.
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, exports, output);
    }
}

fn decorator_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let raw = node_text(child, source);
        let name = raw
            .trim_start_matches('@')
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if !name.is_empty() {
            out.push(name);
        }
    }
    out
}

fn handle_function(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    exports: &HashSet<String>,
    decorators: &[String],
    output: &mut ExtractionResult,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    if ctx.fn_depth == 0 {
        let (line_start, line_end) = span(node);
        let mut metadata = Map::new();
        metadata.insert(
            "async".to_string(),
            json!(node_text(node, source).starts_with("async ")),
        );
        if !decorators.is_empty() {
            metadata.insert("decorators".to_string(), json!(decorators));
        }
        if let Some(class) = ctx.class_stack.last() {
            metadata.insert("method".to_string(), json!(true));
            metadata.insert("class".to_string(), json!(class));
        }
        metadata.insert("exported".to_string(), json!(exports.contains(&name)));
        output.elements.push(ExtractedElement {
            kind: NodeKind::Function,
            name: name.clone(),
            line_start,
            line_end,
            metadata,
        });
    }
    if let Some(body) = node.child_by_field_name("body") {
        let mut next_ctx = ctx.clone();
        next_ctx.fn_depth += 1;
        // Nested defs keep the enclosing scope so their calls attribute to
        // a declaration that actually exists in the graph.
        if ctx.fn_depth == 0 {
            next_ctx.scope = name;
        }
        walk_node(body, &next_ctx, source, exports, output);
    }
}

fn handle_class(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    exports: &HashSet<String>,
    decorators: &[String],
    output: &mut ExtractionResult,
) {
    if ctx.fn_depth > 0 {
        return;
    }
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let (line_start, line_end) = span(node);
    let mut superclasses = Vec::new();
    if let Some(args) = node.child_by_field_name("superclasses") {
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            if child.kind() == "keyword_argument" {
                continue;
            }
            let base = node_text(child, source);
            if !base.is_empty() {
                superclasses.push(base);
            }
        }
    }

    let mut metadata = Map::new();
    if !superclasses.is_empty() {
        metadata.insert("superclasses".to_string(), json!(superclasses));
    }
    if !decorators.is_empty() {
        metadata.insert("decorators".to_string(), json!(decorators));
    }
    metadata.insert("exported".to_string(), json!(exports.contains(&name)));
    output.elements.push(ExtractedElement {
        kind: NodeKind::Class,
        name: name.clone(),
        line_start,
        line_end,
        metadata,
    });

    for base in &superclasses {
        // The superclass name is recorded textually; dotted bases resolve
        // by their rightmost segment like call targets do.
        let target = base.rsplit('.').next().unwrap_or(base).to_string();
        output.edges.push(ExtractedEdge {
            kind: EdgeKind::Inherits,
            source_ref: composite_ref(&ctx.file, &name),
            target_ref: target,
            metadata: Map::new(),
        });
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut next_ctx = ctx.clone();
        next_ctx.class_stack.push(name.clone());
        next_ctx.scope = name;
        walk_node(body, &next_ctx, source, exports, output);
    }
}

fn handle_import(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let (line_start, line_end) = span(node);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let (target, alias) = match child.kind() {
            "dotted_name" => (node_text(child, source), None),
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source));
                (name, alias)
            }
            _ => continue,
        };
        if target.is_empty() {
            continue;
        }
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!(target));
        metadata.insert("names".to_string(), json!(Vec::<String>::new()));
        metadata.insert("default".to_string(), json!(false));
        metadata.insert("namespace".to_string(), json!(true));
        if let Some(alias) = alias {
            metadata.insert("alias".to_string(), json!(alias));
        }
        output.elements.push(ExtractedElement {
            kind: NodeKind::Import,
            name: target.clone(),
            line_start,
            line_end,
            metadata,
        });
        output.edges.push(ExtractedEdge {
            kind: EdgeKind::Imports,
            source_ref: composite_ref(&ctx.file, &ctx.module),
            target_ref: target,
            metadata: Map::new(),
        });
    }
}

fn handle_import_from(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = node_text(module_node, source);
    if module.is_empty() {
        return;
    }
    let (line_start, line_end) = span(node);
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.id() == module_node.id() {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => names.push(node_text(child, source)),
            "aliased_import" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    names.push(node_text(name_node, source));
                }
            }
            "wildcard_import" => names.push("*".to_string()),
            _ => {}
        }
    }

    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!(module));
    metadata.insert("names".to_string(), json!(names));
    metadata.insert("default".to_string(), json!(false));
    metadata.insert("namespace".to_string(), json!(false));
    metadata.insert("from_import".to_string(), json!(true));
    output.elements.push(ExtractedElement {
        kind: NodeKind::Import,
        name: module.clone(),
        line_start,
        line_end,
        metadata,
    });
    output.edges.push(ExtractedEdge {
        kind: EdgeKind::Imports,
        source_ref: composite_ref(&ctx.file, &ctx.module),
        target_ref: module,
        metadata: Map::new(),
    });
}

fn handle_assignment(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    exports: &HashSet<String>,
    output: &mut ExtractionResult,
) {
    if ctx.fn_depth > 0 || !ctx.class_stack.is_empty() {
        return;
    }
    let Some(assignment) = node.named_child(0).filter(|n| n.kind() == "assignment") else {
        return;
    };
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = node_text(left, source);
    if name.is_empty() || name == "__all__" {
        return;
    }
    let (line_start, line_end) = span(assignment);
    let mut metadata = Map::new();
    metadata.insert("exported".to_string(), json!(exports.contains(&name)));
    output.elements.push(ExtractedElement {
        kind: NodeKind::Variable,
        name,
        line_start,
        line_end,
        metadata,
    });
}

fn handle_call(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let callee = match function.kind() {
        "identifier" => node_text(function, source),
        "attribute" => function
            .child_by_field_name("attribute")
            .map(|attr| node_text(attr, source))
            .unwrap_or_default(),
        _ => return,
    };
    if callee.is_empty() {
        return;
    }
    let mut metadata = Map::new();
    metadata.insert("line".to_string(), json!(span(node).0));
    output.edges.push(ExtractedEdge {
        kind: EdgeKind::Calls,
        source_ref: composite_ref(&ctx.file, &ctx.scope),
        target_ref: callee,
        metadata,
    });
}

/// Rewrite dotted imports to `file:name` composites when the module resolves
/// inside the project (`pkg/mod.py` or `pkg/__init__.py`).
pub fn resolve_import_refs(project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
    for edge in edges.iter_mut() {
        if edge.kind != EdgeKind::Imports {
            continue;
        }
        let target = edge.target_ref.trim().to_string();
        let Some(dst_rel) = resolve_module_to_file(project_root, rel_path, &target) else {
            continue;
        };
        edge.metadata
            .insert("specifier".to_string(), Value::String(target));
        edge.metadata
            .insert("resolved_path".to_string(), json!(dst_rel));
        edge.target_ref = composite_ref(&dst_rel, &util::file_stem(&dst_rel));
    }
}

fn resolve_module_to_file(project_root: &Path, rel_path: &str, module: &str) -> Option<String> {
    if module.is_empty() || module.contains('*') {
        return None;
    }
    let leading_dots = module.chars().take_while(|ch| *ch == '.').count();
    let remainder = &module[leading_dots..];
    let segments: Vec<&str> = remainder.split('.').filter(|s| !s.is_empty()).collect();

    let mut bases: Vec<Vec<String>> = Vec::new();
    if leading_dots > 0 {
        // Relative import: climb from the file's package.
        let mut package: Vec<String> = Path::new(rel_path)
            .parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| c.as_os_str().to_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        for _ in 1..leading_dots {
            package.pop()?;
        }
        bases.push(package);
    } else {
        // Absolute: probe the project root and the file's own package.
        bases.push(Vec::new());
        if let Some(parent) = Path::new(rel_path).parent() {
            let package: Vec<String> = parent
                .components()
                .filter_map(|c| c.as_os_str().to_str().map(|s| s.to_string()))
                .collect();
            if !package.is_empty() {
                bases.push(package);
            }
        }
    }

    for base in bases {
        let mut parts = base;
        parts.extend(segments.iter().map(|s| s.to_string()));
        if parts.is_empty() {
            continue;
        }
        let joined = parts.join("/");
        let file_candidate = format!("{joined}.py");
        if project_root.join(&file_candidate).is_file() {
            return Some(file_candidate);
        }
        let init_candidate = format!("{joined}/__init__.py");
        if project_root.join(&init_candidate).is_file() {
            return Some(init_candidate);
        }
    }
    None
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' {
        let last = trimmed.chars().last()?;
        if last == first {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

fn span(node: Node<'_>) -> (i64, i64) {
    (
        node.start_position().row as i64 + 1,
        node.end_position().row as i64 + 1,
    )
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

fn line_count(source: &str) -> i64 {
    let count = source.lines().count();
    if count == 0 { 1 } else { count as i64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LanguageExtractor;

    #[test]
    fn dunder_all_marks_exported() {
        let source = "__all__ = [\"run\"]\n\ndef run():\n    pass\n\ndef helper():\n    pass\n";
        let mut extractor = PythonExtractor::new().unwrap();
        let result = extractor.extract("pkg/job.py", source).unwrap();
        let run = result.elements.iter().find(|el| el.name == "run").unwrap();
        let helper = result.elements.iter().find(|el| el.name == "helper").unwrap();
        assert_eq!(run.metadata.get("exported"), Some(&json!(true)));
        assert_eq!(helper.metadata.get("exported"), Some(&json!(false)));
    }

    #[test]
    fn main_module_is_entry_point() {
        let mut extractor = PythonExtractor::new().unwrap();
        let result = extractor.extract("main.py", "x = 1\n").unwrap();
        let module = result
            .elements
            .iter()
            .find(|el| el.kind == NodeKind::Module)
            .unwrap();
        assert_eq!(module.metadata.get("entry_point"), Some(&json!(true)));
    }
}
