use crate::model::{EdgeKind, NodeKind};
use crate::parser::{
    composite_ref, ExtractedEdge, ExtractedElement, ExtractionResult, LanguageExtractor,
};
use crate::util;
use anyhow::Result;
use serde_json::{json, Map};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};

const JS_TS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];
const ENTRY_POINT_STEMS: &[&str] = &["index", "main"];

#[derive(Clone)]
struct Context {
    file: String,
    module: String,
    /// Last-seen enclosing function or class; call edges attach here.
    scope: String,
    class_stack: Vec<String>,
    fn_depth: usize,
    exported: bool,
}

pub struct JavascriptExtractor {
    parser: Parser,
}

pub struct TypescriptExtractor {
    parser: Parser,
}

pub struct TsxExtractor {
    parser: Parser,
}

impl JavascriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_javascript::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl TypescriptExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl TsxExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_typescript::LANGUAGE_TSX;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl LanguageExtractor for JavascriptExtractor {
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractionResult> {
        extract_with_parser(&mut self.parser, "javascript", rel_path, source)
    }

    fn resolve_imports(&self, project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
        resolve_import_refs(project_root, rel_path, edges);
    }
}

impl LanguageExtractor for TypescriptExtractor {
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractionResult> {
        extract_with_parser(&mut self.parser, "typescript", rel_path, source)
    }

    fn resolve_imports(&self, project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
        resolve_import_refs(project_root, rel_path, edges);
    }
}

impl LanguageExtractor for TsxExtractor {
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractionResult> {
        extract_with_parser(&mut self.parser, "tsx", rel_path, source)
    }

    fn resolve_imports(&self, project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
        resolve_import_refs(project_root, rel_path, edges);
    }
}

/// Rewrite relative import specifiers to `file:name` composites when the
/// target file exists under the project root. Package imports stay bare.
pub fn resolve_import_refs(project_root: &Path, rel_path: &str, edges: &mut [ExtractedEdge]) {
    for edge in edges.iter_mut() {
        if edge.kind != EdgeKind::Imports {
            continue;
        }
        let target = edge.target_ref.trim();
        let Some(dst_rel) = resolve_import_path(project_root, rel_path, target) else {
            continue;
        };
        edge.metadata
            .insert("specifier".to_string(), json!(target));
        edge.metadata
            .insert("resolved_path".to_string(), json!(dst_rel));
        edge.target_ref = composite_ref(&dst_rel, &util::file_stem(&dst_rel));
    }
}

fn resolve_import_path(project_root: &Path, rel_path: &str, target: &str) -> Option<String> {
    let target = target
        .split(|ch| ch == '?' || ch == '#')
        .next()
        .unwrap_or(target)
        .trim();
    if target.is_empty() {
        return None;
    }
    let is_relative =
        target.starts_with("./") || target.starts_with("../") || target.starts_with('/');
    if !is_relative {
        return None;
    }
    let base_dir = Path::new(rel_path).parent().unwrap_or_else(|| Path::new(""));
    let rel = if target.starts_with('/') {
        PathBuf::from(target.trim_start_matches('/'))
    } else {
        let mut rel = PathBuf::from(base_dir);
        rel.push(target);
        rel
    };
    if rel.extension().is_some() {
        if project_root.join(&rel).is_file() {
            return Some(util::normalize_path(&rel));
        }
        return None;
    }
    for ext in JS_TS_EXTENSIONS {
        let candidate = rel.with_extension(ext);
        if project_root.join(&candidate).is_file() {
            return Some(util::normalize_path(&candidate));
        }
    }
    for ext in JS_TS_EXTENSIONS {
        let candidate = rel.join("index").with_extension(ext);
        if project_root.join(&candidate).is_file() {
            return Some(util::normalize_path(&candidate));
        }
    }
    None
}

fn extract_with_parser(
    parser: &mut Parser,
    language: &str,
    rel_path: &str,
    source: &str,
) -> Result<ExtractionResult> {
    let mut output = ExtractionResult::empty(rel_path, language);
    let module = util::file_stem(rel_path);

    let tree = match parser.parse(source, None) {
        Some(tree) => tree,
        None => {
            output.elements.push(module_element_fallback(&module, source));
            output.errors.push(format!("parse failed: {rel_path}"));
            return Ok(output);
        }
    };
    let root = tree.root_node();
    output
        .elements
        .push(module_element(&module, span(root), source));
    if root.has_error() {
        output.errors.push(format!("syntax errors in {rel_path}"));
    }

    let ctx = Context {
        file: rel_path.to_string(),
        module: module.clone(),
        scope: module,
        class_stack: Vec::new(),
        fn_depth: 0,
        exported: false,
    };
    walk_node(root, &ctx, source, &mut output);
    Ok(output)
}

fn module_element(module: &str, span: (i64, i64), _source: &str) -> ExtractedElement {
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

fn module_element_fallback(module: &str, source: &str) -> ExtractedElement {
    module_element(module, (1, line_count(source)), source)
}

fn walk_node(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    if node.kind() == "call_expression" || node.kind() == "new_expression" {
        handle_call(node, ctx, source, output);
    }
    if is_nested_function_node(node.kind()) && node.child_by_field_name("name").is_none() {
        // Anonymous function bodies get walked for calls with the current
        // scope unchanged, but declarations inside them are not top level.
        let mut next_ctx = ctx.clone();
        next_ctx.fn_depth += 1;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            walk_node(child, &next_ctx, source, output);
        }
        return;
    }
    match node.kind() {
        "class_declaration" | "abstract_class_declaration" => {
            handle_class(node, ctx, source, output);
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            handle_function(node, ctx, source, output);
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            handle_variable_declaration(node, ctx, source, output);
            return;
        }
        "import_statement" => {
            handle_import(node, ctx, source, output);
            return;
        }
        "export_statement" => {
            handle_export(node, ctx, source, output);
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, output);
    }
}

fn handle_class(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
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
    let heritage = class_heritage(node, source);

    let mut metadata = Map::new();
    metadata.insert("exported".to_string(), json!(ctx.exported));
    if !heritage.extends.is_empty() {
        metadata.insert("superclasses".to_string(), json!(heritage.extends));
    }
    if !heritage.implements.is_empty() {
        metadata.insert("interfaces".to_string(), json!(heritage.implements));
    }
    output.elements.push(ExtractedElement {
        kind: NodeKind::Class,
        name: name.clone(),
        line_start,
        line_end,
        metadata,
    });

    for superclass in &heritage.extends {
        output.edges.push(ExtractedEdge {
            kind: EdgeKind::Inherits,
            source_ref: composite_ref(&ctx.file, &name),
            target_ref: superclass.clone(),
            metadata: Map::new(),
        });
    }
    for interface in &heritage.implements {
        output.edges.push(ExtractedEdge {
            kind: EdgeKind::Implements,
            source_ref: composite_ref(&ctx.file, &name),
            target_ref: interface.clone(),
            metadata: Map::new(),
        });
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut next_ctx = ctx.clone();
        next_ctx.class_stack.push(name.clone());
        next_ctx.scope = name;
        next_ctx.exported = false;
        walk_class_body(body, &next_ctx, source, output);
    }
}

#[derive(Default)]
struct ClassHeritage {
    extends: Vec<String>,
    implements: Vec<String>,
}

fn class_heritage(node: Node<'_>, source: &str) -> ClassHeritage {
    let mut heritage = ClassHeritage::default();
    if let Some(super_node) = node.child_by_field_name("superclass") {
        let base = node_text(super_node, source);
        if !base.is_empty() {
            heritage.extends.push(base);
        }
    }
    // TS grammar nests extends/implements under class_heritage.
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut inner = child.walk();
        for clause in child.named_children(&mut inner) {
            let bucket = match clause.kind() {
                "extends_clause" => &mut heritage.extends,
                "implements_clause" => &mut heritage.implements,
                _ => {
                    // JS grammar puts the bare superclass expression here.
                    let raw = node_text(clause, source);
                    if !raw.is_empty() && !heritage.extends.contains(&raw) {
                        heritage.extends.push(raw);
                    }
                    continue;
                }
            };
            let mut clause_cursor = clause.walk();
            for target in clause.named_children(&mut clause_cursor) {
                if target.kind() == "type_arguments" {
                    continue;
                }
                let raw = node_text(target, source);
                if !raw.is_empty() && !bucket.contains(&raw) {
                    bucket.push(raw);
                }
            }
        }
    }
    heritage
}

fn walk_class_body(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "method_definition" {
            handle_method(child, ctx, source, output);
        }
    }
}

fn handle_method(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let (line_start, line_end) = span(node);
    let mut metadata = Map::new();
    metadata.insert("method".to_string(), json!(true));
    if let Some(class) = ctx.class_stack.last() {
        metadata.insert("class".to_string(), json!(class));
    }
    metadata.insert("async".to_string(), json!(has_leading_keyword(node, source, "async")));
    metadata.insert("exported".to_string(), json!(false));
    output.elements.push(ExtractedElement {
        kind: NodeKind::Function,
        name: name.clone(),
        line_start,
        line_end,
        metadata,
    });
    if let Some(body) = node.child_by_field_name("body") {
        let mut next_ctx = ctx.clone();
        next_ctx.fn_depth += 1;
        if ctx.fn_depth == 0 {
            next_ctx.scope = name;
        }
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_function(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
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
        metadata.insert("async".to_string(), json!(has_leading_keyword(node, source, "async")));
        metadata.insert(
            "generator".to_string(),
            json!(node.kind() == "generator_function_declaration"),
        );
        metadata.insert("exported".to_string(), json!(ctx.exported));
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
        // Nested functions keep the enclosing scope so their calls attach
        // to a declaration that exists in the graph.
        if ctx.fn_depth == 0 {
            next_ctx.scope = name;
        }
        next_ctx.exported = false;
        walk_node(body, &next_ctx, source, output);
    }
}

fn handle_variable_declaration(
    node: Node<'_>,
    ctx: &Context,
    source: &str,
    output: &mut ExtractionResult,
) {
    if !ctx.class_stack.is_empty() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = child.child_by_field_name("name") else {
            continue;
        };
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        let value = child.child_by_field_name("value");
        let is_function_value = value
            .map(|v| is_nested_function_node(v.kind()))
            .unwrap_or(false);
        let (line_start, line_end) = span(child);
        if is_function_value {
            // Arrow function assigned to an identifier counts as a function
            // declaration, not a variable.
            if ctx.fn_depth == 0 {
                let value = value.unwrap();
                let mut metadata = Map::new();
                metadata.insert("arrow".to_string(), json!(value.kind() == "arrow_function"));
                metadata.insert(
                    "async".to_string(),
                    json!(has_leading_keyword(value, source, "async")),
                );
                metadata.insert(
                    "generator".to_string(),
                    json!(value.kind() == "generator_function"),
                );
                metadata.insert("exported".to_string(), json!(ctx.exported));
                output.elements.push(ExtractedElement {
                    kind: NodeKind::Function,
                    name: name.clone(),
                    line_start,
                    line_end,
                    metadata,
                });
            }
            if let Some(body) = value.unwrap().child_by_field_name("body") {
                let mut next_ctx = ctx.clone();
                next_ctx.fn_depth += 1;
                if ctx.fn_depth == 0 {
                    next_ctx.scope = name.clone();
                }
                next_ctx.exported = false;
                walk_node(body, &next_ctx, source, output);
            }
            continue;
        }
        if ctx.fn_depth == 0 {
            let mut metadata = Map::new();
            metadata.insert("exported".to_string(), json!(ctx.exported));
            output.elements.push(ExtractedElement {
                kind: NodeKind::Variable,
                name,
                line_start,
                line_end,
                metadata,
            });
        }
        if let Some(value) = value {
            walk_node(value, ctx, source, output);
        }
    }
}

fn handle_import(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let raw = node_text(source_node, source);
    let specifier = unquote_string_literal(&raw).unwrap_or(raw);
    if specifier.is_empty() {
        return;
    }
    let (line_start, line_end) = span(node);
    let (names, default_import, namespace_import) = import_clause_names(node, source);

    let mut metadata = Map::new();
    metadata.insert("source".to_string(), json!(specifier));
    metadata.insert("names".to_string(), json!(names));
    metadata.insert("default".to_string(), json!(default_import));
    metadata.insert("namespace".to_string(), json!(namespace_import));
    output.elements.push(ExtractedElement {
        kind: NodeKind::Import,
        name: specifier.clone(),
        line_start,
        line_end,
        metadata,
    });

    output.edges.push(ExtractedEdge {
        kind: EdgeKind::Imports,
        source_ref: composite_ref(&ctx.file, &ctx.module),
        target_ref: specifier,
        metadata: Map::new(),
    });
}

fn import_clause_names(node: Node<'_>, source: &str) -> (Vec<String>, bool, bool) {
    let mut names = Vec::new();
    let mut default_import = false;
    let mut namespace_import = false;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.named_children(&mut clause_cursor) {
            match clause_child.kind() {
                "identifier" => {
                    default_import = true;
                    names.push(node_text(clause_child, source));
                }
                "namespace_import" => {
                    namespace_import = true;
                    let mut ns_cursor = clause_child.walk();
                    for ns_child in clause_child.named_children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            names.push(node_text(ns_child, source));
                        }
                    }
                }
                "named_imports" => {
                    let mut named_cursor = clause_child.walk();
                    for spec in clause_child.named_children(&mut named_cursor) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name_node) = spec.child_by_field_name("name") {
                                names.push(node_text(name_node, source));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    (names, default_import, namespace_import)
}

fn handle_export(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    // Re-exports (`export { x } from "./y"`) behave like imports too.
    if let Some(source_node) = node.child_by_field_name("source") {
        let raw = node_text(source_node, source);
        if let Some(specifier) = unquote_string_literal(&raw) {
            output.edges.push(ExtractedEdge {
                kind: EdgeKind::Imports,
                source_ref: composite_ref(&ctx.file, &ctx.module),
                target_ref: specifier,
                metadata: Map::new(),
            });
        }
    }

    if let Some(declaration) = node.child_by_field_name("declaration") {
        let mut next_ctx = ctx.clone();
        next_ctx.exported = true;
        walk_node(declaration, &next_ctx, source, output);
        for name in declaration_names(declaration, source) {
            push_export_element(name, span(node), output);
        }
        return;
    }

    // `export { a, b }` and `export default expr`.
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let mut clause_cursor = child.walk();
                for spec in child.named_children(&mut clause_cursor) {
                    if spec.kind() == "export_specifier" {
                        if let Some(name_node) = spec.child_by_field_name("name") {
                            push_export_element(node_text(name_node, source), span(node), output);
                        }
                    }
                }
            }
            "identifier" => {
                push_export_element(node_text(child, source), span(node), output);
            }
            _ => {}
        }
    }
}

fn push_export_element(name: String, span: (i64, i64), output: &mut ExtractionResult) {
    if name.is_empty() {
        return;
    }
    output.elements.push(ExtractedElement {
        kind: NodeKind::Export,
        name,
        line_start: span.0,
        line_end: span.1,
        metadata: Map::new(),
    });
}

fn declaration_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    match node.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                names.push(node_text(name_node, source));
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name_node) = child.child_by_field_name("name") {
                    if name_node.kind() == "identifier" {
                        names.push(node_text(name_node, source));
                    }
                }
            }
        }
        _ => {}
    }
    names
}

fn handle_call(node: Node<'_>, ctx: &Context, source: &str, output: &mut ExtractionResult) {
    let Some(target_node) = call_target_node(node) else {
        return;
    };

    // CommonJS require is an import, not a call.
    if node.kind() == "call_expression" && node_text(target_node, source) == "require" {
        if let Some(specifier) = first_string_argument(node, source) {
            output.edges.push(ExtractedEdge {
                kind: EdgeKind::Imports,
                source_ref: composite_ref(&ctx.file, &ctx.module),
                target_ref: specifier,
                metadata: Map::new(),
            });
            return;
        }
    }

    let Some(callee) = callee_name(target_node, source) else {
        return;
    };
    let mut metadata = Map::new();
    metadata.insert("line".to_string(), json!(span(node).0));
    if node.kind() == "new_expression" {
        metadata.insert("constructor".to_string(), json!(true));
    }
    output.edges.push(ExtractedEdge {
        kind: EdgeKind::Calls,
        source_ref: composite_ref(&ctx.file, &ctx.scope),
        target_ref: callee,
        metadata,
    });
}

fn call_target_node(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))
}

/// Member-expression calls resolve to the rightmost property name only;
/// there is no receiver typing.
fn callee_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => {
            let name = node_text(node, source);
            if name.is_empty() { None } else { Some(name) }
        }
        "member_expression" | "optional_member_expression" => {
            let prop = node.child_by_field_name("property")?;
            let name = node_text(prop, source);
            if name.is_empty() { None } else { Some(name) }
        }
        _ => None,
    }
}

fn first_string_argument(node: Node<'_>, source: &str) -> Option<String> {
    let args = node.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if child.kind() == "string" {
            return unquote_string_literal(&node_text(child, source));
        }
    }
    None
}

/// The keyword must be a whole token: `asyncTask` is not `async`.
fn has_leading_keyword(node: Node<'_>, source: &str, keyword: &str) -> bool {
    let text = node_text(node, source);
    let Some(rest) = text.strip_prefix(keyword) else {
        return false;
    };
    !rest
        .chars()
        .next()
        .map(|ch| ch.is_alphanumeric() || ch == '_')
        .unwrap_or(false)
}

fn is_nested_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "function" | "function_expression" | "arrow_function" | "generator_function"
    )
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    if first == '"' || first == '\'' || first == '`' {
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
    fn arrow_function_becomes_function_not_variable() {
        let source = "const handler = async (req) => { return req; };\n";
        let mut extractor = JavascriptExtractor::new().unwrap();
        let result = extractor.extract("src/app.js", source).unwrap();
        let handler = result
            .elements
            .iter()
            .find(|el| el.name == "handler")
            .unwrap();
        assert_eq!(handler.kind, NodeKind::Function);
        assert_eq!(handler.metadata.get("arrow"), Some(&json!(true)));
        assert_eq!(handler.metadata.get("async"), Some(&json!(true)));
    }

    #[test]
    fn async_prefix_in_a_name_is_not_the_keyword() {
        let source = "class Queue {\n  asyncTask() {}\n  async run() {}\n}\n";
        let mut extractor = JavascriptExtractor::new().unwrap();
        let result = extractor.extract("src/queue.js", source).unwrap();
        let task = result
            .elements
            .iter()
            .find(|el| el.name == "asyncTask")
            .unwrap();
        assert_eq!(task.metadata.get("async"), Some(&json!(false)));
        let run = result.elements.iter().find(|el| el.name == "run").unwrap();
        assert_eq!(run.metadata.get("async"), Some(&json!(true)));
    }

    #[test]
    fn require_emits_imports_edge_not_calls() {
        let source = "const fs = require(\"fs\");\n";
        let mut extractor = JavascriptExtractor::new().unwrap();
        let result = extractor.extract("src/app.js", source).unwrap();
        assert!(result
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Imports && e.target_ref == "fs"));
        assert!(!result
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Calls && e.target_ref == "require"));
    }
}
