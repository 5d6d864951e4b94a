use codegraph::model::{EdgeKind, NodeKind};
use codegraph::parser::{ExtractionResult, ParserDispatcher};
use serde_json::json;
use std::path::Path;

fn parse(rel_path: &str, source: &str) -> ExtractionResult {
    let mut dispatcher = ParserDispatcher::new().unwrap();
    dispatcher.parse_file(Path::new("."), rel_path, source)
}

#[test]
fn extract_declarations_and_edges() {
    let source = r#"
import { helper } from "./lib/helper";

class Base {}

class Widget extends Base {
    render() { return helper(); }
}

export function draw(widget) {
    widget.render();
}

const MAX = 10;
"#;
    let result = parse("src/app.js", source);
    assert!(result.errors.is_empty());

    let elements: Vec<_> = result
        .elements
        .iter()
        .map(|el| (el.kind, el.name.as_str()))
        .collect();
    assert!(elements.contains(&(NodeKind::Module, "app")));
    assert!(elements.contains(&(NodeKind::Class, "Base")));
    assert!(elements.contains(&(NodeKind::Class, "Widget")));
    assert!(elements.contains(&(NodeKind::Function, "draw")));
    assert!(elements.contains(&(NodeKind::Variable, "MAX")));
    assert!(elements.contains(&(NodeKind::Import, "./lib/helper")));
    assert!(elements.contains(&(NodeKind::Export, "draw")));

    let draw = result.elements.iter().find(|el| el.name == "draw").unwrap();
    assert_eq!(draw.metadata.get("exported"), Some(&json!(true)));

    let inherits: Vec<_> = result
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Inherits)
        .collect();
    assert_eq!(inherits.len(), 1);
    assert_eq!(inherits[0].source_ref, "src/app.js:Widget");
    assert_eq!(inherits[0].target_ref, "Base");

    // Member calls reduce to the rightmost property name.
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Calls && e.source_ref == "src/app.js:draw" && e.target_ref == "render"
    }));
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Imports && e.target_ref == "./lib/helper"
    }));
}

#[test]
fn arrow_function_is_a_function_declaration() {
    let result = parse("util.js", "const twice = (x) => x * 2;\nconst LIMIT = 3;\n");
    let twice = result.elements.iter().find(|el| el.name == "twice").unwrap();
    assert_eq!(twice.kind, NodeKind::Function);
    assert_eq!(twice.metadata.get("arrow"), Some(&json!(true)));
    let limit = result.elements.iter().find(|el| el.name == "LIMIT").unwrap();
    assert_eq!(limit.kind, NodeKind::Variable);
}

#[test]
fn index_module_is_an_entry_point() {
    let result = parse("src/index.js", "export function boot() {}\n");
    let module = result
        .elements
        .iter()
        .find(|el| el.kind == NodeKind::Module)
        .unwrap();
    assert_eq!(module.metadata.get("entry_point"), Some(&json!(true)));
}

#[test]
fn require_call_becomes_an_imports_edge() {
    let result = parse("server.cjs", "const fs = require(\"fs\");\nfs.readFile();\n");
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Imports && e.target_ref == "fs"
    }));
    assert!(!result.edges.iter().any(|e| {
        e.kind == EdgeKind::Calls && e.target_ref == "require"
    }));
}

#[test]
fn typescript_class_heritage() {
    let source = r#"
interface Handler {}

class Base {}

class Service extends Base implements Handler {
    run() {}
}
"#;
    let result = parse("src/service.ts", source);
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Inherits
            && e.source_ref == "src/service.ts:Service"
            && e.target_ref == "Base"
    }));
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Implements
            && e.source_ref == "src/service.ts:Service"
            && e.target_ref == "Handler"
    }));
}

#[test]
fn tsx_parses_jsx_bodies() {
    let source = "export function App() {\n  return <div>hello</div>;\n}\n";
    let result = parse("src/App.tsx", source);
    assert!(result.errors.is_empty());
    assert!(result
        .elements
        .iter()
        .any(|el| el.kind == NodeKind::Function && el.name == "App"));
}

#[test]
fn iife_bodies_do_not_leak_declarations() {
    let source = "(function () {\n  function helper() {}\n  helper();\n})();\n";
    let result = parse("boot.js", source);
    assert!(!result.elements.iter().any(|el| el.name == "helper"));
    // Calls inside still attribute to the enclosing module scope.
    assert!(result.edges.iter().any(|e| {
        e.kind == EdgeKind::Calls && e.source_ref == "boot.js:boot" && e.target_ref == "helper"
    }));
}

#[test]
fn malformed_input_still_yields_the_module() {
    let result = parse("broken.js", "function (((((\n");
    assert!(result
        .elements
        .iter()
        .any(|el| el.kind == NodeKind::Module && el.name == "broken"));
    assert!(!result.errors.is_empty());
}

#[test]
fn relative_imports_resolve_to_composites() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/b.js"), "export function bar() {}\n").unwrap();
    let source = "import { bar } from './b';\nexport function foo() { bar(); }\n";

    let mut dispatcher = ParserDispatcher::new().unwrap();
    let result = dispatcher.parse_file(dir.path(), "src/a.js", source);
    let import_edge = result
        .edges
        .iter()
        .find(|e| e.kind == EdgeKind::Imports)
        .unwrap();
    assert_eq!(import_edge.target_ref, "src/b.js:b");
    assert_eq!(import_edge.metadata.get("specifier"), Some(&json!("./b")));
}
