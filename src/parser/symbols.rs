use std::sync::OnceLock;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

use crate::graph::records::NodeKind;
use crate::language::LanguageKind;
use crate::parser::{Definition, node_text};

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// Tree-sitter S-expression query for TypeScript (`.ts`) and TSX files.
///
/// Lexical declarations are matched at every nesting depth on purpose: an
/// arrow function declared inside another function is still a definition,
/// and caller attribution relies on the innermost one winning.
const SYMBOL_QUERY_TS: &str = r#"
    (function_declaration
      name: (identifier) @name) @symbol

    (class_declaration
      name: (type_identifier) @name) @symbol

    (interface_declaration
      name: (type_identifier) @name) @symbol

    (type_alias_declaration
      name: (type_identifier) @name) @symbol

    (lexical_declaration
      (variable_declarator
        name: (identifier) @name
        value: (_) @val)) @symbol
"#;

/// JavaScript query: no interfaces or type aliases, and class names are
/// plain identifiers in the JS grammar.
const SYMBOL_QUERY_JS: &str = r#"
    (function_declaration
      name: (identifier) @name) @symbol

    (class_declaration
      name: (identifier) @name) @symbol

    (lexical_declaration
      (variable_declarator
        name: (identifier) @name
        value: (_) @val)) @symbol
"#;

const SYMBOL_QUERY_PY: &str = r#"
    (function_definition
      name: (identifier) @name) @symbol

    (class_definition
      name: (identifier) @name) @symbol
"#;

// ---------------------------------------------------------------------------
// Query cache (compiled once per grammar via OnceLock)
// ---------------------------------------------------------------------------

static TS_QUERY: OnceLock<Query> = OnceLock::new();
static TSX_QUERY: OnceLock<Query> = OnceLock::new();
static JS_QUERY: OnceLock<Query> = OnceLock::new();
static PY_QUERY: OnceLock<Query> = OnceLock::new();

fn symbol_query(language: &Language, lang: LanguageKind) -> &'static Query {
    match lang {
        LanguageKind::TypeScript => TS_QUERY
            .get_or_init(|| Query::new(language, SYMBOL_QUERY_TS).expect("invalid TS symbol query")),
        LanguageKind::Tsx => TSX_QUERY
            .get_or_init(|| Query::new(language, SYMBOL_QUERY_TS).expect("invalid TSX symbol query")),
        LanguageKind::JavaScript => JS_QUERY
            .get_or_init(|| Query::new(language, SYMBOL_QUERY_JS).expect("invalid JS symbol query")),
        LanguageKind::Python => PY_QUERY
            .get_or_init(|| Query::new(language, SYMBOL_QUERY_PY).expect("invalid Python symbol query")),
        LanguageKind::Hcl => unreachable!("HCL extraction does not use queries"),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check whether `node` is (or is nested inside) an `export_statement`.
fn is_exported(node: Node) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n.kind() == "export_statement" {
            return true;
        }
        current = n.parent();
    }
    false
}

fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn end_line(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Return true if `node` is an arrow function or function expression value.
/// Older grammar revisions used `function` for function expressions.
fn is_function_value(node: Node) -> bool {
    matches!(node.kind(), "arrow_function" | "function_expression" | "function")
}

/// Find the first direct child of `node` with the given kind.
fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

// ---------------------------------------------------------------------------
// JS / TS extraction
// ---------------------------------------------------------------------------

/// Extract all definitions from a JS/TS syntax tree.
///
/// Returns `(definitions, exported_names)`: the second list carries names of
/// exported declarations so barrel resolution can confirm what a file
/// provides without re-walking definitions.
pub fn extract_js_definitions(
    tree: &Tree,
    source: &[u8],
    language: &Language,
    lang: LanguageKind,
) -> (Vec<Definition>, Vec<String>) {
    let query = symbol_query(language, lang);
    let name_idx = query
        .capture_index_for_name("name")
        .expect("query must have @name capture");
    let symbol_idx = query
        .capture_index_for_name("symbol")
        .expect("query must have @symbol capture");
    let val_idx = query.capture_index_for_name("val");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);

    // De-duplicate by (name, line) to guard against overlapping patterns.
    let mut seen: std::collections::HashSet<(String, u32)> = std::collections::HashSet::new();
    let mut definitions: Vec<Definition> = Vec::new();
    let mut exported_names: Vec<String> = Vec::new();

    while let Some(m) = matches.next() {
        let mut symbol_node: Option<Node> = None;
        let mut name_node: Option<Node> = None;
        let mut val_node: Option<Node> = None;

        for capture in m.captures {
            if capture.index == symbol_idx {
                symbol_node = Some(capture.node);
            } else if capture.index == name_idx {
                name_node = Some(capture.node);
            } else if val_idx == Some(capture.index) {
                val_node = Some(capture.node);
            }
        }

        let (sym_node, name_node) = match (symbol_node, name_node) {
            (Some(s), Some(n)) => (s, n),
            _ => continue,
        };

        let name = node_text(name_node, source).to_owned();
        let line = start_line(name_node);
        if !seen.insert((name.clone(), line)) {
            continue;
        }

        let exported = is_exported(sym_node);

        match sym_node.kind() {
            "function_declaration" => {
                push_def(&mut definitions, &mut exported_names, Definition {
                    name,
                    kind: NodeKind::Function,
                    line,
                    end_line: Some(end_line(sym_node)),
                    exported,
                    decorators: Vec::new(),
                });
            }
            "class_declaration" => {
                push_def(&mut definitions, &mut exported_names, Definition {
                    name: name.clone(),
                    kind: NodeKind::Class,
                    line,
                    end_line: Some(end_line(sym_node)),
                    exported,
                    decorators: Vec::new(),
                });
                extract_class_methods(sym_node, source, &name, exported, &mut definitions);
            }
            "interface_declaration" => {
                push_def(&mut definitions, &mut exported_names, Definition {
                    name: name.clone(),
                    kind: NodeKind::Interface,
                    line,
                    end_line: Some(end_line(sym_node)),
                    exported,
                    decorators: Vec::new(),
                });
                extract_interface_members(sym_node, source, &name, &mut definitions);
            }
            "type_alias_declaration" => {
                push_def(&mut definitions, &mut exported_names, Definition {
                    name,
                    kind: NodeKind::Type,
                    line,
                    end_line: Some(end_line(sym_node)),
                    exported,
                    decorators: Vec::new(),
                });
            }
            "lexical_declaration" => {
                // Only arrow functions and function expressions bound in a
                // declarator become definitions; plain values do not.
                let Some(val) = val_node else { continue };
                if !is_function_value(val) {
                    continue;
                }
                push_def(&mut definitions, &mut exported_names, Definition {
                    name,
                    kind: NodeKind::ArrowFunction,
                    line,
                    end_line: Some(end_line(sym_node)),
                    exported,
                    decorators: Vec::new(),
                });
            }
            _ => {}
        }
    }

    (definitions, exported_names)
}

fn push_def(definitions: &mut Vec<Definition>, exported_names: &mut Vec<String>, def: Definition) {
    if def.exported {
        exported_names.push(def.name.clone());
    }
    definitions.push(def);
}

/// Extract `method_definition` children of a class body as `Class.method`
/// definitions with their own spans.
fn extract_class_methods(
    class_node: Node,
    source: &[u8],
    class_name: &str,
    exported: bool,
    out: &mut Vec<Definition>,
) {
    let Some(body) = find_child_of_kind(class_node, "class_body") else {
        return;
    };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if child.kind() == "method_definition"
            && let Some(name_node) = child.child_by_field_name("name")
        {
            out.push(Definition {
                name: format!("{class_name}.{}", node_text(name_node, source)),
                kind: NodeKind::Method,
                line: start_line(child),
                end_line: Some(end_line(child)),
                exported,
                decorators: Vec::new(),
            });
        }
    }
}

/// Extract interface method/property signatures as `Interface.member`
/// definitions. The node-kind set has no property kind, so member signatures
/// are recorded as methods; this also makes them reachable through the
/// method-suffix lookup tier.
fn extract_interface_members(
    iface_node: Node,
    source: &[u8],
    iface_name: &str,
    out: &mut Vec<Definition>,
) {
    let Some(body) = find_child_of_kind(iface_node, "interface_body") else {
        return;
    };
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        if matches!(child.kind(), "property_signature" | "method_signature")
            && let Some(name_node) = child.child_by_field_name("name")
        {
            out.push(Definition {
                name: format!("{iface_name}.{}", node_text(name_node, source)),
                kind: NodeKind::Method,
                line: start_line(child),
                end_line: Some(end_line(child)),
                exported: false,
                decorators: Vec::new(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Python extraction
// ---------------------------------------------------------------------------

/// Extract function and class definitions from a Python syntax tree.
///
/// A function whose syntactic ancestor is a class becomes a `Class.method`
/// method; decorators are captured as a list attached to the definition.
pub fn extract_python_definitions(
    tree: &Tree,
    source: &[u8],
    language: &Language,
) -> Vec<Definition> {
    let query = symbol_query(language, LanguageKind::Python);
    let name_idx = query.capture_index_for_name("name").expect("@name");
    let symbol_idx = query.capture_index_for_name("symbol").expect("@symbol");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut definitions = Vec::new();

    while let Some(m) = matches.next() {
        let mut symbol_node: Option<Node> = None;
        let mut name_node: Option<Node> = None;
        for capture in m.captures {
            if capture.index == symbol_idx {
                symbol_node = Some(capture.node);
            } else if capture.index == name_idx {
                name_node = Some(capture.node);
            }
        }
        let (sym_node, name_node) = match (symbol_node, name_node) {
            (Some(s), Some(n)) => (s, n),
            _ => continue,
        };

        let base_name = node_text(name_node, source).to_owned();
        let decorators = collect_decorators(sym_node, source);

        let (name, kind) = match sym_node.kind() {
            "class_definition" => (base_name, NodeKind::Class),
            _ => match enclosing_class_name(sym_node, source) {
                Some(class_name) => (format!("{class_name}.{base_name}"), NodeKind::Method),
                None => (base_name, NodeKind::Function),
            },
        };

        definitions.push(Definition {
            name,
            kind,
            line: start_line(name_node),
            end_line: Some(end_line(sym_node)),
            exported: true,
            decorators,
        });
    }

    definitions
}

/// Walk ancestors of a function definition looking for an enclosing class.
fn enclosing_class_name(node: Node, source: &[u8]) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "class_definition" {
            return n
                .child_by_field_name("name")
                .map(|name| node_text(name, source).to_owned());
        }
        current = n.parent();
    }
    None
}

/// Collect decorator names from a wrapping `decorated_definition`, without
/// the leading `@`.
fn collect_decorators(def_node: Node, source: &[u8]) -> Vec<String> {
    let Some(parent) = def_node.parent() else {
        return Vec::new();
    };
    if parent.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = parent.walk();
    for child in parent.children(&mut cursor) {
        if child.kind() == "decorator" {
            let text = node_text(child, source);
            out.push(text.trim_start_matches('@').trim().to_owned());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_fixture;

    fn def<'a>(facts: &'a crate::parser::FileFacts, name: &str) -> &'a Definition {
        facts
            .definitions
            .iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("expected definition {name}, got {:?}", facts.definitions))
    }

    #[test]
    fn test_function_declaration() {
        let facts = parse_fixture("export function hello() {\n  return 1;\n}\n", LanguageKind::TypeScript);
        let d = def(&facts, "hello");
        assert_eq!(d.kind, NodeKind::Function);
        assert_eq!(d.line, 1);
        assert_eq!(d.end_line, Some(3));
        assert!(d.exported);
    }

    #[test]
    fn test_arrow_function_in_declarator() {
        let facts = parse_fixture("const greet = () => {};\n", LanguageKind::TypeScript);
        let d = def(&facts, "greet");
        assert_eq!(d.kind, NodeKind::ArrowFunction);
        assert!(!d.exported);
    }

    #[test]
    fn test_plain_const_is_not_a_definition() {
        let facts = parse_fixture("const limit = 42;\n", LanguageKind::TypeScript);
        assert!(facts.definitions.is_empty());
    }

    #[test]
    fn test_nested_arrow_function_is_a_definition() {
        let src = "function outer() {\n  const inner = () => {};\n}\n";
        let facts = parse_fixture(src, LanguageKind::TypeScript);
        assert!(facts.definitions.iter().any(|d| d.name == "outer"));
        let inner = def(&facts, "inner");
        assert_eq!(inner.kind, NodeKind::ArrowFunction);
        assert_eq!(inner.line, 2);
    }

    #[test]
    fn test_class_with_methods() {
        let src = "export class Dog {\n  bark() {}\n  sit() {\n    return 0;\n  }\n}\n";
        let facts = parse_fixture(src, LanguageKind::TypeScript);
        let class = def(&facts, "Dog");
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!(class.end_line, Some(6));
        let bark = def(&facts, "Dog.bark");
        assert_eq!(bark.kind, NodeKind::Method);
        assert_eq!(bark.line, 2);
        let sit = def(&facts, "Dog.sit");
        assert_eq!(sit.line, 3);
        assert_eq!(sit.end_line, Some(5));
    }

    #[test]
    fn test_interface_members() {
        let src = "interface IUser {\n  name: string;\n  getId(): number;\n}\n";
        let facts = parse_fixture(src, LanguageKind::TypeScript);
        assert_eq!(def(&facts, "IUser").kind, NodeKind::Interface);
        assert_eq!(def(&facts, "IUser.name").kind, NodeKind::Method);
        assert_eq!(def(&facts, "IUser.getId").kind, NodeKind::Method);
    }

    #[test]
    fn test_type_alias() {
        let facts = parse_fixture("export type ID = string;\n", LanguageKind::TypeScript);
        let d = def(&facts, "ID");
        assert_eq!(d.kind, NodeKind::Type);
        assert!(d.exported);
    }

    #[test]
    fn test_js_class_declaration() {
        let facts = parse_fixture("class Car {\n  drive() {}\n}\n", LanguageKind::JavaScript);
        assert_eq!(def(&facts, "Car").kind, NodeKind::Class);
        assert_eq!(def(&facts, "Car.drive").kind, NodeKind::Method);
    }

    #[test]
    fn test_python_function_and_method() {
        let src = "def top():\n    pass\n\nclass Service:\n    def run(self):\n        pass\n";
        let facts = parse_fixture(src, LanguageKind::Python);
        assert_eq!(def(&facts, "top").kind, NodeKind::Function);
        assert_eq!(def(&facts, "Service").kind, NodeKind::Class);
        let run = def(&facts, "Service.run");
        assert_eq!(run.kind, NodeKind::Method);
        assert_eq!(run.line, 5);
    }

    #[test]
    fn test_python_decorators() {
        let src = "@app.route('/x')\n@cached\ndef handler():\n    pass\n";
        let facts = parse_fixture(src, LanguageKind::Python);
        let d = def(&facts, "handler");
        assert_eq!(d.decorators, vec!["app.route('/x')", "cached"]);
        assert_eq!(d.line, 3);
    }
}
