use std::sync::OnceLock;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

use crate::language::LanguageKind;
use crate::parser::{CallRecord, HeritageKind, HeritageRecord, node_text};

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// One pattern for every call expression; the callee shape is classified in
/// code, which keeps the query grammar-stable across TS/TSX/JS.
const CALLS_QUERY: &str = r#"
    (call_expression
      function: (_) @fn) @call
"#;

/// Class heritage for TS/TSX grammars.
///
/// In the TypeScript grammar (0.23), class extends uses `extends_clause` with
/// a `value` field; implements lists type identifiers in `implements_clause`.
const INHERITANCE_QUERY_TS: &str = r#"
    (class_declaration
      name: (type_identifier) @class_name
      (class_heritage
        (extends_clause
          value: (identifier) @extends_name)))

    (class_declaration
      name: (type_identifier) @class_name
      (class_heritage
        (implements_clause
          (type_identifier) @implements_name)))
"#;

/// JS grammar layout differs: `class_heritage` holds the identifier directly
/// and there is no implements clause.
const INHERITANCE_QUERY_JS: &str = r#"
    (class_declaration
      name: (identifier) @class_name
      (class_heritage
        (identifier) @extends_name))
"#;

const PY_CALLS_QUERY: &str = r#"
    (call
      function: (_) @fn) @call
"#;

const PY_INHERITANCE_QUERY: &str = r#"
    (class_definition
      name: (identifier) @class_name
      superclasses: (argument_list
        (identifier) @extends_name))
"#;

// ---------------------------------------------------------------------------
// Query cache: one set of statics per grammar; queries compiled for one
// grammar cannot be used with another grammar's tree.
// ---------------------------------------------------------------------------

static TS_CALLS: OnceLock<Query> = OnceLock::new();
static TSX_CALLS: OnceLock<Query> = OnceLock::new();
static JS_CALLS: OnceLock<Query> = OnceLock::new();
static TS_INHERITANCE: OnceLock<Query> = OnceLock::new();
static TSX_INHERITANCE: OnceLock<Query> = OnceLock::new();
static JS_INHERITANCE: OnceLock<Query> = OnceLock::new();
static PY_CALLS: OnceLock<Query> = OnceLock::new();
static PY_INHERITANCE: OnceLock<Query> = OnceLock::new();

fn calls_query(language: &Language, lang: LanguageKind) -> &'static Query {
    let slot = match lang {
        LanguageKind::TypeScript => &TS_CALLS,
        LanguageKind::Tsx => &TSX_CALLS,
        _ => &JS_CALLS,
    };
    slot.get_or_init(|| Query::new(language, CALLS_QUERY).expect("invalid calls query"))
}

fn inheritance_query(language: &Language, lang: LanguageKind) -> &'static Query {
    match lang {
        LanguageKind::TypeScript => TS_INHERITANCE
            .get_or_init(|| Query::new(language, INHERITANCE_QUERY_TS).expect("invalid TS inheritance query")),
        LanguageKind::Tsx => TSX_INHERITANCE
            .get_or_init(|| Query::new(language, INHERITANCE_QUERY_TS).expect("invalid TSX inheritance query")),
        _ => JS_INHERITANCE
            .get_or_init(|| Query::new(language, INHERITANCE_QUERY_JS).expect("invalid JS inheritance query")),
    }
}

// ---------------------------------------------------------------------------
// JS / TS call extraction
// ---------------------------------------------------------------------------

/// Extract call sites from a JS/TS syntax tree.
///
/// Four shapes are recorded:
/// 1. `foo(…)`: name `foo`, static.
/// 2. `obj.foo(…)`: name `foo` (the property), static.
/// 3. `fn.call|apply|bind(…)`: name `fn` (or the inner property), dynamic.
/// 4. `obj["foo"](…)` with a literal string key: name `foo`, dynamic.
///
/// Other dynamic forms are not recorded.
pub fn extract_js_calls(
    tree: &Tree,
    source: &[u8],
    language: &Language,
    lang: LanguageKind,
) -> Vec<CallRecord> {
    let query = calls_query(language, lang);
    let fn_idx = query.capture_index_for_name("fn").expect("@fn");
    let call_idx = query.capture_index_for_name("call").expect("@call");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut calls = Vec::new();

    while let Some(m) = matches.next() {
        let mut fn_node: Option<Node> = None;
        let mut call_node: Option<Node> = None;
        for capture in m.captures {
            if capture.index == fn_idx {
                fn_node = Some(capture.node);
            } else if capture.index == call_idx {
                call_node = Some(capture.node);
            }
        }
        let (fn_node, call_node) = match (fn_node, call_node) {
            (Some(f), Some(c)) => (f, c),
            _ => continue,
        };

        if let Some(record) = classify_js_callee(fn_node, call_node, source) {
            calls.push(record);
        }
    }

    calls
}

fn classify_js_callee(fn_node: Node, call_node: Node, source: &[u8]) -> Option<CallRecord> {
    let line = call_node.start_position().row as u32 + 1;

    match fn_node.kind() {
        "identifier" => Some(CallRecord {
            name: node_text(fn_node, source).to_owned(),
            line,
            dynamic: false,
        }),
        "member_expression" => {
            let property = fn_node.child_by_field_name("property")?;
            let prop_name = node_text(property, source);

            if matches!(prop_name, "call" | "apply" | "bind") {
                // `fn.call(…)`: the real callee is the object (or its
                // property when the object is itself a member expression).
                let object = fn_node.child_by_field_name("object")?;
                let name = match object.kind() {
                    "identifier" => node_text(object, source).to_owned(),
                    "member_expression" => {
                        let inner = object.child_by_field_name("property")?;
                        node_text(inner, source).to_owned()
                    }
                    _ => return None,
                };
                Some(CallRecord { name, line, dynamic: true })
            } else {
                Some(CallRecord {
                    name: prop_name.to_owned(),
                    line,
                    dynamic: false,
                })
            }
        }
        "subscript_expression" => {
            // `obj["foo"](…)`: only literal string keys are recorded.
            let index = fn_node.child_by_field_name("index")?;
            if index.kind() != "string" {
                return None;
            }
            let frag = index.named_child(0)?;
            Some(CallRecord {
                name: node_text(frag, source).to_owned(),
                line,
                dynamic: true,
            })
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// JS / TS heritage extraction
// ---------------------------------------------------------------------------

/// Extract class heritage: one record per direct superclass, one per listed
/// interface.
pub fn extract_js_heritage(
    tree: &Tree,
    source: &[u8],
    language: &Language,
    lang: LanguageKind,
) -> Vec<HeritageRecord> {
    let query = inheritance_query(language, lang);
    let class_idx = query.capture_index_for_name("class_name").expect("@class_name");
    let extends_idx = query.capture_index_for_name("extends_name");
    let implements_idx = query.capture_index_for_name("implements_name");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut heritage = Vec::new();

    while let Some(m) = matches.next() {
        let mut class_name: Option<String> = None;
        let mut parent: Option<(String, HeritageKind)> = None;

        for capture in m.captures {
            if capture.index == class_idx {
                class_name = Some(node_text(capture.node, source).to_owned());
            } else if extends_idx == Some(capture.index) {
                parent = Some((node_text(capture.node, source).to_owned(), HeritageKind::Extends));
            } else if implements_idx == Some(capture.index) {
                parent = Some((node_text(capture.node, source).to_owned(), HeritageKind::Implements));
            }
        }

        if let (Some(class_name), Some((parent, kind))) = (class_name, parent) {
            heritage.push(HeritageRecord { class_name, parent, kind });
        }
    }

    heritage
}

// ---------------------------------------------------------------------------
// Python extraction
// ---------------------------------------------------------------------------

/// Extract Python call sites. `a.b.c(…)` records the rightmost attribute
/// name (`c`).
pub fn extract_python_calls(tree: &Tree, source: &[u8], language: &Language) -> Vec<CallRecord> {
    let query = PY_CALLS
        .get_or_init(|| Query::new(language, PY_CALLS_QUERY).expect("invalid Python calls query"));
    let fn_idx = query.capture_index_for_name("fn").expect("@fn");
    let call_idx = query.capture_index_for_name("call").expect("@call");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut calls = Vec::new();

    while let Some(m) = matches.next() {
        let mut fn_node: Option<Node> = None;
        let mut call_node: Option<Node> = None;
        for capture in m.captures {
            if capture.index == fn_idx {
                fn_node = Some(capture.node);
            } else if capture.index == call_idx {
                call_node = Some(capture.node);
            }
        }
        let (fn_node, call_node) = match (fn_node, call_node) {
            (Some(f), Some(c)) => (f, c),
            _ => continue,
        };
        let line = call_node.start_position().row as u32 + 1;

        let name = match fn_node.kind() {
            "identifier" => node_text(fn_node, source).to_owned(),
            "attribute" => match fn_node.child_by_field_name("attribute") {
                Some(attr) => node_text(attr, source).to_owned(),
                None => continue,
            },
            _ => continue,
        };

        calls.push(CallRecord { name, line, dynamic: false });
    }

    calls
}

/// Extract Python class bases as extends records.
pub fn extract_python_heritage(
    tree: &Tree,
    source: &[u8],
    language: &Language,
) -> Vec<HeritageRecord> {
    let query = PY_INHERITANCE.get_or_init(|| {
        Query::new(language, PY_INHERITANCE_QUERY).expect("invalid Python inheritance query")
    });
    let class_idx = query.capture_index_for_name("class_name").expect("@class_name");
    let extends_idx = query.capture_index_for_name("extends_name").expect("@extends_name");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut heritage = Vec::new();

    while let Some(m) = matches.next() {
        let mut class_name: Option<String> = None;
        let mut parent: Option<String> = None;
        for capture in m.captures {
            if capture.index == class_idx {
                class_name = Some(node_text(capture.node, source).to_owned());
            } else if capture.index == extends_idx {
                parent = Some(node_text(capture.node, source).to_owned());
            }
        }
        if let (Some(class_name), Some(parent)) = (class_name, parent) {
            heritage.push(HeritageRecord {
                class_name,
                parent,
                kind: HeritageKind::Extends,
            });
        }
    }

    heritage
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
