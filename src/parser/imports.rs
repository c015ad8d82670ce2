use std::sync::OnceLock;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

use crate::language::LanguageKind;
use crate::parser::{ImportRecord, node_text};

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// ESM static imports: `import { X } from 'module'`, `import X from 'module'`,
/// `import * as X from 'module'`, `import type { X } from 'module'`.
const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @module_path)) @import
"#;

/// All export statements; re-exports are classified in code.
const EXPORT_QUERY: &str = r#"
    (export_statement) @export_stmt
"#;

const PY_IMPORT_QUERY: &str = r#"
    (import_statement) @import
    (import_from_statement) @import_from
"#;

// ---------------------------------------------------------------------------
// Query cache
// ---------------------------------------------------------------------------

static TS_IMPORT_QUERY: OnceLock<Query> = OnceLock::new();
static TSX_IMPORT_QUERY: OnceLock<Query> = OnceLock::new();
static JS_IMPORT_QUERY: OnceLock<Query> = OnceLock::new();
static TS_EXPORT_QUERY: OnceLock<Query> = OnceLock::new();
static TSX_EXPORT_QUERY: OnceLock<Query> = OnceLock::new();
static JS_EXPORT_QUERY: OnceLock<Query> = OnceLock::new();
static PY_QUERY: OnceLock<Query> = OnceLock::new();

fn import_query(language: &Language, lang: LanguageKind) -> &'static Query {
    let slot = match lang {
        LanguageKind::TypeScript => &TS_IMPORT_QUERY,
        LanguageKind::Tsx => &TSX_IMPORT_QUERY,
        _ => &JS_IMPORT_QUERY,
    };
    slot.get_or_init(|| Query::new(language, IMPORT_QUERY).expect("invalid import query"))
}

fn export_query(language: &Language, lang: LanguageKind) -> &'static Query {
    let slot = match lang {
        LanguageKind::TypeScript => &TS_EXPORT_QUERY,
        LanguageKind::Tsx => &TSX_EXPORT_QUERY,
        _ => &JS_EXPORT_QUERY,
    };
    slot.get_or_init(|| Query::new(language, EXPORT_QUERY).expect("invalid export query"))
}

fn python_query(language: &Language) -> &'static Query {
    PY_QUERY.get_or_init(|| Query::new(language, PY_IMPORT_QUERY).expect("invalid Python import query"))
}

// ---------------------------------------------------------------------------
// JS / TS extraction
// ---------------------------------------------------------------------------

/// Extract imports and export statements from a JS/TS syntax tree.
///
/// Returns `(imports, export_clause_names)`. Export statements with a source
/// clause are folded into `imports` as re-export records (wildcard re-exports
/// flagged distinctly); source-less `export { … }` clauses contribute names
/// to the second list.
pub fn extract_js_imports(
    tree: &Tree,
    source: &[u8],
    language: &Language,
    lang: LanguageKind,
) -> (Vec<ImportRecord>, Vec<String>) {
    let mut imports = Vec::new();
    let mut export_names = Vec::new();

    // --- import statements ---
    {
        let query = import_query(language, lang);
        let module_path_idx = query
            .capture_index_for_name("module_path")
            .expect("import query must have @module_path");
        let import_idx = query
            .capture_index_for_name("import")
            .expect("import query must have @import");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            let mut import_node: Option<Node> = None;
            let mut module_path: Option<String> = None;

            for capture in m.captures {
                if capture.index == import_idx {
                    import_node = Some(capture.node);
                } else if capture.index == module_path_idx {
                    module_path = Some(node_text(capture.node, source).to_owned());
                }
            }

            if let (Some(node), Some(path)) = (import_node, module_path) {
                let type_only = node_text(node, source).starts_with("import type");
                imports.push(ImportRecord {
                    source: path,
                    names: import_binding_names(node, source),
                    type_only,
                    reexport: false,
                    wildcard: false,
                });
            }
        }
    }

    // --- export statements ---
    {
        let query = export_query(language, lang);
        let export_idx = query
            .capture_index_for_name("export_stmt")
            .expect("export query must have @export_stmt");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);

        while let Some(m) = matches.next() {
            for capture in m.captures {
                if capture.index != export_idx {
                    continue;
                }
                classify_export(capture.node, source, &mut imports, &mut export_names);
            }
        }
    }

    (imports, export_names)
}

/// Collect the local binding names introduced by an `import_statement`.
/// `* as X` is normalized to `X`; default imports use the bound identifier.
fn import_binding_names(import_node: Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = import_node.walk();
    for child in import_node.children(&mut cursor) {
        if child.kind() == "import_clause" {
            collect_clause_names(child, source, &mut names);
        }
    }
    names
}

fn collect_clause_names(clause: Node, source: &[u8], names: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for child in clause.children(&mut cursor) {
        match child.kind() {
            // Default import: `import React from …`
            "identifier" => names.push(node_text(child, source).to_owned()),
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    // `import { foo as bar }`: field name = original, alias = local.
                    // The local binding is what call sites use.
                    let local = spec
                        .child_by_field_name("alias")
                        .or_else(|| spec.child_by_field_name("name"));
                    if let Some(n) = local {
                        names.push(node_text(n, source).to_owned());
                    }
                }
            }
            "namespace_import" => {
                // `* as ns`: the identifier has no field name; find it by kind.
                let mut inner = child.walk();
                for c in child.children(&mut inner) {
                    if c.kind() == "identifier" {
                        names.push(node_text(c, source).to_owned());
                    }
                }
            }
            _ => {}
        }
    }
}

/// Classify a single `export_statement` node into a re-export import record
/// or a list of locally exported names.
fn classify_export(
    node: Node,
    source: &[u8],
    imports: &mut Vec<ImportRecord>,
    export_names: &mut Vec<String>,
) {
    let source_specifier = find_export_source(node, source);
    let type_only = node_text(node, source).starts_with("export type");

    // Wildcard re-export: `export * from './module'`.
    let has_star = {
        let mut cursor = node.walk();
        node.children(&mut cursor).any(|c| c.kind() == "*")
    };
    if has_star {
        if let Some(spec) = source_specifier {
            imports.push(ImportRecord {
                source: spec,
                names: Vec::new(),
                type_only,
                reexport: true,
                wildcard: true,
            });
        }
        return;
    }

    let clause_names = find_child_of_kind(node, "export_clause")
        .map(|clause| export_clause_names(clause, source))
        .unwrap_or_default();

    match source_specifier {
        Some(spec) => {
            // `export { X } from './module'`: recorded as an import with the
            // reexport flag so barrel resolution can chase it.
            imports.push(ImportRecord {
                source: spec,
                names: clause_names,
                type_only,
                reexport: true,
                wildcard: false,
            });
        }
        None => export_names.extend(clause_names),
    }
}

/// Find the source module string of a re-export statement, if any.
fn find_export_source(export_node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = export_node.walk();
    for child in export_node.children(&mut cursor) {
        if child.kind() == "string"
            && let Some(frag) = child.named_child(0)
        {
            return Some(node_text(frag, source).to_owned());
        }
    }
    None
}

fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn export_clause_names(clause: Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = clause.walk();
    for child in clause.children(&mut cursor) {
        if child.kind() == "export_specifier"
            && let Some(name_node) = child.child_by_field_name("name")
        {
            names.push(node_text(name_node, source).to_owned());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Python extraction
// ---------------------------------------------------------------------------

/// Extract Python imports.
///
/// `import x.y [as z]` records the dotted module path with its bound name;
/// `from m import a [as b], *` records the module path (relative prefixes
/// preserved) with the imported names or the wildcard flag.
pub fn extract_python_imports(tree: &Tree, source: &[u8], language: &Language) -> Vec<ImportRecord> {
    let query = python_query(language);
    let import_idx = query.capture_index_for_name("import").expect("@import");
    let from_idx = query.capture_index_for_name("import_from").expect("@import_from");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    let mut imports = Vec::new();

    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == import_idx {
                extract_plain_import(capture.node, source, &mut imports);
            } else if capture.index == from_idx {
                extract_from_import(capture.node, source, &mut imports);
            }
        }
    }

    imports
}

/// `import x.y` binds `x`; `import x.y as z` binds `z`.
fn extract_plain_import(node: Node, source: &[u8], out: &mut Vec<ImportRecord>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = node_text(child, source).to_owned();
                let binding = module.split('.').next().unwrap_or(&module).to_owned();
                out.push(ImportRecord {
                    source: module,
                    names: vec![binding],
                    type_only: false,
                    reexport: false,
                    wildcard: false,
                });
            }
            "aliased_import" => {
                let module = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_owned());
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source).to_owned());
                if let (Some(module), Some(alias)) = (module, alias) {
                    out.push(ImportRecord {
                        source: module,
                        names: vec![alias],
                        type_only: false,
                        reexport: false,
                        wildcard: false,
                    });
                }
            }
            _ => {}
        }
    }
}

fn extract_from_import(node: Node, source: &[u8], out: &mut Vec<ImportRecord>) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = node_text(module_node, source).to_owned();

    let mut names = Vec::new();
    let mut wildcard = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.id() == module_node.id() {
            continue;
        }
        match child.kind() {
            "wildcard_import" => wildcard = true,
            "dotted_name" => names.push(node_text(child, source).to_owned()),
            "aliased_import" => {
                if let Some(alias) = child.child_by_field_name("alias") {
                    names.push(node_text(alias, source).to_owned());
                }
            }
            _ => {}
        }
    }

    out.push(ImportRecord {
        source: module,
        names,
        type_only: false,
        reexport: false,
        wildcard,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_fixture;

    #[test]
    fn test_named_imports() {
        let facts = parse_fixture(
            "import { useState, useEffect } from './hooks';\n",
            LanguageKind::TypeScript,
        );
        assert_eq!(facts.imports.len(), 1);
        let imp = &facts.imports[0];
        assert_eq!(imp.source, "./hooks");
        assert_eq!(imp.names, vec!["useState", "useEffect"]);
        assert!(!imp.type_only && !imp.reexport && !imp.wildcard);
    }

    #[test]
    fn test_aliased_import_binds_local_name() {
        let facts = parse_fixture(
            "import { original as local } from './m';\n",
            LanguageKind::TypeScript,
        );
        assert_eq!(facts.imports[0].names, vec!["local"]);
    }

    #[test]
    fn test_default_and_namespace_imports() {
        let facts = parse_fixture(
            "import React from 'react';\nimport * as path from 'path';\n",
            LanguageKind::TypeScript,
        );
        assert_eq!(facts.imports[0].names, vec!["React"]);
        assert_eq!(facts.imports[1].names, vec!["path"]);
    }

    #[test]
    fn test_type_only_import() {
        let facts = parse_fixture(
            "import type { Config } from './config';\n",
            LanguageKind::TypeScript,
        );
        assert!(facts.imports[0].type_only);
    }

    #[test]
    fn test_named_reexport() {
        let facts = parse_fixture(
            "export { helper } from './utils';\n",
            LanguageKind::TypeScript,
        );
        let imp = &facts.imports[0];
        assert!(imp.reexport);
        assert!(!imp.wildcard);
        assert_eq!(imp.names, vec!["helper"]);
        assert_eq!(imp.source, "./utils");
    }

    #[test]
    fn test_wildcard_reexport_flagged_distinctly() {
        let facts = parse_fixture("export * from './types';\n", LanguageKind::TypeScript);
        let imp = &facts.imports[0];
        assert!(imp.reexport);
        assert!(imp.wildcard);
        assert!(imp.names.is_empty());
    }

    #[test]
    fn test_local_export_clause_names() {
        let facts = parse_fixture(
            "function a() {}\nexport { a };\n",
            LanguageKind::TypeScript,
        );
        assert!(facts.exports.iter().any(|n| n == "a"));
        assert!(facts.imports.is_empty());
    }

    #[test]
    fn test_python_plain_import() {
        let facts = parse_fixture("import os.path\n", LanguageKind::Python);
        let imp = &facts.imports[0];
        assert_eq!(imp.source, "os.path");
        assert_eq!(imp.names, vec!["os"]);
    }

    #[test]
    fn test_python_aliased_import() {
        let facts = parse_fixture("import numpy as np\n", LanguageKind::Python);
        let imp = &facts.imports[0];
        assert_eq!(imp.source, "numpy");
        assert_eq!(imp.names, vec!["np"]);
    }

    #[test]
    fn test_python_from_import_with_alias() {
        let facts = parse_fixture("from .utils import helper as h, other\n", LanguageKind::Python);
        let imp = &facts.imports[0];
        assert_eq!(imp.source, ".utils");
        assert_eq!(imp.names, vec!["h", "other"]);
        assert!(!imp.wildcard);
    }

    #[test]
    fn test_python_wildcard_import() {
        let facts = parse_fixture("from pkg.mod import *\n", LanguageKind::Python);
        let imp = &facts.imports[0];
        assert_eq!(imp.source, "pkg.mod");
        assert!(imp.wildcard);
        assert!(imp.names.is_empty());
    }
}
