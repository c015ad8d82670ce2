pub mod calls;
pub mod hcl;
pub mod imports;
pub mod symbols;

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Node, Parser, Tree};

use crate::graph::records::NodeKind;
use crate::language::LanguageKind;

// Thread-local Parser instances: one per rayon worker thread, zero lock
// contention. Required grammars are configured eagerly; optional grammars
// hold None when the grammar failed to initialize (the capabilities probe
// keeps files from reaching them in that case).
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
    static PARSER_PY: RefCell<Option<Parser>> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_python::LANGUAGE.into()).ok().map(|_| p)
    });
    static PARSER_HCL: RefCell<Option<Parser>> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_hcl::LANGUAGE.into()).ok().map(|_| p)
    });
}

/// A symbol definition extracted from one file.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Display name. Methods are encoded `Class.method`, interface members
    /// `Interface.member`, HCL blocks `type.labels…`.
    pub name: String,
    pub kind: NodeKind,
    /// 1-indexed start line.
    pub line: u32,
    /// 1-indexed end line of the definition's syntactic span.
    pub end_line: Option<u32>,
    /// Whether the definition is exported from its module.
    pub exported: bool,
    /// Python decorator names attached to the definition (without `@`).
    pub decorators: Vec<String>,
}

/// An import (or re-export) statement extracted from one file.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    /// The raw specifier string as written in source.
    pub source: String,
    /// Local binding names introduced by the statement (`* as X` is
    /// normalized to `X`). Empty for wildcard forms.
    pub names: Vec<String>,
    /// `import type { X } from …` / `export type { X } from …`.
    pub type_only: bool,
    /// The statement is an `export … from` re-export.
    pub reexport: bool,
    /// Wildcard form: `export * from …` or `from x import *`.
    pub wildcard: bool,
}

/// A call site extracted from one file.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// The textual callee name (property name for member calls, rightmost
    /// attribute for Python).
    pub name: String,
    /// 1-indexed line of the call expression.
    pub line: u32,
    /// True when the dispatch form could not be resolved statically with
    /// certainty (`.call`/`.apply`/`.bind`, string-literal computed access).
    pub dynamic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeritageKind {
    Extends,
    Implements,
}

/// A class-heritage relation: one record per direct superclass or listed
/// interface.
#[derive(Debug, Clone)]
pub struct HeritageRecord {
    pub class_name: String,
    pub parent: String,
    pub kind: HeritageKind,
}

/// Everything extracted from a single source file.
///
/// Pure in-memory records: the graph builder is the only consumer that
/// turns these into storage writes.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    pub definitions: Vec<Definition>,
    /// Names exported by standalone `export { … }` clauses. Exported
    /// declarations are visible through `definitions[].exported`.
    pub exports: Vec<String>,
    pub imports: Vec<ImportRecord>,
    pub calls: Vec<CallRecord>,
    pub heritage: Vec<HeritageRecord>,
}

impl FileFacts {
    /// Number of re-export statements: a file is a barrel when this is at
    /// least the number of its own definitions.
    pub fn reexport_count(&self) -> usize {
        self.imports.iter().filter(|i| i.reexport).count()
    }
}

/// Extract the UTF-8 text of a node from the original source bytes.
pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Parse a source file and extract all definitions, imports, calls, and
/// heritage records.
///
/// Uses thread-local parsers so bulk extraction can run under rayon without
/// lock contention; single-file watcher updates go through the same path.
///
/// # Errors
/// Returns an error if the grammar for `lang` is unavailable or tree-sitter
/// fails to produce a tree (malformed / truncated source). Both are
/// skippable per-file conditions for the caller.
pub fn parse_file(path: &Path, source: &[u8], lang: LanguageKind) -> Result<FileFacts> {
    let tree = match lang {
        LanguageKind::TypeScript => PARSER_TS.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::Tsx => PARSER_TSX.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::JavaScript => PARSER_JS.with(|p| p.borrow_mut().parse(source, None)),
        LanguageKind::Python => parse_optional(&PARSER_PY, source, lang)?,
        LanguageKind::Hcl => parse_optional(&PARSER_HCL, source, lang)?,
    };
    let tree = tree.ok_or_else(|| anyhow!("tree-sitter returned None for {:?}", path))?;

    extract_facts(&tree, source, lang)
        .with_context(|| format!("extraction failed for {:?}", path))
}

fn parse_optional(
    slot: &'static std::thread::LocalKey<RefCell<Option<Parser>>>,
    source: &[u8],
    lang: LanguageKind,
) -> Result<Option<Tree>> {
    slot.with(|p| match p.borrow_mut().as_mut() {
        Some(parser) => Ok(parser.parse(source, None)),
        None => Err(anyhow!("{} grammar unavailable", lang.display_name())),
    })
}

fn extract_facts(tree: &Tree, source: &[u8], lang: LanguageKind) -> Result<FileFacts> {
    match lang {
        LanguageKind::TypeScript | LanguageKind::Tsx | LanguageKind::JavaScript => {
            let grammar = lang.grammar();
            let (definitions, exports_from_defs) =
                symbols::extract_js_definitions(tree, source, &grammar, lang);
            let (imports, exports) = imports::extract_js_imports(tree, source, &grammar, lang);
            let calls = calls::extract_js_calls(tree, source, &grammar, lang);
            let heritage = calls::extract_js_heritage(tree, source, &grammar, lang);
            let mut all_exports = exports;
            all_exports.extend(exports_from_defs);
            Ok(FileFacts {
                definitions,
                exports: all_exports,
                imports,
                calls,
                heritage,
            })
        }
        LanguageKind::Python => {
            let grammar = lang.grammar();
            let definitions = symbols::extract_python_definitions(tree, source, &grammar);
            let imports = imports::extract_python_imports(tree, source, &grammar);
            let calls = calls::extract_python_calls(tree, source, &grammar);
            let heritage = calls::extract_python_heritage(tree, source, &grammar);
            let exports = definitions.iter().map(|d| d.name.clone()).collect();
            Ok(FileFacts {
                definitions,
                exports,
                imports,
                calls,
                heritage,
            })
        }
        LanguageKind::Hcl => Ok(hcl::extract_hcl_facts(tree, source)),
    }
}

#[cfg(test)]
pub(crate) fn parse_fixture(source: &str, lang: LanguageKind) -> FileFacts {
    parse_file(Path::new("fixture"), source.as_bytes(), lang).expect("fixture parse")
}
