pub mod records;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;

use crate::language::{Capabilities, LanguageKind};
use crate::parser::{self, CallRecord, FileFacts, HeritageKind, ImportRecord};
use crate::resolver::barrel::BarrelMap;
use crate::resolver::{ImportResolver, Resolution};
use crate::store::{Store, WriteStatements};
use crate::walker::{ExcludeRules, relative_key, walk_workspace};
use records::{EdgeKind, NodeKind};

/// Counters reported after a build.
#[derive(Debug, Default)]
pub struct BuildStats {
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Files excluded from this build (unreadable, parse error, grammar
    /// unavailable).
    pub skipped: usize,
}

/// Extraction output retained between builds so watch-mode deltas can
/// re-resolve barrels and cross-file edges without re-parsing the world.
pub struct BuildState {
    pub root: PathBuf,
    pub caps: Capabilities,
    pub facts: BTreeMap<String, FileFacts>,
}

/// Run the full pipeline: enumerate, parse, extract, then write both passes.
pub fn build_graph(
    root: &Path,
    store: &mut Store,
    caps: Capabilities,
    verbose: bool,
) -> Result<(BuildState, BuildStats)> {
    let (facts, skipped) = extract_workspace(root, caps, verbose);

    let mut stats = write_full(store, root, &facts)?;
    stats.skipped = skipped;

    Ok((
        BuildState {
            root: root.to_path_buf(),
            caps,
            facts,
        },
        stats,
    ))
}

/// Enumerate and extract the whole workspace. Parsing and extraction run in
/// parallel per file; the result map is keyed and ordered by
/// workspace-relative path, which restores the stable ordering storage
/// depends on.
pub fn extract_workspace(
    root: &Path,
    caps: Capabilities,
    verbose: bool,
) -> (BTreeMap<String, FileFacts>, usize) {
    // A malformed codegraph.toml is skippable: warn once and walk without
    // the extra exclusions, same as an absent optional grammar.
    let excludes = match ExcludeRules::load(root) {
        Ok(rules) => rules,
        Err(err) => {
            eprintln!("warning: {err:#}");
            ExcludeRules::default()
        }
    };
    let files = walk_workspace(root, &excludes, verbose);

    // One warning per absent optional grammar, only when files need it.
    for lang in caps.missing() {
        if files.iter().any(|f| LanguageKind::for_path(f) == Some(lang)) {
            eprintln!(
                "warning: {} grammar unavailable, skipping {} files this build",
                lang.display_name(),
                lang.display_name()
            );
        }
    }

    let results: Vec<Option<(String, FileFacts)>> = files
        .par_iter()
        .map(|path| {
            let lang = LanguageKind::for_path(path)?;
            if !caps.supports(lang) {
                return None;
            }
            let source = match std::fs::read(path) {
                Ok(s) => s,
                Err(err) => {
                    eprintln!("warning: failed to read {}: {err}", path.display());
                    return None;
                }
            };
            match parser::parse_file(path, &source, lang) {
                Ok(facts) => Some((relative_key(root, path), facts)),
                Err(err) => {
                    eprintln!("warning: skipping {}: {err}", path.display());
                    None
                }
            }
        })
        .collect();

    let total = files.len();
    let facts: BTreeMap<String, FileFacts> = results.into_iter().flatten().collect();
    let skipped = total - facts.len();
    (facts, skipped)
}

/// Atomic full rebuild: clear both tables and repopulate, two passes, one
/// write transaction each.
pub fn write_full(
    store: &mut Store,
    root: &Path,
    facts: &BTreeMap<String, FileFacts>,
) -> Result<BuildStats> {
    let resolver = ImportResolver::new(root, facts.keys().cloned().collect());
    let barrels = BarrelMap::build(facts, &resolver);

    let conn = store.conn_mut();

    // Pass 1: node materialization.
    let mut index = NodeIndex::default();
    let tx = conn.transaction()?;
    {
        tx.execute("DELETE FROM edges", [])?;
        tx.execute("DELETE FROM nodes", [])?;
        let mut stmts = WriteStatements::prepare(&tx)?;
        for (file, file_facts) in facts {
            for node in insert_nodes_for_file(&mut stmts, file, file_facts)? {
                index.push(node);
            }
        }
    }
    tx.commit()?;
    index.finalize();

    // Pass 2: edge construction.
    let mut edges = 0;
    let tx = conn.transaction()?;
    {
        let mut stmts = WriteStatements::prepare(&tx)?;
        for (file, file_facts) in facts {
            edges += add_edges_for_file(&mut stmts, &index, file, file_facts, &resolver, &barrels)?;
        }
    }
    tx.commit()?;

    Ok(BuildStats {
        files: facts.len(),
        nodes: index.nodes.len(),
        edges,
        skipped: 0,
    })
}

/// Apply the incremental delta for one changed or deleted file.
///
/// Deletes the file's nodes and every edge touching them, re-inserts the
/// file's nodes from fresh extraction, then reconstructs edges against the
/// preserved node ids so that cross-file edges into the changed file come
/// back. The whole delta is one transaction.
pub fn apply_file_delta(store: &mut Store, state: &mut BuildState, changed: &Path) -> Result<()> {
    let rel = relative_key(&state.root, changed);

    let new_facts = if changed.exists() {
        match LanguageKind::for_path(changed) {
            Some(lang) if state.caps.supports(lang) => match std::fs::read(changed) {
                Ok(source) => match parser::parse_file(changed, &source, lang) {
                    Ok(facts) => Some(facts),
                    Err(err) => {
                        eprintln!("warning: skipping {}: {err}", changed.display());
                        None
                    }
                },
                Err(_) => None,
            },
            _ => None,
        }
    } else {
        None
    };

    match new_facts {
        Some(facts) => {
            state.facts.insert(rel.clone(), facts);
        }
        None => {
            state.facts.remove(&rel);
        }
    }

    write_delta(store, &state.root, &state.facts, &rel)
}

fn write_delta(
    store: &mut Store,
    root: &Path,
    facts: &BTreeMap<String, FileFacts>,
    changed_rel: &str,
) -> Result<()> {
    let resolver = ImportResolver::new(root, facts.keys().cloned().collect());
    let barrels = BarrelMap::build(facts, &resolver);

    let conn = store.conn_mut();
    let tx = conn.transaction()?;
    {
        // The file's nodes and every edge touching them go first; ids of
        // untouched nodes are preserved.
        tx.execute(
            "DELETE FROM edges
             WHERE source_id IN (SELECT id FROM nodes WHERE file = ?1)
                OR target_id IN (SELECT id FROM nodes WHERE file = ?1)",
            [changed_rel],
        )?;
        tx.execute("DELETE FROM nodes WHERE file = ?1", [changed_rel])?;

        let mut stmts = WriteStatements::prepare(&tx)?;
        if let Some(file_facts) = facts.get(changed_rel) {
            insert_nodes_for_file(&mut stmts, changed_rel, file_facts)?;
        }

        // Remaining edges are rebuilt wholesale from the retained facts;
        // anything that referenced the changed file reappears, matching a
        // full rebuild restricted to surviving files.
        tx.execute("DELETE FROM edges", [])?;
        let mut index = NodeIndex::from_conn(&tx)?;
        index.finalize();
        for (file, file_facts) in facts {
            add_edges_for_file(&mut stmts, &index, file, file_facts, &resolver, &barrels)?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Node index
// ---------------------------------------------------------------------------

struct IndexedNode {
    id: i64,
    name: String,
    kind: NodeKind,
    file: String,
    line: u32,
}

/// In-memory lookup structure over the nodes of one build, used by edge
/// construction. Insertion order matches storage id order, which keeps
/// same-line caller attribution ("last wins") aligned with extraction order.
#[derive(Default)]
struct NodeIndex {
    nodes: Vec<IndexedNode>,
    by_name: HashMap<String, Vec<usize>>,
    method_suffix: HashMap<String, Vec<usize>>,
    file_ids: HashMap<String, i64>,
    defs_by_file: HashMap<String, Vec<usize>>,
}

impl NodeIndex {
    fn push(&mut self, node: IndexedNode) {
        let idx = self.nodes.len();
        if node.kind == NodeKind::File {
            self.file_ids.insert(node.file.clone(), node.id);
        } else {
            self.defs_by_file
                .entry(node.file.clone())
                .or_default()
                .push(idx);
            if node.kind == NodeKind::Method
                && let Some(suffix) = node.name.rsplit('.').next()
            {
                self.method_suffix
                    .entry(suffix.to_owned())
                    .or_default()
                    .push(idx);
            }
        }
        self.by_name.entry(node.name.clone()).or_default().push(idx);
        self.nodes.push(node);
    }

    /// Load the index from storage (delta path). `ORDER BY id` restores
    /// insertion order.
    fn from_conn(conn: &rusqlite::Connection) -> Result<NodeIndex> {
        let mut index = NodeIndex::default();
        let mut stmt = conn.prepare("SELECT id, name, kind, file, line FROM nodes ORDER BY id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kind_str: String = row.get(2)?;
            let Some(kind) = NodeKind::from_str(&kind_str) else {
                continue;
            };
            index.push(IndexedNode {
                id: row.get(0)?,
                name: row.get(1)?,
                kind,
                file: row.get(3)?,
                line: row.get(4)?,
            });
        }
        Ok(index)
    }

    /// Sort per-file definitions by start line. The sort is stable, so
    /// same-line definitions keep extraction order and the last one wins
    /// during caller attribution.
    fn finalize(&mut self) {
        for defs in self.defs_by_file.values_mut() {
            defs.sort_by_key(|&i| self.nodes[i].line);
        }
    }

    /// The definition in `file` with the greatest start line <= `line`;
    /// ties attribute to the last seen.
    fn caller_for_line(&self, file: &str, line: u32) -> Option<&IndexedNode> {
        let defs = self.defs_by_file.get(file)?;
        let cut = defs.partition_point(|&i| self.nodes[i].line <= line);
        if cut == 0 {
            return None;
        }
        Some(&self.nodes[defs[cut - 1]])
    }

    fn lookup(&self, name: &str) -> &[usize] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Pass 1: node materialization
// ---------------------------------------------------------------------------

/// Insert the file node, one node per definition, and one per export
/// (duplicates silently deduplicated by the uniqueness invariant).
fn insert_nodes_for_file(
    stmts: &mut WriteStatements,
    file: &str,
    facts: &FileFacts,
) -> Result<Vec<IndexedNode>> {
    let mut out = Vec::with_capacity(facts.definitions.len() + 1);
    let mut seen: HashSet<(String, NodeKind, u32)> = HashSet::new();

    let file_id = stmts.insert_node(file, NodeKind::File, file, 0, None)?;
    out.push(IndexedNode {
        id: file_id,
        name: file.to_owned(),
        kind: NodeKind::File,
        file: file.to_owned(),
        line: 0,
    });

    for def in &facts.definitions {
        if !seen.insert((def.name.clone(), def.kind, def.line)) {
            continue;
        }
        let id = stmts.insert_node(&def.name, def.kind, file, def.line, def.end_line)?;
        out.push(IndexedNode {
            id,
            name: def.name.clone(),
            kind: def.kind,
            file: file.to_owned(),
            line: def.line,
        });
    }

    // Exported names re-declare their definition; the insert dedups to the
    // existing row.
    for name in &facts.exports {
        if let Some(def) = facts.definitions.iter().find(|d| &d.name == name) {
            stmts.insert_node(&def.name, def.kind, file, def.line, def.end_line)?;
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Pass 2: edge construction
// ---------------------------------------------------------------------------

fn resolve_import(resolver: &ImportResolver, file: &str, rec: &ImportRecord) -> Resolution {
    if file.ends_with(".py") {
        resolver.resolve_python(&rec.source, file)
    } else if file.ends_with(".tf") || file.ends_with(".hcl") {
        resolver.resolve_hcl(&rec.source, file)
    } else {
        resolver.resolve(&rec.source, file)
    }
}

fn add_edges_for_file(
    stmts: &mut WriteStatements,
    index: &NodeIndex,
    file: &str,
    facts: &FileFacts,
    resolver: &ImportResolver,
    barrels: &BarrelMap,
) -> Result<usize> {
    let Some(&file_id) = index.file_ids.get(file) else {
        return Ok(0);
    };
    let mut edges = 0;

    // Resolve each import once; both the edge pass and the imported-names
    // map read from this.
    let resolved: Vec<Option<String>> = facts
        .imports
        .iter()
        .map(|rec| match resolve_import(resolver, file, rec) {
            Resolution::Resolved(target) => Some(target),
            Resolution::Unresolved(_) => None,
        })
        .collect();

    // Import edges.
    for (rec, target) in facts.imports.iter().zip(&resolved) {
        let Some(target) = target else { continue };
        let Some(&target_id) = index.file_ids.get(target) else {
            continue;
        };

        if target_id != file_id {
            let kind = if rec.type_only {
                EdgeKind::ImportsType
            } else if rec.reexport {
                EdgeKind::Reexports
            } else {
                EdgeKind::Imports
            };
            stmts.insert_edge(file_id, target_id, kind, 1.0, false)?;
            edges += 1;
        }

        // Barrel indirection: when an import targets a barrel and asks for
        // names, link the importer straight to each ultimate defining file
        // at lowered confidence, keeping the original edge to the barrel.
        if !rec.reexport && !rec.wildcard && barrels.is_barrel(target) {
            let mut finals: HashSet<String> = HashSet::new();
            for name in &rec.names {
                if let Some(final_file) = barrels.resolve_name(target, name)
                    && final_file != *target
                    && finals.insert(final_file.clone())
                    && let Some(&final_id) = index.file_ids.get(&final_file)
                    && final_id != file_id
                {
                    stmts.insert_edge(file_id, final_id, EdgeKind::Imports, 0.9, false)?;
                    edges += 1;
                }
            }
        }
    }

    // Imported-names map: local binding -> resolved target file. Wildcard
    // forms contribute nothing; `* as X` already arrives normalized to `X`.
    let mut imported: HashMap<&str, &str> = HashMap::new();
    for (rec, target) in facts.imports.iter().zip(&resolved) {
        if rec.wildcard {
            continue;
        }
        if let Some(target) = target {
            for name in &rec.names {
                imported.insert(name.as_str(), target.as_str());
            }
        }
    }

    // Call edges.
    for call in &facts.calls {
        let caller_id = index
            .caller_for_line(file, call.line)
            .map(|n| n.id)
            .unwrap_or(file_id);

        let (candidates, origin) = resolve_call_targets(index, barrels, &imported, file, call);
        if candidates.is_empty() {
            continue;
        }

        let mut scored: Vec<(f64, usize)> = candidates
            .into_iter()
            .map(|i| (call_confidence(file, &index.nodes[i], origin.as_deref()), i))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (confidence, i) in scored {
            let target_id = index.nodes[i].id;
            if target_id == caller_id {
                continue;
            }
            stmts.insert_edge(caller_id, target_id, EdgeKind::Calls, confidence, call.dynamic)?;
            edges += 1;
        }
    }

    // Heritage edges. Ambiguous parent names produce multiple edges; readers
    // filter by file proximity.
    for heritage in &facts.heritage {
        let source = index
            .lookup(&heritage.class_name)
            .iter()
            .map(|&i| &index.nodes[i])
            .find(|n| n.file == file && n.kind == NodeKind::Class);
        let Some(source) = source else { continue };

        let (edge_kind, target_ok): (EdgeKind, fn(NodeKind) -> bool) = match heritage.kind {
            HeritageKind::Extends => (EdgeKind::Extends, |k| k == NodeKind::Class),
            HeritageKind::Implements => (
                EdgeKind::Implements,
                |k| matches!(k, NodeKind::Interface | NodeKind::Class),
            ),
        };

        for &i in index.lookup(&heritage.parent) {
            let target = &index.nodes[i];
            if !target_ok(target.kind) || target.id == source.id {
                continue;
            }
            stmts.insert_edge(source.id, target.id, edge_kind, 1.0, false)?;
            edges += 1;
        }
    }

    Ok(edges)
}

/// Resolve a call's target candidates, stopping at the first tier that
/// yields matches:
/// 1. the imported target (following barrel chains when the direct search
///    comes up empty),
/// 2. the caller's own file,
/// 3. method-suffix match (`%.name`, kind method),
/// 4. global exact-name lookup.
///
/// Returns the candidates plus the effective import origin for the called
/// name: the file the name was imported from, or the end of the barrel
/// chain when tier 1 resolved through one. Targets in that file score 1.0.
fn resolve_call_targets(
    index: &NodeIndex,
    barrels: &BarrelMap,
    imported: &HashMap<&str, &str>,
    file: &str,
    call: &CallRecord,
) -> (Vec<usize>, Option<String>) {
    let mut origin: Option<String> = imported.get(call.name.as_str()).map(|&o| o.to_owned());

    if let Some(&direct) = imported.get(call.name.as_str()) {
        let hits: Vec<usize> = index
            .lookup(&call.name)
            .iter()
            .copied()
            .filter(|&i| index.nodes[i].file == direct && index.nodes[i].kind.is_call_target())
            .collect();
        if !hits.is_empty() {
            return (hits, origin);
        }
        if barrels.is_barrel(direct)
            && let Some(final_file) = barrels.resolve_name(direct, &call.name)
        {
            let hits: Vec<usize> = index
                .lookup(&call.name)
                .iter()
                .copied()
                .filter(|&i| index.nodes[i].file == final_file && index.nodes[i].kind.is_call_target())
                .collect();
            if !hits.is_empty() {
                origin = Some(final_file);
                return (hits, origin);
            }
        }
    }

    // Same file as caller: any definition kind, so locally bound arrow
    // functions are reachable too.
    let hits: Vec<usize> = index
        .lookup(&call.name)
        .iter()
        .copied()
        .filter(|&i| index.nodes[i].file == file && index.nodes[i].kind != NodeKind::File)
        .collect();
    if !hits.is_empty() {
        return (hits, origin);
    }

    if let Some(methods) = index.method_suffix.get(&call.name)
        && !methods.is_empty()
    {
        return (methods.clone(), origin);
    }

    let hits = index
        .lookup(&call.name)
        .iter()
        .copied()
        .filter(|&i| index.nodes[i].kind.is_call_target())
        .collect();
    (hits, origin)
}

/// Confidence for one call candidate: 1.0 for same-file targets and import
/// origins, then 0.7 / 0.5 / 0.3 by directory proximity.
fn call_confidence(caller_file: &str, target: &IndexedNode, origin: Option<&str>) -> f64 {
    if caller_file == target.file {
        return 1.0;
    }
    if origin == Some(target.file.as_str()) {
        return 1.0;
    }
    if parent_dir(caller_file) == parent_dir(&target.file) {
        return 0.7;
    }
    if grandparent_dir(caller_file) == grandparent_dir(&target.file) {
        return 0.5;
    }
    0.3
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn grandparent_dir(path: &str) -> &str {
    parent_dir(parent_dir(path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::records::{EdgeRow, NodeRow};
    use std::fs;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn build(dir: &TempDir) -> (Store, BuildState, BuildStats) {
        let mut store = Store::in_memory().unwrap();
        let (state, stats) =
            build_graph(dir.path(), &mut store, Capabilities::probe(), false).unwrap();
        (store, state, stats)
    }

    fn node<'a>(nodes: &'a [NodeRow], name: &str) -> &'a NodeRow {
        nodes
            .iter()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("missing node {name}"))
    }

    fn edge_between<'a>(
        edges: &'a [EdgeRow],
        nodes: &[NodeRow],
        source: &str,
        target: &str,
        kind: EdgeKind,
    ) -> Option<&'a EdgeRow> {
        let source_id = node(nodes, source).id;
        let target_id = node(nodes, target).id;
        edges
            .iter()
            .find(|e| e.source_id == source_id && e.target_id == target_id && e.kind == kind)
    }

    #[test]
    fn test_simple_named_import_scenario() {
        let dir = fixture(&[
            ("a.ts", "import { foo } from './b.js';\nfoo();\n"),
            ("b.ts", "export function foo() {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        assert_eq!(node(&nodes, "a.ts").kind, NodeKind::File);
        assert_eq!(node(&nodes, "b.ts").kind, NodeKind::File);
        let foo = node(&nodes, "foo");
        assert_eq!(foo.kind, NodeKind::Function);
        assert_eq!(foo.file, "b.ts");

        let import = edge_between(&edges, &nodes, "a.ts", "b.ts", EdgeKind::Imports)
            .expect("a.ts must import b.ts");
        assert_eq!(import.confidence, 1.0);

        let call = edge_between(&edges, &nodes, "a.ts", "foo", EdgeKind::Calls)
            .expect("file-level call edge to foo");
        assert_eq!(call.confidence, 1.0);
        assert!(!call.dynamic);
    }

    #[test]
    fn test_barrel_indirection_scenario() {
        let dir = fixture(&[
            ("index.ts", "export { foo } from './impl';\n"),
            ("impl.ts", "export function foo() {}\n"),
            ("user.ts", "import { foo } from './index';\nfoo();\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let direct = edge_between(&edges, &nodes, "user.ts", "index.ts", EdgeKind::Imports)
            .expect("edge to the barrel itself");
        assert_eq!(direct.confidence, 1.0);

        let indirect = edge_between(&edges, &nodes, "user.ts", "impl.ts", EdgeKind::Imports)
            .expect("barrel indirection edge");
        assert_eq!(indirect.confidence, 0.9);

        let call = edge_between(&edges, &nodes, "user.ts", "foo", EdgeKind::Calls)
            .expect("call resolved through the barrel");
        assert_eq!(call.confidence, 1.0);
    }

    #[test]
    fn test_dynamic_call_edge() {
        let dir = fixture(&[
            ("a.ts", "import { h } from './b';\nh.call(null, 1);\n"),
            ("b.ts", "export function h() {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let call = edge_between(&edges, &nodes, "a.ts", "h", EdgeKind::Calls)
            .expect("dynamic call edge");
        assert!(call.dynamic);
    }

    #[test]
    fn test_computed_literal_call_edge() {
        let dir = fixture(&[
            ("a.ts", "import { run } from './b';\nconst obj = { run };\nobj[\"run\"](1);\n"),
            ("b.ts", "export function run() {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let call = edge_between(&edges, &nodes, "a.ts", "run", EdgeKind::Calls)
            .expect("computed literal call edge");
        assert!(call.dynamic);
    }

    #[test]
    fn test_caller_attribution_innermost_definition() {
        let dir = fixture(&[(
            "a.ts",
            "export function helper() {}\nexport function outer() {\n  helper();\n}\n",
        )]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let call = edge_between(&edges, &nodes, "outer", "helper", EdgeKind::Calls)
            .expect("call attributed to outer, not the file");
        assert_eq!(call.confidence, 1.0);
    }

    #[test]
    fn test_same_line_tie_attributes_to_last_definition() {
        // Two definitions share line 1; the call on line 1 must attribute to
        // the one extracted last (the nested arrow).
        let dir = fixture(&[(
            "a.ts",
            "function wrap() { const inner = () => { ping(); }; }\nfunction ping() {}\n",
        )]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        assert!(
            edge_between(&edges, &nodes, "inner", "ping", EdgeKind::Calls).is_some(),
            "tie on line 1 must attribute to the last-extracted definition"
        );
        assert!(edge_between(&edges, &nodes, "wrap", "ping", EdgeKind::Calls).is_none());
    }

    #[test]
    fn test_method_attribution_not_class() {
        let dir = fixture(&[(
            "a.ts",
            "function target() {}\nclass Service {\n  run() {\n    target();\n  }\n}\n",
        )]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        assert!(
            edge_between(&edges, &nodes, "Service.run", "target", EdgeKind::Calls).is_some(),
            "calls inside a method body attribute to the method node"
        );
    }

    #[test]
    fn test_heritage_edges() {
        let dir = fixture(&[(
            "a.ts",
            "interface IRun { go(): void; }\nclass Base {}\nclass Child extends Base implements IRun {\n  go() {}\n}\n",
        )]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let extends = edge_between(&edges, &nodes, "Child", "Base", EdgeKind::Extends)
            .expect("extends edge");
        assert_eq!(extends.confidence, 1.0);
        assert!(edge_between(&edges, &nodes, "Child", "IRun", EdgeKind::Implements).is_some());
    }

    #[test]
    fn test_type_only_import_edge_kind() {
        let dir = fixture(&[
            ("a.ts", "import type { Conf } from './b';\n"),
            ("b.ts", "export type Conf = string;\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();
        assert!(edge_between(&edges, &nodes, "a.ts", "b.ts", EdgeKind::ImportsType).is_some());
    }

    #[test]
    fn test_no_self_edges_and_endpoints_exist() {
        let dir = fixture(&[
            ("a.ts", "import { foo } from './b';\nexport function bar() { foo(); bar(); }\n"),
            ("b.ts", "export function foo() { foo(); }\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();
        let ids: HashSet<i64> = nodes.iter().map(|n| n.id).collect();
        for edge in &edges {
            assert_ne!(edge.source_id, edge.target_id, "no self-edges");
            assert!(ids.contains(&edge.source_id) && ids.contains(&edge.target_id));
        }
    }

    #[test]
    fn test_every_non_file_node_has_a_file_node() {
        let dir = fixture(&[
            ("src/a.ts", "export function foo() {}\nclass C {\n  m() {}\n}\n"),
            ("main.tf", "resource \"aws_s3_bucket\" \"b\" {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let file_paths: HashSet<&str> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::File)
            .map(|n| n.file.as_str())
            .collect();
        for n in nodes.iter().filter(|n| n.kind != NodeKind::File) {
            assert!(
                file_paths.contains(n.file.as_str()),
                "definition {} lacks a file node for {}",
                n.name,
                n.file
            );
        }
    }

    #[test]
    fn test_calls_confidence_values_are_tiered() {
        let dir = fixture(&[
            ("src/app/a.ts", "import { near } from './near';\nnear();\nfar();\nsib();\n"),
            ("src/app/near.ts", "export function near() {}\nexport function sib() {}\n"),
            ("lib/other/far.ts", "export function far() {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        let near = edge_between(&edges, &nodes, "src/app/a.ts", "near", EdgeKind::Calls).unwrap();
        assert_eq!(near.confidence, 1.0, "import origin scores 1.0");

        let sib = edge_between(&edges, &nodes, "src/app/a.ts", "sib", EdgeKind::Calls).unwrap();
        assert_eq!(sib.confidence, 0.7, "same directory scores 0.7");

        let far = edge_between(&edges, &nodes, "src/app/a.ts", "far", EdgeKind::Calls).unwrap();
        assert_eq!(far.confidence, 0.3);

        let allowed = [0.3, 0.5, 0.7, 0.9, 1.0];
        for e in edges.iter().filter(|e| e.kind == EdgeKind::Calls) {
            assert!(
                allowed.iter().any(|a| (a - e.confidence).abs() < 1e-9),
                "confidence {} outside the tier set",
                e.confidence
            );
        }
    }

    fn graph_fingerprint(store: &Store) -> (Vec<(String, String, String, u32)>, Vec<(i64, i64, String)>) {
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();
        let mut node_keys: Vec<_> = nodes
            .iter()
            .map(|n| (n.name.clone(), n.kind.as_str().to_owned(), n.file.clone(), n.line))
            .collect();
        node_keys.sort();
        let mut edge_keys: Vec<_> = edges
            .iter()
            .map(|e| (e.source_id, e.target_id, e.kind.as_str().to_owned()))
            .collect();
        edge_keys.sort();
        (node_keys, edge_keys)
    }

    #[test]
    fn test_round_trip_determinism() {
        let dir = fixture(&[
            ("a.ts", "import { foo } from './b';\nfoo();\n"),
            ("b.ts", "export function foo() {}\nexport class K {\n  m() {}\n}\n"),
            ("c.py", "from .b import nothing\n\ndef run():\n    foo()\n"),
        ]);

        let (store1, _, _) = build(&dir);
        let (store2, _, _) = build(&dir);
        assert_eq!(graph_fingerprint(&store1), graph_fingerprint(&store2));
    }

    #[test]
    fn test_incremental_delta_matches_full_rebuild() {
        let dir = fixture(&[
            ("a.ts", "import { foo } from './b';\nfoo();\n"),
            ("b.ts", "export function foo() {}\n"),
        ]);

        // Build, then change b.ts and apply the delta.
        let (mut store, mut state, _) = build(&dir);
        fs::write(
            dir.path().join("b.ts"),
            "export function foo() {}\nexport function extra() {}\n",
        )
        .unwrap();
        apply_file_delta(&mut store, &mut state, &dir.path().join("b.ts")).unwrap();

        // A from-scratch build over the modified tree must agree.
        let mut fresh = Store::in_memory().unwrap();
        build_graph(dir.path(), &mut fresh, Capabilities::probe(), false).unwrap();

        assert_eq!(graph_fingerprint(&store).0, graph_fingerprint(&fresh).0);
        // Edge fingerprints use ids; compare by resolved names instead.
        let name_edges = |store: &Store| {
            let nodes = store.load_nodes().unwrap();
            let by_id: HashMap<i64, String> =
                nodes.iter().map(|n| (n.id, n.name.clone())).collect();
            let mut out: Vec<(String, String, String)> = store
                .load_edges()
                .unwrap()
                .iter()
                .map(|e| {
                    (
                        by_id[&e.source_id].clone(),
                        by_id[&e.target_id].clone(),
                        e.kind.as_str().to_owned(),
                    )
                })
                .collect();
            out.sort();
            out
        };
        assert_eq!(name_edges(&store), name_edges(&fresh));
    }

    #[test]
    fn test_delta_for_deleted_file_removes_its_nodes() {
        let dir = fixture(&[
            ("a.ts", "import { foo } from './b';\nfoo();\n"),
            ("b.ts", "export function foo() {}\n"),
        ]);
        let (mut store, mut state, _) = build(&dir);
        let b_path = dir.path().join("b.ts");
        fs::remove_file(&b_path).unwrap();
        apply_file_delta(&mut store, &mut state, &b_path).unwrap();

        let nodes = store.load_nodes().unwrap();
        assert!(nodes.iter().all(|n| n.file != "b.ts"));
        let ids: HashSet<i64> = nodes.iter().map(|n| n.id).collect();
        for e in store.load_edges().unwrap() {
            assert!(ids.contains(&e.source_id) && ids.contains(&e.target_id));
        }
    }

    #[test]
    fn test_python_relative_import_and_method_nodes() {
        let dir = fixture(&[
            ("pkg/api.py", "from .impl import serve\n\ndef main():\n    serve()\n"),
            ("pkg/impl.py", "def serve():\n    pass\n\nclass Worker:\n    def run(self):\n        pass\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        assert!(edge_between(&edges, &nodes, "pkg/api.py", "pkg/impl.py", EdgeKind::Imports).is_some());
        assert!(edge_between(&edges, &nodes, "main", "serve", EdgeKind::Calls).is_some());
        assert_eq!(node(&nodes, "Worker.run").kind, NodeKind::Method);
    }

    #[test]
    fn test_hcl_module_import_edge() {
        let dir = fixture(&[
            ("main.tf", "module \"net\" {\n  source = \"./network\"\n}\n"),
            ("network/main.tf", "resource \"aws_vpc\" \"this\" {}\n"),
        ]);
        let (store, _, _) = build(&dir);
        let nodes = store.load_nodes().unwrap();
        let edges = store.load_edges().unwrap();

        assert_eq!(node(&nodes, "module.net").kind, NodeKind::Module);
        assert!(
            edge_between(&edges, &nodes, "main.tf", "network/main.tf", EdgeKind::Imports).is_some(),
            "module source directory resolves through the index probe"
        );
    }
}
