use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use serde::Serialize;

use crate::graph::records::{EdgeKind, NodeKind, NodeRow};
use crate::query::{GraphView, is_test_file};
use crate::store::Store;

/// One caller or callee of a matched symbol.
#[derive(Debug, Serialize)]
pub struct LinkedNode {
    #[serde(flatten)]
    pub node: NodeRow,
    pub confidence: f64,
    pub dynamic: bool,
    /// For hierarchy-expanded callers: the extends path that contributed the
    /// match, e.g. `"Child -> Parent"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

/// A symbol matched by substring lookup, with its call neighborhood.
#[derive(Debug, Serialize)]
pub struct SymbolReport {
    #[serde(flatten)]
    pub node: NodeRow,
    pub callers: Vec<LinkedNode>,
    pub callees: Vec<LinkedNode>,
}

/// Look up symbols by substring of `name` and report callers and callees of
/// each match.
///
/// When the matched node is a method `C.m`, callers of `A.m` are included
/// for every ancestor `A` of `C` reachable via `extends`, annotated with the
/// hierarchy path used.
pub fn lookup_symbol(store: &Store, query: &str, exclude_tests: bool) -> Result<Vec<SymbolReport>> {
    let view = GraphView::load(store)?;
    let mut reports = Vec::new();

    for node in &view.nodes {
        if node.kind == NodeKind::File || !node.name.contains(query) {
            continue;
        }

        let mut callers = direct_callers(&view, node.id, None);
        callers.extend(hierarchy_callers(&view, node));
        let mut callees: Vec<LinkedNode> = view
            .outgoing_of_kind(node.id, EdgeKind::Calls)
            .filter_map(|e| {
                view.node(e.target_id).map(|target| LinkedNode {
                    node: target.clone(),
                    confidence: e.confidence,
                    dynamic: e.dynamic,
                    via: None,
                })
            })
            .collect();

        if exclude_tests {
            callers.retain(|c| !is_test_file(&c.node.file));
            callees.retain(|c| !is_test_file(&c.node.file));
        }

        // Highest-confidence first; consumers read the top of the list.
        callers.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        callees.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        reports.push(SymbolReport {
            node: node.clone(),
            callers,
            callees,
        });
    }

    Ok(reports)
}

fn direct_callers(view: &GraphView, id: i64, via: Option<&str>) -> Vec<LinkedNode> {
    view.incoming_of_kind(id, EdgeKind::Calls)
        .filter_map(|e| {
            view.node(e.source_id).map(|source| LinkedNode {
                node: source.clone(),
                confidence: e.confidence,
                dynamic: e.dynamic,
                via: via.map(str::to_owned),
            })
        })
        .collect()
}

/// For a method `C.m`, walk `extends` edges from `C` upward and collect the
/// callers of each ancestor's `m` override.
fn hierarchy_callers(view: &GraphView, node: &NodeRow) -> Vec<LinkedNode> {
    if node.kind != NodeKind::Method {
        return Vec::new();
    }
    let Some((class_name, method_name)) = node.name.rsplit_once('.') else {
        return Vec::new();
    };

    // The class node for `C`, preferring the method's own file.
    let class_indices = match view.by_name.get(class_name) {
        Some(indices) => indices,
        None => return Vec::new(),
    };
    let start = class_indices
        .iter()
        .map(|&i| &view.nodes[i])
        .filter(|n| n.kind == NodeKind::Class)
        .max_by_key(|n| n.file == node.file);
    let Some(start) = start else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut queue: VecDeque<(i64, String)> = VecDeque::new();
    visited.insert(start.id);
    queue.push_back((start.id, start.name.clone()));

    while let Some((class_id, path)) = queue.pop_front() {
        for edge in view.outgoing_of_kind(class_id, EdgeKind::Extends) {
            let Some(ancestor) = view.node(edge.target_id) else {
                continue;
            };
            if ancestor.kind != NodeKind::Class || !visited.insert(ancestor.id) {
                continue;
            }
            let path = format!("{path} -> {}", ancestor.name);

            let override_name = format!("{}.{method_name}", ancestor.name);
            if let Some(indices) = view.by_name.get(&override_name) {
                for &i in indices {
                    let candidate = &view.nodes[i];
                    if candidate.kind == NodeKind::Method && candidate.file == ancestor.file {
                        out.extend(direct_callers(view, candidate.id, Some(&path)));
                    }
                }
            }

            queue.push_back((ancestor.id, path));
        }
    }

    out
}
