use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::graph::records::{EdgeKind, NodeKind, NodeRow};
use crate::query::{GraphView, is_test_file};
use crate::store::Store;

/// A file reached by reverse import traversal, annotated with its BFS level.
#[derive(Debug, Serialize)]
pub struct FileImpact {
    pub file: String,
    pub depth: usize,
}

/// A caller reached by reverse call traversal.
#[derive(Debug, Serialize)]
pub struct CallerImpact {
    #[serde(flatten)]
    pub node: NodeRow,
    pub depth: usize,
}

/// File-level impact: breadth-first reverse traversal over `imports` and
/// `imports-type` edges from the given file node.
pub fn file_impact(store: &Store, file: &str, exclude_tests: bool) -> Result<Vec<FileImpact>> {
    let view = GraphView::load(store)?;
    let &start = view
        .file_ids
        .get(file)
        .ok_or_else(|| anyhow!("file not in graph: {file}"))?;

    let mut visited: HashSet<i64> = HashSet::new();
    let mut depths: HashMap<i64, usize> = HashMap::new();
    let mut queue: VecDeque<i64> = VecDeque::new();
    visited.insert(start);
    depths.insert(start, 0);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let depth = depths[&current];
        for kind in [EdgeKind::Imports, EdgeKind::ImportsType] {
            for edge in view.incoming_of_kind(current, kind) {
                if visited.insert(edge.source_id) {
                    depths.insert(edge.source_id, depth + 1);
                    queue.push_back(edge.source_id);
                }
            }
        }
    }

    let mut results: Vec<FileImpact> = visited
        .iter()
        .filter(|&&id| id != start)
        .filter_map(|&id| view.node(id))
        .filter(|n| n.kind == NodeKind::File)
        .filter(|n| !exclude_tests || !is_test_file(&n.file))
        .map(|n| FileImpact {
            file: n.file.clone(),
            depth: depths[&n.id],
        })
        .collect();

    results.sort_by(|a, b| a.depth.cmp(&b.depth).then(a.file.cmp(&b.file)));
    Ok(results)
}

/// Function-level impact: reverse BFS over `calls` edges from every node
/// exactly named `name`, bounded by `max_depth`.
pub fn function_impact(
    store: &Store,
    name: &str,
    max_depth: usize,
    exclude_tests: bool,
) -> Result<Vec<CallerImpact>> {
    let view = GraphView::load(store)?;
    let seeds: Vec<i64> = view
        .by_name
        .get(name)
        .into_iter()
        .flatten()
        .map(|&i| view.nodes[i].id)
        .collect();
    if seeds.is_empty() {
        return Err(anyhow!("symbol not in graph: {name}"));
    }

    Ok(reverse_calls_bfs(&view, &seeds, max_depth, exclude_tests))
}

/// Shared reverse-`calls` BFS used by function impact and diff impact.
pub(crate) fn reverse_calls_bfs(
    view: &GraphView,
    seeds: &[i64],
    max_depth: usize,
    exclude_tests: bool,
) -> Vec<CallerImpact> {
    let mut visited: HashSet<i64> = HashSet::new();
    let mut depths: HashMap<i64, usize> = HashMap::new();
    let mut queue: VecDeque<i64> = VecDeque::new();

    for &seed in seeds {
        if visited.insert(seed) {
            depths.insert(seed, 0);
            queue.push_back(seed);
        }
    }

    while let Some(current) = queue.pop_front() {
        let depth = depths[&current];
        if depth >= max_depth {
            continue;
        }
        for edge in view.incoming_of_kind(current, EdgeKind::Calls) {
            if visited.insert(edge.source_id) {
                depths.insert(edge.source_id, depth + 1);
                queue.push_back(edge.source_id);
            }
        }
    }

    let mut results: Vec<CallerImpact> = visited
        .iter()
        .filter(|&&id| depths[&id] > 0)
        .filter_map(|&id| view.node(id))
        .filter(|n| !exclude_tests || !is_test_file(&n.file))
        .map(|n| CallerImpact {
            node: n.clone(),
            depth: depths[&n.id],
        })
        .collect();

    results.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then(a.node.file.cmp(&b.node.file))
            .then(a.node.name.cmp(&b.node.name))
    });
    results
}
