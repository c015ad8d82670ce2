pub mod diff;
pub mod impact;
pub mod map;
pub mod symbol;

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::graph::records::{EdgeKind, EdgeRow, NodeRow};
use crate::store::Store;

/// The stable pattern identifying test artifacts. Filtering by it is opt-in
/// on every reverse-reachability query.
pub const TEST_FILE_PATTERN: &str = r"\.(test|spec)\.|__test__|__tests__|\.stories\.";

static TEST_FILE_REGEX: OnceLock<Regex> = OnceLock::new();

pub fn test_file_regex() -> &'static Regex {
    TEST_FILE_REGEX.get_or_init(|| Regex::new(TEST_FILE_PATTERN).expect("valid test-file pattern"))
}

pub fn is_test_file(path: &str) -> bool {
    test_file_regex().is_match(path)
}

/// Read-side snapshot of the graph, loaded once per query call.
///
/// Adjacency lists index into `edges`; node positions index into `nodes`.
pub(crate) struct GraphView {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
    pub by_id: HashMap<i64, usize>,
    pub by_name: HashMap<String, Vec<usize>>,
    pub file_ids: HashMap<String, i64>,
    pub incoming: HashMap<i64, Vec<usize>>,
    pub outgoing: HashMap<i64, Vec<usize>>,
}

impl GraphView {
    pub fn load(store: &Store) -> Result<GraphView> {
        let nodes = store.load_nodes()?;
        let edges = store.load_edges()?;

        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut file_ids = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            by_id.insert(node.id, i);
            by_name.entry(node.name.clone()).or_default().push(i);
            if node.kind == crate::graph::records::NodeKind::File {
                file_ids.insert(node.file.clone(), node.id);
            }
        }

        let mut incoming: HashMap<i64, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            incoming.entry(edge.target_id).or_default().push(i);
            outgoing.entry(edge.source_id).or_default().push(i);
        }

        Ok(GraphView {
            nodes,
            edges,
            by_id,
            by_name,
            file_ids,
            incoming,
            outgoing,
        })
    }

    pub fn node(&self, id: i64) -> Option<&NodeRow> {
        self.by_id.get(&id).map(|&i| &self.nodes[i])
    }

    /// Edges of `kind` arriving at `id`.
    pub fn incoming_of_kind(&self, id: i64, kind: EdgeKind) -> impl Iterator<Item = &EdgeRow> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(move |e| e.kind == kind)
    }

    /// Edges of `kind` leaving `id`.
    pub fn outgoing_of_kind(&self, id: i64, kind: EdgeKind) -> impl Iterator<Item = &EdgeRow> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
            .filter(move |e| e.kind == kind)
    }
}
