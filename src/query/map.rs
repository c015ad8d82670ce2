use anyhow::Result;
use serde::Serialize;

use crate::graph::records::NodeKind;
use crate::query::{GraphView, is_test_file};
use crate::store::Store;

/// One entry of the module map: a file ranked by how many edges point at it.
#[derive(Debug, Serialize)]
pub struct ModuleRank {
    pub file: String,
    pub inbound: usize,
}

/// Rank file nodes by inbound edge count, test files excluded.
pub fn module_map(store: &Store, limit: usize) -> Result<Vec<ModuleRank>> {
    let view = GraphView::load(store)?;

    let mut ranks: Vec<ModuleRank> = view
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::File && !is_test_file(&n.file))
        .map(|n| ModuleRank {
            file: n.file.clone(),
            inbound: view.incoming.get(&n.id).map(Vec::len).unwrap_or(0),
        })
        .collect();

    ranks.sort_by(|a, b| b.inbound.cmp(&a.inbound).then(a.file.cmp(&b.file)));
    ranks.truncate(limit);
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::language::Capabilities;
    use std::fs;

    #[test]
    fn test_module_map_ranks_by_inbound_edges() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            ("core.ts", "export function core() {}\n"),
            ("a.ts", "import { core } from './core';\ncore();\n"),
            ("b.ts", "import { core } from './core';\ncore();\n"),
            ("core.test.ts", "import { core } from './core';\ncore();\n"),
        ];
        for (rel, content) in files {
            fs::write(dir.path().join(rel), content).unwrap();
        }
        let mut store = Store::in_memory().unwrap();
        build_graph(dir.path(), &mut store, Capabilities::probe(), false).unwrap();

        let ranks = module_map(&store, 10).unwrap();
        assert_eq!(ranks[0].file, "core.ts");
        assert!(ranks[0].inbound >= 3, "two importers plus the test file");
        assert!(
            ranks.iter().all(|r| r.file != "core.test.ts"),
            "test files are excluded from the map"
        );
    }
}
