use anyhow::Result;
use serde::Serialize;

use crate::graph::records::{NodeKind, NodeRow};
use crate::query::GraphView;
use crate::query::impact::{CallerImpact, reverse_calls_bfs};
use crate::store::Store;

/// Changed line ranges for one file, 1-indexed and inclusive.
#[derive(Debug, Clone, Serialize)]
pub struct FileChanges {
    pub file: String,
    pub ranges: Vec<(u32, u32)>,
}

/// A definition overlapped by a change, with its transitive callers.
#[derive(Debug, Serialize)]
pub struct DiffImpact {
    #[serde(flatten)]
    pub definition: NodeRow,
    pub callers: Vec<CallerImpact>,
}

/// Diff-scoped impact: find definitions whose span overlaps any changed
/// range, then reverse-traverse `calls` up to `max_depth`.
///
/// A definition without an `end_line` spans to the next definition's start
/// line minus one, or to the end of file when it is the last one.
pub fn diff_impact(
    store: &Store,
    changes: &[FileChanges],
    max_depth: usize,
    exclude_tests: bool,
) -> Result<Vec<DiffImpact>> {
    let view = GraphView::load(store)?;
    let mut results = Vec::new();

    for change in changes {
        // Definitions in the file, ordered by start line.
        let mut defs: Vec<&NodeRow> = view
            .nodes
            .iter()
            .filter(|n| n.file == change.file && n.kind != NodeKind::File)
            .collect();
        defs.sort_by_key(|n| n.line);

        for (i, def) in defs.iter().enumerate() {
            let span_end = match def.end_line {
                Some(end) => end,
                None => defs
                    .get(i + 1)
                    .map(|next| next.line.saturating_sub(1))
                    .unwrap_or(u32::MAX),
            };

            let overlaps = change
                .ranges
                .iter()
                .any(|&(start, end)| def.line <= end && span_end >= start);
            if !overlaps {
                continue;
            }

            let callers = reverse_calls_bfs(&view, &[def.id], max_depth, exclude_tests);
            results.push(DiffImpact {
                definition: (*def).clone(),
                callers,
            });
        }
    }

    Ok(results)
}
