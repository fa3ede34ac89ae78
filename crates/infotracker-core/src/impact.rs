//! Impact analysis (spec.md §4.10, §6 `impact` subcommand): BFS traversal of
//! a [`ColumnGraph`] from a selected column, in a chosen direction, bounded by
//! an optional depth.
//!
//! Grounded on `original_source/src/infotracker/cli.py`'s `cmd_impact`, which
//! walks the same graph with a dbt-style selector (`+model`/`model+` prefix
//! or suffix forcing direction) and a depth cutoff; the BFS shape itself
//! follows the generic worklist pattern already used by
//! `ddl::procedure::scan_fragments`'s fragment walk.

use crate::graph::{ColumnGraph, GraphEdge};
use crate::types::{namespace_for_database, ColumnReference};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
    Both,
}

/// One column reached during a BFS impact walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactNode {
    pub reference: ColumnReference,
    pub depth: usize,
    pub via: Option<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError(pub String);

impl std::fmt::Display for SelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid selector: {}", self.0)
    }
}
impl std::error::Error for SelectorError {}

/// Parses a selector of the form `db.schema.table.col`, the two-part
/// shorthand `schema.table.col` (resolved against `default_database`), or
/// either form wrapped in leading/trailing `+` direction markers
/// (`+col` forces upstream, `col+` forces downstream, `+col+` forces both).
///
/// Returns the resolved column and an optional direction override; when no
/// `+` markers are present the second element is `None` and the caller's
/// `--direction` flag applies.
pub fn parse_selector(raw: &str, default_database: &str) -> Result<(ColumnReference, Option<Direction>), SelectorError> {
    let leading = raw.starts_with('+');
    let trimmed_leading = raw.strip_prefix('+').unwrap_or(raw);
    let trailing = trimmed_leading.ends_with('+');
    let body = trimmed_leading.strip_suffix('+').unwrap_or(trimmed_leading);

    let direction = match (leading, trailing) {
        (true, true) => Some(Direction::Both),
        (true, false) => Some(Direction::Upstream),
        (false, true) => Some(Direction::Downstream),
        (false, false) => None,
    };

    let segments: Vec<&str> = body.split('.').collect();
    let reference = match segments.as_slice() {
        [db, schema, table, col] => ColumnReference::in_database(db, format!("{schema}.{table}"), *col),
        [schema, table, col] => ColumnReference::new(namespace_for_database(default_database), format!("{schema}.{table}"), *col),
        _ => {
            return Err(SelectorError(format!(
                "expected 'db.schema.table.col' or 'schema.table.col', got '{body}'"
            )))
        }
    };
    Ok((reference, direction))
}

/// Walks `graph` starting at `start` in `direction`, bounded by `max_depth`
/// (`None` is unbounded). The start column itself is not included in the
/// result. BFS order makes results stable and depth-ordered.
pub fn walk(graph: &ColumnGraph, start: &ColumnReference, direction: Direction, max_depth: Option<usize>) -> Vec<ImpactNode> {
    let mut visited: HashSet<ColumnReference> = HashSet::new();
    visited.insert(start.clone());

    let mut queue: VecDeque<(ColumnReference, usize)> = VecDeque::new();
    queue.push_back((start.clone(), 0));

    let mut results = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if let Some(limit) = max_depth {
            if depth >= limit {
                continue;
            }
        }

        let mut neighbors: Vec<GraphEdge> = Vec::new();
        if matches!(direction, Direction::Upstream | Direction::Both) {
            neighbors.extend(graph.inbound(&current).cloned().map(|e| GraphEdge {
                from: e.to.clone(),
                to: e.from.clone(),
                transformation: e.transformation,
                description: e.description.clone(),
            }));
        }
        if matches!(direction, Direction::Downstream | Direction::Both) {
            neighbors.extend(graph.outbound(&current).cloned());
        }

        for edge in neighbors {
            let next = edge.to.clone();
            if visited.insert(next.clone()) {
                results.push(ImpactNode {
                    reference: next.clone(),
                    depth: depth + 1,
                    via: Some(edge),
                });
                queue.push_back((next, depth + 1));
            }
        }
    }

    results
}
