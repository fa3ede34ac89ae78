//! The cross-file column graph (spec.md §4.10): a deduplicated set of
//! column-to-column edges aggregated from every extracted [`ObjectInfo`].
//!
//! The edge/dedup shape here is grounded on spec.md §4.10 directly, and on
//! `original_source/src/infotracker/cli.py`'s `build_column_graph` for the
//! "one edge per (from, to, transformation) triple, in file-then-column
//! order" aggregation rule.

use crate::types::{ColumnReference, ObjectInfo, TransformationKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One column-to-column edge: `from` feeds `to` via `transformation`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: ColumnReference,
    pub to: ColumnReference,
    pub transformation: TransformationKind,
    pub description: String,
}

/// The aggregated, deduplicated column graph for a corpus (written out as
/// `column_graph.json` by `infotracker-export`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGraph {
    pub edges: Vec<GraphEdge>,
}

impl ColumnGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a corpus of extracted objects (spec.md §8 P2:
    /// "the column graph built from a corpus's `ObjectInfo`s contains no
    /// duplicate edges"). Objects are processed in the order given, so
    /// supplying them in a stable (e.g. sorted-by-path) order makes the
    /// resulting edge order stable too.
    pub fn build(objects: &[ObjectInfo]) -> Self {
        let mut graph = Self::new();
        for object in objects {
            graph.absorb(object);
        }
        graph
    }

    /// Folds one object's lineage into the graph, skipping edges already present.
    pub fn absorb(&mut self, object: &ObjectInfo) {
        let mut seen: HashSet<(String, String, &'static str)> = self
            .edges
            .iter()
            .map(|e| (e.from.to_uri(), e.to.to_uri(), e.transformation.as_str()))
            .collect();

        for lineage in &object.lineage {
            let to = ColumnReference::new(
                object.schema.namespace.clone(),
                object.qualified_name.clone(),
                lineage.output_column.clone(),
            );
            for from in &lineage.input_fields {
                let key = (from.to_uri(), to.to_uri(), lineage.transformation_type.as_str());
                if seen.insert(key) {
                    self.edges.push(GraphEdge {
                        from: from.clone(),
                        to: to.clone(),
                        transformation: lineage.transformation_type,
                        description: lineage.transformation_description.clone(),
                    });
                }
            }
        }
    }

    /// All distinct edges whose `to` matches `reference` (direct upstream neighbors).
    pub fn inbound(&self, reference: &ColumnReference) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| &e.to == reference)
    }

    /// All distinct edges whose `from` matches `reference` (direct downstream neighbors).
    pub fn outbound(&self, reference: &ColumnReference) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| &e.from == reference)
    }
}
