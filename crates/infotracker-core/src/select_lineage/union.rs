//! `UNION`/`UNION ALL`/`INTERSECT`/`EXCEPT` lineage merge (spec.md §4.5):
//! positional arity is preserved across branches — the first branch decides
//! output column names and count, later branches contribute additional
//! inputs to the same positional output, merged under kind `UNION`.

use crate::types::{ColumnLineage, ColumnSchema, TransformationKind};

/// Merges the lineage/schema of every branch of a set operation. Branches
/// with fewer columns than the widest branch are padded with no additional
/// inputs at those ordinals rather than panicking — a malformed/fallback
/// branch should degrade the lineage, not abort extraction.
pub fn merge_union_branches(branches: Vec<(Vec<ColumnLineage>, Vec<ColumnSchema>)>) -> (Vec<ColumnLineage>, Vec<ColumnSchema>) {
    let mut branches = branches.into_iter().filter(|(l, _)| !l.is_empty());
    let Some((first_lineage, first_schema)) = branches.next() else {
        return (Vec::new(), Vec::new());
    };

    let mut merged: Vec<ColumnLineage> = first_lineage
        .into_iter()
        .map(|l| {
            ColumnLineage::new(l.output_column, l.input_fields, TransformationKind::Union, "UNION operation")
        })
        .collect();

    for (branch_lineage, _) in branches {
        for (i, col) in branch_lineage.into_iter().enumerate() {
            if let Some(target) = merged.get_mut(i) {
                target.input_fields.extend(col.input_fields);
            }
        }
    }

    for col in &mut merged {
        col.dedup_inputs_preserving_order();
    }

    (merged, first_schema)
}
