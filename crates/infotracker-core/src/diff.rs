//! Schema/lineage diff classification (spec.md §4.10, §6 `diff` subcommand):
//! compares two corpus snapshots (e.g. two git revisions) object-by-object and
//! classifies each column-level change as non-breaking, potentially breaking,
//! or breaking.
//!
//! Grounded on `original_source/src/infotracker/diff.py`'s severity table
//! (column add is safe, column drop/rename/type-narrowing is breaking, type
//! widening and nullability tightening are potentially breaking), following
//! a "classify, then take the worst severity across the whole corpus" shape
//! adapted to column rather than whole-table diffs.

use crate::types::{ColumnSchema, ObjectInfo};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSeverity {
    NonBreaking,
    PotentiallyBreaking,
    Breaking,
}

impl ChangeSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonBreaking => "NON_BREAKING",
            Self::PotentiallyBreaking => "POTENTIALLY_BREAKING",
            Self::Breaking => "BREAKING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    ColumnAdded,
    ColumnRemoved,
    TypeWidened,
    TypeNarrowed,
    TypeChanged,
    BecameNonNullable,
    BecameNullable,
    LineageSourceChanged,
    ObjectAdded,
    ObjectRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnChange {
    pub qualified_name: String,
    pub column: Option<String>,
    pub kind: ChangeKind,
    pub severity: ChangeSeverity,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub changes: Vec<ColumnChange>,
}

impl DiffReport {
    pub fn max_severity(&self) -> Option<ChangeSeverity> {
        self.changes.iter().map(|c| c.severity).max()
    }

    /// spec.md §6: exit code 0 if no changes, 1 if only non-breaking changes,
    /// 2 if any potentially-breaking or breaking change is present. `threshold`
    /// raises an otherwise-0 exit to 2 whenever any change at or above the
    /// configured `--severity-threshold` exists.
    pub fn exit_code(&self, threshold: ChangeSeverity) -> i32 {
        match self.max_severity() {
            None => 0,
            Some(max) if max >= threshold && max != ChangeSeverity::NonBreaking => 2,
            Some(_) => 1,
        }
    }
}

fn by_name(objects: &[ObjectInfo]) -> BTreeMap<String, &ObjectInfo> {
    objects.iter().map(|o| (o.qualified_name.to_lowercase(), o)).collect()
}

fn by_name_col(columns: &[ColumnSchema]) -> BTreeMap<String, &ColumnSchema> {
    columns.iter().map(|c| (c.name.to_lowercase(), c)).collect()
}

/// True if `to_type` looks like a widening of `from_type` for the common
/// `varchar(n)`/`nvarchar(n)`/`decimal(p,s)` family: same base type, larger
/// size parameter. Anything else (base type changed entirely) is treated as
/// narrowing/incompatible rather than widening, which is the conservative
/// direction for a lineage tool that cannot see actual data.
fn is_widening(from_type: &str, to_type: &str) -> Option<bool> {
    let parse = |t: &str| -> Option<(String, Vec<i64>)> {
        let t = t.trim().to_lowercase();
        let open = t.find('(')?;
        let base = t[..open].to_string();
        let close = t.find(')')?;
        let params: Vec<i64> = t[open + 1..close]
            .split(',')
            .filter_map(|p| p.trim().parse::<i64>().ok())
            .collect();
        Some((base, params))
    };
    let (from_base, from_params) = parse(from_type)?;
    let (to_base, to_params) = parse(to_type)?;
    if from_base != to_base || from_params.len() != to_params.len() || from_params.is_empty() {
        return None;
    }
    Some(to_params.iter().zip(from_params.iter()).all(|(t, f)| t >= f) && to_params != from_params)
}

/// Diffs two corpus snapshots (spec.md §8 S6). `base` is the earlier
/// revision, `head` the later one.
pub fn diff_corpus(base: &[ObjectInfo], head: &[ObjectInfo]) -> DiffReport {
    let base_map = by_name(base);
    let head_map = by_name(head);
    let mut changes = Vec::new();

    for (name, head_obj) in &head_map {
        let Some(base_obj) = base_map.get(name) else {
            changes.push(ColumnChange {
                qualified_name: head_obj.qualified_name.clone(),
                column: None,
                kind: ChangeKind::ObjectAdded,
                severity: ChangeSeverity::NonBreaking,
                description: format!("{} is new", head_obj.qualified_name),
            });
            continue;
        };
        changes.extend(diff_columns(base_obj, head_obj));
    }

    for (name, base_obj) in &base_map {
        if !head_map.contains_key(name) {
            changes.push(ColumnChange {
                qualified_name: base_obj.qualified_name.clone(),
                column: None,
                kind: ChangeKind::ObjectRemoved,
                severity: ChangeSeverity::Breaking,
                description: format!("{} was removed", base_obj.qualified_name),
            });
        }
    }

    DiffReport { changes }
}

fn diff_columns(base_obj: &ObjectInfo, head_obj: &ObjectInfo) -> Vec<ColumnChange> {
    let base_cols = by_name_col(&base_obj.schema.columns);
    let head_cols = by_name_col(&head_obj.schema.columns);
    let mut changes = Vec::new();

    for (col_name, head_col) in &head_cols {
        let Some(base_col) = base_cols.get(col_name) else {
            changes.push(ColumnChange {
                qualified_name: head_obj.qualified_name.clone(),
                column: Some(head_col.name.clone()),
                kind: ChangeKind::ColumnAdded,
                severity: ChangeSeverity::NonBreaking,
                description: format!("{} gained column {}", head_obj.qualified_name, head_col.name),
            });
            continue;
        };

        if base_col.data_type.to_lowercase() != head_col.data_type.to_lowercase() {
            match is_widening(&base_col.data_type, &head_col.data_type) {
                Some(true) => changes.push(ColumnChange {
                    qualified_name: head_obj.qualified_name.clone(),
                    column: Some(head_col.name.clone()),
                    kind: ChangeKind::TypeWidened,
                    severity: ChangeSeverity::PotentiallyBreaking,
                    description: format!(
                        "{}.{} widened from {} to {}",
                        head_obj.qualified_name, head_col.name, base_col.data_type, head_col.data_type
                    ),
                }),
                Some(false) => changes.push(ColumnChange {
                    qualified_name: head_obj.qualified_name.clone(),
                    column: Some(head_col.name.clone()),
                    kind: ChangeKind::TypeNarrowed,
                    severity: ChangeSeverity::Breaking,
                    description: format!(
                        "{}.{} narrowed from {} to {}",
                        head_obj.qualified_name, head_col.name, base_col.data_type, head_col.data_type
                    ),
                }),
                None => changes.push(ColumnChange {
                    qualified_name: head_obj.qualified_name.clone(),
                    column: Some(head_col.name.clone()),
                    kind: ChangeKind::TypeChanged,
                    severity: ChangeSeverity::Breaking,
                    description: format!(
                        "{}.{} changed type from {} to {}",
                        head_obj.qualified_name, head_col.name, base_col.data_type, head_col.data_type
                    ),
                }),
            }
        }

        if base_col.nullable && !head_col.nullable {
            changes.push(ColumnChange {
                qualified_name: head_obj.qualified_name.clone(),
                column: Some(head_col.name.clone()),
                kind: ChangeKind::BecameNonNullable,
                severity: ChangeSeverity::PotentiallyBreaking,
                description: format!("{}.{} became NOT NULL", head_obj.qualified_name, head_col.name),
            });
        } else if !base_col.nullable && head_col.nullable {
            changes.push(ColumnChange {
                qualified_name: head_obj.qualified_name.clone(),
                column: Some(head_col.name.clone()),
                kind: ChangeKind::BecameNullable,
                severity: ChangeSeverity::NonBreaking,
                description: format!("{}.{} became nullable", head_obj.qualified_name, head_col.name),
            });
        }
    }

    for (col_name, base_col) in &base_cols {
        if !head_cols.contains_key(col_name) {
            changes.push(ColumnChange {
                qualified_name: head_obj.qualified_name.clone(),
                column: Some(base_col.name.clone()),
                kind: ChangeKind::ColumnRemoved,
                severity: ChangeSeverity::Breaking,
                description: format!("{} dropped column {}", head_obj.qualified_name, base_col.name),
            });
        }
    }

    changes
}
