//! The OpenLineage emitter (spec.md §4.8): renders one [`ObjectInfo`] into the
//! OpenLineage-shaped JSON document this whole project exists to produce.
//!
//! Grounded directly on spec.md §4.8's field list and on
//! `original_source/src/infotracker/parser.py`'s `to_openlineage_event`
//! for the concrete facet shapes (`schema`, `columnLineage`, `quality`).
//! `eventTime` is threaded in by the caller rather than read from the wall
//! clock, so that repeated runs over the same corpus with the same supplied
//! timestamp satisfy spec.md §8's P7 (idempotent, byte-identical output).

use crate::types::{ObjectInfo, ObjectType};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One OpenLineage `RUNNING`/`COMPLETE` event document, as written to disk
/// per input file (spec.md §4.8). Field order matches the struct's
/// declaration order in the emitted JSON (`serde_json` preserves struct
/// field order regardless of the `preserve_order` feature); nested maps
/// (`serde_json::Map` without that feature, and this crate's own
/// `BTreeMap` fields) sort their keys, satisfying spec.md §4.8's "sorted
/// when in doubt" determinism requirement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenLineageDocument {
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    pub run: RunInfo,
    pub job: JobInfo,
    pub inputs: Vec<DatasetInfo>,
    pub outputs: Vec<DatasetInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<crate::types::Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<DatasetFacets>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatasetFacets {
    pub schema: SchemaFacet,
    pub column_lineage: ColumnLineageFacet,
    pub quality: QualityFacet,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFacet {
    pub fields: Vec<SchemaFieldFacet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFieldFacet {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLineageFacet {
    pub fields: BTreeMap<String, ColumnLineageFieldFacet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLineageFieldFacet {
    pub input_fields: Vec<InputFieldRef>,
    pub transformation_type: String,
    pub transformation_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputFieldRef {
    pub namespace: String,
    pub name: String,
    pub field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualityFacet {
    pub is_fallback: bool,
    pub lineage_coverage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}

/// Fixed pipeline-level job namespace. OpenLineage's `job.namespace` names
/// the orchestrator/pipeline producing the run, not the dataset's own
/// database, so this is constant across every emitted document regardless
/// of which warehouse database the object lives in.
const JOB_NAMESPACE: &str = "infotracker";

/// Builds the job path convention string (spec.md §4.8): `warehouse/sql/<hint>.sql`
/// normally, `dbt/models/<hint>.sql` in dbt mode, or `object.job_path_override`
/// when the object carries one explicitly.
fn job_path(object: &ObjectInfo, object_hint: &str, dbt_mode: bool) -> String {
    if let Some(path) = &object.job_path_override {
        return path.clone();
    }
    if dbt_mode {
        format!("dbt/models/{object_hint}.sql")
    } else {
        format!("warehouse/sql/{object_hint}.sql")
    }
}

/// Derives a stable run id from `object_hint` using FNV-1a, so the same
/// object hint always yields the same run id across runs (spec.md §8's P5
/// namespace-stability spirit, applied to the run identifier).
fn stable_run_id(object_hint: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for byte in object_hint.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("run-{hash:016x}")
}

/// Renders one [`ObjectInfo`] into an [`OpenLineageDocument`].
///
/// `event_time` is supplied by the caller (one timestamp per run, shared
/// across every file) rather than sampled from the wall clock here, so that
/// repeated extractions of the same corpus under the same configuration
/// produce byte-identical output (spec.md §8 P7).
pub fn emit(object: &ObjectInfo, object_hint: &str, dbt_mode: bool, event_time: DateTime<Utc>) -> OpenLineageDocument {
    let inputs = object
        .dependencies
        .iter()
        .map(|dep| DatasetInfo {
            namespace: object.schema.namespace.clone(),
            name: dep.clone(),
            facets: None,
        })
        .collect();

    let total = object.schema.columns.len();
    let covered = object.lineage.iter().filter(|l| !l.input_fields.is_empty()).count();
    let coverage = if total == 0 {
        if object.object_type == ObjectType::Table { 1.0 } else { 0.0 }
    } else {
        covered as f64 / total as f64
    };

    let schema_fields = object
        .schema
        .columns
        .iter()
        .map(|c| SchemaFieldFacet {
            name: c.name.clone(),
            data_type: c.data_type.clone(),
        })
        .collect();

    let mut lineage_fields = BTreeMap::new();
    for l in &object.lineage {
        lineage_fields.insert(
            l.output_column.clone(),
            ColumnLineageFieldFacet {
                input_fields: l
                    .input_fields
                    .iter()
                    .map(|r| InputFieldRef {
                        namespace: r.namespace.clone(),
                        name: r.table_name.clone(),
                        field: r.column_name.clone(),
                    })
                    .collect(),
                transformation_type: l.transformation_type.as_str().to_string(),
                transformation_description: l.transformation_description.clone(),
            },
        );
    }

    let output = DatasetInfo {
        namespace: object.schema.namespace.clone(),
        name: object.qualified_name.clone(),
        facets: Some(DatasetFacets {
            schema: SchemaFacet { fields: schema_fields },
            column_lineage: ColumnLineageFacet { fields: lineage_fields },
            quality: QualityFacet {
                is_fallback: object.is_fallback,
                lineage_coverage: coverage,
                reason_code: object.reason_code.map(|r| r.as_str().to_string()),
            },
        }),
    };

    OpenLineageDocument {
        event_type: "COMPLETE".to_string(),
        event_time,
        run: RunInfo {
            run_id: stable_run_id(object_hint),
        },
        job: JobInfo {
            namespace: JOB_NAMESPACE.to_string(),
            name: job_path(object, object_hint, dbt_mode),
        },
        inputs,
        outputs: vec![output],
        warnings: Vec::new(),
    }
}

/// Attaches accumulated diagnostics (spec.md §7's "same OpenLineage shape
/// with an additional warnings array") to an already-built document.
pub fn with_warnings(mut doc: OpenLineageDocument, warnings: Vec<crate::types::Issue>) -> OpenLineageDocument {
    doc.warnings = warnings;
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnLineage, ColumnReference, ObjectType, TableSchema, TransformationKind};
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn s1_table_has_no_inputs_and_full_coverage() {
        let mut schema = TableSchema::new("mssql://localhost/DW", "dbo.Customers");
        schema.push("CustomerID", "int", false);
        schema.push("Name", "nvarchar(100)", true);
        schema.push("Email", "nvarchar(255)", true);
        let obj = ObjectInfo::new("dbo.Customers", ObjectType::Table, schema);

        let doc = emit(&obj, "Customers", false, ts());
        assert_eq!(doc.outputs[0].name, "dbo.Customers");
        assert!(doc.inputs.is_empty());
        let facets = doc.outputs[0].facets.as_ref().unwrap();
        assert_eq!(facets.schema.fields.len(), 3);
        assert_eq!(facets.quality.lineage_coverage, 1.0);
        assert!(!facets.quality.is_fallback);
    }

    #[test]
    fn view_lineage_round_trips_through_json() {
        let mut schema = TableSchema::new("mssql://localhost/DW", "dbo.stg_orders");
        schema.push("OrderID", "int", false);
        let lineage = vec![ColumnLineage::new(
            "OrderID",
            vec![ColumnReference::in_database("DW", "dbo.Orders", "OrderID")],
            TransformationKind::Identity,
            "direct column reference",
        )];
        let obj = ObjectInfo::new("dbo.stg_orders", ObjectType::View, schema)
            .with_lineage(lineage)
            .with_dependencies(["dbo.Orders".to_string()].into_iter().collect());

        let doc = emit(&obj, "stg_orders", false, ts());
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: OpenLineageDocument = serde_json::from_str(&json).unwrap();
        let rejson = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, rejson);
        assert_eq!(doc.job.name, "warehouse/sql/stg_orders.sql");
    }

    #[test]
    fn dbt_mode_uses_dbt_job_path() {
        let schema = TableSchema::new("mssql://localhost/DW", "dbo.stg_orders");
        let obj = ObjectInfo::new("dbo.stg_orders", ObjectType::View, schema);
        let doc = emit(&obj, "stg_orders", true, ts());
        assert_eq!(doc.job.name, "dbt/models/stg_orders.sql");
    }

    #[test]
    fn run_id_is_stable_for_the_same_hint() {
        let a = stable_run_id("dbo.Customers");
        let b = stable_run_id("dbo.Customers");
        assert_eq!(a, b);
        assert_ne!(a, stable_run_id("dbo.Other"));
    }
}
