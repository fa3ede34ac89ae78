//! Text/JSON rendering for command results (spec.md §6 `--format text|json`).
//!
//! A plain, readable text report alongside a JSON mode for machine
//! consumption, covering all three command shapes (extract/impact/diff).

use crate::cli::OutputFormat;
use infotracker_core::{ChangeSeverity, DiffReport, ImpactNode, Issue, Severity};
use serde::Serialize;
use std::path::Path;

pub fn print_extract_summary(format: OutputFormat, file_count: usize, issues: &[Issue], out_dir: &Path) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Summary<'a> {
                files: usize,
                out_dir: String,
                issues: &'a [Issue],
            }
            let summary = Summary { files: file_count, out_dir: out_dir.display().to_string(), issues };
            println!("{}", serde_json::to_string_pretty(&summary).expect("serialization cannot fail"));
        }
        OutputFormat::Text => {
            println!("extracted {file_count} file(s) into {}", out_dir.display());
            print_issues_text(issues);
        }
    }
}

pub fn print_issues_text(issues: &[Issue]) {
    for issue in issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        let location = issue.source_name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default();
        eprintln!("infotracker: {level}:{location} [{}] {}", issue.code, issue.message);
    }
}

pub fn print_impact(format: OutputFormat, nodes: &[ImpactNode]) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(nodes).expect("serialization cannot fail"));
        }
        OutputFormat::Text => {
            if nodes.is_empty() {
                println!("(no impacted columns)");
            }
            for node in nodes {
                let indent = "  ".repeat(node.depth);
                let via = node.via.as_ref().map(|e| e.transformation.as_str()).unwrap_or("start");
                println!("{indent}{} (depth {}, via {via})", node.reference, node.depth);
            }
        }
    }
}

pub fn print_diff(format: OutputFormat, report: &DiffReport) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).expect("serialization cannot fail"));
        }
        OutputFormat::Text => {
            if report.changes.is_empty() {
                println!("no changes");
            }
            for change in &report.changes {
                let column = change.column.as_deref().map(|c| format!(".{c}")).unwrap_or_default();
                println!("[{}] {}{column}: {}", change.severity.as_str(), change.qualified_name, change.description);
            }
            if let Some(max) = report.max_severity() {
                println!("max severity: {}", max.as_str());
            }
        }
    }
}

pub fn exit_code_for_extract(issues: &[Issue], fail_on_warn: bool) -> u8 {
    let has_error = issues.iter().any(|i| i.severity == Severity::Error);
    let has_warning = issues.iter().any(|i| i.severity == Severity::Warning);
    if has_error || (fail_on_warn && has_warning) {
        1
    } else {
        0
    }
}

pub fn exit_code_for_diff(report: &DiffReport, threshold: ChangeSeverity) -> i32 {
    report.exit_code(threshold)
}
