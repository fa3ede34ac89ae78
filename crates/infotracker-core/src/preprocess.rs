//! The preprocessor (spec.md §4.1): normalizes raw source text before it
//! reaches the parser, and opportunistically detects the `USE <database>`
//! context a script runs under.
//!
//! Ported from the original Python `parser_modules/preprocess.py`: the same
//! regex-driven normalization passes, in the same order, since later passes
//! (notably "cut to first statement") depend on earlier ones having already
//! removed noise lines.

use regex::Regex;
use std::sync::OnceLock;

/// Result of preprocessing one file's raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessResult {
    pub text: String,
    /// Database named by a leading `USE <db>` statement, if one was found in
    /// the first ~10 non-comment lines.
    pub detected_database: Option<String>,
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

static_regex!(re_ansi_escape, r"\x1b\[[0-9;]*[A-Za-z]");
static_regex!(re_bidi_controls, r"[\u{200E}\u{200F}\u{202A}-\u{202E}\u{2066}-\u{2069}]");
static_regex!(
    re_set_ansi,
    r"(?im)^\s*SET\s+(ANSI_NULLS|QUOTED_IDENTIFIER)\s+(ON|OFF)\s*;?\s*$"
);
static_regex!(re_go_line, r"(?im)^\s*GO\s*;?\s*$");
static_regex!(re_collate, r"(?i)\s+COLLATE\s+[A-Za-z0-9_]+");
static_regex!(re_isnull, r"(?i)\bISNULL\s*\(");
static_regex!(re_zero_width, r"[\u{200B}\u{200C}\u{200D}\u{00A0}]");
static_regex!(re_xmlnamespaces, r"(?is)\bWITH\s+XMLNAMESPACES\s*\([^)]*\)\s*");
static_regex!(
    re_use_statement,
    r"(?i)^USE\s+(?:\[([^\]]+)\]|(\w+))"
);
static_regex!(re_line_declare_set_print, r"(?i)^(DECLARE|SET|PRINT)\b");
static_regex!(re_line_temp_object_id_drop, r"(?i)^IF\s+OBJECT_ID\('tempdb\.\.#");
static_regex!(re_line_drop_temp_table, r"(?i)^DROP\s+TABLE\s+#\w+");
static_regex!(
    re_line_object_id_drop_table,
    r"(?i)^IF\s+OBJECT_ID.*IS\s+NOT\s+NULL\s+DROP\s+TABLE"
);
static_regex!(re_line_go, r"(?i)^\s*GO\s*$");
static_regex!(re_line_use, r"(?i)^\s*USE\b");
static_regex!(
    re_insert_exec_join,
    r"(?i)(INSERT\s+INTO\s+#\w+)\s*\n\s*(EXEC\b)"
);
static_regex!(
    re_first_statement,
    r"(?is)(?:CREATE\s+(?:OR\s+ALTER\s+)?(?:VIEW|TABLE|FUNCTION|PROCEDURE)\b|ALTER\s+(?:VIEW|TABLE|FUNCTION|PROCEDURE)\b|SELECT\b.*?\bINTO\b|INSERT\s+INTO\b.*?\bEXEC\b)"
);
static_regex!(
    re_tvf_returns_options,
    r"(?is)(\bRETURNS\b\s+TABLE)((?:(?!\s*AS\b)[\s\S])*?)\bAS\b"
);
static_regex!(
    re_scalar_returns_options,
    r"(?is)(\bRETURNS\b\s+(?:(?!TABLE\b)[\w\[\]]+)(?:\s*\([^)]*\))?)\s+(WITH\b[\s\S]*?)\bAS\b"
);
static_regex!(
    re_case_comma_iif,
    r"(?is)CASE\s+WHEN\s+([^,()]+(?:\([^)]*\)[^,()]*)*)\s*,\s*([^,()]+(?:\([^)]*\)[^,()]*)*)\s*,\s*([^)]+?)\s*(\)|END)"
);
static_regex!(re_then_keyword, r"(?i)\bTHEN\b");

/// Runs the full preprocessing pipeline on one file's raw text, returning
/// the normalized text and any database detected from a leading `USE`.
pub fn preprocess(raw: &str, default_database: &str) -> PreprocessResult {
    let mut text = normalize_line_endings(raw);
    text = strip_control_characters(&text);
    text = re_set_ansi().replace_all(&text, "").to_string();
    text = re_go_line().replace_all(&text, "").to_string();
    text = re_collate().replace_all(&text, "").to_string();
    text = re_isnull().replace_all(&text, "COALESCE(").to_string();
    text = re_zero_width().replace_all(&text, " ").to_string();
    text = re_xmlnamespaces().replace_all(&text, "").to_string();

    let detected_database = detect_use_database(&text);

    text = strip_control_lines(&text);
    text = re_insert_exec_join().replace_all(&text, "$1 $2").to_string();
    text = cut_to_first_statement(&text);
    text = strip_udf_options_between_returns_and_as(&text);
    text = rewrite_comma_case_to_iif(&text);

    PreprocessResult {
        text,
        detected_database: detected_database.or_else(|| Some(default_database.to_string())),
    }
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n")
}

/// Strips a leading UTF-8 BOM, ANSI escape sequences, and BiDi override
/// control characters that sometimes leak in from copy-pasted scripts.
fn strip_control_characters(text: &str) -> String {
    let without_bom = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let without_ansi = re_ansi_escape().replace_all(without_bom, "");
    re_bidi_controls().replace_all(&without_ansi, "").to_string()
}

/// Scans the first ~10 non-comment lines for a `USE <db>` statement,
/// mirroring the original's "stop scanning as soon as a non-preamble
/// statement is seen" heuristic.
fn detect_use_database(text: &str) -> Option<String> {
    for line in text.lines().take(10) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        if let Some(caps) = re_use_statement().captures(trimmed) {
            return caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
        }
        let upper = trimmed.to_uppercase();
        if !["USE", "DECLARE", "SET", "PRINT"]
            .iter()
            .any(|kw| upper.starts_with(kw))
        {
            break;
        }
    }
    None
}

/// Drops lines that are pure noise for lineage purposes: `DECLARE`/`SET`/
/// `PRINT` statements, temp-table cleanup guards, `GO` batch separators, and
/// `USE` statements (already captured by [`detect_use_database`]).
fn strip_control_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let stripped = line.trim();
            !(re_line_declare_set_print().is_match(stripped)
                || re_line_temp_object_id_drop().is_match(stripped)
                || re_line_drop_temp_table().is_match(stripped)
                || re_line_object_id_drop_table().is_match(stripped)
                || re_line_go().is_match(stripped)
                || re_line_use().is_match(stripped))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Advances to the first statement that actually produces lineage,
/// discarding any leading commentary/boilerplate the line-level strip left
/// behind.
fn cut_to_first_statement(text: &str) -> String {
    match re_first_statement().find(text) {
        Some(m) => text[m.start()..].to_string(),
        None => text.to_string(),
    }
}

/// Removes UDF option clauses sitting between `RETURNS` and `AS`
/// (`RETURNS TABLE WITH SCHEMABINDING AS`, `RETURNS int WITH EXECUTE AS
/// CALLER AS`) since they carry no lineage information and otherwise
/// confuse TVF/procedure body extraction.
fn strip_udf_options_between_returns_and_as(text: &str) -> String {
    let after_tvf = re_tvf_returns_options().replace_all(text, "$1\nAS");
    re_scalar_returns_options()
        .replace_all(&after_tvf, "$1\nAS")
        .to_string()
}

/// Rewrites the non-standard `CASE WHEN cond, true, false END` shape (seen in
/// some hand-written warehouse SQL) to `IIF(cond, true, false)`. Standard
/// `CASE WHEN ... THEN ... END` blocks are left untouched — the match is
/// rejected whenever a `THEN` keyword appears in the captured span.
fn rewrite_comma_case_to_iif(text: &str) -> String {
    re_case_comma_iif()
        .replace_all(text, |caps: &regex::Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
            if re_then_keyword().is_match(whole) {
                return whole.to_string();
            }
            let cond = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let t = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            let f = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            format!("IIF({cond}, {t}, {f})")
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf_and_strips_bom() {
        let raw = "\u{FEFF}SELECT 1\r\nFROM t\r\n";
        let result = preprocess(raw, "DW");
        assert!(!result.text.contains('\r'));
        assert!(!result.text.contains('\u{FEFF}'));
    }

    #[test]
    fn detects_use_statement_database() {
        let raw = "USE [InfoTrackerDW]\nGO\nSELECT 1 FROM t";
        let result = preprocess(raw, "Default");
        assert_eq!(result.detected_database.as_deref(), Some("InfoTrackerDW"));
    }

    #[test]
    fn falls_back_to_default_database_without_use() {
        let raw = "SELECT 1 FROM t";
        let result = preprocess(raw, "Default");
        assert_eq!(result.detected_database.as_deref(), Some("Default"));
    }

    #[test]
    fn isnull_becomes_coalesce() {
        let raw = "SELECT ISNULL(a, 0) FROM t";
        let result = preprocess(raw, "DW");
        assert!(result.text.contains("COALESCE(a, 0)"));
    }

    #[test]
    fn strips_declare_set_print_and_go_lines() {
        let raw = "DECLARE @x INT\nSET @x = 1\nPRINT 'hi'\nGO\nSELECT @x FROM t";
        let result = preprocess(raw, "DW");
        assert!(!result.text.contains("DECLARE"));
        assert!(!result.text.contains("PRINT"));
        assert!(!result.text.to_uppercase().contains("GO\n"));
    }

    #[test]
    fn joins_insert_into_temp_and_exec_across_lines() {
        let raw = "INSERT INTO #staging\nEXEC dbo.usp_GetStaging";
        let result = preprocess(raw, "DW");
        assert!(result.text.contains("INSERT INTO #staging EXEC dbo.usp_GetStaging"));
    }

    #[test]
    fn cuts_leading_boilerplate_to_first_create() {
        let raw = "-- header comment\nCREATE VIEW dbo.V AS SELECT 1 AS x";
        let result = preprocess(raw, "DW");
        assert!(result.text.trim_start().to_uppercase().starts_with("CREATE VIEW"));
    }

    #[test]
    fn strips_tvf_options_between_returns_table_and_as() {
        let raw = "CREATE FUNCTION dbo.F()\nRETURNS TABLE WITH SCHEMABINDING\nAS\nRETURN SELECT 1 AS x";
        let result = preprocess(raw, "DW");
        assert!(result.text.contains("RETURNS TABLE\nAS"));
        assert!(!result.text.contains("SCHEMABINDING"));
    }

    #[test]
    fn rewrites_comma_case_but_not_standard_case() {
        let raw = "SELECT CASE WHEN a = 1, 'yes', 'no' END FROM t";
        let result = preprocess(raw, "DW");
        assert!(result.text.contains("IIF(a = 1, 'yes', 'no')"));

        let standard = "SELECT CASE WHEN a = 1 THEN 'yes' ELSE 'no' END FROM t";
        let result2 = preprocess(standard, "DW");
        assert!(result2.text.contains("CASE WHEN a = 1 THEN"));
    }
}
