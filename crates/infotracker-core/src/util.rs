//! Small text-manipulation helpers shared by the DML handlers and the string
//! fallbacks (spec.md §4.6/§4.7), both of which parse comma-separated lists
//! and bracket-quoted identifiers out of re-rendered or raw SQL text rather
//! than walking a fully-typed AST.

/// Splits `text` on `delim` at paren depth 0, so `"a, b(c, d), e"` splits into
/// `["a", "b(c, d)", "e"]` rather than cutting inside the nested call.
/// Mirrors spec.md §4.7's "parse the SELECT list by comma at depth 0".
pub fn split_top_level(text: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut in_string = false;

    for ch in text.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            c if c == delim && depth == 0 && !in_string => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Strips surrounding `[brackets]` and whitespace from a single identifier
/// segment.
pub fn strip_brackets(ident: &str) -> String {
    ident.trim().trim_start_matches('[').trim_end_matches(']').to_string()
}

/// Returns the last dotted segment of a (possibly qualified, possibly
/// bracket-quoted) identifier, e.g. `"dbo.[Orders]"` -> `"Orders"`, useful for
/// turning `alias.col` / `Dim.c` assignment targets into a bare column name.
pub fn last_segment(identifier: &str) -> String {
    identifier
        .rsplit('.')
        .next()
        .map(strip_brackets)
        .unwrap_or_else(|| strip_brackets(identifier))
}

/// Given the byte index of an opening `(` in `text`, returns the byte index
/// of its matching `)`, skipping over nested parens and string literals.
/// Used to pull a balanced `(...)` span (a column list, a table-variable
/// schema) out of re-rendered or raw SQL text without a full expression parse.
pub fn find_matching_paren(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open_idx) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    for (i, ch) in text.char_indices().skip(open_idx) {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
