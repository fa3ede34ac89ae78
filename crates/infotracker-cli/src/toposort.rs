//! Per-file processing order (spec.md §5 "Scheduling model"): a conforming
//! implementation must process files in a total order derived from the
//! dependency graph's topological sort, dependencies first, so that a
//! procedure's temp-table pre-scan sees its callees' already-registered
//! schemas and so `ObjectDbRegistry` learns from a table before a later
//! file references it.
//!
//! Uses a cheap regex pre-scan (the same `CREATE <kind> <name>` /
//! `FROM`/`JOIN <name>` shapes `driver::collect_db_votes` already scans for)
//! purely to order files — the real extraction pass re-parses each file
//! fully regardless.

use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

fn re_create() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)create\s+(?:or\s+alter\s+)?(?:table|view|function|procedure)\s+([A-Za-z_][\w.\[\]]*)")
            .expect("static regex is valid")
    })
}

fn re_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)(?:from|join|into)\s+([A-Za-z_][\w.\[\]]*)").expect("static regex is valid"))
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('[').trim_end_matches(']').replace(['[', ']'], "").to_lowercase()
}

/// Orders `files` (each a `(relative_path, content)` pair) so that a file
/// defining an object comes before files that reference it. Falls back to
/// the original (sorted) order for anything not resolvable to a local
/// definition, and breaks cycles by falling back to input order for the
/// first file in a cycle found, which keeps the sort total without ever
/// failing the run.
pub fn order_by_dependencies(files: &[(std::path::PathBuf, String)]) -> Vec<usize> {
    let mut defines: HashMap<String, usize> = HashMap::new();
    for (index, (_, content)) in files.iter().enumerate() {
        for caps in re_create().captures_iter(content) {
            defines.entry(normalize(&caps[1])).or_insert(index);
        }
    }

    let mut edges: Vec<HashSet<usize>> = vec![HashSet::new(); files.len()];
    let mut indegree = vec![0usize; files.len()];
    for (index, (_, content)) in files.iter().enumerate() {
        for caps in re_reference().captures_iter(content) {
            let name = normalize(&caps[1]);
            if let Some(&definer) = defines.get(&name) {
                if definer != index && edges[definer].insert(index) {
                    indegree[index] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..files.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(files.len());
    let mut visited = vec![false; files.len()];

    while let Some(node) = queue.pop_front() {
        if visited[node] {
            continue;
        }
        visited[node] = true;
        order.push(node);
        for &next in &edges[node] {
            indegree[next] = indegree[next].saturating_sub(1);
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    // Any remaining nodes are part of a cycle; append them in original order
    // rather than failing the run.
    for index in 0..files.len() {
        if !visited[index] {
            order.push(index);
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn orders_dependent_file_after_its_definition() {
        let files = vec![
            (PathBuf::from("b.sql"), "CREATE VIEW dbo.Stg AS SELECT x FROM dbo.Base".to_string()),
            (PathBuf::from("a.sql"), "CREATE TABLE dbo.Base (x INT)".to_string()),
        ];
        let order = order_by_dependencies(&files);
        let pos_a = order.iter().position(|&i| i == 1).unwrap();
        let pos_b = order.iter().position(|&i| i == 0).unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn unresolvable_references_dont_panic_and_still_produce_a_total_order() {
        let files = vec![(PathBuf::from("only.sql"), "SELECT * FROM external.dbo.Whatever".to_string())];
        let order = order_by_dependencies(&files);
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn cycles_fall_back_to_original_order_without_looping_forever() {
        let files = vec![
            (PathBuf::from("a.sql"), "CREATE VIEW dbo.A AS SELECT x FROM dbo.B".to_string()),
            (PathBuf::from("b.sql"), "CREATE VIEW dbo.B AS SELECT x FROM dbo.A".to_string()),
        ];
        let order = order_by_dependencies(&files);
        assert_eq!(order.len(), 2);
    }
}
