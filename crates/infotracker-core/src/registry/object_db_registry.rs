//! [`ObjectDbRegistry`]: persistent object-name → database resolution memory.
//!
//! Ported directly from the original Python `object_db_registry.py`: a "hard"
//! map for forced/known resolutions, and a "soft" map of weighted votes used
//! when a bare `schema.table` reference shows up without a database prefix.
//! `learn_from_create` and `learn_from_targets` register strong evidence
//! (the object just got created, or is the write target of a statement);
//! `learn_from_references` registers weak evidence (the object was merely
//! read). `resolve` prefers hard evidence, then a hard wildcard entry, then a
//! strictly-dominant soft majority vote, falling back to the caller-supplied
//! default database.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn key(obj_type: &str, schema_table: &str) -> String {
    format!("{}::{}", obj_type, schema_table).to_lowercase()
}

fn wild(schema_table: &str) -> String {
    format!("*::{}", schema_table).to_lowercase()
}

/// On-disk shape, matching the Python original's `{"hard": {...}, "soft": {k: dict(counter)}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDbRegistry {
    hard: HashMap<String, String>,
    soft: HashMap<String, HashMap<String, u32>>,
    #[serde(skip)]
    default_database: String,
}

impl ObjectDbRegistry {
    pub fn new(default_database: impl Into<String>) -> Self {
        Self {
            hard: HashMap::new(),
            soft: HashMap::new(),
            default_database: default_database.into(),
        }
    }

    pub fn from_json(json: &str, default_database: impl Into<String>) -> Result<Self, serde_json::Error> {
        let mut registry: ObjectDbRegistry = serde_json::from_str(json)?;
        registry.default_database = default_database.into();
        Ok(registry)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Forces a resolution: the object just got `CREATE`d in `database`.
    pub fn learn_from_create(&mut self, obj_type: &str, schema_table: &str, database: &str) {
        self.hard.insert(key(obj_type, schema_table), database.to_string());
        self.hard.insert(wild(schema_table), database.to_string());
    }

    /// Strong evidence: the object is the write target of a statement.
    pub fn learn_from_targets(&mut self, obj_type: &str, schema_table: &str, database: &str) {
        self.vote(obj_type, schema_table, database, 10);
    }

    /// Weak evidence: the object was merely referenced/read.
    pub fn learn_from_references(&mut self, obj_type: &str, schema_table: &str, database: &str) {
        self.vote(obj_type, schema_table, database, 1);
    }

    fn vote(&mut self, obj_type: &str, schema_table: &str, database: &str, weight: u32) {
        for k in [key(obj_type, schema_table), wild(schema_table)] {
            let counter = self.soft.entry(k).or_default();
            *counter.entry(database.to_string()).or_insert(0) += weight;
        }
    }

    /// Resolves the database for `schema_table`, preferring (in order): a
    /// hard kind-specific entry, a hard wildcard entry, a strictly-dominant
    /// soft majority vote, then the configured default database.
    pub fn resolve(&self, obj_type: &str, schema_table: &str) -> String {
        self.try_resolve(obj_type, schema_table)
            .unwrap_or_else(|| self.default_database.clone())
    }

    /// Same resolution order as [`Self::resolve`] but returns `None` instead
    /// of falling back to the default database, so callers (the namespace
    /// resolver) can interleave their own fallback (a same-file majority
    /// vote) ahead of the configured default.
    pub fn try_resolve(&self, obj_type: &str, schema_table: &str) -> Option<String> {
        let k = key(obj_type, schema_table);
        if let Some(db) = self.hard.get(&k) {
            return Some(db.clone());
        }
        let w = wild(schema_table);
        if let Some(db) = self.hard.get(&w) {
            return Some(db.clone());
        }
        if let Some(db) = self.soft_majority(&k) {
            return Some(db);
        }
        if let Some(db) = self.soft_majority(&w) {
            return Some(db);
        }
        None
    }

    /// Returns the winner only if it strictly dominates the runner-up (ties
    /// are not resolved softly — they fall through to the default).
    fn soft_majority(&self, k: &str) -> Option<String> {
        let counter = self.soft.get(k)?;
        let mut ranked: Vec<(&String, &u32)> = counter.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        match ranked.as_slice() {
            [] => None,
            [(db, _)] => Some((*db).clone()),
            [(db, top), (_, second), ..] if top > second => Some((*db).clone()),
            _ => None,
        }
    }
}
