//! Record model - the in-memory view of one database page
//!
//! Records are produced by the wire layer (`notion`), indexed once per run,
//! and never mutated afterwards. The `estimate` field is the numeric estimate
//! property as stored remotely: for a leaf it is the value that rolls up, for
//! a parent it is the previously synced aggregate that the writer compares
//! against.

use std::collections::HashMap;

/// One task page, reduced to the fields the rollup cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Remote page id.
    pub id: String,
    /// Numeric estimate property; `None` when the property is empty.
    pub estimate: Option<f64>,
    /// Ids of subtask pages, in relation order. Empty means leaf.
    pub child_ids: Vec<String>,
}

impl Record {
    pub fn is_parent(&self) -> bool {
        !self.child_ids.is_empty()
    }
}

/// Lookup substrate for rollup and sync: page id -> record.
pub type RecordIndex = HashMap<String, Record>;

/// Build the id index from the fetched collection.
///
/// Later duplicates win, matching remote fetch order semantics (the remote
/// store never returns duplicate page ids in practice).
pub fn build_index(records: &[Record]) -> RecordIndex {
    records
        .iter()
        .map(|record| (record.id.clone(), record.clone()))
        .collect()
}
