//! Rollup Engine - memoized aggregation over the subtask graph
//!
//! Computes, for every record reachable from the fetched set, the aggregate
//! estimate total: leaves contribute their own estimate, parents contribute
//! the sum of their children (their own estimate is ignored). Each id is
//! evaluated at most once; the resulting cache is identical regardless of the
//! order records are submitted in.
//!
//! The resolver is an explicit enter/exit work stack rather than call
//! recursion: depth is bounded by the heap, and an in-progress marker set
//! turns a cyclic relation graph into `RollupError::CycleDetected` instead of
//! unbounded descent.

use std::collections::{HashMap, HashSet};

use crate::record::{Record, RecordIndex};

#[derive(Debug, PartialEq)]
pub enum RollupError {
    /// The relation graph references back into an unfinished record.
    CycleDetected { id: String },
}

impl std::fmt::Display for RollupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollupError::CycleDetected { id } => {
                write!(f, "Cyclic subtask reference involving record {}", id)
            }
        }
    }
}

impl std::error::Error for RollupError {}

/// Computed totals keyed by record id.
///
/// Values are written once and never overwritten within a run. Ids absent
/// from the index are not cached; they contribute 0 at their use sites.
#[derive(Debug, Default)]
pub struct RollupCache {
    totals: HashMap<String, f64>,
    /// Number of records whose total was actually computed.
    pub evaluations: usize,
    /// Number of resolutions answered from the cache.
    pub memo_hits: usize,
}

impl RollupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.totals.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

/// Stack frame for the iterative resolver.
enum Visit {
    /// Schedule a record: either answer from cache or push its children.
    Enter(String),
    /// All children resolved; compute and cache this record's total.
    Exit(String),
}

/// Compute rollup totals for every record in `records` (and everything
/// transitively reachable from them through `index`).
pub fn compute_rollups(
    records: &[Record],
    index: &RecordIndex,
) -> Result<RollupCache, RollupError> {
    let mut cache = RollupCache::new();
    for record in records {
        resolve(&record.id, index, &mut cache)?;
    }
    Ok(cache)
}

/// Resolve a single record id, filling `cache` along the way.
///
/// The cache is threaded explicitly so the resolver stays a pure function of
/// (id, index, cache) and can be driven directly from tests.
pub fn resolve(id: &str, index: &RecordIndex, cache: &mut RollupCache) -> Result<f64, RollupError> {
    if let Some(total) = cache.get(id) {
        cache.memo_hits += 1;
        return Ok(total);
    }

    let mut in_progress: HashSet<String> = HashSet::new();
    let mut stack = vec![Visit::Enter(id.to_string())];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(id) => {
                if cache.totals.contains_key(&id) {
                    cache.memo_hits += 1;
                    continue;
                }
                let Some(record) = index.get(&id) else {
                    // Reference to a record outside this fetch: contributes
                    // nothing, stays uncached.
                    log::debug!("Subtask reference {} not in fetched set, counting as 0", id);
                    continue;
                };
                if !in_progress.insert(id.clone()) {
                    return Err(RollupError::CycleDetected { id });
                }
                stack.push(Visit::Exit(id));
                for child_id in &record.child_ids {
                    stack.push(Visit::Enter(child_id.clone()));
                }
            }
            Visit::Exit(id) => {
                let record = &index[&id];
                let total = if record.child_ids.is_empty() {
                    record.estimate.unwrap_or(0.0)
                } else {
                    // Children were pushed after this Exit frame, so by now
                    // each is cached or was absent from the index.
                    record
                        .child_ids
                        .iter()
                        .map(|child_id| cache.get(child_id).unwrap_or(0.0))
                        .sum()
                };
                in_progress.remove(&id);
                cache.totals.insert(id, total);
                cache.evaluations += 1;
            }
        }
    }

    // The root was either cached just now or absent from the index.
    Ok(cache.get(id).unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::build_index;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn make_record(id: &str, estimate: Option<f64>, children: &[&str]) -> Record {
        Record {
            id: id.to_string(),
            estimate,
            child_ids: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_leaf_rolls_up_to_own_estimate() {
        let records = vec![
            make_record("leaf", Some(5.0), &[]),
            make_record("empty_leaf", None, &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("leaf"), Some(5.0));
        assert_eq!(cache.get("empty_leaf"), Some(0.0));
    }

    #[test]
    fn test_single_level_rollup_ignores_parent_estimate() {
        let records = vec![
            make_record("p", Some(99.0), &["a", "b"]),
            make_record("a", Some(3.0), &[]),
            make_record("b", Some(5.0), &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("p"), Some(8.0));
    }

    #[test]
    fn test_multi_level_rollup() {
        let records = vec![
            make_record("p", None, &["a"]),
            make_record("a", Some(1.0), &["x", "y"]),
            make_record("x", Some(2.0), &[]),
            make_record("y", Some(4.0), &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("a"), Some(6.0));
        assert_eq!(cache.get("p"), Some(6.0));
    }

    #[test]
    fn test_diamond_evaluates_shared_child_once() {
        let records = vec![
            make_record("p1", None, &["c"]),
            make_record("p2", None, &["c"]),
            make_record("c", Some(7.0), &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("p1"), Some(7.0));
        assert_eq!(cache.get("p2"), Some(7.0));
        // c, p1, p2 - one evaluation each even though c is referenced twice.
        assert_eq!(cache.evaluations, 3);
        assert!(cache.memo_hits >= 1);
    }

    #[test]
    fn test_missing_reference_contributes_zero() {
        let records = vec![
            make_record("p", Some(9.0), &["ghost", "a"]),
            make_record("a", Some(2.0), &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("p"), Some(2.0));
        // Absent ids never enter the cache.
        assert_eq!(cache.get("ghost"), None);
    }

    #[test]
    fn test_reachable_but_unlisted_records_are_cached() {
        // Only the parent is submitted; the child is reachable through the
        // index and must still end up cached.
        let all = vec![
            make_record("p", None, &["c"]),
            make_record("c", Some(4.0), &[]),
        ];
        let index = build_index(&all);
        let submitted = vec![all[0].clone()];

        let cache = compute_rollups(&submitted, &index).unwrap();

        assert_eq!(cache.get("p"), Some(4.0));
        assert_eq!(cache.get("c"), Some(4.0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_two_node_cycle_is_detected() {
        let records = vec![
            make_record("a", Some(1.0), &["b"]),
            make_record("b", Some(2.0), &["a"]),
        ];
        let index = build_index(&records);

        let err = compute_rollups(&records, &index).unwrap_err();

        assert!(matches!(err, RollupError::CycleDetected { .. }));
    }

    #[test]
    fn test_self_reference_is_detected() {
        let records = vec![make_record("a", Some(1.0), &["a"])];
        let index = build_index(&records);

        assert!(compute_rollups(&records, &index).is_err());
    }

    #[test]
    fn test_triangle_is_not_mistaken_for_cycle() {
        // p -> a -> c and p -> c: c is visited twice on one path stack but
        // the graph is acyclic.
        let records = vec![
            make_record("p", None, &["a", "c"]),
            make_record("a", None, &["c"]),
            make_record("c", Some(3.0), &[]),
        ];
        let index = build_index(&records);

        let cache = compute_rollups(&records, &index).unwrap();

        assert_eq!(cache.get("a"), Some(3.0));
        assert_eq!(cache.get("p"), Some(6.0));
    }

    /// Build a random layered DAG: edges only point from higher layers to
    /// lower ones, so the graph is acyclic by construction.
    fn random_dag(rng: &mut StdRng, layers: usize, per_layer: usize) -> Vec<Record> {
        let mut records = Vec::new();
        for layer in 0..layers {
            for n in 0..per_layer {
                let id = format!("n{}_{}", layer, n);
                let mut child_ids = Vec::new();
                if layer > 0 {
                    let candidates: Vec<String> = (0..layer)
                        .flat_map(|l| (0..per_layer).map(move |c| format!("n{}_{}", l, c)))
                        .collect();
                    let child_count = rng.gen_range(0..=3.min(candidates.len()));
                    let mut picked = candidates.clone();
                    picked.shuffle(rng);
                    picked.truncate(child_count);
                    child_ids = picked;
                }
                records.push(Record {
                    id,
                    estimate: Some(rng.gen_range(0..20) as f64),
                    child_ids,
                });
            }
        }
        records
    }

    #[test]
    fn test_order_independence_on_random_dags() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let records = random_dag(&mut rng, 4, 5);
            let index = build_index(&records);

            let baseline = compute_rollups(&records, &index).unwrap();

            for _ in 0..5 {
                let mut shuffled = records.clone();
                shuffled.shuffle(&mut rng);
                let cache = compute_rollups(&shuffled, &index).unwrap();

                assert_eq!(cache.len(), baseline.len());
                for record in &records {
                    assert_eq!(
                        cache.get(&record.id),
                        baseline.get(&record.id),
                        "total for {} differs under permutation",
                        record.id
                    );
                }
            }
        }
    }
}
