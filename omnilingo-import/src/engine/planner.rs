//! Capacity planning for a chunked import
//!
//! Rudimentary policy, decided once per run:
//! - small dataset (< `max_chunk` records): one worker, one chunk
//! - medium dataset (fewer full chunks than cores): full chunks, one worker per chunk
//! - large dataset: every core busy, chunks no larger than `max_chunk`

use serde::{Deserialize, Serialize};

/// Records per chunk unless configured otherwise.
///
/// Larger chunks raise memory held per worker; smaller ones raise per-chunk overhead.
pub const DEFAULT_MAX_CHUNK: usize = 1000;

/// Worker count, chunk size and chunk count for one run
///
/// Invariant: `chunk_count * chunk_size >= record_count > (chunk_count - 1) * chunk_size`
/// for any non-empty input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub worker_count: usize,
    pub chunk_size: usize,
    pub chunk_count: usize,
}

impl Plan {
    /// True when the run takes more than one round of parallel execution
    pub fn runs_multiple_rounds(&self) -> bool {
        self.chunk_count > self.worker_count
    }
}

/// Decides how to split a dataset across workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPlanner {
    max_chunk: usize,
}

impl CapacityPlanner {
    /// Create a planner; `max_chunk` of 0 is treated as 1
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
        }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Plan a run of `record_count` records on `host_parallelism` cores
    ///
    /// Pure and deterministic. An empty dataset yields a single empty chunk
    /// on one worker so nothing downstream divides by zero.
    pub fn plan(&self, record_count: usize, host_parallelism: usize) -> Plan {
        let host_parallelism = host_parallelism.max(1);
        let max_chunk = self.max_chunk;

        if record_count == 0 {
            return Plan {
                worker_count: 1,
                chunk_size: 1,
                chunk_count: 1,
            };
        }

        let (worker_count, chunk_size) = if record_count < max_chunk {
            // Small dataset, not worth parallelizing
            (1, record_count)
        } else if record_count < host_parallelism.saturating_mul(max_chunk) {
            // record_count / max_chunk < host_parallelism: never start idle workers
            let chunk_size = max_chunk;
            (host_parallelism.min(record_count.div_ceil(chunk_size)), chunk_size)
        } else {
            // Large dataset, use every core
            (host_parallelism, max_chunk.min(record_count.div_ceil(host_parallelism)))
        };

        Plan {
            worker_count,
            chunk_size,
            chunk_count: record_count.div_ceil(chunk_size),
        }
    }
}

impl Default for CapacityPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK)
    }
}

/// Logical core count of this host (at least 1)
pub fn host_parallelism() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dataset() {
        let plan = CapacityPlanner::default().plan(0, 8);
        assert_eq!(
            plan,
            Plan {
                worker_count: 1,
                chunk_size: 1,
                chunk_count: 1
            }
        );
    }

    #[test]
    fn test_small_dataset_single_chunk() {
        let planner = CapacityPlanner::new(1000);
        for records in 1..1000 {
            let plan = planner.plan(records, 8);
            assert_eq!(plan.worker_count, 1);
            assert_eq!(plan.chunk_size, records);
            assert_eq!(plan.chunk_count, 1);
        }
    }

    #[test]
    fn test_medium_dataset() {
        // 2500 / 1000 = 2.5 < 8
        let plan = CapacityPlanner::new(1000).plan(2500, 8);
        assert_eq!(
            plan,
            Plan {
                worker_count: 3,
                chunk_size: 1000,
                chunk_count: 3
            }
        );
        assert!(!plan.runs_multiple_rounds());
    }

    #[test]
    fn test_large_dataset_capped_chunk() {
        // ceil(12000 / 4) = 3000, capped at 1000
        let plan = CapacityPlanner::new(1000).plan(12000, 4);
        assert_eq!(
            plan,
            Plan {
                worker_count: 4,
                chunk_size: 1000,
                chunk_count: 12
            }
        );
        assert!(plan.runs_multiple_rounds());
    }

    #[test]
    fn test_exact_boundary_uses_large_branch() {
        // 8000 / 1000 == 8, not < 8
        let plan = CapacityPlanner::new(1000).plan(8000, 8);
        assert_eq!(plan.worker_count, 8);
        assert_eq!(plan.chunk_size, 1000);
        assert_eq!(plan.chunk_count, 8);
    }

    #[test]
    fn test_exactly_max_chunk_records() {
        let plan = CapacityPlanner::new(1000).plan(1000, 8);
        assert_eq!(plan.worker_count, 1);
        assert_eq!(plan.chunk_size, 1000);
        assert_eq!(plan.chunk_count, 1);
    }

    #[test]
    fn test_coverage_bounds_hold_everywhere() {
        for max_chunk in [1, 7, 100, 1000] {
            let planner = CapacityPlanner::new(max_chunk);
            for host in 1..=12 {
                for records in (0..5000).step_by(37).chain([max_chunk, max_chunk * host]) {
                    let plan = planner.plan(records, host);
                    assert!(plan.worker_count >= 1);
                    assert!(plan.chunk_size >= 1);
                    assert!(plan.chunk_count >= 1);
                    assert!(plan.chunk_size <= max_chunk.max(records).max(1));
                    assert!(plan.worker_count <= host);
                    assert!(plan.worker_count <= plan.chunk_count);
                    assert!(plan.chunk_count * plan.chunk_size >= records);
                    if records > 0 {
                        assert!((plan.chunk_count - 1) * plan.chunk_size < records);
                    }
                }
            }
        }
    }

    #[test]
    fn test_plan_is_idempotent() {
        let planner = CapacityPlanner::new(1000);
        for records in [0, 1, 999, 1000, 2500, 12000, 1_000_000] {
            assert_eq!(planner.plan(records, 6), planner.plan(records, 6));
        }
    }

    #[test]
    fn test_zero_parallelism_clamped() {
        let plan = CapacityPlanner::new(10).plan(35, 0);
        assert_eq!(plan.worker_count, 1);
        assert!(plan.chunk_count * plan.chunk_size >= 35);
    }

    #[test]
    fn test_host_parallelism_positive() {
        assert!(host_parallelism() >= 1);
    }
}
