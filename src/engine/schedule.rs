// Partition Planner
use std::ops::Range;

use clap::ValueEnum;
use serde::Deserialize;

/// Work-stealing plans split each worker's share into this many chunks.
const STEAL_FACTOR: usize = 8;

/// Smallest chunk a work-stealing plan will produce (one 4KB page of f64).
const MIN_STEAL_CHUNK: usize = 512;

/// How the index range is carved up between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Schedule {
    /// One contiguous chunk per worker.
    #[default]
    Static,
    /// Finer chunks that idle workers steal for load balance.
    WorkStealing,
}

/// One contiguous, non-overlapping slice of the index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub range: Range<usize>,
}

/// Splits `[0, len)` into contiguous chunks of `chunk_size` (the last may be short).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    len: usize,
    chunk_size: usize,
}

impl PartitionPlan {
    pub fn new(len: usize, workers: usize, schedule: Schedule) -> Self {
        let workers = workers.max(1);
        let chunk_size = match schedule {
            Schedule::Static => len.div_ceil(workers),
            Schedule::WorkStealing => len
                .div_ceil(workers * STEAL_FACTOR)
                .max(MIN_STEAL_CHUNK.min(len)),
        };
        Self {
            len,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Always >= 1, so it is safe to hand to `chunks_mut`.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn partition_count(&self) -> usize {
        self.len.div_ceil(self.chunk_size)
    }

    pub fn partition(&self, index: usize) -> Partition {
        let start = (index * self.chunk_size).min(self.len);
        let end = (start + self.chunk_size).min(self.len);
        Partition {
            index,
            range: start..end,
        }
    }

    pub fn partitions(&self) -> impl Iterator<Item = Partition> + '_ {
        (0..self.partition_count()).map(move |i| self.partition(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(plan: &PartitionPlan) {
        let mut next = 0;
        for p in plan.partitions() {
            assert_eq!(p.range.start, next, "gap or overlap at partition {}", p.index);
            assert!(!p.range.is_empty());
            next = p.range.end;
        }
        assert_eq!(next, plan.len());
    }

    #[test]
    fn static_plan_has_one_chunk_per_worker() {
        let plan = PartitionPlan::new(1000, 4, Schedule::Static);
        assert_eq!(plan.partition_count(), 4);
        assert_eq!(plan.partition(3).range, 750..1000);
        assert_covers(&plan);
    }

    #[test]
    fn uneven_split_leaves_short_tail() {
        let plan = PartitionPlan::new(10, 3, Schedule::Static);
        assert_eq!(plan.chunk_size(), 4);
        assert_eq!(plan.partition(2).range, 8..10);
        assert_covers(&plan);
    }

    #[test]
    fn work_stealing_plan_is_finer() {
        let plan = PartitionPlan::new(1_000_000, 4, Schedule::WorkStealing);
        assert_eq!(plan.partition_count(), 32);
        assert_covers(&plan);
    }

    #[test]
    fn work_stealing_respects_minimum_chunk() {
        let plan = PartitionPlan::new(2000, 4, Schedule::WorkStealing);
        assert_eq!(plan.chunk_size(), MIN_STEAL_CHUNK);
        assert_covers(&plan);

        let tiny = PartitionPlan::new(3, 4, Schedule::WorkStealing);
        assert_eq!(tiny.partition_count(), 1);
        assert_covers(&tiny);
    }

    #[test]
    fn more_workers_than_elements() {
        let plan = PartitionPlan::new(3, 16, Schedule::Static);
        assert_eq!(plan.partition_count(), 3);
        assert_covers(&plan);
    }

    #[test]
    fn empty_range_has_no_partitions() {
        let plan = PartitionPlan::new(0, 8, Schedule::Static);
        assert!(plan.is_empty());
        assert_eq!(plan.partition_count(), 0);
        assert_eq!(plan.partitions().count(), 0);
    }
}
