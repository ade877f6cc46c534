// Fork-Join Worker Pool
use std::fmt::Display;

use bitvec::prelude::*;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::engine::schedule::{Partition, PartitionPlan, Schedule};
use crate::error::{CombineError, Result};

/// A worker's private copy of a captured value, before and after its region body ran.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateCopy<T> {
    pub worker: usize,
    pub on_entry: T,
    pub on_exit: T,
}

/// Dedicated rayon pool. Every parallel region ends in a join barrier.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// `None` lets rayon decide (`RAYON_NUM_THREADS`, else logical cores).
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|i| format!("combine-worker-{i}"));
        if let Some(n) = threads {
            if n == 0 {
                return Err(CombineError::InvalidThreads(n));
            }
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        log::debug!("Worker pool ready with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn plan(&self, len: usize, schedule: Schedule) -> PartitionPlan {
        PartitionPlan::new(len, self.threads(), schedule)
    }

    /// Runs `op` once per partition, handing it the matching chunk of `out`.
    ///
    /// Chunks are disjoint so no locking is needed. A plan built for another length
    /// is rejected before any work starts. A failing partition does not stop its
    /// siblings; the first failure (by partition index) is returned once all of
    /// them have joined.
    pub fn parallel_for<T, E, F>(&self, plan: &PartitionPlan, out: &mut [T], op: F) -> Result<()>
    where
        T: Send,
        E: Display,
        F: Fn(Partition, &mut [T]) -> std::result::Result<(), E> + Sync,
    {
        if plan.len() != out.len() {
            return Err(CombineError::PlanMismatch {
                planned: plan.len(),
                actual: out.len(),
            });
        }
        if out.is_empty() {
            return Ok(());
        }

        let outcomes: Vec<std::result::Result<(), String>> = self.pool.install(|| {
            out.par_chunks_mut(plan.chunk_size())
                .enumerate()
                .map(|(i, chunk)| op(plan.partition(i), chunk).map_err(|e| e.to_string()))
                .collect()
        });

        let total = outcomes.len();
        let mut completed = bitvec![0; total];
        let mut failure = None;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(()) => completed.set(i, true),
                Err(message) if failure.is_none() => failure = Some((i, message)),
                Err(_) => {}
            }
        }

        match failure {
            None => Ok(()),
            Some((partition, message)) => {
                let completed = completed.count_ones();
                log::error!(
                    "Partition {} failed after join ({}/{} completed): {}",
                    partition,
                    completed,
                    total,
                    message
                );
                Err(CombineError::Worker {
                    partition,
                    completed,
                    total,
                    message,
                })
            }
        }
    }

    /// Runs `body` once on every worker, each with its own clone of `value`.
    ///
    /// Workers never see each other's mutations and `value` itself is only borrowed,
    /// so it reads the same after the region as before it.
    pub fn firstprivate<T, F>(&self, value: &T, body: F) -> Vec<PrivateCopy<T>>
    where
        T: Clone + Send + Sync,
        F: Fn(usize, &mut T) + Sync,
    {
        self.pool.broadcast(|ctx| {
            let mut local = value.clone();
            let on_entry = local.clone();
            body(ctx.index(), &mut local);
            PrivateCopy {
                worker: ctx.index(),
                on_entry,
                on_exit: local,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(
            WorkerPool::new(Some(0)),
            Err(CombineError::InvalidThreads(0))
        ));
    }

    #[test]
    fn explicit_thread_count_is_honoured() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        assert_eq!(pool.threads(), 3);
    }

    #[test]
    fn parallel_for_visits_every_index_once() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let mut out = vec![0usize; 1037];
        let plan = pool.plan(out.len(), Schedule::WorkStealing);
        pool.parallel_for(&plan, &mut out, |p, chunk| {
            for (slot, i) in chunk.iter_mut().zip(p.range) {
                *slot += i + 1;
            }
            Ok::<(), String>(())
        })
        .unwrap();
        assert!(out.iter().enumerate().all(|(i, &v)| v == i + 1));
    }

    #[test]
    fn plan_for_other_length_is_rejected() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        let plan = pool.plan(100, Schedule::Static);
        let mut out = vec![0u32; 10];
        let err = pool
            .parallel_for(&plan, &mut out, |_, chunk| {
                chunk.fill(7);
                Ok::<(), String>(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CombineError::PlanMismatch {
                planned: 100,
                actual: 10
            }
        ));
        assert!(out.iter().all(|&v| v == 0));

        let empty_plan = pool.plan(0, Schedule::Static);
        assert!(matches!(
            pool.parallel_for(&empty_plan, &mut out, |_, _| Ok::<(), String>(())),
            Err(CombineError::PlanMismatch { planned: 0, actual: 10 })
        ));
    }

    #[test]
    fn failure_is_reported_after_siblings_finish() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let mut out = vec![0u8; 400];
        let plan = pool.plan(out.len(), Schedule::Static);
        let err = pool
            .parallel_for(&plan, &mut out, |p, chunk| {
                if p.index == 2 {
                    return Err("boom");
                }
                chunk.fill(1);
                Ok(())
            })
            .unwrap_err();

        match err {
            CombineError::Worker {
                partition,
                completed,
                total,
                message,
            } => {
                assert_eq!(partition, 2);
                assert_eq!(completed, 3);
                assert_eq!(total, 4);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Siblings still ran to completion.
        assert!(out[..200].iter().all(|&v| v == 1));
        assert!(out[300..].iter().all(|&v| v == 1));
    }

    #[test]
    fn firstprivate_copies_are_private() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let n = 25;
        let copies = pool.firstprivate(&n, |worker, local| *local = worker as i32);

        assert_eq!(n, 25);
        assert_eq!(copies.len(), 4);
        for (i, copy) in copies.iter().enumerate() {
            assert_eq!(copy.worker, i);
            assert_eq!(copy.on_entry, 25);
            assert_eq!(copy.on_exit, i as i32);
        }
    }
}
