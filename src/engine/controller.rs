// Controller
use crate::config::RunConfig;
use crate::engine::kernels::{self, SeedSource};
use crate::engine::memory::{self, Buffer};
use crate::engine::pool::{PrivateCopy, WorkerPool};
use crate::engine::report::Report;
use crate::error::Result;

/// Owns the worker pool and the run's random source.
/// Drives allocate -> fill -> time-start -> combine -> time-stop -> report.
pub struct CombineController {
    config: RunConfig,
    pool: WorkerPool,
    seeds: SeedSource,
}

/// Output buffer plus the report describing it.
pub struct RunOutcome {
    pub report: Report,
    pub result: Buffer,
}

impl CombineController {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.threads)?;
        // One seed per controller, never per buffer
        let seeds = SeedSource::new(config.seed);
        Ok(Self {
            config,
            pool,
            seeds,
        })
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Phase 1: Allocate all three buffers, or nothing.
    fn allocate(&self) -> Result<[Buffer; 3]> {
        let n = self.config.elements;
        memory::ensure_fits(memory::run_footprint(n)?)?;
        let a = Buffer::allocate(n, self.config.backing)?;
        let b = Buffer::allocate(n, self.config.backing)?;
        let c = Buffer::allocate(n, self.config.backing)?;
        Ok([a, b, c])
    }

    /// Full benchmark run on freshly filled random buffers.
    pub fn run(&mut self) -> Result<RunOutcome> {
        log::info!(
            "Starting run: {} elements, {} threads, {:?} schedule, {:?}",
            self.config.elements,
            self.pool.threads(),
            self.config.schedule,
            self.config.operation
        );

        let [mut a, mut b, c] = self.allocate()?;

        // Phase 2: Fill inputs (untimed)
        let schedule = self.config.schedule;
        kernels::fill_uniform(&self.pool, schedule, a.as_mut_slice(), &mut self.seeds)?;
        kernels::fill_uniform(&self.pool, schedule, b.as_mut_slice(), &mut self.seeds)?;
        log::debug!("Filled input buffers");

        // Phase 3: Combine (timed)
        self.combine_slices(a.as_slice(), b.as_slice(), c)
    }

    /// Combines caller-supplied inputs into a freshly allocated output.
    /// Mismatched lengths fail before any work is distributed.
    pub fn combine(&self, a: &[f64], b: &[f64]) -> Result<RunOutcome> {
        let c = Buffer::allocate(a.len(), self.config.backing)?;
        self.combine_slices(a, b, c)
    }

    fn combine_slices(&self, a: &[f64], b: &[f64], mut c: Buffer) -> Result<RunOutcome> {
        let timing = kernels::combine(
            &self.pool,
            self.config.schedule,
            a,
            b,
            c.as_mut_slice(),
            self.config.operation,
        )?;
        // Join barrier has passed; the result is complete.
        let report = Report::from_result(&timing, c.as_slice());
        log::info!("Combined {} elements in {:.6}s", report.len, report.elapsed_secs());
        Ok(RunOutcome { report, result: c })
    }

    /// Runs a firstprivate region where every worker overwrites its copy with its index.
    pub fn firstprivate_demo(&self, initial: i64) -> Vec<PrivateCopy<i64>> {
        self.pool
            .firstprivate(&initial, |worker, local| *local = worker as i64)
    }
}
