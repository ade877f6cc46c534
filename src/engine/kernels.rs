// Computation Kernels
// Fill and elementwise combination over partitioned buffers
use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Instant;

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::engine::pool::WorkerPool;
use crate::engine::report::TimingSample;
use crate::engine::schedule::Schedule;
use crate::error::{CombineError, Result};

/// Spreads partition indices across the seed space.
const PARTITION_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Elementwise operation applied as `c[i] = op(a[i], b[i])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryOp {
    #[default]
    Add,
    Sub,
    Mul,
    Min,
    Max,
}

impl BinaryOp {
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
        }
    }
}

impl FromStr for BinaryOp {
    type Err = String;

    /// Case-insensitive, same names as the CLI and config file.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// The run's single random source. Seeded once; every fill draws a fresh
/// stream from it so no two buffers share a sequence.
pub struct SeedSource {
    master: StdRng,
}

impl SeedSource {
    pub fn from_entropy() -> Self {
        Self {
            master: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            master: StdRng::seed_from_u64(seed),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }

    pub fn next_stream(&mut self) -> u64 {
        self.master.gen()
    }
}

fn partition_rng(stream: u64, partition: usize) -> StdRng {
    StdRng::seed_from_u64(stream ^ (partition as u64).wrapping_mul(PARTITION_SEED_MIX))
}

/// Fills `buf` with independent uniform values in `[0, 1)`.
///
/// Each partition gets its own generator derived from one stream of `seeds`,
/// so the result is reproducible for a fixed seed and partition plan.
pub fn fill_uniform(
    pool: &WorkerPool,
    schedule: Schedule,
    buf: &mut [f64],
    seeds: &mut SeedSource,
) -> Result<()> {
    let stream = seeds.next_stream();
    let plan = pool.plan(buf.len(), schedule);
    pool.parallel_for(&plan, buf, |partition, chunk| {
        let mut rng = partition_rng(stream, partition.index);
        for slot in chunk.iter_mut() {
            *slot = rng.gen::<f64>();
        }
        Ok::<(), Infallible>(())
    })
}

/// All three buffers must have the same length. Checked before any work is handed out.
pub fn check_lengths(a: &[f64], b: &[f64], c: &[f64]) -> Result<()> {
    if a.len() == b.len() && b.len() == c.len() {
        Ok(())
    } else {
        Err(CombineError::LengthMismatch {
            a: a.len(),
            b: b.len(),
            c: c.len(),
        })
    }
}

/// `c[i] = op(a[i], b[i])` for every index, timed from work distribution to join.
pub fn combine(
    pool: &WorkerPool,
    schedule: Schedule,
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    op: BinaryOp,
) -> Result<TimingSample> {
    combine_with(pool, schedule, a, b, c, move |x, y| op.apply(x, y))
}

/// Like [`combine`] with an arbitrary per-element function.
pub fn combine_with<F>(
    pool: &WorkerPool,
    schedule: Schedule,
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    f: F,
) -> Result<TimingSample>
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    check_lengths(a, b, c)?;
    let plan = pool.plan(c.len(), schedule);

    let start = Instant::now();
    pool.parallel_for(&plan, c, |partition, out| {
        let a = &a[partition.range.clone()];
        let b = &b[partition.range];
        // Straight zip keeps the loop friendly to auto-vectorisation
        for ((out, &x), &y) in out.iter_mut().zip(a).zip(b) {
            *out = f(x, y);
        }
        Ok::<(), Infallible>(())
    })?;
    Ok(TimingSample::finish(start))
}

/// Fallible per-element combination. `f` receives the global index.
///
/// A failing partition stops at its first bad element; the error surfaces only
/// after every other partition has joined, and `c` must then be treated as incomplete.
pub fn try_combine_with<E, F>(
    pool: &WorkerPool,
    schedule: Schedule,
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    f: F,
) -> Result<TimingSample>
where
    E: Display,
    F: Fn(usize, f64, f64) -> std::result::Result<f64, E> + Sync,
{
    check_lengths(a, b, c)?;
    let plan = pool.plan(c.len(), schedule);

    let start = Instant::now();
    pool.parallel_for(&plan, c, |partition, out| {
        let base = partition.range.start;
        let a = &a[partition.range.clone()];
        let b = &b[partition.range];
        for (i, ((out, &x), &y)) in out.iter_mut().zip(a).zip(b).enumerate() {
            *out = f(base + i, x, y)?;
        }
        Ok::<(), E>(())
    })?;
    Ok(TimingSample::finish(start))
}
