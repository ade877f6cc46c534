//! Parallel elementwise combination of large `f64` buffers.
//!
//! A [`CombineController`] allocates three buffers, fills the inputs with uniform
//! random values, combines them on a fork-join worker pool and times only the
//! combine step. The pieces are usable on their own through [`engine`].

pub mod config;
pub mod engine;
pub mod error;

#[cfg(feature = "python")]
mod python;

pub use config::{RunConfig, DEFAULT_ELEMENTS};
pub use engine::controller::{CombineController, RunOutcome};
pub use engine::kernels::{BinaryOp, SeedSource};
pub use engine::memory::{Backing, Buffer};
pub use engine::pool::{PrivateCopy, WorkerPool};
pub use engine::report::{Report, TimingSample};
pub use engine::schedule::{Partition, PartitionPlan, Schedule};
pub use error::{CombineError, Result};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn par_combine_core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Expose the Controller class to Python
    m.add_class::<python::PyCombineController>()?;
    Ok(())
}
