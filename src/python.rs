// Python Bindings
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;

use crate::config::{RunConfig, DEFAULT_ELEMENTS};
use crate::engine::controller::CombineController;
use crate::engine::kernels::BinaryOp;
use crate::error::CombineError;

fn to_py_err(err: CombineError) -> PyErr {
    match err {
        CombineError::Allocation { .. } | CombineError::InsufficientMemory { .. } => {
            PyErr::new::<pyo3::exceptions::PyMemoryError, _>(err.to_string())
        }
        CombineError::Worker { .. } | CombineError::ThreadPool(_) => {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(err.to_string())
        }
        _ => PyErr::new::<pyo3::exceptions::PyValueError, _>(err.to_string()),
    }
}

#[pyclass(name = "CombineController")]
pub struct PyCombineController {
    inner: CombineController,
}

#[pymethods]
impl PyCombineController {
    #[new]
    #[pyo3(signature = (elements = DEFAULT_ELEMENTS, threads = None, seed = None, operation = "add"))]
    pub fn new(
        elements: usize,
        threads: Option<usize>,
        seed: Option<u64>,
        operation: &str,
    ) -> PyResult<Self> {
        let operation = operation
            .parse::<BinaryOp>()
            .map_err(PyErr::new::<pyo3::exceptions::PyValueError, _>)?;
        let config = RunConfig {
            elements,
            threads,
            seed,
            operation,
            ..RunConfig::default()
        };
        let inner = CombineController::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Returns `(elapsed_seconds, length, sample)`.
    pub fn run(&mut self, py: Python<'_>) -> PyResult<(f64, usize, Option<f64>)> {
        let inner = &mut self.inner;
        let outcome = py.allow_threads(|| inner.run()).map_err(to_py_err)?;
        let report = outcome.report;
        Ok((report.elapsed_secs(), report.len, report.sample))
    }

    /// Combines two 1-D float64 arrays with the configured operation.
    pub fn combine<'py>(
        &self,
        py: Python<'py>,
        a: PyReadonlyArray1<'py, f64>,
        b: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let a = a.as_slice()?;
        let b = b.as_slice()?;
        let inner = &self.inner;
        let outcome = py
            .allow_threads(|| inner.combine(a, b))
            .map_err(to_py_err)?;
        Ok(outcome.result.to_vec().into_pyarray(py))
    }

    #[getter]
    pub fn threads(&self) -> usize {
        self.inner.pool().threads()
    }
}
