// Run Configuration
use std::path::Path;

use serde::Deserialize;

use crate::engine::kernels::BinaryOp;
use crate::engine::memory::Backing;
use crate::engine::schedule::Schedule;
use crate::error::{CombineError, Result};

/// Default element count per buffer (three buffers of this size ~ 1.2 GB).
pub const DEFAULT_ELEMENTS: usize = 50_000_000;

/// Everything a single run needs. Missing TOML keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub elements: usize,
    /// `None` leaves the worker count to the runtime.
    pub threads: Option<usize>,
    pub schedule: Schedule,
    pub operation: BinaryOp,
    pub backing: Backing,
    /// Fixes the fill sequence; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            elements: DEFAULT_ELEMENTS,
            threads: None,
            schedule: Schedule::default(),
            operation: BinaryOp::default(),
            backing: Backing::default(),
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| CombineError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| CombineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(CombineError::InvalidThreads(0));
        }
        Ok(())
    }
}
