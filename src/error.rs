// Error Taxonomy
use thiserror::Error;

/// Every way a run can fail. None of these are retried.
#[derive(Debug, Error)]
pub enum CombineError {
    /// The allocator refused a buffer of the requested size.
    #[error("failed to allocate buffer of {elements} elements ({bytes} bytes): {reason}")]
    Allocation {
        elements: usize,
        bytes: usize,
        reason: String,
    },

    /// Requested buffers exceed physical memory plus swap.
    #[error("requested {requested} bytes for buffers but only {available} bytes of memory are available")]
    InsufficientMemory { requested: u64, available: u64 },

    /// Byte size of the buffer does not fit in `usize`.
    #[error("buffer of {elements} elements overflows the address space")]
    SizeOverflow { elements: usize },

    #[error("buffer length mismatch: a = {a}, b = {b}, c = {c}")]
    LengthMismatch { a: usize, b: usize, c: usize },

    /// A partition plan was built for a different length than the buffer it drives.
    #[error("partition plan covers {planned} elements but buffer holds {actual}")]
    PlanMismatch { planned: usize, actual: usize },

    #[error("worker thread count must be positive, got {0}")]
    InvalidThreads(usize),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A partition's work failed. Raised after the join barrier.
    #[error("partition {partition} failed ({completed}/{total} partitions completed): {message}")]
    Worker {
        partition: usize,
        completed: usize,
        total: usize,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CombineError>;
