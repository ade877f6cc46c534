// Module Definition
pub mod controller; // Run orchestration binding memory, kernels and report
pub mod kernels; // Fill and combine kernels with parallel execution
pub mod memory;
pub mod pool;
pub mod report;
pub mod schedule;
