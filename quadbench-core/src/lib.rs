#![warn(missing_docs)]
//! Quadbench Core - Worker Runtime
//!
//! The worker side of the coordinator/worker-pool architecture:
//! - process-local dispatch from integrand selectors to pure functions
//! - the Monte Carlo estimator
//! - wall-clock timing around each estimate
//! - the `WorkerMain` poll/compute/respond loop with signal-based shutdown

mod estimate;
mod integrand;
mod timer;
mod worker;

pub use estimate::{estimate, estimate_with, DEFAULT_SAMPLES};
pub use integrand::eval;
pub use timer::Timer;
pub use worker::{
    request_shutdown, reset_shutdown, shutdown_requested, WorkerError, WorkerMain,
};
