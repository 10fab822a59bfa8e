//! Worker Loop
//!
//! Poll the request queue, compute and time one estimate per request, push
//! the response (retrying under backpressure), and exit cooperatively when
//! the coordinator's SIGTERM arrives. The shutdown flag is only observed
//! between task cycles, so a task in flight is never abandoned half-done.

use quadbench_ipc::{
    parse_queue_env, ChannelPair, QueueError, SendOutcome, TaskRequest, TaskResponse, QUEUE_ENV,
    RETRY_DELAY_ENV, SAMPLES_ENV,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::estimate::{estimate, DEFAULT_SAMPLES};
use crate::timer::Timer;

/// Retry delay of the reference configuration.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Global flag set by the SIGTERM handler to request graceful shutdown.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if a graceful shutdown has been requested.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Set the shutdown flag, as the signal handler would.
/// Used by in-process tests that drive worker loops on threads.
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Clear the shutdown flag. In the process-per-worker configuration the flag
/// dies with the worker process; this exists for in-process tests.
pub fn reset_shutdown() {
    SHUTDOWN_REQUESTED.store(false, Ordering::Relaxed);
}

/// Install a SIGTERM handler that sets the `SHUTDOWN_REQUESTED` flag.
/// The handler is async-signal-safe (only sets an atomic).
#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// No-op on non-Unix (no SIGTERM equivalent).
#[cfg(not(unix))]
fn install_sigterm_handler() {}

/// Errors that terminate a worker with a non-zero status.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("missing environment variable {0} (workers are spawned by the coordinator)")]
    MissingEnv(&'static str),

    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("channel error: {0}")]
    Queue(#[from] QueueError),
}

/// Worker main loop.
pub struct WorkerMain {
    channels: ChannelPair,
    retry_delay: Duration,
    samples: u64,
}

impl WorkerMain {
    /// Build a worker from the environment the coordinator prepared.
    /// Failure to open either channel handle is fatal to the worker.
    pub fn from_env() -> Result<Self, WorkerError> {
        let queues =
            std::env::var(QUEUE_ENV).map_err(|_| WorkerError::MissingEnv(QUEUE_ENV))?;
        let (request_name, response_name) =
            parse_queue_env(&queues).ok_or_else(|| WorkerError::InvalidEnv {
                var: QUEUE_ENV,
                value: queues.clone(),
            })?;
        let channels = ChannelPair::open(request_name, response_name)?;

        let retry_delay = match std::env::var(RETRY_DELAY_ENV) {
            Ok(value) => {
                let millis: u64 = value.parse().map_err(|_| WorkerError::InvalidEnv {
                    var: RETRY_DELAY_ENV,
                    value,
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => DEFAULT_RETRY_DELAY,
        };

        let samples = match std::env::var(SAMPLES_ENV) {
            Ok(value) => value.parse().map_err(|_| WorkerError::InvalidEnv {
                var: SAMPLES_ENV,
                value,
            })?,
            Err(_) => DEFAULT_SAMPLES,
        };

        Ok(Self::new(channels, retry_delay, samples))
    }

    /// Build a worker over already-open channels (used by tests).
    pub fn new(channels: ChannelPair, retry_delay: Duration, samples: u64) -> Self {
        Self {
            channels,
            retry_delay,
            samples,
        }
    }

    /// Run the poll/compute/respond loop until shutdown is requested.
    pub fn run(&mut self) -> Result<(), WorkerError> {
        install_sigterm_handler();

        loop {
            // Safe point: between task cycles, never mid-computation.
            if shutdown_requested() {
                break;
            }

            let request = match self.channels.requests.try_recv::<TaskRequest>()? {
                Some(request) => request,
                None => {
                    std::thread::sleep(self.retry_delay);
                    continue;
                }
            };

            // Defensive guard: the catalog guarantees well-formed ranges, so
            // a malformed request is treated as a no-op poll.
            if !request.is_well_formed() {
                tracing::warn!(
                    task_id = request.task_id,
                    domain_min = request.domain_min,
                    domain_max = request.domain_max,
                    "ignoring malformed request"
                );
                continue;
            }

            let timer = Timer::start();
            let result = estimate(
                request.integrand,
                request.domain_min,
                request.domain_max,
                self.samples,
            );
            let compute_time_ns = timer.stop();

            let response = TaskResponse {
                task_id: request.task_id,
                result,
                compute_time_ns,
            };
            while let SendOutcome::Full = self.channels.responses.try_send(&response)? {
                std::thread::sleep(self.retry_delay);
            }

            tracing::debug!(
                task_id = request.task_id,
                result,
                compute_time_ns,
                "task completed"
            );

            // Second safe point, right after a completed task cycle.
            if shutdown_requested() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadbench_ipc::{ChannelPair, IntegrandId, DEFAULT_CAPACITY};
    use serial_test::serial;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn unique_tag() -> String {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        format!(
            "worker-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn request(task_id: u32, lo: f64, hi: f64) -> TaskRequest {
        TaskRequest {
            task_id,
            domain_min: lo,
            domain_max: hi,
            integrand: IntegrandId::Constant,
        }
    }

    fn send_retrying(pair: &ChannelPair, request: &TaskRequest) {
        while let SendOutcome::Full = pair.requests.try_send(request).unwrap() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn recv_retrying(pair: &ChannelPair) -> TaskResponse {
        loop {
            if let Some(response) = pair.responses.try_recv().unwrap() {
                return response;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    #[serial]
    fn worker_serves_requests_and_exits_on_shutdown() {
        reset_shutdown();

        let pair = ChannelPair::create(&unique_tag(), DEFAULT_CAPACITY).unwrap();
        let worker_channels =
            ChannelPair::open(pair.requests.name(), pair.responses.name()).unwrap();

        let handle = std::thread::spawn(move || {
            WorkerMain::new(worker_channels, Duration::from_millis(2), 1_000).run()
        });

        for id in 0..3 {
            send_retrying(&pair, &request(id, 0.0, 1.0));
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            let response = recv_retrying(&pair);
            // f3 = 3 over [0,1] is exact regardless of sampling.
            assert!((response.result - 3.0).abs() < 1e-9);
            assert!(response.compute_time_ns > 0);
            seen.push(response.task_id);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);

        request_shutdown();
        handle.join().unwrap().unwrap();
        reset_shutdown();
    }

    #[test]
    #[serial]
    fn malformed_request_is_a_no_op() {
        reset_shutdown();

        let pair = ChannelPair::create(&unique_tag(), DEFAULT_CAPACITY).unwrap();
        let worker_channels =
            ChannelPair::open(pair.requests.name(), pair.responses.name()).unwrap();

        let handle = std::thread::spawn(move || {
            WorkerMain::new(worker_channels, Duration::from_millis(2), 1_000).run()
        });

        // Empty range first; a well-formed request afterwards.
        send_retrying(&pair, &request(0, 1.0, 1.0));
        send_retrying(&pair, &request(1, 0.0, 1.0));

        let response = recv_retrying(&pair);
        assert_eq!(response.task_id, 1, "malformed request must produce no response");

        request_shutdown();
        handle.join().unwrap().unwrap();
        reset_shutdown();
    }

    #[test]
    #[serial]
    fn from_env_requires_queue_names() {
        std::env::remove_var(QUEUE_ENV);
        assert!(matches!(
            WorkerMain::from_env(),
            Err(WorkerError::MissingEnv(_))
        ));
    }
}
