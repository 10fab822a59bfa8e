//! Coordinator
//!
//! Spawns the round's worker pool, feeds the task batch through the request
//! channel while draining the response channel in the same non-blocking poll
//! cycle, then signals and reaps the pool. Servicing both channels from one
//! loop keeps the bounded request queue full without deadlocking against a
//! full response queue.

use quadbench_ipc::{
    queue_env_value, ChannelPair, QueueError, SendOutcome, TaskResponse, QUEUE_ENV,
    RETRY_DELAY_ENV, SAMPLES_ENV,
};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::catalog::Catalog;

/// Hidden CLI flag that switches the binary into worker mode.
pub const WORKER_FLAG: &str = "--pool-worker";

/// How long `Drop` waits for a signaled worker before force-killing it.
const DROP_GRACE: Duration = Duration::from_millis(50);

/// Errors that abort the benchmark run.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to locate the worker binary: {0}")]
    WorkerBinary(#[source] std::io::Error),

    #[error("failed to spawn worker: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("channel error: {0}")]
    Queue(#[from] QueueError),
}

/// Lifecycle state of one pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process spawned, round not yet running.
    Spawned,
    /// Round in progress; the worker is polling the request channel.
    Serving,
    /// Cancellation signal delivered.
    ShuttingDown,
    /// Exit status collected.
    Reaped,
}

/// Phase of the per-round dispatch/collection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundPhase {
    /// Tasks remain to be sent; responses are drained opportunistically.
    Dispatching,
    /// All tasks sent; only collecting responses.
    Draining,
    /// All responses collected.
    Done,
}

/// Timing record of one completed round.
#[derive(Debug, Clone, Copy)]
pub struct RoundRecord {
    /// Pool size used for this round.
    pub worker_count: usize,
    /// Sum of every response's compute time, in seconds.
    pub total_compute_time: f64,
}

/// Handle to one spawned worker process.
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
    state: WorkerState,
}

impl WorkerHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Deliver the cancellation signal (SIGTERM). The worker observes it at
    /// its next safe point between task cycles. Signaling a worker that has
    /// already exited is not an error.
    pub fn signal_shutdown(&mut self) -> Result<(), std::io::Error> {
        self.state = WorkerState::ShuttingDown;
        let ret = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM) };
        if ret == -1 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Collect the worker's exit status, waiting up to `timeout` for the
    /// cooperative exit. A worker that ignores the signal is force-killed so
    /// the round can end, and the failure is reported to the caller.
    pub fn reap(&mut self, timeout: Duration) -> Result<(), std::io::Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.state = WorkerState::Reaped;
                tracing::debug!(pid = self.child.id(), %status, "worker reaped");
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.child.kill()?;
                self.child.wait()?;
                self.state = WorkerState::Reaped;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "worker did not exit after SIGTERM and was killed",
                ));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.state == WorkerState::Reaped {
            return;
        }
        let _ = self.signal_shutdown();
        std::thread::sleep(DROP_GRACE);
        if !matches!(self.child.try_wait(), Ok(Some(_))) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Coordinator for the whole benchmark: owns the channel pair and runs one
/// round per pool size.
pub struct Coordinator {
    channels: ChannelPair,
    retry_delay: Duration,
    samples: u64,
    worker_timeout: Duration,
    worker_binary: Option<PathBuf>,
}

impl Coordinator {
    /// Build a coordinator over an already-created channel pair.
    pub fn new(
        channels: ChannelPair,
        retry_delay: Duration,
        samples: u64,
        worker_timeout: Duration,
    ) -> Self {
        Self {
            channels,
            retry_delay,
            samples,
            worker_timeout,
            worker_binary: None,
        }
    }

    /// Use an explicit worker binary instead of `current_exe()`.
    ///
    /// Under a test harness `current_exe()` is the harness itself, not the
    /// quadbench binary, so callers that are not the binary must set this.
    pub fn with_worker_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_binary = Some(path.into());
        self
    }

    /// Spawn one worker process: the worker binary invoked in worker mode,
    /// with the queue names and settings in its environment.
    pub fn spawn_worker(&self) -> Result<WorkerHandle, CoordinatorError> {
        let binary = match &self.worker_binary {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(CoordinatorError::WorkerBinary)?,
        };

        let child = Command::new(binary)
            .arg(WORKER_FLAG)
            .env(
                QUEUE_ENV,
                queue_env_value(self.channels.requests.name(), self.channels.responses.name()),
            )
            .env(RETRY_DELAY_ENV, self.retry_delay.as_millis().to_string())
            .env(SAMPLES_ENV, self.samples.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(CoordinatorError::SpawnFailed)?;

        tracing::debug!(pid = child.id(), "worker spawned");
        Ok(WorkerHandle {
            child,
            state: WorkerState::Spawned,
        })
    }

    /// Run one full round with a pool of `worker_count` processes: spawn,
    /// dispatch and collect the whole batch, signal, reap.
    ///
    /// The pool is fully torn down before this returns, so consecutive
    /// rounds never share workers. Reap failures are reported, not fatal;
    /// the round's results were already fully collected.
    pub fn run_round(
        &self,
        catalog: &mut Catalog,
        worker_count: usize,
    ) -> Result<RoundRecord, CoordinatorError> {
        catalog.clear_results();

        let mut pool = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            pool.push(self.spawn_worker()?);
        }
        for worker in &mut pool {
            worker.state = WorkerState::Serving;
        }

        let total_ns = self.dispatch_and_collect(catalog)?;

        for worker in &mut pool {
            if let Err(e) = worker.signal_shutdown() {
                tracing::warn!(error = %e, "failed to signal worker");
            }
        }
        for mut worker in pool {
            if let Err(e) = worker.reap(self.worker_timeout) {
                tracing::warn!(error = %e, "failed to reap worker; round results are unaffected");
            }
        }

        Ok(RoundRecord {
            worker_count,
            total_compute_time: total_ns as f64 / 1e9,
        })
    }

    /// The per-round dispatch/collection loop of one coordinator cycle:
    /// drain at most one response, then attempt to send the next not-yet-sent
    /// task, then sleep the retry delay. A rejected send is retried on the
    /// next cycle, never dropped. Returns the summed compute time (ns) once
    /// every task has a collected response.
    pub fn dispatch_and_collect(&self, catalog: &mut Catalog) -> Result<u64, CoordinatorError> {
        let n_tasks = catalog.len();
        let mut phase = RoundPhase::Dispatching;
        let mut task_count = 0usize;
        let mut response_count = 0usize;
        let mut total_ns = 0u64;

        while response_count < n_tasks {
            if let Some(response) = self.channels.responses.try_recv::<TaskResponse>()? {
                if catalog.record(response.task_id, response.result) {
                    total_ns += response.compute_time_ns;
                    response_count += 1;
                } else {
                    // The channel delivers each request exactly once, so this
                    // is a protocol violation worth surfacing, but the round's
                    // bookkeeping stays correct by ignoring it.
                    tracing::warn!(
                        task_id = response.task_id,
                        "dropping duplicate or unattributable response"
                    );
                }
            }

            if phase == RoundPhase::Dispatching {
                match self.channels.requests.try_send(&catalog.request(task_count))? {
                    SendOutcome::Accepted => {
                        task_count += 1;
                        if task_count == n_tasks {
                            phase = RoundPhase::Draining;
                            tracing::debug!(task_count, "all requests dispatched");
                        }
                    }
                    SendOutcome::Full => {}
                }
            }

            std::thread::sleep(self.retry_delay);
        }

        phase = RoundPhase::Done;
        tracing::debug!(?phase, response_count, "round collection complete");
        Ok(total_ns)
    }
}
