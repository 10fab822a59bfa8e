#![warn(missing_docs)]
//! Quadbench IPC Protocol
//!
//! Bounded, non-blocking POSIX message queues carrying integration tasks from
//! the coordinator to a pool of worker processes and results back. Messages
//! are serialized with rkyv into fixed-size queue slots; capacity bounding on
//! the queues is the only backpressure mechanism.

mod codec;
mod messages;
mod queue;

pub use codec::{decode, encode, CodecError, MAX_MSG_SIZE};
pub use messages::{IntegrandId, TaskRequest, TaskResponse};
pub use queue::{ChannelPair, MessageQueue, QueueError, SendOutcome, DEFAULT_CAPACITY};

/// Environment variable carrying the queue names to worker processes,
/// formatted as `<request_queue>,<response_queue>`.
pub const QUEUE_ENV: &str = "QUADBENCH_QUEUES";

/// Environment variable carrying the worker retry delay in milliseconds.
pub const RETRY_DELAY_ENV: &str = "QUADBENCH_RETRY_DELAY_MS";

/// Environment variable carrying the Monte Carlo sample count per task.
pub const SAMPLES_ENV: &str = "QUADBENCH_SAMPLES";

/// Build the `QUEUE_ENV` value for a channel pair's queue names.
pub fn queue_env_value(request_name: &str, response_name: &str) -> String {
    format!("{request_name},{response_name}")
}

/// Parse a `QUEUE_ENV` value back into `(request_name, response_name)`.
pub fn parse_queue_env(value: &str) -> Option<(&str, &str)> {
    let (req, res) = value.split_once(',')?;
    if req.is_empty() || res.is_empty() {
        return None;
    }
    Some((req, res))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_env_roundtrip() {
        let value = queue_env_value("/qb-req-1", "/qb-res-1");
        assert_eq!(parse_queue_env(&value), Some(("/qb-req-1", "/qb-res-1")));
    }

    #[test]
    fn queue_env_rejects_malformed() {
        assert_eq!(parse_queue_env("/only-one-name"), None);
        assert_eq!(parse_queue_env(",/qb-res"), None);
        assert_eq!(parse_queue_env("/qb-req,"), None);
    }
}
