//! Bounded Non-Blocking Message Queues
//!
//! Safe wrapper over POSIX message queues (`mq_*`). Both channels are opened
//! with `O_NONBLOCK` and a small `mq_maxmsg`, so a full queue rejects a send
//! and an empty queue rejects a receive instead of blocking; the capacity
//! bound is the backpressure mechanism and callers retry with a fixed delay.
//!
//! Unlike a pipe, a message queue preserves message boundaries under
//! concurrent readers, which is what lets every worker in the pool receive
//! from the same request channel.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::ffi::CString;
use thiserror::Error;

use crate::codec::{self, CodecError, MAX_MSG_SIZE};

/// Default queue capacity (messages) of the reference configuration.
pub const DEFAULT_CAPACITY: usize = 2;

/// Errors from queue setup or non-transient queue operations.
///
/// `Full` and `Empty` are expected contention outcomes, not errors, and are
/// reported through [`SendOutcome`] and `Option` instead.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid queue name {0:?}: must be \"/name\" with no further '/'")]
    InvalidName(String),

    #[error("failed to open message queue {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send on message queue: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to receive from message queue: {0}")]
    Receive(#[source] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Outcome of a non-blocking send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was placed on the queue.
    Accepted,
    /// The queue is at capacity; the caller retries after its delay.
    Full,
}

/// A single bounded, non-blocking POSIX message queue.
///
/// The creating side owns the kernel queue name and unlinks it on drop;
/// opening sides only close their descriptor.
#[derive(Debug)]
pub struct MessageQueue {
    mqd: libc::mqd_t,
    name: String,
    cname: CString,
    owned: bool,
}

/// Queue names must be "/something" with no further slashes (mq_open(3)).
fn queue_cname(name: &str) -> Result<CString, QueueError> {
    let valid = name.starts_with('/') && name.len() > 1 && !name[1..].contains('/');
    if !valid {
        return Err(QueueError::InvalidName(name.to_string()));
    }
    CString::new(name).map_err(|_| QueueError::InvalidName(name.to_string()))
}

impl MessageQueue {
    /// Create (and own) a queue with the given message capacity.
    ///
    /// Any stale queue left behind under the same name by a previous run is
    /// unlinked first.
    pub fn create(name: &str, capacity: usize) -> Result<Self, QueueError> {
        let cname = queue_cname(name)?;

        // Stale queues survive process exit; clear before creating.
        unsafe {
            libc::mq_unlink(cname.as_ptr());
        }

        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        attr.mq_maxmsg = capacity as libc::c_long;
        attr.mq_msgsize = MAX_MSG_SIZE as libc::c_long;

        let mqd = unsafe {
            libc::mq_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR | libc::O_NONBLOCK,
                0o600 as libc::c_uint,
                &attr as *const libc::mq_attr,
            )
        };
        if mqd == -1 {
            return Err(QueueError::Open {
                name: name.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(Self {
            mqd,
            name: name.to_string(),
            cname,
            owned: true,
        })
    }

    /// Open an existing queue by name (worker side).
    pub fn open(name: &str) -> Result<Self, QueueError> {
        let cname = queue_cname(name)?;

        let mqd = unsafe { libc::mq_open(cname.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK) };
        if mqd == -1 {
            return Err(QueueError::Open {
                name: name.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(Self {
            mqd,
            name: name.to_string(),
            cname,
            owned: false,
        })
    }

    /// The queue's kernel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attempt to place a message on the queue without blocking.
    pub fn try_send<T>(&self, message: &T) -> Result<SendOutcome, QueueError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        let bytes = codec::encode(message)?;

        let ret = unsafe {
            libc::mq_send(
                self.mqd,
                bytes.as_ptr() as *const libc::c_char,
                bytes.len(),
                0,
            )
        };
        if ret == 0 {
            return Ok(SendOutcome::Accepted);
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EAGAIN) {
            Ok(SendOutcome::Full)
        } else {
            Err(QueueError::Send(err))
        }
    }

    /// Attempt to take one message from the queue without blocking.
    /// Returns `None` when the queue is empty.
    pub fn try_recv<T>(&self) -> Result<Option<T>, QueueError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        let mut buf = AlignedVec::with_capacity(MAX_MSG_SIZE);
        buf.resize(MAX_MSG_SIZE, 0);

        let mut prio: libc::c_uint = 0;
        let n = unsafe {
            libc::mq_receive(
                self.mqd,
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
                &mut prio,
            )
        };

        if n >= 0 {
            let message = codec::decode(&buf[..n as usize])?;
            return Ok(Some(message));
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EAGAIN) {
            Ok(None)
        } else {
            Err(QueueError::Receive(err))
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        unsafe {
            libc::mq_close(self.mqd);
            if self.owned {
                libc::mq_unlink(self.cname.as_ptr());
            }
        }
    }
}

/// The coordinator/worker channel pair: a request queue the coordinator
/// writes and the pool reads, and a response queue with the roles reversed.
#[derive(Debug)]
pub struct ChannelPair {
    /// Coordinator -> workers.
    pub requests: MessageQueue,
    /// Workers -> coordinator.
    pub responses: MessageQueue,
}

impl ChannelPair {
    /// Create both queues under names derived from `tag` (typically the
    /// coordinator's pid, keeping concurrent runs apart).
    pub fn create(tag: &str, capacity: usize) -> Result<Self, QueueError> {
        let requests = MessageQueue::create(&format!("/quadbench-req-{tag}"), capacity)?;
        let responses = MessageQueue::create(&format!("/quadbench-res-{tag}"), capacity)?;
        tracing::debug!(
            requests = requests.name(),
            responses = responses.name(),
            capacity,
            "channel pair created"
        );
        Ok(Self {
            requests,
            responses,
        })
    }

    /// Open an existing channel pair by queue names (worker side).
    pub fn open(request_name: &str, response_name: &str) -> Result<Self, QueueError> {
        Ok(Self {
            requests: MessageQueue::open(request_name)?,
            responses: MessageQueue::open(response_name)?,
        })
    }
}
