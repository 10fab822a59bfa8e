//! Message Slot Encoding
//!
//! POSIX message queues preserve message boundaries, so no length prefix is
//! needed; each message is an rkyv payload that must fit in one fixed-size
//! queue slot.

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes, Deserialize, Infallible, Serialize};
use thiserror::Error;

/// Fixed slot size for every queue message. Large enough for any request or
/// response with headroom; `mq_msgsize` is set to this value.
pub const MAX_MSG_SIZE: usize = 128;

/// Errors that can occur while encoding or decoding a queue message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("message too large: {size} bytes (slot is {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    #[error("empty message")]
    EmptyMessage,
}

/// Serialize a message into an aligned byte buffer that fits one queue slot.
pub fn encode<T>(message: &T) -> Result<AlignedVec, CodecError>
where
    T: Serialize<AllocSerializer<256>>,
{
    let bytes = rkyv::to_bytes::<_, 256>(message)
        .map_err(|e| CodecError::Serialization(e.to_string()))?;

    if bytes.len() > MAX_MSG_SIZE {
        return Err(CodecError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MSG_SIZE,
        });
    }

    Ok(bytes)
}

/// Validate and deserialize a message from a received queue slot.
///
/// The slice must start at an 8-byte-aligned address; `try_recv` hands out
/// slices of an `AlignedVec`, which guarantees this.
pub fn decode<T>(buf: &[u8]) -> Result<T, CodecError>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
{
    if buf.is_empty() {
        return Err(CodecError::EmptyMessage);
    }

    let archived = rkyv::check_archived_root::<T>(buf)
        .map_err(|e| CodecError::Deserialization(e.to_string()))?;

    let value: T = archived
        .deserialize(&mut Infallible)
        .map_err(|_| CodecError::Deserialization("infallible deserialization failed".into()))?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{IntegrandId, TaskRequest, TaskResponse};

    #[test]
    fn request_roundtrip() {
        let original = TaskRequest {
            task_id: 13,
            domain_min: 1.0,
            domain_max: 10.0,
            integrand: IntegrandId::Linear,
        };

        let bytes = encode(&original).unwrap();
        assert!(bytes.len() <= MAX_MSG_SIZE);

        let decoded: TaskRequest = decode(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn response_roundtrip() {
        let original = TaskResponse {
            task_id: 19,
            result: 0.841470,
            compute_time_ns: 123_456_789,
        };

        let bytes = encode(&original).unwrap();
        let decoded: TaskResponse = decode(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn decode_rejects_empty_slot() {
        let result: Result<TaskRequest, _> = decode(&[]);
        assert!(matches!(result, Err(CodecError::EmptyMessage)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let mut buf = AlignedVec::new();
        buf.extend_from_slice(&[0xffu8; 24]);
        let result: Result<TaskRequest, _> = decode(&buf);
        assert!(matches!(result, Err(CodecError::Deserialization(_))));
    }
}
