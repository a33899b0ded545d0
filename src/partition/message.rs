//! Messages carried by interface buffers
use crate::types::{DomainResult, ObjectId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// One change to the objects shared across an interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum ObjectMessage {
    /// Full state of an object, as written by the sending partition
    Update { id: ObjectId, state: Vec<u8> },
    /// The sending partition no longer shares the object
    Remove { id: ObjectId },
}

/// Encode a batch of messages as one buffer
pub(crate) fn encode<M: Serialize>(messages: &[M]) -> DomainResult<Vec<u8>> {
    Ok(bincode::serialize(messages)?)
}

/// Decode a buffer written by [encode]. An empty buffer holds no messages.
pub(crate) fn decode<M: DeserializeOwned>(buffer: &[u8]) -> DomainResult<Vec<M>> {
    if buffer.is_empty() {
        Ok(vec![])
    } else {
        Ok(bincode::deserialize(buffer)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let m = decode::<ObjectMessage>(&[]).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn test_truncated_buffer() {
        let buffer = encode(&[ObjectMessage::Update {
            id: 3,
            state: vec![1, 2, 3, 4],
        }])
        .unwrap();
        assert!(decode::<ObjectMessage>(&buffer[..buffer.len() - 2]).is_err());
    }
}
