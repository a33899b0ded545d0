//! Errors
use super::Rank;
use thiserror::Error;

/// Errors raised while exchanging data between partitions
#[derive(Debug, Error)]
pub enum DomainError {
    /// Object or variable state could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A thread of the team panicked while holding an exchange mailbox
    #[error("mailbox for {from} -> {to} was poisoned by a panicked thread")]
    PoisonedMailbox {
        /// Sending rank
        from: Rank,
        /// Receiving rank
        to: Rank,
    },

    /// A partition talks to a rank that the manager does not know about
    #[error("rank {rank} has no partition or process to exchange with")]
    UnknownRank {
        /// The unknown rank
        rank: Rank,
    },

    /// Another member of the team failed during the same exchange
    #[error("exchange aborted because rank {rank} failed")]
    PeerFailed {
        /// The rank that failed first
        rank: Rank,
    },

    /// Reading or writing a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be written as RON
    #[cfg(feature = "serde")]
    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),

    /// A RON document could not be parsed
    #[cfg(feature = "serde")]
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// The message passing runtime reported a failure
    #[error("message passing failure: {0}")]
    Mpi(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
