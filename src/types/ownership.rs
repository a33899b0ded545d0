//! Ownership
use super::Rank;

/// Ownership of an object held by a partition
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Ownership {
    /// Authoritative on the current partition
    Owned,
    /// Halo copy on the current partition. The value is the rank of the partition that owns this
    Ghost(Rank),
}

impl Ownership {
    /// Is this the authoritative copy?
    pub fn is_owned(&self) -> bool {
        matches!(self, Ownership::Owned)
    }
}
