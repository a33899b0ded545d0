//! Partition managers
mod shared_memory;
#[cfg(feature = "mpi")]
mod mpi;

#[cfg(feature = "mpi")]
pub use mpi::MpiManager;
pub use shared_memory::{SharedMemoryManager, TeamMember};
