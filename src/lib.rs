//! Spatial domain decomposition for multi-domain simulation
//!
//! Space is split into partitions, each holding the objects whose position
//! it contains plus ghost copies of neighbouring objects that overlap it.
//! Partition managers migrate objects between partitions, and the projected
//! SOR solver relaxes constraint systems whose variables are shared across
//! partition interfaces.
#![cfg_attr(feature = "strict", deny(warnings), deny(unused_crate_dependencies))]
#![warn(missing_docs)]

mod io;
pub mod manager;
pub mod partition;
pub mod shapes;
pub mod solver;
pub mod traits;
pub mod types;

#[cfg(feature = "mpi")]
pub use manager::MpiManager;
pub use manager::SharedMemoryManager;
pub use partition::{BoxBuilder, Partition, SliceBuilder};
pub use solver::{PsorSolver, SolverSettings};
