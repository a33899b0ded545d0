//! Traits

mod builder;
mod io;
mod manager;
mod object;
mod variable;

pub use builder::PartitionBuilder;
#[cfg(feature = "serde")]
pub use io::{RONExport, RONImport};
pub use manager::PartitionManager;
pub use object::SimulationObject;
pub use variable::{ConstraintVariable, VariableId};
