//! Distributed relaxation solver
mod descriptor;
mod psor;
mod settings;

pub use descriptor::{Constraint, ConstraintMode, SystemDescriptor, Variable};
pub use psor::{PsorSolver, SolveReport};
pub use settings::SolverSettings;
