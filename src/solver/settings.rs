//! Solver settings
use crate::types::RealScalar;
use serde::{Deserialize, Serialize};

/// Settings of the relaxation solver
///
/// Every partition of a run must use the same settings, as they decide when
/// the collective exchanges happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub struct SolverSettings<T: RealScalar> {
    /// Number of relaxation sweeps
    pub max_iterations: usize,
    /// Over-relaxation factor
    pub omega: T,
    /// Stop once the violation over all partitions is below this
    pub tolerance: Option<T>,
    /// Start from the multipliers of the previous solve
    pub warm_start: bool,
    /// Exchange shared variables every this many sweeps, and after the last one
    pub communication_period: usize,
    /// Log every reconciliation of shared variables
    pub verbose: bool,
}

impl<T: RealScalar> Default for SolverSettings<T> {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            omega: T::one(),
            tolerance: None,
            warm_start: true,
            communication_period: 1,
            verbose: false,
        }
    }
}

impl<T: RealScalar> SolverSettings<T> {
    /// Does the sweep numbered `iteration` (from 1) end with an exchange?
    pub fn communicates_at(&self, iteration: usize) -> bool {
        iteration == self.max_iterations || iteration % self.communication_period.max(1) == 0
    }
}
