//! Constraint variables
use crate::types::{ObjectId, RealScalar};

/// Identifier of a constraint variable. Variables that belong to a simulation
/// object use the id of that object.
pub type VariableId = ObjectId;

pub trait ConstraintVariable {
    //! A block of unknowns of the constraint system

    /// Scalar type
    type T: RealScalar;

    /// Identifier
    fn id(&self) -> VariableId;

    /// Current value
    fn current_value(&self) -> &[Self::T];

    /// Mutable access to the current value
    fn current_value_mut(&mut self) -> &mut [Self::T];

    /// Diagonal of the inverse mass matrix
    fn inv_mass(&self) -> &[Self::T];

    /// Number of unknowns in this block
    fn dim(&self) -> usize {
        self.current_value().len()
    }

    /// Apply the change `delta_lambda` of a constraint multiplier whose
    /// jacobian block for this variable is `jacobian`
    fn apply_relaxation_update(&mut self, jacobian: &[Self::T], delta_lambda: Self::T) {
        let inv_mass = self.inv_mass().to_vec();
        for ((v, j), m) in self
            .current_value_mut()
            .iter_mut()
            .zip(jacobian)
            .zip(inv_mass)
        {
            *v = *v + m * *j * delta_lambda;
        }
    }
}
