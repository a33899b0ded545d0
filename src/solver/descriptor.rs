//! Local constraint systems
use crate::{
    traits::{ConstraintVariable, VariableId},
    types::RealScalar,
};
use std::collections::HashMap;

/// A block of unknowns with a diagonal mass
#[derive(Debug, Clone, PartialEq)]
pub struct Variable<T: RealScalar> {
    id: VariableId,
    value: Vec<T>,
    inv_mass: Vec<T>,
}

impl<T: RealScalar> Variable<T> {
    /// Create new
    pub fn new(id: VariableId, value: Vec<T>, inv_mass: Vec<T>) -> Self {
        assert_eq!(
            value.len(),
            inv_mass.len(),
            "Value and inverse mass must have the same size"
        );
        Self {
            id,
            value,
            inv_mass,
        }
    }

    /// A variable that is never moved by constraints
    pub fn fixed(id: VariableId, value: Vec<T>) -> Self {
        let inv_mass = vec![T::zero(); value.len()];
        Self::new(id, value, inv_mass)
    }
}

impl<T: RealScalar> ConstraintVariable for Variable<T> {
    type T = T;

    fn id(&self) -> VariableId {
        self.id
    }
    fn current_value(&self) -> &[T] {
        &self.value
    }
    fn current_value_mut(&mut self) -> &mut [T] {
        &mut self.value
    }
    fn inv_mass(&self) -> &[T] {
        &self.inv_mass
    }
}

/// How a constraint multiplier is projected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintMode {
    /// Equality: any multiplier is admissible
    Bilateral,
    /// Inequality: the multiplier must be non-negative
    Unilateral,
}

/// A scalar constraint `J v + rhs + cfm * lambda = 0` (or `>= 0`)
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<T: RealScalar> {
    terms: Vec<(VariableId, Vec<T>)>,
    rhs: T,
    cfm: T,
    mode: ConstraintMode,
    lambda: T,
}

impl<T: RealScalar> Constraint<T> {
    /// Create new, without any jacobian terms
    pub fn new(mode: ConstraintMode, rhs: T) -> Self {
        Self {
            terms: vec![],
            rhs,
            cfm: T::zero(),
            mode,
            lambda: T::zero(),
        }
    }

    /// Add the jacobian block of a variable
    pub fn with_term(mut self, variable: VariableId, jacobian: Vec<T>) -> Self {
        self.terms.push((variable, jacobian));
        self
    }

    /// Set the compliance (constraint force mixing) term
    pub fn with_cfm(mut self, cfm: T) -> Self {
        self.cfm = cfm;
        self
    }

    /// Jacobian blocks, one per referenced variable
    pub fn terms(&self) -> &[(VariableId, Vec<T>)] {
        &self.terms
    }

    /// Constant term
    pub fn rhs(&self) -> T {
        self.rhs
    }

    /// Compliance
    pub fn cfm(&self) -> T {
        self.cfm
    }

    /// Projection mode
    pub fn mode(&self) -> ConstraintMode {
        self.mode
    }

    /// Current multiplier
    pub fn lambda(&self) -> T {
        self.lambda
    }

    pub(crate) fn set_lambda(&mut self, lambda: T) {
        self.lambda = lambda;
    }
}

/// Variables and constraints of the part of the system held by one partition
#[derive(Debug, Clone)]
pub struct SystemDescriptor<V: ConstraintVariable> {
    variables: Vec<V>,
    index: HashMap<VariableId, usize>,
    constraints: Vec<Constraint<V::T>>,
    // Variable indices of the terms of each constraint
    term_indices: Vec<Vec<usize>>,
}

impl<V: ConstraintVariable> Default for SystemDescriptor<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ConstraintVariable> SystemDescriptor<V> {
    /// Create new
    pub fn new() -> Self {
        Self {
            variables: vec![],
            index: HashMap::new(),
            constraints: vec![],
            term_indices: vec![],
        }
    }

    /// Add a variable. Panics if a variable with the same id exists.
    pub fn add_variable(&mut self, variable: V) {
        let id = variable.id();
        if self.index.insert(id, self.variables.len()).is_some() {
            panic!("Variable {id} has already been added");
        }
        self.variables.push(variable);
    }

    /// Add a constraint. Panics if it references an unknown variable or if a
    /// jacobian block does not match the size of its variable.
    pub fn add_constraint(&mut self, constraint: Constraint<V::T>) {
        let indices = constraint
            .terms()
            .iter()
            .map(|(id, jacobian)| {
                let i = *self
                    .index
                    .get(id)
                    .unwrap_or_else(|| panic!("Unknown variable {id}"));
                assert_eq!(
                    jacobian.len(),
                    self.variables[i].dim(),
                    "Jacobian block of variable {id} has the wrong size"
                );
                i
            })
            .collect();
        self.constraints.push(constraint);
        self.term_indices.push(indices);
    }

    /// All variables
    pub fn variables(&self) -> &[V] {
        &self.variables
    }

    /// A variable
    pub fn variable(&self, id: VariableId) -> Option<&V> {
        self.index.get(&id).map(|i| &self.variables[*i])
    }

    /// Mutable access to a variable
    pub fn variable_mut(&mut self, id: VariableId) -> Option<&mut V> {
        self.index.get(&id).map(|i| &mut self.variables[*i])
    }

    /// Does the system have this variable?
    pub fn has_variable(&self, id: VariableId) -> bool {
        self.index.contains_key(&id)
    }

    /// All constraints
    pub fn constraints(&self) -> &[Constraint<V::T>] {
        &self.constraints
    }

    /// Positions in [SystemDescriptor::constraints] of the constraints that reference a variable
    pub fn constraints_referencing(&self, id: VariableId) -> Vec<usize> {
        match self.index.get(&id) {
            Some(i) => self
                .term_indices
                .iter()
                .enumerate()
                .filter(|(_, t)| t.contains(i))
                .map(|(c, _)| c)
                .collect(),
            None => vec![],
        }
    }

    /// Residual `J v + rhs + cfm * lambda` of a constraint
    pub fn residual(&self, constraint: usize) -> V::T {
        let c = &self.constraints[constraint];
        self.term_indices[constraint].iter().zip(c.terms()).fold(
            c.rhs() + c.cfm() * c.lambda(),
            |acc, (i, (_, jacobian))| acc + dot(jacobian, self.variables[*i].current_value()),
        )
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [V], &mut [Constraint<V::T>], &[Vec<usize>]) {
        (&mut self.variables, &mut self.constraints, &self.term_indices)
    }
}

pub(crate) fn dot<T: RealScalar>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::zero(), |acc, (x, y)| acc + *x * *y)
}
