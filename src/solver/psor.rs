//! Projected SOR with periodic reconciliation of shared variables
use super::{descriptor::dot, ConstraintMode, SolverSettings, SystemDescriptor};
use crate::{
    partition::{decode, encode, InterfaceChannel, Partition},
    traits::{ConstraintVariable, PartitionManager, SimulationObject, VariableId},
    types::{DomainResult, Ownership, Rank, RealScalar},
};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

/// Outcome of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport<T: RealScalar> {
    /// Maximum constraint violation in the last local sweep
    pub max_violation: T,
    /// Number of local sweeps performed
    pub iterations: usize,
    /// Sweeps after which shared variables were exchanged
    pub exchanges: Vec<usize>,
}

/// Projected successive over-relaxation on the local part of a partitioned
/// constraint system
///
/// Variables registered as shared on an interface are reconciled at every
/// communication step through the partition that owns their object: ghost
/// copies send how much they changed since the previous reconciliation, the
/// owner adds every change and sends the result back. The reported violation
/// is local to this partition.
#[derive(Debug, Clone)]
pub struct PsorSolver<T: RealScalar> {
    settings: SolverSettings<T>,
    max_violation: T,
}

impl<T: RealScalar> PsorSolver<T> {
    /// Create new
    pub fn new(settings: SolverSettings<T>) -> Self {
        Self {
            settings,
            max_violation: T::zero(),
        }
    }

    /// Settings
    pub fn settings(&self) -> &SolverSettings<T> {
        &self.settings
    }

    /// Mutable access to the settings
    pub fn settings_mut(&mut self) -> &mut SolverSettings<T> {
        &mut self.settings
    }

    /// Maximum constraint violation reached by the last solve
    pub fn error(&self) -> T {
        self.max_violation
    }

    /// Solve the local constraint system of `partition`
    ///
    /// This is collective: every partition of the run must call it with the
    /// same settings.
    pub fn solve<M, O, V>(
        &mut self,
        manager: &M,
        partition: &mut Partition<O>,
        descriptor: &mut SystemDescriptor<V>,
    ) -> DomainResult<SolveReport<T>>
    where
        M: PartitionManager,
        O: SimulationObject,
        V: ConstraintVariable<T = T>,
    {
        let mut report = SolveReport {
            max_violation: T::zero(),
            iterations: 0,
            exchanges: vec![],
        };
        self.max_violation = T::zero();
        if descriptor.constraints().is_empty() && partition.interfaces().is_empty() {
            return Ok(report);
        }

        // Variables of objects shared across an interface are shared there too
        for (_, interface) in partition.interfaces_mut() {
            let vars = interface
                .shared_objects()
                .keys()
                .filter(|id| descriptor.has_variable(**id))
                .copied()
                .collect::<BTreeSet<_>>();
            interface.set_shared_vars(vars);
        }
        let mut reference = partition
            .interfaces()
            .values()
            .flat_map(|i| i.shared_vars().iter())
            .filter_map(|id| {
                descriptor
                    .variable(*id)
                    .map(|v| (*id, v.current_value().to_vec()))
            })
            .collect::<HashMap<_, _>>();

        let (variables, constraints, term_indices) = descriptor.parts_mut();
        if !self.settings.warm_start {
            for c in constraints.iter_mut() {
                c.set_lambda(T::zero());
            }
        }
        // Diagonal of J M^-1 J^T + cfm
        let diagonal = constraints
            .iter()
            .zip(term_indices)
            .map(|(c, indices)| {
                indices.iter().zip(c.terms()).fold(c.cfm(), |acc, (i, (_, j))| {
                    j.iter()
                        .zip(variables[*i].inv_mass())
                        .fold(acc, |acc, (j, m)| acc + *j * *j * *m)
                })
            })
            .collect::<Vec<_>>();

        for iteration in 1..=self.settings.max_iterations {
            if !descriptor.constraints().is_empty() {
                report.max_violation = self.sweep(descriptor, &diagonal);
                report.iterations = iteration;
            }
            if self.settings.communicates_at(iteration) {
                self.reconcile(manager, partition, descriptor, &mut reference)?;
                report.exchanges.push(iteration);
                if let Some(tolerance) = self.settings.tolerance {
                    let local = num::cast::<T, f64>(report.max_violation).unwrap_or(f64::INFINITY);
                    if manager.reduce_max(local)? <= num::cast::<T, f64>(tolerance).unwrap_or(0.0) {
                        break;
                    }
                }
            }
        }
        self.max_violation = report.max_violation;
        Ok(report)
    }

    // One pass over every local constraint. Returns the largest violation seen.
    fn sweep<V: ConstraintVariable<T = T>>(
        &self,
        descriptor: &mut SystemDescriptor<V>,
        diagonal: &[T],
    ) -> T {
        let (variables, constraints, term_indices) = descriptor.parts_mut();
        let mut max_violation = T::zero();
        for ((c, indices), g) in constraints.iter_mut().zip(term_indices).zip(diagonal) {
            if *g <= T::zero() {
                continue;
            }
            let residual = indices.iter().zip(c.terms()).fold(
                c.rhs() + c.cfm() * c.lambda(),
                |acc, (i, (_, j))| acc + dot(j, variables[*i].current_value()),
            );
            let candidate = c.lambda() - self.settings.omega * residual / *g;
            let (lambda, violation) = match c.mode() {
                ConstraintMode::Bilateral => (candidate, residual.abs()),
                ConstraintMode::Unilateral => {
                    let lambda = candidate.max(T::zero());
                    if lambda > T::zero() {
                        (lambda, residual.abs())
                    } else {
                        (lambda, (-residual).max(T::zero()))
                    }
                }
            };
            let delta = lambda - c.lambda();
            c.set_lambda(lambda);
            for (i, (_, j)) in indices.iter().zip(c.terms()) {
                variables[*i].apply_relaxation_update(j, delta);
            }
            max_violation = max_violation.max(violation);
        }
        max_violation
    }

    // Reconcile shared variables through their owner. Ghost copies send their
    // change since the last reconciliation to the owner, which adds them all
    // and sends the resulting value back to every ghost.
    fn reconcile<M, O, V>(
        &self,
        manager: &M,
        partition: &mut Partition<O>,
        descriptor: &mut SystemDescriptor<V>,
        reference: &mut HashMap<VariableId, Vec<T>>,
    ) -> DomainResult<()>
    where
        M: PartitionManager,
        O: SimulationObject,
        V: ConstraintVariable<T = T>,
    {
        let rank = partition.rank();

        let received = swap_variables(manager, partition, |interface| {
            shared_with_role(interface, false)
                .filter_map(|id| {
                    let v = descriptor.variable(id)?;
                    let r = reference.get(&id)?;
                    let delta = v
                        .current_value()
                        .iter()
                        .zip(r)
                        .map(|(a, b)| *a - *b)
                        .collect::<Vec<T>>();
                    Some((id, delta))
                })
                .collect::<Vec<_>>()
        })?;
        for (n, deltas) in received {
            for (id, delta) in deltas {
                if !has_role(partition, n, id, true) {
                    continue;
                }
                let Some(v) = sized_variable(descriptor, id, &delta, rank, n) else {
                    continue;
                };
                for (x, d) in v.current_value_mut().iter_mut().zip(&delta) {
                    *x = *x + *d;
                }
                if self.settings.verbose {
                    debug!("[{rank}] variable {id} changed by {n}: {delta:?}");
                }
            }
        }

        let received = swap_variables(manager, partition, |interface| {
            shared_with_role(interface, true)
                .filter_map(|id| Some((id, descriptor.variable(id)?.current_value().to_vec())))
                .collect::<Vec<_>>()
        })?;
        for (n, values) in received {
            for (id, value) in values {
                if !has_role(partition, n, id, false) {
                    continue;
                }
                let Some(v) = sized_variable(descriptor, id, &value, rank, n) else {
                    continue;
                };
                v.current_value_mut().copy_from_slice(&value);
                if self.settings.verbose {
                    debug!("[{rank}] variable {id} set by owner {n}: {value:?}");
                }
            }
        }

        for (id, r) in reference.iter_mut() {
            if let Some(v) = descriptor.variable(*id) {
                r.copy_from_slice(v.current_value());
            }
        }
        Ok(())
    }
}

type VariableValues<T> = Vec<(VariableId, Vec<T>)>;

// Shared variables of an interface owned by this side (`owned`) or by the neighbour
fn shared_with_role<T: RealScalar>(
    interface: &InterfaceChannel<T>,
    owned: bool,
) -> impl Iterator<Item = VariableId> + '_ {
    interface
        .shared_vars()
        .iter()
        .copied()
        .filter(move |id| {
            interface.shared_objects().get(id).map(Ownership::is_owned) == Some(owned)
        })
}

fn has_role<O: SimulationObject>(
    partition: &Partition<O>,
    neighbour: Rank,
    id: VariableId,
    owned: bool,
) -> bool {
    partition.interface(neighbour).is_some_and(|i| {
        i.shared_vars().contains(&id)
            && i.shared_objects().get(&id).map(Ownership::is_owned) == Some(owned)
    })
}

// A local variable matching the size of received data
fn sized_variable<'a, V: ConstraintVariable>(
    descriptor: &'a mut SystemDescriptor<V>,
    id: VariableId,
    data: &[V::T],
    rank: Rank,
    neighbour: Rank,
) -> Option<&'a mut V> {
    let v = descriptor.variable_mut(id)?;
    if data.len() != v.dim() {
        warn!(
            "[{rank}] variable {id} from {neighbour} has size {}, expected {}",
            data.len(),
            v.dim()
        );
        return None;
    }
    Some(v)
}

// Send `outgoing(interface)` over every interface and decode what comes back.
// A rank that fails to encode still takes part in the exchange with empty
// buffers.
fn swap_variables<M, O, T, F>(
    manager: &M,
    partition: &mut Partition<O>,
    outgoing: F,
) -> DomainResult<Vec<(Rank, VariableValues<T>)>>
where
    M: PartitionManager,
    O: SimulationObject,
    T: RealScalar,
    F: Fn(&InterfaceChannel<O::T>) -> VariableValues<T>,
{
    let mut encoded = Ok(());
    for (_, interface) in partition.interfaces_mut() {
        match encode(&outgoing(interface)) {
            Ok(bytes) => interface.buffer_sending = bytes,
            Err(e) => {
                encoded = Err(e);
                break;
            }
        }
    }
    if let Err(e) = encoded {
        partition.discard_outgoing();
        manager.notify_failure(partition.rank());
        let _ = manager.exchange(partition);
        return Err(e);
    }
    manager.exchange(partition)?;
    partition
        .interfaces_mut()
        .map(|(n, interface)| Ok((*n, decode(&interface.take_receiving())?)))
        .collect()
}
