use approx::assert_relative_eq;
use ddgrid::{
    shapes::{sphere_lattice, Sphere},
    solver::{Constraint, ConstraintMode, SystemDescriptor, Variable},
    traits::{ConstraintVariable, PartitionBuilder, PartitionManager, SimulationObject},
    types::{Aabb, Axis, DomainError, Ownership},
    MpiManager, PsorSolver, SliceBuilder, SolverSettings,
};
use mpi::{collective::SystemOperation, traits::CommunicatorCollectives};

/// Test that no sphere is lost or duplicated while moving across processes
fn test_migration(manager: &mut MpiManager<Sphere<f64>>, builder: &SliceBuilder<f64>) {
    let rank = manager.mpi_rank();
    let spheres = sphere_lattice(
        [2, 2 * builder.tot_ranks(), 2],
        Aabb::new([0.0; 3], [1.0; 3]),
        0.05,
    )
    .into_iter()
    .map(|s| s.with_velocity([0.0, 0.08, 0.0]))
    .collect::<Vec<_>>();
    manager
        .set_partition(builder.build_partition(spheres.iter().cloned(), rank))
        .unwrap();

    for step in 1..=5 {
        manager.step(0.5).unwrap();
        manager.update().unwrap();

        let p = manager.partition().unwrap();
        for o in p.owned_objects() {
            assert_eq!(builder.owner_of(&o.position()), Some(rank));
        }
        for (o, ownership) in p.objects() {
            if let Ownership::Ghost(owner) = ownership {
                assert!(p.predicate().overlaps(&o.bounding_box()));
                assert!(p.interface(owner).unwrap().is_shared(o.id()));
            }
        }

        let mut total = 0;
        manager
            .comm()
            .all_reduce_into(&p.owned_count(), &mut total, SystemOperation::sum());
        let expected = spheres
            .iter()
            .filter(|s| s.centre[1] + 0.04 * step as f64 <= 1.0)
            .count();
        assert_eq!(total, expected);
    }
}

/// Test that a variable shared by two processes ends up with the same value on both
fn test_shared_variable(manager: &MpiManager<Sphere<f64>>, builder: &SliceBuilder<f64>) {
    let rank = manager.mpi_rank();
    let mut partition = builder.build_partition(Vec::<Sphere<f64>>::new(), rank);

    // A sphere straddling the boundary between the first two slices
    if rank == 0 {
        let (_, hi) = partition.predicate().bounds(Axis::Y);
        partition.insert(Sphere::new(1000, [0.5, hi - 0.01, 0.5], 0.05));
    }
    manager.partition_update(&mut partition).unwrap();
    if rank == 1 {
        assert_eq!(partition.ownership(1000), Some(Ownership::Ghost(0)));
    }

    // Process 0 drives the velocity of the sphere to 1
    let mut d = SystemDescriptor::new();
    if partition.object(1000).is_some() {
        d.add_variable(Variable::new(1000, vec![0.0], vec![1.0]));
        if rank == 0 {
            d.add_constraint(Constraint::new(ConstraintMode::Bilateral, -1.0).with_term(1000, vec![1.0]));
        }
    }
    let settings = SolverSettings {
        max_iterations: 10,
        communication_period: 3,
        ..Default::default()
    };
    let report = PsorSolver::new(settings)
        .solve(manager, &mut partition, &mut d)
        .unwrap();

    assert_eq!(report.exchanges, vec![3, 6, 9, 10]);
    if let Some(v) = d.variable(1000) {
        assert_relative_eq!(v.current_value()[0], 1.0, epsilon = 1e-12);
    }
}

/// Test that a failure on one process is reported by the exchange on every process
fn test_failure_agreement(manager: &MpiManager<Sphere<f64>>, builder: &SliceBuilder<f64>) {
    let rank = manager.mpi_rank();
    let mut partition = builder.build_partition(Vec::<Sphere<f64>>::new(), rank);

    if rank == 0 {
        manager.notify_failure(0);
    }
    let result = manager.exchange(&mut partition);
    assert!(matches!(result, Err(DomainError::PeerFailed { rank: 0 })));

    // The failure is only reported once
    manager.exchange(&mut partition).unwrap();

    // A neighbour without a process fails on its partition and is shared with the others
    let size = manager.mpi_tot_ranks();
    if rank == 0 {
        partition.add_interface(size, builder.predicate(0));
    }
    let result = manager.exchange(&mut partition);
    if rank == 0 {
        assert!(matches!(result, Err(DomainError::UnknownRank { rank }) if rank == size));
    } else {
        assert!(matches!(result, Err(DomainError::PeerFailed { rank: 0 })));
    }
}

/// Test that a partition with a neighbour that has no process is rejected
fn test_unknown_neighbour(manager: &mut MpiManager<Sphere<f64>>, builder: &SliceBuilder<f64>) {
    let rank = manager.mpi_rank();
    let mut partition = builder.build_partition(Vec::<Sphere<f64>>::new(), rank);
    partition.add_interface(manager.mpi_tot_ranks() + 1, builder.predicate(rank));
    assert!(matches!(
        manager.set_partition(partition),
        Err(DomainError::UnknownRank { .. })
    ));
}

/// Run tests
fn main() {
    let mut manager = MpiManager::<Sphere<f64>>::new().unwrap();
    let rank = manager.mpi_rank();
    let builder = SliceBuilder::<f64>::uniform(manager.mpi_tot_ranks(), 0.0, 1.0, Axis::Y);

    if rank == 0 {
        println!("Testing migration");
    }
    test_migration(&mut manager, &builder);

    if builder.tot_ranks() > 1 {
        if rank == 0 {
            println!("Testing shared variable");
        }
        test_shared_variable(&manager, &builder);
    }

    if rank == 0 {
        println!("Testing failure agreement");
    }
    test_failure_agreement(&manager, &builder);
    test_unknown_neighbour(&mut manager, &builder);
}
