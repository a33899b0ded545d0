use ddgrid::{
    shapes::sphere_lattice,
    solver::{Constraint, ConstraintMode, SystemDescriptor, Variable},
    traits::{PartitionBuilder, SimulationObject},
    types::{Aabb, Axis},
    PsorSolver, SharedMemoryManager, SliceBuilder, SolverSettings,
};

/// Spheres drifting across four slices, each slice handled by its own thread
fn main() {
    // Four slices of [0, 4] along the x axis
    let builder = SliceBuilder::<f64>::uniform(4, 0.0, 4.0, Axis::X);

    // A lattice of spheres that all move to the right
    let spheres = sphere_lattice([8, 4, 4], Aabb::new([0.0; 3], [4.0, 1.0, 1.0]), 0.1)
        .into_iter()
        .map(|s| s.with_velocity([0.15, 0.0, 0.0]))
        .collect::<Vec<_>>();

    // Each partition keeps the spheres it owns and halo copies of the ones touching it
    let mut manager = SharedMemoryManager::new();
    for rank in 0..builder.tot_ranks() {
        manager.add_partition(builder.build_partition(spheres.iter().cloned(), rank));
    }

    for step in 0..10 {
        manager.step_all(1.0).unwrap();
        manager.update_all().unwrap();

        println!("Step {step}");
        for (rank, p) in manager.partitions() {
            println!(
                "  partition {rank}: {} owned, {} ghosts",
                p.owned_count(),
                p.object_count() - p.owned_count()
            );
        }
    }

    // Every partition pulls the spheres it holds towards the centre of its slice.
    // Velocities of spheres on a boundary are reconciled between both sides.
    let settings = SolverSettings {
        max_iterations: 30,
        communication_period: 5,
        ..Default::default()
    };
    let reports = manager.run(|member, partition| {
        let (lo, hi) = partition.predicate().bounds(Axis::X);
        let centre = 0.5 * (lo + hi);
        let mut d = SystemDescriptor::new();
        for (o, _) in partition.objects() {
            d.add_variable(Variable::new(o.id(), vec![0.0], vec![1.0]));
            if partition.predicate().contains(&o.position()) {
                d.add_constraint(
                    Constraint::new(ConstraintMode::Bilateral, o.position()[0] - centre)
                        .with_term(o.id(), vec![1.0]),
                );
            }
        }
        PsorSolver::new(settings.clone())
            .solve(member, partition, &mut d)
            .unwrap()
    });
    for (rank, report) in reports {
        println!(
            "Partition {rank}: violation {:e} after {} sweeps, exchanges at {:?}",
            report.max_violation, report.iterations, report.exchanges
        );
    }
}
