use ddgrid::{
    shapes::{sphere_lattice, Sphere},
    traits::PartitionBuilder,
    types::{Aabb, Axis},
    MpiManager, SliceBuilder,
};
use mpi::{collective::SystemOperation, traits::CommunicatorCollectives};

/// Spheres drifting across slices, one slice per MPI process
fn main() {
    let mut manager = MpiManager::<Sphere<f64>>::new().unwrap();
    let rank = manager.mpi_rank();
    let size = manager.mpi_tot_ranks();

    // One slice of [0, 1] along the y axis per process
    let builder = SliceBuilder::<f64>::uniform(size, 0.0, 1.0, Axis::Y);

    // Every process creates the same spheres and keeps the ones it needs
    let spheres = sphere_lattice([4, 4 * size, 4], Aabb::new([0.0; 3], [1.0; 3]), 0.05)
        .into_iter()
        .map(|s| s.with_velocity([0.0, 0.02, 0.0]));
    manager
        .set_partition(builder.build_partition(spheres, rank))
        .unwrap();

    for step in 0..20 {
        manager.step(1.0).unwrap();
        manager.update().unwrap();

        let p = manager.partition().unwrap();
        let owned = p.owned_count();
        let mut total = 0;
        manager
            .comm()
            .all_reduce_into(&owned, &mut total, SystemOperation::sum());
        if rank == 0 {
            println!("Step {step}: {total} spheres in the domain");
        }
        println!(
            "  process {rank}: {owned} owned, {} ghosts",
            p.object_count() - owned
        );
    }
}
