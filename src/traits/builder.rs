//! Partition builder
use crate::{
    partition::{Partition, PartitionPredicate},
    traits::SimulationObject,
    types::{Ownership, Rank, RealScalar},
};

pub trait PartitionBuilder {
    //! Object that decomposes space into partitions

    /// The floating point type used for coordinates
    type T: RealScalar;

    /// Number of partitions
    fn tot_ranks(&self) -> usize;

    /// Membership predicate of a partition
    fn predicate(&self, rank: Rank) -> PartitionPredicate<Self::T>;

    /// Ranks of the partitions that share a face, edge or corner with a partition
    fn neighbours(&self, rank: Rank) -> Vec<Rank>;

    /// The rank that owns a point, if any
    fn owner_of(&self, point: &[Self::T; 3]) -> Option<Rank> {
        (0..self.tot_ranks()).find(|r| self.predicate(*r).contains(point))
    }

    /// Create the partition of a rank from the objects of the simulation
    ///
    /// Objects whose position is in the partition are owned by it. Objects that
    /// only overlap it are kept as halo copies of their owner. Everything else
    /// is dropped.
    fn build_partition<O: SimulationObject<T = Self::T>>(
        &self,
        objects: impl IntoIterator<Item = O>,
        rank: Rank,
    ) -> Partition<O> {
        assert!(
            rank < self.tot_ranks(),
            "Rank {rank} out of range for {} partitions",
            self.tot_ranks()
        );
        let mut partition = Partition::new(rank, self.predicate(rank));
        for n in self.neighbours(rank) {
            partition.add_interface(n, self.predicate(n));
        }
        for object in objects {
            let position = object.position();
            if partition.predicate().contains(&position) {
                partition.insert_with_ownership(object, Ownership::Owned);
            } else if partition.predicate().overlaps(&object.bounding_box()) {
                if let Some(owner) = self.owner_of(&position) {
                    partition.insert_with_ownership(object, Ownership::Ghost(owner));
                }
            }
        }
        partition
    }
}
