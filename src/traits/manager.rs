//! Partition managers
use crate::{
    partition::Partition,
    traits::SimulationObject,
    types::{DomainResult, Rank},
};

pub trait PartitionManager {
    //! Synchronisation substrate shared by all partitions of a run
    //!
    //! Every method is collective: it must be called by all partitions of the
    //! run, in the same order, for any of them to complete.

    /// Move the outgoing buffer of every interface of `partition` into the
    /// incoming buffer of the matching interface of the neighbour, and receive
    /// the neighbours' buffers in return
    fn exchange<O: SimulationObject>(&self, partition: &mut Partition<O>) -> DomainResult<()>;

    /// The maximum of `local` over all partitions
    fn reduce_max(&self, local: f64) -> DomainResult<f64>;

    /// Record that `rank` failed before reaching an exchange
    fn notify_failure(&self, _rank: Rank) {}

    /// Migrate objects between `partition` and its neighbours
    fn partition_update<O: SimulationObject>(
        &self,
        partition: &mut Partition<O>,
    ) -> DomainResult<()> {
        if let Err(e) = partition.prepare_outgoing() {
            // Peers still expect our buffers, so send nothing and let them finish.
            partition.discard_outgoing();
            self.notify_failure(partition.rank());
            let _ = self.exchange(partition);
            return Err(e);
        }
        self.exchange(partition)?;
        partition.apply_incoming()
    }
}
