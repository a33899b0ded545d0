//! Message-passing manager: one partition per MPI process
use crate::{
    partition::Partition,
    traits::{PartitionManager, SimulationObject},
    types::{DomainError, DomainResult, Rank},
};
use itertools::Itertools;
use log::debug;
use std::cell::Cell;
use mpi::{
    collective::SystemOperation,
    environment::Universe,
    point_to_point::{Destination, Source},
    request::{scope, WaitGuard},
    topology::SimpleCommunicator,
    traits::{Communicator, CommunicatorCollectives},
    Tag,
};

// Tag used for every interface buffer
const EXCHANGE_TAG: Tag = 7;

/// Manager for a partition driven by this MPI process
///
/// The MPI environment is initialised when the manager is created and
/// finalised when it is dropped, so there can only be one manager per process.
pub struct MpiManager<O: SimulationObject> {
    // Must be dropped before `universe`
    world: SimpleCommunicator,
    universe: Universe,
    partition: Option<Partition<O>>,
    // Rank that failed since the last exchange, on this process
    failure: Cell<Option<Rank>>,
    /// Log a summary of the partition after each update
    pub verbose_partition: bool,
}

impl<O: SimulationObject> MpiManager<O> {
    /// Initialise MPI and create the manager
    pub fn new() -> DomainResult<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| DomainError::Mpi("MPI has already been initialised".into()))?;
        let world = universe.world();
        Ok(Self {
            world,
            universe,
            partition: None,
            failure: Cell::new(None),
            verbose_partition: false,
        })
    }

    /// The MPI environment
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The world communicator
    pub fn comm(&self) -> &SimpleCommunicator {
        &self.world
    }

    /// Rank of this process
    pub fn mpi_rank(&self) -> Rank {
        self.world.rank() as Rank
    }

    /// Number of processes
    pub fn mpi_tot_ranks(&self) -> usize {
        self.world.size() as usize
    }

    /// Set the partition driven by this process. Its rank must be the MPI rank
    /// and every neighbour must be an existing process.
    pub fn set_partition(&mut self, partition: Partition<O>) -> DomainResult<()> {
        if let Some(n) = partition
            .interfaces()
            .keys()
            .find(|n| **n >= self.mpi_tot_ranks())
        {
            return Err(DomainError::UnknownRank { rank: *n });
        }
        if partition.rank() != self.mpi_rank() {
            return Err(DomainError::Mpi(format!(
                "partition {} given to process {}",
                partition.rank(),
                self.mpi_rank()
            )));
        }
        self.partition = Some(partition);
        Ok(())
    }

    /// The partition driven by this process
    pub fn partition(&self) -> Option<&Partition<O>> {
        self.partition.as_ref()
    }

    /// Mutable access to the partition driven by this process
    pub fn partition_mut(&mut self) -> Option<&mut Partition<O>> {
        self.partition.as_mut()
    }

    /// Migrate objects between this partition and its neighbours
    pub fn update(&mut self) -> DomainResult<()> {
        let rank = self.mpi_rank();
        let mut partition = self
            .partition
            .take()
            .ok_or(DomainError::UnknownRank { rank })?;
        let result = self.partition_update(&mut partition);
        if self.verbose_partition {
            debug!(
                "[{rank}] {} objects, {} owned",
                partition.object_count(),
                partition.owned_count()
            );
        }
        self.partition = Some(partition);
        result
    }

    /// Advance the partition by a time step
    pub fn step(&mut self, dt: O::T) -> DomainResult<()> {
        let rank = self.mpi_rank();
        self.partition
            .as_mut()
            .ok_or(DomainError::UnknownRank { rank })?
            .step(dt);
        Ok(())
    }
}

impl<P: SimulationObject> PartitionManager for MpiManager<P> {
    fn exchange<O: SimulationObject>(&self, partition: &mut Partition<O>) -> DomainResult<()> {
        let size = self.mpi_tot_ranks();
        // Neighbours without a process are skipped, and the failure is shared
        // with every rank below
        let unknown = partition.interfaces().keys().copied().find(|n| *n >= size);
        if unknown.is_some() {
            self.notify_failure(partition.rank());
        }
        let outgoing = partition
            .interfaces_mut()
            .filter(|(n, _)| **n < size)
            .map(|(n, interface)| (*n, interface.take_sending()))
            .collect_vec();

        let received = scope(|scope| {
            let _guards = outgoing
                .iter()
                .map(|(n, bytes)| {
                    WaitGuard::from(self.world.process_at_rank(*n as i32).immediate_send_with_tag(
                        scope,
                        &bytes[..],
                        EXCHANGE_TAG,
                    ))
                })
                .collect_vec();
            outgoing
                .iter()
                .map(|(n, _)| {
                    let (bytes, _status) = self
                        .world
                        .process_at_rank(*n as i32)
                        .receive_vec_with_tag::<u8>(EXCHANGE_TAG);
                    (*n, bytes)
                })
                .collect_vec()
        });

        for ((n, interface), (m, bytes)) in partition
            .interfaces_mut()
            .filter(|(n, _)| **n < size)
            .zip(received)
        {
            debug_assert_eq!(*n, m);
            interface.set_receiving(bytes);
        }

        // Every rank learns whether any rank failed since the last exchange
        let local = self.failure.take().map_or(-1, |r| r as i64);
        let mut global = -1_i64;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::max());
        if let Some(rank) = unknown {
            return Err(DomainError::UnknownRank { rank });
        }
        if global >= 0 {
            return Err(DomainError::PeerFailed {
                rank: global as Rank,
            });
        }
        Ok(())
    }

    fn reduce_max(&self, local: f64) -> DomainResult<f64> {
        let mut global = f64::NEG_INFINITY;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::max());
        Ok(global)
    }

    fn notify_failure(&self, rank: Rank) {
        if self.failure.get().is_none() {
            self.failure.set(Some(rank));
        }
    }
}
