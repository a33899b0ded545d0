//! Thread-team manager: every partition lives in this process
use crate::{
    partition::Partition,
    traits::{PartitionManager, SimulationObject},
    types::{DomainError, DomainResult, Rank},
};
use log::debug;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Barrier, Mutex},
    thread,
};

// State shared by the threads of one team
struct Team {
    barrier: Barrier,
    // Buffers in flight, keyed by (sender, receiver)
    mailboxes: HashMap<(Rank, Rank), Mutex<Vec<u8>>>,
    reduction: Mutex<f64>,
    failure: Mutex<Option<Rank>>,
}

impl Team {
    fn new<O: SimulationObject>(partitions: &BTreeMap<Rank, Partition<O>>) -> Self {
        let mailboxes = partitions
            .iter()
            .flat_map(|(r, p)| p.interfaces().keys().map(move |n| ((*r, *n), Mutex::new(vec![]))))
            .collect();
        Self {
            barrier: Barrier::new(partitions.len()),
            mailboxes,
            reduction: Mutex::new(f64::NEG_INFINITY),
            failure: Mutex::new(None),
        }
    }

    fn fail(&self, rank: Rank) {
        if let Ok(mut f) = self.failure.lock() {
            f.get_or_insert(rank);
        }
    }

    fn failed(&self) -> Option<Rank> {
        match self.failure.lock() {
            Ok(f) => *f,
            Err(e) => *e.into_inner(),
        }
    }
}

/// Handle given to the thread that drives one partition
///
/// Exchanges wait on two barriers across the whole team: the first once every
/// thread has posted its outgoing buffers, the second once every thread has
/// collected its incoming ones. A thread must only touch its own partition.
pub struct TeamMember<'a> {
    team: &'a Team,
    rank: Rank,
}

impl TeamMember<'_> {
    /// Rank of the partition driven by this thread
    pub fn rank(&self) -> Rank {
        self.rank
    }

    fn mailbox(&self, from: Rank, to: Rank) -> DomainResult<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.team
            .mailboxes
            .get(&(from, to))
            .ok_or(DomainError::UnknownRank { rank: to })?
            .lock()
            .map_err(|_| DomainError::PoisonedMailbox { from, to })
    }

    fn post<O: SimulationObject>(&self, partition: &mut Partition<O>) -> DomainResult<()> {
        for (n, interface) in partition.interfaces_mut() {
            *self.mailbox(self.rank, *n)? = interface.take_sending();
        }
        Ok(())
    }

    fn collect<O: SimulationObject>(&self, partition: &mut Partition<O>) -> DomainResult<()> {
        for (n, interface) in partition.interfaces_mut() {
            let bytes = std::mem::take(&mut *self.mailbox(*n, self.rank)?);
            interface.set_receiving(bytes);
        }
        Ok(())
    }
}

impl PartitionManager for TeamMember<'_> {
    fn exchange<O: SimulationObject>(&self, partition: &mut Partition<O>) -> DomainResult<()> {
        let posted = self.post(partition);
        if posted.is_err() {
            self.team.fail(self.rank);
        }
        self.team.barrier.wait();

        let collected = if posted.is_ok() {
            self.collect(partition)
        } else {
            Ok(())
        };
        if collected.is_err() {
            self.team.fail(self.rank);
        }
        self.team.barrier.wait();

        posted?;
        collected?;
        match self.team.failed() {
            Some(rank) => Err(DomainError::PeerFailed { rank }),
            None => Ok(()),
        }
    }

    fn reduce_max(&self, local: f64) -> DomainResult<f64> {
        let poisoned = |_| DomainError::PoisonedMailbox {
            from: self.rank,
            to: self.rank,
        };
        {
            let mut r = self.team.reduction.lock().map_err(poisoned)?;
            *r = r.max(local);
        }
        self.team.barrier.wait();
        let result = *self.team.reduction.lock().map_err(poisoned)?;
        if self.team.barrier.wait().is_leader() {
            *self.team.reduction.lock().map_err(poisoned)? = f64::NEG_INFINITY;
        }
        // Nobody may start the next reduction before the reset
        self.team.barrier.wait();
        Ok(result)
    }

    fn notify_failure(&self, rank: Rank) {
        self.team.fail(rank);
    }
}

/// Manager for partitions that all live in one address space, one thread each
#[derive(Debug)]
pub struct SharedMemoryManager<O: SimulationObject> {
    partitions: BTreeMap<Rank, Partition<O>>,
    /// Log a summary of every partition after each update
    pub verbose_partition: bool,
}

impl<O: SimulationObject> Default for SharedMemoryManager<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: SimulationObject> SharedMemoryManager<O> {
    /// Create new
    pub fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
            verbose_partition: false,
        }
    }

    /// Add a partition. Panics if its rank is already taken.
    pub fn add_partition(&mut self, partition: Partition<O>) {
        let rank = partition.rank();
        if self.partitions.insert(rank, partition).is_some() {
            panic!("Rank {rank} has already been added");
        }
    }

    /// A partition
    pub fn partition(&self, rank: Rank) -> Option<&Partition<O>> {
        self.partitions.get(&rank)
    }

    /// Mutable access to a partition
    pub fn partition_mut(&mut self, rank: Rank) -> Option<&mut Partition<O>> {
        self.partitions.get_mut(&rank)
    }

    /// All partitions, keyed by rank
    pub fn partitions(&self) -> &BTreeMap<Rank, Partition<O>> {
        &self.partitions
    }

    /// Number of partitions
    pub fn tot_ranks(&self) -> usize {
        self.partitions.len()
    }

    /// Run `f` on every partition, each on its own thread
    ///
    /// `f` must call the collective operations of the [TeamMember] the same
    /// number of times on every thread.
    pub fn run<R, F>(&mut self, f: F) -> BTreeMap<Rank, R>
    where
        O: Send,
        R: Send,
        F: Fn(&TeamMember<'_>, &mut Partition<O>) -> R + Sync,
    {
        let team = Team::new(&self.partitions);
        thread::scope(|s| {
            let handles = self
                .partitions
                .iter_mut()
                .map(|(rank, partition)| {
                    let (team, f) = (&team, &f);
                    let rank = *rank;
                    s.spawn(move || (rank, f(&TeamMember { team, rank }, partition)))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    /// Migrate objects between all partitions
    pub fn update_all(&mut self) -> DomainResult<()> {
        let results = self.run(|member, partition| member.partition_update(partition));
        if self.verbose_partition {
            self.log_summary();
        }
        first_error(results)
    }

    /// Advance every partition by a time step
    pub fn step_all(&mut self, dt: O::T) -> DomainResult<()> {
        let results = self.run(|_, partition| {
            partition.step(dt);
            Ok(())
        });
        first_error(results)
    }

    fn log_summary(&self) {
        for (rank, p) in &self.partitions {
            let shared = p
                .interfaces()
                .values()
                .map(|i| i.shared_objects().len())
                .sum::<usize>();
            debug!(
                "[{rank}] {} objects, {} owned, {shared} shared",
                p.object_count(),
                p.owned_count()
            );
        }
    }
}

// The error of the lowest failing rank. Errors caused by a failing peer are
// reported only if nothing else failed.
fn first_error(results: BTreeMap<Rank, DomainResult<()>>) -> DomainResult<()> {
    let mut peer_failure = None;
    for (_, r) in results {
        match r {
            Err(DomainError::PeerFailed { rank }) => {
                peer_failure.get_or_insert(DomainError::PeerFailed { rank });
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }
    }
    peer_failure.map_or(Ok(()), Err)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        partition::SliceBuilder,
        shapes::Sphere,
        traits::PartitionBuilder,
        types::Axis,
    };

    fn manager(n: usize) -> SharedMemoryManager<Sphere<f64>> {
        let builder = SliceBuilder::uniform(n, 0.0, n as f64, Axis::X);
        let mut m = SharedMemoryManager::new();
        for rank in 0..n {
            m.add_partition(builder.build_partition(Vec::<Sphere<f64>>::new(), rank));
        }
        m
    }

    #[test]
    fn test_exchange_moves_bytes() {
        let mut m = manager(3);
        let received = m.run(|member, partition| {
            let rank = partition.rank();
            for (n, interface) in partition.interfaces_mut() {
                interface.buffer_sending = vec![rank as u8, *n as u8];
            }
            member.exchange(partition).unwrap();
            partition
                .interfaces()
                .iter()
                .map(|(n, i)| (*n, i.buffer_receiving().to_vec()))
                .collect::<Vec<_>>()
        });
        assert_eq!(received[&0], vec![(1, vec![1, 0])]);
        assert_eq!(received[&1], vec![(0, vec![0, 1]), (2, vec![2, 1])]);
        assert_eq!(received[&2], vec![(1, vec![1, 2])]);
    }

    #[test]
    fn test_reduce_max() {
        let mut m = manager(4);
        let results = m.run(|member, partition| {
            let a = member.reduce_max(partition.rank() as f64).unwrap();
            let b = member.reduce_max(-(partition.rank() as f64)).unwrap();
            (a, b)
        });
        for (a, b) in results.values() {
            assert_eq!(*a, 3.0);
            assert_eq!(*b, 0.0);
        }
    }

    #[test]
    fn test_failure_reaches_every_member() {
        let mut m = manager(3);
        let results = m.run(|member, partition| {
            if partition.rank() == 1 {
                member.notify_failure(1);
            }
            member.exchange(partition)
        });
        for r in results.values() {
            assert!(matches!(r, Err(DomainError::PeerFailed { rank: 1 })));
        }
    }

    #[test]
    #[should_panic]
    fn test_duplicate_rank() {
        let mut m = manager(2);
        m.add_partition(Partition::new(
            1,
            crate::partition::PartitionPredicate::slice(Axis::X, 0.0, 1.0),
        ));
    }
}
