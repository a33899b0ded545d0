//! Interfaces between neighbouring partitions
use super::PartitionPredicate;
use crate::{
    traits::VariableId,
    types::{NodeId, ObjectId, Ownership, Rank, RealScalar},
};
use std::collections::{BTreeSet, HashMap};

/// Geometry and rank of the partition on the other side of an interface
///
/// This is only a description: the neighbour's objects are never reachable
/// through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OuterPlaceholder<T: RealScalar> {
    /// Rank of the neighbour
    pub rank: Rank,
    /// Membership predicate of the neighbour
    pub predicate: PartitionPredicate<T>,
}

/// Bookkeeping and buffers for one ordered pair of neighbouring partitions
#[derive(Debug, Clone)]
pub struct InterfaceChannel<T: RealScalar> {
    inner: Rank,
    outer: OuterPlaceholder<T>,
    shared_objects: HashMap<ObjectId, Ownership>,
    shared_nodes: HashMap<NodeId, ObjectId>,
    shared_vars: BTreeSet<VariableId>,
    pub(crate) buffer_sending: Vec<u8>,
    pub(crate) buffer_receiving: Vec<u8>,
}

impl<T: RealScalar> InterfaceChannel<T> {
    /// Create new
    pub fn new(inner: Rank, outer_rank: Rank, outer_predicate: PartitionPredicate<T>) -> Self {
        Self {
            inner,
            outer: OuterPlaceholder {
                rank: outer_rank,
                predicate: outer_predicate,
            },
            shared_objects: HashMap::new(),
            shared_nodes: HashMap::new(),
            shared_vars: BTreeSet::new(),
            buffer_sending: vec![],
            buffer_receiving: vec![],
        }
    }

    /// Rank of the partition that holds this interface
    pub fn inner_rank(&self) -> Rank {
        self.inner
    }

    /// Rank of the neighbour
    pub fn outer_rank(&self) -> Rank {
        self.outer.rank
    }

    /// The neighbour's side of the interface
    pub fn outer(&self) -> &OuterPlaceholder<T> {
        &self.outer
    }

    /// Objects with state duplicated across this interface.
    ///
    /// `Owned` entries are sent from this side, `Ghost` entries are copies
    /// received from the neighbour.
    pub fn shared_objects(&self) -> &HashMap<ObjectId, Ownership> {
        &self.shared_objects
    }

    /// Nodes of shared objects, with the object that first registered each
    pub fn shared_nodes(&self) -> &HashMap<NodeId, ObjectId> {
        &self.shared_nodes
    }

    /// Solver variables reconciled across this interface
    pub fn shared_vars(&self) -> &BTreeSet<VariableId> {
        &self.shared_vars
    }

    /// Bytes to be sent at the next exchange
    pub fn buffer_sending(&self) -> &[u8] {
        &self.buffer_sending
    }

    /// Bytes received at the last exchange
    pub fn buffer_receiving(&self) -> &[u8] {
        &self.buffer_receiving
    }

    /// Is the object currently shared across this interface?
    pub fn is_shared(&self, id: ObjectId) -> bool {
        self.shared_objects.contains_key(&id)
    }

    /// Register an object and its nodes as shared. Registering twice only
    /// refreshes the ownership.
    pub(crate) fn register_object(&mut self, id: ObjectId, ownership: Ownership, nodes: &[NodeId]) {
        self.shared_objects.insert(id, ownership);
        for n in nodes {
            self.shared_nodes.entry(*n).or_insert(id);
        }
    }

    /// Unregister an object. Returns the ownership it was registered with.
    pub(crate) fn unregister_object(&mut self, id: ObjectId) -> Option<Ownership> {
        let previous = self.shared_objects.remove(&id);
        if previous.is_some() {
            self.shared_nodes.retain(|_, o| *o != id);
        }
        previous
    }

    /// Replace the set of shared solver variables
    pub(crate) fn set_shared_vars(&mut self, vars: BTreeSet<VariableId>) {
        self.shared_vars = vars;
    }

    /// Take the outgoing bytes, leaving the buffer empty
    pub fn take_sending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer_sending)
    }

    /// Take the received bytes, leaving the buffer empty
    pub fn take_receiving(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer_receiving)
    }

    /// Store bytes received from the neighbour
    pub fn set_receiving(&mut self, bytes: Vec<u8>) {
        self.buffer_receiving = bytes;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Axis;

    fn channel() -> InterfaceChannel<f64> {
        InterfaceChannel::new(0, 1, PartitionPredicate::slice(Axis::X, 1.0, 2.0))
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut c = channel();
        c.register_object(7, Ownership::Owned, &[1, 2]);
        c.register_object(7, Ownership::Owned, &[1, 2]);
        assert_eq!(c.shared_objects().len(), 1);
        assert_eq!(c.shared_nodes().len(), 2);
    }

    #[test]
    fn test_shared_nodes_keep_first_object() {
        let mut c = channel();
        c.register_object(7, Ownership::Owned, &[1, 2]);
        c.register_object(8, Ownership::Ghost(1), &[2, 3]);
        assert_eq!(c.shared_nodes()[&2], 7);

        assert_eq!(c.unregister_object(7), Some(Ownership::Owned));
        assert!(!c.shared_nodes().contains_key(&1));
        assert!(!c.shared_nodes().contains_key(&2));
        assert_eq!(c.shared_nodes()[&3], 8);
        assert_eq!(c.unregister_object(7), None);
    }

    #[test]
    fn test_take_buffers() {
        let mut c = channel();
        c.buffer_sending = vec![1, 2, 3];
        assert_eq!(c.take_sending(), vec![1, 2, 3]);
        assert!(c.buffer_sending().is_empty());
        c.set_receiving(vec![4]);
        assert_eq!(c.buffer_receiving(), &[4]);
        assert_eq!(c.take_receiving(), vec![4]);
    }
}
