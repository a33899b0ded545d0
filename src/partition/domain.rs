//! Partitions
use super::{
    message::{decode, encode, ObjectMessage},
    InterfaceChannel, PartitionPredicate,
};
use crate::{
    traits::SimulationObject,
    types::{DomainResult, ObjectId, Ownership, Rank},
};
use itertools::Itertools;
use log::{debug, warn};
use std::collections::{btree_map, BTreeMap};

/// One spatial region of the simulation and the objects held in it
///
/// A partition owns its objects exclusively. Objects owned by a neighbour but
/// overlapping this region are held as ghosts, refreshed at each update.
#[derive(Debug)]
pub struct Partition<O: SimulationObject> {
    rank: Rank,
    predicate: PartitionPredicate<O::T>,
    objects: BTreeMap<ObjectId, (O, Ownership)>,
    interfaces: BTreeMap<Rank, InterfaceChannel<O::T>>,
}

// What happens to an owned object at the end of PrepareOutgoing
enum Departure {
    Ghost(Rank),
    Drop,
}

impl<O: SimulationObject> Partition<O> {
    /// Create new
    pub fn new(rank: Rank, predicate: PartitionPredicate<O::T>) -> Self {
        Self {
            rank,
            predicate,
            objects: BTreeMap::new(),
            interfaces: BTreeMap::new(),
        }
    }

    /// Rank of this partition
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Membership predicate of this partition
    pub fn predicate(&self) -> &PartitionPredicate<O::T> {
        &self.predicate
    }

    /// Add an interface to a neighbour
    pub fn add_interface(&mut self, neighbour: Rank, predicate: PartitionPredicate<O::T>) {
        self.interfaces
            .insert(neighbour, InterfaceChannel::new(self.rank, neighbour, predicate));
    }

    /// Interfaces, keyed by the rank of the neighbour
    pub fn interfaces(&self) -> &BTreeMap<Rank, InterfaceChannel<O::T>> {
        &self.interfaces
    }

    /// Interface to a neighbour
    pub fn interface(&self, neighbour: Rank) -> Option<&InterfaceChannel<O::T>> {
        self.interfaces.get(&neighbour)
    }

    /// Mutable access to the interfaces, for exchange primitives and solvers
    pub fn interfaces_mut(&mut self) -> btree_map::IterMut<'_, Rank, InterfaceChannel<O::T>> {
        self.interfaces.iter_mut()
    }

    /// Add an object owned by this partition
    pub fn insert(&mut self, object: O) {
        self.insert_with_ownership(object, Ownership::Owned);
    }

    /// Add an object. Ghosts are registered with the interface to their owner.
    pub fn insert_with_ownership(&mut self, object: O, ownership: Ownership) {
        let id = object.id();
        if let Ownership::Ghost(owner) = ownership {
            if let Some(interface) = self.interfaces.get_mut(&owner) {
                interface.register_object(id, ownership, &object.node_ids());
            }
        }
        self.objects.insert(id, (object, ownership));
    }

    /// Remove an object, e.g. because the physics layer destroyed it
    pub fn remove(&mut self, id: ObjectId) -> Option<O> {
        self.objects.remove(&id).map(|(o, _)| o)
    }

    /// An object held by this partition
    pub fn object(&self, id: ObjectId) -> Option<&O> {
        self.objects.get(&id).map(|(o, _)| o)
    }

    /// Mutable access to an object held by this partition
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut O> {
        self.objects.get_mut(&id).map(|(o, _)| o)
    }

    /// Ownership of an object held by this partition
    pub fn ownership(&self, id: ObjectId) -> Option<Ownership> {
        self.objects.get(&id).map(|(_, o)| *o)
    }

    /// Iterate over all objects held here, owned and ghosts
    pub fn objects(&self) -> impl Iterator<Item = (&O, Ownership)> {
        self.objects.values().map(|(o, ownership)| (o, *ownership))
    }

    /// Iterate over the objects owned by this partition
    pub fn owned_objects(&self) -> impl Iterator<Item = &O> {
        self.objects
            .values()
            .filter(|(_, ownership)| ownership.is_owned())
            .map(|(o, _)| o)
    }

    /// Number of objects held here, owned and ghosts
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of objects owned by this partition
    pub fn owned_count(&self) -> usize {
        self.owned_objects().count()
    }

    /// Advance every object held here by a time step
    pub fn step(&mut self, dt: O::T) {
        for (o, _) in self.objects.values_mut() {
            o.step(dt);
        }
    }

    /// Serialize objects that neighbours need into the outgoing buffers
    ///
    /// Every owned object that touches a neighbour is sent to it. Objects that
    /// stopped touching a neighbour, or that vanished, are withdrawn from it.
    /// An owned object whose position left this region is handed to its new
    /// owner, and is then kept as a ghost if it still overlaps this region or
    /// dropped otherwise.
    pub fn prepare_outgoing(&mut self) -> DomainResult<()> {
        let mut outboxes: BTreeMap<Rank, Vec<ObjectMessage>> =
            self.interfaces.keys().map(|r| (*r, vec![])).collect();
        let mut departures = vec![];

        for (id, (object, ownership)) in &self.objects {
            if !ownership.is_owned() {
                continue;
            }
            let bbox = object.bounding_box();
            let position = object.position();
            let stays = self.predicate.contains(&position);
            let new_owner = if stays {
                None
            } else {
                self.interfaces
                    .values()
                    .find(|i| i.outer().predicate.contains(&position))
                    .map(|i| i.outer_rank())
            };

            let mut state = None;
            for (n, interface) in self.interfaces.iter_mut() {
                let send = if stays {
                    let outer = &interface.outer().predicate;
                    outer.overlaps(&bbox) || outer.contains(&position)
                } else {
                    new_owner == Some(*n)
                };
                if send {
                    if state.is_none() {
                        state = Some(object.serialize_state()?);
                    }
                    if let (Some(s), Some(outbox)) = (&state, outboxes.get_mut(n)) {
                        outbox.push(ObjectMessage::Update {
                            id: *id,
                            state: s.clone(),
                        });
                    }
                    if stays {
                        interface.register_object(*id, Ownership::Owned, &object.node_ids());
                    } else {
                        interface.unregister_object(*id);
                    }
                } else if interface.unregister_object(*id).is_some() {
                    if let Some(outbox) = outboxes.get_mut(n) {
                        outbox.push(ObjectMessage::Remove { id: *id });
                    }
                }
            }

            if !stays {
                let departure = match new_owner {
                    Some(owner) if self.predicate.overlaps(&bbox) => Departure::Ghost(owner),
                    _ => Departure::Drop,
                };
                departures.push((*id, departure));
            }
        }

        // Objects that disappeared since the last update
        for (n, interface) in self.interfaces.iter_mut() {
            let vanished = interface
                .shared_objects()
                .iter()
                .filter(|(id, ownership)| ownership.is_owned() && !self.objects.contains_key(id))
                .map(|(id, _)| *id)
                .collect_vec();
            for id in vanished {
                interface.unregister_object(id);
                if let Some(outbox) = outboxes.get_mut(n) {
                    outbox.push(ObjectMessage::Remove { id });
                }
            }
        }

        for (id, departure) in departures {
            match departure {
                Departure::Ghost(owner) => {
                    debug!("[{}] object {id} now owned by {owner}, kept as ghost", self.rank);
                    if let Some((object, ownership)) = self.objects.get_mut(&id) {
                        *ownership = Ownership::Ghost(owner);
                        if let Some(interface) = self.interfaces.get_mut(&owner) {
                            interface.register_object(id, *ownership, &object.node_ids());
                        }
                    }
                }
                Departure::Drop => {
                    debug!("[{}] object {id} left this partition", self.rank);
                    self.objects.remove(&id);
                }
            }
        }

        for (n, interface) in self.interfaces.iter_mut() {
            let outbox = outboxes.remove(n).unwrap_or_default();
            debug!(
                "[{}] sending {} messages to {}",
                self.rank,
                outbox.len(),
                n
            );
            interface.buffer_sending = encode(&outbox)?;
        }
        Ok(())
    }

    /// Deserialize the objects received from neighbours
    ///
    /// Must only be called once the exchange has completed for every partition.
    pub fn apply_incoming(&mut self) -> DomainResult<()> {
        for (n, interface) in self.interfaces.iter_mut() {
            let messages: Vec<ObjectMessage> = decode(&interface.take_receiving())?;
            for message in messages {
                match message {
                    ObjectMessage::Update { id, state } => {
                        let object = O::deserialize_state(&state)?;
                        if object.id() != id {
                            warn!(
                                "[{}] discarding state of object {} received as {id} from {n}",
                                self.rank,
                                object.id()
                            );
                            continue;
                        }
                        // The sender may keep a ghost, withdrawn by the next prepare_outgoing
                        // if it stops overlapping
                        let ownership = if self.predicate.contains(&object.position()) {
                            interface.register_object(id, Ownership::Owned, &object.node_ids());
                            Ownership::Owned
                        } else {
                            interface.register_object(id, Ownership::Ghost(*n), &object.node_ids());
                            Ownership::Ghost(*n)
                        };
                        self.objects.insert(id, (object, ownership));
                    }
                    ObjectMessage::Remove { id } => {
                        interface.unregister_object(id);
                        if self.objects.get(&id).map(|(_, o)| *o) == Some(Ownership::Ghost(*n)) {
                            self.objects.remove(&id);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Empty every outgoing buffer
    pub fn discard_outgoing(&mut self) {
        for interface in self.interfaces.values_mut() {
            interface.buffer_sending.clear();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{shapes::Sphere, types::Axis};

    fn two_slices() -> Vec<Partition<Sphere<f64>>> {
        let left = PartitionPredicate::slice(Axis::X, 0.0, 1.0);
        let right = PartitionPredicate::slice(Axis::X, 1.0, 2.0).close_upper(Axis::X);
        let mut p0 = Partition::new(0, left);
        p0.add_interface(1, right);
        let mut p1 = Partition::new(1, right);
        p1.add_interface(0, left);
        vec![p0, p1]
    }

    // Move every outgoing buffer to the matching incoming buffer
    fn exchange(partitions: &mut [Partition<Sphere<f64>>]) {
        let mut sent = vec![];
        for p in partitions.iter_mut() {
            let rank = p.rank();
            for (n, interface) in p.interfaces_mut() {
                sent.push((rank, *n, interface.take_sending()));
            }
        }
        for (from, to, bytes) in sent {
            if let Some((_, interface)) = partitions[to].interfaces_mut().find(|(n, _)| **n == from) {
                interface.set_receiving(bytes);
            }
        }
    }

    fn update(partitions: &mut [Partition<Sphere<f64>>]) {
        for p in partitions.iter_mut() {
            p.prepare_outgoing().unwrap();
        }
        exchange(partitions);
        for p in partitions.iter_mut() {
            p.apply_incoming().unwrap();
        }
    }

    fn step(partitions: &mut [Partition<Sphere<f64>>], dt: f64) {
        for p in partitions.iter_mut() {
            p.step(dt);
        }
    }

    #[test]
    fn test_halo() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.95, 0.5, 0.5], 0.1));
        p[0].insert(Sphere::new(1, [0.5, 0.5, 0.5], 0.1));
        update(&mut p);

        assert_eq!(p[0].ownership(0), Some(Ownership::Owned));
        assert_eq!(p[1].ownership(0), Some(Ownership::Ghost(0)));
        assert_eq!(p[1].ownership(1), None);
        assert_eq!(p[0].interface(1).unwrap().shared_objects().get(&0), Some(&Ownership::Owned));
        assert_eq!(
            p[1].interface(0).unwrap().shared_objects().get(&0),
            Some(&Ownership::Ghost(0))
        );
        assert!(!p[0].interface(1).unwrap().is_shared(1));

        // A second update changes nothing
        update(&mut p);
        assert_eq!(p[0].object_count(), 2);
        assert_eq!(p[1].object_count(), 1);
        assert_eq!(p[1].owned_count(), 0);
    }

    #[test]
    fn test_migration() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.5, 0.5, 0.5], 0.1).with_velocity([1.0, 0.0, 0.0]));
        update(&mut p);
        assert_eq!(p[1].object_count(), 0);

        step(&mut p, 0.5);
        update(&mut p);
        assert_eq!(p[0].ownership(0), Some(Ownership::Ghost(1)));
        assert_eq!(p[1].ownership(0), Some(Ownership::Owned));
        assert_eq!(p[1].object(0).unwrap().centre, [1.0, 0.5, 0.5]);

        update(&mut p);
        assert_eq!(p[0].ownership(0), Some(Ownership::Ghost(1)));
        assert_eq!(p[1].ownership(0), Some(Ownership::Owned));
        assert_eq!(p[0].owned_count() + p[1].owned_count(), 1);

        // Far from the boundary the ghost is withdrawn
        step(&mut p, 0.5);
        update(&mut p);
        assert_eq!(p[0].object_count(), 0);
        assert!(p[0].interface(1).unwrap().shared_objects().is_empty());
        assert!(p[1].interface(0).unwrap().shared_objects().is_empty());
        assert_eq!(p[1].object(0).unwrap().centre, [1.5, 0.5, 0.5]);
    }

    #[test]
    fn test_leaving_old_owner_right_after_migration() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.95, 0.5, 0.5], 0.1).with_velocity([1.0, 0.0, 0.0]));
        step(&mut p, 0.1);
        update(&mut p);
        assert_eq!(p[0].ownership(0), Some(Ownership::Ghost(1)));
        assert_eq!(p[1].ownership(0), Some(Ownership::Owned));
        assert_eq!(
            p[1].interface(0).unwrap().shared_objects().get(&0),
            Some(&Ownership::Owned)
        );

        // Out of reach of the old owner before the new one ever sent an update
        step(&mut p, 0.5);
        update(&mut p);
        update(&mut p);
        assert_eq!(p[0].object_count(), 0);
        assert!(p[0].interface(1).unwrap().shared_objects().is_empty());
        assert!(p[1].interface(0).unwrap().shared_objects().is_empty());
        assert_eq!(p[1].owned_count(), 1);
    }

    #[test]
    fn test_jump_across_region() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.2, 0.5, 0.5], 0.1).with_velocity([1.0, 0.0, 0.0]));
        step(&mut p, 1.0);
        update(&mut p);
        assert_eq!(p[0].object_count(), 0);
        assert_eq!(p[1].ownership(0), Some(Ownership::Owned));
    }

    #[test]
    fn test_vanished() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.95, 0.5, 0.5], 0.1));
        update(&mut p);
        assert_eq!(p[1].object_count(), 1);

        assert!(p[0].remove(0).is_some());
        update(&mut p);
        assert_eq!(p[1].object_count(), 0);
        assert!(p[0].interface(1).unwrap().shared_objects().is_empty());
    }

    #[test]
    fn test_leaving_domain() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.5, 0.5, 0.5], 0.1).with_velocity([-1.0, 0.0, 0.0]));
        step(&mut p, 1.0);
        update(&mut p);
        assert_eq!(p[0].object_count(), 0);
        assert_eq!(p[1].object_count(), 0);
    }

    #[test]
    fn test_shared_nodes() {
        let mut p = two_slices();
        let mut s = Sphere::new(0, [0.95, 0.5, 0.5], 0.1);
        s.nodes = vec![10, 11];
        p[0].insert(s);
        update(&mut p);
        let nodes = p[1].interface(0).unwrap().shared_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.get(&10), Some(&0));
        assert_eq!(p[0].interface(1).unwrap().shared_nodes().get(&11), Some(&0));
    }

    #[test]
    fn test_discard_outgoing() {
        let mut p = two_slices();
        p[0].insert(Sphere::new(0, [0.95, 0.5, 0.5], 0.1));
        p[0].prepare_outgoing().unwrap();
        assert!(!p[0].interface(1).unwrap().buffer_sending().is_empty());
        p[0].discard_outgoing();
        assert!(p[0].interface(1).unwrap().buffer_sending().is_empty());
    }
}
