//! Simulation objects
use crate::types::{Aabb, DomainResult, NodeId, ObjectId, RealScalar};

/// An object of the physics layer that can migrate between partitions
///
/// The physics layer owns the dynamics of the object. Partitions only need a
/// geometric footprint, a stable identity and a way to move the full state of
/// the object through a byte buffer.
pub trait SimulationObject: Sized + Send {
    /// Scalar type
    type T: RealScalar;

    /// Stable identifier of the object
    fn id(&self) -> ObjectId;

    /// Axis-aligned bounding box of the object
    fn bounding_box(&self) -> Aabb<Self::T>;

    /// Reference point used to decide which partition owns the object
    fn position(&self) -> [Self::T; 3] {
        self.bounding_box().centre()
    }

    /// Nodes that this object shares with other objects
    fn node_ids(&self) -> Vec<NodeId> {
        vec![]
    }

    /// Serialize the full state of the object
    fn serialize_state(&self) -> DomainResult<Vec<u8>>;

    /// Reconstruct an object from bytes written by [SimulationObject::serialize_state]
    fn deserialize_state(bytes: &[u8]) -> DomainResult<Self>;

    /// Advance the object by a time step
    fn step(&mut self, dt: Self::T);
}
