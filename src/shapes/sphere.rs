//! Rigid spheres moving with constant velocity

use crate::{
    traits::SimulationObject,
    types::{Aabb, DomainResult, NodeId, ObjectId, RealScalar},
};
use serde::{Deserialize, Serialize};

/// A sphere moving with constant velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub struct Sphere<T: RealScalar> {
    /// Identifier
    pub id: ObjectId,
    /// Centre
    pub centre: [T; 3],
    /// Velocity
    pub velocity: [T; 3],
    /// Radius
    pub radius: T,
    /// Nodes shared with other objects
    pub nodes: Vec<NodeId>,
}

impl<T: RealScalar> Sphere<T> {
    /// Create new
    pub fn new(id: ObjectId, centre: [T; 3], radius: T) -> Self {
        Self {
            id,
            centre,
            velocity: [T::zero(); 3],
            radius,
            nodes: vec![],
        }
    }

    /// Set the velocity
    pub fn with_velocity(mut self, velocity: [T; 3]) -> Self {
        self.velocity = velocity;
        self
    }
}

impl<T: RealScalar> SimulationObject for Sphere<T> {
    type T = T;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounding_box(&self) -> Aabb<T> {
        Aabb::from_centre(self.centre, [self.radius; 3])
    }

    fn position(&self) -> [T; 3] {
        self.centre
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }

    fn serialize_state(&self) -> DomainResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn deserialize_state(bytes: &[u8]) -> DomainResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn step(&mut self, dt: T) {
        for (c, v) in self.centre.iter_mut().zip(self.velocity) {
            *c = *c + v * dt;
        }
    }
}

/// Create a lattice of `counts[0] * counts[1] * counts[2]` spheres filling `domain`
///
/// Sphere centres are in the middle of equally sized cells, and ids are
/// numbered from zero with x running fastest.
pub fn sphere_lattice<T: RealScalar>(counts: [usize; 3], domain: Aabb<T>, radius: T) -> Vec<Sphere<T>> {
    let half = T::from(0.5).unwrap();
    let mut spheres = Vec::with_capacity(counts.iter().product());
    for k in 0..counts[2] {
        for j in 0..counts[1] {
            for i in 0..counts[0] {
                let idx = [i, j, k];
                let centre = std::array::from_fn(|a| {
                    domain.min[a]
                        + (domain.max[a] - domain.min[a]) * (T::from(idx[a]).unwrap() + half)
                            / T::from(counts[a]).unwrap()
                });
                spheres.push(Sphere::new(spheres.len() as ObjectId, centre, radius));
            }
        }
    }
    spheres
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_state_roundtrip() {
        let s = Sphere::new(4, [1.0, 2.0, 3.0], 0.5).with_velocity([1.0, 0.0, 0.0]);
        let bytes = s.serialize_state().unwrap();
        assert_eq!(Sphere::<f64>::deserialize_state(&bytes).unwrap(), s);
    }

    #[test]
    fn test_step() {
        let mut s = Sphere::new(0, [0.0, 0.0, 0.0], 0.1).with_velocity([1.0, -2.0, 0.5]);
        s.step(0.5);
        assert_relative_eq!(s.centre[0], 0.5);
        assert_relative_eq!(s.centre[1], -1.0);
        assert_relative_eq!(s.centre[2], 0.25);
    }

    #[test]
    fn test_sphere_lattice() {
        let spheres = sphere_lattice([4, 2, 1], Aabb::new([0.0; 3], [4.0, 2.0, 1.0]), 0.1);
        assert_eq!(spheres.len(), 8);
        assert_relative_eq!(spheres[0].centre[0], 0.5);
        assert_relative_eq!(spheres[5].centre[0], 1.5);
        assert_relative_eq!(spheres[5].centre[1], 1.5);
        assert_eq!(spheres[7].id, 7);
    }
}
