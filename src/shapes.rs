//! Simple example objects

mod sphere;

pub use sphere::{sphere_lattice, Sphere};
