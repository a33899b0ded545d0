//! Types

mod aabb;
mod axis;
mod error;
mod ownership;
pub use aabb::Aabb;
pub use axis::Axis;
pub use error::{DomainError, DomainResult};
pub use ownership::Ownership;

use num::Float;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Identifier of a simulation object. Stable for the whole run.
pub type ObjectId = u64;

/// Identifier of a node (e.g. a finite element node) that objects may share.
pub type NodeId = u64;

/// Rank of a partition. Unique across the whole run.
pub type Rank = usize;

/// A real scalar
pub trait RealScalar:
    Float + Debug + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> RealScalar for T where
    T: Float + Debug + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}
