//! Spatial partitions
mod builder;
mod channel;
mod domain;
mod message;
mod predicate;

pub use builder::{BoxBuilder, SliceBuilder};
pub use channel::{InterfaceChannel, OuterPlaceholder};
pub use domain::Partition;
pub(crate) use message::{decode, encode};
pub use predicate::PartitionPredicate;
