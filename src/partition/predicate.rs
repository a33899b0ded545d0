//! Partition predicates
use crate::types::{Aabb, Axis, RealScalar};
use serde::{Deserialize, Serialize};

/// Membership test of a partition
///
/// Bounds are half-open, `[min, max)`, so that a coordinate on a shared face
/// belongs to the partition that starts there. The last partition along an
/// axis can close its upper bound so that the far face of the whole domain is
/// owned too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub enum PartitionPredicate<T: RealScalar> {
    /// Bounded on one axis, infinite on the other two
    Slice {
        /// The bounded axis
        axis: Axis,
        /// Lower bound
        min: T,
        /// Upper bound
        max: T,
        /// Whether `max` itself is included
        upper_closed: bool,
    },
    /// Bounded on all three axes
    Box {
        /// The bounds
        bounds: Aabb<T>,
        /// Whether `bounds.max` is included, per axis
        upper_closed: [bool; 3],
    },
}

// Does [min, max) (or [min, max]) intersect [lo, hi]?
fn interval_overlaps<T: RealScalar>(min: T, max: T, upper_closed: bool, lo: T, hi: T) -> bool {
    min <= hi && (lo < max || (upper_closed && lo <= max))
}

fn interval_contains<T: RealScalar>(min: T, max: T, upper_closed: bool, x: T) -> bool {
    min <= x && (x < max || (upper_closed && x <= max))
}

impl<T: RealScalar> PartitionPredicate<T> {
    /// A half-open slice `[min, max)` along `axis`
    pub fn slice(axis: Axis, min: T, max: T) -> Self {
        Self::Slice {
            axis,
            min,
            max,
            upper_closed: false,
        }
    }

    /// A half-open box `[min, max)` along every axis
    pub fn boxed(bounds: Aabb<T>) -> Self {
        Self::Box {
            bounds,
            upper_closed: [false; 3],
        }
    }

    /// Close the upper bound along `axis`
    pub fn close_upper(mut self, closed_axis: Axis) -> Self {
        match &mut self {
            Self::Slice {
                axis, upper_closed, ..
            } => {
                if *axis == closed_axis {
                    *upper_closed = true;
                }
            }
            Self::Box { upper_closed, .. } => {
                upper_closed[closed_axis.index()] = true;
            }
        }
        self
    }

    /// Does an object with bounding box `aabb` touch this partition?
    pub fn overlaps(&self, aabb: &Aabb<T>) -> bool {
        match self {
            Self::Slice {
                axis,
                min,
                max,
                upper_closed,
            } => {
                let i = axis.index();
                interval_overlaps(*min, *max, *upper_closed, aabb.min[i], aabb.max[i])
            }
            Self::Box {
                bounds,
                upper_closed,
            } => (0..3).all(|i| {
                interval_overlaps(
                    bounds.min[i],
                    bounds.max[i],
                    upper_closed[i],
                    aabb.min[i],
                    aabb.max[i],
                )
            }),
        }
    }

    /// Is a point inside this partition?
    pub fn contains(&self, point: &[T; 3]) -> bool {
        match self {
            Self::Slice {
                axis,
                min,
                max,
                upper_closed,
            } => interval_contains(*min, *max, *upper_closed, point[axis.index()]),
            Self::Box {
                bounds,
                upper_closed,
            } => (0..3).all(|i| {
                interval_contains(bounds.min[i], bounds.max[i], upper_closed[i], point[i])
            }),
        }
    }

    /// The bounds along an axis. Unbounded axes of a slice are infinite.
    pub fn bounds(&self, along: Axis) -> (T, T) {
        match self {
            Self::Slice { axis, min, max, .. } => {
                if *axis == along {
                    (*min, *max)
                } else {
                    (T::neg_infinity(), T::infinity())
                }
            }
            Self::Box { bounds, .. } => (bounds.min[along.index()], bounds.max[along.index()]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slice_contains() {
        let p = PartitionPredicate::slice(Axis::Y, 1.0, 2.0);
        assert!(p.contains(&[100.0, 1.0, -7.0]));
        assert!(p.contains(&[0.0, 1.5, 0.0]));
        assert!(!p.contains(&[0.0, 2.0, 0.0]));
        assert!(!p.contains(&[0.0, 0.99, 0.0]));
        assert!(p.close_upper(Axis::Y).contains(&[0.0, 2.0, 0.0]));
        // Closing another axis does nothing to a slice
        assert!(!p.close_upper(Axis::X).contains(&[0.0, 2.0, 0.0]));
    }

    #[test]
    fn test_slice_overlaps() {
        let p = PartitionPredicate::slice(Axis::X, 0.0, 1.0);
        assert!(p.overlaps(&Aabb::new([-1.0, 5.0, 5.0], [0.0, 6.0, 6.0])));
        assert!(p.overlaps(&Aabb::new([0.5, -9.0, -9.0], [3.0, 9.0, 9.0])));
        assert!(!p.overlaps(&Aabb::new([1.0, 0.0, 0.0], [2.0, 1.0, 1.0])));
        assert!(!p.overlaps(&Aabb::new([-2.0, 0.0, 0.0], [-0.1, 1.0, 1.0])));
    }

    #[test]
    fn test_box_contains_uses_bounds() {
        let p = PartitionPredicate::boxed(Aabb::new([0.0, 0.0, 0.0], [1.0, 2.0, 3.0]));
        assert!(p.contains(&[0.0, 0.0, 0.0]));
        assert!(p.contains(&[0.5, 1.5, 2.5]));
        assert!(!p.contains(&[1.0, 1.0, 1.0]));
        assert!(!p.contains(&[0.5, 2.0, 1.0]));
        assert!(!p.contains(&[0.5, 1.0, 3.0]));
        assert!(!p.contains(&[0.5, 1.0, 30.0]));
        assert!(!p.contains(&[-0.5, 1.0, 1.0]));
        assert!(p.close_upper(Axis::Z).contains(&[0.5, 1.0, 3.0]));
    }

    #[test]
    fn test_box_overlaps() {
        let p = PartitionPredicate::boxed(Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]));
        assert!(p.overlaps(&Aabb::new([0.9, 0.9, 0.9], [2.0, 2.0, 2.0])));
        assert!(!p.overlaps(&Aabb::new([0.9, 1.0, 0.9], [2.0, 2.0, 2.0])));
        assert!(p.overlaps(&Aabb::new([-1.0, -1.0, -1.0], [0.0, 0.0, 0.0])));
    }

    #[test]
    fn test_bounds() {
        let p = PartitionPredicate::slice(Axis::Z, -1.0f32, 1.0);
        assert_eq!(p.bounds(Axis::Z), (-1.0, 1.0));
        assert_eq!(p.bounds(Axis::X), (f32::NEG_INFINITY, f32::INFINITY));
    }
}
