//! Partition builders
use super::PartitionPredicate;
use crate::{
    traits::PartitionBuilder,
    types::{Aabb, Axis, Rank, RealScalar},
};
use itertools::{iproduct, Itertools};
use serde::{Deserialize, Serialize};

// Check that cuts are strictly increasing and define at least one interval.
fn check_cuts<T: RealScalar>(cuts: &[T]) {
    if cuts.len() < 2 {
        panic!("At least two cuts are needed, got {}", cuts.len());
    }
    if let Some((a, b)) = cuts.iter().tuple_windows().find(|(a, b)| a >= b) {
        panic!("Cuts must be strictly increasing, found {a:?} followed by {b:?}");
    }
}

// `n + 1` equally spaced cuts from `min` to `max`.
fn uniform_cuts<T: RealScalar>(n: usize, min: T, max: T) -> Vec<T> {
    if n == 0 {
        panic!("Cannot build zero partitions");
    }
    let nt = T::from(n).unwrap();
    let mut cuts = (0..n)
        .map(|i| min + (max - min) * T::from(i).unwrap() / nt)
        .collect_vec();
    cuts.push(max);
    cuts
}

/// Decomposition of space into slices along one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub struct SliceBuilder<T: RealScalar> {
    cuts: Vec<T>,
    axis: Axis,
}

impl<T: RealScalar> SliceBuilder<T> {
    /// Split `[min, max]` into `tot_ranks` slices of equal width
    pub fn uniform(tot_ranks: usize, min: T, max: T, axis: Axis) -> Self {
        Self::from_cuts(uniform_cuts(tot_ranks, min, max), axis)
    }

    /// Slices between consecutive cuts. Slice `i` is `[cuts[i], cuts[i + 1])`.
    pub fn from_cuts(cuts: Vec<T>, axis: Axis) -> Self {
        check_cuts(&cuts);
        Self { cuts, axis }
    }

    /// The sliced axis
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// The cut coordinates
    pub fn cuts(&self) -> &[T] {
        &self.cuts
    }

    /// Lower and upper bound of a slice
    pub fn bounds(&self, rank: Rank) -> (T, T) {
        (self.cuts[rank], self.cuts[rank + 1])
    }
}

impl<T: RealScalar> PartitionBuilder for SliceBuilder<T> {
    type T = T;

    fn tot_ranks(&self) -> usize {
        self.cuts.len() - 1
    }

    fn predicate(&self, rank: Rank) -> PartitionPredicate<T> {
        let (min, max) = self.bounds(rank);
        let p = PartitionPredicate::slice(self.axis, min, max);
        if rank + 1 == self.tot_ranks() {
            p.close_upper(self.axis)
        } else {
            p
        }
    }

    fn neighbours(&self, rank: Rank) -> Vec<Rank> {
        let mut n = vec![];
        if rank > 0 {
            n.push(rank - 1);
        }
        if rank + 1 < self.tot_ranks() {
            n.push(rank + 1);
        }
        n
    }

    fn owner_of(&self, point: &[T; 3]) -> Option<Rank> {
        let x = point[self.axis.index()];
        let last = self.cuts.len() - 1;
        if !x.is_finite() || x < self.cuts[0] || x > self.cuts[last] {
            None
        } else if x == self.cuts[last] {
            Some(last - 1)
        } else {
            Some(self.cuts.partition_point(|c| *c <= x) - 1)
        }
    }
}

/// Decomposition of space into a grid of axis-aligned boxes
///
/// The box with indices `(ix, iy, iz)` has rank `ix + nx * (iy + ny * iz)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub struct BoxBuilder<T: RealScalar> {
    cuts: [Vec<T>; 3],
}

impl<T: RealScalar> BoxBuilder<T> {
    /// Boxes between consecutive cuts along each axis
    pub fn from_cuts(cuts: [Vec<T>; 3]) -> Self {
        for c in &cuts {
            check_cuts(c);
        }
        Self { cuts }
    }

    /// Split the box `domain` into `counts[i]` equal pieces along axis `i`
    pub fn uniform(counts: [usize; 3], domain: Aabb<T>) -> Self {
        Self::from_cuts(std::array::from_fn(|i| {
            uniform_cuts(counts[i], domain.min[i], domain.max[i])
        }))
    }

    /// Number of boxes along each axis
    pub fn counts(&self) -> [usize; 3] {
        std::array::from_fn(|i| self.cuts[i].len() - 1)
    }

    /// Rank of the box with the given indices
    pub fn rank(&self, indices: [usize; 3]) -> Rank {
        let [nx, ny, _] = self.counts();
        indices[0] + nx * (indices[1] + ny * indices[2])
    }

    /// Indices of the box with the given rank
    pub fn indices(&self, rank: Rank) -> [usize; 3] {
        let [nx, ny, _] = self.counts();
        [rank % nx, (rank / nx) % ny, rank / (nx * ny)]
    }

    /// Bounds of the box with the given rank
    pub fn bounds(&self, rank: Rank) -> Aabb<T> {
        let idx = self.indices(rank);
        Aabb::new(
            std::array::from_fn(|i| self.cuts[i][idx[i]]),
            std::array::from_fn(|i| self.cuts[i][idx[i] + 1]),
        )
    }
}

impl<T: RealScalar> PartitionBuilder for BoxBuilder<T> {
    type T = T;

    fn tot_ranks(&self) -> usize {
        self.counts().iter().product()
    }

    fn predicate(&self, rank: Rank) -> PartitionPredicate<T> {
        let idx = self.indices(rank);
        let counts = self.counts();
        Axis::ALL.iter().fold(
            PartitionPredicate::boxed(self.bounds(rank)),
            |p, axis| {
                if idx[axis.index()] + 1 == counts[axis.index()] {
                    p.close_upper(*axis)
                } else {
                    p
                }
            },
        )
    }

    fn neighbours(&self, rank: Rank) -> Vec<Rank> {
        let idx = self.indices(rank);
        let counts = self.counts();
        // Indices within one of `idx` along an axis
        let range = |i: usize| idx[i].saturating_sub(1)..usize::min(idx[i] + 2, counts[i]);
        iproduct!(range(2), range(1), range(0))
            .map(|(z, y, x)| self.rank([x, y, z]))
            .filter(|r| *r != rank)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use paste::paste;

    macro_rules! uniform_slice_tests {
        ($($t:ty),*) => {
            $(
                paste! {
                    #[test]
                    fn [<test_uniform_slices_ $t>]() {
                        let b = SliceBuilder::<$t>::uniform(4, 0.0, 10.0, Axis::X);
                        assert_eq!(b.tot_ranks(), 4);
                        let expected: [($t, $t); 4] = [(0.0, 2.5), (2.5, 5.0), (5.0, 7.5), (7.5, 10.0)];
                        for (rank, (lo, hi)) in expected.iter().enumerate() {
                            let (min, max) = b.bounds(rank);
                            assert_relative_eq!(min, *lo);
                            assert_relative_eq!(max, *hi);
                        }
                        // Only the last slice contains the upper end
                        assert!(b.predicate(3).contains(&[10.0, 0.0, 0.0]));
                        assert!(!b.predicate(2).contains(&[7.5, 0.0, 0.0]));
                        assert!(b.predicate(3).contains(&[7.5, 0.0, 0.0]));
                    }
                }
            )*
        };
    }

    uniform_slice_tests!(f32, f64);

    #[test]
    fn test_explicit_cuts() {
        let b = SliceBuilder::from_cuts(vec![0.0, 1.0, 3.0, 10.0], Axis::X);
        assert_eq!(b.tot_ranks(), 3);
        assert_eq!(b.bounds(0), (0.0, 1.0));
        assert_eq!(b.bounds(1), (1.0, 3.0));
        assert_eq!(b.bounds(2), (3.0, 10.0));
        assert!(b.predicate(2).contains(&[10.0, 0.0, 0.0]));
        assert!(!b.predicate(0).contains(&[1.0, 0.0, 0.0]));
        assert!(b.predicate(1).contains(&[1.0, 0.0, 0.0]));
    }

    #[test]
    #[should_panic]
    fn test_unsorted_cuts() {
        let _b = SliceBuilder::from_cuts(vec![0.0, 3.0, 1.0], Axis::X);
    }

    #[test]
    #[should_panic]
    fn test_single_cut() {
        let _b = SliceBuilder::from_cuts(vec![0.0], Axis::Z);
    }

    #[test]
    fn test_slice_coverage() {
        let b = SliceBuilder::uniform(7, -1.0, 2.0, Axis::Y);
        for i in 0..=300 {
            let y = -1.0 + 3.0 * i as f64 / 300.0;
            let point = [0.3, y, -4.0];
            let owners = (0..b.tot_ranks())
                .filter(|r| b.predicate(*r).contains(&point))
                .collect_vec();
            assert_eq!(owners.len(), 1, "{y} is owned by {owners:?}");
            assert_eq!(b.owner_of(&point), Some(owners[0]));
        }
        assert_eq!(b.owner_of(&[0.0, 2.5, 0.0]), None);
        assert_eq!(b.owner_of(&[0.0, -1.5, 0.0]), None);
    }

    #[test]
    fn test_slice_owner_of_non_finite() {
        let b = SliceBuilder::uniform(3, 0.0, 3.0, Axis::X);
        assert_eq!(b.owner_of(&[f64::NAN, 0.0, 0.0]), None);
        assert_eq!(b.owner_of(&[f64::INFINITY, 0.0, 0.0]), None);
        assert_eq!(b.owner_of(&[f64::NEG_INFINITY, 0.0, 0.0]), None);
        // Only the sliced axis matters
        assert_eq!(b.owner_of(&[1.5, f64::NAN, 0.0]), Some(1));
    }

    #[test]
    fn test_slice_neighbours() {
        let b = SliceBuilder::uniform(3, 0.0, 3.0, Axis::Z);
        assert_eq!(b.neighbours(0), vec![1]);
        assert_eq!(b.neighbours(1), vec![0, 2]);
        assert_eq!(b.neighbours(2), vec![1]);
        let single = SliceBuilder::uniform(1, 0.0, 3.0, Axis::Z);
        assert!(single.neighbours(0).is_empty());
    }

    #[test]
    fn test_box_ranks() {
        let b = BoxBuilder::uniform([2, 3, 2], Aabb::new([0.0; 3], [2.0, 3.0, 2.0]));
        assert_eq!(b.tot_ranks(), 12);
        for rank in 0..12 {
            assert_eq!(b.rank(b.indices(rank)), rank);
        }
        let bounds = b.bounds(b.rank([1, 2, 0]));
        assert_eq!(bounds.min, [1.0, 2.0, 0.0]);
        assert_eq!(bounds.max, [2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_box_coverage() {
        let b = BoxBuilder::from_cuts([vec![0.0, 0.5, 1.0], vec![0.0, 1.0], vec![0.0, 0.2, 1.0]]);
        for point in [
            [0.0, 0.0, 0.0],
            [0.5, 0.5, 0.2],
            [1.0, 1.0, 1.0],
            [0.25, 1.0, 0.1],
            [0.75, 0.0, 0.9],
        ] {
            let owners = (0..b.tot_ranks())
                .filter(|r| b.predicate(*r).contains(&point))
                .count();
            assert_eq!(owners, 1, "{point:?}");
        }
    }

    #[test]
    fn test_box_neighbours() {
        let b = BoxBuilder::uniform([3, 3, 3], Aabb::new([0.0; 3], [3.0; 3]));
        assert_eq!(b.neighbours(b.rank([1, 1, 1])).len(), 26);
        assert_eq!(b.neighbours(b.rank([0, 0, 0])).len(), 7);
        assert_eq!(b.neighbours(b.rank([2, 1, 0])).len(), 11);

        let flat = BoxBuilder::uniform([2, 1, 1], Aabb::new([0.0; 3], [2.0, 1.0, 1.0]));
        assert_eq!(flat.neighbours(0), vec![1]);
    }
}
