//! Axis-aligned bounding boxes
use super::RealScalar;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: RealScalar")]
pub struct Aabb<T: RealScalar> {
    /// Lower corner
    pub min: [T; 3],
    /// Upper corner
    pub max: [T; 3],
}

impl<T: RealScalar> Aabb<T> {
    /// Create new
    pub fn new(min: [T; 3], max: [T; 3]) -> Self {
        Self { min, max }
    }

    /// A degenerate box containing a single point
    pub fn from_point(point: [T; 3]) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// A box centred at `centre` with the given half widths
    pub fn from_centre(centre: [T; 3], half_widths: [T; 3]) -> Self {
        Self {
            min: std::array::from_fn(|i| centre[i] - half_widths[i]),
            max: std::array::from_fn(|i| centre[i] + half_widths[i]),
        }
    }

    /// The centre of the box
    pub fn centre(&self) -> [T; 3] {
        let two = T::one() + T::one();
        std::array::from_fn(|i| (self.min[i] + self.max[i]) / two)
    }

    /// Grow the box by `margin` in every direction
    pub fn inflate(&self, margin: T) -> Self {
        Self {
            min: self.min.map(|x| x - margin),
            max: self.max.map(|x| x + margin),
        }
    }

    /// Translate the box by `offset`
    pub fn translate(&self, offset: [T; 3]) -> Self {
        Self {
            min: std::array::from_fn(|i| self.min[i] + offset[i]),
            max: std::array::from_fn(|i| self.max[i] + offset[i]),
        }
    }
}
