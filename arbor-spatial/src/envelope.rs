use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::{SpatialError, SpatialResult};

/// An axis-aligned 2D rectangle bounding a geometry or a subtree.
///
/// `Envelope` is the value type all tree maintenance and search pruning is
/// computed over: minimum (min_x, min_y) and maximum (max_x, max_y) corners,
/// with `min <= max` in both dimensions for any well-formed envelope.
///
/// # Examples
///
/// ```rust
/// use arbor_spatial::Envelope;
///
/// let mut env = Envelope::new(0.0, 0.0, 2.0, 1.0);
/// assert_eq!(env.area(), 2.0);
/// env.expand_to_include(&Envelope::new(3.0, 0.0, 4.0, 1.0));
/// assert_eq!(env.max_x, 4.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Display for Envelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds an envelope from the persisted 4-double layout
    /// `[min_x, min_y, max_x, max_y]`.
    pub fn from_array(values: &[f64]) -> SpatialResult<Envelope> {
        match values {
            [min_x, min_y, max_x, max_y] => Ok(Envelope::new(*min_x, *min_y, *max_x, *max_y)),
            _ => Err(SpatialError::InvalidArgument(format!(
                "expected 4 bounding box values, got {}",
                values.len()
            ))),
        }
    }

    /// Returns the persisted 4-double layout `[min_x, min_y, max_x, max_y]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Midpoint along dimension 0 (x) or 1 (y).
    pub fn centre(&self, dimension: usize) -> f64 {
        match dimension {
            0 => (self.min_x + self.max_x) / 2.0,
            _ => (self.min_y + self.max_y) / 2.0,
        }
    }

    /// True iff `other` lies (inclusively) inside this envelope.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// True iff the two rectangles share at least a boundary point.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// True iff the point lies (inclusively) inside this envelope.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// In-place union with `other`.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Returns the union of this envelope with `other`.
    pub fn union(&self, other: &Envelope) -> Envelope {
        let mut result = *self;
        result.expand_to_include(other);
        result
    }

    /// Euclidean distance between the two rectangle centers.
    ///
    /// Used as the dead-space measure when picking split seeds; the metric is
    /// stable for a given pair of envelopes.
    pub fn separation(&self, other: &Envelope) -> f64 {
        let dx = self.centre(0) - other.centre(0);
        let dy = self.centre(1) - other.centre(1);
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance between the rectangle centers along a single dimension.
    pub fn separation_along(&self, dimension: usize, other: &Envelope) -> f64 {
        (self.centre(dimension) - other.centre(dimension)).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_height_area() {
        let env = Envelope::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(env.width(), 10.0);
        assert_eq!(env.height(), 5.0);
        assert_eq!(env.area(), 50.0);
    }

    #[test]
    fn centre_by_dimension() {
        let env = Envelope::new(0.0, 2.0, 10.0, 4.0);
        assert_eq!(env.centre(0), 5.0);
        assert_eq!(env.centre(1), 3.0);
    }

    #[test]
    fn contains_is_inclusive() {
        let outer = Envelope::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&Envelope::new(0.0, 0.0, 10.0, 10.0)));
        assert!(outer.contains(&Envelope::new(2.0, 2.0, 8.0, 8.0)));
        assert!(!outer.contains(&Envelope::new(5.0, 5.0, 11.0, 8.0)));
        assert!(!outer.contains(&Envelope::new(-1.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn intersects_counts_touching() {
        let env = Envelope::new(0.0, 0.0, 10.0, 10.0);
        assert!(env.intersects(&Envelope::new(5.0, 5.0, 15.0, 15.0)));
        assert!(env.intersects(&Envelope::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!env.intersects(&Envelope::new(10.1, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn contains_point_boundary() {
        let env = Envelope::new(0.0, 0.0, 1.0, 1.0);
        assert!(env.contains_point(0.0, 0.0));
        assert!(env.contains_point(1.0, 1.0));
        assert!(env.contains_point(0.5, 0.5));
        assert!(!env.contains_point(1.5, 0.5));
    }

    #[test]
    fn expand_to_include_grows() {
        let mut env = Envelope::new(0.0, 0.0, 1.0, 1.0);
        env.expand_to_include(&Envelope::new(-1.0, 2.0, 0.5, 3.0));
        assert_eq!(env, Envelope::new(-1.0, 0.0, 1.0, 3.0));

        // expanding by a contained envelope is a no-op
        let before = env;
        env.expand_to_include(&Envelope::new(0.0, 0.0, 0.5, 0.5));
        assert_eq!(env, before);
    }

    #[test]
    fn separation_is_center_distance() {
        let a = Envelope::new(0.0, 0.0, 2.0, 2.0);
        let b = Envelope::new(3.0, 0.0, 5.0, 2.0);
        assert_eq!(a.separation(&b), 3.0);
        assert_eq!(a.separation(&a), 0.0);

        let c = Envelope::new(3.0, 4.0, 5.0, 12.0);
        assert_eq!(a.separation_along(0, &c), 3.0);
        assert_eq!(a.separation_along(1, &c), 7.0);
    }

    #[test]
    fn array_round_trip() {
        let env = Envelope::new(1.0, 2.0, 3.0, 4.0);
        let array = env.to_array();
        assert_eq!(array, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(Envelope::from_array(&array).unwrap(), env);
    }

    #[test]
    fn from_array_rejects_wrong_length() {
        assert!(Envelope::from_array(&[1.0, 2.0, 3.0]).is_err());
        assert!(Envelope::from_array(&[]).is_err());
    }
}
