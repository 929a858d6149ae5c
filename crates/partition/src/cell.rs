use glam::Vec2;
use serde::Serialize;

use crate::error::PartitionError;

/// Axis-aligned rectangle of world space.
///
/// Containment is half-open: `min` is inside, `max` is not. Two cells that
/// share an edge therefore never both claim a point on that edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    min: Vec2,
    max: Vec2,
}

impl Cell {
    /// Create a cell, rejecting zero or negative width and height.
    pub fn new(min: Vec2, max: Vec2) -> Result<Self, PartitionError> {
        if !(min.x < max.x && min.y < max.y) {
            return Err(PartitionError::DegenerateCell { min, max });
        }
        Ok(Self { min, max })
    }

    /// Inclusive lower corner.
    pub fn min(&self) -> Vec2 {
        self.min
    }

    /// Exclusive upper corner.
    pub fn max(&self) -> Vec2 {
        self.max
    }

    /// Width and height.
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Midpoint of the rectangle.
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Half-open containment test.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.y >= self.min.y && point.x < self.max.x && point.y < self.max.y
    }

    /// Grow the cell by `margin` on all four sides. A negative margin shrinks
    /// it; shrinking to nothing is a configuration error.
    pub fn expand(&self, margin: f32) -> Result<Self, PartitionError> {
        let grow = Vec2::splat(margin);
        Self::new(self.min - grow, self.max + grow)
    }

    /// Whether the two half-open rectangles share any point.
    pub fn overlaps(&self, other: &Cell) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Cell {
        Cell::new(Vec2::ZERO, Vec2::ONE).unwrap()
    }

    #[test]
    fn rejects_degenerate() {
        assert!(Cell::new(Vec2::ZERO, Vec2::new(0.0, 1.0)).is_err());
        assert!(Cell::new(Vec2::ONE, Vec2::ZERO).is_err());
    }

    #[test]
    fn containment_is_half_open() {
        let c = unit();
        assert!(c.contains(Vec2::ZERO));
        assert!(c.contains(Vec2::new(0.5, 0.999)));
        assert!(!c.contains(Vec2::new(1.0, 0.5)));
        assert!(!c.contains(Vec2::new(0.5, 1.0)));
        assert!(!c.contains(Vec2::new(-0.001, 0.5)));
    }

    #[test]
    fn shared_edge_belongs_to_one_cell() {
        let left = Cell::new(Vec2::new(-1.0, 0.0), Vec2::new(0.0, 1.0)).unwrap();
        let right = unit();
        let edge = Vec2::new(0.0, 0.5);
        assert!(!left.contains(edge));
        assert!(right.contains(edge));
        assert!(!left.overlaps(&right));
    }

    #[test]
    fn expand_is_monotonic() {
        let c = unit();
        let grown = c.expand(0.25).unwrap();
        assert_eq!(grown.min(), Vec2::splat(-0.25));
        assert_eq!(grown.size(), Vec2::splat(1.5));
        for i in 0..10 {
            for j in 0..10 {
                let p = Vec2::new(i as f32 / 10.0, j as f32 / 10.0);
                assert!(c.contains(p));
                assert!(grown.contains(p));
            }
        }
    }

    #[test]
    fn expand_that_collapses_is_an_error() {
        assert!(unit().expand(-0.5).is_err());
        assert!(unit().expand(-0.4).is_ok());
    }

    #[test]
    fn center_and_size() {
        let c = Cell::new(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 6.0)).unwrap();
        assert_eq!(c.center(), Vec2::new(0.0, 3.0));
        assert_eq!(c.size(), Vec2::new(4.0, 6.0));
    }
}
