//! Interest queries a worker subscribes with.
//!
//! Kept declarative: the transport layer turns a [`QueryConstraint`] into its
//! own subscription format.

use glam::Vec3;
use serde::Serialize;

use crate::cell::Cell;

/// Axis-aligned box given by its center and half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxConstraint {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl BoxConstraint {
    /// Box over a planar cell with unbounded vertical extent.
    pub fn from_cell(cell: &Cell) -> Self {
        let center = cell.center();
        let half = cell.size() * 0.5;
        Self {
            center: center.extend(0.0),
            half_extents: half.extend(f32::MAX),
        }
    }

    /// Full edge lengths, twice the half extents.
    pub fn edge_lengths(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    /// Closed containment test.
    pub fn contains(&self, point: Vec3) -> bool {
        let d = (point - self.center).abs();
        d.cmple(self.half_extents).all()
    }
}

/// Boolean combination of spatial constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryConstraint {
    Box(BoxConstraint),
    Or(Vec<QueryConstraint>),
}

impl QueryConstraint {
    /// True when any box in the constraint contains `point`.
    pub fn contains(&self, point: Vec3) -> bool {
        match self {
            Self::Box(b) => b.contains(point),
            Self::Or(items) => items.iter().any(|c| c.contains(point)),
        }
    }

    /// Every box in the constraint, depth first.
    pub fn boxes(&self) -> Vec<BoxConstraint> {
        match self {
            Self::Box(b) => vec![*b],
            Self::Or(items) => items.iter().flat_map(QueryConstraint::boxes).collect(),
        }
    }
}
