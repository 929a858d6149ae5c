use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::PartitionError;

/// Largest grid a rule may describe. Table construction checks every cell
/// against its neighbours, so the grid size bounds init time.
pub const MAX_GRID_CELLS: u64 = 4096;

/// How the world grid is carved into cell groups, one group per worker.
///
/// The grid has `rows` stacked along +x and `cols` stacked along +y. Grid
/// cells are numbered column-major: `index = col * rows + row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TessellationRule {
    /// Every grid cell is its own group.
    Grid { rows: u32, cols: u32 },
    /// `groups[i]` names the group that owns grid cell `i`. Groups are
    /// arbitrary unions of grid cells.
    Custom {
        rows: u32,
        cols: u32,
        groups: Vec<usize>,
    },
}

impl Default for TessellationRule {
    fn default() -> Self {
        Self::Grid { rows: 1, cols: 1 }
    }
}

impl TessellationRule {
    /// 2x2 split with the first three quadrants merged into group 0 and the
    /// fourth (`x >= 0, y >= 0`) kept as group 1.
    pub fn merged_quadrants() -> Self {
        Self::Custom {
            rows: 2,
            cols: 2,
            groups: vec![0, 0, 0, 1],
        }
    }

    pub fn rows(&self) -> u32 {
        match self {
            Self::Grid { rows, .. } | Self::Custom { rows, .. } => *rows,
        }
    }

    pub fn cols(&self) -> u32 {
        match self {
            Self::Grid { cols, .. } | Self::Custom { cols, .. } => *cols,
        }
    }

    /// Number of grid cells, `rows * cols`.
    pub fn grid_cell_count(&self) -> usize {
        self.rows() as usize * self.cols() as usize
    }

    /// Group owning grid cell `index`, or `None` past the end of the grid.
    pub fn group_of(&self, index: usize) -> Option<usize> {
        match self {
            Self::Grid { .. } => (index < self.grid_cell_count()).then_some(index),
            Self::Custom { groups, .. } => groups.get(index).copied(),
        }
    }

    /// Number of distinct groups the rule produces.
    pub fn group_count(&self) -> usize {
        match self {
            Self::Grid { .. } => self.grid_cell_count(),
            Self::Custom { groups, .. } => groups.iter().collect::<BTreeSet<_>>().len(),
        }
    }

    /// Check the rule is well formed and return its group count.
    ///
    /// Custom maps must cover every grid cell and number their groups
    /// `0..n` with no empty group, so that the group count is also the
    /// number of workers the layout needs.
    pub fn validate(&self) -> Result<usize, PartitionError> {
        let (rows, cols) = (self.rows(), self.cols());
        if rows == 0 || cols == 0 {
            return Err(PartitionError::EmptyGrid { rows, cols });
        }
        if u64::from(rows) * u64::from(cols) > MAX_GRID_CELLS {
            return Err(PartitionError::GridTooLarge {
                rows,
                cols,
                max: MAX_GRID_CELLS,
            });
        }
        let Self::Custom { groups, .. } = self else {
            return Ok(self.grid_cell_count());
        };
        if groups.len() != self.grid_cell_count() {
            return Err(PartitionError::GroupMapMismatch {
                expected: self.grid_cell_count(),
                actual: groups.len(),
            });
        }
        let count = groups.iter().max().map_or(0, |max| max + 1);
        let used: BTreeSet<usize> = groups.iter().copied().collect();
        if let Some(group) = (0..count).find(|g| !used.contains(g)) {
            return Err(PartitionError::EmptyGroup { group, count });
        }
        Ok(count)
    }
}
