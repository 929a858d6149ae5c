use fabric_common::WorkerId;
use glam::Vec2;

use crate::cell::Cell;
use crate::error::PartitionError;
use crate::layout::TessellationRule;

/// Cell groups of a tessellated world, each bound to one worker.
///
/// Built once at initialization and never mutated afterwards apart from the
/// one-time worker id binding. Group `i` belongs to `worker_ids[i]`; the
/// index one past the last group is the overflow group for workers that
/// have no spatial claim.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    groups: Vec<Vec<Cell>>,
    worker_ids: Vec<WorkerId>,
}

impl PartitionTable {
    /// Tessellate a `width` x `height` world centred on the origin.
    pub fn build(width: f32, height: f32, rule: &TessellationRule) -> Result<Self, PartitionError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PartitionError::InvalidWorld { width, height });
        }
        let group_count = rule.validate()?;
        let (rows, cols) = (rule.rows(), rule.cols());

        let origin = Vec2::new(-width / 2.0, -height / 2.0);
        let step = Vec2::new(width / rows as f32, height / cols as f32);

        let mut groups = vec![Vec::new(); group_count];
        for col in 0..cols {
            for row in 0..rows {
                let min = origin + step * Vec2::new(row as f32, col as f32);
                let max = origin + step * Vec2::new((row + 1) as f32, (col + 1) as f32);
                let index = col as usize * rows as usize + row as usize;
                let group = rule
                    .group_of(index)
                    .ok_or(PartitionError::GroupMapMismatch {
                        expected: rule.grid_cell_count(),
                        actual: index,
                    })?;
                groups[group].push(Cell::new(min, max)?);
            }
        }

        let table = Self {
            groups,
            worker_ids: Vec::new(),
        };
        table.check_disjoint()?;

        tracing::info!(
            rows,
            cols,
            groups = table.groups.len(),
            width,
            height,
            "partition table built"
        );
        Ok(table)
    }

    /// Bind the contiguous range `first..=last` to the groups in order.
    pub fn bind_worker_ids(&mut self, first: WorkerId, last: WorkerId) -> Result<(), PartitionError> {
        if !first.is_valid() || last < first {
            return Err(PartitionError::InvalidWorkerRange { first, last });
        }
        let provided = (last.0 - first.0) as usize + 1;
        if provided != self.groups.len() {
            return Err(PartitionError::WorkerCountMismatch {
                provided,
                groups: self.groups.len(),
            });
        }
        tracing::info!(%first, %last, "binding worker ids");
        self.worker_ids = (first.0..=last.0).map(WorkerId).collect();
        Ok(())
    }

    /// Whether worker ids have been bound.
    pub fn is_bound(&self) -> bool {
        !self.worker_ids.is_empty()
    }

    /// Bound worker ids, one per group.
    pub fn worker_ids(&self) -> &[WorkerId] {
        &self.worker_ids
    }

    /// Number of cell groups, excluding the overflow group.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Index reserved for workers outside the partition.
    pub fn overflow_group(&self) -> usize {
        self.groups.len()
    }

    /// Cells of `group`; empty for the overflow group.
    pub fn cells(&self, group: usize) -> &[Cell] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cells of every group in table order.
    pub fn groups(&self) -> impl Iterator<Item = &[Cell]> {
        self.groups.iter().map(Vec::as_slice)
    }

    /// Group bound to `worker`, if any.
    pub fn group_of_worker(&self, worker: WorkerId) -> Option<usize> {
        self.worker_ids.iter().position(|w| *w == worker)
    }

    /// Worker bound to `group`, if any.
    pub fn worker_for_group(&self, group: usize) -> Option<WorkerId> {
        self.worker_ids.get(group).copied()
    }

    /// First `(group, cell)` whose cell contains `point`, scanning groups in
    /// ascending order and cells in ascending order within each group.
    pub fn locate(&self, point: Vec2) -> Option<(usize, usize)> {
        self.groups.iter().enumerate().find_map(|(g, cells)| {
            cells
                .iter()
                .position(|cell| cell.contains(point))
                .map(|c| (g, c))
        })
    }

    /// Sweep along x: once a later cell starts at or past `a.max.x`, no
    /// further cell can overlap `a`.
    fn check_disjoint(&self) -> Result<(), PartitionError> {
        let mut flat: Vec<(usize, usize, &Cell)> = self
            .groups
            .iter()
            .enumerate()
            .flat_map(|(g, cells)| cells.iter().enumerate().map(move |(c, cell)| (g, c, cell)))
            .collect();
        flat.sort_by(|(_, _, a), (_, _, b)| a.min().x.total_cmp(&b.min().x));
        for (i, (group_a, cell_a, a)) in flat.iter().enumerate() {
            for (group_b, cell_b, b) in &flat[i + 1..] {
                if b.min().x >= a.max().x {
                    break;
                }
                if a.overlaps(b) {
                    return Err(PartitionError::Overlap {
                        group_a: *group_a,
                        cell_a: *cell_a,
                        group_b: *group_b,
                        cell_b: *cell_b,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: f32 = 1_000_000.0;

    #[test]
    fn grid_tiles_whole_world() {
        let table = PartitionTable::build(WORLD, WORLD, &TessellationRule::Grid { rows: 2, cols: 3 })
            .unwrap();
        assert_eq!(table.group_count(), 6);
        for group in table.groups() {
            assert_eq!(group.len(), 1);
        }
        let first = table.cells(0)[0];
        assert_eq!(first.min(), Vec2::new(-500_000.0, -500_000.0));
        assert_eq!(table.cells(5)[0].max().x, 500_000.0);
    }

    #[test]
    fn rows_step_along_x_and_cols_along_y() {
        let table = PartitionTable::build(4.0, 4.0, &TessellationRule::Grid { rows: 2, cols: 2 })
            .unwrap();
        // index 1 = row 1, col 0
        assert_eq!(table.cells(1)[0].min(), Vec2::new(0.0, -2.0));
        // index 2 = row 0, col 1
        assert_eq!(table.cells(2)[0].min(), Vec2::new(-2.0, 0.0));
    }

    #[test]
    fn merged_quadrants_layout() {
        let table = PartitionTable::build(WORLD, WORLD, &TessellationRule::merged_quadrants()).unwrap();
        assert_eq!(table.group_count(), 2);
        assert_eq!(table.cells(0).len(), 3);
        assert_eq!(table.cells(1).len(), 1);
        assert_eq!(table.cells(1)[0].min(), Vec2::ZERO);
        assert_eq!(table.overflow_group(), 2);
        assert!(table.cells(table.overflow_group()).is_empty());
    }

    #[test]
    fn locate_uses_table_order() {
        let table = PartitionTable::build(WORLD, WORLD, &TessellationRule::merged_quadrants()).unwrap();
        assert_eq!(table.locate(Vec2::new(400_000.0, 400_000.0)), Some((1, 0)));
        assert_eq!(table.locate(Vec2::new(-1.0, 400_000.0)), Some((0, 2)));
        assert_eq!(table.locate(Vec2::ZERO), Some((1, 0)));
        assert_eq!(table.locate(Vec2::new(500_000.0, 0.0)), None);
    }

    #[test]
    fn rejects_bad_world() {
        let rule = TessellationRule::default();
        assert!(matches!(
            PartitionTable::build(0.0, 10.0, &rule),
            Err(PartitionError::InvalidWorld { .. })
        ));
        assert!(PartitionTable::build(f32::NAN, 10.0, &rule).is_err());
    }

    #[test]
    fn worker_binding() {
        let mut table = PartitionTable::build(WORLD, WORLD, &TessellationRule::merged_quadrants()).unwrap();
        assert!(!table.is_bound());
        assert!(matches!(
            table.bind_worker_ids(WorkerId(1), WorkerId(3)),
            Err(PartitionError::WorkerCountMismatch { provided: 3, groups: 2 })
        ));
        assert!(matches!(
            table.bind_worker_ids(WorkerId(0), WorkerId(1)),
            Err(PartitionError::InvalidWorkerRange { .. })
        ));
        table.bind_worker_ids(WorkerId(5), WorkerId(6)).unwrap();
        assert_eq!(table.worker_ids(), &[WorkerId(5), WorkerId(6)]);
        assert_eq!(table.group_of_worker(WorkerId(6)), Some(1));
        assert_eq!(table.group_of_worker(WorkerId(7)), None);
        assert_eq!(table.worker_for_group(0), Some(WorkerId(5)));
    }

    #[test]
    fn overlap_is_detected() {
        let a = Cell::new(Vec2::ZERO, Vec2::splat(2.0)).unwrap();
        let b = Cell::new(Vec2::ONE, Vec2::splat(3.0)).unwrap();
        let table = PartitionTable {
            groups: vec![vec![a], vec![b]],
            worker_ids: Vec::new(),
        };
        assert!(matches!(
            table.check_disjoint(),
            Err(PartitionError::Overlap { group_a: 0, group_b: 1, .. })
        ));
    }

    #[test]
    fn overlap_found_past_non_overlapping_neighbours() {
        let wide = Cell::new(Vec2::ZERO, Vec2::new(10.0, 1.0)).unwrap();
        let above = Cell::new(Vec2::new(1.0, 5.0), Vec2::new(2.0, 6.0)).unwrap();
        let inside = Cell::new(Vec2::new(5.0, 0.0), Vec2::new(6.0, 1.0)).unwrap();
        let table = PartitionTable {
            groups: vec![vec![inside], vec![above, wide]],
            worker_ids: Vec::new(),
        };
        assert!(matches!(
            table.check_disjoint(),
            Err(PartitionError::Overlap {
                group_a: 1,
                cell_a: 1,
                group_b: 0,
                cell_b: 0
            })
        ));
    }

    #[test]
    fn largest_grid_builds() {
        let table =
            PartitionTable::build(WORLD, WORLD, &TessellationRule::Grid { rows: 1, cols: 4096 })
                .unwrap();
        assert_eq!(table.group_count(), 4096);
        assert!(matches!(
            PartitionTable::build(WORLD, WORLD, &TessellationRule::Grid { rows: 1, cols: 4097 }),
            Err(PartitionError::GridTooLarge { .. })
        ));
    }
}
