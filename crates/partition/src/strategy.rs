use fabric_common::{HasPosition, WorkerId};
use glam::Vec3;
use std::collections::BTreeSet;

use crate::cell::Cell;
use crate::config::StrategyConfig;
use crate::error::{AuthorityError, PartitionError};
use crate::interest::{BoxConstraint, QueryConstraint};
use crate::table::PartitionTable;

/// Decisions the scheduling layer asks of a load-balancing strategy.
pub trait LoadBalanceStrategy {
    /// Table built, worker ids bound and local identity known.
    fn is_ready(&self) -> bool;

    /// Whether the local worker should own `entity`.
    fn should_have_authority(&self, entity: &dyn HasPosition) -> bool;

    /// Worker that should own `entity`, or [`WorkerId::INVALID`].
    fn who_should_have_authority(&self, entity: &dyn HasPosition) -> WorkerId;

    /// Region the local worker must subscribe to.
    fn worker_interest_query(&self) -> Result<QueryConstraint, AuthorityError>;

    /// Stable anchor for the worker's own presence in the world.
    fn worker_entity_position(&self) -> Result<Vec3, AuthorityError>;

    fn minimum_required_workers(&self) -> u32;

    fn virtual_worker_ids(&self) -> BTreeSet<WorkerId>;
}

/// Which group the local worker simulates.
///
/// `is_group_valid == false` means the worker's id is outside the bound
/// range; it then sits in the overflow group and owns no space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAssignment {
    pub worker_id: WorkerId,
    pub group_index: usize,
    pub is_group_valid: bool,
}

/// Spatial strategy over an arbitrary cell-to-group tessellation.
///
/// Lifecycle: [`ShapeStrategy::init`], then [`ShapeStrategy::set_worker_ids`],
/// then [`ShapeStrategy::set_local_worker_id`]. Queries made before all three
/// answer "not ready" instead of failing.
#[derive(Debug, Clone)]
pub struct ShapeStrategy {
    config: StrategyConfig,
    table: Option<PartitionTable>,
    /// Owned cells grown by the interest border, indexed like the table.
    interest_cells: Vec<Vec<Cell>>,
    local: Option<LocalAssignment>,
}

impl ShapeStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            table: None,
            interest_cells: Vec::new(),
            local: None,
        }
    }

    /// Build the partition table. Every geometry problem, including a border
    /// that would collapse a cell, surfaces here.
    pub fn init(&mut self) -> Result<(), PartitionError> {
        self.config.validate()?;
        let table = PartitionTable::build(
            self.config.world_width,
            self.config.world_height,
            &self.config.tessellation,
        )?;
        let border = self.config.interest_border;
        let interest_cells = table
            .groups()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| cell.expand(border))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PartitionError::InvalidInterestBorder { border })?;

        tracing::info!(
            groups = table.group_count(),
            border,
            "shape strategy initialized"
        );
        self.table = Some(table);
        self.interest_cells = interest_cells;
        self.local = None;
        Ok(())
    }

    pub fn set_worker_ids(&mut self, first: WorkerId, last: WorkerId) -> Result<(), PartitionError> {
        let table = self.table.as_mut().ok_or(PartitionError::NotInitialized)?;
        table.bind_worker_ids(first, last)
    }

    /// Record the local worker's identity. An id outside the bound range is
    /// not an error: the worker simulates a layer with no spatial claim.
    pub fn set_local_worker_id(&mut self, worker_id: WorkerId) -> Result<(), PartitionError> {
        let table = self.table.as_ref().ok_or(PartitionError::NotInitialized)?;
        if !table.is_bound() {
            return Err(PartitionError::WorkersUnbound);
        }
        let assignment = match table.group_of_worker(worker_id) {
            Some(group_index) => LocalAssignment {
                worker_id,
                group_index,
                is_group_valid: true,
            },
            None => {
                tracing::info!(%worker_id, "local worker is outside the partition");
                LocalAssignment {
                    worker_id,
                    group_index: table.overflow_group(),
                    is_group_valid: false,
                }
            }
        };
        self.local = Some(assignment);
        Ok(())
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn table(&self) -> Option<&PartitionTable> {
        self.table.as_ref()
    }

    pub fn local_assignment(&self) -> Option<&LocalAssignment> {
        self.local.as_ref()
    }

    /// Owner lookup that reports why no worker was found.
    pub fn try_who_should_have_authority(
        &self,
        entity: &dyn HasPosition,
    ) -> Result<WorkerId, AuthorityError> {
        let table = self.ready_table().ok_or(AuthorityError::NotReady)?;
        let position = entity.planar_position();
        let (group, _cell) = table
            .locate(position)
            .ok_or(AuthorityError::NoOwner(position))?;
        let worker = table
            .worker_for_group(group)
            .ok_or(AuthorityError::NotReady)?;
        tracing::debug!(group, %worker, %position, "resolved owner");
        Ok(worker)
    }

    fn ready_table(&self) -> Option<&PartitionTable> {
        self.table
            .as_ref()
            .filter(|t| t.is_bound() && self.local.is_some())
    }

    /// Local assignment with a spatial claim, or the reason there is none.
    fn claimed_assignment(&self) -> Result<&LocalAssignment, AuthorityError> {
        if !self.is_ready() {
            return Err(AuthorityError::NotReady);
        }
        match &self.local {
            Some(local) if local.is_group_valid => Ok(local),
            Some(local) => Err(AuthorityError::NoSpatialClaim(local.worker_id)),
            None => Err(AuthorityError::NotReady),
        }
    }
}

impl LoadBalanceStrategy for ShapeStrategy {
    fn is_ready(&self) -> bool {
        self.ready_table().is_some()
    }

    fn should_have_authority(&self, entity: &dyn HasPosition) -> bool {
        let Some(table) = self.ready_table() else {
            tracing::warn!("strategy not ready to decide local authority");
            return false;
        };
        match &self.local {
            Some(local) if local.is_group_valid => {
                let position = entity.planar_position();
                table
                    .cells(local.group_index)
                    .iter()
                    .any(|cell| cell.contains(position))
            }
            _ => false,
        }
    }

    fn who_should_have_authority(&self, entity: &dyn HasPosition) -> WorkerId {
        match self.try_who_should_have_authority(entity) {
            Ok(worker) => worker,
            Err(AuthorityError::NoOwner(position)) => {
                tracing::error!(%position, "no worker covers position");
                WorkerId::INVALID
            }
            Err(err) => {
                tracing::warn!(%err, "strategy not ready to decide authority");
                WorkerId::INVALID
            }
        }
    }

    fn worker_interest_query(&self) -> Result<QueryConstraint, AuthorityError> {
        let local = self.claimed_assignment()?;
        let boxes = self.interest_cells[local.group_index]
            .iter()
            .map(|cell| QueryConstraint::Box(BoxConstraint::from_cell(cell)))
            .collect();
        Ok(QueryConstraint::Or(boxes))
    }

    fn worker_entity_position(&self) -> Result<Vec3, AuthorityError> {
        let local = self.claimed_assignment()?;
        let table = self.ready_table().ok_or(AuthorityError::NotReady)?;
        let first = table
            .cells(local.group_index)
            .first()
            .ok_or(AuthorityError::NoSpatialClaim(local.worker_id))?;
        Ok(first.center().extend(0.0))
    }

    fn minimum_required_workers(&self) -> u32 {
        self.config.tessellation.group_count() as u32
    }

    fn virtual_worker_ids(&self) -> BTreeSet<WorkerId> {
        self.table
            .as_ref()
            .map(|t| t.worker_ids().iter().copied().collect())
            .unwrap_or_default()
    }
}
