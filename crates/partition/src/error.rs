use fabric_common::WorkerId;
use glam::Vec2;

/// Configuration-time failures. Raised while building the partition table,
/// never from a per-entity query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartitionError {
    #[error("degenerate cell: min {min} max {max}")]
    DegenerateCell { min: Vec2, max: Vec2 },
    #[error("world extent must be positive, got {width} x {height}")]
    InvalidWorld { width: f32, height: f32 },
    #[error("tessellation needs at least one row and one column, got {rows} x {cols}")]
    EmptyGrid { rows: u32, cols: u32 },
    #[error("{rows} x {cols} grid exceeds the {max} cell limit")]
    GridTooLarge { rows: u32, cols: u32, max: u64 },
    #[error("group map has {actual} entries but the grid has {expected} cells")]
    GroupMapMismatch { expected: usize, actual: usize },
    #[error("group {group} has no cells; groups must be numbered 0..{count} without gaps")]
    EmptyGroup { group: usize, count: usize },
    #[error("cell {cell_a} of group {group_a} overlaps cell {cell_b} of group {group_b}")]
    Overlap {
        group_a: usize,
        cell_a: usize,
        group_b: usize,
        cell_b: usize,
    },
    #[error("worker range {first}..={last} is invalid")]
    InvalidWorkerRange { first: WorkerId, last: WorkerId },
    #[error("worker range provides {provided} ids for {groups} cell groups")]
    WorkerCountMismatch { provided: usize, groups: usize },
    #[error("interest border {border} collapses a cell")]
    InvalidInterestBorder { border: f32 },
    #[error("partition table has not been built")]
    NotInitialized,
    #[error("worker ids have not been bound to the partition table")]
    WorkersUnbound,
}

/// Query-time failures from the authority resolver and interest builder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthorityError {
    #[error("strategy is not ready")]
    NotReady,
    #[error("local worker {0} has no spatial claim")]
    NoSpatialClaim(WorkerId),
    #[error("no cell contains position {0}")]
    NoOwner(Vec2),
}

/// Failures loading a strategy configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] PartitionError),
}
