//! Shared identifiers and value types used by the partitioning strategy and the
//! view reducer.
//!
//! # Invariants
//! - `WorkerId::INVALID` never names a real worker.
//! - Component payloads are plain field maps; schema compilation lives elsewhere.

mod types;

pub use types::{
    Authority, ComponentData, ComponentId, ComponentUpdate, EntityId, FieldId, HasPosition,
    UnknownAuthority, WorkerId,
};

pub fn crate_info() -> &'static str {
    "fabric-common v0.1.0"
}
