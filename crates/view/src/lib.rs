//! Worker view: the locally cached copy of the world plus the per-tick delta
//! reduction that keeps it current.
//!
//! # Invariants
//! - Every op lands in at most one delta category; later ops may cancel or
//!   absorb earlier ones.
//! - The view and the emitted delta always agree: replaying a tick's deltas
//!   onto the previous view with [`EntityView::apply_delta`] yields the new
//!   view, and an op that cannot be applied to the view is dropped from both.
//! - Deltas are emitted in the order entities were first touched.
//! - View iteration order is deterministic (BTreeMap).

mod delta;
mod entity_view;
mod op;

pub use delta::{
    AuthorityChange, Change, ComponentChange, EntityDelta, EntityStatus, ViewDelta, classify,
};
pub use entity_view::{EntityView, EntityViewElement, ViewError};
pub use op::{NormalizeError, NormalizedBatch, OpKind, RawOp, WorkerOp, normalize};

pub fn crate_info() -> &'static str {
    "fabric-view v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("view"));
    }
}
