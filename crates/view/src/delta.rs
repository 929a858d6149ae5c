//! Per-tick view deltas.
//!
//! A [`ViewDelta`] is built by folding one batch of [`WorkerOp`]s into the
//! persisted [`EntityView`]. Each entity with a net change gets exactly one
//! [`EntityDelta`], emitted in the order the entity was first touched.
//!
//! Consumers apply an entity delta as: removal, then addition, then
//! component and authority changes (see [`EntityDelta::to_ops`]). Replaying
//! a tick's deltas that way onto the previous view yields the reducer's view.
//! An entity may be both removed and added in the same delta when it left
//! and re-entered the view within one batch.

use fabric_common::{Authority, ComponentData, ComponentId, ComponentUpdate, EntityId};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::entity_view::EntityView;
use crate::op::WorkerOp;

/// A component-level change, one variant per delta category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentChange {
    Add(ComponentData),
    Remove { component_id: ComponentId },
    Update(ComponentUpdate),
    CompleteUpdate(ComponentData),
}

impl ComponentChange {
    pub fn component_id(&self) -> ComponentId {
        match self {
            Self::Add(data) | Self::CompleteUpdate(data) => data.component_id,
            Self::Remove { component_id } => *component_id,
            Self::Update(update) => update.component_id,
        }
    }
}

/// An authority transition for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "component_id", rename_all = "snake_case")]
pub enum AuthorityChange {
    Gained(ComponentId),
    Lost(ComponentId),
    LostTemporarily(ComponentId),
}

impl AuthorityChange {
    pub fn new(component_id: ComponentId, authority: Authority) -> Self {
        match authority {
            Authority::Authoritative => Self::Gained(component_id),
            Authority::NotAuthoritative => Self::Lost(component_id),
            Authority::AuthorityLossImminent => Self::LostTemporarily(component_id),
        }
    }

    pub fn component_id(&self) -> ComponentId {
        match self {
            Self::Gained(id) | Self::Lost(id) | Self::LostTemporarily(id) => *id,
        }
    }
}

/// What a single op means for its entity's delta.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    EntityAdded,
    EntityRemoved,
    Component(ComponentChange),
    Authority(AuthorityChange),
}

/// Map an op onto exactly one delta category.
pub fn classify(op: &WorkerOp) -> Change {
    match op {
        WorkerOp::AddEntity { .. } => Change::EntityAdded,
        WorkerOp::RemoveEntity { .. } => Change::EntityRemoved,
        WorkerOp::AuthorityChange {
            component_id,
            authority,
            ..
        } => Change::Authority(AuthorityChange::new(*component_id, *authority)),
        WorkerOp::AddComponent { data, .. } => Change::Component(ComponentChange::Add(data.clone())),
        WorkerOp::RemoveComponent { component_id, .. } => {
            Change::Component(ComponentChange::Remove {
                component_id: *component_id,
            })
        }
        WorkerOp::ComponentUpdate { update, .. } => {
            Change::Component(ComponentChange::Update(update.clone()))
        }
        WorkerOp::CompleteUpdate { data, .. } => {
            Change::Component(ComponentChange::CompleteUpdate(data.clone()))
        }
    }
}

/// Lifecycle status used when building a delta by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Add,
    Remove,
    Update,
}

/// Summary of everything that happened to one entity during a tick.
///
/// Each list holds at most one entry per component id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDelta {
    pub entity_id: EntityId,
    pub added: bool,
    pub removed: bool,
    pub components_added: Vec<ComponentData>,
    pub components_removed: Vec<ComponentId>,
    pub components_updated: Vec<ComponentUpdate>,
    pub components_refreshed: Vec<ComponentData>,
    pub authority_gained: Vec<ComponentId>,
    pub authority_lost: Vec<ComponentId>,
    pub authority_lost_temporarily: Vec<ComponentId>,
}

impl EntityDelta {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            added: false,
            removed: false,
            components_added: Vec::new(),
            components_removed: Vec::new(),
            components_updated: Vec::new(),
            components_refreshed: Vec::new(),
            authority_gained: Vec::new(),
            authority_lost: Vec::new(),
            authority_lost_temporarily: Vec::new(),
        }
    }

    /// Build a delta from loose changes, routed with the same rules the
    /// reducer uses.
    pub fn from_changes(
        entity_id: EntityId,
        status: EntityStatus,
        components: impl IntoIterator<Item = ComponentChange>,
        authority: impl IntoIterator<Item = AuthorityChange>,
    ) -> Self {
        let mut delta = Self::new(entity_id);
        match status {
            EntityStatus::Add => delta.record(Change::EntityAdded),
            EntityStatus::Remove => delta.record(Change::EntityRemoved),
            EntityStatus::Update => {}
        }
        for change in components {
            delta.record(Change::Component(change));
        }
        for change in authority {
            delta.record(Change::Authority(change));
        }
        delta
    }

    /// Fold one change into the delta, keeping it equal to the net effect of
    /// every change recorded so far when replayed in [`EntityDelta::to_ops`]
    /// order.
    ///
    /// - Removing the entity drops all pending component and authority
    ///   changes. Removing an entity added earlier in the same batch cancels
    ///   the add.
    /// - Removing a component drops its pending add, update, refresh and
    ///   authority entries. If the add was the only trace of the component,
    ///   the removal is dropped too.
    /// - A refresh supersedes pending updates; a later update is folded into
    ///   the pending refresh.
    /// - A repeated add or refresh keeps the latest data, repeated updates
    ///   merge field by field, and each component keeps only its latest
    ///   authority state.
    pub fn record(&mut self, change: Change) {
        match change {
            Change::EntityAdded => self.added = true,
            Change::EntityRemoved => {
                self.clear_changes();
                if self.added {
                    self.added = false;
                } else {
                    self.removed = true;
                }
            }
            Change::Component(ComponentChange::Add(data)) => {
                upsert(&mut self.components_added, data, |d| d.component_id, |old, new| *old = new);
            }
            Change::Component(ComponentChange::Remove { component_id }) => {
                let was_added = self.components_added.iter().any(|d| d.component_id == component_id);
                self.components_added.retain(|d| d.component_id != component_id);
                self.components_updated.retain(|u| u.component_id != component_id);
                self.components_refreshed.retain(|d| d.component_id != component_id);
                self.forget_authority(component_id);
                if !was_added {
                    upsert_id(&mut self.components_removed, component_id);
                }
            }
            Change::Component(ComponentChange::Update(update)) => {
                if let Some(refresh) = self
                    .components_refreshed
                    .iter_mut()
                    .find(|d| d.component_id == update.component_id)
                {
                    refresh.apply_update(&update);
                    return;
                }
                upsert(
                    &mut self.components_updated,
                    update,
                    |u| u.component_id,
                    |old, new| old.merge(&new),
                );
            }
            Change::Component(ComponentChange::CompleteUpdate(data)) => {
                self.components_updated.retain(|u| u.component_id != data.component_id);
                upsert(&mut self.components_refreshed, data, |d| d.component_id, |old, new| *old = new);
            }
            Change::Authority(change) => {
                let id = change.component_id();
                self.forget_authority(id);
                match change {
                    AuthorityChange::Gained(_) => self.authority_gained.push(id),
                    AuthorityChange::Lost(_) => self.authority_lost.push(id),
                    AuthorityChange::LostTemporarily(_) => self.authority_lost_temporarily.push(id),
                }
            }
        }
    }

    /// The delta as ops, in the order a consumer applies it: entity removal,
    /// entity addition, component removals, additions, updates, refreshes,
    /// then authority.
    pub fn to_ops(&self) -> Vec<WorkerOp> {
        let entity_id = self.entity_id;
        let authority = |ids: &[ComponentId], state: Authority| {
            ids.iter()
                .map(move |&component_id| WorkerOp::AuthorityChange {
                    entity_id,
                    component_id,
                    authority: state,
                })
                .collect::<Vec<_>>()
        };

        let mut ops = Vec::new();
        if self.removed {
            ops.push(WorkerOp::RemoveEntity { entity_id });
        }
        if self.added {
            ops.push(WorkerOp::AddEntity { entity_id });
        }
        ops.extend(self.components_removed.iter().map(|&component_id| {
            WorkerOp::RemoveComponent {
                entity_id,
                component_id,
            }
        }));
        ops.extend(self.components_added.iter().map(|data| WorkerOp::AddComponent {
            entity_id,
            data: data.clone(),
        }));
        ops.extend(self.components_updated.iter().map(|update| WorkerOp::ComponentUpdate {
            entity_id,
            update: update.clone(),
        }));
        ops.extend(self.components_refreshed.iter().map(|data| WorkerOp::CompleteUpdate {
            entity_id,
            data: data.clone(),
        }));
        ops.extend(authority(&self.authority_gained, Authority::Authoritative));
        ops.extend(authority(&self.authority_lost, Authority::NotAuthoritative));
        ops.extend(authority(
            &self.authority_lost_temporarily,
            Authority::AuthorityLossImminent,
        ));
        ops
    }

    fn clear_changes(&mut self) {
        self.components_added.clear();
        self.components_removed.clear();
        self.components_updated.clear();
        self.components_refreshed.clear();
        self.authority_gained.clear();
        self.authority_lost.clear();
        self.authority_lost_temporarily.clear();
    }

    fn forget_authority(&mut self, id: ComponentId) {
        self.authority_gained.retain(|c| *c != id);
        self.authority_lost.retain(|c| *c != id);
        self.authority_lost_temporarily.retain(|c| *c != id);
    }

    /// True when nothing beyond the entity id was recorded.
    pub fn is_empty(&self) -> bool {
        !self.added
            && !self.removed
            && self.components_added.is_empty()
            && self.components_removed.is_empty()
            && self.components_updated.is_empty()
            && self.components_refreshed.is_empty()
            && self.authority_gained.is_empty()
            && self.authority_lost.is_empty()
            && self.authority_lost_temporarily.is_empty()
    }

    /// Compare by entity id, flags, and each category as a set of
    /// component ids. Payloads and list order are ignored.
    pub fn is_equivalent(&self, other: &EntityDelta) -> bool {
        fn ids<T>(items: &[T], id: impl Fn(&T) -> ComponentId) -> BTreeSet<ComponentId> {
            items.iter().map(id).collect()
        }
        let copy = |id: &ComponentId| *id;

        self.entity_id == other.entity_id
            && self.added == other.added
            && self.removed == other.removed
            && ids(&self.components_added, |d| d.component_id)
                == ids(&other.components_added, |d| d.component_id)
            && ids(&self.components_removed, copy) == ids(&other.components_removed, copy)
            && ids(&self.components_updated, |u| u.component_id)
                == ids(&other.components_updated, |u| u.component_id)
            && ids(&self.components_refreshed, |d| d.component_id)
                == ids(&other.components_refreshed, |d| d.component_id)
            && ids(&self.authority_gained, copy) == ids(&other.authority_gained, copy)
            && ids(&self.authority_lost, copy) == ids(&other.authority_lost, copy)
            && ids(&self.authority_lost_temporarily, copy)
                == ids(&other.authority_lost_temporarily, copy)
    }
}

fn upsert<T>(
    items: &mut Vec<T>,
    item: T,
    id: impl Fn(&T) -> ComponentId,
    combine: impl FnOnce(&mut T, T),
) {
    let key = id(&item);
    match items.iter_mut().find(|existing| id(&**existing) == key) {
        Some(existing) => combine(existing, item),
        None => items.push(item),
    }
}

fn upsert_id(ids: &mut Vec<ComponentId>, id: ComponentId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// All entity deltas for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewDelta {
    entity_deltas: Vec<EntityDelta>,
    /// Ops that did not fit the view and were dropped.
    #[serde(skip)]
    discarded_ops: usize,
}

impl ViewDelta {
    pub fn new(entity_deltas: Vec<EntityDelta>) -> Self {
        Self {
            entity_deltas,
            discarded_ops: 0,
        }
    }

    /// Reduce `ops` against `view`, mutating the view to the post-batch state.
    pub fn from_ops(ops: &[WorkerOp], view: &mut EntityView) -> Self {
        let mut delta = Self::default();
        delta.set_from_ops(ops, view);
        delta
    }

    /// Replace the contents of this delta with the reduction of `ops`.
    ///
    /// An op that cannot be applied to the view (unknown entity, duplicate
    /// add, missing component) is dropped with a warning and leaves no trace
    /// in either the view or the delta. The rest of the batch is unaffected.
    /// Entities whose ops cancel out (added then removed, say) get no delta.
    pub fn set_from_ops(&mut self, ops: &[WorkerOp], view: &mut EntityView) {
        let _span = tracing::info_span!("reduce_ops", ops = ops.len()).entered();
        self.entity_deltas.clear();
        self.discarded_ops = 0;

        let mut slots: HashMap<EntityId, usize> = HashMap::new();
        for op in ops {
            let entity_id = op.entity_id();
            if let Err(err) = view.apply(op) {
                tracing::warn!(kind = ?op.kind(), %err, "discarding op that does not fit the view");
                self.discarded_ops += 1;
                continue;
            }
            let slot = *slots.entry(entity_id).or_insert_with(|| {
                self.entity_deltas.push(EntityDelta::new(entity_id));
                self.entity_deltas.len() - 1
            });
            self.entity_deltas[slot].record(classify(op));
        }
        self.entity_deltas.retain(|d| !d.is_empty());

        tracing::trace!(
            entities = self.entity_deltas.len(),
            discarded = self.discarded_ops,
            view_size = view.len(),
            "reduction complete"
        );
    }

    pub fn entity_deltas(&self) -> &[EntityDelta] {
        &self.entity_deltas
    }

    pub fn into_entity_deltas(self) -> Vec<EntityDelta> {
        self.entity_deltas
    }

    pub fn discarded_ops(&self) -> usize {
        self.discarded_ops
    }

    pub fn is_empty(&self) -> bool {
        self.entity_deltas.is_empty()
    }

    /// Entity deltas compared pairwise in order with
    /// [`EntityDelta::is_equivalent`].
    pub fn is_equivalent(&self, other: &ViewDelta) -> bool {
        self.entity_deltas.len() == other.entity_deltas.len()
            && self
                .entity_deltas
                .iter()
                .zip(&other.entity_deltas)
                .all(|(a, b)| a.is_equivalent(b))
    }
}
