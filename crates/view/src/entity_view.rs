use fabric_common::{Authority, ComponentData, ComponentId, EntityId};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::delta::EntityDelta;
use crate::op::WorkerOp;

/// Everything the worker has received about one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityViewElement {
    pub components: BTreeMap<ComponentId, ComponentData>,
    pub authority: BTreeMap<ComponentId, Authority>,
}

/// Why an op could not be applied to the view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("{0} is not in the view")]
    EntityMissing(EntityId),
    #[error("{0} is already in the view")]
    EntityExists(EntityId),
    #[error("{entity} has no component {component:?}")]
    ComponentMissing {
        entity: EntityId,
        component: ComponentId,
    },
    #[error("{entity} already has component {component:?}")]
    ComponentExists {
        entity: EntityId,
        component: ComponentId,
    },
}

/// The worker's local cache of the world, keyed by entity.
///
/// Uses BTreeMap so iteration and serialized output are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityView {
    entities: BTreeMap<EntityId, EntityViewElement>,
}

impl EntityView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&EntityViewElement> {
        self.entities.get(&entity)
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, EntityViewElement> {
        &self.entities
    }

    /// Insert or replace an element directly, bypassing op validation.
    pub fn insert(&mut self, entity: EntityId, element: EntityViewElement) {
        self.entities.insert(entity, element);
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Apply one op. On error the view is left unchanged.
    pub fn apply(&mut self, op: &WorkerOp) -> Result<(), ViewError> {
        match op {
            WorkerOp::AddEntity { entity_id } => {
                if self.entities.contains_key(entity_id) {
                    return Err(ViewError::EntityExists(*entity_id));
                }
                self.entities.insert(*entity_id, EntityViewElement::default());
            }
            WorkerOp::RemoveEntity { entity_id } => {
                self.entities
                    .remove(entity_id)
                    .ok_or(ViewError::EntityMissing(*entity_id))?;
            }
            WorkerOp::AuthorityChange {
                entity_id,
                component_id,
                authority,
            } => {
                self.element_mut(*entity_id)?
                    .authority
                    .insert(*component_id, *authority);
            }
            WorkerOp::AddComponent { entity_id, data } => {
                let element = self.element_mut(*entity_id)?;
                if element.components.contains_key(&data.component_id) {
                    return Err(ViewError::ComponentExists {
                        entity: *entity_id,
                        component: data.component_id,
                    });
                }
                element.components.insert(data.component_id, data.clone());
            }
            WorkerOp::RemoveComponent {
                entity_id,
                component_id,
            } => {
                let element = self.element_mut(*entity_id)?;
                element
                    .components
                    .remove(component_id)
                    .ok_or(ViewError::ComponentMissing {
                        entity: *entity_id,
                        component: *component_id,
                    })?;
                element.authority.remove(component_id);
            }
            WorkerOp::ComponentUpdate { entity_id, update } => {
                self.component_mut(*entity_id, update.component_id)?
                    .apply_update(update);
            }
            WorkerOp::CompleteUpdate { entity_id, data } => {
                *self.component_mut(*entity_id, data.component_id)? = data.clone();
            }
        }
        Ok(())
    }

    /// Apply an entity delta in consumer order. On error the view is left
    /// unchanged.
    pub fn apply_delta(&mut self, delta: &EntityDelta) -> Result<(), ViewError> {
        let id = delta.entity_id;
        let mut scratch = EntityView::new();
        if let Some(element) = self.entities.get(&id) {
            scratch.insert(id, element.clone());
        }
        for op in delta.to_ops() {
            scratch.apply(&op)?;
        }
        match scratch.entities.remove(&id) {
            Some(element) => self.entities.insert(id, element),
            None => self.entities.remove(&id),
        };
        Ok(())
    }

    fn element_mut(&mut self, entity: EntityId) -> Result<&mut EntityViewElement, ViewError> {
        self.entities
            .get_mut(&entity)
            .ok_or(ViewError::EntityMissing(entity))
    }

    fn component_mut(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> Result<&mut ComponentData, ViewError> {
        self.element_mut(entity)?
            .components
            .get_mut(&component)
            .ok_or(ViewError::ComponentMissing { entity, component })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::ComponentUpdate;

    fn data(id: u32, value: i64) -> ComponentData {
        ComponentData::new(ComponentId(id)).with_field(1, value)
    }

    #[test]
    fn entity_lifecycle() {
        let mut view = EntityView::new();
        view.apply(&WorkerOp::add_entity(2)).unwrap();
        assert!(view.contains(EntityId(2)));
        assert_eq!(view.get(EntityId(2)), Some(&EntityViewElement::default()));

        assert_eq!(
            view.apply(&WorkerOp::add_entity(2)),
            Err(ViewError::EntityExists(EntityId(2)))
        );
        view.apply(&WorkerOp::remove_entity(2)).unwrap();
        assert!(view.is_empty());
        assert_eq!(
            view.apply(&WorkerOp::remove_entity(2)),
            Err(ViewError::EntityMissing(EntityId(2)))
        );
    }

    #[test]
    fn component_ops_mutate_in_place() {
        let mut view = EntityView::new();
        view.apply(&WorkerOp::add_entity(1)).unwrap();
        view.apply(&WorkerOp::add_component(1, data(10, 20))).unwrap();
        view.apply(&WorkerOp::component_update(
            1,
            ComponentUpdate::new(ComponentId(10)).with_field(2, "x"),
        ))
        .unwrap();

        let stored = &view.get(EntityId(1)).unwrap().components[&ComponentId(10)];
        assert_eq!(stored.fields[&1], serde_json::json!(20));
        assert_eq!(stored.fields[&2], serde_json::json!("x"));

        view.apply(&WorkerOp::complete_update(1, data(10, 99))).unwrap();
        let stored = &view.get(EntityId(1)).unwrap().components[&ComponentId(10)];
        assert_eq!(stored, &data(10, 99));
    }

    #[test]
    fn remove_component_clears_authority() {
        let mut view = EntityView::new();
        view.apply(&WorkerOp::add_entity(1)).unwrap();
        view.apply(&WorkerOp::add_component(1, data(10, 0))).unwrap();
        view.apply(&WorkerOp::authority_change(1, 10, Authority::Authoritative))
            .unwrap();
        assert_eq!(
            view.get(EntityId(1)).unwrap().authority[&ComponentId(10)],
            Authority::Authoritative
        );
        view.apply(&WorkerOp::remove_component(1, 10)).unwrap();
        assert!(view.get(EntityId(1)).unwrap().authority.is_empty());
    }

    #[test]
    fn delta_replay_is_atomic() {
        let mut view = EntityView::new();
        view.apply(&WorkerOp::add_entity(1)).unwrap();
        let before = view.clone();

        let mut delta = EntityDelta::new(EntityId(1));
        delta.components_added.push(data(4, 1));
        delta.components_removed.push(ComponentId(5));
        assert_eq!(
            view.apply_delta(&delta),
            Err(ViewError::ComponentMissing {
                entity: EntityId(1),
                component: ComponentId(5)
            })
        );
        assert_eq!(view, before);

        delta.components_removed.clear();
        view.apply_delta(&delta).unwrap();
        assert!(view.get(EntityId(1)).unwrap().components.contains_key(&ComponentId(4)));
    }

    #[test]
    fn ops_on_missing_targets_leave_view_unchanged() {
        let mut view = EntityView::new();
        view.apply(&WorkerOp::add_entity(1)).unwrap();
        let before = view.clone();

        assert!(view.apply(&WorkerOp::add_component(7, data(1, 0))).is_err());
        assert!(view.apply(&WorkerOp::remove_component(1, 3)).is_err());
        assert!(view
            .apply(&WorkerOp::component_update(1, ComponentUpdate::new(ComponentId(3))))
            .is_err());
        assert!(view.apply(&WorkerOp::complete_update(1, data(3, 0))).is_err());
        assert_eq!(view, before);
    }
}
