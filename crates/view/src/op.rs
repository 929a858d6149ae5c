use fabric_common::{
    Authority, ComponentData, ComponentId, ComponentUpdate, EntityId, FieldId, UnknownAuthority,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Atomic change notification, strongly typed.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOp {
    AddEntity {
        entity_id: EntityId,
    },
    RemoveEntity {
        entity_id: EntityId,
    },
    AuthorityChange {
        entity_id: EntityId,
        component_id: ComponentId,
        authority: Authority,
    },
    AddComponent {
        entity_id: EntityId,
        data: ComponentData,
    },
    RemoveComponent {
        entity_id: EntityId,
        component_id: ComponentId,
    },
    ComponentUpdate {
        entity_id: EntityId,
        update: ComponentUpdate,
    },
    /// Full replacement of a component's state.
    CompleteUpdate {
        entity_id: EntityId,
        data: ComponentData,
    },
}

impl WorkerOp {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::AddEntity { entity_id }
            | Self::RemoveEntity { entity_id }
            | Self::AuthorityChange { entity_id, .. }
            | Self::AddComponent { entity_id, .. }
            | Self::RemoveComponent { entity_id, .. }
            | Self::ComponentUpdate { entity_id, .. }
            | Self::CompleteUpdate { entity_id, .. } => *entity_id,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Self::AddEntity { .. } => OpKind::AddEntity,
            Self::RemoveEntity { .. } => OpKind::RemoveEntity,
            Self::AuthorityChange { .. } => OpKind::AuthorityChange,
            Self::AddComponent { .. } => OpKind::AddComponent,
            Self::RemoveComponent { .. } => OpKind::RemoveComponent,
            Self::ComponentUpdate { .. } => OpKind::ComponentUpdate,
            Self::CompleteUpdate { .. } => OpKind::CompleteUpdate,
        }
    }

    pub fn add_entity(entity_id: i64) -> Self {
        Self::AddEntity {
            entity_id: EntityId(entity_id),
        }
    }

    pub fn remove_entity(entity_id: i64) -> Self {
        Self::RemoveEntity {
            entity_id: EntityId(entity_id),
        }
    }

    pub fn authority_change(entity_id: i64, component_id: u32, authority: Authority) -> Self {
        Self::AuthorityChange {
            entity_id: EntityId(entity_id),
            component_id: ComponentId(component_id),
            authority,
        }
    }

    pub fn add_component(entity_id: i64, data: ComponentData) -> Self {
        Self::AddComponent {
            entity_id: EntityId(entity_id),
            data,
        }
    }

    pub fn remove_component(entity_id: i64, component_id: u32) -> Self {
        Self::RemoveComponent {
            entity_id: EntityId(entity_id),
            component_id: ComponentId(component_id),
        }
    }

    pub fn component_update(entity_id: i64, update: ComponentUpdate) -> Self {
        Self::ComponentUpdate {
            entity_id: EntityId(entity_id),
            update,
        }
    }

    pub fn complete_update(entity_id: i64, data: ComponentData) -> Self {
        Self::CompleteUpdate {
            entity_id: EntityId(entity_id),
            data,
        }
    }
}

/// The op kinds the reducer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    AddEntity,
    RemoveEntity,
    AuthorityChange,
    AddComponent,
    RemoveComponent,
    ComponentUpdate,
    CompleteUpdate,
}

impl std::str::FromStr for OpKind {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "add_entity" => Self::AddEntity,
            "remove_entity" => Self::RemoveEntity,
            "authority_change" => Self::AuthorityChange,
            "add_component" => Self::AddComponent,
            "remove_component" => Self::RemoveComponent,
            "component_update" => Self::ComponentUpdate,
            "complete_update" => Self::CompleteUpdate,
            other => return Err(NormalizeError::UnknownKind(other.to_owned())),
        })
    }
}

/// Op as handed over by the transport layer, before any typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOp {
    pub kind: String,
    pub entity_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<FieldId, serde_json::Value>>,
    /// Wire authority code: 0 not authoritative, 1 authoritative, 2 loss imminent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<u8>,
}

/// Why a raw op could not be typed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unknown op kind {0:?}")]
    UnknownKind(String),
    #[error("{0:?} op is missing its component id")]
    MissingComponentId(OpKind),
    #[error("authority change is missing its authority code")]
    MissingAuthority,
    #[error(transparent)]
    UnknownAuthority(#[from] UnknownAuthority),
}

impl RawOp {
    pub fn to_worker_op(&self) -> Result<WorkerOp, NormalizeError> {
        let kind: OpKind = self.kind.parse()?;
        let entity_id = EntityId(self.entity_id);
        let component_id = || {
            self.component_id
                .map(ComponentId)
                .ok_or(NormalizeError::MissingComponentId(kind))
        };
        let fields = || self.fields.clone().unwrap_or_default();

        Ok(match kind {
            OpKind::AddEntity => WorkerOp::AddEntity { entity_id },
            OpKind::RemoveEntity => WorkerOp::RemoveEntity { entity_id },
            OpKind::AuthorityChange => {
                let code = self.authority.ok_or(NormalizeError::MissingAuthority)?;
                WorkerOp::AuthorityChange {
                    entity_id,
                    component_id: component_id()?,
                    authority: Authority::try_from(code)?,
                }
            }
            OpKind::AddComponent => WorkerOp::AddComponent {
                entity_id,
                data: ComponentData {
                    component_id: component_id()?,
                    fields: fields(),
                },
            },
            OpKind::RemoveComponent => WorkerOp::RemoveComponent {
                entity_id,
                component_id: component_id()?,
            },
            OpKind::ComponentUpdate => WorkerOp::ComponentUpdate {
                entity_id,
                update: ComponentUpdate {
                    component_id: component_id()?,
                    fields: fields(),
                },
            },
            OpKind::CompleteUpdate => WorkerOp::CompleteUpdate {
                entity_id,
                data: ComponentData {
                    component_id: component_id()?,
                    fields: fields(),
                },
            },
        })
    }
}

/// Result of typing one raw batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Typed ops, in input order.
    pub ops: Vec<WorkerOp>,
    /// Index into the raw batch and reason for every op that was dropped.
    pub rejected: Vec<(usize, NormalizeError)>,
}

/// Type a raw batch. Ops that cannot be typed are dropped with a warning;
/// the rest of the batch is kept in order.
pub fn normalize(raw: &[RawOp]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, op) in raw.iter().enumerate() {
        match op.to_worker_op() {
            Ok(typed) => batch.ops.push(typed),
            Err(err) => {
                tracing::warn!(index, entity = op.entity_id, %err, "discarding op");
                batch.rejected.push((index, err));
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str, entity_id: i64) -> RawOp {
        RawOp {
            kind: kind.to_owned(),
            entity_id,
            component_id: None,
            fields: None,
            authority: None,
        }
    }

    #[test]
    fn keeps_order_and_content() {
        let mut add_component = raw("add_component", 1);
        add_component.component_id = Some(54);
        add_component.fields = Some(BTreeMap::from([(1, serde_json::json!(20))]));
        let batch = normalize(&[raw("add_entity", 1), add_component, raw("remove_entity", 1)]);

        assert!(batch.rejected.is_empty());
        assert_eq!(
            batch.ops,
            vec![
                WorkerOp::add_entity(1),
                WorkerOp::add_component(1, ComponentData::new(ComponentId(54)).with_field(1, 20)),
                WorkerOp::remove_entity(1),
            ]
        );
    }

    #[test]
    fn unknown_kind_does_not_abort_batch() {
        let batch = normalize(&[raw("add_entity", 1), raw("teleport", 1), raw("add_entity", 2)]);
        assert_eq!(batch.ops, vec![WorkerOp::add_entity(1), WorkerOp::add_entity(2)]);
        assert_eq!(
            batch.rejected,
            vec![(1, NormalizeError::UnknownKind("teleport".into()))]
        );
    }

    #[test]
    fn missing_payloads_are_rejected() {
        let mut bad_authority = raw("authority_change", 3);
        bad_authority.component_id = Some(4);
        bad_authority.authority = Some(7);
        let batch = normalize(&[raw("remove_component", 3), bad_authority, raw("authority_change", 3)]);

        assert!(batch.ops.is_empty());
        assert_eq!(
            batch.rejected[0].1,
            NormalizeError::MissingComponentId(OpKind::RemoveComponent)
        );
        assert_eq!(
            batch.rejected[1].1,
            NormalizeError::UnknownAuthority(UnknownAuthority(7))
        );
        assert_eq!(batch.rejected[2].1, NormalizeError::MissingAuthority);
    }

    #[test]
    fn authority_codes_map_to_states() {
        let mut op = raw("authority_change", 9);
        op.component_id = Some(2);
        op.authority = Some(2);
        assert_eq!(
            op.to_worker_op(),
            Ok(WorkerOp::authority_change(9, 2, Authority::AuthorityLossImminent))
        );
    }

    #[test]
    fn raw_ops_parse_from_json() {
        let ops: Vec<RawOp> = serde_json::from_str(
            r#"[{"kind": "add_entity", "entity_id": 5},
                {"kind": "component_update", "entity_id": 5, "component_id": 1, "fields": {"2": 3.5}}]"#,
        )
        .unwrap();
        let batch = normalize(&ops);
        assert_eq!(batch.ops.len(), 2);
        assert_eq!(batch.ops[1].kind(), OpKind::ComponentUpdate);
        assert_eq!(batch.ops[1].entity_id(), EntityId(5));
    }
}
