use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an entity in the shared world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identifier of a component schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

/// Identity of one participant worker in the simulation.
///
/// Zero is reserved as the invalid sentinel, handed back when no worker can
/// be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl WorkerId {
    pub const INVALID: WorkerId = WorkerId(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "worker#{}", self.0)
        } else {
            write!(f, "worker#invalid")
        }
    }
}

/// Field number inside a component schema.
pub type FieldId = u32;

/// Authority a worker holds over one component of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    NotAuthoritative,
    Authoritative,
    AuthorityLossImminent,
}

/// Raised when a wire authority code is outside the known range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authority code {0}")]
pub struct UnknownAuthority(pub u8);

impl TryFrom<u8> for Authority {
    type Error = UnknownAuthority;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::NotAuthoritative),
            1 => Ok(Self::Authoritative),
            2 => Ok(Self::AuthorityLossImminent),
            other => Err(UnknownAuthority(other)),
        }
    }
}

/// Full state of one component: the schema id plus its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentData {
    pub component_id: ComponentId,
    #[serde(default)]
    pub fields: BTreeMap<FieldId, serde_json::Value>,
}

impl ComponentData {
    pub fn new(component_id: ComponentId) -> Self {
        Self {
            component_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: FieldId, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Overwrite the fields carried by `update`, leaving the rest untouched.
    pub fn apply_update(&mut self, update: &ComponentUpdate) {
        debug_assert_eq!(self.component_id, update.component_id);
        for (field, value) in &update.fields {
            self.fields.insert(*field, value.clone());
        }
    }
}

/// Partial change to a component: only the listed fields are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub component_id: ComponentId,
    #[serde(default)]
    pub fields: BTreeMap<FieldId, serde_json::Value>,
}

impl ComponentUpdate {
    pub fn new(component_id: ComponentId) -> Self {
        Self {
            component_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: FieldId, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Fold a later update into this one. Fields in `later` win.
    pub fn merge(&mut self, later: &ComponentUpdate) {
        for (field, value) in &later.fields {
            self.fields.insert(*field, value.clone());
        }
    }
}

/// Anything the partitioning layer can place in world space.
///
/// Only X and Y take part in spatial decisions; Z is ignored.
pub trait HasPosition {
    fn spatial_position(&self) -> Vec3;

    fn planar_position(&self) -> Vec2 {
        self.spatial_position().truncate()
    }
}

impl HasPosition for Vec3 {
    fn spatial_position(&self) -> Vec3 {
        *self
    }
}

impl HasPosition for [f32; 3] {
    fn spatial_position(&self) -> Vec3 {
        Vec3::from_array(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_worker_sentinel() {
        assert!(!WorkerId::INVALID.is_valid());
        assert!(WorkerId(1).is_valid());
        assert_eq!(WorkerId::INVALID.to_string(), "worker#invalid");
    }

    #[test]
    fn authority_codes() {
        assert_eq!(Authority::try_from(1), Ok(Authority::Authoritative));
        assert_eq!(Authority::try_from(2), Ok(Authority::AuthorityLossImminent));
        assert_eq!(Authority::try_from(9), Err(UnknownAuthority(9)));
    }

    #[test]
    fn update_overwrites_only_listed_fields() {
        let mut data = ComponentData::new(ComponentId(7))
            .with_field(1, 10)
            .with_field(2, "name");
        data.apply_update(&ComponentUpdate::new(ComponentId(7)).with_field(1, 20));
        assert_eq!(data.fields[&1], serde_json::json!(20));
        assert_eq!(data.fields[&2], serde_json::json!("name"));
    }

    #[test]
    fn later_update_wins_on_merge() {
        let mut first = ComponentUpdate::new(ComponentId(3))
            .with_field(1, 1)
            .with_field(2, 2);
        first.merge(&ComponentUpdate::new(ComponentId(3)).with_field(2, 5));
        assert_eq!(first.fields[&1], serde_json::json!(1));
        assert_eq!(first.fields[&2], serde_json::json!(5));
    }

    #[test]
    fn planar_position_drops_z() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(p.planar_position(), Vec2::new(1.0, 2.0));
        assert_eq!([4.0, 5.0, 6.0].planar_position(), Vec2::new(4.0, 5.0));
    }
}
