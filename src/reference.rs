//! Tagged references to tracked objects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityType};

/// What kind of object a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// A real, loaded entity.
    Real,
    /// A lazy proxy, resolved or not.
    Proxy,
}

/// Non-owning handle to the single tracked object for `(entity_type, id)`.
///
/// The identity map owns the object; a reference is resolved against the
/// [`EntityManager`](crate::EntityManager) that issued it. A proxy's reference
/// stays equal to itself across resolution, so holders of an early
/// `get_reference` result see the loaded data through the same handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    kind: RefKind,
    entity_type: EntityType,
    id: EntityId,
}

impl EntityRef {
    pub(crate) const fn new(kind: RefKind, entity_type: EntityType, id: EntityId) -> Self {
        Self {
            kind,
            entity_type,
            id,
        }
    }

    /// Real or proxy.
    #[must_use]
    pub const fn kind(&self) -> RefKind {
        self.kind
    }

    /// Entity type of the referenced record.
    #[must_use]
    pub const fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Id of the referenced record.
    #[must_use]
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// True for proxy references.
    #[must_use]
    pub const fn is_proxy(&self) -> bool {
        matches!(self.kind, RefKind::Proxy)
    }

    /// Kind check that does not distinguish proxies from real entities.
    #[must_use]
    pub fn is_a(&self, entity_type: &EntityType) -> bool {
        &self.entity_type == entity_type
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RefKind::Real => write!(f, "{}#{}", self.entity_type, self.id),
            RefKind::Proxy => write!(f, "{}#{} (proxy)", self.entity_type, self.id),
        }
    }
}
