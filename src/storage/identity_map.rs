//! Per-type identity map.

use std::collections::HashMap;

use crate::entity::{Entity, EntityId, EntityType};
use crate::proxy::Proxy;
use crate::reference::{EntityRef, RefKind};

/// The single object tracked for an id: a real entity or a proxy.
#[derive(Debug)]
pub enum Tracked {
    /// A loaded entity.
    Real(Entity),
    /// A proxy, resolved or not.
    Proxy(Proxy),
}

impl Tracked {
    /// Tag used in references to this object.
    #[must_use]
    pub const fn kind(&self) -> RefKind {
        match self {
            Self::Real(_) => RefKind::Real,
            Self::Proxy(_) => RefKind::Proxy,
        }
    }

    /// Id of the tracked object.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Real(entity) => entity.id(),
            Self::Proxy(proxy) => proxy.id(),
        }
    }

    /// Loaded data behind this object, if any.
    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Real(entity) => Some(entity),
            Self::Proxy(proxy) => proxy.delegate(),
        }
    }
}

/// Map from id to the one tracked object of an entity type, in insertion order.
#[derive(Debug)]
pub struct IdentityMap {
    entity_type: EntityType,
    by_id: HashMap<EntityId, Tracked>,
    order: Vec<EntityId>,
}

impl IdentityMap {
    /// Creates an empty map for `entity_type`.
    #[must_use]
    pub fn with_capacity(entity_type: EntityType, capacity: usize) -> Self {
        Self {
            entity_type,
            by_id: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    /// Entity type tracked by this map.
    #[must_use]
    pub const fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Tracked object for `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Tracked> {
        self.by_id.get(id)
    }

    /// Mutable tracked object for `id`.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Tracked> {
        self.by_id.get_mut(id)
    }

    /// True if `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Starts tracking `object`. When its id is already tracked the map is
    /// left unchanged and `false` is returned.
    pub fn insert(&mut self, object: Tracked) -> bool {
        let id = object.id().clone();
        if self.by_id.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.by_id.insert(id, object);
        true
    }

    /// Tracked objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tracked> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// References to every tracked object, in insertion order.
    #[must_use]
    pub fn refs(&self) -> Vec<EntityRef> {
        self.iter()
            .map(|t| EntityRef::new(t.kind(), self.entity_type.clone(), t.id().clone()))
            .collect()
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
