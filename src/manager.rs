//! The entity manager.
//!
//! [`EntityManager`] is the session object that owns one identity map per
//! registered entity type. It builds entities from raw records, hands out
//! proxies for ids that are referenced before they are loaded, and resolves
//! those proxies in place once the data arrives. Callers only ever hold
//! [`EntityRef`]s and go through the manager to read or write.
//!
//! # Examples
//!
//! ```
//! use kyromap::{record, transform, EntityManager, PropertyDefinition, Schema, Value};
//!
//! let mut manager = EntityManager::new();
//! let user = manager.register(
//!     Schema::builder("User")
//!         .property(PropertyDefinition::new("id").codec(transform::identity()))
//!         .property(PropertyDefinition::new("name").codec(transform::identity()))
//!         .build()?,
//! )?;
//!
//! let proxy = manager.get_reference(&user, 7)?;
//! assert_eq!(manager.read(&proxy, "id")?, &Value::Int(7));
//!
//! let loaded = manager.construct(&user, &record! { "id" => 7, "name" => "Ann" })?;
//! assert_eq!(loaded, proxy);
//! assert_eq!(manager.read(&proxy, "name")?, &Value::from("Ann"));
//! assert_eq!(manager.to_array(&proxy)?, record! { "id" => 7, "name" => "Ann" });
//! # Ok::<(), kyromap::MapError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::ManagerConfig;
use crate::entity::{Entity, EntityId, EntityType};
use crate::error::{EntityError, MapError, MapResult, SchemaError};
use crate::hooks::{EntityHooks, NoHooks};
use crate::proxy::ProxyFactory;
use crate::reference::{EntityRef, RefKind};
use crate::schema::{Schema, ID_PROPERTY};
use crate::storage::{IdentityMap, Tracked};
use crate::value::{Record, Value};

fn unknown_type(entity_type: &EntityType) -> MapError {
    EntityError::UnknownEntityType {
        entity_type: entity_type.clone(),
    }
    .into()
}

fn record_id(entity_type: &EntityType, raw: &Record) -> MapResult<EntityId> {
    match raw.get(ID_PROPERTY) {
        None | Some(Value::Null) => Err(EntityError::MissingId {
            entity_type: entity_type.clone(),
        }
        .into()),
        Some(value) => EntityId::try_from(value).map_err(|_| {
            EntityError::InvalidId {
                entity_type: entity_type.clone(),
                found: value.type_name(),
            }
            .into()
        }),
    }
}

fn check_fields(schema: &Schema, raw: &Record) -> MapResult<()> {
    match raw
        .keys()
        .find(|key| key.as_str() != ID_PROPERTY && schema.property(key).is_none())
    {
        Some(field) => Err(EntityError::UnknownField {
            entity_type: schema.entity_type().clone(),
            field: field.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

struct TypeEntry {
    schema: Arc<Schema>,
    hooks: Arc<dyn EntityHooks>,
    map: IdentityMap,
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("schema", &self.schema)
            .field("tracked", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Identity map and entity construction for one session.
///
/// At most one object is tracked per `(entity type, id)`. Nothing is ever
/// evicted; dropping the manager ends the session.
#[derive(Debug)]
pub struct EntityManager {
    config: ManagerConfig,
    types: HashMap<EntityType, TypeEntry>,
    proxies: ProxyFactory,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::with_config(ManagerConfig::default())
    }
}

impl EntityManager {
    /// Creates an empty manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with the given configuration.
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            config,
            types: HashMap::new(),
            proxies: ProxyFactory::new(),
        }
    }

    /// Returns the configuration the manager was built with.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registers an entity type with its schema and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// `SchemaError::DuplicateEntityType` if the type name is taken.
    pub fn register_type<H>(&mut self, schema: Schema, hooks: H) -> MapResult<EntityType>
    where
        H: EntityHooks + 'static,
    {
        let entity_type = schema.entity_type().clone();
        if self.types.contains_key(&entity_type) {
            return Err(SchemaError::DuplicateEntityType { entity_type }.into());
        }

        debug!(
            entity_type = %entity_type,
            properties = schema.len(),
            "Entity type registered"
        );
        let map = IdentityMap::with_capacity(entity_type.clone(), self.config.type_capacity);
        self.types.insert(
            entity_type.clone(),
            TypeEntry {
                schema: Arc::new(schema),
                hooks: Arc::new(hooks),
                map,
            },
        );
        Ok(entity_type)
    }

    /// Registers an entity type without hooks.
    pub fn register(&mut self, schema: Schema) -> MapResult<EntityType> {
        self.register_type(schema, NoHooks)
    }

    /// Returns the schema registered for `entity_type`.
    pub fn schema(&self, entity_type: &EntityType) -> MapResult<&Arc<Schema>> {
        self.entry(entity_type).map(|entry| &entry.schema)
    }

    /// Registered entity types, in no particular order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> + '_ {
        self.types.keys()
    }

    /// Returns the proxy factory, e.g. to inspect the cached proxy types.
    #[must_use]
    pub const fn proxy_factory(&self) -> &ProxyFactory {
        &self.proxies
    }

    fn entry(&self, entity_type: &EntityType) -> MapResult<&TypeEntry> {
        self.types
            .get(entity_type)
            .ok_or_else(|| unknown_type(entity_type))
    }

    /// Builds the entity described by `raw`, or refreshes the one already
    /// tracked for its id.
    ///
    /// - untracked id: the new entity is registered and the `constructed`
    ///   hook runs on it;
    /// - tracked entity: it is updated from `raw` and its reference returned;
    /// - tracked unresolved proxy: the proxy is resolved with the new entity,
    ///   the `resolved` hook runs on it, and the proxy's reference is
    ///   returned;
    /// - tracked resolved proxy: its delegate is updated.
    ///
    /// # Errors
    ///
    /// Unknown type, missing or invalid id, unknown fields in strict mode, or
    /// a failing transform. The identity map is unchanged on error.
    pub fn construct(&mut self, entity_type: &EntityType, raw: &Record) -> MapResult<EntityRef> {
        let strict = self.config.strict_fields;
        let TypeEntry { schema, hooks, map } = self
            .types
            .get_mut(entity_type)
            .ok_or_else(|| unknown_type(entity_type))?;
        let id = record_id(entity_type, raw)?;
        if strict {
            check_fields(schema, raw)?;
        }

        match map.get_mut(&id) {
            Some(Tracked::Real(entity)) => {
                entity.update(raw)?;
                trace!(entity_type = %entity_type, id = %id, "Entity refreshed");
                Ok(EntityRef::new(RefKind::Real, entity_type.clone(), id))
            }
            Some(Tracked::Proxy(proxy)) => {
                if proxy.is_resolved() {
                    proxy.ensure_loaded_mut()?.update(raw)?;
                    trace!(entity_type = %entity_type, id = %id, "Proxy delegate refreshed");
                } else {
                    let entity = Entity::construct(Arc::clone(schema), id.clone(), raw)?;
                    proxy.resolve(entity);
                    hooks.resolved(proxy);
                    debug!(entity_type = %entity_type, id = %id, "Proxy resolved");
                }
                Ok(EntityRef::new(RefKind::Proxy, entity_type.clone(), id))
            }
            None => {
                let entity = Entity::construct(Arc::clone(schema), id.clone(), raw)?;
                map.insert(Tracked::Real(entity));
                if let Some(Tracked::Real(entity)) = map.get_mut(&id) {
                    hooks.constructed(entity);
                }
                debug!(entity_type = %entity_type, id = %id, "Entity registered");
                Ok(EntityRef::new(RefKind::Real, entity_type.clone(), id))
            }
        }
    }

    /// Reloads every property of a tracked entity from `raw`.
    ///
    /// A resolved proxy updates its delegate. If `raw` carries an id it must
    /// be the entity's id.
    ///
    /// # Errors
    ///
    /// `NotLoadable` for an unresolved proxy, `IdMismatch`, unknown fields in
    /// strict mode, or a failing transform (nothing is overwritten then).
    pub fn update(&mut self, reference: &EntityRef, raw: &Record) -> MapResult<()> {
        let entity_type = reference.entity_type();
        if self.config.strict_fields {
            check_fields(&self.entry(entity_type)?.schema, raw)?;
        }
        if raw.get(ID_PROPERTY).is_some_and(|v| !v.is_null()) {
            let found = record_id(entity_type, raw)?;
            if &found != reference.id() {
                return Err(EntityError::IdMismatch {
                    entity_type: entity_type.clone(),
                    expected: reference.id().clone(),
                    found,
                }
                .into());
            }
        }

        self.entity_mut(reference)?.update(raw)?;
        trace!(entity = %reference, "Entity updated");
        Ok(())
    }

    /// Reloads a single property of a tracked entity from `raw`.
    pub fn load_property_value(
        &mut self,
        reference: &EntityRef,
        name: &str,
        raw: &Record,
    ) -> MapResult<()> {
        self.entity_mut(reference)?.load_property_value(name, raw)
    }

    /// Returns the tracked object for `id`.
    ///
    /// # Errors
    ///
    /// `NotLoaded` when nothing is tracked; nothing is created.
    pub fn get(&self, entity_type: &EntityType, id: impl Into<EntityId>) -> MapResult<EntityRef> {
        let id = id.into();
        match self.entry(entity_type)?.map.get(&id) {
            Some(tracked) => Ok(EntityRef::new(tracked.kind(), entity_type.clone(), id)),
            None => Err(EntityError::NotLoaded {
                entity_type: entity_type.clone(),
                id,
            }
            .into()),
        }
    }

    /// Returns the tracked object for `id`, creating and tracking an
    /// unresolved proxy when there is none.
    ///
    /// # Errors
    ///
    /// Only for an unregistered entity type.
    pub fn get_reference(
        &mut self,
        entity_type: &EntityType,
        id: impl Into<EntityId>,
    ) -> MapResult<EntityRef> {
        let id = id.into();
        let run_hooks = self.config.run_proxy_hooks;
        let entry = self
            .types
            .get_mut(entity_type)
            .ok_or_else(|| unknown_type(entity_type))?;

        if let Some(tracked) = entry.map.get(&id) {
            return Ok(EntityRef::new(tracked.kind(), entity_type.clone(), id));
        }

        let hooks = run_hooks.then_some(&*entry.hooks);
        let proxy = self.proxies.create_proxy(&entry.schema, id.clone(), hooks);
        entry.map.insert(Tracked::Proxy(proxy));
        Ok(EntityRef::new(RefKind::Proxy, entity_type.clone(), id))
    }

    /// Every tracked object of `entity_type`, real and proxy, in the order
    /// they were first tracked.
    pub fn get_all(&self, entity_type: &EntityType) -> MapResult<Vec<EntityRef>> {
        Ok(self.entry(entity_type)?.map.refs())
    }

    /// The persistable form of an entity: `reverse_transform` of every
    /// persistable property, keyed by name.
    ///
    /// # Errors
    ///
    /// `NotLoadable` for an unresolved proxy, or a failing reverse transform.
    pub fn to_array(&self, reference: &EntityRef) -> MapResult<Record> {
        self.entity(reference)?.to_record()
    }

    /// Reads a property through a reference.
    pub fn read(&self, reference: &EntityRef, name: &str) -> MapResult<&Value> {
        match self.tracked(reference)? {
            Tracked::Real(entity) => entity.get(name),
            Tracked::Proxy(proxy) => proxy.get(name),
        }
    }

    /// Writes a property through a reference, marking the entity dirty.
    pub fn write(
        &mut self,
        reference: &EntityRef,
        name: &str,
        value: impl Into<Value>,
    ) -> MapResult<()> {
        match self.tracked_mut(reference)? {
            Tracked::Real(entity) => entity.set(name, value),
            Tracked::Proxy(proxy) => proxy.set(name, value),
        }
    }

    /// The loaded data behind a reference.
    ///
    /// # Errors
    ///
    /// `NotLoadable` for an unresolved proxy.
    pub fn entity(&self, reference: &EntityRef) -> MapResult<&Entity> {
        match self.tracked(reference)? {
            Tracked::Real(entity) => Ok(entity),
            Tracked::Proxy(proxy) => proxy.ensure_loaded(),
        }
    }

    /// Mutable counterpart of [`EntityManager::entity`].
    pub fn entity_mut(&mut self, reference: &EntityRef) -> MapResult<&mut Entity> {
        match self.tracked_mut(reference)? {
            Tracked::Real(entity) => Ok(entity),
            Tracked::Proxy(proxy) => proxy.ensure_loaded_mut(),
        }
    }

    /// True if the entity behind `reference` was written since it was loaded
    /// or marked clean.
    pub fn is_dirty(&self, reference: &EntityRef) -> MapResult<bool> {
        self.entity(reference).map(Entity::is_dirty)
    }

    /// Clears the dirty flag after the caller has written the entity back.
    pub fn mark_clean(&mut self, reference: &EntityRef) -> MapResult<()> {
        self.entity_mut(reference).map(Entity::mark_clean)
    }

    /// True for real entities and resolved proxies.
    pub fn is_resolved(&self, reference: &EntityRef) -> MapResult<bool> {
        Ok(self.tracked(reference)?.entity().is_some())
    }

    /// True if anything, real or proxy, is tracked for `id`.
    #[must_use]
    pub fn contains(&self, entity_type: &EntityType, id: &EntityId) -> bool {
        self.types
            .get(entity_type)
            .is_some_and(|entry| entry.map.contains(id))
    }

    /// Number of tracked objects of `entity_type`; zero when unregistered.
    #[must_use]
    pub fn len(&self, entity_type: &EntityType) -> usize {
        self.types.get(entity_type).map_or(0, |entry| entry.map.len())
    }

    /// True when nothing is tracked for any type.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.values().all(|entry| entry.map.is_empty())
    }

    fn stale(reference: &EntityRef) -> MapError {
        EntityError::StaleReference {
            entity_type: reference.entity_type().clone(),
            id: reference.id().clone(),
        }
        .into()
    }

    fn tracked(&self, reference: &EntityRef) -> MapResult<&Tracked> {
        let tracked = self
            .entry(reference.entity_type())?
            .map
            .get(reference.id())
            .ok_or_else(|| Self::stale(reference))?;
        if tracked.kind() == reference.kind() {
            Ok(tracked)
        } else {
            Err(Self::stale(reference))
        }
    }

    fn tracked_mut(&mut self, reference: &EntityRef) -> MapResult<&mut Tracked> {
        let tracked = self
            .types
            .get_mut(reference.entity_type())
            .ok_or_else(|| unknown_type(reference.entity_type()))?
            .map
            .get_mut(reference.id())
            .ok_or_else(|| Self::stale(reference))?;
        if tracked.kind() == reference.kind() {
            Ok(tracked)
        } else {
            Err(Self::stale(reference))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::proxy::{Lifecycle, Proxy};
    use crate::record;
    use crate::schema::PropertyDefinition;
    use crate::transform;

    fn user_schema() -> Schema {
        Schema::builder("User")
            .property(PropertyDefinition::new("id").codec(transform::identity()))
            .property(PropertyDefinition::new("name").codec(transform::identity()))
            .property(PropertyDefinition::new("visits").codec(transform::integer()).transient())
            .build()
            .unwrap()
    }

    fn manager() -> (EntityManager, EntityType) {
        let mut manager = EntityManager::new();
        let user = manager.register(user_schema()).unwrap();
        (manager, user)
    }

    #[derive(Default)]
    struct Recorder {
        proxy_created: AtomicUsize,
        constructed: AtomicUsize,
        resolved: AtomicUsize,
    }

    impl EntityHooks for Arc<Recorder> {
        fn proxy_created(&self, proxy: &mut Proxy) {
            assert_eq!(proxy.lifecycle(), Lifecycle::Created);
            self.proxy_created.fetch_add(1, Ordering::SeqCst);
        }

        fn constructed(&self, entity: &mut Entity) {
            entity.set("visits", 1).unwrap();
            entity.mark_clean();
            self.constructed.fetch_add(1, Ordering::SeqCst);
        }

        fn resolved(&self, proxy: &mut Proxy) {
            assert_eq!(proxy.lifecycle(), Lifecycle::Resolved);
            proxy.set("visits", 1).unwrap();
            proxy.ensure_loaded_mut().unwrap().mark_clean();
            self.resolved.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_register_duplicate_type() {
        let (mut manager, _) = manager();
        let err = manager.register(user_schema()).unwrap_err();
        assert!(matches!(err, MapError::Schema(SchemaError::DuplicateEntityType { .. })));
    }

    #[test]
    fn test_unknown_type() {
        let mut manager = EntityManager::new();
        let ghost = EntityType::new("Ghost");
        assert!(matches!(
            manager.get_reference(&ghost, 1),
            Err(MapError::Entity(EntityError::UnknownEntityType { .. }))
        ));
        assert!(manager.get_all(&ghost).is_err());
        assert_eq!(manager.len(&ghost), 0);
    }

    #[test]
    fn test_construct_registers_real_entity() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();

        assert_eq!(r.kind(), RefKind::Real);
        assert_eq!(manager.get(&user, 1).unwrap(), r);
        assert_eq!(manager.read(&r, "name").unwrap(), &Value::from("Ann"));
        assert_eq!(manager.len(&user), 1);
    }

    #[test]
    fn test_construct_twice_updates_in_place() {
        let (mut manager, user) = manager();
        let first = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();
        let second = manager.construct(&user, &record! { "id" => 1, "name" => "Bea" }).unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.len(&user), 1);
        assert_eq!(manager.read(&first, "name").unwrap(), &Value::from("Bea"));
    }

    #[test]
    fn test_construct_requires_valid_id() {
        let (mut manager, user) = manager();
        assert!(matches!(
            manager.construct(&user, &record! { "name" => "Ann" }),
            Err(MapError::Entity(EntityError::MissingId { .. }))
        ));
        assert!(matches!(
            manager.construct(&user, &record! { "id" => true }),
            Err(MapError::Entity(EntityError::InvalidId { found: "bool", .. }))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_construct_failure_leaves_map_unchanged() {
        let (mut manager, user) = manager();
        let proxy = manager.get_reference(&user, 1).unwrap();

        let err = manager
            .construct(&user, &record! { "id" => 1, "visits" => "many" })
            .unwrap_err();
        assert!(err.is_transform());
        assert!(!manager.is_resolved(&proxy).unwrap());
        assert!(manager.get(&user, 2).unwrap_err().is_not_loaded());
    }

    #[test]
    fn test_get_never_creates() {
        let (manager, user) = manager();
        let err = manager.get(&user, 9).unwrap_err();
        assert!(err.is_not_loaded());
        assert!(!manager.contains(&user, &EntityId::from(9)));
    }

    #[test]
    fn test_get_reference_creates_one_proxy() {
        let (mut manager, user) = manager();
        let a = manager.get_reference(&user, 5).unwrap();
        let b = manager.get_reference(&user, 5).unwrap();

        assert!(a.is_proxy());
        assert_eq!(a, b);
        assert_eq!(manager.len(&user), 1);
        assert_eq!(manager.get(&user, 5).unwrap(), a);
        assert_eq!(manager.proxy_factory().built_types(), 1);
    }

    #[test]
    fn test_get_reference_returns_real_entity() {
        let (mut manager, user) = manager();
        let real = manager.construct(&user, &record! { "id" => 5 }).unwrap();
        assert_eq!(manager.get_reference(&user, 5).unwrap(), real);
        assert_eq!(manager.proxy_factory().built_types(), 0);
    }

    #[test]
    fn test_unresolved_proxy_access() {
        let (mut manager, user) = manager();
        let proxy = manager.get_reference(&user, 7).unwrap();

        assert_eq!(manager.read(&proxy, "id").unwrap(), &Value::Int(7));
        assert!(manager.read(&proxy, "name").unwrap_err().is_not_loadable());
        assert!(manager.write(&proxy, "name", "x").unwrap_err().is_not_loadable());
        assert!(manager.to_array(&proxy).unwrap_err().is_not_loadable());
        assert!(manager.update(&proxy, &record! { "name" => "x" }).unwrap_err().is_not_loadable());
        assert!(!manager.is_resolved(&proxy).unwrap());
    }

    #[test]
    fn test_resolution_keeps_reference() {
        let (mut manager, user) = manager();
        let proxy = manager.get_reference(&user, 7).unwrap();
        let resolved = manager.construct(&user, &record! { "id" => 7, "name" => "Ann" }).unwrap();

        assert_eq!(resolved, proxy);
        assert!(manager.is_resolved(&proxy).unwrap());
        assert_eq!(manager.read(&proxy, "name").unwrap(), &Value::from("Ann"));
        assert_eq!(manager.to_array(&proxy).unwrap(), record! { "id" => 7, "name" => "Ann" });
    }

    #[test]
    fn test_construct_on_resolved_proxy_updates_delegate() {
        let (mut manager, user) = manager();
        let proxy = manager.get_reference(&user, 7).unwrap();
        manager.construct(&user, &record! { "id" => 7, "name" => "Ann" }).unwrap();
        let again = manager.construct(&user, &record! { "id" => 7, "name" => "Bea" }).unwrap();

        assert_eq!(again, proxy);
        assert_eq!(manager.read(&proxy, "name").unwrap(), &Value::from("Bea"));
        assert_eq!(manager.len(&user), 1);
    }

    #[test]
    fn test_update_checks_id() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();

        assert!(matches!(
            manager.update(&r, &record! { "id" => 2, "name" => "Bea" }),
            Err(MapError::Entity(EntityError::IdMismatch { .. }))
        ));
        manager.update(&r, &record! { "name" => "Bea" }).unwrap();
        assert_eq!(manager.read(&r, "name").unwrap(), &Value::from("Bea"));
    }

    #[test]
    fn test_partial_update_keeps_id() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();

        manager.update(&r, &record! { "name" => "Bea" }).unwrap();
        assert_eq!(manager.read(&r, "id").unwrap(), &Value::Int(1));

        manager.load_property_value(&r, "id", &record! {}).unwrap();
        assert_eq!(manager.read(&r, "id").unwrap(), &Value::Int(1));
        assert_eq!(manager.to_array(&r).unwrap(), record! { "id" => 1, "name" => "Bea" });
    }

    #[test]
    fn test_resolved_delegate_id_matches_proxy() {
        let (mut manager, user) = manager();
        let proxy = manager.get_reference(&user, 7).unwrap();
        manager.construct(&user, &record! { "id" => 7, "name" => "Ann" }).unwrap();
        manager.update(&proxy, &record! { "name" => "Bea" }).unwrap();

        assert_eq!(manager.read(&proxy, "id").unwrap(), &Value::Int(7));
        assert_eq!(manager.entity(&proxy).unwrap().get("id").unwrap(), &Value::Int(7));
        assert_eq!(manager.to_array(&proxy).unwrap()["id"], Value::Int(7));
    }

    #[test]
    fn test_write_marks_dirty_and_reaches_to_array() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();
        assert!(!manager.is_dirty(&r).unwrap());

        manager.write(&r, "name", "Bea").unwrap();
        assert!(manager.is_dirty(&r).unwrap());
        assert_eq!(manager.to_array(&r).unwrap()["name"], Value::from("Bea"));

        manager.mark_clean(&r).unwrap();
        assert!(!manager.is_dirty(&r).unwrap());
    }

    #[test]
    fn test_id_is_not_writable() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1 }).unwrap();
        assert!(matches!(
            manager.write(&r, "id", 2),
            Err(MapError::Entity(EntityError::NotWritable { .. }))
        ));
    }

    #[test]
    fn test_get_all_mixes_real_and_proxy() {
        let (mut manager, user) = manager();
        assert!(manager.get_all(&user).unwrap().is_empty());

        manager.construct(&user, &record! { "id" => 1 }).unwrap();
        manager.get_reference(&user, 2).unwrap();
        manager.construct(&user, &record! { "id" => "x" }).unwrap();

        let all = manager.get_all(&user).unwrap();
        let kinds: Vec<_> = all.iter().map(EntityRef::kind).collect();
        assert_eq!(kinds, [RefKind::Real, RefKind::Proxy, RefKind::Real]);
    }

    #[test]
    fn test_stale_reference() {
        let (mut manager, user) = manager();
        manager.construct(&user, &record! { "id" => 1 }).unwrap();
        let forged = EntityRef::new(RefKind::Proxy, user.clone(), EntityId::from(1));
        assert!(matches!(
            manager.read(&forged, "id"),
            Err(MapError::Entity(EntityError::StaleReference { .. }))
        ));
    }

    #[test]
    fn test_strict_fields() {
        let mut manager = EntityManager::with_config(ManagerConfig {
            strict_fields: true,
            ..ManagerConfig::default()
        });
        let user = manager.register(user_schema()).unwrap();
        assert!(matches!(
            manager.construct(&user, &record! { "id" => 1, "email" => "a@b" }),
            Err(MapError::Entity(EntityError::UnknownField { .. }))
        ));
        assert!(manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).is_ok());
    }

    #[test]
    fn test_hooks_run_once_per_transition() {
        let recorder = Arc::new(Recorder::default());
        let mut manager = EntityManager::new();
        let user = manager.register_type(user_schema(), Arc::clone(&recorder)).unwrap();

        let real = manager.construct(&user, &record! { "id" => 1 }).unwrap();
        manager.construct(&user, &record! { "id" => 1 }).unwrap();
        let proxy = manager.get_reference(&user, 2).unwrap();
        manager.get_reference(&user, 2).unwrap();
        manager.construct(&user, &record! { "id" => 2 }).unwrap();
        manager.construct(&user, &record! { "id" => 2 }).unwrap();

        assert_eq!(recorder.constructed.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.proxy_created.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.resolved.load(Ordering::SeqCst), 1);
        // second construct reloaded `visits` from the record
        assert!(manager.read(&real, "visits").unwrap().is_null());
        assert!(manager.read(&proxy, "visits").unwrap().is_null());
    }

    #[test]
    fn test_proxy_hooks_can_be_disabled() {
        let recorder = Arc::new(Recorder::default());
        let mut manager = EntityManager::with_config(ManagerConfig {
            run_proxy_hooks: false,
            ..ManagerConfig::default()
        });
        let user = manager.register_type(user_schema(), Arc::clone(&recorder)).unwrap();
        let proxy = manager.get_reference(&user, 1).unwrap();
        manager.construct(&user, &record! { "id" => 1 }).unwrap();

        assert_eq!(recorder.proxy_created.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(manager.read(&proxy, "visits").unwrap(), &Value::Int(1));
        assert!(!manager.is_dirty(&proxy).unwrap());
    }

    #[test]
    fn test_load_property_value_through_reference() {
        let (mut manager, user) = manager();
        let r = manager.construct(&user, &record! { "id" => 1, "name" => "Ann" }).unwrap();
        manager
            .load_property_value(&r, "name", &record! { "name" => "Cy" })
            .unwrap();
        assert_eq!(manager.read(&r, "name").unwrap(), &Value::from("Cy"));
        assert_eq!(manager.entity(&r).unwrap().raw("name"), Some(&Value::from("Cy")));
    }
}
