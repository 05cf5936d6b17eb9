//! Lazy proxies for entities that are referenced before they are loaded.
//!
//! The [`ProxyFactory`] materializes one [`ProxyType`] per entity type, on
//! first use, and keeps it for its own lifetime. A proxy type holds a
//! forwarding accessor for every non-id property; each accessor checks that
//! the proxy is resolved before touching the delegate. The id is answered by
//! the proxy itself, so it is available from the moment the proxy exists.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Entity, EntityId, EntityType};
use crate::error::{EntityError, MapError, MapResult};
use crate::hooks::EntityHooks;
use crate::schema::{Schema, ID_PROPERTY};
use crate::value::Value;

/// Proxy lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No delegate yet; property access fails.
    Created,
    /// Bound to its delegate; property access is forwarded.
    Resolved,
}

fn not_loadable(entity_type: &EntityType, id: &EntityId) -> MapError {
    EntityError::NotLoadable {
        entity_type: entity_type.clone(),
        id: id.clone(),
    }
    .into()
}

/// Read/write pair forwarding one property to a proxy's delegate.
#[derive(Debug, Clone)]
pub struct ForwardingAccessor {
    name: String,
}

impl ForwardingAccessor {
    /// Property this accessor forwards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the property from the delegate.
    pub fn read<'p>(&self, proxy: &'p Proxy) -> MapResult<&'p Value> {
        proxy.ensure_loaded()?.get(&self.name)
    }

    /// Writes the property on the delegate.
    pub fn write(&self, proxy: &mut Proxy, value: Value) -> MapResult<()> {
        proxy.ensure_loaded_mut()?.set(&self.name, value)
    }
}

/// The proxy layout of one entity type.
#[derive(Debug)]
pub struct ProxyType {
    schema: Arc<Schema>,
    accessors: Vec<ForwardingAccessor>,
    by_name: HashMap<String, usize>,
}

impl ProxyType {
    fn build(schema: &Arc<Schema>) -> Self {
        let accessors: Vec<_> = schema
            .properties()
            .iter()
            .filter(|p| p.name() != ID_PROPERTY)
            .map(|p| ForwardingAccessor {
                name: p.name().to_string(),
            })
            .collect();
        let by_name = accessors
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();

        Self {
            schema: Arc::clone(schema),
            accessors,
            by_name,
        }
    }

    /// Entity type the proxies stand in for.
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        self.schema.entity_type()
    }

    /// Schema of the proxied type.
    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Forwarding accessors, one per non-id property, in slot order.
    #[must_use]
    pub fn accessors(&self) -> &[ForwardingAccessor] {
        &self.accessors
    }

    /// Accessor for `name`, if the property is proxied.
    #[must_use]
    pub fn accessor(&self, name: &str) -> Option<&ForwardingAccessor> {
        self.by_name.get(name).map(|&i| &self.accessors[i])
    }

    /// Creates an unresolved proxy bound to `id`.
    #[must_use]
    pub fn instantiate(self: &Arc<Self>, id: EntityId) -> Proxy {
        Proxy {
            id_value: id.to_value(),
            id,
            proxy_type: Arc::clone(self),
            delegate: None,
        }
    }
}

/// Stand-in for an entity that is not loaded yet.
///
/// The delegate is set once, on resolution, and never replaced.
#[derive(Debug)]
pub struct Proxy {
    id: EntityId,
    id_value: Value,
    proxy_type: Arc<ProxyType>,
    delegate: Option<Entity>,
}

impl Proxy {
    /// Id captured at creation.
    #[must_use]
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Entity type the proxy stands in for.
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        self.proxy_type.entity_type()
    }

    /// Cached type this proxy was instantiated from.
    #[must_use]
    pub const fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.proxy_type
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        if self.delegate.is_some() {
            Lifecycle::Resolved
        } else {
            Lifecycle::Created
        }
    }

    /// True once a delegate is set.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.delegate.is_some()
    }

    /// The delegate, once resolved.
    #[must_use]
    pub const fn delegate(&self) -> Option<&Entity> {
        self.delegate.as_ref()
    }

    /// Returns the delegate, or `NotLoadable` while unresolved.
    pub fn ensure_loaded(&self) -> MapResult<&Entity> {
        self.delegate
            .as_ref()
            .ok_or_else(|| not_loadable(self.entity_type(), &self.id))
    }

    /// Mutable form of [`Proxy::ensure_loaded`].
    pub fn ensure_loaded_mut(&mut self) -> MapResult<&mut Entity> {
        let Self {
            id,
            proxy_type,
            delegate,
            ..
        } = self;
        delegate
            .as_mut()
            .ok_or_else(|| not_loadable(proxy_type.entity_type(), id))
    }

    /// Reads a property. `id` never needs the delegate.
    pub fn get(&self, name: &str) -> MapResult<&Value> {
        if name == ID_PROPERTY {
            return Ok(&self.id_value);
        }
        self.proxy_type
            .accessor(name)
            .ok_or_else(|| self.unknown(name))?
            .read(self)
    }

    /// Writes a property through to the delegate.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> MapResult<()> {
        if name == ID_PROPERTY {
            return Err(EntityError::NotWritable {
                entity_type: self.entity_type().clone(),
                property: name.to_string(),
            }
            .into());
        }
        let proxy_type = Arc::clone(&self.proxy_type);
        let accessor = proxy_type.accessor(name).ok_or_else(|| self.unknown(name))?;
        accessor.write(self, value.into())
    }

    pub(crate) fn resolve(&mut self, entity: Entity) {
        debug_assert!(self.delegate.is_none(), "proxy delegate is set exactly once");
        debug_assert_eq!(entity.id(), &self.id);
        self.delegate = Some(entity);
    }

    fn unknown(&self, name: &str) -> MapError {
        EntityError::UnknownProperty {
            entity_type: self.entity_type().clone(),
            property: name.to_string(),
        }
        .into()
    }
}

/// Builds and caches proxy types, and creates proxies from them.
#[derive(Debug, Default)]
pub struct ProxyFactory {
    types: HashMap<EntityType, Arc<ProxyType>>,
}

impl ProxyFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the proxy type for `schema`'s entity type, building it on the
    /// first request.
    pub fn proxy_type(&mut self, schema: &Arc<Schema>) -> Arc<ProxyType> {
        if let Some(existing) = self.types.get(schema.entity_type()) {
            return Arc::clone(existing);
        }

        let proxy_type = Arc::new(ProxyType::build(schema));
        debug!(
            entity_type = %schema.entity_type(),
            accessors = proxy_type.accessors().len(),
            "Proxy type materialized"
        );
        self.types
            .insert(schema.entity_type().clone(), Arc::clone(&proxy_type));
        proxy_type
    }

    /// Creates an unresolved proxy for `id` and runs the type's
    /// `proxy_created` hook on it.
    pub fn create_proxy(
        &mut self,
        schema: &Arc<Schema>,
        id: EntityId,
        hooks: Option<&dyn EntityHooks>,
    ) -> Proxy {
        let mut proxy = self.proxy_type(schema).instantiate(id);
        if let Some(hooks) = hooks {
            hooks.proxy_created(&mut proxy);
        }
        debug!(entity_type = %schema.entity_type(), id = %proxy.id(), "Proxy created");
        proxy
    }

    /// Number of proxy types built so far.
    #[must_use]
    pub fn built_types(&self) -> usize {
        self.types.len()
    }
}
