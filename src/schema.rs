//! Schema contracts: property definitions and their materialized slot table.
//!
//! A schema collaborator declares [`PropertyDefinition`]s; [`SchemaBuilder::build`]
//! validates them and lays them out as a fixed, indexed [`Schema`]. Entities
//! and proxies address properties through that layout, never through
//! per-instance accessors.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{MapError, MapResult, SchemaError, TransformError};
use crate::transform::Transform;
use crate::value::{Record, Value};

/// Name of the identity property. It is never writable.
pub const ID_PROPERTY: &str = "id";

/// A transform or reverse transform.
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, TransformError> + Send + Sync>;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

fn validate_name(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Access flags of a property. All set by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFlags {
    /// Exposes a getter.
    pub readable: bool,
    /// Exposes a setter.
    pub writable: bool,
    /// Included in `to_array`.
    pub persistable: bool,
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self {
            readable: true,
            writable: true,
            persistable: true,
        }
    }
}

/// Declaration of one property, as supplied by a schema collaborator.
///
/// The transform is mandatory; it is checked when the schema is built.
/// Without a reverse transform, `to_array` writes the value unchanged.
#[derive(Clone)]
pub struct PropertyDefinition {
    name: String,
    transform: Option<TransformFn>,
    reverse_transform: Option<TransformFn>,
    flags: PropertyFlags,
}

impl PropertyDefinition {
    /// Starts a definition with default flags and no transform.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
            reverse_transform: None,
            flags: PropertyFlags::default(),
        }
    }

    /// Sets the raw-to-value transform.
    #[must_use]
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Sets the value-to-raw transform used by `to_array`.
    #[must_use]
    pub fn reverse_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        self.reverse_transform = Some(Arc::new(f));
        self
    }

    /// Sets both directions from a stock [`Transform`] pair.
    #[must_use]
    pub fn codec(mut self, pair: Transform) -> Self {
        let (forward, reverse) = pair.into_parts();
        self.transform = Some(forward);
        self.reverse_transform = Some(reverse);
        self
    }

    /// Replaces all access flags.
    #[must_use]
    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Readable and persistable, but not writable.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.flags.writable = false;
        self
    }

    /// Not readable through accessors; still loaded and persisted.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.flags.readable = false;
        self
    }

    /// Left out of `to_array`.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.flags.persistable = false;
        self
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefinition")
            .field("name", &self.name)
            .field("has_transform", &self.transform.is_some())
            .field("has_reverse_transform", &self.reverse_transform.is_some())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Position of a property in its schema's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

impl Slot {
    /// Position in the entity's value vectors.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A validated property, bound to its slot.
#[derive(Clone)]
pub struct Property {
    name: String,
    slot: Slot,
    transform: TransformFn,
    reverse_transform: Option<TransformFn>,
    flags: PropertyFlags,
}

impl Property {
    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot holding this property.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Access flags.
    #[must_use]
    pub const fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Applies the transform to a raw value.
    pub fn apply(&self, raw: &Value) -> MapResult<Value> {
        (self.transform)(raw).map_err(|e| MapError::transform(&self.name, e))
    }

    /// Applies the reverse transform to an in-memory value.
    pub fn reverse(&self, value: &Value) -> MapResult<Value> {
        match &self.reverse_transform {
            Some(reverse) => reverse(value).map_err(|e| MapError::transform(&self.name, e)),
            None => Ok(value.clone()),
        }
    }

    /// Reads this property's raw input from `record` and transforms it.
    ///
    /// Returns `(raw, value)`. The transform runs on every call.
    pub fn load(&self, record: &Record) -> MapResult<(Value, Value)> {
        let raw = record.get(&self.name).cloned().unwrap_or_default();
        let value = self.apply(&raw)?;
        Ok((raw, value))
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// The materialized property layout of one entity type.
///
/// # Examples
///
/// ```
/// use kyromap::{transform, PropertyDefinition, Schema};
///
/// let schema = Schema::builder("user")
///     .property(PropertyDefinition::new("id").codec(transform::identity()))
///     .property(PropertyDefinition::new("name").codec(transform::string()))
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.slot("name").unwrap().index(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    entity_type: EntityType,
    properties: Vec<Property>,
    slots: HashMap<String, Slot>,
}

impl Schema {
    /// Starts declaring the schema of `entity_type`.
    #[must_use]
    pub fn builder(entity_type: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            entity_type: entity_type.into(),
            definitions: Vec::new(),
        }
    }

    /// Entity type this schema describes.
    #[must_use]
    pub const fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Properties in slot order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.slots.get(name).map(|slot| &self.properties[slot.index()])
    }

    /// Slot of the named property.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True when no property is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Collects property definitions for [`Schema::build`](SchemaBuilder::build).
#[derive(Debug)]
pub struct SchemaBuilder {
    entity_type: String,
    definitions: Vec<PropertyDefinition>,
}

impl SchemaBuilder {
    /// Appends a property definition.
    #[must_use]
    pub fn property(mut self, definition: PropertyDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Validates the definitions and lays them out in declaration order.
    ///
    /// # Errors
    ///
    /// Fails on an invalid type or property name, a duplicate property, or a
    /// property without a transform. Nothing is built in that case.
    pub fn build(self) -> Result<Schema, SchemaError> {
        validate_name("entity type", &self.entity_type)?;

        let mut properties = Vec::with_capacity(self.definitions.len());
        let mut slots = HashMap::with_capacity(self.definitions.len());

        for (index, definition) in self.definitions.into_iter().enumerate() {
            validate_name("property", &definition.name)?;
            if slots.contains_key(&definition.name) {
                return Err(SchemaError::DuplicateProperty {
                    entity_type: self.entity_type,
                    property: definition.name,
                });
            }
            let Some(transform) = definition.transform else {
                return Err(SchemaError::MissingTransform {
                    entity_type: self.entity_type,
                    property: definition.name,
                });
            };

            let mut flags = definition.flags;
            if definition.name == ID_PROPERTY {
                flags.writable = false;
            }

            let slot = Slot(index);
            slots.insert(definition.name.clone(), slot);
            properties.push(Property {
                name: definition.name,
                slot,
                transform,
                reverse_transform: definition.reverse_transform,
                flags,
            });
        }

        Ok(Schema {
            entity_type: EntityType::new(&self.entity_type),
            properties,
            slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transform;

    #[test]
    fn test_build_lays_out_slots_in_order() {
        let schema = Schema::builder("order")
            .property(PropertyDefinition::new("id").codec(transform::identity()))
            .property(PropertyDefinition::new("total").codec(transform::float()))
            .property(PropertyDefinition::new("note").codec(transform::string()).transient())
            .build()
            .unwrap();

        assert_eq!(schema.entity_type().name(), "order");
        let names: Vec<_> = schema.properties().iter().map(Property::name).collect();
        assert_eq!(names, ["id", "total", "note"]);
        assert_eq!(schema.slot("note"), Some(Slot(2)));
        assert!(!schema.property("note").unwrap().flags().persistable);
        assert!(schema.property("missing").is_none());
    }

    #[test]
    fn test_missing_transform_is_rejected() {
        let err = Schema::builder("user")
            .property(PropertyDefinition::new("name").reverse_transform(|v| Ok(v.clone())))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            SchemaError::MissingTransform { ref property, .. } if property == "name"
        ));
    }

    #[test]
    fn test_duplicate_property_is_rejected() {
        let err = Schema::builder("user")
            .property(PropertyDefinition::new("name").codec(transform::string()))
            .property(PropertyDefinition::new("name").codec(transform::string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateProperty { .. }));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        assert!(matches!(
            Schema::builder("bad type").build(),
            Err(SchemaError::InvalidName { kind: "entity type", .. })
        ));
        assert!(matches!(
            Schema::builder("user")
                .property(PropertyDefinition::new("1st").codec(transform::identity()))
                .build(),
            Err(SchemaError::InvalidName { kind: "property", .. })
        ));
    }

    #[test]
    fn test_id_is_never_writable() {
        let schema = Schema::builder("user")
            .property(PropertyDefinition::new("id").codec(transform::identity()))
            .build()
            .unwrap();
        let flags = schema.property(ID_PROPERTY).unwrap().flags();
        assert!(!flags.writable);
        assert!(flags.readable);
        assert!(flags.persistable);
    }

    #[test]
    fn test_reverse_defaults_to_identity() {
        let schema = Schema::builder("user")
            .property(PropertyDefinition::new("n").transform(|v| Ok(v.clone())))
            .build()
            .unwrap();
        let property = schema.property("n").unwrap();
        assert_eq!(property.reverse(&Value::Int(2)).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_load_reads_absent_as_null() {
        let schema = Schema::builder("user")
            .property(PropertyDefinition::new("n").codec(transform::integer()))
            .build()
            .unwrap();
        let (raw, value) = schema.property("n").unwrap().load(&Record::new()).unwrap();
        assert!(raw.is_null());
        assert!(value.is_null());
    }
}
