//! Entity identity and entity instances.
//!
//! An [`EntityId`] is assigned by whoever produced the record; the map never
//! invents ids for loaded data. An [`EntityType`] names a category of records
//! and keys the registry that owns its schema. An [`Entity`] is one loaded
//! record laid out by its schema's slot table.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{EntityError, MapError, MapResult, TransformError};
use crate::schema::{Property, Schema, ID_PROPERTY};
use crate::value::{Record, Value};

/// Stable, externally assigned entity identifier.
///
/// A string in canonical UUID form (lowercase, hyphenated) is stored as
/// [`EntityId::Uuid`], so it shares identity with the same [`Uuid`] passed in
/// directly. Any other spelling stays a [`EntityId::Str`] and keeps its text.
///
/// # Examples
///
/// ```
/// use kyromap::EntityId;
///
/// assert_eq!(EntityId::from(7).to_string(), "7");
/// assert_eq!(EntityId::from("ann"), EntityId::Str("ann".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged, from = "RawId")]
pub enum EntityId {
    /// Integer key.
    Int(i64),
    /// UUID key.
    Uuid(Uuid),
    /// Free-form string key.
    Str(String),
}

impl EntityId {
    /// Creates a new random (UUID v4) id, for records created locally.
    #[must_use]
    pub fn random() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Returns the raw-record form of this id.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(v) => Value::Int(*v),
            Self::Uuid(v) => Value::String(v.to_string()),
            Self::Str(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for EntityId {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Uuid> for EntityId {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

fn canonical_uuid(v: &str) -> Option<Uuid> {
    Uuid::parse_str(v)
        .ok()
        .filter(|uuid| uuid.hyphenated().to_string() == v)
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self {
        canonical_uuid(v).map_or_else(|| Self::Str(v.to_string()), Self::Uuid)
    }
}

impl From<String> for EntityId {
    fn from(v: String) -> Self {
        match canonical_uuid(&v) {
            Some(uuid) => Self::Uuid(uuid),
            None => Self::Str(v),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl From<RawId> for EntityId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(v) => Self::Int(v),
            RawId::Str(v) => Self::from(v),
        }
    }
}

impl TryFrom<&Value> for EntityId {
    type Error = TransformError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(v) => Ok(Self::Int(*v)),
            Value::String(v) if !v.is_empty() => Ok(Self::from(v.as_str())),
            Value::Entity(id) => Ok(id.clone()),
            other => Err(TransformError::TypeMismatch {
                expected: "int or non-empty string id",
                actual: other.type_name(),
            }),
        }
    }
}

/// Name of a registered category of records.
///
/// Cloning is cheap; every [`crate::EntityRef`] carries one.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(Arc<str>);

impl EntityType {
    /// Creates an entity type handle from its name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityType").field(&self.name()).finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Serialize for EntityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// One loaded record.
///
/// `raw` keeps the last-seen untransformed input per property, `values` the
/// transformed value. Both are indexed by the schema's slots. `dirty` is set
/// by any successful write and cleared only by [`Entity::mark_clean`].
#[derive(Clone)]
pub struct Entity {
    id: EntityId,
    id_value: Value,
    schema: Arc<Schema>,
    raw: Vec<Value>,
    values: Vec<Value>,
    dirty: bool,
}

impl Entity {
    /// Builds a fresh entity from a raw record.
    ///
    /// Either every property loads or the half-built entity is discarded.
    pub(crate) fn construct(schema: Arc<Schema>, id: EntityId, raw: &Record) -> MapResult<Self> {
        let len = schema.len();
        let mut entity = Self {
            id_value: id.to_value(),
            id,
            schema: Arc::clone(&schema),
            raw: vec![Value::Null; len],
            values: vec![Value::Null; len],
            dirty: false,
        };
        for property in schema.properties() {
            entity.load_slot(property, raw)?;
        }
        Ok(entity)
    }

    fn load_slot(&mut self, property: &Property, raw: &Record) -> MapResult<()> {
        let (raw_value, value) = self.load_from(property, raw)?;
        let slot = property.slot().index();
        self.raw[slot] = raw_value;
        self.values[slot] = value;
        Ok(())
    }

    /// Loads one property from `raw` without storing it.
    ///
    /// The id slot never goes back to `Null`: a record without an id reloads
    /// it from the entity's own id.
    fn load_from(&self, property: &Property, raw: &Record) -> MapResult<(Value, Value)> {
        let has_id = raw.get(ID_PROPERTY).is_some_and(|v| !v.is_null());
        if property.name() == ID_PROPERTY && !has_id {
            let value = property.apply(&self.id_value)?;
            return Ok((self.id_value.clone(), value));
        }
        property.load(raw)
    }

    /// Reloads a single property from `raw`: stores the raw input and
    /// recomputes the value through the property's transform.
    ///
    /// A property absent from `raw` loads as `Null`, except `id`.
    pub fn load_property_value(&mut self, name: &str, raw: &Record) -> MapResult<()> {
        let schema = Arc::clone(&self.schema);
        let property = schema.property(name).ok_or_else(|| self.unknown(name))?;
        self.load_slot(property, raw)
    }

    /// Reloads every property from `raw`, last write wins.
    ///
    /// All transforms run before any slot is overwritten. `dirty` is left as
    /// is, and so is the id when `raw` has none.
    pub fn update(&mut self, raw: &Record) -> MapResult<()> {
        let loaded = self
            .schema
            .properties()
            .iter()
            .map(|property| self.load_from(property, raw))
            .collect::<MapResult<Vec<_>>>()?;

        for (slot, (raw_value, value)) in loaded.into_iter().enumerate() {
            self.raw[slot] = raw_value;
            self.values[slot] = value;
        }
        Ok(())
    }

    /// Returns the entity id.
    #[must_use]
    pub const fn id(&self) -> &EntityId {
        &self.id
    }

    /// Returns the entity type.
    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        self.schema.entity_type()
    }

    /// Returns the schema this entity is laid out by.
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reads a readable property.
    ///
    /// `id` is always readable: when the schema does not declare it, the raw
    /// form of the entity id is returned.
    pub fn get(&self, name: &str) -> MapResult<&Value> {
        match self.schema.property(name) {
            Some(property) if !property.flags().readable => Err(EntityError::NotReadable {
                entity_type: self.entity_type().clone(),
                property: name.to_string(),
            }
            .into()),
            Some(property) => Ok(&self.values[property.slot().index()]),
            None if name == ID_PROPERTY => Ok(&self.id_value),
            None => Err(self.unknown(name)),
        }
    }

    /// Writes a writable property, storing `transform(value)` and marking
    /// the entity dirty.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> MapResult<()> {
        let Some(property) = self.schema.property(name) else {
            if name == ID_PROPERTY {
                return Err(self.not_writable(name));
            }
            return Err(self.unknown(name));
        };
        if !property.flags().writable {
            return Err(self.not_writable(name));
        }

        let value = property.apply(&value.into())?;
        self.values[property.slot().index()] = value;
        self.dirty = true;
        Ok(())
    }

    /// Returns the last-seen raw input for a property.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.schema.slot(name).map(|slot| &self.raw[slot.index()])
    }

    /// Returns the last-seen raw input as a record.
    #[must_use]
    pub fn raw_record(&self) -> Record {
        self.schema
            .properties()
            .iter()
            .map(|p| (p.name().to_string(), self.raw[p.slot().index()].clone()))
            .collect()
    }

    /// Returns the persistable form of this entity: the reverse transform of
    /// every persistable property, keyed by property name.
    pub fn to_record(&self) -> MapResult<Record> {
        let mut out = Record::new();
        for property in self.schema.properties() {
            if !property.flags().persistable {
                continue;
            }
            let raw = property.reverse(&self.values[property.slot().index()])?;
            out.insert(property.name().to_string(), raw);
        }
        Ok(out)
    }

    /// Returns true if a property was written since the last load or
    /// [`Entity::mark_clean`].
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag, after the caller wrote the entity back.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn unknown(&self, name: &str) -> MapError {
        EntityError::UnknownProperty {
            entity_type: self.entity_type().clone(),
            property: name.to_string(),
        }
        .into()
    }

    fn not_writable(&self, name: &str) -> MapError {
        EntityError::NotWritable {
            entity_type: self.entity_type().clone(),
            property: name.to_string(),
        }
        .into()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("entity_type", self.entity_type())
            .field("id", &self.id)
            .field("values", &self.values)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
