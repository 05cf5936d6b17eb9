//! Error types for kyromap.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the exact condition: a broken schema, a lookup or access that cannot be
//! served, or a property transform that rejected its input.

use thiserror::Error;

use crate::entity::{EntityId, EntityType};

/// Errors raised while materializing or registering a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A property was declared without a transform.
    #[error("Property '{property}' of entity type '{entity_type}' has no transform")]
    MissingTransform {
        /// Name of the schema being built.
        entity_type: String,
        /// Offending property.
        property: String,
    },

    /// Two definitions share one name.
    #[error("Property '{property}' is declared more than once on entity type '{entity_type}'")]
    DuplicateProperty {
        /// Name of the schema being built.
        entity_type: String,
        /// Repeated property name.
        property: String,
    },

    /// A type or property name is not an identifier.
    #[error("Invalid {kind} name '{name}'")]
    InvalidName {
        /// `"entity type"` or `"property"`.
        kind: &'static str,
        /// The rejected name.
        name: String,
    },

    /// The manager already holds a schema for this type.
    #[error("Entity type '{entity_type}' is already registered")]
    DuplicateEntityType {
        /// The type registered twice.
        entity_type: EntityType,
    },
}

/// Errors raised by identity-map lookups and entity/proxy access.
///
/// Every variant names the entity type it was raised for.
#[derive(Debug, Error)]
pub enum EntityError {
    /// `get` found nothing tracked for the id.
    #[error("{entity_type}#{id} is not loaded")]
    NotLoaded {
        /// Entity type looked up.
        entity_type: EntityType,
        /// Id looked up.
        id: EntityId,
    },

    /// Data access on a proxy that has not been resolved yet.
    #[error("Proxy {entity_type}#{id} accessed before it was resolved")]
    NotLoadable {
        /// Entity type of the proxy.
        entity_type: EntityType,
        /// Id captured by the proxy.
        id: EntityId,
    },

    /// No schema is registered for the type.
    #[error("Entity type '{entity_type}' is not registered")]
    UnknownEntityType {
        /// The unregistered type.
        entity_type: EntityType,
    },

    /// The schema declares no such property.
    #[error("Entity type '{entity_type}' has no property '{property}'")]
    UnknownProperty {
        /// Entity type accessed.
        entity_type: EntityType,
        /// Requested property name.
        property: String,
    },

    /// Read of a property whose `readable` flag is off.
    #[error("Property '{property}' of '{entity_type}' is not readable")]
    NotReadable {
        /// Entity type accessed.
        entity_type: EntityType,
        /// Hidden property.
        property: String,
    },

    /// Write of a property whose `writable` flag is off, or of `id`.
    #[error("Property '{property}' of '{entity_type}' is not writable")]
    NotWritable {
        /// Entity type accessed.
        entity_type: EntityType,
        /// Read-only property.
        property: String,
    },

    /// A record passed to `construct` has no `id`.
    #[error("Record for '{entity_type}' carries no id")]
    MissingId {
        /// Entity type constructed.
        entity_type: EntityType,
    },

    /// The record's `id` is not an int or a non-empty string.
    #[error("Record for '{entity_type}' carries an invalid id ({found})")]
    InvalidId {
        /// Entity type constructed.
        entity_type: EntityType,
        /// Type name of the value found under `id`.
        found: &'static str,
    },

    /// `update` received a record carrying another entity's id.
    #[error("Record for {entity_type}#{expected} carries id {found}")]
    IdMismatch {
        /// Entity type updated.
        entity_type: EntityType,
        /// Id of the updated entity.
        expected: EntityId,
        /// Id found in the record.
        found: EntityId,
    },

    /// Strict mode rejected a record key the schema does not declare.
    #[error("Record for '{entity_type}' carries unknown field '{field}'")]
    UnknownField {
        /// Entity type of the record.
        entity_type: EntityType,
        /// Undeclared key.
        field: String,
    },

    /// The reference's kind disagrees with what is tracked for its id.
    #[error("Reference {entity_type}#{id} does not match the tracked object")]
    StaleReference {
        /// Entity type of the reference.
        entity_type: EntityType,
        /// Id of the reference.
        id: EntityId,
    },
}

/// Failure reported by a property transform or reverse transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The input value has the wrong variant.
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        /// What the transform accepts.
        expected: &'static str,
        /// Type name of the value it got.
        actual: &'static str,
    },

    /// The input has the right variant but cannot be parsed.
    #[error("{reason}")]
    Invalid {
        /// Parser message.
        reason: String,
    },
}

impl TransformError {
    /// Creates an `Invalid` transform error.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for kyromap.
#[derive(Debug, Error)]
pub enum MapError {
    /// Schema materialization or registration failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Lookup or access failed.
    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    /// A transform rejected the value of a property.
    #[error("Transform of property '{property}' failed: {source}")]
    Transform {
        /// Property being transformed.
        property: String,
        /// What the transform reported.
        #[source]
        source: TransformError,
    },
}

impl MapError {
    /// Wraps a transform failure with the property it happened on.
    #[must_use]
    pub fn transform(property: impl Into<String>, source: TransformError) -> Self {
        Self::Transform {
            property: property.into(),
            source,
        }
    }

    /// Returns true if this is a schema error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if this is an entity lookup/access error.
    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }

    /// Returns true if a transform rejected its input.
    #[must_use]
    pub const fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }

    /// Returns true if `get` found nothing tracked for the id.
    #[must_use]
    pub const fn is_not_loaded(&self) -> bool {
        matches!(self, Self::Entity(EntityError::NotLoaded { .. }))
    }

    /// Returns true if an unresolved proxy was accessed.
    #[must_use]
    pub const fn is_not_loadable(&self) -> bool {
        matches!(self, Self::Entity(EntityError::NotLoadable { .. }))
    }
}

/// Result type alias for kyromap operations.
pub type MapResult<T> = Result<T, MapError>;
