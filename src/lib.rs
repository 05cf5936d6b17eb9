//! # kyromap - identity map with lazy-loading proxies
//!
//! kyromap guarantees that a logical record, identified by entity type and
//! id, is represented by at most one tracked object per session. References
//! to records that are not loaded yet are cheap: they are proxies that
//! resolve in place when the record's data arrives, so every reference
//! handed out earlier stays valid.
//!
//! ## Core Concepts
//!
//! - **Schema**: the declared properties of an entity type, each with a
//!   transform, a reverse transform and access flags
//! - **Entity**: one loaded record, holding raw input and transformed values
//! - **Proxy**: a stand-in for an entity that is referenced before it is loaded
//! - **EntityManager**: the identity map; constructs, resolves and looks up
//! - **EntityRef**: a tagged handle (real or proxy) to a tracked object
//!
//! ## Usage
//!
//! ```rust
//! use kyromap::{record, transform, EntityManager, PropertyDefinition, Schema, Value};
//!
//! let mut manager = EntityManager::new();
//! let order = manager.register(
//!     Schema::builder("order")
//!         .property(PropertyDefinition::new("id").codec(transform::identity()))
//!         .property(PropertyDefinition::new("customer").codec(transform::reference()))
//!         .build()?,
//! )?;
//!
//! let o = manager.construct(&order, &record! { "id" => 1, "customer" => 42 })?;
//! assert!(manager.read(&o, "customer")?.is_entity());
//! # Ok::<(), kyromap::MapError>(())
//! ```
//!
//! The manager does no I/O and no locking; hosts that share it between
//! threads wrap it in their own lock.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod proxy;
pub mod reference;
pub mod schema;
pub mod storage;
pub mod transform;
pub mod value;

// Re-export primary types at crate root for convenience
pub use config::ManagerConfig;
pub use entity::{Entity, EntityId, EntityType};
pub use error::{EntityError, MapError, MapResult, SchemaError, TransformError};
pub use hooks::{EntityHooks, NoHooks};
pub use manager::EntityManager;
pub use proxy::{ForwardingAccessor, Lifecycle, Proxy, ProxyFactory, ProxyType};
pub use reference::{EntityRef, RefKind};
pub use schema::{Property, PropertyDefinition, PropertyFlags, Schema, SchemaBuilder, Slot};
pub use transform::Transform;
pub use value::{Record, Value};
