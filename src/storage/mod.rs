//! In-memory tracking of entities and proxies.
//!
//! One [`IdentityMap`] exists per registered entity type. It owns every
//! tracked object; everything else holds [`EntityRef`](crate::EntityRef)s.

mod identity_map;

pub use identity_map::{IdentityMap, Tracked};
