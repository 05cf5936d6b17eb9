//! Entity type lifecycle hooks.
//!
//! A proxy moves through two states, `Created` and `Resolved`; a real entity
//! is constructed directly in its loaded state. Each hook is the action of
//! one transition and runs exactly once per object and transition.

use crate::entity::Entity;
use crate::proxy::Proxy;

/// Per-type initialization callbacks supplied alongside a schema.
///
/// All methods default to no-ops.
pub trait EntityHooks: Send + Sync {
    /// A proxy was created for an id that was not tracked yet. The proxy is
    /// unresolved: only its id is available.
    fn proxy_created(&self, proxy: &mut Proxy) {
        let _ = proxy;
    }

    /// A new real entity was constructed from a raw record.
    fn constructed(&self, entity: &mut Entity) {
        let _ = entity;
    }

    /// A tracked proxy was bound to its loaded entity. Reads and writes on
    /// `proxy` now reach the delegate.
    fn resolved(&self, proxy: &mut Proxy) {
        let _ = proxy;
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}
