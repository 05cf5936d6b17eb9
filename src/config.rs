//! Entity manager configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`EntityManager`](crate::EntityManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Initial identity-map capacity per entity type.
    pub type_capacity: usize,
    /// Reject raw records carrying fields the schema does not declare.
    pub strict_fields: bool,
    /// Run `EntityHooks::proxy_created` when a proxy is created.
    pub run_proxy_hooks: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            type_capacity: 64,
            strict_fields: false,
            run_proxy_hooks: true,
        }
    }
}

impl ManagerConfig {
    /// Parses a configuration from JSON; absent keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
