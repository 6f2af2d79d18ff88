//! Plan and policy reference definition types

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_enabled() -> bool {
    true
}

/// Reference to a policy plugin: a string identifier plus opaque
/// configuration, resolved into a live policy instance at deployment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRef {
    /// Policy plugin identifier
    pub policy: String,

    /// Opaque plugin configuration, handed to the factory as-is
    #[serde(default)]
    pub configuration: Option<Value>,

    /// Disabled steps are skipped when building chains
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl PolicyRef {
    /// Reference a policy by id with no configuration.
    pub fn new<S: Into<String>>(policy: S) -> Self {
        Self { policy: policy.into(), configuration: None, enabled: true }
    }

    /// Reference a policy by id with the given configuration.
    pub fn with_configuration<S: Into<String>>(policy: S, configuration: Value) -> Self {
        Self { policy: policy.into(), configuration: Some(configuration), enabled: true }
    }
}

/// A subscription plan: one security policy plus an optional selection rule.
///
/// A tenant's API owns an ordered list of plans; the security chain walks
/// them in ascending security-policy order and the first plan whose policy
/// accepts the request wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan identifier
    pub id: String,

    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// The plan's security policy (id + configuration)
    pub security: PolicyRef,

    /// Optional expression further restricting when this plan applies
    #[serde(default)]
    pub selection_rule: Option<String>,
}

impl Plan {
    /// Plan name for logs, falling back to the id.
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }
}
