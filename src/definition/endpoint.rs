//! Endpoint topology definition types
//!
//! Endpoint groups and endpoints describe the candidate backends of an API.
//! Everything here is immutable deployment data; the live UP/DOWN status
//! belongs to the runtime wrappers in [`crate::endpoint`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_weight() -> u32 {
    1
}

/// Load-distribution strategy applied when selecting among a group's
/// candidate endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerType {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
}

/// A single backend endpoint declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Endpoint name, unique within the API
    pub name: String,

    /// Connector type identifier, resolved via the connector registry
    #[serde(rename = "type")]
    pub endpoint_type: String,

    /// Relative weight used by weighted load distribution
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// When true, the group's shared configuration is used instead of this
    /// endpoint's own shared-configuration override
    #[serde(default)]
    pub inherit_configuration: bool,

    /// Endpoint-specific connector configuration
    #[serde(default)]
    pub configuration: Option<Value>,

    /// Shared-configuration override, only honored when
    /// `inherit_configuration` is false
    #[serde(default)]
    pub shared_configuration_override: Option<Value>,

    /// Gateway tenants this endpoint is deployed on; empty means all
    #[serde(default)]
    pub tenants: Vec<String>,
}

impl Endpoint {
    /// The shared configuration effectively applying to this endpoint.
    pub fn shared_configuration<'a>(&'a self, group: &'a EndpointGroup) -> Option<&'a Value> {
        if self.inherit_configuration {
            group.shared_configuration.as_ref()
        } else {
            self.shared_configuration_override
                .as_ref()
                .or(group.shared_configuration.as_ref())
        }
    }

    /// Whether this endpoint is deployable on a gateway configured with the
    /// given tenant. Endpoints declaring no tenant deploy everywhere.
    pub fn deployable_on(&self, tenant: Option<&str>) -> bool {
        match tenant {
            Some(tenant) => {
                self.tenants.is_empty() || self.tenants.iter().any(|t| t == tenant)
            }
            None => true,
        }
    }
}

/// An ordered group of endpoints sharing configuration and a
/// load-distribution strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointGroup {
    /// Group name, unique within the API
    pub name: String,

    /// Connector type identifier shared by the group's endpoints
    #[serde(rename = "type")]
    pub group_type: String,

    /// Load-distribution strategy among this group's endpoints
    #[serde(default)]
    pub load_balancer: LoadBalancerType,

    /// Configuration shared by endpoints that inherit it
    #[serde(default)]
    pub shared_configuration: Option<Value>,

    /// Endpoints in declaration order
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}
