//! API definition type
//!
//! The root of the deployed model: an [`Api`] owns its flows, plans, and
//! endpoint topology for one deployment generation.

use serde::{Deserialize, Serialize};

use super::{Endpoint, EndpointGroup, Flow, Plan};

/// Kind of API the gateway is executing, determining which connectors can
/// serve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// Synchronous request/response proxying
    #[default]
    Proxy,
    /// Asynchronous message-level exchanges
    Message,
}

/// A deployed API definition.
///
/// Immutable per deployment generation: a redeploy carries a new
/// `generation` and replaces the whole value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Api {
    /// API identifier, unique across tenants
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Kind of API (proxy or message)
    #[serde(default)]
    pub api_type: ApiType,

    /// Deployment generation, monotonically increasing per redeploy
    #[serde(default)]
    pub generation: u64,

    /// Flows in declaration order
    #[serde(default)]
    pub flows: Vec<Flow>,

    /// Subscription plans in declaration order
    #[serde(default)]
    pub plans: Vec<Plan>,

    /// Endpoint groups in declaration order
    #[serde(default)]
    pub endpoint_groups: Vec<EndpointGroup>,
}

impl Api {
    /// Iterate every endpoint of every group, in declaration order.
    pub fn endpoints(&self) -> impl Iterator<Item = (&EndpointGroup, &Endpoint)> {
        self.endpoint_groups
            .iter()
            .flat_map(|group| group.endpoints.iter().map(move |endpoint| (group, endpoint)))
    }
}
