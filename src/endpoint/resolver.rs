//! Endpoint connector resolution
//!
//! Given the entrypoint connector that accepted a request, finds the first
//! backend connector able to serve the same API type and all the required
//! connector modes. First declared match wins, in group-then-endpoint
//! order; returning `None` is an expected routing failure, not an error.

use std::sync::Arc;

use crate::pipeline::context::{ExecutionContext, ATTR_INTERNAL_ENTRYPOINT_CONNECTOR};

use super::connector::{EndpointConnector, EntrypointConnector};
use super::manager::EndpointManager;

/// Resolves the backend connector for a request from the live topology.
pub struct EndpointConnectorResolver {
    manager: Arc<EndpointManager>,
}

impl EndpointConnectorResolver {
    pub fn new(manager: Arc<EndpointManager>) -> Self {
        Self { manager }
    }

    /// Return the first connector satisfying the entrypoint's requirements,
    /// or `None` when no entrypoint was attached to the context or no
    /// connector qualifies. The caller treats `None` as a routing failure
    /// and must not retry.
    pub fn resolve(&self, ctx: &ExecutionContext) -> Option<Arc<dyn EndpointConnector>> {
        let entrypoint = ctx
            .internal_attribute::<Arc<dyn EntrypointConnector>>(ATTR_INTERNAL_ENTRYPOINT_CONNECTOR)?;

        let required_api = entrypoint.supported_api();
        let required_modes = entrypoint.supported_modes();

        let snapshot = self.manager.snapshot();
        for group in snapshot.iter() {
            for endpoint in group.endpoints() {
                let connector = endpoint.connector();
                if connector.supported_api() != required_api {
                    continue;
                }
                let supported = connector.supported_modes();
                if required_modes.iter().all(|mode| supported.contains(mode)) {
                    return Some(Arc::clone(connector));
                }
            }
        }
        None
    }
}
