//! Connector capability traits and the connector registry
//!
//! A connector is the pluggable adapter performing the actual call to a
//! backend endpoint of a given type. The pipeline only ever sees the small
//! capability surface below; concrete connectors (HTTP proxy, Kafka, ...)
//! live behind factories registered by a string type identifier.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::ApiType;
use crate::errors::Result;
use crate::pipeline::context::ExecutionContext;

/// Exchange modes a connector can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorMode {
    /// Plain request/response proxying
    Connect,
    /// Request/response over a message backend
    RequestResponse,
    /// Consuming messages from the backend
    Subscribe,
    /// Producing messages towards the backend
    Publish,
    /// Bidirectional socket-style exchanges
    Socket,
}

/// The connector that accepted the inbound request. The pipeline reads its
/// capabilities to know what the backend connector must support.
pub trait EntrypointConnector: Send + Sync {
    /// Entrypoint type identifier.
    fn id(&self) -> &str;

    /// The API type this entrypoint serves.
    fn supported_api(&self) -> ApiType;

    /// The connector modes the exchange requires.
    fn supported_modes(&self) -> HashSet<ConnectorMode>;
}

/// A backend endpoint connector instance, bound to one endpoint's
/// configuration for the lifetime of a deployment.
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    /// Endpoint type identifier.
    fn id(&self) -> &str;

    /// The API type this connector can serve.
    fn supported_api(&self) -> ApiType;

    /// The connector modes this connector can serve.
    fn supported_modes(&self) -> HashSet<ConnectorMode>;

    /// Perform the backend exchange for the request.
    async fn connect(&self, ctx: &mut ExecutionContext) -> Result<()>;

    /// Acquire pooled resources. Called once when the owning deployment
    /// starts.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Release pooled resources. Called once when the owning deployment
    /// stops.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Instantiates an [`EndpointConnector`] from an endpoint's configuration
/// plus the shared configuration applying to it.
///
/// Returns `None` when the configuration is invalid for this connector
/// type; the endpoint is then skipped rather than failing the deployment.
pub trait EndpointConnectorFactory: Send + Sync {
    fn create(
        &self,
        configuration: Option<&Value>,
        shared_configuration: Option<&Value>,
    ) -> Option<Arc<dyn EndpointConnector>>;
}

impl<F> EndpointConnectorFactory for F
where
    F: Fn(Option<&Value>, Option<&Value>) -> Option<Arc<dyn EndpointConnector>> + Send + Sync,
{
    fn create(
        &self,
        configuration: Option<&Value>,
        shared_configuration: Option<&Value>,
    ) -> Option<Arc<dyn EndpointConnector>> {
        self(configuration, shared_configuration)
    }
}

/// Registry of endpoint connector factories keyed by endpoint type.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: HashMap<String, Arc<dyn EndpointConnectorFactory>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the given endpoint type.
    pub fn register<S: Into<String>>(
        &mut self,
        endpoint_type: S,
        factory: Arc<dyn EndpointConnectorFactory>,
    ) {
        self.factories.insert(endpoint_type.into(), factory);
    }

    /// Look up the factory for an endpoint type.
    pub fn factory(&self, endpoint_type: &str) -> Option<&Arc<dyn EndpointConnectorFactory>> {
        self.factories.get(endpoint_type)
    }
}
