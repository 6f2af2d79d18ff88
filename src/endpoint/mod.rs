//! # Endpoint Runtime
//!
//! The live side of the backend topology: connectors instantiated from the
//! deployed endpoint groups, the manager owning their UP/DOWN status and
//! criteria-based selection, and the resolver picking the connector that
//! serves a request's entrypoint requirements.

pub mod connector;
pub mod manager;
pub mod resolver;

pub use connector::{
    ConnectorMode, ConnectorRegistry, EndpointConnector, EndpointConnectorFactory,
    EntrypointConnector,
};
pub use manager::{
    EndpointCriteria, EndpointManager, EndpointStatus, ManagedEndpoint, ManagedEndpointGroup,
};
pub use resolver::EndpointConnectorResolver;
