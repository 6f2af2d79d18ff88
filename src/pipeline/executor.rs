//! Per-API pipeline wiring and phase orchestration
//!
//! An [`ApiPipeline`] owns everything one deployed API needs to execute
//! requests: the flow selector, the security chain, the per-flow policy
//! instances (resolved once at deployment), the endpoint manager, and the
//! connector resolver. All collaborators are injected at construction —
//! there are no process-wide singletons.
//!
//! The transport layer drives a request through `handle_request`, invokes
//! the returned connector itself, then calls `handle_response`. Message
//! APIs additionally run `handle_message` per message.

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::definition::{Api, Flow};
use crate::endpoint::{ConnectorRegistry, EndpointConnector, EndpointConnectorResolver, EndpointManager};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;

use super::chain::PolicyChain;
use super::condition::{ExpressionEngine, FlowSelector};
use super::context::{
    ExecutionContext, ExecutionFailure, ATTR_INTERNAL_ENDPOINT_CONNECTOR, ATTR_INTERNAL_FLOWS,
};
use super::path::PathMatcherCache;
use super::policy::{Policy, PolicyRegistry};
use super::security::SecurityChain;
use super::ExecutionPhase;

/// Failure key set when no backend endpoint can serve the request.
pub const ENDPOINT_UNAVAILABLE_KEY: &str = "GATEWAY_ENDPOINT_UNAVAILABLE";

const NO_ENDPOINT_MESSAGE: &str = "No endpoint available";

/// A flow with its policy steps resolved into live instances, one set per
/// phase. Resolution happens once per deployment; disabled steps and steps
/// the registry cannot resolve are dropped here.
struct ResolvedFlow {
    definition: Arc<Flow>,
    request: Vec<Arc<dyn Policy>>,
    response: Vec<Arc<dyn Policy>>,
    publish: Vec<Arc<dyn Policy>>,
    subscribe: Vec<Arc<dyn Policy>>,
}

impl ResolvedFlow {
    fn policies(&self, phase: ExecutionPhase) -> &[Arc<dyn Policy>] {
        match phase {
            ExecutionPhase::Request => &self.request,
            ExecutionPhase::Response => &self.response,
            ExecutionPhase::AsyncRequest => &self.publish,
            ExecutionPhase::AsyncResponse => &self.subscribe,
        }
    }
}

/// The execution pipeline of one deployed API.
pub struct ApiPipeline {
    api: Arc<Api>,
    selector: FlowSelector,
    flows: Vec<ResolvedFlow>,
    security: SecurityChain,
    endpoint_manager: Arc<EndpointManager>,
    resolver: EndpointConnectorResolver,
    metrics: MetricsRecorder,
}

impl ApiPipeline {
    /// Wire the pipeline for a deployed API.
    ///
    /// Fails when a flow declares a path template that does not compile;
    /// malformed templates surface here, at deploy time, not per request.
    pub fn new(
        api: Api,
        policies: &PolicyRegistry,
        connectors: Arc<ConnectorRegistry>,
        engine: Arc<dyn ExpressionEngine>,
        config: &GatewayConfig,
        metrics: MetricsRecorder,
    ) -> Result<Self> {
        let api = Arc::new(api);

        let cache = Arc::new(PathMatcherCache::new());
        for flow in &api.flows {
            cache.matcher(&flow.path)?;
        }

        let definitions: Vec<Arc<Flow>> = api.flows.iter().cloned().map(Arc::new).collect();
        let flows = definitions
            .iter()
            .map(|definition| ResolvedFlow {
                definition: Arc::clone(definition),
                request: resolve_steps(policies, definition, ExecutionPhase::Request),
                response: resolve_steps(policies, definition, ExecutionPhase::Response),
                publish: resolve_steps(policies, definition, ExecutionPhase::AsyncRequest),
                subscribe: resolve_steps(policies, definition, ExecutionPhase::AsyncResponse),
            })
            .collect();

        let selector = FlowSelector::new(definitions, cache, engine);
        let security = SecurityChain::new(&api.plans, policies);
        let endpoint_manager =
            Arc::new(EndpointManager::new(Arc::clone(&api), connectors, config.tenant.clone()));
        let resolver = EndpointConnectorResolver::new(Arc::clone(&endpoint_manager));

        Ok(Self { api, selector, flows, security, endpoint_manager, resolver, metrics })
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    pub fn endpoint_manager(&self) -> &Arc<EndpointManager> {
        &self.endpoint_manager
    }

    /// Start the pipeline's endpoint topology.
    pub async fn start(&self) -> Result<()> {
        self.endpoint_manager.start().await
    }

    /// Stop the pipeline, releasing every connector.
    pub async fn stop(&self) {
        self.endpoint_manager.stop().await;
    }

    /// Run the request phases: flow selection, security, REQUEST chains,
    /// endpoint resolution.
    ///
    /// Returns the connector the transport must invoke, or `None` when the
    /// context was interrupted along the way (the interruption payload
    /// tells the transport what to render). A returned error is a policy
    /// fault, to be mapped to a generic failure response by the caller.
    pub async fn handle_request(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<Arc<dyn EndpointConnector>>> {
        let started = Instant::now();
        self.metrics.record_request(&self.api.id);

        let selected = self.selector.select_indices(ctx);
        debug!(
            api = %self.api.id,
            request = %ctx.request().id,
            flows = selected.len(),
            "Flows selected"
        );
        ctx.set_internal_attribute(ATTR_INTERNAL_FLOWS, selected.clone());

        let outcome = self.run_request_phases(ctx, &selected).await;
        self.metrics.record_request_duration(&self.api.id, started.elapsed().as_secs_f64());

        match outcome {
            Ok(connector) => {
                if ctx.is_interrupted() {
                    self.metrics.record_interruption(
                        &self.api.id,
                        ctx.interruption().and_then(|f| f.key.as_deref()),
                    );
                }
                Ok(connector)
            }
            Err(error) => {
                self.metrics.record_fault(&self.api.id);
                Err(error)
            }
        }
    }

    async fn run_request_phases(
        &self,
        ctx: &mut ExecutionContext,
        selected: &[usize],
    ) -> Result<Option<Arc<dyn EndpointConnector>>> {
        self.security.execute(ctx).await?;
        if ctx.is_interrupted() {
            return Ok(None);
        }

        self.execute_phase(ctx, selected, ExecutionPhase::Request).await?;
        if ctx.is_interrupted() {
            return Ok(None);
        }

        match self.resolver.resolve(ctx) {
            Some(connector) => {
                ctx.set_internal_attribute(
                    ATTR_INTERNAL_ENDPOINT_CONNECTOR,
                    Arc::clone(&connector),
                );
                Ok(Some(connector))
            }
            None => {
                self.metrics.record_no_endpoint(&self.api.id);
                ctx.interrupt_with(
                    ExecutionFailure::new(StatusCode::SERVICE_UNAVAILABLE)
                        .key(ENDPOINT_UNAVAILABLE_KEY)
                        .message(NO_ENDPOINT_MESSAGE),
                );
                Ok(None)
            }
        }
    }

    /// Run the RESPONSE chains of the flows selected for this request.
    /// Called by the transport after the backend exchange completed.
    pub async fn handle_response(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let selected = ctx
            .internal_attribute::<Vec<usize>>(ATTR_INTERNAL_FLOWS)
            .cloned()
            .unwrap_or_default();

        self.execute_phase(ctx, &selected, ExecutionPhase::Response).await.inspect_err(|_| {
            self.metrics.record_fault(&self.api.id);
        })
    }

    /// Run the message-level chains for one message of an async exchange.
    pub async fn handle_message(
        &self,
        ctx: &mut ExecutionContext,
        phase: ExecutionPhase,
    ) -> Result<()> {
        if !matches!(phase, ExecutionPhase::AsyncRequest | ExecutionPhase::AsyncResponse) {
            return Err(Error::internal(format!(
                "Phase {} is not a message-level phase",
                phase
            )));
        }

        let selected = ctx
            .internal_attribute::<Vec<usize>>(ATTR_INTERNAL_FLOWS)
            .cloned()
            .unwrap_or_default();

        self.execute_phase(ctx, &selected, phase).await
    }

    /// Execute one phase's chain for each selected flow, in flow order.
    /// A chain instance serves exactly one execution, so chains are built
    /// here per call over the deployment-resolved policy instances.
    async fn execute_phase(
        &self,
        ctx: &mut ExecutionContext,
        selected: &[usize],
        phase: ExecutionPhase,
    ) -> Result<()> {
        for &index in selected {
            if ctx.is_interrupted() {
                return Ok(());
            }
            let flow = &self.flows[index];
            let policies = flow.policies(phase);
            if policies.is_empty() {
                continue;
            }
            PolicyChain::new(flow.definition.display_name(), phase, policies.to_vec())
                .execute(ctx)
                .await?;
        }
        Ok(())
    }
}

fn resolve_steps(
    registry: &PolicyRegistry,
    flow: &Flow,
    phase: ExecutionPhase,
) -> Vec<Arc<dyn Policy>> {
    flow.steps(phase)
        .iter()
        .filter(|step| step.enabled)
        .filter_map(|step| registry.policy(step))
        .collect()
}
