//! # Gateway Runtime
//!
//! Holds the deployed API pipelines, keyed by API id. Deployments are
//! wholesale: a redeploy builds a brand-new [`ApiPipeline`] and swaps the
//! map entry, so in-flight requests keep the pipeline they started with
//! and new requests see the new one. A redeploy whose generation is not
//! newer than the deployed one is a no-op.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::definition::Api;
use crate::endpoint::ConnectorRegistry;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use crate::pipeline::condition::ExpressionEngine;
use crate::pipeline::executor::ApiPipeline;
use crate::pipeline::policy::PolicyRegistry;

/// Owner of all deployed pipelines plus the shared collaborators they are
/// wired with. Constructed explicitly by the embedding process; nothing
/// here is a process-wide singleton.
pub struct GatewayRuntime {
    config: GatewayConfig,
    policies: Arc<PolicyRegistry>,
    connectors: Arc<ConnectorRegistry>,
    engine: Arc<dyn ExpressionEngine>,
    metrics: MetricsRecorder,
    pipelines: DashMap<String, Arc<ApiPipeline>>,
}

impl GatewayRuntime {
    pub fn new(
        config: GatewayConfig,
        policies: Arc<PolicyRegistry>,
        connectors: Arc<ConnectorRegistry>,
        engine: Arc<dyn ExpressionEngine>,
        metrics: MetricsRecorder,
    ) -> Self {
        Self { config, policies, connectors, engine, metrics, pipelines: DashMap::new() }
    }

    /// Deploy an API, replacing any previous deployment of the same id
    /// whose generation is older. Returns the live pipeline for the id.
    pub async fn deploy(&self, api: Api) -> Result<Arc<ApiPipeline>> {
        if let Some(existing) = self.pipelines.get(&api.id) {
            if existing.api().generation >= api.generation {
                warn!(
                    api = %api.id,
                    deployed = existing.api().generation,
                    offered = api.generation,
                    "Ignoring redeploy with a stale generation"
                );
                return Ok(Arc::clone(existing.value()));
            }
        }

        let id = api.id.clone();
        let generation = api.generation;
        let pipeline = Arc::new(ApiPipeline::new(
            api,
            &self.policies,
            Arc::clone(&self.connectors),
            Arc::clone(&self.engine),
            &self.config,
            self.metrics.clone(),
        )?);
        pipeline.start().await?;

        let previous = self.pipelines.insert(id.clone(), Arc::clone(&pipeline));
        if let Some(previous) = previous {
            previous.stop().await;
        }

        info!(api = %id, generation, "API deployed");
        Ok(pipeline)
    }

    /// Undeploy an API, stopping its pipeline. Unknown ids are ignored.
    pub async fn undeploy(&self, api_id: &str) {
        if let Some((_, pipeline)) = self.pipelines.remove(api_id) {
            pipeline.stop().await;
            info!(api = %api_id, "API undeployed");
        }
    }

    /// The live pipeline for an API id, if deployed.
    pub fn pipeline(&self, api_id: &str) -> Option<Arc<ApiPipeline>> {
        self.pipelines.get(api_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of deployed APIs.
    pub fn deployed(&self) -> usize {
        self.pipelines.len()
    }

    /// Stop every deployed pipeline.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.pipelines.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.undeploy(&id).await;
        }
    }
}
