//! Live endpoint topology and criteria-based selection
//!
//! The manager owns the runtime view of the deployed endpoint groups: each
//! endpoint bound to its instantiated connector and a live UP/DOWN status.
//! The topology is built wholesale on `start` (and on incremental
//! add/update/remove operations) and swapped behind one reference, so a
//! selection decision always reads a fully-old or fully-new snapshot,
//! never a mix. Status flips are atomic per endpoint.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::definition::{Api, ApiType, Endpoint, EndpointGroup, LoadBalancerType};
use crate::errors::{Error, Result};

use super::connector::{ConnectorMode, ConnectorRegistry, EndpointConnector};

/// Live status of a managed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointStatus {
    #[default]
    Up,
    Down,
}

impl EndpointStatus {
    fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            EndpointStatus::Up
        } else {
            EndpointStatus::Down
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            EndpointStatus::Up => 0,
            EndpointStatus::Down => 1,
        }
    }
}

/// Ephemeral filter used for the duration of one selection call.
#[derive(Debug, Clone, Default)]
pub struct EndpointCriteria {
    name: Option<String>,
    api_type: Option<ApiType>,
    modes: Option<HashSet<ConnectorMode>>,
    status: EndpointStatus,
}

impl EndpointCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to an endpoint or group name.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict to connectors serving the given API type.
    pub fn api_type(mut self, api_type: ApiType) -> Self {
        self.api_type = Some(api_type);
        self
    }

    /// Restrict to connectors supporting all the given modes.
    pub fn modes(mut self, modes: HashSet<ConnectorMode>) -> Self {
        self.modes = Some(modes);
        self
    }

    /// Restrict by endpoint status; defaults to UP-only.
    pub fn status(mut self, status: EndpointStatus) -> Self {
        self.status = status;
        self
    }

    fn matches_connector(&self, connector: &dyn EndpointConnector) -> bool {
        if let Some(api_type) = self.api_type {
            if connector.supported_api() != api_type {
                return false;
            }
        }
        if let Some(modes) = &self.modes {
            let supported = connector.supported_modes();
            if !modes.iter().all(|mode| supported.contains(mode)) {
                return false;
            }
        }
        true
    }
}

/// Runtime wrapper binding one deployed endpoint to its connector and
/// status.
pub struct ManagedEndpoint {
    definition: Endpoint,
    group_name: String,
    connector: Arc<dyn EndpointConnector>,
    status: AtomicU8,
}

impl ManagedEndpoint {
    fn new(definition: Endpoint, group_name: String, connector: Arc<dyn EndpointConnector>) -> Self {
        Self {
            definition,
            group_name,
            connector,
            status: AtomicU8::new(EndpointStatus::Up.as_u8()),
        }
    }

    pub fn definition(&self) -> &Endpoint {
        &self.definition
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn connector(&self) -> &Arc<dyn EndpointConnector> {
        &self.connector
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Atomic status transition; selections in flight see either the old
    /// or the new value, never a partial state.
    pub fn set_status(&self, status: EndpointStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }
}

/// Deterministic selection among a fixed candidate list.
///
/// Given the same candidate set and the same internal counter state, a
/// strategy always picks the same endpoint.
pub trait LoadBalancer: Send + Sync {
    fn select(&self, candidates: &[Arc<ManagedEndpoint>]) -> Option<Arc<ManagedEndpoint>>;
}

struct RoundRobin {
    counter: AtomicUsize,
}

impl LoadBalancer for RoundRobin {
    fn select(&self, candidates: &[Arc<ManagedEndpoint>]) -> Option<Arc<ManagedEndpoint>> {
        if candidates.is_empty() {
            return None;
        }
        let tick = self.counter.fetch_add(1, Ordering::SeqCst);
        Some(Arc::clone(&candidates[tick % candidates.len()]))
    }
}

struct WeightedRoundRobin {
    counter: AtomicUsize,
}

impl LoadBalancer for WeightedRoundRobin {
    fn select(&self, candidates: &[Arc<ManagedEndpoint>]) -> Option<Arc<ManagedEndpoint>> {
        let total: usize =
            candidates.iter().map(|e| e.definition().weight.max(1) as usize).sum();
        if total == 0 {
            return None;
        }
        let mut tick = self.counter.fetch_add(1, Ordering::SeqCst) % total;
        for candidate in candidates {
            let weight = candidate.definition().weight.max(1) as usize;
            if tick < weight {
                return Some(Arc::clone(candidate));
            }
            tick -= weight;
        }
        None
    }
}

fn balancer_for(kind: LoadBalancerType) -> Box<dyn LoadBalancer> {
    match kind {
        LoadBalancerType::RoundRobin => Box::new(RoundRobin { counter: AtomicUsize::new(0) }),
        LoadBalancerType::WeightedRoundRobin => {
            Box::new(WeightedRoundRobin { counter: AtomicUsize::new(0) })
        }
    }
}

/// Runtime wrapper around one endpoint group: its managed endpoints in
/// declaration order plus the group's load-distribution strategy.
pub struct ManagedEndpointGroup {
    definition: EndpointGroup,
    endpoints: Vec<Arc<ManagedEndpoint>>,
    balancer: Box<dyn LoadBalancer>,
}

impl ManagedEndpointGroup {
    fn new(definition: EndpointGroup, endpoints: Vec<Arc<ManagedEndpoint>>) -> Self {
        let balancer = balancer_for(definition.load_balancer);
        Self { definition, endpoints, balancer }
    }

    pub fn definition(&self) -> &EndpointGroup {
        &self.definition
    }

    pub fn endpoints(&self) -> &[Arc<ManagedEndpoint>] {
        &self.endpoints
    }

    /// Whether the group's aggregate capabilities can satisfy the
    /// criteria, regardless of individual endpoint status.
    fn satisfies(&self, criteria: &EndpointCriteria) -> bool {
        self.endpoints.iter().any(|e| criteria.matches_connector(e.connector().as_ref()))
    }

    /// Endpoints of this group individually satisfying the criteria.
    fn candidates(&self, criteria: &EndpointCriteria) -> Vec<Arc<ManagedEndpoint>> {
        self.endpoints
            .iter()
            .filter(|e| e.status() == criteria.status)
            .filter(|e| criteria.matches_connector(e.connector().as_ref()))
            .cloned()
            .collect()
    }
}

type Topology = Arc<Vec<Arc<ManagedEndpointGroup>>>;

/// Owner of the live endpoint topology.
///
/// Start/stop component: `start` instantiates and starts every connector
/// from the deployed definition, `stop` releases them all. Selection via
/// [`next`](EndpointManager::next) and resolution both read one snapshot
/// of the topology per call.
pub struct EndpointManager {
    api: Arc<Api>,
    registry: Arc<ConnectorRegistry>,
    tenant: Option<String>,
    topology: RwLock<Topology>,
    started: AtomicBool,
}

impl EndpointManager {
    /// Create a manager for the deployed API. `tenant` is the gateway's
    /// configured tenant: endpoints declaring tenant lists that do not
    /// contain it are not deployed.
    pub fn new(api: Arc<Api>, registry: Arc<ConnectorRegistry>, tenant: Option<String>) -> Self {
        Self {
            api,
            registry,
            tenant,
            topology: RwLock::new(Arc::new(Vec::new())),
            started: AtomicBool::new(false),
        }
    }

    /// Build the live topology and start every connector.
    pub async fn start(&self) -> Result<()> {
        let mut groups = Vec::with_capacity(self.api.endpoint_groups.len());
        for group_def in &self.api.endpoint_groups {
            let mut endpoints = Vec::with_capacity(group_def.endpoints.len());
            for endpoint_def in &group_def.endpoints {
                if !endpoint_def.deployable_on(self.tenant.as_deref()) {
                    debug!(
                        endpoint = %endpoint_def.name,
                        tenant = ?self.tenant,
                        "Endpoint not deployable on this tenant, skipping"
                    );
                    continue;
                }
                if let Some(managed) = self.instantiate(group_def, endpoint_def.clone()) {
                    endpoints.push(managed);
                }
            }
            groups.push(Arc::new(ManagedEndpointGroup::new(group_def.clone(), endpoints)));
        }

        for group in &groups {
            for endpoint in group.endpoints() {
                endpoint.connector().start().await?;
            }
        }

        let deployed: usize = groups.iter().map(|g| g.endpoints().len()).sum();
        info!(
            api = %self.api.id,
            groups = groups.len(),
            endpoints = deployed,
            "Endpoint topology started"
        );

        *self.topology.write().expect("endpoint topology lock poisoned") = Arc::new(groups);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop every connector, releasing pooled resources. Individual
    /// connector failures are logged and do not prevent stopping the rest.
    pub async fn stop(&self) {
        let snapshot = self.swap(Arc::new(Vec::new()));
        self.started.store(false, Ordering::SeqCst);

        for group in snapshot.iter() {
            for endpoint in group.endpoints() {
                if let Err(error) = endpoint.connector().stop().await {
                    warn!(
                        endpoint = %endpoint.definition().name,
                        %error,
                        "Endpoint connector failed to stop"
                    );
                }
            }
        }
        info!(api = %self.api.id, "Endpoint topology stopped");
    }

    /// A consistent snapshot of the current topology.
    pub fn snapshot(&self) -> Topology {
        Arc::clone(&self.topology.read().expect("endpoint topology lock poisoned"))
    }

    /// Whether `start` completed and the topology is live.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Select the next endpoint satisfying the criteria, or `None` when no
    /// candidate remains after filtering — an expected outcome (e.g. every
    /// endpoint down) the caller surfaces as a 503-class failure.
    ///
    /// Groups are considered in declaration order and the first group
    /// producing a candidate wins; only selection within that group is
    /// load-balanced.
    pub fn next(&self, criteria: &EndpointCriteria) -> Option<Arc<ManagedEndpoint>> {
        let snapshot = self.snapshot();

        for group in snapshot.iter() {
            let candidates = match &criteria.name {
                Some(name) if *name == group.definition().name => group.candidates(criteria),
                Some(name) => group
                    .candidates(criteria)
                    .into_iter()
                    .filter(|e| e.definition().name == *name)
                    .collect(),
                None => {
                    if !group.satisfies(criteria) {
                        continue;
                    }
                    group.candidates(criteria)
                }
            };

            if candidates.is_empty() {
                continue;
            }
            return group.balancer.select(&candidates);
        }
        None
    }

    /// Mark an endpoint as able to receive traffic again.
    pub fn enable(&self, endpoint: &ManagedEndpoint) {
        endpoint.set_status(EndpointStatus::Up);
    }

    /// Take an endpoint out of rotation.
    pub fn disable(&self, endpoint: &ManagedEndpoint) {
        endpoint.set_status(EndpointStatus::Down);
    }

    /// Apply a status transition pushed by a health-check collaborator.
    /// Returns false when the endpoint is not part of the live topology.
    pub fn update_status(&self, endpoint_name: &str, status: EndpointStatus) -> bool {
        let snapshot = self.snapshot();
        for group in snapshot.iter() {
            for endpoint in group.endpoints() {
                if endpoint.definition().name == endpoint_name {
                    endpoint.set_status(status);
                    return true;
                }
            }
        }
        false
    }

    /// Add an endpoint to a group, or replace the one carrying the same
    /// name. The topology is rebuilt and swapped wholesale.
    pub async fn add_or_update_endpoint(&self, group_name: &str, endpoint: Endpoint) -> Result<()> {
        let snapshot = self.snapshot();
        let group = snapshot
            .iter()
            .find(|g| g.definition().name == group_name)
            .ok_or_else(|| Error::config(format!("Unknown endpoint group '{}'", group_name)))?;

        let managed = self
            .instantiate(group.definition(), endpoint)
            .ok_or_else(|| Error::config("Endpoint connector could not be instantiated"))?;
        managed.connector().start().await?;

        let previous = self
            .rebuild(&snapshot, |g| {
                if g.definition().name != group_name {
                    return None;
                }
                let mut endpoints: Vec<Arc<ManagedEndpoint>> = g
                    .endpoints()
                    .iter()
                    .filter(|e| e.definition().name != managed.definition().name)
                    .cloned()
                    .collect();
                endpoints.push(Arc::clone(&managed));
                Some(endpoints)
            });

        // An update replaces the endpoint of the same name; its old
        // connector is no longer reachable and must release its resources.
        for endpoint in previous {
            if endpoint.definition().name == managed.definition().name {
                if let Err(error) = endpoint.connector().stop().await {
                    warn!(
                        endpoint = %endpoint.definition().name,
                        %error,
                        "Replaced endpoint failed to stop"
                    );
                }
            }
        }
        Ok(())
    }

    /// Remove an endpoint from the live topology, stopping its connector.
    pub async fn remove_endpoint(&self, endpoint_name: &str) {
        let snapshot = self.snapshot();
        let removed = self
            .rebuild(&snapshot, |g| {
                if !g.endpoints().iter().any(|e| e.definition().name == endpoint_name) {
                    return None;
                }
                Some(
                    g.endpoints()
                        .iter()
                        .filter(|e| e.definition().name != endpoint_name)
                        .cloned()
                        .collect(),
                )
            });

        for endpoint in removed {
            if endpoint.definition().name == endpoint_name {
                if let Err(error) = endpoint.connector().stop().await {
                    warn!(endpoint = %endpoint_name, %error, "Removed endpoint failed to stop");
                }
            }
        }
    }

    fn instantiate(
        &self,
        group: &EndpointGroup,
        endpoint: Endpoint,
    ) -> Option<Arc<ManagedEndpoint>> {
        let factory = match self.registry.factory(&endpoint.endpoint_type) {
            Some(factory) => factory,
            None => {
                warn!(
                    endpoint = %endpoint.name,
                    endpoint_type = %endpoint.endpoint_type,
                    "No connector factory for endpoint type, skipping endpoint"
                );
                return None;
            }
        };

        let shared = endpoint.shared_configuration(group).cloned();
        let connector = match factory.create(endpoint.configuration.as_ref(), shared.as_ref()) {
            Some(connector) => connector,
            None => {
                warn!(
                    endpoint = %endpoint.name,
                    "Connector factory rejected endpoint configuration, skipping endpoint"
                );
                return None;
            }
        };

        Some(Arc::new(ManagedEndpoint::new(endpoint, group.name.clone(), connector)))
    }

    /// Swap in a topology where `edit` rewrote the endpoint lists of the
    /// groups it returned `Some` for. Returns the endpoints of rewritten
    /// groups as they were before the edit.
    fn rebuild<F>(&self, snapshot: &Topology, edit: F) -> Vec<Arc<ManagedEndpoint>>
    where
        F: Fn(&ManagedEndpointGroup) -> Option<Vec<Arc<ManagedEndpoint>>>,
    {
        let mut previous = Vec::new();
        let groups: Vec<Arc<ManagedEndpointGroup>> = snapshot
            .iter()
            .map(|group| match edit(group) {
                Some(endpoints) => {
                    previous.extend(group.endpoints().iter().cloned());
                    Arc::new(ManagedEndpointGroup::new(group.definition().clone(), endpoints))
                }
                None => Arc::clone(group),
            })
            .collect();

        self.swap(Arc::new(groups));
        previous
    }

    fn swap(&self, topology: Topology) -> Topology {
        let mut guard = self.topology.write().expect("endpoint topology lock poisoned");
        std::mem::replace(&mut *guard, topology)
    }
}
