//! End-to-end execution of a deployed API: security, flow policies,
//! endpoint resolution, backend invocation, and response policies — the
//! way a transport layer would drive the pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderValue, Method, StatusCode};
use serde_json::{json, Value};

use gateplane::config::GatewayConfig;
use gateplane::definition::{
    Api, ApiType, Endpoint, EndpointGroup, Flow, LoadBalancerType, PathOperator, Plan, PolicyRef,
};
use gateplane::endpoint::{
    ConnectorMode, ConnectorRegistry, EndpointConnector, EntrypointConnector,
};
use gateplane::errors::{Error, Result};
use gateplane::observability::MetricsRecorder;
use gateplane::pipeline::condition::ExpressionEngine;
use gateplane::pipeline::context::{
    ExecutionContext, ExecutionFailure, Request, ATTR_INTERNAL_ENTRYPOINT_CONNECTOR, ATTR_PLAN,
};
use gateplane::pipeline::executor::ENDPOINT_UNAVAILABLE_KEY;
use gateplane::pipeline::policy::{Policy, PolicyRegistry, SecurityPolicy};
use gateplane::pipeline::security::PLAN_UNRESOLVABLE_KEY;
use gateplane::GatewayRuntime;

const VALID_KEY: &str = "opensesame";

/// Security policy accepting requests carrying an `x-api-key` header and
/// authenticating only the configured key value.
struct ApiKeyPolicy {
    expected: String,
}

#[async_trait]
impl Policy for ApiKeyPolicy {
    fn id(&self) -> &str {
        "api-key"
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let presented = ctx
            .request()
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if presented != self.expected {
            ctx.interrupt_with(
                ExecutionFailure::new(StatusCode::UNAUTHORIZED)
                    .key("API_KEY_INVALID")
                    .message(r#"{"message":"API key is not valid"}"#)
                    .content_type(mime::APPLICATION_JSON.as_ref()),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityPolicy for ApiKeyPolicy {
    async fn support(&self, ctx: &ExecutionContext) -> Result<bool> {
        Ok(ctx.request().headers.contains_key("x-api-key"))
    }
}

/// Transformation policy stamping a header on the request or the response,
/// depending on the phase it runs in.
struct HeaderStampPolicy {
    header: &'static str,
    value: String,
}

#[async_trait]
impl Policy for HeaderStampPolicy {
    fn id(&self) -> &str {
        "header-stamp"
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let value = HeaderValue::from_str(&self.value)
            .map_err(|e| Error::policy("header-stamp", e.to_string()))?;
        ctx.request_mut().headers.insert(self.header, value);
        Ok(())
    }

    async fn on_response(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let value = HeaderValue::from_str(&self.value)
            .map_err(|e| Error::policy("header-stamp", e.to_string()))?;
        ctx.response_mut().headers.insert(self.header, value);
        Ok(())
    }
}

/// Backend connector answering 200 with its own name as the body.
struct EchoBackend {
    name: String,
}

#[async_trait]
impl EndpointConnector for EchoBackend {
    fn id(&self) -> &str {
        &self.name
    }

    fn supported_api(&self) -> ApiType {
        ApiType::Proxy
    }

    fn supported_modes(&self) -> HashSet<ConnectorMode> {
        HashSet::from([ConnectorMode::Connect])
    }

    async fn connect(&self, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.response_mut().status = StatusCode::OK;
        ctx.response_mut().body = bytes::Bytes::from(self.name.clone());
        Ok(())
    }
}

struct HttpEntrypoint;

impl EntrypointConnector for HttpEntrypoint {
    fn id(&self) -> &str {
        "http"
    }

    fn supported_api(&self) -> ApiType {
        ApiType::Proxy
    }

    fn supported_modes(&self) -> HashSet<ConnectorMode> {
        HashSet::from([ConnectorMode::Connect])
    }
}

/// Expression engine satisfying only the "internal network" condition when
/// the request carries the matching header.
struct HeaderEngine;

impl ExpressionEngine for HeaderEngine {
    fn evaluate_bool(&self, expression: &str, ctx: &ExecutionContext) -> Result<bool> {
        match expression {
            "request.internal" => Ok(ctx.request().headers.contains_key("x-internal")),
            other => Err(Error::internal(format!("unknown expression '{}'", other))),
        }
    }
}

fn registries() -> (Arc<PolicyRegistry>, Arc<ConnectorRegistry>) {
    let mut policies = PolicyRegistry::new();
    policies.register_security(
        "api-key",
        Arc::new(|config: Option<&Value>| -> Result<Arc<dyn SecurityPolicy>> {
            let expected = config
                .and_then(|c| c.get("key"))
                .and_then(|k| k.as_str())
                .ok_or_else(|| Error::policy("api-key", "missing 'key' in configuration"))?
                .to_string();
            Ok(Arc::new(ApiKeyPolicy { expected }))
        }),
    );
    policies.register(
        "header-stamp",
        Arc::new(|config: Option<&Value>| -> Result<Arc<dyn Policy>> {
            let value = config
                .and_then(|c| c.get("value"))
                .and_then(|v| v.as_str())
                .unwrap_or("gateplane")
                .to_string();
            Ok(Arc::new(HeaderStampPolicy { header: "x-gateway", value }))
        }),
    );

    let mut connectors = ConnectorRegistry::new();
    connectors.register(
        "echo",
        Arc::new(|config: Option<&Value>, _shared: Option<&Value>| {
            let name = config
                .and_then(|c| c.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or("echo")
                .to_string();
            Some(Arc::new(EchoBackend { name }) as Arc<dyn EndpointConnector>)
        }),
    );

    (Arc::new(policies), Arc::new(connectors))
}

fn orders_api() -> Api {
    Api {
        id: "orders-api".to_string(),
        name: "orders".to_string(),
        api_type: ApiType::Proxy,
        generation: 1,
        flows: vec![
            Flow {
                name: Some("orders".to_string()),
                path: "/orders".to_string(),
                operator: PathOperator::StartsWith,
                request: vec![PolicyRef::with_configuration(
                    "header-stamp",
                    json!({ "value": "request-stamped" }),
                )],
                response: vec![PolicyRef::with_configuration(
                    "header-stamp",
                    json!({ "value": "response-stamped" }),
                )],
                ..Default::default()
            },
            Flow {
                name: Some("internal-only".to_string()),
                path: "/orders/internal".to_string(),
                operator: PathOperator::StartsWith,
                condition: Some("request.internal".to_string()),
                request: vec![PolicyRef::with_configuration(
                    "header-stamp",
                    json!({ "value": "internal-stamped" }),
                )],
                ..Default::default()
            },
        ],
        plans: vec![Plan {
            id: "gold".to_string(),
            name: Some("Gold".to_string()),
            security: PolicyRef::with_configuration("api-key", json!({ "key": VALID_KEY })),
            selection_rule: None,
        }],
        endpoint_groups: vec![EndpointGroup {
            name: "backends".to_string(),
            group_type: "echo".to_string(),
            load_balancer: LoadBalancerType::RoundRobin,
            shared_configuration: None,
            endpoints: vec![
                Endpoint {
                    name: "backend-1".to_string(),
                    endpoint_type: "echo".to_string(),
                    weight: 1,
                    inherit_configuration: true,
                    configuration: Some(json!({ "name": "backend-1" })),
                    shared_configuration_override: None,
                    tenants: Vec::new(),
                },
                Endpoint {
                    name: "backend-2".to_string(),
                    endpoint_type: "echo".to_string(),
                    weight: 1,
                    inherit_configuration: true,
                    configuration: Some(json!({ "name": "backend-2" })),
                    shared_configuration_override: None,
                    tenants: Vec::new(),
                },
            ],
        }],
    }
}

async fn a_runtime() -> GatewayRuntime {
    let (policies, connectors) = registries();
    let runtime = GatewayRuntime::new(
        GatewayConfig::default(),
        policies,
        connectors,
        Arc::new(HeaderEngine),
        MetricsRecorder::new(),
    );
    runtime.deploy(orders_api()).await.expect("API deploys");
    runtime
}

fn a_request(path: &str, api_key: Option<&str>) -> ExecutionContext {
    let mut request = Request::new(Method::GET, path);
    if let Some(key) = api_key {
        request.headers.insert("x-api-key", HeaderValue::from_str(key).unwrap());
    }
    let mut ctx = ExecutionContext::new(request);
    ctx.set_internal_attribute(
        ATTR_INTERNAL_ENTRYPOINT_CONNECTOR,
        Arc::new(HttpEntrypoint) as Arc<dyn EntrypointConnector>,
    );
    ctx
}

/// Drive a context the way the transport would: request phases, backend
/// invocation, response phases.
async fn roundtrip(runtime: &GatewayRuntime, mut ctx: ExecutionContext) -> ExecutionContext {
    let pipeline = runtime.pipeline("orders-api").expect("deployed");

    let connector = pipeline.handle_request(&mut ctx).await.expect("no fault");
    if let Some(connector) = connector {
        connector.connect(&mut ctx).await.expect("backend answers");
    }
    pipeline.handle_response(&mut ctx).await.expect("no fault");
    ctx
}

#[tokio::test]
async fn authorized_request_reaches_the_backend() {
    let runtime = a_runtime().await;

    let ctx = roundtrip(&runtime, a_request("/orders/42", Some(VALID_KEY))).await;

    assert!(!ctx.is_interrupted());
    assert_eq!(ctx.response().status, StatusCode::OK);
    assert_eq!(ctx.response().body.as_ref(), b"backend-1");
    // The request-phase policy stamped the upstream request, the
    // response-phase policy the downstream response.
    assert_eq!(
        ctx.request().headers.get("x-gateway").unwrap(),
        &HeaderValue::from_static("request-stamped")
    );
    assert_eq!(
        ctx.response().headers.get("x-gateway").unwrap(),
        &HeaderValue::from_static("response-stamped")
    );
    assert_eq!(ctx.attribute(ATTR_PLAN), Some(&json!("gold")));
}

#[tokio::test]
async fn request_without_credentials_gets_plan_unresolvable() {
    let runtime = a_runtime().await;

    let ctx = roundtrip(&runtime, a_request("/orders/42", None)).await;

    assert!(ctx.is_interrupted());
    assert_eq!(ctx.response().status, StatusCode::UNAUTHORIZED);
    let failure = ctx.interruption().expect("failure payload");
    assert_eq!(failure.key.as_deref(), Some(PLAN_UNRESOLVABLE_KEY));
    assert_eq!(failure.message.as_deref(), Some("Unauthorized"));
    assert!(failure.parameters.is_empty());
    assert!(failure.content_type.is_none());
    // The backend was never reached.
    assert!(ctx.response().body.is_empty());
}

#[tokio::test]
async fn request_with_a_wrong_key_is_rejected_by_the_accepted_plan() {
    let runtime = a_runtime().await;

    let ctx = roundtrip(&runtime, a_request("/orders/42", Some("wrong"))).await;

    assert!(ctx.is_interrupted());
    assert_eq!(ctx.response().status, StatusCode::UNAUTHORIZED);
    let failure = ctx.interruption().expect("failure payload");
    assert_eq!(failure.key.as_deref(), Some("API_KEY_INVALID"));
    assert_eq!(failure.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn conditional_flow_applies_only_when_its_expression_holds() {
    let runtime = a_runtime().await;

    // Without the x-internal header the expression engine returns false,
    // so only the general orders flow stamps the request.
    let ctx = roundtrip(&runtime, a_request("/orders/internal/peek", Some(VALID_KEY))).await;
    assert_eq!(
        ctx.request().headers.get("x-gateway").unwrap(),
        &HeaderValue::from_static("request-stamped")
    );

    // With it, the internal flow runs after the general one and wins.
    let mut authorized = a_request("/orders/internal/peek", Some(VALID_KEY));
    authorized
        .request_mut()
        .headers
        .insert("x-internal", HeaderValue::from_static("1"));
    let ctx = roundtrip(&runtime, authorized).await;
    assert_eq!(
        ctx.request().headers.get("x-gateway").unwrap(),
        &HeaderValue::from_static("internal-stamped")
    );
}

#[tokio::test]
async fn resolution_is_first_declared_match_while_next_rotates() {
    let runtime = a_runtime().await;
    let pipeline = runtime.pipeline("orders-api").expect("deployed");

    // Resolution is deterministic: always the first declared match.
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let mut ctx = a_request("/orders/42", Some(VALID_KEY));
        let connector =
            pipeline.handle_request(&mut ctx).await.expect("no fault").expect("a connector");
        connector.connect(&mut ctx).await.expect("backend answers");
        bodies.push(String::from_utf8(ctx.response().body.to_vec()).unwrap());
    }
    assert!(bodies.iter().all(|b| b == "backend-1"));

    // Criteria-based selection on the manager load-balances within the
    // group.
    use gateplane::endpoint::EndpointCriteria;
    let manager = pipeline.endpoint_manager();
    let picks: Vec<String> = (0..4)
        .map(|_| {
            manager
                .next(&EndpointCriteria::default())
                .expect("an endpoint")
                .definition()
                .name
                .clone()
        })
        .collect();
    assert_eq!(picks, vec!["backend-1", "backend-2", "backend-1", "backend-2"]);
}

#[tokio::test]
async fn empty_topology_yields_a_503_interruption() {
    let (policies, connectors) = registries();
    let runtime = GatewayRuntime::new(
        GatewayConfig::default(),
        policies,
        connectors,
        Arc::new(HeaderEngine),
        MetricsRecorder::new(),
    );
    let mut api = orders_api();
    api.endpoint_groups.clear();
    runtime.deploy(api).await.expect("API deploys");

    let ctx = roundtrip(&runtime, a_request("/orders/42", Some(VALID_KEY))).await;

    assert!(ctx.is_interrupted());
    assert_eq!(ctx.response().status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        ctx.interruption().and_then(|f| f.key.as_deref()),
        Some(ENDPOINT_UNAVAILABLE_KEY)
    );
}

#[tokio::test]
async fn redeploy_swaps_the_pipeline_wholesale() {
    let runtime = a_runtime().await;

    let mut next = orders_api();
    next.generation = 2;
    next.flows.remove(1);
    runtime.deploy(next).await.expect("redeploys");

    let pipeline = runtime.pipeline("orders-api").expect("deployed");
    assert_eq!(pipeline.api().generation, 2);
    assert_eq!(pipeline.api().flows.len(), 1);

    // The redeployed API still serves traffic.
    let ctx = roundtrip(&runtime, a_request("/orders/42", Some(VALID_KEY))).await;
    assert_eq!(ctx.response().status, StatusCode::OK);

    runtime.shutdown().await;
    assert_eq!(runtime.deployed(), 0);
}
