//! Security chain: plan selection and authentication
//!
//! Picks exactly one plan + security-policy combination to authenticate a
//! request, or interrupts with 401. Plans are evaluated strictly in order
//! — the first accepting plan wins and later ones must not run — so
//! `support()` checks are sequential, never parallel.

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::definition::Plan;
use crate::errors::Result;

use super::context::{ExecutionContext, ExecutionFailure, ATTR_INTERNAL_SECURITY_SKIP, ATTR_PLAN};
use super::policy::{PolicyRegistry, SecurityPolicy};

/// Failure key set when no plan can authenticate the request. The exact
/// shape of that failure (401, this key, the "Unauthorized" message, no
/// parameters, no content type) is a contract other components rely on.
pub const PLAN_UNRESOLVABLE_KEY: &str = "GATEWAY_PLAN_UNRESOLVABLE";

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// The per-API security chain, built once per deployment and reused across
/// requests (it holds no per-request state).
pub struct SecurityChain {
    policies: Vec<PlanPolicy>,
}

struct PlanPolicy {
    plan_id: String,
    policy: Arc<dyn SecurityPolicy>,
}

impl SecurityChain {
    /// Resolve the plans' security policies and order them by ascending
    /// policy order. Plans whose policy cannot be instantiated are skipped
    /// (the registry already logged why); the sort is stable, so plans
    /// with equal order keep their declaration order.
    pub fn new(plans: &[Plan], registry: &PolicyRegistry) -> Self {
        let mut policies: Vec<PlanPolicy> = plans
            .iter()
            .filter_map(|plan| {
                registry
                    .security_policy(&plan.security)
                    .map(|policy| PlanPolicy { plan_id: plan.id.clone(), policy })
            })
            .collect();
        policies.sort_by_key(|entry| entry.policy.order());
        Self { policies }
    }

    /// Number of resolvable plans in the chain.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Authenticate the request, or interrupt the context with 401.
    pub async fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        if ctx
            .internal_attribute::<bool>(ATTR_INTERNAL_SECURITY_SKIP)
            .copied()
            .unwrap_or(false)
        {
            debug!("Security chain explicitly skipped");
            return Ok(());
        }

        for entry in &self.policies {
            match entry.policy.support(ctx).await {
                Ok(true) => {
                    debug!(
                        plan = %entry.plan_id,
                        policy = %entry.policy.id(),
                        "Security plan selected"
                    );
                    ctx.set_attribute(ATTR_PLAN, json!(entry.plan_id));
                    // The accepted plan's outcome is the chain's outcome,
                    // success or failure.
                    return entry.policy.on_request(ctx).await;
                }
                Ok(false) => continue,
                Err(error) => {
                    // A support() error on a candidate counts as "does not
                    // support"; the next plan may still accept.
                    debug!(
                        plan = %entry.plan_id,
                        %error,
                        "Security policy support check failed, trying next plan"
                    );
                }
            }
        }

        debug!("No plan can authenticate the request");
        ctx.interrupt_with(
            ExecutionFailure::new(StatusCode::UNAUTHORIZED)
                .key(PLAN_UNRESOLVABLE_KEY)
                .message(UNAUTHORIZED_MESSAGE),
        );
        Ok(())
    }
}
