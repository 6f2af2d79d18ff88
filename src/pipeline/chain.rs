//! Ordered, short-circuiting policy chain
//!
//! A chain executes its policies strictly in construction order for one
//! phase. Before each invocation it consults the context's interruption
//! flag: a prior interruption is intentional (e.g. a 401 already written),
//! so the chain stops there and completes successfully. A policy error
//! stops the chain immediately and propagates as the chain's outcome.

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;

use super::context::ExecutionContext;
use super::policy::Policy;
use super::ExecutionPhase;

/// An ordered list of policies bound to one execution phase.
///
/// A chain instance serves exactly one execution: `execute` consumes it.
pub struct PolicyChain {
    id: String,
    phase: ExecutionPhase,
    policies: Vec<Arc<dyn Policy>>,
}

impl PolicyChain {
    /// Build a chain over the given policies, preserving their order.
    pub fn new<S: Into<String>>(
        id: S,
        phase: ExecutionPhase,
        policies: Vec<Arc<dyn Policy>>,
    ) -> Self {
        Self { id: id.into(), phase, policies }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Number of policies in the chain.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Execute the chain against the context.
    ///
    /// Policies run sequentially, never concurrently. An empty chain
    /// completes immediately with no side effects.
    pub async fn execute(self, ctx: &mut ExecutionContext) -> Result<()> {
        for policy in &self.policies {
            if ctx.is_interrupted() {
                debug!(
                    chain = %self.id,
                    phase = %self.phase,
                    "Context interrupted, skipping remaining policies"
                );
                return Ok(());
            }

            let outcome = match self.phase {
                ExecutionPhase::Request => policy.on_request(ctx).await,
                ExecutionPhase::Response => policy.on_response(ctx).await,
                ExecutionPhase::AsyncRequest => policy.on_async_request(ctx).await,
                ExecutionPhase::AsyncResponse => policy.on_async_response(ctx).await,
            };

            // A fault stops the chain; remaining policies are never invoked.
            outcome?;
        }
        Ok(())
    }
}
