//! Flow condition evaluation and selection
//!
//! Each deployed flow declares up to three predicates: a path template, a
//! method set, and an optional boolean expression. Evaluators are composed
//! in sequence; a flow is selected only when every predicate holds.
//!
//! The expression predicate is asymmetric on purpose: a missing or empty
//! expression is always true, while an expression that fails to evaluate is
//! false. Evaluation failures are fail-closed and never surface as chain
//! errors.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::definition::Flow;
use crate::errors::Result;

use super::context::ExecutionContext;
use super::path::PathMatcherCache;

/// Evaluates a boolean expression string against the current request
/// context. Implemented by an external template/expression engine; the
/// pipeline only consumes this interface.
pub trait ExpressionEngine: Send + Sync {
    fn evaluate_bool(&self, expression: &str, ctx: &ExecutionContext) -> Result<bool>;
}

/// A single predicate evaluated against a request/flow pair.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, ctx: &ExecutionContext, flow: &Flow) -> bool;
}

/// Matches the flow's path template against the request path.
pub struct PathConditionEvaluator {
    cache: Arc<PathMatcherCache>,
}

impl PathConditionEvaluator {
    pub fn new(cache: Arc<PathMatcherCache>) -> Self {
        Self { cache }
    }
}

impl ConditionEvaluator for PathConditionEvaluator {
    fn evaluate(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        match self.cache.matcher(&flow.path) {
            Ok(matcher) => matcher.matches(flow.operator, &ctx.request().path),
            Err(error) => {
                // Malformed templates are rejected at deploy time; reaching
                // this point means the template slipped through, so the flow
                // simply never matches. The failed compile is not cached.
                warn!(template = %flow.path, %error, "Path template failed to compile");
                false
            }
        }
    }
}

/// Passes when the flow declares no methods or contains the request method.
pub struct MethodConditionEvaluator;

impl ConditionEvaluator for MethodConditionEvaluator {
    fn evaluate(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        flow.methods.is_empty()
            || flow.methods.iter().any(|m| m.matches(&ctx.request().method))
    }
}

/// Evaluates the flow's optional boolean expression.
pub struct ExpressionConditionEvaluator {
    engine: Arc<dyn ExpressionEngine>,
}

impl ExpressionConditionEvaluator {
    pub fn new(engine: Arc<dyn ExpressionEngine>) -> Self {
        Self { engine }
    }
}

impl ConditionEvaluator for ExpressionConditionEvaluator {
    fn evaluate(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        let condition = match &flow.condition {
            Some(condition) if !condition.trim().is_empty() => condition,
            _ => return true,
        };

        match self.engine.evaluate_bool(condition, ctx) {
            Ok(result) => result,
            Err(error) => {
                // Fail closed: an evaluation error means "not satisfied".
                debug!(%condition, %error, "Flow condition evaluation failed");
                false
            }
        }
    }
}

/// Runs a sequence of evaluators; all must hold.
pub struct CompositeConditionEvaluator {
    evaluators: Vec<Box<dyn ConditionEvaluator>>,
}

impl CompositeConditionEvaluator {
    pub fn new(evaluators: Vec<Box<dyn ConditionEvaluator>>) -> Self {
        Self { evaluators }
    }
}

impl ConditionEvaluator for CompositeConditionEvaluator {
    fn evaluate(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        self.evaluators.iter().all(|evaluator| evaluator.evaluate(ctx, flow))
    }
}

/// Selects the flows applying to a request from the API's ordered flow
/// list. Selection preserves declaration order.
pub struct FlowSelector {
    flows: Vec<Arc<Flow>>,
    evaluator: CompositeConditionEvaluator,
}

impl FlowSelector {
    /// Build a selector over the deployed flow list with the standard
    /// path/method/expression evaluator sequence.
    pub fn new(
        flows: Vec<Arc<Flow>>,
        cache: Arc<PathMatcherCache>,
        engine: Arc<dyn ExpressionEngine>,
    ) -> Self {
        let evaluator = CompositeConditionEvaluator::new(vec![
            Box::new(PathConditionEvaluator::new(cache)),
            Box::new(MethodConditionEvaluator),
            Box::new(ExpressionConditionEvaluator::new(engine)),
        ]);
        Self { flows, evaluator }
    }

    /// The subset of flows whose conditions all hold, in declared order.
    pub fn select(&self, ctx: &ExecutionContext) -> Vec<Arc<Flow>> {
        self.select_indices(ctx).into_iter().map(|i| Arc::clone(&self.flows[i])).collect()
    }

    /// Positions (in the deployed flow list) of the flows whose conditions
    /// all hold, in declared order.
    pub fn select_indices(&self, ctx: &ExecutionContext) -> Vec<usize> {
        self.flows
            .iter()
            .enumerate()
            .filter(|(_, flow)| self.evaluator.evaluate(ctx, flow))
            .map(|(i, _)| i)
            .collect()
    }
}
