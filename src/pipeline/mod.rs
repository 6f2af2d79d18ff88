//! # Request Execution Pipeline
//!
//! The core of the gateway: for a single inbound request this module
//! matches flows, runs the security chain, executes ordered policy chains
//! per phase, and threads everything through a per-request
//! [`ExecutionContext`](context::ExecutionContext).
//!
//! Suspension points are exactly the policy invocations and the security
//! policy `support`/`on_request` calls; flow selection, path matching, and
//! chain ordering are synchronous pure computation.

pub mod chain;
pub mod condition;
pub mod context;
pub mod executor;
pub mod path;
pub mod policy;
pub mod security;

use std::fmt;

/// Execution phase of a chain, determining which policy method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPhase {
    /// Inbound request, before the backend is invoked
    Request,
    /// Outbound response, after the backend answered
    Response,
    /// Each message published towards the backend
    AsyncRequest,
    /// Each message consumed from the backend
    AsyncResponse,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionPhase::Request => "REQUEST",
            ExecutionPhase::Response => "RESPONSE",
            ExecutionPhase::AsyncRequest => "ASYNC_REQUEST",
            ExecutionPhase::AsyncResponse => "ASYNC_RESPONSE",
        };
        write!(f, "{}", label)
    }
}
