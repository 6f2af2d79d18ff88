//! Deployed API definition model
//!
//! This module contains the pure definition entities consumed by the
//! execution pipeline: APIs, flows, plans, and endpoint topology. These
//! types are produced by an external definition provider and are immutable
//! once deployed; a redeploy replaces the whole [`Api`] value, never
//! individual fields.

mod api;
mod endpoint;
mod flow;
mod plan;

pub use api::{Api, ApiType};
pub use endpoint::{Endpoint, EndpointGroup, LoadBalancerType};
pub use flow::{Flow, HttpMethod, PathOperator};
pub use plan::{Plan, PolicyRef};
