//! Flow definition types
//!
//! A flow is a named request-matching rule (path/method/condition) plus the
//! ordered policy steps to run for each execution phase.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::pipeline::ExecutionPhase;

use super::plan::PolicyRef;

/// Operator applied when matching a flow's path template against a request
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathOperator {
    /// The compiled template must match the whole request path
    #[default]
    Equals,
    /// The compiled template must match a prefix of the request path
    StartsWith,
}

/// HTTP methods a flow can restrict itself to.
///
/// A fixed enumeration rather than free-form strings so that method
/// matching is a value comparison, never a case-sensitive string compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    /// Match against a parsed request method.
    pub fn matches(&self, method: &http::Method) -> bool {
        match self {
            HttpMethod::Get => method == http::Method::GET,
            HttpMethod::Post => method == http::Method::POST,
            HttpMethod::Put => method == http::Method::PUT,
            HttpMethod::Delete => method == http::Method::DELETE,
            HttpMethod::Patch => method == http::Method::PATCH,
            HttpMethod::Head => method == http::Method::HEAD,
            HttpMethod::Options => method == http::Method::OPTIONS,
            HttpMethod::Trace => method == http::Method::TRACE,
            HttpMethod::Connect => method == http::Method::CONNECT,
        }
    }
}

/// A deployed flow: matching predicates plus ordered policy steps per phase.
///
/// Flows are owned by the API definition in declaration order; that order
/// is significant both for selection results and for chain execution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// Path template, e.g. `/orders/:orderId/items`
    #[serde(default)]
    pub path: String,

    /// How the path template is matched
    #[serde(default)]
    pub operator: PathOperator,

    /// Methods this flow applies to; empty means all methods
    #[serde(default)]
    pub methods: HashSet<HttpMethod>,

    /// Optional boolean expression evaluated per request
    #[serde(default)]
    pub condition: Option<String>,

    /// Policy steps for the request phase
    #[serde(default)]
    pub request: Vec<PolicyRef>,

    /// Policy steps for the response phase
    #[serde(default)]
    pub response: Vec<PolicyRef>,

    /// Policy steps applied to each published message
    #[serde(default)]
    pub publish: Vec<PolicyRef>,

    /// Policy steps applied to each consumed message
    #[serde(default)]
    pub subscribe: Vec<PolicyRef>,
}

impl Flow {
    /// Policy steps declared for the given execution phase.
    pub fn steps(&self, phase: ExecutionPhase) -> &[PolicyRef] {
        match phase {
            ExecutionPhase::Request => &self.request,
            ExecutionPhase::Response => &self.response,
            ExecutionPhase::AsyncRequest => &self.publish,
            ExecutionPhase::AsyncResponse => &self.subscribe,
        }
    }

    /// Flow name for logs, falling back to the path template.
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.path,
        }
    }
}
