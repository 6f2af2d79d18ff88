//! Per-request execution context
//!
//! The [`ExecutionContext`] carries the request/response views, the
//! interruption state, and two attribute bags through every pipeline step.
//! One context exists per inbound request; it is created at request entry
//! and discarded once the response completes, never shared across requests.

use std::any::Any;
use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use uuid::Uuid;

/// Prefix under which user attributes may also be addressed.
///
/// An attribute put as `context-attributes.foo` is readable as `foo`, so
/// policies and expressions can use either form interchangeably.
pub const ATTR_PREFIX: &str = "context-attributes.";

/// Internal attribute carrying the entrypoint connector that accepted the
/// request. The endpoint resolver reads it to learn the required API type
/// and connector modes.
pub const ATTR_INTERNAL_ENTRYPOINT_CONNECTOR: &str = "entrypoint-connector";

/// Internal attribute carrying the resolved endpoint connector, set by the
/// executor for the transport layer to invoke.
pub const ATTR_INTERNAL_ENDPOINT_CONNECTOR: &str = "endpoint-connector";

/// Internal attribute short-circuiting the security chain when set (e.g.
/// the request was already authenticated upstream).
pub const ATTR_INTERNAL_SECURITY_SKIP: &str = "skip-security-chain";

/// Internal attribute carrying the flows selected for the request.
pub const ATTR_INTERNAL_FLOWS: &str = "flows";

/// User-visible attribute carrying the id of the plan that authenticated
/// the request.
pub const ATTR_PLAN: &str = "plan";

/// Inbound request view.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request identifier
    pub id: String,
    /// HTTP method
    pub method: Method,
    /// Request path, without query string
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl Request {
    /// Build a request view with a fresh identifier and empty body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Outbound response view.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status, defaults to 200 until something changes it
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: Bytes::new() }
    }
}

/// Payload of a deliberate pipeline interruption.
///
/// This is the one uniform shape callers render regardless of which
/// component triggered the interruption. It is an expected outcome, not a
/// fault, and is never logged as an error by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// HTTP status to answer with
    pub status: StatusCode,
    /// Stable failure key identifying the cause
    pub key: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Optional parameters attached to the failure
    pub parameters: HashMap<String, String>,
    /// Optional content type of `message`
    pub content_type: Option<String>,
}

impl ExecutionFailure {
    /// Create a failure answering with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            key: None,
            message: None,
            parameters: HashMap::new(),
            content_type: None,
        }
    }

    /// Attach a stable failure key.
    pub fn key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach a message.
    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a parameter.
    pub fn parameter<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Attach the content type of the message.
    pub fn content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Per-request carrier threaded through every pipeline component.
pub struct ExecutionContext {
    request: Request,
    response: Response,
    attributes: HashMap<String, Value>,
    internal: HashMap<String, Box<dyn Any + Send + Sync>>,
    interrupted: bool,
    failure: Option<ExecutionFailure>,
}

impl ExecutionContext {
    /// Create a context for the given inbound request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::default(),
            attributes: HashMap::new(),
            internal: HashMap::new(),
            interrupted: false,
            failure: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    // --- user-visible attributes -------------------------------------------

    /// Set a user-visible attribute.
    pub fn set_attribute<K: Into<String>>(&mut self, key: K, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Read a user-visible attribute. A key put with the
    /// [`ATTR_PREFIX`] is also readable without it, and vice versa.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.attributes.get(key) {
            return Some(value);
        }
        if let Some(stripped) = key.strip_prefix(ATTR_PREFIX) {
            return self.attributes.get(stripped);
        }
        self.attributes.get(&format!("{}{}", ATTR_PREFIX, key))
    }

    /// Remove a user-visible attribute under either addressing form.
    pub fn remove_attribute(&mut self, key: &str) {
        if self.attributes.remove(key).is_some() {
            return;
        }
        if let Some(stripped) = key.strip_prefix(ATTR_PREFIX) {
            self.attributes.remove(stripped);
            return;
        }
        self.attributes.remove(&format!("{}{}", ATTR_PREFIX, key));
    }

    /// All user-visible attributes, prefixed keys exposed un-prefixed.
    pub fn attributes(&self) -> HashMap<&str, &Value> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.strip_prefix(ATTR_PREFIX).unwrap_or(key), value))
            .collect()
    }

    // --- internal attributes -----------------------------------------------

    /// Set a framework-internal attribute.
    pub fn set_internal_attribute<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.internal.insert(key.to_string(), Box::new(value));
    }

    /// Read a framework-internal attribute, typed.
    pub fn internal_attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.internal.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove a framework-internal attribute.
    pub fn remove_internal_attribute(&mut self, key: &str) {
        self.internal.remove(key);
    }

    // --- interruption ------------------------------------------------------

    /// Stop the pipeline without a failure payload. Remaining chain steps
    /// are skipped; this is not an error.
    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    /// Stop the pipeline with a target HTTP outcome. The response status is
    /// aligned with the failure immediately so the transport can render it.
    pub fn interrupt_with(&mut self, failure: ExecutionFailure) {
        self.response.status = failure.status;
        self.interrupted = true;
        self.failure = Some(failure);
    }

    /// The cancellation check consulted between any two sequential steps.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// The interruption payload, if any was attached.
    pub fn interruption(&self) -> Option<&ExecutionFailure> {
        self.failure.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn a_context() -> ExecutionContext {
        ExecutionContext::new(Request::new(Method::GET, "/orders/42"))
    }

    #[test]
    fn put_and_get_attributes() {
        let mut ctx = a_context();
        for i in 0..10 {
            ctx.set_attribute(format!("key{}", i), json!(format!("value{}", i)));
        }
        for i in 0..10 {
            assert_eq!(ctx.attribute(&format!("key{}", i)), Some(&json!(format!("value{}", i))));
        }
    }

    #[test]
    fn prefixed_attributes_readable_without_prefix() {
        let mut ctx = a_context();
        ctx.set_attribute(format!("{}plan", ATTR_PREFIX), json!("gold"));

        assert_eq!(ctx.attribute("plan"), Some(&json!("gold")));
        assert_eq!(ctx.attribute(&format!("{}plan", ATTR_PREFIX)), Some(&json!("gold")));
        assert_eq!(ctx.attributes().get("plan"), Some(&&json!("gold")));
    }

    #[test]
    fn unprefixed_attributes_readable_with_prefix() {
        let mut ctx = a_context();
        ctx.set_attribute("plan", json!("gold"));

        assert_eq!(ctx.attribute(&format!("{}plan", ATTR_PREFIX)), Some(&json!("gold")));
    }

    #[test]
    fn remove_attribute_under_either_form() {
        let mut ctx = a_context();
        ctx.set_attribute(format!("{}plan", ATTR_PREFIX), json!("gold"));
        ctx.remove_attribute("plan");
        assert!(ctx.attribute("plan").is_none());

        ctx.set_attribute("plan", json!("gold"));
        ctx.remove_attribute(&format!("{}plan", ATTR_PREFIX));
        assert!(ctx.attribute("plan").is_none());
    }

    #[test]
    fn unknown_attribute_is_none() {
        let ctx = a_context();
        assert!(ctx.attribute("unknown").is_none());
    }

    #[test]
    fn internal_attributes_are_typed() {
        let mut ctx = a_context();
        ctx.set_internal_attribute("count", 42u64);
        ctx.set_internal_attribute("shared", Arc::new("payload".to_string()));

        assert_eq!(ctx.internal_attribute::<u64>("count"), Some(&42));
        assert_eq!(
            ctx.internal_attribute::<Arc<String>>("shared").map(|v| v.as_str()),
            Some("payload")
        );
        // A wrong type reads as absent, not as a panic.
        assert!(ctx.internal_attribute::<String>("count").is_none());

        ctx.remove_internal_attribute("count");
        assert!(ctx.internal_attribute::<u64>("count").is_none());
    }

    #[test]
    fn internal_attributes_are_invisible_to_users() {
        let mut ctx = a_context();
        ctx.set_internal_attribute("secret", "hidden".to_string());
        assert!(ctx.attribute("secret").is_none());
        assert!(ctx.attributes().is_empty());
    }

    #[test]
    fn interrupt_without_payload() {
        let mut ctx = a_context();
        assert!(!ctx.is_interrupted());

        ctx.interrupt();
        assert!(ctx.is_interrupted());
        assert!(ctx.interruption().is_none());
        assert_eq!(ctx.response().status, StatusCode::OK);
    }

    #[test]
    fn interrupt_with_failure_aligns_response_status() {
        let mut ctx = a_context();
        ctx.interrupt_with(
            ExecutionFailure::new(StatusCode::UNAUTHORIZED)
                .key("API_KEY_INVALID")
                .message("API key is not valid"),
        );

        assert!(ctx.is_interrupted());
        assert_eq!(ctx.response().status, StatusCode::UNAUTHORIZED);
        let failure = ctx.interruption().expect("failure payload");
        assert_eq!(failure.key.as_deref(), Some("API_KEY_INVALID"));
        assert_eq!(failure.message.as_deref(), Some("API key is not valid"));
        assert!(failure.parameters.is_empty());
        assert!(failure.content_type.is_none());
    }
}
