//! Policy capability traits and the policy registry
//!
//! A policy is a cross-cutting step (security, transformation, logging)
//! executed by a chain for one phase. Policies are resolved once per API
//! deployment from a registry of factories keyed by a string identifier —
//! no reflection, no process-wide singletons — and are stateless across
//! requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::definition::PolicyRef;
use crate::errors::{Error, Result};

use super::context::ExecutionContext;

/// A live policy instance, polymorphic over the phase capability set.
///
/// The chain invokes exactly one of the four phase methods per policy,
/// selected by the chain's phase. The defaults reject the invocation:
/// reaching one means deployment-time validation let an unsupported
/// phase/policy combination through, which is a bug, not a request-time
/// condition.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Policy identifier, used in logs and error reports.
    fn id(&self) -> &str;

    async fn on_request(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(Error::policy(self.id(), "REQUEST phase is not supported"))
    }

    async fn on_response(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(Error::policy(self.id(), "RESPONSE phase is not supported"))
    }

    async fn on_async_request(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(Error::policy(self.id(), "ASYNC_REQUEST phase is not supported"))
    }

    async fn on_async_response(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Err(Error::policy(self.id(), "ASYNC_RESPONSE phase is not supported"))
    }
}

/// A security policy: a [`Policy`] that can additionally report whether it
/// is able to handle a given request at all.
#[async_trait]
pub trait SecurityPolicy: Policy {
    /// Relative evaluation order among a tenant's plans; lower runs first.
    fn order(&self) -> i32 {
        1000
    }

    /// Whether this policy can authenticate the request (e.g. the expected
    /// credentials are present). Does not perform the authentication.
    async fn support(&self, ctx: &ExecutionContext) -> Result<bool>;
}

/// Instantiates a [`Policy`] from its opaque configuration.
pub trait PolicyFactory: Send + Sync {
    fn create(&self, configuration: Option<&Value>) -> Result<Arc<dyn Policy>>;
}

impl<F> PolicyFactory for F
where
    F: Fn(Option<&Value>) -> Result<Arc<dyn Policy>> + Send + Sync,
{
    fn create(&self, configuration: Option<&Value>) -> Result<Arc<dyn Policy>> {
        self(configuration)
    }
}

/// Instantiates a [`SecurityPolicy`] from its opaque configuration.
pub trait SecurityPolicyFactory: Send + Sync {
    fn create(&self, configuration: Option<&Value>) -> Result<Arc<dyn SecurityPolicy>>;
}

impl<F> SecurityPolicyFactory for F
where
    F: Fn(Option<&Value>) -> Result<Arc<dyn SecurityPolicy>> + Send + Sync,
{
    fn create(&self, configuration: Option<&Value>) -> Result<Arc<dyn SecurityPolicy>> {
        self(configuration)
    }
}

/// Registry of policy factories keyed by policy identifier.
///
/// Resolution returns `None` for an unknown identifier or a configuration
/// the factory rejects; callers decide whether that fails a deployment or
/// skips a plan.
#[derive(Default)]
pub struct PolicyRegistry {
    factories: HashMap<String, Arc<dyn PolicyFactory>>,
    security_factories: HashMap<String, Arc<dyn SecurityPolicyFactory>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy factory under the given identifier.
    pub fn register<S: Into<String>>(&mut self, id: S, factory: Arc<dyn PolicyFactory>) {
        self.factories.insert(id.into(), factory);
    }

    /// Register a security policy factory under the given identifier.
    pub fn register_security<S: Into<String>>(
        &mut self,
        id: S,
        factory: Arc<dyn SecurityPolicyFactory>,
    ) {
        self.security_factories.insert(id.into(), factory);
    }

    /// Resolve a policy reference into a live instance.
    pub fn policy(&self, reference: &PolicyRef) -> Option<Arc<dyn Policy>> {
        let factory = match self.factories.get(&reference.policy) {
            Some(factory) => factory,
            None => {
                warn!(policy = %reference.policy, "No factory registered for policy");
                return None;
            }
        };
        match factory.create(reference.configuration.as_ref()) {
            Ok(policy) => Some(policy),
            Err(error) => {
                warn!(policy = %reference.policy, %error, "Policy instantiation failed");
                None
            }
        }
    }

    /// Resolve a plan's security reference into a live instance.
    pub fn security_policy(&self, reference: &PolicyRef) -> Option<Arc<dyn SecurityPolicy>> {
        let factory = match self.security_factories.get(&reference.policy) {
            Some(factory) => factory,
            None => {
                warn!(policy = %reference.policy, "No factory registered for security policy");
                return None;
            }
        };
        match factory.create(reference.configuration.as_ref()) {
            Ok(policy) => Some(policy),
            Err(error) => {
                warn!(policy = %reference.policy, %error, "Security policy instantiation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopPolicy {
        id: String,
    }

    #[async_trait]
    impl Policy for NoopPolicy {
        fn id(&self) -> &str {
            &self.id
        }

        async fn on_request(&self, _ctx: &mut ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    fn registry_with_noop() -> PolicyRegistry {
        let mut registry = PolicyRegistry::new();
        registry.register(
            "noop",
            Arc::new(|config: Option<&Value>| -> Result<Arc<dyn Policy>> {
                if let Some(config) = config {
                    if config.get("invalid").is_some() {
                        return Err(Error::policy("noop", "invalid configuration"));
                    }
                }
                Ok(Arc::new(NoopPolicy { id: "noop".to_string() }))
            }),
        );
        registry
    }

    #[test]
    fn resolves_registered_policy() {
        let registry = registry_with_noop();
        let policy = registry.policy(&PolicyRef::new("noop"));
        assert!(policy.is_some());
        assert_eq!(policy.unwrap().id(), "noop");
    }

    #[test]
    fn unknown_policy_resolves_to_none() {
        let registry = registry_with_noop();
        assert!(registry.policy(&PolicyRef::new("does-not-exist")).is_none());
    }

    #[test]
    fn invalid_configuration_resolves_to_none() {
        let registry = registry_with_noop();
        let reference = PolicyRef::with_configuration("noop", json!({ "invalid": true }));
        assert!(registry.policy(&reference).is_none());
    }

    #[tokio::test]
    async fn unsupported_phase_is_a_policy_error() {
        let policy = NoopPolicy { id: "noop".to_string() };
        let mut ctx = ExecutionContext::new(crate::pipeline::context::Request::new(
            http::Method::GET,
            "/",
        ));

        assert!(policy.on_request(&mut ctx).await.is_ok());
        let error = policy.on_response(&mut ctx).await.expect_err("unsupported phase");
        assert!(matches!(error, Error::Policy { .. }));
    }
}
