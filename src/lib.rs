//! # Gateplane
//!
//! Gateplane is the request execution pipeline of an API gateway: it
//! matches inbound requests against deployed API definitions, runs each
//! request through ordered chains of cross-cutting policies, and resolves
//! the backend endpoint connector to invoke — for many tenants' APIs at
//! once, with strict per-request isolation.
//!
//! ## Architecture
//!
//! ```text
//! Transport Layer → GatewayRuntime → ApiPipeline → Endpoint Connector
//!       ↓                 ↓               ↓
//! Entrypoint view   Deployed APIs   FlowSelector → SecurityChain
//!                                   → PolicyChains → Resolver
//! ```
//!
//! ## Core Components
//!
//! - **GatewayRuntime**: deployed [`pipeline::executor::ApiPipeline`]s
//!   keyed by API id, replaced wholesale on redeploy
//! - **FlowSelector**: path/method/expression predicates over the API's
//!   ordered flow list
//! - **SecurityChain / PolicyChain**: ordered, short-circuiting policy
//!   execution per phase
//! - **EndpointManager / Resolver**: live backend topology with
//!   criteria-based, load-balanced selection
//!
//! The management API, persistence, configuration synchronization, and the
//! HTTP transport itself are external collaborators: this crate consumes
//! resolved in-memory definitions and hands back a connector plus the
//! final per-request context state.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gateplane::{GatewayConfig, GatewayRuntime, Result};
//! # use gateplane::observability::MetricsRecorder;
//! # use gateplane::pipeline::policy::PolicyRegistry;
//! # use gateplane::endpoint::ConnectorRegistry;
//! # use gateplane::pipeline::condition::ExpressionEngine;
//! # use gateplane::pipeline::context::ExecutionContext;
//! # use std::sync::Arc;
//! # struct Engine;
//! # impl ExpressionEngine for Engine {
//! #     fn evaluate_bool(&self, _: &str, _: &ExecutionContext) -> Result<bool> { Ok(true) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let metrics = gateplane::observability::init_observability(&config.observability)?;
//!     let runtime = GatewayRuntime::new(
//!         config,
//!         Arc::new(PolicyRegistry::new()),
//!         Arc::new(ConnectorRegistry::new()),
//!         Arc::new(Engine),
//!         metrics,
//!     );
//!     // runtime.deploy(api).await?; ...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod definition;
pub mod endpoint;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod runtime;

// Re-export commonly used types and traits
pub use config::GatewayConfig;
pub use errors::{Error, Result};
pub use runtime::GatewayRuntime;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
