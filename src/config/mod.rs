//! # Configuration Management
//!
//! This module provides configuration management for the Gateplane gateway
//! core: the gateway's own identity (tenant) and observability settings,
//! loaded from environment variables with sensible defaults.

mod settings;

pub use settings::{GatewayConfig, ObservabilityConfig};
