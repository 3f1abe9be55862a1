/// Tenantflow: multi-tenant automation core
///
/// This library provides the orchestration core of a multi-tenant
/// automation platform: a tenant registry with plan-derived quotas, an
/// automation engine with trigger/condition/action semantics, a generic
/// component registry for pluggable executors, tools, agents and knowledge
/// sources, and the loader that boots and tears the whole thing down.

// Error taxonomy shared across every module
pub mod error;

// Core configuration and setup
pub mod config;

// Generic identifier -> instance registry with uniform invoke dispatch
pub mod registry;

// Tenant management layer - identity, quotas, usage counters, API keys
pub mod tenant;

// Automation management layer - definitions, storage, engine, history
pub mod automation;

// Runtime execution layer - action executors and the schedule service
pub mod runtime;

// System loader - boot sequence, component catalog, teardown
pub mod loader;

// Re-export commonly used types for external consumers
pub use automation::{
    Automation, AutomationDefinition, AutomationEngine, AutomationUpdate, ExecutionRecord,
    ExecutionStatus, TriggerKind,
};
pub use config::Config;
pub use error::EngineError;
pub use loader::{boot, System};
pub use registry::{Component, ComponentRegistry};
pub use runtime::{ActionExecutor, ExecutorRegistry};
pub use tenant::{PlanTier, Tenant, TenantRegistry, User};
