/// Tenant Management Layer
///
/// This module owns tenant and user identity, plan-derived resource limits
/// and running usage counters. It provides:
/// - Type definitions (Tenant, User, ApiKey, UsageCounters)
/// - Domain events with an explicit observer list
/// - The quota gate every other component consults before doing
///   tenant-scoped work

// Core tenant and user type definitions
pub mod types;

// Domain events and the observer interface
pub mod events;

// The registry itself: identity, quotas, API keys
pub mod registry;

// Re-export commonly used types
pub use events::{LimitResource, TenantEvent, TenantObserver};
pub use registry::TenantRegistry;
pub use types::{
    ApiKey, PlanTier, ResourceLimits, Tenant, TenantStatus, UsageSummary, User, UserRole,
    UserStatus,
};
