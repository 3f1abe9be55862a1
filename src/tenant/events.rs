/// Tenant domain events and the explicit observer list
///
/// Every mutating operation on the tenant registry publishes a named event
/// so cross-cutting concerns (billing, auditing, notifications) can hook in
/// without being baked into the registry. Delivery is synchronous and in
/// registration order, after the mutation has committed; the registry ships
/// with no subscribers of its own.

use serde::{Deserialize, Serialize};

/// Which plan limit a usage increment crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitResource {
    ApiCalls,
    StorageBytes,
    Users,
}

/// A domain event emitted by the tenant registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TenantEvent {
    /// A tenant was provisioned.
    TenantCreated { tenant_id: String, slug: String },

    /// A tenant was suspended, with an optional operator-supplied reason.
    TenantSuspended {
        tenant_id: String,
        reason: Option<String>,
    },

    /// A suspended tenant was resumed.
    TenantResumed { tenant_id: String },

    /// A tenant was soft-deleted (status set to cancelled).
    TenantCancelled { tenant_id: String },

    /// A user was added to a tenant.
    UserCreated {
        user_id: String,
        tenant_id: String,
        email: String,
    },

    /// An API key was issued. Only the identifying prefix is carried; the
    /// plaintext never leaves the creation call.
    ApiKeyCreated { user_id: String, prefix: String },

    /// An API key was revoked.
    ApiKeyRevoked { user_id: String, key_id: String },

    /// A usage increment crossed the tenant's plan limit. The increment is
    /// still persisted; this event is the notification side of that breach.
    LimitExceeded {
        tenant_id: String,
        resource: LimitResource,
        limit: u64,
        current: u64,
    },
}

impl TenantEvent {
    /// Wire name of the event, used in logs and by observers that route on
    /// event kind.
    pub fn name(&self) -> &'static str {
        match self {
            TenantEvent::TenantCreated { .. } => "tenant:created",
            TenantEvent::TenantSuspended { .. } => "tenant:suspended",
            TenantEvent::TenantResumed { .. } => "tenant:resumed",
            TenantEvent::TenantCancelled { .. } => "tenant:cancelled",
            TenantEvent::UserCreated { .. } => "user:created",
            TenantEvent::ApiKeyCreated { .. } => "apikey:created",
            TenantEvent::ApiKeyRevoked { .. } => "apikey:revoked",
            TenantEvent::LimitExceeded { .. } => "usage:limit-exceeded",
        }
    }
}

/// Callback interface for tenant domain events.
///
/// Observers must be cheap and non-blocking; they run inline on the mutating
/// call after the state change commits.
pub trait TenantObserver: Send + Sync {
    fn on_event(&self, event: &TenantEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        let event = TenantEvent::LimitExceeded {
            tenant_id: "t".to_string(),
            resource: LimitResource::ApiCalls,
            limit: 10,
            current: 11,
        };
        assert_eq!(event.name(), "usage:limit-exceeded");

        let event = TenantEvent::TenantCreated {
            tenant_id: "t".to_string(),
            slug: "acme".to_string(),
        };
        assert_eq!(event.name(), "tenant:created");
    }
}
