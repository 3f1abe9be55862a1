/// Error taxonomy for the automation core
///
/// Identity, quota and validation failures are raised synchronously to the
/// caller with enough structured detail (limit, current usage, colliding
/// identifier) to render an actionable message without string parsing.
/// Action executor failures are NOT represented here: they are captured as
/// data on the execution record instead of being thrown to trigger sources.

use thiserror::Error;

/// All failure kinds surfaced by the tenant registry, automation engine and
/// system loader.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A tenant, user, automation or registered component is unknown.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Tenant slug collision on create.
    #[error("tenant slug already in use: {slug}")]
    DuplicateSlug { slug: String },

    /// User email collision within the owning tenant.
    #[error("email already registered for this tenant: {email}")]
    DuplicateEmail { email: String },

    /// The tenant has no remaining user seats.
    #[error("user limit reached: {current} of {limit} seats in use")]
    UserLimitExceeded { limit: u32, current: u32 },

    /// The current-period API call counter passed the plan limit.
    #[error("API call limit exceeded: {current} of {limit} calls this period")]
    ApiLimitExceeded { limit: u64, current: u64 },

    /// The current-period storage counter passed the plan limit.
    #[error("storage limit exceeded: {current} of {limit} bytes")]
    StorageLimitExceeded { limit: u64, current: u64 },

    /// Execution was requested for a disabled automation.
    #[error("automation is disabled: {automation_id}")]
    Disabled { automation_id: String },

    /// Boot-time cross-reference validation failed. Carries every offending
    /// reference, not just the first one found.
    #[error("unresolved component references: [{}]", .missing.join(", "))]
    Dependency { missing: Vec<String> },

    /// A SCHEDULE trigger carried an expression outside the fixed table.
    /// Rejected at create/update time so the automation can never be armed
    /// with a timer that silently never fires.
    #[error("unrecognized schedule expression: {expression:?}")]
    InvalidSchedule { expression: String },

    /// Configuration failed schema validation before boot.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The cron scheduler rejected an arm/disarm/start operation.
    #[error("scheduler failure: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for the pervasive lookup-miss case.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
