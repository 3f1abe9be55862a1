/// Core tenant and user type definitions
///
/// Defines the fundamental structures for tenant identity, plan-derived
/// resource limits, users, API keys and period-scoped usage counters.
/// These types are serialized/deserialized from JSON for external callers.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Tenant lifecycle status. Suspension and cancellation are status
/// transitions, never physical deletion of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
}

/// Subscription plan tier. Resource limits and feature flags default from
/// the plan table below and may be overridden per tenant via configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Professional,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(PlanTier::Free),
            "starter" => Some(PlanTier::Starter),
            "professional" => Some(PlanTier::Professional),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }

    /// Built-in per-plan resource limit table.
    pub fn limits(&self) -> ResourceLimits {
        match self {
            PlanTier::Free => ResourceLimits {
                max_users: 3,
                max_api_calls: 1_000,
                max_storage_bytes: 100 * 1024 * 1024,
                max_agents: 1,
                max_tools: 3,
                max_integrations: 1,
                max_concurrent_executions: 1,
                data_retention_days: 30,
            },
            PlanTier::Starter => ResourceLimits {
                max_users: 10,
                max_api_calls: 10_000,
                max_storage_bytes: 1024 * 1024 * 1024,
                max_agents: 3,
                max_tools: 10,
                max_integrations: 3,
                max_concurrent_executions: 3,
                data_retention_days: 90,
            },
            PlanTier::Professional => ResourceLimits {
                max_users: 50,
                max_api_calls: 100_000,
                max_storage_bytes: 10 * 1024 * 1024 * 1024,
                max_agents: 10,
                max_tools: 25,
                max_integrations: 10,
                max_concurrent_executions: 10,
                data_retention_days: 365,
            },
            PlanTier::Enterprise => ResourceLimits {
                max_users: 500,
                max_api_calls: 1_000_000,
                max_storage_bytes: 100 * 1024 * 1024 * 1024,
                max_agents: 50,
                max_tools: 100,
                max_integrations: 50,
                max_concurrent_executions: 50,
                data_retention_days: 730,
            },
        }
    }

    /// Feature flags unlocked by the plan. Tiers are cumulative.
    pub fn features(&self) -> Vec<String> {
        let mut features = vec!["automations".to_string()];
        if matches!(self, PlanTier::Starter | PlanTier::Professional | PlanTier::Enterprise) {
            features.push("webhooks".to_string());
            features.push("api_keys".to_string());
        }
        if matches!(self, PlanTier::Professional | PlanTier::Enterprise) {
            features.push("agents".to_string());
            features.push("integrations".to_string());
        }
        if matches!(self, PlanTier::Enterprise) {
            features.push("sso".to_string());
            features.push("audit_log".to_string());
        }
        features
    }
}

/// Per-tenant resource budget.
///
/// `max_api_calls` and `max_storage_bytes` are checked against the
/// current-period usage counters; `max_users` against the live active user
/// count. The remaining fields are plan metadata carried for billing and
/// summary surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_users: u32,
    pub max_api_calls: u64,
    pub max_storage_bytes: u64,
    pub max_agents: u32,
    pub max_tools: u32,
    pub max_integrations: u32,
    pub max_concurrent_executions: u32,
    pub data_retention_days: u32,
}

/// An isolated customer account: owns users, automations and a quota budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier (UUID)
    pub id: String,
    /// Human-readable tenant name
    pub name: String,
    /// URL-safe slug, globally unique across all tenants
    pub slug: String,
    pub status: TenantStatus,
    pub plan: PlanTier,
    /// Effective limits: plan-derived defaults, overridable per tenant
    pub limits: ResourceLimits,
    /// Feature flags unlocked for this tenant
    pub features: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role within the owning tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    Admin,
    Manager,
    Developer,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Pending,
    Suspended,
}

/// A user belongs to exactly one tenant. Email uniqueness is enforced per
/// tenant, case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub status: UserStatus,
    /// API keys issued to this user. Only the prefix and secret hash are
    /// retained; plaintext is returned exactly once at creation.
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored API key material: identifying prefix plus SHA-256 hash of the
/// full plaintext key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    /// Short public prefix used to locate the key during validation
    pub prefix: String,
    /// Hex-encoded SHA-256 hash of the plaintext key
    pub secret_hash: String,
    /// Permission scopes granted to callers presenting this key
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Period-scoped usage counters, reset lazily at the first touch of a new
/// period (first of month, UTC). Counters only increase within a period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    pub period_start: DateTime<Utc>,
    pub api_calls: u64,
    pub storage_bytes: u64,
    pub executions: u64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self {
            period_start: current_period_start(),
            api_calls: 0,
            storage_bytes: 0,
            executions: 0,
        }
    }

    /// Reset the counters if the calendar month rolled over since the last
    /// touch. Called before every increment and read.
    pub fn roll_period(&mut self) {
        let current = current_period_start();
        if self.period_start != current {
            self.period_start = current;
            self.api_calls = 0;
            self.storage_bytes = 0;
            self.executions = 0;
        }
    }
}

impl Default for UsageCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// First of the current month, midnight UTC.
pub fn current_period_start() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// One metric of the usage summary surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetric {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
}

impl UsageMetric {
    pub fn new(used: u64, limit: u64) -> Self {
        let percentage = if limit == 0 {
            0.0
        } else {
            (used as f64 / limit as f64) * 100.0
        };
        Self {
            used,
            limit,
            percentage,
        }
    }
}

/// Usage summary for tenant-facing callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub api_calls: UsageMetric,
    pub storage: UsageMetric,
    pub users: UsageMetric,
}

/// Derive a URL-safe slug from a display name: lowercase alphanumerics with
/// single dashes, trimmed at both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("tenant");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Ümlaut & Sons!  "), "mlaut-sons");
        assert_eq!(slugify("!!!"), "tenant");
    }

    #[test]
    fn plan_features_are_cumulative() {
        let free = PlanTier::Free.features();
        let enterprise = PlanTier::Enterprise.features();
        assert!(free.contains(&"automations".to_string()));
        assert!(!free.contains(&"sso".to_string()));
        for feature in &free {
            assert!(enterprise.contains(feature));
        }
    }

    #[test]
    fn expired_key_detection_honours_boundary() {
        let now = Utc::now();
        let key = ApiKey {
            id: "k".to_string(),
            name: "test".to_string(),
            prefix: "ak_test".to_string(),
            secret_hash: String::new(),
            permissions: Vec::new(),
            expires_at: Some(now),
            created_at: now,
        };
        assert!(key.is_expired(now));

        let open_ended = ApiKey {
            expires_at: None,
            ..key
        };
        assert!(!open_ended.is_expired(now));
    }

    #[test]
    fn usage_metric_percentage() {
        let metric = UsageMetric::new(25, 100);
        assert!((metric.percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(UsageMetric::new(1, 0).percentage, 0.0);
    }
}
