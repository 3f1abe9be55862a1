/// Tenant registry: identity, plan limits and quota enforcement
///
/// The single source of truth for "is this tenant allowed to keep going".
/// All tenant, user and usage-counter state lives behind one RwLock so a
/// mutation and its secondary indexes (slug, per-tenant email) commit as one
/// atomic step and per-tenant counter increments are single
/// read-modify-write critical sections that never lose concurrent updates.
///
/// Usage tracking is deliberately post-hoc: the tracked operation has
/// already happened, the increment always persists, and a breach surfaces
/// as a structured error plus a limit-exceeded event.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EngineError;
use crate::tenant::events::{LimitResource, TenantEvent, TenantObserver};
use crate::tenant::types::{
    slugify, ApiKey, PlanTier, ResourceLimits, Tenant, TenantStatus, UsageCounters, UsageMetric,
    UsageSummary, User, UserRole, UserStatus,
};

/// Mutable registry state. Primary maps and secondary indexes are updated
/// together under the write lock so they can never disagree.
#[derive(Default)]
struct TenantState {
    tenants: HashMap<String, Tenant>,
    /// slug -> tenant id
    slugs: HashMap<String, String>,
    users: HashMap<String, User>,
    /// (tenant id, lowercase email) -> user id
    emails: HashMap<(String, String), String>,
    usage: HashMap<String, UsageCounters>,
}

/// Tenant and user identity plus quota enforcement.
pub struct TenantRegistry {
    state: RwLock<TenantState>,
    observers: RwLock<Vec<Arc<dyn TenantObserver>>>,
    /// Per-plan limit overrides from configuration, keyed by plan name
    plan_overrides: HashMap<String, ResourceLimits>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::with_plan_overrides(HashMap::new())
    }

    pub fn with_plan_overrides(plan_overrides: HashMap<String, ResourceLimits>) -> Self {
        Self {
            state: RwLock::new(TenantState::default()),
            observers: RwLock::new(Vec::new()),
            plan_overrides,
        }
    }

    /// Register an observer for tenant domain events. Observers are called
    /// synchronously, in registration order, after each mutation commits.
    pub async fn subscribe(&self, observer: Arc<dyn TenantObserver>) {
        self.observers.write().await.push(observer);
    }

    async fn emit(&self, event: TenantEvent) {
        tracing::debug!("📣 tenant event: {}", event.name());
        let observers = self.observers.read().await;
        for observer in observers.iter() {
            observer.on_event(&event);
        }
    }

    fn effective_limits(&self, plan: PlanTier) -> ResourceLimits {
        self.plan_overrides
            .get(plan.as_str())
            .cloned()
            .unwrap_or_else(|| plan.limits())
    }

    // ------------------------------------------------------------------
    // Tenant lifecycle
    // ------------------------------------------------------------------

    /// Provision a new tenant with plan-derived limits and features.
    ///
    /// An explicit slug collides with `DuplicateSlug`; a name-derived slug
    /// gets a short random suffix so it is unique without a lookup round
    /// trip.
    pub async fn create_tenant(
        &self,
        name: &str,
        slug: Option<&str>,
        plan: Option<PlanTier>,
    ) -> Result<Tenant, EngineError> {
        let plan = plan.unwrap_or(PlanTier::Free);
        let now = Utc::now();

        let mut state = self.state.write().await;

        let slug = match slug {
            Some(explicit) => {
                if state.slugs.contains_key(explicit) {
                    return Err(EngineError::DuplicateSlug {
                        slug: explicit.to_string(),
                    });
                }
                explicit.to_string()
            }
            None => {
                let base = slugify(name);
                let mut candidate = format!("{}-{}", base, random_suffix());
                // Suffix collisions are vanishingly rare but cheap to retry.
                while state.slugs.contains_key(&candidate) {
                    candidate = format!("{}-{}", base, random_suffix());
                }
                candidate
            }
        };

        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            slug: slug.clone(),
            status: match plan {
                PlanTier::Free => TenantStatus::Trial,
                _ => TenantStatus::Active,
            },
            plan,
            limits: self.effective_limits(plan),
            features: plan.features(),
            created_at: now,
            updated_at: now,
        };

        state.slugs.insert(slug.clone(), tenant.id.clone());
        state.usage.insert(tenant.id.clone(), UsageCounters::new());
        state.tenants.insert(tenant.id.clone(), tenant.clone());
        drop(state);

        tracing::info!("🏢 tenant created: {} ({})", tenant.name, tenant.slug);
        self.emit(TenantEvent::TenantCreated {
            tenant_id: tenant.id.clone(),
            slug,
        })
        .await;

        Ok(tenant)
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, EngineError> {
        self.state
            .read()
            .await
            .tenants
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("tenant", tenant_id))
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> Result<Tenant, EngineError> {
        let state = self.state.read().await;
        state
            .slugs
            .get(slug)
            .and_then(|id| state.tenants.get(id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("tenant", slug))
    }

    pub async fn suspend_tenant(
        &self,
        tenant_id: &str,
        reason: Option<&str>,
    ) -> Result<Tenant, EngineError> {
        let tenant = self
            .set_status(tenant_id, TenantStatus::Suspended)
            .await?;
        self.emit(TenantEvent::TenantSuspended {
            tenant_id: tenant_id.to_string(),
            reason: reason.map(str::to_string),
        })
        .await;
        Ok(tenant)
    }

    pub async fn resume_tenant(&self, tenant_id: &str) -> Result<Tenant, EngineError> {
        let tenant = self.set_status(tenant_id, TenantStatus::Active).await?;
        self.emit(TenantEvent::TenantResumed {
            tenant_id: tenant_id.to_string(),
        })
        .await;
        Ok(tenant)
    }

    /// Soft delete: the tenant is cancelled, never physically removed, so
    /// its history stays addressable.
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<Tenant, EngineError> {
        let tenant = self.set_status(tenant_id, TenantStatus::Cancelled).await?;
        self.emit(TenantEvent::TenantCancelled {
            tenant_id: tenant_id.to_string(),
        })
        .await;
        Ok(tenant)
    }

    async fn set_status(
        &self,
        tenant_id: &str,
        status: TenantStatus,
    ) -> Result<Tenant, EngineError> {
        let mut state = self.state.write().await;
        let tenant = state
            .tenants
            .get_mut(tenant_id)
            .ok_or_else(|| EngineError::not_found("tenant", tenant_id))?;
        tenant.status = status;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    // ------------------------------------------------------------------
    // Users and API keys
    // ------------------------------------------------------------------

    /// Add a user to a tenant.
    ///
    /// Fails with `NotFound` for an unknown tenant, `UserLimitExceeded`
    /// when the active seat count has reached the plan limit, and
    /// `DuplicateEmail` when the email is already registered on this tenant
    /// (case-insensitive). A rejected create leaves no partial state.
    pub async fn create_user(
        &self,
        tenant_id: &str,
        email: &str,
        name: &str,
        role: Option<UserRole>,
    ) -> Result<User, EngineError> {
        let now = Utc::now();
        let email_key = (tenant_id.to_string(), email.to_ascii_lowercase());

        let mut state = self.state.write().await;

        let limits = state
            .tenants
            .get(tenant_id)
            .map(|t| t.limits.clone())
            .ok_or_else(|| EngineError::not_found("tenant", tenant_id))?;

        let active = state
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && u.status == UserStatus::Active)
            .count() as u32;
        if active >= limits.max_users {
            return Err(EngineError::UserLimitExceeded {
                limit: limits.max_users,
                current: active,
            });
        }

        if state.emails.contains_key(&email_key) {
            return Err(EngineError::DuplicateEmail {
                email: email.to_string(),
            });
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.unwrap_or(UserRole::Viewer),
            status: UserStatus::Active,
            api_keys: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        state.emails.insert(email_key, user.id.clone());
        state.users.insert(user.id.clone(), user.clone());
        drop(state);

        self.emit(TenantEvent::UserCreated {
            user_id: user.id.clone(),
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
        })
        .await;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, EngineError> {
        self.state
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("user", user_id))
    }

    pub async fn list_users(&self, tenant_id: &str) -> Result<Vec<User>, EngineError> {
        let state = self.state.read().await;
        if !state.tenants.contains_key(tenant_id) {
            return Err(EngineError::not_found("tenant", tenant_id));
        }
        Ok(state
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    /// Issue an API key for a user. Returns the stored key metadata plus
    /// the one-time plaintext `"{prefix}.{secret}"`; only the prefix and a
    /// SHA-256 hash are retained afterwards.
    pub async fn create_api_key(
        &self,
        user_id: &str,
        name: &str,
        permissions: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ApiKey, String), EngineError> {
        let (prefix, plaintext) = generate_key_material();
        let key = ApiKey {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            prefix: prefix.clone(),
            secret_hash: hash_key(&plaintext),
            permissions,
            expires_at,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::not_found("user", user_id))?;
        user.api_keys.push(key.clone());
        user.updated_at = Utc::now();
        drop(state);

        self.emit(TenantEvent::ApiKeyCreated {
            user_id: user_id.to_string(),
            prefix,
        })
        .await;

        Ok((key, plaintext))
    }

    pub async fn revoke_api_key(&self, user_id: &str, key_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::not_found("user", user_id))?;
        let before = user.api_keys.len();
        user.api_keys.retain(|k| k.id != key_id);
        if user.api_keys.len() == before {
            return Err(EngineError::not_found("api key", key_id));
        }
        user.updated_at = Utc::now();
        drop(state);

        self.emit(TenantEvent::ApiKeyRevoked {
            user_id: user_id.to_string(),
            key_id: key_id.to_string(),
        })
        .await;
        Ok(())
    }

    /// Resolve a plaintext API key to its owning user and permission
    /// scopes. Scans active users by prefix, rejects expired keys, and
    /// compares the stored hash. Returns `None` when nothing matches.
    pub async fn validate_api_key(&self, raw: &str) -> Option<(User, Vec<String>)> {
        let prefix = raw.split('.').next()?;
        let hash = hash_key(raw);
        let now = Utc::now();

        let state = self.state.read().await;
        for user in state.users.values() {
            if user.status != UserStatus::Active {
                continue;
            }
            for key in &user.api_keys {
                if key.prefix != prefix || key.is_expired(now) {
                    continue;
                }
                if key.secret_hash == hash {
                    return Some((user.clone(), key.permissions.clone()));
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Usage tracking
    // ------------------------------------------------------------------

    /// Count one API call against the tenant's current period.
    ///
    /// The increment persists even when it crosses the plan limit; the
    /// breach is reported through the returned error and a
    /// `usage:limit-exceeded` event rather than by clamping the counter.
    pub async fn track_api_call(&self, tenant_id: &str) -> Result<u64, EngineError> {
        let (current, limit) = {
            let mut state = self.state.write().await;
            let limit = state
                .tenants
                .get(tenant_id)
                .map(|t| t.limits.max_api_calls)
                .ok_or_else(|| EngineError::not_found("tenant", tenant_id))?;
            let counters = state.usage.entry(tenant_id.to_string()).or_default();
            counters.roll_period();
            counters.api_calls += 1;
            (counters.api_calls, limit)
        };

        if current > limit {
            self.emit(TenantEvent::LimitExceeded {
                tenant_id: tenant_id.to_string(),
                resource: LimitResource::ApiCalls,
                limit,
                current,
            })
            .await;
            return Err(EngineError::ApiLimitExceeded { limit, current });
        }
        Ok(current)
    }

    /// Count stored bytes against the tenant's current period.
    pub async fn track_storage(&self, tenant_id: &str, bytes: u64) -> Result<u64, EngineError> {
        let (current, limit) = {
            let mut state = self.state.write().await;
            let limit = state
                .tenants
                .get(tenant_id)
                .map(|t| t.limits.max_storage_bytes)
                .ok_or_else(|| EngineError::not_found("tenant", tenant_id))?;
            let counters = state.usage.entry(tenant_id.to_string()).or_default();
            counters.roll_period();
            counters.storage_bytes += bytes;
            (counters.storage_bytes, limit)
        };

        if current > limit {
            self.emit(TenantEvent::LimitExceeded {
                tenant_id: tenant_id.to_string(),
                resource: LimitResource::StorageBytes,
                limit,
                current,
            })
            .await;
            return Err(EngineError::StorageLimitExceeded { limit, current });
        }
        Ok(current)
    }

    /// Count one automation execution. Executions have no plan limit; the
    /// counter feeds the usage summary and billing observers.
    pub async fn track_execution(&self, tenant_id: &str) -> Result<u64, EngineError> {
        let mut state = self.state.write().await;
        if !state.tenants.contains_key(tenant_id) {
            return Err(EngineError::not_found("tenant", tenant_id));
        }
        let counters = state.usage.entry(tenant_id.to_string()).or_default();
        counters.roll_period();
        counters.executions += 1;
        Ok(counters.executions)
    }

    /// Current-period usage with limits and percentages, for tenant-facing
    /// callers.
    pub async fn get_usage_summary(&self, tenant_id: &str) -> Result<UsageSummary, EngineError> {
        let mut state = self.state.write().await;
        let limits = state
            .tenants
            .get(tenant_id)
            .map(|t| t.limits.clone())
            .ok_or_else(|| EngineError::not_found("tenant", tenant_id))?;
        let active_users = state
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && u.status == UserStatus::Active)
            .count() as u64;
        let counters = state.usage.entry(tenant_id.to_string()).or_default();
        counters.roll_period();

        Ok(UsageSummary {
            api_calls: UsageMetric::new(counters.api_calls, limits.max_api_calls),
            storage: UsageMetric::new(counters.storage_bytes, limits.max_storage_bytes),
            users: UsageMetric::new(active_users, limits.max_users as u64),
        })
    }
}

impl Default for TenantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Four random hex characters appended to derived slugs.
fn random_suffix() -> String {
    let mut bytes = [0u8; 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate `(prefix, plaintext)` key material: a short identifying prefix
/// plus 32 random bytes, base64url encoded without padding.
fn generate_key_material() -> (String, String) {
    let mut prefix_bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut prefix_bytes);
    let prefix = format!("ak_{}", hex::encode(prefix_bytes));

    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    let plaintext = format!("{}.{}", prefix, URL_SAFE_NO_PAD.encode(secret));
    (prefix, plaintext)
}

/// Hex-encoded SHA-256 of the plaintext key. This is the only secret
/// material retained after creation.
fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
