/// Configuration management for the automation core
///
/// Handles data directory layout, bootstrap tenant selection, the component
/// identifier lists consumed by the loader catalog, and per-plan limit
/// overrides. Every field has an environment variable override so the core
/// can be configured in k8s/container deployments without a config file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::tenant::types::{PlanTier, ResourceLimits};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for the automation database (default: "data")
    pub data_dir: String,
    /// Optional tenant slug resolved (or provisioned) at boot and cached on
    /// the [`System`](crate::loader::System) handle
    pub default_tenant_slug: Option<String>,
    /// Tool identifiers to construct from the compiled-in catalog
    pub tools: Vec<String>,
    /// Agent identifiers to construct from the compiled-in catalog
    pub agents: Vec<String>,
    /// Integration provider identifiers (best-effort: a provider that fails
    /// to initialize is logged and skipped, never fatal to boot)
    pub integrations: Vec<String>,
    /// Knowledge source identifiers
    pub knowledge: Vec<String>,
    /// When true the CALL_WEBHOOK executor performs real outbound HTTP;
    /// when false a logging stand-in is registered instead
    pub outbound_http: bool,
    /// Endpoint for the "crm" integration provider, if enabled
    pub crm_endpoint: Option<String>,
    /// Per-plan resource limit overrides, keyed by plan name
    /// (e.g. "free", "enterprise"). Unlisted plans use the built-in table.
    #[serde(default)]
    pub plan_overrides: HashMap<String, ResourceLimits>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            default_tenant_slug: None,
            tools: vec!["http_request".to_string(), "field_extract".to_string()],
            agents: vec!["triage".to_string()],
            integrations: Vec::new(),
            knowledge: vec!["playbook".to_string()],
            outbound_http: false,
            crm_endpoint: None,
            plan_overrides: HashMap::new(),
        }
    }
}

impl Config {
    /// Build a configuration from the environment, falling back to defaults.
    ///
    /// List-valued variables are comma separated, e.g.
    /// `TENANTFLOW_TOOLS=http_request,field_extract`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("TENANTFLOW_DATA_DIR").unwrap_or(defaults.data_dir),
            default_tenant_slug: std::env::var("TENANTFLOW_DEFAULT_TENANT").ok(),
            tools: env_list("TENANTFLOW_TOOLS").unwrap_or(defaults.tools),
            agents: env_list("TENANTFLOW_AGENTS").unwrap_or(defaults.agents),
            integrations: env_list("TENANTFLOW_INTEGRATIONS").unwrap_or(defaults.integrations),
            knowledge: env_list("TENANTFLOW_KNOWLEDGE").unwrap_or(defaults.knowledge),
            outbound_http: std::env::var("TENANTFLOW_OUTBOUND_HTTP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.outbound_http),
            crm_endpoint: std::env::var("TENANTFLOW_CRM_ENDPOINT").ok(),
            plan_overrides: HashMap::new(),
        }
    }

    /// Schema-validate the configuration before boot (step 1 of the boot
    /// sequence). Rejects empty paths, blank identifiers and overrides for
    /// plan names that do not exist.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.data_dir.trim().is_empty() {
            return Err(EngineError::Config("data_dir must not be empty".to_string()));
        }

        for (kind, ids) in [
            ("tools", &self.tools),
            ("agents", &self.agents),
            ("integrations", &self.integrations),
            ("knowledge", &self.knowledge),
        ] {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(EngineError::Config(format!(
                    "{kind} list contains a blank identifier"
                )));
            }
        }

        for plan_name in self.plan_overrides.keys() {
            if PlanTier::parse(plan_name).is_none() {
                return Err(EngineError::Config(format!(
                    "plan override for unknown plan: {plan_name}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve the effective limits for a plan: the configured override if
    /// present, otherwise the built-in plan table.
    pub fn limits_for(&self, plan: PlanTier) -> ResourceLimits {
        self.plan_overrides
            .get(plan.as_str())
            .cloned()
            .unwrap_or_else(|| plan.limits())
    }
}

/// Read a comma-separated list from the environment.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn blank_tool_id_is_rejected() {
        let config = Config {
            tools: vec!["http_request".to_string(), "  ".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn unknown_plan_override_is_rejected() {
        let mut config = Config::default();
        config
            .plan_overrides
            .insert("platinum".to_string(), PlanTier::Free.limits());
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn plan_override_wins_over_builtin_table() {
        let mut config = Config::default();
        let mut limits = PlanTier::Free.limits();
        limits.max_users = 99;
        config.plan_overrides.insert("free".to_string(), limits);
        assert_eq!(config.limits_for(PlanTier::Free).max_users, 99);
        assert_eq!(
            config.limits_for(PlanTier::Starter).max_users,
            PlanTier::Starter.limits().max_users
        );
    }
}
