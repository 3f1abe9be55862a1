/// System loader: boot sequence and teardown
///
/// Wires together all components in strict order: configuration, tenant
/// registry, tools, integrations, knowledge sources, agents, executors,
/// the automation engine and the schedule service. Cross-references are
/// validated before anything is wired; a half-wired system should not
/// start silently degraded, so unresolved references abort boot with the
/// full offending list.

// Compiled-in component catalog (identifier -> factory)
pub mod catalog;

use std::path::Path;
use std::sync::Arc;

use crate::automation::engine::AutomationEngine;
use crate::automation::registry::AutomationRegistry;
use crate::automation::storage::AutomationStore;
use crate::automation::types::ActionType;
use crate::config::Config;
use crate::error::EngineError;
use crate::registry::{ComponentRegistry, RegistryWiring, SharedRegistry};
use crate::runtime::executor::{builtin_executor_registry, ExecutorRegistry};
use crate::runtime::scheduler::ScheduleService;
use crate::tenant::types::Tenant;
use crate::tenant::TenantRegistry;

use catalog::ComponentFactory;

/// A fully booted automation core.
///
/// Holds every registry and service constructed by [`boot`]; dropping the
/// handle without calling [`System::shutdown`] leaves timers running until
/// the process exits.
pub struct System {
    pub config: Config,
    pub tenants: Arc<TenantRegistry>,
    pub tools: SharedRegistry,
    pub agents: SharedRegistry,
    pub integrations: SharedRegistry,
    pub knowledge: SharedRegistry,
    pub executors: Arc<ExecutorRegistry>,
    pub engine: Arc<AutomationEngine>,
    pub scheduler: Arc<ScheduleService>,
    /// Resolved bootstrap tenant, when one was configured
    pub default_tenant: Option<Tenant>,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("config", &self.config)
            .field("default_tenant", &self.default_tenant)
            .finish_non_exhaustive()
    }
}

/// Initialize the tracing subscriber for process-level logging. Safe to
/// call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// Boot the automation core from configuration.
///
/// The sequence is strictly ordered; steps 3 to 6 guard each component
/// individually so one bad implementation does not abort the others, while
/// step 7 (cross-reference validation) is fatal by design.
pub async fn boot(config: Config) -> Result<System, EngineError> {
    // Step 1: validate configuration before touching anything else.
    config.validate()?;
    tracing::info!("🧾 configuration validated");

    // Step 2: construct the tenant registry and resolve the bootstrap
    // tenant if one was requested (provisioning it on first boot).
    let tenants = Arc::new(TenantRegistry::with_plan_overrides(
        config.plan_overrides.clone(),
    ));
    let default_tenant = match &config.default_tenant_slug {
        Some(slug) => {
            let tenant = match tenants.get_tenant_by_slug(slug).await {
                Ok(existing) => existing,
                Err(_) => tenants.create_tenant(slug, Some(slug.as_str()), None).await?,
            };
            tracing::info!("🏢 bootstrap tenant ready: {}", tenant.slug);
            Some(tenant)
        }
        None => None,
    };

    // Steps 3 to 6: instantiate, initialize and register components from
    // the compiled-in catalog, one registry at a time.
    let tools: SharedRegistry = Arc::new(ComponentRegistry::new("tool"));
    populate_registry(&config.tools, catalog::tool_catalog(), &tools, &config).await;

    let integrations: SharedRegistry = Arc::new(ComponentRegistry::new("integration"));
    populate_registry(
        &config.integrations,
        catalog::integration_catalog(),
        &integrations,
        &config,
    )
    .await;

    let knowledge: SharedRegistry = Arc::new(ComponentRegistry::new("knowledge"));
    populate_registry(
        &config.knowledge,
        catalog::knowledge_catalog(),
        &knowledge,
        &config,
    )
    .await;

    let agents: SharedRegistry = Arc::new(ComponentRegistry::new("agent"));
    populate_registry(&config.agents, catalog::agent_catalog(), &agents, &config).await;

    // Built-in executors, including the registry-dispatching ones.
    let executors = builtin_executor_registry(
        Arc::clone(&agents),
        Arc::clone(&tools),
        config.outbound_http,
    );

    // Automation store and registry, loaded from disk.
    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = Path::new(&config.data_dir).join("automations.db");
    let store = AutomationStore::connect(&db_path).await?;
    store.init_schema().await?;
    let registry = AutomationRegistry::new(store);
    registry.init_from_store().await?;

    let engine = Arc::new(AutomationEngine::new(
        registry,
        Arc::clone(&executors),
        Arc::clone(&tenants),
    ));

    // Step 7: validate every cross-reference, collecting all misses.
    let missing = validate_references(&engine, &tools, &agents, &executors);
    if !missing.is_empty() {
        tracing::error!("❌ boot aborted, unresolved references: {:?}", missing);
        return Err(EngineError::Dependency { missing });
    }

    // Step 8: wire cross-registry references into components that expose
    // setter hooks.
    let wiring = RegistryWiring {
        tools: Arc::clone(&tools),
        knowledge: Arc::clone(&knowledge),
        integrations: Arc::clone(&integrations),
    };
    for id in agents.ids() {
        if let Some(agent) = agents.get(&id) {
            agent.wire(&wiring);
        }
    }

    // Schedule service last: arm timers for enabled SCHEDULE automations.
    let scheduler = Arc::new(ScheduleService::new(Arc::downgrade(&engine)).await?);
    engine.attach_scheduler(Arc::clone(&scheduler));
    scheduler.start().await?;
    for automation in engine.scheduled_automations() {
        // Stored expressions can predate validation; a bad one loses its
        // timer but never blocks boot.
        if let Err(error) = scheduler.arm(&automation).await {
            tracing::warn!(
                "⚠️ could not arm timer for {}: {}",
                automation.id,
                error
            );
        }
    }

    tracing::info!(
        "✅ system booted: {} tools, {} agents, {} integrations, {} knowledge sources, {} automations",
        tools.len(),
        agents.len(),
        integrations.len(),
        knowledge.len(),
        engine.all_automations().len()
    );

    Ok(System {
        config,
        tenants,
        tools,
        agents,
        integrations,
        knowledge,
        executors,
        engine,
        scheduler,
        default_tenant,
    })
}

/// Instantiate and register the requested catalog components. Each item is
/// guarded individually: an unknown identifier or a failed initialize is
/// logged and skipped.
async fn populate_registry(
    requested: &[String],
    available: std::collections::HashMap<&'static str, ComponentFactory>,
    registry: &SharedRegistry,
    config: &Config,
) {
    for id in requested {
        let Some(factory) = available.get(id.as_str()) else {
            tracing::warn!("⚠️ unknown {} id in config: {}", registry.label(), id);
            continue;
        };
        let component = factory(config);
        match component.initialize().await {
            Ok(()) => {
                registry.register_component(component);
                tracing::info!("✅ {} ready: {}", registry.label(), id);
            }
            Err(error) => {
                tracing::warn!(
                    "⚠️ {} failed to initialize, skipping: {} ({})",
                    registry.label(),
                    id,
                    error
                );
            }
        }
    }
}

/// Collect every unresolved cross-reference: agent tool dependencies plus
/// executor/agent/tool identifiers referenced by stored automations.
fn validate_references(
    engine: &AutomationEngine,
    tools: &SharedRegistry,
    agents: &SharedRegistry,
    executors: &ExecutorRegistry,
) -> Vec<String> {
    let mut missing = Vec::new();

    for agent_id in agents.ids() {
        if let Some(agent) = agents.get(&agent_id) {
            for dependency in agent.dependencies() {
                if !tools.contains(&dependency) {
                    missing.push(format!("agent '{agent_id}' requires tool '{dependency}'"));
                }
            }
        }
    }

    for automation in engine.all_automations() {
        for action in &automation.actions {
            let type_key = action.action_type.as_str();
            if !executors.contains(type_key) {
                missing.push(format!(
                    "automation '{}' action type '{}' has no executor",
                    automation.id, type_key
                ));
            }
            match action.action_type {
                ActionType::RunAgent => {
                    if let Some(agent_id) = action.config.get("agent").and_then(|a| a.as_str()) {
                        if !agents.contains(agent_id) {
                            missing.push(format!(
                                "automation '{}' references unknown agent '{}'",
                                automation.id, agent_id
                            ));
                        }
                    }
                }
                ActionType::Custom => {
                    if let Some(tool_id) = action.config.get("tool").and_then(|t| t.as_str()) {
                        if !tools.contains(tool_id) {
                            missing.push(format!(
                                "automation '{}' references unknown tool '{}'",
                                automation.id, tool_id
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    missing
}

impl System {
    /// Teardown, the mirror of boot: stop the scheduler, give every
    /// component a chance to release resources, then clear every registry.
    /// Individual failures are collected and logged, never rethrown, so
    /// teardown always completes.
    pub async fn shutdown(&self) {
        tracing::info!("⏹️ shutting down automation core");
        let mut failures: Vec<String> = Vec::new();

        if let Err(error) = self.scheduler.stop().await {
            failures.push(format!("scheduler: {error}"));
        }

        for registry in [&self.agents, &self.tools, &self.integrations, &self.knowledge] {
            for id in registry.ids() {
                if let Some(component) = registry.get(&id) {
                    if let Err(error) = component.shutdown().await {
                        failures.push(format!("{} '{}': {}", registry.label(), id, error));
                    }
                }
            }
            registry.clear();
        }
        self.executors.clear();

        if failures.is_empty() {
            tracing::info!("✅ teardown complete");
        } else {
            for failure in &failures {
                tracing::warn!("⚠️ teardown failure: {}", failure);
            }
            tracing::info!("✅ teardown complete ({} failures logged)", failures.len());
        }
    }
}
