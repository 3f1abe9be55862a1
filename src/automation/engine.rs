/// Automation execution engine
///
/// Owns automation definitions, evaluates conditions against the runtime
/// context, executes ordered actions against the pluggable executor
/// registry and appends execution history. Executor failures never
/// propagate as errors from `run_automation`: the trigger source (a timer,
/// a webhook) has no human to show a stack trace to, so a failed run is
/// returned as a FAILED record instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::automation::conditions;
use crate::automation::registry::AutomationRegistry;
use crate::automation::types::{
    Action, ActionDefinition, Automation, AutomationDefinition, AutomationUpdate, ExecutionRecord,
    ExecutionStatus, JsonMap, TriggerKind,
};
use crate::error::EngineError;
use crate::runtime::executor::ExecutorRegistry;
use crate::runtime::scheduler::{schedule_to_cron, ScheduleService};
use crate::tenant::TenantRegistry;

/// Default cap applied to execution history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Define, schedule and execute tenant-scoped automations.
pub struct AutomationEngine {
    registry: AutomationRegistry,
    executors: Arc<ExecutorRegistry>,
    tenants: Arc<TenantRegistry>,
    /// Process-local, append-only execution records per automation
    history: RwLock<HashMap<String, Vec<ExecutionRecord>>>,
    /// Attached after construction; the scheduler holds a Weak back-edge
    scheduler: ArcSwapOption<ScheduleService>,
}

impl AutomationEngine {
    pub fn new(
        registry: AutomationRegistry,
        executors: Arc<ExecutorRegistry>,
        tenants: Arc<TenantRegistry>,
    ) -> Self {
        Self {
            registry,
            executors,
            tenants,
            history: RwLock::new(HashMap::new()),
            scheduler: ArcSwapOption::from(None),
        }
    }

    /// Wire the schedule service in after both sides exist.
    pub fn attach_scheduler(&self, scheduler: Arc<ScheduleService>) {
        self.scheduler.store(Some(scheduler));
    }

    // ------------------------------------------------------------------
    // Definition lifecycle
    // ------------------------------------------------------------------

    /// Create an automation for a tenant. SCHEDULE triggers are validated
    /// against the fixed expression table up front and, when enabled, get
    /// their recurring timer armed immediately.
    pub async fn create_automation(
        &self,
        tenant_id: &str,
        definition: AutomationDefinition,
    ) -> Result<Automation, EngineError> {
        self.tenants.get_tenant(tenant_id).await?;
        validate_schedule(definition.trigger, &definition.trigger_config)?;

        let now = Utc::now();
        let automation = Automation {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: definition.name,
            description: definition.description,
            trigger: definition.trigger,
            trigger_config: definition.trigger_config,
            conditions: definition.conditions,
            actions: materialize_actions(definition.actions),
            enabled: definition.enabled,
            execution_count: 0,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.registry.upsert(automation.clone()).await?;
        self.rearm_timer(&automation).await?;

        tracing::info!(
            "🔧 automation created: {} ({}, trigger: {})",
            automation.name,
            automation.id,
            automation.trigger.as_str()
        );
        Ok(automation)
    }

    /// Update an automation. A replaced action list is wholesale: every
    /// action gets a fresh identifier and order index. Any armed timer is
    /// torn down and re-armed rather than mutated live, so no timer closure
    /// ever holds stale trigger configuration.
    pub async fn update_automation(
        &self,
        automation_id: &str,
        update: AutomationUpdate,
    ) -> Result<Automation, EngineError> {
        let mut automation = self
            .registry
            .get(automation_id)
            .ok_or_else(|| EngineError::not_found("automation", automation_id))?;

        if let Some(name) = update.name {
            automation.name = name;
        }
        if let Some(description) = update.description {
            automation.description = Some(description);
        }
        if let Some(trigger) = update.trigger {
            automation.trigger = trigger;
        }
        if let Some(trigger_config) = update.trigger_config {
            automation.trigger_config = trigger_config;
        }
        if let Some(conditions) = update.conditions {
            automation.conditions = conditions;
        }
        if let Some(actions) = update.actions {
            automation.actions = materialize_actions(actions);
        }
        if let Some(enabled) = update.enabled {
            automation.enabled = enabled;
        }
        automation.updated_at = Utc::now();

        validate_schedule(automation.trigger, &automation.trigger_config)?;

        self.registry.upsert(automation.clone()).await?;
        self.rearm_timer(&automation).await?;

        Ok(automation)
    }

    /// Enable or disable an automation. Disabling tears down its timer;
    /// re-enabling a SCHEDULE automation arms exactly one timer.
    pub async fn toggle_automation(
        &self,
        automation_id: &str,
        enabled: bool,
    ) -> Result<Automation, EngineError> {
        let mut automation = self
            .registry
            .get(automation_id)
            .ok_or_else(|| EngineError::not_found("automation", automation_id))?;
        automation.enabled = enabled;
        automation.updated_at = Utc::now();

        self.registry.upsert(automation.clone()).await?;
        self.rearm_timer(&automation).await?;

        tracing::info!(
            "🎚️ automation {}: {}",
            if enabled { "enabled" } else { "disabled" },
            automation.name
        );
        Ok(automation)
    }

    /// Delete an automation definition. Execution history stays queryable.
    pub async fn delete_automation(&self, automation_id: &str) -> Result<(), EngineError> {
        if self.registry.get(automation_id).is_none() {
            return Err(EngineError::not_found("automation", automation_id));
        }
        if let Some(scheduler) = self.scheduler.load_full() {
            scheduler.disarm(automation_id).await;
        }
        self.registry.remove(automation_id).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_automation(&self, automation_id: &str) -> Result<Automation, EngineError> {
        self.registry
            .get(automation_id)
            .ok_or_else(|| EngineError::not_found("automation", automation_id))
    }

    pub fn list_by_tenant(&self, tenant_id: &str) -> Vec<Automation> {
        self.registry.list_by_tenant(tenant_id)
    }

    /// Fan-out lookup for event and webhook dispatchers.
    pub fn find_by_trigger(&self, tenant_id: &str, trigger: TriggerKind) -> Vec<Automation> {
        self.registry.find_by_trigger(tenant_id, trigger)
    }

    pub fn all_automations(&self) -> Vec<Automation> {
        self.registry.all()
    }

    /// Enabled SCHEDULE automations, for arming timers at boot.
    pub fn scheduled_automations(&self) -> Vec<Automation> {
        self.registry
            .all()
            .into_iter()
            .filter(|a| a.enabled && a.trigger == TriggerKind::Schedule)
            .collect()
    }

    /// Recent execution records, most recent first, capped at `limit`
    /// (default 100).
    pub async fn get_execution_history(
        &self,
        automation_id: &str,
        limit: Option<usize>,
    ) -> Vec<ExecutionRecord> {
        let history = self.history.read().await;
        history
            .get(automation_id)
            .map(|records| {
                records
                    .iter()
                    .rev()
                    .take(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run an automation to completion against a runtime context.
    ///
    /// Fails fast with `NotFound`/`Disabled`; every other outcome is
    /// reported through the returned record. Actions run strictly in
    /// ascending order index; each executor receives the action's
    /// configuration plus the accumulated output of prior actions keyed by
    /// action identifier, so later steps can consume earlier results.
    pub async fn run_automation(
        &self,
        automation_id: &str,
        context: Value,
        acting_user: Option<&str>,
    ) -> Result<ExecutionRecord, EngineError> {
        let automation = self
            .registry
            .get(automation_id)
            .ok_or_else(|| EngineError::not_found("automation", automation_id))?;
        if !automation.enabled {
            return Err(EngineError::Disabled {
                automation_id: automation_id.to_string(),
            });
        }

        let started = Instant::now();
        let mut record = ExecutionRecord {
            id: Uuid::new_v4().to_string(),
            automation_id: automation_id.to_string(),
            triggered_by: acting_user.map(str::to_string),
            status: ExecutionStatus::Running,
            context: context.clone(),
            outputs: JsonMap::new(),
            error: None,
            duration_ms: 0,
            created_at: Utc::now(),
        };
        self.push_history(&record).await;

        tracing::info!("🚀 running automation: {} ({})", automation.name, record.id);

        // A condition miss is a normal skip, not an error.
        if !conditions::evaluate_sequence(&automation.conditions, &context) {
            record.status = ExecutionStatus::Cancelled;
            record.duration_ms = started.elapsed().as_millis() as u64;
            self.finalize_history(&record).await;
            tracing::info!("⏭️ conditions not met, skipping actions: {}", automation.name);
            return Ok(record);
        }

        // The accumulated context starts as the run context and gains each
        // action's output under the action id.
        let mut accumulated = match &context {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = JsonMap::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };

        let mut actions = automation.actions.clone();
        actions.sort_by_key(|action| action.order);

        let mut failure: Option<String> = None;
        for action in &actions {
            let Some(executor) = self.executors.get(action.action_type.as_str()) else {
                tracing::warn!(
                    "⚠️ no executor registered for action type {}, skipping",
                    action.action_type.as_str()
                );
                continue;
            };

            let action_start = Instant::now();
            match executor.execute(&action.config, &accumulated).await {
                Ok(output) => {
                    tracing::debug!(
                        "✅ action {} completed in {:?}",
                        action.action_type.as_str(),
                        action_start.elapsed()
                    );
                    accumulated.insert(action.id.clone(), output.clone());
                    record.outputs.insert(action.id.clone(), output);
                }
                Err(error) => {
                    tracing::error!(
                        "❌ action {} failed after {:?}: {}",
                        action.action_type.as_str(),
                        action_start.elapsed(),
                        error
                    );
                    failure = Some(error.to_string());
                    // No partial-continue: remaining actions are not run.
                    break;
                }
            }
        }

        match failure {
            Some(message) => {
                record.status = ExecutionStatus::Failed;
                record.error = Some(message);
            }
            None => {
                record.status = ExecutionStatus::Success;
                if let Err(error) = self.mark_executed(automation_id).await {
                    tracing::error!(
                        "⚠️ failed to persist execution counter for {}: {}",
                        automation_id,
                        error
                    );
                }
                if let Err(error) = self.tenants.track_execution(&automation.tenant_id).await {
                    tracing::debug!(
                        "usage tracking skipped for tenant {}: {}",
                        automation.tenant_id,
                        error
                    );
                }
            }
        }

        record.duration_ms = started.elapsed().as_millis() as u64;
        self.finalize_history(&record).await;

        tracing::info!(
            "🏁 automation {} finished: {:?} in {}ms",
            automation.name,
            record.status,
            record.duration_ms
        );
        Ok(record)
    }

    /// Bump the execution counter and last-executed timestamp after a
    /// successful run.
    async fn mark_executed(&self, automation_id: &str) -> Result<(), EngineError> {
        let Some(mut automation) = self.registry.get(automation_id) else {
            // Deleted mid-run: nothing to update.
            return Ok(());
        };
        automation.execution_count += 1;
        automation.last_executed_at = Some(Utc::now());
        automation.updated_at = Utc::now();
        self.registry.upsert(automation).await
    }

    /// Tear down and, when appropriate, re-arm the timer for an automation.
    async fn rearm_timer(&self, automation: &Automation) -> Result<(), EngineError> {
        let Some(scheduler) = self.scheduler.load_full() else {
            return Ok(());
        };
        scheduler.disarm(&automation.id).await;
        if automation.enabled && automation.trigger == TriggerKind::Schedule {
            scheduler.arm(automation).await?;
        }
        Ok(())
    }

    async fn push_history(&self, record: &ExecutionRecord) {
        let mut history = self.history.write().await;
        history
            .entry(record.automation_id.clone())
            .or_default()
            .push(record.clone());
    }

    async fn finalize_history(&self, record: &ExecutionRecord) {
        let mut history = self.history.write().await;
        if let Some(records) = history.get_mut(&record.automation_id) {
            if let Some(slot) = records.iter_mut().rev().find(|r| r.id == record.id) {
                *slot = record.clone();
            }
        }
    }
}

/// Reject SCHEDULE triggers whose expression is outside the fixed table,
/// so an automation can never sit armed with a timer that silently never
/// fires.
fn validate_schedule(trigger: TriggerKind, trigger_config: &JsonMap) -> Result<(), EngineError> {
    if trigger != TriggerKind::Schedule {
        return Ok(());
    }
    let expression = trigger_config
        .get("schedule")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if schedule_to_cron(expression).is_none() {
        return Err(EngineError::InvalidSchedule {
            expression: expression.to_string(),
        });
    }
    Ok(())
}

/// Assign fresh identifiers and contiguous order indexes to a caller
/// supplied action list.
fn materialize_actions(definitions: Vec<ActionDefinition>) -> Vec<Action> {
    definitions
        .into_iter()
        .enumerate()
        .map(|(index, definition)| Action {
            id: Uuid::new_v4().to_string(),
            action_type: definition.action_type,
            config: definition.config,
            order: index as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::storage::AutomationStore;
    use crate::automation::types::{ActionType, Condition, ConditionOperator, LogicConnector};
    use crate::runtime::executor::ActionExecutor;
    use crate::tenant::Tenant;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed output and counts invocations.
    struct CountingExecutor {
        action_type: &'static str,
        output: Value,
        calls: AtomicUsize,
    }

    impl CountingExecutor {
        fn new(action_type: &'static str, output: Value) -> Arc<Self> {
            Arc::new(Self {
                action_type,
                output,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ActionExecutor for CountingExecutor {
        fn action_type(&self) -> &'static str {
            self.action_type
        }

        async fn execute(&self, _config: &JsonMap, _accumulated: &JsonMap) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl ActionExecutor for FailingExecutor {
        fn action_type(&self) -> &'static str {
            "SEND_EMAIL"
        }

        async fn execute(&self, _config: &JsonMap, _accumulated: &JsonMap) -> Result<Value> {
            anyhow::bail!("smtp unreachable")
        }
    }

    /// Echoes the accumulated context so tests can observe data passing.
    struct EchoAccumulatedExecutor {
        action_type: &'static str,
    }

    #[async_trait]
    impl ActionExecutor for EchoAccumulatedExecutor {
        fn action_type(&self) -> &'static str {
            self.action_type
        }

        async fn execute(&self, _config: &JsonMap, accumulated: &JsonMap) -> Result<Value> {
            Ok(Value::Object(accumulated.clone()))
        }
    }

    async fn test_engine(executors: Arc<ExecutorRegistry>) -> (Arc<AutomationEngine>, Tenant) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = AutomationStore::new(pool);
        store.init_schema().await.unwrap();
        let registry = AutomationRegistry::new(store);
        registry.init_from_store().await.unwrap();

        let tenants = Arc::new(TenantRegistry::new());
        let tenant = tenants.create_tenant("Acme", None, None).await.unwrap();
        let engine = Arc::new(AutomationEngine::new(registry, executors, tenants));
        (engine, tenant)
    }

    fn manual_definition(actions: Vec<ActionDefinition>) -> AutomationDefinition {
        AutomationDefinition {
            name: "test".to_string(),
            description: None,
            trigger: TriggerKind::Manual,
            trigger_config: JsonMap::new(),
            conditions: Vec::new(),
            actions,
            enabled: true,
        }
    }

    fn action_of(action_type: ActionType) -> ActionDefinition {
        ActionDefinition {
            action_type,
            config: JsonMap::new(),
        }
    }

    #[tokio::test]
    async fn unknown_automation_is_not_found() {
        let (engine, _tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let err = engine
            .run_automation("missing", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn disabled_automation_refuses_to_run() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let mut definition = manual_definition(Vec::new());
        definition.enabled = false;
        let automation = engine
            .create_automation(&tenant.id, definition)
            .await
            .unwrap();

        let err = engine
            .run_automation(&automation.id, json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Disabled { .. }));
        // Fail-fast: no record was appended.
        assert!(engine.get_execution_history(&automation.id, None).await.is_empty());
    }

    #[tokio::test]
    async fn empty_condition_list_runs_actions() {
        let executors = Arc::new(ExecutorRegistry::new("executor"));
        let message = CountingExecutor::new("SEND_MESSAGE", json!({ "sent": true }));
        executors.register("SEND_MESSAGE", message.clone());

        let (engine, tenant) = test_engine(executors).await;
        let automation = engine
            .create_automation(&tenant.id, manual_definition(vec![action_of(ActionType::SendMessage)]))
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({}), Some("user-1"))
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.triggered_by.as_deref(), Some("user-1"));
        assert_eq!(message.calls(), 1);
        assert_eq!(record.outputs.len(), 1);

        // Counter and timestamp moved.
        let updated = engine.get_automation(&automation.id).unwrap();
        assert_eq!(updated.execution_count, 1);
        assert!(updated.last_executed_at.is_some());
    }

    #[tokio::test]
    async fn condition_miss_cancels_without_running_actions() {
        let executors = Arc::new(ExecutorRegistry::new("executor"));
        let message = CountingExecutor::new("SEND_MESSAGE", json!({}));
        executors.register("SEND_MESSAGE", message.clone());

        let (engine, tenant) = test_engine(executors).await;
        let mut definition = manual_definition(vec![action_of(ActionType::SendMessage)]);
        definition.conditions = vec![Condition {
            field: "a".to_string(),
            operator: ConditionOperator::Equals,
            value: json!(1),
            logic: None,
        }];
        let automation = engine
            .create_automation(&tenant.id, definition)
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({ "a": 2 }), None)
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert!(record.outputs.is_empty());
        assert!(record.error.is_none());
        assert_eq!(message.calls(), 0);
        // A condition miss is not a successful execution.
        assert_eq!(engine.get_automation(&automation.id).unwrap().execution_count, 0);

        // With a satisfying context the same automation runs.
        let record = engine
            .run_automation(&automation.id, json!({ "a": 1 }), None)
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(message.calls(), 1);
    }

    #[tokio::test]
    async fn or_connector_short_circuits() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let mut definition = manual_definition(Vec::new());
        definition.conditions = vec![
            Condition {
                field: "a".to_string(),
                operator: ConditionOperator::Equals,
                value: json!(1),
                logic: Some(LogicConnector::Or),
            },
            Condition {
                field: "b".to_string(),
                operator: ConditionOperator::Equals,
                value: json!("never"),
                logic: None,
            },
        ];
        let automation = engine
            .create_automation(&tenant.id, definition)
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({ "a": 1 }), None)
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn failing_action_stops_the_run() {
        let executors = Arc::new(ExecutorRegistry::new("executor"));
        let first = CountingExecutor::new("SEND_MESSAGE", json!({ "step": 1 }));
        let third = CountingExecutor::new("CREATE_TASK", json!({ "step": 3 }));
        executors.register("SEND_MESSAGE", first.clone());
        executors.register("SEND_EMAIL", Arc::new(FailingExecutor));
        executors.register("CREATE_TASK", third.clone());

        let (engine, tenant) = test_engine(executors).await;
        let automation = engine
            .create_automation(
                &tenant.id,
                manual_definition(vec![
                    action_of(ActionType::SendMessage),
                    action_of(ActionType::SendEmail),
                    action_of(ActionType::CreateTask),
                ]),
            )
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({}), None)
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("smtp unreachable"));

        // First action's output is present, third's is absent.
        let first_action_id = &automation.actions[0].id;
        let third_action_id = &automation.actions[2].id;
        assert!(record.outputs.contains_key(first_action_id));
        assert!(!record.outputs.contains_key(third_action_id));
        assert_eq!(first.calls(), 1);
        assert_eq!(third.calls(), 0);

        // Failed runs do not bump the execution counter.
        assert_eq!(engine.get_automation(&automation.id).unwrap().execution_count, 0);
    }

    #[tokio::test]
    async fn unregistered_action_type_is_skipped_not_fatal() {
        let executors = Arc::new(ExecutorRegistry::new("executor"));
        let task = CountingExecutor::new("CREATE_TASK", json!({ "created": true }));
        executors.register("CREATE_TASK", task.clone());

        let (engine, tenant) = test_engine(executors).await;
        let automation = engine
            .create_automation(
                &tenant.id,
                manual_definition(vec![
                    action_of(ActionType::UpdateContact), // nothing registered
                    action_of(ActionType::CreateTask),
                ]),
            )
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({}), None)
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.outputs.len(), 1);
        assert_eq!(task.calls(), 1);
    }

    #[tokio::test]
    async fn later_actions_see_prior_outputs() {
        let executors = Arc::new(ExecutorRegistry::new("executor"));
        let first = CountingExecutor::new("SEND_MESSAGE", json!({ "ticket": 42 }));
        executors.register("SEND_MESSAGE", first);
        executors.register(
            "CREATE_TASK",
            Arc::new(EchoAccumulatedExecutor {
                action_type: "CREATE_TASK",
            }),
        );

        let (engine, tenant) = test_engine(executors).await;
        let automation = engine
            .create_automation(
                &tenant.id,
                manual_definition(vec![
                    action_of(ActionType::SendMessage),
                    action_of(ActionType::CreateTask),
                ]),
            )
            .await
            .unwrap();

        let record = engine
            .run_automation(&automation.id, json!({ "lead": "ada" }), None)
            .await
            .unwrap();
        let first_id = &automation.actions[0].id;
        let second_id = &automation.actions[1].id;
        let echoed = &record.outputs[second_id];
        // The second action saw the run context plus the first output.
        assert_eq!(echoed["lead"], "ada");
        assert_eq!(echoed[first_id]["ticket"], 42);
    }

    #[tokio::test]
    async fn history_is_bounded_and_most_recent_first() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let automation = engine
            .create_automation(&tenant.id, manual_definition(Vec::new()))
            .await
            .unwrap();

        for _ in 0..5 {
            engine
                .run_automation(&automation.id, json!({}), None)
                .await
                .unwrap();
        }

        let history = engine.get_execution_history(&automation.id, Some(3)).await;
        assert_eq!(history.len(), 3);
        // Every returned record is terminal and the newest comes first.
        assert!(history.iter().all(|r| r.status == ExecutionStatus::Success));
        let full = engine.get_execution_history(&automation.id, None).await;
        assert_eq!(full.len(), 5);
        assert_eq!(full[0].id, history[0].id);
    }

    #[tokio::test]
    async fn update_replaces_actions_wholesale() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let automation = engine
            .create_automation(
                &tenant.id,
                manual_definition(vec![
                    action_of(ActionType::SendMessage),
                    action_of(ActionType::SendEmail),
                ]),
            )
            .await
            .unwrap();
        let old_ids: Vec<String> = automation.actions.iter().map(|a| a.id.clone()).collect();

        let updated = engine
            .update_automation(
                &automation.id,
                AutomationUpdate {
                    actions: Some(vec![
                        action_of(ActionType::CreateTask),
                        action_of(ActionType::SendNotification),
                        action_of(ActionType::CallWebhook),
                    ]),
                    ..AutomationUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.actions.len(), 3);
        let orders: Vec<u32> = updated.actions.iter().map(|a| a.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        for action in &updated.actions {
            assert!(!old_ids.contains(&action.id));
        }
    }

    #[tokio::test]
    async fn invalid_schedule_expression_is_rejected_at_create() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let mut definition = manual_definition(Vec::new());
        definition.trigger = TriggerKind::Schedule;
        definition
            .trigger_config
            .insert("schedule".to_string(), json!("*/5 * * * *"));

        let err = engine
            .create_automation(&tenant.id, definition)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchedule { .. }));
        // Nothing was stored.
        assert!(engine.list_by_tenant(&tenant.id).is_empty());
    }

    #[tokio::test]
    async fn toggle_gates_execution() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let automation = engine
            .create_automation(&tenant.id, manual_definition(Vec::new()))
            .await
            .unwrap();

        engine.toggle_automation(&automation.id, false).await.unwrap();
        assert!(matches!(
            engine.run_automation(&automation.id, json!({}), None).await,
            Err(EngineError::Disabled { .. })
        ));

        engine.toggle_automation(&automation.id, true).await.unwrap();
        assert!(engine
            .run_automation(&automation.id, json!({}), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn find_by_trigger_fans_out_per_tenant() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let mut webhook = manual_definition(Vec::new());
        webhook.trigger = TriggerKind::Webhook;
        engine.create_automation(&tenant.id, webhook).await.unwrap();
        engine
            .create_automation(&tenant.id, manual_definition(Vec::new()))
            .await
            .unwrap();

        assert_eq!(
            engine.find_by_trigger(&tenant.id, TriggerKind::Webhook).len(),
            1
        );
        assert_eq!(
            engine.find_by_trigger(&tenant.id, TriggerKind::Manual).len(),
            1
        );
        assert!(engine
            .find_by_trigger("other-tenant", TriggerKind::Webhook)
            .is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_history_queryable() {
        let (engine, tenant) = test_engine(Arc::new(ExecutorRegistry::new("executor"))).await;
        let automation = engine
            .create_automation(&tenant.id, manual_definition(Vec::new()))
            .await
            .unwrap();
        engine
            .run_automation(&automation.id, json!({}), None)
            .await
            .unwrap();

        engine.delete_automation(&automation.id).await.unwrap();
        assert!(engine.get_automation(&automation.id).is_err());
        assert_eq!(
            engine.get_execution_history(&automation.id, None).await.len(),
            1
        );
    }
}
