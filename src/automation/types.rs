/// Core automation type definitions
///
/// Defines the fundamental structures for automations, conditions, ordered
/// actions and execution records. Definitions are serialized as JSON for
/// persistence; the engine compiles nothing, the structures are executed
/// as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque JSON object used for trigger/action configuration and for the
/// accumulated context handed to executors.
pub type JsonMap = serde_json::Map<String, Value>;

/// The event class that may cause an automation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    Schedule,
    Event,
    Webhook,
    Manual,
    ConditionMet,
    DataChange,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Schedule => "SCHEDULE",
            TriggerKind::Event => "EVENT",
            TriggerKind::Webhook => "WEBHOOK",
            TriggerKind::Manual => "MANUAL",
            TriggerKind::ConditionMet => "CONDITION_MET",
            TriggerKind::DataChange => "DATA_CHANGE",
        }
    }
}

/// Comparison operator applied to a resolved context field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

/// How a condition combines with the NEXT condition in the sequence.
/// `AND` is the default when unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicConnector {
    And,
    Or,
}

/// A boolean test against a runtime context field.
///
/// `field` is a dot-separated path resolved against the run context
/// (e.g. "deal.stage").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison value; ignored by exists/not_exists
    #[serde(default)]
    pub value: Value,
    /// Connector to the next condition in sequence, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<LogicConnector>,
}

/// Action types the engine can dispatch. Each type is looked up in the
/// executor registry at run time; types without a registered executor are
/// skipped, not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    SendMessage,
    SendEmail,
    CreateTask,
    UpdateField,
    CallWebhook,
    RunAgent,
    SendNotification,
    ScheduleFollowup,
    UpdateContact,
    CreateDeal,
    Custom,
}

impl ActionType {
    /// Registry key for executor lookup.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SendMessage => "SEND_MESSAGE",
            ActionType::SendEmail => "SEND_EMAIL",
            ActionType::CreateTask => "CREATE_TASK",
            ActionType::UpdateField => "UPDATE_FIELD",
            ActionType::CallWebhook => "CALL_WEBHOOK",
            ActionType::RunAgent => "RUN_AGENT",
            ActionType::SendNotification => "SEND_NOTIFICATION",
            ActionType::ScheduleFollowup => "SCHEDULE_FOLLOWUP",
            ActionType::UpdateContact => "UPDATE_CONTACT",
            ActionType::CreateDeal => "CREATE_DEAL",
            ActionType::Custom => "CUSTOM",
        }
    }
}

/// One step of an automation. Actions execute strictly in ascending
/// `order`; identifiers are generated by the engine, never supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub action_type: ActionType,
    /// Executor-specific configuration, opaque to the engine
    #[serde(default)]
    pub config: JsonMap,
    pub order: u32,
}

/// A named rule: trigger + conditions + ordered actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    /// Unique automation identifier (UUID)
    pub id: String,
    /// Owning tenant identifier
    pub tenant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: TriggerKind,
    /// Opaque key/value map interpreted per trigger kind
    /// (e.g. { "schedule": "hourly" })
    #[serde(default)]
    pub trigger_config: JsonMap,
    /// Evaluated left-to-right; an empty list is always satisfied
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    pub enabled: bool,
    /// Monotonically increasing count of successful runs
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    /// Schedule expression carried in the trigger config, if any.
    pub fn schedule_expression(&self) -> Option<&str> {
        self.trigger_config.get("schedule").and_then(|v| v.as_str())
    }
}

/// An action as supplied by callers: the engine generates the identifier
/// and order index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub action_type: ActionType,
    #[serde(default)]
    pub config: JsonMap,
}

/// Caller-supplied automation definition for create operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger: TriggerKind,
    #[serde(default)]
    pub trigger_config: JsonMap,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Partial update. Replacing `actions` is wholesale: every action gets a
/// freshly generated identifier and order index, there is no partial patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger: Option<TriggerKind>,
    pub trigger_config: Option<JsonMap>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<ActionDefinition>>,
    pub enabled: Option<bool>,
}

/// Lifecycle of one execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    /// Conditions evaluated false: a normal skip, not an error
    Cancelled,
}

/// Append-only log entry for one run of one automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub automation_id: String,
    /// Acting user, when the run was requested by one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    pub status: ExecutionStatus,
    /// Snapshot of the run context the conditions were evaluated against
    pub context: Value,
    /// Per-action outputs, keyed by action identifier
    #[serde(default)]
    pub outputs: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock milliseconds from record creation to terminal status
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}
