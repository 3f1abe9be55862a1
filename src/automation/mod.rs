/// Automation Management Layer
///
/// This module owns automation definitions, persistence and execution.
/// It provides:
/// - Type definitions (Automation, Condition, Action, ExecutionRecord)
/// - SQLite persistence with sqlx
/// - Lock-free hot-reload registry using ArcSwap
/// - The execution engine with condition evaluation and history

// Core automation type definitions
pub mod types;

// Condition evaluation against the runtime context
pub mod conditions;

// SQLite persistence layer for automation definitions
pub mod storage;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// The execution engine itself
pub mod engine;

// Re-export commonly used types
pub use engine::{AutomationEngine, DEFAULT_HISTORY_LIMIT};
pub use registry::AutomationRegistry;
pub use storage::AutomationStore;
pub use types::{
    Action, ActionDefinition, ActionType, Automation, AutomationDefinition, AutomationUpdate,
    Condition, ConditionOperator, ExecutionRecord, ExecutionStatus, JsonMap, LogicConnector,
    TriggerKind,
};
