/// Runtime Execution Layer
///
/// This module provides the pluggable action executors and the background
/// schedule service. It handles:
/// - The ActionExecutor contract and built-in stand-ins
/// - Outbound webhook delivery and agent/tool dispatch executors
/// - Recurring timers for SCHEDULE-triggered automations

// Action executor contract, registry alias and built-in executors
pub mod executor;

// Background schedule service for SCHEDULE triggers
pub mod scheduler;

// Re-export main types
pub use executor::{
    builtin_executor_registry, register_builtin_executors, ActionExecutor, ExecutorRegistry,
    StandInExecutor, WebhookExecutor,
};
pub use scheduler::{schedule_to_cron, ScheduleService};
