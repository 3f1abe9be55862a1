/// Background schedule service for SCHEDULE-triggered automations
///
/// Manages recurring timers with tokio-cron-scheduler. Each enabled
/// SCHEDULE automation gets exactly one armed job, tracked in a uuid map so
/// re-arming always removes the old job first (no stale closures over old
/// trigger configuration, no duplicated timers). Job closures hold only a
/// Weak engine reference and re-check the automation before every firing,
/// so deleted or disabled automations gracefully skip execution.

use std::collections::HashMap;
use std::sync::Weak;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::automation::engine::AutomationEngine;
use crate::automation::types::Automation;
use crate::error::EngineError;

/// Fixed schedule-expression table. Exact cron parsing is out of scope:
/// callers pick one of these keywords and the engine rejects everything
/// else at create/update time.
pub fn schedule_to_cron(expression: &str) -> Option<&'static str> {
    match expression {
        "every_minute" => Some("0 * * * * *"),
        "hourly" | "every_hour" => Some("0 0 * * * *"),
        "daily" | "every_day" => Some("0 0 0 * * *"),
        "weekly" | "every_week" => Some("0 0 0 * * Sun"),
        _ => None,
    }
}

/// Context payload handed to runs fired by a timer.
pub fn schedule_trigger_context(automation_id: &str) -> Value {
    json!({
        "trigger": "schedule",
        "automation_id": automation_id,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

/// Hot-reload schedule service: one job per automation, swap on re-arm.
pub struct ScheduleService {
    scheduler: RwLock<JobScheduler>,
    /// automation id -> armed job uuid, for proper removal on re-arm
    jobs: RwLock<HashMap<String, Uuid>>,
    /// Weak back-edge: the engine owns the service, not the other way round
    engine: Weak<AutomationEngine>,
}

impl ScheduleService {
    pub async fn new(engine: Weak<AutomationEngine>) -> Result<Self, EngineError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| EngineError::Scheduler(e.to_string()))?;
        Ok(Self {
            scheduler: RwLock::new(scheduler),
            jobs: RwLock::new(HashMap::new()),
            engine,
        })
    }

    /// Start the underlying scheduler loop.
    pub async fn start(&self) -> Result<(), EngineError> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| EngineError::Scheduler(e.to_string()))?;
        tracing::info!("⏰ schedule service started");
        Ok(())
    }

    /// Stop the scheduler and forget every armed job.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.jobs.write().await.clear();
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| EngineError::Scheduler(e.to_string()))?;
        tracing::info!("⏹️ schedule service stopped");
        Ok(())
    }

    /// Arm (or re-arm) the recurring timer for one automation. Always
    /// removes the previous job first so at most one timer is armed per
    /// automation at any time.
    pub async fn arm(&self, automation: &Automation) -> Result<(), EngineError> {
        let expression = automation.schedule_expression().unwrap_or_default();
        let cron = schedule_to_cron(expression).ok_or_else(|| EngineError::InvalidSchedule {
            expression: expression.to_string(),
        })?;

        // Remove any previously armed job before adding the replacement.
        self.disarm(&automation.id).await;

        let automation_id = automation.id.clone();
        let engine = self.engine.clone();
        let job = Job::new_async(cron, move |_uuid, _lock| {
            let automation_id = automation_id.clone();
            let engine = engine.clone();
            Box::pin(async move {
                let Some(engine) = engine.upgrade() else {
                    tracing::debug!("⏭️ engine gone, skipping scheduled run: {}", automation_id);
                    return;
                };
                tracing::debug!("🔔 schedule fired: {}", automation_id);
                let context = schedule_trigger_context(&automation_id);
                match engine.run_automation(&automation_id, context, None).await {
                    Ok(record) => tracing::info!(
                        "⏰ scheduled run finished: {} ({:?})",
                        automation_id,
                        record.status
                    ),
                    // Deleted or disabled since arming: a graceful skip.
                    Err(error) => tracing::debug!(
                        "⏭️ scheduled run skipped: {} ({})",
                        automation_id,
                        error
                    ),
                }
            })
        })
        .map_err(|e| EngineError::Scheduler(e.to_string()))?;

        let job_uuid = {
            let scheduler = self.scheduler.write().await;
            scheduler
                .add(job)
                .await
                .map_err(|e| EngineError::Scheduler(e.to_string()))?
        };
        self.jobs
            .write()
            .await
            .insert(automation.id.clone(), job_uuid);

        tracing::info!(
            "⏰ armed timer: {} ({} -> {})",
            automation.id,
            expression,
            cron
        );
        Ok(())
    }

    /// Tear down the timer for an automation, if one is armed.
    pub async fn disarm(&self, automation_id: &str) {
        let removed = self.jobs.write().await.remove(automation_id);
        if let Some(job_uuid) = removed {
            let scheduler = self.scheduler.read().await;
            if let Err(error) = scheduler.remove(&job_uuid).await {
                tracing::warn!(
                    "⚠️ failed to remove job for {}: {}",
                    automation_id,
                    error
                );
            } else {
                tracing::debug!("🛑 disarmed timer: {}", automation_id);
            }
        }
    }

    /// Number of currently armed timers.
    pub async fn armed_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether a timer is armed for the automation.
    pub async fn is_armed(&self, automation_id: &str) -> bool {
        self.jobs.read().await.contains_key(automation_id)
    }
}
