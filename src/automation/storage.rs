/// SQLite persistence layer for automation definitions
///
/// Automations are stored as a JSON definition column for flexibility while
/// tenant and trigger lookup fields stay indexed. Execution history is
/// deliberately NOT persisted here: records are process-local.

use std::collections::HashMap;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

use crate::automation::types::Automation;
use crate::error::EngineError;

/// SQLite-backed automation store
///
/// The in-memory registry loads everything from here at boot and writes
/// through on every mutation, so the store is the restart-survivable copy.
#[derive(Debug, Clone)]
pub struct AutomationStore {
    pool: SqlitePool,
}

impl AutomationStore {
    /// Wrap an existing connection pool (tests use an in-memory pool).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file at the given path.
    pub async fn connect(path: &Path) -> Result<Self, EngineError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Initialize the automation schema. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS automations (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                trigger_kind TEXT NOT NULL,
                definition JSON NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_automations_tenant
            ON automations(tenant_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a new automation or update an existing one (UPSERT).
    pub async fn save(&self, automation: &Automation) -> Result<(), EngineError> {
        let definition_json = serde_json::to_string(automation)?;

        sqlx::query(
            r#"
            INSERT INTO automations (id, tenant_id, name, trigger_kind, definition, updated_at)
            VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                trigger_kind = excluded.trigger_kind,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&automation.id)
        .bind(&automation.tenant_id)
        .bind(&automation.name)
        .bind(automation.trigger.as_str())
        .bind(&definition_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve an automation by identifier.
    pub async fn get(&self, id: &str) -> Result<Option<Automation>, EngineError> {
        let row = sqlx::query("SELECT definition FROM automations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let definition_json: String = row.get("definition");
                let automation: Automation = serde_json::from_str(&definition_json)?;
                Ok(Some(automation))
            }
            None => Ok(None),
        }
    }

    /// Load every automation for registry initialization.
    pub async fn load_all(&self) -> Result<HashMap<String, Automation>, EngineError> {
        let rows = sqlx::query("SELECT id, definition FROM automations")
            .fetch_all(&self.pool)
            .await?;

        let mut automations = HashMap::new();
        for row in rows {
            let id: String = row.get("id");
            let definition_json: String = row.get("definition");
            let automation: Automation = serde_json::from_str(&definition_json)?;
            automations.insert(id, automation);
        }

        Ok(automations)
    }

    /// Delete an automation. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM automations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::types::{Action, ActionType, JsonMap, TriggerKind};
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> AutomationStore {
        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = AutomationStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn sample_automation(id: &str) -> Automation {
        let now = Utc::now();
        Automation {
            id: id.to_string(),
            tenant_id: "tenant-1".to_string(),
            name: "welcome".to_string(),
            description: None,
            trigger: TriggerKind::Manual,
            trigger_config: JsonMap::new(),
            conditions: Vec::new(),
            actions: vec![Action {
                id: "a1".to_string(),
                action_type: ActionType::SendMessage,
                config: JsonMap::new(),
                order: 0,
            }],
            enabled: true,
            execution_count: 0,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_get_roundtrip() {
        let store = memory_store().await;
        let automation = sample_automation("auto-1");
        store.save(&automation).await.unwrap();

        let loaded = store.get("auto-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "welcome");
        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(loaded.trigger, TriggerKind::Manual);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_the_definition() {
        let store = memory_store().await;
        let mut automation = sample_automation("auto-1");
        store.save(&automation).await.unwrap();

        automation.name = "renamed".to_string();
        automation.execution_count = 7;
        store.save(&automation).await.unwrap();

        let loaded = store.get("auto-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.execution_count, 7);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn load_all_and_delete() {
        let store = memory_store().await;
        store.save(&sample_automation("a")).await.unwrap();
        store.save(&sample_automation("b")).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("a"));

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
