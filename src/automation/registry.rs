/// Hot-reload automation registry using ArcSwap
///
/// Lock-free, atomic reads for the execution and scheduling hot path.
/// The primary map and the by-tenant index live in one snapshot that is
/// swapped as a whole, so the two can never disagree. Every mutation writes
/// through to the SQLite store first, then swaps the snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::automation::storage::AutomationStore;
use crate::automation::types::{Automation, TriggerKind};
use crate::error::EngineError;

/// One immutable snapshot of the registry.
#[derive(Clone, Default)]
struct AutomationIndex {
    by_id: HashMap<String, Automation>,
    /// tenant id -> automation ids (derived from by_id, swapped together)
    by_tenant: HashMap<String, Vec<String>>,
}

impl AutomationIndex {
    fn insert(&mut self, automation: Automation) {
        let ids = self
            .by_tenant
            .entry(automation.tenant_id.clone())
            .or_default();
        if !ids.contains(&automation.id) {
            ids.push(automation.id.clone());
        }
        self.by_id.insert(automation.id.clone(), automation);
    }

    fn remove(&mut self, id: &str) {
        if let Some(automation) = self.by_id.remove(id) {
            if let Some(ids) = self.by_tenant.get_mut(&automation.tenant_id) {
                ids.retain(|existing| existing != id);
            }
        }
    }
}

/// In-memory source of truth for active automations.
pub struct AutomationRegistry {
    index: ArcSwap<AutomationIndex>,
    store: AutomationStore,
}

impl AutomationRegistry {
    pub fn new(store: AutomationStore) -> Self {
        Self {
            index: ArcSwap::from_pointee(AutomationIndex::default()),
            store,
        }
    }

    /// Populate the registry from the store. Called once during boot.
    pub async fn init_from_store(&self) -> Result<(), EngineError> {
        let stored = self.store.load_all().await?;
        let mut index = AutomationIndex::default();
        for automation in stored.into_values() {
            index.insert(automation);
        }
        self.index.store(Arc::new(index));

        tracing::info!(
            "📥 automation registry initialized with {} automations",
            self.len()
        );
        Ok(())
    }

    /// Persist and hot-swap a new or updated automation.
    pub async fn upsert(&self, automation: Automation) -> Result<(), EngineError> {
        self.store.save(&automation).await?;
        self.index.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(automation.clone());
            next
        });
        Ok(())
    }

    /// Delete from the store and the snapshot. Returns whether the
    /// automation existed.
    pub async fn remove(&self, id: &str) -> Result<bool, EngineError> {
        let removed = self.store.delete(id).await?;
        self.index.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(id);
            next
        });
        if removed {
            tracing::info!("🗑️ automation removed: {}", id);
        }
        Ok(removed)
    }

    /// Lock-free lookup by identifier.
    pub fn get(&self, id: &str) -> Option<Automation> {
        self.index.load().by_id.get(id).cloned()
    }

    /// All automations owned by a tenant.
    pub fn list_by_tenant(&self, tenant_id: &str) -> Vec<Automation> {
        let index = self.index.load();
        index
            .by_tenant
            .get(tenant_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| index.by_id.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tenant automations with a given trigger kind, used by event and
    /// webhook dispatchers for fan-out.
    pub fn find_by_trigger(&self, tenant_id: &str, trigger: TriggerKind) -> Vec<Automation> {
        self.list_by_tenant(tenant_id)
            .into_iter()
            .filter(|automation| automation.trigger == trigger)
            .collect()
    }

    /// Every registered automation (boot validation, scheduler arming).
    pub fn all(&self) -> Vec<Automation> {
        self.index.load().by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.load().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.load().by_id.is_empty()
    }
}
