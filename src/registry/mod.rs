/// Generic component registry with hot-swap semantics
///
/// A typed store mapping a string identifier to a live component instance.
/// The same registry type backs tools, agents, integration providers,
/// knowledge sources and action executors. Uses ArcSwap so lookups on the
/// hot execution path are lock-free; mutations clone the snapshot and swap
/// the pointer atomically, which keeps the map and anything derived from it
/// consistent for concurrent readers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::Value;

/// Uniform lifecycle for every pluggable unit managed by a registry.
///
/// Components are constructed by the loader catalog, initialized once at
/// boot, invoked through [`ComponentRegistry::invoke`], optionally wired
/// with cross-registry references, and shut down during teardown.
#[async_trait]
pub trait Component: Send + Sync {
    /// Identifier this component registers under.
    fn name(&self) -> &str;

    /// Tool identifiers this component requires to be registered before the
    /// system may start. Validated at boot; an unresolved dependency aborts
    /// the whole boot sequence.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time setup (connect, warm caches). An error here means the
    /// component is skipped, not that boot fails.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Execution entry point for uniform `invoke(id, input)` dispatch.
    async fn invoke(&self, input: Value) -> Result<Value>;

    /// Setter hook for cross-registry references, called after every
    /// registry is populated and validated.
    fn wire(&self, _registries: &RegistryWiring) {}

    /// Release resources. Teardown failures are logged by the caller and
    /// never abort the rest of teardown.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A registry of live `dyn Component` instances.
pub type SharedRegistry = Arc<ComponentRegistry<dyn Component>>;

/// Cross-registry references handed to components that expose setter hooks.
#[derive(Clone)]
pub struct RegistryWiring {
    pub tools: SharedRegistry,
    pub knowledge: SharedRegistry,
    pub integrations: SharedRegistry,
}

/// Lock-free identifier -> instance store
///
/// `T` is usually a trait object (`dyn Component`, `dyn ActionExecutor`).
/// Reads clone an `Arc`, so handing an instance to an execution does not
/// block registration happening concurrently.
pub struct ComponentRegistry<T: ?Sized> {
    /// Label used in log lines and lookup-miss errors ("tool", "agent", ...)
    label: &'static str,
    /// Atomic snapshot of the identifier -> instance map
    entries: ArcSwap<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> ComponentRegistry<T> {
    /// Create an empty registry with a display label.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Register an instance under an explicit identifier. Replaces any
    /// previous instance with the same identifier.
    pub fn register(&self, id: impl Into<String>, component: Arc<T>) {
        let id = id.into();
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id.clone(), Arc::clone(&component));
            next
        });
        tracing::debug!("registered {}: {}", self.label, id);
    }

    /// Remove an instance. Returns whether it was present.
    pub fn unregister(&self, id: &str) -> bool {
        if !self.entries.load().contains_key(id) {
            return false;
        }
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(id);
            next
        });
        tracing::debug!("unregistered {}: {}", self.label, id);
        true
    }

    /// Lock-free lookup.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries.load().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.load().contains_key(id)
    }

    /// All registered identifiers.
    pub fn ids(&self) -> Vec<String> {
        self.entries.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Drop every registration (teardown).
    pub fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }
}

impl ComponentRegistry<dyn Component> {
    /// Register a component under its own declared name.
    pub fn register_component(&self, component: Arc<dyn Component>) {
        self.register(component.name().to_string(), component);
    }

    /// Uniform dispatch: look the component up and call its execution entry
    /// point. An unknown identifier is an error, not a silent no-op.
    pub async fn invoke(&self, id: &str, input: Value) -> Result<Value> {
        let Some(component) = self.get(id) else {
            anyhow::bail!("no {} registered under '{}'", self.label, id);
        };
        component.invoke(input).await
    }
}
