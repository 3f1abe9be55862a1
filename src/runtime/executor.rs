/// Action executors: the pluggable handlers behind every action type
///
/// Each executor registers under one action type and receives the action's
/// configuration plus the accumulated output of prior actions in the same
/// run. Built-in executors ship as no-op/logging stand-ins so the engine is
/// independently testable; real integrations register replacement executors
/// by type at boot through the same registry.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::automation::types::JsonMap;
use crate::registry::{ComponentRegistry, SharedRegistry};

/// Contract for one action type.
///
/// Executors may fail; the engine captures the failure on the execution
/// record and never retries on its own, so implementations must be safe to
/// retry at the caller's discretion. There is no engine-imposed timeout:
/// executors are expected to bound their own I/O.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Action type key this executor registers under (e.g. "SEND_EMAIL").
    fn action_type(&self) -> &'static str;

    async fn execute(&self, config: &JsonMap, accumulated: &JsonMap) -> Result<Value>;
}

/// Registry of executors, keyed by action type.
pub type ExecutorRegistry = ComponentRegistry<dyn ActionExecutor>;

/// Logging stand-in used for action types without a real integration.
/// Records what would have happened and succeeds.
pub struct StandInExecutor {
    action_type: &'static str,
}

impl StandInExecutor {
    pub fn new(action_type: &'static str) -> Self {
        Self { action_type }
    }
}

#[async_trait]
impl ActionExecutor for StandInExecutor {
    fn action_type(&self) -> &'static str {
        self.action_type
    }

    async fn execute(&self, config: &JsonMap, _accumulated: &JsonMap) -> Result<Value> {
        tracing::info!(
            "📨 {} stand-in invoked (config keys: {:?})",
            self.action_type,
            config.keys().collect::<Vec<_>>()
        );
        Ok(json!({
            "handled_by": "stand-in",
            "action_type": self.action_type,
        }))
    }
}

/// Real CALL_WEBHOOK executor: posts the accumulated context to the
/// configured URL. Registered instead of the stand-in when outbound HTTP is
/// enabled.
pub struct WebhookExecutor {
    client: reqwest::Client,
}

impl WebhookExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for WebhookExecutor {
    fn action_type(&self) -> &'static str {
        "CALL_WEBHOOK"
    }

    /// Expected config: { "url": "...", "method": "POST", "headers": {...} }
    async fn execute(&self, config: &JsonMap, accumulated: &JsonMap) -> Result<Value> {
        let url = config
            .get("url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| anyhow::anyhow!("CALL_WEBHOOK missing 'url' parameter"))?;
        let method = config
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("POST");

        tracing::debug!("🌐 webhook request: {} {}", method, url);

        let mut request_builder = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            other => anyhow::bail!("unsupported HTTP method: {}", other),
        };

        if let Some(headers) = config.get("headers").and_then(|h| h.as_object()) {
            for (key, value) in headers {
                if let Some(header_value) = value.as_str() {
                    request_builder = request_builder.header(key, header_value);
                }
            }
        }

        if method.to_uppercase() != "GET" {
            request_builder = request_builder.json(&Value::Object(accumulated.clone()));
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("webhook request failed: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read webhook response: {}", e))?;

        // Parse the response body as JSON when possible, keep it as text
        // otherwise.
        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));

        tracing::info!("✅ webhook delivered: {} {} (status: {})", method, url, status);
        Ok(json!({
            "status": status.as_u16(),
            "data": data,
            "success": status.is_success(),
        }))
    }
}

/// RUN_AGENT executor: dispatches the accumulated context to a registered
/// agent through the component registry.
pub struct RunAgentExecutor {
    agents: SharedRegistry,
}

impl RunAgentExecutor {
    pub fn new(agents: SharedRegistry) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl ActionExecutor for RunAgentExecutor {
    fn action_type(&self) -> &'static str {
        "RUN_AGENT"
    }

    /// Expected config: { "agent": "triage" }
    async fn execute(&self, config: &JsonMap, accumulated: &JsonMap) -> Result<Value> {
        let agent_id = config
            .get("agent")
            .and_then(|a| a.as_str())
            .ok_or_else(|| anyhow::anyhow!("RUN_AGENT missing 'agent' parameter"))?;
        self.agents
            .invoke(agent_id, Value::Object(accumulated.clone()))
            .await
    }
}

/// CUSTOM executor: dispatches to a registered tool by identifier, passing
/// both the action configuration and the accumulated context.
pub struct CustomExecutor {
    tools: SharedRegistry,
}

impl CustomExecutor {
    pub fn new(tools: SharedRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl ActionExecutor for CustomExecutor {
    fn action_type(&self) -> &'static str {
        "CUSTOM"
    }

    /// Expected config: { "tool": "http_request", ... }
    async fn execute(&self, config: &JsonMap, accumulated: &JsonMap) -> Result<Value> {
        let tool_id = config
            .get("tool")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("CUSTOM missing 'tool' parameter"))?;
        let input = json!({
            "config": Value::Object(config.clone()),
            "context": Value::Object(accumulated.clone()),
        });
        self.tools.invoke(tool_id, input).await
    }
}

/// Register the built-in executor set. Stand-ins cover the messaging and
/// task types; CALL_WEBHOOK gets the real HTTP executor when outbound HTTP
/// is enabled; RUN_AGENT and CUSTOM dispatch through the component
/// registries.
pub fn register_builtin_executors(
    registry: &ExecutorRegistry,
    agents: SharedRegistry,
    tools: SharedRegistry,
    outbound_http: bool,
) {
    for action_type in [
        "SEND_MESSAGE",
        "SEND_EMAIL",
        "CREATE_TASK",
        "SEND_NOTIFICATION",
        "SCHEDULE_FOLLOWUP",
    ] {
        registry.register(action_type, Arc::new(StandInExecutor::new(action_type)));
    }

    if outbound_http {
        registry.register("CALL_WEBHOOK", Arc::new(WebhookExecutor::new()));
    } else {
        registry.register("CALL_WEBHOOK", Arc::new(StandInExecutor::new("CALL_WEBHOOK")));
    }

    registry.register("RUN_AGENT", Arc::new(RunAgentExecutor::new(agents)));
    registry.register("CUSTOM", Arc::new(CustomExecutor::new(tools)));

    tracing::info!("⚙️ registered {} built-in executors", registry.len());
}

/// Convenience constructor used by boot: a fresh registry with the
/// built-ins installed.
pub fn builtin_executor_registry(
    agents: SharedRegistry,
    tools: SharedRegistry,
    outbound_http: bool,
) -> Arc<ExecutorRegistry> {
    let registry = Arc::new(ExecutorRegistry::new("executor"));
    register_builtin_executors(&registry, agents, tools, outbound_http);
    registry
}
