/// Compiled-in component catalog
///
/// The explicit registration table: identifier -> factory function, built
/// at startup from configuration. This replaces any notion of scanning a
/// directory of implementations; adding a component means adding a factory
/// here. The "identifier -> live instance, validated against declared
/// dependencies" contract is preserved by the loader.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::automation::conditions::resolve_field;
use crate::config::Config;
use crate::registry::{Component, ComponentRegistry, RegistryWiring};

/// Factory signature: configuration in, live (uninitialized) component out.
pub type ComponentFactory = fn(&Config) -> Arc<dyn Component>;

fn http_request_tool(_config: &Config) -> Arc<dyn Component> {
    Arc::new(HttpRequestTool::new())
}

fn field_extract_tool(_config: &Config) -> Arc<dyn Component> {
    Arc::new(FieldExtractTool)
}

fn playbook_knowledge(_config: &Config) -> Arc<dyn Component> {
    Arc::new(PlaybookKnowledge::new())
}

fn crm_integration(config: &Config) -> Arc<dyn Component> {
    Arc::new(CrmIntegration::new(config.crm_endpoint.clone()))
}

fn triage_agent(_config: &Config) -> Arc<dyn Component> {
    Arc::new(TriageAgent::new())
}

pub fn tool_catalog() -> HashMap<&'static str, ComponentFactory> {
    HashMap::from([
        ("http_request", http_request_tool as ComponentFactory),
        ("field_extract", field_extract_tool as ComponentFactory),
    ])
}

pub fn knowledge_catalog() -> HashMap<&'static str, ComponentFactory> {
    HashMap::from([("playbook", playbook_knowledge as ComponentFactory)])
}

pub fn integration_catalog() -> HashMap<&'static str, ComponentFactory> {
    HashMap::from([("crm", crm_integration as ComponentFactory)])
}

pub fn agent_catalog() -> HashMap<&'static str, ComponentFactory> {
    HashMap::from([("triage", triage_agent as ComponentFactory)])
}

// ----------------------------------------------------------------------
// Built-in components
// ----------------------------------------------------------------------

/// General-purpose HTTP client tool.
///
/// Input: { "url": "...", "method": "GET", "headers": {...}, "body": ... }
/// Output: { "status": 200, "data": ..., "success": true }
pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let url = input
            .get("url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| anyhow::anyhow!("http_request missing 'url'"))?;
        let method = input
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("GET");

        let mut request_builder = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            other => anyhow::bail!("unsupported HTTP method: {}", other),
        };

        if let Some(headers) = input.get("headers").and_then(|h| h.as_object()) {
            for (key, value) in headers {
                if let Some(header_value) = value.as_str() {
                    request_builder = request_builder.header(key, header_value);
                }
            }
        }
        if let Some(body) = input.get("body") {
            request_builder = request_builder.json(body);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("http_request failed: {}", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read response body: {}", e))?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "status": status.as_u16(),
            "data": data,
            "success": status.is_success(),
        }))
    }
}

/// Dot-path extraction over a JSON document.
///
/// Accepts both the direct shape { "path": "a.b", "data": {...} } and the
/// CUSTOM-action envelope { "config": { "path": ... }, "context": {...} }.
pub struct FieldExtractTool;

#[async_trait]
impl Component for FieldExtractTool {
    fn name(&self) -> &str {
        "field_extract"
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let path = input
            .get("path")
            .or_else(|| input.pointer("/config/path"))
            .and_then(|p| p.as_str())
            .ok_or_else(|| anyhow::anyhow!("field_extract missing 'path'"))?;
        let data = input
            .get("data")
            .or_else(|| input.get("context"))
            .unwrap_or(&Value::Null);

        let value = resolve_field(data, path).cloned().unwrap_or(Value::Null);
        Ok(json!({ "path": path, "value": value }))
    }
}

/// In-memory knowledge source with put/get/search operations.
pub struct PlaybookKnowledge {
    entries: RwLock<HashMap<String, String>>,
}

impl PlaybookKnowledge {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for PlaybookKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for PlaybookKnowledge {
    fn name(&self) -> &str {
        "playbook"
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let op = input.get("op").and_then(|o| o.as_str()).unwrap_or("get");
        match op {
            "put" => {
                let key = input
                    .get("key")
                    .and_then(|k| k.as_str())
                    .ok_or_else(|| anyhow::anyhow!("playbook put missing 'key'"))?;
                let value = input
                    .get("value")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow::anyhow!("playbook put missing 'value'"))?;
                self.entries
                    .write()
                    .await
                    .insert(key.to_string(), value.to_string());
                Ok(json!({ "stored": key }))
            }
            "get" => {
                let key = input
                    .get("key")
                    .and_then(|k| k.as_str())
                    .ok_or_else(|| anyhow::anyhow!("playbook get missing 'key'"))?;
                let entries = self.entries.read().await;
                Ok(json!({ "key": key, "value": entries.get(key) }))
            }
            "search" => {
                let query = input
                    .get("query")
                    .and_then(|q| q.as_str())
                    .unwrap_or_default()
                    .to_lowercase();
                let entries = self.entries.read().await;
                let matches: Vec<Value> = entries
                    .iter()
                    .filter(|(key, value)| {
                        key.to_lowercase().contains(&query)
                            || value.to_lowercase().contains(&query)
                    })
                    .map(|(key, value)| json!({ "key": key, "value": value }))
                    .collect();
                Ok(json!({ "matches": matches }))
            }
            other => anyhow::bail!("playbook: unknown op '{}'", other),
        }
    }
}

/// CRM integration provider. Connection is validated at initialize time;
/// a missing endpoint makes the provider absent from its registry (boot
/// logs and skips it, never fails).
pub struct CrmIntegration {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl CrmIntegration {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Component for CrmIntegration {
    fn name(&self) -> &str {
        "crm"
    }

    async fn initialize(&self) -> Result<()> {
        if self.endpoint.is_none() {
            anyhow::bail!("crm endpoint not configured");
        }
        Ok(())
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("crm endpoint not configured"))?;

        let response = self
            .client
            .post(endpoint)
            .json(&input)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("crm request failed: {}", e))?;
        let status = response.status();

        Ok(json!({ "status": status.as_u16(), "success": status.is_success() }))
    }
}

/// Agent that classifies an incoming context by its priority field.
/// Depends on the field_extract tool, which it reaches through the wired
/// tool registry.
pub struct TriageAgent {
    tools: ArcSwapOption<ComponentRegistry<dyn Component>>,
}

impl TriageAgent {
    pub fn new() -> Self {
        Self {
            tools: ArcSwapOption::from(None),
        }
    }
}

impl Default for TriageAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for TriageAgent {
    fn name(&self) -> &str {
        "triage"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["field_extract".to_string()]
    }

    fn wire(&self, registries: &RegistryWiring) {
        self.tools.store(Some(Arc::clone(&registries.tools)));
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        let tools = self
            .tools
            .load_full()
            .ok_or_else(|| anyhow::anyhow!("triage agent: tool registry not wired"))?;

        let extraction = tools
            .invoke("field_extract", json!({ "path": "priority", "data": input }))
            .await?;
        let priority = extraction["value"].as_f64().unwrap_or(0.0);
        let decision = if priority >= 3.0 { "escalate" } else { "routine" };

        tracing::debug!("🧭 triage decision: {} (priority: {})", decision, priority);
        Ok(json!({ "decision": decision, "priority": priority }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_expose_the_expected_identifiers() {
        assert!(tool_catalog().contains_key("http_request"));
        assert!(tool_catalog().contains_key("field_extract"));
        assert!(knowledge_catalog().contains_key("playbook"));
        assert!(integration_catalog().contains_key("crm"));
        assert!(agent_catalog().contains_key("triage"));
    }

    #[tokio::test]
    async fn field_extract_handles_both_input_shapes() {
        let tool = FieldExtractTool;
        let direct = tool
            .invoke(json!({ "path": "a.b", "data": { "a": { "b": 7 } } }))
            .await
            .unwrap();
        assert_eq!(direct["value"], 7);

        let enveloped = tool
            .invoke(json!({ "config": { "path": "a" }, "context": { "a": "x" } }))
            .await
            .unwrap();
        assert_eq!(enveloped["value"], "x");

        let miss = tool
            .invoke(json!({ "path": "nope", "data": {} }))
            .await
            .unwrap();
        assert_eq!(miss["value"], Value::Null);
    }

    #[tokio::test]
    async fn playbook_put_get_search() {
        let playbook = PlaybookKnowledge::new();
        playbook
            .invoke(json!({ "op": "put", "key": "escalation", "value": "page the on-call" }))
            .await
            .unwrap();

        let fetched = playbook
            .invoke(json!({ "op": "get", "key": "escalation" }))
            .await
            .unwrap();
        assert_eq!(fetched["value"], "page the on-call");

        let found = playbook
            .invoke(json!({ "op": "search", "query": "on-call" }))
            .await
            .unwrap();
        assert_eq!(found["matches"].as_array().unwrap().len(), 1);

        assert!(playbook.invoke(json!({ "op": "drop" })).await.is_err());
    }

    #[tokio::test]
    async fn crm_without_endpoint_fails_initialize() {
        let crm = CrmIntegration::new(None);
        assert!(crm.initialize().await.is_err());

        let configured = CrmIntegration::new(Some("http://127.0.0.1:9".to_string()));
        assert!(configured.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn triage_agent_needs_wiring_then_decides() {
        let agent = TriageAgent::new();
        // Unwired agents refuse to run rather than panic.
        assert!(agent.invoke(json!({ "priority": 5 })).await.is_err());

        let tools: Arc<ComponentRegistry<dyn Component>> = Arc::new(ComponentRegistry::new("tool"));
        tools.register_component(Arc::new(FieldExtractTool));
        let wiring = RegistryWiring {
            tools: Arc::clone(&tools),
            knowledge: Arc::new(ComponentRegistry::new("knowledge")),
            integrations: Arc::new(ComponentRegistry::new("integration")),
        };
        agent.wire(&wiring);

        let escalated = agent.invoke(json!({ "priority": 5 })).await.unwrap();
        assert_eq!(escalated["decision"], "escalate");

        let routine = agent.invoke(json!({ "priority": 1 })).await.unwrap();
        assert_eq!(routine["decision"], "routine");

        // Missing priority defaults to routine.
        let absent = agent.invoke(json!({})).await.unwrap();
        assert_eq!(absent["decision"], "routine");
    }
}
