//! Tool registry for managing available tools.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::tools::tool::{Tool, ToolDefinition};

/// Registry of available tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. A later registration under the same name wins.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Overriding existing tool registration");
        }
        tracing::debug!("Registered tool: {}", name);
    }

    /// Register a tool (sync version for startup).
    pub fn register_sync(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if let Ok(mut tools) = self.tools.try_write() {
            if tools.insert(name.clone(), tool).is_some() {
                tracing::warn!(tool = %name, "Overriding existing tool registration");
            }
            tracing::debug!("Registered tool: {}", name);
        }
    }

    /// Unregister a tool.
    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.write().await.remove(name)
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Check if a tool exists.
    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// List all tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }

    /// Get all tools, sorted by name.
    pub async fn all(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.read().await.values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Whether every named tool is registered and currently available.
    pub async fn all_available(&self, names: &[&str]) -> bool {
        let tools = self.tools.read().await;
        names
            .iter()
            .all(|name| tools.get(*name).is_some_and(|t| t.is_available()))
    }

    /// Get tool definitions, sorted by name.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.all()
            .await
            .iter()
            .map(|tool| ToolDefinition::of(tool.as_ref()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentContext;
    use crate::content::ContentBuffer;
    use crate::tools::tool::{ParamType, ToolArgs, ToolError, ToolParam};
    use async_trait::async_trait;

    struct MockTool {
        name: String,
        available: bool,
    }

    impl MockTool {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                available: true,
            })
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A mock tool for testing"
        }
        fn params(&self) -> Vec<ToolParam> {
            vec![ToolParam::required("input", ParamType::String, "Anything")]
        }
        fn is_available(&self) -> bool {
            self.available
        }
        async fn execute(
            &self,
            _ctx: &mut AgentContext,
            _output: &ContentBuffer,
            _args: ToolArgs,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("test_tool")).await;
        assert!(registry.has("test_tool").await);
        assert!(!registry.has("nonexistent").await);

        let retrieved = registry.get("test_tool").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "test_tool");
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let registry = ToolRegistry::new();
        registry.register_sync(MockTool::new("b"));
        registry.register_sync(MockTool::new("a"));

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.list().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_override_keeps_one_entry() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("dup")).await;
        registry.register(MockTool::new("dup")).await;
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_tool_definitions() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("my_tool")).await;

        let defs = registry.tool_definitions().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "my_tool");
        assert_eq!(defs[0].icon, "handyman");
        assert_eq!(defs[0].parameters["required"][0], "input");
        assert_eq!(defs[0].parameters["properties"]["input"]["type"], "string");
    }

    #[tokio::test]
    async fn test_all_available() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("up")).await;
        registry
            .register(Arc::new(MockTool {
                name: "down".to_string(),
                available: false,
            }))
            .await;

        assert!(registry.all_available(&["up"]).await);
        assert!(!registry.all_available(&["up", "down"]).await);
        assert!(!registry.all_available(&["missing"]).await);
        assert!(registry.all_available(&[]).await);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = ToolRegistry::new();
        registry.register(MockTool::new("temp")).await;

        assert!(registry.has("temp").await);
        registry.unregister("temp").await;
        assert!(!registry.has("temp").await);
    }
}
