use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::ToolDescriptor;
use crate::error::AgentError;

type ToolHandler = Arc<dyn Fn(&serde_json::Value) -> Result<String, AgentError> + Send + Sync>;

struct RegisteredTool {
    description: String,
    handler: ToolHandler,
}

/// Registry of named data-fetch operations.
///
/// Stages are the only callers; the debate controller and the memory
/// subsystem never touch it. Handlers return text (tables serialized to
/// markdown/JSON by the data source) that is fed back to the engine.
#[derive(Default)]
pub struct Toolkit {
    tools: BTreeMap<String, RegisteredTool>,
}

impl Toolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, description: &str, handler: F)
    where
        F: Fn(&serde_json::Value) -> Result<String, AgentError> + Send + Sync + 'static,
    {
        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                description: description.to_string(),
                handler: Arc::new(handler),
            },
        );
    }

    /// Descriptors for every registered tool, in stable name order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description.clone(),
            })
            .collect()
    }

    pub fn call(&self, name: &str, args: &serde_json::Value) -> Result<String, AgentError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::Toolkit(format!("unknown tool: {name}")))?;
        (tool.handler)(args)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolkit() -> Toolkit {
        let mut toolkit = Toolkit::new();
        toolkit.register("get_quote", "Latest quote for a ticker", |args| {
            let ticker = args.get("ticker").and_then(|t| t.as_str()).unwrap_or("?");
            Ok(format!("{ticker}: 1728.00"))
        });
        toolkit.register("get_daily_kline", "Daily OHLCV bars", |_| {
            Ok("open,high,low,close\n1700,1735,1690,1728".to_string())
        });
        toolkit
    }

    #[test]
    fn call_dispatches_by_name() {
        let toolkit = toolkit();
        let result = toolkit
            .call("get_quote", &serde_json::json!({"ticker": "600519.SH"}))
            .unwrap();
        assert_eq!(result, "600519.SH: 1728.00");
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let toolkit = toolkit();
        let err = toolkit.call("get_moon_phase", &serde_json::Value::Null);
        assert!(matches!(err, Err(AgentError::Toolkit(_))));
    }

    #[test]
    fn descriptors_are_name_ordered() {
        let toolkit = toolkit();
        let names: Vec<_> = toolkit.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["get_daily_kline", "get_quote"]);
    }
}
