use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::parser;

/// Descriptor for one toolkit operation, advertised to the engine so it can
/// request data instead of writing a report straight away.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// A data-fetch request emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// One engine invocation. `stage` identifies the caller for logging and
/// mock scripting; `model` picks the configured deep or quick model.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub stage: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub tools: Vec<ToolDescriptor>,
}

/// Engine output: free text, and optionally structured tool calls. A
/// non-empty `structured_calls` with empty `text` is a valid response
/// meaning "fetch this first".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResponse {
    pub text: String,
    pub structured_calls: Vec<ToolCall>,
}

impl EngineResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), structured_calls: Vec::new() }
    }
}

/// Capability interface for the external reasoning engine.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn invoke(&self, request: &EngineRequest) -> Result<EngineResponse, AgentError>;
}

/// Reasoning engine backed by the `claude` CLI.
///
/// The CLI has no native tool-call channel, so tool use is prompt-mediated:
/// available tools are listed in the system prompt, and a response that is a
/// JSON object with a top-level `tool_calls` array is lifted into
/// `structured_calls`.
pub struct ClaudeCliEngine;

impl ClaudeCliEngine {
    pub fn new() -> Self {
        Self
    }

    fn system_prompt_with_tools(request: &EngineRequest) -> String {
        if request.tools.is_empty() {
            return request.system_prompt.clone();
        }
        let mut prompt = request.system_prompt.clone();
        prompt.push_str(
            "\n\n## AVAILABLE DATA TOOLS\n\n\
             If you need data before writing your report, respond with ONLY a JSON object:\n\
             {\"tool_calls\": [{\"name\": \"<tool>\", \"args\": {...}}]}\n\
             Available tools:\n",
        );
        for tool in &request.tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
        prompt
    }
}

impl Default for ClaudeCliEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningEngine for ClaudeCliEngine {
    async fn invoke(&self, request: &EngineRequest) -> Result<EngineResponse, AgentError> {
        debug!(stage = %request.stage, model = %request.model, "Invoking claude CLI");

        let system_prompt = Self::system_prompt_with_tools(request);
        let output = Command::new("claude")
            .args([
                "-p",
                &request.user_prompt,
                "--system-prompt",
                &system_prompt,
                "--model",
                &request.model,
                "--output-format",
                "text",
            ])
            .output()
            .await
            .map_err(|e| AgentError::Engine(format!("Failed to spawn claude: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stage = %request.stage, status = %output.status, stderr = %stderr, "Claude CLI failed");
            return Err(AgentError::Engine(format!(
                "claude exited {}: {}",
                output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(AgentError::Engine("claude returned empty response".to_string()));
        }

        // Lift a prompt-mediated tool-call object into structured calls.
        if let Ok(value) = parser::extract_json(&stdout) {
            if let Some(calls) = value.get("tool_calls").and_then(|c| c.as_array()) {
                let structured_calls: Vec<ToolCall> = calls
                    .iter()
                    .filter_map(|c| serde_json::from_value(c.clone()).ok())
                    .collect();
                if !structured_calls.is_empty() {
                    let text = value
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string();
                    return Ok(EngineResponse { text, structured_calls });
                }
            }
        }

        Ok(EngineResponse::text(stdout))
    }
}

/// Check whether the `claude` CLI is available on this system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
