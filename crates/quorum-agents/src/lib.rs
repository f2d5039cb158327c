pub mod debate;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod stages;
pub mod toolkit;

pub mod test_support;

pub use debate::{DebateController, DebateLog, DebatePhase, Debater, TurnReply};
pub use engine::{ClaudeCliEngine, EngineRequest, EngineResponse, ReasoningEngine, ToolCall, ToolDescriptor};
pub use error::AgentError;
pub use orchestrator::{Pipeline, StageContext};
pub use stages::Stage;
pub use toolkit::Toolkit;
