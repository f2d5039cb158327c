use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("reasoning engine error: {0}")]
    Engine(String),

    #[error("toolkit error: {0}")]
    Toolkit(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("call timed out after {0} seconds")]
    Timeout(u64),

    #[error("run cancelled")]
    Cancelled,

    #[error("decision validation failed: {0}")]
    Decision(#[from] quorum_models::DecisionError),

    #[error("memory error: {0}")]
    Memory(#[from] quorum_memory::MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether this failure is recoverable at turn/stage granularity.
    ///
    /// Everything except a malformed structured decision and an explicit
    /// cancellation is: the pipeline substitutes a sentinel and continues.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AgentError::Decision(_) | AgentError::Cancelled)
    }
}
