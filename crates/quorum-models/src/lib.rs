pub mod config;
pub mod debate;
pub mod decision;
pub mod state;

pub use config::{ConfigError, EngineConfig, MemoryConfig, PipelineConfig, QuorumConfig};
pub use debate::{InvestDebateState, RiskDebateState, RiskSpeaker};
pub use decision::{
    Approval, DecisionError, OrderType, RiskAssessment, TradeAction, TradeInstruction,
};
pub use state::{AgentState, ReportKind, StateUpdate};
