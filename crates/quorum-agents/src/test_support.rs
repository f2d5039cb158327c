//! Test support: a scriptable mock reasoning engine and context builders.
//!
//! `MockEngine` queues responses per stage name and falls back to a default
//! response, so pipeline tests can script exactly the stages they care
//! about and let the rest produce plausible filler.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quorum_memory::{EpisodeMemory, HashingEmbedder, SqliteMemoryStore};
use quorum_models::QuorumConfig;

use crate::engine::{EngineRequest, EngineResponse, ReasoningEngine};
use crate::error::AgentError;
use crate::orchestrator::StageContext;
use crate::toolkit::Toolkit;

pub struct MockEngine {
    responses: Mutex<HashMap<String, VecDeque<EngineResponse>>>,
    fail_stages: Mutex<HashSet<String>>,
    default: EngineResponse,
    invocations: Mutex<Vec<EngineRequest>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_default(EngineResponse::text("Mock analysis output."))
    }

    /// Response served for any stage with no scripted queue entry.
    pub fn with_default(default: EngineResponse) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fail_stages: Mutex::new(HashSet::new()),
            default,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for a stage. Queued responses are consumed in order.
    pub fn script(&self, stage: &str, response: EngineResponse) {
        self.responses
            .lock()
            .unwrap()
            .entry(stage.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn script_text(&self, stage: &str, text: &str) {
        self.script(stage, EngineResponse::text(text));
    }

    /// Make every invocation from a stage fail.
    pub fn fail_stage(&self, stage: &str) {
        self.fail_stages.lock().unwrap().insert(stage.to_string());
    }

    pub fn invocations(&self) -> Vec<EngineRequest> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn calls_for(&self, stage: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.stage == stage)
            .count()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningEngine for MockEngine {
    async fn invoke(&self, request: &EngineRequest) -> Result<EngineResponse, AgentError> {
        self.invocations.lock().unwrap().push(request.clone());

        if self.fail_stages.lock().unwrap().contains(&request.stage) {
            return Err(AgentError::Engine(format!(
                "scripted failure for {}",
                request.stage
            )));
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&request.stage)
            .and_then(|queue| queue.pop_front());
        Ok(scripted.unwrap_or_else(|| self.default.clone()))
    }
}

/// Stage context over an in-memory store, the hashing embedder, an empty
/// toolkit, and the default configuration.
pub fn context(engine: Arc<dyn ReasoningEngine>) -> StageContext {
    context_with_toolkit(engine, Toolkit::new())
}

pub fn context_with_toolkit(engine: Arc<dyn ReasoningEngine>, toolkit: Toolkit) -> StageContext {
    let config = QuorumConfig::default();
    let store = SqliteMemoryStore::open_in_memory()
        .map(Arc::new)
        .expect("in-memory store");
    let memory = EpisodeMemory::new(
        store,
        Arc::new(HashingEmbedder::default()),
        &config.memory,
        config.pipeline.snapshot_excerpt_length,
    );
    StageContext {
        engine,
        toolkit: Arc::new(toolkit),
        memory: Arc::new(memory),
        config,
        cancel: CancellationToken::new(),
    }
}

/// Script a complete happy-path run: distinct analyst reports, debate
/// arguments for every researcher, a plan, a BUY instruction and an
/// approving risk verdict.
pub fn script_happy_path(engine: &MockEngine) {
    engine.script_text("fundamentals_analyst", "Revenue +18% YoY, margins widening.");
    engine.script_text("market_analyst", "Uptrend intact above the 20-day MA.");
    engine.script_text("news_analyst", "Policy tailwind for the sector this quarter.");
    engine.script_text("sentiment_analyst", "Retail interest warming, not yet euphoric.");
    engine.script_text("bull_researcher", "Earnings momentum supports a long.");
    engine.script_text("bear_researcher", "Valuation already reflects the good news.");
    engine.script_text("research_manager", "Verdict: long. Build 15% on dips toward support.");
    engine.script_text(
        "trader",
        r#"{"action": "BUY", "ticker": "600519.SH", "position_size": "0.15",
            "order_type": "LIMIT", "rationale": "Entry zone from the plan."}"#,
    );
    engine.script_text("aggressive_debater", "Size up; the setup is rare.");
    engine.script_text("conservative_debater", "Keep 15% and demand a hard stop.");
    engine.script_text("neutral_debater", "15% with a stop is the balanced path.");
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 4, "adjustments": "",
            "rationale": "Sized reasonably with a clear invalidation."}"#,
    );
}
