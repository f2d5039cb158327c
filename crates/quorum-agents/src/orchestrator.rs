use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use quorum_memory::EpisodeMemory;
use quorum_models::{AgentState, QuorumConfig, ReportKind, RiskSpeaker, StateUpdate, TradeInstruction};

use crate::debate::{self, DebateController, Debater};
use crate::engine::{EngineRequest, EngineResponse, ReasoningEngine};
use crate::error::AgentError;
use crate::stages::{
    AnalystStage, EngineDebater, ResearchManagerStage, RiskManagerStage, Stage, TraderStage,
};
use crate::toolkit::Toolkit;

/// Shared capabilities handed to every stage.
#[derive(Clone)]
pub struct StageContext {
    pub engine: Arc<dyn ReasoningEngine>,
    pub toolkit: Arc<Toolkit>,
    pub memory: Arc<EpisodeMemory>,
    pub config: QuorumConfig,
    pub cancel: CancellationToken,
}

impl StageContext {
    /// Engine call with the configured timeout and a cancellation check at
    /// the call boundary.
    pub async fn invoke_engine(
        &self,
        request: &EngineRequest,
    ) -> Result<EngineResponse, AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let secs = self.config.pipeline.call_timeout_seconds;
        match tokio::time::timeout(Duration::from_secs(secs), self.engine.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(secs)),
        }
    }
}

/// The full decision pipeline: parallel analysts, investment debate, plan
/// synthesis, trade instruction, risk debate, risk verdict, gating.
pub struct Pipeline {
    ctx: StageContext,
}

enum StageOutcome {
    Merged,
    Skipped,
    Cancelled,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        toolkit: Arc<Toolkit>,
        memory: Arc<EpisodeMemory>,
        config: QuorumConfig,
    ) -> Self {
        Self {
            ctx: StageContext {
                engine,
                toolkit,
                memory,
                config,
                cancel: CancellationToken::new(),
            },
        }
    }

    /// Token that aborts the run at the next stage or turn boundary. The
    /// state accumulated so far is still returned.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    /// Run the pipeline for one ticker and trade date.
    ///
    /// Analyst, debate and plan failures degrade to sentinels; the only
    /// error surfaced is a malformed structured decision.
    pub async fn run(&self, ticker: &str, trade_date: &str) -> Result<AgentState, AgentError> {
        let start = Instant::now();
        let mut state = AgentState::new(ticker, trade_date);
        info!(ticker = %state.ticker, trade_date = %state.trade_date, run_id = %state.run_id, "Starting pipeline run");

        // 1. Fan out the four analysts in parallel; each failure costs only
        //    its own report.
        let mut handles = Vec::new();
        for kind in ReportKind::ALL {
            let stage = AnalystStage::new(kind);
            let snapshot = state.clone();
            let ctx = self.ctx.clone();
            handles.push(tokio::spawn(async move {
                let name = stage.name();
                let stage_start = Instant::now();
                let result = stage.run(&snapshot, &ctx).await;
                (name, result, stage_start.elapsed())
            }));
        }
        for handle in handles {
            match handle.await {
                Ok((name, Ok(update), elapsed)) => {
                    info!(stage = name, elapsed_ms = elapsed.as_millis(), "Analyst succeeded");
                    state.merge(update);
                }
                Ok((name, Err(e), elapsed)) => {
                    warn!(stage = name, error = %e, elapsed_ms = elapsed.as_millis(), "Analyst failed; report stays absent");
                }
                Err(e) => {
                    error!(error = %e, "Analyst task panicked");
                }
            }
        }
        if self.ctx.cancel.is_cancelled() {
            return Ok(state);
        }

        // 2. Bull/bear investment debate.
        let invest_log = self
            .debate(
                vec![
                    Arc::new(EngineDebater::bull(self.ctx.clone())) as Arc<dyn Debater>,
                    Arc::new(EngineDebater::bear(self.ctx.clone())),
                ],
                self.ctx.config.pipeline.max_investment_debate_rounds,
                &state,
            )
            .await;
        state.merge(StateUpdate {
            sender: Some("investment_debate".to_string()),
            investment_debate: Some(debate::invest_debate_state(&invest_log)),
            ..Default::default()
        });
        if self.ctx.cancel.is_cancelled() {
            return Ok(state);
        }

        // 3. Plan synthesis.
        if let StageOutcome::Cancelled = self.run_stage(&ResearchManagerStage, &mut state).await? {
            return Ok(state);
        }

        // 4. Three-way risk debate over the plan.
        let risk_log = self
            .debate(
                RiskSpeaker::ROTATION
                    .iter()
                    .map(|s| Arc::new(EngineDebater::risk(*s, self.ctx.clone())) as Arc<dyn Debater>)
                    .collect(),
                self.ctx.config.pipeline.max_risk_debate_rounds,
                &state,
            )
            .await;
        state.merge(StateUpdate {
            sender: Some("risk_debate".to_string()),
            risk_debate: Some(debate::risk_debate_state(&risk_log)),
            ..Default::default()
        });
        if self.ctx.cancel.is_cancelled() {
            return Ok(state);
        }

        // 5. Risk verdict on the plan.
        if let StageOutcome::Cancelled = self.run_stage(&RiskManagerStage, &mut state).await? {
            return Ok(state);
        }

        // 6. Trade instruction from the plan.
        if let StageOutcome::Cancelled = self.run_stage(&TraderStage, &mut state).await? {
            return Ok(state);
        }

        // 7. Gate: a rejected plan is downgraded to HOLD, never executed.
        self.apply_risk_gate(&mut state);

        info!(
            ticker = %state.ticker,
            run_id = %state.run_id,
            elapsed_ms = start.elapsed().as_millis(),
            "Pipeline run complete"
        );
        Ok(state)
    }

    async fn debate(
        &self,
        participants: Vec<Arc<dyn Debater>>,
        rounds: u32,
        state: &AgentState,
    ) -> debate::DebateLog {
        // Engine calls carry their own timeout; the turn guard sits above it.
        let turn_timeout =
            Duration::from_secs(self.ctx.config.pipeline.call_timeout_seconds.saturating_add(5));
        DebateController::new(rounds, turn_timeout)
            .run(&participants, state, &self.ctx.cancel)
            .await
    }

    async fn run_stage(
        &self,
        stage: &dyn Stage,
        state: &mut AgentState,
    ) -> Result<StageOutcome, AgentError> {
        if self.ctx.cancel.is_cancelled() {
            return Ok(StageOutcome::Cancelled);
        }
        let stage_start = Instant::now();
        match stage.run(state, &self.ctx).await {
            Ok(update) => {
                info!(stage = stage.name(), elapsed_ms = stage_start.elapsed().as_millis(), "Stage succeeded");
                state.merge(update);
                Ok(StageOutcome::Merged)
            }
            Err(AgentError::Cancelled) => Ok(StageOutcome::Cancelled),
            Err(e) if e.is_recoverable() => {
                warn!(stage = stage.name(), error = %e, "Stage failed; continuing without its output");
                Ok(StageOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    fn apply_risk_gate(&self, state: &mut AgentState) {
        let Some(assessment) = state.risk_assessment.clone() else {
            return;
        };
        let Some(instruction) = &state.trade_instruction else {
            return;
        };
        if assessment.approved() || instruction.action == quorum_models::TradeAction::Hold {
            return;
        }

        warn!(
            ticker = %state.ticker,
            risk_score = assessment.risk_score,
            "Trade vetoed by risk manager; downgrading to HOLD"
        );
        let mut rationale = format!(
            "Vetoed by risk manager (risk score {}): {}",
            assessment.risk_score, assessment.rationale
        );
        if !assessment.adjustments.trim().is_empty() {
            rationale.push_str(&format!(" Required adjustments: {}", assessment.adjustments));
        }
        state.merge(StateUpdate {
            sender: Some("risk_gate".to_string()),
            trade_instruction: Some(TradeInstruction::hold(state.ticker.clone(), rationale)),
            ..Default::default()
        });
    }
}
