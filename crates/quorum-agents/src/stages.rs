use async_trait::async_trait;
use tracing::{debug, warn};

use quorum_memory::RecalledEpisode;
use quorum_models::{
    AgentState, Approval, ReportKind, RiskAssessment, RiskSpeaker, StateUpdate, TradeInstruction,
};

use crate::debate::{DebateLog, Debater, TurnReply};
use crate::engine::EngineRequest;
use crate::error::AgentError;
use crate::orchestrator::StageContext;
use crate::parser;
use crate::prompts;

/// One pipeline stage: reads the shared state, returns the fields it owns.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &AgentState, ctx: &StageContext) -> Result<StateUpdate, AgentError>;
}

fn reports_block(state: &AgentState) -> String {
    let mut block = String::from("## ANALYST REPORTS\n");
    for kind in ReportKind::ALL {
        block.push_str(&format!(
            "\n### {}\n{}\n",
            kind.field_name(),
            state.report_or_default(kind)
        ));
    }
    block
}

fn lessons_block(episodes: &[RecalledEpisode]) -> String {
    if episodes.is_empty() {
        return "## LESSONS FROM SIMILAR PAST EPISODES\n\n(none recalled)\n".to_string();
    }
    let mut block = String::from("## LESSONS FROM SIMILAR PAST EPISODES\n");
    for episode in episodes {
        block.push_str(&format!(
            "\n- Outcome: {}. Lesson: {}\n",
            episode.outcome, episode.lesson
        ));
    }
    block
}

/// Produces one of the four analyst reports, fetching toolkit data first
/// when the engine asks for it.
pub struct AnalystStage {
    kind: ReportKind,
}

impl AnalystStage {
    pub fn new(kind: ReportKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Stage for AnalystStage {
    fn name(&self) -> &'static str {
        match self.kind {
            ReportKind::Fundamentals => "fundamentals_analyst",
            ReportKind::Market => "market_analyst",
            ReportKind::News => "news_analyst",
            ReportKind::Sentiment => "sentiment_analyst",
        }
    }

    async fn run(&self, state: &AgentState, ctx: &StageContext) -> Result<StateUpdate, AgentError> {
        let user_prompt = format!(
            "Ticker: {}\nTrade date: {}\n\nWrite your report for this ticker as of the trade date.",
            state.ticker, state.trade_date
        );
        let request = EngineRequest {
            stage: self.name().to_string(),
            model: ctx.config.engine.quick_model.clone(),
            system_prompt: prompts::analyst_system_prompt(self.kind),
            user_prompt: user_prompt.clone(),
            tools: ctx.toolkit.descriptors(),
        };
        let mut response = ctx.invoke_engine(&request).await?;

        // One data-fetch round: execute the requested tools and re-invoke
        // with the results. A second tool request is not honored.
        if !response.structured_calls.is_empty() {
            let requested: Vec<String> = response
                .structured_calls
                .iter()
                .map(|c| c.name.clone())
                .collect();
            debug!(stage = self.name(), tools = ?requested, "Executing requested tools");

            let mut results = String::from("## TOOL RESULTS\n");
            for call in &response.structured_calls {
                match ctx.toolkit.call(&call.name, &call.args) {
                    Ok(output) => results.push_str(&format!("\n### {}\n{}\n", call.name, output)),
                    Err(e) => {
                        warn!(stage = self.name(), tool = %call.name, error = %e, "Tool call failed");
                        results.push_str(&format!("\n### {}\nunavailable: {e}\n", call.name));
                    }
                }
            }

            let followup = EngineRequest {
                stage: self.name().to_string(),
                model: ctx.config.engine.quick_model.clone(),
                system_prompt: prompts::analyst_system_prompt(self.kind),
                user_prompt: format!(
                    "{user_prompt}\n\n{results}\nWrite the report now using these results."
                ),
                tools: Vec::new(),
            };
            response = ctx.invoke_engine(&followup).await?;

            if response.text.trim().is_empty() {
                let mut update = StateUpdate::from_report(
                    self.kind,
                    format!(
                        "Report unavailable: data was requested ({}) but no report was produced.",
                        requested.join(", ")
                    ),
                );
                update.sender = Some(self.name().to_string());
                return Ok(update);
            }
        }

        let mut update = StateUpdate::from_report(self.kind, response.text.trim().to_string());
        update.sender = Some(self.name().to_string());
        Ok(update)
    }
}

/// Engine-backed debate participant. Arguments are prefixed with the
/// display name so transcripts read as dialogue.
pub struct EngineDebater {
    stage: &'static str,
    display: &'static str,
    system_prompt: String,
    include_plan: bool,
    uses_memory: bool,
    ctx: StageContext,
}

impl EngineDebater {
    pub fn bull(ctx: StageContext) -> Self {
        Self {
            stage: "bull_researcher",
            display: "Bull Researcher",
            system_prompt: prompts::bull_system_prompt(),
            include_plan: false,
            uses_memory: true,
            ctx,
        }
    }

    pub fn bear(ctx: StageContext) -> Self {
        Self {
            stage: "bear_researcher",
            display: "Bear Researcher",
            system_prompt: prompts::bear_system_prompt(),
            include_plan: false,
            uses_memory: true,
            ctx,
        }
    }

    pub fn risk(speaker: RiskSpeaker, ctx: StageContext) -> Self {
        let (stage, display) = match speaker {
            RiskSpeaker::Aggressive => ("aggressive_debater", "Aggressive Analyst"),
            RiskSpeaker::Conservative => ("conservative_debater", "Conservative Analyst"),
            RiskSpeaker::Neutral => ("neutral_debater", "Neutral Analyst"),
        };
        Self {
            stage,
            display,
            system_prompt: prompts::risk_debater_system_prompt(speaker),
            include_plan: true,
            uses_memory: false,
            ctx,
        }
    }

    async fn user_prompt(&self, state: &AgentState, log: &DebateLog) -> String {
        let mut prompt = format!(
            "Ticker: {}\nTrade date: {}\n\n{}",
            state.ticker,
            state.trade_date,
            reports_block(state)
        );
        if self.include_plan {
            prompt.push_str(&format!(
                "\n## INVESTMENT PLAN\n{}\n",
                state.investment_plan_or_default()
            ));
        }
        if self.uses_memory {
            let recalled = self
                .ctx
                .memory
                .recall(state, self.ctx.config.pipeline.memory_match_count)
                .await;
            prompt.push_str(&format!("\n{}", lessons_block(&recalled)));
        }
        let history = log.combined_history();
        if history.is_empty() {
            prompt.push_str("\n## DEBATE SO FAR\n(no arguments yet; open the debate)\n");
        } else {
            prompt.push_str(&format!("\n## DEBATE SO FAR\n{history}\n"));
        }
        if let Some(last) = log.last_argument() {
            prompt.push_str(&format!("\n## REBUT THIS\n{last}\n"));
        }
        prompt
    }
}

#[async_trait]
impl Debater for EngineDebater {
    fn name(&self) -> &str {
        self.display
    }

    async fn argue(&self, state: &AgentState, log: &DebateLog) -> Result<TurnReply, AgentError> {
        let request = EngineRequest {
            stage: self.stage.to_string(),
            model: self.ctx.config.engine.quick_model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: self.user_prompt(state, log).await,
            tools: Vec::new(),
        };
        let response = self.ctx.invoke_engine(&request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(AgentError::Engine("empty debate argument".into()));
        }
        Ok(TurnReply::of(format!("{}: {}", self.display, text)))
    }
}

/// Synthesizes the analyst reports and the finished investment debate into
/// one investment plan.
pub struct ResearchManagerStage;

#[async_trait]
impl Stage for ResearchManagerStage {
    fn name(&self) -> &'static str {
        "research_manager"
    }

    async fn run(&self, state: &AgentState, ctx: &StageContext) -> Result<StateUpdate, AgentError> {
        let recalled = ctx
            .memory
            .recall(state, ctx.config.pipeline.memory_match_count)
            .await;
        let debate_history = state
            .investment_debate
            .as_ref()
            .map(|d| d.combined_history.as_str())
            .unwrap_or("(no debate took place)");

        let request = EngineRequest {
            stage: self.name().to_string(),
            model: ctx.config.engine.deep_model.clone(),
            system_prompt: prompts::research_manager_system_prompt(),
            user_prompt: format!(
                "Ticker: {}\nTrade date: {}\n\n{}\n## DEBATE TRANSCRIPT\n{}\n\n{}",
                state.ticker,
                state.trade_date,
                reports_block(state),
                debate_history,
                lessons_block(&recalled)
            ),
            tools: Vec::new(),
        };
        let response = ctx.invoke_engine(&request).await?;

        let mut update = StateUpdate::default();
        update.sender = Some(self.name().to_string());
        update.investment_plan = Some(response.text.trim().to_string());
        Ok(update)
    }
}

/// Converts the investment plan into a structured, validated trade
/// instruction.
///
/// An engine failure degrades to a HOLD sentinel; malformed or invalid
/// structured output is the one failure that surfaces to the caller.
pub struct TraderStage;

#[async_trait]
impl Stage for TraderStage {
    fn name(&self) -> &'static str {
        "trader"
    }

    async fn run(&self, state: &AgentState, ctx: &StageContext) -> Result<StateUpdate, AgentError> {
        let recalled = ctx
            .memory
            .recall(state, ctx.config.pipeline.memory_match_count)
            .await;
        let request = EngineRequest {
            stage: self.name().to_string(),
            model: ctx.config.engine.deep_model.clone(),
            system_prompt: prompts::trader_system_prompt(),
            user_prompt: format!(
                "Ticker: {}\nTrade date: {}\n\n{}\n## INVESTMENT PLAN\n{}\n\n{}",
                state.ticker,
                state.trade_date,
                reports_block(state),
                state.investment_plan_or_default(),
                lessons_block(&recalled)
            ),
            tools: Vec::new(),
        };

        let mut update = StateUpdate::default();
        update.sender = Some(self.name().to_string());

        let response = match ctx.invoke_engine(&request).await {
            Ok(response) => response,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Trader stage failed; holding");
                update.trade_instruction = Some(TradeInstruction::hold(
                    &state.ticker,
                    "Trader produced no response; holding with no new exposure.",
                ));
                return Ok(update);
            }
            Err(e) => return Err(e),
        };

        let value = parser::extract_json(&response.text).map_err(|_| {
            quorum_models::DecisionError::Schema("trade instruction is not a JSON object".into())
        })?;
        let instruction = TradeInstruction::from_engine_json(&value)?;
        update.trade_instruction = Some(instruction);
        Ok(update)
    }
}

/// Final verdict on the investment plan; a NO approval later gates the
/// trader's instruction down to HOLD.
///
/// If the engine produces nothing the stage fails closed: an unreviewed
/// plan is treated as rejected, not approved.
pub struct RiskManagerStage;

impl RiskManagerStage {
    fn rejection_sentinel() -> RiskAssessment {
        RiskAssessment {
            approval: Approval::No,
            risk_score: 10,
            adjustments: String::new(),
            rationale: "Risk manager produced no response; defaulting to rejection.".to_string(),
        }
    }
}

#[async_trait]
impl Stage for RiskManagerStage {
    fn name(&self) -> &'static str {
        "risk_manager"
    }

    async fn run(&self, state: &AgentState, ctx: &StageContext) -> Result<StateUpdate, AgentError> {
        let debate_history = state
            .risk_debate
            .as_ref()
            .map(|d| d.combined_history.as_str())
            .unwrap_or("(no risk debate took place)");
        let recalled = ctx
            .memory
            .recall(state, ctx.config.pipeline.memory_match_count)
            .await;

        let request = EngineRequest {
            stage: self.name().to_string(),
            model: ctx.config.engine.deep_model.clone(),
            system_prompt: prompts::risk_manager_system_prompt(),
            user_prompt: format!(
                "Ticker: {}\nTrade date: {}\n\n{}\n## INVESTMENT PLAN\n{}\n\n\
                 ## RISK DEBATE TRANSCRIPT\n{}\n\n{}",
                state.ticker,
                state.trade_date,
                reports_block(state),
                state.investment_plan_or_default(),
                debate_history,
                lessons_block(&recalled)
            ),
            tools: Vec::new(),
        };

        let mut update = StateUpdate::default();
        update.sender = Some(self.name().to_string());

        let response = match ctx.invoke_engine(&request).await {
            Ok(response) => response,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Risk manager failed; rejecting the trade");
                update.risk_assessment = Some(Self::rejection_sentinel());
                return Ok(update);
            }
            Err(e) => return Err(e),
        };

        let value = parser::extract_json(&response.text).map_err(|_| {
            quorum_models::DecisionError::Schema("risk assessment is not a JSON object".into())
        })?;
        let assessment = RiskAssessment::from_engine_json(&value)?;
        update.risk_assessment = Some(assessment);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineResponse, ToolCall};
    use crate::test_support::{context, context_with_toolkit, MockEngine};
    use crate::toolkit::Toolkit;
    use std::sync::Arc;

    fn state() -> AgentState {
        AgentState::new("600519.SH", "2026-08-26")
    }

    #[tokio::test]
    async fn analyst_writes_its_own_report_field() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text("market_analyst", "Uptrend intact, RSI 61.");
        let ctx = context(engine);

        let update = AnalystStage::new(ReportKind::Market)
            .run(&state(), &ctx)
            .await
            .unwrap();

        assert_eq!(update.market_report.as_deref(), Some("Uptrend intact, RSI 61."));
        assert_eq!(update.sender.as_deref(), Some("market_analyst"));
        assert!(update.fundamentals_report.is_none());
    }

    #[tokio::test]
    async fn analyst_executes_requested_tools_then_reinvokes_once() {
        let engine = Arc::new(MockEngine::new());
        engine.script(
            "market_analyst",
            EngineResponse {
                text: String::new(),
                structured_calls: vec![ToolCall {
                    name: "get_daily_kline".into(),
                    args: serde_json::json!({"ticker": "600519.SH"}),
                }],
            },
        );
        engine.script_text("market_analyst", "Report built from kline data.");

        let mut toolkit = Toolkit::new();
        toolkit.register("get_daily_kline", "Daily OHLCV bars", |_| {
            Ok("close: 1728".to_string())
        });
        let ctx = context_with_toolkit(engine.clone(), toolkit);

        let update = AnalystStage::new(ReportKind::Market)
            .run(&state(), &ctx)
            .await
            .unwrap();

        assert_eq!(
            update.market_report.as_deref(),
            Some("Report built from kline data.")
        );
        let invocations = engine.invocations();
        assert_eq!(invocations.len(), 2);
        assert!(invocations[1].user_prompt.contains("TOOL RESULTS"));
        assert!(invocations[1].user_prompt.contains("close: 1728"));
        assert!(invocations[1].tools.is_empty());
    }

    #[tokio::test]
    async fn analyst_notes_unknown_tool_and_still_reports() {
        let engine = Arc::new(MockEngine::new());
        engine.script(
            "news_analyst",
            EngineResponse {
                text: String::new(),
                structured_calls: vec![ToolCall {
                    name: "get_moon_phase".into(),
                    args: serde_json::Value::Null,
                }],
            },
        );
        engine.script_text("news_analyst", "No material news.");
        let ctx = context(engine.clone());

        let update = AnalystStage::new(ReportKind::News)
            .run(&state(), &ctx)
            .await
            .unwrap();

        assert_eq!(update.news_report.as_deref(), Some("No material news."));
        assert!(engine.invocations()[1].user_prompt.contains("unavailable"));
    }

    #[tokio::test]
    async fn analyst_empty_after_tools_yields_placeholder_naming_the_tools() {
        let engine = Arc::new(MockEngine::with_default(EngineResponse::text("")));
        engine.script(
            "sentiment_analyst",
            EngineResponse {
                text: String::new(),
                structured_calls: vec![ToolCall {
                    name: "get_forum_buzz".into(),
                    args: serde_json::Value::Null,
                }],
            },
        );
        let ctx = context(engine);

        let update = AnalystStage::new(ReportKind::Sentiment)
            .run(&state(), &ctx)
            .await
            .unwrap();

        let report = update.sentiment_report.unwrap();
        assert!(report.contains("Report unavailable"));
        assert!(report.contains("get_forum_buzz"));
    }

    #[tokio::test]
    async fn research_manager_merges_plan_from_deep_model() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text("research_manager", "Verdict: long. Build 15% on dips.");
        let ctx = context(engine.clone());

        let update = ResearchManagerStage.run(&state(), &ctx).await.unwrap();

        assert_eq!(
            update.investment_plan.as_deref(),
            Some("Verdict: long. Build 15% on dips.")
        );
        let request = &engine.invocations()[0];
        assert_eq!(request.model, ctx.config.engine.deep_model);
        assert!(request.user_prompt.contains("ANALYST REPORTS"));
        assert!(request.user_prompt.contains("DEBATE TRANSCRIPT"));
    }

    #[tokio::test]
    async fn trader_parses_valid_instruction() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text(
            "trader",
            r#"{"action": "BUY", "ticker": "600519.SH", "position_size": "0.15",
                "order_type": "LIMIT", "rationale": "Entry zone from the plan."}"#,
        );
        let ctx = context(engine);

        let update = TraderStage.run(&state(), &ctx).await.unwrap();
        let instruction = update.trade_instruction.unwrap();
        assert_eq!(instruction.action, quorum_models::TradeAction::Buy);
        assert_eq!(instruction.ticker, "600519.SH");
    }

    #[tokio::test]
    async fn trader_engine_failure_degrades_to_hold() {
        let engine = Arc::new(MockEngine::new());
        engine.fail_stage("trader");
        let ctx = context(engine);

        let update = TraderStage.run(&state(), &ctx).await.unwrap();
        let instruction = update.trade_instruction.unwrap();
        assert_eq!(instruction.action, quorum_models::TradeAction::Hold);
        assert_eq!(instruction.position_size, rust_decimal::Decimal::ZERO);
    }

    #[tokio::test]
    async fn trader_malformed_output_surfaces_decision_error() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text("trader", "I think we should buy a lot.");
        let ctx = context(engine);

        let err = TraderStage.run(&state(), &ctx).await;
        assert!(matches!(err, Err(AgentError::Decision(_))));
    }

    #[tokio::test]
    async fn trader_out_of_range_size_surfaces_decision_error() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text(
            "trader",
            r#"{"action": "BUY", "ticker": "600519.SH", "position_size": "1.5",
                "order_type": "MARKET", "rationale": "all in"}"#,
        );
        let ctx = context(engine);

        let err = TraderStage.run(&state(), &ctx).await;
        assert!(matches!(err, Err(AgentError::Decision(_))));
    }

    #[tokio::test]
    async fn risk_manager_parses_valid_assessment() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text(
            "risk_manager",
            r#"{"approval": "YES", "risk_score": 4, "adjustments": "",
                "rationale": "Sized reasonably with a clear invalidation."}"#,
        );
        let ctx = context(engine);

        let update = RiskManagerStage.run(&state(), &ctx).await.unwrap();
        let assessment = update.risk_assessment.unwrap();
        assert!(assessment.approved());
        assert_eq!(assessment.risk_score, 4);
    }

    #[tokio::test]
    async fn risk_manager_engine_failure_fails_closed() {
        let engine = Arc::new(MockEngine::new());
        engine.fail_stage("risk_manager");
        let ctx = context(engine);

        let update = RiskManagerStage.run(&state(), &ctx).await.unwrap();
        let assessment = update.risk_assessment.unwrap();
        assert!(!assessment.approved());
        assert_eq!(assessment.risk_score, 10);
    }

    #[tokio::test]
    async fn risk_manager_invalid_score_surfaces_decision_error() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text(
            "risk_manager",
            r#"{"approval": "NO", "risk_score": 0, "adjustments": "", "rationale": "x"}"#,
        );
        let ctx = context(engine);

        let err = RiskManagerStage.run(&state(), &ctx).await;
        assert!(matches!(err, Err(AgentError::Decision(_))));
    }

    #[tokio::test]
    async fn bull_debater_prefixes_display_name() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text("bull_researcher", "Growth reaccelerating.");
        let ctx = context(engine);

        let bull = EngineDebater::bull(ctx);
        let log = DebateLog::new(vec!["Bull Researcher".into(), "Bear Researcher".into()]);
        let reply = bull.argue(&state(), &log).await.unwrap();

        assert_eq!(reply.argument, "Bull Researcher: Growth reaccelerating.");
        assert!(!reply.terminal);
    }

    #[tokio::test]
    async fn risk_debater_sees_the_investment_plan() {
        let engine = Arc::new(MockEngine::new());
        engine.script_text("conservative_debater", "Cut the size in half.");
        let ctx = context(engine.clone());

        let mut state = state();
        state.merge(StateUpdate {
            investment_plan: Some("Build 20% long.".into()),
            ..Default::default()
        });

        let debater = EngineDebater::risk(RiskSpeaker::Conservative, ctx);
        let log = DebateLog::new(vec![
            "Aggressive Analyst".into(),
            "Conservative Analyst".into(),
            "Neutral Analyst".into(),
        ]);
        debater.argue(&state, &log).await.unwrap();

        let request = &engine.invocations()[0];
        assert!(request.user_prompt.contains("Build 20% long."));
        assert!(request.user_prompt.contains("INVESTMENT PLAN"));
    }

    #[tokio::test]
    async fn bull_debater_does_not_see_a_plan_section() {
        let engine = Arc::new(MockEngine::new());
        let ctx = context(engine.clone());

        let bull = EngineDebater::bull(ctx);
        let log = DebateLog::new(vec!["Bull Researcher".into(), "Bear Researcher".into()]);
        bull.argue(&state(), &log).await.unwrap();

        let request = &engine.invocations()[0];
        assert!(!request.user_prompt.contains("INVESTMENT PLAN"));
        assert!(request.user_prompt.contains("LESSONS FROM SIMILAR PAST EPISODES"));
    }

    #[tokio::test]
    async fn empty_debate_argument_is_an_engine_error() {
        let engine = Arc::new(MockEngine::with_default(EngineResponse::text("   ")));
        let ctx = context(engine);

        let bear = EngineDebater::bear(ctx);
        let log = DebateLog::new(vec!["Bull Researcher".into(), "Bear Researcher".into()]);
        let err = bear.argue(&state(), &log).await;
        assert!(matches!(err, Err(AgentError::Engine(_))));
    }
}
