//! End-to-end pipeline tests over a scripted mock engine.
//!
//! Each test builds a pipeline with an in-memory episode store, scripts the
//! stages it cares about, and inspects the final `AgentState`.

use std::sync::Arc;

use rust_decimal_macros::dec;

use quorum_agents::test_support::{script_happy_path, MockEngine};
use quorum_agents::{AgentError, Pipeline, Toolkit};
use quorum_memory::{EpisodeMemory, HashingEmbedder, SqliteMemoryStore};
use quorum_models::{QuorumConfig, ReportKind, RiskSpeaker, TradeAction};

fn pipeline_with(engine: Arc<MockEngine>, config: QuorumConfig) -> Pipeline {
    let store = Arc::new(SqliteMemoryStore::open_in_memory().unwrap());
    let memory = Arc::new(EpisodeMemory::new(
        store,
        Arc::new(HashingEmbedder::default()),
        &config.memory,
        config.pipeline.snapshot_excerpt_length,
    ));
    Pipeline::new(engine, Arc::new(Toolkit::new()), memory, config)
}

fn pipeline(engine: Arc<MockEngine>) -> Pipeline {
    pipeline_with(engine, QuorumConfig::default())
}

#[tokio::test]
async fn happy_path_produces_full_state() {
    let engine = Arc::new(MockEngine::new());
    script_happy_path(&engine);

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();

    assert_eq!(
        state.report(ReportKind::Fundamentals),
        Some("Revenue +18% YoY, margins widening.")
    );
    assert_eq!(
        state.report(ReportKind::Market),
        Some("Uptrend intact above the 20-day MA.")
    );
    assert!(state.report(ReportKind::News).is_some());
    assert!(state.report(ReportKind::Sentiment).is_some());

    let invest = state.investment_debate.as_ref().unwrap();
    assert_eq!(invest.round_count, 2);
    assert!(invest.combined_history.starts_with("Bull Researcher:"));
    assert!(invest.bull_transcript.contains("Earnings momentum"));
    assert!(invest.bear_transcript.contains("Valuation"));

    assert!(state
        .investment_plan
        .as_deref()
        .unwrap()
        .contains("Verdict: long"));

    let risk = state.risk_debate.as_ref().unwrap();
    assert_eq!(risk.round_count, 3);
    assert_eq!(risk.latest_speaker, Some(RiskSpeaker::Neutral));
    assert!(risk.aggressive_transcript.contains("Size up"));

    let assessment = state.risk_assessment.as_ref().unwrap();
    assert!(assessment.approved());
    assert_eq!(assessment.risk_score, 4);

    let instruction = state.trade_instruction.as_ref().unwrap();
    assert_eq!(instruction.action, TradeAction::Buy);
    assert_eq!(instruction.position_size, dec!(0.15));
    assert_eq!(instruction.ticker, "600519.SH");
}

#[tokio::test]
async fn risk_veto_downgrades_buy_to_hold() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text(
        "trader",
        r#"{"action": "BUY", "ticker": "600519.SH", "position_size": "0.40",
            "order_type": "MARKET", "rationale": "conviction long"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "NO", "risk_score": 8, "adjustments": "cut size to 10% and use a limit",
            "rationale": "Position too large for current volatility."}"#,
    );

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();

    let instruction = state.trade_instruction.as_ref().unwrap();
    assert_eq!(instruction.action, TradeAction::Hold);
    assert_eq!(instruction.position_size, rust_decimal::Decimal::ZERO);
    assert!(instruction.rationale.contains("Vetoed by risk manager"));
    assert!(instruction.rationale.contains("risk score 8"));
    assert!(instruction.rationale.contains("cut size to 10%"));
    assert_eq!(state.sender.as_deref(), Some("risk_gate"));
}

#[tokio::test]
async fn approved_sell_is_not_gated() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text(
        "trader",
        r#"{"action": "SELL", "ticker": "600519.SH", "position_size": "1.0",
            "order_type": "MARKET", "rationale": "exit the position"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 2, "adjustments": "", "rationale": "Reduces exposure."}"#,
    );

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();
    assert_eq!(state.trade_instruction.as_ref().unwrap().action, TradeAction::Sell);
}

#[tokio::test]
async fn malformed_trader_output_surfaces_decision_error() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text("trader", "Strong conviction, buy aggressively.");

    let result = pipeline(engine).run("600519.SH", "2026-08-26").await;
    assert!(matches!(result, Err(AgentError::Decision(_))));
}

#[tokio::test]
async fn failed_analysts_leave_reports_absent_but_run_completes() {
    let engine = Arc::new(MockEngine::new());
    for stage in [
        "fundamentals_analyst",
        "market_analyst",
        "news_analyst",
        "sentiment_analyst",
    ] {
        engine.fail_stage(stage);
    }
    engine.script_text(
        "trader",
        r#"{"action": "HOLD", "ticker": "600519.SH", "position_size": "0.0",
            "order_type": "MARKET", "rationale": "nothing to act on"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 1, "adjustments": "", "rationale": "No exposure."}"#,
    );

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();

    for kind in ReportKind::ALL {
        assert!(state.report(kind).is_none(), "{kind:?} should be absent");
    }
    // Downstream stages still ran against the documented defaults.
    assert!(state.investment_plan.is_some());
    assert!(state.trade_instruction.is_some());
}

#[tokio::test]
async fn risk_manager_failure_fails_closed_and_gates_the_trade() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text(
        "trader",
        r#"{"action": "BUY", "ticker": "600519.SH", "position_size": "0.20",
            "order_type": "MARKET", "rationale": "long"}"#,
    );
    engine.fail_stage("risk_manager");

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();

    let assessment = state.risk_assessment.as_ref().unwrap();
    assert!(!assessment.approved());
    assert_eq!(assessment.risk_score, 10);
    assert_eq!(state.trade_instruction.as_ref().unwrap().action, TradeAction::Hold);
}

#[tokio::test]
async fn trader_failure_degrades_to_hold_without_error() {
    let engine = Arc::new(MockEngine::new());
    engine.fail_stage("trader");
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 1, "adjustments": "", "rationale": "Nothing at risk."}"#,
    );

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();
    let instruction = state.trade_instruction.as_ref().unwrap();
    assert_eq!(instruction.action, TradeAction::Hold);
    assert!(instruction.rationale.contains("no response"));
}

#[tokio::test]
async fn zero_round_debates_skip_every_researcher() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text(
        "trader",
        r#"{"action": "HOLD", "ticker": "600519.SH", "position_size": "0.0",
            "order_type": "MARKET", "rationale": "no debate, no trade"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 1, "adjustments": "", "rationale": "ok"}"#,
    );

    let mut config = QuorumConfig::default();
    config.pipeline.max_investment_debate_rounds = 0;
    config.pipeline.max_risk_debate_rounds = 0;

    let state = pipeline_with(engine.clone(), config)
        .run("600519.SH", "2026-08-26")
        .await
        .unwrap();

    assert_eq!(state.investment_debate.as_ref().unwrap().round_count, 0);
    assert_eq!(state.risk_debate.as_ref().unwrap().round_count, 0);
    assert_eq!(engine.calls_for("bull_researcher"), 0);
    assert_eq!(engine.calls_for("aggressive_debater"), 0);
}

#[tokio::test]
async fn two_round_debates_rotate_strictly() {
    let engine = Arc::new(MockEngine::new());
    engine.script_text(
        "trader",
        r#"{"action": "HOLD", "ticker": "600519.SH", "position_size": "0.0",
            "order_type": "MARKET", "rationale": "hold"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 3, "adjustments": "", "rationale": "ok"}"#,
    );

    let mut config = QuorumConfig::default();
    config.pipeline.max_investment_debate_rounds = 2;
    config.pipeline.max_risk_debate_rounds = 2;

    let state = pipeline_with(engine.clone(), config)
        .run("600519.SH", "2026-08-26")
        .await
        .unwrap();

    assert_eq!(state.investment_debate.as_ref().unwrap().round_count, 4);
    assert_eq!(state.risk_debate.as_ref().unwrap().round_count, 6);
    assert_eq!(engine.calls_for("bull_researcher"), 2);
    assert_eq!(engine.calls_for("bear_researcher"), 2);
    assert_eq!(engine.calls_for("conservative_debater"), 2);
}

#[tokio::test]
async fn failed_debater_becomes_sentinel_turn() {
    let engine = Arc::new(MockEngine::new());
    engine.fail_stage("bear_researcher");
    engine.script_text(
        "trader",
        r#"{"action": "HOLD", "ticker": "600519.SH", "position_size": "0.0",
            "order_type": "MARKET", "rationale": "hold"}"#,
    );
    engine.script_text(
        "risk_manager",
        r#"{"approval": "YES", "risk_score": 1, "adjustments": "", "rationale": "ok"}"#,
    );

    let state = pipeline(engine).run("600519.SH", "2026-08-26").await.unwrap();

    let invest = state.investment_debate.as_ref().unwrap();
    assert_eq!(invest.round_count, 2);
    assert!(invest.bear_transcript.contains("Bear Researcher produced no response"));
    assert!(invest.combined_history.contains("Bear Researcher produced no response"));
}

#[tokio::test]
async fn pre_cancelled_run_returns_best_effort_state() {
    let engine = Arc::new(MockEngine::new());
    let pipeline = pipeline(engine.clone());
    pipeline.cancellation_token().cancel();

    let state = pipeline.run("600519.SH", "2026-08-26").await.unwrap();

    assert_eq!(state.ticker, "600519.SH");
    for kind in ReportKind::ALL {
        assert!(state.report(kind).is_none());
    }
    assert!(state.investment_plan.is_none());
    assert!(state.trade_instruction.is_none());
    assert_eq!(engine.calls_for("research_manager"), 0);
}
