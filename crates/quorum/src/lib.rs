//! Quorum - a multi-agent trade decision pipeline.
//!
//! Four analyst agents report in parallel, bull and bear researchers debate
//! the long case, a research manager synthesizes an investment plan, a
//! trader turns it into a structured instruction, and a three-way risk
//! debate plus risk-manager verdict gate the final decision. Episode memory
//! feeds lessons from similar past situations into the reasoning stages.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use quorum::models::QuorumConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = QuorumConfig::default();
//! let pipeline = quorum::build_pipeline(&config)?;
//! let state = pipeline.run("600519.SH", "2026-08-26").await?;
//! println!("{}", serde_json::to_string_pretty(&state)?);
//! # Ok(())
//! # }
//! ```

pub use quorum_agents as agents;
pub use quorum_memory as memory;
pub use quorum_models as models;

use std::sync::Arc;

use anyhow::Context;
use quorum_agents::{ClaudeCliEngine, Pipeline, Toolkit};
use quorum_memory::{EpisodeMemory, HashingEmbedder, SqliteMemoryStore};
use quorum_models::QuorumConfig;

/// Build a pipeline from configuration, backed by the `claude` CLI engine
/// and a SQLite episode store. Register data tools on the toolkit before
/// calling for analysts that should fetch live data.
pub fn build_pipeline(config: &QuorumConfig) -> anyhow::Result<Pipeline> {
    build_pipeline_with_toolkit(config, Toolkit::new())
}

pub fn build_pipeline_with_toolkit(
    config: &QuorumConfig,
    toolkit: Toolkit,
) -> anyhow::Result<Pipeline> {
    config.validate().context("Invalid configuration")?;

    let store = SqliteMemoryStore::open(&config.memory.sqlite_path)
        .with_context(|| format!("Failed to open episode store: {}", config.memory.sqlite_path))?;
    let memory = EpisodeMemory::new(
        Arc::new(store),
        Arc::new(HashingEmbedder::default()),
        &config.memory,
        config.pipeline.snapshot_excerpt_length,
    );

    Ok(Pipeline::new(
        Arc::new(ClaudeCliEngine::new()),
        Arc::new(toolkit),
        Arc::new(memory),
        config.clone(),
    ))
}
