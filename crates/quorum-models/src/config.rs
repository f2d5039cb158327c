use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration, immutable once the pipeline is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuorumConfig {
    pub engine: EngineConfig,
    pub memory: MemoryConfig,
    pub pipeline: PipelineConfig,
}

impl QuorumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.snapshot_excerpt_length == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.snapshot_excerpt_length must be > 0".into(),
            ));
        }
        if self.pipeline.call_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.call_timeout_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Reasoning-engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Model for synthesis, risk verdict and trader stages.
    pub deep_model: String,
    /// Model for analyst and debate turns.
    pub quick_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deep_model: "claude-sonnet-4-5-20250929".to_string(),
            quick_model: "claude-3-5-haiku-latest".to_string(),
        }
    }
}

/// Memory-store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Path to the episode store database.
    pub sqlite_path: String,
    /// Logical collection episodes are written under.
    pub collection: String,
    /// Maximum number of cached snapshot embeddings.
    pub embedding_cache_capacity: u64,
    /// TTL in seconds for cached embeddings.
    pub embedding_cache_ttl_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/quorum_memory.db".to_string(),
            collection: "trade_episodes".to_string(),
            embedding_cache_capacity: 1_000,
            embedding_cache_ttl_seconds: 300,
        }
    }
}

/// Orchestration settings. Round limits count full rotations: a debate with
/// N participants and limit R executes exactly R * N turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub max_investment_debate_rounds: u32,
    pub max_risk_debate_rounds: u32,
    /// How many past episodes to recall per memory-conditioned stage.
    pub memory_match_count: usize,
    /// Per-report character budget for memory snapshots.
    pub snapshot_excerpt_length: usize,
    /// Timeout applied to every engine, toolkit and store call.
    pub call_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_investment_debate_rounds: 1,
            max_risk_debate_rounds: 1,
            memory_match_count: 2,
            snapshot_excerpt_length: 100,
            call_timeout_seconds: 45,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let config = QuorumConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: QuorumConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(QuorumConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_excerpt_length_is_rejected() {
        let mut config = QuorumConfig::default();
        config.pipeline.snapshot_excerpt_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_rounds_is_a_valid_configuration() {
        let mut config = QuorumConfig::default();
        config.pipeline.max_investment_debate_rounds = 0;
        config.pipeline.max_risk_debate_rounds = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[engine]
deep_model = "claude-sonnet-4-5-20250929"
quick_model = "claude-3-5-haiku-latest"

[memory]
sqlite_path = "/tmp/quorum_memory.db"
collection = "trade_episodes"
embedding_cache_capacity = 500
embedding_cache_ttl_seconds = 120

[pipeline]
max_investment_debate_rounds = 2
max_risk_debate_rounds = 1
memory_match_count = 3
snapshot_excerpt_length = 80
call_timeout_seconds = 30
"#;
        let config: QuorumConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.max_investment_debate_rounds, 2);
        assert_eq!(config.pipeline.memory_match_count, 3);
        assert_eq!(config.memory.sqlite_path, "/tmp/quorum_memory.db");
        assert!(config.validate().is_ok());
    }
}
