use anyhow::{Context, Result};
use clap::Parser;
use quorum_models::QuorumConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quorum", about = "Multi-agent trade decision pipeline")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/quorum.toml")]
    config: String,

    /// Ticker to analyze, e.g. 600519.SH
    #[arg(short, long)]
    ticker: String,

    /// Trade date for the analysis, YYYY-MM-DD
    #[arg(short, long)]
    date: String,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: QuorumConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    let pipeline = quorum::build_pipeline(&config).context("Failed to build pipeline")?;

    let state = pipeline
        .run(&cli.ticker, &cli.date)
        .await
        .map_err(|e| anyhow::anyhow!("Pipeline run failed: {e}"))?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&state)?
    } else {
        serde_json::to_string(&state)?
    };
    println!("{output}");

    Ok(())
}
