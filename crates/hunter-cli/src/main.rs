//! ai-hunter: stock dashboard with AI investor-persona verdicts
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//!
//! ai-hunter analyze NVDA
//! ai-hunter analyze TSLA -p cathie -p jim --export tsla.csv
//! ai-hunter chat AAPL
//! ai-hunter overview
//! ```

mod commands;
mod dashboard;
mod repl;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hunter_analyst::{Analysis, Analyst, AnalystConfig, MissingKeyProvider, Persona, Report};
use hunter_llm::providers::OpenAIProvider;
use hunter_llm::{LLMError, LLMProvider};
use hunter_market::{MarketConfig, MarketService, StockSnapshot, Ticker};
use hunter_utils::{AppInfo, LogFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ai-hunter", version)]
#[command(about = "Stock dashboard with AI investor-persona verdicts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Log JSON lines to stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Snapshot cache lifetime in seconds
    #[arg(long, global = true, value_name = "SECS")]
    cache_ttl: Option<u64>,

    /// Alpha Vantage key; enables the keyed fallback tier
    #[arg(long, global = true, env = "ALPHA_VANTAGE_API_KEY", hide_env_values = true)]
    alpha_vantage_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dashboard and persona verdicts for one ticker
    Analyze {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the snapshot and verdicts as JSON instead of the dashboard
        #[arg(long)]
        json: bool,
    },
    /// Analyze, then ask follow-up questions
    Chat {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Market banner only
    Overview,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Ticker symbol, e.g. NVDA
    ticker: String,

    /// Persona to consult, repeatable (warren, cathie, jim)
    #[arg(short, long = "persona", value_name = "PERSONA")]
    personas: Vec<Persona>,

    /// Save the verdicts as CSV
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Fail instead of falling back to synthetic data
    #[arg(long)]
    no_mock: bool,

    /// Chat-completion model
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,
}

/// `--json` output
#[derive(Serialize)]
struct AnalysisPayload<'a> {
    snapshot: &'a StockSnapshot,
    analyses: &'a [Analysis],
}

fn market_config(global: &GlobalArgs, no_mock: bool) -> Result<MarketConfig> {
    let mut builder = MarketConfig::builder();
    if let Some(secs) = global.cache_ttl {
        builder = builder.cache_ttl(Duration::from_secs(secs));
    }
    if let Some(key) = &global.alpha_vantage_key {
        builder = builder.alpha_vantage_api_key(key.clone());
    }
    if no_mock {
        builder = builder.mock_fallback(false);
    }
    Ok(builder.with_env().build()?)
}

/// OpenAI from the environment, or the key-less stand-in
fn llm_provider() -> Result<Arc<dyn LLMProvider>> {
    match OpenAIProvider::from_env() {
        Ok(provider) => Ok(Arc::new(provider)),
        Err(LLMError::MissingApiKey) => {
            warn!("OPENAI_API_KEY is not set, verdicts will be skipped");
            Ok(Arc::new(MissingKeyProvider))
        }
        Err(e) => Err(e.into()),
    }
}

fn build_analyst(target: &TargetArgs) -> Result<Analyst> {
    let mut config = AnalystConfig::from_env();
    if let Some(model) = &target.model {
        config = config.with_model(model.clone());
    }
    if !target.personas.is_empty() {
        config = config.with_personas(target.personas.iter().copied());
    }
    Ok(Analyst::new(llm_provider()?, config)?)
}

/// Snapshot for the ticker, or the not-found box on stderr
async fn load_snapshot(market: &MarketService, input: &str, banner: bool) -> Option<StockSnapshot> {
    let ticker = match Ticker::parse(input) {
        Ok(ticker) => ticker,
        Err(e) => {
            eprintln!("{}", dashboard::render_not_found(&input.trim().to_uppercase(), &e.to_string()));
            return None;
        }
    };

    let snapshot = if banner {
        let (overview, snapshot) = tokio::join!(market.overview(), market.snapshot(&ticker));
        println!("{}", dashboard::render_overview(&overview));
        snapshot
    } else {
        market.snapshot(&ticker).await
    };

    match snapshot {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(symbol = %ticker, error = %e, "Snapshot unavailable");
            eprintln!("{}", dashboard::render_not_found(ticker.as_str(), &e.to_string()));
            None
        }
    }
}

fn export(snapshot: &StockSnapshot, analyses: &[Analysis], path: &Path) -> Result<()> {
    Report::from_analyses(&snapshot.ticker, analyses).save(path)?;
    println!("📥 Report saved to {}", path.display());
    Ok(())
}

/// Dashboard, verdict cards and optional export
async fn dashboard_run(
    market: &MarketService,
    analyst: &Analyst,
    target: &TargetArgs,
) -> Result<Option<(StockSnapshot, Vec<Analysis>)>> {
    let Some(snapshot) = load_snapshot(market, &target.ticker, true).await else {
        return Ok(None);
    };
    println!("{}", dashboard::render_snapshot(&snapshot));

    eprintln!("🧠 Reasoning...");
    let analyses = analyst.analyze_all(&snapshot).await;
    println!("{}", dashboard::render_analyses(&analyses));

    if let Some(path) = &target.export {
        export(&snapshot, &analyses, path)?;
    }
    Ok(Some((snapshot, analyses)))
}

async fn analyze(global: &GlobalArgs, target: &TargetArgs, json: bool) -> Result<ExitCode> {
    let market = MarketService::new(market_config(global, target.no_mock)?)?;
    let analyst = build_analyst(target)?;

    if !json {
        let outcome = dashboard_run(&market, &analyst, target).await?;
        return Ok(if outcome.is_some() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let Some(snapshot) = load_snapshot(&market, &target.ticker, false).await else {
        return Ok(ExitCode::FAILURE);
    };
    let analyses = analyst.analyze_all(&snapshot).await;
    if let Some(path) = &target.export {
        Report::from_analyses(&snapshot.ticker, &analyses).save(path)?;
    }

    let payload = AnalysisPayload {
        snapshot: &snapshot,
        analyses: &analyses,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::SUCCESS)
}

async fn chat(global: &GlobalArgs, target: &TargetArgs) -> Result<ExitCode> {
    let market = MarketService::new(market_config(global, target.no_mock)?)?;
    let analyst = build_analyst(target)?;

    let Some((snapshot, analyses)) = dashboard_run(&market, &analyst, target).await? else {
        return Ok(ExitCode::FAILURE);
    };

    repl::ChatRepl::new(&market, &analyst, snapshot, analyses)?
        .run()
        .await?;
    Ok(ExitCode::SUCCESS)
}

async fn overview(global: &GlobalArgs) -> Result<ExitCode> {
    let market = MarketService::new(market_config(global, false)?)?;
    let overview = market.overview().await;
    println!("{}", dashboard::render_overview(&overview));

    Ok(if overview.available() == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli { command, global } = cli;

    match command {
        Command::Analyze { target, json } => analyze(&global, &target, json).await,
        Command::Chat { target } => chat(&global, &target).await,
        Command::Overview => overview(&global).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before parsing, so .env values reach env-backed flags
    hunter_utils::load_dotenv();

    let cli = Cli::parse();
    hunter_utils::init_tracing(if cli.global.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let app = AppInfo::default();
    info!(app = %app.app_name, version = %app.version, "Starting");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
