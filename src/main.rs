//! Perp Pilot
//!
//! Unattended manager for leveraged perpetual positions: liquidation-aware
//! risk control, fee-aware take profit, volatility-scaled stop loss and
//! trend-gated entries.

mod api;
mod bot;
mod errors;
mod execution;
mod exit;
mod models;
mod risk;
mod trading;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{EmaTrendOracle, HyperliquidInfoClient, MarketGateway, MAINNET_URL};
use crate::bot::Bot;
use crate::execution::{DryRunExecutor, PaperVenue};
use crate::exit::ExitEconomics;
use crate::risk::{estimate_liquidation_price, safety_margin, RiskClassifier};
use crate::trading::EngineConfig;

/// Leveraged position manager CLI.
#[derive(Parser)]
#[command(name = "perppilot")]
#[command(about = "Manage leveraged perp positions with liquidation-aware exits", long_about = None)]
struct Cli {
    /// JSON configuration file (missing fields use defaults)
    #[arg(short, long, env = "PERPPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Seed for all random draws, for reproducible runs
    #[arg(long, env = "PERPPILOT_SEED")]
    seed: Option<u64>,

    /// Info API base URL
    #[arg(long, env = "HL_API_URL", default_value = MAINNET_URL)]
    api_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the account's positions (actions are logged, not sent)
    Run {
        /// Account address whose positions are managed
        #[arg(short, long, env = "HL_ACCOUNT_ADDRESS")]
        account: String,
    },

    /// Trade a simulated account against live mid prices
    Paper {
        /// Initial capital for simulation (overrides config)
        #[arg(short, long)]
        capital: Option<f64>,
    },

    /// One-shot risk report of the account's open positions
    Risk {
        /// Account address to inspect
        #[arg(short, long, env = "HL_ACCOUNT_ADDRESS")]
        account: String,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => {
            let config = EngineConfig::default();
            config.validate()?;
            config
        }
    };

    match cli.command {
        Commands::Run { account } => {
            let client = Arc::new(HyperliquidInfoClient::with_base_url(cli.api_url, Some(account))?);
            let oracle = Arc::new(EmaTrendOracle::new(client.clone(), config.oracle.clone()));

            info!(
                account = ?client.user(),
                instruments = ?config.selection.instruments,
                "Starting in dry-run mode"
            );
            println!("\n=== Dry Run ===");
            println!("Actions are logged, never sent. Press Ctrl+C to stop.\n");

            let mut bot = Bot::new(config, client, oracle, Arc::new(DryRunExecutor), cli.seed);
            bot.run().await?;
            println!("{}", bot.stats());
        }

        Commands::Paper { capital } => {
            if let Some(capital) = capital {
                config.paper.initial_capital =
                    Decimal::try_from(capital).context("Invalid capital")?;
                config.validate()?;
            }

            let client = Arc::new(HyperliquidInfoClient::with_base_url(cli.api_url, None)?);
            let oracle = Arc::new(EmaTrendOracle::new(client.clone(), config.oracle.clone()));
            let venue = Arc::new(PaperVenue::new(
                client,
                config.paper.clone(),
                config.risk.liquidation_buffer,
            ));

            println!("\n=== Paper Trading Mode ===");
            println!("Capital: ${}", config.paper.initial_capital);
            println!("Slippage: {}%", config.paper.slippage * Decimal::from(100));
            println!("Fee: {}%", config.paper.fee_rate * Decimal::from(100));
            println!("Instruments: {}", config.selection.instruments.join(", "));
            println!("\nThis is SIMULATED trading - no real money involved.");
            println!("Press Ctrl+C to stop.\n");

            let mut bot = Bot::new(config, venue.clone(), oracle, venue.clone(), cli.seed);
            bot.run().await?;

            println!("{}", bot.stats());
            println!("{}", venue.stats().await);

            let trades = venue.closed_trades().await;
            if !trades.is_empty() {
                println!(
                    "{:<8} {:<6} {:>12} {:>5} {:>12} {:>12} {:>10} {:>8}",
                    "COIN", "SIDE", "SIZE", "LEV", "ENTRY", "EXIT", "PNL", "HELD"
                );
                println!("{}", "-".repeat(80));
                for trade in &trades {
                    let held = trade
                        .opened_at
                        .map(|opened| format!("{}m", (trade.closed_at - opened).num_minutes()))
                        .unwrap_or_else(|| "n/a".to_string());
                    println!(
                        "{:<8} {:<6} {:>12} {:>5} {:>12} {:>12} {:>10} {:>8}",
                        trade.instrument,
                        trade.side.as_str(),
                        trade.size,
                        format!("{}x", trade.leverage),
                        trade.entry_price.round_dp(4),
                        trade.exit_price.round_dp(4),
                        trade.pnl.round_dp(2),
                        held
                    );
                }
            }
        }

        Commands::Risk { account } => {
            let client = HyperliquidInfoClient::with_base_url(cli.api_url, Some(account))?;
            let positions = client.positions().await?;

            if positions.is_empty() {
                println!("No open positions.");
                return Ok(());
            }

            let classifier = RiskClassifier::new(&config.risk);
            let economics = ExitEconomics::new(&config.exit);
            let now = Utc::now();

            println!(
                "\n{:<8} {:<6} {:>12} {:>5} {:>12} {:>12} {:>12} {:>8} {:<10} {:>9}",
                "COIN", "SIDE", "SIZE", "LEV", "ENTRY", "MARK", "LIQ", "MARGIN", "TIER", "NET"
            );
            println!("{}", "-".repeat(104));

            for position in &positions {
                let price = match client.mid_price(&position.instrument).await {
                    Ok(Some(p)) => p,
                    Ok(None) => {
                        warn!(instrument = %position.instrument, "No mid price");
                        continue;
                    }
                    Err(e) => {
                        warn!(instrument = %position.instrument, error = %e, "Failed to fetch mid price");
                        continue;
                    }
                };

                let liquidation = position.liquidation_price.or_else(|| {
                    estimate_liquidation_price(
                        price,
                        position.side,
                        position.leverage,
                        config.risk.liquidation_buffer,
                    )
                });
                let margin = safety_margin(price, position.side, liquidation);
                let assessment = classifier.assess(margin);
                let net = economics
                    .evaluate(position, price, now)
                    .map(|e| format!("{:.2}%", e.net_return * 100.0))
                    .unwrap_or_else(|| "n/a".to_string());

                println!(
                    "{:<8} {:<6} {:>12} {:>5} {:>12} {:>12} {:>12} {:>8} {:<10} {:>9}{}",
                    position.instrument,
                    position.side.as_str(),
                    position.size,
                    format!("{}x", position.leverage),
                    position.entry_price.round_dp(4),
                    price.round_dp(4),
                    liquidation
                        .map(|l| l.round_dp(4).to_string())
                        .unwrap_or_else(|| "n/a".to_string()),
                    margin
                        .map(|m| format!("{:.2}%", m))
                        .unwrap_or_else(|| "n/a".to_string()),
                    assessment.tier.as_str(),
                    net,
                    if assessment.force_close {
                        "  << AUTO-CLOSE"
                    } else if assessment.needs_attention {
                        "  <<"
                    } else {
                        ""
                    }
                );
            }
        }

        Commands::Config => {
            println!("\n=== Engine Configuration ===\n");
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
    }

    Ok(())
}
