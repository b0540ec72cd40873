mod analytics;
mod config;
mod engine;
mod exchange;
mod types;

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use analytics::SpikeFilter;
use crate::config::{load_config, ConsoleConfig};
use engine::{AbortSignal, ActionReconciler, EngineAction, PanicCommand};
use exchange::{DashboardClient, EngineApi};
use types::BalanceSample;

#[derive(Parser)]
#[command(name = "gridbot-console")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Control a remote grid trading bot and inspect its balance history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "gridbot.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the engine state reported by the bot
    Status,
    /// Start the trading engine and wait until it is running
    Start,
    /// Stop the trading engine and wait until it is stopped
    Stop,
    /// Pause trading and wait until the engine reports paused
    Pause,
    /// Resume a paused engine and wait until it is running
    Resume,
    /// Cancel every open order on the exchange
    CancelAll {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Market-sell every open position
    SellAll {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Fetch the balance history with transient spikes removed
    History {
        /// Use the current session instead of the global history
        #[arg(short, long)]
        session: bool,
        /// Skip spike filtering
        #[arg(long)]
        raw: bool,
        /// Print the samples as JSON
        #[arg(long)]
        json: bool,
        /// Exchange id (defaults to the bot's active exchange)
        #[arg(short, long)]
        exchange: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Status => show_status(&config).await?,
        Commands::Start => run_action(&config, EngineAction::Start).await?,
        Commands::Stop => run_action(&config, EngineAction::Stop).await?,
        Commands::Pause => run_action(&config, EngineAction::Pause).await?,
        Commands::Resume => run_action(&config, EngineAction::Resume).await?,
        Commands::CancelAll { yes } => send_panic(&config, PanicCommand::CancelAll, yes).await?,
        Commands::SellAll { yes } => send_panic(&config, PanicCommand::SellAll, yes).await?,
        Commands::History { session, raw, json, exchange } => {
            show_history(&config, session, raw, json, exchange).await?;
        }
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

async fn show_status(config: &ConsoleConfig) -> Result<()> {
    let client = DashboardClient::new(&config.api)?;
    let snapshot = client.fetch_status().await?;

    println!("\n=== Engine Status ===");
    println!("Bot: {}", client.base_url());
    println!("State: {}", snapshot.status);
    if let Some(service) = snapshot.extra.get("service").and_then(|v| v.as_str()) {
        println!("Service: {}", service);
    }

    Ok(())
}

async fn run_action(config: &ConsoleConfig, action: EngineAction) -> Result<()> {
    let client = DashboardClient::new(&config.api)?;
    let reconciler = ActionReconciler::new(client, config.reconciler);

    let abort = AbortSignal::new();
    let trigger = abort.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for the engine");
            trigger.abort();
        }
    });

    info!(
        "{} (waiting up to {}s for {})",
        action.label(),
        reconciler.settings().worst_case().as_secs_f64(),
        action.target()
    );
    let outcome = reconciler.reconcile_with_abort(action, &abort).await;
    ctrl_c.abort();

    println!("{}", outcome);
    if outcome.is_converged() {
        Ok(())
    } else {
        Err(anyhow!("{} did not complete", action))
    }
}

async fn send_panic(config: &ConsoleConfig, command: PanicCommand, confirmed: bool) -> Result<()> {
    if !confirmed {
        return Err(anyhow!(
            "refusing to send {} without --yes",
            command.endpoint()
        ));
    }

    let client = DashboardClient::new(&config.api)?;
    let reconciler = ActionReconciler::new(client, config.reconciler);
    let ack = reconciler
        .send_once(command)
        .await
        .map_err(|detail| anyhow!("{} failed: {}", command.label(), detail))?;

    println!("{}", ack.message.unwrap_or_else(|| "Command accepted".to_string()));
    Ok(())
}

async fn show_history(
    config: &ConsoleConfig,
    session: bool,
    raw: bool,
    json: bool,
    exchange: Option<String>,
) -> Result<()> {
    let client = DashboardClient::new(&config.api)?;
    let history = client
        .fetch_balance_history(exchange.or_else(|| config.api.exchange.clone()))
        .await?;
    let series = if session { history.session } else { history.global };

    let filter = SpikeFilter::new(config.spike_filter);
    let samples: Vec<BalanceSample> = if raw {
        series
    } else {
        let (filtered, summary) = filter.filter_with_summary(&series);
        info!(
            "Balance history: {} samples, {} spikes removed",
            summary.input_len, summary.removed
        );
        filtered
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&samples)?);
        return Ok(());
    }

    println!("\n=== Balance History ({}) ===", if session { "session" } else { "global" });
    if samples.is_empty() {
        println!("No samples");
        return Ok(());
    }
    for sample in &samples {
        println!("{}  {:>12.2}", format_timestamp(sample.timestamp), sample.balance);
    }

    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        let change = last.balance - first.balance;
        let change_pct = if first.balance.abs() > f64::EPSILON {
            change / first.balance * 100.0
        } else {
            0.0
        };
        println!("\nSamples: {}", samples.len());
        println!("Change: {:+.2} ({:+.2}%)", change, change_pct);
    }

    Ok(())
}

fn show_config(config: &ConsoleConfig) -> Result<()> {
    let mut redacted = config.clone();
    if redacted.api.token.is_some() {
        redacted.api.token = Some("********".to_string());
    }
    println!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
