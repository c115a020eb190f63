//! Impact Exec - Main Entry Point
//!
//! CLI for running execution simulations and spread diagnostics over
//! historical price data.

use anyhow::Result;
use clap::{Parser, Subcommand};
use impact_exec::config::Config;
use impact_exec::data::{align, CsvPriceLoader, PriceSeries};
use impact_exec::sim::{SimulationSession, Simulator};
use impact_exec::signal;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Impact Exec CLI
#[derive(Parser)]
#[command(name = "impact-exec")]
#[command(version, about = "Order-execution simulator with market-impact modeling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full execution simulation over two price series
    Simulate {
        /// Path to the asset price CSV (timestamp,price)
        #[arg(short, long)]
        asset: String,

        /// Path to the benchmark price CSV (timestamp,price)
        #[arg(short, long)]
        benchmark: String,

        /// Seed for the market maker's random draws
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Override the target quantity to acquire
        #[arg(short, long)]
        target: Option<f64>,

        /// Output directory for ledgers and result JSON
        #[arg(short, long)]
        output: Option<String>,

        /// Live-replay pacing: sleep this many milliseconds between steps
        #[arg(long)]
        replay_ms: Option<u64>,
    },

    /// Analyze the spread signal without running the simulation
    Signal {
        /// Path to the asset price CSV (timestamp,price)
        #[arg(short, long)]
        asset: String,

        /// Path to the benchmark price CSV (timestamp,price)
        #[arg(short, long)]
        benchmark: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            asset,
            benchmark,
            seed,
            target,
            output,
            replay_ms,
        } => {
            run_simulation(
                &asset,
                &benchmark,
                seed,
                target,
                output.as_deref(),
                replay_ms,
            )
            .await
        }
        Commands::Signal { asset, benchmark } => run_signal_report(&asset, &benchmark),
    }
}

/// Initialize logging with rolling file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "impact-exec.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("impact_exec=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_ansi(true)
        .init();

    Ok(())
}

fn load_inputs(asset_path: &str, benchmark_path: &str) -> Result<(PriceSeries, PriceSeries)> {
    info!("Loading asset series from: {}", asset_path);
    let asset = CsvPriceLoader::load(asset_path)?;
    if let Some((start, end)) = asset.available_range() {
        info!(
            "   {} points, {} to {}",
            asset.len(),
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        );
    }

    info!("Loading benchmark series from: {}", benchmark_path);
    let benchmark = CsvPriceLoader::load(benchmark_path)?;
    info!("   {} points", benchmark.len());

    Ok((asset, benchmark))
}

async fn run_simulation(
    asset_path: &str,
    benchmark_path: &str,
    seed: u64,
    target: Option<f64>,
    output_dir: Option<&str>,
    replay_ms: Option<u64>,
) -> Result<()> {
    let (asset, benchmark) = load_inputs(asset_path, benchmark_path)?;

    let mut config = Config::load()?;
    if let Some(target) = target {
        config.execution.target_shares = Decimal::from_f64(target)
            .ok_or_else(|| anyhow::anyhow!("Invalid target quantity: {target}"))?;
    }
    config.validate()?;

    info!(
        "Target: {} shares, seed: {}",
        config.execution.target_shares, seed
    );

    let result = match replay_ms {
        // Live-replay mode: drive the session step by step with wall-clock
        // spacing. The simulation core itself never sleeps.
        Some(ms) => {
            let pace = tokio::time::Duration::from_millis(ms);
            let mut session = SimulationSession::new(
                &config,
                &asset,
                &benchmark,
                StdRng::seed_from_u64(seed),
            )?;

            info!("Live replay: {} steps, {}ms apart", session.total_steps(), ms);
            while session.step_next().is_some() {
                tokio::time::sleep(pace).await;
            }
            session.finish()
        }
        None => Simulator::new(config).run(&asset, &benchmark, seed)?,
    };

    println!("\n{}", result.summary());

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;

        let executions_path = format!("{}/executions.csv", dir);
        result.executions_to_csv(&executions_path)?;
        info!("Execution ledger saved to: {}", executions_path);

        let mm_path = format!("{}/market_making.csv", dir);
        result.market_making_to_csv(&mm_path)?;
        info!("Market-making ledger saved to: {}", mm_path);

        let json_path = format!("{}/result.json", dir);
        result.to_json(&json_path)?;
        info!("Full result saved to: {}", json_path);
    }

    Ok(())
}

fn run_signal_report(asset_path: &str, benchmark_path: &str) -> Result<()> {
    let (asset, benchmark) = load_inputs(asset_path, benchmark_path)?;
    let config = Config::load()?;
    config.validate()?;

    let aligned = align(&asset, &benchmark)?;

    match signal::compute_cointegration(
        &aligned,
        config.signal.p_value_threshold,
        config.signal.min_observations,
    ) {
        Ok(test) => {
            println!(
                "Cointegration: {} (p = {:.4}, t = {:.3}, n = {})",
                if test.is_cointegrated { "YES" } else { "NO" },
                test.p_value,
                test.t_stat,
                test.observations
            );
        }
        Err(e) => warn!(error = %e, "cointegration test failed"),
    }

    let zscores = signal::compute_zscore(&aligned)?;
    let (min, max) = zscores.points().iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), point| (min.min(point.zscore), max.max(point.zscore)),
    );

    println!(
        "Z-score: min {:.3}, max {:.3} (spread mean {:.4}, std {:.4})",
        min,
        max,
        zscores.spread_mean(),
        zscores.spread_std_dev()
    );
    println!(
        "Buy-gate crossings (z <= {}): {} of {}",
        config.signal.zscore_buy_threshold,
        zscores.gate_crossings(config.signal.zscore_buy_threshold),
        zscores.len()
    );

    Ok(())
}
