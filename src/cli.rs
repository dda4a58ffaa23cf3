//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestResult, MarketData, run_backtest};
use crate::domain::config::BacktestConfig;
use crate::domain::config_validation::validate_config;
use crate::domain::error::SwingtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::monte_carlo::run_monte_carlo;
use crate::domain::sweep::{SweepGrid, describe, run_sweep};
use crate::domain::universe::load_market_data;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "swingtrader",
    about = "Momentum pullback swing-trading backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest and write CSV reports
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of per-instrument CSV files (overrides [data] dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Run the [sweep] parameter grid
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Stop scheduling new combinations after this many seconds
        #[arg(long)]
        time_budget: Option<u64>,
    },
    /// Backtest, then shuffle the trade sequence
    MonteCarlo {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Check a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List instruments available in a data directory
    ListSymbols {
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
        } => run_backtest_command(&config, data_dir, &output),
        Command::Sweep {
            config,
            data_dir,
            output,
            time_budget,
        } => run_sweep_command(&config, data_dir, &output, time_budget.map(Duration::from_secs)),
        Command::MonteCarlo {
            config,
            data_dir,
            output,
        } => run_monte_carlo_command(&config, data_dir, &output),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir } => run_list_symbols(data_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Parse the file and build a validated configuration.
pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, BacktestConfig), SwingtraderError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    let config = BacktestConfig::from_port(&adapter)?;
    validate_config(&config)?;
    Ok((adapter, config))
}

fn resolve_data_dir(
    flag: Option<PathBuf>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, SwingtraderError> {
    flag.or_else(|| adapter.get_string("data", "dir").map(PathBuf::from))
        .ok_or_else(|| SwingtraderError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })
}

fn report_adapter(adapter: &dyn ConfigPort) -> CsvReportAdapter {
    if adapter.get_bool("report", "signal_log", true) {
        CsvReportAdapter::new()
    } else {
        CsvReportAdapter::new().without_signal_log()
    }
}

fn load_data(
    data_dir: PathBuf,
    config: &BacktestConfig,
) -> Result<MarketData, SwingtraderError> {
    eprintln!("Loading market data from {}", data_dir.display());
    let port = CsvAdapter::new(data_dir);
    let data = load_market_data(&port, config)?;
    eprintln!(
        "  {}: {} bars, {} instruments",
        config.regime.benchmark,
        data.benchmark.len(),
        data.instruments.len()
    );
    Ok(data)
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    eprintln!("\n=== Results ===");
    eprintln!("Final Equity:     {:.2}", result.portfolio.final_equity());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        metrics.annualized_return * 100.0
    );
    if let Some(bench) = metrics.benchmark_return {
        eprintln!("Benchmark:        {:.2}%", bench * 100.0);
    }
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Expectancy:       {:.2}", metrics.expectancy);
    eprintln!("Exposure:         {:.1}%", metrics.exposure * 100.0);
    eprintln!(
        "Exits:            {} stop, {} target, {} time",
        metrics.exit_reasons.stopped_out,
        metrics.exit_reasons.target_hit,
        metrics.exit_reasons.time_stopped
    );
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    output: &Path,
) -> Result<(), SwingtraderError> {
    let (adapter, config) = load_config(config_path)?;
    let data = load_data(resolve_data_dir(data_dir, &adapter)?, &config)?;

    let result = run_backtest(&data, &config)?;
    let metrics = Metrics::from_result(&result, config.simulation.risk_free_rate);
    print_summary(&result, &metrics);

    report_adapter(&adapter).write_backtest(&result, &metrics, output)?;
    eprintln!("\nReports written to: {}", output.display());
    Ok(())
}

fn run_sweep_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    output: &Path,
    time_budget: Option<Duration>,
) -> Result<(), SwingtraderError> {
    let (adapter, config) = load_config(config_path)?;
    let grid = SweepGrid::from_port(&adapter)?;
    if grid.is_empty() {
        return Err(SwingtraderError::ConfigMissing {
            section: "sweep".into(),
            key: "<parameter>".into(),
        });
    }
    let data = load_data(resolve_data_dir(data_dir, &adapter)?, &config)?;

    let outcome = run_sweep(&data, &config, &grid, time_budget)?;

    eprintln!(
        "\n=== Sweep: {} run, {} invalid, {} not scheduled ===",
        outcome.rows.len(),
        outcome.invalid,
        outcome.unscheduled
    );
    let best = outcome
        .rows
        .iter()
        .max_by(|a, b| a.summary.sharpe_ratio.total_cmp(&b.summary.sharpe_ratio));
    if let Some(best) = best {
        eprintln!(
            "Best Sharpe:      {:.2} ({})",
            best.summary.sharpe_ratio,
            describe(&best.params)
        );
    }

    report_adapter(&adapter).write_sweep(&outcome, output)?;
    eprintln!("\nSweep written to: {}", output.display());
    Ok(())
}

fn run_monte_carlo_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    output: &Path,
) -> Result<(), SwingtraderError> {
    let (adapter, config) = load_config(config_path)?;
    let data = load_data(resolve_data_dir(data_dir, &adapter)?, &config)?;

    let result = run_backtest(&data, &config)?;
    let trades = &result.portfolio.closed_trades;
    let Some(summary) = run_monte_carlo(
        trades,
        config.simulation.initial_capital,
        &config.monte_carlo,
    ) else {
        eprintln!("No closed trades; nothing to shuffle");
        return Ok(());
    };

    eprintln!(
        "\n=== Monte Carlo: {} iterations over {} trades ===",
        summary.iterations, summary.trade_count
    );
    eprintln!(
        "Final Value:      median {:.0}, 5th {:.0}, 95th {:.0}",
        summary.median_final_value, summary.p5_final_value, summary.p95_final_value
    );
    eprintln!(
        "Max Drawdown:     median {:.1}%, 95th {:.1}%, worst {:.1}%",
        summary.median_max_drawdown * 100.0,
        summary.p95_max_drawdown * 100.0,
        summary.worst_max_drawdown * 100.0
    );
    eprintln!(
        "P(DD > {:.0}%):     {:.1}%",
        summary.drawdown_threshold * 100.0,
        summary.prob_drawdown_exceeds * 100.0
    );
    eprintln!("P(loss):          {:.1}%", summary.prob_loss * 100.0);

    report_adapter(&adapter).write_monte_carlo(&summary, output)?;
    eprintln!("\nMonte Carlo written to: {}", output.display());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SwingtraderError> {
    let (adapter, config) = load_config(config_path)?;
    let grid = SweepGrid::from_port(&adapter)?;

    eprintln!("Benchmark:        {}", config.regime.benchmark);
    if config.universe.codes.is_empty() {
        eprintln!("Universe:         all instruments in data directory");
    } else {
        eprintln!("Universe:         {} codes", config.universe.codes.len());
    }
    eprintln!(
        "Period:           {} to {} (data from {})",
        config.simulation.start_date, config.simulation.end_date, config.simulation.data_start
    );
    if !grid.is_empty() {
        eprintln!("Sweep:            {} combinations", grid.len());
    }
    eprintln!("Configuration is valid");
    Ok(())
}

fn run_list_symbols(data_dir: PathBuf) -> Result<(), SwingtraderError> {
    let port = CsvAdapter::new(data_dir);
    let symbols = port.list_symbols()?;
    let sectors = port.sector_map()?;

    if symbols.is_empty() {
        eprintln!("No symbols found");
        return Ok(());
    }
    for symbol in &symbols {
        match sectors.get(symbol) {
            Some(sector) => println!("{symbol}\t{sector}"),
            None => println!("{symbol}"),
        }
    }
    eprintln!("{} symbols found", symbols.len());
    Ok(())
}
