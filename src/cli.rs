//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    timeframe_value, validate_backtest_config, validate_strategy_config,
};
use crate::domain::engine::{prepare_timeframes, run_backtest};
use crate::domain::error::BacktestError;
use crate::domain::metrics::Metrics;
use crate::domain::position::ExitReason;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, data_range};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "mtfcross",
    about = "Dual-timeframe EMA crossover backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Price CSV, overriding [backtest] csv_path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Report directory, overriding [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the range of a price file
    Info {
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Settings outside the strategy record that steer a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub csv_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub symbol: Option<String>,
    pub risk_free_rate: f64,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, data.as_deref())
            } else {
                run_backtest_command(&config, data.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { data, config } => run_info(data.as_deref(), config.as_deref()),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    FileConfigAdapter::from_file(path).map_err(|e| BacktestError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn period(adapter: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, BacktestError> {
    let value = adapter.get_int("strategy", key, default as i64);
    usize::try_from(value)
        .map_err(|_| BacktestError::invalid("strategy", key, format!("{key} must be at least 1")))
}

/// Read the strategy record, applying defaults for absent keys.
///
/// Field-level checks run first, then the cross-field checks of
/// [`BacktestConfig::validate`].
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    validate_backtest_config(adapter)?;
    validate_strategy_config(adapter)?;

    let defaults = BacktestConfig::default();
    let config = BacktestConfig {
        lower_tf: timeframe_value(adapter, "lower_tf", defaults.lower_tf)?,
        higher_tf: timeframe_value(adapter, "higher_tf", defaults.higher_tf)?,
        lower_ema_short: period(adapter, "lower_ema_short", defaults.lower_ema_short)?,
        lower_ema_long: period(adapter, "lower_ema_long", defaults.lower_ema_long)?,
        higher_ema_short: period(adapter, "higher_ema_short", defaults.higher_ema_short)?,
        higher_ema_long: period(adapter, "higher_ema_long", defaults.higher_ema_long)?,
        risk_percent: adapter.get_double("strategy", "risk_percent", defaults.risk_percent),
        risk_reward_ratio: adapter.get_double(
            "strategy",
            "risk_reward_ratio",
            defaults.risk_reward_ratio,
        ),
        initial_capital: adapter.get_double("backtest", "initial_capital", defaults.initial_capital),
        lot_size: adapter.get_double("backtest", "lot_size", defaults.lot_size),
    };
    config.validate()?;
    Ok(config)
}

/// Resolve the data path and report settings. `data_override` wins over
/// `[backtest] csv_path`, `output_override` over `[report] output_dir`.
pub fn build_run_settings(
    adapter: &dyn ConfigPort,
    data_override: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<RunSettings, BacktestError> {
    let csv_path = match data_override {
        Some(p) => p.to_path_buf(),
        None => adapter
            .get_string("backtest", "csv_path")
            .map(PathBuf::from)
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: "backtest".into(),
                key: "csv_path".into(),
            })?,
    };

    let output_dir = output_override
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "output_dir").map(PathBuf::from));

    Ok(RunSettings {
        csv_path,
        output_dir,
        symbol: adapter
            .get_string("report", "symbol")
            .filter(|s| !s.trim().is_empty()),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.0),
    })
}

/// Load, prepare, simulate, report. Returns the run result and its metrics.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    config: &BacktestConfig,
    settings: &RunSettings,
) -> Result<(BacktestResult, Metrics), BacktestError> {
    eprintln!("Loading data from {}", settings.csv_path.display());
    let raw = data_port.fetch_bars()?;
    eprintln!("  Loaded {} rows", raw.len());

    let (lower, higher) = prepare_timeframes(&raw, config)?;
    eprintln!(
        "  Resampled to {} {} bars and {} {} bars",
        lower.bar_count(),
        lower.timeframe,
        higher.bar_count(),
        higher.timeframe
    );

    eprintln!(
        "Running backtest: {} {} / {} {}",
        lower.timeframe,
        lower.ema,
        higher.timeframe,
        higher.ema
    );
    let result = run_backtest(&lower, &higher, config)?;

    let metrics = Metrics::compute(&result, config.lower_tf, settings.risk_free_rate);
    print_summary(&metrics, config, settings.symbol.as_deref());

    if let Some(dir) = &settings.output_dir {
        report_port.write(&result, &metrics, dir)?;
        eprintln!("\nReport written to: {}", dir.display());
    }

    Ok((result, metrics))
}

fn run_backtest_command(
    config_path: &Path,
    data_override: Option<&Path>,
    output_override: Option<&Path>,
) -> Result<(), BacktestError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = build_backtest_config(&adapter)?;
    let settings = build_run_settings(&adapter, data_override, output_override)?;
    info!(?config, "configuration loaded");

    let data_port = CsvAdapter::new(settings.csv_path.clone());
    run_backtest_pipeline(&data_port, &CsvReportAdapter, &config, &settings)?;
    Ok(())
}

pub fn run_dry_run(config_path: &Path, data_override: Option<&Path>) -> Result<(), BacktestError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = build_backtest_config(&adapter)?;
    let settings = build_run_settings(&adapter, data_override, None)?;
    eprintln!("Config validated successfully");

    print_config(&config, &settings);
    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), BacktestError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let config = build_backtest_config(&adapter)?;
    eprintln!(
        "  lower: {} {}, higher: {} {}",
        config.lower_tf,
        config.lower_ema(),
        config.higher_tf,
        config.higher_ema()
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

/// What `info` reports about a price file.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSummary {
    pub range: Option<(NaiveDateTime, NaiveDateTime, usize)>,
    /// Lower and higher bar counts, when a config was supplied.
    pub resampled: Option<(usize, usize)>,
}

/// Load the rows once, then derive the range and, given a config, the
/// resampled bar counts.
pub fn describe_data(
    data_port: &dyn DataPort,
    config: Option<&BacktestConfig>,
) -> Result<DataSummary, BacktestError> {
    let raw = data_port.fetch_bars()?;
    let resampled = match config {
        Some(config) if !raw.is_empty() => {
            let (lower, higher) = prepare_timeframes(&raw, config)?;
            Some((lower.bar_count(), higher.bar_count()))
        }
        _ => None,
    };
    Ok(DataSummary {
        range: data_range(&raw),
        resampled,
    })
}

pub fn run_info(data: Option<&Path>, config_path: Option<&Path>) -> Result<(), BacktestError> {
    let adapter = config_path.map(load_config).transpose()?;

    let csv_path = match (data, &adapter) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(a)) => build_run_settings(a, None, None)?.csv_path,
        (None, None) => {
            return Err(BacktestError::ConfigMissing {
                section: "backtest".into(),
                key: "csv_path".into(),
            });
        }
    };
    let config = adapter
        .as_ref()
        .map(|a| build_backtest_config(a))
        .transpose()?;

    let summary = describe_data(&CsvAdapter::new(csv_path.clone()), config.as_ref())?;
    match summary.range {
        Some((first, last, count)) => {
            println!("{}: {} rows, {} to {}", csv_path.display(), count, first, last)
        }
        None => eprintln!("{}: no data found", csv_path.display()),
    }
    if let (Some(config), Some((lower, higher))) = (&config, summary.resampled) {
        println!("  {}: {} bars", config.lower_tf, lower);
        println!("  {}: {} bars", config.higher_tf, higher);
    }
    Ok(())
}

fn print_config(config: &BacktestConfig, settings: &RunSettings) {
    eprintln!("\nData:");
    eprintln!("  csv_path:          {}", settings.csv_path.display());
    if let Some(dir) = &settings.output_dir {
        eprintln!("  output_dir:        {}", dir.display());
    }
    eprintln!("\nTimeframes:");
    eprintln!("  lower:             {} {}", config.lower_tf, config.lower_ema());
    eprintln!("  higher:            {} {}", config.higher_tf, config.higher_ema());
    eprintln!("\nRisk:");
    eprintln!("  risk_percent:      {}", config.risk_percent);
    eprintln!("  risk_reward_ratio: {}", config.risk_reward_ratio);
    eprintln!("  lot_size:          {}", config.lot_size);
    eprintln!("  initial_capital:   {}", config.initial_capital);
}

fn print_summary(m: &Metrics, config: &BacktestConfig, symbol: Option<&str>) {
    match symbol {
        Some(s) => println!("\n=== {} {}/{} Results ===", s, config.lower_tf, config.higher_tf),
        None => println!("\n=== {}/{} Results ===", config.lower_tf, config.higher_tf),
    }
    println!("Initial Capital:   {:.2}", m.initial_capital);
    println!("Final Capital:     {:.2}", m.final_capital);
    println!("Total Return:      {:.2}%", m.total_return * 100.0);
    println!("Annualized:        {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe Ratio:      {:.2}", m.sharpe_ratio);
    println!("Sortino Ratio:     {:.2}", m.sortino_ratio);
    println!("Max Drawdown:      -{:.2}%", m.max_drawdown * 100.0);
    println!("Time in Market:    {:.1}%", m.time_in_market * 100.0);

    println!("\n=== Trades ===");
    println!(
        "Total Trades:      {} ({} long, {} short)",
        m.total_trades, m.long_trades, m.short_trades
    );
    println!("Signals:           {}", m.total_signals);
    println!(
        "Won / Lost / Even: {} / {} / {}",
        m.trades_won, m.trades_lost, m.trades_breakeven
    );
    println!("Win Rate:          {:.1}%", m.win_rate * 100.0);
    println!("Total P&L:         {:.2}", m.total_pnl);
    println!("Average P&L:       {:.2}", m.avg_pnl);
    println!(
        "Winners / Losers:  +{:.2} ({:.2}%) / -{:.2} ({:.2}%)",
        m.gross_profit,
        m.winners_return * 100.0,
        m.gross_loss,
        m.losers_return * 100.0
    );
    println!("Profit Factor:     {:.2}", m.profit_factor);
    println!("Average Win:       {:.2}", m.avg_win);
    println!("Average Loss:      {:.2}", m.avg_loss);
    println!("Win/Loss Ratio:    {:.2}", m.win_loss_ratio);
    println!("Largest Win:       {:.2}", m.largest_win);
    println!("Largest Loss:      {:.2}", m.largest_loss);
    println!(
        "Streaks:           {} wins, {} losses",
        m.longest_win_streak, m.longest_loss_streak
    );
    println!("Avg Duration:      {} min", m.avg_trade_duration.num_minutes());

    println!("\n=== Exit Reasons ===");
    for reason in [
        ExitReason::StopLoss,
        ExitReason::TakeProfit,
        ExitReason::TrendFlip,
        ExitReason::EndOfData,
    ] {
        println!("  {:<12} {}", reason.to_string(), m.exit_count(reason));
    }
}
