//! Quanta CLI: signal generation, backtests, and reports.
//!
//! Commands:
//! - `signals`: sweep a parameter grid and write one signal file per combination
//! - `backtest`: run signal files through the simulator and update the results table
//! - `report`: filter and rank the results table for one symbol
//! - `init`: write a config file with the default settings

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use quanta_core::strategy::Strategy;
use quanta_runner::batch::{collect_signal_files, merge, run_signal_files};
use quanta_runner::config::RunnerConfig;
use quanta_runner::data_loader::DateRange;
use quanta_runner::param_space::ParamGrid;
use quanta_runner::report::{self, Condition, ExportFormat, Metric, ReportRequest, Selection};
use quanta_runner::results::{ExportOptions, NavFormat, ResultsStore};
use quanta_runner::runner::{generate_signal_files, SignalFileRun};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "quanta.toml";

#[derive(Parser)]
#[command(name = "quanta", about = "Quanta CLI: signal backtesting toolkit")]
struct Cli {
    /// Path to a TOML config file. Defaults to ./quanta.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when QUANTA_LOG is unset (e.g. info, quanta_runner=debug).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum NavOutput {
    Parquet,
    Csv,
    None,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate signal files for a symbol over a parameter grid.
    Signals {
        /// Symbol whose price file is read from the data directory.
        #[arg(long)]
        symbol: String,

        /// Strategy identifier: SMA_CROSS or RSI.
        #[arg(long)]
        strategy: String,

        /// Parameter grid, e.g. "short_period=5,10;long_period=20,50".
        /// Defaults to a small built-in sweep for the strategy.
        #[arg(long)]
        grid: Option<String>,

        /// First date to keep (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Last date to keep (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
    },
    /// Backtest signal files and append their performance to the results table.
    Backtest {
        /// A single signal file. Without it, every signal file under the
        /// signals directory is run.
        #[arg(long)]
        signal_file: Option<PathBuf>,

        /// Directory to scan instead of the configured signals directory.
        #[arg(long, conflicts_with = "signal_file")]
        signals_dir: Option<PathBuf>,

        /// Price symbol to use instead of the one in each file name.
        #[arg(long)]
        symbol: Option<String>,

        /// Override the starting cash.
        #[arg(long)]
        initial_cash: Option<f64>,

        /// Override the proportional fee rate.
        #[arg(long)]
        fee: Option<f64>,

        /// Override the proportional slippage rate.
        #[arg(long)]
        slippage: Option<f64>,

        /// Override the sizing policy: fixed=N or percent=p.
        #[arg(long)]
        position: Option<String>,

        /// Override the execution timing: signal_bar or next_bar.
        #[arg(long)]
        trade_time: Option<String>,

        /// NAV artifact format.
        #[arg(long, value_enum, default_value_t = NavOutput::Parquet)]
        nav: NavOutput,

        /// Skip the per-run performance CSV.
        #[arg(long, default_value_t = false)]
        no_perf: bool,

        /// Skip the per-run trade log CSV.
        #[arg(long, default_value_t = false)]
        no_trades: bool,

        /// Run files one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Print each performance record as a JSON line.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Filter and rank the results table for one symbol.
    Report {
        /// Ranking metric: total_return or max_drawdown.
        #[arg(long, default_value = "total_return")]
        metric: String,

        /// Keep the best N rows.
        #[arg(long, conflicts_with = "top_percent")]
        top_n: Option<usize>,

        /// Keep the best P percent of rows (at least one).
        #[arg(long)]
        top_percent: Option<f64>,

        /// Comma-separated filters, e.g. "total_return>=0.1,max_drawdown<=0.2".
        #[arg(long, default_value = "")]
        conditions: String,

        /// Output format: csv or html.
        #[arg(long, default_value = "csv")]
        format: String,

        /// Symbol to report on. Without it, the available symbols are listed.
        #[arg(long)]
        symbol: Option<String>,

        /// Results table to read. Defaults to the root performance_master.csv.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Write a config file with default settings.
    Init {
        /// Destination path.
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    if let Commands::Init { path, force } = &cli.command {
        return run_init(path, *force);
    }
    let runner = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Signals {
            symbol,
            strategy,
            grid,
            start,
            end,
        } => run_signals(&runner, &symbol, &strategy, grid.as_deref(), start, end),
        Commands::Backtest {
            signal_file,
            signals_dir,
            symbol,
            initial_cash,
            fee,
            slippage,
            position,
            trade_time,
            nav,
            no_perf,
            no_trades,
            sequential,
            json,
        } => {
            let mut runner = runner;
            let b = &mut runner.backtest;
            if let Some(v) = initial_cash {
                b.initial_cash = v;
            }
            if let Some(v) = fee {
                b.fee_rate = v;
            }
            if let Some(v) = slippage {
                b.slippage_rate = v;
            }
            if let Some(v) = position {
                b.position = v;
            }
            if let Some(v) = trade_time {
                b.trade_time = v;
            }
            let options = ExportOptions {
                performance: !no_perf,
                nav: match nav {
                    NavOutput::Parquet => Some(NavFormat::Parquet),
                    NavOutput::Csv => Some(NavFormat::Csv),
                    NavOutput::None => None,
                },
                trades: !no_trades,
            };
            run_backtest_cmd(
                &runner,
                signal_file,
                signals_dir,
                symbol.as_deref(),
                &options,
                !sequential,
                json,
            )
        }
        Commands::Report {
            metric,
            top_n,
            top_percent,
            conditions,
            format,
            symbol,
            summary,
        } => {
            let request = ReportRequest {
                metric: metric.parse::<Metric>()?,
                selection: Selection::from_options(top_n, top_percent)?,
                conditions: Condition::parse_list(&conditions)?,
                format: format.parse::<ExportFormat>()?,
                symbol,
            };
            run_report(&runner, summary, &request)
        }
        Commands::Init { .. } => Ok(()),
    }
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = std::env::var("QUANTA_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .with_context(|| format!("invalid log filter '{filter}'"))?;
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init(),
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG).exists() => PathBuf::from(DEFAULT_CONFIG),
        None => {
            tracing::debug!("no config file, using defaults");
            return Ok(RunnerConfig::default());
        }
    };
    let config = RunnerConfig::from_file(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn parse_date(raw: Option<String>, flag: &str) -> Result<Option<NaiveDate>> {
    raw.as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .with_context(|| format!("--{flag} must be YYYY-MM-DD"))
}

fn run_signals(
    runner: &RunnerConfig,
    symbol: &str,
    strategy: &str,
    grid: Option<&str>,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let strategy = strategy.trim().to_ascii_uppercase();
    let grid = match grid {
        Some(text) => text
            .parse::<ParamGrid>()
            .context("invalid --grid")?,
        None => ParamGrid::default_for(&strategy)?,
    };
    let range = DateRange::new(parse_date(start, "start")?, parse_date(end, "end")?);

    let sweep = generate_signal_files(runner, symbol, &strategy, &grid, range)?;
    println!(
        "Wrote {} signal files for {strategy} {symbol} ({} combinations tried)",
        sweep.files.len(),
        grid.size()
    );
    println!("Signals:       {}", sweep.dir.display());
    println!("Parameter log: {}", sweep.param_log.display());
    Ok(())
}

fn run_backtest_cmd(
    runner: &RunnerConfig,
    signal_file: Option<PathBuf>,
    signals_dir: Option<PathBuf>,
    symbol: Option<&str>,
    options: &ExportOptions,
    parallel: bool,
    json: bool,
) -> Result<()> {
    let config = runner.backtest_config()?;
    let files = match signal_file {
        Some(file) => vec![file],
        None => {
            let dir = signals_dir.unwrap_or_else(|| runner.paths.signals_dir.clone());
            collect_signal_files(&dir)
                .with_context(|| format!("failed to scan {}", dir.display()))?
        }
    };
    if files.is_empty() {
        bail!("no signal files found");
    }

    let batch = run_signal_files(runner, &config, &files, symbol, parallel);
    let store = ResultsStore::new(&runner.paths.results_dir);
    let saved = merge(&store, &batch, options)?;

    if json {
        for run in batch.successes() {
            println!("{}", serde_json::to_string(&run.output.record)?);
        }
    } else {
        print_summary(batch.successes());
    }
    for err in batch.failures() {
        eprintln!("Error: {err}");
    }

    let summary = batch.summary();
    println!(
        "{} of {} runs succeeded; {} saved to {}",
        summary.succeeded,
        summary.total,
        saved.len(),
        store.root().display()
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary<'a>(runs: impl Iterator<Item = &'a SignalFileRun>) {
    println!(
        "{:<12} {:<10} {:<6} {:>8} {:>12} {:>10}",
        "Strategy", "Symbol", "Param", "Trades", "TotalReturn", "MaxDD"
    );
    println!("{}", "-".repeat(63));
    for run in runs {
        let r = &run.output.record;
        println!(
            "{:<12} {:<10} {:<6} {:>8} {:>11.2}% {:>9.2}%",
            r.strategy,
            r.symbol,
            r.param_id,
            run.output.outcome.trades.len(),
            r.total_return * 100.0,
            r.max_drawdown * 100.0
        );
    }
}

fn run_report(runner: &RunnerConfig, summary: Option<PathBuf>, request: &ReportRequest) -> Result<()> {
    let summary = summary.unwrap_or_else(|| ResultsStore::new(&runner.paths.results_dir).master_path());
    match report::generate(&summary, &runner.paths.reports_dir, request) {
        Ok(out) => {
            println!(
                "Report for {} ({} rows): {}",
                out.symbol,
                out.rows.len(),
                out.path.display()
            );
            Ok(())
        }
        Err(report::ReportError::NoSymbol { available }) => {
            println!("Available symbols:");
            for (i, symbol) in available.iter().enumerate() {
                println!("{}. {symbol}", i + 1);
            }
            bail!("choose one with --symbol");
        }
        Err(e) => Err(e.into()),
    }
}

fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let text = RunnerConfig::default()
        .to_toml()
        .context("failed to serialize default config")?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {} (strategies: {}, {})", path.display(), Strategy::SMA_CROSS, Strategy::RSI);
    Ok(())
}
