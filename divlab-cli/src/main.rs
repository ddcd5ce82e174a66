//! DivLab CLI — dividend-portfolio backtesting commands.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config over CSV or synthetic data
//! - `init-config` — write a commented starter config file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use divlab_core::{
    CancelToken, CsvDirProvider, MarketDataProvider, SilentProgress, StdoutProgress,
    SyntheticProvider,
};
use divlab_runner::{run_backtest, save_artifacts, BacktestResult, RunConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "divlab",
    about = "DivLab CLI — dividend-portfolio backtesting engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Directory of per-symbol CSV files (SYMBOL.csv with
        /// date,close,dividend columns).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Use deterministic synthetic data instead of CSV files.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Annual dividend yield for synthetic data.
        #[arg(long, default_value_t = 0.03)]
        synthetic_yield: f64,

        /// Output directory for the artifact bundle.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Suppress fetch and simulation progress output.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Write a commented starter config file.
    InitConfig {
        /// Where to write the config. Refuses to overwrite.
        #[arg(long, default_value = "divlab.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            synthetic,
            synthetic_yield,
            output_dir,
            quiet,
        } => run_cmd(
            &config,
            data_dir.as_deref(),
            synthetic,
            synthetic_yield,
            &output_dir,
            quiet,
        ),
        Commands::InitConfig { path } => init_config_cmd(&path),
    }
}

fn run_cmd(
    config_path: &Path,
    data_dir: Option<&Path>,
    synthetic: bool,
    synthetic_yield: f64,
    output_dir: &Path,
    quiet: bool,
) -> Result<()> {
    if synthetic && data_dir.is_some() {
        bail!("--synthetic and --data-dir are mutually exclusive");
    }

    let config = RunConfig::from_toml_path(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let csv_provider;
    let synthetic_provider;
    let provider: &dyn MarketDataProvider = if synthetic {
        synthetic_provider = SyntheticProvider::new(synthetic_yield);
        &synthetic_provider
    } else {
        let dir = data_dir.unwrap_or_else(|| Path::new("data"));
        csv_provider = CsvDirProvider::new(dir);
        &csv_provider
    };

    let cancel = CancelToken::new();
    let result = if quiet {
        run_backtest(&config, provider, &SilentProgress, &cancel)?
    } else {
        run_backtest(&config, provider, &StdoutProgress, &cancel)?
    };

    print_summary(&result);

    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn init_config_cmd(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {}", path.display());
    }
    std::fs::write(path, STARTER_CONFIG)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    println!("Edit it, then: divlab run --config {}", path.display());
    Ok(())
}

const STARTER_CONFIG: &str = r#"# DivLab run configuration.

# 1-20 symbols to hold.
symbols = ["KO", "PEP", "JNJ"]

start_date = "2020-01-02"
end_date = "2024-12-31"

# Lump invested on the first trading day.
initial_investment = 10000.0

# Added on each monthly anniversary of the start date (0 to disable).
monthly_contribution = 500.0

# Reinvest dividends into the paying symbol.
drip = true

# Fraction of each reinvested dividend lost to the DRIP fee.
drip_fee_pct = 0.0

# "none", "monthly", "quarterly", "semi_annual", or "annual".
rebalance = "quarterly"

# Flat fee fraction on every rebalancing trade's gross value.
rebalance_fee_pct = 0.001

# Track the provider's benchmark series for comparison.
benchmark = true

# Annual risk-free rate for Sharpe/Sortino.
risk_free_rate = 0.02

# Target weight per symbol. Omit the whole table for equal weights.
[weights]
KO = 0.4
PEP = 0.3
JNJ = 0.3

# Tax rates (fractions, at most 0.5). Omit the whole table to disable
# tax modeling.
[tax]
qualified_dividend_rate = 0.15
ordinary_dividend_rate = 0.24
long_term_gains_rate = 0.20
qualified_holding_days = 60
"#;

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run Id:         {}", &result.run_id[..12.min(result.run_id.len())]);
    println!("Provider:       {}", result.provider);
    println!(
        "Period:         {} to {}",
        result.config.start_date, result.config.end_date
    );
    println!("Symbols:        {}", result.config.symbols.join(", "));
    println!("Trading Days:   {}", result.series.len());
    println!();
    println!("--- Performance ---");
    println!("Final Value:    ${:.2}", m.final_value);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Volatility:     {:.2}%", m.volatility * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    match m.calmar {
        Some(calmar) => println!("Calmar:         {calmar:.3}"),
        None => println!("Calmar:         n/a"),
    }
    println!("VaR (95%):      {:.2}%", m.var_95 * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    if let (Some(bench), Some(out)) = (m.benchmark_return, m.outperformance) {
        println!("Benchmark:      {:.2}%", bench * 100.0);
        println!("Outperformance: {:.2}%", out * 100.0);
    }
    println!();
    println!("--- Income ---");
    println!("Total Dividends: ${:.2}", m.total_dividends);
    println!("Annual Income:   ${:.2}", m.annual_dividend_income);
    println!("Dividend Events: {}", result.dividends.len());
    println!("Tax Paid:        ${:.2}", result.totals.taxes);
    println!("Fees Paid:       ${:.2}", result.totals.fees);
    if !result.excluded_symbols.is_empty() {
        println!();
        for e in &result.excluded_symbols {
            println!("WARNING: excluded {}: {}", e.symbol, e.reason);
        }
    }
    for warn in &result.warnings {
        println!("WARNING: {warn}");
    }
    println!();
}
