//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! Every result table exports to CSV without loss of information: floats
//! use shortest round-trip formatting and dates are ISO. The JSON manifest
//! round-trips the full `BacktestResult`; persisted artifacts carry a
//! `schema_version` and unknown versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use divlab_core::{
    DailySeries, DividendRecord, HoldingSnapshot, RebalancingEvent, TaxPayment,
};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ─────────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ──────────────────────────────────────────────────────────

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Daily value series: one row per trading day, optional tracks blank when
/// absent.
pub fn export_series_csv(series: &DailySeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "value",
        "value_no_drip",
        "benchmark",
        "buy_hold",
        "reference",
    ])?;
    for p in &series.points {
        wtr.write_record([
            p.date.to_string(),
            p.value.to_string(),
            p.value_no_drip.to_string(),
            opt(p.benchmark),
            opt(p.buy_hold),
            opt(p.reference),
        ])?;
    }
    finish(wtr)
}

pub fn export_dividends_csv(dividends: &[DividendRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "symbol",
        "shares",
        "amount_per_share",
        "gross",
        "tax_withheld",
        "net",
        "class",
        "reinvested",
        "shares_purchased",
    ])?;
    for r in dividends {
        wtr.write_record([
            r.date.to_string(),
            r.symbol.clone(),
            r.shares.to_string(),
            r.amount_per_share.to_string(),
            r.gross.to_string(),
            r.tax_withheld.to_string(),
            r.net.to_string(),
            format!("{:?}", r.class),
            r.reinvested.to_string(),
            r.shares_purchased.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_tax_csv(payments: &[TaxPayment]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "symbol", "kind", "gross", "tax", "net"])?;
    for p in payments {
        wtr.write_record([
            p.date.to_string(),
            p.symbol.clone(),
            format!("{:?}", p.kind),
            p.gross.to_string(),
            p.tax.to_string(),
            p.net.to_string(),
        ])?;
    }
    finish(wtr)
}

/// One row per trade leg; event-level fees and taxes repeat on each of the
/// event's rows.
pub fn export_rebalancing_csv(events: &[RebalancingEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "symbol",
        "shares_delta",
        "value",
        "realized_gain",
        "event_fees",
        "event_taxes",
    ])?;
    for event in events {
        for t in &event.trades {
            wtr.write_record([
                event.date.to_string(),
                t.symbol.clone(),
                t.shares_delta.to_string(),
                t.value.to_string(),
                t.realized_gain.to_string(),
                event.fees.to_string(),
                event.taxes.to_string(),
            ])?;
        }
    }
    finish(wtr)
}

pub fn export_holdings_csv(holdings: &[HoldingSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "shares",
        "last_price",
        "market_value",
        "cumulative_dividends",
    ])?;
    for h in holdings {
        wtr.write_record([
            h.symbol.clone(),
            h.shares.to_string(),
            h.last_price.to_string(),
            h.market_value.to_string(),
            h.cumulative_dividends.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Flat `metric,value` table; undefined ratios come out as NaN.
pub fn export_metrics_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["metric", "value"])?;
    for (name, value) in result.metrics.to_map() {
        wtr.write_record([name, value.to_string()])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown report ─────────────────────────────────────────────────────

/// Generate a Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Portfolio Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run Id | {} |\n", result.run_id));
    md.push_str(&format!("| Provider | {} |\n", result.provider));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.config.start_date, result.config.end_date
    ));
    md.push_str(&format!(
        "| Symbols | {} |\n",
        result.config.symbols.join(", ")
    ));
    md.push_str(&format!(
        "| Initial Investment | ${:.2} |\n",
        result.config.initial_investment
    ));
    md.push_str(&format!(
        "| Monthly Contribution | ${:.2} |\n",
        result.config.monthly_contribution
    ));
    md.push_str(&format!(
        "| DRIP | {} |\n",
        if result.config.drip { "on" } else { "off" }
    ));
    md.push_str(&format!(
        "| Tax Modeling | {} |\n",
        if result.config.tax.is_some() { "on" } else { "off" }
    ));
    md.push_str(&format!("| Rebalancing | {:?} |\n", result.config.rebalance));
    md.push_str(&format!("| Trading Days | {} |\n", result.series.len()));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push('\n');

    let m = &result.metrics;
    let pct = |v: f64| format!("{:.2}%", v * 100.0);
    let ratio = |v: Option<f64>| v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".into());

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Value | ${:.2} |\n", m.final_value));
    md.push_str(&format!("| Total Return | {} |\n", pct(m.total_return)));
    md.push_str(&format!(
        "| Annualized Return | {} |\n",
        pct(m.annualized_return)
    ));
    md.push_str(&format!("| CAGR | {} |\n", pct(m.cagr)));
    md.push_str(&format!("| Volatility | {} |\n", pct(m.volatility)));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Max Drawdown | {} |\n", pct(m.max_drawdown)));
    md.push_str(&format!("| Calmar | {} |\n", ratio(m.calmar)));
    md.push_str(&format!("| Beta | {} |\n", ratio(m.beta)));
    md.push_str(&format!("| Alpha | {} |\n", ratio(m.alpha)));
    md.push_str(&format!("| VaR (95%) | {} |\n", pct(m.var_95)));
    md.push_str(&format!("| Win Rate | {} |\n", pct(m.win_rate)));
    if let Some(br) = m.benchmark_return {
        md.push_str(&format!("| Benchmark Return | {} |\n", pct(br)));
    }
    if let Some(op) = m.outperformance {
        md.push_str(&format!("| Outperformance | {} |\n", pct(op)));
    }
    md.push_str(&format!(
        "| Total Dividends | ${:.2} |\n",
        m.total_dividends
    ));
    md.push_str(&format!(
        "| Annual Dividend Income | ${:.2} |\n",
        m.annual_dividend_income
    ));
    md.push('\n');

    md.push_str("## Activity\n\n");
    md.push_str(&format!("- Dividend payments: {}\n", result.dividends.len()));
    md.push_str(&format!("- Tax payments: {}\n", result.tax_payments.len()));
    md.push_str(&format!(
        "- Rebalancing events: {}\n",
        result.rebalances.len()
    ));
    md.push('\n');

    if !result.excluded_symbols.is_empty() {
        md.push_str("## Excluded Symbols\n\n");
        for e in &result.excluded_symbols {
            md.push_str(&format!("- {}: {}\n", e.symbol, e.reason));
        }
        md.push('\n');
    }

    if !result.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for w in &result.warnings {
            md.push_str(&format!("- {w}\n"));
        }
        md.push('\n');
    }

    md
}

// ─── Artifact bundle ─────────────────────────────────────────────────────

/// Save the full artifact set for one run.
///
/// Creates `run_{id}_{timestamp}/` under `output_dir` with `manifest.json`,
/// one CSV per result table, and `report.md`. Returns the created path.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let dirname = format!(
        "run_{}_{}",
        short_id,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("series.csv"), export_series_csv(&result.series)?)?;
    std::fs::write(
        run_dir.join("dividends.csv"),
        export_dividends_csv(&result.dividends)?,
    )?;
    std::fs::write(
        run_dir.join("tax_payments.csv"),
        export_tax_csv(&result.tax_payments)?,
    )?;
    std::fs::write(
        run_dir.join("rebalancing.csv"),
        export_rebalancing_csv(&result.rebalances)?,
    )?;
    std::fs::write(
        run_dir.join("holdings.csv"),
        export_holdings_csv(&result.holdings)?,
    )?;
    std::fs::write(run_dir.join("metrics.csv"), export_metrics_csv(result)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(result))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}
