//! Risk & performance analytics — pure functions over the finished series.
//!
//! Every metric is a pure function: value series (and benchmark series) in,
//! scalar out. Daily return is the simple percentage change between
//! consecutive points; the first day has no defined return and is excluded
//! from return-based statistics. 252 trading days per year; CAGR uses
//! calendar days.
//!
//! Division hazards report sentinels instead of faulting: Sharpe and
//! Sortino are 0 when the relevant deviation is 0, Calmar is `None` when
//! max drawdown is 0, beta is `None` when benchmark variance is 0.

use divlab_core::SimulationOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

/// Flat mapping of named scalar results, computed once after the run
/// finalizes; immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub final_value: f64,
    /// Gain over everything paid in (initial lump + contributions).
    pub total_return: f64,
    pub annualized_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Always ≤ 0.
    pub max_drawdown: f64,
    /// `None` when max drawdown is exactly 0.
    pub calmar: Option<f64>,
    pub beta: Option<f64>,
    pub alpha: Option<f64>,
    /// 5th percentile of the daily return distribution (interpolated).
    pub var_95: f64,
    /// Fraction of days with a positive return.
    pub win_rate: f64,
    /// Return of the cash-flow-matched benchmark track, if present.
    pub benchmark_return: Option<f64>,
    /// `total_return - benchmark_return` over the identical window.
    pub outperformance: Option<f64>,
    pub total_dividends: f64,
    /// Total dividends divided by elapsed calendar years.
    pub annual_dividend_income: f64,
}

impl Metrics {
    /// Compute every metric from a finished simulation.
    ///
    /// `risk_free_rate` is annual; it is divided by 252 for the daily
    /// excess-return calculations.
    pub fn compute(output: &SimulationOutput, risk_free_rate: f64) -> Self {
        let values = output.series.values();
        let returns = daily_returns(&values);
        let final_value = values.last().copied().unwrap_or(0.0);
        let contributed = output.totals.total_contributed();

        let elapsed_days = match (output.series.first_date(), output.series.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        };
        // CAGR is anchored to the initial lump; with a $0 lump the only
        // sensible base is everything paid in.
        let cagr_base = if output.totals.initial_investment > 0.0 {
            output.totals.initial_investment
        } else {
            contributed
        };

        let total_return = if contributed > 0.0 {
            (final_value - contributed) / contributed
        } else {
            0.0
        };
        let ann_return = annualized_return(&returns);
        let dd = max_drawdown(&values);
        let c = cagr(final_value, cagr_base, elapsed_days);

        let benchmark_values = output.series.benchmark_values();
        let benchmark_returns = benchmark_values.as_deref().map(|v| daily_returns(v));
        let benchmark_return = benchmark_values.as_deref().and_then(|v| {
            let last = v.last().copied()?;
            (contributed > 0.0).then(|| (last - contributed) / contributed)
        });
        let b = benchmark_returns.as_deref().and_then(|br| beta(&returns, br));
        let a = match (b, benchmark_returns.as_deref()) {
            (Some(b), Some(br)) => Some(ann_return - b * annualized_return(br)),
            _ => None,
        };

        let elapsed_years = elapsed_days as f64 / CALENDAR_DAYS_PER_YEAR;
        let total_dividends = output.totals.net_dividends;

        Self {
            final_value,
            total_return,
            annualized_return: ann_return,
            cagr: c,
            volatility: volatility(&returns),
            sharpe: sharpe_ratio(&returns, risk_free_rate),
            sortino: sortino_ratio(&returns, risk_free_rate),
            max_drawdown: dd,
            calmar: calmar_ratio(c, dd),
            beta: b,
            alpha: a,
            var_95: value_at_risk(&returns, 0.95),
            win_rate: win_rate(&returns),
            benchmark_return,
            outperformance: benchmark_return.map(|br| total_return - br),
            total_dividends,
            annual_dividend_income: if elapsed_years > 0.0 {
                total_dividends / elapsed_years
            } else {
                0.0
            },
        }
    }

    /// Flat name → scalar view for tables and CSV. Undefined ratios come
    /// out as NaN here (the JSON form keeps them as null).
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let opt = |v: Option<f64>| v.unwrap_or(f64::NAN);
        BTreeMap::from([
            ("final_value".into(), self.final_value),
            ("total_return".into(), self.total_return),
            ("annualized_return".into(), self.annualized_return),
            ("cagr".into(), self.cagr),
            ("volatility".into(), self.volatility),
            ("sharpe".into(), self.sharpe),
            ("sortino".into(), self.sortino),
            ("max_drawdown".into(), self.max_drawdown),
            ("calmar".into(), opt(self.calmar)),
            ("beta".into(), opt(self.beta)),
            ("alpha".into(), opt(self.alpha)),
            ("var_95".into(), self.var_95),
            ("win_rate".into(), self.win_rate),
            ("benchmark_return".into(), opt(self.benchmark_return)),
            ("outperformance".into(), opt(self.outperformance)),
            ("total_dividends".into(), self.total_dividends),
            (
                "annual_dividend_income".into(),
                self.annual_dividend_income,
            ),
        ])
    }
}

// ─── Individual metric functions ─────────────────────────────────────────

/// Simple percentage change between consecutive value points.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Mean daily return scaled to a year: mean(r) × 252.
pub fn annualized_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    mean(returns) * TRADING_DAYS_PER_YEAR
}

/// Compound annual growth rate over calendar time:
/// `(final / base)^(365 / days) − 1`.
pub fn cagr(final_value: f64, base: f64, elapsed_days: i64) -> f64 {
    if base <= 0.0 || final_value <= 0.0 || elapsed_days <= 0 {
        return 0.0;
    }
    (final_value / base).powf(CALENDAR_DAYS_PER_YEAR / elapsed_days as f64) - 1.0
}

/// Annualized volatility: stdev(r) × √252.
pub fn volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sharpe ratio; 0 when the deviation is zero.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean(returns) - daily_rf) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio: deviation over negative returns only; 0 when
/// there is no downside.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = std_dev(&downside);
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean(returns) - daily_rf) / downside_std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a fraction; always ≤ 0.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (v - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Calmar ratio: CAGR / |max drawdown|; undefined when drawdown is 0.
pub fn calmar_ratio(cagr: f64, max_drawdown: f64) -> Option<f64> {
    if max_drawdown == 0.0 {
        return None;
    }
    Some(cagr / max_drawdown.abs())
}

/// Beta against the benchmark: cov(r, b) / var(b). `None` when the series
/// are too short, mismatched, or the benchmark never moves.
pub fn beta(returns: &[f64], benchmark_returns: &[f64]) -> Option<f64> {
    if returns.len() != benchmark_returns.len() || returns.len() < 2 {
        return None;
    }
    let mr = mean(returns);
    let mb = mean(benchmark_returns);
    let n = returns.len() as f64;
    let cov: f64 = returns
        .iter()
        .zip(benchmark_returns)
        .map(|(r, b)| (r - mr) * (b - mb))
        .sum::<f64>()
        / (n - 1.0);
    let var: f64 = benchmark_returns
        .iter()
        .map(|b| (b - mb).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    if var < 1e-18 {
        return None;
    }
    Some(cov / var)
}

/// Empirical value at risk: the `1 - confidence` percentile of the return
/// distribution, linearly interpolated.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (1.0 - confidence) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Fraction of days with a strictly positive return.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_returns_basic() {
        let r = daily_returns(&[100.0, 110.0, 105.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] - (105.0 - 110.0) / 110.0).abs() < 1e-12);
    }

    #[test]
    fn daily_returns_too_short() {
        assert!(daily_returns(&[100.0]).is_empty());
        assert!(daily_returns(&[]).is_empty());
    }

    #[test]
    fn cagr_doubles_in_a_year() {
        let c = cagr(2000.0, 1000.0, 365);
        assert!((c - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cagr_guards() {
        assert_eq!(cagr(1000.0, 0.0, 365), 0.0);
        assert_eq!(cagr(0.0, 1000.0, 365), 0.0);
        assert_eq!(cagr(1000.0, 1000.0, 0), 0.0);
    }

    #[test]
    fn sharpe_zero_on_constant_returns() {
        let returns = vec![0.001; 100];
        assert_eq!(sharpe_ratio(&returns, 0.0), 0.0);
    }

    #[test]
    fn sharpe_positive_on_mostly_up() {
        let returns: Vec<f64> = (0..100)
            .map(|i| if i % 3 == 0 { -0.001 } else { 0.002 })
            .collect();
        assert!(sharpe_ratio(&returns, 0.0) > 0.0);
    }

    #[test]
    fn sortino_zero_without_downside() {
        let returns = vec![0.001, 0.002, 0.0, 0.003];
        assert_eq!(sortino_ratio(&returns, 0.0), 0.0);
    }

    #[test]
    fn max_drawdown_known() {
        let values = vec![100.0, 110.0, 90.0, 95.0];
        let expected = (90.0 - 110.0) / 110.0;
        assert!((max_drawdown(&values) - expected).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        let values: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64).collect();
        assert_eq!(max_drawdown(&values), 0.0);
    }

    #[test]
    fn calmar_none_without_drawdown() {
        assert!(calmar_ratio(0.1, 0.0).is_none());
        let c = calmar_ratio(0.1, -0.2).unwrap();
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn beta_of_identical_series_is_one() {
        let r = vec![0.01, -0.02, 0.005, 0.013, -0.007];
        let b = beta(&r, &r).unwrap();
        assert!((b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn beta_none_when_benchmark_flat() {
        let r = vec![0.01, -0.02, 0.005];
        let flat = vec![0.0; 3];
        assert!(beta(&r, &flat).is_none());
    }

    #[test]
    fn beta_scales_with_leverage() {
        let b_ret = vec![0.01, -0.02, 0.005, 0.013, -0.007];
        let doubled: Vec<f64> = b_ret.iter().map(|r| r * 2.0).collect();
        let b = beta(&doubled, &b_ret).unwrap();
        assert!((b - 2.0).abs() < 1e-9);
    }

    #[test]
    fn var_95_interpolates() {
        // 21 returns from -0.10 to +0.10 in steps of 0.01; the 5th
        // percentile rank is exactly index 1.
        let returns: Vec<f64> = (-10..=10).map(|i| i as f64 / 100.0).collect();
        let v = value_at_risk(&returns, 0.95);
        assert!((v - (-0.09)).abs() < 1e-12);
    }

    #[test]
    fn var_95_empty_is_zero() {
        assert_eq!(value_at_risk(&[], 0.95), 0.0);
    }

    #[test]
    fn win_rate_counts_strict_gains() {
        let returns = vec![0.01, 0.0, -0.01, 0.02];
        assert!((win_rate(&returns) - 0.5).abs() < 1e-12);
    }
}
