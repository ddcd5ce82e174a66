//! Day-stepping simulation engine.
//!
//! Advances one trading day at a time over the aligned market's date axis.
//! Per-day order is fixed: mark-to-market (carrying prices forward over
//! gaps), dividend application gated on shares held at the prior close,
//! monthly contribution deployment, rebalancing, then the end-of-day
//! snapshot. Reordering changes results and is not permitted.
//!
//! A no-DRIP shadow ledger runs through the same transitions regardless of
//! the primary DRIP setting, purely for the comparison track. Buy-and-hold
//! and cash-flow-matched benchmark/reference tracks ride along the same
//! loop. State at day N depends on day N−1, so the loop is strictly
//! sequential.

use super::params::{ConfigError, SimulationParams};
use super::schedule::{anniversaries, map_to_axis};
use crate::data::{AlignedMarket, FetchProgress};
use crate::domain::{
    DailyPoint, DailySeries, DividendRecord, HoldingSnapshot, PortfolioState, RebalancingEvent,
    TaxPayment,
};
use crate::rebalance::execute_rebalance;
use crate::tax::{withhold_dividend, TaxConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Negative cash smaller than this (in dollars) is treated as float noise
/// and clamped to zero.
const CASH_EPSILON: f64 = 1e-6;

/// Cooperative cancellation handle shared between the caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fatal simulation failures. Path-dependent state past a violation cannot
/// be trusted, so the run aborts instead of returning partial results.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no trading days between {start} and {end}")]
    NoTradingDays { start: NaiveDate, end: NaiveDate },

    #[error("cash balance went negative ({amount:.4}) on {date}")]
    NegativeCash { date: NaiveDate, amount: f64 },

    #[error("share count for '{symbol}' went negative on {date}")]
    NegativeShares { date: NaiveDate, symbol: String },

    #[error("run cancelled")]
    Cancelled,
}

/// Running totals for the cash-conservation identity:
/// `final_value == initial + contributions + net_dividends − fees − taxes`
/// (+ market movement).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTotals {
    pub initial_investment: f64,
    pub contributions: f64,
    /// After-tax dividend cash, whether reinvested or held.
    pub net_dividends: f64,
    /// DRIP fees plus rebalancing trade fees.
    pub fees: f64,
    /// Dividend withholding plus capital-gains tax.
    pub taxes: f64,
}

impl CashFlowTotals {
    /// Initial lump plus every monthly contribution.
    pub fn total_contributed(&self) -> f64 {
        self.initial_investment + self.contributions
    }
}

/// Immutable result of one finished simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub series: DailySeries,
    pub dividends: Vec<DividendRecord>,
    pub tax_payments: Vec<TaxPayment>,
    pub rebalances: Vec<RebalancingEvent>,
    pub holdings: Vec<HoldingSnapshot>,
    pub final_portfolio: PortfolioState,
    pub totals: CashFlowTotals,
    pub warnings: Vec<String>,
}

// ─── ledgers ─────────────────────────────────────────────────────────────

struct AppliedDividend {
    record: DividendRecord,
    payments: Vec<TaxPayment>,
    fee: f64,
    /// DRIP was on but no price was available, so cash was credited instead.
    cash_fallback: bool,
}

/// One independently evolving portfolio (primary or no-DRIP shadow).
struct Ledger {
    portfolio: PortfolioState,
    /// Shares per symbol at the prior day's close; gates dividend payouts.
    prev_shares: BTreeMap<String, f64>,
    /// Cash earmarked for symbols that have not traded yet.
    pending: BTreeMap<String, f64>,
    drip: bool,
}

impl Ledger {
    fn new(start: NaiveDate, drip: bool) -> Self {
        Self {
            portfolio: PortfolioState::new(start, 0.0),
            prev_shares: BTreeMap::new(),
            pending: BTreeMap::new(),
            drip,
        }
    }

    /// Add `amount` to cash and spread it across `weights`, buying symbols
    /// that have a price and earmarking the rest for their first trade.
    fn deploy(
        &mut self,
        amount: f64,
        weights: &BTreeMap<String, f64>,
        prices: &BTreeMap<String, f64>,
        date: NaiveDate,
    ) {
        self.portfolio.cash += amount;
        for (symbol, weight) in weights {
            let slice = amount * weight;
            if slice <= 0.0 {
                continue;
            }
            match prices.get(symbol) {
                Some(&price) if price > 0.0 => {
                    self.portfolio
                        .holding_mut(symbol)
                        .lots
                        .add(date, slice / price, price);
                    self.portfolio.cash -= slice;
                }
                _ => *self.pending.entry(symbol.clone()).or_insert(0.0) += slice,
            }
        }
    }

    /// Buy in earmarked cash for symbols whose first price just appeared.
    fn drain_pending(&mut self, prices: &BTreeMap<String, f64>, date: NaiveDate) {
        if self.pending.is_empty() {
            return;
        }
        let ready: Vec<String> = self
            .pending
            .keys()
            .filter(|s| prices.get(*s).is_some_and(|p| *p > 0.0))
            .cloned()
            .collect();
        for symbol in ready {
            let amount = self.pending.remove(&symbol).unwrap_or(0.0);
            let price = prices[&symbol];
            self.portfolio
                .holding_mut(&symbol)
                .lots
                .add(date, amount / price, price);
            self.portfolio.cash -= amount;
        }
    }

    /// Apply one dividend payment. Payout is gated on the prior close's
    /// share count, withheld through the tax calculator, then reinvested
    /// (DRIP) or credited to cash.
    fn apply_dividend(
        &mut self,
        symbol: &str,
        amount_per_share: f64,
        date: NaiveDate,
        price: Option<f64>,
        tax: Option<&TaxConfig>,
        drip_fee_pct: f64,
    ) -> Option<AppliedDividend> {
        let shares = self.prev_shares.get(symbol).copied().unwrap_or(0.0);
        if shares <= 0.0 || amount_per_share <= 0.0 {
            return None;
        }
        let gross = shares * amount_per_share;
        let withheld = {
            let holding = self.portfolio.holdings.get(symbol)?;
            withhold_dividend(tax, &holding.lots, symbol, date, gross)
        };

        let mut fee = 0.0;
        let mut shares_purchased = 0.0;
        let mut reinvested = false;
        let mut cash_fallback = false;
        match price {
            Some(p) if self.drip && p > 0.0 => {
                fee = withheld.net * drip_fee_pct;
                shares_purchased = (withheld.net - fee) / p;
                self.portfolio
                    .holding_mut(symbol)
                    .lots
                    .add(date, shares_purchased, p);
                reinvested = true;
            }
            _ => {
                self.portfolio.cash += withheld.net;
                cash_fallback = self.drip;
            }
        }
        self.portfolio.holding_mut(symbol).cumulative_dividends += withheld.net;

        Some(AppliedDividend {
            record: DividendRecord {
                date,
                symbol: symbol.to_string(),
                shares,
                amount_per_share,
                gross,
                tax_withheld: withheld.tax,
                net: withheld.net,
                class: withheld.class,
                reinvested,
                shares_purchased,
            },
            payments: withheld.payments,
            fee,
            cash_fallback,
        })
    }

    fn check_invariants(&mut self, date: NaiveDate) -> Result<(), SimulationError> {
        if self.portfolio.cash < 0.0 {
            if self.portfolio.cash > -CASH_EPSILON {
                self.portfolio.cash = 0.0;
            } else {
                return Err(SimulationError::NegativeCash {
                    date,
                    amount: self.portfolio.cash,
                });
            }
        }
        for (symbol, holding) in &self.portfolio.holdings {
            if holding.shares() < 0.0 {
                return Err(SimulationError::NegativeShares {
                    date,
                    symbol: symbol.clone(),
                });
            }
        }
        Ok(())
    }

    fn snapshot_shares(&mut self) {
        self.prev_shares = self
            .portfolio
            .holdings
            .iter()
            .map(|(s, h)| (s.clone(), h.shares()))
            .collect();
    }
}

/// Cash-flow-matched position in an external index series (benchmark or
/// reference fund): every portfolio cash inflow buys index shares at the
/// same date's price.
#[derive(Default)]
struct IndexTrack {
    shares: f64,
    cash: f64,
}

impl IndexTrack {
    fn invest(&mut self, amount: f64, price: Option<f64>) {
        match price {
            Some(p) if p > 0.0 => self.shares += amount / p,
            _ => self.cash += amount,
        }
    }

    fn drain(&mut self, price: Option<f64>) {
        if self.cash > 0.0 {
            if let Some(p) = price {
                if p > 0.0 {
                    self.shares += self.cash / p;
                    self.cash = 0.0;
                }
            }
        }
    }

    fn value(&self, price: Option<f64>) -> f64 {
        self.shares * price.unwrap_or(0.0) + self.cash
    }
}

// ─── the day loop ────────────────────────────────────────────────────────

/// Run one backtest over the aligned market.
///
/// Validates `params`, then steps Initialized → Running → Finalized. The
/// returned [`SimulationOutput`] is never mutated afterwards.
pub fn run_simulation(
    params: &SimulationParams,
    market: &AlignedMarket,
    progress: &dyn FetchProgress,
    cancel: &CancelToken,
) -> Result<SimulationOutput, SimulationError> {
    params.validate()?;
    let days = market.num_days();
    if days == 0 {
        return Err(SimulationError::NoTradingDays {
            start: params.start,
            end: params.end,
        });
    }
    let tax = params.tax.as_ref();

    let contributions = if params.monthly_contribution > 0.0 {
        map_to_axis(&anniversaries(params.start, params.end, 1), &market.dates)
    } else {
        BTreeMap::new()
    };
    let rebalances_due = match params.rebalance.months() {
        Some(months) => map_to_axis(
            &anniversaries(params.start, params.end, months),
            &market.dates,
        ),
        None => BTreeMap::new(),
    };

    let start = market.dates[0];
    let mut primary = Ledger::new(start, params.drip);
    let mut shadow = Ledger::new(start, false);
    let mut buy_hold = Ledger::new(start, false);
    let mut benchmark = market.benchmark.as_ref().map(|_| IndexTrack::default());
    let mut reference = market.reference.as_ref().map(|_| IndexTrack::default());
    let mut benchmark_price: Option<f64> = None;
    let mut reference_price: Option<f64> = None;

    let mut prices: BTreeMap<String, f64> = BTreeMap::new();
    let mut series = DailySeries::default();
    let mut dividends = Vec::new();
    let mut tax_payments = Vec::new();
    let mut rebalance_events = Vec::new();
    let mut totals = CashFlowTotals::default();
    let mut warnings = Vec::new();

    for (i, &date) in market.dates.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(SimulationError::Cancelled);
        }

        // 1. Mark-to-market: carry the last known price over gaps.
        for (symbol, closes) in &market.closes {
            let close = closes[i];
            if close.is_finite() && close > 0.0 {
                prices.insert(symbol.clone(), close);
            }
        }
        if let Some(row) = &market.benchmark {
            if row[i].is_finite() {
                benchmark_price = Some(row[i]);
            }
        }
        if let Some(row) = &market.reference {
            if row[i].is_finite() {
                reference_price = Some(row[i]);
            }
        }
        primary.drain_pending(&prices, date);
        shadow.drain_pending(&prices, date);
        buy_hold.drain_pending(&prices, date);
        if let Some(track) = &mut benchmark {
            track.drain(benchmark_price);
        }
        if let Some(track) = &mut reference {
            track.drain(reference_price);
        }

        // Initial lump goes in on the first trading day.
        if i == 0 && params.initial_investment > 0.0 {
            let amount = params.initial_investment;
            primary.deploy(amount, &params.weights, &prices, date);
            shadow.deploy(amount, &params.weights, &prices, date);
            buy_hold.deploy(amount, &params.weights, &prices, date);
            if let Some(track) = &mut benchmark {
                track.invest(amount, benchmark_price);
            }
            if let Some(track) = &mut reference {
                track.invest(amount, reference_price);
            }
            totals.initial_investment = amount;
        }

        // 2. Dividends, gated on shares held at the prior close.
        for (symbol, amounts) in &market.dividends {
            let per_share = amounts[i];
            if per_share <= 0.0 {
                continue;
            }
            let price = prices.get(symbol).copied();
            if let Some(applied) =
                primary.apply_dividend(symbol, per_share, date, price, tax, params.drip_fee_pct)
            {
                if applied.cash_fallback {
                    warnings.push(format!(
                        "{date}: no price for '{symbol}'; dividend credited as cash instead of reinvested"
                    ));
                }
                totals.net_dividends += applied.record.net;
                totals.taxes += applied.record.tax_withheld;
                totals.fees += applied.fee;
                dividends.push(applied.record);
                tax_payments.extend(applied.payments);
            }
            shadow.apply_dividend(symbol, per_share, date, price, tax, params.drip_fee_pct);
        }

        // 3. Monthly contribution, deployed at target weights.
        if let Some(&count) = contributions.get(&i) {
            let amount = params.monthly_contribution * count as f64;
            primary.deploy(amount, &params.weights, &prices, date);
            shadow.deploy(amount, &params.weights, &prices, date);
            if let Some(track) = &mut benchmark {
                track.invest(amount, benchmark_price);
            }
            if let Some(track) = &mut reference {
                track.invest(amount, reference_price);
            }
            totals.contributions += amount;
        }

        // 4. Rebalancing.
        if rebalances_due.contains_key(&i) {
            if let Some(out) = execute_rebalance(
                &mut primary.portfolio,
                &prices,
                &params.weights,
                date,
                params.rebalance_fee_pct,
                tax,
            ) {
                totals.fees += out.event.fees;
                totals.taxes += out.event.taxes;
                rebalance_events.push(out.event);
                tax_payments.extend(out.tax_payments);
            }
            execute_rebalance(
                &mut shadow.portfolio,
                &prices,
                &params.weights,
                date,
                params.rebalance_fee_pct,
                tax,
            );
        }

        primary.check_invariants(date)?;
        shadow.check_invariants(date)?;

        // 5. End-of-day snapshot.
        primary.portfolio.as_of = date;
        shadow.portfolio.as_of = date;
        series.points.push(DailyPoint {
            date,
            value: primary.portfolio.total_value(&prices),
            value_no_drip: shadow.portfolio.total_value(&prices),
            benchmark: benchmark.as_ref().map(|t| t.value(benchmark_price)),
            buy_hold: Some(buy_hold.portfolio.total_value(&prices)),
            reference: reference.as_ref().map(|t| t.value(reference_price)),
        });

        primary.snapshot_shares();
        shadow.snapshot_shares();
        progress.on_simulation_progress(i + 1, days);
    }

    for (symbol, amount) in &primary.pending {
        warnings.push(format!(
            "no price ever observed for '{symbol}'; {amount:.2} held as cash"
        ));
    }

    let holdings = primary
        .portfolio
        .holdings
        .values()
        .map(|h| {
            let last_price = prices.get(&h.symbol).copied().unwrap_or(0.0);
            HoldingSnapshot {
                symbol: h.symbol.clone(),
                shares: h.shares(),
                last_price,
                market_value: h.market_value(last_price),
                cumulative_dividends: h.cumulative_dividends,
            }
        })
        .collect();

    Ok(SimulationOutput {
        series,
        dividends,
        tax_payments,
        rebalances: rebalance_events,
        holdings,
        final_portfolio: primary.portfolio,
        totals,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SilentProgress;
    use crate::rebalance::RebalanceFrequency;
    use chrono::{Datelike, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut cur = start;
        while cur <= end {
            let wd = cur.weekday();
            if wd != Weekday::Sat && wd != Weekday::Sun {
                out.push(cur);
            }
            cur += chrono::Duration::days(1);
        }
        out
    }

    fn flat_market(symbols: &[(&str, f64)], dates: Vec<NaiveDate>) -> AlignedMarket {
        let n = dates.len();
        let mut closes = BTreeMap::new();
        let mut dividends = BTreeMap::new();
        for (symbol, price) in symbols {
            closes.insert(symbol.to_string(), vec![*price; n]);
            dividends.insert(symbol.to_string(), vec![0.0; n]);
        }
        AlignedMarket {
            dates,
            closes,
            dividends,
            benchmark: None,
            reference: None,
        }
    }

    fn params(symbols: &[&str], start: NaiveDate, end: NaiveDate) -> SimulationParams {
        let weight = 1.0 / symbols.len() as f64;
        SimulationParams {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            weights: symbols.iter().map(|s| (s.to_string(), weight)).collect(),
            start,
            end,
            initial_investment: 1000.0,
            monthly_contribution: 0.0,
            drip: true,
            drip_fee_pct: 0.0,
            tax: None,
            rebalance: RebalanceFrequency::None,
            rebalance_fee_pct: 0.0,
        }
    }

    fn run(p: &SimulationParams, m: &AlignedMarket) -> SimulationOutput {
        run_simulation(p, m, &SilentProgress, &CancelToken::new()).unwrap()
    }

    #[test]
    fn flat_price_quarterly_dividends_with_drip() {
        // One symbol at $100 for a year, $1/share on four ex-dates.
        let dates = weekdays(d(2024, 1, 2), d(2024, 12, 31));
        let mut market = flat_market(&[("KO", 100.0)], dates);
        let n = market.dates.len();
        for i in [62, 125, 188, n - 1] {
            market.dividends.get_mut("KO").unwrap()[i] = 1.0;
        }

        let p = params(&["KO"], d(2024, 1, 2), d(2024, 12, 31));
        let out = run(&p, &market);

        assert_eq!(out.dividends.len(), 4);
        assert!(out.dividends.iter().all(|r| r.reinvested));
        // Reinvested shares compound: a bit over $40 total.
        assert!(out.totals.net_dividends >= 40.0 && out.totals.net_dividends < 41.0);
        assert!(out.holdings[0].shares > 10.0);
        assert!(out.final_portfolio.cash.abs() < 1e-9);
        // Flat price: final value = contributed + dividends.
        let final_value = out.series.points.last().unwrap().value;
        assert!((final_value - (1000.0 + out.totals.net_dividends)).abs() < 1e-6);
        // DRIP track ends above the no-DRIP shadow (compounding).
        let last = out.series.points.last().unwrap();
        assert!(last.value > last.value_no_drip);
        // Shadow collects exactly 4 × $10 with no compounding.
        assert!((last.value_no_drip - 1040.0).abs() < 1e-9);
    }

    #[test]
    fn contributions_only_sum_exactly() {
        // $0 initial, $100/month for 12 months, flat prices, no fees.
        let dates = weekdays(d(2024, 1, 2), d(2025, 1, 10));
        let market = flat_market(&[("A", 50.0), ("B", 50.0)], dates);

        let mut p = params(&["A", "B"], d(2024, 1, 2), d(2025, 1, 10));
        p.initial_investment = 0.0;
        p.monthly_contribution = 100.0;
        let out = run(&p, &market);

        assert!((out.totals.contributions - 1200.0).abs() < 1e-9);
        let final_value = out.series.points.last().unwrap().value;
        assert!((final_value - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn taxed_qualified_dividend_without_drip() {
        // Single $100 gross dividend at 15% qualified rate, DRIP off.
        let dates = weekdays(d(2024, 1, 2), d(2024, 6, 28));
        let mut market = flat_market(&[("KO", 100.0)], dates.clone());
        let ex = dates.iter().position(|&dt| dt == d(2024, 4, 1)).unwrap();
        market.dividends.get_mut("KO").unwrap()[ex] = 10.0;

        let mut p = params(&["KO"], d(2024, 1, 2), d(2024, 6, 28));
        p.drip = false;
        p.tax = Some(TaxConfig {
            qualified_dividend_rate: 0.15,
            ordinary_dividend_rate: 0.24,
            long_term_gains_rate: 0.20,
            qualified_holding_days: 60,
        });
        let out = run(&p, &market);

        assert_eq!(out.tax_payments.len(), 1);
        let payment = &out.tax_payments[0];
        assert_eq!(payment.kind, crate::domain::TaxKind::QualifiedDividend);
        assert!((payment.tax - 15.0).abs() < 1e-9);
        assert!((out.final_portfolio.cash - 85.0).abs() < 1e-9);
        assert!((out.dividends[0].net - 85.0).abs() < 1e-9);
    }

    #[test]
    fn rebalancing_realizes_long_term_gains_tax() {
        // A jumps 50% before the annual trigger; 2024 is a leap year, so the
        // anniversary falls 366 days after acquisition and the gain is
        // long-term.
        let dates = weekdays(d(2023, 6, 5), d(2024, 6, 28));
        let jump = dates.iter().position(|&dt| dt >= d(2024, 1, 2)).unwrap();
        let mut market = flat_market(&[("A", 100.0), ("B", 100.0)], dates);
        for c in market.closes.get_mut("A").unwrap()[jump..].iter_mut() {
            *c = 150.0;
        }

        let mut p = params(&["A", "B"], d(2023, 6, 5), d(2024, 6, 28));
        p.rebalance = RebalanceFrequency::Annual;
        p.tax = Some(TaxConfig {
            qualified_dividend_rate: 0.15,
            ordinary_dividend_rate: 0.24,
            long_term_gains_rate: 0.20,
            qualified_holding_days: 60,
        });
        let out = run(&p, &market);

        assert_eq!(out.rebalances.len(), 1);
        let event = &out.rebalances[0];
        let realized: f64 = event.trades.iter().map(|t| t.realized_gain).sum();
        assert!(realized > 0.0);
        assert!((event.taxes - realized * 0.20).abs() < 1e-9);
        assert!(out
            .tax_payments
            .iter()
            .any(|t| t.kind == crate::domain::TaxKind::CapitalGains));
    }

    #[test]
    fn no_rebalancing_means_no_events() {
        let dates = weekdays(d(2023, 1, 2), d(2024, 3, 29));
        let jump = dates.len() / 2;
        let mut market = flat_market(&[("A", 100.0), ("B", 100.0)], dates);
        for c in market.closes.get_mut("A").unwrap()[jump..].iter_mut() {
            *c = 150.0;
        }
        let p = params(&["A", "B"], d(2023, 1, 2), d(2024, 3, 29));
        let out = run(&p, &market);
        assert!(out.rebalances.is_empty());
        assert_eq!(out.totals.fees, 0.0);
        assert_eq!(out.totals.taxes, 0.0);
    }

    #[test]
    fn price_gap_carries_forward() {
        let dates = weekdays(d(2024, 1, 2), d(2024, 1, 31));
        let mut market = flat_market(&[("A", 100.0)], dates);
        // A gap in the middle must not zero the position's value.
        market.closes.get_mut("A").unwrap()[5] = f64::NAN;
        let p = params(&["A"], d(2024, 1, 2), d(2024, 1, 31));
        let out = run(&p, &market);
        assert!((out.series.points[5].value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn benchmark_track_matches_cash_flows() {
        let dates = weekdays(d(2024, 1, 2), d(2024, 6, 28));
        let n = dates.len();
        let mut market = flat_market(&[("A", 100.0)], dates);
        market.benchmark = Some(vec![200.0; n]);

        let mut p = params(&["A"], d(2024, 1, 2), d(2024, 6, 28));
        p.monthly_contribution = 100.0;
        let out = run(&p, &market);

        // Flat benchmark: its track equals total contributed at every point.
        let last = out.series.points.last().unwrap();
        assert!((last.benchmark.unwrap() - out.totals.total_contributed()).abs() < 1e-9);
    }

    #[test]
    fn buy_hold_ignores_contributions() {
        let dates = weekdays(d(2024, 1, 2), d(2024, 6, 28));
        let market = flat_market(&[("A", 100.0)], dates);
        let mut p = params(&["A"], d(2024, 1, 2), d(2024, 6, 28));
        p.monthly_contribution = 100.0;
        let out = run(&p, &market);
        let last = out.series.points.last().unwrap();
        assert!((last.buy_hold.unwrap() - 1000.0).abs() < 1e-9);
        assert!(last.value > last.buy_hold.unwrap());
    }

    #[test]
    fn cancelled_run_aborts() {
        let dates = weekdays(d(2024, 1, 2), d(2024, 1, 31));
        let market = flat_market(&[("A", 100.0)], dates);
        let p = params(&["A"], d(2024, 1, 2), d(2024, 1, 31));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_simulation(&p, &market, &SilentProgress, &cancel).unwrap_err();
        assert!(matches!(err, SimulationError::Cancelled));
    }

    #[test]
    fn empty_market_is_an_error() {
        let market = AlignedMarket::default();
        let p = params(&["A"], d(2024, 1, 2), d(2024, 1, 31));
        let err = run_simulation(&p, &market, &SilentProgress, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, SimulationError::NoTradingDays { .. }));
    }

    #[test]
    fn invalid_params_fail_before_simulation() {
        let dates = weekdays(d(2024, 1, 2), d(2024, 1, 31));
        let market = flat_market(&[("A", 100.0)], dates);
        let mut p = params(&["A"], d(2024, 1, 2), d(2024, 1, 31));
        p.weights.insert("A".into(), 0.7);
        let err = run_simulation(&p, &market, &SilentProgress, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, SimulationError::Config(_)));
    }

    #[test]
    fn conservation_identity_flat_prices() {
        // With flat prices the identity holds exactly:
        // final = initial + contributions + net dividends − fees − taxes.
        let dates = weekdays(d(2024, 1, 2), d(2024, 12, 31));
        let mut market = flat_market(&[("A", 80.0), ("B", 120.0)], dates);
        let n = market.dates.len();
        for i in (40..n).step_by(63) {
            market.dividends.get_mut("A").unwrap()[i] = 0.5;
        }

        let mut p = params(&["A", "B"], d(2024, 1, 2), d(2024, 12, 31));
        p.monthly_contribution = 250.0;
        p.drip_fee_pct = 0.01;
        p.tax = Some(TaxConfig {
            qualified_dividend_rate: 0.15,
            ordinary_dividend_rate: 0.24,
            long_term_gains_rate: 0.20,
            qualified_holding_days: 60,
        });
        p.rebalance = RebalanceFrequency::Quarterly;
        p.rebalance_fee_pct = 0.001;
        let out = run(&p, &market);

        let final_value = out.series.points.last().unwrap().value;
        let expected = out.totals.total_contributed() + out.totals.net_dividends
            - out.totals.fees
            - out.rebalances.iter().map(|e| e.taxes).sum::<f64>();
        assert!((final_value - expected).abs() < 1e-6);
    }
}
