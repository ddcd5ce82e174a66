//! Rebalancer — trigger policy and trade sizing back to target weights.
//!
//! On a trigger date, overweight symbols are sold down to target (realizing
//! gains and losses through FIFO lot matching) and the freed proceeds buy
//! underweight symbols. A flat percentage fee is charged on the gross value
//! of every trade. Fees and taxes consume some proceeds, so post-trade
//! weights can deviate from target slightly; the deviation is accepted.

use crate::domain::{
    PortfolioState, RebalanceTrade, RebalancingEvent, TaxKind, TaxPayment,
};
use crate::tax::{capital_gains_tax, realize_sale, TaxConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ignore weight gaps worth less than this many dollars.
const TRADE_TOLERANCE: f64 = 0.01;

/// Symbol used on portfolio-level capital-gains tax records.
pub const PORTFOLIO_SYMBOL: &str = "PORTFOLIO";

/// How often the portfolio is pulled back to target weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Never rebalance (buy and hold).
    #[default]
    None,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl RebalanceFrequency {
    /// Months between triggers; `None` for the never-firing policy.
    pub fn months(self) -> Option<u32> {
        match self {
            RebalanceFrequency::None => None,
            RebalanceFrequency::Monthly => Some(1),
            RebalanceFrequency::Quarterly => Some(3),
            RebalanceFrequency::SemiAnnual => Some(6),
            RebalanceFrequency::Annual => Some(12),
        }
    }
}

/// Everything produced by one rebalancing pass.
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    pub event: RebalancingEvent,
    pub tax_payments: Vec<TaxPayment>,
}

/// Execute one rebalancing pass on `portfolio` at `prices`.
///
/// Returns `None` when every symbol is already within tolerance of target.
/// Sells run first (all realized gains are netted for the event's capital
/// gains tax), then buys are sized to the remaining cash, scaled down
/// pro-rata if fees would overdraw it.
pub fn execute_rebalance(
    portfolio: &mut PortfolioState,
    prices: &BTreeMap<String, f64>,
    targets: &BTreeMap<String, f64>,
    date: NaiveDate,
    fee_pct: f64,
    tax: Option<&TaxConfig>,
) -> Option<RebalanceOutcome> {
    let total = portfolio.total_value(prices);
    if total <= 0.0 {
        return None;
    }

    let pre_weights = portfolio.weights(prices);

    // Value gap per symbol: positive = underweight (buy), negative = sell.
    let mut gaps: BTreeMap<String, f64> = BTreeMap::new();
    for (symbol, weight) in targets {
        let price = prices.get(symbol).copied().unwrap_or(f64::NAN);
        if !price.is_finite() || price <= 0.0 {
            continue; // no tradable price today; leave the position alone
        }
        let current = portfolio.shares(symbol) * price;
        let gap = weight * total - current;
        if gap.abs() > TRADE_TOLERANCE {
            gaps.insert(symbol.clone(), gap);
        }
    }
    if gaps.is_empty() {
        return None;
    }

    let mut trades = Vec::new();
    let mut fees = 0.0;
    let mut short_term = 0.0;
    let mut long_term = 0.0;

    // Sell pass.
    for (symbol, gap) in gaps.iter().filter(|(_, g)| **g < 0.0) {
        let price = prices[symbol];
        let held = portfolio.shares(symbol);
        let shares = (-gap / price).min(held);
        if shares <= 0.0 {
            continue;
        }

        let matched = portfolio.holding_mut(symbol).lots.consume(shares);
        let sale = realize_sale(&matched, date, price);
        let fee = sale.proceeds * fee_pct;
        portfolio.cash += sale.proceeds - fee;
        fees += fee;
        short_term += sale.short_term_gain;
        long_term += sale.long_term_gain;

        trades.push(RebalanceTrade {
            symbol: symbol.clone(),
            shares_delta: -sale.shares,
            value: sale.proceeds,
            realized_gain: sale.total_gain(),
        });
    }

    // Tax the event's netted gains once, before buying.
    let taxes = capital_gains_tax(tax, short_term, long_term);
    let mut tax_payments = Vec::new();
    if taxes > 0.0 {
        portfolio.cash -= taxes;
        let taxable = short_term.max(0.0) + long_term.max(0.0);
        tax_payments.push(TaxPayment {
            date,
            symbol: PORTFOLIO_SYMBOL.to_string(),
            kind: TaxKind::CapitalGains,
            gross: taxable,
            tax: taxes,
            net: taxable - taxes,
        });
    }

    // Buy pass: deploy remaining cash toward the deficits, scaled so that
    // gross + fee never overdraws the balance.
    let deficit_total: f64 = gaps.values().filter(|g| **g > 0.0).sum();
    if deficit_total > 0.0 && portfolio.cash > 0.0 {
        let cost_total = deficit_total * (1.0 + fee_pct);
        let scale = (portfolio.cash / cost_total).min(1.0);
        for (symbol, gap) in gaps.iter().filter(|(_, g)| **g > 0.0) {
            let price = prices[symbol];
            let gross = gap * scale;
            let fee = gross * fee_pct;
            if gross <= 0.0 {
                continue;
            }
            let shares = gross / price;
            portfolio.holding_mut(symbol).lots.add(date, shares, price);
            portfolio.cash -= gross + fee;
            fees += fee;

            trades.push(RebalanceTrade {
                symbol: symbol.clone(),
                shares_delta: shares,
                value: gross,
                realized_gain: 0.0,
            });
        }
    }

    if trades.is_empty() {
        return None;
    }

    Some(RebalanceOutcome {
        event: RebalancingEvent {
            date,
            pre_weights,
            target_weights: targets.clone(),
            trades,
            fees,
            taxes,
        },
        tax_payments,
    })
}
