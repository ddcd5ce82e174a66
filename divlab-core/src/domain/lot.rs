//! Tax lots and the per-symbol FIFO lot book.
//!
//! Every purchase (initial allocation, contribution, DRIP reinvestment,
//! rebalancing buy) appends a lot; every sale consumes lots from the front.
//! Holding-period and cost-basis accounting therefore stay auditable in
//! isolation from the day-stepping loop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single acquisition of shares: date, fractional share count, and
/// per-share cost basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLot {
    pub acquired: NaiveDate,
    pub shares: f64,
    /// Cost basis per share at acquisition.
    pub cost_basis: f64,
}

impl TaxLot {
    /// Whole days this lot has been held as of `date`.
    pub fn holding_days(&self, date: NaiveDate) -> i64 {
        (date - self.acquired).num_days()
    }
}

/// A portion of a lot matched against a sale.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedLot {
    pub acquired: NaiveDate,
    pub shares: f64,
    pub cost_basis: f64,
}

/// Ordered FIFO queue of tax lots for one symbol.
///
/// Append on purchase, pop from the front on sale. Share counts are
/// fractional; lots never hold negative share counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotBook {
    lots: VecDeque<TaxLot>,
}

impl LotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a purchase as a new lot at the back of the queue.
    pub fn add(&mut self, acquired: NaiveDate, shares: f64, cost_basis: f64) {
        if shares <= 0.0 {
            return;
        }
        self.lots.push_back(TaxLot {
            acquired,
            shares,
            cost_basis,
        });
    }

    /// Total shares across all lots.
    pub fn total_shares(&self) -> f64 {
        self.lots.iter().map(|l| l.shares).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn lots(&self) -> impl Iterator<Item = &TaxLot> {
        self.lots.iter()
    }

    /// Consume `shares` from the front of the queue (earliest lots first).
    ///
    /// Returns the matched portions in consumption order. The caller must not
    /// request more shares than the book holds; any excess beyond the total
    /// is silently capped at the available amount.
    pub fn consume(&mut self, shares: f64) -> Vec<MatchedLot> {
        let mut remaining = shares;
        let mut matched = Vec::new();

        while remaining > 1e-12 {
            let Some(front) = self.lots.front_mut() else {
                break;
            };
            if front.shares <= remaining + 1e-12 {
                remaining -= front.shares;
                matched.push(MatchedLot {
                    acquired: front.acquired,
                    shares: front.shares,
                    cost_basis: front.cost_basis,
                });
                self.lots.pop_front();
            } else {
                front.shares -= remaining;
                matched.push(MatchedLot {
                    acquired: front.acquired,
                    shares: remaining,
                    cost_basis: front.cost_basis,
                });
                remaining = 0.0;
            }
        }

        matched
    }

    /// Split the held shares by lot age as of `date`.
    ///
    /// Returns `(aged, young)`: shares held at least `threshold_days` versus
    /// the rest. Used for the qualified/ordinary dividend classification.
    pub fn split_by_age(&self, date: NaiveDate, threshold_days: i64) -> (f64, f64) {
        let mut aged = 0.0;
        let mut young = 0.0;
        for lot in &self.lots {
            if lot.holding_days(date) >= threshold_days {
                aged += lot.shares;
            } else {
                young += lot.shares;
            }
        }
        (aged, young)
    }
}
