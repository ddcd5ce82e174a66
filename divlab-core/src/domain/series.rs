//! Daily value series — one point per trading day, all on the same date axis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Values for one trading day.
///
/// The with-DRIP and no-DRIP tracks are always both present: the engine runs
/// the no-DRIP shadow ledger regardless of the primary DRIP setting, purely
/// for comparison. Benchmark and reference tracks are absent when the
/// corresponding series was not supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub value_no_drip: f64,
    pub benchmark: Option<f64>,
    pub buy_hold: Option<f64>,
    pub reference: Option<f64>,
}

/// Ordered-by-date sequence of daily portfolio values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub points: Vec<DailyPoint>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Primary (with-DRIP) value track.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn values_no_drip(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value_no_drip).collect()
    }

    /// Benchmark track, if every point carries one.
    pub fn benchmark_values(&self) -> Option<Vec<f64>> {
        self.points.iter().map(|p| p.benchmark).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}
