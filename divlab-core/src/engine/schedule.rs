//! Calendar schedules mapped onto the trading-date axis.
//!
//! Contributions and rebalancing fire on monthly anniversaries of the start
//! date. An anniversary that lands on a non-trading day maps to the closest
//! prior trading day. Anniversaries use calendar months with day-of-month
//! clamping (Jan 31 + 1 month = Feb 29/28).

use chrono::{Months, NaiveDate};
use std::collections::BTreeMap;

/// Anniversary dates `start + k*every_months` for k ≥ 1, up to and
/// including `end`.
pub fn anniversaries(start: NaiveDate, end: NaiveDate, every_months: u32) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut k = every_months;
    while let Some(date) = start.checked_add_months(Months::new(k)) {
        if date > end {
            break;
        }
        out.push(date);
        k += every_months;
    }
    out
}

/// Map calendar dates to axis indices via closest-prior-trading-day.
///
/// Returns index → occurrence count: on a sparse axis two anniversaries can
/// collapse onto the same trading day, and the caller applies the action
/// that many times. Dates before the first axis date are dropped.
pub fn map_to_axis(dates: &[NaiveDate], axis: &[NaiveDate]) -> BTreeMap<usize, usize> {
    let mut out = BTreeMap::new();
    for date in dates {
        let i = axis.partition_point(|d| d <= date);
        if i > 0 {
            *out.entry(i - 1).or_insert(0) += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_anniversaries_over_a_year() {
        let dates = anniversaries(d(2024, 1, 15), d(2025, 1, 15), 1);
        assert_eq!(dates.len(), 12);
        assert_eq!(dates[0], d(2024, 2, 15));
        assert_eq!(dates[11], d(2025, 1, 15));
    }

    #[test]
    fn quarterly_anniversaries() {
        let dates = anniversaries(d(2024, 1, 2), d(2024, 12, 31), 3);
        assert_eq!(dates, vec![d(2024, 4, 2), d(2024, 7, 2), d(2024, 10, 2)]);
    }

    #[test]
    fn month_end_clamps() {
        let dates = anniversaries(d(2024, 1, 31), d(2024, 4, 30), 1);
        assert_eq!(dates, vec![d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30)]);
    }

    #[test]
    fn maps_to_closest_prior_trading_day() {
        // Axis skips the weekend of Jan 13-14.
        let axis = vec![d(2024, 1, 11), d(2024, 1, 12), d(2024, 1, 15)];
        let mapped = map_to_axis(&[d(2024, 1, 14)], &axis);
        assert_eq!(mapped, [(1, 1)].into_iter().collect());
    }

    #[test]
    fn exact_trading_day_maps_to_itself() {
        let axis = vec![d(2024, 1, 11), d(2024, 1, 12)];
        let mapped = map_to_axis(&[d(2024, 1, 12)], &axis);
        assert_eq!(mapped, [(1, 1)].into_iter().collect());
    }

    #[test]
    fn date_before_axis_is_dropped() {
        let axis = vec![d(2024, 1, 11)];
        let mapped = map_to_axis(&[d(2024, 1, 10)], &axis);
        assert!(mapped.is_empty());
    }

    #[test]
    fn collapsed_dates_counted() {
        // Both anniversaries fall after the last axis date.
        let axis = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let mapped = map_to_axis(&[d(2024, 2, 2), d(2024, 3, 2)], &axis);
        assert_eq!(mapped, [(1, 2)].into_iter().collect());
    }
}
