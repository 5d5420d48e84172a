use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::models::{DailySnapshot, SkuLocation, StockCycleStats};

/// Derives per-(SKU, Location) stock statistics from a daily snapshot
/// series.
///
/// Per group, ordered by date ascending:
/// - "was in stock" is quantity > 0;
/// - transitions are the first-difference of that boolean series (+1 on
///   0->1, -1 on 1->0; the first row has no prior value and counts as 0);
/// - the i-th up-transition pairs with the i-th down-transition, truncated
///   to the shorter list; non-positive durations are discarded and the rest
///   averaged (0 when no valid pair exists);
/// - stockout frequency is the count of -1 transitions;
/// - variability is the sample standard deviation of the raw quantity.
///
/// A key with zero in-stock days yields zero/None statistics, never an
/// error.
#[instrument(skip(snapshots), fields(rows = snapshots.len()))]
pub fn analyze(snapshots: &[DailySnapshot]) -> HashMap<SkuLocation, StockCycleStats> {
    let mut groups: BTreeMap<SkuLocation, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for snap in snapshots {
        groups
            .entry((snap.sku.clone(), snap.location.clone()))
            .or_default()
            .push((snap.date, snap.in_stock_qty));
    }

    let mut stats = HashMap::with_capacity(groups.len());
    for (key, mut series) in groups {
        series.sort_by_key(|(date, _)| *date);
        stats.insert(key, analyze_series(&series));
    }

    info!(keys = stats.len(), "stock cycle statistics computed");
    stats
}

fn analyze_series(series: &[(NaiveDate, f64)]) -> StockCycleStats {
    let mut starts: Vec<NaiveDate> = Vec::new();
    let mut ends: Vec<NaiveDate> = Vec::new();
    let mut prev_in_stock: Option<bool> = None;
    let mut last_in_stock_date: Option<NaiveDate> = None;
    let mut days_in_stock = 0u32;
    let mut total_qty = 0.0;

    for &(date, qty) in series {
        let in_stock = qty > 0.0;
        if in_stock {
            days_in_stock += 1;
            last_in_stock_date = Some(date);
        }
        total_qty += qty;

        // First row has no prior value: no transition.
        if let Some(prev) = prev_in_stock {
            if !prev && in_stock {
                starts.push(date);
            } else if prev && !in_stock {
                ends.push(date);
            }
        }
        prev_in_stock = Some(in_stock);
    }

    let paired = starts.len().min(ends.len());
    let durations: Vec<i64> = (0..paired)
        .map(|i| (ends[i] - starts[i]).num_days())
        .filter(|d| *d > 0)
        .collect();
    let avg_cycle_days = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    StockCycleStats {
        last_in_stock_date,
        avg_days_in_stock_per_cycle: avg_cycle_days,
        stock_variability: sample_std_dev(series.iter().map(|(_, q)| *q)),
        stockout_frequency: ends.len() as u32,
        total_days_in_stock: days_in_stock,
        total_in_stock_qty: total_qty,
    }
}

/// Sample standard deviation (n-1 denominator); `None` below two values.
fn sample_std_dev(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn series(sku: &str, location: &str, quantities: &[f64]) -> Vec<DailySnapshot> {
        quantities
            .iter()
            .enumerate()
            .map(|(i, q)| DailySnapshot {
                sku: sku.to_string(),
                location: location.to_string(),
                date: day(1 + i as u32),
                in_stock_qty: *q,
            })
            .collect()
    }

    fn stats_for(quantities: &[f64]) -> StockCycleStats {
        let snaps = series("S1", "L1", quantities);
        analyze(&snaps)
            .remove(&("S1".to_string(), "L1".to_string()))
            .unwrap()
    }

    #[test]
    fn always_in_stock_has_no_stockouts() {
        let s = stats_for(&[3.0, 4.0, 2.0, 5.0]);
        assert_eq!(s.stockout_frequency, 0);
        assert_eq!(s.total_days_in_stock, 4);
        assert_eq!(s.avg_days_in_stock_per_cycle, 0.0);
        assert_eq!(s.last_in_stock_date, Some(day(4)));
    }

    #[test]
    fn never_in_stock_yields_zero_stats() {
        let s = stats_for(&[0.0, 0.0, 0.0]);
        assert_eq!(s.stockout_frequency, 0);
        assert_eq!(s.total_days_in_stock, 0);
        assert_eq!(s.total_in_stock_qty, 0.0);
        assert_eq!(s.last_in_stock_date, None);
        assert_eq!(s.avg_days_in_stock_per_cycle, 0.0);
    }

    #[test]
    fn stockout_frequency_counts_down_transitions() {
        // in, out, in, out, in
        let s = stats_for(&[2.0, 0.0, 1.0, 0.0, 3.0]);
        assert_eq!(s.stockout_frequency, 2);
        assert_eq!(s.total_days_in_stock, 3);
    }

    #[test]
    fn cycle_pairs_up_and_down_transitions_in_order() {
        // Day1 out, day2 in (start), day3..4 in, day5 out (end): one cycle
        // of 3 days.
        let s = stats_for(&[0.0, 1.0, 1.0, 1.0, 0.0]);
        assert_eq!(s.stockout_frequency, 1);
        assert_eq!(s.avg_days_in_stock_per_cycle, 3.0);
    }

    #[test]
    fn unclosed_cycle_reports_zero_average() {
        // One out-transition at day 3, restock at day 6, never goes back
        // out: no start precedes the end within the window, so the single
        // pair is (day6, day3) with negative duration and is discarded.
        let s = stats_for(&[1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 2.0]);
        assert_eq!(s.stockout_frequency, 1);
        assert_eq!(s.avg_days_in_stock_per_cycle, 0.0);
        assert_eq!(s.total_days_in_stock, 4);
    }

    #[test]
    fn first_row_is_not_a_transition() {
        let s = stats_for(&[5.0, 5.0]);
        assert_eq!(s.stockout_frequency, 0);
        // No up-transition either, so no cycle.
        assert_eq!(s.avg_days_in_stock_per_cycle, 0.0);
    }

    #[test]
    fn variability_is_sample_std_dev() {
        let s = stats_for(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let std = s.stock_variability.unwrap();
        assert!((std - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn variability_undefined_for_single_observation() {
        let s = stats_for(&[3.0]);
        assert_eq!(s.stock_variability, None);
    }

    #[test]
    fn groups_are_keyed_by_sku_and_location() {
        let mut snaps = series("S1", "L1", &[1.0, 0.0]);
        snaps.extend(series("S1", "L2", &[0.0, 2.0]));
        let stats = analyze(&snaps);
        assert_eq!(stats.len(), 2);
        assert_eq!(
            stats[&("S1".into(), "L1".into())].stockout_frequency,
            1
        );
        assert_eq!(
            stats[&("S1".into(), "L2".into())].stockout_frequency,
            0
        );
    }
}
