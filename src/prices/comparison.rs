//! Day-over-day price comparison.
//!
//! Runs filter → date index → price tables → change calculation → ranking
//! over an in-memory record set. Every call recomputes from scratch.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::InsufficientDataError;
use crate::prices::change::compute_changes;
use crate::prices::dates::{distinct_dates_desc, latest_two_dates, DatePair};
use crate::prices::filter::PriceFilter;
use crate::prices::models::{ChangeRecord, CompositeKey, ObservationDate, PriceRecord};
use crate::prices::ranking::{top_fallers, top_risers, DEFAULT_TOP_N};
use crate::prices::table::{build_table, build_tables, DuplicatePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub top_n: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// Result of comparing the two most recent dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comparison {
    InsufficientData(InsufficientDataError),
    Ready(ComparisonReport),
}

impl Comparison {
    pub fn report(&self) -> Option<&ComparisonReport> {
        match self {
            Self::Ready(report) => Some(report),
            Self::InsufficientData(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub dates: DatePair,
    pub changes: Vec<ChangeRecord>,
    pub risers: Vec<ChangeRecord>,
    pub fallers: Vec<ChangeRecord>,
}

/// Everything a price page renders: the filtered records and the
/// comparison derived from them. The record list survives a failed
/// comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketView {
    pub filter: PriceFilter,
    pub records: Vec<PriceRecord>,
    pub comparison: Comparison,
}

/// Compare the latest two dates of an already normalized record set.
pub fn compare_dates(
    records: &[PriceRecord],
    options: &CompareOptions,
) -> Result<ComparisonReport, InsufficientDataError> {
    let dates = latest_two_dates(records)?;
    let (latest, previous) = build_tables(records, &dates, options.duplicate_policy);
    let changes = compute_changes(&latest, &previous, records);

    debug!(
        latest = %dates.latest,
        previous = %dates.previous,
        latest_keys = latest.len(),
        previous_keys = previous.len(),
        changes = changes.len(),
        "Price comparison computed"
    );

    Ok(ComparisonReport {
        risers: top_risers(&changes, options.top_n),
        fallers: top_fallers(&changes, options.top_n),
        changes,
        dates,
    })
}

/// Filter normalized records and compare what remains.
pub fn build_view(
    records: &[PriceRecord],
    filter: &PriceFilter,
    options: &CompareOptions,
) -> MarketView {
    let filtered = filter.apply(records);
    let comparison = match compare_dates(&filtered, options) {
        Ok(report) => Comparison::Ready(report),
        Err(e) => Comparison::InsufficientData(e),
    };

    MarketView {
        filter: filter.clone(),
        records: filtered,
        comparison,
    }
}

/// One point of a price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub date: ObservationDate,
    pub price: Decimal,
}

/// Price history of one market/commodity pair, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSeries {
    pub key: CompositeKey,
    pub market: String,
    pub commodity: String,
    pub points: Vec<SeriesPoint>,
}

/// Per-pair price histories across every date in the record set.
///
/// Needs the same two distinct dates as the comparison does.
pub fn price_series(
    records: &[PriceRecord],
    policy: DuplicatePolicy,
) -> Result<Vec<PriceSeries>, InsufficientDataError> {
    let mut dates = distinct_dates_desc(records);
    if dates.len() < 2 {
        return Err(InsufficientDataError {
            distinct_dates: dates.len(),
        });
    }
    dates.reverse();

    let tables: Vec<_> = dates
        .iter()
        .map(|date| build_table(records, date, policy))
        .collect();

    let mut series: Vec<PriceSeries> = Vec::new();
    for record in records {
        let key = record.key();
        if series.iter().any(|s| s.key == key) {
            continue;
        }

        let points = dates
            .iter()
            .zip(&tables)
            .filter_map(|(date, table)| {
                table.get(&key).map(|price| SeriesPoint {
                    date: date.clone(),
                    price,
                })
            })
            .collect();

        series.push(PriceSeries {
            key,
            market: record.market.clone(),
            commodity: record.commodity.clone(),
            points,
        });
    }

    Ok(series)
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Price movement {} -> {} ({} pairs compared)",
            self.dates.previous,
            self.dates.latest,
            self.changes.len()
        )?;

        writeln!(f, "\nTop risers:")?;
        if self.risers.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for change in &self.risers {
            writeln!(f, "  {change}")?;
        }

        writeln!(f, "\nTop fallers:")?;
        if self.fallers.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for change in &self.fallers {
            writeln!(f, "  {change}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(market: &str, commodity: &str, price: Decimal, date: &str) -> PriceRecord {
        PriceRecord {
            state: "Maharashtra".to_string(),
            district: market.to_string(),
            market: market.to_string(),
            commodity: commodity.to_string(),
            price,
            observation_date: date.into(),
        }
    }

    fn records() -> Vec<PriceRecord> {
        vec![
            record("Pune", "Onion", dec!(2200), "2025-11-04"),
            record("Pune", "Onion", dec!(2300), "2025-11-06"),
            record("Pune", "Potato", dec!(1500), "2025-11-04"),
            record("Pune", "Potato", dec!(1200), "2025-11-06"),
            record("Pune", "Tomato", dec!(900), "2025-11-05"),
        ]
    }

    #[test]
    fn test_view_ready() {
        let view = build_view(&records(), &PriceFilter::default(), &CompareOptions::default());
        let report = view.comparison.report().unwrap();
        assert_eq!(report.dates.latest.as_str(), "2025-11-06");
        // Tomato was only seen on the 5th, which is the previous date.
        assert_eq!(report.dates.previous.as_str(), "2025-11-05");
        assert!(report.changes.is_empty());
        assert_eq!(view.records.len(), 5);
    }

    #[test]
    fn test_view_degrades_when_filter_leaves_one_date() {
        let filter = PriceFilter {
            commodity: "tomato".to_string(),
            ..Default::default()
        };
        let view = build_view(&records(), &filter, &CompareOptions::default());
        assert_eq!(view.records.len(), 1);
        assert_eq!(
            view.comparison,
            Comparison::InsufficientData(InsufficientDataError { distinct_dates: 1 })
        );
    }

    #[test]
    fn test_report_ranks_changes() {
        let filter = PriceFilter {
            commodity: "o".to_string(),
            ..Default::default()
        };
        let without_tomato: Vec<_> = records()
            .into_iter()
            .filter(|r| r.commodity != "Tomato")
            .collect();
        let view = build_view(&without_tomato, &filter, &CompareOptions::default());
        let report = view.comparison.report().unwrap();
        assert_eq!(report.risers[0].commodity, "Onion");
        assert_eq!(report.fallers.len(), 1);
        assert_eq!(report.fallers[0].change_percent, dec!(-20));
    }

    #[test]
    fn test_series_oldest_first() {
        let series = price_series(&records(), DuplicatePolicy::Last).unwrap();
        assert_eq!(series.len(), 3);
        let onion = &series[0];
        let prices: Vec<Decimal> = onion.points.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![dec!(2200), dec!(2300)]);
        assert_eq!(series[2].points.len(), 1);
    }

    #[test]
    fn test_series_needs_two_dates() {
        let one_day = vec![record("Pune", "Onion", dec!(2200), "2025-11-04")];
        assert!(price_series(&one_day, DuplicatePolicy::Last).is_err());
    }

    #[test]
    fn test_comparison_serializes_with_status() {
        let c = Comparison::InsufficientData(InsufficientDataError { distinct_dates: 0 });
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["distinct_dates"], 0);
    }
}
