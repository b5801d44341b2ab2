//! Per-date price lookups keyed by market and commodity.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::prices::dates::DatePair;
use crate::prices::models::{CompositeKey, ObservationDate, PriceRecord};

/// How to resolve several records for the same market, commodity and date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// The record seen last in feed order wins.
    #[default]
    Last,
    First,
    Max,
    /// Arithmetic mean of all duplicates.
    Mean,
}

/// Prices for a single observation date.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<CompositeKey, Decimal>,
    counts: HashMap<CompositeKey, u32>,
    order: Vec<CompositeKey>,
}

impl PriceTable {
    pub fn get(&self, key: &CompositeKey) -> Option<Decimal> {
        self.prices.get(key).copied()
    }

    /// Keys in the order they were first seen.
    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, key: CompositeKey, price: Decimal, policy: DuplicatePolicy) {
        let Some(current) = self.prices.get_mut(&key) else {
            self.order.push(key.clone());
            self.counts.insert(key.clone(), 1);
            self.prices.insert(key, price);
            return;
        };

        let count = self.counts.entry(key).or_insert(1);
        match policy {
            DuplicatePolicy::Last => *current = price,
            DuplicatePolicy::First => {}
            DuplicatePolicy::Max => *current = (*current).max(price),
            DuplicatePolicy::Mean => {
                // Running mean: m' = m + (x - m) / (n + 1)
                let n = Decimal::from(*count);
                *current += (price - *current) / (n + Decimal::ONE);
            }
        }
        *count += 1;
    }
}

/// Build the table for one date from normalized records.
pub fn build_table(
    records: &[PriceRecord],
    date: &ObservationDate,
    policy: DuplicatePolicy,
) -> PriceTable {
    let mut table = PriceTable::default();
    for record in records.iter().filter(|r| &r.observation_date == date) {
        table.insert(record.key(), record.price, policy);
    }
    table
}

/// Latest and previous tables for a date pair.
pub fn build_tables(
    records: &[PriceRecord],
    dates: &DatePair,
    policy: DuplicatePolicy,
) -> (PriceTable, PriceTable) {
    (
        build_table(records, &dates.latest, policy),
        build_table(records, &dates.previous, policy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(market: &str, price: Decimal, date: &str) -> PriceRecord {
        PriceRecord {
            state: String::new(),
            district: String::new(),
            market: market.to_string(),
            commodity: "Onion".to_string(),
            price,
            observation_date: date.into(),
        }
    }

    fn duplicates() -> Vec<PriceRecord> {
        vec![
            record("Pune", dec!(2000), "2025-11-06"),
            record("Nashik", dec!(1500), "2025-11-06"),
            record("Pune", dec!(2600), "2025-11-06"),
            record("Pune", dec!(2300), "2025-11-06"),
            record("Pune", dec!(9999), "2025-11-04"),
        ]
    }

    fn pune(policy: DuplicatePolicy) -> Option<Decimal> {
        let table = build_table(&duplicates(), &"2025-11-06".into(), policy);
        table.get(&CompositeKey::new("Pune", "Onion"))
    }

    #[test]
    fn test_only_matching_date_is_used() {
        let table = build_table(&duplicates(), &"2025-11-04".into(), DuplicatePolicy::Last);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&CompositeKey::new("Pune", "Onion")), Some(dec!(9999)));
    }

    #[test]
    fn test_last_write_wins_by_default() {
        assert_eq!(pune(DuplicatePolicy::default()), Some(dec!(2300)));
    }

    #[test]
    fn test_other_policies() {
        assert_eq!(pune(DuplicatePolicy::First), Some(dec!(2000)));
        assert_eq!(pune(DuplicatePolicy::Max), Some(dec!(2600)));
        assert_eq!(pune(DuplicatePolicy::Mean), Some(dec!(2300)));
    }

    #[test]
    fn test_keys_keep_first_seen_order() {
        let table = build_table(&duplicates(), &"2025-11-06".into(), DuplicatePolicy::Last);
        let keys: Vec<&str> = table.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Pune-Onion", "Nashik-Onion"]);
    }

    #[test]
    fn test_policy_from_config_text() {
        let policy: DuplicatePolicy = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(policy, DuplicatePolicy::Mean);
    }
}
