use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Date formats seen in mandi price feeds. data.gov.in uses `DD/MM/YYYY`,
/// the local backend and test fixtures use ISO dates.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// One price observation for a commodity at a market on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    /// Modal price in rupees per quintal.
    pub price: Decimal,
    pub observation_date: ObservationDate,
}

impl PriceRecord {
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(&self.market, &self.commodity)
    }

    /// A record takes part in comparisons only with a positive price and a date.
    pub fn is_eligible(&self) -> bool {
        self.price > Decimal::ZERO && !self.observation_date.is_empty()
    }
}

/// Calendar date of an observation as reported upstream.
///
/// The raw text is kept verbatim; a parsed date is attached when the text
/// matches a known format. Two parsed dates are equal when they name the same
/// day, whatever their text. Unparsed dates sort before (older than) every
/// parsed one and compare by raw text among themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ObservationDate {
    raw: String,
    parsed: Option<NaiveDate>,
}

impl ObservationDate {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into().trim().to_string();
        let parsed = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok());
        Self { raw, parsed }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.parsed
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl Ord for ObservationDate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.parsed, other.parsed) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, None) => self.raw.cmp(&other.raw),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
}

impl PartialEq for ObservationDate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ObservationDate {}

impl Hash for ObservationDate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.parsed {
            Some(date) => date.hash(state),
            None => self.raw.hash(state),
        }
    }
}

impl PartialOrd for ObservationDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<String> for ObservationDate {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for ObservationDate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<ObservationDate> for String {
    fn from(date: ObservationDate) -> Self {
        date.raw
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Join key for observations of the same commodity at the same market.
///
/// Built as `market + "-" + commodity`. Markets or commodities that
/// themselves contain a dash can collide; upstream names have not been
/// seen to do so.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(market: &str, commodity: &str) -> Self {
        Self(format!("{market}-{commodity}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price movement of one market/commodity pair between two dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub key: CompositeKey,
    pub market: String,
    pub commodity: String,
    pub state: String,
    pub district: String,
    pub latest_price: Decimal,
    pub previous_price: Decimal,
    pub change: Decimal,
    /// Rounded to two decimal places.
    pub change_percent: Decimal,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:<20} {:>10} -> {:>10}  {:>+10} ({:+.2}%)",
            self.commodity,
            self.market,
            self.previous_price,
            self.latest_price,
            self.change,
            self.change_percent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_dates_order_chronologically() {
        let a = ObservationDate::new("2025-01-02");
        let b = ObservationDate::new("2025-01-10");
        assert!(a < b);
        assert_eq!(a.date(), NaiveDate::from_ymd_opt(2025, 1, 2));
    }

    #[test]
    fn test_data_gov_dates_parse() {
        let d = ObservationDate::new("06/11/2025");
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2025, 11, 6));
        // Day-first text would sort wrong lexicographically.
        assert!(ObservationDate::new("30/10/2025") < d);
    }

    #[test]
    fn test_unparsed_dates_sort_oldest() {
        let junk = ObservationDate::new("yesterday");
        let real = ObservationDate::new("2020-01-01");
        assert!(junk < real);
        assert!(junk.date().is_none());
        assert!(!junk.is_empty());
    }

    #[test]
    fn test_same_day_in_different_formats_is_equal() {
        let iso = ObservationDate::new("2025-11-04");
        let day_first = ObservationDate::new("04/11/2025");
        assert_eq!(iso, day_first);
        assert_eq!(iso.cmp(&day_first), Ordering::Equal);
        assert_eq!(iso.as_str(), "2025-11-04");

        let mut seen = std::collections::HashSet::new();
        seen.insert(iso);
        assert!(!seen.insert(day_first));
    }

    #[test]
    fn test_date_is_trimmed() {
        assert_eq!(ObservationDate::new("  2025-11-04 ").as_str(), "2025-11-04");
        assert!(ObservationDate::new("   ").is_empty());
    }

    #[test]
    fn test_composite_key() {
        let key = CompositeKey::new("Pune", "Onion");
        assert_eq!(key.as_str(), "Pune-Onion");
    }

    #[test]
    fn test_observation_date_serializes_as_string() {
        let json = serde_json::to_string(&ObservationDate::new("2025-11-04")).unwrap();
        assert_eq!(json, "\"2025-11-04\"");
    }
}
