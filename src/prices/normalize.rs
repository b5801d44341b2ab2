//! Lenient ingestion of upstream price records.
//!
//! Open-government price feeds are noisy: prices arrive as strings or
//! numbers, sometimes as "N/A", and field names differ between the
//! data.gov.in dataset and the local backend proxy. Anything that cannot be
//! turned into an eligible [`PriceRecord`] is dropped without error.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::prices::models::{ObservationDate, PriceRecord};

const PRICE_FIELDS: &[&str] = &["price", "modal_price"];
const DATE_FIELDS: &[&str] = &["arrival_date", "date", "observation_date"];

/// Either response shape served by a price endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawResponse {
    Bare(Vec<Value>),
    Wrapped { records: Vec<Value> },
}

impl RawResponse {
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Bare(records) => records,
            Self::Wrapped { records } => records,
        }
    }
}

/// Convert raw JSON records into eligible price records, preserving order.
pub fn normalize_raw(raw: &[Value]) -> Vec<PriceRecord> {
    let records: Vec<PriceRecord> = raw.iter().filter_map(parse_record).collect();

    let dropped = raw.len() - records.len();
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "Dropped malformed price records");
    }

    records
}

/// Keep only eligible records. Applying this twice changes nothing.
pub fn normalize_records(records: &[PriceRecord]) -> Vec<PriceRecord> {
    records.iter().filter(|r| r.is_eligible()).cloned().collect()
}

fn parse_record(value: &Value) -> Option<PriceRecord> {
    let obj = value.as_object()?;

    let price = PRICE_FIELDS
        .iter()
        .find_map(|field| obj.get(*field))
        .and_then(parse_price)?;

    let date = DATE_FIELDS
        .iter()
        .find_map(|field| obj.get(*field))
        .map(text)
        .unwrap_or_default();

    let record = PriceRecord {
        state: obj.get("state").map(text).unwrap_or_default(),
        district: obj.get("district").map(text).unwrap_or_default(),
        market: obj.get("market").map(text).unwrap_or_default(),
        commodity: obj.get("commodity").map(text).unwrap_or_default(),
        price,
        observation_date: ObservationDate::new(date),
    };

    record.is_eligible().then_some(record)
}

/// Parse a price given as a JSON number or numeric string.
pub fn parse_price(value: &Value) -> Option<Decimal> {
    let s = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .ok()
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
