//! Built-in sample prices for running without a data.gov.in key.

use async_trait::async_trait;
use serde_json::json;

use crate::data::{PriceQuery, PriceSource};
use crate::error::FetchError;
use crate::prices::normalize::normalize_raw;
use crate::prices::PriceRecord;

pub struct SampleSource;

/// Two days of prices for four well-known mandis.
pub fn sample_records() -> Vec<PriceRecord> {
    let raw = vec![
        json!({"state": "Punjab", "district": "Ludhiana", "market": "Ludhiana", "commodity": "Wheat", "price": "2210", "date": "2025-10-29"}),
        json!({"state": "Haryana", "district": "Karnal", "market": "Karnal", "commodity": "Paddy(Dhan)(Common)", "price": "3150", "date": "2025-10-29"}),
        json!({"state": "Gujarat", "district": "Rajkot", "market": "Rajkot", "commodity": "Cotton", "price": "7320", "date": "2025-10-29"}),
        json!({"state": "Rajasthan", "district": "Jaipur", "market": "Jaipur", "commodity": "Mustard", "price": "5800", "date": "2025-10-29"}),
        json!({"state": "Punjab", "district": "Ludhiana", "market": "Ludhiana", "commodity": "Wheat", "price": "2250", "date": "2025-10-30"}),
        json!({"state": "Haryana", "district": "Karnal", "market": "Karnal", "commodity": "Paddy(Dhan)(Common)", "price": "3100", "date": "2025-10-30"}),
        json!({"state": "Gujarat", "district": "Rajkot", "market": "Rajkot", "commodity": "Cotton", "price": "7500", "date": "2025-10-30"}),
        json!({"state": "Rajasthan", "district": "Jaipur", "market": "Jaipur", "commodity": "Mustard", "price": "5800", "date": "2025-10-30"}),
    ];
    normalize_raw(&raw)
}

#[async_trait]
impl PriceSource for SampleSource {
    async fn fetch(&self, _query: &PriceQuery) -> Result<Vec<PriceRecord>, FetchError> {
        Ok(sample_records())
    }

    fn name(&self) -> &str {
        "sample"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::{build_view, CompareOptions, PriceFilter};
    use rust_decimal_macros::dec;

    #[test]
    fn test_sample_is_comparable() {
        let view = build_view(&sample_records(), &PriceFilter::default(), &CompareOptions::default());
        let report = view.comparison.report().expect("two dates of samples");
        assert_eq!(report.changes.len(), 4);
        assert_eq!(report.risers[0].commodity, "Cotton");
        assert_eq!(report.risers[0].change_percent, dec!(2.46));
        assert_eq!(report.fallers.len(), 1);
        assert_eq!(report.fallers[0].commodity, "Paddy(Dhan)(Common)");
    }
}
