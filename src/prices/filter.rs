use serde::{Deserialize, Serialize};

use crate::prices::models::PriceRecord;

/// User-selected narrowing of the record set.
///
/// Each field is a case-insensitive substring; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceFilter {
    pub state: String,
    pub district: String,
    pub commodity: String,
}

impl PriceFilter {
    pub fn is_empty(&self) -> bool {
        self.state.trim().is_empty()
            && self.district.trim().is_empty()
            && self.commodity.trim().is_empty()
    }

    pub fn matches(&self, record: &PriceRecord) -> bool {
        field_matches(&self.state, &record.state)
            && field_matches(&self.district, &record.district)
            && field_matches(&self.commodity, &record.commodity)
    }

    /// Records passing the filter, in input order.
    pub fn apply(&self, records: &[PriceRecord]) -> Vec<PriceRecord> {
        if self.is_empty() {
            return records.to_vec();
        }
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

fn field_matches(filter: &str, value: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || value.to_lowercase().contains(&filter.to_lowercase())
}
