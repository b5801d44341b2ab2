use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::debug;

use crate::prices::models::{ChangeRecord, PriceRecord};
use crate::prices::table::PriceTable;

/// Percentage change from `previous` to `latest`, rounded half away from
/// zero to two places. `None` when `previous` is zero or the result does not
/// fit in a [`Decimal`].
pub fn percent_change(previous: Decimal, latest: Decimal) -> Option<Decimal> {
    latest
        .checked_sub(previous)?
        .checked_div(previous)?
        .checked_mul(dec!(100))
        .map(|pct| pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Compare every key priced on both dates.
///
/// Keys present in only one table produce nothing, and so do non-positive
/// prices and pairs whose change is out of [`Decimal`] range. Output follows
/// the key order of the latest table.
pub fn compute_changes(
    latest: &PriceTable,
    previous: &PriceTable,
    records: &[PriceRecord],
) -> Vec<ChangeRecord> {
    latest
        .keys()
        .filter_map(|key| {
            let latest_price = latest.get(key)?;
            let previous_price = previous.get(key)?;
            if latest_price <= Decimal::ZERO || previous_price <= Decimal::ZERO {
                return None;
            }
            let Some(change_percent) = percent_change(previous_price, latest_price) else {
                debug!(key = %key, %previous_price, %latest_price, "Change out of range, skipped");
                return None;
            };

            let source = records.iter().find(|r| &r.key() == key)?;

            Some(ChangeRecord {
                key: key.clone(),
                market: source.market.clone(),
                commodity: source.commodity.clone(),
                state: source.state.clone(),
                district: source.district.clone(),
                latest_price,
                previous_price,
                change: latest_price - previous_price,
                change_percent,
            })
        })
        .collect()
}
