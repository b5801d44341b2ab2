use rust_decimal::Decimal;

use crate::prices::models::ChangeRecord;

/// Default number of risers and fallers shown.
pub const DEFAULT_TOP_N: usize = 10;

/// Largest percentage gains first. Ties keep input order.
pub fn top_risers(changes: &[ChangeRecord], n: usize) -> Vec<ChangeRecord> {
    let mut sorted = changes.to_vec();
    sorted.sort_by(|a, b| b.change_percent.cmp(&a.change_percent));
    sorted.truncate(n);
    sorted
}

/// Largest percentage drops first, at most `n`, negative moves only.
pub fn top_fallers(changes: &[ChangeRecord], n: usize) -> Vec<ChangeRecord> {
    let mut sorted = changes.to_vec();
    sorted.sort_by(|a, b| a.change_percent.cmp(&b.change_percent));
    sorted.truncate(n);
    sorted.retain(|c| c.change_percent < Decimal::ZERO);
    sorted
}
