use serde::Serialize;

use crate::error::InsufficientDataError;
use crate::prices::models::{ObservationDate, PriceRecord};

/// The two most recent distinct observation dates in a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatePair {
    pub latest: ObservationDate,
    pub previous: ObservationDate,
}

/// Distinct observation dates, newest first.
pub fn distinct_dates_desc(records: &[PriceRecord]) -> Vec<ObservationDate> {
    let mut dates: Vec<ObservationDate> = records
        .iter()
        .map(|r| r.observation_date.clone())
        .collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();
    dates
}

/// Pick the latest and previous observation dates.
pub fn latest_two_dates(records: &[PriceRecord]) -> Result<DatePair, InsufficientDataError> {
    let mut dates = distinct_dates_desc(records).into_iter();

    match (dates.next(), dates.next()) {
        (Some(latest), Some(previous)) => Ok(DatePair { latest, previous }),
        (first, _) => Err(InsufficientDataError {
            distinct_dates: usize::from(first.is_some()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn on(date: &str) -> PriceRecord {
        PriceRecord {
            state: "Maharashtra".to_string(),
            district: "Pune".to_string(),
            market: "Pune".to_string(),
            commodity: "Onion".to_string(),
            price: dec!(100),
            observation_date: date.into(),
        }
    }

    #[test]
    fn test_picks_two_newest() {
        let records = vec![on("2025-01-01"), on("2025-01-03"), on("2025-01-02")];
        let pair = latest_two_dates(&records).unwrap();
        assert_eq!(pair.latest.as_str(), "2025-01-03");
        assert_eq!(pair.previous.as_str(), "2025-01-02");
    }

    #[test]
    fn test_duplicates_collapse() {
        let records = vec![on("2025-01-03"), on("2025-01-03"), on("2025-01-01")];
        assert_eq!(distinct_dates_desc(&records).len(), 2);
        let pair = latest_two_dates(&records).unwrap();
        assert_eq!(pair.previous.as_str(), "2025-01-01");
    }

    #[test]
    fn test_single_date_is_insufficient() {
        let records = vec![on("2025-01-03"), on("2025-01-03")];
        let err = latest_two_dates(&records).unwrap_err();
        assert_eq!(err.distinct_dates, 1);
    }

    #[test]
    fn test_empty_is_insufficient() {
        let err = latest_two_dates(&[]).unwrap_err();
        assert_eq!(err.distinct_dates, 0);
    }

    #[test]
    fn test_day_first_dates_compare_by_calendar() {
        let records = vec![on("30/10/2025"), on("06/11/2025"), on("04/11/2025")];
        let pair = latest_two_dates(&records).unwrap();
        assert_eq!(pair.latest.as_str(), "06/11/2025");
        assert_eq!(pair.previous.as_str(), "04/11/2025");
    }

    #[test]
    fn test_mixed_formats_for_one_day_collapse() {
        let records = vec![on("04/11/2025"), on("2025-11-04"), on("2025-11-06")];
        assert_eq!(distinct_dates_desc(&records).len(), 2);
        let pair = latest_two_dates(&records).unwrap();
        assert_eq!(pair.latest.as_str(), "2025-11-06");
        assert_eq!(pair.previous, ObservationDate::new("2025-11-04"));
    }
}
