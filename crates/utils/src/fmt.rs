//! Date normalization for the order write path.
//!
//! Form widgets hand over full timestamps; the store keeps scheduling
//! fields as plain `YYYY-MM-DD` dates. Everything that writes a
//! scheduling column goes through these helpers.

use chrono::{DateTime, NaiveDate, Utc};

/// Truncate a form-supplied timestamp to the canonical date representation.
pub fn date_to_naive(date: &DateTime<Utc>) -> NaiveDate {
    date.date_naive()
}

pub fn opt_date_to_naive(date: Option<&DateTime<Utc>>) -> Option<NaiveDate> {
    date.map(date_to_naive)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_date_to_naive_drops_time_of_day() {
        let date = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 58).unwrap();
        assert_eq!(
            date_to_naive(&date),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_canonical_rendering_is_zero_padded_ymd() {
        let date = Utc.with_ymd_and_hms(2025, 3, 9, 4, 5, 6).unwrap();
        assert_eq!(date_to_naive(&date).to_string(), "2025-03-09");
    }

    #[test]
    fn test_opt_date_to_naive_passes_none_through() {
        assert_eq!(opt_date_to_naive(None), None);
    }
}
