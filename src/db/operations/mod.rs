pub mod capability;
pub mod mastery;
pub mod review;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::db::StoreError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{column}={value}: {e}")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(column: &str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("{column}={value}: {e}")))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        let c = a + chrono::Duration::seconds(10);
        let (fa, fb, fc) = (format_timestamp(&a), format_timestamp(&b), format_timestamp(&c));
        assert!(fa < fb && fb < fc);
        assert_eq!(parse_timestamp("created_at", &fb).unwrap(), b);
    }

    #[test]
    fn test_bad_date_is_corrupt() {
        let err = parse_date("next_review_date", "14/10/2026").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
